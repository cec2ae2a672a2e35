//! World inspection commands: `list`, `query`, `spawn`, `step` and `shrink`.

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use bevy_ecs::component::{ComponentId, ComponentInfo};
use bevy_ecs::prelude::*;
use console_core::{
    BoundCommand, CommandSchema, Console, OptionSpec, RegistrationError, ScalarKind,
};
use tracing::info;

use crate::components::{Mass, Position, Velocity};
use crate::Simulation;

pub const DEFAULT_PAGE_SIZE: i64 = 25;

pub fn register(console: &mut Console<Simulation>) -> Result<(), RegistrationError> {
    console.add_command(list_schema(), list)?;
    console.add_command(query_schema(), query)?;
    console.add_command(
        CommandSchema::new("spawn")
            .help("Spawns particles at random positions.")
            .option(OptionSpec::int("count").default_value(1).help("Particles to spawn."))
            .option(OptionSpec::flag("frozen").help("Spawn particles that never move.")),
        spawn,
    )?;
    console.add_command(
        CommandSchema::new("step")
            .help("Advances the simulation, even while paused.")
            .option(OptionSpec::int("n").default_value(1).help("Ticks to advance.")),
        step,
    )?;
    console.add_command(
        CommandSchema::new("shrink").help("Compacts world storage and reports the memory it held."),
        shrink,
    )
}

fn list_schema() -> CommandSchema {
    CommandSchema::new("list")
        .help("Lists various things in the world.")
        .subcommand(
            CommandSchema::new("resources").help("Lists the resources present in the world."),
        )
        .subcommand(CommandSchema::new("components").help("Lists registered component types."))
        .subcommand(
            CommandSchema::new("archetypes").help("Lists archetypes and their entity counts."),
        )
}

fn query_schema() -> CommandSchema {
    CommandSchema::new("query")
        .help("Lists entities matching a component filter.\nComponent names are matched without their module path.")
        .option(
            OptionSpec::int("n")
                .default_value(DEFAULT_PAGE_SIZE)
                .help("Entities per page."),
        )
        .option(OptionSpec::int("page").default_value(0).help("Page to show, from 0."))
        .option(
            OptionSpec::list("comps", ScalarKind::Text)
                .help("Only entities with all of these components."),
        )
        .option(
            OptionSpec::list("with", ScalarKind::Text)
                .help("Additional components to filter for."),
        )
        .option(
            OptionSpec::list("without", ScalarKind::Text)
                .help("Skip entities with any of these components."),
        )
        .option(
            OptionSpec::flag("exclusive")
                .help("Only entities with exactly the comps and with components."),
        )
        .option(OptionSpec::flag("full").help("Print component values."))
}

/// Type name without its module path or generic arguments.
pub fn short_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Every registered component type that is not a resource.
pub fn component_infos(world: &World) -> impl Iterator<Item = &ComponentInfo> {
    let resources: BTreeSet<ComponentId> = world
        .storages()
        .resources
        .iter()
        .map(|(id, _)| id)
        .collect();
    world
        .components()
        .iter()
        .filter(move |info| !resources.contains(&info.id()))
}

/// Names of the resources currently stored in the world.
pub fn present_resources(world: &World) -> impl Iterator<Item = &str> {
    world
        .storages()
        .resources
        .iter()
        .filter(|(_, data)| data.is_present())
        .filter_map(|(id, _)| world.components().get_info(id))
        .map(ComponentInfo::name)
}

fn component_name(world: &World, id: ComponentId) -> &str {
    world
        .components()
        .get_info(id)
        .map_or("<unknown>", |info| short_name(info.name()))
}

fn list(command: &BoundCommand, simulation: &mut Simulation, out: &mut String) -> fmt::Result {
    let world = simulation.world();
    match command.subcommands().first().map(String::as_str) {
        Some("resources") => {
            let mut names: Vec<&str> = present_resources(world).collect();
            names.sort_unstable();
            for name in &names {
                writeln!(out, "{name}")?;
            }
            writeln!(out, "{} resources", names.len())
        }
        Some("components") => {
            let mut count = 0;
            for info in component_infos(world) {
                writeln!(out, "{:>4} {}", info.id().index(), info.name())?;
                count += 1;
            }
            writeln!(out, "{count} components")
        }
        Some("archetypes") => {
            let mut count = 0;
            for archetype in world.archetypes().iter().filter(|a| !a.is_empty()) {
                let mut names: Vec<&str> = archetype
                    .components()
                    .map(|id| component_name(world, id))
                    .collect();
                names.sort_unstable();
                writeln!(
                    out,
                    "archetype {}: {} entities [{}]",
                    archetype.id().index(),
                    archetype.len(),
                    names.join(", ")
                )?;
                count += 1;
            }
            writeln!(out, "{count} archetypes")
        }
        _ => writeln!(out, "Specify what to list: resources, components or archetypes"),
    }
}

/// Resolve short component names to ids. Returns the first unknown name on
/// failure.
fn resolve_components<'a>(
    world: &World,
    names: &[&'a str],
) -> Result<BTreeSet<ComponentId>, &'a str> {
    names
        .iter()
        .map(|name| {
            component_infos(world)
                .find(|info| short_name(info.name()).eq_ignore_ascii_case(name))
                .map(ComponentInfo::id)
                .ok_or(*name)
        })
        .collect()
}

fn query(command: &BoundCommand, simulation: &mut Simulation, out: &mut String) -> fmt::Result {
    let per_page = command.int("n").unwrap_or(DEFAULT_PAGE_SIZE);
    let page = command.int("page").unwrap_or(0);
    if per_page < 1 || page < 0 {
        return writeln!(out, "n must be at least 1 and page must not be negative");
    }

    let world = simulation.world();
    let mut filter = command.texts("comps");
    filter.extend(command.texts("with"));
    let required = match resolve_components(world, &filter) {
        Ok(ids) => ids,
        Err(name) => return writeln!(out, "unknown component: {name}"),
    };
    let excluded = match resolve_components(world, &command.texts("without")) {
        Ok(ids) => ids,
        Err(name) => return writeln!(out, "unknown component: {name}"),
    };
    let exclusive = command.flag("exclusive");

    let mut matched: Vec<(Entity, Vec<ComponentId>)> = Vec::new();
    for archetype in world.archetypes().iter().filter(|a| !a.is_empty()) {
        let components: Vec<ComponentId> = archetype.components().collect();
        if !required.iter().all(|id| components.contains(id))
            || excluded.iter().any(|id| components.contains(id))
            || (exclusive && components.len() != required.len())
        {
            continue;
        }
        matched.extend(
            archetype
                .entities()
                .iter()
                .map(|entry| (entry.id(), components.clone())),
        );
    }
    matched.sort_by_key(|(entity, _)| entity.index());

    let total = matched.len();
    let per_page = per_page as usize;
    let pages = total.div_ceil(per_page);
    let start = usize::try_from(page)
        .unwrap_or(usize::MAX)
        .saturating_mul(per_page);
    let shown: Vec<_> = matched.iter().skip(start).take(per_page).collect();

    for (entity, components) in &shown {
        let mut names: Vec<&str> = components
            .iter()
            .map(|id| component_name(world, *id))
            .collect();
        names.sort_unstable();
        writeln!(out, "entity {} [{}]", entity.index(), names.join(", "))?;
        if command.flag("full") {
            write_values(world, *entity, out)?;
        }
    }
    writeln!(
        out,
        "Listed {} of {} entities (page {} of {})",
        shown.len(),
        total,
        page,
        pages
    )
}

fn write_values(world: &World, entity: Entity, out: &mut String) -> fmt::Result {
    if let Some(position) = world.get::<Position>(entity) {
        writeln!(out, "    {position:?}")?;
    }
    if let Some(velocity) = world.get::<Velocity>(entity) {
        writeln!(out, "    {velocity:?}")?;
    }
    if let Some(mass) = world.get::<Mass>(entity) {
        writeln!(out, "    {mass:?}")?;
    }
    Ok(())
}

fn spawn(command: &BoundCommand, simulation: &mut Simulation, out: &mut String) -> fmt::Result {
    let Ok(count) = usize::try_from(command.int("count").unwrap_or(1)) else {
        return writeln!(out, "count must not be negative");
    };
    let frozen = command.flag("frozen");
    let spawned = match simulation.spawn_particles(count, frozen) {
        Ok(spawned) => spawned,
        Err(err) => return writeln!(out, "{err}"),
    };
    info!(
        target: "live_console::demo",
        count = spawned.len(),
        frozen,
        "world.spawned"
    );
    writeln!(out, "Spawned {} particles", spawned.len())
}

fn step(command: &BoundCommand, simulation: &mut Simulation, out: &mut String) -> fmt::Result {
    let ticks = u64::try_from(command.int("n").unwrap_or(1)).unwrap_or(0);
    match simulation.advance(ticks) {
        Ok(tick) => writeln!(out, "tick={tick}"),
        Err(err) => writeln!(out, "{err}"),
    }
}

fn shrink(_: &BoundCommand, simulation: &mut Simulation, out: &mut String) -> fmt::Result {
    let before = simulation.table_memory();
    simulation.compact();
    let after = simulation.table_memory();
    info!(target: "live_console::demo", before, after, "world.compacted");
    if after == before {
        writeln!(out, "Shrink had no effect: {}", format_memory(after))
    } else {
        writeln!(
            out,
            "Shrink world memory: {} -> {}",
            format_memory(before),
            format_memory(after)
        )
    }
}

pub fn format_memory(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["kB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulationSettings;

    #[test]
    fn short_name_strips_paths_and_generics() {
        assert_eq!(short_name("demo_sim::components::Position"), "Position");
        assert_eq!(short_name("bevy_ecs::event::Events<app::Ping>"), "Events");
        assert_eq!(short_name("Plain"), "Plain");
    }

    #[test]
    fn memory_is_formatted_with_binary_units() {
        assert_eq!(format_memory(0), "0 B");
        assert_eq!(format_memory(1023), "1023 B");
        assert_eq!(format_memory(1536), "1.5 kB");
        assert_eq!(format_memory(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn resolve_reports_unknown_names() {
        let simulation = Simulation::new(SimulationSettings {
            particles: 1,
            ..SimulationSettings::default()
        });
        let world = simulation.world();
        assert_eq!(resolve_components(world, &["position", "VELOCITY"]).map(|ids| ids.len()), Ok(2));
        assert_eq!(resolve_components(world, &["Position", "Spin"]), Err("Spin"));
    }
}
