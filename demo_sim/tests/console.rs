use std::sync::Arc;

use console_core::{Console, ConsoleConfig, StatsReport};
use demo_sim::{build_console, Simulation, SimulationSettings, WorldStats};

fn running_console() -> Arc<Console<Simulation>> {
    let console = Arc::new(build_console(ConsoleConfig::default()).unwrap());
    console
        .spawn_background(Simulation::new(SimulationSettings::default()))
        .unwrap();
    console.open();
    console
}

fn populated_console() -> Arc<Console<Simulation>> {
    let console = running_console();
    assert_eq!(console.submit("spawn count=3"), "Spawned 3 particles\n");
    assert_eq!(
        console.submit("spawn count=2 frozen"),
        "Spawned 2 particles\n"
    );
    console
}

#[test]
fn query_paginates_with_the_default_filter() {
    let console = populated_console();

    let page = console.submit("query comps=Position n=2");
    assert!(page.starts_with("entity 0 [Mass, Position, Velocity]\nentity 1 "), "{page}");
    assert!(page.ends_with("Listed 2 of 5 entities (page 0 of 3)\n"), "{page}");

    let last = console.submit("query n=2 page=2");
    assert!(last.starts_with("entity 4 [Frozen, Position, Velocity]\n"), "{last}");
    assert!(last.ends_with("Listed 1 of 5 entities (page 2 of 3)\n"), "{last}");

    let beyond = console.submit("query page=9");
    assert_eq!(beyond, "Listed 0 of 5 entities (page 9 of 1)\n");

    assert_eq!(
        console.submit("query page=-1"),
        "n must be at least 1 and page must not be negative\n"
    );
}

#[test]
fn query_filters_by_component_names() {
    let console = populated_console();

    let moving = console.submit("query comps=position without=Frozen");
    assert!(moving.ends_with("Listed 3 of 3 entities (page 0 of 1)\n"), "{moving}");

    let exact = console.submit("query comps=Position,Velocity,Frozen exclusive");
    assert!(exact.ends_with("Listed 2 of 2 entities (page 0 of 1)\n"), "{exact}");

    let extra = console.submit("query comps=Position with=Mass,Velocity exclusive");
    assert!(extra.ends_with("Listed 3 of 3 entities (page 0 of 1)\n"), "{extra}");

    let frozen = console.submit("query with=frozen");
    assert!(frozen.starts_with("entity 3 [Frozen, Position, Velocity]\n"), "{frozen}");
    assert!(frozen.ends_with("Listed 2 of 2 entities (page 0 of 1)\n"), "{frozen}");

    let none = console.submit("query comps=Position,Velocity exclusive");
    assert_eq!(none, "Listed 0 of 0 entities (page 0 of 0)\n");

    assert_eq!(
        console.submit("query comps=Spin"),
        "unknown component: Spin\n"
    );
    assert_eq!(
        console.submit("query with=Spin"),
        "unknown component: Spin\n"
    );
}

#[test]
fn full_query_prints_component_values() {
    let console = populated_console();
    let text = console.submit("query n=1 full");
    assert!(text.contains("\n    Position { x: "), "{text}");
    assert!(text.contains("\n    Mass("), "{text}");
}

#[test]
fn list_subcommands_describe_the_world() {
    let console = populated_console();

    let resources = console.submit("list resources");
    assert!(resources.contains("demo_sim::resources::Tick\n"), "{resources}");
    assert!(resources.ends_with("2 resources\n"), "{resources}");

    let archetypes = console.submit("list archetypes");
    assert!(archetypes.contains("3 entities [Mass, Position, Velocity]"), "{archetypes}");
    assert!(archetypes.contains("2 entities [Frozen, Position, Velocity]"), "{archetypes}");

    let components = console.submit("list components");
    assert!(components.contains("demo_sim::components::Frozen\n"), "{components}");
    assert!(!components.contains("Tick"), "{components}");
}

#[test]
fn stats_json_tracks_steps_and_pause() {
    let console = populated_console();
    assert_eq!(console.submit("step n=4"), "tick=4\n");
    assert_eq!(console.submit("pause"), "Simulation paused\n");

    let line = console.submit("stats-json");
    let report: StatsReport<WorldStats> = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(report.ticks, 4);
    assert_eq!(report.stats.tick, 4);
    assert_eq!(report.stats.entities, 5);
    assert!(report.stats.paused);
}

#[test]
fn raw_block_runs_the_tiny_script() {
    let console = running_console();
    let out = console.submit("$\nspawn 2\n# warm up\nstep 3\n$");
    assert_eq!(out, "script: 2 instructions, tick=3\n");
    assert!(console.submit("stats").starts_with("tick=3 entities=2 "));
}

#[test]
fn oversized_spawn_is_refused_and_the_consumer_keeps_running() {
    let console = running_console();
    assert_eq!(
        console.submit("spawn count=100000000000000"),
        "cannot spawn 100000000000000 particles at once (limit 100000)\n"
    );
    assert_eq!(console.submit("spawn count=-2"), "count must not be negative\n");
    assert_eq!(
        console.submit("step n=100000000000"),
        "cannot advance 100000000000 ticks at once (limit 100000)\n"
    );
    assert!(console.submit("stats").starts_with("tick=0 entities=0 "));
}

#[test]
fn shrink_compacts_the_world_after_despawning() {
    let console = running_console();
    assert_eq!(console.submit("spawn count=500"), "Spawned 500 particles\n");
    assert_eq!(
        console.submit("$\ndespawn-all\nspawn 1 frozen\n$"),
        "script: 2 instructions, tick=0\n"
    );

    let shrunk = console.submit("shrink");
    assert!(shrunk.starts_with("Shrink world memory: "), "{shrunk}");
    assert!(console.submit("shrink").starts_with("Shrink had no effect: "));

    let listed = console.submit("query");
    assert_eq!(
        listed,
        "entity 0 [Frozen, Position, Velocity]\nListed 1 of 1 entities (page 0 of 1)\n"
    );
    assert_eq!(console.submit("step n=2"), "tick=2\n");
}
