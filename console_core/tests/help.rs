use std::sync::Arc;

use console_core::help::render_command;
use console_core::{
    Callbacks, CommandSchema, Console, ConsoleConfig, Inspect, OptionSpec, ScalarKind,
};

struct Idle;

impl Inspect for Idle {
    type Stats = u64;

    fn stats(&self) -> u64 {
        0
    }
}

fn query_schema() -> CommandSchema {
    CommandSchema::new("query")
        .help("Queries entities.\nFilters by component names.")
        .option(OptionSpec::int("n").default_value(25).help("Entities per page."))
        .option(OptionSpec::int("page").default_value(1))
        .option(OptionSpec::list("comps", ScalarKind::Text).help("Required component names."))
        .option(OptionSpec::flag("full").help("Print every component."))
}

fn list_schema() -> CommandSchema {
    CommandSchema::new("list")
        .help("Lists various things.")
        .subcommand(CommandSchema::new("resources").help("Lists resources."))
        .subcommand(CommandSchema::new("components").help("Lists components."))
        .subcommand(CommandSchema::new("archetypes"))
}

fn console() -> Arc<Console<Idle>> {
    let mut console = Console::new(ConsoleConfig::default(), Callbacks::new());
    console.add_command(query_schema(), |_, _, _| Ok(())).unwrap();
    console.add_command(list_schema(), |_, _, _| Ok(())).unwrap();
    let console = Arc::new(console);
    console.spawn_background(Idle).unwrap();
    console.open();
    console
}

#[test]
fn overview_lists_visible_commands_in_name_order() {
    let text = console().submit("help");
    insta::assert_snapshot!(text.trim_end(), @r"
For help on a command, use: help <command>

Commands:
  exit         Exit the console without stopping the simulation.
  help         Show this help.
  list         Lists various things.
  pause        Pause the connected simulation.
  query        Queries entities.
  resume       Resume the connected simulation.
  stats        Prints simulation statistics.
  stop         Stop the connected simulation.
");
}

#[test]
fn command_help_shows_kinds_and_defaults() {
    let mut text = String::new();
    render_command(&query_schema(), &mut text).unwrap();
    insta::assert_snapshot!(text.trim_end(), @r"
Queries entities.
Filters by component names.
Options:
  n             int      Entities per page. Default: 25
  page          int      Default: 1
  comps         []string Required component names.
  full          bool     Print every component.
");
}

#[test]
fn subcommand_rows_use_the_summary_line() {
    let text = console().submit("help list");
    insta::assert_snapshot!(text.trim_end(), @r"
Lists various things.
Commands:
  resources    Lists resources.
  components   Lists components.
  archetypes
");
}

#[test]
fn help_on_a_nested_path_renders_the_leaf() {
    let text = console().submit("help list resources");
    assert_eq!(text, "Lists resources.\n");

    let text = console().submit("help list archetypes");
    assert_eq!(text, "No help available for 'archetypes'.\n");
}
