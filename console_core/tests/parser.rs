use console_core::{
    Callbacks, CommandParseError, CommandSchema, Console, ConsoleConfig, Inspect, OptionSpec,
    OptionValue, ScalarKind,
};

struct Idle;

impl Inspect for Idle {
    type Stats = u64;

    fn stats(&self) -> u64 {
        0
    }
}

fn console() -> Console<Idle> {
    let mut console = Console::new(ConsoleConfig::default(), Callbacks::new());
    console
        .add_command(
            CommandSchema::new("cmd").help("Nested command.").subcommand(
                CommandSchema::new("sub").subcommand(
                    CommandSchema::new("subsub")
                        .option(OptionSpec::flag("arg1"))
                        .option(OptionSpec::flag("arg2"))
                        .option(OptionSpec::float("arg3"))
                        .option(OptionSpec::text("arg4")),
                ),
            ),
            |_, _, _| Ok(()),
        )
        .unwrap();
    console
        .add_command(
            CommandSchema::new("query")
                .option(OptionSpec::int("n").default_value(25))
                .option(OptionSpec::int("page").default_value(1))
                .option(OptionSpec::list("comps", ScalarKind::Text))
                .option(OptionSpec::flag("full")),
            |_, _, _| Ok(()),
        )
        .unwrap();
    console
}

#[test]
fn nested_subcommands_bind_options_on_the_leaf() {
    let parsed = console()
        .parse("cmd sub subsub arg1 arg2=1 arg3=2.0 arg4=test")
        .unwrap();
    assert!(!parsed.is_help);

    let command = parsed.command;
    assert_eq!(command.path(), ["cmd", "sub", "subsub"]);
    assert_eq!(command.subcommands(), ["sub", "subsub"]);
    assert!(command.flag("arg1"));
    assert!(command.flag("arg2"));
    assert_eq!(command.float("arg3"), Some(2.0));
    assert_eq!(command.text("arg4"), Some("test"));
}

#[test]
fn defaults_apply_when_options_are_omitted() {
    let command = console().parse("query").unwrap().command;
    assert_eq!(command.int("n"), Some(25));
    assert_eq!(command.int("page"), Some(1));
    assert!(!command.flag("full"));
    assert!(command.texts("comps").is_empty());
}

#[test]
fn help_prefix_resolves_the_following_path() {
    let parsed = console().parse("help cmd sub").unwrap();
    assert!(parsed.is_help);
    assert_eq!(parsed.command.path(), ["cmd", "sub"]);

    let bare = console().parse("help").unwrap();
    assert!(!bare.is_help);
    assert_eq!(bare.command.path(), ["help"]);
}

#[test]
fn subcommands_and_options_ignore_case() {
    let command = console()
        .parse("cmd SUB SubSub ARG1 Arg4=Mixed")
        .unwrap()
        .command;
    assert_eq!(command.path(), ["cmd", "sub", "subsub"]);
    assert!(command.flag("arg1"));
    assert_eq!(command.text("arg4"), Some("Mixed"));
}

#[test]
fn top_level_names_are_exact() {
    assert_eq!(
        console().parse("QUERY").unwrap_err(),
        CommandParseError::UnknownCommand("QUERY".into())
    );
}

#[test]
fn errors_are_reported_by_kind() {
    let console = console();
    assert_eq!(
        console.parse("cmd nope").unwrap_err(),
        CommandParseError::UnknownSubcommandOrOption("nope".into())
    );
    assert_eq!(
        console.parse("query bogus=1").unwrap_err(),
        CommandParseError::InvalidOption("bogus".into())
    );
    assert_eq!(
        console.parse("query n=many").unwrap_err().to_string(),
        "invalid value for int option 'n': many"
    );
}

#[test]
fn canonical_text_reparses_to_the_same_command() {
    let console = console();
    let command = console.parse("query comps=Position,Velocity full n=10").unwrap().command;
    let leaf = CommandSchema::new("query")
        .option(OptionSpec::int("n").default_value(25))
        .option(OptionSpec::int("page").default_value(1))
        .option(OptionSpec::list("comps", ScalarKind::Text))
        .option(OptionSpec::flag("full"));

    let text = command.canonical_text(&leaf);
    assert_eq!(text, "query comps=Position,Velocity full n=10");
    assert_eq!(console.parse(&text).unwrap().command, command);
}

#[test]
fn delimited_block_is_routed_whole() {
    let input = "$\nspawn 3\n  step   2\n$";
    let parsed = console().parse(input).unwrap();
    assert!(!parsed.is_help);
    assert_eq!(parsed.command.path(), ["script"]);
    assert_eq!(
        parsed.command.get("block"),
        Some(&OptionValue::Text(input.to_string()))
    );
}
