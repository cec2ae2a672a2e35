//! Help text rendering for registered commands.

use std::fmt::{self, Write};

use crate::registry::Registry;
use crate::schema::{CommandSchema, OptionSpec};

/// Listing of every visible command with its summary line.
pub fn render_overview<H>(registry: &Registry<H>, out: &mut String) -> fmt::Result {
    writeln!(out, "For help on a command, use: help <command>")?;
    writeln!(out)?;
    writeln!(out, "Commands:")?;
    for entry in registry.visible() {
        let schema = entry.schema();
        write_row(out, &format!("  {:<12} {}", schema.name(), schema.summary()))?;
    }
    Ok(())
}

/// Full help of one command: its help text, subcommands and options.
pub fn render_command(schema: &CommandSchema, out: &mut String) -> fmt::Result {
    let text = schema.help_text().trim_end();
    if text.is_empty() {
        writeln!(out, "No help available for '{}'.", schema.name())?;
    } else {
        writeln!(out, "{text}")?;
    }

    if !schema.subcommands().is_empty() {
        writeln!(out, "Commands:")?;
        for subcommand in schema.subcommands() {
            write_row(
                out,
                &format!("  {:<12} {}", subcommand.name(), subcommand.summary()),
            )?;
        }
    }

    if !schema.options().is_empty() {
        writeln!(out, "Options:")?;
        for option in schema.options() {
            write_row(
                out,
                &format!(
                    "  {:<13} {:<8} {}",
                    option.name(),
                    option.kind(),
                    describe(option)
                ),
            )?;
        }
    }
    Ok(())
}

fn describe(option: &OptionSpec) -> String {
    match (option.help_text(), option.default()) {
        ("", None) => String::new(),
        (help, None) => help.to_string(),
        ("", Some(default)) => format!("Default: {default}"),
        (help, Some(default)) => format!("{help} Default: {default}"),
    }
}

fn write_row(out: &mut String, row: &str) -> fmt::Result {
    writeln!(out, "{}", row.trim_end())
}
