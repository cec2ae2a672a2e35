use std::collections::BTreeMap;

use thiserror::Error;

use crate::registry::Registry;
use crate::schema::{BoundCommand, CommandSchema, OptionKind, OptionSpec, OptionValue};

/// Reserved command that renders help for the command path following it.
pub const HELP_COMMAND: &str = "help";
/// Command that receives raw blocks.
pub const SCRIPT_COMMAND: &str = "script";
/// Option of [`SCRIPT_COMMAND`] carrying the block text.
pub const SCRIPT_BLOCK_OPTION: &str = "block";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("no command provided")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown subcommand or bool option: {0}")]
    UnknownSubcommandOrOption(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("invalid option syntax: {0}")]
    InvalidOptionSyntax(String),
    #[error("invalid value for {kind} option '{option}': {value}")]
    InvalidValue {
        option: String,
        kind: String,
        value: String,
    },
}

/// Result of parsing one input.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub command: BoundCommand,
    /// Render help for `command` instead of executing it.
    pub is_help: bool,
}

/// Parse one line (or one raw block) against `registry`.
pub fn parse_input<H>(
    input: &str,
    registry: &Registry<H>,
    delimiter: &str,
) -> Result<Parsed, CommandParseError> {
    if let Some(block) = detect_block(input, delimiter) {
        return Ok(Parsed {
            command: block_command(block),
            is_help: false,
        });
    }

    let tokens: Vec<&str> = input.split_whitespace().collect();
    parse_tokens(&tokens, registry)
}

/// Returns the whole trimmed input when it is a delimited raw block: a
/// delimiter line, any number of lines, and a closing delimiter line.
pub fn detect_block<'a>(input: &'a str, delimiter: &str) -> Option<&'a str> {
    let trimmed = input.trim();
    let mut lines = trimmed.lines();
    let first = lines.next()?;
    let last = lines.next_back()?;
    (first.trim() == delimiter && last.trim() == delimiter).then_some(trimmed)
}

/// Body of a raw block without its delimiter lines.
pub fn block_body<'a>(block: &'a str, delimiter: &str) -> Vec<&'a str> {
    let lines: Vec<&str> = block.lines().collect();
    match lines.as_slice() {
        [first, body @ .., last] if first.trim() == delimiter && last.trim() == delimiter => {
            body.to_vec()
        }
        _ => lines,
    }
}

fn block_command(block: &str) -> BoundCommand {
    let mut values = BTreeMap::new();
    values.insert(
        SCRIPT_BLOCK_OPTION.to_string(),
        OptionValue::Text(block.to_string()),
    );
    BoundCommand::new(vec![SCRIPT_COMMAND.to_string()], values)
}

fn parse_tokens<H>(tokens: &[&str], registry: &Registry<H>) -> Result<Parsed, CommandParseError> {
    let (name, rest) = tokens.split_first().ok_or(CommandParseError::Empty)?;
    let entry = registry
        .lookup(name)
        .ok_or_else(|| CommandParseError::UnknownCommand(name.to_string()))?;

    if *name == HELP_COMMAND && !rest.is_empty() {
        let inner = parse_tokens(rest, registry)?;
        return Ok(Parsed {
            command: inner.command,
            is_help: true,
        });
    }

    let mut schema = entry.schema();
    let mut path = vec![schema.name().to_string()];
    let mut index = 0;
    while let Some(token) = rest.get(index) {
        if token.contains('=') {
            break;
        }
        if let Some(subcommand) = schema.find_subcommand(token) {
            schema = subcommand;
            path.push(subcommand.name().to_string());
            index += 1;
            continue;
        }
        match schema.find_option(token) {
            Some(option) if option.kind().is_flag() => break,
            Some(_) => return Err(CommandParseError::InvalidOptionSyntax(token.to_string())),
            None => {
                return Err(CommandParseError::UnknownSubcommandOrOption(
                    token.to_string(),
                ))
            }
        }
    }

    let values = bind_options(schema, &rest[index..])?;
    Ok(Parsed {
        command: BoundCommand::new(path, values),
        is_help: false,
    })
}

fn bind_options(
    schema: &CommandSchema,
    tokens: &[&str],
) -> Result<BTreeMap<String, OptionValue>, CommandParseError> {
    let mut values = schema.defaults();
    for token in tokens {
        let (key, raw) = match token.split_once('=') {
            Some((key, raw)) => (key, Some(raw)),
            None => (*token, None),
        };
        let option = schema
            .find_option(key)
            .ok_or_else(|| CommandParseError::InvalidOption(key.to_string()))?;
        let value = match raw {
            Some(raw) => coerce(option, raw)?,
            None if option.kind().is_flag() => OptionValue::Bool(true),
            None => return Err(CommandParseError::InvalidOptionSyntax(token.to_string())),
        };
        values.insert(option.name().to_string(), value);
    }
    Ok(values)
}

fn coerce(option: &OptionSpec, raw: &str) -> Result<OptionValue, CommandParseError> {
    let invalid = |value: &str| CommandParseError::InvalidValue {
        option: option.name().to_string(),
        kind: option.kind().label(),
        value: value.to_string(),
    };

    match option.kind() {
        OptionKind::Scalar(kind) => kind.coerce(raw).ok_or_else(|| invalid(raw)),
        OptionKind::List(_) if raw.is_empty() => Ok(OptionValue::List(Vec::new())),
        OptionKind::List(kind) => raw
            .split(',')
            .map(|item| kind.coerce(item).ok_or_else(|| invalid(item)))
            .collect::<Result<Vec<_>, _>>()
            .map(OptionValue::List),
    }
}
