//! A line-oriented script language for raw console blocks.
//!
//! ```text
//! $
//! # comments and blank lines are skipped
//! spawn 10 frozen
//! step 5
//! despawn-all
//! $
//! ```

use std::fmt::{self, Write};

use console_core::{RawBlock, ScriptHandler};
use tracing::debug;

use crate::Simulation;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Instruction {
    Spawn { count: usize, frozen: bool },
    Step(u64),
    DespawnAll,
}

fn parse_instruction(line: &str) -> Result<Instruction, String> {
    let mut words = line.split_whitespace();
    let op = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    let count = |raw: Option<&&str>| -> Result<u64, String> {
        match raw {
            None => Ok(1),
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| format!("expected a count, got '{raw}'")),
        }
    };

    match (op, args.as_slice()) {
        ("spawn", [..]) if args.len() <= 2 => {
            let frozen = match args.get(1) {
                None => false,
                Some(&"frozen") => true,
                Some(other) => return Err(format!("unexpected argument '{other}'")),
            };
            Ok(Instruction::Spawn {
                count: usize::try_from(count(args.first())?).unwrap_or(usize::MAX),
                frozen,
            })
        }
        ("step", [..]) if args.len() <= 1 => Ok(Instruction::Step(count(args.first())?)),
        ("despawn-all", []) => Ok(Instruction::DespawnAll),
        _ => Err(format!("unknown instruction '{line}'")),
    }
}

/// Runs every instruction in order and stops at the first line that fails
/// to parse or to apply; instructions before it stay applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct TinyScript;

impl ScriptHandler<Simulation> for TinyScript {
    fn run(
        &self,
        block: RawBlock<'_>,
        simulation: &mut Simulation,
        out: &mut String,
    ) -> fmt::Result {
        let mut executed = 0;
        for (index, line) in block.body().iter().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let instruction = match parse_instruction(line) {
                Ok(instruction) => instruction,
                Err(err) => {
                    // Line numbers count the opening delimiter as line 1.
                    writeln!(out, "line {}: {err}", index + 2)?;
                    break;
                }
            };
            debug!(target: "live_console::demo", ?instruction, "script.instruction");
            let applied = match instruction {
                Instruction::Spawn { count, frozen } => {
                    simulation.spawn_particles(count, frozen).map(drop)
                }
                Instruction::Step(ticks) => simulation.advance(ticks).map(drop),
                Instruction::DespawnAll => {
                    simulation.despawn_particles();
                    Ok(())
                }
            };
            if let Err(err) = applied {
                writeln!(out, "line {}: {err}", index + 2)?;
                break;
            }
            executed += 1;
        }
        writeln!(
            out,
            "script: {executed} instructions, tick={}",
            simulation.tick()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulationSettings;
    use console_core::Inspect;

    #[test]
    fn instructions_parse_with_optional_counts() {
        assert_eq!(
            parse_instruction("spawn"),
            Ok(Instruction::Spawn {
                count: 1,
                frozen: false
            })
        );
        assert_eq!(
            parse_instruction("spawn 4 frozen"),
            Ok(Instruction::Spawn {
                count: 4,
                frozen: true
            })
        );
        assert_eq!(parse_instruction("step 3"), Ok(Instruction::Step(3)));
        assert_eq!(parse_instruction("despawn-all"), Ok(Instruction::DespawnAll));
        assert!(parse_instruction("step -1").is_err());
        assert!(parse_instruction("jump 2").is_err());
    }

    #[test]
    fn failing_line_stops_the_script() {
        let mut simulation = Simulation::new(SimulationSettings::default());
        let mut out = String::new();
        let text = "$\nspawn 3\n\nfly\nspawn 5\n$";
        TinyScript
            .run(RawBlock::new(text, "$"), &mut simulation, &mut out)
            .unwrap();

        assert_eq!(out, "line 4: unknown instruction 'fly'\nscript: 1 instructions, tick=0\n");
        assert_eq!(simulation.stats().entities, 3);
    }

    #[test]
    fn oversized_instruction_stops_the_script() {
        let mut simulation = Simulation::new(SimulationSettings::default());
        let mut out = String::new();
        let text = "$\nspawn 2\nspawn 100000000000000\nstep 1\n$";
        TinyScript
            .run(RawBlock::new(text, "$"), &mut simulation, &mut out)
            .unwrap();

        assert!(out.starts_with("line 3: cannot spawn 100000000000000 particles"), "{out}");
        assert!(out.ends_with("script: 1 instructions, tick=0\n"), "{out}");
        assert_eq!(simulation.stats().entities, 2);
    }
}
