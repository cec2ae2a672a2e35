//! Embeddable live console for long-running simulations.
//!
//! A host registers typed commands on a [`Console`], then serves it over a
//! local terminal or a TCP listener. Every command, whichever session it came
//! from, runs on a single consumer: either the host's own loop calling
//! [`Console::drain`] or a background thread started with
//! [`Console::spawn_background`].

pub mod config;
mod console;
pub mod help;
mod inspect;
pub mod parser;
mod registry;
pub mod scheduler;
pub mod schema;
mod script;
mod session;
mod transport;

pub use config::{load_console_config_from_env, ConsoleConfig, ConsoleConfigError};
pub use console::{Callbacks, CommandFn, Console, ConsoleError, HostCallback, LocalCommandFn};
pub use inspect::{Inspect, StatsReport};
pub use parser::{CommandParseError, Parsed};
pub use registry::{Registry, RegistryEntry, RegistrationError};
pub use scheduler::{Scheduler, SchedulerError};
pub use schema::{BoundCommand, CommandSchema, OptionKind, OptionSpec, OptionValue, ScalarKind};
pub use script::{RawBlock, ScriptHandler};
pub use session::{Prompt, Session, SessionEnd, SessionFlow, PROMPT_MARKER};
pub use transport::ServerHandle;
