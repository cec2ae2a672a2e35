use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConsoleConfig;
use crate::help;
use crate::inspect::{Inspect, StatsReport};
use crate::parser::{
    parse_input, CommandParseError, Parsed, HELP_COMMAND, SCRIPT_BLOCK_OPTION, SCRIPT_COMMAND,
};
use crate::registry::{Registry, RegistrationError, RegistryEntry};
use crate::scheduler::{Scheduler, SchedulerError};
use crate::schema::{BoundCommand, CommandSchema, OptionSpec};
use crate::script::{RawBlock, ScriptHandler};
use crate::session::SessionFlow;

/// Handler of a custom command. Runs on the consumer thread.
pub type CommandFn<T> = dyn Fn(&BoundCommand, &mut T, &mut String) -> fmt::Result + Send + Sync;

/// Handler of a local command. Runs on the thread of the session that
/// received the command, so it may submit further commands itself.
pub type LocalCommandFn<T> =
    dyn Fn(&Arc<Console<T>>, &BoundCommand, &mut String) -> fmt::Result + Send + Sync;

/// Host loop control hook. Runs on the consumer thread.
pub type HostCallback<T> = Box<dyn Fn(&mut T, &mut String) + Send + Sync>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("console is already running")]
    AlreadyStarted,
    #[error("failed to bind console listener at {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("console I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Optional simulation loop hooks. A missing hook is reported to the user,
/// never treated as a fault.
pub struct Callbacks<T> {
    pub pause: Option<HostCallback<T>>,
    pub resume: Option<HostCallback<T>>,
    pub stop: Option<HostCallback<T>>,
    /// Current simulation tick, reported by `stats-json`.
    pub ticks: Option<Box<dyn Fn(&T) -> u64 + Send + Sync>>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            pause: None,
            resume: None,
            stop: None,
            ticks: None,
        }
    }
}

impl<T> Callbacks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pause(mut self, hook: impl Fn(&mut T, &mut String) + Send + Sync + 'static) -> Self {
        self.pause = Some(Box::new(hook));
        self
    }

    pub fn on_resume(
        mut self,
        hook: impl Fn(&mut T, &mut String) + Send + Sync + 'static,
    ) -> Self {
        self.resume = Some(Box::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn(&mut T, &mut String) + Send + Sync + 'static) -> Self {
        self.stop = Some(Box::new(hook));
        self
    }

    pub fn ticks(mut self, accessor: impl Fn(&T) -> u64 + Send + Sync + 'static) -> Self {
        self.ticks = Some(Box::new(accessor));
        self
    }
}

enum Action<T> {
    Help,
    Exit,
    Stop,
    Pause,
    Resume,
    Stats,
    StatsJson,
    Script,
    Custom(Box<CommandFn<T>>),
    Local(Box<LocalCommandFn<T>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Startup,
    Interactive,
}

/// One console engine: the command registry, the single-consumer scheduler
/// and the host hooks, shared by every session.
///
/// Commands are registered through `&mut Console` before it is wrapped in an
/// [`Arc`] and handed to transports.
pub struct Console<T> {
    registry: Registry<Action<T>>,
    scheduler: Scheduler<T>,
    callbacks: Callbacks<T>,
    script: Option<Box<dyn ScriptHandler<T>>>,
    config: ConsoleConfig,
    started: AtomicBool,
}

impl<T: Inspect + 'static> Console<T> {
    pub fn new(config: ConsoleConfig, callbacks: Callbacks<T>) -> Self {
        let mut console = Self {
            registry: Registry::new(),
            scheduler: Scheduler::new(),
            callbacks,
            script: None,
            config,
            started: AtomicBool::new(false),
        };
        console
            .register_builtins()
            .expect("builtin commands should register");
        console
    }

    fn register_builtins(&mut self) -> Result<(), RegistrationError> {
        let builtins = [
            (HELP_COMMAND, "Show this help.", Action::Help, true),
            ("pause", "Pause the connected simulation.", Action::Pause, true),
            ("resume", "Resume the connected simulation.", Action::Resume, true),
            ("stop", "Stop the connected simulation.", Action::Stop, true),
            (
                "exit",
                "Exit the console without stopping the simulation.",
                Action::Exit,
                true,
            ),
            ("stats", "Prints simulation statistics.", Action::Stats, true),
            (
                "stats-json",
                "Prints simulation statistics in JSON format.",
                Action::StatsJson,
                false,
            ),
        ];
        for (name, help, action, visible) in builtins {
            self.registry
                .register(CommandSchema::new(name).help(help), action, visible)?;
        }
        self.registry.register(
            CommandSchema::new(SCRIPT_COMMAND)
                .help("Runs a raw block through the script handler.")
                .option(OptionSpec::text(SCRIPT_BLOCK_OPTION)),
            Action::Script,
            false,
        )
    }

    /// Register a command listed by `help`.
    pub fn add_command<F>(&mut self, schema: CommandSchema, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&BoundCommand, &mut T, &mut String) -> fmt::Result + Send + Sync + 'static,
    {
        self.registry
            .register(schema, Action::Custom(Box::new(handler)), true)
    }

    /// Register a callable command that `help` does not list.
    pub fn add_hidden_command<F>(
        &mut self,
        schema: CommandSchema,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&BoundCommand, &mut T, &mut String) -> fmt::Result + Send + Sync + 'static,
    {
        self.registry
            .register(schema, Action::Custom(Box::new(handler)), false)
    }

    /// Register a command that bypasses the scheduler and runs on the
    /// session thread, e.g. a dashboard that polls `stats-json`. Hosts only
    /// register these for the transports they want them on.
    pub fn add_local_command<F>(
        &mut self,
        schema: CommandSchema,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&Arc<Console<T>>, &BoundCommand, &mut String) -> fmt::Result
            + Send
            + Sync
            + 'static,
    {
        self.registry
            .register(schema, Action::Local(Box::new(handler)), true)
    }

    pub fn set_script_handler(&mut self, handler: impl ScriptHandler<T> + 'static) {
        self.script = Some(Box::new(handler));
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn parse(&self, input: &str) -> Result<Parsed, CommandParseError> {
        parse_input(input, &self.registry, &self.config.block_delimiter)
    }

    /// Help text for a parsed command path.
    pub fn help_for(&self, command: &BoundCommand) -> String {
        let mut out = String::new();
        let _ = match self.registry.resolve(command.path()) {
            Some(schema) => help::render_command(schema, &mut out),
            None => writeln!(out, "No help available for '{}'.", command.leaf()),
        };
        out
    }

    /// Cooperative mode: run every queued command on the calling thread.
    /// See [`Scheduler::drain`] for the blocking rules around startup.
    pub fn drain(&self, target: &mut T) -> usize {
        self.scheduler.drain(target)
    }

    /// Background mode: move `target` onto a dedicated consumer thread that
    /// drains the queue for the rest of the process lifetime.
    pub fn spawn_background(self: &Arc<Self>, mut target: T) -> io::Result<JoinHandle<()>>
    where
        T: Send,
    {
        let console = Arc::clone(self);
        thread::Builder::new()
            .name("console-consumer".to_string())
            .spawn(move || console.scheduler.run_forever(&mut target))
    }

    /// Admit interactive commands without running any launch-time commands.
    pub fn open(&self) {
        self.scheduler.open_barrier();
    }

    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// Programmatic entry: execute a bound command and wait for its output.
    pub fn execute(self: &Arc<Self>, command: BoundCommand) -> Result<String, SchedulerError> {
        self.execute_with(command, Admission::Interactive)
    }

    /// Programmatic entry: handle one line exactly like a session would and
    /// return the text it produced.
    pub fn submit(self: &Arc<Self>, input: &str) -> String {
        let mut out = String::new();
        self.handle_line(input, &mut out);
        out
    }

    /// Parse and run one input, appending everything the user should see to
    /// `out`.
    pub fn handle_line(self: &Arc<Self>, input: &str, out: &mut String) -> SessionFlow {
        self.handle(input, out, Admission::Interactive)
    }

    /// Run the launch-time commands in order, echoing each one to `sink`,
    /// then open the startup barrier. The barrier opens even if writing to
    /// `sink` fails.
    ///
    /// Local commands are echoed in place but run after the barrier opened,
    /// in their original order.
    pub fn run_startup<W: Write>(
        self: &Arc<Self>,
        commands: &[String],
        sink: &mut W,
    ) -> io::Result<SessionFlow> {
        let mut deferred = Vec::new();
        let result = self.run_initial_commands(commands, sink, &mut deferred);
        self.scheduler.open_barrier();
        let flow = result?;
        if flow != SessionFlow::Continue {
            return Ok(flow);
        }
        for command in deferred {
            let mut out = String::new();
            self.handle_line(command, &mut out);
            sink.write_all(out.as_bytes())?;
            sink.flush()?;
        }
        Ok(SessionFlow::Continue)
    }

    fn run_initial_commands<'c, W: Write>(
        self: &Arc<Self>,
        commands: &'c [String],
        sink: &mut W,
        deferred: &mut Vec<&'c str>,
    ) -> io::Result<SessionFlow> {
        for command in commands {
            writeln!(sink, "> {command}")?;
            if self.is_local(command) {
                deferred.push(command.as_str());
                continue;
            }
            let mut out = String::new();
            let flow = self.handle(command, &mut out, Admission::Startup);
            sink.write_all(out.as_bytes())?;
            sink.flush()?;
            if flow != SessionFlow::Continue {
                return Ok(flow);
            }
        }
        Ok(SessionFlow::Continue)
    }

    fn is_local(&self, input: &str) -> bool {
        let Ok(parsed) = self.parse(input) else {
            return false;
        };
        !parsed.is_help
            && matches!(
                self.registry
                    .lookup(parsed.command.root())
                    .map(RegistryEntry::handler),
                Some(Action::Local(_))
            )
    }

    pub(crate) fn mark_started(&self) -> Result<(), ConsoleError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ConsoleError::AlreadyStarted);
        }
        Ok(())
    }

    pub(crate) fn clear_started(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn handle(self: &Arc<Self>, input: &str, out: &mut String, admission: Admission) -> SessionFlow {
        let parsed = match self.parse(input) {
            Ok(parsed) => parsed,
            Err(err) => {
                let _ = writeln!(out, "{err}");
                return SessionFlow::Continue;
            }
        };

        if parsed.is_help {
            out.push_str(&self.help_for(&parsed.command));
            return SessionFlow::Continue;
        }

        let flow = match self
            .registry
            .lookup(parsed.command.root())
            .map(|entry| entry.handler())
        {
            Some(Action::Exit) => return SessionFlow::Exit,
            Some(Action::Local(handler)) => {
                let _ = handler(self, &parsed.command, out);
                return SessionFlow::Continue;
            }
            Some(Action::Stop) if self.callbacks.stop.is_some() => SessionFlow::Stop,
            _ => SessionFlow::Continue,
        };

        match self.execute_with(parsed.command, admission) {
            Ok(text) => out.push_str(&text),
            Err(err) => {
                let _ = writeln!(out, "{err}");
            }
        }
        flow
    }

    fn execute_with(
        self: &Arc<Self>,
        command: BoundCommand,
        admission: Admission,
    ) -> Result<String, SchedulerError> {
        let console = Arc::clone(self);
        let work = move |target: &mut T, out: &mut String| {
            debug!(
                target: "live_console::console",
                command = %command.path().join(" "),
                "command.started"
            );
            let _ = console.dispatch(&command, target, out);
        };
        match admission {
            Admission::Startup => self.scheduler.submit_initial(work),
            Admission::Interactive => self
                .scheduler
                .submit_with_timeout(work, self.config.command_timeout()),
        }
    }

    fn dispatch(&self, command: &BoundCommand, target: &mut T, out: &mut String) -> fmt::Result {
        let Some(entry) = self.registry.lookup(command.root()) else {
            return writeln!(out, "unknown command: {}", command.root());
        };
        match entry.handler() {
            Action::Help => help::render_overview(&self.registry, out),
            Action::Exit => Ok(()),
            Action::Pause => self.invoke(
                self.callbacks.pause.as_ref(),
                "pause",
                "Simulation paused",
                target,
                out,
            ),
            Action::Resume => self.invoke(
                self.callbacks.resume.as_ref(),
                "resume",
                "Simulation resumed",
                target,
                out,
            ),
            Action::Stop => self.invoke(
                self.callbacks.stop.as_ref(),
                "stop",
                "Simulation terminated",
                target,
                out,
            ),
            Action::Stats => writeln!(out, "{}", target.stats()),
            Action::StatsJson => {
                let report = StatsReport {
                    ticks: self.callbacks.ticks.as_ref().map_or(0, |ticks| ticks(&*target)),
                    stats: target.stats(),
                };
                match serde_json::to_string(&report) {
                    Ok(json) => writeln!(out, "{json}"),
                    Err(err) => writeln!(out, "failed to encode stats: {err}"),
                }
            }
            Action::Script => {
                let text = command.text(SCRIPT_BLOCK_OPTION).unwrap_or_default();
                match &self.script {
                    Some(handler) => handler.run(
                        RawBlock::new(text, &self.config.block_delimiter),
                        target,
                        out,
                    ),
                    None => writeln!(out, "No script handler provided"),
                }
            }
            Action::Custom(handler) => handler(command, target, out),
            // Reached through `execute` only; sessions run these directly.
            Action::Local(_) => writeln!(
                out,
                "{} cannot run on the simulation thread",
                command.root()
            ),
        }
    }

    fn invoke(
        &self,
        hook: Option<&HostCallback<T>>,
        name: &str,
        confirmation: &str,
        target: &mut T,
        out: &mut String,
    ) -> fmt::Result {
        let Some(hook) = hook else {
            return writeln!(out, "No {name} callback provided");
        };
        hook(target, out);
        info!(target: "live_console::console", callback = name, "host.callback_invoked");
        writeln!(out, "{confirmation}")
    }
}
