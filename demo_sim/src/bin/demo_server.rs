use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::bail;
use color_eyre::Result;
use console_client::logs::{flush_to_stderr, ChannelWriter, LogLines};
use console_client::monitor;
use console_core::{load_console_config_from_env, CommandSchema, Console, ConsoleConfig};
use demo_sim::{build_console, Simulation, SimulationSettings, MAX_SPAWN_BATCH};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Particle simulation with a live console", long_about = None)]
struct Cli {
    /// Serve the console over TCP instead of the terminal.
    #[arg(long)]
    remote: bool,
    /// Listen address in remote mode. Overrides the config file.
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Console config JSON. Defaults to $CONSOLE_CONFIG_PATH, then the builtin config.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Command to run before the first prompt. May be repeated.
    #[arg(long = "run", value_name = "COMMAND")]
    run: Vec<String>,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Particles spawned at startup.
    #[arg(long, default_value_t = 64)]
    particles: usize,
    /// Milliseconds between simulation ticks.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    if cli.particles > MAX_SPAWN_BATCH {
        bail!("--particles must be at most {MAX_SPAWN_BATCH}");
    }

    // A local dashboard owns the terminal, so local mode queues log lines
    // and prints them from the host loop while no dashboard is open.
    let logs = if cli.remote {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
        None
    } else {
        let (make_writer, logs) = ChannelWriter::pair();
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(make_writer)
            .init();
        Some(logs)
    };
    let mut config = match &cli.config {
        Some(path) => ConsoleConfig::from_file(path)?,
        None => load_console_config_from_env().0,
    };
    config.initial_commands.extend(cli.run.iter().cloned());
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    let mut simulation = Simulation::new(SimulationSettings {
        seed: cli.seed,
        particles: cli.particles,
        ..SimulationSettings::default()
    });
    let mut console = build_console(config)?;
    let monitoring = Arc::new(AtomicBool::new(false));
    if let Some(logs) = &logs {
        add_monitor_command(&mut console, Arc::clone(logs), Arc::clone(&monitoring))?;
    }
    let console = Arc::new(console);

    let (server, local) = if cli.remote {
        let server = console.start_server(console.config().bind)?;
        info!(
            target: "live_console::demo",
            addr = %server.local_addr(),
            "demo.ready=remote"
        );
        (Some(server), None)
    } else {
        (None, Some(console.start_local()?))
    };

    let tick = Duration::from_millis(cli.tick_ms);
    loop {
        console.drain(&mut simulation);
        if let Some(logs) = logs.as_ref().filter(|_| !monitoring.load(Ordering::SeqCst)) {
            flush_to_stderr(logs);
        }
        if simulation.is_stopped() {
            info!(target: "live_console::demo", tick = simulation.tick(), "demo.stopped");
            break;
        }
        // The terminal is the only way to reach a local console.
        if local.as_ref().is_some_and(|session| session.is_finished()) {
            info!(target: "live_console::demo", "demo.local_console_closed");
            break;
        }
        if !simulation.is_paused() {
            simulation.step();
        }
        thread::sleep(tick);
    }

    if let Some(server) = server {
        server.shutdown();
    }
    Ok(())
}

/// `monitor` opens the dashboard on this terminal until the user leaves it.
fn add_monitor_command(
    console: &mut Console<Simulation>,
    logs: LogLines,
    monitoring: Arc<AtomicBool>,
) -> Result<()> {
    console.add_local_command(
        CommandSchema::new("monitor").help("Starts the monitoring dashboard."),
        move |console, _, out| {
            monitoring.store(true, Ordering::SeqCst);
            let shown = monitor::run_local(console, Arc::clone(&logs));
            monitoring.store(false, Ordering::SeqCst);
            match shown {
                Ok(()) => Ok(()),
                Err(err) => writeln!(out, "Monitor stopped: {err:#}"),
            }
        },
    )?;
    Ok(())
}
