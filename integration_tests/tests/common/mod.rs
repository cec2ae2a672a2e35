#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use console_core::{load_console_config_from_env, Console, ConsoleConfig, ServerHandle, StatsReport};
use demo_sim::{build_console, Simulation, SimulationSettings, WorldStats};

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_console_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test console config at {}",
            config_path.display()
        );

        std::env::set_var("CONSOLE_CONFIG_PATH", &config_path);
    });
}

pub fn test_config() -> ConsoleConfig {
    ensure_test_config();
    let (config, path) = load_console_config_from_env();
    assert!(path.is_some(), "test config should come from the fixture");
    config
}

/// Console served over TCP with commands running on a background consumer.
pub fn start_background(config: ConsoleConfig) -> Result<(Arc<Console<Simulation>>, ServerHandle)> {
    let console = Arc::new(build_console(config)?);
    console.spawn_background(Simulation::new(SimulationSettings::default()))?;
    let server = console.start_server(console.config().bind)?;
    Ok((console, server))
}

/// Console served over TCP while a host loop steps the simulation and
/// drains commands between steps, until `stop`.
pub fn start_cooperative(config: ConsoleConfig) -> Result<(ServerHandle, JoinHandle<Simulation>)> {
    let console = Arc::new(build_console(config)?);
    let server = console.start_server(console.config().bind)?;
    let host = thread::spawn(move || {
        let mut simulation = Simulation::new(SimulationSettings::default());
        loop {
            console.drain(&mut simulation);
            if simulation.is_stopped() {
                return simulation;
            }
            if !simulation.is_paused() {
                simulation.step();
            }
            thread::sleep(Duration::from_millis(2));
        }
    });
    Ok((server, host))
}

/// Line-protocol client: every reply ends with a `>` line.
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    pub fn connect(addr: SocketAddr) -> Result<(Self, String)> {
        let stream = TcpStream::connect(addr).context("connect to console")?;
        stream.set_read_timeout(Some(Duration::from_secs(10)))?;
        let mut client = Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
        };
        let greeting = client.read_reply()?;
        Ok((client, greeting))
    }

    pub fn send(&mut self, input: &str) -> Result<String> {
        writeln!(self.writer, "{input}")?;
        self.writer.flush()?;
        self.read_reply()
    }

    /// Send raw bytes as one line, whether or not they are valid UTF-8.
    pub fn send_bytes(&mut self, input: &[u8]) -> Result<String> {
        self.writer.write_all(input)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.read_reply()
    }

    /// Send a command that ends the session and return everything the
    /// server wrote before closing.
    pub fn send_last(mut self, input: &str) -> Result<String> {
        writeln!(self.writer, "{input}")?;
        self.writer.flush()?;
        let mut rest = String::new();
        self.reader.read_to_string(&mut rest)?;
        Ok(rest)
    }

    pub fn stats(&mut self) -> Result<StatsReport<WorldStats>> {
        let reply = self.send("stats-json")?;
        serde_json::from_str(reply.trim()).with_context(|| format!("stats-json reply: {reply}"))
    }

    fn read_reply(&mut self) -> Result<String> {
        let mut text = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(anyhow!("connection closed after {text:?}"));
            }
            if line.trim_end() == ">" {
                return Ok(text);
            }
            text.push_str(&line);
        }
    }
}
