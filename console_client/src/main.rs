use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use console_client::connection::{normalize_address, RemoteConsole};
use console_client::logs::{flush_to_stderr, ChannelWriter};
use console_client::monitor;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Remote client for the live console", long_about = None)]
struct Cli {
    /// Console address, as `host:port` or just `:port`.
    #[arg(default_value = "localhost:9000")]
    address: String,
    /// Command to send before reading from stdin. May be repeated.
    #[arg(short, long = "run", value_name = "COMMAND")]
    run: Vec<String>,
    /// Line that opens and closes a raw block. Must match the server.
    #[arg(long, default_value = "$")]
    delimiter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (make_writer, logs) = ChannelWriter::pair();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(make_writer)
        .init();

    let cli = Cli::parse();
    let address = normalize_address(&cli.address);
    let (mut console, greeting) = match RemoteConsole::connect(&address).await {
        Ok(connected) => connected,
        Err(err) => {
            println!("Failed to connect: {err:#}");
            return Ok(());
        }
    };
    println!("Connected to live console at {address}.");
    print!("{greeting}");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut startup: VecDeque<String> = cli.run.into();

    loop {
        flush_to_stderr(&logs);
        print!("> ");
        std::io::stdout().flush()?;

        let input = match startup.pop_front() {
            Some(command) => {
                println!("{command}");
                command
            }
            None => match stdin.next_line().await? {
                Some(line) => line,
                None => break,
            },
        };

        if input.trim() == "monitor" {
            if let Err(err) = monitor::run(&mut console, Arc::clone(&logs)).await {
                warn!(error = %err, "monitor.failed");
                println!("Monitor stopped: {err:#}");
            }
            continue;
        }

        let request = if input.trim() == cli.delimiter {
            match read_block(&mut stdin, &cli.delimiter, input).await? {
                Some(block) => block,
                None => {
                    println!("Unexpected end of input during block.");
                    break;
                }
            }
        } else {
            input
        };

        match console.exchange(&request).await {
            Ok(reply) => print!("{reply}"),
            Err(_) => {
                println!("Connection closed.");
                break;
            }
        }
    }

    info!("client.finished");
    flush_to_stderr(&logs);
    Ok(())
}

/// Collect lines up to and including the closing delimiter.
async fn read_block(
    stdin: &mut Lines<BufReader<Stdin>>,
    delimiter: &str,
    opening: String,
) -> Result<Option<String>> {
    let mut lines = vec![opening];
    while let Some(line) = stdin.next_line().await? {
        let closes = line.trim() == delimiter;
        lines.push(line);
        if closes {
            return Ok(Some(lines.join("\n")));
        }
    }
    Ok(None)
}
