use color_eyre::eyre::{eyre, Result, WrapErr};
use console_core::{StatsReport, PROMPT_MARKER};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Statistics as reported by the hidden `stats-json` command. The stats
/// payload depends on the inspected target.
pub type RemoteStats = StatsReport<serde_json::Value>;

/// One remote console session. Every request is answered by the text the
/// server prints before its next prompt line.
pub struct RemoteConsole {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RemoteConsole {
    /// Connect and consume the greeting. Returns the greeting text.
    pub async fn connect(address: &str) -> Result<(Self, String)> {
        let stream = TcpStream::connect(address)
            .await
            .wrap_err_with(|| format!("failed to connect to {address}"))?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        let mut console = Self {
            reader: BufReader::new(read),
            writer: write,
        };
        let greeting = console.read_until_prompt().await?;
        debug!(%address, "console.connected");
        Ok((console, greeting))
    }

    /// Send one line, or a whole raw block, and wait for the reply.
    pub async fn exchange(&mut self, input: &str) -> Result<String> {
        self.writer.write_all(input.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        trace!(input, "console.sent");
        self.read_until_prompt().await
    }

    pub async fn stats(&mut self) -> Result<RemoteStats> {
        let reply = self.exchange("stats-json").await?;
        serde_json::from_str(reply.trim())
            .wrap_err_with(|| format!("unexpected stats-json reply: {}", reply.trim()))
    }

    async fn read_until_prompt(&mut self) -> Result<String> {
        let mut text = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(eyre!("connection closed"));
            }
            if line.trim() == PROMPT_MARKER {
                return Ok(text);
            }
            text.push_str(&line);
        }
    }
}

/// Accept `:port` as shorthand for `localhost:port`.
pub fn normalize_address(input: &str) -> String {
    if input.starts_with(':') {
        format!("localhost{input}")
    } else {
        input.to_string()
    }
}
