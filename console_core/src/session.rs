use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::console::Console;
use crate::inspect::Inspect;

/// Line the remote transport sends whenever it is ready for input.
pub const PROMPT_MARKER: &str = ">";

/// What a session should do after handling one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    Continue,
    /// `exit`: end this session only.
    Exit,
    /// `stop`: the host was asked to terminate; end this session.
    Stop,
}

/// Why a session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Exit,
    Stop,
    /// End of input, or the peer went away in the middle of a raw block.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// `"> "` without a newline, for terminals.
    Inline,
    /// A `">"` line, for the wire protocol.
    Line,
}

/// One interactive client: reads inputs, runs them through the console and
/// writes the results followed by a prompt.
pub struct Session<T, R, W> {
    console: Arc<Console<T>>,
    reader: R,
    writer: W,
    prompt: Prompt,
}

impl<T, R, W> Session<T, R, W>
where
    T: Inspect + 'static,
    R: BufRead,
    W: Write,
{
    pub fn new(console: Arc<Console<T>>, reader: R, writer: W, prompt: Prompt) -> Self {
        Self {
            console,
            reader,
            writer,
            prompt,
        }
    }

    pub fn run(mut self) -> io::Result<SessionEnd> {
        loop {
            self.write_prompt()?;
            let Some(input) = self.read_input()? else {
                return Ok(SessionEnd::Closed);
            };
            if input.trim().is_empty() {
                continue;
            }

            let mut out = String::new();
            let flow = self.console.handle_line(&input, &mut out);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            self.writer.write_all(out.as_bytes())?;
            self.writer.flush()?;

            match flow {
                SessionFlow::Continue => {}
                SessionFlow::Exit => return Ok(SessionEnd::Exit),
                SessionFlow::Stop => return Ok(SessionEnd::Stop),
            }
        }
    }

    fn write_prompt(&mut self) -> io::Result<()> {
        match self.prompt {
            Prompt::Inline => write!(self.writer, "{PROMPT_MARKER} ")?,
            Prompt::Line => writeln!(self.writer, "{PROMPT_MARKER}")?,
        }
        self.writer.flush()
    }

    /// One line, or a whole raw block when the line is the block delimiter.
    /// `None` on end of input, including end of input inside a block.
    fn read_input(&mut self) -> io::Result<Option<String>> {
        let Some(line) = self.read_line()? else {
            return Ok(None);
        };
        let console = Arc::clone(&self.console);
        let delimiter = console.config().block_delimiter.as_str();
        if line.trim() != delimiter {
            return Ok(Some(line));
        }

        let mut block = vec![line];
        loop {
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            let closes = line.trim() == delimiter;
            block.push(line);
            if closes {
                return Ok(Some(block.join("\n")));
            }
        }
    }

    /// Bytes that are not valid UTF-8 are replaced rather than ending the
    /// session, so the parser reports them like any other bad input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut raw = Vec::new();
        if self.reader.read_until(b'\n', &mut raw)? == 0 {
            return Ok(None);
        }
        let mut line = String::from_utf8_lossy(&raw).into_owned();
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}
