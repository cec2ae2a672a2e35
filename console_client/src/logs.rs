//! Log routing for terminal UIs: `tracing` output is collected into whole
//! lines on a channel instead of being written over the screen.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Receiving end shared between the prompt loop and the dashboard.
pub type LogLines = Arc<Mutex<Receiver<String>>>;

/// `tracing_subscriber` writer that forwards complete lines. A partial
/// line is held until a newline arrives or the writer is dropped.
pub struct ChannelWriter {
    sender: Sender<String>,
    pending: String,
}

impl ChannelWriter {
    pub fn new(sender: Sender<String>) -> Self {
        Self {
            sender,
            pending: String::new(),
        }
    }

    /// A writer factory for `with_writer` and the receiver it feeds.
    pub fn pair() -> (impl Fn() -> ChannelWriter + Send + Sync + 'static, LogLines) {
        let (sender, receiver) = mpsc::channel();
        let make = move || ChannelWriter::new(sender.clone());
        (make, Arc::new(Mutex::new(receiver)))
    }

    fn forward_complete_lines(&mut self) {
        while let Some(end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=end).collect();
            let line = line.trim_end_matches(['\r', '\n']);
            if !line.is_empty() {
                let _ = self.sender.send(line.to_string());
            }
        }
    }
}

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));
        self.forward_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        self.forward_complete_lines();
        if !self.pending.is_empty() {
            let _ = self.sender.send(std::mem::take(&mut self.pending));
        }
    }
}

/// Print every queued line to stderr.
pub fn flush_to_stderr(logs: &LogLines) {
    if let Ok(receiver) = logs.lock() {
        while let Ok(line) = receiver.try_recv() {
            eprintln!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_writes_are_joined_into_lines() {
        let (sender, receiver) = mpsc::channel();
        let mut writer = ChannelWriter::new(sender);
        writer.write_all(b"first ha").unwrap();
        assert!(receiver.try_recv().is_err());
        writer.write_all(b"lf\nsecond\r\n\nthi").unwrap();
        assert_eq!(receiver.try_recv().unwrap(), "first half");
        assert_eq!(receiver.try_recv().unwrap(), "second");
        assert!(receiver.try_recv().is_err());

        drop(writer);
        assert_eq!(receiver.try_recv().unwrap(), "thi");
    }

    #[test]
    fn factory_writers_share_one_receiver() {
        let (make, logs) = ChannelWriter::pair();
        make().write_all(b"one\n").unwrap();
        make().write_all(b"two\n").unwrap();
        let receiver = logs.lock().unwrap();
        assert_eq!(receiver.try_recv().unwrap(), "one");
        assert_eq!(receiver.try_recv().unwrap(), "two");
    }
}
