use std::fmt;

use crate::parser::block_body;

/// A raw multi-line block as typed by the client, delimiters included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBlock<'a> {
    text: &'a str,
    delimiter: &'a str,
}

impl<'a> RawBlock<'a> {
    pub fn new(text: &'a str, delimiter: &'a str) -> Self {
        Self { text, delimiter }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Every line of the block, including both delimiter lines.
    pub fn lines(&self) -> Vec<&'a str> {
        self.text.lines().collect()
    }

    /// Lines between the delimiters.
    pub fn body(&self) -> Vec<&'a str> {
        block_body(self.text, self.delimiter)
    }
}

/// Consumer of raw blocks. Runs on the scheduler's consumer thread with
/// exclusive access to the target; any sandboxing is the handler's business.
pub trait ScriptHandler<T>: Send + Sync {
    fn run(&self, block: RawBlock<'_>, target: &mut T, out: &mut String) -> fmt::Result;
}

impl<T, F> ScriptHandler<T> for F
where
    F: Fn(RawBlock<'_>, &mut T, &mut String) -> fmt::Result + Send + Sync,
{
    fn run(&self, block: RawBlock<'_>, target: &mut T, out: &mut String) -> fmt::Result {
        self(block, target, out)
    }
}
