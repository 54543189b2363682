//! Forwarding of the guest's standard output and error.
//!
//! Writes to descriptors 1 and 2 never reach the store. Their bytes are collected per stream and
//! handed to a [`Sink`] one complete line at a time.

use std::fmt;

use tracing::{info, warn};

/// One of the guest's output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Receives complete lines written by the guest, without the trailing newline.
pub trait Sink {
    fn line(&mut self, stream: Stream, line: &str);
}

/// The default sink: stdout lines are logged at info level, stderr lines at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn line(&mut self, stream: Stream, line: &str) {
        match stream {
            Stream::Stdout => info!(target: "guest", "{line}"),
            Stream::Stderr => warn!(target: "guest", "{line}"),
        }
    }
}

impl<F> Sink for F
where
    F: FnMut(Stream, &str),
{
    fn line(&mut self, stream: Stream, line: &str) {
        self(stream, line);
    }
}

/// Accumulates raw bytes until a newline completes a line.
///
/// Decoding happens per complete line, so a multi-byte character split across two writes is
/// still decoded correctly.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes`, calling `f` for every line they complete.
    pub fn push<F>(&mut self, bytes: &[u8], mut f: F)
    where
        F: FnMut(&str),
    {
        self.pending.extend_from_slice(bytes);
        let mut start = 0;
        while let Some(pos) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            f(String::from_utf8_lossy(&self.pending[start..end]).as_ref());
            start = end + 1;
        }
        self.pending.drain(..start);
    }

    /// Emit whatever is left as a final, unterminated line.
    pub fn flush<F>(&mut self, mut f: F)
    where
        F: FnMut(&str),
    {
        if self.pending.is_empty() {
            return;
        }
        f(String::from_utf8_lossy(&self.pending).as_ref());
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The pair of output streams and the sink they drain into.
pub struct Stdio {
    stdout: LineBuffer,
    stderr: LineBuffer,
    sink: Box<dyn Sink>,
}

impl Stdio {
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self {
            stdout: LineBuffer::new(),
            stderr: LineBuffer::new(),
            sink,
        }
    }

    pub fn write(&mut self, stream: Stream, bytes: &[u8]) {
        let sink = &mut self.sink;
        let buffer = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };
        buffer.push(bytes, |line| sink.line(stream, line));
    }

    pub fn flush(&mut self) {
        let sink = &mut self.sink;
        self.stdout.flush(|line| sink.line(Stream::Stdout, line));
        self.stderr.flush(|line| sink.line(Stream::Stderr, line));
    }
}

impl Default for Stdio {
    fn default() -> Self {
        Self::new(Box::new(TracingSink))
    }
}

impl fmt::Debug for Stdio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stdio")
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lines_are_split_on_newline() {
        let mut buf = LineBuffer::new();
        let mut lines = vec![];
        buf.push(b"hello\nwor", |line| lines.push(line.to_owned()));
        assert_eq!(vec!["hello"], lines);
        buf.push(b"ld\n\nrest", |line| lines.push(line.to_owned()));
        assert_eq!(vec!["hello", "world", ""], lines);
        assert!(!buf.is_empty());
        buf.flush(|line| lines.push(line.to_owned()));
        assert_eq!(vec!["hello", "world", "", "rest"], lines);
        assert!(buf.is_empty());
    }

    #[test]
    fn multibyte_split_across_writes() {
        let mut buf = LineBuffer::new();
        let mut lines = vec![];
        let bytes = "héllo\n".as_bytes();
        buf.push(&bytes[..2], |line| lines.push(line.to_owned()));
        buf.push(&bytes[2..], |line| lines.push(line.to_owned()));
        assert_eq!(vec!["héllo"], lines);
    }

    #[test]
    fn streams_are_buffered_separately() {
        let lines = Rc::new(RefCell::new(vec![]));
        let captured = Rc::clone(&lines);
        let mut stdio = Stdio::new(Box::new(move |stream: Stream, line: &str| {
            captured.borrow_mut().push(format!("{stream}: {line}"));
        }));
        stdio.write(Stream::Stdout, b"out ");
        stdio.write(Stream::Stderr, b"err\n");
        stdio.write(Stream::Stdout, b"line\n");
        stdio.write(Stream::Stdout, b"tail");
        stdio.flush();
        assert_eq!(
            vec!["stderr: err", "stdout: out line", "stdout: tail"],
            *lines.borrow()
        );
    }
}
