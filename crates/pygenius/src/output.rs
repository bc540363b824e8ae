//! Output capture: sinks standing in for stdout/stderr and the ordered
//! record stream delivered to observers.

use std::fmt;

use crate::value::Stream;

/// How a caller should render a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OutputKind {
    Output,
    Error,
    Progress,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Output => "output",
            OutputKind::Error => "error",
            OutputKind::Progress => "progress",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged unit of text produced during an execution. Never blank.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputRecord {
    pub text: String,
    pub kind: OutputKind,
}

impl OutputRecord {
    pub fn new(text: impl Into<String>, kind: OutputKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Callback receiving each record as it is produced.
pub type Observer<'o> = &'o mut dyn FnMut(&OutputRecord);

/// Buffers everything written to one stream.
///
/// Blank writes stay in the buffer so [`getvalue`](Self::getvalue)
/// reconstructs the stream exactly, but only non-blank writes are
/// forwarded.
#[derive(Debug, Default)]
pub struct OutputSink {
    chunks: Vec<String>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `text`, returning the record to forward if it is not blank.
    pub fn write(&mut self, text: &str) -> Option<OutputRecord> {
        self.chunks.push(text.to_string());
        if text.trim().is_empty() {
            None
        } else {
            Some(OutputRecord::new(text, OutputKind::Output))
        }
    }

    /// Concatenation of every write, in order.
    pub fn getvalue(&self) -> String {
        self.chunks.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|chunk| chunk.is_empty())
    }
}

/// The pair of sinks for one execution plus the ordered record log.
pub struct Streams<'o> {
    pub stdout: OutputSink,
    pub stderr: OutputSink,
    records: Vec<OutputRecord>,
    observer: Option<Observer<'o>>,
}

impl<'o> Streams<'o> {
    pub fn new(observer: Option<Observer<'o>>) -> Self {
        Self {
            stdout: OutputSink::new(),
            stderr: OutputSink::new(),
            records: Vec::new(),
            observer,
        }
    }

    /// Write program output to one of the two sinks.
    pub fn write(&mut self, stream: Stream, text: &str) {
        let sink = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };
        if let Some(record) = sink.write(text) {
            self.push(record);
        }
    }

    /// Emit an engine-generated record (progress or error).
    pub fn emit(&mut self, text: impl Into<String>, kind: OutputKind) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.push(OutputRecord::new(text, kind));
    }

    fn push(&mut self, record: OutputRecord) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&record);
        }
        self.records.push(record);
    }

    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<OutputRecord> {
        self.records
    }
}
