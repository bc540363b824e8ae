//! Python-style traceback capture and rendering.
//!
//! Frames are recorded outermost first, the order Python prints them in:
//!
//! ```text
//! Traceback (most recent call last):
//!   File "<string>", line 4, in <module>
//!     print(divide(1, 0))
//!   File "<string>", line 2, in divide
//!     return a / b
//! ZeroDivisionError: division by zero
//! ```

use std::fmt::Write as _;

/// One entry of a traceback.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    /// `<module>` for top-level code, otherwise the function name.
    pub function: String,
    /// 1-based line number in the submitted snippet.
    pub line: usize,
    /// The stripped source line, when it is available.
    pub text: Option<String>,
}

/// Identical consecutive frames printed before collapsing the rest.
const REPEAT_CUTOFF: usize = 3;

fn flush_repeats(out: &mut String, repeats: usize) {
    if repeats >= REPEAT_CUTOFF {
        let hidden = repeats + 1 - REPEAT_CUTOFF;
        let _ = writeln!(
            out,
            "  [Previous line repeated {} more time{}]",
            hidden,
            if hidden == 1 { "" } else { "s" }
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Traceback {
    pub frames: Vec<TraceFrame>,
}

impl Traceback {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Render the full trace, ending with the exception summary line.
    pub fn render(&self, filename: &str, summary: &str) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        let mut repeats = 0;
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 && self.frames[i - 1] == *frame {
                repeats += 1;
            } else {
                flush_repeats(&mut out, repeats);
                repeats = 0;
            }
            if repeats >= REPEAT_CUTOFF {
                continue;
            }
            let _ = writeln!(
                out,
                "  File \"{}\", line {}, in {}",
                filename, frame.line, frame.function
            );
            if let Some(text) = &frame.text {
                let _ = writeln!(out, "    {}", text);
            }
        }
        flush_repeats(&mut out, repeats);
        out.push_str(summary);
        out
    }
}

/// A snippet's text together with its line table.
///
/// Parser ranges are byte offsets; tracebacks and syntax errors need
/// 1-based line numbers and the text of those lines.
#[derive(Debug)]
pub struct SourceCode {
    text: String,
    line_starts: Vec<usize>,
}

impl SourceCode {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { text, line_starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Find the 1-based line holding a byte offset.
    ///
    /// Offsets past the end of the source clamp to the last line.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(index) => index + 1,
            Err(index) => index.max(1),
        }
    }

    /// Get the stripped text of a 1-based line, if it has any content.
    pub fn line_text(&self, line: usize) -> Option<String> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.text.len());
        let text = self.text.get(start..end)?.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Build the frame for a position in this source.
    pub fn frame(&self, function: &str, line: usize) -> TraceFrame {
        TraceFrame {
            function: function.to_string(),
            line,
            text: self.line_text(line),
        }
    }
}
