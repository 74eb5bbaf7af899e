//! Character-level input buffer shared by the lexer and parser.
//!
//! The buffer is the authoritative source of characters; the lexer is a
//! thin overlay that classifies runs of characters into tokens. The parser
//! also reads straight from the buffer when scanning `$( ... )` command
//! substitutions, bypassing tokenization entirely (see `Lexer::raw_chars`).

use crate::state::{History, PromptMode};

/// End-of-input sentinel byte used by script reads, matching the source's
/// single-byte-then-newline EOF signal so the lexer can emit a clean EOF
/// token on the next pull.
pub const EOF_SENTINEL: char = '\u{4}';

/// Where new lines of input come from once the buffer runs dry.
pub trait LineSource {
    /// Produce the next physical line of input (without trailing newline),
    /// or `None` at true end of input. `mode` tells the source whether this
    /// is a fresh command (PS1) or a continuation (PS2) so an interactive
    /// source can render the right prompt.
    fn read_line(&mut self, mode: PromptMode) -> Option<String>;

    /// Refresh whatever snapshot of shell state a source needs to render
    /// prompts or serve history (cwd, last exit status, the history ring).
    /// No-op for non-interactive sources.
    fn sync(&mut self, _cwd: &std::path::Path, _last_exit_status: i32, _history: &History) {}
}

/// A `LineSource` that serves lines from a fixed in-memory string, used for
/// `essence -c STRING` and for tests.
pub struct StringSource {
    lines: std::vec::IntoIter<String>,
}

impl StringSource {
    pub fn new(text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(|s| s.to_string()).collect();
        StringSource {
            lines: lines.into_iter(),
        }
    }
}

impl LineSource for StringSource {
    fn read_line(&mut self, _mode: PromptMode) -> Option<String> {
        self.lines.next()
    }
}

/// A `LineSource` backed by a buffered reader over a script file.
pub struct ScriptSource<R> {
    reader: std::io::BufReader<R>,
}

impl<R: std::io::Read> ScriptSource<R> {
    pub fn new(reader: R) -> Self {
        ScriptSource {
            reader: std::io::BufReader::new(reader),
        }
    }
}

impl<R: std::io::Read> LineSource for ScriptSource<R> {
    fn read_line(&mut self, _mode: PromptMode) -> Option<String> {
        use std::io::BufRead;
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
            Err(_) => None,
        }
    }
}

/// The growing character buffer that backs the lexer. New lines are pulled
/// from `source` on demand, each one re-terminated with a `\n` so the lexer
/// always sees a NEWLINE token at physical line boundaries.
pub struct InputBuffer {
    chars: Vec<char>,
    pos: usize,
    ungot: Option<char>,
    source: Box<dyn LineSource>,
    at_eof: bool,
}

impl InputBuffer {
    pub fn new(source: Box<dyn LineSource>) -> Self {
        InputBuffer {
            chars: Vec::with_capacity(512),
            pos: 0,
            ungot: None,
            source,
            at_eof: false,
        }
    }

    /// Pull the next line from the source under the given prompt mode,
    /// appending it (plus a trailing newline) to the buffer. Returns false
    /// once the source is exhausted.
    fn pull_line(&mut self, mode: PromptMode) -> bool {
        match self.source.read_line(mode) {
            Some(line) => {
                self.chars.extend(line.chars());
                self.chars.push('\n');
                true
            }
            None => {
                self.at_eof = true;
                false
            }
        }
    }

    /// Read one character, requesting a continuation line (under `mode`)
    /// from the source if the buffer is exhausted. Returns `None` only once
    /// the underlying source is permanently exhausted.
    pub fn next_char(&mut self, mode: PromptMode) -> Option<char> {
        if let Some(c) = self.ungot.take() {
            return Some(c);
        }
        loop {
            if self.pos < self.chars.len() {
                let c = self.chars[self.pos];
                self.pos += 1;
                return Some(c);
            }
            if self.at_eof {
                return None;
            }
            if !self.pull_line(mode) {
                return None;
            }
        }
    }

    /// Push one character back onto the stream. Only one slot is held, the
    /// same deliberate simplification as the lexer's token-level unget.
    pub fn unget_char(&mut self, c: char) {
        self.ungot = Some(c);
    }

    pub fn at_true_eof(&self) -> bool {
        self.at_eof && self.pos >= self.chars.len() && self.ungot.is_none()
    }

    /// Forward a fresh shell-state snapshot to the underlying source, ahead
    /// of pulling the next line. A no-op for sources that don't render
    /// prompts (scripts, `-c` strings).
    pub fn sync_source(&mut self, cwd: &std::path::Path, last_exit_status: i32, history: &History) {
        self.source.sync(cwd, last_exit_status, history);
    }
}
