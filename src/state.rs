//! Shared shell context: the single mutable value threaded through the
//! parser, executor, and line editor. Consolidates what the original
//! design left as free globals (`last_exit_status`, `last_signalled`,
//! `input_type`, `prompt_mode`, history) into one struct so tests can
//! instantiate isolated contexts, per spec.md §9.

use std::collections::VecDeque;

/// Whether input is being read from a terminal or a script file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Interactive,
    Script,
}

/// Which prompt string governs the next line read: `PS1` for a fresh
/// command, `PS2` while continuing a multi-line construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Ps1,
    Ps2,
}

/// Bounded ring of past non-empty lines with adjacent-duplicate
/// suppression, per spec.md §3 "Shared state".
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append `line` unless it is empty or equal to the most recent entry.
    pub fn push(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if self.entries.back().map(|s| s.as_str()) == Some(line) {
            return;
        }
        if self.capacity > 0 && self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry `cursor` steps back from the most recent (`cursor == 1` is the
    /// last line pushed). Returns `None` once `cursor` runs past the start.
    pub fn nth_from_end(&self, cursor: usize) -> Option<&str> {
        if cursor == 0 || cursor > self.entries.len() {
            return None;
        }
        let idx = self.entries.len() - cursor;
        self.entries.get(idx).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &String> {
        self.entries.iter()
    }
}

/// `$HOME`, falling back to `/root/` per spec.md §4.2 TILDE handling. Shared
/// by `ShellContext::home_dir` and anything (the line editor) that needs it
/// without a full context.
pub fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| "/root/".to_string())
}

/// Every piece of mutable state shared across the shell's subsystems.
pub struct ShellContext {
    pub last_exit_status: i32,
    pub last_signalled: bool,
    pub shell_pid: i32,
    pub input_type: InputType,
    pub prompt_mode: PromptMode,
    pub history: History,
    pub cwd: std::path::PathBuf,
    /// Positional args ($0, $1, ...) visible to `$#`/script argv.
    pub script_args: Vec<String>,
    /// Set by the `exit` builtin; checked by the REPL/script driver after
    /// every command list to unwind out of nested `if`/`while` execution.
    pub exit_requested: Option<i32>,
}

impl ShellContext {
    pub fn new(input_type: InputType) -> Self {
        let shell_pid = std::process::id() as i32;
        let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("/"));
        ShellContext {
            last_exit_status: 0,
            last_signalled: false,
            shell_pid,
            input_type,
            prompt_mode: PromptMode::Ps1,
            history: History::new(2000),
            cwd,
            script_args: Vec::new(),
            exit_requested: None,
        }
    }

    /// `$HOME`, falling back to `/root/` per spec.md §4.2 TILDE handling.
    pub fn home_dir(&self) -> String {
        home_dir()
    }

    pub fn ps1(&self) -> String {
        std::env::var("PS1").unwrap_or_else(|_| "essence-fallback# ".to_string())
    }

    pub fn ps2(&self) -> String {
        std::env::var("PS2").unwrap_or_else(|_| "> ".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_suppresses_adjacent_duplicates() {
        let mut h = History::new(10);
        h.push("ls");
        h.push("ls");
        h.push("pwd");
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn history_ignores_empty_lines() {
        let mut h = History::new(10);
        h.push("");
        assert_eq!(h.len(), 0);
    }

    #[test]
    fn history_nth_from_end() {
        let mut h = History::new(10);
        h.push("a");
        h.push("b");
        h.push("c");
        assert_eq!(h.nth_from_end(1), Some("c"));
        assert_eq!(h.nth_from_end(3), Some("a"));
        assert_eq!(h.nth_from_end(4), None);
    }

    #[test]
    fn history_respects_capacity() {
        let mut h = History::new(2);
        h.push("a");
        h.push("b");
        h.push("c");
        assert_eq!(h.len(), 2);
        assert_eq!(h.nth_from_end(2), Some("b"));
    }
}
