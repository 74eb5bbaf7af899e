//! Interactive raw-mode line editor: cursor motion, history navigation, and
//! filename/command autocompletion. Plugs into the parser as a `LineSource`
//! via `InteractiveSource`, which keeps the cwd/exit-status/history snapshot
//! it needs for prompt rendering and recall in sync with the shell.

use crate::input::LineSource;
use crate::state::{self, History, PromptMode};
use crate::terminal::{csi, RawModeGuard};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const INITIAL_CAPACITY: usize = 512;

pub struct LineEditor {
    raw_mode: Option<RawModeGuard>,
    verase: u8,
}

impl LineEditor {
    /// Enable raw mode on stdin for the process lifetime. A restoration
    /// guard is dropped (and the terminal restored) when the editor is
    /// dropped, so this should be constructed once per interactive session.
    pub fn new() -> std::io::Result<Self> {
        let guard = RawModeGuard::enable(0)?;
        let verase = guard.verase();
        crate::terminal::disable_stdout_buffering();
        Ok(LineEditor {
            raw_mode: Some(guard),
            verase,
        })
    }

    /// Without a controlling terminal (tests, piped stdin): an editor with
    /// no raw-mode guard, used only to exercise the buffer/completion logic.
    pub fn without_raw_mode() -> Self {
        LineEditor {
            raw_mode: None,
            verase: 0x7f,
        }
    }

    /// Read one line interactively, rendering `prompt` first. Returns
    /// `None` at EOF (Ctrl-D on an empty line).
    pub fn read_line(&mut self, history: &mut History, prompt: &str) -> Option<String> {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", prompt);
        let _ = stdout.flush();

        let mut line: Vec<char> = Vec::with_capacity(INITIAL_CAPACITY);
        let mut cursor = 0usize;
        let mut history_cursor = 0usize;
        let mut saved_live_line: Option<Vec<char>> = None;
        let mut last_tab = false;
        let mut stdin = std::io::stdin();
        let mut byte = [0u8; 1];

        loop {
            if stdin.read_exact(&mut byte).is_err() {
                return if line.is_empty() { None } else { Some(line.into_iter().collect()) };
            }
            let b = byte[0];

            if b == 0x1b {
                let mut seq = [0u8; 2];
                if stdin.read_exact(&mut seq).is_err() || seq[0] != b'[' {
                    continue;
                }
                match seq[1] {
                    b'D' => {
                        if cursor > 0 {
                            let _ = write!(stdout, "\x08");
                            cursor -= 1;
                        } else {
                            let _ = write!(stdout, "\x07");
                        }
                    }
                    b'C' => {
                        if cursor < line.len() {
                            let _ = write!(stdout, "{}", line[cursor]);
                            cursor += 1;
                        }
                    }
                    b'A' => {
                        if history.is_empty() {
                            let _ = stdout.flush();
                            continue;
                        }
                        if history_cursor == 0 {
                            saved_live_line = Some(line.clone());
                        }
                        history_cursor += 1;
                        if let Some(entry) = history.nth_from_end(history_cursor) {
                            line = entry.chars().collect();
                            cursor = line.len();
                            redraw(&mut stdout, prompt, &line, &mut cursor, cursor);
                        } else {
                            history_cursor -= 1;
                        }
                    }
                    b'B' => {
                        if history_cursor == 0 {
                            let _ = stdout.flush();
                            continue;
                        }
                        history_cursor -= 1;
                        if history_cursor == 0 {
                            line = saved_live_line.take().unwrap_or_default();
                        } else if let Some(entry) = history.nth_from_end(history_cursor) {
                            line = entry.chars().collect();
                        }
                        cursor = line.len();
                        redraw(&mut stdout, prompt, &line, &mut cursor, cursor);
                    }
                    _ => {}
                }
                let _ = stdout.flush();
                last_tab = false;
                continue;
            }

            if b == self.verase {
                if cursor > 0 {
                    line.remove(cursor - 1);
                    cursor -= 1;
                    redraw(&mut stdout, prompt, &line, &mut cursor, cursor);
                    let _ = write!(stdout, " \x08");
                }
                let _ = stdout.flush();
                last_tab = false;
                continue;
            }

            if b == b'\n' || b == b'\r' {
                let _ = write!(stdout, "\r\n");
                let _ = stdout.flush();
                let text: String = line.into_iter().collect();
                if !text.is_empty() {
                    history.push(&text);
                }
                return Some(text);
            }

            if b == b'\t' {
                let (current_tok_start, candidates) = self.complete(&line, cursor);
                if candidates.len() == 1 {
                    let suffix = &candidates[0][cursor - current_tok_start..];
                    for c in suffix.chars() {
                        line.insert(cursor, c);
                        cursor += 1;
                    }
                    if !candidates[0].ends_with('/') {
                        line.insert(cursor, ' ');
                        cursor += 1;
                    }
                    redraw(&mut stdout, prompt, &line, &mut cursor, cursor);
                } else if candidates.len() > 1 {
                    if last_tab {
                        let _ = write!(stdout, "\r\n{}\r\n", candidates.join("  "));
                        redraw(&mut stdout, prompt, &line, &mut cursor, cursor);
                        last_tab = false;
                    } else {
                        last_tab = true;
                    }
                }
                let _ = stdout.flush();
                continue;
            }

            last_tab = false;
            if (0x20..0x7f).contains(&b) {
                line.insert(cursor, b as char);
                cursor += 1;
                let tail: String = line[cursor - 1..].iter().collect();
                let _ = write!(stdout, "{}", tail);
                for _ in cursor..line.len() {
                    let _ = write!(stdout, "\x08");
                }
                let _ = stdout.flush();
            }
        }
    }

    /// Filename/command completion for the token under `cursor`. Returns
    /// the token's start offset and the list of full-token candidates
    /// (i.e. already including the typed prefix).
    fn complete(&self, line: &[char], cursor: usize) -> (usize, Vec<String>) {
        let start = line[..cursor]
            .iter()
            .rposition(|&c| c == ' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        let raw_token: String = line[start..cursor].iter().collect();
        let is_first_token = line[..start].iter().all(|c| c.is_whitespace());

        let expanded_token = if let Some(rest) = raw_token.strip_prefix('~') {
            format!("{}{}", state::home_dir(), rest)
        } else {
            raw_token.clone()
        };

        let (dir, prefix) = match expanded_token.rfind('/') {
            Some(i) => (expanded_token[..=i].to_string(), expanded_token[i + 1..].to_string()),
            None => (".".to_string(), expanded_token.clone()),
        };

        let mut candidates: Vec<String> = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || !name.starts_with(&prefix) {
                    continue;
                }
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                let full = if dir == "." {
                    name
                } else {
                    format!("{}{}", dir, name)
                };
                candidates.push(if is_dir { format!("{}/", full) } else { full });
            }
        }

        if is_first_token && !raw_token.contains('/') {
            if let Ok(path_var) = std::env::var("PATH") {
                for path_dir in path_var.split(':') {
                    if let Ok(entries) = std::fs::read_dir(path_dir) {
                        for entry in entries.flatten() {
                            let name = entry.file_name().to_string_lossy().into_owned();
                            if !name.starts_with(&prefix) {
                                continue;
                            }
                            if is_executable(&entry) {
                                candidates.push(name);
                            }
                        }
                    }
                }
            }
        }

        candidates.sort();
        candidates.dedup();
        (start, candidates)
    }
}

fn is_executable(entry: &std::fs::DirEntry) -> bool {
    use std::os::unix::fs::PermissionsExt;
    entry
        .metadata()
        .map(|m| m.permissions().mode() & 0o100 != 0)
        .unwrap_or(false)
}

/// Redraw the current line over its row: column reset, prompt, contents,
/// then enough trailing spaces to erase a longer previous render.
fn redraw(
    stdout: &mut std::io::Stdout,
    prompt: &str,
    line: &[char],
    cursor: &mut usize,
    target_cursor: usize,
) {
    let text: String = line.iter().collect();
    let _ = write!(stdout, "{}{}{}", csi::COLUMN_RESET, prompt, text);
    let _ = write!(stdout, "{}", " ".repeat(8));
    let back = line.len() + 8 - target_cursor;
    for _ in 0..back {
        let _ = write!(stdout, "\x08");
    }
    *cursor = target_cursor;
}

/// A `LineSource` that reads from the terminal through a `LineEditor`. Owns
/// its own snapshot of cwd/exit-status/history, refreshed by the shell via
/// `sync` before each top-level read so prompts and recall reflect the
/// latest command's outcome without the parser depending on `ShellContext`.
pub struct InteractiveSource {
    editor: LineEditor,
    history: History,
    cwd: PathBuf,
    last_exit_status: i32,
}

impl InteractiveSource {
    pub fn new(editor: LineEditor) -> Self {
        InteractiveSource {
            editor,
            history: History::new(2000),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            last_exit_status: 0,
        }
    }
}

impl LineSource for InteractiveSource {
    fn read_line(&mut self, mode: PromptMode) -> Option<String> {
        let prompt = crate::prompt::expand_raw(&crate::prompt::template(mode), &self.cwd, self.last_exit_status);
        self.editor.read_line(&mut self.history, &prompt)
    }

    fn sync(&mut self, cwd: &Path, last_exit_status: i32, history: &History) {
        self.cwd = cwd.to_path_buf();
        self.last_exit_status = last_exit_status;
        self.history = history.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_finds_dotfile_free_matches_in_cwd() {
        let tmp = std::env::temp_dir().join("essence_editor_test");
        let _ = std::fs::create_dir_all(&tmp);
        std::fs::write(tmp.join("alpha.txt"), b"").unwrap();
        std::fs::write(tmp.join(".hidden"), b"").unwrap();

        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(&tmp).unwrap();

        let editor = LineEditor::without_raw_mode();
        let line: Vec<char> = "alp".chars().collect();
        let (start, candidates) = editor.complete(&line, line.len());

        std::env::set_current_dir(cwd).unwrap();
        let _ = std::fs::remove_dir_all(&tmp);

        assert_eq!(start, 0);
        assert_eq!(candidates, vec!["alpha.txt".to_string()]);
    }
}
