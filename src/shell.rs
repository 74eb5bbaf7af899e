//! The unified shell: owns the parser, executor, and shared context, and
//! orchestrates the three of them across a line, a `-c` string, or a
//! script file.

use crate::executor::Executor;
use crate::input::{InputBuffer, ScriptSource, StringSource};
use crate::parser::{ParseError, Parser};
use crate::state::{InputType, ShellContext};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("essence: {0}: {1}")]
    Open(String, io::Error),
}

pub struct Shell {
    pub ctx: ShellContext,
    parser: Parser,
    executor: Executor,
}

impl Shell {
    pub fn new(input_type: InputType) -> Self {
        Shell {
            ctx: ShellContext::new(input_type),
            parser: Parser::new(),
            executor: Executor::new(),
        }
    }

    /// Parse and run every command list available from `buf` until input is
    /// exhausted or `exit` is invoked. Returns the final `last_exit_status`.
    pub fn drive(&mut self, mut buf: InputBuffer) -> i32 {
        loop {
            if buf.at_true_eof() {
                break;
            }
            buf.sync_source(&self.ctx.cwd, self.ctx.last_exit_status, &self.ctx.history);
            let executor = &mut self.executor;
            let mut runner = move |ctx: &mut ShellContext, list: &[crate::command::Command]| {
                executor.run(ctx, list);
            };
            match self.parser.interpret(&mut buf, &mut self.ctx, &mut runner) {
                Ok(list) => {
                    if !list.is_empty() {
                        self.ctx.history.push(&render_for_history(&list));
                        self.executor.run(&mut self.ctx, &list);
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
            if let Some(code) = self.ctx.exit_requested {
                return code;
            }
        }
        self.ctx.last_exit_status
    }

    /// Drive the REPL from a raw-mode terminal. Falls back to a plain
    /// script-style read over stdin if the terminal can't be put into raw
    /// mode (stdin isn't a tty — piped input, a test harness).
    pub fn run_interactive(&mut self) -> i32 {
        let _ = crate::signals::ignore_job_control_signals();
        match crate::editor::LineEditor::new() {
            Ok(editor) => {
                let source = crate::editor::InteractiveSource::new(editor);
                self.drive(InputBuffer::new(Box::new(source)))
            }
            Err(_) => {
                let buf = InputBuffer::new(Box::new(ScriptSource::new(std::io::stdin())));
                self.drive(buf)
            }
        }
    }

    /// Run a single `-c STRING` program, then return its exit status.
    pub fn run_c_string(&mut self, text: &str) -> i32 {
        let buf = InputBuffer::new(Box::new(StringSource::new(text)));
        self.drive(buf)
    }

    /// Run a script file; positional args after the filename become
    /// `ctx.script_args`. Reports 127 and proceeds if the file can't be
    /// opened (matches the source's "open for read fails silently" startup
    /// file behavior).
    pub fn run_script_file(&mut self, path: &str, args: Vec<String>) -> i32 {
        self.ctx.script_args = args;
        match std::fs::File::open(path) {
            Ok(file) => {
                let buf = InputBuffer::new(Box::new(ScriptSource::new(file)));
                self.drive(buf)
            }
            Err(e) => {
                eprintln!("essence: {}: {}", path, e);
                127
            }
        }
    }

    /// Source `$HOME/.esrc` if present, ignoring a missing file, then load
    /// `$HOME/.history` into the in-memory ring.
    pub fn run_startup_file(&mut self) {
        crate::rcfile::load_history(&mut self.ctx);
        let path = crate::rcfile::esrc_path(&self.ctx);
        if path.exists() {
            self.run_script_file(&path.to_string_lossy(), Vec::new());
        }
    }
}

/// Best-effort reconstruction of the line for the history ring: joins argv
/// (prefixed by any `NAME=VALUE` assignments) per command, separated by the
/// connecting operator between commands.
fn render_for_history(list: &[crate::command::Command]) -> String {
    use crate::command::CommandFlags;
    let mut out = String::new();
    for (i, cmd) in list.iter().enumerate() {
        if i > 0 {
            let sep = if cmd.flags.contains(CommandFlags::OR) {
                " || "
            } else if cmd.flags.contains(CommandFlags::AND) {
                " && "
            } else if cmd.flags.contains(CommandFlags::PIPE_FROM_PREV) {
                " | "
            } else {
                "; "
            };
            out.push_str(sep);
        }
        let mut parts: Vec<&str> = cmd.extra_env.iter().map(|s| s.as_str()).collect();
        parts.extend(cmd.argv.iter().map(|s| s.as_str()));
        out.push_str(&parts.join(" "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_c_string_returns_exit_status() {
        let mut shell = Shell::new(InputType::Script);
        let code = shell.run_c_string("exit 3");
        assert_eq!(code, 3);
    }

    #[test]
    fn run_c_string_executes_true_false() {
        let mut shell = Shell::new(InputType::Script);
        let code = shell.run_c_string("false");
        assert_eq!(code, 1);
    }
}
