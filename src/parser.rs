//! Stateful parser/interpreter: consumes tokens from the lexer, performs
//! inline expansion (variables, tilde, command substitution), and assembles
//! `Command` records with pipeline and conditional-chain flags. Handles the
//! `if/then/else/fi` and `while/do/done` block constructs.
//!
//! The character stream is the authoritative input; tokens are a thin
//! overlay over it. Command substitution reads raw characters directly from
//! the `InputBuffer`, bypassing the lexer entirely, exactly as the parser
//! also peeks tokens from the lexer and ungets them.

use crate::command::{strip_trailing_empty, Command, CommandFlags};
use crate::input::InputBuffer;
use crate::lexer::Lexer;
use crate::state::{PromptMode, ShellContext};
use crate::token::{Token, TokenType};
use rand::Rng;
use std::io::Read;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("essence: syntax error near unexpected token {0}")]
    Syntax(String),
    #[error("essence: {0}: {1}")]
    Io(String, std::io::Error),
    #[error("essence: command substitution: {0}")]
    Substitution(#[from] nix::Error),
}

/// Which standard stream a pending redirection targets. Only `Stdout` is
/// ever set by the parser today (`>`); the other variants exist so the data
/// model matches the full set REDIRECT_IN would need once wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FdSlot {
    Stdin,
    Stdout,
    Stderr,
}

/// Which reserved-word terminator ended a `parse_until` scan. Replaces the
/// source's sign-encoded return count: Rust has no need to fold "which
/// terminator matched" into the magnitude of an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    First,
    Second,
}

/// A callback that runs a fully-assembled command list and updates
/// `ctx.last_exit_status` / `ctx.last_signalled` accordingly. `if`/`while`
/// need to execute their condition lists mid-parse to decide which branch to
/// take; injecting the runner this way keeps the parser ignorant of the
/// concrete executor type.
pub type Runner<'a> = dyn FnMut(&mut ShellContext, &[Command]) + 'a;

pub struct Parser {
    lexer: Lexer,
    quoted: bool,
    single_quoted: bool,
    pending_redirect: bool,
    pending_fd: FdSlot,
    buffer: String,
    list: Vec<Command>,
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            lexer: Lexer::new(),
            quoted: false,
            single_quoted: false,
            pending_redirect: false,
            pending_fd: FdSlot::Stdout,
            buffer: String::new(),
            list: vec![Command::new()],
        }
    }

    fn reset(&mut self) {
        self.quoted = false;
        self.single_quoted = false;
        self.pending_redirect = false;
        self.pending_fd = FdSlot::Stdout;
        self.buffer.clear();
        self.list = vec![Command::new()];
    }

    fn current(&mut self) -> &mut Command {
        self.list.last_mut().expect("list always has >= 1 command")
    }

    fn finish_current_arg(&mut self) {
        if !self.buffer.is_empty() {
            let word = std::mem::take(&mut self.buffer);
            self.current().argv.push(word);
        }
    }

    fn push_new_command(&mut self, flags: CommandFlags) {
        let mut cmd = Command::new();
        cmd.flags = flags;
        self.list.push(cmd);
    }

    /// Build one command list from the lines available through `buf`,
    /// handed off to `runner` whenever a block construct needs to execute
    /// its condition or loop body mid-parse.
    pub fn interpret(
        &mut self,
        buf: &mut InputBuffer,
        ctx: &mut ShellContext,
        runner: &mut Runner,
    ) -> Result<Vec<Command>, ParseError> {
        self.reset();
        self.scan(buf, ctx, runner, None)?;
        let mut list = std::mem::replace(&mut self.list, vec![Command::new()]);
        strip_trailing_empty(&mut list);
        Ok(list)
    }

    /// Block entry: read until a STRING token equal to `stop1` (or `stop2`,
    /// if given) appears at a command boundary. Returns the assembled list
    /// plus which terminator matched.
    fn parse_until(
        &mut self,
        buf: &mut InputBuffer,
        ctx: &mut ShellContext,
        runner: &mut Runner,
        stop1: &str,
        stop2: Option<&str>,
    ) -> Result<(Vec<Command>, Terminator), ParseError> {
        let saved = std::mem::replace(&mut self.list, vec![Command::new()]);
        let saved_buf = std::mem::take(&mut self.buffer);
        let term = self.scan(buf, ctx, runner, Some((stop1, stop2)))?;
        let mut list = std::mem::replace(&mut self.list, saved);
        self.buffer = saved_buf;
        strip_trailing_empty(&mut list);
        Ok((list, term.expect("parse_until always finds its terminator or errors")))
    }

    /// The shared per-token loop. `stop_words` is `None` at top level (one
    /// physical line, ending at the first NEWLINE/EOF) or `Some((s1, s2))`
    /// inside a block body (NEWLINE/EOF requests a PS2 continuation line
    /// instead of ending the scan).
    fn scan(
        &mut self,
        buf: &mut InputBuffer,
        ctx: &mut ShellContext,
        runner: &mut Runner,
        stop_words: Option<(&str, Option<&str>)>,
    ) -> Result<Option<Terminator>, ParseError> {
        let mode = if stop_words.is_some() {
            PromptMode::Ps2
        } else {
            PromptMode::Ps1
        };
        loop {
            let tok = self
                .lexer
                .next_token(buf, mode)
                .ok_or_else(|| ParseError::Syntax("EOF".to_string()))?;

            if let Some((stop1, stop2)) = stop_words {
                if !self.quoted
                    && self.buffer.is_empty()
                    && self.current().argc() == 0
                    && !self.pending_redirect
                {
                    if let Some(word) = tok.as_str_value() {
                        if word == stop1 {
                            return Ok(Some(Terminator::First));
                        }
                        if Some(word) == stop2 {
                            return Ok(Some(Terminator::Second));
                        }
                        if word == "if" || word == "while" {
                            self.dispatch_block(buf, ctx, runner, word)?;
                            continue;
                        }
                        if word == "else" {
                            return Err(ParseError::Syntax("else".to_string()));
                        }
                    }
                }
            } else if !self.quoted
                && self.buffer.is_empty()
                && self.current().argc() == 0
                && !self.pending_redirect
            {
                if let Some(word) = tok.as_str_value() {
                    if word == "if" || word == "while" {
                        self.dispatch_block(buf, ctx, runner, word)?;
                        continue;
                    }
                    if word == "else" {
                        return Err(ParseError::Syntax("else".to_string()));
                    }
                }
            }

            let is_eof = matches!(tok.kind, TokenType::Eof);
            match &tok.kind {
                TokenType::Eof | TokenType::Newline => {
                    if self.pending_redirect {
                        if self.buffer.is_empty() {
                            return Err(ParseError::Syntax("newline".to_string()));
                        }
                        self.finalize_redirect(ctx)?;
                    }
                    self.finish_current_arg();
                    if stop_words.is_some() {
                        if is_eof && buf.at_true_eof() {
                            return Err(ParseError::Syntax("EOF".to_string()));
                        }
                        self.push_new_command(CommandFlags::NONE);
                        continue;
                    } else {
                        return Ok(None);
                    }
                }
                TokenType::Space => {
                    if self.pending_redirect {
                        if !self.buffer.is_empty() {
                            self.finalize_redirect(ctx)?;
                        }
                    } else {
                        self.finish_current_arg();
                    }
                }
                TokenType::String(s) => {
                    self.buffer.push_str(s);
                }
                TokenType::DoubleQuote => {
                    if self.single_quoted {
                        self.buffer.push('"');
                    } else {
                        self.quoted = !self.quoted;
                    }
                }
                TokenType::SingleQuote => {
                    if self.quoted && !self.single_quoted {
                        self.buffer.push('\'');
                    } else {
                        self.quoted = !self.quoted;
                        self.single_quoted = !self.single_quoted;
                    }
                }
                TokenType::RedirectOut => {
                    if self.quoted {
                        self.buffer.push('>');
                    } else {
                        self.pending_fd = FdSlot::Stdout;
                        self.pending_redirect = true;
                        self.consume_following_spaces(buf, mode)?;
                    }
                }
                TokenType::RedirectIn => {
                    if self.quoted {
                        self.buffer.push('<');
                    }
                    // Recognized, not wired: a forward-compatible extension point.
                }
                TokenType::Ampersand => {
                    if self.quoted {
                        self.buffer.push('&');
                    }
                    // Background jobs aren't implemented; a lone `&` is a no-op.
                }
                TokenType::Pipe => {
                    self.link_command(CommandFlags::PIPE_FROM_PREV)?;
                }
                TokenType::Or => {
                    self.link_command(CommandFlags::OR)?;
                }
                TokenType::And => {
                    self.link_command(CommandFlags::AND)?;
                }
                TokenType::Semicolon => {
                    self.finish_current_arg();
                    self.push_new_command(CommandFlags::NONE);
                }
                TokenType::Equals => {
                    if !self.quoted && self.current().argc() == 0 && !self.buffer.is_empty() {
                        let name = std::mem::take(&mut self.buffer);
                        let value = self.scan_assignment_value(buf, ctx, mode)?;
                        self.current().extra_env.push(format!("{}={}", name, value));
                    } else {
                        self.buffer.push('=');
                    }
                }
                TokenType::Dollar => {
                    let expanded = self.expand_dollar(buf, ctx, mode)?;
                    self.buffer.push_str(&expanded);
                }
                TokenType::Tilde => {
                    if self.quoted {
                        self.buffer.push('~');
                    } else {
                        self.buffer.push_str(&ctx.home_dir());
                    }
                }
                TokenType::Hashtag => {
                    if self.quoted {
                        self.buffer.push('#');
                    } else {
                        self.drain_comment(buf, mode)?;
                    }
                }
                TokenType::Star => self.buffer.push('*'),
                TokenType::QuestionMark => self.buffer.push('?'),
                TokenType::OpenParen => self.buffer.push('('),
                TokenType::CloseParen => self.buffer.push(')'),
            }
        }
    }

    fn dispatch_block(
        &mut self,
        buf: &mut InputBuffer,
        ctx: &mut ShellContext,
        runner: &mut Runner,
        word: &str,
    ) -> Result<(), ParseError> {
        match word {
            "if" => {
                let (cond, _) = self.parse_until(buf, ctx, runner, "then", None)?;
                let (then_list, term) = self.parse_until(buf, ctx, runner, "else", Some("fi"))?;
                let else_list = if term == Terminator::First {
                    let (e, _) = self.parse_until(buf, ctx, runner, "fi", None)?;
                    Some(e)
                } else {
                    None
                };
                runner(ctx, &cond);
                if ctx.last_exit_status == 0 {
                    runner(ctx, &then_list);
                } else if let Some(else_list) = &else_list {
                    runner(ctx, else_list);
                }
            }
            "while" => {
                let (cond, _) = self.parse_until(buf, ctx, runner, "do", None)?;
                let (body, _) = self.parse_until(buf, ctx, runner, "done", None)?;
                loop {
                    runner(ctx, &cond);
                    if ctx.last_signalled {
                        break;
                    }
                    if ctx.last_exit_status != 0 {
                        break;
                    }
                    runner(ctx, &body);
                    if ctx.last_signalled {
                        break;
                    }
                }
            }
            _ => unreachable!("dispatch_block only called for if/while"),
        }
        Ok(())
    }

    fn link_command(&mut self, flags: CommandFlags) -> Result<(), ParseError> {
        if self.pending_redirect {
            return Err(ParseError::Syntax("|".to_string()));
        }
        self.finish_current_arg();
        if self.current().argc() == 0 {
            return Err(ParseError::Syntax("|".to_string()));
        }
        self.push_new_command(flags);
        Ok(())
    }

    fn consume_following_spaces(
        &mut self,
        buf: &mut InputBuffer,
        mode: PromptMode,
    ) -> Result<(), ParseError> {
        loop {
            let Some(tok) = self.lexer.next_token(buf, mode) else {
                break;
            };
            if tok.kind == TokenType::Space {
                continue;
            }
            self.lexer.unget_token(tok);
            break;
        }
        Ok(())
    }

    fn finalize_redirect(&mut self, ctx: &mut ShellContext) -> Result<(), ParseError> {
        let path = std::mem::take(&mut self.buffer);
        let resolved = if let Some(stripped) = path.strip_prefix('~') {
            format!("{}{}", ctx.home_dir(), stripped)
        } else {
            path
        };
        use std::os::unix::io::IntoRawFd;
        let file = std::fs::File::create(&resolved)
            .map_err(|e| ParseError::Io(resolved.clone(), e))?;
        let fd = file.into_raw_fd();
        match self.pending_fd {
            FdSlot::Stdout => self.current().stdout_fd = Some(fd),
            FdSlot::Stdin => self.current().stdin_fd = Some(fd),
            FdSlot::Stderr => self.current().stderr_fd = Some(fd),
        }
        self.pending_redirect = false;
        Ok(())
    }

    fn drain_comment(&mut self, buf: &mut InputBuffer, mode: PromptMode) -> Result<(), ParseError> {
        loop {
            let Some(tok) = self.lexer.next_token(buf, mode) else {
                break;
            };
            if tok.kind == TokenType::Newline || tok.kind == TokenType::Eof {
                self.lexer.unget_token(tok);
                break;
            }
        }
        Ok(())
    }

    /// Reads a `NAME=VALUE` assignment's value half, stopping at the first
    /// unquoted SPACE/NEWLINE/EOF and ungetting it for the outer loop.
    fn scan_assignment_value(
        &mut self,
        buf: &mut InputBuffer,
        ctx: &mut ShellContext,
        mode: PromptMode,
    ) -> Result<String, ParseError> {
        let mut value = String::new();
        loop {
            let Some(tok) = self.lexer.next_token(buf, mode) else {
                break;
            };
            match &tok.kind {
                TokenType::Space | TokenType::Newline | TokenType::Eof if !self.quoted => {
                    self.lexer.unget_token(tok);
                    break;
                }
                TokenType::String(s) => value.push_str(s),
                TokenType::DoubleQuote => {
                    if self.single_quoted {
                        value.push('"');
                    } else {
                        self.quoted = !self.quoted;
                    }
                }
                TokenType::SingleQuote => {
                    if self.quoted && !self.single_quoted {
                        value.push('\'');
                    } else {
                        self.quoted = !self.quoted;
                        self.single_quoted = !self.single_quoted;
                    }
                }
                TokenType::Dollar => {
                    let expanded = self.expand_dollar(buf, ctx, mode)?;
                    value.push_str(&expanded);
                }
                TokenType::Tilde => {
                    if !self.quoted {
                        value.push_str(&ctx.home_dir());
                    } else {
                        value.push('~');
                    }
                }
                _ if !self.quoted => {
                    // `;`, `|`, `&`, etc. terminate the assignment just like
                    // an unquoted space would; put it back for the outer
                    // statement loop to see.
                    self.lexer.unget_token(tok);
                    break;
                }
                other => {
                    if let Some(ch) = punctuator_char(other) {
                        value.push(ch);
                    }
                }
            }
        }
        self.quoted = false;
        self.single_quoted = false;
        Ok(value)
    }

    /// `$` peek: consumes exactly one more token and expands per spec.md
    /// §4.2 "Variable expansion".
    fn expand_dollar(
        &mut self,
        buf: &mut InputBuffer,
        ctx: &mut ShellContext,
        mode: PromptMode,
    ) -> Result<String, ParseError> {
        let Some(tok) = self.lexer.next_token(buf, mode) else {
            return Ok("$".to_string());
        };
        match &tok.kind {
            TokenType::Dollar => Ok(ctx.shell_pid.to_string()),
            TokenType::Hashtag => Ok(ctx.script_args.len().to_string()),
            TokenType::QuestionMark => Ok(ctx.last_exit_status.to_string()),
            TokenType::OpenParen => self.command_substitution(buf),
            TokenType::String(name) => {
                let trimmed = name.trim_end_matches('\n');
                if trimmed == "RANDOM" {
                    let n: u32 = rand::thread_rng().gen_range(0..i32::MAX as u32);
                    Ok(n.to_string())
                } else {
                    Ok(std::env::var(trimmed).unwrap_or_default())
                }
            }
            _ => {
                self.lexer.unget_token(tok);
                Ok("$".to_string())
            }
        }
    }

    /// Reads raw characters (not tokens) until the matching `)` at depth 1,
    /// then spawns a child `essence -c <text>` and captures its output.
    fn command_substitution(&mut self, buf: &mut InputBuffer) -> Result<String, ParseError> {
        let mut depth = 1i32;
        let mut text = String::new();
        loop {
            match buf.next_char(PromptMode::Ps2) {
                Some('(') => {
                    depth += 1;
                    text.push('(');
                }
                Some(')') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    text.push(')');
                }
                Some(c) => text.push(c),
                None => break,
            }
        }
        run_subshell_capture(&text)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn punctuator_char(kind: &TokenType) -> Option<char> {
    match kind {
        TokenType::RedirectOut => Some('>'),
        TokenType::RedirectIn => Some('<'),
        TokenType::Pipe => Some('|'),
        TokenType::Ampersand => Some('&'),
        TokenType::Semicolon => Some(';'),
        TokenType::Equals => Some('='),
        TokenType::Star => Some('*'),
        TokenType::QuestionMark => Some('?'),
        TokenType::OpenParen => Some('('),
        TokenType::CloseParen => Some(')'),
        _ => None,
    }
}

/// Spawns a child `essence -c <text>`, capturing its first 128 bytes of
/// stdout. A single sentinel byte is written to the pipe before the child
/// execs so a read on genuinely empty output never races an early EOF; one
/// leading byte is then always stripped, along with one trailing newline.
/// This strips the first real byte of any substituted output too — an
/// observed quirk of the original mechanism, preserved rather than "fixed".
fn run_subshell_capture(text: &str) -> Result<String, ParseError> {
    use nix::sys::wait::waitpid;
    use nix::unistd::{close, dup2, fork, pipe, write, ForkResult};
    use std::ffi::CString;
    use std::os::unix::io::AsRawFd;

    let (read_fd, write_fd) = pipe()?;
    match unsafe { fork()? } {
        ForkResult::Child => {
            let _ = dup2(write_fd.as_raw_fd(), 1);
            let _ = close(read_fd.as_raw_fd());
            let _ = write(&write_fd, b"a");
            let exe = std::env::current_exe().unwrap_or_else(|_| "essence".into());
            let prog = CString::new(exe.to_string_lossy().as_bytes()).unwrap();
            let flag = CString::new("-c").unwrap();
            let script = CString::new(text).unwrap_or_else(|_| CString::new("").unwrap());
            let _ = nix::unistd::execv(&prog, &[prog.clone(), flag, script]);
            std::process::exit(127);
        }
        ForkResult::Parent { child } => {
            drop(write_fd);
            let mut out = Vec::with_capacity(128);
            let mut f = unsafe {
                <std::fs::File as std::os::unix::io::FromRawFd>::from_raw_fd(read_fd.as_raw_fd())
            };
            std::mem::forget(read_fd);
            let mut chunk = [0u8; 128];
            if let Ok(n) = f.read(&mut chunk) {
                out.extend_from_slice(&chunk[..n]);
            }
            drop(f);
            let _ = waitpid(child, None);
            if !out.is_empty() {
                out.remove(0);
            }
            if out.last() == Some(&b'\n') {
                out.pop();
            }
            Ok(String::from_utf8_lossy(&out).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputBuffer, StringSource};
    use crate::state::InputType;

    fn parse(line: &str) -> Vec<Command> {
        let mut buf = InputBuffer::new(Box::new(StringSource::new(line)));
        let mut ctx = ShellContext::new(InputType::Script);
        let mut parser = Parser::new();
        let mut runner = |_: &mut ShellContext, _: &[Command]| {};
        parser.interpret(&mut buf, &mut ctx, &mut runner).unwrap()
    }

    #[test]
    fn simple_command_argv() {
        let list = parse("echo hello world");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].argv, vec!["echo", "hello", "world"]);
    }

    #[test]
    fn pipe_builds_two_commands_with_flag() {
        let list = parse("echo hello | tr a-z A-Z");
        assert_eq!(list.len(), 2);
        assert!(list[1].flags.contains(CommandFlags::PIPE_FROM_PREV));
    }

    #[test]
    fn semicolon_starts_independent_command() {
        let list = parse("true; false");
        assert_eq!(list.len(), 2);
        assert!(list[1].flags.is_empty());
    }

    #[test]
    fn and_or_set_flags() {
        let list = parse("false && echo x; true || echo y");
        assert_eq!(list.len(), 4);
        assert!(list[1].flags.contains(CommandFlags::AND));
        assert!(list[3].flags.contains(CommandFlags::OR));
    }

    #[test]
    fn bare_assignment_has_no_argv() {
        let list = parse("A=1");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].argc(), 0);
        assert_eq!(list[0].extra_env, vec!["A=1"]);
    }

    #[test]
    fn double_quotes_protect_spaces() {
        let list = parse("echo \"hello world\"");
        assert_eq!(list[0].argv, vec!["echo", "hello world"]);
    }

    #[test]
    fn single_quotes_suppress_variable_expansion() {
        std::env::set_var("ESSENCE_TEST_VAR", "nope");
        let list = parse("echo '$ESSENCE_TEST_VAR'");
        assert_eq!(list[0].argv, vec!["echo", "$ESSENCE_TEST_VAR"]);
    }

    #[test]
    fn dollar_question_expands_last_exit_status() {
        let mut buf = InputBuffer::new(Box::new(StringSource::new("echo $?")));
        let mut ctx = ShellContext::new(InputType::Script);
        ctx.last_exit_status = 7;
        let mut parser = Parser::new();
        let mut runner = |_: &mut ShellContext, _: &[Command]| {};
        let list = parser.interpret(&mut buf, &mut ctx, &mut runner).unwrap();
        assert_eq!(list[0].argv, vec!["echo", "7"]);
    }

    #[test]
    fn comment_drains_rest_of_line() {
        let list = parse("echo hi # this is a comment");
        assert_eq!(list[0].argv, vec!["echo", "hi"]);
    }
}
