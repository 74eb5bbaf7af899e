//! PS1/PS2 prompt expansion (`parse_PS`): walks a prompt string and expands
//! backslash escapes against the shell's live state, grounded in the same
//! `chrono` + `hostname` pair the source uses to build its own prompt
//! context.

use crate::state::{PromptMode, ShellContext};
use std::path::Path;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The raw `PS1`/`PS2` template for the given mode, read fresh from the
/// environment so a script that exports `PS1` mid-run takes effect on the
/// next prompt.
pub fn template(mode: PromptMode) -> String {
    match mode {
        PromptMode::Ps1 => std::env::var("PS1").unwrap_or_else(|_| "essence-fallback# ".to_string()),
        PromptMode::Ps2 => std::env::var("PS2").unwrap_or_else(|_| "> ".to_string()),
    }
}

/// Expand `prompt` per spec.md §4.4's escape table. A bare trailing `\` is
/// emitted literally.
pub fn expand(prompt: &str, ctx: &ShellContext) -> String {
    expand_raw(prompt, &ctx.cwd, ctx.last_exit_status)
}

/// Same expansion, driven by a cwd/exit-status snapshot instead of a live
/// `ShellContext` — used by the line editor, which only ever sees a
/// snapshot synced in from the shell between commands.
pub fn expand_raw(prompt: &str, cwd: &Path, last_exit_status: i32) -> String {
    let mut out = String::with_capacity(prompt.len());
    let mut chars = prompt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(code) => out.push_str(&expand_escape(code, cwd, last_exit_status)),
            None => out.push('\\'),
        }
    }
    out
}

fn expand_escape(code: char, cwd: &Path, last_exit_status: i32) -> String {
    match code {
        'd' => chrono::Local::now().format("%a %B %d").to_string(),
        'h' => hostname_short(),
        'H' => hostname_full(),
        'j' => "0".to_string(),
        's' => "essence".to_string(),
        't' => chrono::Local::now().format("%H:%M:%S").to_string(),
        'T' => chrono::Local::now().format("%I:%M:%S").to_string(),
        '@' => chrono::Local::now().format("%I:%M %p").to_string(),
        'u' => effective_username(),
        '$' => {
            if effective_uid() == 0 {
                "#".to_string()
            } else {
                "$".to_string()
            }
        }
        'W' => cwd_basename(cwd),
        'v' | 'V' => VERSION.to_string(),
        'e' => '\u{1b}'.to_string(),
        '+' => {
            if last_exit_status != 0 {
                crate::terminal::csi::RED.to_string()
            } else {
                crate::terminal::csi::GREEN.to_string()
            }
        }
        other => other.to_string(),
    }
}

fn hostname_full() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn hostname_short() -> String {
    hostname_full()
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn effective_username() -> String {
    std::env::var("USER").unwrap_or_else(|_| "user".to_string())
}

fn effective_uid() -> u32 {
    nix::unistd::geteuid().as_raw()
}

fn cwd_basename(cwd: &Path) -> String {
    if cwd == Path::new("/") {
        return "/".to_string();
    }
    cwd.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InputType;

    #[test]
    fn literal_characters_pass_through() {
        let ctx = ShellContext::new(InputType::Script);
        assert_eq!(expand("essence> ", &ctx), "essence> ");
    }

    #[test]
    fn s_escape_expands_to_shell_name() {
        let ctx = ShellContext::new(InputType::Script);
        assert_eq!(expand("\\s$ ", &ctx), "essence$ ");
    }

    #[test]
    fn trailing_backslash_is_literal() {
        let ctx = ShellContext::new(InputType::Script);
        assert_eq!(expand("abc\\", &ctx), "abc\\");
    }

    #[test]
    fn dollar_escape_reflects_euid() {
        let ctx = ShellContext::new(InputType::Script);
        let expected = if effective_uid() == 0 { "#" } else { "$" };
        assert_eq!(expand("\\$", &ctx), expected);
    }

    #[test]
    fn w_escape_uses_root_for_root_cwd() {
        let mut ctx = ShellContext::new(InputType::Script);
        ctx.cwd = std::path::PathBuf::from("/");
        assert_eq!(expand("\\W", &ctx), "/");
    }
}
