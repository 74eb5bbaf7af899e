//! Builtin dispatch: a small table of commands the executor runs
//! synchronously, in-process, instead of forking. Only the dispatch
//! contract is in scope (spec.md §1 Non-goals); each builtin's behavior is
//! kept minimal.

use crate::state::ShellContext;

pub trait Builtin {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: &mut ShellContext, argv: &[String]) -> i32;
}

pub struct BuiltinRegistry {
    builtins: Vec<Box<dyn Builtin>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        BuiltinRegistry {
            builtins: vec![
                Box::new(Cd),
                Box::new(Pwd),
                Box::new(Export),
                Box::new(Exit),
                Box::new(Help),
            ],
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn Builtin> {
        self.builtins
            .iter()
            .find(|b| b.name() == name)
            .map(|b| b.as_ref())
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct Cd;

impl Builtin for Cd {
    fn name(&self) -> &'static str {
        "cd"
    }

    /// Unlike the source (which dereferences `argv[1]` even when absent),
    /// this just `chdir`s to the given directory or `$HOME`.
    fn run(&self, ctx: &mut ShellContext, argv: &[String]) -> i32 {
        let target = argv.get(1).cloned().unwrap_or_else(|| ctx.home_dir());
        match std::env::set_current_dir(&target) {
            Ok(()) => {
                if let Ok(cwd) = std::env::current_dir() {
                    ctx.cwd = cwd;
                }
                0
            }
            Err(e) => {
                eprintln!("essence: cd: {}: {}", target, e);
                1
            }
        }
    }
}

struct Pwd;

impl Builtin for Pwd {
    fn name(&self) -> &'static str {
        "pwd"
    }

    fn run(&self, ctx: &mut ShellContext, _argv: &[String]) -> i32 {
        println!("{}", ctx.cwd.display());
        0
    }
}

struct Export;

impl Builtin for Export {
    fn name(&self) -> &'static str {
        "export"
    }

    fn run(&self, _ctx: &mut ShellContext, argv: &[String]) -> i32 {
        let mut status = 0;
        for arg in &argv[1..] {
            match arg.split_once('=') {
                Some((name, value)) => std::env::set_var(name, value),
                None => {
                    eprintln!("essence: export: {}: not a valid identifier assignment", arg);
                    status = 1;
                }
            }
        }
        status
    }
}

struct Exit;

impl Builtin for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn run(&self, ctx: &mut ShellContext, argv: &[String]) -> i32 {
        let code = argv
            .get(1)
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(ctx.last_exit_status);
        ctx.exit_requested = Some(code);
        code
    }
}

struct Help;

impl Builtin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    fn run(&self, _ctx: &mut ShellContext, _argv: &[String]) -> i32 {
        println!("essence builtins: cd [dir], pwd, export NAME=VALUE, exit [code], help");
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InputType;

    #[test]
    fn registry_finds_known_builtins() {
        let reg = BuiltinRegistry::new();
        assert!(reg.lookup("cd").is_some());
        assert!(reg.lookup("pwd").is_some());
        assert!(reg.lookup("nosuchbuiltin").is_none());
    }

    #[test]
    fn exit_sets_exit_requested_and_returns_code() {
        let mut ctx = ShellContext::new(InputType::Script);
        let code = Exit.run(&mut ctx, &["exit".to_string(), "3".to_string()]);
        assert_eq!(code, 3);
        assert_eq!(ctx.exit_requested, Some(3));
    }

    #[test]
    fn exit_with_no_arg_uses_last_exit_status() {
        let mut ctx = ShellContext::new(InputType::Script);
        ctx.last_exit_status = 9;
        let code = Exit.run(&mut ctx, &["exit".to_string()]);
        assert_eq!(code, 9);
    }
}
