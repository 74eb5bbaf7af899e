//! Command executor: fork/exec, builtins, `PATH` search, fd redirection,
//! pipelines, conditional chaining, and foreground process-group/terminal
//! control.

use crate::builtins::BuiltinRegistry;
use crate::command::{Command, CommandFlags};
use crate::signals;
use crate::state::ShellContext;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{
    close, dup2, execvp, fork, pipe, setpgid, tcgetpgrp, tcsetpgrp, ForkResult, Pid,
};
use std::ffi::CString;
use std::os::unix::io::{AsRawFd, BorrowedFd, RawFd};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("essence: {0}")]
    System(#[from] nix::Error),
}

pub struct Executor {
    builtins: BuiltinRegistry,
    /// The shell's own process group, used to reclaim the terminal after a
    /// foreground wait. `None` when stdin isn't a controlling terminal
    /// (script mode, `-c`, tests).
    shell_pgid: Option<Pid>,
}

impl Executor {
    pub fn new() -> Self {
        let shell_pgid = tcgetpgrp(unsafe { BorrowedFd::borrow_raw(0) }).ok();
        Executor {
            builtins: BuiltinRegistry::new(),
            shell_pgid,
        }
    }

    /// Run one command list, honoring conditional chains and pipeline spans.
    /// Updates `ctx.last_exit_status`/`ctx.last_signalled` as it goes.
    pub fn run(&mut self, ctx: &mut ShellContext, list: &[Command]) {
        let mut i = 0;
        while i < list.len() {
            let cmd = &list[i];
            if i > 0 && cmd.flags.contains(CommandFlags::OR) && ctx.last_exit_status == 0 {
                i += 1;
                continue;
            }
            if i > 0 && cmd.flags.contains(CommandFlags::AND) && ctx.last_exit_status != 0 {
                i += 1;
                continue;
            }

            let mut end = i + 1;
            while end < list.len() && list[end].flags.contains(CommandFlags::PIPE_FROM_PREV) {
                end += 1;
            }

            if end - i > 1 {
                self.run_pipeline(ctx, &list[i..end]);
            } else {
                self.run_one(ctx, cmd);
            }

            if ctx.last_signalled && end - i > 1 {
                break;
            }
            i = end;
        }
    }

    /// Run a single command: env-only assignment, builtin, or fork/exec.
    fn run_one(&mut self, ctx: &mut ShellContext, cmd: &Command) {
        if cmd.argc() == 0 {
            if !cmd.extra_env.is_empty() {
                apply_extra_env(&cmd.extra_env);
            }
            return;
        }

        if let Some(builtin) = self.builtins.lookup(&cmd.argv[0]) {
            ctx.last_signalled = false;
            ctx.last_exit_status = builtin.run(ctx, &cmd.argv);
            return;
        }

        match self.spawn_foreground(cmd, None, None) {
            Ok(status) => self.apply_wait_status(ctx, status),
            Err(e) => {
                eprintln!("essence: {}", e);
                ctx.last_exit_status = 1;
            }
        }
    }

    /// Run a pipeline span: allocate `n-1` pipes, fork every stage left to
    /// right before waiting on any of them, then close the parent's view of
    /// every pipe fd and wait on each child in turn. Forking all stages up
    /// front (instead of fork-then-wait per stage) is what lets an early
    /// stage block on a full pipe without deadlocking — the next reader
    /// isn't forked yet in a fork-wait loop, so it would never arrive to
    /// drain the pipe.
    fn run_pipeline(&mut self, ctx: &mut ShellContext, span: &[Command]) {
        let n = span.len();
        let mut read_ends: Vec<RawFd> = Vec::with_capacity(n - 1);
        let mut write_ends: Vec<RawFd> = Vec::with_capacity(n - 1);
        for _ in 0..n - 1 {
            match pipe() {
                Ok((r, w)) => {
                    read_ends.push(r.as_raw_fd());
                    write_ends.push(w.as_raw_fd());
                    std::mem::forget(r);
                    std::mem::forget(w);
                }
                Err(e) => {
                    eprintln!("essence: pipe: {}", e);
                    ctx.last_exit_status = 1;
                    return;
                }
            }
        }

        let mut pgid: Option<Pid> = None;
        let mut children: Vec<Pid> = Vec::with_capacity(n);
        for (k, cmd) in span.iter().enumerate() {
            let stdin_override = if k > 0 { Some(read_ends[k - 1]) } else { None };
            let stdout_override = if k < n - 1 { Some(write_ends[k]) } else { None };

            match self.spawn_pipeline_stage(cmd, stdin_override, stdout_override, &read_ends, &write_ends, pgid) {
                Ok(child) => {
                    if pgid.is_none() {
                        pgid = Some(child);
                    }
                    children.push(child);
                }
                Err(e) => {
                    eprintln!("essence: {}", e);
                    ctx.last_exit_status = 1;
                }
            }
        }

        for fd in read_ends.iter().chain(write_ends.iter()) {
            let _ = close(*fd);
        }

        if let Some(pgid) = pgid {
            self.reclaim_foreground(pgid);
        }

        let mut last_status: Option<WaitStatus> = None;
        for (k, child) in children.iter().enumerate() {
            match wait_for(*child) {
                Ok(status) => {
                    if k == children.len() - 1 {
                        last_status = Some(status);
                    }
                    if matches!(status, WaitStatus::Signaled(..)) {
                        ctx.last_signalled = true;
                    }
                }
                Err(e) => eprintln!("essence: {}", e),
            }
        }

        if let Some(status) = last_status {
            self.apply_wait_status(ctx, status);
        }
    }

    /// Spawn one pipeline stage: fork, wire the given pipe ends (and any
    /// explicit redirections) onto stdin/stdout, close the parent's view of
    /// every pipe fd, and return immediately without waiting — the caller
    /// forks every stage before waiting on any of them.
    fn spawn_pipeline_stage(
        &mut self,
        cmd: &Command,
        stdin_override: Option<RawFd>,
        stdout_override: Option<RawFd>,
        read_ends: &[RawFd],
        write_ends: &[RawFd],
        existing_pgid: Option<Pid>,
    ) -> Result<Pid, ExecError> {
        // Builtins never run mid-pipeline without a real process to hold the
        // pipe ends; every stage here always forks and execs.
        match unsafe { fork()? } {
            ForkResult::Child => {
                let pid = nix::unistd::getpid();
                let _ = setpgid(Pid::from_raw(0), existing_pgid.unwrap_or(pid));
                let _ = signals::restore_default_job_control_signals();
                apply_extra_env(&cmd.extra_env);

                for fd in read_ends.iter().chain(write_ends.iter()) {
                    let _ = close(*fd);
                }
                if let Some(fd) = stdin_override.or(cmd.stdin_fd) {
                    let _ = dup2(fd, 0);
                }
                if let Some(fd) = stdout_override.or(cmd.stdout_fd) {
                    let _ = dup2(fd, 1);
                }
                if let Some(fd) = cmd.stderr_fd {
                    let _ = dup2(fd, 2);
                }

                exec_or_die(cmd);
            }
            ForkResult::Parent { child } => {
                let _ = setpgid(child, existing_pgid.unwrap_or(child));
                Ok(child)
            }
        }
    }

    /// Spawn and wait for a single non-pipelined command in the foreground,
    /// transferring terminal control to its process group for the duration.
    fn spawn_foreground(
        &mut self,
        cmd: &Command,
        stdin_override: Option<RawFd>,
        stdout_override: Option<RawFd>,
    ) -> Result<WaitStatus, ExecError> {
        match unsafe { fork()? } {
            ForkResult::Child => {
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
                let _ = signals::restore_default_job_control_signals();
                apply_extra_env(&cmd.extra_env);
                if let Some(fd) = stdin_override.or(cmd.stdin_fd) {
                    let _ = dup2(fd, 0);
                }
                if let Some(fd) = stdout_override.or(cmd.stdout_fd) {
                    let _ = dup2(fd, 1);
                }
                if let Some(fd) = cmd.stderr_fd {
                    let _ = dup2(fd, 2);
                }
                exec_or_die(cmd);
            }
            ForkResult::Parent { child } => {
                let _ = setpgid(child, child);
                self.reclaim_foreground(child);
                let status = wait_for(child)?;
                if let Some(shell_pgid) = self.shell_pgid {
                    let _ = signals::with_sigttou_ignored(|| {
                        let _ = tcsetpgrp(unsafe { BorrowedFd::borrow_raw(0) }, shell_pgid);
                    });
                }
                Ok(status)
            }
        }
    }

    fn reclaim_foreground(&self, pgid: Pid) {
        if self.shell_pgid.is_some() {
            let _ = signals::with_sigttou_ignored(|| {
                let _ = tcsetpgrp(unsafe { BorrowedFd::borrow_raw(0) }, pgid);
            });
        }
    }

    fn apply_wait_status(&self, ctx: &mut ShellContext, status: WaitStatus) {
        if let Some(shell_pgid) = self.shell_pgid {
            let _ = signals::with_sigttou_ignored(|| {
                let _ = tcsetpgrp(unsafe { BorrowedFd::borrow_raw(0) }, shell_pgid);
            });
        }
        match status {
            WaitStatus::Exited(_, code) => {
                ctx.last_exit_status = code;
                ctx.last_signalled = false;
            }
            WaitStatus::Signaled(_, sig, _) => {
                eprintln!("essence: terminated by signal {}", signals::signal_name(sig));
                ctx.last_exit_status = 128 + sig as i32;
                ctx.last_signalled = true;
            }
            _ => {}
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

fn wait_for(child: Pid) -> Result<WaitStatus, ExecError> {
    loop {
        match waitpid(child, None) {
            Ok(status) => return Ok(status),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ExecError::System(e)),
        }
    }
}

fn apply_extra_env(extra_env: &[String]) {
    for entry in extra_env {
        if let Some((name, value)) = entry.split_once('=') {
            std::env::set_var(name, value);
        }
    }
}

/// Runs in the forked child only: exec the program via `PATH` search,
/// printing a diagnostic and exiting with the code the source uses to
/// distinguish "not found" from "exec failed for another reason".
fn exec_or_die(cmd: &Command) -> ! {
    let argv: Vec<CString> = cmd
        .argv
        .iter()
        .map(|s| CString::new(s.as_str()).unwrap_or_else(|_| CString::new("").unwrap()))
        .collect();
    let prog = argv[0].clone();
    match execvp(&prog, &argv) {
        Ok(_) => unreachable!("execvp only returns on error"),
        Err(Errno::ENOENT) => {
            eprintln!("essence: {}: command not found", cmd.argv[0]);
            std::process::exit(127);
        }
        Err(_) => {
            eprintln!("essence: {}: exec failed", cmd.argv[0]);
            std::process::exit(126);
        }
    }
}
