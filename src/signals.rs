//! Signal discipline for interactive job control.
//!
//! The shell ignores the interactive-job signals for its own lifetime so
//! Ctrl-C/Ctrl-Z at the prompt never kill it; children restore default
//! disposition for the same set before exec, matching the split described in
//! spec.md §4.3.

use nix::sys::signal::{signal, SigHandler, Signal};

const INTERACTIVE_JOB_SIGNALS: [Signal; 5] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

/// Install `SIG_IGN` for INT/QUIT/TSTP/TTIN/TTOU. Called once, on entering
/// interactive operation.
pub fn ignore_job_control_signals() -> nix::Result<()> {
    for sig in INTERACTIVE_JOB_SIGNALS {
        unsafe {
            signal(sig, SigHandler::SigIgn)?;
        }
    }
    Ok(())
}

/// Restore `SIG_DFL` for INT/QUIT/TSTP/TTIN/TTOU. Called in a forked child,
/// after `setpgid` and before `exec`.
pub fn restore_default_job_control_signals() -> nix::Result<()> {
    for sig in INTERACTIVE_JOB_SIGNALS {
        unsafe {
            signal(sig, SigHandler::SigDfl)?;
        }
    }
    Ok(())
}

/// Temporarily ignore SIGTTOU for the duration of `f`. Reclaiming the
/// terminal foreground via `tcsetpgrp` from a background process group
/// raises SIGTTOU; the shell is backgrounded relative to itself during that
/// instant, so the signal must be masked around the call.
pub fn with_sigttou_ignored<T>(f: impl FnOnce() -> T) -> nix::Result<T> {
    let prev = unsafe { signal(Signal::SIGTTOU, SigHandler::SigIgn)? };
    let result = f();
    unsafe {
        signal(Signal::SIGTTOU, prev)?;
    }
    Ok(result)
}

/// Human-readable name for a signal, used in "terminated by signal" and
/// `kill`-family diagnostics.
pub fn signal_name(sig: Signal) -> &'static str {
    sig.as_str()
}
