//! Startup-file and history-file path resolution under `$HOME`.

use crate::state::ShellContext;

/// `$HOME/.esrc`, sourced once on entering interactive mode.
pub fn esrc_path(ctx: &ShellContext) -> std::path::PathBuf {
    std::path::Path::new(&ctx.home_dir()).join(".esrc")
}

/// `$HOME/.history`, opened for read at startup. Writeback is a no-op; see
/// spec.md §9.
pub fn history_path(ctx: &ShellContext) -> std::path::PathBuf {
    std::path::Path::new(&ctx.home_dir()).join(".history")
}

/// Load past lines from the history file into `ctx.history`, if the file
/// exists. Silent on any read failure — a missing history file is normal on
/// first run.
pub fn load_history(ctx: &mut ShellContext) {
    let path = history_path(ctx);
    if let Ok(content) = std::fs::read_to_string(&path) {
        for line in content.lines() {
            ctx.history.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InputType;

    #[test]
    fn esrc_path_is_under_home() {
        let ctx = ShellContext::new(InputType::Script);
        assert!(esrc_path(&ctx).ends_with(".esrc"));
    }
}
