//! Command-line argument parsing and the `--help`/`--version` text. Parsed
//! by hand rather than through an argument-parsing crate: essence's surface
//! is `essence [-c STRING | FILE [ARGS...]] | --help | --version`, small
//! enough that a dependency would buy nothing.

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, PartialEq, Eq)]
pub enum Mode {
    /// No file or `-c` argument: read and execute lines interactively.
    Interactive,
    /// `-c STRING`: execute the joined remainder as one program.
    Command(String),
    /// A bare path: run it as a script, with the rest of argv as `$1...`.
    Script(String, Vec<String>),
    Help,
    Version,
}

/// Parse `argv` (including the program name at index 0).
pub fn parse_args(argv: &[String]) -> Mode {
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--help" | "-h" => return Mode::Help,
            "--version" | "-v" => return Mode::Version,
            "-c" => {
                let rest = &argv[i + 1..];
                return Mode::Command(rest.join(" "));
            }
            path => {
                let args = argv[i + 1..].to_vec();
                return Mode::Script(path.to_string(), args);
            }
        }
    }
    Mode::Interactive
}

pub fn help_text() -> String {
    format!(
        r#"essence {}
An interactive POSIX-flavored command shell.

USAGE:
    essence                  Start the interactive REPL
    essence -c STRING        Execute STRING as a single program
    essence FILE [ARGS...]   Execute FILE as a script, with ARGS as $1...
    essence --help, -h       Show this help message
    essence --version, -v    Show version

STARTUP:
    ~/.esrc                  Sourced once when starting interactively
    ~/.history                Loaded into the in-memory history ring

SYNTAX:
    cmd arg arg               Run a command with arguments
    a | b                     Pipe a's stdout into b's stdin
    a && b                    Run b only if a exits 0
    a || b                    Run b only if a exits nonzero
    a ; b                     Run a, then b, unconditionally
    cmd > file                Redirect stdout to file (truncating)
    VAR=value                 Set an environment variable
    $VAR, $?, $$, $#          Variable, last exit status, pid, arg count
    $(cmd)                    Command substitution
    ~/path                    Tilde expansion to $HOME
    # comment                 Rest of the line is ignored
    if c; then t; else e; fi  Conditional
    while c; do b; done       Loop while c exits 0

BUILTINS:
    cd [dir]                  Change directory ($HOME if omitted)
    pwd                        Print the working directory
    export VAR=value           Set and mark an environment variable
    exit [code]                Exit, defaulting to the last exit status
    help                        Show this help message
"#,
        VERSION
    )
}

pub fn version_text() -> String {
    format!("essence {}", VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_args_is_interactive() {
        assert_eq!(parse_args(&argv(&["essence"])), Mode::Interactive);
    }

    #[test]
    fn dash_c_joins_remaining_args() {
        let mode = parse_args(&argv(&["essence", "-c", "echo", "hi"]));
        assert_eq!(mode, Mode::Command("echo hi".to_string()));
    }

    #[test]
    fn bare_path_is_a_script_with_trailing_args() {
        let mode = parse_args(&argv(&["essence", "script.sh", "a", "b"]));
        assert_eq!(
            mode,
            Mode::Script("script.sh".to_string(), vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn help_flag_short_circuits() {
        assert_eq!(parse_args(&argv(&["essence", "--help"])), Mode::Help);
        assert_eq!(parse_args(&argv(&["essence", "-h"])), Mode::Help);
    }

    #[test]
    fn version_flag_short_circuits() {
        assert_eq!(parse_args(&argv(&["essence", "--version"])), Mode::Version);
        assert_eq!(parse_args(&argv(&["essence", "-v"])), Mode::Version);
    }
}
