//! essence — an interactive POSIX-flavored command shell.

use essence::cli::{self, Mode};
use essence::shell::Shell;
use essence::state::InputType;
use std::process::ExitCode;

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    match cli::parse_args(&argv) {
        Mode::Help => {
            print!("{}", cli::help_text());
            ExitCode::from(1u8)
        }
        Mode::Version => {
            println!("{}", cli::version_text());
            ExitCode::SUCCESS
        }
        Mode::Command(text) => {
            let mut shell = Shell::new(InputType::Script);
            ExitCode::from(shell.run_c_string(&text) as u8)
        }
        Mode::Script(path, args) => {
            let mut shell = Shell::new(InputType::Script);
            ExitCode::from(shell.run_script_file(&path, args) as u8)
        }
        Mode::Interactive => {
            let mut shell = Shell::new(InputType::Interactive);
            shell.run_startup_file();
            ExitCode::from(shell.run_interactive() as u8)
        }
    }
}
