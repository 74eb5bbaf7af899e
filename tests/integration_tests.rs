//! Black-box integration tests for the `essence` binary, driven through
//! `-c STRING` the same way a caller would invoke it from another program.

use assert_cmd::Command;
use predicates::prelude::*;

fn essence() -> Command {
    Command::cargo_bin("essence").unwrap()
}

#[test]
fn pipeline_uppercases_through_tr() {
    essence()
        .args(["-c", "echo hello | tr a-z A-Z"])
        .assert()
        .success()
        .stdout("HELLO\n");
}

#[test]
fn conditional_chain_short_circuits() {
    essence()
        .args(["-c", "false && echo x; true || echo y; echo z"])
        .assert()
        .success()
        .stdout("y\nz\n");
}

#[test]
fn bare_assignments_are_visible_to_later_expansion() {
    essence()
        .args(["-c", "A=1 B=2; echo $A$B"])
        .assert()
        .success()
        .stdout("12\n");
}

#[test]
fn if_then_else_picks_the_then_branch_on_success() {
    essence()
        .args(["-c", "if true; then echo yes; else echo no; fi"])
        .assert()
        .success()
        .stdout("yes\n");
}

#[test]
fn if_then_else_picks_the_else_branch_on_failure() {
    essence()
        .args(["-c", "if false; then echo yes; else echo no; fi"])
        .assert()
        .success()
        .stdout("no\n");
}

#[test]
fn command_not_found_reports_127_and_a_diagnostic() {
    essence()
        .args(["-c", "nosuchcmd"])
        .assert()
        .code(127)
        .stderr(predicate::str::contains("nosuchcmd: command not found"));
}

#[test]
fn redirect_out_writes_to_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out");
    essence()
        .args(["-c", &format!("echo hi > {}", path.display())])
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi\n");
}

#[test]
fn while_loop_runs_until_its_condition_fails() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    essence()
        .args([
            "-c",
            &format!("while test ! -e {m}; do touch {m}; done", m = marker.display()),
        ])
        .timeout(std::time::Duration::from_secs(5))
        .assert()
        .success();
    assert!(marker.exists());
}

#[test]
fn exit_builtin_sets_process_exit_code() {
    essence().args(["-c", "exit 3"]).assert().code(3);
}

#[test]
fn semicolon_sequences_commands_unconditionally() {
    essence()
        .args(["-c", "echo one; echo two"])
        .assert()
        .success()
        .stdout("one\ntwo\n");
}

#[test]
fn double_quotes_preserve_internal_spaces() {
    essence()
        .args(["-c", "echo \"a  b\""])
        .assert()
        .success()
        .stdout("a  b\n");
}

#[test]
fn single_quotes_suppress_variable_expansion() {
    essence()
        .args(["-c", "echo '$HOME'"])
        .assert()
        .success()
        .stdout("$HOME\n");
}

#[test]
fn comment_is_dropped_from_the_line() {
    essence()
        .args(["-c", "echo hi # trailing comment"])
        .assert()
        .success()
        .stdout("hi\n");
}

#[test]
fn question_mark_expands_to_last_exit_status() {
    essence()
        .args(["-c", "false; echo $?"])
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn dollar_dollar_expands_to_a_pid() {
    essence()
        .args(["-c", "echo $$"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\d+\n$").unwrap());
}

#[test]
fn tilde_expands_to_home() {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    essence()
        .args(["-c", "echo ~"])
        .env("HOME", &home)
        .assert()
        .success()
        .stdout(format!("{}\n", home));
}

#[test]
fn help_flag_exits_1_and_mentions_usage() {
    essence()
        .arg("--help")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("USAGE"));
}

#[test]
fn version_flag_prints_a_version_line() {
    essence()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("essence"));
}

#[test]
fn script_file_runs_and_sees_trailing_args_via_arg_count() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.sh");
    std::fs::write(&script, "echo $#\n").unwrap();
    essence()
        .arg(script.to_str().unwrap())
        .arg("a")
        .arg("b")
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn unopenable_script_reports_127() {
    essence().arg("/no/such/script").assert().code(127);
}

#[test]
fn empty_statement_leaves_exit_status_unchanged() {
    essence()
        .args(["-c", "true; ; echo $?"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn pipeline_of_three_stages_runs_end_to_end() {
    essence()
        .args(["-c", "printf 'b\\na\\nc\\n' | sort | head -1"])
        .assert()
        .success()
        .stdout("a\n");
}

#[test]
fn command_substitution_interpolates_child_output() {
    essence()
        .args(["-c", "echo before-$(echo mid)-after"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mid"));
}
