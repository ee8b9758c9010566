//! End-to-end evaluation tests: programs run through a [`Shell`] whose
//! stdout and stderr go to temporary files.

use std::fs::File;
use std::io::Write;

use mshell_kernel::error::ErrorKind;
use mshell_kernel::value::{List, Value};
use mshell_kernel::{EvalResult, Shell, ShellConfig, ShellError};
use rstest::rstest;
use tempfile::NamedTempFile;

struct Run {
    result: Result<EvalResult, ShellError>,
    stdout: String,
    stderr: String,
    stack: Vec<Value>,
}

fn run_with(config: ShellConfig, stdin: Option<&str>, source: &str) -> Run {
    let out = NamedTempFile::new().expect("stdout file");
    let err = NamedTempFile::new().expect("stderr file");
    let mut shell = Shell::new(config)
        .with_stdout(out.reopen().expect("reopen stdout"))
        .with_stderr(err.reopen().expect("reopen stderr"));

    let input = stdin.map(|text| {
        let mut file = NamedTempFile::new().expect("stdin file");
        file.write_all(text.as_bytes()).expect("write stdin");
        file
    });
    if let Some(input) = &input {
        shell = shell.with_stdin(File::open(input.path()).expect("open stdin"));
    }

    let result = shell.run_source(source);
    Run {
        result,
        stdout: std::fs::read_to_string(out.path()).expect("read stdout"),
        stderr: std::fs::read_to_string(err.path()).expect("read stderr"),
        stack: shell.stack().as_slice().to_vec(),
    }
}

fn run(source: &str) -> Run {
    run_with(ShellConfig::default(), None, source)
}

fn runtime_error(run: Run) -> mshell_kernel::RuntimeError {
    match run.result {
        Err(ShellError::Runtime(err)) => err,
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

fn strings(items: &[&str]) -> Value {
    Value::List(List::of_strings(items.iter().copied()))
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn arithmetic_to_stdout() {
    let run = run("3 4 + str wl");
    assert!(run.result.expect("success").success);
    assert_eq!(run.stdout, "7\n");
}

#[test]
fn external_command_shares_stdout() {
    let run = run("\"before\" wl [echo hello] ; \"after\" wl");
    run.result.expect("success");
    assert_eq!(run.stdout, "before\nhello\nafter\n");
}

#[test]
fn pipeline_capture_lines() {
    let run = run(r#"[[printf "a\nb\nc"] [grep b]] | o ;"#);
    run.result.expect("success");
    assert_eq!(run.stack, vec![strings(&["b"])]);
}

#[rstest]
#[case::first_arm(1, "small\n")]
#[case::second_arm(5, "medium\n")]
#[case::else_arm(50, "large\n")]
fn if_chain(#[case] n: i64, #[case] expected: &str) {
    let source = format!(
        "{n} n! [(@n 3 <) (\"small\" wl) (@n 10 <) (\"medium\" wl) (\"large\" wl)] if"
    );
    let run = run(&source);
    run.result.expect("success");
    assert_eq!(run.stdout, expected);
    assert!(run.stack.is_empty());
}

#[test]
fn counting_loop() {
    let run = run("0 ([(dup 5 >=) (break)] if dup str wl 1 +) loop drop");
    run.result.expect("success");
    assert_eq!(run.stdout, "0\n1\n2\n3\n4\n");
    assert!(run.stack.is_empty());
}

#[test]
fn environment_lookup() {
    let Ok(home) = std::env::var("HOME") else {
        return;
    };
    let run = run("@HOME wl");
    run.result.expect("success");
    assert_eq!(run.stdout, format!("{home}\n"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn list_length() {
    let run = run("[a b c] len 3 =");
    assert_eq!(run.stack, vec![Value::Bool(true)]);
}

#[test]
fn pure_programs_are_deterministic() {
    let source = "[3 1 2] dup len swap 0 nth + \"x\" 2.5 str + 10 3 / 7 -2 mod";
    let first = run(source);
    let second = run(source);
    first.result.expect("success");
    assert_eq!(first.stack, second.stack);
    assert_eq!(
        first.stack,
        vec![
            Value::Int(6),
            Value::String("x2.5".into()),
            Value::Int(3),
            Value::Int(-1),
        ]
    );
}

#[test]
fn read_on_empty_stream() {
    let run = run_with(ShellConfig::default(), Some(""), "read");
    run.result.expect("success");
    assert_eq!(run.stack, vec![Value::String(String::new()), Value::Bool(false)]);
}

#[test]
fn read_lines_then_slurp_the_rest() {
    let run = run_with(ShellConfig::default(), Some("one\ntwo\nthree\n"), "read drop stdin");
    run.result.expect("success");
    assert_eq!(
        run.stack,
        vec![Value::String("one".into()), Value::String("two\nthree\n".into())]
    );
}

#[test]
fn children_continue_where_read_stopped() {
    let run = run_with(ShellConfig::default(), Some("first\nsecond\n"), "read drop wl [cat] ;");
    run.result.expect("success");
    assert_eq!(run.stdout, "first\nsecond\n");
}

#[test]
fn unbounded_loop_hits_the_cap() {
    let run = run_with(ShellConfig::default().with_max_loop_iterations(50), None, "(1 drop) loop");
    let err = runtime_error(run);
    assert!(matches!(err.kind, ErrorKind::LoopLimitExceeded(50)));
    assert_eq!((err.line, err.column), (1, 10));
}

#[test]
fn break_exits_one_loop() {
    let run = run("0 ((break) loop 1 + [(dup 3 =) (break)] if) loop");
    run.result.expect("success");
    assert_eq!(run.stack, vec![Value::Int(3)]);
}

#[test]
fn stdout_mode_last_set_wins() {
    let run = run("[echo hi] oc os o ;");
    run.result.expect("success");
    assert_eq!(run.stack, vec![strings(&["hi"])]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Variables and definitions
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn definitions_and_quotations() {
    let run = run("def greet \"hi \" swap + wl end \"bob\" greet (\"x\" wl) x");
    run.result.expect("success");
    assert_eq!(run.stdout, "hi bob\nx\n");
}

#[test]
fn quotation_sees_later_assignments() {
    let run = run("(@v wl) q! 1 v! @q x 2 v! @q x");
    run.result.expect("success");
    assert_eq!(run.stdout, "1\n2\n");
}

#[test]
fn missing_variable_lists_known_names() {
    let err = runtime_error(run("1 alpha! 2 beta! @mshell_surely_unset"));
    assert_eq!(
        err.to_string(),
        "1:18: variable 'mshell_surely_unset' not found (known: alpha, beta)"
    );
}

#[test]
fn export_reaches_children() {
    let run = run(r#""hello" greeting! "greeting" export [sh -c "printf %s \"$greeting\""] os ;"#);
    run.result.expect("success");
    assert_eq!(run.stack, vec![Value::String("hello".into())]);
}

#[test]
fn exported_values_are_visible_to_lookup() {
    let run = run("def setup 5 n! \"n\" export end setup @n");
    run.result.expect("success");
    assert_eq!(run.stack, vec![Value::String("5".into())]);
}

#[test]
fn positional_arguments() {
    let config = ShellConfig::default().with_positional_args(["one", "two"]);
    let run = run_with(config, None, "$2 $1 args");
    run.result.expect("success");
    assert_eq!(
        run.stack,
        vec![
            Value::String("two".into()),
            Value::String("one".into()),
            strings(&["one", "two"]),
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Redirection
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn stdout_and_stdin_redirects() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.txt");
    let path = path.display();

    let run = run(&format!("[echo written] '{path}' > ; [cat] '{path}' < os ;"));
    run.result.expect("success");
    assert_eq!(run.stdout, "");
    assert_eq!(run.stack, vec![Value::String("written".into())]);
}

#[test]
fn stderr_redirect() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("err.txt");

    let run = run(&format!("[sh -c \"echo oops >&2\"] '{}' 2> ;", path.display()));
    run.result.expect("success");
    assert_eq!(run.stderr, "");
    assert_eq!(std::fs::read_to_string(&path).expect("read"), "oops\n");
}

#[test]
fn quotation_redirect() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("q.txt");

    let run = run(&format!("(\"inside\" wl \"more\" wle) '{}' > ;", path.display()));
    run.result.expect("success");
    assert_eq!(std::fs::read_to_string(&path).expect("read"), "inside\n");
    assert_eq!(run.stderr, "more\n");
}

#[test]
fn loop_redirect_opens_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("loop.txt");

    let run = run(&format!(
        "0 ([(dup 3 >=) (break)] if dup wl 1 +) '{}' > loop drop",
        path.display()
    ));
    run.result.expect("success");
    assert_eq!(std::fs::read_to_string(&path).expect("read"), "0\n1\n2\n");
}

#[test]
fn stack_dump_goes_to_stderr() {
    let run = run("1 \"two\" [3] .s");
    run.result.expect("success");
    assert_eq!(run.stderr, "[1 \"two\" [3]]\n");
    assert_eq!(run.stack.len(), 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// Exit codes and failures
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn question_catches_failure() {
    let run = run("[sh -c \"exit 3\"] ? \"still running\" wl");
    run.result.expect("success");
    assert_eq!(run.stack, vec![Value::Int(3)]);
    assert_eq!(run.stdout, "still running\n");
}

#[test]
fn semicolon_ignores_failure_without_soe() {
    let run = run("['false'] ; \"next\" wl");
    assert!(run.result.expect("success").success);
    assert_eq!(run.stdout, "next\n");
}

#[test]
fn stop_on_error_aborts() {
    let run = run("soe [sh -c \"exit 3\"] ; \"unreached\" wl");
    assert_eq!(run.stdout, "");
    let err = match run.result {
        Err(err) => err,
        Ok(result) => panic!("expected failure, got {result:?}"),
    };
    assert_eq!(err.exit_code(), 3);
    assert_eq!(err.to_string(), "1:22: command exited with code 3");
}

#[test]
fn question_is_not_aborted_by_soe() {
    let run = run(r#"soe ['false'] ? "after""#);
    run.result.expect("? catches the failure");
    assert_eq!(run.stack, vec![Value::Int(1), Value::String("after".into())]);
}

#[test]
fn exit_ends_the_program() {
    let run = run("\"a\" wl 4 exit \"b\" wl");
    let result = run.result.expect("exit is not an error");
    assert_eq!(result.exit_code, 4);
    assert!(!result.success);
    assert_eq!(run.stdout, "a\n");
}

#[rstest]
#[case::underflow("1 +", "1:3: stack underflow: '+' needs 2 item(s), found 1")]
#[case::type_mismatch("true len", "1:6: type mismatch: 'len' expects a List, String or Quotation, got Boolean")]
#[case::index("[1 2] :5:", "1:7: index 5 out of range for length 2")]
#[case::division("1 0 /", "1:5: division by zero")]
#[case::positional("$3", "1:1: positional argument $3 not set (0 given)")]
#[case::break_outside("break", "1:1: 'break' outside of a loop")]
#[case::if_integer("[(1) (2)] if", "1:11: type mismatch: 'if' condition must leave a Boolean, got Integer")]
#[case::mixed_text_kinds("\"a\" a =", "1:7: type mismatch: '=' expects two values of the same kind, got String and Literal")]
#[case::background("[sleep 0] &", "1:11: background execution with '&' is not supported")]
fn runtime_error_messages(#[case] source: &str, #[case] message: &str) {
    assert_eq!(runtime_error(run(source)).to_string(), message);
}

#[test]
fn missing_program_is_a_process_error() {
    let err = runtime_error(run("[mshell-no-such-program] ;"));
    assert!(matches!(err.kind, ErrorKind::Process { .. }));
}
