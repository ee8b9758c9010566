//! Running a List as one external command.

use std::fs::File;
use std::process::{Command, Stdio};

use crate::error::{ErrorKind, KindResult};
use crate::interpreter::{EvalState, ExecuteContext, ShellConfig};
use crate::value::{List, StdoutMode, Value};

use super::{captured_value, exit_code_of, ProcessOutcome};

/// Flatten a List into argv, inlining nested lists depth-first.
pub fn flatten_argv(list: &List) -> KindResult<Vec<String>> {
    let mut argv = Vec::with_capacity(list.items.len());
    push_args(&list.items, &mut argv)?;
    Ok(argv)
}

fn push_args(items: &[Value], argv: &mut Vec<String>) -> KindResult<()> {
    for item in items {
        match item {
            Value::List(inner) => push_args(&inner.items, argv)?,
            other => match other.command_line() {
                Some(arg) => argv.push(arg),
                None => {
                    return Err(ErrorKind::type_mismatch(format!(
                        "cannot use a {} as a command argument",
                        other.type_name()
                    )));
                }
            },
        }
    }
    Ok(())
}

/// Run `list` as an external command and wait for it.
///
/// A nonzero exit is reported in the outcome, not as an error; only spawn
/// and redirect failures are errors.
pub fn run_process(
    list: &List,
    ctx: &ExecuteContext,
    state: &EvalState,
    config: &ShellConfig,
) -> KindResult<ProcessOutcome> {
    let argv = flatten_argv(list)?;
    let Some((program, args)) = argv.split_first() else {
        return Err(ErrorKind::EmptyCommand);
    };

    let capture = list.stdout_mode != StdoutMode::None;
    if capture && list.redirects.stdout.is_some() {
        return Err(ErrorKind::type_mismatch(
            "a list cannot both capture stdout and redirect it to a file",
        ));
    }

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.envs(&state.exported);

    let stdin = match &list.redirects.stdin {
        Some(path) => Stdio::from(
            File::open(path).map_err(|e| ErrorKind::io(format!("cannot open '{}'", path.display()), e))?,
        ),
        None => ctx.stdin.to_stdio().map_err(|e| ErrorKind::io("stdin", e))?,
    };
    let stdout = if capture {
        Stdio::piped()
    } else {
        match &list.redirects.stdout {
            Some(path) => Stdio::from(
                File::create(path)
                    .map_err(|e| ErrorKind::io(format!("cannot create '{}'", path.display()), e))?,
            ),
            None => ctx.stdout.to_stdio().map_err(|e| ErrorKind::io("stdout", e))?,
        }
    };
    let stderr = match &list.redirects.stderr {
        Some(path) => Stdio::from(
            File::create(path).map_err(|e| ErrorKind::io(format!("cannot create '{}'", path.display()), e))?,
        ),
        None => ctx.stderr.to_stdio().map_err(|e| ErrorKind::io("stderr", e))?,
    };
    cmd.stdin(stdin).stdout(stdout).stderr(stderr);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        if config.process_group {
            cmd.process_group(0);
        }
    }
    #[cfg(not(unix))]
    let _ = config;

    tracing::debug!(?argv, redirects = ?list.redirects, mode = ?list.stdout_mode, "spawning");

    let child = cmd.spawn().map_err(|source| ErrorKind::Process {
        program: program.clone(),
        source,
    })?;
    // The Command holds the parent's copies of the child's stdio; pipe
    // readers downstream only see EOF once these are gone.
    drop(cmd);

    let output = child.wait_with_output().map_err(|e| ErrorKind::io(format!("waiting for '{program}'"), e))?;
    let exit_code = exit_code_of(output.status);
    tracing::debug!(%program, exit_code, "exited");

    Ok(ProcessOutcome {
        exit_code,
        captured: captured_value(list.stdout_mode, &output.stdout),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(args: &[&str]) -> List {
        List::new(args.iter().map(|a| Value::Literal(a.to_string())).collect())
    }

    #[test]
    fn flatten_inlines_nested_lists() {
        let list = List::new(vec![
            Value::Literal("echo".into()),
            Value::List(List::new(vec![Value::Int(1), Value::Float(2.5)])),
            Value::String("x y".into()),
        ]);
        assert_eq!(flatten_argv(&list).expect("argv"), vec!["echo", "1", "2.5", "x y"]);
    }

    #[test]
    fn flatten_rejects_booleans() {
        let list = List::new(vec![Value::Literal("echo".into()), Value::Bool(true)]);
        assert!(matches!(flatten_argv(&list), Err(ErrorKind::TypeMismatch(_))));
    }

    #[test]
    fn empty_command_is_an_error() {
        let result = run_process(&List::default(), &ExecuteContext::default(), &EvalState::default(), &ShellConfig::default());
        assert!(matches!(result, Err(ErrorKind::EmptyCommand)));
    }

    #[test]
    fn captures_lines() {
        let mut list = cmd(&["printf", "a\\nb\\n"]);
        list.stdout_mode = StdoutMode::Lines;
        let outcome = run_process(&list, &ExecuteContext::default(), &EvalState::default(), &ShellConfig::default())
            .expect("run");
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.captured, Some(Value::List(List::of_strings(["a", "b"]))));
    }

    #[test]
    fn reports_nonzero_exit() {
        let outcome = run_process(&cmd(&["false"]), &ExecuteContext::default(), &EvalState::default(), &ShellConfig::default())
            .expect("run");
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.captured, None);
    }

    #[test]
    fn missing_program_is_a_process_error() {
        let result = run_process(
            &cmd(&["mshell-no-such-program-here"]),
            &ExecuteContext::default(),
            &EvalState::default(),
            &ShellConfig::default(),
        );
        assert!(matches!(result, Err(ErrorKind::Process { .. })));
    }

    #[test]
    fn exported_overlay_reaches_child() {
        let mut state = EvalState::default();
        state.exported.insert("MSHELL_CHILD_VAR".into(), "seen".into());
        let mut list = cmd(&["sh", "-c", "printf %s \"$MSHELL_CHILD_VAR\""]);
        list.stdout_mode = StdoutMode::Complete;
        let outcome = run_process(&list, &ExecuteContext::default(), &state, &ShellConfig::default()).expect("run");
        assert_eq!(outcome.captured, Some(Value::String("seen".into())));
    }

    #[test]
    fn stdout_redirect_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        let mut list = cmd(&["echo", "hi"]);
        list.redirects.stdout = Some(path.clone());
        run_process(&list, &ExecuteContext::default(), &EvalState::default(), &ShellConfig::default()).expect("run");
        assert_eq!(std::fs::read_to_string(path).expect("read"), "hi\n");
    }

    #[test]
    fn capture_with_redirect_conflicts() {
        let mut list = cmd(&["echo", "hi"]);
        list.stdout_mode = StdoutMode::Stripped;
        list.redirects.stdout = Some("/tmp/never-written".into());
        let result = run_process(&list, &ExecuteContext::default(), &EvalState::default(), &ShellConfig::default());
        assert!(matches!(result, Err(ErrorKind::TypeMismatch(_))));
    }
}
