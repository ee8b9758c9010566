//! Pipeline execution for mshell.
//!
//! Runs a Pipe value: each stage's stdout becomes the next stage's stdin
//! through an OS pipe. Stages run concurrently, one scoped worker thread
//! each, and the caller waits for all of them.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::OwnedFd;
use std::thread;

use crate::error::{ErrorKind, KindResult, ResultExt, RuntimeError};
use crate::interpreter::{Evaluator, ExecuteContext, Stream};
use crate::lexer::Token;
use crate::value::{List, Redirects, StdoutMode, Value};

use super::{captured_value, ProcessOutcome};

/// An OS pipe as `(read end, write end)`.
fn os_pipe() -> io::Result<(File, File)> {
    let (reader, writer) = io::pipe()?;
    Ok((File::from(OwnedFd::from(reader)), File::from(OwnedFd::from(writer))))
}

/// The only stage of a pipe without redirects or a capture mode.
///
/// Such a pipe runs exactly like `;` on that stage, on the caller's stack.
pub fn lone_stage(pipe: List) -> Result<Value, List> {
    let plain = pipe.redirects == Redirects::default() && pipe.stdout_mode == StdoutMode::None;
    match <[Value; 1]>::try_from(pipe.items) {
        Ok([stage]) if plain && stage.is_executable() => Ok(stage),
        Ok([stage]) => Err(List {
            items: vec![stage],
            ..pipe
        }),
        Err(items) => Err(List { items, ..pipe }),
    }
}

/// Run a Pipe and return the last stage's outcome.
///
/// The pipe's own redirects apply to the ends of the chain: its stdin feeds
/// stage 0 (unless that stage redirects its own), its stdout or capture mode
/// receives the last stage's output, and its stderr is shared by all stages.
#[tracing::instrument(level = "debug", skip_all, fields(stages = pipe.items.len()))]
pub fn run_pipeline(
    evaluator: &Evaluator<'_>,
    pipe: &List,
    ctx: &ExecuteContext,
    token: &Token,
) -> Result<ProcessOutcome, RuntimeError> {
    let stages = &pipe.items;
    if stages.is_empty() {
        return Err(ErrorKind::EmptyCommand.at(token));
    }
    if let Some(bad) = stages.iter().find(|stage| !stage.is_executable()) {
        return Err(ErrorKind::type_mismatch(format!(
            "pipeline stages must be Lists or Quotations, got {}",
            bad.type_name()
        ))
        .at(token));
    }

    let (contexts, capture) = stage_contexts(pipe, ctx).at(token)?;
    tracing::debug!(capture = capture.is_some(), "starting stages");

    let (results, captured) = thread::scope(|scope| {
        let reader = capture.map(|mut file| {
            scope.spawn(move || {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).map(|_| buf)
            })
        });

        let workers: Vec<_> = stages
            .iter()
            .zip(contexts)
            .map(|(stage, stage_ctx)| {
                let mut worker = evaluator.fork();
                scope.spawn(move || {
                    let result = worker.run_executable(stage, &stage_ctx, token);
                    // Closes this stage's pipe ends.
                    drop(stage_ctx);
                    result
                })
            })
            .collect();

        let results: Vec<_> = workers
            .into_iter()
            .enumerate()
            .map(|(i, worker)| {
                worker.join().unwrap_or_else(|_| {
                    tracing::warn!(stage = i, "pipeline worker panicked");
                    Err(ErrorKind::StagePanicked(i).at(token))
                })
            })
            .collect();
        let captured = reader.map(|reader| reader.join());
        (results, captured)
    });
    tracing::debug!("stages joined");

    let captured = match captured {
        None => None,
        Some(Ok(Ok(bytes))) => captured_value(pipe.stdout_mode, &bytes),
        Some(Ok(Err(e))) => return Err(ErrorKind::io("read pipeline output", e).at(token)),
        Some(Err(_)) => {
            tracing::warn!("pipeline capture reader panicked");
            return Err(ErrorKind::StagePanicked(stages.len()).at(token));
        }
    };

    let mut last = ProcessOutcome::default();
    for result in results {
        last = result?;
    }
    if captured.is_some() {
        last.captured = captured;
    }
    Ok(last)
}

/// Build one context per stage, wired through fresh OS pipes.
///
/// Every pipe end lives in exactly one context so that dropping a stage's
/// context closes its ends. Returns the read end of the capture pipe when
/// the pipe has a stdout mode.
fn stage_contexts(pipe: &List, ctx: &ExecuteContext) -> KindResult<(Vec<ExecuteContext>, Option<File>)> {
    let outer = ctx.redirected(&Redirects {
        stdin: pipe.redirects.stdin.clone(),
        stdout: None,
        stderr: pipe.redirects.stderr.clone(),
    })?;

    let (mut last_stdout, capture) = if pipe.stdout_mode != StdoutMode::None {
        if pipe.redirects.stdout.is_some() {
            return Err(ErrorKind::type_mismatch(
                "a pipe cannot both capture stdout and redirect it to a file",
            ));
        }
        let (reader, writer) = os_pipe().map_err(|e| ErrorKind::io("create pipe", e))?;
        (Some(Stream::file(writer)), Some(reader))
    } else {
        let redirected = ctx.redirected(&Redirects {
            stdout: pipe.redirects.stdout.clone(),
            ..Redirects::default()
        })?;
        (Some(redirected.stdout), None)
    };

    let n = pipe.items.len();
    let mut contexts = Vec::with_capacity(n);
    let mut stdin = outer.stdin.clone();
    for i in 0..n {
        let (stdout, next_stdin) = if i + 1 == n {
            (last_stdout.take().unwrap_or_default(), Stream::Inherit)
        } else {
            let (reader, writer) = os_pipe().map_err(|e| ErrorKind::io("create pipe", e))?;
            (Stream::file(writer), Stream::file(reader))
        };
        contexts.push(ExecuteContext {
            stdin: std::mem::replace(&mut stdin, next_stdin),
            stdout,
            stderr: outer.stderr.clone(),
            variables: ctx.variables.clone(),
        });
    }
    Ok((contexts, capture))
}
