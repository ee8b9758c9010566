//! Scheduler module for mshell: external processes and pipelines.
//!
//! This module provides:
//! - **Process execution**: Run a List as one external command with its
//!   redirections and stdout capture mode.
//! - **Pipeline execution**: Run a Pipe as concurrent stages, where stdout
//!   of one stage flows to stdin of the next through an OS pipe.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      run_pipeline                           │
//! │  ┌─────────┐   os pipe   ┌─────────┐   os pipe   ┌────────┐ │
//! │  │ stage 0 │────────────▶│ stage 1 │────────────▶│stage 2 │ │
//! │  │ (thread)│   stdout    │ (thread)│   stdout    │(thread)│ │
//! │  └─────────┘             └─────────┘             └────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each stage runs on a scoped worker thread that owns its pipe ends and
//! drops them as soon as its executable returns, so the next stage sees
//! end of input.

mod pipeline;
mod process;

pub use pipeline::{lone_stage, run_pipeline};
pub use process::{flatten_argv, run_process};

use crate::value::{List, StdoutMode, Value};

/// What running an executable produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    /// The captured stdout, when a capture mode was set.
    pub captured: Option<Value>,
}

impl ProcessOutcome {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            captured: None,
        }
    }
}

/// Turn captured stdout bytes into a stack value.
///
/// Returns `None` for [`StdoutMode::None`].
pub fn captured_value(mode: StdoutMode, bytes: &[u8]) -> Option<Value> {
    let text = String::from_utf8_lossy(bytes);
    match mode {
        StdoutMode::None => None,
        StdoutMode::Lines => {
            let mut lines: Vec<&str> = text.split('\n').collect();
            if lines.last() == Some(&"") {
                lines.pop();
            }
            Some(Value::List(List::of_strings(lines)))
        }
        StdoutMode::Stripped => Some(Value::String(text.trim_end().to_string())),
        StdoutMode::Complete => Some(Value::String(text.into_owned())),
    }
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
