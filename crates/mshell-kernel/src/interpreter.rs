//! Interpreter module for mshell.
//!
//! This module provides the stack evaluator, variable scopes, per-invocation
//! streams and the [`Shell`] session that ties them together.
//!
//! # Architecture
//!
//! The interpreter is built in layers:
//!
//! - **Stack**: The value stack with underflow-checked pops
//! - **Variables**: Shared, mutable name bindings captured by quotations
//! - **ExecuteContext**: stdin/stdout/stderr and variables for one invocation
//! - **Evaluator**: Walks parse items, dispatching tokens to built-ins,
//!   definitions and the process scheduler
//! - **Shell**: Owns definitions, state and the stack across runs
//!
//! # Example
//!
//! ```
//! use mshell_kernel::interpreter::{Shell, ShellConfig};
//! use mshell_kernel::value::Value;
//!
//! let mut shell = Shell::new(ShellConfig::default());
//! shell.run_source("[1 2 3] len").unwrap();
//! assert_eq!(shell.stack().as_slice(), &[Value::Int(3)]);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::ParseItem;

mod builtins;
mod config;
mod context;
mod eval;
mod scope;
mod shell;
mod stack;

pub use config::{ShellConfig, DEFAULT_MAX_LOOP_ITERATIONS, STDLIB_ENV};
pub use context::{EvalState, ExecuteContext, Stream};
pub use eval::{EvalResult, Evaluator, Flow};
pub use scope::Variables;
pub use shell::Shell;
pub use stack::Stack;

/// Definition bodies by name.
pub type Definitions = HashMap<String, Arc<[ParseItem]>>;
