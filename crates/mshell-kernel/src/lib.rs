//! mshell-kernel: The core of mshell, a stack-based shell language.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes mshell source code using logos
//! - **Parser**: Builds definitions, lists and quotations using chumsky
//! - **AST**: Parse items and their JSON form
//! - **Values**: The stack object model
//! - **Interpreter**: The stack evaluator, built-ins and the [`Shell`] session
//! - **Scheduler**: External processes and concurrent pipelines
//! - **Glob/Paths**: Pattern expansion and home directory helpers

pub mod ast;
pub mod error;
pub mod glob;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod paths;
pub mod scheduler;
pub mod value;

pub use error::{ErrorKind, RuntimeError, ShellError};
pub use interpreter::{EvalResult, Shell, ShellConfig};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse, parse_source, ParseError};
pub use value::Value;

// Tilde expansion utility
pub use paths::{expand_tilde, home_dir};
