//! Error types for mshell.
//!
//! Runtime failures are an [`ErrorKind`] (what went wrong) attached to the
//! position of the token being evaluated ([`RuntimeError`]). [`ShellError`]
//! unifies lexing, parsing and evaluation for embedders.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::lexer::{LexerError, Token};
use crate::parser::ParseError;

/// Result type for value operations and built-ins.
pub type KindResult<T> = Result<T, ErrorKind>;

/// A runtime failure without a source position.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// An operator needs more items than the stack holds.
    #[error("stack underflow: '{op}' needs {needed} item(s), found {found}")]
    StackUnderflow {
        op: String,
        needed: usize,
        found: usize,
    },

    /// An operator was applied to unsupported value kinds.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Index or slice bound outside the value.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Redirection file, readFile, stdin or directory failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A child could not be started.
    #[error("failed to run '{program}': {source}")]
    Process {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A child exited nonzero while stop-on-error is active.
    #[error("command exited with code {code}")]
    ChildExitNonZero { code: i32 },

    /// `@name` missed the variables, the exported overlay and the environment.
    #[error("variable '{name}' not found (known: {})", format_known(.known))]
    VariableNotFound { name: String, known: Vec<String> },

    /// `$n` with no such argument.
    #[error("positional argument ${index} not set ({count} given)")]
    PositionalNotFound { index: usize, count: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{0}'")]
    Overflow(String),

    #[error("pipeline stage {0} panicked")]
    StagePanicked(usize),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("'break' outside of a loop")]
    BreakOutsideLoop,

    #[error("loop exceeded {0} iterations")]
    LoopLimitExceeded(usize),

    #[error("empty command")]
    EmptyCommand,

    #[error("{0} is not supported")]
    Unsupported(String),
}

fn format_known(known: &[String]) -> String {
    if known.is_empty() {
        "none".to_string()
    } else {
        known.join(", ")
    }
}

impl ErrorKind {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        ErrorKind::TypeMismatch(message.into())
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ErrorKind::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::ChildExitNonZero { code } => *code,
            _ => 1,
        }
    }

    /// Attach the position of `token`.
    pub fn at(self, token: &Token) -> RuntimeError {
        RuntimeError {
            line: token.line,
            column: token.column,
            kind: self,
        }
    }
}

/// A runtime failure positioned at the token that caused it.
#[derive(Debug)]
pub struct RuntimeError {
    pub line: usize,
    pub column: usize,
    pub kind: ErrorKind,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.kind)
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Positions an [`ErrorKind`] result at a token.
pub trait ResultExt<T> {
    fn at(self, token: &Token) -> Result<T, RuntimeError>;
}

impl<T> ResultExt<T> for KindResult<T> {
    fn at(self, token: &Token) -> Result<T, RuntimeError> {
        self.map_err(|kind| kind.at(token))
    }
}

/// Any failure running an mshell program.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{line}:{column}: {error}")]
    Lex {
        line: usize,
        column: usize,
        error: LexerError,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ShellError {
    /// Exit code for the CLI: the child's code for stop-on-error aborts,
    /// 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShellError::Runtime(err) => err.kind.exit_code(),
            _ => 1,
        }
    }
}
