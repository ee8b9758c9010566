//! The embedding entry point: a long-lived shell session.

use std::fs::File;
use std::sync::Arc;

use crate::ast;
use crate::error::{RuntimeError, ShellError};
use crate::lexer::{self, TokenKind};
use crate::parser;

use super::config::ShellConfig;
use super::context::{EvalState, ExecuteContext, Stream};
use super::eval::{EvalResult, Evaluator};
use super::scope::Variables;
use super::stack::Stack;
use super::Definitions;

/// A shell session.
///
/// Definitions, the stack, top-level variables and the evaluator state
/// persist across [`run`](Shell::run) calls, so a stdlib and a program can
/// be evaluated one after the other.
///
/// ```
/// use mshell_kernel::{Shell, ShellConfig};
/// use mshell_kernel::value::Value;
///
/// let mut shell = Shell::new(ShellConfig::default());
/// shell.run_source("def sq dup * end 7 sq").expect("runs");
/// assert_eq!(shell.stack().as_slice(), &[Value::Int(49)]);
/// ```
pub struct Shell {
    config: ShellConfig,
    definitions: Definitions,
    state: EvalState,
    stack: Stack,
    context: ExecuteContext,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        let state = EvalState::new(config.positional_args.clone());
        Self {
            config,
            definitions: Definitions::new(),
            state,
            stack: Stack::new(),
            context: ExecuteContext::new(Variables::new()),
        }
    }

    /// Read program stdin from `file` instead of the process stdin.
    pub fn with_stdin(mut self, file: File) -> Self {
        self.context.stdin = Stream::file(file);
        self
    }

    /// Send program stdout (`w`, `wl`, children) to `file`.
    pub fn with_stdout(mut self, file: File) -> Self {
        self.context.stdout = Stream::file(file);
        self
    }

    /// Send program stderr (`we`, `wle`, `.s`, children) to `file`.
    pub fn with_stderr(mut self, file: File) -> Self {
        self.context.stderr = Stream::file(file);
        self
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn variables(&self) -> &Variables {
        &self.context.variables
    }

    pub fn state(&self) -> &EvalState {
        &self.state
    }

    /// Merge the definitions of `file`; a later definition of a name
    /// replaces the earlier one.
    pub fn load(&mut self, file: &ast::File) {
        for def in &file.definitions {
            if self.definitions.insert(def.name.clone(), Arc::clone(&def.items)).is_some() {
                tracing::debug!(name = %def.name, "definition replaced");
            }
        }
    }

    /// Load the definitions of `file`, then evaluate its items.
    #[tracing::instrument(level = "debug", skip_all, fields(definitions = file.definitions.len(), items = file.items.len()))]
    pub fn run(&mut self, file: &ast::File) -> Result<EvalResult, RuntimeError> {
        self.load(file);
        let mut evaluator = Evaluator::new(&self.definitions, &self.config, std::mem::take(&mut self.state));
        let result = evaluator.evaluate(&file.items, &mut self.stack, &self.context);
        self.state = evaluator.into_state();
        result
    }

    /// Lex, parse and run `source`.
    pub fn run_source(&mut self, source: &str) -> Result<EvalResult, ShellError> {
        let tokens = lexer::tokenize(source);
        if let Some(token) = tokens.last().filter(|t| t.kind == TokenKind::Error) {
            if let Some(error) = token.lex_error() {
                return Err(ShellError::Lex {
                    line: token.line,
                    column: token.column,
                    error,
                });
            }
        }
        let file = parser::parse(&tokens)?;
        Ok(self.run(&file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LexerError;
    use crate::value::Value;

    #[test]
    fn state_persists_between_runs() {
        let mut shell = Shell::new(ShellConfig::default());
        shell.run_source("def inc 1 + end 5 n!").expect("first");
        shell.run_source("@n inc").expect("second");
        assert_eq!(shell.stack().as_slice(), &[Value::Int(6)]);
    }

    #[test]
    fn later_definitions_win() {
        let mut shell = Shell::new(ShellConfig::default());
        shell.run_source("def v 1 end").expect("stdlib");
        shell.run_source("def v 2 end v").expect("program");
        assert_eq!(shell.stack().as_slice(), &[Value::Int(2)]);
    }

    #[test]
    fn lex_errors_keep_their_kind() {
        let mut shell = Shell::new(ShellConfig::default());
        match shell.run_source("1 \"open") {
            Err(ShellError::Lex { line, column, error }) => {
                assert_eq!((line, column), (1, 3));
                assert_eq!(error, LexerError::UnterminatedString);
            }
            other => panic!("expected a lex error, got {other:?}"),
        }
    }

    #[test]
    fn parse_errors_surface() {
        let mut shell = Shell::new(ShellConfig::default());
        assert!(matches!(shell.run_source("[1 2"), Err(ShellError::Parse(_))));
    }

    #[test]
    fn positional_args_come_from_config() {
        let mut shell = Shell::new(ShellConfig::default().with_positional_args(["x", "y"]));
        shell.run_source("$2 args len").expect("run");
        assert_eq!(shell.stack().as_slice(), &[Value::String("y".into()), Value::Int(2)]);
    }
}
