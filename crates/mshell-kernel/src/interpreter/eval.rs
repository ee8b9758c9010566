//! Evaluator for mshell programs.
//!
//! Walks parse items left to right against a [`Stack`]. Lists are evaluated
//! eagerly into List values, quotations are captured with the current
//! variables, and tokens dispatch by kind. Control flow (`break`, `exit`)
//! travels back up the call chain as a [`Flow`]; everything that goes wrong
//! is a [`RuntimeError`] positioned at the offending token.

use std::sync::Arc;

use crate::ast::ParseItem;
use crate::error::{ErrorKind, KindResult, ResultExt, RuntimeError};
use crate::lexer::{self, Token, TokenKind};
use crate::paths::expand_tilde;
use crate::scheduler::{self, ProcessOutcome};
use crate::value::{List, Quotation, StdoutMode, Value};

use super::builtins;
use super::config::ShellConfig;
use super::context::{EvalState, ExecuteContext};
use super::scope::Variables;
use super::stack::Stack;
use super::Definitions;

/// How evaluation of an item sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Ran to the end.
    Continue,
    /// A `break` is unwinding this many loops.
    Break(usize),
    /// `exit` with this code.
    Exit(i32),
}

type Eval = Result<Flow, RuntimeError>;

/// Outcome of evaluating a program body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalResult {
    pub success: bool,
    /// Loops a `break` still has to exit.
    pub break_remaining: usize,
    /// True when `exit` ended the program, whatever its code.
    pub exited: bool,
    pub exit_code: i32,
}

impl From<Flow> for EvalResult {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Continue => Self {
                success: true,
                break_remaining: 0,
                exited: false,
                exit_code: 0,
            },
            Flow::Break(remaining) => Self {
                success: true,
                break_remaining: remaining,
                exited: false,
                exit_code: 0,
            },
            Flow::Exit(code) => Self {
                success: code == 0,
                break_remaining: 0,
                exited: true,
                exit_code: code,
            },
        }
    }
}

/// The tree-walking evaluator.
///
/// Definitions and configuration are shared; the [`EvalState`] is owned so
/// pipeline stages can each run a forked evaluator on their own thread.
pub struct Evaluator<'a> {
    definitions: &'a Definitions,
    config: &'a ShellConfig,
    pub(super) state: EvalState,
}

impl<'a> Evaluator<'a> {
    pub fn new(definitions: &'a Definitions, config: &'a ShellConfig, state: EvalState) -> Self {
        Self {
            definitions,
            config,
            state,
        }
    }

    pub fn state(&self) -> &EvalState {
        &self.state
    }

    pub fn into_state(self) -> EvalState {
        self.state
    }

    /// A copy for a pipeline stage: same definitions, cloned state, and no
    /// enclosing loops.
    pub fn fork(&self) -> Evaluator<'a> {
        Evaluator {
            definitions: self.definitions,
            config: self.config,
            state: EvalState {
                loop_depth: 0,
                ..self.state.clone()
            },
        }
    }

    /// Evaluate `items` on `stack`.
    pub fn evaluate(
        &mut self,
        items: &[ParseItem],
        stack: &mut Stack,
        ctx: &ExecuteContext,
    ) -> Result<EvalResult, RuntimeError> {
        self.eval_items(items, stack, ctx).map(EvalResult::from)
    }

    fn eval_items(&mut self, items: &[ParseItem], stack: &mut Stack, ctx: &ExecuteContext) -> Eval {
        let mut i = 0;
        while i < items.len() {
            match &items[i] {
                ParseItem::List(list) => {
                    let mut sub = Stack::new();
                    match self.eval_items(&list.items, &mut sub, ctx)? {
                        Flow::Continue => stack.push(Value::List(List::new(sub.into_vec()))),
                        flow => return Ok(flow),
                    }
                }
                ParseItem::Quotation(quote) => {
                    stack.push(Value::Quotation(Quotation::new(
                        Arc::clone(&quote.items),
                        ctx.variables.clone(),
                    )));
                }
                ParseItem::Token(token) if token.kind == TokenKind::Break => {
                    let mut count = 1;
                    while matches!(items.get(i + count), Some(ParseItem::Token(t)) if t.kind == TokenKind::Break) {
                        count += 1;
                    }
                    return self.break_loops(count, token);
                }
                ParseItem::Token(token) => match self.eval_token(token, stack, ctx)? {
                    Flow::Continue => {}
                    flow => return Ok(flow),
                },
            }
            i += 1;
        }
        Ok(Flow::Continue)
    }

    fn break_loops(&self, count: usize, token: &Token) -> Eval {
        if count > self.state.loop_depth {
            return Err(ErrorKind::BreakOutsideLoop.at(token));
        }
        Ok(Flow::Break(count))
    }

    fn eval_token(&mut self, token: &Token, stack: &mut Stack, ctx: &ExecuteContext) -> Eval {
        tracing::trace!(kind = %token.kind, lexeme = %token.lexeme, line = token.line, "dispatch");
        let op = token.lexeme.as_str();

        match token.kind {
            TokenKind::True => stack.push(Value::Bool(true)),
            TokenKind::False => stack.push(Value::Bool(false)),
            TokenKind::Integer => stack.push(Value::Int(builtins::parse_int(op).at(token)?)),
            TokenKind::Float => stack.push(Value::Float(builtins::parse_float(op).at(token)?)),
            TokenKind::String => {
                let text = lexer::parse_string_literal(op)
                    .map_err(|e| ErrorKind::type_mismatch(e.to_string()))
                    .at(token)?;
                stack.push(Value::String(text));
            }
            TokenKind::SingleQuoteString => {
                stack.push(Value::String(lexer::parse_single_quoted(op).to_string()));
            }
            TokenKind::DoubleDash => stack.push(Value::Literal("--".to_string())),
            TokenKind::Positional => stack.push(self.positional(op).at(token)?),
            TokenKind::Literal => return self.eval_literal(token, stack, ctx),

            TokenKind::VarStore => self.store(op, stack, ctx).at(token)?,
            TokenKind::VarRetrieve => stack.push(self.retrieve(&op[1..], ctx).at(token)?),
            TokenKind::Export => self.export(stack, ctx).at(token)?,

            TokenKind::Indexer
            | TokenKind::EndIndexer
            | TokenKind::StartIndexer
            | TokenKind::SliceIndexer => builtins::index(token.kind, op, stack).at(token)?,

            TokenKind::Read => match ctx.read_line().at(token)? {
                Some(line) => {
                    stack.push(Value::String(line));
                    stack.push(Value::Bool(true));
                }
                None => {
                    stack.push(Value::String(String::new()));
                    stack.push(Value::Bool(false));
                }
            },
            TokenKind::Str => {
                let value = stack.pop(op).at(token)?;
                stack.push(Value::String(value.to_string()));
            }

            TokenKind::Interpret => {
                let quote = pop_quotation(stack, op).at(token)?;
                return self.run_quotation(&quote, stack, ctx, token);
            }
            TokenKind::If => {
                let list = match stack.pop(op).at(token)? {
                    Value::List(list) => list,
                    other => return Err(builtins::mismatch(op, "a List of Quotations", &other).at(token)),
                };
                return self.eval_if(list, stack, ctx, token);
            }
            TokenKind::Loop => {
                let quote = pop_quotation(stack, op).at(token)?;
                return self.eval_loop(&quote, stack, ctx, token);
            }
            TokenKind::Break => return self.break_loops(1, token),
            TokenKind::Execute => return self.execute(token, stack, ctx, false),
            TokenKind::Question => return self.execute(token, stack, ctx, true),
            TokenKind::Pipe => match stack.pop(op).at(token)? {
                Value::List(list) => stack.push(Value::Pipe(list)),
                other => return Err(builtins::mismatch(op, "a List of executables", &other).at(token)),
            },

            TokenKind::Equals => builtins::equals(stack).at(token)?,
            TokenKind::Plus => builtins::add(stack).at(token)?,
            TokenKind::Minus => builtins::arith(stack, op).at(token)?,
            TokenKind::LessThan | TokenKind::GreaterThan => builtins::angle(stack, op).at(token)?,
            TokenKind::LessThanOrEq | TokenKind::GreaterThanOrEq => builtins::compare(stack, op).at(token)?,
            TokenKind::StderrRedirect => builtins::fd_redirect(stack, op).at(token)?,
            TokenKind::And | TokenKind::Or | TokenKind::Not => builtins::logic(stack, op).at(token)?,

            TokenKind::StdoutLines => builtins::set_stdout_mode(stack, op, StdoutMode::Lines).at(token)?,
            TokenKind::StdoutStripped => builtins::set_stdout_mode(stack, op, StdoutMode::Stripped).at(token)?,
            TokenKind::StdoutComplete => builtins::set_stdout_mode(stack, op, StdoutMode::Complete).at(token)?,
            TokenKind::StopOnError => self.state.stop_on_error = true,

            TokenKind::TypeInt | TokenKind::TypeFloat | TokenKind::TypeBool => {
                builtins::convert(stack, token.kind, op).at(token)?
            }

            TokenKind::Ampersand => {
                return Err(ErrorKind::Unsupported("background execution with '&'".to_string()).at(token));
            }

            TokenKind::LeftBracket
            | TokenKind::RightBracket
            | TokenKind::LeftParen
            | TokenKind::RightParen
            | TokenKind::Def
            | TokenKind::End
            | TokenKind::Eof
            | TokenKind::Error
            | TokenKind::UnterminatedString
            | TokenKind::UnterminatedSingleQuote
            | TokenKind::Comment => {
                return Err(ErrorKind::type_mismatch(format!("unexpected {token}")).at(token));
            }
        }
        Ok(Flow::Continue)
    }

    /// Definition call, built-in, or plain literal (with `~` expanded).
    fn eval_literal(&mut self, token: &Token, stack: &mut Stack, ctx: &ExecuteContext) -> Eval {
        let name = token.lexeme.as_str();

        let definitions = self.definitions;
        if let Some(items) = definitions.get(name) {
            let call_ctx = ctx.with_variables(Variables::new());
            return self.eval_items(items, stack, &call_ctx);
        }

        if let Some(result) = builtins::call(name, stack, ctx, &mut self.state) {
            return result.at(token);
        }

        stack.push(Value::Literal(expand_tilde(name)));
        Ok(Flow::Continue)
    }

    fn positional(&self, lexeme: &str) -> KindResult<Value> {
        let index: usize = lexeme[1..]
            .parse()
            .map_err(|_| ErrorKind::InvalidNumber(lexeme.to_string()))?;
        let count = self.state.positional_args.len();
        match index.checked_sub(1).and_then(|i| self.state.positional_args.get(i)) {
            Some(arg) => Ok(Value::String(arg.clone())),
            None => Err(ErrorKind::PositionalNotFound { index, count }),
        }
    }

    fn store(&self, lexeme: &str, stack: &mut Stack, ctx: &ExecuteContext) -> KindResult<()> {
        let name = lexeme.strip_suffix('!').unwrap_or(lexeme);
        if name.is_empty() {
            return Err(ErrorKind::type_mismatch("missing variable name before '!'"));
        }
        let value = stack.pop(lexeme)?;
        ctx.variables.set(name, value);
        Ok(())
    }

    /// Variables, then the exported overlay, then the process environment.
    fn retrieve(&self, name: &str, ctx: &ExecuteContext) -> KindResult<Value> {
        if let Some(value) = ctx.variables.get(name) {
            return Ok(value);
        }
        if let Some(value) = self.state.env_var(name) {
            return Ok(Value::String(value));
        }
        let mut known = ctx.variables.names();
        known.extend(self.state.exported.keys().cloned());
        known.sort();
        known.dedup();
        Err(ErrorKind::VariableNotFound {
            name: name.to_string(),
            known,
        })
    }

    /// `name export`: copy a variable into the environment overlay.
    fn export(&mut self, stack: &mut Stack, ctx: &ExecuteContext) -> KindResult<()> {
        let name = builtins::pop_text(stack, "export")?;
        let value = ctx.variables.get(&name).ok_or_else(|| ErrorKind::VariableNotFound {
            name: name.clone(),
            known: ctx.variables.names(),
        })?;
        let text = value
            .command_line()
            .ok_or_else(|| builtins::mismatch("export", "a text or numeric variable", &value))?;
        self.state.exported.insert(name, text);
        Ok(())
    }

    /// Evaluate a quotation on `stack` with its captured variables and
    /// redirects.
    fn run_quotation(&mut self, quote: &Quotation, stack: &mut Stack, ctx: &ExecuteContext, token: &Token) -> Eval {
        let quote_ctx = ctx
            .with_variables(quote.variables.clone())
            .redirected(&quote.redirects)
            .at(token)?;
        self.eval_items(&quote.items, stack, &quote_ctx)
    }

    /// Run a List or Quotation on its own, as a pipeline stage does.
    ///
    /// Quotations get a fresh stack and report exit code 0 unless they
    /// `exit`.
    pub fn run_executable(
        &mut self,
        value: &Value,
        ctx: &ExecuteContext,
        token: &Token,
    ) -> Result<ProcessOutcome, RuntimeError> {
        match value {
            Value::List(list) => scheduler::run_process(list, ctx, &self.state, self.config).at(token),
            Value::Quotation(quote) => {
                let mut stack = Stack::new();
                let code = match self.run_quotation(quote, &mut stack, ctx, token)? {
                    Flow::Exit(code) => code,
                    Flow::Continue | Flow::Break(_) => 0,
                };
                Ok(ProcessOutcome::exited(code))
            }
            other => Err(builtins::mismatch(&token.lexeme, "a List or Quotation", other).at(token)),
        }
    }

    /// `;` and `?`. A pipe with one plain stage runs that stage directly.
    fn execute(&mut self, token: &Token, stack: &mut Stack, ctx: &ExecuteContext, push_code: bool) -> Eval {
        let op = token.lexeme.as_str();
        let target = match stack.pop(op).at(token)? {
            Value::Pipe(pipe) => scheduler::lone_stage(pipe).unwrap_or_else(Value::Pipe),
            other => other,
        };
        let outcome = match target {
            Value::List(list) => scheduler::run_process(&list, ctx, &self.state, self.config).at(token)?,
            Value::Pipe(pipe) => scheduler::run_pipeline(self, &pipe, ctx, token)?,
            Value::Quotation(quote) => match self.run_quotation(&quote, stack, ctx, token)? {
                Flow::Continue => ProcessOutcome::exited(0),
                flow => return Ok(flow),
            },
            other => return Err(builtins::mismatch(op, "a List, Pipe or Quotation", &other).at(token)),
        };

        if let Some(captured) = outcome.captured {
            stack.push(captured);
        }
        if push_code {
            stack.push(Value::Int(i64::from(outcome.exit_code)));
        }
        // `?` hands the code to the program instead of aborting.
        if self.state.stop_on_error && !push_code && outcome.exit_code != 0 {
            return Err(ErrorKind::ChildExitNonZero {
                code: outcome.exit_code,
            }
            .at(token));
        }
        Ok(Flow::Continue)
    }

    /// `[cond body cond body ... else] if`
    fn eval_if(&mut self, list: List, stack: &mut Stack, ctx: &ExecuteContext, token: &Token) -> Eval {
        if list.items.is_empty() {
            return Err(ErrorKind::type_mismatch("'if' needs a non-empty list of quotations").at(token));
        }
        let mut quotes = Vec::with_capacity(list.items.len());
        for item in list.items {
            match item {
                Value::Quotation(quote) => quotes.push(quote),
                other => return Err(builtins::mismatch("if", "a list of Quotations", &other).at(token)),
            }
        }

        for arm in quotes.chunks(2) {
            match arm {
                [condition, body] => {
                    match self.run_quotation(condition, stack, ctx, token)? {
                        Flow::Continue => {}
                        flow => return Ok(flow),
                    }
                    match stack.pop("if").at(token)? {
                        Value::Bool(true) => return self.run_quotation(body, stack, ctx, token),
                        Value::Bool(false) => {}
                        other => {
                            return Err(ErrorKind::type_mismatch(format!(
                                "'if' condition must leave a Boolean, got {}",
                                other.type_name()
                            ))
                            .at(token));
                        }
                    }
                }
                [otherwise] => return self.run_quotation(otherwise, stack, ctx, token),
                _ => {}
            }
        }
        Ok(Flow::Continue)
    }

    /// Repeat a quotation until it breaks. Redirects are opened once for
    /// the whole loop.
    fn eval_loop(&mut self, quote: &Quotation, stack: &mut Stack, ctx: &ExecuteContext, token: &Token) -> Eval {
        let loop_ctx = ctx
            .with_variables(quote.variables.clone())
            .redirected(&quote.redirects)
            .at(token)?;

        self.state.loop_depth += 1;
        let result = self.repeat(&quote.items, stack, &loop_ctx, token);
        self.state.loop_depth -= 1;

        match result? {
            Flow::Break(remaining) if remaining > 1 => Ok(Flow::Break(remaining - 1)),
            Flow::Break(_) | Flow::Continue => Ok(Flow::Continue),
            Flow::Exit(code) => Ok(Flow::Exit(code)),
        }
    }

    fn repeat(&mut self, items: &[ParseItem], stack: &mut Stack, ctx: &ExecuteContext, token: &Token) -> Eval {
        let max = self.config.max_loop_iterations;
        for _ in 0..max {
            match self.eval_items(items, stack, ctx)? {
                Flow::Continue => {}
                flow => return Ok(flow),
            }
        }
        Err(ErrorKind::LoopLimitExceeded(max).at(token))
    }
}

fn pop_quotation(stack: &mut Stack, op: &str) -> KindResult<Quotation> {
    match stack.pop(op)? {
        Value::Quotation(quote) => Ok(quote),
        other => Err(builtins::mismatch(op, "a Quotation", &other)),
    }
}
