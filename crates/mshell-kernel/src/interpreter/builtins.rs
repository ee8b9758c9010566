//! Built-in words and operator semantics.
//!
//! Named built-ins (`dup`, `len`, `wl`, ...) are reached through [`call`]
//! after definitions have had their chance. The operator tokens (`+`, `=`,
//! `<`, `o`, indexers, ...) land here directly from the evaluator's token
//! dispatch.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, KindResult};
use crate::glob::glob_paths;
use crate::lexer::TokenKind;
use crate::value::{List, StdoutMode, Value};

use super::context::{EvalState, ExecuteContext};
use super::eval::Flow;
use super::stack::Stack;

/// Run the built-in `name`. Returns `None` when there is no such built-in.
pub(super) fn call(
    name: &str,
    stack: &mut Stack,
    ctx: &ExecuteContext,
    state: &mut EvalState,
) -> Option<KindResult<Flow>> {
    let result = match name {
        // ═══════════════════════════════════════════════════════════════
        // Stack shuffles
        // ═══════════════════════════════════════════════════════════════
        "dup" => dup(stack, name, 0),
        "over" => dup(stack, name, 1),
        "swap" => stack.pop2(name).map(|(a, b)| {
            stack.push(b);
            stack.push(a);
        }),
        "drop" => stack.pop(name).map(drop),
        "rot" => stack.pop3(name).map(|(a, b, c)| {
            stack.push(b);
            stack.push(c);
            stack.push(a);
        }),
        "-rot" => stack.pop3(name).map(|(a, b, c)| {
            stack.push(c);
            stack.push(a);
            stack.push(b);
        }),
        "nip" => stack.pop2(name).map(|(_, b)| stack.push(b)),
        "pick" => pick(stack),

        // ═══════════════════════════════════════════════════════════════
        // Aggregates
        // ═══════════════════════════════════════════════════════════════
        "len" => len(stack),
        "append" => append(stack),
        "split" => split(stack),
        "wsplit" => unary_text(stack, name, |s| {
            Value::List(List::of_strings(s.split_whitespace()))
        }),
        "join" => join(stack),
        "lines" => unary_text(stack, name, |s| Value::List(List::of_strings(split_lines(s)))),
        "nth" => nth(stack),
        "setAt" => set_at(stack),
        "insert" => insert(stack),
        "del" => del(stack),
        "in" => contains(stack),
        "glob" => glob(stack),
        "findReplace" => find_replace(stack),
        "readFile" => read_file(stack),
        "stdin" => ctx.read_all().map(|text| stack.push(Value::String(text))),
        "args" => {
            stack.push(Value::List(List::of_strings(state.positional_args.iter().cloned())));
            Ok(())
        }
        "cd" => cd(stack, ctx, state),

        // ═══════════════════════════════════════════════════════════════
        // Numbers
        // ═══════════════════════════════════════════════════════════════
        "*" | "/" | "mod" | "max" | "min" => arith(stack, name),
        "abs" => abs(stack),

        // ═══════════════════════════════════════════════════════════════
        // Text and paths
        // ═══════════════════════════════════════════════════════════════
        "trim" => map_text(stack, name, |s| s.trim().to_string()),
        "upper" => map_text(stack, name, str::to_uppercase),
        "lower" => map_text(stack, name, str::to_lowercase),
        "startsWith" => text_test(stack, name, |s, prefix| s.starts_with(prefix)),
        "endsWith" => text_test(stack, name, |s, suffix| s.ends_with(suffix)),
        "isDir" => unary_text(stack, name, |s| Value::Bool(Path::new(s).is_dir())),
        "isFile" => unary_text(stack, name, |s| Value::Bool(Path::new(s).is_file())),

        // ═══════════════════════════════════════════════════════════════
        // Output
        // ═══════════════════════════════════════════════════════════════
        ".s" => {
            let listing = Value::List(List::new(stack.as_slice().to_vec()));
            ctx.write_stderr(format!("{listing}\n").as_bytes())
        }
        "w" => write_value(stack, name, false).and_then(|text| ctx.write_stdout(text.as_bytes())),
        "wl" => write_value(stack, name, true).and_then(|text| ctx.write_stdout(text.as_bytes())),
        "we" => write_value(stack, name, false).and_then(|text| ctx.write_stderr(text.as_bytes())),
        "wle" => write_value(stack, name, true).and_then(|text| ctx.write_stderr(text.as_bytes())),

        "exit" => return Some(exit(stack)),

        _ => return None,
    };
    Some(result.map(|()| Flow::Continue))
}

// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════

/// Type mismatch for `op` given `got`.
pub(super) fn mismatch(op: &str, expected: &str, got: &Value) -> ErrorKind {
    ErrorKind::type_mismatch(format!("'{op}' expects {expected}, got {}", got.type_name()))
}

fn mismatch2(op: &str, expected: &str, a: &Value, b: &Value) -> ErrorKind {
    ErrorKind::type_mismatch(format!(
        "'{op}' expects {expected}, got {} and {}",
        a.type_name(),
        b.type_name()
    ))
}

pub(super) fn parse_int(text: &str) -> KindResult<i64> {
    text.parse().map_err(|_| ErrorKind::InvalidNumber(text.to_string()))
}

pub(super) fn parse_float(text: &str) -> KindResult<f64> {
    text.parse().map_err(|_| ErrorKind::InvalidNumber(text.to_string()))
}

/// Pop the text of a String or Literal.
pub(super) fn pop_text(stack: &mut Stack, op: &str) -> KindResult<String> {
    match stack.pop(op)? {
        Value::String(s) | Value::Literal(s) => Ok(s),
        other => Err(mismatch(op, "a String or Literal", &other)),
    }
}

fn pop_int(stack: &mut Stack, op: &str) -> KindResult<i64> {
    match stack.pop(op)? {
        Value::Int(n) => Ok(n),
        other => Err(mismatch(op, "an Integer", &other)),
    }
}

fn pop_list(stack: &mut Stack, op: &str) -> KindResult<List> {
    match stack.pop(op)? {
        Value::List(list) => Ok(list),
        other => Err(mismatch(op, "a List", &other)),
    }
}

/// `value` rebuilt around new text, keeping String or Literal.
fn same_kind(value: &Value, text: String) -> Value {
    match value {
        Value::Literal(_) => Value::Literal(text),
        _ => Value::String(text),
    }
}

fn unary_text(stack: &mut Stack, op: &str, f: impl FnOnce(&str) -> Value) -> KindResult<()> {
    let text = pop_text(stack, op)?;
    stack.push(f(&text));
    Ok(())
}

fn map_text(stack: &mut Stack, op: &str, f: impl FnOnce(&str) -> String) -> KindResult<()> {
    let value = stack.pop(op)?;
    let text = value.as_text().ok_or_else(|| mismatch(op, "a String or Literal", &value))?;
    let result = same_kind(&value, f(text));
    stack.push(result);
    Ok(())
}

fn text_test(stack: &mut Stack, op: &str, f: impl FnOnce(&str, &str) -> bool) -> KindResult<()> {
    let (s, pattern) = stack.pop2(op)?;
    match (s.as_text(), pattern.as_text()) {
        (Some(s), Some(pattern)) => {
            stack.push(Value::Bool(f(s, pattern)));
            Ok(())
        }
        _ => Err(mismatch2(op, "two Strings", &s, &pattern)),
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Resolve an insertion point in `0..=len`; negative counts from the end.
fn insertion_index(index: i64, len: usize) -> KindResult<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved > len as i64 {
        return Err(ErrorKind::IndexOutOfRange { index, len });
    }
    Ok(resolved as usize)
}

/// Resolve an element index in `0..len`; negative counts from the end.
fn element_index(index: i64, len: usize) -> KindResult<usize> {
    match insertion_index(index, len)? {
        i if i < len => Ok(i),
        _ => Err(ErrorKind::IndexOutOfRange { index, len }),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Stack shuffles
// ═══════════════════════════════════════════════════════════════════════

fn dup(stack: &mut Stack, op: &str, depth: usize) -> KindResult<()> {
    stack.require(op, depth + 1)?;
    if let Some(value) = stack.peek(depth).cloned() {
        stack.push(value);
    }
    Ok(())
}

/// `n pick`: copy the nth item from the top (1 is the top).
fn pick(stack: &mut Stack) -> KindResult<()> {
    let n = pop_int(stack, "pick")?;
    let len = stack.as_slice().len();
    let value = usize::try_from(n)
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|depth| stack.peek(depth))
        .cloned()
        .ok_or(ErrorKind::IndexOutOfRange { index: n, len })?;
    stack.push(value);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Aggregates
// ═══════════════════════════════════════════════════════════════════════

fn len(stack: &mut Stack) -> KindResult<()> {
    let value = stack.pop("len")?;
    let n = value
        .len()
        .ok_or_else(|| mismatch("len", "a List, String or Quotation", &value))?;
    stack.push(Value::Int(n as i64));
    Ok(())
}

/// `list value append` or `value list append`. With two Lists the top one
/// becomes a single element of the other.
fn append(stack: &mut Stack) -> KindResult<()> {
    let (a, b) = stack.pop2("append")?;
    let list = match (a, b) {
        (Value::List(mut list), item) => {
            list.items.push(item);
            list
        }
        (item, Value::List(mut list)) => {
            list.items.push(item);
            list
        }
        (a, b) => return Err(mismatch2("append", "a List and a value", &a, &b)),
    };
    stack.push(Value::List(list));
    Ok(())
}

/// `s delim split`. An empty delimiter splits into characters.
fn split(stack: &mut Stack) -> KindResult<()> {
    let delim = pop_text(stack, "split")?;
    let text = pop_text(stack, "split")?;
    let parts = if delim.is_empty() {
        List::of_strings(text.chars().map(String::from))
    } else {
        List::of_strings(text.split(delim.as_str()))
    };
    stack.push(Value::List(parts));
    Ok(())
}

/// `list delim join`
fn join(stack: &mut Stack) -> KindResult<()> {
    let delim = pop_text(stack, "join")?;
    let list = pop_list(stack, "join")?;
    let parts = list
        .items
        .iter()
        .map(|item| item.command_line().ok_or_else(|| mismatch("join", "a List of text or numbers", item)))
        .collect::<KindResult<Vec<_>>>()?;
    stack.push(Value::String(parts.join(&delim)));
    Ok(())
}

/// Index with the Integer on either side.
fn nth(stack: &mut Stack) -> KindResult<()> {
    let (a, b) = stack.pop2("nth")?;
    let result = match (&a, &b) {
        (indexable, Value::Int(n)) | (Value::Int(n), indexable) => indexable.index(*n)?,
        _ => return Err(mismatch2("nth", "an Integer and an indexable value", &a, &b)),
    };
    stack.push(result);
    Ok(())
}

/// `list value index setAt`
fn set_at(stack: &mut Stack) -> KindResult<()> {
    let index = pop_int(stack, "setAt")?;
    let value = stack.pop("setAt")?;
    let mut list = pop_list(stack, "setAt")?;
    let i = element_index(index, list.items.len())?;
    list.items[i] = value;
    stack.push(Value::List(list));
    Ok(())
}

/// `list value index insert`
fn insert(stack: &mut Stack) -> KindResult<()> {
    let index = pop_int(stack, "insert")?;
    let value = stack.pop("insert")?;
    let mut list = pop_list(stack, "insert")?;
    let i = insertion_index(index, list.items.len())?;
    list.items.insert(i, value);
    stack.push(Value::List(list));
    Ok(())
}

/// `list index del`
fn del(stack: &mut Stack) -> KindResult<()> {
    let index = pop_int(stack, "del")?;
    let mut list = pop_list(stack, "del")?;
    let i = element_index(index, list.items.len())?;
    list.items.remove(i);
    stack.push(Value::List(list));
    Ok(())
}

/// `needle haystack in`: substring or list membership.
fn contains(stack: &mut Stack) -> KindResult<()> {
    let (needle, haystack) = stack.pop2("in")?;
    let found = match (&needle, &haystack) {
        (_, Value::List(list)) => list.items.contains(&needle),
        (n, h) => match (n.as_text(), h.as_text()) {
            (Some(n), Some(h)) => h.contains(n),
            _ => return Err(mismatch2("in", "a String and a String or List", &needle, &haystack)),
        },
    };
    stack.push(Value::Bool(found));
    Ok(())
}

fn glob(stack: &mut Stack) -> KindResult<()> {
    let pattern = pop_text(stack, "glob")?;
    let cwd = std::env::current_dir().map_err(|e| ErrorKind::io("current directory", e))?;
    let matches =
        glob_paths(&pattern, &cwd).map_err(|e| ErrorKind::io(format!("glob '{pattern}'"), e))?;
    stack.push(Value::List(List::of_strings(matches)));
    Ok(())
}

/// `s find replacement findReplace`
fn find_replace(stack: &mut Stack) -> KindResult<()> {
    let replacement = pop_text(stack, "findReplace")?;
    let find = pop_text(stack, "findReplace")?;
    let value = stack.pop("findReplace")?;
    let text = value
        .as_text()
        .ok_or_else(|| mismatch("findReplace", "a String or Literal", &value))?;
    let replaced = if find.is_empty() {
        text.to_string()
    } else {
        text.replace(&find, &replacement)
    };
    let result = same_kind(&value, replaced);
    stack.push(result);
    Ok(())
}

fn read_file(stack: &mut Stack) -> KindResult<()> {
    let path = pop_text(stack, "readFile")?;
    let text = std::fs::read_to_string(&path)
        .map_err(|e| ErrorKind::io(format!("cannot read '{path}'"), e))?;
    stack.push(Value::String(text));
    Ok(())
}

/// Change directory and record `PWD`/`OLDPWD` for this scope and for
/// children.
fn cd(stack: &mut Stack, ctx: &ExecuteContext, state: &mut EvalState) -> KindResult<()> {
    let target = pop_text(stack, "cd")?;
    let old = std::env::current_dir().map_err(|e| ErrorKind::io("current directory", e))?;
    std::env::set_current_dir(&target).map_err(|e| ErrorKind::io(format!("cd '{target}'"), e))?;
    let new = std::env::current_dir().map_err(|e| ErrorKind::io("current directory", e))?;

    let old = old.display().to_string();
    let new = new.display().to_string();
    tracing::debug!(from = %old, to = %new, "cd");

    ctx.variables.set("OLDPWD", Value::String(old.clone()));
    ctx.variables.set("PWD", Value::String(new.clone()));
    state.exported.insert("OLDPWD".to_string(), old);
    state.exported.insert("PWD".to_string(), new);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Arithmetic, comparison, logic
// ═══════════════════════════════════════════════════════════════════════

/// Binary numeric operator with Integer to Float promotion.
pub(super) fn arith(stack: &mut Stack, op: &str) -> KindResult<()> {
    let (a, b) = stack.pop2(op)?;
    let result = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(int_op(op, *x, *y)?),
        (x, y) => match (x.float_value(), y.float_value()) {
            (Some(x), Some(y)) => Value::Float(float_op(op, x, y)?),
            _ => return Err(mismatch2(op, "two numbers", &a, &b)),
        },
    };
    stack.push(result);
    Ok(())
}

fn int_op(op: &str, x: i64, y: i64) -> KindResult<i64> {
    if matches!(op, "/" | "mod") && y == 0 {
        return Err(ErrorKind::DivisionByZero);
    }
    let result = match op {
        "+" => x.checked_add(y),
        "-" => x.checked_sub(y),
        "*" => x.checked_mul(y),
        "/" => floor_div(x, y),
        "mod" => floor_mod(x, y),
        "max" => Some(x.max(y)),
        "min" => Some(x.min(y)),
        _ => return Err(ErrorKind::Unsupported(format!("operator '{op}'"))),
    };
    result.ok_or_else(|| ErrorKind::Overflow(op.to_string()))
}

fn floor_div(x: i64, y: i64) -> Option<i64> {
    let q = x.checked_div(y)?;
    let r = x.checked_rem(y)?;
    Some(if r != 0 && (r < 0) != (y < 0) { q - 1 } else { q })
}

fn floor_mod(x: i64, y: i64) -> Option<i64> {
    let r = x.checked_rem(y)?;
    Some(if r != 0 && (r < 0) != (y < 0) { r + y } else { r })
}

fn float_op(op: &str, x: f64, y: f64) -> KindResult<f64> {
    if matches!(op, "/" | "mod") && y == 0.0 {
        return Err(ErrorKind::DivisionByZero);
    }
    Ok(match op {
        "+" => x + y,
        "-" => x - y,
        "*" => x * y,
        "/" => x / y,
        "mod" => x - y * (x / y).floor(),
        "max" => x.max(y),
        "min" => x.min(y),
        _ => return Err(ErrorKind::Unsupported(format!("operator '{op}'"))),
    })
}

fn abs(stack: &mut Stack) -> KindResult<()> {
    let result = match stack.pop("abs")? {
        Value::Int(n) => Value::Int(n.checked_abs().ok_or_else(|| ErrorKind::Overflow("abs".to_string()))?),
        Value::Float(f) => Value::Float(f.abs()),
        other => return Err(mismatch("abs", "a number", &other)),
    };
    stack.push(result);
    Ok(())
}

/// `+`: numbers add, text concatenates, Lists concatenate.
pub(super) fn add(stack: &mut Stack) -> KindResult<()> {
    stack.require("+", 2)?;
    let both_numeric = matches!((stack.peek(1), stack.peek(0)), (Some(a), Some(b)) if a.is_numeric() && b.is_numeric());
    if both_numeric {
        return arith(stack, "+");
    }

    let (a, b) = stack.pop2("+")?;
    let result = match (a, b) {
        (Value::List(mut a), Value::List(b)) => {
            a.items.extend(b.items);
            Value::List(a)
        }
        (a, b) => match (a.as_text(), b.as_text()) {
            (Some(x), Some(y)) => same_kind(&a, format!("{x}{y}")),
            _ => return Err(mismatch2("+", "two numbers, two Strings or two Lists", &a, &b)),
        },
    };
    stack.push(result);
    Ok(())
}

/// `=` on two values of the same kind.
pub(super) fn equals(stack: &mut Stack) -> KindResult<()> {
    let (a, b) = stack.pop2("=")?;
    let equal = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) | (Value::Literal(x), Value::Literal(y)) => x == y,
        _ => return Err(mismatch2("=", "two values of the same kind", &a, &b)),
    };
    stack.push(Value::Bool(equal));
    Ok(())
}

fn numeric_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        _ => a.float_value()?.partial_cmp(&b.float_value()?),
    }
}

/// `<`, `>`, `<=`, `>=` on two numbers.
pub(super) fn compare(stack: &mut Stack, op: &str) -> KindResult<()> {
    let (a, b) = stack.pop2(op)?;
    if !(a.is_numeric() && b.is_numeric()) {
        return Err(mismatch2(op, "two numbers", &a, &b));
    }
    let result = numeric_order(&a, &b).is_some_and(|ord| match op {
        "<" => ord.is_lt(),
        ">" => ord.is_gt(),
        "<=" => ord.is_le(),
        ">=" => ord.is_ge(),
        _ => false,
    });
    stack.push(Value::Bool(result));
    Ok(())
}

/// `<` and `>`: comparison on two numbers, otherwise a stdin or stdout
/// redirect of the executable beneath the path.
pub(super) fn angle(stack: &mut Stack, op: &str) -> KindResult<()> {
    stack.require(op, 2)?;
    let both_numeric = matches!((stack.peek(1), stack.peek(0)), (Some(a), Some(b)) if a.is_numeric() && b.is_numeric());
    if both_numeric {
        return compare(stack, op);
    }
    let (mut target, path) = stack.pop2(op)?;
    let Some(path) = path.as_text().map(PathBuf::from) else {
        return Err(mismatch2(op, "two numbers or an executable and a path", &target, &path));
    };
    let Some(redirects) = target.redirects_mut() else {
        return Err(mismatch(op, "a List, Quotation or Pipe beneath the path", &target));
    };
    if op == "<" {
        redirects.stdin = Some(path);
    } else {
        redirects.stdout = Some(path);
    }
    stack.push(target);
    Ok(())
}

/// `2>` (and `1>`): redirect a numbered stream of the executable beneath
/// the path.
pub(super) fn fd_redirect(stack: &mut Stack, op: &str) -> KindResult<()> {
    let fd = parse_int(op.trim_end_matches('>'))?;
    let path = PathBuf::from(pop_text(stack, op)?);
    let mut target = stack.pop(op)?;
    let Some(redirects) = target.redirects_mut() else {
        return Err(mismatch(op, "a List, Quotation or Pipe beneath the path", &target));
    };
    match fd {
        1 => redirects.stdout = Some(path),
        2 => redirects.stderr = Some(path),
        _ => return Err(ErrorKind::Unsupported(format!("redirecting file descriptor {fd}"))),
    }
    stack.push(target);
    Ok(())
}

/// `and`, `or`, `not`.
pub(super) fn logic(stack: &mut Stack, op: &str) -> KindResult<()> {
    let result = if op == "not" {
        match stack.pop(op)? {
            Value::Bool(b) => !b,
            other => return Err(mismatch(op, "a Boolean", &other)),
        }
    } else {
        match stack.pop2(op)? {
            (Value::Bool(x), Value::Bool(y)) if op == "and" => x && y,
            (Value::Bool(x), Value::Bool(y)) => x || y,
            (a, b) => return Err(mismatch2(op, "two Booleans", &a, &b)),
        }
    };
    stack.push(Value::Bool(result));
    Ok(())
}

/// `o`, `os`, `oc` on a List or Pipe.
pub(super) fn set_stdout_mode(stack: &mut Stack, op: &str, mode: StdoutMode) -> KindResult<()> {
    let mut value = stack.pop(op)?;
    match &mut value {
        Value::List(list) | Value::Pipe(list) => list.stdout_mode = mode,
        other => return Err(mismatch(op, "a List or Pipe", other)),
    }
    stack.push(value);
    Ok(())
}

/// `int`, `float`, `bool`.
pub(super) fn convert(stack: &mut Stack, kind: TokenKind, op: &str) -> KindResult<()> {
    let value = stack.pop(op)?;
    let result = match (kind, &value) {
        (TokenKind::TypeInt, Value::Int(n)) => Value::Int(*n),
        (TokenKind::TypeInt, Value::Float(f)) => {
            if !f.is_finite() || *f < i64::MIN as f64 || *f >= i64::MAX as f64 {
                return Err(ErrorKind::Overflow(op.to_string()));
            }
            Value::Int(f.trunc() as i64)
        }
        (TokenKind::TypeInt, Value::Bool(b)) => Value::Int(i64::from(*b)),
        (TokenKind::TypeInt, Value::String(s) | Value::Literal(s)) => Value::Int(parse_int(s.trim())?),

        (TokenKind::TypeFloat, Value::Int(n)) => Value::Float(*n as f64),
        (TokenKind::TypeFloat, Value::Float(f)) => Value::Float(*f),
        (TokenKind::TypeFloat, Value::String(s) | Value::Literal(s)) => Value::Float(parse_float(s.trim())?),

        (TokenKind::TypeBool, Value::Bool(b)) => Value::Bool(*b),
        (TokenKind::TypeBool, Value::Int(n)) => Value::Bool(*n != 0),
        (TokenKind::TypeBool, Value::String(s) | Value::Literal(s)) => match s.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => return Err(ErrorKind::type_mismatch(format!("'bool' cannot parse '{other}'"))),
        },

        _ => return Err(mismatch(op, "a convertible value", &value)),
    };
    stack.push(result);
    Ok(())
}

/// The indexing tokens `:n:`, `:n`, `n:` and `a:b`.
pub(super) fn index(kind: TokenKind, lexeme: &str, stack: &mut Stack) -> KindResult<()> {
    let value = stack.pop(lexeme)?;
    let result = match kind {
        TokenKind::Indexer => value.index(parse_int(lexeme.trim_matches(':'))?)?,
        TokenKind::EndIndexer => value.slice_end(parse_int(lexeme.trim_start_matches(':'))?)?,
        TokenKind::StartIndexer => value.slice_start(parse_int(lexeme.trim_end_matches(':'))?)?,
        TokenKind::SliceIndexer => {
            let (start, end) = lexeme
                .split_once(':')
                .ok_or_else(|| ErrorKind::InvalidNumber(lexeme.to_string()))?;
            value.slice(parse_int(start)?, parse_int(end)?)?
        }
        _ => return Err(ErrorKind::type_mismatch(format!("'{lexeme}' is not an indexer"))),
    };
    stack.push(result);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Output
// ═══════════════════════════════════════════════════════════════════════

fn write_value(stack: &mut Stack, op: &str, newline: bool) -> KindResult<String> {
    let value = stack.pop(op)?;
    let mut text = value
        .command_line()
        .ok_or_else(|| mismatch(op, "text or a number", &value))?;
    if newline {
        text.push('\n');
    }
    Ok(text)
}

fn exit(stack: &mut Stack) -> KindResult<Flow> {
    let code = pop_int(stack, "exit")?;
    match i32::try_from(code) {
        Ok(code) if (0..=255).contains(&code) => Ok(Flow::Exit(code)),
        _ => Err(ErrorKind::type_mismatch(format!("'exit' expects a code in 0..=255, got {code}"))),
    }
}
