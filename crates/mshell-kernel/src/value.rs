//! Stack values.
//!
//! Everything the evaluator pushes is a [`Value`]. Lists double as command
//! vectors and carry redirections and a stdout capture mode; quotations are
//! deferred item sequences closed over the variables of the place they were
//! written.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::ast::ParseItem;
use crate::error::{ErrorKind, KindResult};
use crate::interpreter::Variables;

/// How a List's stdout reaches the stack when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdoutMode {
    /// Not captured: goes to the redirect file or the context stdout.
    #[default]
    None,
    /// `o`: a List of Strings, one per line.
    Lines,
    /// `os`: one String, trailing whitespace removed.
    Stripped,
    /// `oc`: one String, unchanged.
    Complete,
}

/// File redirections attached to an executable value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirects {
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

/// An evaluated list: data, or an external command when executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct List {
    pub items: Vec<Value>,
    pub redirects: Redirects,
    pub stdout_mode: StdoutMode,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// A list of Strings.
    pub fn of_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(strings.into_iter().map(|s| Value::String(s.into())).collect())
    }
}

/// Deferred code plus the variables it closes over.
#[derive(Debug, Clone)]
pub struct Quotation {
    pub items: Arc<[ParseItem]>,
    pub redirects: Redirects,
    pub variables: Variables,
}

impl Quotation {
    pub fn new(items: Arc<[ParseItem]>, variables: Variables) -> Self {
        Self {
            items,
            redirects: Redirects::default(),
            variables,
        }
    }

    fn with_items(&self, items: &[ParseItem]) -> Self {
        Self {
            items: items.into(),
            redirects: self.redirects.clone(),
            variables: self.variables.clone(),
        }
    }
}

impl PartialEq for Quotation {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
            && self.redirects == other.redirects
            && self.variables.same_scope(&other.variables)
    }
}

/// A stack value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(String),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(List),
    Quotation(Quotation),
    /// A list of executables run as a pipeline; the list's own redirects
    /// and capture mode apply to the pipeline as a whole.
    Pipe(List),
}

impl Value {
    /// Human-readable kind name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Literal(_) => "Literal",
            Value::String(_) => "String",
            Value::Int(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Boolean",
            Value::List(_) => "List",
            Value::Quotation(_) => "Quotation",
            Value::Pipe(_) => "Pipe",
        }
    }

    /// The argv form of this value, if it can appear on a command line.
    pub fn command_line(&self) -> Option<String> {
        match self {
            Value::Literal(s) | Value::String(s) => Some(s.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            _ => None,
        }
    }

    /// Text of a String or Literal.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Literal(s) | Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn float_value(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// List or Quotation: something `;` can run on its own.
    pub fn is_executable(&self) -> bool {
        matches!(self, Value::List(_) | Value::Quotation(_))
    }

    /// Mutable redirects of a List, Quotation or Pipe.
    pub fn redirects_mut(&mut self) -> Option<&mut Redirects> {
        match self {
            Value::List(list) | Value::Pipe(list) => Some(&mut list.redirects),
            Value::Quotation(quote) => Some(&mut quote.redirects),
            _ => None,
        }
    }

    /// Length of an indexable value (characters for text).
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Literal(s) | Value::String(s) => Some(s.chars().count()),
            Value::List(list) | Value::Pipe(list) => Some(list.items.len()),
            Value::Quotation(quote) => Some(quote.items.len()),
            _ => None,
        }
    }

    /// Element at `index`; negative counts from the end.
    pub fn index(&self, index: i64) -> KindResult<Value> {
        let len = self.len().ok_or_else(|| self.not_indexable("index"))?;
        let i = normalize_index(index, len)?;
        match self {
            Value::Literal(s) => Ok(Value::Literal(char_range(s, i, i + 1))),
            Value::String(s) => Ok(Value::String(char_range(s, i, i + 1))),
            Value::List(list) | Value::Pipe(list) => Ok(list.items[i].clone()),
            Value::Quotation(quote) => Ok(Value::Quotation(quote.with_items(&quote.items[i..i + 1]))),
            _ => Err(self.not_indexable("index")),
        }
    }

    /// Elements from `start` to the end.
    pub fn slice_start(&self, start: i64) -> KindResult<Value> {
        let len = self.len().ok_or_else(|| self.not_indexable("slice"))?;
        self.slice(start, len as i64)
    }

    /// Elements from the beginning up to `end` (exclusive).
    pub fn slice_end(&self, end: i64) -> KindResult<Value> {
        self.slice(0, end)
    }

    /// Half-open slice `[start, end)`; negative bounds count from the end.
    /// An empty result is returned when `start` is past `end`.
    pub fn slice(&self, start: i64, end: i64) -> KindResult<Value> {
        let len = self.len().ok_or_else(|| self.not_indexable("slice"))?;
        let start = normalize_bound(start, len)?;
        let end = normalize_bound(end, len)?.max(start);
        match self {
            Value::Literal(s) => Ok(Value::Literal(char_range(s, start, end))),
            Value::String(s) => Ok(Value::String(char_range(s, start, end))),
            Value::List(list) => Ok(Value::List(List {
                items: list.items[start..end].to_vec(),
                ..list.clone()
            })),
            Value::Pipe(list) => Ok(Value::Pipe(List {
                items: list.items[start..end].to_vec(),
                ..list.clone()
            })),
            Value::Quotation(quote) => Ok(Value::Quotation(quote.with_items(&quote.items[start..end]))),
            _ => Err(self.not_indexable("slice")),
        }
    }

    fn not_indexable(&self, op: &str) -> ErrorKind {
        ErrorKind::type_mismatch(format!("cannot {op} a {}", self.type_name()))
    }
}

fn normalize_index(index: i64, len: usize) -> KindResult<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(ErrorKind::IndexOutOfRange { index, len });
    }
    Ok(resolved as usize)
}

fn normalize_bound(bound: i64, len: usize) -> KindResult<usize> {
    let resolved = if bound < 0 { bound + len as i64 } else { bound };
    if resolved < 0 || resolved > len as i64 {
        return Err(ErrorKind::IndexOutOfRange { index: bound, len });
    }
    Ok(resolved as usize)
}

fn char_range(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end - start).collect()
}

/// Format a float without trailing zeros (`2.5`, `3`, `-0.125`).
pub fn format_float(f: f64) -> String {
    format!("{f}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(s) | Value::String(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(list) => write_list(f, list),
            Value::Pipe(list) => {
                write_list(f, list)?;
                f.write_str(" |")
            }
            Value::Quotation(quote) => {
                f.write_str("(")?;
                for (i, item) in quote.items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, list: &List) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in list.items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        match item {
            Value::String(s) => write!(f, "{s:?}")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("]")
}
