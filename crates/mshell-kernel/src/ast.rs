//! Parse tree for mshell programs.
//!
//! The tree is shallow: a program is a flat sequence of items, where an item
//! is a single token, a bracketed list, or a parenthesized quotation. The
//! evaluator walks items left to right against a stack.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::lexer::Token;

/// One element of a program body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ParseItem {
    Token(Token),
    List(ParseList),
    Quotation(ParseQuote),
}

/// `[ ... ]` in source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseList {
    pub items: Vec<ParseItem>,
}

/// `( ... )` in source.
///
/// Items are shared so that quotation values built from this node on every
/// evaluation (loop bodies, definition calls) do not copy the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseQuote {
    #[serde(rename = "tokens")]
    pub items: Arc<[ParseItem]>,
}

impl ParseQuote {
    pub fn new(items: Vec<ParseItem>) -> Self {
        Self { items: items.into() }
    }
}

/// `def name ... end`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub name: String,
    pub items: Arc<[ParseItem]>,
}

/// A parsed program: top-level definitions plus the main body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct File {
    pub definitions: Vec<Definition>,
    pub items: Vec<ParseItem>,
}

impl fmt::Display for ParseItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseItem::Token(token) => f.write_str(&token.lexeme),
            ParseItem::List(list) => {
                f.write_str("[")?;
                write_items(f, &list.items)?;
                f.write_str("]")
            }
            ParseItem::Quotation(quote) => {
                f.write_str("(")?;
                write_items(f, &quote.items)?;
                f.write_str(")")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[ParseItem]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
