//! Parser for mshell source code.
//!
//! Groups the lexer's token vector into a [`File`]: bracketed lists,
//! parenthesized quotations, and top-level `def name ... end` blocks.
//! Uses chumsky parser combinators over a token slice.

use std::fmt;

use chumsky::{error::RichReason, input::ValueInput, prelude::*};

use crate::ast::{Definition, File, ParseItem, ParseList, ParseQuote};
use crate::lexer::{self, Token, TokenKind};

/// Span type used throughout the parser (byte offsets into the source).
pub type Span = SimpleSpan;

type Extra<'tokens> = extra::Err<Rich<'tokens, Token, Span>>;

/// Parse error with a source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Lex and parse source text in one step.
pub fn parse_source(source: &str) -> Result<File, ParseError> {
    parse(&lexer::tokenize(source))
}

/// Parse a token vector (as produced by [`lexer::tokenize`]) into a [`File`].
///
/// The trailing EOF token is ignored. An ERROR token is reported as a parse
/// error carrying the lexer's message.
pub fn parse(tokens: &[Token]) -> Result<File, ParseError> {
    if let Some(bad) = tokens.iter().find(|t| t.kind == TokenKind::Error) {
        let message = bad
            .lex_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "lexer error".to_string());
        return Err(ParseError {
            line: bad.line,
            column: bad.column,
            message,
        });
    }

    let eof = tokens.iter().find(|t| t.kind == TokenKind::Eof).cloned();
    let spanned: Vec<(Token, Span)> = tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| {
            let span: Span = (t.start..t.start + t.lexeme.len()).into();
            (t.clone(), span)
        })
        .collect();

    let end = eof.as_ref().map(|t| t.start).unwrap_or_else(|| {
        spanned.last().map(|(_, s)| s.end).unwrap_or(0)
    });
    let end_span: Span = (end..end).into();

    let parser = file_parser();
    let result = parser.parse(spanned.as_slice().map(end_span, |(t, s)| (t, s)));

    result.into_result().map_err(|errs| {
        let first = errs.into_iter().next();
        match first {
            Some(err) => {
                let offset = err.span().start;
                let offending = token_at(&spanned, offset);
                let (line, column) = offending
                    .or(eof.as_ref())
                    .map(|t| (t.line, t.column))
                    .unwrap_or((1, 1));
                ParseError {
                    line,
                    column,
                    message: describe(&err, offending),
                }
            }
            None => ParseError {
                line: 1,
                column: 1,
                message: "parse failed".to_string(),
            },
        }
    })
}

/// The first token at or after a byte offset reported by chumsky.
fn token_at(tokens: &[(Token, Span)], offset: usize) -> Option<&Token> {
    tokens
        .iter()
        .find(|(_, span)| span.start >= offset)
        .map(|(t, _)| t)
}

/// Error text, named after the token the parser stopped on.
///
/// The token comes from the error's span rather than `found()`, so a
/// stray closer is reported even when chumsky merged its expectations
/// into an end-of-input error.
fn describe(err: &Rich<'_, Token, Span>, offending: Option<&Token>) -> String {
    if let RichReason::Custom(message) = err.reason() {
        return message.to_string();
    }
    match offending.or(err.found()) {
        None => "unexpected end of input".to_string(),
        Some(token) => match token.kind {
            TokenKind::End => "'end' without 'def'".to_string(),
            TokenKind::RightBracket => "unbalanced ']'".to_string(),
            TokenKind::RightParen => "unbalanced ')'".to_string(),
            TokenKind::Def => "'def' is only allowed at the top level".to_string(),
            _ => format!("unexpected {token}"),
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parser Combinators - generic over input type
// ═══════════════════════════════════════════════════════════════════════════

enum TopLevel {
    Definition(Definition),
    Item(ParseItem),
}

/// Match a single token of the given kind.
fn kind<'tokens, I>(k: TokenKind) -> impl Parser<'tokens, I, Token, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    any().filter(move |t: &Token| t.kind == k)
}

/// Tokens that stand alone as items.
fn is_atom(kind: TokenKind) -> bool {
    !matches!(
        kind,
        TokenKind::LeftBracket
            | TokenKind::RightBracket
            | TokenKind::LeftParen
            | TokenKind::RightParen
            | TokenKind::Def
            | TokenKind::End
            | TokenKind::Eof
            | TokenKind::Error
    )
}

/// Top-level program parser.
fn file_parser<'tokens, I>() -> impl Parser<'tokens, I, File, Extra<'tokens>>
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    choice((
        definition_parser().map(TopLevel::Definition),
        item_parser().map(TopLevel::Item),
    ))
    .repeated()
    .collect::<Vec<_>>()
    .then_ignore(end())
    .map(|entries| {
        let mut file = File::default();
        for entry in entries {
            match entry {
                TopLevel::Definition(def) => file.definitions.push(def),
                TopLevel::Item(item) => file.items.push(item),
            }
        }
        file
    })
}

/// `def NAME items... end`
fn definition_parser<'tokens, I>() -> impl Parser<'tokens, I, Definition, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    let name = any().try_map(|t: Token, span| {
        if t.kind == TokenKind::Literal {
            Ok(t.lexeme)
        } else {
            Err(Rich::custom(span, "expected definition name after 'def'"))
        }
    });

    kind(TokenKind::Def)
        .ignore_then(name)
        .then(item_parser().repeated().collect::<Vec<_>>())
        .then_ignore(kind(TokenKind::End))
        .map(|(name, items)| Definition {
            name,
            items: items.into(),
        })
}

/// A token, list, or quotation. Lists and quotations nest.
fn item_parser<'tokens, I>() -> impl Parser<'tokens, I, ParseItem, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    recursive(|item| {
        let list = kind(TokenKind::LeftBracket)
            .ignore_then(item.clone().repeated().collect::<Vec<_>>())
            .then_ignore(kind(TokenKind::RightBracket))
            .map(|items| ParseItem::List(ParseList { items }));

        let quote = kind(TokenKind::LeftParen)
            .ignore_then(item.repeated().collect::<Vec<_>>())
            .then_ignore(kind(TokenKind::RightParen))
            .map(|items| ParseItem::Quotation(ParseQuote::new(items)));

        let atom = any()
            .filter(|t: &Token| is_atom(t.kind))
            .map(ParseItem::Token);

        choice((list, quote, atom))
    })
}
