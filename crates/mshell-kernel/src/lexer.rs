//! Lexer for mshell source code.
//!
//! Converts source text into a vector of [`Token`]s using the logos lexer
//! generator. Every input lexes to *something*: the only failures are an
//! unterminated string or an invalid escape inside a double-quoted string,
//! and those end the token vector with a single [`TokenKind::Error`] token.
//!
//! # Token Categories
//!
//! - **Keywords**: `if`, `loop`, `break`, `def`, `end`, `x`, `o`, `os`, `oc`, ...
//! - **Literals**: bare words, strings (`"..."`, `'...'`), integers, floats
//! - **Indexers**: `:n:`, `n:`, `:n`, `n:m`
//! - **Redirections**: `<`, `>`, `2>`
//! - **Variables**: `name!` (store), `@name` (retrieve), `$n` (positional)

use std::fmt;

use logos::Logos;
use serde::{Serialize, Serializer};

/// Lexer error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexerError {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    InvalidEscape,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter => write!(f, "unexpected character"),
            LexerError::UnterminatedString => write!(f, "unterminated string"),
            LexerError::InvalidEscape => write!(f, "invalid escape sequence"),
        }
    }
}

impl std::error::Error for LexerError {}

/// Token kinds produced by the mshell lexer.
///
/// Logos picks the longest match; ties between a specific pattern and the
/// catch-all [`TokenKind::Literal`] are broken by explicit priorities, so
/// `12` is an integer while `12abc` is a literal.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(error = LexerError)]
#[logos(skip r"\s+")]
pub enum TokenKind {
    /// End of input. Always the last token of a successful lex.
    Eof,
    /// Lexing stopped here: unterminated string or invalid escape.
    Error,

    // ═══════════════════════════════════════════════════════════════════
    // Keywords (token priority beats the literal regex)
    // ═══════════════════════════════════════════════════════════════════
    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("if")]
    If,

    #[token("loop")]
    Loop,

    #[token("break")]
    Break,

    #[token("read")]
    Read,

    #[token("str")]
    Str,

    #[token("x")]
    Interpret,

    #[token("and")]
    And,

    #[token("or")]
    Or,

    #[token("not")]
    Not,

    #[token("export")]
    Export,

    #[token("soe")]
    StopOnError,

    #[token("def")]
    Def,

    #[token("end")]
    End,

    #[token("o")]
    StdoutLines,

    #[token("os")]
    StdoutStripped,

    #[token("oc")]
    StdoutComplete,

    #[token("int")]
    TypeInt,

    #[token("float")]
    TypeFloat,

    #[token("bool")]
    TypeBool,

    #[token("--")]
    DoubleDash,

    // ═══════════════════════════════════════════════════════════════════
    // Operators and punctuation
    // ═══════════════════════════════════════════════════════════════════
    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token(";")]
    Execute,

    #[token("?")]
    Question,

    #[token("|")]
    Pipe,

    #[token("=")]
    Equals,

    #[token("&")]
    Ampersand,

    #[token("+")]
    Plus,

    /// Standalone `-`. A `-` followed by digits is a negative number and a
    /// `-` followed by other literal characters is a literal (`--lex`, `-rot`).
    #[token("-")]
    Minus,

    #[token("<")]
    LessThan,

    #[token(">")]
    GreaterThan,

    #[token("<=")]
    LessThanOrEq,

    #[token(">=")]
    GreaterThanOrEq,

    /// `2>` (any digit run directly followed by `>`).
    #[regex(r"[0-9]+>", priority = 5)]
    StderrRedirect,

    // ═══════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════
    /// Double-quoted string. The lexeme keeps its quotes; escapes are
    /// validated here and resolved by [`parse_string_literal`].
    #[regex(r#""([^"\\]|\\(.|\n))*""#, validate_string, priority = 10, allow_greedy = true)]
    String,

    /// Single-quoted string, no escape processing.
    #[regex(r"'[^']*'", priority = 10, allow_greedy = true)]
    SingleQuoteString,

    #[regex(r"-?[0-9]+", priority = 5)]
    Integer,

    #[regex(r"-?[0-9]+\.[0-9]+", priority = 5)]
    Float,

    /// `:n:`: index a single element.
    #[regex(r":-?[0-9]+:", priority = 5)]
    Indexer,

    /// `:n`: slice from the start up to `n`.
    #[regex(r":-?[0-9]+", priority = 5)]
    EndIndexer,

    /// `n:`: slice from `n` to the end.
    #[regex(r"-?[0-9]+:", priority = 5)]
    StartIndexer,

    /// `n:m`: slice from `n` up to `m`.
    #[regex(r"-?[0-9]+:-?[0-9]+", priority = 5)]
    SliceIndexer,

    /// `$n`: positional argument.
    #[regex(r"\$[0-9]+", priority = 5)]
    Positional,

    /// `name!`: pop and store into a variable.
    #[regex(r##"([^\s\[\]()<>;?!@=\&|"'\#][^\s\[\]()<>;?!@=\&|]*)?!"##, priority = 5, allow_greedy = true)]
    VarStore,

    /// `@name`: push a variable.
    #[regex(r"@[^\s\[\]()<>;?!@=\&|]*", priority = 5, allow_greedy = true)]
    VarRetrieve,

    /// Bare word: command names, paths, flags, built-in operator names.
    #[regex(r##"[^\s\[\]()<>;?!@=\&|"'\#][^\s\[\]()<>;?!@=\&|]*"##, priority = 1, allow_greedy = true)]
    Literal,

    // ═══════════════════════════════════════════════════════════════════
    // Invalid patterns (callbacks always fail)
    // ═══════════════════════════════════════════════════════════════════
    /// Invalid: `"` without a closing quote.
    #[regex(r#""([^"\\]|\\(.|\n))*"#, unterminated, priority = 9, allow_greedy = true)]
    UnterminatedString,

    /// Invalid: `'` without a closing quote.
    #[regex(r"'[^']*", unterminated, priority = 9, allow_greedy = true)]
    UnterminatedSingleQuote,

    /// Comment: `#` to end of line. Filtered out by [`tokenize`].
    #[regex(r"#[^\n]*", priority = 5, allow_greedy = true)]
    Comment,
}

fn validate_string(lex: &mut logos::Lexer<TokenKind>) -> Result<(), LexerError> {
    parse_string_literal(lex.slice()).map(|_| ())
}

fn unterminated(_lex: &mut logos::Lexer<TokenKind>) -> Result<(), LexerError> {
    Err(LexerError::UnterminatedString)
}

/// The keyword table: lexeme → kind.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("not", TokenKind::Not),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("if", TokenKind::If),
    ("loop", TokenKind::Loop),
    ("read", TokenKind::Read),
    ("str", TokenKind::Str),
    ("soe", TokenKind::StopOnError),
    ("break", TokenKind::Break),
    ("def", TokenKind::Def),
    ("end", TokenKind::End),
    ("export", TokenKind::Export),
    ("x", TokenKind::Interpret),
    ("int", TokenKind::TypeInt),
    ("float", TokenKind::TypeFloat),
    ("bool", TokenKind::TypeBool),
    ("--", TokenKind::DoubleDash),
    ("o", TokenKind::StdoutLines),
    ("os", TokenKind::StdoutStripped),
    ("oc", TokenKind::StdoutComplete),
];

impl TokenKind {
    /// The upper-case name used by `--lex` and the JSON dump.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Eof => "EOF",
            TokenKind::Error => "ERROR",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::If => "IF",
            TokenKind::Loop => "LOOP",
            TokenKind::Break => "BREAK",
            TokenKind::Read => "READ",
            TokenKind::Str => "STR",
            TokenKind::Interpret => "INTERPRET",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Export => "EXPORT",
            TokenKind::StopOnError => "STOP_ON_ERROR",
            TokenKind::Def => "DEF",
            TokenKind::End => "END",
            TokenKind::StdoutLines => "STDOUT_LINES",
            TokenKind::StdoutStripped => "STDOUT_STRIPPED",
            TokenKind::StdoutComplete => "STDOUT_COMPLETE",
            TokenKind::TypeInt => "TYPE_INT",
            TokenKind::TypeFloat => "TYPE_FLOAT",
            TokenKind::TypeBool => "TYPE_BOOL",
            TokenKind::DoubleDash => "DOUBLE_DASH",
            TokenKind::LeftBracket => "LEFT_BRACKET",
            TokenKind::RightBracket => "RIGHT_BRACKET",
            TokenKind::LeftParen => "LEFT_PAREN",
            TokenKind::RightParen => "RIGHT_PAREN",
            TokenKind::Execute => "EXECUTE",
            TokenKind::Question => "QUESTION",
            TokenKind::Pipe => "PIPE",
            TokenKind::Equals => "EQUALS",
            TokenKind::Ampersand => "AMPERSAND",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::LessThan => "LESSTHAN",
            TokenKind::GreaterThan => "GREATERTHAN",
            TokenKind::LessThanOrEq => "LESSTHAN_OR_EQ",
            TokenKind::GreaterThanOrEq => "GREATERTHAN_OR_EQ",
            TokenKind::StderrRedirect => "STDERR_REDIRECT",
            TokenKind::String => "STRING",
            TokenKind::SingleQuoteString => "SINGLE_QUOTE_STRING",
            TokenKind::Integer => "INTEGER",
            TokenKind::Float => "FLOAT",
            TokenKind::Indexer => "INDEXER",
            TokenKind::EndIndexer => "END_INDEXER",
            TokenKind::StartIndexer => "START_INDEXER",
            TokenKind::SliceIndexer => "SLICE_INDEXER",
            TokenKind::Positional => "POSITIONAL",
            TokenKind::VarStore => "VAR_STORE",
            TokenKind::VarRetrieve => "VAR_RETRIEVE",
            TokenKind::Literal => "LITERAL",
            TokenKind::UnterminatedString | TokenKind::UnterminatedSingleQuote => "ERROR",
            TokenKind::Comment => "COMMENT",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TokenKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A lexed token with its exact source slice and position.
///
/// `line` and `column` are 1-based; `start` is the byte offset of the
/// lexeme in the source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
    pub start: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize, start: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
            start,
        }
    }

    /// The error that produced an [`TokenKind::Error`] token.
    ///
    /// Error tokens keep the offending lexeme, which is enough to tell an
    /// unterminated string from a bad escape.
    pub fn lex_error(&self) -> Option<LexerError> {
        if self.kind != TokenKind::Error {
            return None;
        }
        if self.lexeme.starts_with('"') {
            return Some(parse_string_literal(&self.lexeme).err().unwrap_or(LexerError::UnterminatedString));
        }
        if self.lexeme.starts_with('\'') {
            return Some(LexerError::UnterminatedString);
        }
        Some(LexerError::UnexpectedCharacter)
    }

    /// `line:col` prefix used by diagnostics.
    pub fn position(&self) -> String {
        format!("{}:{}", self.line, self.column)
    }

    /// One line of the `--lex` listing: `line:col:KIND lexeme`.
    pub fn listing(&self) -> String {
        format!("{}:{}:{} {}", self.line, self.column, self.kind.name(), self.lexeme)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}

/// Maps byte offsets to 1-based line and column numbers.
struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, line_starts }
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = self.source[self.line_starts[line]..offset].chars().count() + 1;
        (line + 1, column)
    }
}

/// Tokenize source code.
///
/// The returned vector always ends in [`TokenKind::Eof`], or in a single
/// [`TokenKind::Error`] token at the first unterminated string or invalid
/// escape. Comments are dropped.
pub fn tokenize(source: &str) -> Vec<Token> {
    let lines = LineIndex::new(source);
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let (line, column) = lines.position(span.start);
        match result {
            Ok(TokenKind::Comment) => {}
            Ok(kind) => tokens.push(Token::new(kind, lexer.slice(), line, column, span.start)),
            Err(_) => {
                tokens.push(Token::new(TokenKind::Error, lexer.slice(), line, column, span.start));
                return tokens;
            }
        }
    }

    let (line, column) = lines.position(source.len());
    tokens.push(Token::new(TokenKind::Eof, "", line, column, source.len()));
    tokens
}

/// Extract the content of a double-quoted string lexeme.
///
/// Removes the surrounding quotes and resolves `\n \t \r \\ \"`. Any other
/// escape is [`LexerError::InvalidEscape`]; a missing closing quote is
/// [`LexerError::UnterminatedString`].
pub fn parse_string_literal(source: &str) -> Result<String, LexerError> {
    let mut chars = source.chars();
    if chars.next() != Some('"') {
        return Err(LexerError::UnterminatedString);
    }

    let mut result = String::with_capacity(source.len());
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(_) => return Err(LexerError::InvalidEscape),
                None => return Err(LexerError::UnterminatedString),
            },
            '"' => {
                return if chars.next().is_none() {
                    Ok(result)
                } else {
                    Err(LexerError::UnexpectedCharacter)
                };
            }
            _ => result.push(ch),
        }
    }

    Err(LexerError::UnterminatedString)
}

/// Extract the content of a single-quoted string lexeme (no escapes).
pub fn parse_single_quoted(source: &str) -> &str {
    source
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(source)
}
