//! Lexer tests using rstest for parameterization and insta for the
//! `--lex` listing format.

use insta::assert_snapshot;
use mshell_kernel::lexer::{tokenize, LexerError, TokenKind};
use rstest::rstest;

/// Kinds of all tokens before EOF, as their upper-case names.
fn kinds(input: &str) -> Vec<&'static str> {
    tokenize(input)
        .into_iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.kind.name())
        .collect()
}

fn listing(input: &str) -> String {
    tokenize(input)
        .iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.listing())
        .collect::<Vec<_>>()
        .join("\n")
}

#[rstest]
#[case::kw_true("true", &["TRUE"])]
#[case::kw_false("false", &["FALSE"])]
#[case::kw_if("if", &["IF"])]
#[case::kw_loop("loop", &["LOOP"])]
#[case::kw_break("break", &["BREAK"])]
#[case::kw_read("read", &["READ"])]
#[case::kw_str("str", &["STR"])]
#[case::kw_x("x", &["INTERPRET"])]
#[case::kw_and("and", &["AND"])]
#[case::kw_or("or", &["OR"])]
#[case::kw_not("not", &["NOT"])]
#[case::kw_export("export", &["EXPORT"])]
#[case::kw_soe("soe", &["STOP_ON_ERROR"])]
#[case::kw_def("def", &["DEF"])]
#[case::kw_end("end", &["END"])]
#[case::kw_o("o", &["STDOUT_LINES"])]
#[case::kw_os("os", &["STDOUT_STRIPPED"])]
#[case::kw_oc("oc", &["STDOUT_COMPLETE"])]
#[case::kw_int("int", &["TYPE_INT"])]
#[case::kw_float("float", &["TYPE_FLOAT"])]
#[case::kw_bool("bool", &["TYPE_BOOL"])]
#[case::kw_double_dash("--", &["DOUBLE_DASH"])]
fn lexer_keywords(#[case] input: &str, #[case] expected: &[&str]) {
    assert_eq!(kinds(input), expected);
}

#[rstest]
#[case::keyword_prefix("trueish", &["LITERAL"])]
#[case::keyword_suffix("xs", &["LITERAL"])]
#[case::hyphenated("-rot", &["LITERAL"])]
#[case::flag("-l", &["LITERAL"])]
#[case::path("/usr/bin/env", &["LITERAL"])]
#[case::tilde("~/src", &["LITERAL"])]
#[case::digits_then_letters("12abc", &["LITERAL"])]
#[case::dot_word(".s", &["LITERAL"])]
fn lexer_literals(#[case] input: &str, #[case] expected: &[&str]) {
    assert_eq!(kinds(input), expected);
}

#[rstest]
#[case::int("42", &["INTEGER"])]
#[case::negative_int("-7", &["INTEGER"])]
#[case::float("3.25", &["FLOAT"])]
#[case::negative_float("-0.5", &["FLOAT"])]
#[case::lone_minus("-", &["MINUS"])]
#[case::minus_between("3 - 4", &["INTEGER", "MINUS", "INTEGER"])]
fn lexer_numbers(#[case] input: &str, #[case] expected: &[&str]) {
    assert_eq!(kinds(input), expected);
}

#[rstest]
#[case::indexer(":1:", &["INDEXER"])]
#[case::negative_indexer(":-1:", &["INDEXER"])]
#[case::end_indexer(":3", &["END_INDEXER"])]
#[case::start_indexer("2:", &["START_INDEXER"])]
#[case::slice("1:-1", &["SLICE_INDEXER"])]
fn lexer_indexers(#[case] input: &str, #[case] expected: &[&str]) {
    assert_eq!(kinds(input), expected);
}

#[rstest]
#[case::brackets("[ ]", &["LEFT_BRACKET", "RIGHT_BRACKET"])]
#[case::parens("( )", &["LEFT_PAREN", "RIGHT_PAREN"])]
#[case::execute(";", &["EXECUTE"])]
#[case::question("?", &["QUESTION"])]
#[case::pipe("|", &["PIPE"])]
#[case::equals("=", &["EQUALS"])]
#[case::ampersand("&", &["AMPERSAND"])]
#[case::plus("+", &["PLUS"])]
#[case::comparisons("< > <= >=", &["LESSTHAN", "GREATERTHAN", "LESSTHAN_OR_EQ", "GREATERTHAN_OR_EQ"])]
#[case::stderr_redirect("2>", &["STDERR_REDIRECT"])]
#[case::tight_list("[ls]", &["LEFT_BRACKET", "LITERAL", "RIGHT_BRACKET"])]
fn lexer_punctuation(#[case] input: &str, #[case] expected: &[&str]) {
    assert_eq!(kinds(input), expected);
}

#[rstest]
#[case::store("count!", &["VAR_STORE"])]
#[case::retrieve("@count", &["VAR_RETRIEVE"])]
#[case::positional("$1", &["POSITIONAL"])]
#[case::string(r#""a b""#, &["STRING"])]
#[case::escaped_quote(r#""say \"hi\"""#, &["STRING"])]
#[case::single_quoted("'raw \\n'", &["SINGLE_QUOTE_STRING"])]
#[case::comment("1 # ignored [", &["INTEGER"])]
fn lexer_names_and_strings(#[case] input: &str, #[case] expected: &[&str]) {
    assert_eq!(kinds(input), expected);
}

#[test]
fn stream_ends_in_eof() {
    let tokens = tokenize("1 2");
    let last = tokens.last().expect("at least EOF");
    assert_eq!(last.kind, TokenKind::Eof);
    assert_eq!(last.start, 3);
}

#[test]
fn lexemes_round_trip_to_source() {
    let source = "[printf \"a\\nb\"] o ;\n  @x 1:3 wl";
    for token in tokenize(source).iter().filter(|t| t.kind != TokenKind::Eof) {
        assert_eq!(&source[token.start..token.start + token.lexeme.len()], token.lexeme);
    }
}

#[rstest]
#[case::unterminated_double("1 \"abc", LexerError::UnterminatedString)]
#[case::unterminated_single("'abc", LexerError::UnterminatedString)]
#[case::invalid_escape(r#""\q""#, LexerError::InvalidEscape)]
fn lexer_errors(#[case] input: &str, #[case] expected: LexerError) {
    let tokens = tokenize(input);
    let last = tokens.last().expect("error token");
    assert_eq!(last.kind, TokenKind::Error);
    assert_eq!(last.lex_error(), Some(expected));
}

#[test]
fn lexing_stops_at_first_error() {
    let tokens = tokenize("1 \"open\n2 3");
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[1].kind, TokenKind::Error);
}

#[test]
fn listing_format() {
    assert_snapshot!(listing("[ls -l] ;\n@HOME wl\n  x! 2.5"), @r"
    1:1:LEFT_BRACKET [
    1:2:LITERAL ls
    1:5:LITERAL -l
    1:7:RIGHT_BRACKET ]
    1:9:EXECUTE ;
    2:1:VAR_RETRIEVE @HOME
    2:7:LITERAL wl
    3:3:VAR_STORE x!
    3:6:FLOAT 2.5
    ");
}

#[test]
fn listing_of_a_pipeline() {
    assert_snapshot!(listing("[[cat f] [grep y]] | os ;"), @r"
    1:1:LEFT_BRACKET [
    1:2:LEFT_BRACKET [
    1:3:LITERAL cat
    1:7:LITERAL f
    1:8:RIGHT_BRACKET ]
    1:10:LEFT_BRACKET [
    1:11:LITERAL grep
    1:16:LITERAL y
    1:17:RIGHT_BRACKET ]
    1:18:RIGHT_BRACKET ]
    1:20:PIPE |
    1:22:STDOUT_STRIPPED os
    1:25:EXECUTE ;
    ");
}
