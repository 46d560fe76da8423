use catena::lang::tokenizing::{Token, TokenType, Tokenizer};
use catena::runtime::error::ErrorKind;
use pretty_assertions::assert_eq;
use test_case::test_case;

fn all_tokens(input: &str) -> Vec<Token> {
    let mut tokenizer = Tokenizer::new(input, None, false);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.next_token().unwrap().unwrap();
        let token_type = token.token_type();

        tokens.push(token);

        if token_type == TokenType::Eos {
            break;
        }
    }

    tokens
}

fn token_types(input: &str) -> Vec<TokenType> {
    all_tokens(input).iter().map(Token::token_type).collect()
}

fn first_token(input: &str) -> Token {
    let mut tokenizer = Tokenizer::new(input, None, false);
    tokenizer.next_token().unwrap().unwrap()
}

#[test_case("WORD", &[TokenType::Word, TokenType::Eos]; "single word")]
#[test_case("WORD1 WORD2 WORD3", &[TokenType::Word, TokenType::Word, TokenType::Word, TokenType::Eos]; "multiple words")]
#[test_case("[ 1 2 3 ]", &[TokenType::StartArray, TokenType::Word, TokenType::Word, TokenType::Word, TokenType::EndArray, TokenType::Eos]; "array tokens")]
#[test_case("{module}", &[TokenType::StartModule, TokenType::EndModule, TokenType::Eos]; "module tokens")]
#[test_case(": DOUBLE 2 * ;", &[TokenType::StartDef, TokenType::Word, TokenType::Word, TokenType::EndDef, TokenType::Eos]; "definition tokens")]
#[test_case("@: MEMOIZED 2 * ;", &[TokenType::StartMemo, TokenType::Word, TokenType::Word, TokenType::EndDef, TokenType::Eos]; "memo tokens")]
#[test_case("(1, 2) WORD", &[TokenType::Word, TokenType::Word, TokenType::Word, TokenType::Eos]; "parens and commas are whitespace")]
#[test_case("", &[TokenType::Eos]; "empty input")]
fn token_type_sequences(input: &str, expected: &[TokenType]) {
    assert_eq!(token_types(input), expected);
}

#[test_case(r#""hello world""#, "hello world"; "double quote string")]
#[test_case("'hello world'", "hello world"; "single quote string")]
#[test_case("^hello world^", "hello world"; "caret quote string")]
#[test_case("\"\"\"multi\nline\nstring\"\"\"", "multi\nline\nstring"; "triple quote string")]
#[test_case("''''''", ""; "empty triple quote string")]
#[test_case(r#""""#, ""; "empty string")]
fn string_tokens(input: &str, expected: &str) {
    let token = first_token(input);

    assert_eq!(token.token_type(), TokenType::String);
    assert_eq!(token.text(), expected);
}

#[test]
fn greedy_triple_quote_closer() {
    // A closing run of three delimiters followed by another delimiter is content, so strings can
    // end in quote characters.
    let token = first_token("\"\"\"a\"\"\"\"\"\"");

    assert_eq!(token.token_type(), TokenType::String);
    assert_eq!(token.text(), "a\"\"\"");

    let token = first_token("\"\"\"a\"\"\"\"");
    assert_eq!(token.text(), "a\"");
}

#[test]
fn comments_run_to_end_of_line() {
    let tokens = all_tokens("WORD1 # this is a comment\nWORD2");

    assert_eq!(tokens[0].token_type(), TokenType::Word);
    assert_eq!(tokens[0].text(), "WORD1");

    assert_eq!(tokens[1].token_type(), TokenType::Comment);
    assert!(tokens[1].text().contains("this is a comment"));

    assert_eq!(tokens[2].token_type(), TokenType::Word);
    assert_eq!(tokens[2].text(), "WORD2");
}

#[test_case(".field", TokenType::DotSymbol, "field"; "simple dot symbol")]
#[test_case(".field-name", TokenType::DotSymbol, "field-name"; "dot symbol with hyphen")]
#[test_case(".", TokenType::Word, "."; "lone dot is a word")]
fn dot_symbols(input: &str, expected_type: TokenType, expected_text: &str) {
    let token = first_token(input);

    assert_eq!(token.token_type(), expected_type);
    assert_eq!(token.text(), expected_text);
}

#[test]
fn memo_token_carries_the_name() {
    let tokens = all_tokens("@: MEMOIZED 2 * ;");

    assert_eq!(tokens[0].token_type(), TokenType::StartMemo);
    assert_eq!(tokens[0].text(), "MEMOIZED");
    assert_eq!(tokens[1].text(), "2");
}

#[test]
fn definition_token_carries_the_name() {
    let tokens = all_tokens(": DOUBLE 2 * ;");

    assert_eq!(tokens[0].token_type(), TokenType::StartDef);
    assert_eq!(tokens[0].text(), "DOUBLE");
}

#[test]
fn module_token_carries_the_name() {
    let tokens = all_tokens("{mymodule }");

    assert_eq!(tokens[0].token_type(), TokenType::StartModule);
    assert_eq!(tokens[0].text(), "mymodule");

    let tokens = all_tokens("{ }");
    assert_eq!(tokens[0].token_type(), TokenType::StartModule);
    assert_eq!(tokens[0].text(), "");
}

#[test]
fn datetime_with_zone_suffix_is_one_word() {
    let token = first_token("2025-05-20T08:00:00[America/Los_Angeles]");

    assert_eq!(token.token_type(), TokenType::Word);
    assert_eq!(token.text(), "2025-05-20T08:00:00[America/Los_Angeles]");
}

#[test]
fn bracket_after_plain_word_is_a_delimiter() {
    let types = token_types("ABC[1]");

    assert_eq!(
        types,
        vec![
            TokenType::Word,
            TokenType::StartArray,
            TokenType::Word,
            TokenType::EndArray,
            TokenType::Eos
        ]
    );
}

#[test]
fn html_entities_are_decoded() {
    let token = first_token("&lt;=&gt;");

    assert_eq!(token.token_type(), TokenType::Word);
    assert_eq!(token.text(), "<=>");
}

#[test]
fn whitespace_variants_separate_words() {
    let tokens = all_tokens("WORD1\t\tWORD2\n\nWORD3");
    let texts: Vec<&str> = tokens[..3].iter().map(Token::text).collect();

    assert_eq!(texts, vec!["WORD1", "WORD2", "WORD3"]);
}

#[test]
fn locations_track_lines_and_columns() {
    let tokens = all_tokens("WORD1\nWORD2");

    assert_eq!(tokens[0].location().line(), 1);
    assert_eq!(tokens[0].location().column(), 1);

    assert_eq!(tokens[1].location().line(), 2);
    assert_eq!(tokens[1].location().column(), 1);
}

#[test]
fn locations_are_monotonic_in_token_order() {
    let input = ": GREET 'hi' ;\n[ 1 2.5 ]\n{mod .key }\n# done";
    let tokens = all_tokens(input);

    let positions: Vec<(usize, usize)> = tokens
        .iter()
        .map(|token| (token.location().line(), token.location().column()))
        .collect();

    for pair in positions.windows(2) {
        assert!(pair[0] <= pair[1], "went backwards: {:?}", positions);
    }
}

#[test]
fn locations_carry_byte_offsets() {
    let tokens = all_tokens("AB CD");

    assert_eq!(tokens[0].location().start_pos(), 0);
    assert_eq!(tokens[0].location().end_pos(), 2);

    assert_eq!(tokens[1].location().start_pos(), 3);
    assert_eq!(tokens[1].location().end_pos(), 5);
}

#[test]
fn unterminated_string_is_an_error() {
    let mut tokenizer = Tokenizer::new("\"never closed", None, false);
    let err = tokenizer.next_token().unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::UnterminatedString);
    assert!(err.location().is_some());
}

#[test]
fn streaming_mode_defers_on_unterminated_strings() {
    let mut tokenizer = Tokenizer::new("\"never closed", None, true);
    assert!(tokenizer.next_token().unwrap().is_none());

    let mut tokenizer = Tokenizer::new("'''still open", None, true);
    assert!(tokenizer.next_token().unwrap().is_none());
}

#[test_case(": bad\"name ;"; "quote in definition name")]
#[test_case(": bad[name ;"; "bracket in definition name")]
#[test_case(": bad{name ;"; "brace in definition name")]
fn forbidden_characters_in_definition_names(input: &str) {
    let mut tokenizer = Tokenizer::new(input, None, false);
    let err = tokenizer.next_token().unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::InvalidDefinitionName(_)));
}
