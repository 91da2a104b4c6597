use pretty_assertions::assert_eq;
use rql::error::LexError;
use rql::{tokenize, Lexer, TokenKind};

fn texts(source: &str) -> Vec<String> {
    tokenize(source)
        .unwrap()
        .into_iter()
        .filter(|t| t.is_text())
        .map(|t| t.text)
        .collect()
}

// ==================== Structure Tests ====================

#[test]
fn test_nested_call() {
    let kinds: Vec<TokenKind> = tokenize("and(eq(a,1),n(b))")
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Text,
            TokenKind::LParen,
            TokenKind::Text,
            TokenKind::LParen,
            TokenKind::Text,
            TokenKind::Comma,
            TokenKind::Text,
            TokenKind::RParen,
            TokenKind::Comma,
            TokenKind::Text,
            TokenKind::LParen,
            TokenKind::Text,
            TokenKind::RParen,
            TokenKind::RParen,
        ]
    );
}

#[test]
fn test_shorthand_tokens() {
    assert_eq!(texts("age=ge=18"), vec!["age", "ge", "18"]);
    assert_eq!(texts("orderDate=ge=1996-07-01"), vec!["orderDate", "ge", "1996-07-01"]);
}

#[test]
fn test_dotted_paths_are_one_word() {
    assert_eq!(texts("eq(customer.country,Germany)"), vec!["eq", "customer.country", "Germany"]);
}

#[test]
fn test_wildcards_are_plain_text() {
    assert_eq!(texts("like(shipName,*Chop*)"), vec!["like", "shipName", "*Chop*"]);
}

// ==================== Literal Tests ====================

#[test]
fn test_double_and_single_quotes() {
    let tokens = tokenize(r#"in(city,"Rio de Janeiro",'São Paulo')"#).unwrap();
    let quoted: Vec<_> = tokens
        .iter()
        .filter(|t| t.quote.is_some())
        .map(|t| (t.text.as_str(), t.quote))
        .collect();
    assert_eq!(
        quoted,
        vec![("Rio de Janeiro", Some('"')), ("São Paulo", Some('\''))]
    );
}

#[test]
fn test_escaped_parens() {
    assert_eq!(texts(r"eq(name,a\(b\))"), vec!["eq", "name", "a(b)"]);
}

#[test]
fn test_spans_cover_source() {
    let tokens = tokenize("eq(a,b)").unwrap();
    assert_eq!(tokens[0].span.start, 0);
    assert_eq!(tokens[0].span.end, 2);
    assert_eq!(tokens.last().unwrap().span.end, 7);
}

// ==================== Error Tests ====================

#[test]
fn test_errors_carry_positions() {
    assert_eq!(
        tokenize("eq(a,\"b)"),
        Err(LexError::UnterminatedQuote { position: 5 })
    );
    assert_eq!(
        tokenize("eq(a,b))"),
        Err(LexError::StrayClosingParen { position: 7 })
    );
}

#[test]
fn test_lexer_is_an_iterator() {
    let count = Lexer::new("sort(-orderDate)").filter_map(Result::ok).count();
    assert_eq!(count, 4);
}
