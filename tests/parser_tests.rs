use pretty_assertions::assert_eq;
use rql::error::{GrammarError, RqlError};
use rql::parser::{parse, parse_query_string, split_fragments};
use rql::term::Tree;

fn rql(fragment: &str) -> String {
    parse(fragment).unwrap().to_string()
}

// ==================== Shorthand Tests ====================

#[test]
fn test_shorthand_matches_call_form() {
    let pairs = [
        ("shipCountry=France", "eq(shipCountry,France)"),
        ("freight=gt=10", "gt(freight,10)"),
        ("freight=gt(10)", "gt(freight,10)"),
        ("shipVia=in=1,2,3", "in(shipVia,1,2,3)"),
        ("limit=5", "eq(limit,5)"),
    ];
    for (shorthand, call) in pairs {
        let a = parse(shorthand).unwrap();
        let b = parse(call).unwrap();
        assert!(a.same_shape(&b), "{shorthand} vs {call}");
        assert_eq!(a.to_string(), call);
    }
}

#[test]
fn test_quoted_values_keep_quotes() {
    assert_eq!(rql("shipName='Hanari Carnes'"), "eq(shipName,'Hanari Carnes')");
    assert_eq!(rql(r#"eq(shipCity,"null")"#), r#"eq(shipCity,"null")"#);
}

#[test]
fn test_deep_nesting() {
    assert_eq!(
        rql("or(and(eq(a,1),not(n(b))),in(c,x,y))"),
        "or(and(eq(a,1),not(n(b))),in(c,x,y))"
    );
}

#[test]
fn test_bare_word_and_empty_call() {
    assert_eq!(parse("distinct").unwrap().token(), "distinct");
    assert!(parse("rowcount()").unwrap().children().is_empty());
}

// ==================== Query String Tests ====================

#[test]
fn test_query_string_into_one_tree() {
    let mut tree = Tree::new();
    let roots = parse_query_string(&mut tree, "a=1&sort(-b)&eq(c,'x&y')").unwrap();
    let rendered: Vec<String> = roots.iter().map(|r| tree.to_rql(*r)).collect();
    assert_eq!(rendered, vec!["eq(a,1)", "sort(-b)", "eq(c,'x&y')"]);
}

#[test]
fn test_split_skips_empty_fragments() {
    assert_eq!(split_fragments("&&a=1&&"), vec!["a=1"]);
    assert!(split_fragments("").is_empty());
}

#[test]
fn test_printed_form_reparses() {
    for source in [
        r"eq(name,a\,b)",
        r#"in(city,"Rio de Janeiro",Lyon)"#,
        "like(shipName,*Chop*)",
    ] {
        let first = parse(source).unwrap();
        let second = parse(&first.to_string()).unwrap();
        assert!(first.same_shape(&second), "{source}");
    }
}

// ==================== Error Tests ====================

#[test]
fn test_grammar_errors() {
    assert!(matches!(
        parse("and(eq(a,1)"),
        Err(RqlError::Grammar(GrammarError::UnclosedCall { .. }))
    ));
    assert!(matches!(
        parse("a==b"),
        Err(RqlError::Grammar(GrammarError::UnexpectedToken { .. }))
    ));
    assert!(matches!(
        parse("=5"),
        Err(RqlError::Grammar(GrammarError::EmptyKey { .. }))
    ));
    assert!(matches!(
        parse("\"sort\"(a)"),
        Err(RqlError::Grammar(GrammarError::QuotedFunction { .. }))
    ));
}
