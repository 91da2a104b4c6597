//! Parser for RQL fragments.
//!
//! Two surface grammars are accepted and both produce the same tree shape:
//!
//! * call form: `eq(name,Bob)`, `and(gt(age,18),n(deleted))`
//! * shorthand: `name=Bob` becomes `eq(name,Bob)`, `age=ge=18` becomes
//!   `ge(age,18)` and `age=gt(18)` becomes `gt(age,18)`

use std::fmt;

use tracing::debug;

use crate::error::{GrammarError, RqlResult};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::term::{TermId, Tree};

/// A single parsed fragment that owns its tree
#[derive(Debug, Clone)]
pub struct ParsedTerm {
    pub tree: Tree,
    pub root: TermId,
}

impl ParsedTerm {
    pub fn token(&self) -> &str {
        self.tree.token(self.root)
    }

    pub fn children(&self) -> Vec<&str> {
        self.tree
            .children(self.root)
            .iter()
            .map(|c| self.tree.token(*c))
            .collect()
    }

    /// Structural equality (tokens, quoting, shape)
    pub fn same_shape(&self, other: &ParsedTerm) -> bool {
        self.tree.same_shape(self.root, &other.tree, other.root)
    }
}

impl fmt::Display for ParsedTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree.display(self.root))
    }
}

/// One top-level term plus whether it was written with parentheses
#[derive(Debug, Clone, Copy)]
struct Parsed {
    id: TermId,
    is_call: bool,
}

pub struct Parser<'a, 't> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
    tree: &'t mut Tree,
}

impl<'a, 't> Parser<'a, 't> {
    pub fn new(source: &'a str, tree: &'t mut Tree) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
            tree,
        }
    }

    // ==================== Helper Methods ====================

    fn advance(&mut self) -> RqlResult<Option<Token>> {
        if let Some(token) = self.peeked.take() {
            return Ok(Some(token));
        }
        Ok(self.lexer.next().transpose()?)
    }

    fn peek_kind(&mut self) -> RqlResult<Option<TokenKind>> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next().transpose()?;
        }
        Ok(self.peeked.as_ref().map(|t| t.kind))
    }

    fn unexpected(expected: &str, found: &Token) -> GrammarError {
        GrammarError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            position: found.span.start,
        }
    }

    // ==================== Grammar ====================

    /// Parse a whole fragment into a single term
    pub fn parse(&mut self) -> RqlResult<TermId> {
        let fragment = self.lexer.source();
        let mut segments: Vec<Vec<Parsed>> = vec![Vec::new()];

        while let Some(token) = self.advance()? {
            match token.kind {
                TokenKind::Equals => segments.push(Vec::new()),
                TokenKind::Text => {
                    let parsed = self.parse_term(token)?;
                    if let Some(segment) = segments.last_mut() {
                        segment.push(parsed);
                    }
                }
                _ => return Err(Self::unexpected("a term", &token).into()),
            }
        }

        match segments.len() {
            1 => self.single(fragment, segments.remove(0)),
            2 => {
                let values = segments.remove(1);
                let key = self.key(fragment, segments.remove(0))?;
                Ok(self.key_value(key, values))
            }
            3 => {
                let values = segments.remove(2);
                let op = segments.remove(1);
                let key = self.key(fragment, segments.remove(0))?;
                self.key_op_value(fragment, key, op, values)
            }
            _ => Err(GrammarError::TooManyOperators {
                fragment: fragment.to_string(),
            }
            .into()),
        }
    }

    fn single(&mut self, fragment: &str, mut terms: Vec<Parsed>) -> RqlResult<TermId> {
        match terms.len() {
            1 => Ok(terms.remove(0).id),
            0 => Err(GrammarError::UnexpectedToken {
                expected: "a term".to_string(),
                found: "end of input".to_string(),
                position: fragment.len(),
            }
            .into()),
            _ => Err(GrammarError::UnexpectedToken {
                expected: "'=' or end of input".to_string(),
                found: self.tree.to_rql(terms[1].id),
                position: 0,
            }
            .into()),
        }
    }

    fn key(&mut self, fragment: &str, terms: Vec<Parsed>) -> RqlResult<TermId> {
        match terms.as_slice() {
            [] => Err(GrammarError::EmptyKey {
                fragment: fragment.to_string(),
            }
            .into()),
            [only] if !only.is_call => Ok(only.id),
            _ => Err(GrammarError::UnexpectedToken {
                expected: "a single column name before '='".to_string(),
                found: fragment.to_string(),
                position: 0,
            }
            .into()),
        }
    }

    fn values(&mut self, values: Vec<Parsed>) -> Vec<TermId> {
        if values.is_empty() {
            // `key=` compares against the empty string
            return vec![self.tree.leaf("", Some('"'))];
        }
        values.into_iter().map(|v| v.id).collect()
    }

    fn key_value(&mut self, key: TermId, values: Vec<Parsed>) -> TermId {
        if let [only] = values.as_slice() {
            if only.is_call {
                self.tree.insert_child(only.id, 0, key);
                return only.id;
            }
        }
        let mut children = vec![key];
        children.extend(self.values(values));
        self.tree.call("eq", children)
    }

    fn key_op_value(
        &mut self,
        fragment: &str,
        key: TermId,
        op: Vec<Parsed>,
        values: Vec<Parsed>,
    ) -> RqlResult<TermId> {
        let op = match op.as_slice() {
            [only] if !only.is_call && !self.tree.is_quoted(only.id) => {
                self.tree.token(only.id).to_string()
            }
            _ => {
                return Err(GrammarError::UnexpectedToken {
                    expected: "an operator between '=' signs".to_string(),
                    found: fragment.to_string(),
                    position: 0,
                }
                .into())
            }
        };
        let mut children = vec![key];
        children.extend(self.values(values));
        Ok(self.tree.call(op, children))
    }

    fn parse_term(&mut self, token: Token) -> RqlResult<Parsed> {
        if self.peek_kind()? != Some(TokenKind::LParen) {
            let id = self.tree.leaf(token.text, token.quote);
            return Ok(Parsed { id, is_call: false });
        }
        if token.quote.is_some() {
            return Err(GrammarError::QuotedFunction { token: token.text }.into());
        }
        self.advance()?;
        let args = self.parse_args(&token.text)?;
        let id = self.tree.call(token.text, args);
        Ok(Parsed { id, is_call: true })
    }

    fn parse_args(&mut self, name: &str) -> RqlResult<Vec<TermId>> {
        let unclosed = || GrammarError::UnclosedCall {
            token: name.to_string(),
        };
        let mut args = Vec::new();
        if self.peek_kind()? == Some(TokenKind::RParen) {
            self.advance()?;
            return Ok(args);
        }
        loop {
            let token = self.advance()?.ok_or_else(unclosed)?;
            match token.kind {
                TokenKind::Text => args.push(self.parse_term(token)?.id),
                TokenKind::Comma | TokenKind::RParen => {
                    return Err(GrammarError::EmptyArgument {
                        token: name.to_string(),
                    }
                    .into())
                }
                _ => return Err(Self::unexpected("an argument", &token).into()),
            }
            let separator = self.advance()?.ok_or_else(unclosed)?;
            match separator.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                _ => return Err(Self::unexpected("',' or ')'", &separator).into()),
            }
        }
    }
}

/// Parse a fragment into a standalone term
pub fn parse(fragment: &str) -> RqlResult<ParsedTerm> {
    let mut tree = Tree::new();
    let root = parse_into(&mut tree, fragment)?;
    Ok(ParsedTerm { tree, root })
}

/// Parse a fragment into an existing tree
pub fn parse_into(tree: &mut Tree, fragment: &str) -> RqlResult<TermId> {
    Parser::new(fragment, tree).parse()
}

/// Split a decoded query string on `&`, ignoring separators inside quotes
pub fn split_fragments(query_string: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in query_string.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', _) => escaped = true,
            ('\'' | '"', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            ('&', None) => {
                fragments.push(&query_string[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fragments.push(&query_string[start..]);
    fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

/// Parse every fragment of a query string into `tree`
pub fn parse_query_string(tree: &mut Tree, query_string: &str) -> RqlResult<Vec<TermId>> {
    let fragments = split_fragments(query_string);
    debug!(fragments = fragments.len(), "parsing query string");
    fragments
        .into_iter()
        .map(|fragment| parse_into(tree, fragment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LexError, RqlError};

    fn rql(fragment: &str) -> String {
        parse(fragment).unwrap().to_string()
    }

    #[test]
    fn test_call_form() {
        assert_eq!(rql("eq(name,Bob)"), "eq(name,Bob)");
        assert_eq!(rql("and(gt(age,18), n(deleted))"), "and(gt(age,18),n(deleted))");
    }

    #[test]
    fn test_two_part_shorthand() {
        assert_eq!(rql("column=String"), "eq(column,String)");
        assert_eq!(rql("age=gt(18)"), "gt(age,18)");
        assert_eq!(rql("name="), "eq(name,\"\")");
    }

    #[test]
    fn test_three_part_shorthand() {
        let term = parse("age=ge=18").unwrap();
        assert_eq!(term.token(), "ge");
        assert_eq!(term.children(), vec!["age", "18"]);
        assert_eq!(rql("firstName=in=wells,joe"), "in(firstName,wells,joe)");
    }

    #[test]
    fn test_multi_value_shorthand() {
        assert_eq!(rql("includes=a,b"), "eq(includes,a,b)");
    }

    #[test]
    fn test_zero_arg_call() {
        let term = parse("distinct()").unwrap();
        assert_eq!(term.token(), "distinct");
        assert!(term.children().is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse("eq(a,b"),
            Err(RqlError::Grammar(GrammarError::UnclosedCall { .. }))
        ));
        assert!(matches!(
            parse("eq(a,,b)"),
            Err(RqlError::Grammar(GrammarError::EmptyArgument { .. }))
        ));
        assert!(matches!(
            parse("'eq'(a,b)"),
            Err(RqlError::Grammar(GrammarError::QuotedFunction { .. }))
        ));
        assert!(matches!(
            parse("a=b=c=d"),
            Err(RqlError::Grammar(GrammarError::TooManyOperators { .. }))
        ));
        assert!(matches!(
            parse("=b"),
            Err(RqlError::Grammar(GrammarError::EmptyKey { .. }))
        ));
        assert!(matches!(
            parse("eq(a,b))"),
            Err(RqlError::Lex(LexError::StrayClosingParen { .. }))
        ));
    }

    #[test]
    fn test_split_fragments() {
        assert_eq!(
            split_fragments("a=b&&eq(c,'x&y')& limit=5"),
            vec!["a=b", "eq(c,'x&y')", "limit=5"]
        );
    }
}
