use logos::Logos;
use std::fmt;
use std::ops::Range;

use crate::error::LexError;

/// Span represents a byte range in the source fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// Raw lexemes. Depth-sensitive decisions (top-level commas, `=` inside a
///  call) are made by [Lexer], not here.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[regex(r#""([^"\\]|\\.)*""#)]
    DoubleQuoted,
    #[regex(r"'([^'\\]|\\.)*'")]
    SingleQuoted,
    #[regex(r#"([^ \t\r\n\f(),='"\\]|\\.)+"#)]
    Bare,
}

/// Token kinds handed to the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    /// Only emitted inside a call; top-level commas are consumed
    Comma,
    /// Only emitted outside a call, where it splits `key=value`
    Equals,
    Text,
}

/// Token with its span information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Unescaped text with surrounding quotes removed; empty for punctuation
    pub text: String,
    /// The quote character that wrapped the literal, if any
    pub quote: Option<char>,
    pub span: Span,
}

impl Token {
    fn punct(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            text: String::new(),
            quote: None,
            span,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == TokenKind::Text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Equals => write!(f, "="),
            TokenKind::Text => match self.quote {
                Some(q) => write!(f, "{q}{}{q}", self.text),
                None => write!(f, "{}", self.text),
            },
        }
    }
}

/// Characters that carry meaning in the surface grammar. A backslash before
///  one of these yields the character itself. Any other escape, `\\`
///  included, is kept verbatim so that nested encodings (composite keys)
///  are unescaped exactly once, by their own decoder.
pub(crate) fn is_structural(c: char) -> bool {
    matches!(c, '(' | ')' | ',' | '=' | '\'' | '"') || c.is_whitespace()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if is_structural(next) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// An odd run of trailing backslashes leaves the last one escaping nothing
fn ends_in_escape(text: &str) -> bool {
    text.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Lexer for a single RQL fragment.
///
/// Yields tokens until the input is exhausted or an error is hit; after an
///  error the lexer is finished. [Lexer::restart] rewinds to the beginning.
pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, RawKind>,
    pushed_back: Option<(RawKind, Range<usize>)>,
    depth: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            inner: RawKind::lexer(source),
            pushed_back: None,
            depth: 0,
            finished: false,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn restart(&mut self) {
        self.inner = RawKind::lexer(self.source);
        self.pushed_back = None;
        self.depth = 0;
        self.finished = false;
    }

    fn pull(&mut self) -> Option<Result<(RawKind, Range<usize>), LexError>> {
        if let Some(raw) = self.pushed_back.take() {
            return Some(Ok(raw));
        }
        match self.inner.next()? {
            Ok(kind) => Some(Ok((kind, self.inner.span()))),
            Err(()) => {
                let position = self.inner.span().start;
                let rest = &self.source[position..];
                let err = if rest.starts_with(['\'', '"']) && !ends_in_escape(rest) {
                    LexError::UnterminatedQuote { position }
                } else {
                    LexError::DanglingEscape { position }
                };
                Some(Err(err))
            }
        }
    }

    /// Bare text runs are glued together across whitespace (and across `=`
    ///  inside a call) so `first name` is one literal.
    fn text_run(&mut self, first: Range<usize>) -> Result<Token, LexError> {
        let start = first.start;
        let mut end = first.end;
        loop {
            match self.pull() {
                Some(Ok((RawKind::Bare, span))) => end = span.end,
                Some(Ok((RawKind::Equals, span))) if self.depth > 0 => end = span.end,
                Some(Ok(other)) => {
                    self.pushed_back = Some(other);
                    break;
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }
        Ok(Token {
            kind: TokenKind::Text,
            text: unescape(&self.source[start..end]),
            quote: None,
            span: Span::new(start, end),
        })
    }

    fn quoted(&self, span: Range<usize>, quote: char) -> Token {
        let inner = &self.source[span.start + 1..span.end - 1];
        Token {
            kind: TokenKind::Text,
            text: unescape(inner),
            quote: Some(quote),
            span: span.into(),
        }
    }

    fn lex_next(&mut self) -> Option<Result<Token, LexError>> {
        loop {
            let (kind, span) = match self.pull()? {
                Ok(raw) => raw,
                Err(e) => return Some(Err(e)),
            };
            let token = match kind {
                RawKind::Comma if self.depth == 0 => continue,
                RawKind::Comma => Token::punct(TokenKind::Comma, span.into()),
                RawKind::LParen => {
                    self.depth += 1;
                    Token::punct(TokenKind::LParen, span.into())
                }
                RawKind::RParen => {
                    if self.depth == 0 {
                        return Some(Err(LexError::StrayClosingParen {
                            position: span.start,
                        }));
                    }
                    self.depth -= 1;
                    Token::punct(TokenKind::RParen, span.into())
                }
                RawKind::Equals if self.depth == 0 => Token::punct(TokenKind::Equals, span.into()),
                RawKind::Equals | RawKind::Bare => return Some(self.text_run(span)),
                RawKind::DoubleQuoted => self.quoted(span, '"'),
                RawKind::SingleQuoted => self.quoted(span, '\''),
            };
            return Some(Ok(token));
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let next = self.lex_next();
        if matches!(next, None | Some(Err(_))) {
            self.finished = true;
        }
        next
    }
}

/// Tokenize an entire fragment
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .filter(|t| t.is_text())
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_call_form() {
        assert_eq!(
            kinds("eq(a,b)"),
            vec![
                TokenKind::Text,
                TokenKind::LParen,
                TokenKind::Text,
                TokenKind::Comma,
                TokenKind::Text,
                TokenKind::RParen
            ]
        );
    }

    #[test]
    fn test_top_level_comma_consumed() {
        assert_eq!(kinds("a,b"), vec![TokenKind::Text, TokenKind::Text]);
    }

    #[test]
    fn test_equals_only_at_top_level() {
        assert_eq!(
            kinds("a=b"),
            vec![TokenKind::Text, TokenKind::Equals, TokenKind::Text]
        );
        assert_eq!(texts("eq(a,b=c)"), vec!["eq", "a", "b=c"]);
    }

    #[test]
    fn test_whitespace_inside_literal() {
        assert_eq!(texts("eq(name,  John   Smith )"), vec!["eq", "name", "John   Smith"]);
    }

    #[test]
    fn test_quotes_are_remembered() {
        let tokens = tokenize("eq(a,'x, y')").unwrap();
        assert_eq!(tokens[4].text, "x, y");
        assert_eq!(tokens[4].quote, Some('\''));
        assert_eq!(tokens[2].quote, None);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(texts(r"eq(a,b\,c)"), vec!["eq", "a", "b,c"]);
        assert_eq!(texts(r#"eq(a,"say \"hi\"")"#), vec!["eq", "a", "say \"hi\""]);
        // escapes of non-structural characters survive for composite keys
        assert_eq!(texts(r"_key(pk,a\~b~1)"), vec!["_key", "pk", r"a\~b~1"]);
        assert_eq!(texts(r"_key(pk,c\\d~1)"), vec!["_key", "pk", r"c\\d~1"]);
        assert_eq!(texts(r#"eq(a,"c:\\temp")"#), vec!["eq", "a", r"c:\\temp"]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            tokenize("eq(a,'abc)"),
            Err(LexError::UnterminatedQuote { position: 5 })
        );
    }

    #[test]
    fn test_dangling_escape() {
        assert!(matches!(
            tokenize(r"eq(a,b\"),
            Err(LexError::DanglingEscape { .. })
        ));
        assert_eq!(
            tokenize(r#"eq(a,"abc\"#),
            Err(LexError::DanglingEscape { position: 5 })
        );
        assert_eq!(
            tokenize(r#"eq(a,"abc\\"#),
            Err(LexError::UnterminatedQuote { position: 5 })
        );
    }

    #[test]
    fn test_stray_paren() {
        assert_eq!(
            tokenize("a)"),
            Err(LexError::StrayClosingParen { position: 1 })
        );
    }

    #[test]
    fn test_restart() {
        let mut lexer = Lexer::new("a=b");
        assert_eq!(lexer.by_ref().count(), 3);
        assert!(lexer.next().is_none());
        lexer.restart();
        assert_eq!(lexer.count(), 3);
    }
}
