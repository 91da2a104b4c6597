//! The Page clause and the offset/limit window it resolves to

use super::clause::{Clause, ClauseContext, ClauseKind};
use crate::config::CompilerConfig;
use crate::error::{GrammarError, RqlResult};
use crate::term::{TermId, Tree};

/// Resolved paging, identical for every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

/// `offset`, `limit`, `page`/`pageNum`, `pageSize` and `after` terms.
///  A later term of the same kind overrides an earlier one.
#[derive(Debug, Clone, Default)]
pub struct Page {
    terms: Vec<TermId>,
    offset: Option<u64>,
    limit: Option<u64>,
    page: Option<u64>,
    page_size: Option<u64>,
    after: Option<TermId>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the window. `offset` wins over `page`; `limit` over `pageSize`.
    pub fn window(&self, config: &CompilerConfig) -> PageWindow {
        let limit = self
            .limit
            .or(self.page_size)
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size);
        let offset = match (self.offset, self.page) {
            (Some(offset), _) => offset,
            (None, Some(page)) => (page - 1).saturating_mul(limit),
            (None, None) => 0,
        };
        PageWindow { offset, limit }
    }

    /// Values of the last `after(...)` term
    pub fn after(&self, tree: &Tree) -> Vec<TermId> {
        self.after
            .map(|t| tree.children(t).to_vec())
            .unwrap_or_default()
    }

    pub fn has_after(&self) -> bool {
        self.after.is_some()
    }

    fn number(tree: &Tree, term: TermId, minimum: u64) -> RqlResult<u64> {
        let token = tree.token(term);
        let invalid = |value: String| GrammarError::InvalidPaging {
            token: token.to_string(),
            value,
        };
        let [value] = tree.children(term) else {
            return Err(invalid(tree.to_rql(term)).into());
        };
        let text = tree.token(*value);
        match text.trim().parse::<u64>() {
            Ok(n) if n >= minimum => Ok(n),
            _ => Err(invalid(text.to_string()).into()),
        }
    }
}

impl Clause for Page {
    fn kind(&self) -> ClauseKind {
        ClauseKind::Page
    }

    fn add(&mut self, cx: &mut ClauseContext<'_>, term: TermId) -> RqlResult<Vec<TermId>> {
        let tree = &*cx.tree;
        match tree.token(term).to_ascii_lowercase().as_str() {
            "offset" => self.offset = Some(Self::number(tree, term, 0)?),
            "limit" => self.limit = Some(Self::number(tree, term, 0)?),
            "page" | "pagenum" => self.page = Some(Self::number(tree, term, 1)?),
            "pagesize" => self.page_size = Some(Self::number(tree, term, 1)?),
            _ => {
                if tree.children(term).is_empty() {
                    return Err(GrammarError::Arity {
                        token: tree.token(term).to_string(),
                        expected: "at least one key value".to_string(),
                    }
                    .into());
                }
                self.after = Some(term);
            }
        }
        self.terms.push(term);
        Ok(Vec::new())
    }

    fn terms(&self) -> &[TermId] {
        &self.terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RqlError;
    use crate::metadata::Collection;
    use crate::parser::parse_into;

    fn page(fragments: &[&str]) -> RqlResult<Page> {
        let collection = Collection::new("orders");
        let mut tree = Tree::new();
        let mut clause = Page::new();
        for fragment in fragments {
            let term = parse_into(&mut tree, fragment)?;
            let mut cx = ClauseContext {
                tree: &mut tree,
                collection: &collection,
            };
            clause.add(&mut cx, term)?;
        }
        Ok(clause)
    }

    fn window(fragments: &[&str]) -> PageWindow {
        page(fragments).unwrap().window(&CompilerConfig::default())
    }

    #[test]
    fn test_page_number_and_size() {
        assert_eq!(
            window(&["pageNum(3)", "pageSize(7)"]),
            PageWindow {
                offset: 14,
                limit: 7
            }
        );
        assert_eq!(
            window(&["page(2)"]),
            PageWindow {
                offset: 100,
                limit: 100
            }
        );
    }

    #[test]
    fn test_offset_and_limit() {
        assert_eq!(
            window(&["offset(5)", "limit(10)"]),
            PageWindow {
                offset: 5,
                limit: 10
            }
        );
        assert_eq!(window(&["limit(5000)"]).limit, 1000);
        assert_eq!(window(&[]), PageWindow { offset: 0, limit: 100 });
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            page(&["limit(ten)"]),
            Err(RqlError::Grammar(GrammarError::InvalidPaging { .. }))
        ));
        assert!(matches!(
            page(&["page(0)"]),
            Err(RqlError::Grammar(GrammarError::InvalidPaging { .. }))
        ));
        assert!(matches!(
            page(&["offset(-1)"]),
            Err(RqlError::Grammar(GrammarError::InvalidPaging { .. }))
        ));
    }
}
