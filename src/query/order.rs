use super::clause::{Clause, ClauseContext, ClauseKind};
use crate::error::{GrammarError, RqlResult};
use crate::term::{TermId, Tree};

/// One sort key. `-col` sorts descending, `col` and `+col` ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub ascending: bool,
}

impl Sort {
    pub fn parse(token: &str) -> Self {
        match token.strip_prefix('-') {
            Some(column) => Sort {
                column: column.to_string(),
                ascending: false,
            },
            None => Sort {
                column: token.strip_prefix('+').unwrap_or(token).to_string(),
                ascending: true,
            },
        }
    }
}

/// `order(...)` / `sort(...)` terms
#[derive(Debug, Clone, Default)]
pub struct Order {
    terms: Vec<TermId>,
}

impl Order {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sorts(&self, tree: &Tree) -> Vec<Sort> {
        self.terms
            .iter()
            .flat_map(|t| tree.children(*t).iter())
            .map(|c| Sort::parse(tree.token(*c)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Clause for Order {
    fn kind(&self) -> ClauseKind {
        ClauseKind::Order
    }

    fn add(&mut self, cx: &mut ClauseContext<'_>, term: TermId) -> RqlResult<Vec<TermId>> {
        let columns = cx.tree.children(term);
        let valid = !columns.is_empty()
            && columns.iter().all(|c| {
                cx.tree.is_leaf(*c) && !matches!(cx.tree.token(*c), "" | "-" | "+")
            });
        if !valid {
            return Err(GrammarError::ExpectedColumn {
                token: cx.tree.token(term).to_string(),
            }
            .into());
        }
        self.terms.push(term);
        Ok(Vec::new())
    }

    fn terms(&self) -> &[TermId] {
        &self.terms
    }
}
