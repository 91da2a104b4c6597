use super::clause::{Clause, ClauseContext, ClauseKind};
use crate::error::{GrammarError, RqlResult};
use crate::term::{TermId, Tree};

/// `group(col, ...)` terms
#[derive(Debug, Clone, Default)]
pub struct Group {
    terms: Vec<TermId>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grouping columns across every `group` term, in order
    pub fn columns(&self, tree: &Tree) -> Vec<TermId> {
        self.terms
            .iter()
            .flat_map(|t| tree.children(*t).iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Clause for Group {
    fn kind(&self) -> ClauseKind {
        ClauseKind::Group
    }

    fn add(&mut self, cx: &mut ClauseContext<'_>, term: TermId) -> RqlResult<Vec<TermId>> {
        let columns = cx.tree.children(term);
        if columns.is_empty() || columns.iter().any(|c| !cx.tree.is_leaf(*c)) {
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
