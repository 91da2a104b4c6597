//! The Select clause: projection, computed columns and aggregate desugaring

use tracing::trace;

use super::clause::{Clause, ClauseContext, ClauseKind};
use crate::error::{GrammarError, RqlResult};
use crate::term::{TermId, Tree};

/// Alias given to computed columns the caller did not name
pub const ANONYMOUS_ALIAS: &str = "$$$ANON";

/// A computed column: `as(expression, alias)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub expression: TermId,
    pub alias: TermId,
}

impl Projection {
    pub fn is_anonymous(&self, tree: &Tree) -> bool {
        tree.token(self.alias) == ANONYMOUS_ALIAS
    }
}

#[derive(Debug, Clone, Default)]
pub struct Select {
    terms: Vec<TermId>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns named by every `includes(...)`, in order
    pub fn includes(&self, tree: &Tree) -> Vec<TermId> {
        self.terms
            .iter()
            .filter(|t| tree.has_token(**t, "includes"))
            .flat_map(|t| tree.children(*t).iter().copied())
            .collect()
    }

    /// Every `as(expression, alias)` column, in order
    pub fn projections(&self, tree: &Tree) -> Vec<Projection> {
        self.terms
            .iter()
            .filter(|t| tree.has_token(**t, "as"))
            .filter_map(|t| {
                Some(Projection {
                    expression: tree.child(*t, 0)?,
                    alias: tree.child(*t, 1)?,
                })
            })
            .collect()
    }

    pub fn is_distinct(&self, tree: &Tree) -> bool {
        self.terms.iter().any(|t| tree.has_token(*t, "distinct"))
    }

    pub fn wants_row_count(&self, tree: &Tree) -> bool {
        self.terms.iter().any(|t| tree.has_token(*t, "rowcount"))
    }

    /// Whether a projection has the given alias
    pub fn has_alias(&self, tree: &Tree, alias: &str) -> bool {
        self.projections(tree)
            .iter()
            .any(|p| !p.is_anonymous(tree) && tree.token(p.alias) == alias)
    }

    fn wrap_anonymous(&mut self, tree: &mut Tree, term: TermId) {
        trace!(function = tree.token(term), "wrapping aggregate in anonymous alias");
        let alias = tree.leaf(ANONYMOUS_ALIAS, Some('"'));
        let wrapped = tree.call("as", vec![term, alias]);
        self.terms.push(wrapped);
    }

    /// `aggregate(fn,col[,alias])` becomes `as(fn(col),alias)` plus `group(col)`
    fn desugar_aggregate(&mut self, tree: &mut Tree, term: TermId) -> RqlResult<Vec<TermId>> {
        let children = tree.children(term).to_vec();
        let (function, column, alias) = match children.as_slice() {
            [f, c] => (*f, *c, None),
            [f, c, a] => (*f, *c, Some(*a)),
            _ => {
                return Err(GrammarError::Arity {
                    token: tree.token(term).to_string(),
                    expected: "a function, a column and an optional alias".to_string(),
                }
                .into())
            }
        };
        if !tree.is_leaf(function) || tree.is_quoted(function) {
            return Err(GrammarError::ExpectedColumn {
                token: tree.token(term).to_string(),
            }
            .into());
        }
        trace!(function = tree.token(function), "desugaring aggregate");
        for child in &children {
            tree.detach(*child);
        }

        let group_column = tree.duplicate(column);
        let group = tree.call("group", vec![group_column]);

        let name = tree.token(function).to_string();
        let call = tree.call(name, vec![column]);
        let alias = alias.unwrap_or_else(|| tree.leaf(ANONYMOUS_ALIAS, Some('"')));
        self.terms.push(tree.call("as", vec![call, alias]));
        Ok(vec![group])
    }

    /// `countascol(col,v1,..)` becomes one `as(sum(if(eq(col,v),1,0)),v)` per
    ///  value plus an `in(col,v1,..)` filter
    fn desugar_count_as_column(
        &mut self,
        tree: &mut Tree,
        term: TermId,
    ) -> RqlResult<Vec<TermId>> {
        let children = tree.children(term).to_vec();
        let [column, values @ ..] = children.as_slice() else {
            return Err(count_as_column_arity());
        };
        if values.is_empty() {
            return Err(count_as_column_arity());
        }
        trace!(values = values.len(), "desugaring countascol");

        for value in values {
            let col = tree.duplicate(*column);
            let val = tree.duplicate(*value);
            let eq = tree.call("eq", vec![col, val]);
            let one = tree.leaf("1", None);
            let zero = tree.leaf("0", None);
            let branch = tree.call("if", vec![eq, one, zero]);
            let sum = tree.call("sum", vec![branch]);
            let alias = tree.duplicate(*value);
            self.terms.push(tree.call("as", vec![sum, alias]));
        }

        for child in &children {
            tree.detach(*child);
        }
        Ok(vec![tree.call("in", children)])
    }
}

fn count_as_column_arity() -> crate::error::RqlError {
    GrammarError::Arity {
        token: "countascol".to_string(),
        expected: "a column and at least one value".to_string(),
    }
    .into()
}

impl Clause for Select {
    fn kind(&self) -> ClauseKind {
        ClauseKind::Select
    }

    fn add(&mut self, cx: &mut ClauseContext<'_>, term: TermId) -> RqlResult<Vec<TermId>> {
        let tree = &mut *cx.tree;
        let token = tree.token(term).to_ascii_lowercase();
        match token.as_str() {
            "count" | "sum" | "min" | "max" => {
                if tree.children(term).is_empty() {
                    return Err(GrammarError::Arity {
                        token,
                        expected: "a column".to_string(),
                    }
                    .into());
                }
                self.wrap_anonymous(tree, term);
                Ok(Vec::new())
            }
            "aggregate" | "function" => self.desugar_aggregate(tree, term),
            "countascol" => self.desugar_count_as_column(tree, term),
            "as" if tree.children(term).len() != 2 => Err(GrammarError::Arity {
                token,
                expected: "an expression and an alias".to_string(),
            }
            .into()),
            _ => {
                self.terms.push(term);
                Ok(Vec::new())
            }
        }
    }

    fn terms(&self) -> &[TermId] {
        &self.terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Collection;
    use crate::parser::parse_into;

    fn add(fragment: &str) -> (Vec<String>, Vec<String>) {
        let collection = Collection::new("orders");
        let mut tree = Tree::new();
        let term = parse_into(&mut tree, fragment).unwrap();
        let mut clause = Select::new();
        let mut cx = ClauseContext {
            tree: &mut tree,
            collection: &collection,
        };
        let spill = clause.add(&mut cx, term).unwrap();
        let rql = |ids: &[TermId]| ids.iter().map(|t| tree.to_rql(*t)).collect::<Vec<_>>();
        (rql(clause.terms()), rql(&spill))
    }

    #[test]
    fn test_anonymous_count() {
        let (terms, spill) = add("count(*)");
        assert_eq!(terms, vec![r#"as(count(*),"$$$ANON")"#]);
        assert!(spill.is_empty());
    }

    #[test]
    fn test_aggregate() {
        let (terms, spill) = add("aggregate(count,country,result)");
        assert_eq!(terms, vec!["as(count(country),result)"]);
        assert_eq!(spill, vec!["group(country)"]);

        let (terms, _) = add("function(max,freight)");
        assert_eq!(terms, vec![r#"as(max(freight),"$$$ANON")"#]);
    }

    #[test]
    fn test_count_as_column() {
        let (terms, spill) = add("countascol(shipCountry,France,Spain)");
        assert_eq!(
            terms,
            vec![
                "as(sum(if(eq(shipCountry,France),1,0)),France)",
                "as(sum(if(eq(shipCountry,Spain),1,0)),Spain)",
            ]
        );
        assert_eq!(spill, vec!["in(shipCountry,France,Spain)"]);
    }

    #[test]
    fn test_accessors() {
        let collection = Collection::new("orders");
        let mut tree = Tree::new();
        let mut clause = Select::new();
        for fragment in ["includes(a,b)", "distinct", "as(max(freight),top)", "includes(c)"] {
            let term = parse_into(&mut tree, fragment).unwrap();
            let mut cx = ClauseContext {
                tree: &mut tree,
                collection: &collection,
            };
            clause.add(&mut cx, term).unwrap();
        }
        let includes: Vec<&str> = clause
            .includes(&tree)
            .into_iter()
            .map(|t| tree.token(t))
            .collect();
        assert_eq!(includes, vec!["a", "b", "c"]);
        assert!(clause.is_distinct(&tree));
        assert!(!clause.wants_row_count(&tree));
        assert!(clause.has_alias(&tree, "top"));
        assert_eq!(clause.projections(&tree).len(), 1);
    }
}
