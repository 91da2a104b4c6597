//! Clause classification.
//!
//! A [Query] routes each top-level term to the first clause, in the order
//! Where, Page, Order, Group, Select, whose vocabulary contains the term's
//! token. Clauses may rewrite what they claim and hand back terms that belong
//! elsewhere (`aggregate` produces a `group`, `countascol` an `in` filter);
//! those are routed again.
//!
//! ```
//! use rql::metadata::northwind;
//! use rql::query::Query;
//!
//! let catalog = northwind::catalog();
//! let orders = catalog.require("orders").unwrap();
//! let query = Query::from_query_string(orders, "shipCountry=France&limit=5&count(*)").unwrap();
//! assert_eq!(
//!     query.to_string(),
//!     r#"eq(shipCountry,France)&limit(5)&as(count(*),"$$$ANON")"#
//! );
//! ```

mod clause;
mod filter;
mod group;
pub mod key;
mod order;
mod page;
mod select;

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace, warn};

pub use clause::{Clause, ClauseContext, ClauseKind};
pub use filter::Where;
pub use group::Group;
pub use order::{Order, Sort};
pub use page::{Page, PageWindow};
pub use select::{Projection, Select, ANONYMOUS_ALIAS};

use crate::error::{GrammarError, RqlResult};
use crate::metadata::Collection;
use crate::parser::{parse_into, split_fragments};
use crate::term::{TermId, Tree};

/// A classified, normalized request against one collection
#[derive(Debug, Clone)]
pub struct Query<'c> {
    collection: &'c Collection,
    tree: Tree,
    filter: Where,
    page: Page,
    order: Order,
    group: Group,
    select: Select,
}

impl<'c> Query<'c> {
    pub fn new(collection: &'c Collection) -> Self {
        Self {
            collection,
            tree: Tree::new(),
            filter: Where::new(),
            page: Page::new(),
            order: Order::new(),
            group: Group::new(),
            select: Select::new(),
        }
    }

    /// Parse and classify every `&`-separated fragment of a decoded query string
    pub fn from_query_string(collection: &'c Collection, query_string: &str) -> RqlResult<Self> {
        let mut query = Self::new(collection);
        let fragments = split_fragments(query_string);
        debug!(
            collection = %collection.name,
            fragments = fragments.len(),
            "building query"
        );
        for fragment in fragments {
            query.with(fragment)?;
        }
        Ok(query)
    }

    /// Parse one fragment and classify it
    pub fn with(&mut self, fragment: &str) -> RqlResult<&mut Self> {
        let term = parse_into(&mut self.tree, fragment)?;
        self.with_term(term)?;
        Ok(self)
    }

    /// Classify a term that already lives in [Query::tree_mut]
    pub fn with_term(&mut self, term: TermId) -> RqlResult<()> {
        let mut pending = VecDeque::from([term]);
        while let Some(term) = pending.pop_front() {
            let term = self.invert_eq(term);
            let kind = ClauseKind::claimant(self.tree.token(term))
                .filter(|_| !self.tree.is_quoted(term))
                .ok_or_else(|| GrammarError::UnknownToken {
                    token: self.tree.to_rql(term),
                })?;
            debug!(clause = %kind, term = %self.tree.display(term), "routing term");
            pending.extend(self.offer(kind, term)?);
        }
        Ok(())
    }

    fn offer(&mut self, kind: ClauseKind, term: TermId) -> RqlResult<Vec<TermId>> {
        let mut cx = ClauseContext {
            tree: &mut self.tree,
            collection: self.collection,
        };
        let clause: &mut dyn Clause = match kind {
            ClauseKind::Where => &mut self.filter,
            ClauseKind::Page => &mut self.page,
            ClauseKind::Order => &mut self.order,
            ClauseKind::Group => &mut self.group,
            ClauseKind::Select => &mut self.select,
        };
        clause.add(&mut cx, term)
    }

    /// `eq(limit,5)` (what `limit=5` parses to) becomes `limit(5)` when the
    ///  first argument is a bare word from another clause's vocabulary.
    ///  Any other term is returned unchanged.
    fn invert_eq(&mut self, term: TermId) -> TermId {
        let tree = &mut self.tree;
        if !tree.has_token(term, "eq") {
            return term;
        }
        let Some(key) = tree.child(term, 0) else {
            return term;
        };
        if !tree.is_leaf(key) || tree.is_quoted(key) {
            return term;
        }
        let token = tree.token(key).to_string();
        let inverts = match ClauseKind::claimant(&token) {
            Some(ClauseKind::Where) => token.eq_ignore_ascii_case("_key"),
            Some(_) => true,
            None => false,
        };
        if !inverts {
            return term;
        }
        if self.collection.property(&token).is_some() {
            warn!(
                column = %token,
                collection = %self.collection.name,
                "treating '{}=' as the '{}' parameter, not a filter on the column",
                token,
                token
            );
        }
        trace!(token = %token, "inverting eq");

        let values: Vec<TermId> = tree.children(term)[1..].to_vec();
        for value in &values {
            tree.detach(*value);
        }
        tree.call(token, values)
    }

    pub fn collection(&self) -> &'c Collection {
        self.collection
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The arena terms are built in before being handed to [Query::with_term]
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn filter(&self) -> &Where {
        &self.filter
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn select(&self) -> &Select {
        &self.select
    }

    pub fn clause(&self, kind: ClauseKind) -> &dyn Clause {
        match kind {
            ClauseKind::Where => &self.filter,
            ClauseKind::Page => &self.page,
            ClauseKind::Order => &self.order,
            ClauseKind::Group => &self.group,
            ClauseKind::Select => &self.select,
        }
    }

    /// Every claimed term, in clause priority order
    pub fn terms(&self) -> impl Iterator<Item = TermId> + '_ {
        ClauseKind::PRIORITY
            .into_iter()
            .flat_map(move |kind| self.clause(kind).terms().iter().copied())
    }
}

/// Writes the normalized query back as a query string. Re-classifying the
///  output yields the same clause set.
impl fmt::Display for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms().enumerate() {
            if i > 0 {
                write!(f, "&")?;
            }
            write!(f, "{}", self.tree.display(term))?;
        }
        Ok(())
    }
}
