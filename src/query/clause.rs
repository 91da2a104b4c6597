//! Clause kinds, their vocabularies and the trait every clause implements

use std::fmt;

use crate::error::RqlResult;
use crate::metadata::Collection;
use crate::term::{TermId, Tree};

/// Semantic role of a top-level term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Where,
    Page,
    Order,
    Group,
    Select,
}

const WHERE_VOCABULARY: &[&str] = &[
    "_key", "and", "or", "not", "eq", "ne", "n", "nn", "like", "sw", "ew", "lt", "le", "gt", "ge",
    "in", "out", "if", "w", "wo", "emp", "nemp",
];
const PAGE_VOCABULARY: &[&str] = &["offset", "limit", "page", "pageNum", "pageSize", "after"];
const ORDER_VOCABULARY: &[&str] = &["order", "sort"];
const GROUP_VOCABULARY: &[&str] = &["group"];
const SELECT_VOCABULARY: &[&str] = &[
    "as",
    "includes",
    "distinct",
    "count",
    "sum",
    "min",
    "max",
    "if",
    "aggregate",
    "function",
    "countascol",
    "rowcount",
];

impl ClauseKind {
    /// Dispatch order. Ambiguous tokens (`if`) go to the first claimant.
    pub const PRIORITY: [ClauseKind; 5] = [
        ClauseKind::Where,
        ClauseKind::Page,
        ClauseKind::Order,
        ClauseKind::Group,
        ClauseKind::Select,
    ];

    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            ClauseKind::Where => WHERE_VOCABULARY,
            ClauseKind::Page => PAGE_VOCABULARY,
            ClauseKind::Order => ORDER_VOCABULARY,
            ClauseKind::Group => GROUP_VOCABULARY,
            ClauseKind::Select => SELECT_VOCABULARY,
        }
    }

    pub fn accepts(&self, token: &str) -> bool {
        self.vocabulary()
            .iter()
            .any(|word| word.eq_ignore_ascii_case(token))
    }

    /// First clause kind, in priority order, whose vocabulary has `token`
    pub fn claimant(token: &str) -> Option<ClauseKind> {
        Self::PRIORITY.into_iter().find(|kind| kind.accepts(token))
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClauseKind::Where => "where",
            ClauseKind::Page => "page",
            ClauseKind::Order => "order",
            ClauseKind::Group => "group",
            ClauseKind::Select => "select",
        };
        f.write_str(name)
    }
}

/// What a clause may touch while claiming a term
pub struct ClauseContext<'a> {
    pub tree: &'a mut Tree,
    pub collection: &'a Collection,
}

/// An accumulator for one semantic role of a query
pub trait Clause {
    fn kind(&self) -> ClauseKind;

    fn accepts(&self, token: &str) -> bool {
        self.kind().accepts(token)
    }

    /// Claim `term`, applying this clause's rewrites. Returns any terms the
    ///  rewrite produced that belong to other clauses.
    fn add(&mut self, cx: &mut ClauseContext<'_>, term: TermId) -> RqlResult<Vec<TermId>>;

    /// Accepted terms in the order they were claimed
    fn terms(&self) -> &[TermId];
}
