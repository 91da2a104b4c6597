//! Code generation for the supported stores.
//!
//! Every backend turns the same classified [Query] into an owned artifact that
//! holds the statement (or expression object) and every bound literal. The
//! set of targets is closed: [Compiler] matches [Target] exhaustively.

pub mod document;
pub mod keyvalue;
mod path;
pub mod sql;
mod value;

use std::fmt;
use std::str::FromStr;

use tracing::debug;

pub use document::{DocumentBackend, DocumentQuery};
pub use keyvalue::{KeyValueBackend, KeyValueOperation, KeyValueRequest};
pub use sql::{SqlBackend, SqlDialect, SqlStatement};
pub use value::{BoundValues, Value};

use crate::config::CompilerConfig;
use crate::error::{GrammarError, RqlResult};
use crate::metadata::Catalog;
use crate::query::Query;
use crate::term::{TermId, Tree};

/// A code generator for one kind of store
pub trait Backend {
    type Output;

    /// Short name used in error messages
    fn name(&self) -> &'static str;

    fn compile(&self, query: &Query<'_>, catalog: &Catalog) -> RqlResult<Self::Output>;
}

/// Every store the compiler can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Sql(SqlDialect),
    Document,
    KeyValue,
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Target::Sql(SqlDialect::Postgres)),
            "sqlite" => Ok(Target::Sql(SqlDialect::Sqlite)),
            "mysql" => Ok(Target::Sql(SqlDialect::MySql)),
            "sqlserver" | "mssql" => Ok(Target::Sql(SqlDialect::SqlServer)),
            "h2" => Ok(Target::Sql(SqlDialect::H2)),
            "document" | "cosmos" => Ok(Target::Document),
            "keyvalue" | "dynamo" => Ok(Target::KeyValue),
            other => Err(format!(
                "unknown target '{other}' (expected postgres, mysql, sqlite, sqlserver, h2, document or keyvalue)"
            )),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Sql(dialect) => write!(f, "{dialect}"),
            Target::Document => write!(f, "document"),
            Target::KeyValue => write!(f, "keyvalue"),
        }
    }
}

/// Output of [Compiler::compile]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "target", rename_all = "lowercase"))]
pub enum Compiled {
    Sql(SqlStatement),
    Document(DocumentQuery),
    KeyValue(KeyValueRequest),
}

impl Compiled {
    pub fn values(&self) -> &BoundValues {
        match self {
            Compiled::Sql(s) => &s.values,
            Compiled::Document(d) => &d.values,
            Compiled::KeyValue(k) => &k.values,
        }
    }
}

/// Dispatches a query to the backend for a [Target]
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile(
        &self,
        target: Target,
        query: &Query<'_>,
        catalog: &Catalog,
    ) -> RqlResult<Compiled> {
        let config = self.config.clone();
        let compiled = match target {
            Target::Sql(dialect) => {
                Compiled::Sql(run(&SqlBackend::new(dialect, config), query, catalog)?)
            }
            Target::Document => {
                Compiled::Document(run(&DocumentBackend::new(config), query, catalog)?)
            }
            Target::KeyValue => {
                Compiled::KeyValue(run(&KeyValueBackend::new(config), query, catalog)?)
            }
        };
        debug!(
            target = %target,
            collection = %query.collection().name,
            values = compiled.values().len(),
            "compiled query"
        );
        Ok(compiled)
    }
}

fn run<B: Backend>(backend: &B, query: &Query<'_>, catalog: &Catalog) -> RqlResult<B::Output> {
    debug!(
        backend = backend.name(),
        collection = %query.collection().name,
        "compiling query"
    );
    backend.compile(query, catalog)
}

/// The column argument of a predicate or function, which must be a bare word
pub(crate) fn column_of(tree: &Tree, term: TermId) -> RqlResult<(TermId, &str)> {
    match tree.child(term, 0) {
        Some(column) if tree.is_leaf(column) && !tree.is_quoted(column) => {
            Ok((column, tree.token(column)))
        }
        _ => Err(GrammarError::ExpectedColumn {
            token: tree.token(term).to_string(),
        }
        .into()),
    }
}

/// Arguments after the column, requiring at least `min` of them
pub(crate) fn values_of(tree: &Tree, term: TermId, min: usize) -> RqlResult<&[TermId]> {
    let values = tree.children(term).get(1..).unwrap_or_default();
    if values.len() < min {
        return Err(arity(tree, term, &format!("a column and {min} or more values")));
    }
    Ok(values)
}

/// Exactly one value after the column
pub(crate) fn single_value(tree: &Tree, term: TermId) -> RqlResult<TermId> {
    match tree.children(term) {
        [_, value] => Ok(*value),
        _ => Err(arity(tree, term, "a column and one value")),
    }
}

pub(crate) fn arity(tree: &Tree, term: TermId, expected: &str) -> crate::error::RqlError {
    GrammarError::Arity {
        token: tree.token(term).to_string(),
        expected: expected.to_string(),
    }
    .into()
}

/// The text of a literal argument
pub(crate) fn literal<'t>(tree: &'t Tree, term: TermId, column: &str) -> RqlResult<&'t str> {
    if tree.is_leaf(term) {
        return Ok(tree.token(term));
    }
    Err(GrammarError::InvalidValue {
        column: column.to_string(),
        value: tree.to_rql(term),
        expected: "a literal".to_string(),
    }
    .into())
}

/// An unquoted value containing `*` is a wildcard pattern
pub(crate) fn is_wildcard(tree: &Tree, term: TermId) -> bool {
    tree.is_leaf(term) && !tree.is_quoted(term) && tree.token(term).contains('*')
}
