//! Parameterized SQL generation
//!
//! # Example
//!
//! ```rust
//! use rql::backend::{Backend, SqlBackend, SqlDialect};
//! use rql::config::CompilerConfig;
//! use rql::metadata::northwind;
//! use rql::query::Query;
//!
//! let catalog = northwind::catalog();
//! let orders = catalog.require("orders").unwrap();
//! let query = Query::from_query_string(orders, "sw(shipCountry,Franc)&limit=10").unwrap();
//!
//! let statement = SqlBackend::new(SqlDialect::Postgres, CompilerConfig::default())
//!     .compile(&query, &catalog)
//!     .unwrap();
//! assert_eq!(
//!     statement.sql,
//!     "SELECT t0.*\nFROM \"Orders\" t0\nWHERE t0.\"ShipCountry\" LIKE ?\nLIMIT 10"
//! );
//! ```

mod compiler;
pub mod dialect;

pub use dialect::{get_dialect, SqlDialect, SqlDialectImpl};

use tracing::debug;

use self::compiler::SqlCompiler;
use super::{Backend, BoundValues};
use crate::config::CompilerConfig;
use crate::error::RqlResult;
use crate::metadata::Catalog;
use crate::query::{PageWindow, Query};

/// Result of compiling a query to SQL
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SqlStatement {
    pub dialect: SqlDialect,
    /// The paged statement
    pub sql: String,
    /// Values for the statement's placeholders, in order
    pub values: BoundValues,
    /// `SELECT COUNT(*)` over the unpaged statement, when `rowcount` was
    ///  requested. Uses the same values.
    pub count_sql: Option<String>,
    pub window: PageWindow,
}

/// SQL code generator for one dialect
pub struct SqlBackend {
    dialect: Box<dyn SqlDialectImpl>,
    config: CompilerConfig,
}

impl SqlBackend {
    pub fn new(dialect: SqlDialect, config: CompilerConfig) -> Self {
        Self {
            dialect: get_dialect(dialect),
            config,
        }
    }
}

impl Backend for SqlBackend {
    type Output = SqlStatement;

    fn name(&self) -> &'static str {
        "sql"
    }

    fn compile(&self, query: &Query<'_>, catalog: &Catalog) -> RqlResult<SqlStatement> {
        let statement =
            SqlCompiler::new(query, catalog, self.dialect.as_ref(), &self.config).compile()?;
        debug!(
            dialect = %statement.dialect,
            sql_len = statement.sql.len(),
            values = statement.values.len(),
            "compiled sql"
        );
        Ok(statement)
    }
}
