//! RQL query-string compiler.
//!
//! A query string such as `sw(shipCountry,Franc)&sort(-orderDate)&limit=10`
//! is lexed, parsed into a [term::Tree], classified into clauses by
//! [query::Query] and compiled by one of the [backend]s into a parameterized
//! statement for a relational database, a document store or a key-value store.
//!
//! ```rust
//! use rql::backend::{Compiled, Compiler, Target};
//! use rql::config::CompilerConfig;
//! use rql::metadata::northwind;
//! use rql::query::Query;
//!
//! let catalog = northwind::catalog();
//! let orders = catalog.require("orders").unwrap();
//! let query = Query::from_query_string(orders, "shipCountry=France&limit=5").unwrap();
//!
//! let compiled = Compiler::new(CompilerConfig::default())
//!     .compile(Target::KeyValue, &query, &catalog)
//!     .unwrap();
//! assert!(matches!(compiled, Compiled::KeyValue(_)));
//! assert_eq!(compiled.values().len(), 1);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod lexer;
pub mod metadata;
pub mod parser;
pub mod query;
pub mod term;

pub use backend::{Backend, Compiled, Compiler, Target};
pub use config::CompilerConfig;
pub use error::{RqlError, RqlResult};
pub use lexer::{tokenize, Lexer, Span, Token, TokenKind};
pub use parser::{parse, parse_query_string};
pub use query::Query;
