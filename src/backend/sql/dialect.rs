//! SQL dialect abstraction: identifier quoting, placeholders, LIKE escaping
//! and paging syntax

use std::fmt;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SqlDialect {
    #[default]
    Postgres,
    Sqlite,
    MySql,
    SqlServer,
    H2,
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlDialect::Postgres => "postgres",
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::MySql => "mysql",
            SqlDialect::SqlServer => "sqlserver",
            SqlDialect::H2 => "h2",
        };
        f.write_str(name)
    }
}

/// Trait for dialect-specific SQL generation
pub trait SqlDialectImpl {
    /// Get the dialect type
    fn dialect(&self) -> SqlDialect;

    /// Quote an identifier (table/column name)
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Numbered placeholder for the 1-based bind `index`
    fn numbered_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Escape character to declare after LIKE, when `\` is not the default
    fn like_escape(&self) -> Option<&str> {
        None
    }

    /// LIMIT/OFFSET syntax
    fn limit_offset(&self, limit: u64, offset: Option<u64>) -> String {
        match offset {
            Some(offset) => format!("LIMIT {limit} OFFSET {offset}"),
            None => format!("LIMIT {limit}"),
        }
    }

    /// Paging that is only legal after an ORDER BY
    fn paging_requires_order(&self) -> bool {
        false
    }
}

/// PostgreSQL dialect implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialectImpl for PostgresDialect {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn numbered_placeholder(&self, index: usize) -> String {
        format!("${index}")
    }
}

/// SQLite dialect implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialectImpl for SqliteDialect {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn numbered_placeholder(&self, index: usize) -> String {
        format!("?{index}")
    }

    // SQLite LIKE has no escape character unless one is declared
    fn like_escape(&self) -> Option<&str> {
        Some("\\")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialectImpl for MySqlDialect {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn limit_offset(&self, limit: u64, offset: Option<u64>) -> String {
        match offset {
            Some(offset) => format!("LIMIT {offset}, {limit}"),
            None => format!("LIMIT {limit}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlDialectImpl for SqlServerDialect {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::SqlServer
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn numbered_placeholder(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn like_escape(&self) -> Option<&str> {
        Some("\\")
    }

    fn limit_offset(&self, limit: u64, offset: Option<u64>) -> String {
        format!(
            "OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            offset.unwrap_or(0),
            limit
        )
    }

    fn paging_requires_order(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct H2Dialect;

impl SqlDialectImpl for H2Dialect {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::H2
    }
}

/// Get dialect implementation for a given dialect type
pub fn get_dialect(dialect: SqlDialect) -> Box<dyn SqlDialectImpl> {
    match dialect {
        SqlDialect::Postgres => Box::new(PostgresDialect),
        SqlDialect::Sqlite => Box::new(SqliteDialect),
        SqlDialect::MySql => Box::new(MySqlDialect),
        SqlDialect::SqlServer => Box::new(SqlServerDialect),
        SqlDialect::H2 => Box::new(H2Dialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(PostgresDialect.numbered_placeholder(10), "$10");
        assert_eq!(SqliteDialect.numbered_placeholder(1), "?1");
        assert_eq!(SqlServerDialect.numbered_placeholder(2), "@p2");
        assert_eq!(MySqlDialect.numbered_placeholder(2), "?");
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(PostgresDialect.quote_identifier("weird\"name"), "\"weird\"\"name\"");
        assert_eq!(MySqlDialect.quote_identifier("Orders"), "`Orders`");
        assert_eq!(SqlServerDialect.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_paging() {
        assert_eq!(H2Dialect.limit_offset(7, Some(14)), "LIMIT 7 OFFSET 14");
        assert_eq!(MySqlDialect.limit_offset(7, Some(14)), "LIMIT 14, 7");
        assert_eq!(
            SqlServerDialect.limit_offset(7, None),
            "OFFSET 0 ROWS FETCH NEXT 7 ROWS ONLY"
        );
    }
}
