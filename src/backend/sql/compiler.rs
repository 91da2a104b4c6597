//! Query to SQL translation: joins, projection, predicates and parameters

use std::collections::HashMap;

use super::dialect::SqlDialectImpl;
use super::SqlStatement;
use crate::backend::path::{self, Hop};
use crate::backend::{
    arity, column_of, is_wildcard, literal, single_value, values_of, BoundValues, Value,
};
use crate::config::{BindStyle, CompilerConfig};
use crate::error::{GrammarError, RqlError, RqlResult};
use crate::metadata::{Catalog, KeyPair, Property};
use crate::query::{Clause, Query};
use crate::term::TermId;

const BACKEND: &str = "sql";
const ROOT_ALIAS: &str = "t0";

/// A JOIN clause to be added to the query
#[derive(Debug, Clone)]
struct JoinClause {
    table: String,
    alias: String,
    condition: String,
}

/// Per-call translation state. Built fresh for every statement.
pub(super) struct SqlCompiler<'a> {
    query: &'a Query<'a>,
    catalog: &'a Catalog,
    dialect: &'a dyn SqlDialectImpl,
    config: &'a CompilerConfig,
    /// Table alias counter for joins
    alias_counter: u32,
    joins: Vec<JoinClause>,
    /// Relationship path prefix to join alias
    join_aliases: HashMap<String, String>,
    /// Whether any join fans out (one-to-many or many-to-many)
    to_many: bool,
    values: BoundValues,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(
        query: &'a Query<'a>,
        catalog: &'a Catalog,
        dialect: &'a dyn SqlDialectImpl,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            query,
            catalog,
            dialect,
            config,
            alias_counter: 1,
            joins: Vec::new(),
            join_aliases: HashMap::new(),
            to_many: false,
            values: BoundValues::new(),
        }
    }

    pub fn compile(mut self) -> RqlResult<SqlStatement> {
        let query = self.query;
        let tree = query.tree();
        if query.page().has_after() {
            return Err(RqlError::unsupported(BACKEND, "after", "offset, limit, page"));
        }

        // Clause order matters: positional placeholders are bound as emitted
        let projection = self.projection()?;
        let where_sql = self.filter()?;
        let group_by_sql = self.group_by()?;
        let order_by_sql = self.order_by()?;

        let distinct =
            query.select().is_distinct(tree) || (self.to_many && query.group().is_empty());
        let table = self
            .dialect
            .quote_identifier(query.collection().table_name());

        let mut sql = format!(
            "SELECT {}{}\nFROM {} {}",
            if distinct { "DISTINCT " } else { "" },
            projection,
            table,
            ROOT_ALIAS
        );
        for join in &self.joins {
            sql.push_str(&format!(
                "\nLEFT JOIN {} {} ON {}",
                join.table, join.alias, join.condition
            ));
        }
        if let Some(w) = where_sql {
            sql.push_str(&format!("\nWHERE {}", w));
        }
        if let Some(g) = group_by_sql {
            sql.push_str(&format!("\nGROUP BY {}", g));
        }

        let count_sql = query
            .select()
            .wants_row_count(tree)
            .then(|| format!("SELECT COUNT(*) FROM ({}) rc", sql));

        match order_by_sql {
            Some(o) => sql.push_str(&format!("\nORDER BY {}", o)),
            None if self.dialect.paging_requires_order() => {
                sql.push_str("\nORDER BY (SELECT NULL)")
            }
            None => {}
        }

        let window = query.page().window(self.config);
        let offset = (window.offset > 0).then_some(window.offset);
        sql.push('\n');
        sql.push_str(&self.dialect.limit_offset(window.limit, offset));

        Ok(SqlStatement {
            dialect: self.dialect.dialect(),
            sql,
            values: self.values,
            count_sql,
            window,
        })
    }

    // ==================== Helper Methods ====================

    fn next_alias(&mut self) -> String {
        let alias = format!("t{}", self.alias_counter);
        self.alias_counter += 1;
        alias
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    /// Record a bound value and return its placeholder
    fn bind(&mut self, column: &str, value: Value) -> String {
        self.values.push(column, value);
        match self.config.bind_style {
            BindStyle::Positional => "?".to_string(),
            BindStyle::Numbered => self.dialect.numbered_placeholder(self.values.len()),
        }
    }

    fn like_suffix(&self) -> String {
        self.dialect
            .like_escape()
            .map(|e| format!(" ESCAPE '{}'", e))
            .unwrap_or_default()
    }

    /// Resolve a logical path to a qualified column, joining as needed
    fn column(&mut self, path: &str) -> RqlResult<(String, &'a Property)> {
        let resolved = path::resolve(
            self.catalog,
            self.query.collection(),
            path,
            self.config.max_relationship_depth,
        )?;
        let mut alias = ROOT_ALIAS.to_string();
        for hop in &resolved.hops {
            alias = self.join(hop, &alias)?;
        }
        let sql = format!("{}.{}", alias, self.quote(resolved.property.column_name()));
        Ok((sql, resolved.property))
    }

    /// Get or create the join(s) for one relationship hop
    fn join(&mut self, hop: &Hop<'_>, from_alias: &str) -> RqlResult<String> {
        if let Some(alias) = self.join_aliases.get(&hop.prefix) {
            return Ok(alias.clone());
        }
        let relationship = hop.relationship;
        if relationship.keys.is_empty() {
            return Err(hop
                .target
                .misconfigured(format!("relationship '{}' has no join keys", relationship.name))
                .into());
        }
        if relationship.cardinality.is_to_many() {
            self.to_many = true;
        }

        let target_table = self.quote(hop.target.table_name());
        let alias = match &relationship.through {
            None => {
                let alias = self.next_alias();
                let condition = self.join_condition(from_alias, &alias, &relationship.keys);
                self.joins.push(JoinClause {
                    table: target_table,
                    alias: alias.clone(),
                    condition,
                });
                alias
            }
            Some(link) => {
                let link_alias = self.next_alias();
                let link_table = self.quote(&link.table);
                let condition = self.join_condition(from_alias, &link_alias, &relationship.keys);
                self.joins.push(JoinClause {
                    table: link_table,
                    alias: link_alias.clone(),
                    condition,
                });
                let alias = self.next_alias();
                let condition = self.join_condition(&link_alias, &alias, &link.keys);
                self.joins.push(JoinClause {
                    table: target_table,
                    alias: alias.clone(),
                    condition,
                });
                alias
            }
        };

        self.join_aliases.insert(hop.prefix.clone(), alias.clone());
        Ok(alias)
    }

    fn join_condition(&self, left: &str, right: &str, keys: &[KeyPair]) -> String {
        keys.iter()
            .map(|k| {
                format!(
                    "{}.{} = {}.{}",
                    left,
                    self.quote(&k.local),
                    right,
                    self.quote(&k.foreign)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    // ==================== Projection ====================

    fn projection(&mut self) -> RqlResult<String> {
        let query = self.query;
        let tree = query.tree();
        let select = query.select();

        let includes = select.includes(tree);
        let plain = if includes.is_empty() {
            query.group().columns(tree)
        } else {
            includes
        };

        let mut columns = Vec::new();
        for column in plain {
            if !tree.is_leaf(column) || tree.is_quoted(column) {
                return Err(GrammarError::ExpectedColumn {
                    token: tree.to_rql(column),
                }
                .into());
            }
            let path = tree.token(column);
            let (sql, property) = self.column(path)?;
            if property.column_name() == path {
                columns.push(sql);
            } else {
                columns.push(format!("{} AS {}", sql, self.quote(path)));
            }
        }

        for projection in select.projections(tree) {
            let expr = self.expression(projection.expression)?;
            let alias = if projection.is_anonymous(tree) {
                tree.to_rql(projection.expression)
            } else {
                tree.token(projection.alias).to_string()
            };
            columns.push(format!("{} AS {}", expr, self.quote(&alias)));
        }

        if columns.is_empty() {
            return Ok(format!("{}.*", ROOT_ALIAS));
        }
        Ok(columns.join(", "))
    }

    /// A computed select expression
    fn expression(&mut self, term: TermId) -> RqlResult<String> {
        let query = self.query;
        let tree = query.tree();
        let token = tree.token(term);
        if tree.is_leaf(term) {
            if token == "*" && !tree.is_quoted(term) {
                return Ok("*".to_string());
            }
            if tree.is_quoted(term) {
                return Err(GrammarError::ExpectedColumn {
                    token: tree.to_rql(term),
                }
                .into());
            }
            return Ok(self.column(token)?.0);
        }

        match token.to_ascii_lowercase().as_str() {
            function @ ("count" | "sum" | "min" | "max" | "avg") => {
                let [argument] = tree.children(term) else {
                    return Err(arity(tree, term, "one argument"));
                };
                let argument = self.expression(*argument)?;
                Ok(format!("{}({})", function.to_uppercase(), argument))
            }
            "if" => {
                let [condition, then, otherwise] = tree.children(term) else {
                    return Err(arity(tree, term, "a condition and two results"));
                };
                let condition = self.predicate(*condition)?;
                let then = self.branch(*then)?;
                let otherwise = self.branch(*otherwise)?;
                Ok(format!(
                    "CASE WHEN {} THEN {} ELSE {} END",
                    condition, then, otherwise
                ))
            }
            _ => Err(RqlError::unsupported(
                BACKEND,
                token,
                "count, sum, min, max, avg, if",
            )),
        }
    }

    /// A result branch of `if`: numeric literals are inlined, anything else
    ///  is an expression
    fn branch(&mut self, term: TermId) -> RqlResult<String> {
        let query = self.query;
        let tree = query.tree();
        let token = tree.token(term);
        if tree.is_leaf(term) && !tree.is_quoted(term) && token.parse::<f64>().is_ok() {
            return Ok(token.to_string());
        }
        self.expression(term)
    }

    // ==================== Filter ====================

    fn filter(&mut self) -> RqlResult<Option<String>> {
        let query = self.query;
        let mut predicates = Vec::new();
        for term in query.filter().terms() {
            predicates.push(self.predicate(*term)?);
        }
        if predicates.is_empty() {
            return Ok(None);
        }
        Ok(Some(predicates.join(" AND ")))
    }

    fn predicate(&mut self, term: TermId) -> RqlResult<String> {
        let query = self.query;
        let tree = query.tree();
        let token = tree.token(term).to_ascii_lowercase();
        match token.as_str() {
            "and" | "or" => {
                let children = tree.children(term);
                if children.is_empty() {
                    return Err(arity(tree, term, "at least one condition"));
                }
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    parts.push(self.predicate(*child)?);
                }
                if parts.len() == 1 {
                    return Ok(parts.remove(0));
                }
                let separator = if token == "and" { " AND " } else { " OR " };
                Ok(format!("({})", parts.join(separator)))
            }
            "not" => {
                let [inner] = tree.children(term) else {
                    return Err(arity(tree, term, "one condition"));
                };
                Ok(format!("NOT ({})", self.predicate(*inner)?))
            }
            "eq" | "ne" | "lt" | "le" | "gt" | "ge" => self.comparison(term, &token),
            "in" | "out" => {
                let (_, name) = column_of(tree, term)?;
                let values = values_of(tree, term, 1)?;
                let (column, property) = self.column(name)?;
                let mut placeholders = Vec::with_capacity(values.len());
                for value in values {
                    let value = Value::cast(property, tree, *value)?;
                    placeholders.push(self.bind(name, value));
                }
                let op = if token == "in" { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", column, op, placeholders.join(", ")))
            }
            "n" | "nn" | "emp" | "nemp" => {
                if tree.children(term).len() != 1 {
                    return Err(arity(tree, term, "a column"));
                }
                let (_, name) = column_of(tree, term)?;
                let (column, _) = self.column(name)?;
                Ok(match token.as_str() {
                    "n" => format!("{} IS NULL", column),
                    "nn" => format!("{} IS NOT NULL", column),
                    "emp" => format!("({0} IS NULL OR {0} = '')", column),
                    _ => format!("({0} IS NOT NULL AND {0} <> '')", column),
                })
            }
            "sw" | "ew" | "w" | "wo" | "like" => self.text_match(term, &token),
            "if" => {
                let [condition, then, otherwise] = tree.children(term) else {
                    return Err(arity(tree, term, "a condition and two results"));
                };
                // the condition is emitted twice, so it is bound twice
                let when = self.predicate(*condition)?;
                let then = self.predicate(*then)?;
                let unless = self.predicate(*condition)?;
                let otherwise = self.predicate(*otherwise)?;
                Ok(format!(
                    "(({} AND {}) OR (NOT ({}) AND {}))",
                    when, then, unless, otherwise
                ))
            }
            _ => Err(GrammarError::UnknownToken {
                token: tree.to_rql(term),
            }
            .into()),
        }
    }

    fn comparison(&mut self, term: TermId, op: &str) -> RqlResult<String> {
        let query = self.query;
        let tree = query.tree();
        let (_, name) = column_of(tree, term)?;
        let value = single_value(tree, term)?;
        let (column, property) = self.column(name)?;

        if tree.is_null(value) {
            return match op {
                "eq" => Ok(format!("{} IS NULL", column)),
                "ne" => Ok(format!("{} IS NOT NULL", column)),
                _ => Err(GrammarError::InvalidValue {
                    column: name.to_string(),
                    value: "null".to_string(),
                    expected: "a non-null value".to_string(),
                }
                .into()),
            };
        }

        if matches!(op, "eq" | "ne") && is_wildcard(tree, value) {
            let pattern = like_pattern(tree.token(value), "like");
            let placeholder = self.bind(name, Value::Text(pattern));
            let not = if op == "ne" { "NOT " } else { "" };
            return Ok(format!(
                "{} {}LIKE {}{}",
                column,
                not,
                placeholder,
                self.like_suffix()
            ));
        }

        let value = Value::cast(property, tree, value)?;
        let placeholder = self.bind(name, value);
        let sql_op = match op {
            "eq" => "=",
            "ne" => "<>",
            "lt" => "<",
            "le" => "<=",
            "gt" => ">",
            _ => ">=",
        };
        Ok(format!("{} {} {}", column, sql_op, placeholder))
    }

    fn text_match(&mut self, term: TermId, kind: &str) -> RqlResult<String> {
        let query = self.query;
        let tree = query.tree();
        let (_, name) = column_of(tree, term)?;
        let values = values_of(tree, term, 1)?;
        let (column, _) = self.column(name)?;
        let not = if kind == "wo" { "NOT " } else { "" };
        let suffix = self.like_suffix();

        let mut parts = Vec::with_capacity(values.len());
        for value in values {
            let pattern = like_pattern(literal(tree, *value, name)?, kind);
            let placeholder = self.bind(name, Value::Text(pattern));
            parts.push(format!("{} {}LIKE {}{}", column, not, placeholder, suffix));
        }
        if parts.len() == 1 {
            return Ok(parts.remove(0));
        }
        let separator = if kind == "wo" { " AND " } else { " OR " };
        Ok(format!("({})", parts.join(separator)))
    }

    // ==================== Group / Order ====================

    fn group_by(&mut self) -> RqlResult<Option<String>> {
        let query = self.query;
        let tree = query.tree();
        let mut columns = Vec::new();
        for column in query.group().columns(tree) {
            columns.push(self.column(tree.token(column))?.0);
        }
        if columns.is_empty() {
            return Ok(None);
        }
        Ok(Some(columns.join(", ")))
    }

    fn order_by(&mut self) -> RqlResult<Option<String>> {
        let query = self.query;
        let tree = query.tree();
        let mut fields = Vec::new();
        for sort in query.order().sorts(tree) {
            let expr = if query.select().has_alias(tree, &sort.column) {
                self.quote(&sort.column)
            } else {
                self.column(&sort.column)?.0
            };
            let direction = if sort.ascending { "ASC" } else { "DESC" };
            fields.push(format!("{} {}", expr, direction));
        }
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(fields.join(", ")))
    }
}

/// Escape LIKE metacharacters in user text and add the wildcards for `kind`.
///  For `like` (and wildcard `eq`), `*` in the text becomes `%`.
pub(crate) fn like_pattern(text: &str, kind: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '*' if kind == "like" => escaped.push('%'),
            _ => escaped.push(c),
        }
    }
    match kind {
        "sw" => format!("{}%", escaped),
        "ew" => format!("%{}", escaped),
        "w" | "wo" => format!("%{}%", escaped),
        _ => escaped,
    }
}
