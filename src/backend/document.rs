//! Document-store query generation (`SELECT ... FROM c` with `@paramN`
//! parameters).
//!
//! The store has no joins and no general LIKE. Text matching is limited to
//! `STARTSWITH`/`ENDSWITH`; `w`, `wo` and mid-string `like` patterns are
//! rejected.

use tracing::debug;

use super::path::resolve_nested;
use super::{
    arity, column_of, is_wildcard, literal, single_value, values_of, Backend, BoundValues, Value,
};
use crate::config::CompilerConfig;
use crate::error::{GrammarError, RqlError, RqlResult};
use crate::metadata::{Catalog, Property};
use crate::query::{Clause, PageWindow, Query};
use crate::term::{TermId, Tree};

const BACKEND: &str = "document";

/// A named query parameter
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

/// Result of compiling a query for the document store
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DocumentQuery {
    pub query: String,
    /// `@paramN` to value, in emission order
    pub parameters: Vec<Parameter>,
    /// The same values keyed by the column they were compared against
    pub values: BoundValues,
    /// Value of a root-level equality on the partition key column
    pub partition_key: Option<Value>,
    /// Continuation token from `after(...)`
    pub continuation: Option<String>,
    /// `SELECT VALUE COUNT(1)` over the same filter, when `rowcount` was requested
    pub count_query: Option<String>,
    pub window: PageWindow,
}

impl DocumentQuery {
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

pub struct DocumentBackend {
    config: CompilerConfig,
}

impl DocumentBackend {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }
}

impl Backend for DocumentBackend {
    type Output = DocumentQuery;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn compile(&self, query: &Query<'_>, _catalog: &Catalog) -> RqlResult<DocumentQuery> {
        let compiled = DocumentCompiler::new(query).compile(&self.config)?;
        debug!(
            query_len = compiled.query.len(),
            values = compiled.values.len(),
            partitioned = compiled.partition_key.is_some(),
            "compiled document query"
        );
        Ok(compiled)
    }
}

struct DocumentCompiler<'a> {
    query: &'a Query<'a>,
    parameters: Vec<Parameter>,
    values: BoundValues,
}

impl<'a> DocumentCompiler<'a> {
    fn new(query: &'a Query<'a>) -> Self {
        Self {
            query,
            parameters: Vec::new(),
            values: BoundValues::new(),
        }
    }

    fn compile(mut self, config: &CompilerConfig) -> RqlResult<DocumentQuery> {
        let query = self.query;
        let tree = query.tree();
        let select = query.select();

        let projection = self.projection()?;
        let filter = self.filter()?;
        let group_by = self.group_by()?;
        let order_by = self.order_by()?;

        let mut text = format!(
            "SELECT {}{} FROM c",
            if select.is_distinct(tree) { "DISTINCT " } else { "" },
            projection
        );
        let mut count_query = String::from("SELECT VALUE COUNT(1) FROM c");
        if let Some(f) = &filter {
            text.push_str(&format!(" WHERE {}", f));
            count_query.push_str(&format!(" WHERE {}", f));
        }
        if let Some(g) = group_by {
            text.push_str(&format!(" GROUP BY {}", g));
        }
        if let Some(o) = order_by {
            text.push_str(&format!(" ORDER BY {}", o));
        }
        let window = query.page().window(config);
        text.push_str(&format!(" OFFSET {} LIMIT {}", window.offset, window.limit));

        let continuation = query
            .page()
            .after(tree)
            .first()
            .map(|t| tree.token(*t).to_string());

        Ok(DocumentQuery {
            query: text,
            partition_key: self.partition_key()?,
            parameters: self.parameters,
            values: self.values,
            continuation,
            count_query: select.wants_row_count(tree).then_some(count_query),
            window,
        })
    }

    // ==================== Helper Methods ====================

    fn bind(&mut self, column: &str, value: Value) -> String {
        let name = format!("@param{}", self.parameters.len() + 1);
        self.parameters.push(Parameter {
            name: name.clone(),
            value: value.clone(),
        });
        self.values.push(column, value);
        name
    }

    /// `c["Column"]["nested"]` plus the property used for casting
    fn property(&self, path: &str) -> RqlResult<(String, Property)> {
        let (segments, property) = resolve_nested(BACKEND, self.query.collection(), path)?;
        let mut reference = String::from("c");
        for segment in segments {
            reference.push_str(&format!("[\"{}\"]", segment.replace('"', "\\\"")));
        }
        Ok((reference, property))
    }

    fn partition_key(&self) -> RqlResult<Option<Value>> {
        let query = self.query;
        let tree = query.tree();
        let collection = query.collection();
        let Some(index) = collection.partition_index() else {
            return Ok(None);
        };
        let Some(partition) = collection.index_properties(index)?.into_iter().next() else {
            return Ok(None);
        };
        for term in query.filter().terms() {
            if !tree.has_token(*term, "eq") {
                continue;
            }
            let (Ok((_, name)), Ok(value)) = (column_of(tree, *term), single_value(tree, *term))
            else {
                continue;
            };
            let same_column = collection
                .property(name)
                .is_some_and(|p| p.name == partition.name);
            if same_column && !is_wildcard(tree, value) && !tree.is_null(value) {
                return Value::cast(partition, tree, value).map(Some);
            }
        }
        Ok(None)
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
            columns.push(self.property(tree.token(column))?.0);
        }
        for projection in select.projections(tree) {
            let expr = self.expression(projection.expression)?;
            if projection.is_anonymous(tree) {
                columns.push(expr);
            } else {
                columns.push(format!("{} AS {}", expr, tree.token(projection.alias)));
            }
        }

        if columns.is_empty() {
            return Ok("*".to_string());
        }
        Ok(columns.join(", "))
    }

    fn expression(&mut self, term: TermId) -> RqlResult<String> {
        let query = self.query;
        let tree = query.tree();
        let token = tree.token(term);
        if tree.is_leaf(term) {
            if tree.is_quoted(term) {
                return Err(GrammarError::ExpectedColumn {
                    token: tree.to_rql(term),
                }
                .into());
            }
            return Ok(self.property(token)?.0);
        }

        match token.to_ascii_lowercase().as_str() {
            function @ ("count" | "sum" | "min" | "max" | "avg") => {
                let [argument] = tree.children(term) else {
                    return Err(arity(tree, term, "one argument"));
                };
                let argument = if tree.token(*argument) == "*" && tree.is_leaf(*argument) {
                    "1".to_string()
                } else {
                    self.expression(*argument)?
                };
                Ok(format!("{}({})", function.to_uppercase(), argument))
            }
            "if" => {
                let [condition, then, otherwise] = tree.children(term) else {
                    return Err(arity(tree, term, "a condition and two results"));
                };
                let condition = self.predicate(*condition)?;
                let then = self.branch(tree, *then)?;
                let otherwise = self.branch(tree, *otherwise)?;
                Ok(format!("({} ? {} : {})", condition, then, otherwise))
            }
            _ => Err(RqlError::unsupported(
                BACKEND,
                token,
                "count, sum, min, max, avg, if",
            )),
        }
    }

    fn branch(&mut self, tree: &Tree, term: TermId) -> RqlResult<String> {
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
                let (reference, property) = self.property(name)?;
                let mut placeholders = Vec::with_capacity(values.len());
                for value in values {
                    let value = Value::cast(&property, tree, *value)?;
                    placeholders.push(self.bind(name, value));
                }
                let op = if token == "in" { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", reference, op, placeholders.join(", ")))
            }
            "n" | "nn" | "emp" | "nemp" => {
                if tree.children(term).len() != 1 {
                    return Err(arity(tree, term, "a column"));
                }
                let (_, name) = column_of(tree, term)?;
                let (r, _) = self.property(name)?;
                Ok(match token.as_str() {
                    "n" => format!("(NOT IS_DEFINED({0}) OR IS_NULL({0}))", r),
                    "nn" => format!("(IS_DEFINED({0}) AND NOT IS_NULL({0}))", r),
                    "emp" => format!("(NOT IS_DEFINED({0}) OR IS_NULL({0}) OR {0} = \"\")", r),
                    _ => format!("(IS_DEFINED({0}) AND NOT IS_NULL({0}) AND {0} != \"\")", r),
                })
            }
            "sw" | "ew" => {
                let (_, name) = column_of(tree, term)?;
                let values = values_of(tree, term, 1)?;
                let (reference, _) = self.property(name)?;
                let function = if token == "sw" { "STARTSWITH" } else { "ENDSWITH" };
                let mut parts = Vec::with_capacity(values.len());
                for value in values {
                    let text = literal(tree, *value, name)?;
                    let placeholder = self.bind(name, Value::text(text));
                    parts.push(format!("{}({}, {})", function, reference, placeholder));
                }
                Ok(any_of(parts))
            }
            "like" => {
                let (_, name) = column_of(tree, term)?;
                let values = values_of(tree, term, 1)?;
                let (reference, _) = self.property(name)?;
                let mut parts = Vec::with_capacity(values.len());
                for value in values {
                    let pattern = literal(tree, *value, name)?;
                    parts.push(self.like(&reference, name, pattern)?);
                }
                Ok(any_of(parts))
            }
            "w" | "wo" => Err(RqlError::unsupported(BACKEND, token, "sw, ew")),
            "if" => {
                let [condition, then, otherwise] = tree.children(term) else {
                    return Err(arity(tree, term, "a condition and two results"));
                };
                let condition = self.predicate(*condition)?;
                let then = self.predicate(*then)?;
                let otherwise = self.predicate(*otherwise)?;
                Ok(format!("({} ? {} : {})", condition, then, otherwise))
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
        let (reference, property) = self.property(name)?;

        if tree.is_null(value) {
            return match op {
                "eq" => Ok(format!("(NOT IS_DEFINED({0}) OR IS_NULL({0}))", reference)),
                "ne" => Ok(format!("(IS_DEFINED({0}) AND NOT IS_NULL({0}))", reference)),
                _ => Err(GrammarError::InvalidValue {
                    column: name.to_string(),
                    value: "null".to_string(),
                    expected: "a non-null value".to_string(),
                }
                .into()),
            };
        }
        if matches!(op, "eq" | "ne") && is_wildcard(tree, value) {
            let like = self.like(&reference, name, tree.token(value))?;
            return Ok(if op == "ne" {
                format!("NOT {}", like)
            } else {
                like
            });
        }

        let value = Value::cast(&property, tree, value)?;
        let placeholder = self.bind(name, value);
        let doc_op = match op {
            "eq" => "=",
            "ne" => "!=",
            "lt" => "<",
            "le" => "<=",
            "gt" => ">",
            _ => ">=",
        };
        Ok(format!("{} {} {}", reference, doc_op, placeholder))
    }

    /// A `*` pattern expressible as a prefix or suffix match
    fn like(&mut self, reference: &str, column: &str, pattern: &str) -> RqlResult<String> {
        let leading = pattern.starts_with('*');
        let trailing = pattern.ends_with('*') && pattern.len() > 1;
        let inner = pattern.trim_matches('*');
        if inner.contains('*') || (leading && trailing) || inner.is_empty() {
            return Err(RqlError::unsupported(BACKEND, "like", "sw, ew"));
        }
        let placeholder = self.bind(column, Value::text(inner));
        Ok(match (leading, trailing) {
            (false, true) => format!("STARTSWITH({}, {})", reference, placeholder),
            (true, false) => format!("ENDSWITH({}, {})", reference, placeholder),
            _ => format!("{} = {}", reference, placeholder),
        })
    }

    // ==================== Group / Order ====================

    fn group_by(&mut self) -> RqlResult<Option<String>> {
        let query = self.query;
        let tree = query.tree();
        let mut columns = Vec::new();
        for column in query.group().columns(tree) {
            columns.push(self.property(tree.token(column))?.0);
        }
        Ok((!columns.is_empty()).then(|| columns.join(", ")))
    }

    fn order_by(&mut self) -> RqlResult<Option<String>> {
        let query = self.query;
        let tree = query.tree();
        let mut fields = Vec::new();
        for sort in query.order().sorts(tree) {
            if query.select().has_alias(tree, &sort.column) {
                return Err(RqlError::unsupported(
                    BACKEND,
                    format!("order by alias '{}'", sort.column),
                    "order by a property",
                ));
            }
            let (reference, _) = self.property(&sort.column)?;
            let direction = if sort.ascending { "ASC" } else { "DESC" };
            fields.push(format!("{} {}", reference, direction));
        }
        Ok((!fields.is_empty()).then(|| fields.join(", ")))
    }
}

fn any_of(mut parts: Vec<String>) -> String {
    if parts.len() == 1 {
        return parts.remove(0);
    }
    format!("({})", parts.join(" OR "))
}
