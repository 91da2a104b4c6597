//! Key-value store request generation.
//!
//! Attribute names and values never appear inline: names become `#nameN`
//! and values `:valN`, collected in two maps. A root-level equality on the
//! hash column of the primary (or a secondary) index turns the request into
//! a `Query` with a key condition; anything else is a `Scan`.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use super::path::resolve_nested;
use super::{
    arity, column_of, is_wildcard, literal, single_value, values_of, Backend, BoundValues, Value,
};
use crate::config::CompilerConfig;
use crate::error::{GrammarError, RqlError, RqlResult};
use crate::metadata::{Catalog, Collection, Index, IndexKind, Property};
use crate::query::{Clause, Query};
use crate::term::{TermId, Tree};

const BACKEND: &str = "keyvalue";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum KeyValueOperation {
    Query,
    Scan,
}

/// Result of compiling a query for the key-value store
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct KeyValueRequest {
    pub operation: KeyValueOperation,
    pub table_name: String,
    /// Secondary index the key condition targets
    pub index_name: Option<String>,
    pub key_condition_expression: Option<String>,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: BTreeMap<String, String>,
    pub expression_attribute_values: BTreeMap<String, Value>,
    /// Bound values keyed by column, in emission order
    pub values: BoundValues,
    /// Sort-key direction, when ordering was requested
    pub scan_index_forward: Option<bool>,
    pub exclusive_start_key: Option<BTreeMap<String, Value>>,
    pub limit: u64,
    /// The store has no offset; callers skip this many items themselves
    pub offset: u64,
    /// Return only the matching item count
    pub select_count: bool,
}

pub struct KeyValueBackend {
    config: CompilerConfig,
}

impl KeyValueBackend {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }
}

impl Backend for KeyValueBackend {
    type Output = KeyValueRequest;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn compile(&self, query: &Query<'_>, _catalog: &Catalog) -> RqlResult<KeyValueRequest> {
        let request = KeyValueCompiler::new(query).compile(&self.config)?;
        debug!(
            operation = ?request.operation,
            index = ?request.index_name,
            values = request.values.len(),
            "compiled key-value request"
        );
        Ok(request)
    }
}

/// The index chosen for a key condition and the terms it consumed
struct KeyChoice<'a> {
    index: &'a Index,
    sort_key: Option<&'a Property>,
    condition: String,
    consumed: Vec<TermId>,
}

struct KeyValueCompiler<'a> {
    query: &'a Query<'a>,
    /// Attribute to `#nameN`
    name_placeholders: HashMap<String, String>,
    names: BTreeMap<String, String>,
    attribute_values: BTreeMap<String, Value>,
    values: BoundValues,
}

impl<'a> KeyValueCompiler<'a> {
    fn new(query: &'a Query<'a>) -> Self {
        Self {
            query,
            name_placeholders: HashMap::new(),
            names: BTreeMap::new(),
            attribute_values: BTreeMap::new(),
            values: BoundValues::new(),
        }
    }

    fn compile(mut self, config: &CompilerConfig) -> RqlResult<KeyValueRequest> {
        let query = self.query;
        let tree = query.tree();
        self.reject_unsupported()?;

        let projection = self.projection()?;
        let key = self.key_condition()?;
        let filter = self.filter(key.as_ref().map(|k| k.consumed.as_slice()).unwrap_or(&[]))?;
        let scan_index_forward = self.scan_direction(key.as_ref())?;
        let exclusive_start_key = self.exclusive_start_key()?;
        let window = query.page().window(config);

        let (operation, index_name, key_condition_expression) = match key {
            Some(key) => (
                KeyValueOperation::Query,
                (key.index.kind != IndexKind::Primary).then(|| key.index.name.clone()),
                Some(key.condition),
            ),
            None => (KeyValueOperation::Scan, None, None),
        };

        Ok(KeyValueRequest {
            operation,
            table_name: query.collection().table_name().to_string(),
            index_name,
            key_condition_expression,
            filter_expression: filter,
            projection_expression: projection,
            expression_attribute_names: self.names,
            expression_attribute_values: self.attribute_values,
            values: self.values,
            scan_index_forward,
            exclusive_start_key,
            limit: window.limit,
            offset: window.offset,
            select_count: query.select().wants_row_count(tree),
        })
    }

    // ==================== Helper Methods ====================

    fn reject_unsupported(&self) -> RqlResult<()> {
        let query = self.query;
        let tree = query.tree();
        let select = query.select();
        if let Some(projection) = select.projections(tree).first() {
            let function = tree.token(projection.expression);
            return Err(RqlError::unsupported(BACKEND, function, "includes"));
        }
        if !query.group().is_empty() {
            return Err(RqlError::unsupported(BACKEND, "group", "includes"));
        }
        if select.is_distinct(tree) {
            return Err(RqlError::unsupported(BACKEND, "distinct", "includes"));
        }
        Ok(())
    }

    /// `#nameN` for each path segment, reusing placeholders per attribute
    fn name(&mut self, path: &str) -> RqlResult<(String, Property)> {
        let (segments, property) = resolve_nested(BACKEND, self.query.collection(), path)?;
        let mut placeholders = Vec::with_capacity(segments.len());
        for segment in segments {
            let placeholder = match self.name_placeholders.get(&segment) {
                Some(existing) => existing.clone(),
                None => {
                    let placeholder = format!("#name{}", self.name_placeholders.len() + 1);
                    self.name_placeholders
                        .insert(segment.clone(), placeholder.clone());
                    self.names.insert(placeholder.clone(), segment);
                    placeholder
                }
            };
            placeholders.push(placeholder);
        }
        Ok((placeholders.join("."), property))
    }

    fn bind(&mut self, column: &str, value: Value) -> String {
        let placeholder = format!(":val{}", self.attribute_values.len() + 1);
        self.attribute_values
            .insert(placeholder.clone(), value.clone());
        self.values.push(column, value);
        placeholder
    }

    // ==================== Key Condition ====================

    /// Pick the primary index, then secondary indexes, whose hash column has
    ///  a root-level equality
    fn key_condition(&mut self) -> RqlResult<Option<KeyChoice<'a>>> {
        let query = self.query;
        let tree = query.tree();
        let collection = query.collection();
        let terms = query.filter().terms();

        let candidates = collection
            .indexes()
            .filter(|i| i.kind == IndexKind::Primary)
            .chain(
                collection
                    .indexes()
                    .filter(|i| i.kind == IndexKind::Secondary),
            );
        for index in candidates {
            let properties = collection.index_properties(index)?;
            let hash = properties[0];
            let Some(hash_term) = terms
                .iter()
                .copied()
                .find(|t| key_comparison(tree, collection, *t, hash, &["eq"]))
            else {
                continue;
            };
            trace!(index = %index.name, "using index for key condition");

            let mut condition = self.simple_comparison(hash_term)?;
            let mut consumed = vec![hash_term];
            let sort_key = properties.get(1).copied();
            if let Some(sort) = sort_key {
                let range = terms.iter().copied().find(|t| {
                    *t != hash_term && key_comparison(tree, collection, *t, sort, SORT_KEY_TOKENS)
                });
                if let Some(range) = range {
                    let range_sql = self.simple_comparison(range)?;
                    condition = format!("{} AND {}", condition, range_sql);
                    consumed.push(range);
                }
            }
            return Ok(Some(KeyChoice {
                index,
                sort_key,
                condition,
                consumed,
            }));
        }
        Ok(None)
    }

    /// `#n op :v` or `begins_with(#n, :v)` for a single-valued comparison
    fn simple_comparison(&mut self, term: TermId) -> RqlResult<String> {
        let query = self.query;
        let tree = query.tree();
        let (_, column) = column_of(tree, term)?;
        let value = single_value(tree, term)?;
        let (name, property) = self.name(column)?;
        let token = tree.token(term).to_ascii_lowercase();
        if token == "sw" {
            let text = literal(tree, value, column)?;
            let placeholder = self.bind(column, Value::text(text));
            return Ok(format!("begins_with({}, {})", name, placeholder));
        }
        let value = Value::cast(&property, tree, value)?;
        let placeholder = self.bind(column, value);
        Ok(format!("{} {} {}", name, operator(&token), placeholder))
    }

    fn scan_direction(&self, key: Option<&KeyChoice<'_>>) -> RqlResult<Option<bool>> {
        let query = self.query;
        let collection = query.collection();
        let sorts = query.order().sorts(query.tree());
        let [sort] = sorts.as_slice() else {
            if sorts.is_empty() {
                return Ok(None);
            }
            return Err(unsupported_order());
        };
        let on_sort_key = key
            .and_then(|k| k.sort_key)
            .zip(collection.property(&sort.column))
            .is_some_and(|(sort_key, p)| sort_key.name == p.name);
        if !on_sort_key {
            return Err(unsupported_order());
        }
        Ok(Some(sort.ascending))
    }

    fn exclusive_start_key(&self) -> RqlResult<Option<BTreeMap<String, Value>>> {
        let query = self.query;
        let tree = query.tree();
        let collection = query.collection();
        let after = query.page().after(tree);
        if after.is_empty() {
            return Ok(None);
        }
        let primary = collection
            .primary_index()
            .ok_or_else(|| collection.misconfigured("no primary index for after(...)"))?;
        let properties = collection.index_properties(primary)?;
        if properties.len() != after.len() {
            return Err(GrammarError::KeyArity {
                index: primary.name.clone(),
                key: after
                    .iter()
                    .map(|t| tree.token(*t))
                    .collect::<Vec<_>>()
                    .join(","),
                expected: properties.len(),
                found: after.len(),
            }
            .into());
        }
        let mut key = BTreeMap::new();
        for (property, term) in properties.into_iter().zip(after) {
            key.insert(
                property.column_name().to_string(),
                Value::cast(property, tree, term)?,
            );
        }
        Ok(Some(key))
    }

    // ==================== Projection / Filter ====================

    fn projection(&mut self) -> RqlResult<Option<String>> {
        let query = self.query;
        let tree = query.tree();
        let mut names = Vec::new();
        for column in query.select().includes(tree) {
            if !tree.is_leaf(column) || tree.is_quoted(column) {
                return Err(GrammarError::ExpectedColumn {
                    token: tree.to_rql(column),
                }
                .into());
            }
            names.push(self.name(tree.token(column))?.0);
        }
        Ok((!names.is_empty()).then(|| names.join(", ")))
    }

    fn filter(&mut self, consumed: &[TermId]) -> RqlResult<Option<String>> {
        let query = self.query;
        let mut predicates = Vec::new();
        for term in query.filter().terms() {
            if consumed.contains(term) {
                continue;
            }
            predicates.push(self.predicate(*term)?);
        }
        Ok((!predicates.is_empty()).then(|| predicates.join(" AND ")))
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
            "eq" | "ne" | "lt" | "le" | "gt" | "ge" => self.comparison(tree, term, &token),
            "in" | "out" => {
                let (_, column) = column_of(tree, term)?;
                let values = values_of(tree, term, 1)?;
                let (name, property) = self.name(column)?;
                let mut placeholders = Vec::with_capacity(values.len());
                for value in values {
                    let value = Value::cast(&property, tree, *value)?;
                    placeholders.push(self.bind(column, value));
                }
                let list = format!("{} IN ({})", name, placeholders.join(", "));
                Ok(if token == "in" {
                    list
                } else {
                    format!("NOT ({})", list)
                })
            }
            "n" | "nn" => {
                if tree.children(term).len() != 1 {
                    return Err(arity(tree, term, "a column"));
                }
                let (_, column) = column_of(tree, term)?;
                let (name, _) = self.name(column)?;
                Ok(if token == "n" {
                    format!("attribute_not_exists({})", name)
                } else {
                    format!("attribute_exists({})", name)
                })
            }
            "emp" | "nemp" => {
                if tree.children(term).len() != 1 {
                    return Err(arity(tree, term, "a column"));
                }
                let (_, column) = column_of(tree, term)?;
                let (name, _) = self.name(column)?;
                let empty = self.bind(column, Value::text(""));
                Ok(if token == "emp" {
                    format!("(attribute_not_exists({0}) OR {0} = {1})", name, empty)
                } else {
                    format!("(attribute_exists({0}) AND {0} <> {1})", name, empty)
                })
            }
            "sw" | "w" | "wo" => {
                let (_, column) = column_of(tree, term)?;
                let values = values_of(tree, term, 1)?;
                let (name, _) = self.name(column)?;
                let mut parts = Vec::with_capacity(values.len());
                for value in values {
                    let text = literal(tree, *value, column)?;
                    let placeholder = self.bind(column, Value::text(text));
                    parts.push(match token.as_str() {
                        "sw" => format!("begins_with({}, {})", name, placeholder),
                        "w" => format!("contains({}, {})", name, placeholder),
                        _ => format!("NOT contains({}, {})", name, placeholder),
                    });
                }
                if parts.len() == 1 {
                    return Ok(parts.remove(0));
                }
                let separator = if token == "wo" { " AND " } else { " OR " };
                Ok(format!("({})", parts.join(separator)))
            }
            "like" => {
                let (_, column) = column_of(tree, term)?;
                let values = values_of(tree, term, 1)?;
                let (name, _) = self.name(column)?;
                let mut parts = Vec::with_capacity(values.len());
                for value in values {
                    let pattern = literal(tree, *value, column)?;
                    parts.push(self.like(&name, column, pattern)?);
                }
                if parts.len() == 1 {
                    return Ok(parts.remove(0));
                }
                Ok(format!("({})", parts.join(" OR ")))
            }
            "ew" => Err(RqlError::unsupported(BACKEND, "ew", "sw, w")),
            "if" => Err(RqlError::unsupported(BACKEND, "if", "and, or, not")),
            _ => Err(GrammarError::UnknownToken {
                token: tree.to_rql(term),
            }
            .into()),
        }
    }

    fn comparison(&mut self, tree: &Tree, term: TermId, op: &str) -> RqlResult<String> {
        let (_, column) = column_of(tree, term)?;
        let value = single_value(tree, term)?;
        let (name, property) = self.name(column)?;
        if tree.is_null(value) {
            return match op {
                "eq" => Ok(format!("attribute_not_exists({})", name)),
                "ne" => Ok(format!("attribute_exists({})", name)),
                _ => Err(GrammarError::InvalidValue {
                    column: column.to_string(),
                    value: "null".to_string(),
                    expected: "a non-null value".to_string(),
                }
                .into()),
            };
        }
        if matches!(op, "eq" | "ne") && is_wildcard(tree, value) {
            let like = self.like(&name, column, tree.token(value))?;
            return Ok(if op == "ne" {
                format!("NOT ({})", like)
            } else {
                like
            });
        }
        let value = Value::cast(&property, tree, value)?;
        let placeholder = self.bind(column, value);
        Ok(format!("{} {} {}", name, operator(op), placeholder))
    }

    /// `abc*` is a prefix match and `*abc*` a contains match
    fn like(&mut self, name: &str, column: &str, pattern: &str) -> RqlResult<String> {
        let leading = pattern.starts_with('*');
        let trailing = pattern.ends_with('*') && pattern.len() > 1;
        let inner = pattern.trim_matches('*');
        if inner.contains('*') || inner.is_empty() || (leading && !trailing) {
            return Err(RqlError::unsupported(BACKEND, "like", "sw, w"));
        }
        let placeholder = self.bind(column, Value::text(inner));
        Ok(match (leading, trailing) {
            (true, true) => format!("contains({}, {})", name, placeholder),
            (false, true) => format!("begins_with({}, {})", name, placeholder),
            _ => format!("{} = {}", name, placeholder),
        })
    }
}

/// Conditions a sort key accepts inside a key condition
const SORT_KEY_TOKENS: &[&str] = &["eq", "lt", "le", "gt", "ge", "sw"];

/// A root-level single-valued comparison on `property`
fn key_comparison(
    tree: &Tree,
    collection: &Collection,
    term: TermId,
    property: &Property,
    tokens: &[&str],
) -> bool {
    if !tokens.iter().any(|t| tree.has_token(term, t)) {
        return false;
    }
    let (Ok((_, column)), Ok(value)) = (column_of(tree, term), single_value(tree, term)) else {
        return false;
    };
    collection
        .property(column)
        .is_some_and(|p| p.name == property.name)
        && tree.is_leaf(value)
        && !tree.is_null(value)
        && !is_wildcard(tree, value)
}

fn operator(op: &str) -> &'static str {
    match op {
        "eq" => "=",
        "ne" => "<>",
        "lt" => "<",
        "le" => "<=",
        "gt" => ">",
        _ => ">=",
    }
}

fn unsupported_order() -> RqlError {
    RqlError::unsupported(BACKEND, "order", "a single sort on the key condition's sort key")
}
