//! The Where clause: filters, `_key` expansion and conjunction unwrapping

use tracing::trace;

use super::clause::{Clause, ClauseContext, ClauseKind};
use super::key;
use crate::error::{GrammarError, RqlResult};
use crate::term::TermId;

/// Filter terms. Sibling terms are implicitly AND-ed.
#[derive(Debug, Clone, Default)]
pub struct Where {
    terms: Vec<TermId>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(&mut self, cx: &mut ClauseContext<'_>, term: TermId) {
        if cx.tree.has_token(term, "and") {
            trace!("unwrapping root and");
            for child in cx.tree.children(term).to_vec() {
                cx.tree.detach(child);
                self.normalize(cx, child);
            }
            return;
        }
        self.terms.push(term);
    }
}

/// `eq(col,a,b,...)` anywhere under `term` becomes `in(col,a,b,...)`
fn multi_value_eq_to_in(cx: &mut ClauseContext<'_>, term: TermId) {
    for found in cx.tree.find_all(term, "eq") {
        if cx.tree.children(found).len() > 2 {
            trace!("rewriting multi-value eq to in");
            cx.tree.set_token(found, "in");
        }
    }
}

/// Replace every `_key(...)` under `term`. Returns the (possibly new) root.
pub(crate) fn expand_keys(cx: &mut ClauseContext<'_>, term: TermId) -> RqlResult<TermId> {
    let mut root = term;
    for found in cx.tree.find_all(term, "_key") {
        let expansion = expand_key(cx, found)?;
        if found == root {
            root = expansion;
        } else {
            cx.tree.replace(found, expansion);
        }
    }
    Ok(root)
}

fn expand_key(cx: &mut ClauseContext<'_>, term: TermId) -> RqlResult<TermId> {
    let children = cx.tree.children(term).to_vec();
    let [index, keys @ ..] = children.as_slice() else {
        return Err(arity_error());
    };
    if keys.is_empty() {
        return Err(arity_error());
    }

    let index_name = cx.tree.token(*index).to_string();
    let index = cx.collection.require_index(&index_name)?;
    if !index.is_unique() {
        return Err(GrammarError::NonUniqueIndex { index: index_name }.into());
    }
    let columns: Vec<String> = cx
        .collection
        .index_properties(index)?
        .into_iter()
        .map(|p| p.name.clone())
        .collect();
    trace!(index = %index_name, keys = keys.len(), "expanding _key");

    let decoded = keys
        .iter()
        .map(|k| -> RqlResult<_> {
            let parts = key::decode(&index_name, cx.tree.token(*k), columns.len())?;
            Ok((parts, cx.tree.quote(*k)))
        })
        .collect::<RqlResult<Vec<_>>>()?;

    if columns.len() == 1 {
        let mut args = vec![cx.tree.leaf(columns[0].clone(), None)];
        for (parts, quote) in decoded {
            for part in parts {
                args.push(value_leaf(cx, part, quote));
            }
        }
        let token = if args.len() == 2 { "eq" } else { "in" };
        return Ok(cx.tree.call(token, args));
    }

    let mut branches = Vec::new();
    for (parts, quote) in decoded {
        let mut comparisons = Vec::new();
        for (column, part) in columns.iter().zip(parts) {
            let column = cx.tree.leaf(column.clone(), None);
            let value = value_leaf(cx, part, quote);
            comparisons.push(cx.tree.call("eq", vec![column, value]));
        }
        branches.push(cx.tree.call("and", comparisons));
    }
    if branches.len() == 1 {
        return Ok(branches.remove(0));
    }
    Ok(cx.tree.call("or", branches))
}

fn value_leaf(cx: &mut ClauseContext<'_>, value: String, quote: Option<char>) -> TermId {
    // a decoded "null" component is the string, not the keyword
    let quote = quote.or_else(|| value.eq_ignore_ascii_case("null").then_some('"'));
    cx.tree.leaf(value, quote)
}

fn arity_error() -> crate::error::RqlError {
    GrammarError::Arity {
        token: "_key".to_string(),
        expected: "an index name and at least one key".to_string(),
    }
    .into()
}

impl Clause for Where {
    fn kind(&self) -> ClauseKind {
        ClauseKind::Where
    }

    fn add(&mut self, cx: &mut ClauseContext<'_>, term: TermId) -> RqlResult<Vec<TermId>> {
        let term = expand_keys(cx, term)?;
        multi_value_eq_to_in(cx, term);
        self.normalize(cx, term);
        Ok(Vec::new())
    }

    fn terms(&self) -> &[TermId] {
        &self.terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MetadataError, RqlError};
    use crate::metadata::{Collection, Index, IndexKind, Property, PropertyType};
    use crate::parser::parse_into;
    use crate::term::Tree;

    fn things() -> Collection {
        let mut c = Collection::new("things");
        c.add_property(Property::new("type", PropertyType::String));
        c.add_property(Property::new("id", PropertyType::Integer));
        c.add_property(Property::new("name", PropertyType::String));
        c.add_index(Index::new("primaryIndex", IndexKind::Primary, ["type", "id"]));
        c.add_index(Index::new("nameIndex", IndexKind::Unique, ["name"]));
        c.add_index(Index::new("idIndex", IndexKind::Secondary, ["id"]));
        c
    }

    fn add(fragment: &str) -> RqlResult<Vec<String>> {
        let collection = things();
        let mut tree = Tree::new();
        let term = parse_into(&mut tree, fragment)?;
        let mut clause = Where::new();
        let mut cx = ClauseContext {
            tree: &mut tree,
            collection: &collection,
        };
        clause.add(&mut cx, term)?;
        Ok(clause.terms().iter().map(|t| tree.to_rql(*t)).collect())
    }

    #[test]
    fn test_composite_key() {
        assert_eq!(
            add("_key(primaryIndex,a~1,b~2)").unwrap(),
            vec!["or(and(eq(type,a),eq(id,1)),and(eq(type,b),eq(id,2)))"]
        );
    }

    #[test]
    fn test_single_composite_key_unwraps() {
        assert_eq!(
            add("_key(primaryIndex,a~1)").unwrap(),
            vec!["eq(type,a)", "eq(id,1)"]
        );
    }

    #[test]
    fn test_single_column_key() {
        assert_eq!(add("_key(nameIndex,bob)").unwrap(), vec!["eq(name,bob)"]);
        assert_eq!(
            add("_key(nameIndex,bob,ann)").unwrap(),
            vec!["in(name,bob,ann)"]
        );
    }

    #[test]
    fn test_nested_key() {
        assert_eq!(
            add("or(_key(nameIndex,bob),n(name))").unwrap(),
            vec!["or(eq(name,bob),n(name))"]
        );
    }

    #[test]
    fn test_key_errors() {
        assert!(matches!(
            add("_key(primaryIndex,a~1~2)"),
            Err(RqlError::Grammar(GrammarError::KeyArity { .. }))
        ));
        assert!(matches!(
            add("_key(primaryIndex,a~)"),
            Err(RqlError::Grammar(GrammarError::EmptyKeyComponent { .. }))
        ));
        assert!(matches!(
            add("_key(nope,a)"),
            Err(RqlError::Metadata(MetadataError::UnknownIndex { .. }))
        ));
        assert!(matches!(
            add("_key(nameIndex)"),
            Err(RqlError::Grammar(GrammarError::Arity { .. }))
        ));
        assert_eq!(
            add("_key(idIndex,3)"),
            Err(GrammarError::NonUniqueIndex {
                index: "idIndex".into()
            }
            .into())
        );
    }

    #[test]
    fn test_backslash_survives_key_decoding() {
        let encoded = key::encode(&[r"c\d", "1"]);
        assert_eq!(
            add(&format!("_key(primaryIndex,{encoded})")).unwrap(),
            vec![r"eq(type,c\d)", "eq(id,1)"]
        );
    }

    #[test]
    fn test_multi_value_eq() {
        assert_eq!(add("name=a,b").unwrap(), vec!["in(name,a,b)"]);
        assert_eq!(add("and(eq(name,a),gt(id,3))").unwrap(), vec!["eq(name,a)", "gt(id,3)"]);
        assert_eq!(
            add("or(eq(name,a,b),not(eq(type,x,y)))").unwrap(),
            vec!["or(in(name,a,b),not(in(type,x,y)))"]
        );
    }
}
