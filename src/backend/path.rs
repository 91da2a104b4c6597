//! Attribute path resolution shared by the backends

use crate::error::{GrammarError, MetadataError, RqlError, RqlResult};
use crate::metadata::{Catalog, Collection, Property, Relationship};

/// One relationship traversed by a dotted path
#[derive(Debug, Clone)]
pub(crate) struct Hop<'m> {
    /// Path up to and including this hop, e.g. `customer` or `customer.orders`
    pub prefix: String,
    pub relationship: &'m Relationship,
    pub target: &'m Collection,
}

/// `a.b.c` resolved to its relationship hops and final property
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPath<'m> {
    pub hops: Vec<Hop<'m>>,
    pub property: &'m Property,
}

impl ResolvedPath<'_> {
    pub fn is_to_many(&self) -> bool {
        self.hops
            .iter()
            .any(|h| h.relationship.cardinality.is_to_many())
    }
}

/// Resolve every segment but the last as a relationship
pub(crate) fn resolve<'m>(
    catalog: &'m Catalog,
    root: &'m Collection,
    path: &str,
    max_depth: u8,
) -> RqlResult<ResolvedPath<'m>> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, relationships) = match segments.split_last() {
        Some((last, rest)) if !last.is_empty() => (*last, rest),
        _ => {
            return Err(GrammarError::ExpectedColumn {
                token: path.to_string(),
            }
            .into())
        }
    };
    if relationships.len() > max_depth as usize {
        return Err(GrammarError::RelationshipDepthExceeded {
            max: max_depth,
            path: path.to_string(),
        }
        .into());
    }

    let mut current = root;
    let mut hops = Vec::with_capacity(relationships.len());
    for (i, name) in relationships.iter().enumerate() {
        let relationship =
            current
                .relationship(name)
                .ok_or_else(|| MetadataError::UnknownRelationship {
                    collection: current.name.clone(),
                    relationship: name.to_string(),
                })?;
        let target = catalog.require(&relationship.related)?;
        hops.push(Hop {
            prefix: segments[..=i].join("."),
            relationship,
            target,
        });
        current = target;
    }

    let property = current.require_property(last)?;
    Ok(ResolvedPath { hops, property })
}

/// For stores without joins: the first segment must be a property of `root`;
///  further segments are nested fields. Returns the physical segments.
pub(crate) fn resolve_nested(
    backend: &str,
    root: &Collection,
    path: &str,
) -> RqlResult<(Vec<String>, Property)> {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let nested: Vec<String> = segments.map(str::to_string).collect();

    if !nested.is_empty() && root.relationship(first).is_some() {
        return Err(RqlError::unsupported(
            backend,
            format!("relationship path '{path}'"),
            "properties of the queried collection",
        ));
    }
    if nested.iter().any(String::is_empty) {
        return Err(GrammarError::ExpectedColumn {
            token: path.to_string(),
        }
        .into());
    }

    let property = root.require_property(first)?;
    let mut physical = vec![property.column_name().to_string()];
    physical.extend(nested.iter().cloned());

    // a nested field's type is unknown; compare it as text
    let property = if nested.is_empty() {
        property.clone()
    } else {
        Property::new(path, Default::default())
    };
    Ok((physical, property))
}
