//! Collection metadata consumed by the compiler.
//!
//! A [Catalog] is loaded once at startup and only ever read afterwards; every
//!  compile call takes it by shared reference.
//!
//! # Example
//!
//! ```rust
//! use rql::metadata::{Catalog, Collection, Index, IndexKind, Property, PropertyType};
//!
//! let mut orders = Collection::new("orders").with_table("Orders");
//! orders.add_property(Property::new("orderId", PropertyType::Integer).with_column("OrderID"));
//! orders.add_property(Property::new("shipCountry", PropertyType::String).with_column("ShipCountry"));
//! orders.add_index(Index::new("primaryIndex", IndexKind::Primary, ["orderId"]));
//!
//! let mut catalog = Catalog::new();
//! catalog.add_collection(orders);
//!
//! let orders = catalog.collection("ORDERS").unwrap();
//! assert_eq!(orders.table_name(), "Orders");
//! assert_eq!(orders.property("shipcountry").unwrap().column_name(), "ShipCountry");
//! ```

pub mod northwind;

use crate::error::MetadataError;

/// Every collection the compiler may be asked about
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Catalog {
    collections: Vec<Collection>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_collection(&mut self, collection: Collection) {
        self.collections.push(collection);
    }

    /// Get a collection by logical name (case-insensitive)
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn require(&self, name: &str) -> Result<&Collection, MetadataError> {
        self.collection(name)
            .ok_or_else(|| MetadataError::UnknownCollection(name.to_string()))
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.iter()
    }
}

/// A logical entity backed by one table or container
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Collection {
    /// Logical name used in URLs (e.g., "orders")
    pub name: String,
    /// Backing table/container; defaults to the logical name
    #[cfg_attr(feature = "serde", serde(default))]
    pub table: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    properties: Vec<Property>,
    #[cfg_attr(feature = "serde", serde(default))]
    indexes: Vec<Index>,
    #[cfg_attr(feature = "serde", serde(default))]
    relationships: Vec<Relationship>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            properties: Vec::new(),
            indexes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Set the backing table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Find a property by logical name or physical column (case-insensitive)
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|p| p.column_name().eq_ignore_ascii_case(name))
            })
    }

    pub fn require_property(&self, name: &str) -> Result<&Property, MetadataError> {
        self.property(name).ok_or_else(|| MetadataError::UnknownColumn {
            collection: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
    }

    pub fn require_index(&self, name: &str) -> Result<&Index, MetadataError> {
        self.index(name).ok_or_else(|| MetadataError::UnknownIndex {
            collection: self.name.clone(),
            index: name.to_string(),
        })
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter()
    }

    pub fn primary_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    pub fn partition_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Partition)
    }

    /// Resolve the properties of an index, in index order
    pub fn index_properties(&self, index: &Index) -> Result<Vec<&Property>, MetadataError> {
        if index.columns.is_empty() {
            return Err(self.misconfigured(format!("index '{}' has no columns", index.name)));
        }
        index
            .columns
            .iter()
            .map(|c| {
                self.property(c).ok_or_else(|| {
                    self.misconfigured(format!(
                        "index '{}' references unknown property '{}'",
                        index.name, c
                    ))
                })
            })
            .collect()
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    pub fn misconfigured(&self, reason: impl Into<String>) -> MetadataError {
        MetadataError::Misconfigured {
            collection: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// A single attribute of a collection
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Property {
    /// Logical attribute name (e.g., "shipCountry")
    pub name: String,
    /// Physical column name; defaults to the logical name
    #[cfg_attr(feature = "serde", serde(default))]
    pub column: Option<String>,
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub property_type: PropertyType,
    #[cfg_attr(feature = "serde", serde(default = "default_nullable"))]
    pub nullable: bool,
}

#[cfg(feature = "serde")]
fn default_nullable() -> bool {
    true
}

impl Property {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            column: None,
            property_type,
            nullable: true,
        }
    }

    /// Set the physical column name
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Declared type of a property, used to cast literals before binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PropertyType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Timestamp,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Decimal => "decimal",
            PropertyType::Boolean => "boolean",
            PropertyType::Date => "date",
            PropertyType::Timestamp => "timestamp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IndexKind {
    /// Primary key; for key-value stores the first column is the hash key
    ///  and the optional second column the sort key
    Primary,
    Unique,
    /// Document-store partition key
    Partition,
    /// Non-unique secondary index (a GSI on key-value stores)
    Secondary,
}

/// Ordered list of properties forming a uniqueness or partition constraint
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Index {
    pub name: String,
    pub kind: IndexKind,
    /// Logical property names, in key order
    pub columns: Vec<String>,
}

impl Index {
    pub fn new<I, S>(name: impl Into<String>, kind: IndexKind, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.kind, IndexKind::Primary | IndexKind::Unique)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Cardinality {
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl Cardinality {
    pub fn is_to_many(&self) -> bool {
        !matches!(self, Cardinality::ManyToOne)
    }
}

/// Physical column equality used in a join condition
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct KeyPair {
    pub local: String,
    pub foreign: String,
}

impl KeyPair {
    pub fn new(local: impl Into<String>, foreign: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            foreign: foreign.into(),
        }
    }
}

/// Intermediate table of a many-to-many relationship
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LinkTable {
    pub table: String,
    /// Link-table column to related-table column
    pub keys: Vec<KeyPair>,
}

/// Foreign-key mapping from this collection to another
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Relationship {
    /// Name used in dotted paths (e.g., "customer" in `customer.city`)
    pub name: String,
    pub cardinality: Cardinality,
    /// Logical name of the related collection
    pub related: String,
    /// This table's columns to the related table (or, for many-to-many, to
    ///  the link table)
    pub keys: Vec<KeyPair>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub through: Option<LinkTable>,
}

impl Relationship {
    pub fn new(
        name: impl Into<String>,
        cardinality: Cardinality,
        related: impl Into<String>,
        keys: Vec<KeyPair>,
    ) -> Self {
        Self {
            name: name.into(),
            cardinality,
            related: related.into(),
            keys,
            through: None,
        }
    }

    /// Route this relationship through a link table
    pub fn through(mut self, table: impl Into<String>, keys: Vec<KeyPair>) -> Self {
        self.through = Some(LinkTable {
            table: table.into(),
            keys,
        });
        self
    }
}
