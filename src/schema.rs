//! The record schema, as far as searching needs to know about it.
//!
//! The search core never talks to an ORM directly. It only needs to look up tables, their
//! attributes, and the relationships between them. A [`Schema`] provides exactly that.

use std::collections::BTreeMap;

/// Value type of an attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeType {
    Text,
    Integer,
    Float,
    Boolean,
    /// A calendar date, without time of day.
    Date,
    /// Date and time of day, without a time zone.
    DateTime,
    /// Date and time of day, stored with a time zone offset.
    Timestamp,
    /// A string restricted to a set of choices.
    Enumerated(Vec<String>),
}

impl AttributeType {
    /// If values of this type carry a time of day.
    pub fn has_time(&self) -> bool {
        matches!(self, Self::DateTime | Self::Timestamp)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeType,
}

/// A foreign key relationship between two tables.
///
/// Joining follows `local.local_column = target.remote_column`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub target: String,
    pub local_column: String,
    pub remote_column: String,
}

/// Shorthand for "relationship, then attribute of the related table".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proxy {
    pub name: String,
    pub relationship: String,
    pub attribute: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub primary_key: String,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    pub proxies: Vec<Proxy>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: "id".to_string(),
            attributes: vec![],
            relationships: vec![],
            proxies: vec![],
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, kind: AttributeType) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            kind,
        });
        self
    }

    /// Many-to-one: this table holds the foreign key column.
    pub fn belongs_to(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        local_column: impl Into<String>,
    ) -> Self {
        self.relationships.push(Relationship {
            name: name.into(),
            target: target.into(),
            local_column: local_column.into(),
            remote_column: "id".to_string(),
        });
        self
    }

    /// One-to-many: the target table holds the foreign key column.
    pub fn has_many(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        let local_column = self.primary_key.clone();
        self.relationships.push(Relationship {
            name: name.into(),
            target: target.into(),
            local_column,
            remote_column: remote_column.into(),
        });
        self
    }

    pub fn proxy(
        mut self,
        name: impl Into<String>,
        relationship: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.proxies.push(Proxy {
            name: name.into(),
            relationship: relationship.into(),
            attribute: attribute.into(),
        });
        self
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    pub fn find_relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|relationship| relationship.name == name)
    }

    pub fn find_proxy(&self, name: &str) -> Option<&Proxy> {
        self.proxies.iter().find(|proxy| proxy.name == name)
    }

    /// The primary key is always searchable, even when not declared as attribute.
    pub(crate) fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        match self.find_attribute(name) {
            Some(attribute) => Some(attribute.clone()),
            None if name == self.primary_key => Some(Attribute {
                name: name.to_string(),
                kind: AttributeType::Integer,
            }),
            None => None,
        }
    }
}

/// Lookup of tables by name.
pub trait Schema {
    fn table(&self, name: &str) -> Option<&Table>;
}

/// In-memory schema.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.add_table(table);
        self
    }

    /// Add a table, replacing and returning one with the same name.
    pub fn add_table(&mut self, table: Table) -> Option<Table> {
        self.tables.insert(table.name.clone(), table)
    }

    pub fn remove_table(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }
}

impl Schema for Catalog {
    fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}

/// A record type which can describe itself to the search.
///
/// Usually implemented through `#[derive(Domain)]`.
pub trait Entity {
    fn table() -> Table;

    /// The primary domain name, followed by its shorthands.
    fn names() -> &'static [&'static str];

    fn default_attributes() -> &'static [&'static str];
}
