//! Running queries against a database.

#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::error::Error;
use crate::schema::Table;
use sea_orm::sea_query::SelectStatement;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Runs the select statements a search produces.
pub trait Session {
    /// Fetch the rows `select` returns, as records of `table`.
    fn fetch(&mut self, table: &Table, select: &SelectStatement) -> Result<Vec<Record>, Error>;
}

/// A single column value of a fetched row.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// A fetched row.
///
/// Two records are the same if they are the same row of the same table, no matter which
/// fields were fetched.
#[derive(Clone, Debug)]
pub struct Record {
    pub table: String,
    pub id: i64,
    pub fields: BTreeMap<String, Field>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.field(name)? {
            Field::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.field(name)? {
            Field::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table && self.id == other.id
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        self.id.hash(state);
    }
}
