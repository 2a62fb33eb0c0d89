//! A search language for hierarchical collection records.
//!
//! A search text is one of three statements:
//!
//! * `domain WHERE clause`, e.g. `plant where accession.species.genus.epithet = Poa`
//! * `domain operator value`, e.g. `gen = Poa`, matching the default attributes of a domain
//! * a plain list of values, matching the default attributes of all domains
//!
//! Statements are compiled into `sea_query` select statements, which a [`session::Session`]
//! runs against a database.

pub mod clause;
pub mod error;
pub mod identifier;
pub mod operation;
pub mod options;
pub mod parser;
pub mod query;
pub mod registry;
pub mod schema;
pub mod search;
pub mod session;
pub mod statement;
pub mod strategy;
pub mod subquery;
pub mod token;
pub mod value;

pub mod prelude {
    pub use crate::error::Error;
    pub use crate::options::{DateOrder, Options};
    pub use crate::registry::{Domain, Registry};
    pub use crate::schema::{AttributeType, Catalog, Entity, Schema, Table};
    pub use crate::search::Search;
    pub use crate::session::{Field, Record, Session};
    pub use crate::statement::{SearchQuery, Statement};
    pub use crate::strategy::{Context, Strategy, UnspecificQuery, Usage, ValueListSearch};
    pub use taxa_search_macros::Domain;

    #[cfg(feature = "sqlite")]
    pub use crate::session::sqlite::SqliteSession;
}

pub use taxa_search_macros::Domain;

pub use ::chumsky;
