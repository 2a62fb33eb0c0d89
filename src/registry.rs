//! Domains: the record types a search can name, and how to search them by default.

use crate::error::Error;
use crate::schema::{Catalog, Entity, Schema};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    /// The primary name.
    pub name: String,
    /// Shorthands, usable by domain searches.
    pub aliases: Vec<String>,
    pub table: String,
    pub default_attributes: Vec<String>,
}

/// All registered domains, in registration order.
#[derive(Clone, Debug, Default)]
pub struct Domains {
    domains: Vec<Domain>,
    primary: HashMap<String, usize>,
    aliases: HashMap<String, usize>,
}

impl Domains {
    pub fn insert(&mut self, domain: Domain) -> Result<(), Error> {
        if domain.default_attributes.is_empty() {
            return Err(Error::Configuration(format!(
                "domain '{}' needs at least one default attribute",
                domain.name
            )));
        }
        if self.primary.contains_key(&domain.name) {
            return Err(Error::Configuration(format!(
                "domain '{}' is already registered",
                domain.name
            )));
        }
        for name in std::iter::once(&domain.name).chain(&domain.aliases) {
            if self.aliases.contains_key(name) {
                return Err(Error::Configuration(format!(
                    "shorthand '{name}' is already registered"
                )));
            }
        }
        for alias in &domain.aliases {
            if self.primary.contains_key(alias) {
                return Err(Error::Configuration(format!(
                    "shorthand '{alias}' is already a domain name"
                )));
            }
        }

        tracing::debug!(
            "registering domain {} {:?} on {}: {:?}",
            domain.name,
            domain.aliases,
            domain.table,
            domain.default_attributes
        );

        let index = self.domains.len();
        self.primary.insert(domain.name.clone(), index);
        for alias in &domain.aliases {
            self.aliases.insert(alias.clone(), index);
        }
        self.domains.push(domain);

        Ok(())
    }

    /// Look up a domain by its primary name.
    pub fn get(&self, name: &str) -> Option<&Domain> {
        self.primary.get(name).map(|index| &self.domains[*index])
    }

    /// Look up a domain by its primary name or one of its shorthands.
    pub fn resolve(&self, name: &str) -> Option<&Domain> {
        self.get(name)
            .or_else(|| self.aliases.get(name).map(|index| &self.domains[*index]))
    }

    /// All names, primary names and shorthands.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().flat_map(|domain| {
            std::iter::once(domain.name.as_str()).chain(domain.aliases.iter().map(String::as_str))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }

    /// The first registration of each table.
    pub fn canonical(&self) -> Vec<&Domain> {
        let mut result: Vec<&Domain> = vec![];
        for domain in &self.domains {
            if !result.iter().any(|known| known.table == domain.table) {
                result.push(domain);
            }
        }
        result
    }

    /// The last registration of each table, ordered by the first one.
    pub fn properties(&self) -> Vec<&Domain> {
        let mut result: Vec<&Domain> = vec![];
        for domain in &self.domains {
            match result.iter_mut().find(|known| known.table == domain.table) {
                Some(known) => *known = domain,
                None => result.push(domain),
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// The schema and the domains registered on it.
#[derive(Clone, Debug, Default)]
pub struct Registry<S: Schema = Catalog> {
    schema: S,
    domains: Domains,
}

impl<S: Schema> Registry<S> {
    pub fn new(schema: S) -> Self {
        Self {
            schema,
            domains: Domains::default(),
        }
    }

    /// Register a domain. The first name is the primary one, the rest are shorthands.
    pub fn register_domain(
        &mut self,
        names: &[&str],
        table: &str,
        default_attributes: &[&str],
    ) -> Result<(), Error> {
        let Some((name, aliases)) = names.split_first() else {
            return Err(Error::Configuration(format!(
                "a domain on '{table}' needs a name"
            )));
        };

        let definition = self
            .schema
            .table(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?;
        for attribute in default_attributes {
            if definition.resolve_attribute(attribute).is_none() {
                return Err(Error::unknown_identifier(table, attribute));
            }
        }

        self.domains.insert(Domain {
            name: name.to_string(),
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
            table: table.to_string(),
            default_attributes: default_attributes.iter().map(|a| a.to_string()).collect(),
        })
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn domains(&self) -> &Domains {
        &self.domains
    }
}

impl Registry<Catalog> {
    /// Add the table of an entity to the catalog, and register it as a domain.
    ///
    /// A rejected domain leaves the catalog as it was.
    pub fn register<E: Entity>(&mut self) -> Result<(), Error> {
        let table = E::table();
        let name = table.name.clone();
        let previous = self.schema.add_table(table);

        let result = self.register_domain(E::names(), &name, E::default_attributes());
        if result.is_err() {
            match previous {
                Some(previous) => self.schema.add_table(previous),
                None => self.schema.remove_table(&name),
            };
        }
        result
    }
}
