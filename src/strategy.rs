//! Search strategies: the dialects a search text may be written in.

use crate::error::Error;
use crate::options::Options;
use crate::parser;
use crate::query::QueryHandler;
use crate::registry::{Domain, Domains};
use crate::schema::Schema;
use crate::statement::{SearchQuery, ValueListStatement};
use std::fmt::{Display, Formatter};

/// How a strategy applies to a search text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Usage {
    /// Run this strategy, and no other.
    Only,
    Include,
    Exclude,
}

/// What strategies get to work with.
#[derive(Copy, Clone)]
pub struct Context<'a> {
    pub schema: &'a dyn Schema,
    pub domains: &'a Domains,
    pub options: &'a Options,
    /// All registered strategies, in registration order.
    pub strategies: &'a [Box<dyn Strategy>],
}

impl<'a> Context<'a> {
    pub fn new(schema: &'a dyn Schema, domains: &'a Domains, options: &'a Options) -> Self {
        Self {
            schema,
            domains,
            options,
            strategies: &[],
        }
    }

    pub fn with_strategies(mut self, strategies: &'a [Box<dyn Strategy>]) -> Self {
        self.strategies = strategies;
        self
    }

    /// A handler with an unfiltered query over the table of `domain`.
    pub fn handler(&self, domain: &Domain) -> Result<QueryHandler<'a>, Error> {
        let table = self
            .schema
            .table(&domain.table)
            .ok_or_else(|| Error::UnknownTable(domain.table.clone()))?;
        Ok(QueryHandler::new(self.schema, self.options, table))
    }
}

pub trait Strategy {
    /// Name of the strategy, unique among the registered ones.
    fn name(&self) -> &str;

    fn usage(&self, text: &str, context: &Context) -> Usage;

    fn search(&self, text: &str, context: &Context) -> Result<Vec<SearchQuery>, Error>;

    /// If a text this strategy applies to is no plain value list.
    fn excludes_value_list(&self) -> bool {
        true
    }
}

/// `domain WHERE clause`, the full query language.
#[derive(Clone, Debug, Default)]
pub struct MapperSearch;

impl Strategy for MapperSearch {
    fn name(&self) -> &str {
        "MapperSearch"
    }

    fn usage(&self, text: &str, context: &Context) -> Usage {
        let mut words = text.split_whitespace();
        match (words.next(), words.next()) {
            (Some(domain), Some(keyword))
                if context.domains.get(domain).is_some()
                    && keyword.eq_ignore_ascii_case("where") =>
            {
                Usage::Include
            }
            _ => Usage::Exclude,
        }
    }

    fn search(&self, text: &str, context: &Context) -> Result<Vec<SearchQuery>, Error> {
        let statement = parser::parse_mapper(text)?;
        tracing::debug!("parsed: {statement}");
        statement.invoke(context)
    }
}

/// `domain operator value`, searching the default attributes of a domain.
#[derive(Clone, Debug, Default)]
pub struct DomainSearch;

impl Strategy for DomainSearch {
    fn name(&self) -> &str {
        "DomainSearch"
    }

    fn usage(&self, text: &str, context: &Context) -> Usage {
        match parser::parse_domain(text) {
            Ok(statement) if context.domains.resolve(&statement.domain).is_some() => {
                tracing::debug!("including DomainSearch");
                Usage::Include
            }
            _ => Usage::Exclude,
        }
    }

    fn search(&self, text: &str, context: &Context) -> Result<Vec<SearchQuery>, Error> {
        let statement = parser::parse_domain(text)?;
        tracing::debug!("parsed: {statement}");
        statement.invoke(context)
    }
}

/// The warning a [`ValueListSearch`] raises before running a search matching about everything.
#[derive(Debug)]
pub struct UnspecificQuery<'a> {
    pub statement: &'a ValueListStatement,
}

impl Display for UnspecificQuery<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "The search {} contains no specific query and will search against all fields in \
             all tables. It could take a long time to return results.",
            self.statement
        )
    }
}

type Confirm = Box<dyn Fn(&UnspecificQuery) -> bool>;

/// A plain list of values, matched against the default attributes of all domains.
///
/// Only used when no other strategy applies.
#[derive(Default)]
pub struct ValueListSearch {
    confirm: Option<Confirm>,
}

impl ValueListSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask `confirm` before running unspecific searches, declining yields no results.
    pub fn with_confirm<F>(mut self, confirm: F) -> Self
    where
        F: Fn(&UnspecificQuery) -> bool + 'static,
    {
        self.confirm = Some(Box::new(confirm));
        self
    }
}

impl Strategy for ValueListSearch {
    fn name(&self) -> &str {
        "ValueListSearch"
    }

    fn usage(&self, text: &str, context: &Context) -> Usage {
        let specific = context
            .strategies
            .iter()
            .filter(|strategy| strategy.name() != self.name())
            .filter(|strategy| strategy.excludes_value_list())
            .any(|strategy| {
                matches!(
                    strategy.usage(text, context),
                    Usage::Include | Usage::Only
                )
            });

        match specific {
            true => Usage::Exclude,
            false => Usage::Include,
        }
    }

    fn search(&self, text: &str, context: &Context) -> Result<Vec<SearchQuery>, Error> {
        let statement = parser::parse_value_list(text)?;
        tracing::debug!("parsed: {statement}");

        if statement.is_unspecific() {
            let warning = UnspecificQuery {
                statement: &statement,
            };
            tracing::warn!("{warning}");

            if let Some(confirm) = &self.confirm {
                if !confirm(&warning) {
                    tracing::debug!("unspecific search declined");
                    return Ok(vec![]);
                }
            }
        }

        statement.invoke(context)
    }

    fn excludes_value_list(&self) -> bool {
        false
    }
}

/// The built-in strategies, in the order they are tried.
pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(MapperSearch),
        Box::new(DomainSearch),
        Box::new(ValueListSearch::new()),
    ]
}
