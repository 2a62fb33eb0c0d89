//! Running a search text through all applicable strategies.

use crate::error::Error;
use crate::options::Options;
use crate::query::column;
use crate::registry::Registry;
use crate::schema::{AttributeType, Catalog, Schema};
use crate::session::{Record, Session};
use crate::statement::SearchQuery;
use crate::strategy::{default_strategies, Context, Strategy, Usage};
use sea_orm::sea_query::Expr;
use std::collections::{BTreeMap, HashSet};

/// Name of the flag marking records which are still in use.
const ACTIVE: &str = "active";

pub struct Search<S: Schema = Catalog> {
    registry: Registry<S>,
    options: Options,
    strategies: Vec<Box<dyn Strategy>>,
    result_cache: BTreeMap<String, Vec<Record>>,
}

impl<S: Schema> Search<S> {
    /// A search with the built-in strategies.
    pub fn new(registry: Registry<S>, options: Options) -> Self {
        Self {
            registry,
            options,
            strategies: default_strategies(),
            result_cache: Default::default(),
        }
    }

    /// Add a strategy, replacing a registered one of the same name.
    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) {
        match self
            .strategies
            .iter_mut()
            .find(|known| known.name() == strategy.name())
        {
            Some(known) => {
                tracing::debug!("replacing strategy {}", strategy.name());
                *known = strategy;
            }
            None => {
                tracing::debug!("adding strategy {}", strategy.name());
                self.strategies.push(strategy);
            }
        }
    }

    pub fn get_strategy(&self, name: &str) -> Option<&dyn Strategy> {
        self.strategies
            .iter()
            .find(|strategy| strategy.name() == name)
            .map(|strategy| strategy.as_ref())
    }

    /// The strategies to run for `text`.
    pub fn get_strategies(&self, text: &str) -> Vec<&dyn Strategy> {
        let context = self.context();
        let mut result = vec![];

        for strategy in &self.strategies {
            match strategy.usage(text, &context) {
                Usage::Only => {
                    tracing::debug!("only using {}", strategy.name());
                    return vec![strategy.as_ref()];
                }
                Usage::Include => result.push(strategy.as_ref()),
                Usage::Exclude => {}
            }
        }

        result
    }

    pub fn context(&self) -> Context<'_> {
        Context::new(
            self.registry.schema(),
            self.registry.domains(),
            &self.options,
        )
        .with_strategies(&self.strategies)
    }

    /// The queries each applicable strategy would run for `text`, keyed by strategy name.
    pub fn queries(&self, text: &str) -> Vec<(String, Result<Vec<SearchQuery>, Error>)> {
        let text = text.trim();
        let context = self.context();

        self.get_strategies(text)
            .into_iter()
            .map(|strategy| {
                let queries = strategy.search(text, &context).and_then(|queries| {
                    queries
                        .into_iter()
                        .map(|query| self.post_filter(query))
                        .collect()
                });
                (strategy.name().to_string(), queries)
            })
            .collect()
    }

    /// Search for records matching `text`.
    ///
    /// A strategy failing is logged and skipped. Only if all strategies fail, the first error
    /// is returned.
    pub fn search(&mut self, text: &str, session: &mut dyn Session) -> Result<Vec<Record>, Error> {
        tracing::debug!("searching: {text}");

        let mut cache = BTreeMap::new();
        let mut first_error = None;
        let mut results = vec![];
        let mut seen = HashSet::new();

        for (name, queries) in self.queries(text) {
            match queries.and_then(|queries| self.fetch(&queries, session)) {
                Ok(records) => {
                    tracing::debug!("{name}: {} records", records.len());
                    for record in &records {
                        if seen.insert((record.table.clone(), record.id)) {
                            results.push(record.clone());
                        }
                    }
                    cache.insert(name, records);
                }
                Err(err) => {
                    tracing::warn!("{name} failed: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }

        let succeeded = !cache.is_empty();
        self.result_cache = cache;

        match first_error {
            Some(err) if !succeeded => Err(err),
            _ => Ok(results),
        }
    }

    fn fetch(
        &self,
        queries: &[SearchQuery],
        session: &mut dyn Session,
    ) -> Result<Vec<Record>, Error> {
        let mut records = vec![];
        for query in queries {
            let table = self
                .registry
                .schema()
                .table(&query.table)
                .ok_or_else(|| Error::UnknownTable(query.table.clone()))?;
            records.extend(session.fetch(table, &query.select)?);
        }
        Ok(records)
    }

    /// Drop inactive records, if requested and the record type has an `active` flag.
    fn post_filter(&self, mut query: SearchQuery) -> Result<SearchQuery, Error> {
        if !self.options.exclude_inactive {
            return Ok(query);
        }

        let table = self
            .registry
            .schema()
            .table(&query.table)
            .ok_or_else(|| Error::UnknownTable(query.table.clone()))?;

        if matches!(
            table.find_attribute(ACTIVE).map(|attribute| &attribute.kind),
            Some(AttributeType::Boolean)
        ) {
            query
                .select
                .and_where(Expr::expr(column(&table.name, ACTIVE)).eq(true));
        }

        Ok(query)
    }

    /// The records each strategy found in the last search, keyed by strategy name.
    pub fn result_cache(&self) -> &BTreeMap<String, Vec<Record>> {
        &self.result_cache
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}
