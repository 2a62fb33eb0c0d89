//! The query under construction.

use crate::error::Error;
use crate::options::Options;
use crate::schema::{Attribute, Relationship, Schema, Table};
use sea_orm::sea_query::{
    Alias, Asterisk, Expr, JoinType, Query, SelectStatement, SimpleExpr,
};
use std::collections::{HashMap, HashSet};

/// Name of the column holding the inner aggregate of a grouped derived table.
pub const AGGREGATE_COLUMN: &str = "aggregate";

pub fn column(alias: &str, name: &str) -> SimpleExpr {
    Expr::col((Alias::new(alias), Alias::new(name))).into()
}

#[derive(Clone, Debug)]
pub struct JoinClause {
    pub table: String,
    pub alias: String,
    pub on: SimpleExpr,
}

/// Keeps track of what a single query has joined already.
///
/// Walking the same relationship from the same place twice reuses the join. Reaching a table
/// which is already part of the query in any other way gets a new alias.
#[derive(Clone, Debug, Default)]
struct JoinTracker {
    joined: HashSet<String>,
    aliases: HashSet<String>,
    paths: HashMap<(String, String), String>,
    counter: usize,
}

impl JoinTracker {
    fn fresh_alias(&mut self, base: &str) -> String {
        loop {
            self.counter += 1;
            let alias = format!("{base}_{}", self.counter);
            if !self.aliases.contains(&alias) {
                return alias;
            }
        }
    }
}

/// A select over one root table, with its joins and filters.
#[derive(Clone, Debug)]
pub struct QueryState {
    table: String,
    alias: String,
    primary_key: String,
    joins: Vec<JoinClause>,
    conditions: Vec<SimpleExpr>,
    tracker: JoinTracker,
}

impl QueryState {
    pub fn new(table: &Table) -> Self {
        Self::aliased(table, &table.name)
    }

    pub fn aliased(table: &Table, alias: &str) -> Self {
        let mut tracker = JoinTracker::default();
        tracker.joined.insert(table.name.clone());
        tracker.aliases.insert(alias.to_string());

        Self {
            table: table.name.clone(),
            alias: alias.to_string(),
            primary_key: table.primary_key.clone(),
            joins: vec![],
            conditions: vec![],
            tracker,
        }
    }

    /// Treat a name as taken, so that joins to it get aliased.
    pub fn reserve(&mut self, name: &str) {
        self.tracker.joined.insert(name.to_string());
        self.tracker.aliases.insert(name.to_string());
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// The primary key of the root table.
    pub fn identity(&self) -> SimpleExpr {
        column(&self.alias, &self.primary_key)
    }

    /// Allocate an alias which isn't used by this query yet.
    pub fn fresh_alias(&mut self, base: &str) -> String {
        let alias = self.tracker.fresh_alias(base);
        self.tracker.aliases.insert(alias.clone());
        alias
    }

    /// Join `relationship`, starting at the table aliased as `from`, and return the alias of
    /// the joined table.
    ///
    /// With `force_alias`, the join is always a new one, under a new alias.
    pub fn join(&mut self, from: &str, relationship: &Relationship, force_alias: bool) -> String {
        let path = (from.to_string(), relationship.name.clone());

        if !force_alias {
            if let Some(alias) = self.tracker.paths.get(&path) {
                tracing::debug!("reusing join {from}.{} as {alias}", relationship.name);
                return alias.clone();
            }
        }

        let target = &relationship.target;
        let alias = if force_alias || self.tracker.joined.contains(target) {
            self.fresh_alias(target)
        } else {
            target.clone()
        };

        tracing::debug!("joining {from}.{} as {alias}", relationship.name);

        self.tracker.joined.insert(target.clone());
        self.tracker.aliases.insert(alias.clone());
        if !force_alias {
            self.tracker.paths.insert(path, alias.clone());
        }

        self.joins.push(JoinClause {
            table: target.clone(),
            alias: alias.clone(),
            on: Expr::col((Alias::new(from), Alias::new(&relationship.local_column)))
                .equals((Alias::new(&alias), Alias::new(&relationship.remote_column))),
        });

        alias
    }

    pub fn filter(&mut self, condition: SimpleExpr) {
        self.conditions.push(condition);
    }

    fn base(&self) -> SelectStatement {
        let mut select = Query::select();

        if self.alias == self.table {
            select.from(Alias::new(&self.table));
        } else {
            select.from_as(Alias::new(&self.table), Alias::new(&self.alias));
        }

        for join in &self.joins {
            if join.alias == join.table {
                select.join(JoinType::InnerJoin, Alias::new(&join.table), join.on.clone());
            } else {
                select.join_as(
                    JoinType::InnerJoin,
                    Alias::new(&join.table),
                    Alias::new(&join.alias),
                    join.on.clone(),
                );
            }
        }

        for condition in &self.conditions {
            select.and_where(condition.clone());
        }

        select
    }

    /// Select the distinct rows of the root table.
    pub fn select_rows(&self) -> SelectStatement {
        let mut select = self.base();
        select
            .distinct()
            .column((Alias::new(&self.alias), Asterisk));
        select
    }

    /// Select the primary key of the root table.
    pub fn select_identity(&self) -> SelectStatement {
        let mut select = self.base();
        select.expr(self.identity());
        select
    }

    pub fn select_expr(&self, expr: SimpleExpr) -> SelectStatement {
        let mut select = self.base();
        select.expr(expr);
        select
    }

    /// Select the primary keys of the root table for which `having` holds, per root row.
    pub fn select_having(&self, having: SimpleExpr) -> SelectStatement {
        let mut select = self.select_identity();
        select
            .group_by_col((Alias::new(&self.alias), Alias::new(&self.primary_key)))
            .and_having(having);
        select
    }

    /// Select `expr` per root row, as [`AGGREGATE_COLUMN`].
    pub fn select_grouped(&self, expr: SimpleExpr) -> SelectStatement {
        let mut select = self.base();
        select
            .expr_as(expr, Alias::new(AGGREGATE_COLUMN))
            .group_by_col((Alias::new(&self.alias), Alias::new(&self.primary_key)));
        select
    }
}

/// What an identifier resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Column { alias: String, attribute: Attribute },
    Relation { alias: String, relationship: Relationship },
}

impl Target {
    pub fn column(&self) -> Result<(SimpleExpr, &Attribute), Error> {
        match self {
            Self::Column { alias, attribute } => Ok((column(alias, &attribute.name), attribute)),
            Self::Relation { relationship, .. } => {
                Err(Error::NotAnAttribute(relationship.name.clone()))
            }
        }
    }
}

/// The context a clause is evaluated in: the domain and its query under construction.
pub struct QueryHandler<'s> {
    pub schema: &'s dyn Schema,
    pub options: &'s Options,
    pub table: &'s Table,
    pub query: QueryState,
}

impl<'s> QueryHandler<'s> {
    pub fn new(schema: &'s dyn Schema, options: &'s Options, table: &'s Table) -> Self {
        Self {
            schema,
            options,
            table,
            query: QueryState::new(table),
        }
    }

    /// A handler over the same domain, with a new and unfiltered query.
    pub fn fork(&self) -> Self {
        Self::new(self.schema, self.options, self.table)
    }

    /// A handler for a sub-select over `table`, nested into this handler's query.
    ///
    /// The names of the outer query stay reserved, so they can be referenced from inside.
    pub fn nested(&self, table: &'s Table) -> Self {
        let alias = if table.name == self.query.alias() {
            format!("{}_sub", table.name)
        } else {
            table.name.clone()
        };

        let mut query = QueryState::aliased(table, &alias);
        query.reserve(self.query.alias());
        query.reserve(self.query.table());

        Self {
            schema: self.schema,
            options: self.options,
            table,
            query,
        }
    }

    pub fn lookup(&self, name: &str) -> Result<&'s Table, Error> {
        self.schema
            .table(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn filter(&mut self, condition: SimpleExpr) {
        self.query.filter(condition);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::AttributeType;
    use sea_orm::sea_query::SqliteQueryBuilder;

    fn genus() -> Table {
        Table::new("genus")
            .attribute("epithet", AttributeType::Text)
            .belongs_to("family", "family", "family_id")
    }

    #[test]
    fn test_join_is_reused() {
        let genus = genus();
        let relationship = genus.find_relationship("family").unwrap();
        let mut query = QueryState::new(&genus);

        assert_eq!(query.join("genus", relationship, false), "family");
        assert_eq!(query.join("genus", relationship, false), "family");
        assert_eq!(query.joins().len(), 1);
    }

    #[test]
    fn test_forced_alias() {
        let genus = genus();
        let relationship = genus.find_relationship("family").unwrap();
        let mut query = QueryState::new(&genus);

        assert_eq!(query.join("genus", relationship, false), "family");
        assert_eq!(query.join("genus", relationship, true), "family_1");
        assert_eq!(query.joins().len(), 2);
    }

    #[test]
    fn test_self_join_is_aliased() {
        let taxon = Table::new("taxon").belongs_to("parent", "taxon", "parent_id");
        let relationship = taxon.find_relationship("parent").unwrap();
        let mut query = QueryState::new(&taxon);

        let parent = query.join("taxon", relationship, false);
        assert_eq!(parent, "taxon_1");
        assert_eq!(query.join(&parent, relationship, false), "taxon_2");

        let sql = query.select_rows().to_string(SqliteQueryBuilder);
        assert_eq!(
            sql,
            r#"SELECT DISTINCT "taxon".* FROM "taxon" INNER JOIN "taxon" AS "taxon_1" ON "taxon"."parent_id" = "taxon_1"."id" INNER JOIN "taxon" AS "taxon_2" ON "taxon_1"."parent_id" = "taxon_2"."id""#
        );
    }

    #[test]
    fn test_select_having() {
        let genus = genus();
        let query = QueryState::new(&genus);
        let sql = query
            .select_having(Expr::val(1).gt(0))
            .to_string(SqliteQueryBuilder);

        assert!(sql.contains(r#"GROUP BY "genus"."id" HAVING 1 > 0"#), "{sql}");
    }
}
