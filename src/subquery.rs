//! Sub-queries used as the right hand side of a comparison: `(accession.count(id) WHERE ...)`.

use crate::error::Error;
use crate::identifier::{apply_functions, call, is_aggregate, Identifier, Path};
use crate::operation::{apply, Operator};
use crate::query::{column, QueryHandler, AGGREGATE_COLUMN};
use crate::schema::Relationship;
use crate::token::Token;
use sea_orm::sea_query::{Alias, Expr, Query, SelectStatement};
use std::fmt::{Display, Formatter};

/// Alias of the derived table an aggregate of an aggregate selects from.
const GROUPED: &str = "grouped";

#[derive(Clone, Debug, PartialEq)]
pub enum Refinement {
    /// Filter the rows of the sub-query, the path is relative to the sub-query's table.
    Where {
        identifier: Path,
        operator: Operator,
        value: Token,
    },
    /// Evaluate the sub-query per row of the outer query.
    Correlate,
}

impl Display for Refinement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Where {
                identifier,
                operator,
                value,
            } => write!(f, "WHERE {identifier} {operator} {value}"),
            Self::Correlate => f.write_str("CORRELATE"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Subquery {
    /// The selected value, starting with the table the sub-query runs on.
    pub identifier: Identifier,
    pub refinements: Vec<Refinement>,
}

impl Subquery {
    pub fn is_correlated(&self) -> bool {
        self.refinements
            .iter()
            .any(|refinement| matches!(refinement, Refinement::Correlate))
    }

    /// Build the sub-select, nested into the query of `outer`.
    pub fn express(&self, outer: &QueryHandler) -> Result<SelectStatement, Error> {
        tracing::debug!("expressing sub-query ({self})");

        let (functions, base) = self.identifier.unwrap_functions();
        let Identifier::Unfiltered(path) = base else {
            return Err(Error::Configuration(format!(
                "a sub-query selects a plain path, not: {base}"
            )));
        };
        let Some((table, steps)) = path.steps.split_first() else {
            return Err(Error::Configuration(format!(
                "a sub-query must start with the name of a table: {path}"
            )));
        };

        let table = outer.lookup(table)?;
        let mut inner = outer.nested(table);
        let target = Identifier::Unfiltered(Path {
            steps: steps.to_vec(),
            leaf: path.leaf.clone(),
        })
        .resolve(&mut inner)?;

        if let [(outermost, _), innermost @ (function, _)] = functions.as_slice() {
            if is_aggregate(outermost) && is_aggregate(function) {
                tracing::debug!("grouping {function} to aggregate it with {outermost}");

                let aggregate = apply_functions(std::slice::from_ref(innermost), &target)?;
                self.refine(&mut inner, outer)?;
                let grouped = inner.query.select_grouped(aggregate);

                let mut select = Query::select();
                select
                    .expr(call(outermost, column(GROUPED, AGGREGATE_COLUMN)))
                    .from_subquery(grouped, Alias::new(GROUPED));
                return Ok(select);
            }
        }

        let expr = apply_functions(&functions, &target)?;
        self.refine(&mut inner, outer)?;
        Ok(inner.query.select_expr(expr))
    }

    fn refine(&self, inner: &mut QueryHandler, outer: &QueryHandler) -> Result<(), Error> {
        for refinement in &self.refinements {
            match refinement {
                Refinement::Where {
                    identifier,
                    operator,
                    value,
                } => {
                    let target = Identifier::Unfiltered(identifier.clone()).resolve(inner)?;
                    let (lhs, attribute) = target.column()?;
                    let condition = apply(
                        *operator,
                        lhs,
                        Some(&attribute.kind),
                        value.express().into(),
                        inner.options,
                    )?;
                    inner.filter(condition);
                }
                Refinement::Correlate => {
                    let relationship = correlation(outer, inner)?;
                    let condition = Expr::col((
                        Alias::new(outer.query.alias()),
                        Alias::new(&relationship.local_column),
                    ))
                    .equals((
                        Alias::new(inner.query.alias()),
                        Alias::new(&relationship.remote_column),
                    ));
                    inner.filter(condition);
                }
            }
        }

        Ok(())
    }
}

/// The single relationship leading from the outer domain to the sub-query's table.
fn correlation<'s>(
    outer: &QueryHandler<'s>,
    inner: &QueryHandler<'s>,
) -> Result<&'s Relationship, Error> {
    let mut candidates = outer
        .table
        .relationships
        .iter()
        .filter(|relationship| relationship.target == inner.table.name);

    match (candidates.next(), candidates.next()) {
        (Some(relationship), None) => Ok(relationship),
        (None, _) => Err(Error::Configuration(format!(
            "'{}' is not directly related to '{}', unable to correlate",
            inner.table.name, outer.table.name
        ))),
        (Some(_), Some(_)) => Err(Error::Configuration(format!(
            "'{}' is related to '{}' more than once, unable to correlate",
            outer.table.name, inner.table.name
        ))),
    }
}

impl Display for Subquery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier)?;
        for refinement in &self.refinements {
            write!(f, " {refinement}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::options::Options;
    use crate::schema::{AttributeType, Catalog, Schema, Table};
    use sea_orm::sea_query::SqliteQueryBuilder;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_table(
                Table::new("species")
                    .attribute("epithet", AttributeType::Text)
                    .has_many("accessions", "accession", "species_id"),
            )
            .with_table(
                Table::new("accession")
                    .attribute("code", AttributeType::Text)
                    .attribute("received", AttributeType::Date)
                    .belongs_to("species", "species", "species_id")
                    .has_many("plants", "plant", "accession_id"),
            )
            .with_table(
                Table::new("plant")
                    .attribute("quantity", AttributeType::Integer)
                    .belongs_to("accession", "accession", "accession_id"),
            )
    }

    fn identifier(names: &[&str]) -> Identifier {
        Identifier::Unfiltered(Path::new(names.iter().map(|s| s.to_string()).collect()))
    }

    fn function(name: &str, inner: Identifier) -> Identifier {
        Identifier::Function {
            name: name.into(),
            distinct: false,
            inner: Box::new(inner),
        }
    }

    fn render(subquery: &Subquery, domain: &str) -> Result<String, Error> {
        let catalog = catalog();
        let options = Options::default();
        let table = catalog.table(domain).unwrap();
        let handler = QueryHandler::new(&catalog, &options, table);
        Ok(subquery.express(&handler)?.to_string(SqliteQueryBuilder))
    }

    #[test]
    fn test_plain() {
        let subquery = Subquery {
            identifier: identifier(&["accession", "code"]),
            refinements: vec![Refinement::Where {
                identifier: Path::new(vec!["species".into(), "epithet".into()]),
                operator: Operator::Equal,
                value: Token::String("annua".into()),
            }],
        };

        let sql = render(&subquery, "plant").unwrap();
        assert_eq!(
            sql,
            r#"SELECT "accession"."code" FROM "accession" INNER JOIN "species" ON "accession"."species_id" = "species"."id" WHERE "species"."epithet" = 'annua'"#
        );
    }

    #[test]
    fn test_correlated() {
        let subquery = Subquery {
            identifier: function("count", identifier(&["plant", "id"])),
            refinements: vec![Refinement::Correlate],
        };

        let sql = render(&subquery, "accession").unwrap();
        assert_eq!(
            sql,
            r#"SELECT count("plant"."id") FROM "plant" WHERE "accession"."id" = "plant"."accession_id""#
        );
    }

    #[test]
    fn test_correlate_needs_relationship() {
        let subquery = Subquery {
            identifier: function("count", identifier(&["plant", "id"])),
            refinements: vec![Refinement::Correlate],
        };

        assert!(matches!(
            render(&subquery, "species"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_aggregate_of_aggregate() {
        let subquery = Subquery {
            identifier: function(
                "max",
                function("count", identifier(&["accession", "plants", "id"])),
            ),
            refinements: vec![Refinement::Correlate],
        };

        let sql = render(&subquery, "species").unwrap();
        assert_eq!(
            sql,
            r#"SELECT max("grouped"."aggregate") FROM (SELECT count("plant"."id") AS "aggregate" FROM "accession" INNER JOIN "plant" ON "accession"."id" = "plant"."accession_id" WHERE "species"."id" = "accession"."species_id" GROUP BY "accession"."id") AS "grouped""#
        );
    }

    #[test]
    fn test_self_reference_is_aliased() {
        let subquery = Subquery {
            identifier: function("max", identifier(&["plant", "quantity"])),
            refinements: vec![],
        };

        let sql = render(&subquery, "plant").unwrap();
        assert_eq!(
            sql,
            r#"SELECT max("plant_sub"."quantity") FROM "plant" AS "plant_sub""#
        );
    }

    #[test]
    fn test_correlate_ambiguous_relationship() {
        let catalog = catalog().with_table(
            Table::new("specimen")
                .attribute("code", AttributeType::Text)
                .belongs_to("species", "species", "species_id")
                .belongs_to("determined_as", "species", "determined_as_id"),
        );
        let options = Options::default();
        let subquery = Subquery {
            identifier: function("count", identifier(&["species", "id"])),
            refinements: vec![Refinement::Correlate],
        };

        let specimen = catalog.table("specimen").unwrap();
        let result = subquery.express(&QueryHandler::new(&catalog, &options, specimen));
        assert!(
            matches!(&result, Err(Error::Configuration(message)) if message.contains("more than once")),
            "{result:?}"
        );

        // without correlation, the relationships do not matter
        let subquery = Subquery {
            identifier: function("count", identifier(&["species", "id"])),
            refinements: vec![],
        };
        let sql = subquery
            .express(&QueryHandler::new(&catalog, &options, specimen))
            .unwrap()
            .to_string(SqliteQueryBuilder);
        assert_eq!(sql, r#"SELECT count("species"."id") FROM "species""#);
    }
}
