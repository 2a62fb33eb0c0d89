//! The boolean query tree and its evaluation against a query under construction.

use crate::error::Error;
use crate::identifier::{apply_functions, result_kind, Identifier};
use crate::operation::{apply, Operand, Operator};
use crate::query::{column, QueryHandler, Target};
use crate::schema::AttributeType;
use crate::subquery::Subquery;
use crate::token::{Literal, Token, ValueList};
use crate::value::{coerce, day_window, parse_datetime};
use sea_orm::sea_query::{Alias, Expr, Query, SimpleExpr, Value};
use std::fmt::{Display, Formatter};

/// The right hand side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    Token(Token),
    Subquery(Box<Subquery>),
}

impl Argument {
    fn operand(&self, handler: &QueryHandler) -> Result<Operand, Error> {
        Ok(match self {
            Self::Token(token) => Operand::Literal(token.express()),
            Self::Subquery(subquery) => Operand::Select(subquery.express(handler)?),
        })
    }
}

/// The right hand side of `IN`.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgumentList {
    Tokens(ValueList),
    Subquery(Box<Subquery>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    Binary {
        identifier: Identifier,
        operator: Operator,
        argument: Argument,
    },
    Between {
        identifier: Identifier,
        low: Token,
        high: Token,
    },
    InSet {
        identifier: Identifier,
        negated: bool,
        arguments: ArgumentList,
    },
    OnDate {
        identifier: Identifier,
        value: Token,
    },
    /// A comparison on an identifier wrapped into functions.
    Function {
        identifier: Identifier,
        operator: Operator,
        argument: Argument,
    },
    Parenthesized(Box<Clause>),
    And(Vec<Clause>),
    Or(Vec<Clause>),
    Not(Box<Clause>),
}

impl Clause {
    /// Add the conditions of this clause to the query of `handler`.
    pub fn evaluate(&self, handler: &mut QueryHandler) -> Result<(), Error> {
        tracing::debug!("evaluating {self}");

        match self {
            Self::Binary {
                identifier,
                operator,
                argument,
            } => {
                let target = identifier.resolve(handler)?;
                if let Argument::Token(token) = argument {
                    if token.is_empty_set() {
                        return empty_relation(handler, &target, *operator);
                    }
                }

                let (lhs, attribute) = target.column()?;
                let operand = argument.operand(handler)?;
                let condition = apply(
                    *operator,
                    lhs,
                    Some(&attribute.kind),
                    operand,
                    handler.options,
                )?;
                handler.filter(condition);
            }

            Self::Between {
                identifier,
                low,
                high,
            } => {
                let target = identifier.resolve(handler)?;
                let (lhs, attribute) = target.column()?;
                let low = coerce(&low.express(), Some(&attribute.kind), handler.options);
                let high = coerce(&high.express(), Some(&attribute.kind), handler.options);
                handler.filter(Expr::expr(lhs.clone()).gte(low));
                handler.filter(Expr::expr(lhs).lte(high));
            }

            Self::InSet {
                identifier,
                negated,
                arguments,
            } => {
                let target = identifier.resolve(handler)?;
                let (lhs, attribute) = target.column()?;
                let operand = match arguments {
                    ArgumentList::Tokens(values) => Operand::List(values.express()),
                    ArgumentList::Subquery(subquery) => {
                        Operand::Select(subquery.express(handler)?)
                    }
                };
                let condition = apply(
                    Operator::In,
                    lhs,
                    Some(&attribute.kind),
                    operand,
                    handler.options,
                )?;
                handler.filter(match negated {
                    true => condition.not(),
                    false => condition,
                });
            }

            Self::OnDate { identifier, value } => {
                let target = identifier.resolve(handler)?;
                let (lhs, attribute) = target.column()?;
                let date = match value.express() {
                    Literal::Text(_) | Literal::Number(_) => {
                        parse_datetime(value.raw_text(), handler.options.date_order)
                    }
                    Literal::Null | Literal::Empty => None,
                }
                .ok_or_else(|| Error::InvalidDate(value.raw_text().to_string()))?
                .date();

                if attribute.kind.has_time() {
                    let (start, end) = day_window(&attribute.kind, date, handler.options)?;
                    handler.filter(Expr::expr(lhs.clone()).gte(start));
                    handler.filter(Expr::expr(lhs).lt(end));
                } else {
                    handler.filter(Expr::expr(lhs).eq(SimpleExpr::Value(Value::from(date))));
                }
            }

            Self::Function {
                identifier,
                operator,
                argument,
            } => {
                let (functions, inner) = identifier.unwrap_functions();

                if identifier.is_aggregate() {
                    // aggregates only work per group, select the matching identities
                    let mut grouped = handler.fork();
                    let target = inner.resolve(&mut grouped)?;
                    let expr = apply_functions(&functions, &target)?;
                    let kind = function_kind(&functions, &target);
                    let operand = argument.operand(&grouped)?;
                    let having = apply(*operator, expr, kind.as_ref(), operand, handler.options)?;

                    let identity = handler.query.identity();
                    handler.filter(
                        Expr::expr(identity).in_subquery(grouped.query.select_having(having)),
                    );
                } else {
                    let target = inner.resolve(handler)?;
                    let expr = apply_functions(&functions, &target)?;
                    let kind = function_kind(&functions, &target);
                    let operand = argument.operand(handler)?;
                    let condition =
                        apply(*operator, expr, kind.as_ref(), operand, handler.options)?;
                    handler.filter(condition);
                }
            }

            Self::Parenthesized(clause) => {
                let mut inner = handler.fork();
                clause.evaluate(&mut inner)?;
                let identity = handler.query.identity();
                handler.filter(Expr::expr(identity).in_subquery(inner.query.select_identity()));
            }

            Self::And(clauses) => {
                for clause in clauses {
                    clause.evaluate(handler)?;
                }
            }

            Self::Or(clauses) => {
                let mut condition: Option<SimpleExpr> = None;
                for clause in clauses {
                    let mut branch = handler.fork();
                    clause.evaluate(&mut branch)?;
                    let member = Expr::expr(handler.query.identity())
                        .in_subquery(branch.query.select_identity());
                    condition = Some(match condition {
                        Some(condition) => condition.or(member),
                        None => member,
                    });
                }
                if let Some(condition) = condition {
                    handler.filter(condition);
                }
            }

            Self::Not(clause) => {
                let mut inner = handler.fork();
                clause.evaluate(&mut inner)?;
                let identity = handler.query.identity();
                handler
                    .filter(Expr::expr(identity).not_in_subquery(inner.query.select_identity()));
            }
        }

        Ok(())
    }
}

/// `relationship = Empty`, or `relationship != Empty`.
fn empty_relation(
    handler: &mut QueryHandler,
    target: &Target,
    operator: Operator,
) -> Result<(), Error> {
    let Target::Relation {
        alias,
        relationship,
    } = target
    else {
        return Err(Error::invalid_operand(operator, Literal::Empty));
    };

    let table = handler.lookup(&relationship.target)?;
    let inner = handler
        .query
        .fresh_alias(&format!("{alias}_{}", relationship.name));

    let mut members = Query::select();
    members
        .expr(Expr::val(1))
        .from_as(Alias::new(&table.name), Alias::new(&inner))
        .and_where(
            Expr::expr(column(&inner, &relationship.remote_column))
                .eq(column(alias, &relationship.local_column)),
        );
    let exists = Expr::exists(members);

    match operator {
        Operator::Equal => handler.filter(exists.not()),
        Operator::NotEqual => handler.filter(exists),
        operator => return Err(Error::invalid_operand(operator, Literal::Empty)),
    }

    Ok(())
}

/// The type of the outermost function's result.
fn function_kind(functions: &[(&str, bool)], target: &Target) -> Option<AttributeType> {
    let (function, _) = functions.first()?;
    match target {
        Target::Column { attribute, .. } => result_kind(function, &attribute.kind),
        Target::Relation { .. } => None,
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let join = |f: &mut Formatter<'_>, clauses: &[Clause], op: &str| {
            for (n, clause) in clauses.iter().enumerate() {
                if n > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{clause}")?;
            }
            Ok(())
        };

        match self {
            Self::Binary {
                identifier,
                operator,
                argument,
            }
            | Self::Function {
                identifier,
                operator,
                argument,
            } => write!(f, "{identifier} {operator} {argument}"),
            Self::Between {
                identifier,
                low,
                high,
            } => write!(f, "{identifier} BETWEEN {low} AND {high}"),
            Self::InSet {
                identifier,
                negated,
                arguments,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{identifier} {not}IN {arguments}")
            }
            Self::OnDate { identifier, value } => write!(f, "{identifier} ON {value}"),
            Self::Parenthesized(clause) => write!(f, "({clause})"),
            Self::And(clauses) => join(f, clauses, "AND"),
            Self::Or(clauses) => join(f, clauses, "OR"),
            Self::Not(clause) => write!(f, "NOT {clause}"),
        }
    }
}

impl Display for Argument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(token) => write!(f, "{token}"),
            Self::Subquery(subquery) => write!(f, "({subquery})"),
        }
    }
}

impl Display for ArgumentList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tokens(values) => write!(f, "{values}"),
            Self::Subquery(subquery) => write!(f, "({subquery})"),
        }
    }
}
