//! The operator table: turning `attribute operator value` into a condition.

use crate::error::Error;
use crate::options::Options;
use crate::schema::AttributeType;
use crate::token::Literal;
use crate::value::coerce;
use sea_orm::sea_query::{Expr, Func, SelectStatement, SimpleExpr, SubQueryStatement};
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    /// Case insensitive match, with `%` and `_` as wildcards.
    Like,
    /// Case insensitive substring match.
    Contains,
    In,
}

impl Operator {
    /// Look up a word operator, ignoring case.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword.to_ascii_lowercase().as_str() {
            "is" => Self::Equal,
            "not" => Self::NotEqual,
            "like" | "ilike" => Self::Like,
            "contains" | "has" | "icontains" | "ihas" => Self::Contains,
            "in" => Self::In,
            _ => return None,
        })
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, Self::Equal)
    }

    pub fn is_inequality(&self) -> bool {
        matches!(self, Self::NotEqual)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Like => "LIKE",
            Self::Contains => "CONTAINS",
            Self::In => "IN",
        })
    }
}

/// The right hand side of a comparison.
#[derive(Clone, Debug)]
pub enum Operand {
    Literal(Literal),
    List(Vec<Literal>),
    Select(SelectStatement),
}

impl From<Literal> for Operand {
    fn from(value: Literal) -> Self {
        Self::Literal(value)
    }
}

/// A select statement used as a single value.
pub fn scalar(select: SelectStatement) -> SimpleExpr {
    SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(select)))
}

/// Build the condition `lhs operator operand`.
///
/// `kind` is the type of `lhs`, if known, and drives the coercion of literal values.
pub fn apply(
    operator: Operator,
    lhs: SimpleExpr,
    kind: Option<&AttributeType>,
    operand: Operand,
    options: &Options,
) -> Result<SimpleExpr, Error> {
    match operand {
        Operand::Select(select) => Ok(match operator {
            Operator::In => Expr::expr(lhs).in_subquery(select),
            operator => compare(operator, lhs, scalar(select))?,
        }),
        Operand::List(values) if operator == Operator::In => {
            let values = values
                .iter()
                .filter(|value| !matches!(value, Literal::Null | Literal::Empty))
                .map(|value| coerce(value, kind, options))
                .collect::<Vec<_>>();
            Ok(Expr::expr(lhs).is_in(values))
        }
        Operand::List(values) => {
            let mut result: Option<SimpleExpr> = None;
            for value in values {
                let condition = apply_literal(operator, lhs.clone(), kind, value, options)?;
                result = Some(match result {
                    Some(result) => result.or(condition),
                    None => condition,
                });
            }
            result.ok_or_else(|| Error::invalid_operand(operator, "an empty list"))
        }
        Operand::Literal(value) => apply_literal(operator, lhs, kind, value, options),
    }
}

fn apply_literal(
    operator: Operator,
    lhs: SimpleExpr,
    kind: Option<&AttributeType>,
    value: Literal,
    options: &Options,
) -> Result<SimpleExpr, Error> {
    match (&value, operator) {
        (Literal::Null, Operator::Equal) => Ok(Expr::expr(lhs).is_null()),
        (Literal::Null, Operator::NotEqual) => Ok(Expr::expr(lhs).is_not_null()),
        (Literal::Null | Literal::Empty, operator) => Err(Error::invalid_operand(operator, &value)),
        (_, Operator::Like) => Ok(like(lhs, text_of(&value))),
        (_, Operator::Contains) => Ok(like(lhs, format!("%{}%", text_of(&value)))),
        (_, Operator::In) => Ok(Expr::expr(lhs).is_in([coerce(&value, kind, options)])),
        (_, operator) => compare(operator, lhs, coerce(&value, kind, options)),
    }
}

fn compare(operator: Operator, lhs: SimpleExpr, rhs: SimpleExpr) -> Result<SimpleExpr, Error> {
    let lhs = Expr::expr(lhs);
    Ok(match operator {
        Operator::Equal => lhs.eq(rhs),
        Operator::NotEqual => lhs.ne(rhs),
        Operator::Less => lhs.lt(rhs),
        Operator::LessEqual => lhs.lte(rhs),
        Operator::Greater => lhs.gt(rhs),
        Operator::GreaterEqual => lhs.gte(rhs),
        operator => return Err(Error::invalid_operand(operator, "a sub-query")),
    })
}

fn like(lhs: SimpleExpr, pattern: String) -> SimpleExpr {
    Expr::expr(Func::lower(lhs)).like(pattern.to_lowercase())
}

fn text_of(value: &Literal) -> String {
    match value {
        Literal::Text(text) => text.clone(),
        Literal::Number(number) => number.to_string(),
        Literal::Null | Literal::Empty => String::new(),
    }
}
