//! The three kinds of statement a search text can be, and the queries they produce.

use crate::clause::Clause;
use crate::error::Error;
use crate::operation::{apply, Operand, Operator};
use crate::query::{column, QueryHandler};
use crate::registry::Domain;
use crate::schema::AttributeType;
use crate::strategy::Context;
use crate::token::{Literal, Token, ValueList};
use sea_orm::sea_query::{Expr, SelectStatement, SimpleExpr};
use std::fmt::{Display, Formatter};

/// A query ready to run, selecting rows of `table`.
#[derive(Clone, Debug)]
pub struct SearchQuery {
    pub table: String,
    pub select: SelectStatement,
}

impl SearchQuery {
    fn from_handler(handler: &QueryHandler) -> Self {
        Self {
            table: handler.table.name.clone(),
            select: handler.query.select_rows(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Mapper(MapperStatement),
    Domain(DomainStatement),
    ValueList(ValueListStatement),
}

impl Statement {
    pub fn invoke(&self, context: &Context) -> Result<Vec<SearchQuery>, Error> {
        match self {
            Self::Mapper(statement) => statement.invoke(context),
            Self::Domain(statement) => statement.invoke(context),
            Self::ValueList(statement) => statement.invoke(context),
        }
    }
}

/// `domain WHERE clause`
#[derive(Clone, Debug, PartialEq)]
pub struct MapperStatement {
    pub domain: String,
    pub clause: Clause,
}

impl MapperStatement {
    pub fn invoke(&self, context: &Context) -> Result<Vec<SearchQuery>, Error> {
        tracing::debug!("invoking mapper statement: {self}");

        let domain = context
            .domains
            .get(&self.domain)
            .ok_or_else(|| Error::UnknownDomain(self.domain.clone()))?;

        let mut handler = context.handler(domain)?;
        self.clause.evaluate(&mut handler)?;

        Ok(vec![SearchQuery::from_handler(&handler)])
    }
}

/// The value side of a domain statement.
#[derive(Clone, Debug, PartialEq)]
pub enum DomainValue {
    /// `*`, all or nothing.
    Star,
    Token(Token),
    List(ValueList),
}

/// `domain operator value`, matching the domain's default attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct DomainStatement {
    /// The domain, or one of its shorthands.
    pub domain: String,
    pub operator: Operator,
    pub value: DomainValue,
}

impl DomainStatement {
    pub fn invoke(&self, context: &Context) -> Result<Vec<SearchQuery>, Error> {
        tracing::debug!("invoking domain statement: {self}");

        let domain = context
            .domains
            .resolve(&self.domain)
            .ok_or_else(|| Error::UnknownDomain(self.domain.clone()))?;
        let mut handler = context.handler(domain)?;

        let operand = match &self.value {
            DomainValue::Star => {
                if self.operator.is_inequality() {
                    handler.filter(Expr::val(1).eq(0));
                }
                return Ok(vec![SearchQuery::from_handler(&handler)]);
            }
            DomainValue::Token(token) => Operand::Literal(token.express_raw()),
            DomainValue::List(values) => Operand::List(values.express_raw()),
        };

        let condition = any_of(&handler, domain, |lhs, kind| {
            apply(self.operator, lhs, kind, operand.clone(), handler.options)
        })?;
        handler.filter(condition);

        Ok(vec![SearchQuery::from_handler(&handler)])
    }
}

/// A plain list of values, searched in the default attributes of every domain.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueListStatement {
    pub values: ValueList,
}

impl ValueListStatement {
    /// Values shown this short, or this many, will match about everything, slowly.
    const SHORT_VALUE: usize = 4;
    const MANY_VALUES: usize = 3;

    /// More than three values, or a value shorter than four characters as shown, quotes
    /// included. A single letter string (`'a'`) or a single digit number (`1.0`) is short.
    pub fn is_unspecific(&self) -> bool {
        self.values.len() > Self::MANY_VALUES
            || self
                .values
                .iter()
                .any(|value| shown_len(value) < Self::SHORT_VALUE)
    }

    pub fn invoke(&self, context: &Context) -> Result<Vec<SearchQuery>, Error> {
        tracing::debug!("invoking value list statement: {self}");

        let mut queries = vec![];
        for domain in context.domains.properties() {
            let mut handler = context.handler(domain)?;
            let condition = any_of(&handler, domain, |lhs, kind| {
                let mut result: Option<SimpleExpr> = None;
                for value in self.values.iter() {
                    let literal = match value.express_raw() {
                        Literal::Null | Literal::Empty => Literal::Text(value.raw_text().into()),
                        literal => literal,
                    };
                    let condition = apply(
                        Operator::Contains,
                        lhs.clone(),
                        kind,
                        literal.into(),
                        handler.options,
                    )?;
                    result = Some(match result {
                        Some(result) => result.or(condition),
                        None => condition,
                    });
                }
                result.ok_or_else(|| Error::invalid_operand(Operator::Contains, "no values"))
            })?;
            handler.filter(condition);
            queries.push(SearchQuery::from_handler(&handler));
        }

        Ok(queries)
    }
}

/// OR together `condition` for each default attribute of the domain.
fn any_of<F>(
    handler: &QueryHandler,
    domain: &Domain,
    mut condition: F,
) -> Result<SimpleExpr, Error>
where
    F: FnMut(SimpleExpr, Option<&AttributeType>) -> Result<SimpleExpr, Error>,
{
    let mut result: Option<SimpleExpr> = None;

    for name in &domain.default_attributes {
        let attribute = handler
            .table
            .resolve_attribute(name)
            .ok_or_else(|| Error::unknown_identifier(&handler.table.name, name))?;
        let next = condition(
            column(handler.query.alias(), &attribute.name),
            Some(&attribute.kind),
        )?;
        result = Some(match result {
            Some(result) => result.or(next),
            None => next,
        });
    }

    result.ok_or_else(|| {
        Error::Configuration(format!("domain '{}' has no default attributes", domain.name))
    })
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mapper(statement) => write!(f, "{statement}"),
            Self::Domain(statement) => write!(f, "{statement}"),
            Self::ValueList(statement) => write!(f, "{statement}"),
        }
    }
}

impl Display for MapperStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SELECT * FROM {} WHERE {}", self.domain, self.clause)
    }
}

impl Display for DomainStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ", self.domain, self.operator)?;
        match &self.value {
            DomainValue::Star => f.write_str("*"),
            DomainValue::Token(token) => write!(f, "{token}"),
            DomainValue::List(values) => write!(f, "{values}"),
        }
    }
}

impl Display for ValueListStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.values)
    }
}

/// The length of a value as shown, strings quoted and whole numbers with one decimal.
fn shown_len(value: &Token) -> usize {
    match value {
        Token::Numeric { value, .. } if value.fract() == 0.0 => format!("{value:.1}").len(),
        value => value.to_string().chars().count(),
    }
}
