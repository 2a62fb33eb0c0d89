//! Identifiers: paths from a domain to one of its, or a related table's, attributes.

use crate::error::Error;
use crate::operation::{apply, Operator};
use crate::query::{column, QueryHandler, Target};
use crate::schema::{AttributeType, Table};
use crate::token::Token;
use sea_orm::sea_query::{Alias, Func, SimpleExpr};
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

/// Functions which collapse rows, and so need grouping.
pub const AGGREGATE_FUNCTIONS: [&str; 6] = ["sum", "avg", "min", "max", "count", "total"];

pub fn is_aggregate(function: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(&function)
}

/// Wrap `arg` into a call of `function`.
pub fn call(function: &str, arg: SimpleExpr) -> SimpleExpr {
    Func::cust(Alias::new(function)).arg(arg).into()
}

/// Apply `functions`, outermost first, to the column `target` resolved to.
pub fn apply_functions(functions: &[(&str, bool)], target: &Target) -> Result<SimpleExpr, Error> {
    let (alias, attribute) = match target {
        Target::Column { alias, attribute } => (alias, attribute),
        Target::Relation { relationship, .. } => {
            return Err(Error::NotAnAttribute(relationship.name.clone()))
        }
    };

    let mut expr = column(alias, &attribute.name);
    for (n, (function, distinct)) in functions.iter().rev().enumerate() {
        let arg = match n == 0 && *distinct {
            true => SimpleExpr::Custom(format!(r#"DISTINCT "{alias}"."{}""#, attribute.name)),
            false => expr,
        };
        expr = call(function, arg);
    }

    Ok(expr)
}

/// The type of `function`'s result, when applied to a value of type `kind`.
pub fn result_kind(function: &str, kind: &AttributeType) -> Option<AttributeType> {
    match function {
        "count" | "length" => Some(AttributeType::Integer),
        "avg" | "total" => Some(AttributeType::Float),
        "sum" | "min" | "max" | "upper" | "lower" | "trim" => Some(kind.clone()),
        _ => None,
    }
}

/// A dot separated path, like `accession.species.epithet`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    pub steps: Vec<String>,
    pub leaf: String,
}

impl Path {
    pub fn new(mut names: Vec<String>) -> Self {
        let leaf = names.pop().unwrap_or_default();
        Self { steps: names, leaf }
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.steps.iter().chain(std::iter::once(&self.leaf))
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for step in &self.steps {
            write!(f, "{step}.")?;
        }
        f.write_str(&self.leaf)
    }
}

/// `attribute operator value`, inside the brackets of a filtered identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct InlineFilter {
    pub attribute: String,
    pub operator: Operator,
    pub value: Token,
}

/// Relationships followed by filters on the rows they reach: `species.accessions[code=A1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FilteredSegment {
    pub relations: Vec<String>,
    pub filters: Vec<InlineFilter>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Identifier {
    Unfiltered(Path),
    Filtered {
        segments: Vec<FilteredSegment>,
        leaf: Path,
    },
    Function {
        name: String,
        distinct: bool,
        inner: Box<Identifier>,
    },
}

impl Identifier {
    /// Resolve the identifier against the handler's domain, joining what's needed.
    ///
    /// Functions are ignored here, they are applied by the clause using the identifier.
    pub fn resolve(&self, handler: &mut QueryHandler) -> Result<Target, Error> {
        tracing::debug!("resolving {self}");

        match self {
            Self::Unfiltered(path) => {
                let table = handler.table;
                let alias = handler.query.alias().to_string();
                walk(handler, table, alias, path.names().cloned().collect())
            }
            Self::Filtered { segments, leaf } => {
                let mut table = handler.table;
                let mut alias = handler.query.alias().to_string();

                for segment in segments {
                    for name in &segment.relations {
                        let relationship = table
                            .find_relationship(name)
                            .ok_or_else(|| Error::unknown_identifier(&table.name, name))?;
                        alias = handler.query.join(&alias, relationship, true);
                        table = handler.lookup(&relationship.target)?;
                    }

                    for filter in &segment.filters {
                        let attribute = table
                            .resolve_attribute(&filter.attribute)
                            .ok_or_else(|| Error::unknown_identifier(&table.name, &filter.attribute))?;
                        let condition = apply(
                            filter.operator,
                            column(&alias, &attribute.name),
                            Some(&attribute.kind),
                            filter.value.express().into(),
                            handler.options,
                        )?;
                        handler.filter(condition);
                    }
                }

                walk(handler, table, alias, leaf.names().cloned().collect())
            }
            Self::Function { inner, .. } => inner.resolve(handler),
        }
    }

    /// The functions wrapping this identifier, outermost first, and the identifier they wrap.
    pub fn unwrap_functions(&self) -> (Vec<(&str, bool)>, &Identifier) {
        let mut functions = vec![];
        let mut current = self;
        while let Self::Function {
            name,
            distinct,
            inner,
        } = current
        {
            functions.push((name.as_str(), *distinct));
            current = inner.as_ref();
        }
        (functions, current)
    }

    pub fn is_aggregate(&self) -> bool {
        self.unwrap_functions()
            .0
            .iter()
            .any(|(name, _)| is_aggregate(name))
    }
}

fn walk<'s>(
    handler: &mut QueryHandler<'s>,
    mut table: &'s Table,
    mut alias: String,
    mut names: VecDeque<String>,
) -> Result<Target, Error> {
    while let Some(name) = names.pop_front() {
        let last = names.is_empty();

        if last {
            if let Some(attribute) = table.resolve_attribute(&name) {
                return Ok(Target::Column { alias, attribute });
            }
        }

        if let Some(relationship) = table.find_relationship(&name) {
            if last {
                return Ok(Target::Relation {
                    alias,
                    relationship: relationship.clone(),
                });
            }
            alias = handler.query.join(&alias, relationship, false);
            table = handler.lookup(&relationship.target)?;
        } else if let Some(proxy) = table.find_proxy(&name) {
            if table.find_relationship(&proxy.relationship).is_none() {
                return Err(Error::unknown_identifier(&table.name, &proxy.relationship));
            }
            names.push_front(proxy.attribute.clone());
            names.push_front(proxy.relationship.clone());
        } else {
            return Err(Error::unknown_identifier(&table.name, &name));
        }
    }

    Err(Error::unknown_identifier(&table.name, ""))
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unfiltered(path) => write!(f, "{path}"),
            Self::Filtered { segments, leaf } => {
                for segment in segments {
                    write!(f, "{}[", segment.relations.join("."))?;
                    for (n, filter) in segment.filters.iter().enumerate() {
                        if n > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}{}{}", filter.attribute, filter.operator, filter.value)?;
                    }
                    f.write_str("].")?;
                }
                write!(f, "{leaf}")
            }
            Self::Function {
                name,
                distinct: true,
                inner,
            } => write!(f, "{name}(DISTINCT {inner})"),
            Self::Function { name, inner, .. } => write!(f, "{name}({inner})"),
        }
    }
}
