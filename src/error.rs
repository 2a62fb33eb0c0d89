use crate::operation::Operator;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Syntax error at position {position} in '{text}': {message}")]
    Syntax {
        text: String,
        position: usize,
        message: String,
    },
    #[error("Unknown search domain: {0}")]
    UnknownDomain(String),
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("Unknown identifier '{segment}' on '{table}'")]
    UnknownIdentifier { table: String, segment: String },
    #[error("'{0}' is a relationship, not an attribute")]
    NotAnAttribute(String),
    #[error("Operator '{operator}' can not be used with {value}")]
    InvalidOperand { operator: Operator, value: String },
    #[error("Invalid date value: {0}")]
    InvalidDate(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Session error: {0}")]
    Session(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn unknown_identifier(table: &str, segment: &str) -> Self {
        Self::UnknownIdentifier {
            table: table.to_string(),
            segment: segment.to_string(),
        }
    }

    pub(crate) fn invalid_operand(operator: Operator, value: impl ToString) -> Self {
        Self::InvalidOperand {
            operator,
            value: value.to_string(),
        }
    }
}
