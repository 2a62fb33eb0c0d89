//! Literal values of the search language.

use regex::Regex;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d*)?([eE]\d+)?$").expect("valid numeric pattern"));

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,4}[/.-]\d{1,2}[/.-]\d{1,4}$").expect("valid date pattern")
});

/// A value as written in a query.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// `None`, the absence of a value.
    None,
    /// `Empty`, a relationship without related rows.
    Empty,
    String(String),
    /// A number, keeping the text it was parsed from.
    Numeric { value: f64, raw: String },
}

/// What a [`Token`] expresses once used in a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Empty,
    Text(String),
    Number(f64),
}

impl Token {
    /// Classify an unquoted word.
    ///
    /// Date shaped words stay strings, their interpretation is up to the attribute they are
    /// compared with.
    pub fn classify(word: &str) -> Self {
        match word {
            "None" => Self::None,
            "Empty" => Self::Empty,
            word if DATE.is_match(word) => Self::String(word.to_string()),
            word if NUMERIC.is_match(word) => match word.parse::<f64>() {
                Ok(value) => Self::Numeric {
                    value,
                    raw: word.to_string(),
                },
                Err(_) => Self::String(word.to_string()),
            },
            word => Self::String(word.to_string()),
        }
    }

    pub fn express(&self) -> Literal {
        match self {
            Self::None => Literal::Null,
            Self::Empty => Literal::Empty,
            Self::String(value) => Literal::Text(value.clone()),
            Self::Numeric { value, .. } => Literal::Number(*value),
        }
    }

    /// Like [`Self::express`], but numbers keep their original text.
    pub fn express_raw(&self) -> Literal {
        match self {
            Self::Numeric { raw, .. } => Literal::Text(raw.clone()),
            _ => self.express(),
        }
    }

    /// The token as it was written, minus quotes.
    pub fn raw_text(&self) -> &str {
        match self {
            Self::None => "None",
            Self::Empty => "Empty",
            Self::String(value) => value,
            Self::Numeric { raw, .. } => raw,
        }
    }

    pub fn is_empty_set(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None | Self::Empty => f.write_str(self.raw_text()),
            Self::String(value) => write!(f, "'{value}'"),
            Self::Numeric { value, .. } => write!(f, "{value}"),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Empty => f.write_str("Empty"),
            Self::Text(value) => write!(f, "'{value}'"),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

/// A list of values, as used by `IN` and by plain value searches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueList(pub Vec<Token>);

impl ValueList {
    pub fn express(&self) -> Vec<Literal> {
        self.0.iter().map(Token::express).collect()
    }

    pub fn express_raw(&self) -> Vec<Literal> {
        self.0.iter().map(Token::express_raw).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.0.iter()
    }
}

impl Display for ValueList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (n, token) in self.0.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{token}")?;
        }
        f.write_str("]")
    }
}
