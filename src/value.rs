//! Coercion of literals into values of the attribute they are compared with.

use crate::error::Error;
use crate::options::{DateOrder, Options};
use crate::schema::AttributeType;
use crate::token::Literal;
use sea_orm::sea_query::{SimpleExpr, Value};
use time::macros::format_description;
use time::{Date, Month, PrimitiveDateTime, Time, UtcOffset};

/// Turn a literal into a value fit for comparing with an attribute of type `kind`.
///
/// Text which doesn't parse into the attribute's type is passed on unchanged, it is up to
/// the database to compare it. `None` and `Empty` carry no value and become `NULL`.
pub fn coerce(literal: &Literal, kind: Option<&AttributeType>, options: &Options) -> SimpleExpr {
    let value = match (literal, kind) {
        (Literal::Null | Literal::Empty, _) => Value::String(None),
        (Literal::Number(number), None | Some(AttributeType::Integer)) => number_value(*number),
        (Literal::Number(number), Some(AttributeType::Float)) => Value::from(*number),
        (Literal::Number(number), Some(AttributeType::Boolean)) => Value::from(*number != 0.0),
        (Literal::Number(number), Some(_)) => Value::from(number.to_string()),
        (Literal::Text(text), Some(AttributeType::Integer)) => match text.parse::<i64>() {
            Ok(number) => Value::from(number),
            Err(_) => match text.parse::<f64>() {
                Ok(number) => Value::from(number),
                Err(_) => Value::from(text.clone()),
            },
        },
        (Literal::Text(text), Some(AttributeType::Float)) => match text.parse::<f64>() {
            Ok(number) => Value::from(number),
            Err(_) => Value::from(text.clone()),
        },
        (Literal::Text(text), Some(AttributeType::Boolean)) => match parse_bool(text) {
            Some(flag) => Value::from(flag),
            None => Value::from(text.clone()),
        },
        (Literal::Text(text), Some(AttributeType::Date)) => {
            match parse_date(text, options.date_order) {
                Some(date) => Value::from(date),
                None => Value::from(text.clone()),
            }
        }
        (Literal::Text(text), Some(AttributeType::DateTime)) => {
            match parse_datetime(text, options.date_order) {
                Some(datetime) => Value::from(datetime),
                None => Value::from(text.clone()),
            }
        }
        (Literal::Text(text), Some(AttributeType::Timestamp)) => {
            match parse_datetime(text, options.date_order) {
                Some(datetime) => Value::from(
                    datetime
                        .assume_offset(options.reference_offset())
                        .to_offset(UtcOffset::UTC),
                ),
                None => Value::from(text.clone()),
            }
        }
        (Literal::Text(text), _) => Value::from(text.clone()),
    };

    SimpleExpr::Value(value)
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        Value::from(number)
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a date shaped string, like `2021-01-31`, `31/1/2021` or `1.31.21`.
///
/// A leading part of four digits always reads as year first, otherwise `order` decides.
pub fn parse_date(text: &str, order: DateOrder) -> Option<Date> {
    if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
        return Some(date);
    }

    let parts = text
        .split(['-', '/', '.'])
        .map(|part| part.parse::<u16>().ok().map(|value| (value, part.len())))
        .collect::<Option<Vec<_>>>()?;

    let [first, second, third] = parts.as_slice() else {
        return None;
    };

    let (year, month, day) = match (first.1, order) {
        (4, _) | (_, DateOrder::YearFirst) => (*first, second.0, third.0),
        (_, DateOrder::DayFirst) => (*third, second.0, first.0),
        (_, DateOrder::MonthFirst) => (*third, first.0, second.0),
    };

    let year = match year {
        (year, digits) if digits <= 2 && year < 70 => 2000 + i32::from(year),
        (year, digits) if digits <= 2 => 1900 + i32::from(year),
        (year, _) => i32::from(year),
    };

    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    Date::from_calendar_date(year, month, u8::try_from(day).ok()?).ok()
}

/// Parse a date, optionally followed by a time of day, separated by a space or `T`.
pub fn parse_datetime(text: &str, order: DateOrder) -> Option<PrimitiveDateTime> {
    let (date, time) = match text.split_once([' ', 'T']) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (text, None),
    };

    let date = parse_date(date, order)?;
    let time = match time {
        Some(time) => parse_time(time)?,
        None => Time::MIDNIGHT,
    };

    Some(PrimitiveDateTime::new(date, time))
}

fn parse_time(text: &str) -> Option<Time> {
    let mut parts = text.split(':').map(|part| part.parse::<u8>().ok());
    let hour = parts.next()??;
    let minute = parts.next().unwrap_or(Some(0))?;
    let second = parts.next().unwrap_or(Some(0))?;
    Time::from_hms(hour, minute, second).ok()
}

/// The half open window `[start, end)` covering one calendar day, for an attribute of `kind`.
///
/// Time zone aware values get the window of that day in the reference time zone, expressed
/// in UTC.
pub fn day_window(
    kind: &AttributeType,
    date: Date,
    options: &Options,
) -> Result<(SimpleExpr, SimpleExpr), Error> {
    let next = date
        .next_day()
        .ok_or_else(|| Error::InvalidDate(date.to_string()))?;

    let (start, end) = match kind {
        AttributeType::Timestamp => {
            let offset = options.reference_offset();
            let start = date.midnight().assume_offset(offset).to_offset(UtcOffset::UTC);
            let end = next.midnight().assume_offset(offset).to_offset(UtcOffset::UTC);
            (Value::from(start), Value::from(end))
        }
        _ => (Value::from(date.midnight()), Value::from(next.midnight())),
    };

    Ok((SimpleExpr::Value(start), SimpleExpr::Value(end)))
}
