use super::{Field, Record, Session};
use crate::error::Error;
use crate::schema::Table;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use sea_orm::sea_query::{SelectStatement, SqliteQueryBuilder, Value};
use std::collections::BTreeMap;
use time::format_description::FormatItem;
use time::macros::format_description;

const DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const DATETIME: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const TIMESTAMP: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

/// A session on a SQLite connection.
///
/// Dates are stored as ISO 8601 text, time zone aware timestamps in UTC with an explicit
/// `+00:00` offset, so that they compare correctly as text.
pub struct SqliteSession<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteSession<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn session_error<E>(err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Session(Box::new(err))
}

fn convert(value: Value) -> Result<SqlValue, Error> {
    Ok(match value {
        Value::Bool(value) => value.map(|v| SqlValue::Integer(v.into())).unwrap_or(SqlValue::Null),
        Value::TinyInt(value) => value.map(|v| SqlValue::Integer(v.into())).unwrap_or(SqlValue::Null),
        Value::SmallInt(value) => value.map(|v| SqlValue::Integer(v.into())).unwrap_or(SqlValue::Null),
        Value::Int(value) => value.map(|v| SqlValue::Integer(v.into())).unwrap_or(SqlValue::Null),
        Value::BigInt(value) => value.map(SqlValue::Integer).unwrap_or(SqlValue::Null),
        Value::TinyUnsigned(value) => value.map(|v| SqlValue::Integer(v.into())).unwrap_or(SqlValue::Null),
        Value::SmallUnsigned(value) => value.map(|v| SqlValue::Integer(v.into())).unwrap_or(SqlValue::Null),
        Value::Unsigned(value) => value.map(|v| SqlValue::Integer(v.into())).unwrap_or(SqlValue::Null),
        Value::Float(value) => value.map(|v| SqlValue::Real(v.into())).unwrap_or(SqlValue::Null),
        Value::Double(value) => value.map(SqlValue::Real).unwrap_or(SqlValue::Null),
        Value::String(value) => value.map(|v| SqlValue::Text(v.to_string())).unwrap_or(SqlValue::Null),
        Value::Char(value) => value.map(|v| SqlValue::Text(v.to_string())).unwrap_or(SqlValue::Null),
        Value::Bytes(value) => value.map(|v| SqlValue::Blob(v.to_vec())).unwrap_or(SqlValue::Null),
        Value::TimeDate(value) => match value {
            Some(date) => SqlValue::Text(date.format(DATE).map_err(session_error)?),
            None => SqlValue::Null,
        },
        Value::TimeTime(value) => match value {
            Some(time) => SqlValue::Text(time.format(TIME).map_err(session_error)?),
            None => SqlValue::Null,
        },
        Value::TimeDateTime(value) => match value {
            Some(datetime) => SqlValue::Text(datetime.format(DATETIME).map_err(session_error)?),
            None => SqlValue::Null,
        },
        Value::TimeDateTimeWithTimeZone(value) => match value {
            Some(timestamp) => SqlValue::Text(timestamp.format(TIMESTAMP).map_err(session_error)?),
            None => SqlValue::Null,
        },
        value => {
            return Err(Error::Session(
                format!("unsupported parameter value: {value:?}").into(),
            ))
        }
    })
}

impl From<SqlValue> for Field {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Integer(value) => Self::Integer(value),
            SqlValue::Real(value) => Self::Real(value),
            SqlValue::Text(value) => Self::Text(value),
            SqlValue::Blob(value) => Self::Blob(value),
        }
    }
}

impl Session for SqliteSession<'_> {
    fn fetch(&mut self, table: &Table, select: &SelectStatement) -> Result<Vec<Record>, Error> {
        let (sql, values) = select.build(SqliteQueryBuilder);
        tracing::debug!("fetching {}: {sql}", table.name);

        let params = values
            .0
            .into_iter()
            .map(convert)
            .collect::<Result<Vec<_>, _>>()?;

        let mut statement = self.conn.prepare(&sql).map_err(session_error)?;
        let columns = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();

        let mut rows = statement
            .query(rusqlite::params_from_iter(params))
            .map_err(session_error)?;

        let mut result = vec![];
        while let Some(row) = rows.next().map_err(session_error)? {
            let mut fields = BTreeMap::new();
            for (index, name) in columns.iter().enumerate() {
                let value: SqlValue = row.get(index).map_err(session_error)?;
                fields.insert(name.clone(), Field::from(value));
            }

            let id = match fields.get(&table.primary_key) {
                Some(Field::Integer(id)) => *id,
                _ => {
                    return Err(Error::Session(
                        format!("row of '{}' without an integer primary key", table.name).into(),
                    ))
                }
            };

            result.push(Record {
                table: table.name.clone(),
                id,
                fields,
            });
        }

        Ok(result)
    }
}
