use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::data_type::ColumnType;
use super::error::{HelperError, Result};

/// Marker the engine writes for NULL in text-format files.
pub const TEXT_NULL: &str = "\\N";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    // TINYINT..BIGINT
    Integer(i64),
    // FLOAT / DOUBLE
    Double(f64),
    Decimal(Decimal),
    // STRING / VARCHAR / CHAR, and complex types rendered as text
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Binary(Vec<u8>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by reports; text is parsed leniently since
    /// text-protocol engines return every column as a string.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            Self::Decimal(d) => d.to_string().parse().ok(),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Parses one field of a text-format staging file according to its column type.
    pub fn parse_typed(raw: &str, column_type: &ColumnType) -> Result<Self> {
        if raw == TEXT_NULL {
            return Ok(Self::Null);
        }
        let bad = |what: &str| HelperError::Parse(format!("'{raw}' is not a valid {what}"));

        let value = match column_type {
            ColumnType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => return Err(bad("boolean")),
            },
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt => {
                Self::Integer(raw.parse().map_err(|_| bad("integer"))?)
            }
            ColumnType::Float | ColumnType::Double => {
                Self::Double(raw.parse().map_err(|_| bad("double"))?)
            }
            ColumnType::Decimal { .. } => {
                Self::Decimal(Decimal::from_str(raw).map_err(|_| bad("decimal"))?)
            }
            ColumnType::Date => {
                Self::Date(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| bad("date"))?)
            }
            ColumnType::Timestamp => Self::Timestamp(
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                    .map_err(|_| bad("timestamp"))?,
            ),
            ColumnType::Binary => Self::Binary(raw.as_bytes().to_vec()),
            ColumnType::String
            | ColumnType::Varchar { .. }
            | ColumnType::Char { .. }
            | ColumnType::Complex(_) => Self::Text(raw.to_string()),
        };
        Ok(value)
    }

    /// Renders the value as an SQL literal for template substitution.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Boolean(b) => b.to_string().to_uppercase(),
            Self::Integer(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Self::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Self::Timestamp(t) => format!("'{}'", t.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Binary(b) => format!("unhex('{}')", hex::encode(b)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Self::Binary(b) => write!(f, "\\x{}", hex::encode(b)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}
