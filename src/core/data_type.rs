use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{HelperError, Result};
use super::result::QueryResult;
use super::value::Value;
use crate::parser::common::parse_column_type;

/// Column types as reported by `DESCRIBE`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    String,
    Varchar { max_length: usize },
    Char { length: usize },
    Date,
    Timestamp,
    Binary,
    /// struct<..>, array<..>, map<..>; kept verbatim
    Complex(String),
}

impl ColumnType {
    #[must_use]
    pub const fn is_integral(&self) -> bool {
        matches!(self, Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt)
    }

    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Varchar { .. } | Self::Char { .. })
    }
}

/// One row of `DESCRIBE <table>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub comment: Option<String>,
}

impl ColumnInfo {
    /// Reads the `name, type, comment` rows `DESCRIBE` returns.
    pub fn from_describe(result: &QueryResult) -> Result<Vec<Self>> {
        result
            .rows
            .iter()
            .map(|row| {
                let text = |index: usize| row.get(index).and_then(Value::as_text).map(str::trim);
                let name = text(0)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| HelperError::Parse("DESCRIBE row without a column name".into()))?;
                let raw_type = text(1)
                    .ok_or_else(|| HelperError::Parse(format!("DESCRIBE row for '{name}' has no type")))?;
                Ok(Self {
                    name: name.to_string(),
                    column_type: parse_column_type(raw_type)?,
                    comment: text(2).filter(|c| !c.is_empty()).map(str::to_string),
                })
            })
            .collect()
    }
}

/// Section titles of `DESCRIBE FORMATTED` that carry no property.
const SECTION_TITLES: [&str; 4] = [
    "# col_name",
    "# Detailed Table Information",
    "Table Parameters:",
    "# Storage Information",
];

/// `DESCRIBE FORMATTED <table>`: the columns plus the table's properties
/// (location, owner, input format, table parameters, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    pub columns: Vec<ColumnInfo>,
    pub properties: BTreeMap<String, String>,
}

impl TableDescription {
    /// Rows with a NULL second cell separate sections. Columns sit between
    /// the first and the second separator; every later row is a property,
    /// `key: value` in the first two cells, or in the last two when the first
    /// is blank (table parameters).
    pub fn from_formatted(result: &QueryResult) -> Result<Self> {
        let mut description = Self::default();
        let mut separators = 0;

        for row in &result.rows {
            if row.get(1).is_none_or(Value::is_null) {
                separators += 1;
                continue;
            }
            let cell = |index: usize| row.get(index).and_then(Value::as_text).map_or("", str::trim);
            let (first, second, third) = (cell(0), cell(1), cell(2));

            if separators == 1 {
                description.columns.push(ColumnInfo {
                    name: first.to_string(),
                    column_type: parse_column_type(second)?,
                    comment: Some(third).filter(|c| !c.is_empty()).map(str::to_string),
                });
            } else if SECTION_TITLES.contains(&first) {
                continue;
            } else if !first.is_empty() {
                description.properties.insert(property_key(first), second.to_string());
            } else if !second.is_empty() {
                description.properties.insert(property_key(second), third.to_string());
            }
        }
        Ok(description)
    }
}

fn property_key(raw: &str) -> String {
    raw.replace(':', "").trim().to_string()
}
