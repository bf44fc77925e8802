use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{ColumnInfo, HelperError, QueryResult, Result, Row, Value};

/// Field separator of the engine's text tables (`^A`).
pub const TEXT_FIELD_DELIMITER: char = '\u{1}';

/// File format the staging table is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StagingFormat {
    Text,
    Parquet,
}

impl StagingFormat {
    /// Keyword used in `STORED AS`.
    #[must_use]
    pub const fn stored_as(self) -> &'static str {
        match self {
            Self::Text => "TEXTFILE",
            Self::Parquet => "PARQUET",
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Parquet => "parq",
        }
    }

    /// Template applied before the staging table is created. Parquet output
    /// rolls over at the configured file size; text output has no size knob,
    /// so a single node writes it.
    #[must_use]
    pub const fn options_template(self) -> &'static str {
        match self {
            Self::Text => "staging_options_text",
            Self::Parquet => "staging_options_parquet",
        }
    }

    /// Template restoring what [`Self::options_template`] changed.
    #[must_use]
    pub const fn reset_template(self) -> &'static str {
        match self {
            Self::Text => "staging_reset_text",
            Self::Parquet => "staging_reset_parquet",
        }
    }

    #[must_use]
    pub const fn honors_file_size(self) -> bool {
        matches!(self, Self::Parquet)
    }
}

/// Decodes one backing file of a staging table.
pub trait PartReader {
    fn format(&self) -> StagingFormat;
    fn read(&self, path: &Path, columns: &[ColumnInfo]) -> Result<QueryResult>;

    /// Whether string values come back as escaped byte literals
    /// (`b'caf\xc3\xa9'`) that need decoding after the read.
    fn encodes_byte_literals(&self) -> bool {
        false
    }
}

/// Reader for `STORED AS TEXTFILE` parts: one row per line, `^A` between
/// fields, `\N` for NULL.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextPartReader;

impl PartReader for TextPartReader {
    fn format(&self) -> StagingFormat {
        StagingFormat::Text
    }

    fn read(&self, path: &Path, columns: &[ColumnInfo]) -> Result<QueryResult> {
        let header = columns.iter().map(|c| c.name.clone()).collect();
        let mut result = QueryResult::empty(header);
        let reader = BufReader::new(File::open(path)?);

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let fields: Vec<&str> = line.split(TEXT_FIELD_DELIMITER).collect();
            if fields.len() != columns.len() {
                return Err(HelperError::Parse(format!(
                    "{}:{}: expected {} fields, found {}",
                    path.display(),
                    number + 1,
                    columns.len(),
                    fields.len()
                )));
            }
            let values = fields
                .iter()
                .zip(columns)
                .map(|(raw, column)| Value::parse_typed(raw, &column.column_type))
                .collect::<Result<Vec<_>>>()?;
            result.push(Row::new(values))?;
        }
        Ok(result)
    }
}
