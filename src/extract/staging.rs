use std::fmt;

use uuid::Uuid;

use crate::core::ColumnInfo;

const STAGING_PREFIX: &str = "bdf_";

/// Steps of a bulk extraction, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStep {
    Stage,
    Populate,
    Enumerate,
    Fetch,
    Transfer,
    Assemble,
    Drop,
    Decode,
}

impl fmt::Display for ExtractStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stage => "stage",
            Self::Populate => "populate",
            Self::Enumerate => "enumerate",
            Self::Fetch => "fetch",
            Self::Transfer => "transfer",
            Self::Assemble => "assemble",
            Self::Drop => "drop",
            Self::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// Ephemeral table a query is materialized into for extraction.
#[derive(Debug, Clone)]
pub struct StagingTable {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Backing files on the distributed filesystem, in enumeration order.
    pub files: Vec<String>,
}

impl StagingTable {
    /// Fresh table with a random `bdf_<uuid>` name.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            name: format!("{STAGING_PREFIX}{}", Uuid::new_v4().simple()),
            columns: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Local file name of the `index`-th backing file.
    #[must_use]
    pub fn part_name(&self, index: usize, extension: &str) -> String {
        format!("{}_{index}.{extension}", self.name)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
