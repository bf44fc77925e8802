// impala-helper - analytics helper for Impala-style query engines
// Statement execution with retry, bulk extraction through staging tables,
// derived-table analyses

// Clippy configuration - allow non-critical warnings
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::float_cmp)]
#![allow(clippy::collapsible_if)]

// Values, results, configuration, errors
pub mod core;

// Templates, scripts, listings, column types, sizes, byte literals
pub mod parser;

// Built-in statement templates
pub mod sql;

// Engine seams, session lifecycle, impala-shell adapter
pub mod session;

// Retrying executor, materializer, script runner
pub mod executor;

// Processes, HDFS, secure hop
pub mod transfer;

// Bulk extraction pipeline
pub mod extract;

// Derived tables: sampling, one-hot, pivot, stability, masking
pub mod derive;

// Facade bundling everything above
pub mod helper;

// Re-export commonly used types for convenience
pub use crate::core::{
    ColumnInfo, ColumnType, HelperConfig, HelperError, QueryResult, RemoteConfig, Result, Row, TableDescription, Value,
};
pub use executor::{QueryExecutor, RetryPolicy, RowMaterializer};
pub use extract::{BulkExtraction, PartReader, StagingFormat, TextPartReader};
pub use derive::{ConfidenceLevel, DerivedColumn, DerivedTables, MaskSalts, StabilityReport, VariableSelection};
pub use helper::Helper;
pub use parser::{Params, SizeUnit};
pub use session::{ConnectionManager, Cursor, EngineConnection, EngineConnector, ImpalaShellConnector};
pub use sql::TemplateCatalog;
pub use transfer::{DistributedFileClient, HdfsClient, ScpClient, SecureTransferClient};
