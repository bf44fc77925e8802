// Module declarations
pub mod error;
pub mod value;
pub mod data_type;
pub mod row;
pub mod result;
pub mod config;
pub mod clock;
pub mod timing;

// Re-exports for convenience
pub use error::{HelperError, Result};
pub use value::Value;
pub use data_type::{ColumnInfo, ColumnType, TableDescription};
pub use row::Row;
pub use result::QueryResult;
pub use config::{HelperConfig, RemoteConfig, MAX_STAGING_FILE_SIZE_GB};
pub use clock::{Clock, SystemClock};
