// Out-of-band extraction of large results through staging tables, and
// loading of local files into tables the same way in reverse.
pub mod pipeline;
pub mod reader;
pub mod staging;
pub mod upload;

pub use pipeline::{BulkExtraction, ExtractOptions};
pub use reader::{PartReader, StagingFormat, TextPartReader};
pub use staging::{ExtractStep, StagingTable};
pub use upload::FileUpload;
