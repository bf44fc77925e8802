// Text formats the helper reads and writes: templates, scripts, listings,
// column types, sizes and byte literals.
pub mod common;
pub mod template;
pub mod script;
pub mod listing;
pub mod literal;
pub mod size;

pub use common::parse_column_type;
pub use template::{Params, StatementTemplate};
pub use script::{split_statements, strip_comment};
pub use listing::{parse_listing, Listing};
pub use literal::decode_byte_literal;
pub use size::{parse_size, SizeUnit};
