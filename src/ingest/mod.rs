pub mod header;
pub mod parser;

pub use header::{field, normalize_header, HeaderIndex, LogicalField};
pub use parser::parse_file;
