//! Document sources and format conversion.

mod convert;
mod local;

pub use convert::{convert_file, json_to_markdown, pdf_to_text};
pub use local::LocalSource;
