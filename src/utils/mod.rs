//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{calculate_checksum, get_relative_path, read_file_content};
pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
pub use text::{PREVIEW_CHARS, extract_title, is_blank, preview};
