mod chunk;
mod collection;
mod config;
mod embed;
mod ingest;
mod search;
mod status;
mod upload;

pub use chunk::ChunkArgs;
pub use collection::CollectionCommand;
pub use config::ConfigCommand;
pub use embed::EmbedArgs;
pub use ingest::IngestArgs;
pub use search::SearchArgs;
pub use status::StatusArgs;
pub use upload::UploadArgs;

pub use chunk::handle_chunk;
pub use collection::handle_collection;
pub use config::handle_config;
pub use embed::handle_embed;
pub use ingest::handle_ingest;
pub use search::handle_search;
pub use status::handle_status;
pub use upload::handle_upload;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::models::Config;

/// Load configuration and apply a `--collection` flag on top.
pub(crate) fn load_config(collection: Option<&str>) -> Result<Config> {
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(collection) = collection {
        config.vector_store.collection = collection.to_string();
    }
    Ok(config)
}

/// Progress bar on stderr, hidden for machine-readable output.
pub(crate) fn progress_bar(visible: bool, unit: &str) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {{msg}}",
        unit
    );
    if let Ok(style) = ProgressStyle::default_bar().template(&template) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
