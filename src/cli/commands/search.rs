use anyhow::{Context, Result};
use clap::Args;

use super::load_config;
use crate::cli::output::get_formatter;
use crate::models::{OutputFormat, SearchQuery};
use crate::services::{BatchEmbedder, create_backend, create_embedder, search};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'c', help = "Collection to search")]
    pub collection: Option<String>,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<u32>,

    #[arg(long, help = "Minimum similarity score threshold")]
    pub min_score: Option<f32>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let config = load_config(args.collection.as_deref())?;

    let limit = args.limit.unwrap_or(config.search.default_limit);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }
    let min_score = args.min_score.or(config.search.default_min_score);

    let embedder = BatchEmbedder::from_config(
        create_embedder(&config.embedding).context("failed to initialize embedder")?,
        &config.embedding,
    );
    let store = create_backend(&config.vector_store)?;

    let request = SearchQuery::new(query, config.vector_store.collection.as_str())
        .with_limit(limit)
        .with_min_score(min_score);
    let results = search(&embedder, store.as_ref(), &request)
        .await
        .context("search failed")?;

    print!("{}", get_formatter(format).format_search_results(&results));
    Ok(())
}
