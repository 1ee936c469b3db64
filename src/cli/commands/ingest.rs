use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::{load_config, progress_bar};
use crate::cli::output::get_formatter;
use crate::models::{DistanceMetric, IngestMode, OutputFormat};
use crate::services::{Pipeline, PipelineContext, RunOptions};
use crate::sources::LocalSource;

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(help = "File or directory to ingest")]
    pub path: PathBuf,

    #[arg(long, short = 'c', help = "Target collection")]
    pub collection: Option<String>,

    #[arg(long, short = 'm', help = "Existing documents: upsert, skip, or replace")]
    pub mode: Option<IngestMode>,

    #[arg(long, help = "Distance for a new collection: cosine or dot")]
    pub distance: Option<DistanceMetric>,

    #[arg(long, help = "Drop and recreate the collection first")]
    pub recreate: bool,

    #[arg(long, help = "Skip documents unchanged since the last run")]
    pub resume: bool,

    #[arg(long, short = 'e', help = "Additional glob patterns to exclude")]
    pub exclude: Vec<String>,

    #[arg(long, help = "List the files that would be ingested")]
    pub dry_run: bool,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat) -> Result<()> {
    let config = load_config(args.collection.as_deref())?;
    let formatter = get_formatter(format);
    let collection = config.vector_store.collection.clone();

    let mut excludes = config.pipeline.exclude_patterns.clone();
    excludes.extend(args.exclude);
    let source = LocalSource::new(args.path, &excludes, config.pipeline.max_file_size);

    if args.dry_run {
        let files = source.collect_files()?;
        println!(
            "{}",
            formatter.format_message(&format!(
                "Dry run: would ingest {} file(s) into '{}'",
                files.len(),
                collection
            ))
        );
        if format == OutputFormat::Text {
            for file in &files {
                println!("  {}", source.source_id(file));
            }
        }
        return Ok(());
    }

    let documents = source.load_all()?;
    if documents.is_empty() {
        println!("{}", formatter.format_message("No files found to ingest."));
        return Ok(());
    }

    let context = PipelineContext::from_config(&config, args.resume)
        .context("failed to initialize pipeline")?;
    context
        .store
        .health_check()
        .await
        .context("vector store is not reachable")?;
    context
        .embedder
        .inner()
        .health_check()
        .await
        .context("embedding backend is not reachable")?;
    let pipeline = Pipeline::new(context);

    let options = RunOptions {
        mode: args.mode.unwrap_or(config.pipeline.mode),
        distance: args.distance.unwrap_or(config.vector_store.distance),
        recreate: args.recreate,
        progress: progress_bar(format == OutputFormat::Text, "documents"),
    };

    let summary = pipeline.run(documents, &collection, &options).await?;
    print!("{}", formatter.format_run_summary(&summary));

    if summary.failed > 0 && summary.succeeded == 0 && summary.skipped == 0 {
        anyhow::bail!("all {} document(s) failed", summary.failed);
    }
    Ok(())
}
