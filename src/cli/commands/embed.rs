use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use super::{load_config, progress_bar};
use crate::cli::output::{EmbedStats, get_formatter};
use crate::models::{EmbedOutcome, EmbeddingRecord, OutputFormat};
use crate::services::interchange::{EmbeddingsWriter, collect_chunk_files, read_chunk_file};
use crate::services::{BatchEmbedder, create_embedder};

#[derive(Debug, Args)]
pub struct EmbedArgs {
    #[arg(help = "Chunk file or directory of chunk files")]
    pub input: PathBuf,

    #[arg(
        long,
        short = 'o',
        default_value = "embeddings.jsonl",
        help = "Embeddings JSONL output"
    )]
    pub output: PathBuf,

    #[arg(long, short = 'c', help = "Collection name recorded in each record")]
    pub collection: Option<String>,

    #[arg(long, help = "Texts per embedding request")]
    pub batch_size: Option<u32>,
}

pub async fn handle_embed(args: EmbedArgs, format: OutputFormat) -> Result<()> {
    let start = Instant::now();
    let mut config = load_config(args.collection.as_deref())?;
    if let Some(batch_size) = args.batch_size {
        config.embedding.batch_size = batch_size;
    }
    config.validate()?;

    let files = collect_chunk_files(&args.input)
        .with_context(|| format!("failed to list chunk files in {}", args.input.display()))?;
    if files.is_empty() {
        anyhow::bail!("no chunk files found in {}", args.input.display());
    }

    let backend = create_embedder(&config.embedding).context("failed to initialize embedder")?;
    backend
        .health_check()
        .await
        .context("embedding backend is not reachable")?;
    let embedder = BatchEmbedder::from_config(backend, &config.embedding);
    let collection = config.vector_store.collection.clone();
    let mut writer = EmbeddingsWriter::create(&args.output)?;

    let formatter = get_formatter(format);
    let pb = progress_bar(format == OutputFormat::Text, "files");
    pb.set_length(files.len() as u64);

    let mut stats = EmbedStats {
        chunk_files: files.len(),
        output: args.output.display().to_string(),
        ..Default::default()
    };

    for path in &files {
        let file = read_chunk_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        pb.set_message(file.source.clone());

        let texts: Vec<String> = file.chunks.iter().map(|c| c.text.clone()).collect();
        let outcomes = embedder.embed_all(&texts).await?;
        stats.chunks += texts.len();

        for (chunk, outcome) in file.chunks.iter().zip(outcomes) {
            match outcome {
                EmbedOutcome::Embedded(vector) => {
                    let record = EmbeddingRecord::from_chunk(
                        &file,
                        chunk,
                        &collection,
                        vector,
                        embedder.model_id(),
                    );
                    writer.write(&record)?;
                    stats.embedded += 1;
                }
                EmbedOutcome::Empty => stats.empty += 1,
                EmbedOutcome::Failed { reason } => {
                    warn!(source = %file.source, chunk = chunk.index, %reason, "chunk failed to embed");
                    stats.failed += 1;
                }
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let written = writer.finish()?;
    info!(records = written, output = %args.output.display(), "embeddings written");

    stats.duration_ms = start.elapsed().as_millis() as u64;
    print!("{}", formatter.format_embed_stats(&stats));
    Ok(())
}
