use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, warn};

use super::{load_config, progress_bar};
use crate::cli::output::{ChunkStats, get_formatter};
use crate::models::{ChunkFile, ChunkStrategy, OutputFormat};
use crate::services::TextChunker;
use crate::services::interchange::ChunkFileWriter;
use crate::sources::LocalSource;

#[derive(Debug, Args)]
pub struct ChunkArgs {
    #[arg(help = "File or directory to chunk")]
    pub path: PathBuf,

    #[arg(long, short = 'o', default_value = "chunks", help = "Directory for chunk files")]
    pub output: PathBuf,

    #[arg(long, short = 'c', help = "Collection name recorded in chunk metadata")]
    pub collection: Option<String>,

    #[arg(long, help = "Chunk strategy: auto, structured, or window")]
    pub strategy: Option<ChunkStrategy>,

    #[arg(long, help = "Token budget per chunk")]
    pub max_tokens: Option<u32>,

    #[arg(long, help = "Characters shared between consecutive chunks")]
    pub overlap: Option<u32>,

    #[arg(long, short = 'e', help = "Additional glob patterns to exclude")]
    pub exclude: Vec<String>,
}

pub async fn handle_chunk(args: ChunkArgs, format: OutputFormat) -> Result<()> {
    let start = Instant::now();
    let mut config = load_config(args.collection.as_deref())?;
    if let Some(strategy) = args.strategy {
        config.chunking.strategy = strategy;
    }
    if let Some(max_tokens) = args.max_tokens {
        config.chunking.max_tokens = max_tokens;
    }
    if let Some(overlap) = args.overlap {
        config.chunking.overlap = overlap;
    }
    config.chunking.validate()?;

    let chunker = TextChunker::new(&config.chunking).context("failed to build chunker")?;
    let collection = config.vector_store.collection.clone();
    debug!(
        counter = chunker.counter_name(),
        window = config.chunking.window_chars(),
        "chunker ready"
    );

    let mut excludes = config.pipeline.exclude_patterns.clone();
    excludes.extend(args.exclude);
    let source = LocalSource::new(args.path, &excludes, config.pipeline.max_file_size);
    let files = source.collect_files()?;

    let formatter = get_formatter(format);
    let pb = progress_bar(format == OutputFormat::Text, "files");
    pb.set_length(files.len() as u64);

    let mut stats = ChunkStats {
        files_scanned: files.len(),
        output_dir: args.output.display().to_string(),
        ..Default::default()
    };

    let mut writer = ChunkFileWriter::new(&args.output);
    for path in &files {
        pb.set_message(source.source_id(path));
        let document = match source.load(path) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
                stats.files_failed += 1;
                pb.inc(1);
                continue;
            }
        };

        let chunks = chunker.chunk(&document, &collection);
        if chunks.is_empty() {
            debug!(source = %document.source_id, "no content to chunk");
            pb.inc(1);
            continue;
        }

        let file = ChunkFile::from_chunks(&document, &chunks);
        let written = writer
            .write(&file)
            .with_context(|| format!("failed to write chunks for {}", document.source_id))?;
        debug!(path = %written.display(), chunks = chunks.len(), "wrote chunk file");

        stats.files_chunked += 1;
        stats.chunks_created += chunks.len();
        pb.inc(1);
    }
    pb.finish_and_clear();

    stats.duration_ms = start.elapsed().as_millis() as u64;
    print!("{}", formatter.format_chunk_stats(&stats));
    Ok(())
}
