//! Ingestion pipeline: document → chunks → embeddings → stored points.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::checkpoint::Checkpoint;
use super::chunker::TextChunker;
use super::embedding::{BatchEmbedder, create_embedder};
use super::vector_store::{VectorStore, create_backend};
use crate::error::{AppError, PipelineError, VectorStoreError};
use crate::models::{
    ChunkFile, Config, DistanceMetric, Document, EmbedOutcome, EmbeddingRecord, IngestMode,
    SearchQuery, SearchResult, SearchResults, StoredPoint,
};
use crate::utils::{PREVIEW_CHARS, preview};

/// Input to a run. Load failures travel with the batch so they are reported
/// per document.
#[derive(Debug, Clone)]
pub enum DocumentInput {
    Loaded(Document),
    Unreadable { source_id: String, reason: String },
}

impl DocumentInput {
    pub fn source_id(&self) -> &str {
        match self {
            DocumentInput::Loaded(doc) => &doc.source_id,
            DocumentInput::Unreadable { source_id, .. } => source_id,
        }
    }
}

/// Step a document failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Embed,
    Store,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::Embed => write!(f, "embed"),
            Stage::Store => write!(f, "store"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DocumentState {
    Pending,
    Chunked,
    Embedded,
    Stored,
    Skipped { reason: String },
    Failed { stage: Stage, reason: String },
}

/// A chunk that could not be embedded.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub index: u32,
    pub preview: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub source_id: String,
    pub state: DocumentState,
    pub chunks: usize,
    pub vectors_stored: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<ChunkFailure>,
}

impl DocumentReport {
    fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            state: DocumentState::Pending,
            chunks: 0,
            vectors_stored: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn skipped(mut self, reason: &str) -> Self {
        self.state = DocumentState::Skipped {
            reason: reason.to_string(),
        };
        self
    }

    fn failed(mut self, stage: Stage, reason: impl Into<String>) -> Self {
        self.state = DocumentState::Failed {
            stage,
            reason: reason.into(),
        };
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub collection: String,
    pub documents_total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chunks_created: usize,
    pub vectors_stored: usize,
    pub embedding_failures: usize,
    pub documents: Vec<DocumentReport>,
    pub duration_ms: u64,
}

impl RunSummary {
    fn add(&mut self, report: DocumentReport) {
        match report.state {
            DocumentState::Stored => self.succeeded += 1,
            DocumentState::Skipped { .. } => self.skipped += 1,
            DocumentState::Failed { .. } => self.failed += 1,
            _ => {}
        }
        self.chunks_created += report.chunks;
        self.vectors_stored += report.vectors_stored;
        self.embedding_failures += report.errors.len();
        self.documents.push(report);
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: IngestMode,
    pub distance: DistanceMetric,
    /// Drop and recreate the collection before the run.
    pub recreate: bool,
    pub progress: ProgressBar,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: IngestMode::default(),
            distance: DistanceMetric::default(),
            recreate: false,
            progress: ProgressBar::hidden(),
        }
    }
}

/// Long-lived resources shared by every run.
pub struct PipelineContext {
    pub embedder: BatchEmbedder,
    pub store: Arc<dyn VectorStore>,
    pub chunker: TextChunker,
    pub checkpoint: Option<Checkpoint>,
}

impl PipelineContext {
    /// Build every component from configuration. `checkpoint` opens the
    /// resume ledger.
    pub fn from_config(config: &Config, checkpoint: bool) -> Result<Self, AppError> {
        let embedder = BatchEmbedder::from_config(create_embedder(&config.embedding)?, &config.embedding);
        let store = create_backend(&config.vector_store)?;
        let chunker = TextChunker::new(&config.chunking)?;
        let checkpoint = match config.pipeline.checkpoint_path_or_default() {
            Some(path) if checkpoint => Some(Checkpoint::open(&path)?),
            _ => None,
        };

        Ok(Self {
            embedder,
            store,
            chunker,
            checkpoint,
        })
    }
}

/// Errors after which the run cannot continue.
fn is_fatal_store_error(e: &VectorStoreError) -> bool {
    matches!(e, VectorStoreError::ConnectionError(_)) || e.is_config_error()
}

pub struct Pipeline {
    context: PipelineContext,
}

impl Pipeline {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Ingest `documents` into `collection`.
    ///
    /// Per-document problems end up in the summary; only fatal errors are
    /// returned as `Err`.
    pub async fn run(
        &self,
        documents: Vec<DocumentInput>,
        collection: &str,
        options: &RunOptions,
    ) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        let ctx = &self.context;
        let dimension = ctx.embedder.dimension() as u64;

        if options.recreate {
            ctx.store
                .recreate_collection(collection, dimension, options.distance)
                .await?;
            if let Some(ledger) = &ctx.checkpoint {
                ledger.forget_collection(collection)?;
            }
        } else {
            ctx.store
                .ensure_collection(collection, dimension, options.distance)
                .await?;
        }

        info!(
            collection,
            documents = documents.len(),
            mode = %options.mode,
            model = ctx.embedder.model_id(),
            "starting ingestion"
        );

        let mut summary = RunSummary {
            collection: collection.to_string(),
            documents_total: documents.len(),
            ..Default::default()
        };
        options.progress.set_length(documents.len() as u64);

        for input in documents {
            options.progress.set_message(input.source_id().to_string());
            let report = self.process(input, collection, options.mode).await?;
            match &report.state {
                DocumentState::Failed { stage, reason } => {
                    error!(source = %report.source_id, %stage, %reason, "document failed");
                }
                DocumentState::Skipped { reason } => {
                    info!(source = %report.source_id, %reason, "document skipped");
                }
                _ => info!(
                    source = %report.source_id,
                    chunks = report.chunks,
                    vectors = report.vectors_stored,
                    "document stored"
                ),
            }
            summary.add(report);
            options.progress.inc(1);
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        options.progress.finish_and_clear();
        info!(
            collection,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            vectors = summary.vectors_stored,
            duration_ms = summary.duration_ms,
            "ingestion finished"
        );
        Ok(summary)
    }

    async fn process(
        &self,
        input: DocumentInput,
        collection: &str,
        mode: IngestMode,
    ) -> Result<DocumentReport, PipelineError> {
        let ctx = &self.context;
        let document = match input {
            DocumentInput::Loaded(document) => document,
            DocumentInput::Unreadable { source_id, reason } => {
                return Ok(DocumentReport::new(&source_id).failed(Stage::Load, reason));
            }
        };
        let mut report = DocumentReport::new(&document.source_id);

        if let Some(ledger) = &ctx.checkpoint
            && ledger.is_current(collection, &document.source_id, &document.checksum)?
        {
            return Ok(report.skipped("unchanged since last run"));
        }

        if mode == IngestMode::Skip {
            match ctx.store.source_exists(collection, &document.source_id).await {
                Ok(true) => return Ok(report.skipped("already in collection")),
                Ok(false) => {}
                Err(e) if is_fatal_store_error(&e) => return Err(e.into()),
                Err(e) => return Ok(report.failed(Stage::Store, e.to_string())),
            }
        }

        let chunks = ctx.chunker.chunk(&document, collection);
        if chunks.is_empty() {
            return Ok(report.skipped("nothing to ingest"));
        }
        report.chunks = chunks.len();
        report.state = DocumentState::Chunked;
        let oversized = chunks.iter().filter(|c| c.oversized).count();
        if oversized > 0 {
            report
                .warnings
                .push(format!("{} chunk(s) exceed the token budget", oversized));
        }

        let file = ChunkFile::from_chunks(&document, &chunks);
        let texts: Vec<String> = file.chunks.iter().map(|c| c.text.clone()).collect();
        let outcomes = ctx.embedder.embed_all(&texts).await?;

        let indexed_at = Utc::now().to_rfc3339();
        let mut points: Vec<StoredPoint> = Vec::with_capacity(outcomes.len());
        for (record, outcome) in file.chunks.iter().zip(outcomes) {
            match outcome {
                EmbedOutcome::Embedded(vector) => points.push(
                    EmbeddingRecord::from_chunk(
                        &file,
                        record,
                        collection,
                        vector,
                        ctx.embedder.model_id(),
                    )
                    .into_point(&indexed_at),
                ),
                EmbedOutcome::Empty => report
                    .warnings
                    .push(format!("chunk {} is empty, skipped", record.index)),
                EmbedOutcome::Failed { reason } => {
                    warn!(
                        source = %document.source_id,
                        chunk = record.index,
                        %reason,
                        "chunk failed to embed"
                    );
                    report.errors.push(ChunkFailure {
                        index: record.index,
                        preview: preview(&record.text, PREVIEW_CHARS),
                        reason,
                    });
                }
            }
        }

        if points.is_empty() {
            let reason = format!("all {} chunks failed to embed", report.chunks);
            return Ok(report.failed(Stage::Embed, reason));
        }
        report.state = DocumentState::Embedded;

        if mode == IngestMode::Replace {
            match ctx.store.delete_by_source(collection, &document.source_id).await {
                Ok(()) => debug!(source = %document.source_id, "removed previous points"),
                Err(e) if is_fatal_store_error(&e) => return Err(e.into()),
                Err(e) => return Ok(report.failed(Stage::Store, e.to_string())),
            }
        }

        report.vectors_stored = ctx.store.upsert(collection, points).await?;
        report.state = DocumentState::Stored;

        if let Some(ledger) = &ctx.checkpoint
            && report.errors.is_empty()
        {
            ledger.record(
                collection,
                &document.source_id,
                &document.checksum,
                report.chunks,
                report.vectors_stored,
            )?;
        }

        Ok(report)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadSummary {
    pub collection: String,
    pub records: usize,
    pub sources: usize,
    pub skipped_sources: usize,
    pub points_stored: usize,
    pub duration_ms: u64,
}

/// Store pre-computed embeddings. The collection is created from the first
/// record's vector length when absent.
pub async fn upload_records(
    store: &dyn VectorStore,
    collection: &str,
    records: Vec<EmbeddingRecord>,
    options: &RunOptions,
) -> Result<UploadSummary, PipelineError> {
    let start = Instant::now();
    let mut summary = UploadSummary {
        collection: collection.to_string(),
        records: records.len(),
        ..Default::default()
    };
    let Some(first) = records.first() else {
        return Ok(summary);
    };
    let dimension = first.embedding.len() as u64;

    if options.recreate {
        store
            .recreate_collection(collection, dimension, options.distance)
            .await?;
    } else {
        store
            .ensure_collection(collection, dimension, options.distance)
            .await?;
    }

    let sources: BTreeSet<String> = records
        .iter()
        .map(|r| r.source().unwrap_or("unknown").to_string())
        .collect();
    summary.sources = sources.len();

    let mut skip: BTreeSet<String> = BTreeSet::new();
    for source in &sources {
        match options.mode {
            IngestMode::Skip => {
                if store.source_exists(collection, source).await? {
                    skip.insert(source.clone());
                }
            }
            IngestMode::Replace => store.delete_by_source(collection, source).await?,
            IngestMode::Upsert => {}
        }
    }
    summary.skipped_sources = skip.len();

    let indexed_at = Utc::now().to_rfc3339();
    let points: Vec<StoredPoint> = records
        .into_iter()
        .filter(|r| !skip.contains(r.source().unwrap_or("unknown")))
        .map(|mut record| {
            record.collection = collection.to_string();
            record.into_point(&indexed_at)
        })
        .collect();

    options.progress.set_length(points.len() as u64);
    summary.points_stored = store.upsert(collection, points).await?;
    options.progress.finish_and_clear();

    summary.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        collection,
        points = summary.points_stored,
        skipped_sources = summary.skipped_sources,
        "upload finished"
    );
    Ok(summary)
}

/// Embed a query and return the nearest stored chunks.
pub async fn search(
    embedder: &BatchEmbedder,
    store: &dyn VectorStore,
    query: &SearchQuery,
) -> Result<SearchResults, PipelineError> {
    let start = Instant::now();

    if store.collection_info(&query.collection).await?.is_none() {
        return Err(VectorStoreError::CollectionNotFound(query.collection.clone()).into());
    }

    let vector = embedder.embed_query(&query.query).await?;
    let hits = store
        .search(&query.collection, vector, query.limit as u64, query.min_score)
        .await?;

    Ok(SearchResults {
        query: query.query.clone(),
        collection: query.collection.clone(),
        results: hits.into_iter().map(SearchResult::from).collect(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}
