use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{CollectionInfo, OutputFormat, SearchResults};
use crate::services::{CheckpointStats, DocumentState, RunSummary, UploadSummary};
use crate::utils::preview;

const RESULT_PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_run_summary(&self, summary: &RunSummary) -> String;
    fn format_upload_summary(&self, summary: &UploadSummary) -> String;
    fn format_chunk_stats(&self, stats: &ChunkStats) -> String;
    fn format_embed_stats(&self, stats: &EmbedStats) -> String;
    fn format_collection(&self, info: &CollectionInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_backend: String,
    pub embedding_model: String,
    pub embedding_endpoint: String,
    pub embedding_dimension: u32,
    pub embedding_ready: bool,
    pub embedding_error: Option<String>,
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub collection: String,
    pub collection_info: Option<CollectionInfo>,
    pub checkpoint: Option<CheckpointStats>,
}

/// Result of the `chunk` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkStats {
    pub files_scanned: usize,
    pub files_chunked: usize,
    pub files_failed: usize,
    pub chunks_created: usize,
    pub output_dir: String,
    pub duration_ms: u64,
}

/// Result of the `embed` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbedStats {
    pub chunk_files: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub empty: usize,
    pub failed: usize,
    pub output: String,
    pub duration_ms: u64,
}

fn document_state_label(state: &DocumentState) -> String {
    match state {
        DocumentState::Skipped { reason } => format!("skipped ({})", reason),
        DocumentState::Failed { stage, reason } => format!("failed at {}: {}", stage, reason),
        DocumentState::Stored => "stored".to_string(),
        DocumentState::Embedded => "embedded".to_string(),
        DocumentState::Chunked => "chunked".to_string(),
        DocumentState::Pending => "pending".to_string(),
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        let _ = writeln!(output, "Search results for: \"{}\"", results.query);
        let _ = writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        );

        for (i, result) in results.results.iter().enumerate() {
            let _ = writeln!(output, "{}. [Score: {:.3}]", i + 1, result.score);
            let _ = writeln!(output, "   Source: {}", result.source);
            if let Some(ref title) = result.title {
                let _ = writeln!(output, "   Title: {}", title);
            }
            if !result.headings.is_empty() {
                let _ = writeln!(output, "   Section: {}", result.headings.join(" > "));
            }
            let _ = writeln!(output, "   ---");

            let mut snippet: String = result.text.chars().take(RESULT_PREVIEW_CHARS).collect();
            if result.text.chars().count() > RESULT_PREVIEW_CHARS {
                snippet.push_str("...");
            }
            for line in snippet.lines() {
                let _ = writeln!(output, "   {}", line);
            }
            let _ = writeln!(output);
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Status");
        let _ = writeln!(output, "------");

        let embed_status = if status.embedding_ready {
            "[READY]"
        } else {
            "[UNAVAILABLE]"
        };
        let _ = writeln!(
            output,
            "Embedding:     {} ({})",
            status.embedding_backend, embed_status
        );
        let _ = writeln!(output, "  Model:       {}", status.embedding_model);
        let _ = writeln!(output, "  Endpoint:    {}", status.embedding_endpoint);
        let _ = writeln!(output, "  Dimension:   {}", status.embedding_dimension);
        if let Some(ref err) = status.embedding_error {
            let _ = writeln!(output, "  Error:       {}", err);
        }
        let _ = writeln!(output);

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        let _ = writeln!(
            output,
            "Vector Store:  {} ({})",
            status.vector_store_driver, vector_status
        );
        let _ = writeln!(output, "  URL:         {}", status.vector_store_url);
        let _ = writeln!(output, "  Collection:  {}", status.collection);
        match status.collection_info {
            Some(ref info) => {
                let _ = writeln!(output, "  Points:      {}", info.points_count);
                let _ = writeln!(
                    output,
                    "  Vectors:     {} ({})",
                    info.vector_size, info.distance
                );
            }
            None if status.vector_store_connected => {
                let _ = writeln!(output, "  (collection does not exist yet)");
            }
            None => {}
        }

        if let Some(ref cp) = status.checkpoint {
            let _ = writeln!(output);
            let _ = writeln!(output, "Checkpoint:");
            let _ = writeln!(output, "  Documents:   {}", cp.documents);
            let _ = writeln!(output, "  Vectors:     {}", cp.vectors);
            if let Some(ref at) = cp.last_stored_at {
                let _ = writeln!(output, "  Last run:    {}", at);
            }
        }

        output
    }

    fn format_run_summary(&self, summary: &RunSummary) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Ingestion Complete");
        let _ = writeln!(output, "------------------");
        let _ = writeln!(output, "Collection: {}", summary.collection);
        let _ = writeln!(output, "Documents: {}", summary.documents_total);
        let _ = writeln!(output, "  Stored:  {}", summary.succeeded);
        let _ = writeln!(output, "  Skipped: {}", summary.skipped);
        let _ = writeln!(output, "  Failed:  {}", summary.failed);
        let _ = writeln!(output, "Chunks created: {}", summary.chunks_created);
        let _ = writeln!(output, "Vectors stored: {}", summary.vectors_stored);
        if summary.embedding_failures > 0 {
            let _ = writeln!(output, "Embedding failures: {}", summary.embedding_failures);
        }
        let _ = writeln!(output, "Duration: {}ms", summary.duration_ms);

        let problems: Vec<_> = summary
            .documents
            .iter()
            .filter(|d| {
                matches!(d.state, DocumentState::Failed { .. })
                    || !d.errors.is_empty()
                    || !d.warnings.is_empty()
            })
            .collect();
        if !problems.is_empty() {
            let _ = writeln!(output, "\nDiagnostics:");
            for doc in problems {
                let _ = writeln!(
                    output,
                    "  {}: {}",
                    doc.source_id,
                    document_state_label(&doc.state)
                );
                for warning in &doc.warnings {
                    let _ = writeln!(output, "    warning: {}", warning);
                }
                for failure in &doc.errors {
                    let _ = writeln!(
                        output,
                        "    chunk {}: {} [{}]",
                        failure.index, failure.reason, failure.preview
                    );
                }
            }
        }
        output
    }

    fn format_upload_summary(&self, summary: &UploadSummary) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Upload Complete");
        let _ = writeln!(output, "---------------");
        let _ = writeln!(output, "Collection: {}", summary.collection);
        let _ = writeln!(output, "Records read: {}", summary.records);
        let _ = writeln!(output, "Sources: {}", summary.sources);
        if summary.skipped_sources > 0 {
            let _ = writeln!(output, "Sources skipped: {}", summary.skipped_sources);
        }
        let _ = writeln!(output, "Points stored: {}", summary.points_stored);
        let _ = writeln!(output, "Duration: {}ms", summary.duration_ms);
        output
    }

    fn format_chunk_stats(&self, stats: &ChunkStats) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Chunking Complete");
        let _ = writeln!(output, "-----------------");
        let _ = writeln!(output, "Files scanned: {}", stats.files_scanned);
        let _ = writeln!(output, "Files chunked: {}", stats.files_chunked);
        let _ = writeln!(output, "Files failed: {}", stats.files_failed);
        let _ = writeln!(output, "Chunks created: {}", stats.chunks_created);
        let _ = writeln!(output, "Output: {}", stats.output_dir);
        let _ = writeln!(output, "Duration: {}ms", stats.duration_ms);
        output
    }

    fn format_embed_stats(&self, stats: &EmbedStats) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Embedding Complete");
        let _ = writeln!(output, "------------------");
        let _ = writeln!(output, "Chunk files: {}", stats.chunk_files);
        let _ = writeln!(output, "Chunks: {}", stats.chunks);
        let _ = writeln!(output, "Embedded: {}", stats.embedded);
        if stats.empty > 0 {
            let _ = writeln!(output, "Empty: {}", stats.empty);
        }
        if stats.failed > 0 {
            let _ = writeln!(output, "Failed: {}", stats.failed);
        }
        let _ = writeln!(output, "Output: {}", stats.output);
        let _ = writeln!(output, "Duration: {}ms", stats.duration_ms);
        output
    }

    fn format_collection(&self, info: &CollectionInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Collection: {}", info.name);
        let _ = writeln!(output, "  Vector size: {}", info.vector_size);
        let _ = writeln!(output, "  Distance:    {}", info.distance);
        let _ = writeln!(output, "  Points:      {}", info.points_count);
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        match rendered {
            Ok(json) => format!("{}\n", json),
            Err(e) => format!("{}\n", serde_json::json!({ "error": e.to_string() })),
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        self.render(results)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_run_summary(&self, summary: &RunSummary) -> String {
        self.render(summary)
    }

    fn format_upload_summary(&self, summary: &UploadSummary) -> String {
        self.render(summary)
    }

    fn format_chunk_stats(&self, stats: &ChunkStats) -> String {
        self.render(stats)
    }

    fn format_embed_stats(&self, stats: &EmbedStats) -> String {
        self.render(stats)
    }

    fn format_collection(&self, info: &CollectionInfo) -> String {
        self.render(info)
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", serde_json::json!({ "message": message }))
    }

    fn format_error(&self, error: &str) -> String {
        format!("{}\n", serde_json::json!({ "error": error }))
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("## No results found\n\nQuery: `{}`\n", results.query);
        }

        let mut output = String::new();
        let _ = writeln!(output, "## Search Results\n");
        let _ = writeln!(output, "**Query:** `{}`\n", results.query);
        let _ = writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        );

        for (i, result) in results.results.iter().enumerate() {
            let _ = writeln!(output, "### {}. Score: {:.3}\n", i + 1, result.score);
            let _ = writeln!(output, "**Source:** `{}`\n", result.source);
            if !result.headings.is_empty() {
                let _ = writeln!(output, "**Section:** {}\n", result.headings.join(" > "));
            }
            let _ = writeln!(output, "```");
            let _ = writeln!(output, "{}", result.text);
            let _ = writeln!(output, "```\n");
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Status\n");

        let embed_status = if status.embedding_ready { "✅" } else { "❌" };
        let _ = writeln!(
            output,
            "### Embedding ({}) {}\n",
            status.embedding_backend, embed_status
        );
        let _ = writeln!(output, "- **Model:** {}", status.embedding_model);
        let _ = writeln!(output, "- **Endpoint:** `{}`", status.embedding_endpoint);
        let _ = writeln!(output, "- **Dimension:** {}", status.embedding_dimension);
        if let Some(ref err) = status.embedding_error {
            let _ = writeln!(output, "- **Error:** {}", err);
        }
        let _ = writeln!(output);

        let vector_status = if status.vector_store_connected {
            "✅"
        } else {
            "❌"
        };
        let _ = writeln!(
            output,
            "### Vector Store ({}) {}\n",
            status.vector_store_driver, vector_status
        );
        let _ = writeln!(output, "- **URL:** `{}`", status.vector_store_url);
        let _ = writeln!(output, "- **Collection:** {}", status.collection);
        if let Some(ref info) = status.collection_info {
            let _ = writeln!(output, "- **Points:** {}", info.points_count);
            let _ = writeln!(
                output,
                "- **Vectors:** {} ({})",
                info.vector_size, info.distance
            );
        }

        if let Some(ref cp) = status.checkpoint {
            let _ = writeln!(output, "\n### Checkpoint\n");
            let _ = writeln!(output, "- **Documents:** {}", cp.documents);
            let _ = writeln!(output, "- **Vectors:** {}", cp.vectors);
        }

        output
    }

    fn format_run_summary(&self, summary: &RunSummary) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Ingestion Complete\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Collection | `{}` |", summary.collection);
        let _ = writeln!(output, "| Documents | {} |", summary.documents_total);
        let _ = writeln!(output, "| Stored | {} |", summary.succeeded);
        let _ = writeln!(output, "| Skipped | {} |", summary.skipped);
        let _ = writeln!(output, "| Failed | {} |", summary.failed);
        let _ = writeln!(output, "| Chunks created | {} |", summary.chunks_created);
        let _ = writeln!(output, "| Vectors stored | {} |", summary.vectors_stored);
        let _ = writeln!(
            output,
            "| Embedding failures | {} |",
            summary.embedding_failures
        );
        let _ = writeln!(output, "| Duration | {}ms |", summary.duration_ms);

        let failed: Vec<_> = summary
            .documents
            .iter()
            .filter(|d| matches!(d.state, DocumentState::Failed { .. }) || !d.errors.is_empty())
            .collect();
        if !failed.is_empty() {
            let _ = writeln!(output, "\n### Problems\n");
            for doc in failed {
                let _ = writeln!(
                    output,
                    "- `{}`: {}",
                    doc.source_id,
                    document_state_label(&doc.state)
                );
                for failure in &doc.errors {
                    let _ = writeln!(
                        output,
                        "  - chunk {}: {} (`{}`)",
                        failure.index,
                        failure.reason,
                        preview(&failure.preview, 60)
                    );
                }
            }
        }
        output
    }

    fn format_upload_summary(&self, summary: &UploadSummary) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Upload Complete\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Collection | `{}` |", summary.collection);
        let _ = writeln!(output, "| Records read | {} |", summary.records);
        let _ = writeln!(output, "| Sources | {} |", summary.sources);
        let _ = writeln!(output, "| Sources skipped | {} |", summary.skipped_sources);
        let _ = writeln!(output, "| Points stored | {} |", summary.points_stored);
        let _ = writeln!(output, "| Duration | {}ms |", summary.duration_ms);
        output
    }

    fn format_chunk_stats(&self, stats: &ChunkStats) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Chunking Complete\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Files scanned | {} |", stats.files_scanned);
        let _ = writeln!(output, "| Files chunked | {} |", stats.files_chunked);
        let _ = writeln!(output, "| Files failed | {} |", stats.files_failed);
        let _ = writeln!(output, "| Chunks created | {} |", stats.chunks_created);
        let _ = writeln!(output, "| Output | `{}` |", stats.output_dir);
        let _ = writeln!(output, "| Duration | {}ms |", stats.duration_ms);
        output
    }

    fn format_embed_stats(&self, stats: &EmbedStats) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Embedding Complete\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Chunk files | {} |", stats.chunk_files);
        let _ = writeln!(output, "| Chunks | {} |", stats.chunks);
        let _ = writeln!(output, "| Embedded | {} |", stats.embedded);
        let _ = writeln!(output, "| Empty | {} |", stats.empty);
        let _ = writeln!(output, "| Failed | {} |", stats.failed);
        let _ = writeln!(output, "| Output | `{}` |", stats.output);
        let _ = writeln!(output, "| Duration | {}ms |", stats.duration_ms);
        output
    }

    fn format_collection(&self, info: &CollectionInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Collection `{}`\n", info.name);
        let _ = writeln!(output, "- **Vector size:** {}", info.vector_size);
        let _ = writeln!(output, "- **Distance:** {}", info.distance);
        let _ = writeln!(output, "- **Points:** {}", info.points_count);
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DistanceMetric, SearchResult};
    use crate::services::{ChunkFailure, DocumentReport, Stage};

    fn results() -> SearchResults {
        SearchResults {
            query: "retry policy".to_string(),
            collection: "docs".to_string(),
            results: vec![SearchResult {
                point_id: 7,
                chunk_id: Some("docs:a.md:chunk:0".to_string()),
                score: 0.91234,
                text: "Retries use exponential backoff.".to_string(),
                source: "a.md".to_string(),
                title: Some("A".to_string()),
                chunk_index: Some(0),
                headings: vec!["Guide".to_string(), "Retries".to_string()],
            }],
            duration_ms: 12,
        }
    }

    #[test]
    fn test_text_search_results() {
        let out = TextFormatter.format_search_results(&results());
        assert!(out.contains("1. [Score: 0.912]"));
        assert!(out.contains("Source: a.md"));
        assert!(out.contains("Section: Guide > Retries"));
    }

    #[test]
    fn test_json_search_results_is_valid_json() {
        let out = JsonFormatter::new(false).format_search_results(&results());
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["results"][0]["source"], "a.md");
    }

    #[test]
    fn test_run_summary_lists_failures() {
        let summary = RunSummary {
            collection: "docs".to_string(),
            documents_total: 1,
            failed: 1,
            documents: vec![DocumentReport {
                source_id: "bad.pdf".to_string(),
                state: DocumentState::Failed {
                    stage: Stage::Load,
                    reason: "corrupt".to_string(),
                },
                chunks: 0,
                vectors_stored: 0,
                warnings: vec![],
                errors: vec![ChunkFailure {
                    index: 2,
                    preview: "some text".to_string(),
                    reason: "nan".to_string(),
                }],
            }],
            ..Default::default()
        };
        let text = TextFormatter.format_run_summary(&summary);
        assert!(text.contains("bad.pdf: failed at load: corrupt"));
        assert!(text.contains("chunk 2: nan [some text]"));

        let md = MarkdownFormatter.format_run_summary(&summary);
        assert!(md.contains("### Problems"));
    }

    #[test]
    fn test_collection_formats() {
        let info = CollectionInfo {
            name: "docs".to_string(),
            vector_size: 768,
            distance: DistanceMetric::Cosine,
            points_count: 3,
        };
        assert!(TextFormatter.format_collection(&info).contains("Vector size: 768"));
        let json = JsonFormatter::new(true).format_collection(&info);
        assert!(json.contains("\"distance\": \"cosine\""));
    }
}
