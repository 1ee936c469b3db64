//! Document chunking: structure-aware packing with a sliding-window fallback.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use super::tokens::{HeuristicCounter, TokenCounter, TokenizerCounter};
use crate::error::ChunkError;
use crate::models::{
    Chunk, ChunkMetadata, ChunkMode, ChunkStrategy, ChunkingConfig, Document, DocumentFormat,
};

static RE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.*\S)[ \t]*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    Heading,
    Paragraph,
    Code,
    Table,
}

/// A structural block. Units tile the text: each one owns its trailing blank lines.
#[derive(Debug, Clone)]
struct Unit {
    kind: UnitKind,
    start: usize,
    end: usize,
    heading: Option<(usize, String)>,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    oversized: bool,
}

impl Span {
    fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            oversized: false,
        }
    }

    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Final chunk boundaries; `start` already includes the overlap.
#[derive(Debug, Clone)]
struct Piece {
    start: usize,
    end: usize,
    overlap: usize,
    oversized: bool,
    headings: Vec<String>,
}

/// Splits documents into ordered chunks.
#[derive(Clone)]
pub struct TextChunker {
    config: ChunkingConfig,
    counter: Arc<dyn TokenCounter>,
}

impl fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextChunker")
            .field("config", &self.config)
            .field("counter", &self.counter.name())
            .finish()
    }
}

impl TextChunker {
    /// Create a chunker; loads `tokenizer_path` when configured.
    pub fn new(config: &ChunkingConfig) -> Result<Self, ChunkError> {
        let counter: Arc<dyn TokenCounter> = match &config.tokenizer_path {
            Some(path) => Arc::new(TokenizerCounter::from_file(path)?),
            None => Arc::new(HeuristicCounter::new(config.chars_per_token)),
        };
        Self::with_counter(config, counter)
    }

    pub fn with_counter(
        config: &ChunkingConfig,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self, ChunkError> {
        config
            .validate()
            .map_err(|e| ChunkError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            config: config.clone(),
            counter,
        })
    }

    /// Create a chunker with default settings.
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkingConfig::default(),
            counter: Arc::new(HeuristicCounter::default()),
        }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn counter_name(&self) -> &str {
        self.counter.name()
    }

    /// Boundary mode used for `document`.
    pub fn mode_for(&self, document: &Document) -> ChunkMode {
        match self.config.strategy {
            ChunkStrategy::Window => ChunkMode::Window,
            ChunkStrategy::Structured => ChunkMode::Structured,
            ChunkStrategy::Auto => {
                if document.format == DocumentFormat::Markdown || document.content.contains("\n\n")
                {
                    ChunkMode::Structured
                } else {
                    ChunkMode::Window
                }
            }
        }
    }

    /// Chunk a document. Blank documents yield no chunks.
    pub fn chunk(&self, document: &Document, collection: &str) -> Vec<Chunk> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = document.content.chars().collect();
        let mode = self.mode_for(document);
        let pieces = match mode {
            ChunkMode::Window => self.window_pieces(chars.len()),
            ChunkMode::Structured => self.structured_pieces(&chars),
        };

        let created_at = chrono::Utc::now().to_rfc3339();
        let total_chunks = pieces.len() as u32;

        debug!(
            source = %document.source_id,
            mode = %mode,
            chunks = total_chunks,
            "chunked document"
        );

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| {
                let content: String = chars[piece.start..piece.end].iter().collect();
                Chunk {
                    index: index as u32,
                    char_count: (piece.end - piece.start) as u32,
                    token_count: self.counter.count(&content) as u32,
                    start_offset: piece.start,
                    end_offset: piece.end,
                    overlap: piece.overlap as u32,
                    oversized: piece.oversized,
                    metadata: ChunkMetadata {
                        source: document.source_id.clone(),
                        title: document.title.clone(),
                        headings: piece.headings,
                        subfolder: document.subfolder.clone(),
                        collection: collection.to_string(),
                        total_chunks,
                        strategy: mode,
                        created_at: created_at.clone(),
                    },
                    content,
                }
            })
            .collect()
    }

    /// Fixed windows of `max_tokens * chars_per_token` chars, each starting
    /// `overlap` chars before the previous one ends.
    fn window_pieces(&self, total: usize) -> Vec<Piece> {
        let size = self.config.window_chars().max(1);
        let overlap = match self.config.overlap as usize {
            o if o >= size => 0,
            o => o,
        };

        let mut pieces = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + size).min(total);
            pieces.push(Piece {
                start,
                end,
                overlap: if pieces.is_empty() { 0 } else { overlap },
                oversized: false,
                headings: Vec::new(),
            });
            if end >= total {
                break;
            }
            start = end - overlap;
        }
        pieces
    }

    fn structured_pieces(&self, chars: &[char]) -> Vec<Piece> {
        let units = split_units(chars);
        let heading_paths = heading_paths(&units);
        let spans = self.pack(chars, &units);
        let spans = self.merge_small(chars, spans);

        let overlap = self.config.overlap as usize;
        let mut previous_len = 0;
        spans
            .into_iter()
            .enumerate()
            .map(|(i, span)| {
                let extend = if i == 0 {
                    0
                } else {
                    self.fit_overlap(chars, &span, overlap.min(previous_len))
                };
                previous_len = span.len();
                let unit = units
                    .partition_point(|u| u.start <= span.start)
                    .saturating_sub(1);
                Piece {
                    start: span.start - extend,
                    end: span.end,
                    overlap: extend,
                    oversized: span.oversized,
                    headings: heading_paths.get(unit).cloned().unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Largest backward extension of at most `wanted` chars that keeps `span`
    /// within `max_tokens`. Oversized spans keep the full extension.
    fn fit_overlap(&self, chars: &[char], span: &Span, wanted: usize) -> usize {
        let max = self.config.max_tokens as usize;
        if span.oversized || self.count(chars, span.start - wanted, span.end) <= max {
            return wanted;
        }

        let (mut low, mut high) = (0, wanted);
        while low < high {
            let mid = (low + high).div_ceil(2);
            if self.count(chars, span.start - mid, span.end) <= max {
                low = mid;
            } else {
                high = mid - 1;
            }
        }
        low
    }

    /// Greedy packing of units under `max_tokens`. A trailing run of headings
    /// is carried into the next chunk instead of closing the current one.
    fn pack(&self, chars: &[char], units: &[Unit]) -> Vec<Span> {
        let max = self.config.max_tokens as usize;
        let mut spans = Vec::new();
        let mut current: Option<(usize, usize)> = None;
        let mut heading_tail: Option<usize> = None;

        for unit in units {
            if self.count(chars, unit.start, unit.end) > max {
                let lead = match (current, heading_tail) {
                    (Some((start, _)), Some(tail)) => {
                        if tail > start {
                            spans.push(Span::new(start, tail));
                        }
                        tail
                    }
                    (Some((start, end)), None) => {
                        spans.push(Span::new(start, end));
                        unit.start
                    }
                    (None, _) => unit.start,
                };
                heading_tail = None;

                match unit.kind {
                    UnitKind::Code | UnitKind::Table => {
                        spans.push(Span {
                            start: lead,
                            end: unit.end,
                            oversized: true,
                        });
                        current = None;
                    }
                    UnitKind::Paragraph | UnitKind::Heading => {
                        let mut pieces = self.hard_split(chars, lead, unit.end);
                        current = pieces.pop().map(|last| (last.start, last.end));
                        spans.extend(pieces);
                    }
                }
                continue;
            }

            current = match current {
                None => Some((unit.start, unit.end)),
                Some((start, _)) if self.count(chars, start, unit.end) <= max => {
                    Some((start, unit.end))
                }
                Some((start, end)) => match heading_tail {
                    Some(tail) if tail > start => {
                        spans.push(Span::new(start, tail));
                        Some((tail, unit.end))
                    }
                    // Only headings so far: keep them with this unit.
                    Some(_) => Some((start, unit.end)),
                    None => {
                        spans.push(Span::new(start, end));
                        Some((unit.start, unit.end))
                    }
                },
            };

            heading_tail = if unit.kind == UnitKind::Heading {
                heading_tail.or(Some(unit.start))
            } else {
                None
            };
        }

        if let Some((start, end)) = current {
            spans.push(Span::new(start, end));
        }
        spans
    }

    /// Split an oversized prose run into window-sized spans, preferring
    /// natural break points.
    fn hard_split(&self, chars: &[char], start: usize, end: usize) -> Vec<Span> {
        let window = self.config.window_chars().max(1);
        let mut spans = Vec::new();
        let mut position = start;

        while position < end {
            let target = (position + window).min(end);
            let cut = if target >= end {
                end
            } else {
                find_break_point(chars, position, target, window)
            };
            spans.push(Span::new(position, cut));
            position = cut;
        }
        spans
    }

    /// Merge non-final spans shorter than `min_chunk_size` into a neighbour.
    fn merge_small(&self, chars: &[char], mut spans: Vec<Span>) -> Vec<Span> {
        let min = self.config.min_chunk_size as usize;
        let max = self.config.max_tokens as usize;

        let mut i = 0;
        while i + 1 < spans.len() {
            if spans[i].len() >= min {
                i += 1;
                continue;
            }

            let small = spans.remove(i);
            if i > 0 && self.count(chars, spans[i - 1].start, small.end) <= max {
                spans[i - 1].end = small.end;
                spans[i - 1].oversized |= small.oversized;
            } else {
                spans[i].start = small.start;
                spans[i].oversized |= small.oversized;
            }
        }

        for span in &mut spans {
            if !span.oversized && self.count(chars, span.start, span.end) > max {
                span.oversized = true;
            }
        }
        spans
    }

    fn count(&self, chars: &[char], start: usize, end: usize) -> usize {
        let text: String = chars[start..end].iter().collect();
        self.counter.count(&text)
    }
}

/// Break units on line boundaries into headings, fenced code, tables and paragraphs.
fn split_units(chars: &[char]) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    let mut open_block = false;
    let mut fence: Option<(char, usize)> = None;
    let mut leading_start: Option<usize> = None;

    for (line_start, line_end) in line_spans(chars) {
        let line: String = chars[line_start..line_end].iter().collect();
        let trimmed = line.trim();

        if let Some((marker, width)) = fence {
            if let Some(last) = units.last_mut() {
                last.end = line_end;
            }
            if is_fence_close(trimmed, marker, width) {
                fence = None;
            }
            continue;
        }

        if trimmed.is_empty() {
            match units.last_mut() {
                Some(last) => {
                    last.end = line_end;
                    open_block = false;
                }
                None => {
                    leading_start.get_or_insert(line_start);
                }
            }
            continue;
        }

        let start = if units.is_empty() {
            leading_start.unwrap_or(line_start)
        } else {
            line_start
        };

        if let Some(opened) = fence_open(trimmed) {
            units.push(Unit {
                kind: UnitKind::Code,
                start,
                end: line_end,
                heading: None,
            });
            fence = Some(opened);
            open_block = false;
            continue;
        }

        if let Some(caps) = RE_HEADING.captures(line.trim_end()) {
            units.push(Unit {
                kind: UnitKind::Heading,
                start,
                end: line_end,
                heading: Some((caps[1].len(), caps[2].trim().to_string())),
            });
            open_block = false;
            continue;
        }

        let kind = if trimmed.starts_with('|') {
            UnitKind::Table
        } else {
            UnitKind::Paragraph
        };
        match units.last_mut() {
            Some(last) if open_block && last.kind == kind => last.end = line_end,
            _ => units.push(Unit {
                kind,
                start,
                end: line_end,
                heading: None,
            }),
        }
        open_block = true;
    }

    units
}

/// Heading path in effect after each unit.
fn heading_paths(units: &[Unit]) -> Vec<Vec<String>> {
    let mut stack: Vec<(usize, String)> = Vec::new();
    units
        .iter()
        .map(|unit| {
            if let Some((level, text)) = &unit.heading {
                while stack.last().is_some_and(|(l, _)| l >= level) {
                    stack.pop();
                }
                stack.push((*level, text.clone()));
            }
            stack.iter().map(|(_, text)| text.clone()).collect()
        })
        .collect()
}

/// Line spans in chars; each span includes its `\n`.
fn line_spans(chars: &[char]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, c) in chars.iter().enumerate() {
        if *c == '\n' {
            spans.push((start, i + 1));
            start = i + 1;
        }
    }
    if start < chars.len() {
        spans.push((start, chars.len()));
    }
    spans
}

fn fence_open(trimmed: &str) -> Option<(char, usize)> {
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let width = trimmed.chars().take_while(|c| *c == marker).count();
    if width < 3 {
        return None;
    }
    let info = &trimmed[width * marker.len_utf8()..];
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some((marker, width))
}

fn is_fence_close(trimmed: &str, marker: char, width: usize) -> bool {
    trimmed.chars().count() >= width && trimmed.chars().all(|c| c == marker)
}

/// Find a natural break point near the target end position.
fn find_break_point(chars: &[char], start: usize, target_end: usize, window: usize) -> usize {
    // Look within the last 20% of the window
    let search_start = target_end.saturating_sub(window / 5).max(start + 1);
    if search_start >= target_end {
        return target_end;
    }
    let search_range = &chars[search_start..target_end];

    // Priority: double newline > single newline > sentence end > space
    let mut paragraph = None;
    let mut newline = None;
    let mut sentence = None;
    let mut space = None;

    for (i, c) in search_range.iter().enumerate() {
        let pos = search_start + i;
        match c {
            '\n' => {
                if i > 0 && search_range[i - 1] == '\n' {
                    paragraph = Some(pos + 1);
                }
                newline = Some(pos + 1);
            }
            '.' | '!' | '?' => {
                if search_range.get(i + 1).is_some_and(|c| c.is_whitespace()) {
                    sentence = Some(pos + 2);
                }
            }
            ' ' | '\t' => space = Some(pos + 1),
            _ => {}
        }
    }

    paragraph
        .or(newline)
        .or(sentence)
        .or(space)
        .filter(|&p| p > start && p <= target_end)
        .unwrap_or(target_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markdown(content: &str) -> Document {
        Document::new("guide.md", content.to_string(), DocumentFormat::Markdown)
    }

    fn chunker(max_tokens: u32, overlap: u32, min_chunk_size: u32, strategy: ChunkStrategy) -> TextChunker {
        let config = ChunkingConfig {
            max_tokens,
            overlap,
            min_chunk_size,
            strategy,
            ..Default::default()
        };
        TextChunker::new(&config).unwrap()
    }

    fn reconstruct(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.fresh_content()).collect()
    }

    fn alphabet(len: usize) -> String {
        (0..len).map(|i| (b'a' + (i % 26) as u8) as char).collect()
    }

    #[test]
    fn test_empty_document() {
        let chunker = TextChunker::with_defaults();
        assert!(chunker.chunk(&markdown(""), "docs").is_empty());
        assert!(chunker.chunk(&markdown("  \n\n\t "), "docs").is_empty());
    }

    #[test]
    fn test_small_document_single_chunk() {
        let chunker = TextChunker::with_defaults();
        let chunks = chunker.chunk(&markdown("Hello, world!"), "docs");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello, world!");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].overlap, 0);
        assert_eq!(chunks[0].metadata.total_chunks, 1);
        assert_eq!(chunks[0].metadata.collection, "docs");
    }

    #[test]
    fn test_window_5000_chars() {
        let chunker = chunker(512, 100, 0, ChunkStrategy::Window);
        let text = alphabet(5000);
        let doc = Document::new("plain.txt", text.clone(), DocumentFormat::Text);
        let chunks = chunker.chunk(&doc, "docs");

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.start_offset).collect::<Vec<_>>(),
            vec![0, 1948, 3896]
        );
        assert_eq!(chunks[0].char_count, 2048);
        assert_eq!(chunks[2].char_count, 1104);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].content.chars().skip(2048 - 100).collect();
            let head: String = pair[1].content.chars().take(100).collect();
            assert_eq!(tail, head);
            assert_eq!(pair[1].overlap, 100);
        }
        assert_eq!(reconstruct(&chunks), text);
        assert!(chunks.iter().all(|c| c.metadata.strategy == ChunkMode::Window));
    }

    #[test]
    fn test_auto_mode_selection() {
        let chunker = TextChunker::with_defaults();
        let flat = Document::new("a.txt", "one line".to_string(), DocumentFormat::Text);
        let paragraphs = Document::new("b.txt", "one\n\ntwo".to_string(), DocumentFormat::Text);

        assert_eq!(chunker.mode_for(&flat), ChunkMode::Window);
        assert_eq!(chunker.mode_for(&paragraphs), ChunkMode::Structured);
        assert_eq!(chunker.mode_for(&markdown("x")), ChunkMode::Structured);
    }

    #[test]
    fn test_heading_travels_with_following_content() {
        let chunker = chunker(20, 0, 0, ChunkStrategy::Structured);
        let content = format!(
            "# Title\n\n{}\n\n## Next\n\n{}\n",
            "p".repeat(60),
            "q".repeat(60)
        );
        let chunks = chunker.chunk(&markdown(&content), "docs");

        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].content.starts_with("## Next"));
        assert_eq!(chunks[0].metadata.headings, vec!["Title"]);
        assert_eq!(chunks[1].metadata.headings, vec!["Title", "Next"]);
        assert_eq!(reconstruct(&chunks), content);
    }

    #[test]
    fn test_oversized_code_block_is_atomic() {
        let chunker = chunker(20, 0, 0, ChunkStrategy::Structured);
        let code = format!("```rust\n{}```\n", "let x = 1;\n".repeat(18));
        let content = format!("Intro paragraph here.\n\n{}\nAfter the code.\n", code);
        let chunks = chunker.chunk(&markdown(&content), "docs");

        let code_chunk = chunks
            .iter()
            .find(|c| c.content.contains("```rust"))
            .unwrap();
        assert!(code_chunk.oversized);
        assert!(code_chunk.content.contains(&code));
        assert_eq!(reconstruct(&chunks), content);
    }

    #[test]
    fn test_small_chunk_merges_into_next() {
        let chunker = chunker(20, 0, 40, ChunkStrategy::Structured);
        let code = format!("```\n{}```\n\n", "fn f() {}\n".repeat(12));
        let content = format!("Short intro.\n\n{}{}\n", code, "r".repeat(70));
        let chunks = chunker.chunk(&markdown(&content), "docs");

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.starts_with("Short intro."));
        assert!(chunks[0].oversized);
        assert_eq!(reconstruct(&chunks), content);
    }

    #[test]
    fn test_long_paragraph_is_hard_split() {
        let chunker = chunker(25, 0, 0, ChunkStrategy::Structured);
        let sentence = "The quick brown fox jumps. ";
        let content = sentence.repeat(20);
        let chunks = chunker.chunk(&markdown(&content), "docs");

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.char_count <= 100);
            assert!(!chunk.oversized);
        }
        assert_eq!(reconstruct(&chunks), content);
    }

    #[test]
    fn test_structured_overlap_and_coverage() {
        let chunker = chunker(30, 15, 10, ChunkStrategy::Structured);
        let content = (0..12)
            .map(|i| format!("Paragraph {} talks about topic {}.\n\n", i, i * 7))
            .collect::<String>();
        let chunks = chunker.chunk(&markdown(&content), "docs");

        assert!(chunks.len() > 2);
        assert_eq!(chunks[0].overlap, 0);
        for pair in chunks.windows(2) {
            assert!(pair[1].overlap <= 15);
            assert_eq!(pair[1].start_offset + pair[1].overlap as usize, pair[0].end_offset);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as u32);
        }
        assert_eq!(reconstruct(&chunks), content);
    }

    #[test]
    fn test_overlap_never_pushes_chunk_over_budget() {
        let content = (0..12)
            .map(|i| format!("Paragraph {} talks about topic {}.\n\n", i, i * 7))
            .collect::<String>();
        for (max_tokens, overlap) in [(30, 15), (20, 40), (12, 30), (50, 100)] {
            let chunker = chunker(max_tokens, overlap, 10, ChunkStrategy::Structured);
            let chunks = chunker.chunk(&markdown(&content), "docs");

            for chunk in &chunks {
                assert!(
                    chunk.oversized || chunk.token_count <= max_tokens,
                    "chunk {} has {} tokens over a budget of {}",
                    chunk.index,
                    chunk.token_count,
                    max_tokens
                );
            }
            for pair in chunks.windows(2) {
                assert_eq!(pair[1].start_offset + pair[1].overlap as usize, pair[0].end_offset);
            }
            assert_eq!(reconstruct(&chunks), content);
        }
    }

    #[test]
    fn test_non_final_chunks_respect_min_size() {
        let chunker = chunker(30, 0, 50, ChunkStrategy::Structured);
        let content = "# A\n\nshort\n\n# B\n\ntiny\n\n# C\n\n".to_string() + &"word ".repeat(60);
        let chunks = chunker.chunk(&markdown(&content), "docs");

        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.fresh_content().chars().count() >= 50);
        }
        assert_eq!(reconstruct(&chunks), content);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let chunker = chunker(40, 20, 30, ChunkStrategy::Auto);
        let content = "# Guide\n\n".to_string() + &"Some words in a row. ".repeat(80);
        let doc = markdown(&content);

        let first: Vec<_> = chunker
            .chunk(&doc, "docs")
            .into_iter()
            .map(|c| (c.start_offset, c.end_offset))
            .collect();
        let second: Vec<_> = chunker
            .chunk(&doc, "docs")
            .into_iter()
            .map(|c| (c.start_offset, c.end_offset))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChunkingConfig {
            max_tokens: 10,
            overlap: 40,
            ..Default::default()
        };
        assert!(matches!(
            TextChunker::new(&config),
            Err(ChunkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_split_units_tiles_text() {
        let text: Vec<char> = "\n\n# H\ntext\nmore\n\n| a |\n| b |\n```\ncode\n\n```\ntail"
            .chars()
            .collect();
        let units = split_units(&text);
        let kinds: Vec<_> = units.iter().map(|u| u.kind).collect();

        assert_eq!(
            kinds,
            vec![
                UnitKind::Heading,
                UnitKind::Paragraph,
                UnitKind::Table,
                UnitKind::Code,
                UnitKind::Paragraph
            ]
        );
        assert_eq!(units[0].start, 0);
        for pair in units.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(units.last().unwrap().end, text.len());
    }
}
