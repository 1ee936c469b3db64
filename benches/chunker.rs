use criterion::{Criterion, black_box, criterion_group, criterion_main};

use docvec::models::{ChunkStrategy, ChunkingConfig, Document, DocumentFormat};
use docvec::services::TextChunker;

fn markdown_corpus(sections: usize) -> String {
    let mut out = String::from("# Operations Guide\n\n");
    for i in 0..sections {
        out.push_str(&format!("## Section {i}\n\n"));
        for p in 0..4 {
            out.push_str(&format!(
                "Paragraph {p} of section {i} describes retry behaviour, batching limits \
                 and how failed writes are reported back to the operator. "
            ));
            out.push_str(&"Details follow. ".repeat(20));
            out.push_str("\n\n");
        }
    }
    out
}

fn bench_chunker(c: &mut Criterion) {
    let markdown = Document::new("guide.md", markdown_corpus(200), DocumentFormat::Markdown);
    let plain = Document::new("dump.txt", "lorem ipsum ".repeat(20_000), DocumentFormat::Text);

    let structured = TextChunker::with_defaults();
    let window = TextChunker::new(&ChunkingConfig {
        strategy: ChunkStrategy::Window,
        ..Default::default()
    })
    .expect("valid chunking config");

    c.bench_function("chunk_markdown_structured", |b| {
        b.iter(|| structured.chunk(black_box(&markdown), "bench"))
    });
    c.bench_function("chunk_plain_window", |b| {
        b.iter(|| window.chunk(black_box(&plain), "bench"))
    });
}

criterion_group!(benches, bench_chunker);
criterion_main!(benches);
