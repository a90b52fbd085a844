use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use memento_benches::synthetic_markdown;
use memento_chunker::{chunk_markdown, ChunkConfig};

fn chunker_benchmark(c: &mut Criterion) {
    let config = ChunkConfig::default();
    let mut group = c.benchmark_group("chunk_markdown");

    for section_count in [20usize, 100, 400] {
        let doc = synthetic_markdown(section_count, 150);
        group.bench_with_input(
            BenchmarkId::from_parameter(section_count),
            &doc,
            |b, doc| {
                b.iter(|| chunk_markdown(doc, &config, false));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, chunker_benchmark);
criterion_main!(benches);
