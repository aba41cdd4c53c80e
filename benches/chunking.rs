use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use retrieval_qa::chunking::{ChunkingConfig, chunk_text};
use retrieval_qa::index::{FlatL2Index, VectorIndex};
use retrieval_qa::source::extract_page;
use std::hint::black_box;

const PARAGRAPH: &str = "Sherlock Holmes is a fictional detective created by British author \
    Arthur Conan Doyle. Referring to himself as a consulting detective, Holmes is known \
    for his proficiency with observation, deduction, forensic science and logical reasoning. ";

fn synthetic_page(paragraphs: usize) -> String {
    let mut html = String::from(
        "<html><head><title>Bench</title></head><body><nav>Menu</nav><div id=\"mw-content-text\">",
    );
    for _ in 0..paragraphs {
        html.push_str("<p>");
        html.push_str(PARAGRAPH);
        html.push_str("</p>\n");
    }
    html.push_str("</div><footer>Footer</footer></body></html>");
    html
}

fn pseudo_random_vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    let mut state = 0x2545_f491_u32;
    (0..count)
        .map(|_| {
            (0..dimension)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    (state % 1000) as f32 / 1000.0
                })
                .collect()
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let page = synthetic_page(400);
    c.bench_function("extraction", |b| b.iter(|| extract_page(black_box(&page))));

    let text = extract_page(&page).expect("synthetic page extracts").text;
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&text), black_box(&config)))
    });

    let mut group = c.benchmark_group("flat_l2_search");
    for rows in [1_000, 10_000] {
        let mut index = FlatL2Index::new();
        index
            .add(&pseudo_random_vectors(rows, 384))
            .expect("vectors share a dimension");
        let query = pseudo_random_vectors(1, 384).remove(0);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &index, |b, index| {
            b.iter(|| index.search(black_box(&query), 3));
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
