//! Benchmarks for title normalization and candidate scoring
//!
//! Scoring runs once per identify call over every provider's results, so
//! the interesting sizes are a single page (20) up to a few merged pages.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reelmatch::metadata::scoring::{levenshtein_distance, string_similarity};
use reelmatch::metadata::{calculate_confidence, normalize, score_search_results, SearchResult};
use reelmatch_common::MediaType;

const TITLES: &[&str] = &[
    "The Lord of the Rings: The Fellowship of the Ring",
    "Lord of the Rings",
    "The.Matrix.1999.1080p.BluRay",
    "Amélie",
    "Spider-Man: Into the Spider-Verse",
    "Crouching Tiger, Hidden Dragon",
    "Star Wars: Episode IV - A New Hope",
    "Léon: The Professional",
];

/// `count` plausible candidates for a "Star Wars" query.
fn candidates(count: usize) -> Vec<SearchResult> {
    (0..count)
        .map(|i| {
            let title = match i % 4 {
                0 => format!("Star Wars: Episode {}", i),
                1 => "Star Wars".to_string(),
                2 => format!("Star Trek {}", i),
                _ => format!("The Star Wars Holiday Special {}", i),
            };
            let mut result = SearchResult::new("tmdb", i.to_string(), title, MediaType::Movie);
            result.release_date = Some(format!("{}-05-25", 1970 + (i % 50)));
            result.popularity = Some((count - i) as f64);
            result
        })
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for title in TITLES.iter().take(4) {
        group.bench_with_input(BenchmarkId::from_parameter(title), title, |b, title| {
            b.iter(|| normalize(black_box(title)));
        });
    }

    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");

    group.bench_function("levenshtein/short", |b| {
        b.iter(|| levenshtein_distance(black_box("matrix"), black_box("matrx")));
    });
    group.bench_function("levenshtein/long", |b| {
        b.iter(|| levenshtein_distance(black_box(TITLES[0]), black_box(TITLES[6])));
    });
    group.bench_function("string_similarity/punctuated", |b| {
        b.iter(|| string_similarity(black_box(TITLES[2]), black_box("The Matrix")));
    });
    group.bench_function("calculate_confidence", |b| {
        b.iter(|| {
            calculate_confidence(
                black_box("Spider-Man Into the Spiderverse"),
                black_box(Some(2018)),
                black_box(TITLES[4]),
                black_box(Some("2018-12-14")),
            )
        });
    });

    group.finish();
}

fn bench_score_results(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_search_results");

    for count in [20, 60, 200] {
        let results = candidates(count);
        group.bench_with_input(BenchmarkId::new("star_wars", count), &results, |b, results| {
            b.iter(|| score_search_results(black_box("Star Wars"), black_box(Some(1977)), results.clone()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_similarity, bench_score_results);
criterion_main!(benches);
