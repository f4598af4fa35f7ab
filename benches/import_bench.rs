//! Criterion benchmarks for the import path.
//!
//! Covers the per-feature hot loop (streaming decode and address
//! extraction) and a full in-memory load through the batch loader.

use std::hint::black_box;
use std::io::Cursor;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use geoaddress::config::{BatchConfig, RetryConfig};
use geoaddress::extract::{AddressExtractor, Extraction};
use geoaddress::geojson::{DecodedFeature, FeatureStream};
use geoaddress::loader::BatchLoader;
use geoaddress::search::query::match_expression;
use geoaddress::store::AddressStore;

const STREETS: &[&str] = &[
    "Hauptstraße",
    "Bahnhofstraße",
    "Karl-Marx-Allee",
    "Schillerstraße",
    "Am Markt",
    "Goethestraße",
];

const CITIES: &[(&str, &str)] = &[
    ("addr:city", "Berlin"),
    ("addr:town", "Fürth"),
    ("addr:village", "Buch"),
];

/// Feature collection mixing geometry types and city keys.
fn generate_collection(count: usize) -> String {
    let mut out = String::from(r#"{"type":"FeatureCollection","features":["#);
    for i in 0..count {
        if i > 0 {
            out.push(',');
        }
        let street = STREETS[i % STREETS.len()];
        let (city_key, city) = CITIES[i % CITIES.len()];
        let lon = 6.0 + (i % 900) as f64 / 100.0;
        let lat = 47.0 + (i % 700) as f64 / 100.0;
        let geometry = match i % 4 {
            0 | 1 => format!(r#"{{"type":"Point","coordinates":[{lon},{lat}]}}"#),
            2 => format!(
                r#"{{"type":"Polygon","coordinates":[[[{lon},{lat}],[{lon},{lat}],[{lon},{lat}],[{lon},{lat}]]]}}"#
            ),
            _ => format!(r#"{{"type":"LineString","coordinates":[[{lon},{lat}],[{lat},{lon}]]}}"#),
        };
        out.push_str(&format!(
            r#"{{"type":"Feature","properties":{{"addr:street":"{street}","addr:housenumber":"{}","{city_key}":"{city}","building":"yes"}},"geometry":{geometry}}}"#,
            i % 250
        ));
    }
    out.push_str("]}");
    out
}

fn bench_decode_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_extract");
    let count = 10_000;
    let collection = generate_collection(count);
    let extractor = AddressExtractor::default();

    group.throughput(Throughput::Elements(count as u64));
    group.bench_function("decode_only", |b| {
        b.iter(|| {
            let decoded = FeatureStream::new(Cursor::new(collection.as_bytes()))
                .filter(|item| matches!(item, Ok(DecodedFeature::Feature(_))))
                .count();
            black_box(decoded)
        })
    });

    group.bench_function("decode_and_extract", |b| {
        b.iter(|| {
            let mut records = 0usize;
            for item in FeatureStream::new(Cursor::new(collection.as_bytes())) {
                if let Ok(DecodedFeature::Feature(feature)) = item
                    && let Extraction::Record(record) = extractor.extract(&feature)
                {
                    records += 1;
                    black_box(record);
                }
            }
            black_box(records)
        })
    });

    group.finish();
}

fn bench_batch_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_load");
    group.sample_size(20);
    let count = 10_000;
    let collection = generate_collection(count);
    let extractor = AddressExtractor::default();
    let records: Vec<_> = FeatureStream::new(Cursor::new(collection.as_bytes()))
        .filter_map(|item| match item {
            Ok(DecodedFeature::Feature(feature)) => extractor.extract(&feature).into_record(),
            _ => None,
        })
        .collect();
    let batch = BatchConfig::default().with_max_batch_records(2_000);

    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("in_memory_store", |b| {
        b.iter(|| {
            let store = AddressStore::open_in_memory().unwrap();
            let mut loader = BatchLoader::new(&store, &batch, &RetryConfig::disabled()).unwrap();
            for record in records.iter().cloned() {
                loader.push(record).unwrap();
            }
            black_box(loader.finish().unwrap())
        })
    });

    group.finish();
}

fn bench_query_analysis(c: &mut Criterion) {
    c.bench_function("match_expression", |b| {
        b.iter(|| black_box(match_expression(black_box("Karl-Marx-Allee 12, Berlin Mitte"))))
    });
}

criterion_group!(
    benches,
    bench_decode_extract,
    bench_batch_load,
    bench_query_analysis
);
criterion_main!(benches);
