use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_parse_multipart(c: &mut Criterion) {
    let raw = fixture_bytes("multipart.eml");

    c.bench_function("parse_multipart_eml", |b| {
        b.iter(|| emlview::parser::parse_message(&raw).unwrap())
    });
}

fn bench_attachments(c: &mut Criterion) {
    let raw = fixture_bytes("multipart.eml");
    let msg = emlview::parser::parse_message(&raw).unwrap();

    c.bench_function("locate_and_decode_attachments", |b| {
        b.iter(|| msg.attachments().len())
    });
}

criterion_group!(benches, bench_parse_multipart, bench_attachments);
criterion_main!(benches);
