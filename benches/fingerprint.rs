// Fingerprint builder benchmarks
// Author: kelexine (https://github.com/kelexine)

use adforge::fingerprint::{fingerprint, fingerprint_voice};
use adforge::models::{ContentType, GenerationRequest, Tone};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_fingerprint(c: &mut Criterion) {
    let plain = GenerationRequest::new("Premium Coffee", Tone::Luxury, 15, 2, ContentType::Tagline);
    let hinted = plain
        .clone()
        .with_hints(["Free shipping", "Fair trade", "Limited roast", "Order by Friday"])
        .time_sensitive(true);
    let script = "Wake up to something better. ".repeat(12);

    c.bench_function("fingerprint_plain", |b| b.iter(|| fingerprint(black_box(&plain))));
    c.bench_function("fingerprint_with_hints", |b| {
        b.iter(|| fingerprint(black_box(&hinted)))
    });
    c.bench_function("fingerprint_voice", |b| {
        b.iter(|| fingerprint_voice(black_box(&script), black_box("onyx")))
    });
}

criterion_group!(benches, bench_fingerprint);
criterion_main!(benches);
