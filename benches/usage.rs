use cpu_pulse::monitor::counters::parse_counters;
use cpu_pulse::monitor::usage_percent;
use cpu_pulse::net::wire;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn stat_text(cores: usize, offset: u64) -> String {
    let mut text = format!("cpu  {} 0 {} {} 0 0 0 0 0 0\n", 1000 + offset, 500 + offset, 9000 + offset);
    for i in 0..cores {
        let base = i as u64 * 10 + offset;
        text.push_str(&format!("cpu{} {} 1 {} {} 2 0 3 0 0 0\n", i, 100 + base, 50 + base, 900 + base));
    }
    text.push_str("intr 1 2 3\nctxt 42\nbtime 1\n");
    text
}

fn bench_parse(c: &mut Criterion) {
    let text = stat_text(64, 0);
    c.bench_function("parse_counters_64_cores", |b| {
        b.iter(|| parse_counters(black_box(&text)))
    });
}

fn bench_usage(c: &mut Criterion) {
    let prev = parse_counters(&stat_text(64, 0));
    let cur = parse_counters(&stat_text(64, 7));
    c.bench_function("usage_percent_64_cores", |b| {
        b.iter(|| {
            prev.cores()
                .iter()
                .zip(cur.cores())
                .map(|(p, c)| usage_percent(black_box(p), black_box(c)))
                .sum::<f64>()
        })
    });
}

fn bench_encode(c: &mut Criterion) {
    let result = cpu_pulse::monitor::UsageResult {
        total_usage: 42.5,
        per_core_usage: vec![12.34; 64],
        core_count: 64,
    };
    c.bench_function("wire_encode_64_cores", |b| b.iter(|| wire::encode(black_box(&result))));
}

criterion_group!(benches, bench_parse, bench_usage, bench_encode);
criterion_main!(benches);
