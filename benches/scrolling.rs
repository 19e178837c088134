use colv::row::FormatRule;
use colv::source::MappedSource;
use colv::{Direction, LineCache, SearchPattern, SourceFactory};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::runtime::Runtime;

const WINDOW: usize = 50;

/// Blank-separated log lines; one line in `rare_every` carries the word `needle`.
fn log_text(size_kb: usize, rare_every: usize) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let levels = ["DEBUG", "INFO", "WARN", "ERROR"];
    let services = ["auth", "database", "cache", "payment"];
    let target = size_kb * 1024;

    let mut text = String::with_capacity(target + 128);
    let mut line = 0usize;
    while text.len() < target {
        let marker = if line % rare_every == rare_every - 1 {
            "needle"
        } else {
            "ok"
        };
        text.push_str(&format!(
            "2024-09-02T10:{:02}:{:02} {} {} {:.3} user_{} {}\n",
            (line / 60) % 60,
            line % 60,
            levels[rng.gen_range(0..levels.len())],
            services[rng.gen_range(0..services.len())],
            rng.gen_range(0.0..5000.0f64),
            rng.gen_range(0..10_000u32),
            marker,
        ));
        line += 1;
    }
    text
}

fn log_file(size_kb: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(log_text(size_kb, 1000).as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn size_label(size_kb: usize) -> String {
    if size_kb < 1024 {
        format!("{size_kb}KB")
    } else {
        format!("{}MB", size_kb / 1024)
    }
}

fn bench_scroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("scroll");
    group.measurement_time(Duration::from_secs(5));

    let text = log_text(2048, 1000);
    for &step in &[1i64, 25, 500] {
        group.bench_with_input(BenchmarkId::new("forward_back", step), &step, |b, &step| {
            let mut cache = LineCache::new(MappedSource::from_bytes(text.clone()));
            cache.cache_fill(WINDOW).unwrap();
            b.iter(|| {
                cache.scroll(step).unwrap();
                cache.scroll(-step).unwrap();
                black_box(cache.current_line());
            });
        });
    }

    group.bench_function("formatted_page", |b| {
        let mut cache = LineCache::new(MappedSource::from_bytes(text.clone()));
        cache.set_format_rule(2, FormatRule::parse("%.1f").unwrap()).unwrap();
        cache.cache_fill(WINDOW).unwrap();
        b.iter(|| {
            cache.scroll(WINDOW as i64).unwrap();
            if cache.len() < WINDOW {
                cache.goto_start();
                cache.cache_fill(WINDOW).unwrap();
            }
            black_box(cache.column_widths().len());
        });
    });
    group.finish();
}

fn bench_jumps(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("jumps");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(6));

    for &size_kb in &[512, 8192, 65536] {
        let file = log_file(size_kb);
        let label = size_label(size_kb);

        group.bench_with_input(BenchmarkId::new("goto_end", &label), &file.path(), |b, path| {
            b.iter(|| {
                let source = rt.block_on(SourceFactory::open(path)).unwrap();
                let mut cache = LineCache::new(source);
                cache.cache_fill(WINDOW).unwrap();
                cache.goto_end().unwrap();
                black_box(cache.current_line());
            });
        });

        group.bench_with_input(BenchmarkId::new("random_offset", &label), &file.path(), |b, path| {
            let source = rt.block_on(SourceFactory::open(path)).unwrap();
            let size = colv::ByteSource::size(&source);
            let mut cache = LineCache::new(source);
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            b.iter(|| {
                cache.goto_offset(rng.gen_range(0..size)).unwrap();
                cache.cache_fill(WINDOW).unwrap();
                black_box(cache.current_line());
            });
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(6));

    let text = log_text(16384, 1000);
    let pattern = SearchPattern::new(r"needle$", false).unwrap();
    let regex = SearchPattern::new(r"ERROR payment \d+\.9\d\d user_99\d\d", false).unwrap();

    group.bench_function("in_window", |b| {
        let mut cache = LineCache::new(MappedSource::from_bytes(text.clone()));
        cache.cache_fill(2000).unwrap();
        b.iter(|| {
            cache.goto_start();
            cache.cache_fill(2000).unwrap();
            black_box(cache.search(pattern.clone(), Direction::Forward).unwrap());
        });
    });

    group.bench_function("past_window", |b| {
        let mut cache = LineCache::new(MappedSource::from_bytes(text.clone()));
        cache.cache_fill(WINDOW).unwrap();
        cache.search(regex.clone(), Direction::Forward).unwrap();
        b.iter(|| {
            if !cache.repeat_search(Direction::Forward).unwrap() {
                cache.goto_start();
            }
            cache.cache_fill(WINDOW).unwrap();
        });
    });

    group.bench_function("backward_from_end", |b| {
        let mut cache = LineCache::new(MappedSource::from_bytes(text.clone()));
        cache.cache_fill(WINDOW).unwrap();
        b.iter(|| {
            cache.goto_end().unwrap();
            cache.cache_fill(WINDOW).unwrap();
            black_box(cache.search(pattern.clone(), Direction::Backward).unwrap());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_scroll, bench_jumps, bench_search);
criterion_main!(benches);
