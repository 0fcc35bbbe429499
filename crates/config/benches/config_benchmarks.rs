//! Benchmarks for configuration system
//!
//! Run with: cargo bench --package hookgate-config

use criterion::{criterion_group, criterion_main, Criterion};
use hookgate_config::{apply_overrides, Config, ConfigManager, SourceConfig};
use std::hint::black_box;
use tempfile::TempDir;

fn sample_config() -> Config {
    let mut config = Config::default();
    for name in ["github", "stripe", "shopify"] {
        config.ingest.sources.insert(
            name.to_string(),
            SourceConfig::new("0123456789abcdef0123456789abcdef"),
        );
    }
    config
}

fn bench_config_validation(c: &mut Criterion) {
    let config = sample_config();

    c.bench_function("config_validate", |b| {
        b.iter(|| black_box(config.validate()));
    });
}

fn bench_config_deserialization(c: &mut Criterion) {
    let toml_string = toml::to_string(&sample_config()).expect("Failed to serialize");

    c.bench_function("config_deserialize_toml", |b| {
        b.iter(|| {
            let config: Config = toml::from_str(&toml_string).expect("Failed to deserialize");
            black_box(config);
        });
    });
}

fn bench_env_overrides(c: &mut Criterion) {
    let vars = [
        ("HOOKGATE_SERVER_BIND_ADDRESS", "127.0.0.1:9000"),
        ("HOOKGATE_INGEST_RATE_LIMIT_MAX", "50"),
        ("HOOKGATE_SOURCE_GITHUB_SECRET", "0123456789abcdef0123456789abcdef"),
    ];

    c.bench_function("config_env_overrides", |b| {
        b.iter(|| {
            let mut config = Config::default();
            apply_overrides(&mut config, vars).expect("Failed to apply");
            black_box(config);
        });
    });
}

fn bench_config_save_load(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager =
        ConfigManager::with_directory(temp_dir.path().to_path_buf()).expect("Failed to create");
    let config = sample_config();

    c.bench_function("config_save_load", |b| {
        b.iter(|| {
            manager.save(&config).expect("Failed to save");
            black_box(manager.load().expect("Failed to load"));
        });
    });
}

criterion_group!(
    benches,
    bench_config_validation,
    bench_config_deserialization,
    bench_env_overrides,
    bench_config_save_load
);

criterion_main!(benches);
