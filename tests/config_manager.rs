//! Integration tests for configuration managers and the registry.

use kindconf::prelude::*;
use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct Sample {
    host: String,
    port: u16,
    timeout: String,
    tags: Vec<String>,
}

impl ConfigKind for Sample {
    const NAME: &'static str = "sample";

    fn schema() -> Schema {
        Schema::new()
            .field("host", "localhost", "Bind address")
            .field("port", 8080, "Bind port")
            .field("timeout", "30s", "Request timeout")
            .field("tags", vec!["a", "b"], "Free-form tags")
    }
}

#[derive(Debug, Deserialize)]
struct Cache {
    #[allow(dead_code)]
    ttl: u64,
}

impl ConfigKind for Cache {
    const NAME: &'static str = "cache";

    fn schema() -> Schema {
        Schema::new().field("ttl", 60, "Entry lifetime in seconds")
    }
}

#[derive(Debug, Deserialize)]
struct Pair {
    a: i64,
    b: i64,
}

impl ConfigKind for Pair {
    const NAME: &'static str = "pair";

    fn schema() -> Schema {
        Schema::new().field("a", 0, "").field("b", 0, "")
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.a != self.b {
            return Err(ValidationError::custom("a and b must match"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Pool {
    #[serde(rename = "maxConns")]
    max_conns: i64,
}

impl ConfigKind for Pool {
    const NAME: &'static str = "pool";

    fn schema() -> Schema {
        Schema::new().field("maxConns", 10, "Connection limit")
    }
}

fn options_in<T: ConfigKind>(dir: &TempDir) -> ManagerOptions {
    ManagerOptions::for_kind::<T>()
        .with_search_paths([dir.path().join("conf"), dir.path().to_path_buf()])
        .without_env()
        .with_debounce(Duration::from_millis(50))
}

#[test]
fn test_registry_returns_one_manager_per_kind() {
    let registry = ManagerRegistry::new();
    let first = registry.get_or_create::<Sample>();
    let second = registry.get_or_create::<Sample>();
    let cache = registry.get_or_create::<Cache>();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "sample");
    assert_eq!(cache.name(), "cache");
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_global_registry_is_shared() {
    let a = ManagerRegistry::global().get_or_create::<Cache>();
    let b = ManagerRegistry::global().get_or_create::<Cache>();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(ManagerRegistry::global().contains("cache"));
}

#[test]
fn test_kinds_do_not_share_state() {
    let dir = TempDir::new().unwrap();
    let registry = ManagerRegistry::new();
    let sample = registry.get_or_create_with::<Sample>(options_in::<Sample>(&dir));
    let cache = registry.get_or_create_with::<Cache>(options_in::<Cache>(&dir));

    sample.set("ttl", 1);
    assert_eq!(cache.get_int("ttl"), 60);
    assert!(dir.path().join("conf/sample.yaml").exists());
    assert!(dir.path().join("conf/cache.yaml").exists());
}

#[test]
fn test_sample_scenario() {
    let dir = TempDir::new().unwrap();
    let registry = ManagerRegistry::new();
    let sample = registry.get_or_create_with::<Sample>(options_in::<Sample>(&dir));
    let path = dir.path().join("conf/sample.yaml");

    assert_eq!(sample.get_int("port"), 8080);
    assert!(path.exists());
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("# Bind port"));

    sample.set("port", 9090);
    assert_eq!(sample.get_int("port"), 9090);
    assert_eq!(sample.get_config().unwrap().port, 9090);
    assert_eq!(fs::read_to_string(&path).unwrap(), written);

    assert_eq!(sample.write_config().unwrap(), path);
    let persisted = fs::read_to_string(&path).unwrap();
    assert!(persisted.contains("9090"));
}

#[test]
fn test_default_fallback_when_key_missing_from_document() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("conf")).unwrap();
    fs::write(dir.path().join("conf/sample.yaml"), "host: example.org\n").unwrap();

    let sample = ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir));
    assert_eq!(sample.get_string("host"), "example.org");
    assert_eq!(sample.get_int("port"), 8080);
    assert!(sample.is_set("host"));
    assert!(!sample.is_set("port"));
    assert_eq!(sample.get_duration("timeout"), Duration::from_secs(30));

    let config = sample.get_config().unwrap();
    assert_eq!(config.tags, vec!["a", "b"]);
    assert_eq!(config.timeout, "30s");
}

#[test]
fn test_later_search_path_is_used_when_first_is_empty() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sample.yaml"), "port: 7070\n").unwrap();

    let sample = ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir));
    assert_eq!(sample.get_int("port"), 7070);
    assert_eq!(sample.config_file(), Some(dir.path().join("sample.yaml")));
    assert!(!dir.path().join("conf/sample.yaml").exists());
}

#[test]
fn test_toml_and_json_documents() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sample.toml"), "port = 6000\ntags = [\"x\"]\n").unwrap();
    fs::write(dir.path().join("sample.json"), r#"{"port": 6001}"#).unwrap();

    let toml = ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir).with_extension("toml"));
    assert_eq!(toml.get_int("port"), 6000);
    assert_eq!(toml.get_string_slice("tags"), vec!["x"]);

    let json = ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir).with_extension("json"));
    assert_eq!(json.get_int("port"), 6001);
}

#[test]
fn test_mixed_case_keys_are_preserved() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("pool.yaml"), "maxConns: 99\n").unwrap();

    let pool = ConfigManager::<Pool>::with_options(options_in::<Pool>(&dir));
    assert_eq!(pool.get_int("maxConns"), 99);
    assert!(pool.is_set("maxConns"));
    assert_eq!(pool.get_config().unwrap().max_conns, 99);

    pool.write_config().unwrap();
    let persisted = fs::read_to_string(dir.path().join("pool.yaml")).unwrap();
    assert_eq!(persisted, "maxConns: 99\n");
}

#[test]
fn test_concurrent_initialization_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let sample = Arc::new(ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let sample = Arc::clone(&sample);
            thread::spawn(move || {
                sample.initialize().unwrap();
                sample.get_int("port")
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 8080);
    }
    assert!(sample.is_initialized());
}

#[test]
fn test_readers_never_see_half_applied_reload() {
    let dir = TempDir::new().unwrap();
    let pair = Arc::new(ConfigManager::<Pair>::with_options(options_in::<Pair>(&dir)));
    pair.initialize().unwrap();
    let path = pair.config_file().unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let pair = Arc::clone(&pair);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut reads = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = pair.snapshot();
                    assert_eq!(snapshot.get("a"), snapshot.get("b"));
                    let config = pair.get_config().unwrap();
                    assert_eq!(config.a, config.b);
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    for i in 1..=50 {
        fs::write(&path, format!("a: {i}\nb: {i}\n")).unwrap();
        pair.reload().unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(pair.get_int("a"), 50);
}

#[test]
fn test_invalid_reload_is_rejected() {
    let dir = TempDir::new().unwrap();
    let pair = ConfigManager::<Pair>::with_options(options_in::<Pair>(&dir));
    pair.initialize().unwrap();
    let path = pair.config_file().unwrap();

    fs::write(&path, "a: 1\nb: 2\n").unwrap();
    assert!(matches!(pair.reload(), Err(ConfigError::Validation(_))));
    assert_eq!(pair.get_int("a"), 0);
    assert_eq!(pair.get_int("b"), 0);
}

#[test]
fn test_change_subscribers() {
    let dir = TempDir::new().unwrap();
    let sample = ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir));
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let handle = sample.on_change(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    sample.set("port", 1);
    let path = sample.config_file().unwrap();
    fs::write(&path, "port: 2\n").unwrap();
    sample.reload().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    drop(handle);
    sample.set("port", 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_hot_reload_on_file_change() {
    let dir = TempDir::new().unwrap();
    let sample = Arc::new(ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir)));
    assert_eq!(sample.get_int("port"), 8080);

    let watch = sample.watch_config().unwrap();
    assert!(watch.is_active());
    let path = sample.config_file().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(&path, "port: 9191\n").unwrap();

    let mut reloaded = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if sample.get_int("port") == 9191 {
            reloaded = true;
            break;
        }
    }
    assert!(reloaded, "document change was not picked up");

    watch.stop().await;
}

#[tokio::test]
async fn test_hot_reload_keeps_state_on_broken_document() {
    let dir = TempDir::new().unwrap();
    let sample = Arc::new(ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir)));
    sample.set("host", "pinned");
    let _watch = sample.watch_config().unwrap();
    let path = sample.config_file().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(&path, "port: [broken\n").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(sample.get_int("port"), 8080);
    assert_eq!(sample.get_string("host"), "pinned");
}

#[test]
fn test_watch_requires_runtime() {
    let dir = TempDir::new().unwrap();
    let sample = Arc::new(ConfigManager::<Sample>::with_options(options_in::<Sample>(&dir)));
    assert!(matches!(sample.watch_config(), Err(ConfigError::Watch(_))));
}
