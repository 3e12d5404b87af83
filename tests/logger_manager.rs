//! Integration tests for the logger manager and sink fan-out.

use kindconf::error::SinkError;
use kindconf::logging::{
    LogConfig, LogFormat, LogLevel, Logger, LoggerManager, MultiWriter, Rotation, Sink, SinkKind,
    SinkSpec,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::fs;
use std::io;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Memory(Arc<Mutex<Vec<u8>>>);

impl Memory {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

impl Sink for Memory {
    fn name(&self) -> &'static str {
        "memory"
    }
    fn write(&self, record: &[u8]) -> Result<(), SinkError> {
        self.0.lock().extend_from_slice(record);
        Ok(())
    }
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

struct Failing;

impl Sink for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }
    fn write(&self, _record: &[u8]) -> Result<(), SinkError> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away").into())
    }
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

fn file_sink(path: &Path) -> SinkSpec {
    SinkSpec::File {
        path: path.to_string_lossy().into_owned(),
        rotation: Rotation::Never,
    }
}

#[test]
fn test_failing_sink_does_not_affect_others() {
    let first = Memory::default();
    let third = Memory::default();
    let config = LogConfig {
        show_timestamp: false,
        ..LogConfig::default()
    };
    let logger = Logger::from_parts(
        &config,
        vec![Box::new(first.clone()), Box::new(Failing), Box::new(third.clone())],
    );

    logger.log(LogLevel::Info, "payload", &[], None);
    logger.log(LogLevel::Info, "payload", &[], None);

    assert_eq!(first.text(), "INFO  payload\nINFO  payload\n");
    assert_eq!(third.text(), first.text());
}

#[test]
fn test_multiwriter_reports_success_to_caller() {
    let writer = MultiWriter::new(vec![Box::new(Failing), Box::new(Memory::default())]);
    assert_eq!(writer.write(b"abc").unwrap(), 3);
    assert!(writer.close().is_ok());
}

#[test]
fn test_unreachable_network_sink_falls_back() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let logs = LoggerManager::new();
    logs.init(LogConfig {
        sinks: vec![SinkSpec::Tcp {
            address,
            timeout_ms: 200,
        }],
        ..LogConfig::default()
    });
    assert_eq!(logs.logger().sink_names(), vec!["console"]);
}

#[test]
fn test_tcp_sink_receives_records() {
    use std::io::{BufRead, BufReader};

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let logs = LoggerManager::new();
    logs.init(LogConfig {
        format: LogFormat::Json,
        sinks: vec![SinkSpec::Tcp {
            address,
            timeout_ms: 1000,
        }],
        ..LogConfig::default()
    });
    let (stream, _) = listener.accept().unwrap();

    logs.with_field("shard", 7).error("replica lagging");

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).unwrap();
    let parsed: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["msg"], "replica lagging");
    assert_eq!(parsed["shard"], 7);
}

#[test]
fn test_rebuild_is_atomic_across_threads() {
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("a.log");
    let text_path = dir.path().join("b.log");

    let logs = Arc::new(LoggerManager::new());
    logs.init(LogConfig {
        format: LogFormat::Json,
        sinks: vec![file_sink(&json_path)],
        ..LogConfig::default()
    });

    let stop = Arc::new(AtomicBool::new(false));
    let writers: Vec<_> = (0..4)
        .map(|id| {
            let logs = Arc::clone(&logs);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut n = 0;
                while !stop.load(Ordering::Relaxed) || n < 50 {
                    logs.with_field("writer", id).info(format_args!("record {}", n));
                    n += 1;
                }
            })
        })
        .collect();

    thread::sleep(std::time::Duration::from_millis(20));
    logs.update_config(LogConfig {
        format: LogFormat::Text,
        sinks: vec![file_sink(&text_path)],
        ..LogConfig::default()
    });
    thread::sleep(std::time::Duration::from_millis(20));
    stop.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }
    logs.shutdown();

    let json = fs::read_to_string(&json_path).unwrap();
    assert!(!json.is_empty());
    for line in json.lines() {
        let parsed: Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["level"], "info");
    }

    let text = fs::read_to_string(&text_path).unwrap();
    assert!(!text.is_empty());
    for line in text.lines() {
        assert!(!line.starts_with('{'), "json record in text sink: {line}");
        assert!(line.contains(" INFO  record "), "unexpected line: {line}");
    }

    assert_eq!(logs.format(), LogFormat::Text);
}

#[test]
fn test_level_change_applies_immediately() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("level.log");

    let logs = LoggerManager::new();
    logs.init(LogConfig {
        level: LogLevel::Warn,
        show_timestamp: false,
        sinks: vec![file_sink(&path)],
        ..LogConfig::default()
    });

    logs.info("before");
    logs.update_level(LogLevel::Info);
    logs.info("after");

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text, "INFO  after\n");
}

#[test]
fn test_uninitialized_manager_uses_bootstrap_logger() {
    let logs = LoggerManager::new();
    logs.info("written to stdout");
    assert!(!logs.is_initialized());
    assert_eq!(logs.logger().sink_names(), vec!["console"]);
    assert_eq!(logs.level(), LogLevel::Info);
}

#[test]
fn test_remove_sink_by_kind() {
    let dir = TempDir::new().unwrap();
    let logs = LoggerManager::new();
    logs.init(LogConfig {
        sinks: vec![SinkSpec::stdout(), file_sink(&dir.path().join("x.log"))],
        ..LogConfig::default()
    });

    assert!(logs.remove_sink(SinkKind::Console));
    assert!(!logs.remove_sink(SinkKind::Udp));
    assert_eq!(logs.logger().sink_names(), vec!["file"]);
}
