use std::fs;
use std::time::Duration;

use migrate_telemetry::tracing::{TracingError, init_tracing};

// Installing the global subscriber is a one-shot per process, so this binary holds a single test.
#[test]
fn init_tracing_installs_once_and_writes_the_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    let flusher = init_tracing("init", Some(&log_dir)).unwrap();
    tracing::info!(rows = 500, "batch applied");

    let second = init_tracing("init", None);
    assert!(matches!(second, Err(TracingError::LogTracer(_))));

    // Dropping the guard flushes the non-blocking writer.
    drop(flusher);
    std::thread::sleep(Duration::from_millis(50));

    let files: Vec<_> = fs::read_dir(&log_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(
        files[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("init.log")
    );

    let contents = fs::read_to_string(&files[0]).unwrap();
    assert!(contents.contains("batch applied"));
    assert!(contents.contains("rows=500"));
}
