//! Subscriber installation and file logging.
//!
//! Only one global subscriber can exist per process, so everything that
//! depends on it lives in a single test.

use std::fs;

use logging::{LOG_FILE_NAME, LoggingConfig, Verbosity, init_tracing};

// ============================================================================
// Verbosity Mapping
// ============================================================================

#[test]
fn verbose_counts_map_to_levels() {
    let expected = [
        (0, Verbosity::Quiet),
        (1, Verbosity::Normal),
        (2, Verbosity::Debug),
        (3, Verbosity::Trace),
        (9, Verbosity::Trace),
    ];
    for (count, verbosity) in expected {
        assert_eq!(LoggingConfig::from_verbose_level(count).verbosity, verbosity);
    }
}

#[test]
fn log_file_lives_in_the_log_folder() {
    let config = LoggingConfig::from_verbose_level(1).with_log_folder("/var/log/diff");
    assert_eq!(
        config.log_file().expect("file"),
        std::path::Path::new("/var/log/diff").join(LOG_FILE_NAME)
    );
}

// ============================================================================
// Global Subscriber
// ============================================================================

#[test]
fn events_reach_the_run_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let folder = dir.path().join("logs");
    let mut config = LoggingConfig::from_verbose_level(1).with_log_folder(&folder);
    config.honor_env = false;

    assert!(init_tracing(&config).expect("install"));
    tracing::info!(target: "diffgen::pipeline", stage = "tokenize", "stage finished");
    tracing::debug!(target: "diffgen::pipeline", "filtered out at info");

    let contents = fs::read_to_string(folder.join(LOG_FILE_NAME)).expect("log file");
    assert!(contents.contains("stage finished"), "{contents}");
    assert!(contents.contains("stage=\"tokenize\"") || contents.contains("stage=tokenize"));
    assert!(!contents.contains("filtered out at info"));

    // A second installation keeps the first.
    assert!(!init_tracing(&config).expect("second install"));
}
