use balloonpipe::Opts;
use balloonpipe::engine::{estimate_remaining, format_remaining};
use balloonpipe::utils::balloonpipe_toml::{apply_file_to_opts, parse_balloonpipe_toml};
use balloonpipe::utils::{effective_timeout, resolve_worker_count};
use std::path::PathBuf;
use std::time::Duration;

// --- config file ---

#[test]
fn test_file_values_override_defaults() {
    let file = parse_balloonpipe_toml(
        "[settings]\ntool = \"/opt/balloon/balloon\"\nconformers = 5\nworkers = 3\ntimeout = 0\n",
    )
    .unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.tool, PathBuf::from("/opt/balloon/balloon"));
    assert_eq!(opts.conformers, 5);
    assert_eq!(opts.num_workers, Some(3));
    assert_eq!(opts.timeout_secs, 0);
    assert_eq!(opts.channel_cap, Opts::default().channel_cap);
}

#[test]
fn test_empty_file_changes_nothing() {
    let file = parse_balloonpipe_toml("").unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.conformers, 1);
    assert!(opts.num_workers.is_none());
    assert_eq!(opts.channel_cap, 10);
}

#[test]
fn test_malformed_file_is_an_error() {
    assert!(parse_balloonpipe_toml("[settings]\nconformers = \"many\"\n").is_err());
}

// --- timeouts and workers ---

#[test]
fn test_effective_timeout() {
    assert_eq!(effective_timeout(0), Duration::from_secs(60));
    assert_eq!(effective_timeout(7), Duration::from_secs(7));
}

#[test]
fn test_worker_count_never_zero() {
    assert!(resolve_worker_count(Some(0), 8) >= 1);
    assert!(resolve_worker_count(None, 0) >= 1);
    assert!(resolve_worker_count(Some(2), 8) <= 2);
}

// --- progress estimates ---

#[test]
fn test_estimate_remaining_linear() {
    let eta = estimate_remaining(Duration::from_secs(10), 5, 15).unwrap();
    assert_eq!(eta, Duration::from_secs(20));
    assert_eq!(estimate_remaining(Duration::from_secs(3), 0, 10), None);
    assert_eq!(
        estimate_remaining(Duration::from_secs(3), 10, 10),
        Some(Duration::ZERO)
    );
}

#[test]
fn test_format_remaining() {
    assert_eq!(format_remaining(Some(Duration::from_secs(42))), "about 42 sec remaining");
    assert_eq!(
        format_remaining(Some(Duration::from_secs(125))),
        "about 2 min 5 sec remaining"
    );
    assert_eq!(
        format_remaining(Some(Duration::from_secs(7260))),
        "about 2 h 1 min remaining"
    );
    assert_eq!(format_remaining(None), "unknown time remaining");
}

// --- tuning and report ---

#[test]
fn test_tuning_rejects_zero_values() {
    use balloonpipe::pipeline::PipelineTuning;
    assert!(PipelineTuning::default().validate().is_ok());
    for tuning in [
        PipelineTuning { num_workers: 0, ..Default::default() },
        PipelineTuning { channel_cap: 0, ..Default::default() },
        PipelineTuning { conformers: 0, ..Default::default() },
    ] {
        assert!(matches!(
            tuning.validate(),
            Err(balloonpipe::PipelineError::InvalidArgument(_))
        ));
    }
}

#[test]
fn test_report_serializes_failures_as_list() {
    use balloonpipe::{ConversionError, ItemError, RunReport};
    let mut report = RunReport {
        total: 3,
        converted: 1,
        ..Default::default()
    };
    report.failures.insert(
        2,
        ItemError::Conversion(ConversionError::Timeout(Duration::from_secs(60))),
    );
    report.failures.insert(3, ItemError::Load("no records".into()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    balloonpipe::pipeline::write_failure_report(&report, &path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(json["total"], 3);
    let failures = json["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0]["position"], 2);
    assert_eq!(failures[0]["kind"], "timeout");
    assert_eq!(failures[1]["kind"], "load");
    assert!(failures[1]["reason"].as_str().unwrap().contains("no records"));
}

// --- logging ---

#[test]
fn test_log_level_follows_verbose() {
    use balloonpipe::utils::logger::crate_level;
    assert_eq!(crate_level(true), log::LevelFilter::Debug);
    assert_eq!(crate_level(false), log::LevelFilter::Info);
}

#[test]
fn test_log_target_drops_crate_prefix() {
    use balloonpipe::utils::logger::short_target;
    assert_eq!(short_target("balloonpipe::pipeline::worker", "balloonpipe"), "pipeline::worker");
    assert_eq!(short_target("balloonpipe", "balloonpipe"), "balloonpipe");
    assert_eq!(short_target("crossbeam_channel", "balloonpipe"), "crossbeam_channel");
}
