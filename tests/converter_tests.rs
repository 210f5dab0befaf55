//! BalloonRunner tests against small shell scripts standing in for the external tool (Unix only).
#![cfg(unix)]

use balloonpipe::engine::{BalloonRunner, Converter, convert_file, convert_files, validate_args};
use balloonpipe::error::{ConversionError, ItemError};
use balloonpipe::pipeline::{CancelToken, PipelineTuning, RunHooks, run_pipeline};
use balloonpipe::store::{SdfStore, SdfWriter};
use balloonpipe::utils::ArtifactDir;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Writing an executable while another test thread forks can fail with "text file busy"; run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Write an executable `/bin/sh` script. The tool is called as `<tool> -c<N> <input> <output>`.
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn input_file(dir: &Path) -> PathBuf {
    let path = dir.join("in.mol");
    fs::write(&path, "mol-1\n  test\n\nM  END\n").unwrap();
    path
}

// --- validate_args ---

#[test]
fn test_validate_rejects_equal_paths() {
    let p = Path::new("/tmp/a.mol");
    assert!(matches!(
        validate_args(p, p, 1),
        Err(ConversionError::InvalidArgument(_))
    ));
}

#[test]
fn test_validate_rejects_empty_path() {
    assert!(matches!(
        validate_args(Path::new(""), Path::new("/tmp/b.mdl"), 1),
        Err(ConversionError::InvalidArgument(_))
    ));
}

#[test]
fn test_validate_rejects_zero_conformers() {
    assert!(matches!(
        validate_args(Path::new("/tmp/a.mol"), Path::new("/tmp/b.mdl"), 0),
        Err(ConversionError::InvalidArgument(_))
    ));
}

#[test]
fn test_zero_timeout_falls_back_to_default() {
    let runner = BalloonRunner::new("balloon", 0);
    assert_eq!(runner.timeout(), Duration::from_secs(60));
}

// --- BalloonRunner ---

#[test]
fn test_runner_success_writes_output_and_keeps_input() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "ok.sh", "cp \"$2\" \"$3\"");
    let input = input_file(dir.path());
    let before = fs::read_to_string(&input).unwrap();
    let output = dir.path().join("out.mdl");

    BalloonRunner::new(&tool, 10)
        .convert(&input, &output, 1, &CancelToken::new())
        .unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), before);
    assert_eq!(fs::read_to_string(&input).unwrap(), before);
}

#[test]
fn test_runner_passes_conformer_flag() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "flag.sh", "echo \"$1\" > \"$3\"");
    let input = input_file(dir.path());
    let output = dir.path().join("out.sdf");

    BalloonRunner::new(&tool, 10)
        .convert(&input, &output, 5, &CancelToken::new())
        .unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap().trim(), "-c5");
}

#[test]
fn test_runner_nonzero_exit_is_process_failed() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "fail.sh", "echo partial > \"$3\"\nexit 3");
    let input = input_file(dir.path());
    let output = dir.path().join("out.mdl");

    let err = BalloonRunner::new(&tool, 10)
        .convert(&input, &output, 1, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, ConversionError::ProcessFailed(_)));
    assert!(!output.exists());
}

#[test]
fn test_runner_missing_output_is_process_failed() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "noop.sh", "exit 0");
    let input = input_file(dir.path());

    let err = BalloonRunner::new(&tool, 10)
        .convert(&input, &dir.path().join("out.mdl"), 1, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, ConversionError::ProcessFailed(_)));
}

#[test]
fn test_runner_slow_tool_times_out() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "slow.sh", "sleep 5\ncp \"$2\" \"$3\"");
    let input = input_file(dir.path());
    let output = dir.path().join("out.mdl");
    let runner = BalloonRunner::new(&tool, 10).with_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = runner
        .convert(&input, &output, 1, &CancelToken::new())
        .unwrap_err();

    assert_eq!(err, ConversionError::Timeout(Duration::from_millis(200)));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!output.exists());
}

#[test]
fn test_runner_cancel_kills_child() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "slow.sh", "sleep 5\ncp \"$2\" \"$3\"");
    let input = input_file(dir.path());
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        trigger.cancel();
    });

    let started = Instant::now();
    let err = BalloonRunner::new(&tool, 30)
        .convert(&input, &dir.path().join("out.mdl"), 1, &cancel)
        .unwrap_err();
    canceller.join().unwrap();

    assert_eq!(err, ConversionError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_runner_missing_program_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let err = BalloonRunner::new(dir.path().join("no-such-tool"), 10)
        .convert(&input, &dir.path().join("out.mdl"), 1, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, ConversionError::Io(_)));
}

// --- single-file mode ---

#[test]
fn test_convert_file_derives_output_name() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "ok.sh", "cp \"$2\" \"$3\"");
    let input = input_file(dir.path());
    let runner = BalloonRunner::new(&tool, 10);

    let first = convert_file(&input, None, 1, &runner, &CancelToken::new()).unwrap();
    let second = convert_file(&input, None, 1, &runner, &CancelToken::new()).unwrap();

    assert_eq!(first, dir.path().join("in_3d.mdl"));
    assert_eq!(second, dir.path().join("in_3d_1.mdl"));
}

#[test]
fn test_convert_file_rejects_same_output_and_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let runner = BalloonRunner::new("balloon", 10);
    let cancel = CancelToken::new();

    assert!(matches!(
        convert_file(&input, Some(&input), 1, &runner, &cancel),
        Err(ConversionError::InvalidArgument(_))
    ));
    let txt = dir.path().join("notes.txt");
    fs::write(&txt, "x").unwrap();
    assert!(matches!(
        convert_file(&txt, None, 1, &runner, &cancel),
        Err(ConversionError::InvalidArgument(_))
    ));
}

#[test]
fn test_convert_files_runs_each_input() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "ok.sh", "cp \"$2\" \"$3\"");
    let a = dir.path().join("a.mol");
    let b = dir.path().join("b.smi");
    fs::write(&a, "a\n\n\nM  END\n").unwrap();
    fs::write(&b, "CCO\n").unwrap();

    let written = convert_files(
        &[a, b],
        1,
        &BalloonRunner::new(&tool, 10),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(
        written,
        vec![dir.path().join("a_3d.mdl"), dir.path().join("b_3d.mdl")]
    );
    assert!(written.iter().all(|p| p.is_file()));
}

// --- end to end through a real subprocess ---

#[test]
fn test_pipeline_with_script_tool_reports_timeout_for_slow_record() {
    let _g = serial();
    let dir = tempfile::tempdir().unwrap();
    // Record mol-5 hangs; everything else converts by copying.
    let tool = script(
        dir.path(),
        "balloon.sh",
        "if grep -q '^mol-5$' \"$2\"; then sleep 5; fi\ncp \"$2\" \"$3\"",
    );
    let mut text = String::new();
    for i in 1..=12 {
        text.push_str(&format!("mol-{i}\n  test\n\nM  END\n> <ID>\n{i}\n\n$$$$\n"));
    }
    let input = dir.path().join("batch.sdf");
    fs::write(&input, text).unwrap();
    let output = dir.path().join("batch_3d.sdf");
    let runner = Arc::new(BalloonRunner::new(&tool, 10).with_timeout(Duration::from_millis(500)));
    let tuning = PipelineTuning {
        num_workers: 4,
        grace_period: Duration::from_secs(2),
        ..Default::default()
    };
    let artifacts = Arc::new(ArtifactDir::new_in(dir.path()).unwrap());

    let outcome = run_pipeline(
        &input,
        Arc::new(SdfStore::new()),
        SdfWriter::create(&output).unwrap(),
        runner,
        Arc::clone(&artifacts),
        &tuning,
        &RunHooks::default(),
    )
    .unwrap();
    drop(outcome.sink);

    assert_eq!(outcome.report.failed_positions(), vec![5]);
    assert!(matches!(
        outcome.report.failures[&5],
        ItemError::Conversion(ConversionError::Timeout(_))
    ));
    let written = fs::read_to_string(&output).unwrap();
    let titles: Vec<&str> = written
        .split("$$$$\n")
        .filter(|r| !r.trim().is_empty())
        .map(|r| r.lines().next().unwrap())
        .collect();
    let expected: Vec<String> = [1, 2, 3, 4, 6, 7, 8, 9, 10, 11, 12]
        .iter()
        .map(|i| format!("mol-{i}"))
        .collect();
    assert_eq!(titles, expected);
    assert_eq!(artifacts.remaining(), 0);
}
