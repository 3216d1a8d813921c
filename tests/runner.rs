// tests/runner.rs
//
// `/bin/sh` stands in for the simulator: each input file is a small shell
// script that writes (or fails to write) its own output.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use moortune::io::runner::{FastRunner, Simulator, SimulatorError, TimeoutPolicy};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn sh() -> FastRunner {
    FastRunner::new("/bin/sh")
}

#[test]
fn outputs_are_archived_next_to_their_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let a = script(dir.path(), "case_a.fst", "printf a > case_a.outb\n");
    let b = script(dir.path(), "case_b.fst", "printf b > case_b.outb\n");

    let outputs = sh().run_all(&[&a, &b]).unwrap();
    let archive = dir.path().join("outb_files");
    assert_eq!(outputs, [archive.join("case_a.outb"), archive.join("case_b.outb")]);
    assert_eq!(fs::read_to_string(&outputs[0]).unwrap(), "a");
    assert_eq!(fs::read_to_string(&outputs[1]).unwrap(), "b");
    assert!(!dir.path().join("case_a.outb").exists());
    // the simulator's console output goes to a log beside the input
    assert!(dir.path().join("case_a.log").is_file());
}

#[test]
fn simulator_trait_returns_the_single_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = script(dir.path(), "run.fst", "printf x > run.outb\n");
    let mut runner = sh().with_archive_dir("done");
    let out = runner.run(&input).unwrap();
    assert_eq!(out, dir.path().join("done").join("run.outb"));
}

#[test]
fn failures_are_classified() {
    let dir = tempfile::tempdir().unwrap();

    let failing = script(dir.path(), "fail.fst", "exit 3\n");
    let err = sh().run_all(&[&failing]).unwrap_err();
    assert!(matches!(err, SimulatorError::ExitStatus { ref input, .. } if input == &failing), "{err}");

    let silent = script(dir.path(), "silent.fst", "true\n");
    let err = sh().run_all(&[&silent]).unwrap_err();
    assert!(matches!(err, SimulatorError::MissingOutput { ref path } if path == &dir.path().join("silent.outb")));

    let err = FastRunner::new(dir.path().join("no-such-exe")).run_all(&[&silent]).unwrap_err();
    assert!(matches!(err, SimulatorError::Spawn { .. }), "{err}");
}

#[test]
fn slow_runs_time_out_after_every_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let slow = script(dir.path(), "slow.fst", "sleep 5\nprintf x > slow.outb\n");
    let runner = sh()
        .with_timeout(Some(Duration::from_millis(100)))
        .with_poll_interval(Duration::from_millis(10))
        .with_timeout_policy(TimeoutPolicy::Retry { attempts: 2 });

    match runner.run_all(&[&slow]).unwrap_err() {
        SimulatorError::Timeout { attempts, timeout, .. } => {
            assert_eq!(attempts, 2);
            assert_eq!(timeout, Duration::from_millis(100));
        }
        other => panic!("expected Timeout, got {other}"),
    }
}
