//! tests cli_watch.rs
//! End-to-end runs of `sentinel watch` against real directories.

use predicates::str;
use std::fs;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

mod util;
use util::{bin, sentinel};

#[test]
fn missing_path_should_fail() {
    let tmp = tempdir().unwrap();
    sentinel()
        .args(["watch", &tmp.path().join("nope").to_string_lossy()])
        .assert()
        .failure()
        .stderr(str::contains("cannot start watcher"));
}

#[test]
fn invalid_exclusion_should_fail() {
    let tmp = tempdir().unwrap();
    sentinel()
        .args(["watch", &tmp.path().to_string_lossy(), "--exclude", "[oops"])
        .assert()
        .failure()
        .stderr(str::contains("invalid exclusion pattern"));
}

#[test]
fn bad_env_number_should_fail() {
    let tmp = tempdir().unwrap();
    sentinel()
        .env("SENTINEL_DEBOUNCE_MS", "soon")
        .args(["watch", &tmp.path().to_string_lossy(), "--duration-ms", "10"])
        .assert()
        .failure()
        .stderr(str::contains("SENTINEL_DEBOUNCE_MS"));
}

#[test]
fn completions_are_generated() {
    sentinel()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(str::contains("sentinel"));
}

#[test]
fn duration_limit_exits_cleanly() {
    let tmp = tempdir().unwrap();
    sentinel()
        .args([
            "watch",
            &tmp.path().to_string_lossy(),
            "--duration-ms",
            "300",
        ])
        .timeout(Duration::from_secs(20))
        .assert()
        .success();
}

#[test]
fn changes_are_printed() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();

    let child = Command::new(bin())
        .args([
            "watch",
            &root.to_string_lossy(),
            "--debounce-ms",
            "50",
            "--duration-ms",
            "3000",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    thread::sleep(Duration::from_millis(1000));
    fs::write(root.join("hello.txt"), b"hi").unwrap();

    let out = child.wait_with_output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains(&format!("CREATED {}", root.join("hello.txt").display())),
        "stdout was: {stdout}"
    );
}

#[test]
fn root_deletion_fails_the_run() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("doomed");
    fs::create_dir(&root).unwrap();

    let mut child = Command::new(bin())
        .args(["watch", &root.to_string_lossy(), "--duration-ms", "15000"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    thread::sleep(Duration::from_millis(1000));
    fs::remove_dir_all(&root).unwrap();

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if start.elapsed() > Duration::from_secs(10) {
            let _ = child.kill();
            panic!("sentinel did not exit after its root vanished");
        }
        thread::sleep(Duration::from_millis(50));
    };
    assert!(!status.success());
}
