//! Build invoker tests against fake commands.
//!
//! These use `sh` in place of npm so no Node toolchain is required.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_core::config::BuildConfig;
use kiln_core::{ProjectBuilder, RequestContext};
use kiln_runner::{
    run_command, BuildStatus, BuildStatusHub, NpmProjectBuilder, RecordingStatusSink, RunnerError,
};
use tempfile::TempDir;

fn fake_npm(dir: &Path, body: &str) -> String {
    let path = dir.join("fake-npm");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().to_string()
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("package.json"), "{\"name\":\"demo\"}").unwrap();
    temp
}

#[tokio::test]
async fn test_command_output_captured() {
    let temp = TempDir::new().unwrap();
    let output = run_command(
        temp.path(),
        "sh",
        &["-c", "echo hello; echo oops >&2; exit 3"],
        Duration::from_secs(10),
    )
    .await
    .unwrap();

    assert_eq!(output.exit_code, Some(3));
    assert_eq!(output.stdout, "hello\n");
    assert_eq!(output.stderr, "oops\n");
    assert!(!output.success());
}

#[tokio::test]
async fn test_command_killed_on_timeout() {
    let temp = TempDir::new().unwrap();
    let started = Instant::now();

    let err = run_command(temp.path(), "sleep", &["30"], Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::Timeout(d) if d == Duration::from_millis(200)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_successful_build_reports_status() {
    let project = project();
    let tools = TempDir::new().unwrap();
    let npm = fake_npm(tools.path(), "if [ \"$1\" = \"run\" ]; then mkdir -p dist; fi");
    let sink = RecordingStatusSink::new();
    let builder = NpmProjectBuilder::new(&BuildConfig::default(), Arc::new(sink.clone())).with_program(npm);

    assert!(builder.build(&RequestContext::new(1, 11), project.path()).await);
    assert!(project.path().join("dist").is_dir());
    assert_eq!(
        sink.statuses(),
        vec![BuildStatus::BuildStarted, BuildStatus::BuildSuccess]
    );
}

#[tokio::test]
async fn test_build_without_dist_fails() {
    let project = project();
    let tools = TempDir::new().unwrap();
    let npm = fake_npm(tools.path(), "exit 0");
    let sink = RecordingStatusSink::new();
    let builder = NpmProjectBuilder::new(&BuildConfig::default(), Arc::new(sink.clone())).with_program(npm);

    assert!(!builder.build(&RequestContext::new(1, 12), project.path()).await);
    assert!(matches!(
        &sink.statuses()[1],
        BuildStatus::BuildFailure { reason } if reason.contains("dist")
    ));
}

#[tokio::test]
async fn test_hung_install_times_out() {
    let project = project();
    let tools = TempDir::new().unwrap();
    let npm = fake_npm(tools.path(), "exec sleep 30");
    let sink = RecordingStatusSink::new();
    let builder = NpmProjectBuilder::new(&BuildConfig::default(), Arc::new(sink.clone()))
        .with_program(npm)
        .with_timeouts(Duration::from_millis(200), Duration::from_secs(1));

    assert!(!builder.build(&RequestContext::new(1, 13), project.path()).await);
    assert!(matches!(
        &sink.statuses()[1],
        BuildStatus::BuildFailure { reason } if reason.contains("timed out")
    ));
}

#[tokio::test]
async fn test_background_build_publishes_to_hub() {
    let project = project();
    let tools = TempDir::new().unwrap();
    let npm = fake_npm(tools.path(), "if [ \"$1\" = \"run\" ]; then mkdir -p dist; fi");
    let hub = BuildStatusHub::new();
    let mut updates = hub.subscribe_app(14);
    let builder = Arc::new(
        NpmProjectBuilder::new(&BuildConfig::default(), Arc::new(hub.clone())).with_program(npm),
    );

    let handle = builder.build_in_background(RequestContext::new(1, 14), project.path().to_path_buf());

    assert_eq!(updates.recv().await.unwrap().status, BuildStatus::BuildStarted);
    assert_eq!(updates.recv().await.unwrap().status, BuildStatus::BuildSuccess);
    assert_eq!(handle.await.unwrap(), Some(project.path().join("dist")));
}
