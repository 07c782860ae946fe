//! Update checker state machine against a mock update repository.

use std::time::Duration;

use freeserver_lib::remote::RemoteRepo;
use freeserver_lib::update::{
    CheckPhase, CheckerSettings, UpdateChecker, UpdatePlan, DEFAULT_CHANGELOG,
};
use reqwest::Client;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILES: [&str; 3] = ["plugin.py", "ui.py", "downloader.py"];

fn checker(server: &MockServer, installed: &str, interval: Duration) -> UpdateChecker {
    UpdateChecker::new(
        Client::new(),
        RemoteRepo::new(format!("{}/repo/", server.uri())),
        UpdatePlan::new(FILES).unwrap(),
        installed,
        CheckerSettings {
            interval,
            version_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(2),
        },
    )
}

async fn mount_version(server: &MockServer, body: &str, delay_ms: u64) {
    Mock::given(method("GET"))
        .and(path("/repo/version.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(server)
        .await;
}

async fn mount_probes(server: &MockServer, failing: Option<&str>) {
    for file in FILES {
        let status = if Some(file) == failing { 404 } else { 200 };
        Mock::given(method("HEAD"))
            .and(path(format!("/repo/{}", file)))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_different_version_with_reachable_files_is_available() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nFaster parsing\n", 0).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    assert!(checker.check().await);

    let state = checker.state();
    assert_eq!(state.phase, CheckPhase::Available);
    assert!(state.update_available());
    assert!(state.last_check.is_some());
    let pending = checker.pending_update().unwrap();
    assert_eq!(pending.latest_version, "1.2");
    assert_eq!(pending.changelog, "Faster parsing");
}

#[tokio::test]
async fn test_second_check_within_interval_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repo/version.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1.2\nnotes\n"))
        .expect(1)
        .mount(&server)
        .await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    assert!(checker.check().await);
    assert!(!checker.check().await);
}

#[tokio::test]
async fn test_check_runs_again_after_interval() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nnotes\n", 0).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_millis(100));
    assert!(checker.check().await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(checker.check().await);
}

#[tokio::test]
async fn test_unreachable_file_fails_closed() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nnotes\n", 0).await;
    mount_probes(&server, Some("ui.py")).await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    assert!(!checker.check().await);

    let state = checker.state();
    assert_eq!(state.phase, CheckPhase::Idle);
    assert!(!state.update_available());
    assert!(state.last_check.is_none());
    assert!(checker.pending_update().is_none());
}

#[tokio::test]
async fn test_same_version_is_not_an_update() {
    let server = MockServer::start().await;
    mount_version(&server, "1.1\nnotes\n", 0).await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    assert!(!checker.check().await);
    assert_eq!(checker.state().phase, CheckPhase::Idle);
}

#[tokio::test]
async fn test_older_remote_version_still_counts_as_update() {
    let server = MockServer::start().await;
    mount_version(&server, "1.0\nrollback release\n", 0).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    assert!(checker.check().await);
    assert_eq!(checker.pending_update().unwrap().latest_version, "1.0");
}

#[tokio::test]
async fn test_missing_changelog_uses_default() {
    let server = MockServer::start().await;
    mount_version(&server, "2.0\n", 0).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    assert!(checker.check().await);
    assert_eq!(checker.pending_update().unwrap().changelog, DEFAULT_CHANGELOG);
}

#[tokio::test]
async fn test_version_descriptor_errors_fail_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repo/version.txt"))
        .respond_with(ResponseTemplate::new(404).set_body_string("2.0\n"))
        .mount(&server)
        .await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    assert!(!checker.check().await);

    let empty = MockServer::start().await;
    mount_version(&empty, "\n\n", 0).await;
    let checker = self::checker(&empty, "1.1", Duration::from_secs(3600));
    assert!(!checker.check().await);
}

#[tokio::test]
async fn test_concurrent_check_is_rejected_while_in_flight() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nnotes\n", 300).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    let (first, second) = tokio::join!(checker.check(), checker.check());
    assert!(first);
    assert!(!second);
}

#[tokio::test]
async fn test_mark_installed_clears_pending_update() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nnotes\n", 0).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_secs(3600));
    assert!(checker.check().await);
    checker.mark_installed("1.2");
    assert!(checker.pending_update().is_none());
    assert_eq!(checker.state().phase, CheckPhase::Idle);
    assert_eq!(checker.installed_version(), "1.2");
}

#[tokio::test]
async fn test_installed_update_is_not_offered_again() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nnotes\n", 0).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_millis(50));
    assert!(checker.check().await);
    checker.mark_installed("1.2");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!checker.check().await);
    assert!(checker.pending_update().is_none());
}

#[tokio::test]
async fn test_cancelled_check_does_not_block_later_checks() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nnotes\n", 300).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_millis(1));
    let timed_out = tokio::time::timeout(Duration::from_millis(50), checker.check()).await;
    assert!(timed_out.is_err());
    assert_eq!(checker.state().phase, CheckPhase::Idle);

    assert!(checker.check().await);
    assert_eq!(checker.state().phase, CheckPhase::Available);
}

#[tokio::test]
async fn test_failed_recheck_keeps_pending_update() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nnotes\n", 0).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_millis(1));
    assert!(checker.check().await);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/repo/version.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!checker.check().await);
    assert_eq!(checker.state().phase, CheckPhase::Available);
    assert_eq!(checker.pending_update().unwrap().latest_version, "1.2");
}

#[tokio::test]
async fn test_equal_remote_version_clears_pending_update() {
    let server = MockServer::start().await;
    mount_version(&server, "1.2\nnotes\n", 0).await;
    mount_probes(&server, None).await;

    let checker = checker(&server, "1.1", Duration::from_millis(1));
    assert!(checker.check().await);

    server.reset().await;
    mount_version(&server, "1.1\n", 0).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!checker.check().await);
    assert!(checker.pending_update().is_none());
}
