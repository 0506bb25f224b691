//! E2E CLI workflow tests.
//!
//! Each test runs the `livefeed` binary as a subprocess in an isolated temp
//! directory: init, publish, edit, delete, then read the feed back through
//! the listing commands, the endpoints and the simulated loader.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the livefeed binary, rooted in `dir`.
fn lf_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("livefeed"));
    cmd.current_dir(dir);
    // Suppress tracing output that goes to stderr
    cmd.env("LIVEFEED_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

fn init_feed(dir: &Path, page_size: usize) {
    lf_cmd(dir)
        .args(["init", "--page-size", &page_size.to_string()])
        .assert()
        .success();
}

fn json_of(dir: &Path, args: &[&str]) -> Value {
    let output = lf_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Publish an entry at `at` and return its id.
fn add(dir: &Path, content: &str, at: i64, key_event: bool) -> u64 {
    let at = at.to_string();
    let mut args = vec!["add", content, "--at", &at];
    if key_event {
        args.push("--key-event");
    }
    json_of(dir, &args)["id"].as_u64().expect("id field")
}

fn get(dir: &Path, path: &str) -> Value {
    let output = lf_cmd(dir)
        .args(["get", path])
        .output()
        .expect("get should not crash");
    assert!(output.status.success(), "get {path} failed");
    serde_json::from_slice(&output.stdout).expect("get should print JSON")
}

fn ids(list: &Value) -> Vec<u64> {
    list.as_array()
        .expect("array")
        .iter()
        .map(|e| e["id"].as_u64().expect("id"))
        .collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_store() {
    let dir = TempDir::new().expect("tempdir");
    lf_cmd(dir.path())
        .args(["init", "--post-id", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized livefeed"));

    assert!(dir.path().join(".livefeed/config.toml").is_file());
    assert!(dir.path().join(".livefeed/feed.sqlite3").is_file());
    let config = std::fs::read_to_string(dir.path().join(".livefeed/config.toml")).expect("read");
    assert!(config.contains("post_id = 7"));
}

#[test]
fn init_twice_requires_force() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    lf_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    lf_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn commands_outside_a_feed_report_not_initialized() {
    let dir = TempDir::new().expect("tempdir");
    lf_cmd(dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"))
        .stderr(predicate::str::contains("livefeed init"));
}

#[test]
fn commands_work_from_a_subdirectory() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    add(dir.path(), "<p>hello</p>", 1_000, false);
    let nested = dir.path().join("deep/er");
    std::fs::create_dir_all(&nested).expect("mkdir");

    let listed = json_of(&nested, &["list"]);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[test]
fn edit_and_delete_shape_the_current_feed() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    let first = add(dir.path(), "<p>one</p>", 1_000, false);
    let second = add(dir.path(), "<p>two</p>", 1_060, false);
    let third = add(dir.path(), "<p>three</p>", 1_120, false);

    let edited = json_of(dir.path(), &["edit", &first.to_string(), "<p>one, fixed</p>", "--at", "1200"]);
    assert_eq!(edited["kind"], "update");
    assert_eq!(edited["target"].as_u64(), Some(first));
    json_of(dir.path(), &["delete", &second.to_string(), "--at", "1260"]);

    let current = json_of(dir.path(), &["list"]);
    assert_eq!(ids(&current), vec![third, first]);
    assert_eq!(current[1]["content"], "<p>one, fixed</p>");

    let raw = json_of(dir.path(), &["list", "--raw", "--order", "asc"]);
    assert_eq!(raw.as_array().map(Vec::len), Some(5));
    assert_eq!(raw[4]["kind"], "delete");

    let latest = json_of(dir.path(), &["latest"]);
    assert_eq!(latest["kind"], "delete");
}

#[test]
fn editing_a_deleted_entry_fails_with_not_found() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    let id = add(dir.path(), "<p>gone soon</p>", 1_000, false);
    json_of(dir.path(), &["delete", &id.to_string(), "--at", "1010"]);

    lf_cmd(dir.path())
        .args(["edit", &id.to_string(), "<p>too late</p>", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));
}

#[test]
fn empty_content_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    lf_cmd(dir.path())
        .args(["add", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be empty"));
}

#[test]
fn epoch_timestamp_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    lf_cmd(dir.path())
        .args(["add", "<p>too early</p>", "--at", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2003"));
    let listed = json_of(dir.path(), &["list", "--raw"]);
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
}

#[test]
fn zero_page_size_in_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    std::fs::write(dir.path().join(".livefeed/config.toml"), "[server]\npage_size = 0\n")
        .expect("write config");
    lf_cmd(dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("page_size must be at least 1"));
}

// ---------------------------------------------------------------------------
// Key events
// ---------------------------------------------------------------------------

#[test]
fn key_flags_follow_the_latest_record() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    let goal = add(dir.path(), "<p>goal</p>", 1_000, true);
    let card = add(dir.path(), "<p>card</p>", 1_060, false);
    json_of(dir.path(), &["key", &card.to_string(), "--at", "1100"]);

    assert_eq!(ids(&json_of(dir.path(), &["key-events"])), vec![card, goal]);

    json_of(dir.path(), &["key", &goal.to_string(), "--off", "--at", "1120"]);
    assert_eq!(ids(&json_of(dir.path(), &["key-events"])), vec![card]);

    // An edit without --key-event keeps the flag.
    json_of(dir.path(), &["edit", &card.to_string(), "<p>red card</p>", "--at", "1140"]);
    assert_eq!(ids(&json_of(dir.path(), &["key-events"])), vec![card]);
}

#[test]
fn between_is_inclusive_and_oldest_first() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    add(dir.path(), "<p>a</p>", 1_000, false);
    let b = add(dir.path(), "<p>b</p>", 1_060, false);
    let c = add(dir.path(), "<p>c</p>", 1_120, false);
    add(dir.path(), "<p>d</p>", 1_180, false);

    let range = json_of(dir.path(), &["between", "1060", "1120"]);
    assert_eq!(ids(&range), vec![b, c]);
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[test]
fn lazyload_pages_newest_first() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 2);
    for n in 0..5 {
        add(dir.path(), &format!("<p>{n}</p>"), 1_000 + n * 60, false);
    }

    let first = get(dir.path(), "lazyload/?index=0");
    assert_eq!(first["index"], 0);
    let entries = first["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["timestamp"], 1_240);
    assert_eq!(entries[0]["type"], "new");

    let older = get(dir.path(), "/liveblog/lazyload/1180/0/?index=3");
    assert_eq!(older["index"], 3);
    let stamps: Vec<i64> = older["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .map(|e| e["timestamp"].as_i64().expect("ts"))
        .collect();
    assert_eq!(stamps, vec![1_120, 1_060]);
}

#[test]
fn entry_endpoint_reports_neighbours() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    add(dir.path(), "<p>a</p>", 1_000, false);
    let b = add(dir.path(), "<p>b</p>", 1_060, true);
    add(dir.path(), "<p>c</p>", 1_120, false);

    let body = get(dir.path(), &format!("entry/{b}?index=4"));
    assert_eq!(body["index"], 4);
    assert_eq!(body["entries"][0]["id"].as_u64(), Some(b));
    assert_eq!(body["previousTimestamp"], 1_000);
    assert_eq!(body["nextTimestamp"], 1_120);

    let missing = get(dir.path(), "entry/999?index=0");
    assert_eq!(missing["entries"], serde_json::json!([]));
}

#[test]
fn unknown_route_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    lf_cmd(dir.path())
        .args(["get", "comments/3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2004"));
}

// ---------------------------------------------------------------------------
// Loader simulation
// ---------------------------------------------------------------------------

#[test]
fn simulate_renders_first_page_with_read_ahead() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 2);
    for n in 0..5 {
        add(dir.path(), &format!("<p>{n}</p>"), 1_000 + n * 60, false);
    }

    let report = json_of(dir.path(), &["simulate"]);
    assert_eq!(report["rendered"], 2);
    assert_eq!(report["state"], "idle");
    let requests = report["requests"].as_array().expect("requests");
    assert_eq!(requests.len(), 2);
    assert!(requests[0].as_str().is_some_and(|u| u.contains("lazyload/")));
}

#[test]
fn simulate_all_renders_every_live_entry_once() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 2);
    let mut live = Vec::new();
    for n in 0..7 {
        live.push(add(dir.path(), &format!("<p>{n}</p>"), 1_000 + n * 60, false));
    }
    json_of(dir.path(), &["delete", &live[3].to_string(), "--at", "2000"]);
    json_of(dir.path(), &["edit", &live[1].to_string(), "<p>edited</p>", "--at", "2060"]);

    let report = json_of(dir.path(), &["simulate", "--all"]);
    let rendered: Vec<u64> = report["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter(|item| item["item"] == "entry")
        .map(|item| item["entry"]["id"].as_u64().expect("id"))
        .collect();

    let mut expected: Vec<u64> = live.iter().copied().filter(|id| *id != live[3]).collect();
    expected.reverse();
    assert_eq!(rendered, expected);
    assert!(
        report["items"]
            .as_array()
            .expect("items")
            .iter()
            .all(|item| item["item"] == "entry")
    );
}

#[test]
fn simulate_text_output_lists_the_view() {
    let dir = TempDir::new().expect("tempdir");
    init_feed(dir.path(), 5);
    add(dir.path(), "<p>only</p>", 1_000, false);
    lf_cmd(dir.path())
        .args(["simulate", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>only</p>"))
        .stdout(predicate::str::contains("rendered: 1"));
}
