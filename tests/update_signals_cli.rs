mod github_stub;

use std::fs;
use std::path::Path;

use predicates::prelude::*;
use sitekit::formats::{SignalKind, SignalsSnapshot};

use github_stub::{GithubStub, GithubStubConfig};

const FEED_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Site</title>
  <id>urn:site</id>
  <updated>2026-02-01T00:00:00Z</updated>
  <entry>
    <title>Hello world</title>
    <id>urn:site:hello</id>
    <updated>2026-02-01T10:00:00Z</updated>
    <link href="https://example.com/hello"/>
  </entry>
</feed>
"#;

fn commits_body() -> String {
    serde_json::json!([
        {
            "sha": "aaa111",
            "html_url": "https://github.com/o/r/commit/aaa111",
            "commit": {"message": "First commit\n\nbody", "committer": {"date": "2026-02-02T00:00:00Z"}}
        },
        {
            "sha": "aaa111",
            "html_url": "https://github.com/o/r/commit/aaa111",
            "commit": {"message": "Duplicate id", "committer": {"date": "2026-02-03T00:00:00Z"}}
        },
        {
            "sha": "bbb222",
            "html_url": "https://github.com/o/r/commit/bbb222",
            "commit": {"message": "Second commit", "committer": {"date": "2026-02-01T00:00:00Z"}}
        }
    ])
    .to_string()
}

fn update_signals(site_root: &Path, api_base: &str) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sitekit");
    cmd.arg("update-signals")
        .arg("--site-root")
        .arg(site_root)
        .args(["--repo", "o/r", "--api-base", api_base])
        .assert()
}

fn read_snapshot(site_root: &Path) -> anyhow::Result<SignalsSnapshot> {
    let raw = fs::read_to_string(site_root.join("signals.json"))?;
    Ok(serde_json::from_str(&raw)?)
}

#[test]
fn merges_commits_and_feed_keeping_first_duplicate() -> anyhow::Result<()> {
    let stub = GithubStub::spawn(GithubStubConfig {
        status: 200,
        body: commits_body(),
    });
    let site = tempfile::TempDir::new()?;
    fs::write(site.path().join("feed.xml"), FEED_XML)?;

    update_signals(site.path(), &stub.base_url)
        .success()
        .stdout(predicate::str::contains("(3 items)"));

    let snapshot = read_snapshot(site.path())?;
    assert!(snapshot.generated_at.ends_with('Z'));
    let ids = snapshot
        .signals
        .iter()
        .map(|s| s.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["gh:aaa111", "gh:bbb222", "feed:urn:site:hello"]);
    assert_eq!(snapshot.signals[0].title, "First commit");
    assert_eq!(snapshot.signals[0].kind, SignalKind::Commit);
    assert_eq!(snapshot.signals[2].kind, SignalKind::Post);
    Ok(())
}

#[test]
fn unreachable_remote_degrades_to_error_record() -> anyhow::Result<()> {
    // Bind and release a port so nothing is listening on it.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let site = tempfile::TempDir::new()?;
    fs::write(site.path().join("feed.xml"), FEED_XML)?;

    update_signals(site.path(), &format!("http://{addr}")).success();

    let snapshot = read_snapshot(site.path())?;
    assert_eq!(snapshot.signals.len(), 2);
    let error = &snapshot.signals[0];
    assert_eq!(error.id, "github_error");
    assert_eq!(error.kind, SignalKind::Error);
    assert_eq!(error.url.as_deref(), Some("https://github.com/o/r"));
    assert!(error.note.is_some());
    assert_eq!(snapshot.signals[1].id, "feed:urn:site:hello");
    Ok(())
}

#[test]
fn http_error_status_and_missing_feed() -> anyhow::Result<()> {
    let stub = GithubStub::spawn(GithubStubConfig {
        status: 403,
        body: r#"{"message": "API rate limit exceeded"}"#.to_owned(),
    });
    let site = tempfile::TempDir::new()?;

    update_signals(site.path(), &stub.base_url).success();

    let snapshot = read_snapshot(site.path())?;
    assert_eq!(snapshot.signals.len(), 1);
    assert_eq!(snapshot.signals[0].id, "github_error");
    assert!(
        snapshot.signals[0]
            .note
            .as_deref()
            .is_some_and(|note| note.contains("403"))
    );
    Ok(())
}

#[test]
fn malformed_feed_and_bad_payload_both_surface_as_records() -> anyhow::Result<()> {
    let stub = GithubStub::spawn(GithubStubConfig {
        status: 200,
        body: r#"{"not": "a list"}"#.to_owned(),
    });
    let site = tempfile::TempDir::new()?;
    fs::write(site.path().join("feed.xml"), "<rss version=\"2.0\"></rss>")?;

    update_signals(site.path(), &stub.base_url).success();

    let raw = fs::read_to_string(site.path().join("signals.json"))?;
    assert!(raw.ends_with("}\n"));
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let signals = value["signals"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0]["id"], "github_error");
    assert_eq!(signals[1]["id"], "feed_error");
    assert_eq!(signals[1]["type"], "error");
    assert!(signals[1]["url"].is_null());
    Ok(())
}
