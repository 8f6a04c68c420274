use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use url::Url;

use crate::cli::UpdateSignalsArgs;
use crate::formats::{Signal, SignalKind, SignalsSnapshot};

pub const FEED_FILE_NAME: &str = "feed.xml";
pub const OUTPUT_FILE_NAME: &str = "signals.json";

const COMMITS_PER_PAGE: u32 = 20;
const FEED_ENTRY_LIMIT: usize = 12;
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT_VALUE: &str = "sitekit-signals-generator";
const FEED_SOURCE: &str = "Moltbook (cached feed.xml)";

/// What one best-effort source produced. A failed source still contributes a
/// record, so the snapshot shows what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Records(Vec<Signal>),
    Failed(Signal),
}

impl SourceOutcome {
    pub fn into_signals(self) -> Vec<Signal> {
        match self {
            Self::Records(records) => records,
            Self::Failed(record) => vec![record],
        }
    }
}

pub fn run(args: UpdateSignalsArgs) -> anyhow::Result<()> {
    let site_root = PathBuf::from(&args.site_root);
    let feed_path = site_root.join(FEED_FILE_NAME);
    let out_path = site_root.join(OUTPUT_FILE_NAME);

    let remote = fetch_commits(&args.api_base, &args.repo);
    let local = read_local_feed(&feed_path);

    let snapshot = SignalsSnapshot {
        generated_at: iso_now(),
        signals: merge_signals([remote, local]),
    };
    write_snapshot(&out_path, &snapshot)?;

    println!(
        "Wrote {} ({} items)",
        out_path.display(),
        snapshot.signals.len()
    );
    Ok(())
}

/// Concatenates outcomes in order and drops repeated ids, keeping the first.
pub fn merge_signals(outcomes: impl IntoIterator<Item = SourceOutcome>) -> Vec<Signal> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for signal in outcomes.into_iter().flat_map(SourceOutcome::into_signals) {
        if signal.id.is_empty() || !seen.insert(signal.id.clone()) {
            continue;
        }
        merged.push(signal);
    }
    merged
}

pub fn fetch_commits(api_base: &str, repo: &str) -> SourceOutcome {
    match try_fetch_commits(api_base, repo) {
        Ok(records) => {
            tracing::info!(repo, count = records.len(), "fetched commits");
            SourceOutcome::Records(records)
        }
        Err(err) => {
            tracing::warn!(repo, error = %format!("{err:#}"), "commit feed unavailable");
            SourceOutcome::Failed(Signal {
                id: "github_error".to_owned(),
                kind: SignalKind::Error,
                source: "GitHub".to_owned(),
                ts: iso_now(),
                title: "Failed to fetch GitHub commits (best-effort)".to_owned(),
                url: Some(format!("https://github.com/{repo}")),
                note: Some(format!("{err:#}")),
            })
        }
    }
}

pub fn read_local_feed(feed_path: &Path) -> SourceOutcome {
    if !feed_path.exists() {
        tracing::debug!(path = %feed_path.display(), "no local feed");
        return SourceOutcome::Records(Vec::new());
    }

    match parse_feed(feed_path) {
        Ok(records) => {
            tracing::info!(path = %feed_path.display(), count = records.len(), "read local feed");
            SourceOutcome::Records(records)
        }
        Err(err) => {
            tracing::warn!(path = %feed_path.display(), error = %format!("{err:#}"), "local feed unreadable");
            SourceOutcome::Failed(Signal {
                id: "feed_error".to_owned(),
                kind: SignalKind::Error,
                source: "local".to_owned(),
                ts: iso_now(),
                title: format!("Failed to parse {FEED_FILE_NAME}"),
                url: None,
                note: Some(format!("{err:#}")),
            })
        }
    }
}

pub fn write_snapshot(out_path: &Path, snapshot: &SignalsSnapshot) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(snapshot).context("serialize signals")?;
    json.push('\n');
    std::fs::write(out_path, json)
        .with_context(|| format!("write signals: {}", out_path.display()))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: Option<String>,
    html_url: Option<String>,
    commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: Option<String>,
    committer: Option<CommitPerson>,
}

#[derive(Debug, Deserialize)]
struct CommitPerson {
    date: Option<String>,
}

fn commits_url(api_base: &str, repo: &str) -> anyhow::Result<Url> {
    let base = api_base.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/repos/{repo}/commits"))
        .with_context(|| format!("build commits url from {api_base}"))?;
    url.query_pairs_mut()
        .append_pair("per_page", &COMMITS_PER_PAGE.to_string());
    Ok(url)
}

fn try_fetch_commits(api_base: &str, repo: &str) -> anyhow::Result<Vec<Signal>> {
    let url = commits_url(api_base, repo)?;

    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("build commits http client")?;

    let response = client
        .get(url.clone())
        .header(USER_AGENT, USER_AGENT_VALUE)
        .header(ACCEPT, "application/vnd.github+json")
        .send()
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;

    let commits: Vec<CommitItem> = response.json().context("parse commits response")?;
    Ok(signals_from_commits(commits))
}

fn signals_from_commits(commits: Vec<CommitItem>) -> Vec<Signal> {
    commits
        .into_iter()
        .filter_map(|item| {
            let sha = non_empty(item.sha)?;
            let html_url = non_empty(item.html_url)?;
            let commit = item.commit?;
            let title = commit
                .message
                .as_deref()
                .and_then(|m| m.lines().next())
                .map(str::trim)
                .filter(|t| !t.is_empty())?
                .to_owned();
            let when = non_empty(commit.committer.and_then(|c| c.date))?;

            Some(Signal {
                id: format!("gh:{sha}"),
                kind: SignalKind::Commit,
                source: "GitHub".to_owned(),
                ts: when,
                title,
                url: Some(html_url),
                note: None,
            })
        })
        .collect()
}

fn parse_feed(feed_path: &Path) -> anyhow::Result<Vec<Signal>> {
    let file =
        File::open(feed_path).with_context(|| format!("open feed: {}", feed_path.display()))?;
    let feed = atom_syndication::Feed::read_from(BufReader::new(file))
        .with_context(|| format!("parse atom feed: {}", feed_path.display()))?;

    let records = feed
        .entries()
        .iter()
        .take(FEED_ENTRY_LIMIT)
        .filter_map(|entry| {
            let title = entry.title().value.trim();
            let url = entry.links().first().map(|link| link.href().trim())?;
            if title.is_empty() || url.is_empty() || !has_updated(entry) {
                return None;
            }
            let id = match entry.id().trim() {
                "" => url,
                id => id,
            };

            Some(Signal {
                id: format!("feed:{id}"),
                kind: SignalKind::Post,
                source: FEED_SOURCE.to_owned(),
                ts: entry
                    .updated()
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
                title: title.to_owned(),
                url: Some(url.to_owned()),
                note: None,
            })
        })
        .collect();
    Ok(records)
}

// A missing `<updated>` parses as the Unix epoch.
fn has_updated(entry: &atom_syndication::Entry) -> bool {
    entry.updated().timestamp() != 0
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
