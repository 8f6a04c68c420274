use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;

use crate::cli::CheckLinksArgs;
use crate::error::ConfigError;

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid href regex")
});

const IGNORED_PREFIXES: &[&str] = &[
    "http://",
    "https://",
    "mailto:",
    "tel:",
    "javascript:",
    "data:",
    "//",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    pub source: PathBuf,
    pub href: String,
    /// First resolution candidate, reported as the attempted target.
    pub resolved: PathBuf,
}

/// Result of a full scan, consumed by `main` to pick the exit code.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub broken: Vec<BrokenLink>,
    pub files_scanned: usize,
}

impl LinkReport {
    pub fn is_clean(&self) -> bool {
        self.broken.is_empty()
    }
}

pub fn run(args: CheckLinksArgs) -> anyhow::Result<LinkReport> {
    let root = PathBuf::from(&args.root);
    if !root.is_dir() {
        return Err(ConfigError::MissingSiteRoot(root).into());
    }
    let root = root
        .canonicalize()
        .with_context(|| format!("resolve site root: {}", root.display()))?;

    let prefixes = normalize_prefixes(&args.base_prefixes);
    tracing::debug!(root = %root.display(), ?prefixes, "check links");

    let report = check_site(&root, &prefixes)?;
    print_report(&root, &report);
    Ok(report)
}

/// Scans every `.html` file under `site_root`. The root is canonicalised first
/// so containment checks hold for relative or `..`-bearing roots.
pub fn check_site(site_root: &Path, base_prefixes: &[String]) -> anyhow::Result<LinkReport> {
    let site_root = site_root
        .canonicalize()
        .with_context(|| format!("resolve site root: {}", site_root.display()))?;
    let site_root = site_root.as_path();
    let html_files = list_html_files(site_root);
    let mut report = LinkReport::default();

    for file in html_files {
        let bytes = match std::fs::read(&file) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %file.display(), %err, "failed to read html file; skipping");
                continue;
            }
        };
        report.files_scanned += 1;
        let text = String::from_utf8_lossy(&bytes);

        for href in extract_hrefs(&text) {
            if is_ignored_href(&href) {
                continue;
            }

            let candidates = candidate_targets(site_root, &file, &href, base_prefixes);
            if candidates.iter().any(|c| c.exists()) {
                continue;
            }
            let Some(resolved) = candidates.into_iter().next() else {
                continue;
            };
            report.broken.push(BrokenLink {
                source: file.clone(),
                href,
                resolved,
            });
        }
    }

    Ok(report)
}

/// Trimmed values of every `href="..."` / `href='...'` attribute.
pub fn extract_hrefs(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_owned())
        .collect()
}

pub fn is_ignored_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return true;
    }
    let lowered = href.to_ascii_lowercase();
    IGNORED_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// Paths that would satisfy `href`, in preference order. The first element is
/// the literal target.
pub fn candidate_targets(
    site_root: &Path,
    source_file: &Path,
    href: &str,
    base_prefixes: &[String],
) -> Vec<PathBuf> {
    let mut path = link_path(href);

    let target = if path.starts_with('/') {
        if let Some(prefix) = base_prefixes
            .iter()
            .find(|prefix| path == **prefix || path.starts_with(&format!("{prefix}/")))
        {
            if !site_root.join(prefix.trim_start_matches('/')).exists() {
                path = match &path[prefix.len()..] {
                    "" => "/",
                    rest => rest,
                };
            }
        }
        normalize_path(&site_root.join(path.trim_start_matches('/')))
    } else {
        let base = source_file.parent().unwrap_or(site_root);
        normalize_path(&base.join(path))
    };

    if !target.starts_with(site_root) {
        return vec![target];
    }

    let has_extension = target.extension().is_some();
    let mut candidates = vec![target.clone()];
    if path.ends_with('/') || !has_extension {
        candidates.push(target.join("index.html"));
    }
    if !has_extension {
        candidates.push(target.with_extension("html"));
    }

    let mut out: Vec<PathBuf> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

/// Canonical form `/segment[/segment...]`; blank entries are dropped.
pub fn normalize_prefixes(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|prefix| prefix.trim().trim_matches('/'))
        .filter(|prefix| !prefix.is_empty())
        .map(|prefix| format!("/{prefix}"))
        .collect()
}

fn link_path(href: &str) -> &str {
    match href.find(['?', '#']) {
        Some(idx) => &href[..idx],
        None => href,
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn list_html_files(site_root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(site_root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(%err, "failed to walk site tree; skipping entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) == Some("html") {
            files.push(entry.into_path());
        }
    }
    files.sort();
    files
}

fn print_report(site_root: &Path, report: &LinkReport) {
    if report.is_clean() {
        println!("OK: no broken internal links found");
        return;
    }

    println!("Broken internal links: {}", report.broken.len());
    for link in &report.broken {
        let source = link.source.strip_prefix(site_root).unwrap_or(&link.source);
        let resolved = link
            .resolved
            .strip_prefix(site_root)
            .unwrap_or(&link.resolved);
        println!(
            "- {}: href=\"{}\" → {}",
            source.display(),
            link.href,
            resolved.display()
        );
    }
}
