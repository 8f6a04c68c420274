use std::io::Write as _;
use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use zip::write::SimpleFileOptions;

use crate::cli::ArchiveArgs;
use crate::error::ConfigError;

/// Path components that never make it into an archive.
const JUNK_COMPONENTS: &[&str] = &[".DS_Store", "__pycache__"];

/// One regular file read from the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Entry name inside the archive (`/`-separated, prefix included).
    pub name: String,
    pub bytes: Vec<u8>,
    /// POSIX permission bits of the source file.
    pub mode: u32,
}

pub fn run(args: ArchiveArgs) -> anyhow::Result<()> {
    let source_dir = PathBuf::from(&args.source);
    let out_path = PathBuf::from(&args.out);

    if !source_dir.is_dir() {
        return Err(ConfigError::MissingSourceDir(source_dir).into());
    }

    let prefix = match args.entry_prefix {
        Some(prefix) => prefix,
        None => default_entry_prefix(&source_dir)?,
    };

    let entries = collect_entries(&source_dir, &prefix)?;
    if entries.is_empty() {
        return Err(ConfigError::EmptySourceDir(source_dir).into());
    }

    write_archive(&entries, &out_path)?;

    println!("Wrote: {}", out_path.display());
    println!("Files: {}", entries.len());
    Ok(())
}

/// Reads every non-junk regular file under `source_dir`, sorted
/// case-insensitively by entry name.
pub fn collect_entries(source_dir: &Path, prefix: &str) -> anyhow::Result<Vec<FileEntry>> {
    let prefix = prefix.trim_matches('/');
    let mut entries = Vec::new();

    for entry in walkdir::WalkDir::new(source_dir).follow_links(true) {
        let entry = entry.with_context(|| format!("walk source dir: {}", source_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel_path = path
            .strip_prefix(source_dir)
            .with_context(|| format!("strip source prefix: {}", path.display()))?;
        if is_junk(rel_path) {
            tracing::debug!(path = %rel_path.display(), "skip junk file");
            continue;
        }

        let metadata = entry
            .metadata()
            .with_context(|| format!("stat: {}", path.display()))?;
        let bytes = std::fs::read(path).with_context(|| format!("read: {}", path.display()))?;

        entries.push(FileEntry {
            name: entry_name(prefix, rel_path),
            bytes,
            mode: file_mode(&metadata),
        });
    }

    entries.sort_by_cached_key(|entry| entry.name.to_lowercase());
    Ok(entries)
}

/// Writes `entries` to a temporary file next to `out_path` and renames it into
/// place, so an interrupted run leaves any previous archive intact.
pub fn write_archive(entries: &[FileEntry], out_path: &Path) -> anyhow::Result<()> {
    let parent = match out_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)
        .with_context(|| format!("create archive parent dir: {}", parent.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".sitekit-archive")
        .suffix(".tmp")
        .tempfile_in(&parent)
        .with_context(|| format!("create temp archive in {}", parent.display()))?;

    {
        let mut zip = zip::ZipWriter::new(tmp.as_file_mut());
        for entry in entries {
            let options = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .last_modified_time(fixed_timestamp())
                .unix_permissions(entry.mode);
            zip.start_file(entry.name.as_str(), options)
                .with_context(|| format!("zip start_file: {}", entry.name))?;
            zip.write_all(&entry.bytes)
                .with_context(|| format!("zip write: {}", entry.name))?;
        }
        zip.finish().context("zip finish")?;
    }

    tmp.as_file()
        .sync_all()
        .context("sync temp archive")?;
    set_default_permissions(tmp.as_file())?;
    tmp.persist(out_path)
        .with_context(|| format!("rename temp archive to {}", out_path.display()))?;

    tracing::debug!(out = %out_path.display(), entries = entries.len(), "archive written");
    Ok(())
}

/// 1980-01-01T00:00:00, the earliest timestamp the zip format can represent.
pub fn fixed_timestamp() -> zip::DateTime {
    zip::DateTime::default()
}

pub fn is_junk(rel_path: &Path) -> bool {
    rel_path.components().any(|component| match component {
        Component::Normal(name) => JUNK_COMPONENTS.iter().any(|junk| name == *junk),
        _ => false,
    })
}

fn entry_name(prefix: &str, rel_path: &Path) -> String {
    let rel = rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if prefix.is_empty() {
        rel
    } else {
        format!("{prefix}/{rel}")
    }
}

fn default_entry_prefix(source_dir: &Path) -> anyhow::Result<String> {
    let resolved = source_dir
        .canonicalize()
        .with_context(|| format!("resolve source dir: {}", source_dir.display()))?;
    Ok(resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default())
}

// Only rwx bits survive: `unix_permissions` masks to 0o777 and the writer adds
// the regular-file type bits itself. setuid/setgid/sticky are not archived.
#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt as _;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

// Temp files are created 0600; the published archive should be world-readable.
#[cfg(unix)]
fn set_default_permissions(file: &std::fs::File) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
        .context("set archive permissions")
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &std::fs::File) -> anyhow::Result<()> {
    Ok(())
}
