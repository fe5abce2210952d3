use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::allowlist::Allowlist;
use crate::error::{SnapshotError, SnapshotResult};
use crate::filter::PathFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One file or directory found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Path relative to the source root; also the path in the destination.
    pub relative: PathBuf,
    /// Absolute (or caller-relative) path in the source tree.
    pub source: PathBuf,
    pub kind: EntryKind,
    /// Content length for files, zero for directories.
    pub len: u64,
}

impl SnapshotEntry {
    fn file(relative: PathBuf, source: PathBuf, len: u64) -> Self {
        Self {
            relative,
            source,
            kind: EntryKind::File,
            len,
        }
    }

    fn directory(relative: PathBuf, source: PathBuf) -> Self {
        Self {
            relative,
            source,
            kind: EntryKind::Directory,
            len: 0,
        }
    }
}

/// Destination side of a snapshot walk.
///
/// The walker calls these in source order and stops at the first error.
pub trait SnapshotSink {
    /// An allowlisted directory that exists in the source, announced before
    /// any of its content.
    fn begin_directory(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()>;

    /// A directory somewhere beneath an allowlisted directory.
    fn write_directory(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()>;

    /// A file, either allowlisted itself or found beneath an allowlisted directory.
    fn write_file(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()>;
}

/// Walks the allowlist under `source_root` and feeds every present entry to `sink`.
///
/// Files come first, in allowlist order, then each directory subtree.
/// Entries missing from the source are skipped. Symbolic links are followed.
pub fn walk_snapshot<S>(
    source_root: &Path,
    allowlist: &Allowlist,
    filter: &dyn PathFilter,
    sink: &mut S,
) -> SnapshotResult<()>
where
    S: SnapshotSink + ?Sized,
{
    let root_meta = fs::metadata(source_root)
        .map_err(|e| SnapshotError::io("read_source_root", source_root, e))?;
    if !root_meta.is_dir() {
        return Err(SnapshotError::NotADirectory {
            path: source_root.to_path_buf(),
        });
    }

    for relative in allowlist.files() {
        if !filter.includes(relative) {
            debug!(entry = %relative.display(), "skip pattern matched file entry");
            continue;
        }
        let source = source_root.join(relative);
        let Some(meta) = existing(&source)? else {
            debug!(entry = %relative.display(), "file entry not present in source");
            continue;
        };
        sink.write_file(&SnapshotEntry::file(relative.clone(), source, meta.len()))?;
    }

    for relative in allowlist.dirs() {
        if !filter.includes(relative) {
            debug!(entry = %relative.display(), "skip pattern matched directory entry");
            continue;
        }
        let source = source_root.join(relative);
        let Some(meta) = existing(&source)? else {
            debug!(entry = %relative.display(), "directory entry not present in source");
            continue;
        };
        if !meta.is_dir() {
            return Err(SnapshotError::NotADirectory { path: source });
        }
        sink.begin_directory(&SnapshotEntry::directory(relative.clone(), source.clone()))?;
        walk_subtree(source_root, &source, filter, sink)?;
    }

    Ok(())
}

fn walk_subtree<S>(
    source_root: &Path,
    dir: &Path,
    filter: &dyn PathFilter,
    sink: &mut S,
) -> SnapshotResult<()>
where
    S: SnapshotSink + ?Sized,
{
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| filter.includes(&relative_path(e.path(), source_root)));

    for entry in walker {
        let entry = entry.map_err(|e| SnapshotError::walk("walk_directory", dir, e))?;
        let relative = relative_path(entry.path(), source_root);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            sink.write_directory(&SnapshotEntry::directory(
                relative,
                entry.path().to_path_buf(),
            ))?;
        } else if file_type.is_file() {
            let len = entry
                .metadata()
                .map_err(|e| SnapshotError::walk("read_metadata", entry.path(), e))?
                .len();
            sink.write_file(&SnapshotEntry::file(
                relative,
                entry.path().to_path_buf(),
                len,
            ))?;
        } else {
            debug!(path = %entry.path().display(), "skipping special file");
        }
    }

    Ok(())
}

/// `Some(metadata)` if `path` exists, `None` if it does not.
fn existing(path: &Path) -> SnapshotResult<Option<Metadata>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SnapshotError::io("stat_entry", path, e)),
    }
}

fn relative_path(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

/// Collected entries of a dry run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotPlan {
    pub entries: Vec<SnapshotEntry>,
}

impl SnapshotPlan {
    pub fn files(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    pub fn total_size(&self) -> u64 {
        self.files().map(|e| e.len).sum()
    }
}

/// Sink that records entries instead of writing them.
#[derive(Debug, Default)]
pub struct PlanSink {
    plan: SnapshotPlan,
}

impl PlanSink {
    pub fn into_plan(self) -> SnapshotPlan {
        self.plan
    }
}

impl SnapshotSink for PlanSink {
    fn begin_directory(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()> {
        self.plan.entries.push(entry.clone());
        Ok(())
    }

    fn write_directory(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()> {
        self.plan.entries.push(entry.clone());
        Ok(())
    }

    fn write_file(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()> {
        self.plan.entries.push(entry.clone());
        Ok(())
    }
}

/// Lists what a snapshot of `source_root` would contain, writing nothing.
pub fn plan_snapshot(
    source_root: &Path,
    allowlist: &Allowlist,
    filter: &dyn PathFilter,
) -> SnapshotResult<SnapshotPlan> {
    let mut sink = PlanSink::default();
    walk_snapshot(source_root, allowlist, filter, &mut sink)?;
    Ok(sink.into_plan())
}
