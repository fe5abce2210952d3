use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::{FileTime, set_file_times};
use tracing::{debug, info};

use crate::allowlist::Allowlist;
use crate::error::{SnapshotError, SnapshotResult};
use crate::filter::PathFilter;
use crate::report::SnapshotReport;
use crate::walk::{SnapshotEntry, SnapshotSink, walk_snapshot};

/// Mirrors the allowlisted part of `source_root` into `dest_root`.
///
/// `dest_root` is created if needed. Allowlisted files overwrite whatever is
/// at their destination; allowlisted directories replace their destination
/// subtree completely, so nothing stale survives from an earlier run. Copied
/// files keep their permissions and access/modification times.
pub fn snapshot_to_directory(
    source_root: &Path,
    dest_root: &Path,
    allowlist: &Allowlist,
    filter: &dyn PathFilter,
) -> SnapshotResult<SnapshotReport> {
    ensure_no_overlap(source_root, dest_root, allowlist)?;

    if dest_root.is_dir() {
        debug!(dest = %dest_root.display(), "destination exists");
    } else {
        fs::create_dir_all(dest_root)
            .map_err(|e| SnapshotError::io("create_destination", dest_root, e))?;
        info!(dest = %dest_root.display(), "created destination directory");
    }

    let mut sink = DirectorySink::new(dest_root);
    walk_snapshot(source_root, allowlist, filter, &mut sink)?;
    Ok(sink.report)
}

/// Refuses to copy a directory into itself, and refuses to delete a stale
/// destination subtree that holds the source. Runs before the destination
/// exists, so nothing is created inside the source on rejection.
fn ensure_no_overlap(
    source_root: &Path,
    dest_root: &Path,
    allowlist: &Allowlist,
) -> SnapshotResult<()> {
    let dest = resolve_planned(dest_root)?;
    let source = fs::canonicalize(source_root)
        .map_err(|e| SnapshotError::io("read_source_root", source_root, e))?;
    if dest == source {
        return Err(SnapshotError::Overlap {
            source_dir: source_root.to_path_buf(),
            destination: dest_root.to_path_buf(),
        });
    }

    for relative in allowlist.dirs() {
        let source_dir = source_root.join(relative);
        let Some(resolved) = resolve_existing(&source_dir)? else {
            continue;
        };
        let target = resolve_existing(&dest_root.join(relative))?;
        let clobbers_source = target.is_some_and(|t| resolved.starts_with(t));
        if dest.starts_with(&resolved) || clobbers_source {
            return Err(SnapshotError::Overlap {
                source_dir,
                destination: dest_root.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet: the nearest existing
/// ancestor is resolved and the missing tail appended.
fn resolve_planned(path: &Path) -> SnapshotResult<PathBuf> {
    let absolute =
        std::path::absolute(path).map_err(|e| SnapshotError::io("resolve_destination", path, e))?;
    for ancestor in absolute.ancestors() {
        let Some(resolved) = resolve_existing(ancestor)? else {
            continue;
        };
        let tail = absolute.strip_prefix(ancestor).unwrap_or(Path::new(""));
        return Ok(resolved.join(tail));
    }
    Ok(absolute)
}

fn resolve_existing(path: &Path) -> SnapshotResult<Option<PathBuf>> {
    match fs::canonicalize(path) {
        Ok(resolved) => Ok(Some(resolved)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SnapshotError::io("resolve_path", path, e)),
    }
}

/// Sink that materializes entries under a destination directory.
#[derive(Debug)]
pub struct DirectorySink {
    dest_root: PathBuf,
    report: SnapshotReport,
}

impl DirectorySink {
    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
            report: SnapshotReport::default(),
        }
    }
}

impl SnapshotSink for DirectorySink {
    fn begin_directory(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()> {
        let target = self.dest_root.join(&entry.relative);
        remove_existing(&target)?;
        fs::create_dir_all(&target)
            .map_err(|e| SnapshotError::io("create_directory", &target, e))?;
        self.report.record(entry);
        info!(entry = %entry.relative.display(), "copying folder");
        Ok(())
    }

    fn write_directory(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()> {
        let target = self.dest_root.join(&entry.relative);
        fs::create_dir_all(&target)
            .map_err(|e| SnapshotError::io("create_directory", &target, e))?;
        self.report.record(entry);
        Ok(())
    }

    fn write_file(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()> {
        let target = self.dest_root.join(&entry.relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SnapshotError::io("create_parent", parent, e))?;
        }
        copy_file_with_metadata(&entry.source, &target)?;
        self.report.record(entry);
        debug!(entry = %entry.relative.display(), "copied");
        Ok(())
    }
}

/// Deletes whatever sits at `target`, directory tree or single file.
fn remove_existing(target: &Path) -> SnapshotResult<()> {
    let meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(SnapshotError::io("stat_destination", target, e)),
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    removed.map_err(|e| SnapshotError::io("remove_stale_destination", target, e))?;
    debug!(path = %target.display(), "removed stale destination");
    Ok(())
}

fn copy_file_with_metadata(source: &Path, target: &Path) -> SnapshotResult<()> {
    fs::copy(source, target).map_err(|e| SnapshotError::io("copy_file", source, e))?;

    let meta = fs::metadata(source).map_err(|e| SnapshotError::io("read_metadata", source, e))?;
    fs::set_permissions(target, meta.permissions())
        .map_err(|e| SnapshotError::io("set_permissions", target, e))?;
    set_file_times(
        target,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .map_err(|e| SnapshotError::io("set_file_times", target, e))
}
