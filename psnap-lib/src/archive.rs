use std::collections::HashSet;
use std::fs::{self, File, Metadata};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::allowlist::Allowlist;
use crate::error::{SnapshotError, SnapshotResult};
use crate::filter::PathFilter;
use crate::report::SnapshotReport;
use crate::slash_path;
use crate::walk::{SnapshotEntry, SnapshotSink, walk_snapshot};

/// Compression algorithm to use when creating the ZIP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compressor {
    #[default]
    Deflate,
    Stored,
}

impl Compressor {
    fn method(self) -> CompressionMethod {
        match self {
            Compressor::Deflate => CompressionMethod::Deflated,
            Compressor::Stored => CompressionMethod::Stored,
        }
    }
}

/// Writes the allowlisted part of `source_root` into a new zip at `archive_path`.
///
/// An existing file at `archive_path` is truncated. Entries are named by
/// their path relative to `source_root`. A failed run leaves a partial
/// archive behind; rerunning rewrites it from scratch.
pub fn snapshot_to_archive(
    source_root: &Path,
    archive_path: &Path,
    allowlist: &Allowlist,
    filter: &dyn PathFilter,
    compressor: Compressor,
) -> SnapshotResult<SnapshotReport> {
    let file = File::create(archive_path)
        .map_err(|e| SnapshotError::io("create_archive", archive_path, e))?;
    let mut sink = ArchiveSink::new(BufWriter::new(file), archive_path, compressor);
    // The archive may land inside one of the directories being archived.
    sink.exclude = fs::canonicalize(archive_path).ok();

    walk_snapshot(source_root, allowlist, filter, &mut sink)?;

    let (mut writer, report) = sink.finish()?;
    writer
        .flush()
        .map_err(|e| SnapshotError::io("flush_archive", archive_path, e))?;
    info!(archive = %archive_path.display(), %report, "archive written");
    Ok(report)
}

/// Sink that streams entries into a zip archive.
///
/// Only files become archive entries; directories are implied by the entry
/// names. Each name is written once, even when a file entry also lies under
/// an allowlisted directory.
pub struct ArchiveSink<W: Write + Seek> {
    writer: ZipWriter<W>,
    archive_path: PathBuf,
    compressor: Compressor,
    exclude: Option<PathBuf>,
    written: HashSet<String>,
    report: SnapshotReport,
}

impl<W: Write + Seek> ArchiveSink<W> {
    /// `archive_path` is only used to describe errors.
    pub fn new(writer: W, archive_path: impl Into<PathBuf>, compressor: Compressor) -> Self {
        Self {
            writer: ZipWriter::new(writer),
            archive_path: archive_path.into(),
            compressor,
            exclude: None,
            written: HashSet::new(),
            report: SnapshotReport::default(),
        }
    }

    /// Writes the central directory and hands back the underlying writer.
    pub fn finish(mut self) -> SnapshotResult<(W, SnapshotReport)> {
        let writer = self
            .writer
            .finish()
            .map_err(|e| SnapshotError::zip("finish_archive", &self.archive_path, e))?;
        Ok((writer, self.report))
    }

    fn is_excluded(&self, source: &Path) -> bool {
        let Some(exclude) = &self.exclude else {
            return false;
        };
        source.file_name() == exclude.file_name()
            && fs::canonicalize(source).is_ok_and(|resolved| &resolved == exclude)
    }
}

impl<W: Write + Seek> SnapshotSink for ArchiveSink<W> {
    fn begin_directory(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()> {
        info!(entry = %entry.relative.display(), "adding folder");
        Ok(())
    }

    fn write_directory(&mut self, _entry: &SnapshotEntry) -> SnapshotResult<()> {
        Ok(())
    }

    fn write_file(&mut self, entry: &SnapshotEntry) -> SnapshotResult<()> {
        if self.is_excluded(&entry.source) {
            debug!(entry = %entry.relative.display(), "not adding the archive to itself");
            return Ok(());
        }

        let name = slash_path(&entry.relative);
        if self.written.contains(&name) {
            debug!(entry = %name, "already in the archive");
            return Ok(());
        }

        let mut file = File::open(&entry.source)
            .map_err(|e| SnapshotError::io("open_file", &entry.source, e))?;
        let meta = file
            .metadata()
            .map_err(|e| SnapshotError::io("read_metadata", &entry.source, e))?;

        self.writer
            .start_file(name.as_str(), entry_options(self.compressor, &meta))
            .map_err(|e| SnapshotError::zip("start_entry", &entry.relative, e))?;
        io::copy(&mut file, &mut self.writer)
            .map_err(|e| SnapshotError::io("write_entry", &entry.source, e))?;

        self.report.record(entry);
        debug!(entry = %name, "added");
        self.written.insert(name);
        Ok(())
    }
}

fn entry_options(compressor: Compressor, meta: &Metadata) -> FileOptions {
    let mut options = FileOptions::default()
        .compression_method(compressor.method())
        .large_file(meta.len() >= u64::from(u32::MAX));

    if let Some(modified) = meta.modified().ok().and_then(|t| zip_time(t.into())) {
        options = options.last_modified_time(modified);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(meta.permissions().mode());
    }

    options
}

/// Zip timestamps are local time from 1980 to 2107; anything else gets the default.
fn zip_time(time: DateTime<Local>) -> Option<zip::DateTime> {
    let year = u16::try_from(time.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    )
    .ok()
}
