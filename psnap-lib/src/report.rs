use std::fmt;

use crate::walk::{EntryKind, SnapshotEntry};

/// What a finished snapshot wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub files: u64,
    pub directories: u64,
    /// Sum of file content lengths, before compression.
    pub bytes: u64,
}

impl SnapshotReport {
    pub(crate) fn record(&mut self, entry: &SnapshotEntry) {
        match entry.kind {
            EntryKind::File => {
                self.files += 1;
                self.bytes += entry.len;
            }
            EntryKind::Directory => self.directories += 1,
        }
    }
}

impl fmt::Display for SnapshotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} directories, {}",
            self.files,
            self.directories,
            encode_size(self.bytes)
        )
    }
}

/// Human readable size in binary units, with at most one decimal: `1.5 KiB`, `5 MiB`.
pub fn encode_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    let exponent = (bytes.checked_ilog2().unwrap_or(0) / 10).min(UNITS.len() as u32 - 1);
    if exponent == 0 {
        return format!("{bytes} B");
    }

    let unit = UNITS[exponent as usize];
    let scaled = bytes as f64 / (1u64 << (10 * exponent)) as f64;
    let rounded = (scaled * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0} {unit}")
    } else {
        format!("{rounded:.1} {unit}")
    }
}
