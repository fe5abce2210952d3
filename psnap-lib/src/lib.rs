//! Selective project snapshots.
//!
//! Copies an allowlist of files and directories from a source root into a
//! destination directory, or writes them into a zip archive, with every path
//! kept relative to the source root.

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod allowlist;
pub mod archive;
pub mod copy;
pub mod error;
pub mod filter;
pub mod report;
pub mod walk;

pub use allowlist::Allowlist;
pub use archive::{ArchiveSink, Compressor, snapshot_to_archive};
pub use copy::{DirectorySink, snapshot_to_directory};
pub use error::{SnapshotError, SnapshotResult};
pub use filter::{IncludeAll, PathFilter, SkipPatterns};
pub use report::{SnapshotReport, encode_size};
pub use walk::{
    EntryKind, PlanSink, SnapshotEntry, SnapshotPlan, SnapshotSink, plan_snapshot, walk_snapshot,
};

/// Files deployed when no allowlist is configured: the manifests of a Vite web project.
pub const DEFAULT_FILES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "vite.config.js",
    "index.html",
    "postcss.config.js",
    "tailwind.config.js",
    "jsconfig.json",
];

/// Files archived when no allowlist is configured. The lockfile stays out of
/// the archive and is regenerated on install.
pub const DEFAULT_ARCHIVE_FILES: &[&str] = &[
    "package.json",
    "vite.config.js",
    "index.html",
    "postcss.config.js",
    "tailwind.config.js",
    "jsconfig.json",
];

/// Directories taken in either mode when no allowlist is configured.
pub const DEFAULT_DIRS: &[&str] = &["src", "public"];

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub source: Option<String>,
    pub output: Option<String>,
    pub mode: Option<String>,
    pub config: Option<String>,
    pub files: Option<Vec<String>>,
    pub dirs: Option<Vec<String>>,
    pub skip: Option<Vec<String>>,
    pub compress: Option<bool>,
    pub dry: Option<bool>,
}

impl Config {
    /// Builds the allowlist. When neither list is set, `mode` picks the
    /// defaults: [`DEFAULT_FILES`] for copy, [`DEFAULT_ARCHIVE_FILES`] for zip,
    /// and [`DEFAULT_DIRS`] for both.
    pub fn allowlist(&self, mode: SnapshotMode) -> SnapshotResult<Allowlist> {
        match (&self.files, &self.dirs) {
            (None, None) => {
                let files = match mode {
                    SnapshotMode::Copy => DEFAULT_FILES,
                    SnapshotMode::Zip => DEFAULT_ARCHIVE_FILES,
                };
                Allowlist::new(files, DEFAULT_DIRS)
            }
            (files, dirs) => Allowlist::new(
                files.as_deref().unwrap_or_default(),
                dirs.as_deref().unwrap_or_default(),
            ),
        }
    }

    pub fn skip_patterns(&self) -> SnapshotResult<SkipPatterns> {
        SkipPatterns::new(self.skip.as_deref().unwrap_or_default())
    }

    pub fn compressor(&self) -> Compressor {
        if self.compress.unwrap_or(true) {
            Compressor::Deflate
        } else {
            Compressor::Stored
        }
    }
}

/// Where a snapshot goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Mirror into a destination directory.
    Copy,
    /// Write a single zip archive.
    Zip,
}

impl SnapshotMode {
    /// `Zip` for outputs ending in `.zip`, `Copy` otherwise.
    pub fn infer(output: &str) -> Self {
        if output.to_ascii_lowercase().ends_with(".zip") {
            SnapshotMode::Zip
        } else {
            SnapshotMode::Copy
        }
    }
}

impl FromStr for SnapshotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" | "deploy" | "dir" => Ok(SnapshotMode::Copy),
            "zip" | "archive" => Ok(SnapshotMode::Zip),
            other => Err(format!("unknown snapshot mode: {other}")),
        }
    }
}

impl fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotMode::Copy => f.write_str("copy"),
            SnapshotMode::Zip => f.write_str("zip"),
        }
    }
}

/// Joins the components of a relative path with `/`, the separator zip
/// entry names and skip patterns use on every platform.
pub fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn config_without_lists_uses_the_web_project_defaults() {
        let allowlist = Config::default().allowlist(SnapshotMode::Copy).unwrap();
        assert_eq!(allowlist.files().len(), DEFAULT_FILES.len());
        assert!(allowlist.files().contains(&PathBuf::from("package-lock.json")));
        assert_eq!(
            allowlist.dirs(),
            &[PathBuf::from("src"), PathBuf::from("public")]
        );
    }

    #[test]
    fn zip_defaults_leave_out_the_lockfile() {
        let allowlist = Config::default().allowlist(SnapshotMode::Zip).unwrap();
        assert_eq!(allowlist.files().len(), DEFAULT_ARCHIVE_FILES.len());
        assert!(!allowlist.files().contains(&PathBuf::from("package-lock.json")));
        assert!(allowlist.files().contains(&PathBuf::from("package.json")));
        assert_eq!(
            allowlist.dirs(),
            &[PathBuf::from("src"), PathBuf::from("public")]
        );
    }

    #[test]
    fn config_with_only_dirs_has_no_files() {
        let config = Config {
            dirs: Some(vec!["assets".to_string()]),
            ..Config::default()
        };
        let allowlist = config.allowlist(SnapshotMode::Zip).unwrap();
        assert!(allowlist.files().is_empty());
        assert_eq!(allowlist.dirs(), &[PathBuf::from("assets")]);
    }

    #[test]
    fn compression_defaults_to_deflate() {
        assert_eq!(Config::default().compressor(), Compressor::Deflate);
        let config = Config {
            compress: Some(false),
            ..Config::default()
        };
        assert_eq!(config.compressor(), Compressor::Stored);
    }

    #[test]
    fn mode_parsing_and_inference() {
        assert_eq!("ZIP".parse::<SnapshotMode>().unwrap(), SnapshotMode::Zip);
        assert_eq!("deploy".parse::<SnapshotMode>().unwrap(), SnapshotMode::Copy);
        assert!("tar".parse::<SnapshotMode>().is_err());

        assert_eq!(SnapshotMode::infer("out/Project.ZIP"), SnapshotMode::Zip);
        assert_eq!(SnapshotMode::infer("/srv/deploy"), SnapshotMode::Copy);
    }

    #[test]
    fn slash_path_joins_with_forward_slashes() {
        let path: PathBuf = ["src", "components", "ui", "Modal.jsx"].iter().collect();
        assert_eq!(slash_path(&path), "src/components/ui/Modal.jsx");
    }
}
