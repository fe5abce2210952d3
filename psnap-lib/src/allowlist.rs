use std::path::{Component, Path, PathBuf};

use crate::error::{SnapshotError, SnapshotResult};

/// Files and directories to include in a snapshot, relative to the source root.
///
/// Entries keep the order they were given in. Every entry is validated on
/// construction so that nothing can be written outside the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl Allowlist {
    pub fn new<I, J, P, Q>(files: I, dirs: J) -> SnapshotResult<Self>
    where
        I: IntoIterator<Item = P>,
        J: IntoIterator<Item = Q>,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let files = files
            .into_iter()
            .map(|entry| normalize_entry(entry.as_ref()))
            .collect::<SnapshotResult<Vec<_>>>()?;
        let dirs = dirs
            .into_iter()
            .map(|entry| normalize_entry(entry.as_ref()))
            .collect::<SnapshotResult<Vec<_>>>()?;
        Ok(Self { files, dirs })
    }

    /// Single files, copied or archived one by one.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Directory subtrees, copied or archived in full.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

/// Strips `.` components and rejects anything that is not a plain relative path.
fn normalize_entry(raw: &Path) -> SnapshotResult<PathBuf> {
    let display = raw.to_string_lossy();
    let mut normalized = PathBuf::new();

    for component in raw.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(SnapshotError::invalid_entry(
                    display,
                    "escapes the source root",
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SnapshotError::invalid_entry(display, "must be relative"));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(SnapshotError::invalid_entry(display, "is empty"));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order_and_drops_current_dir_components() {
        let allowlist = Allowlist::new(
            ["package.json", "./vite.config.js", "config/./app.json"],
            ["src", "public/"],
        )
        .unwrap();

        assert_eq!(
            allowlist.files(),
            &[
                PathBuf::from("package.json"),
                PathBuf::from("vite.config.js"),
                PathBuf::from("config/app.json"),
            ]
        );
        assert_eq!(
            allowlist.dirs(),
            &[PathBuf::from("src"), PathBuf::from("public")]
        );
        assert!(!allowlist.is_empty());
    }

    #[test]
    fn rejects_entries_outside_the_root() {
        for bad in ["../secrets", "src/../../x", "/etc/passwd", "", "."] {
            let err = Allowlist::new([bad], Vec::<&str>::new()).unwrap_err();
            assert!(
                matches!(err, SnapshotError::InvalidEntry { .. }),
                "{bad:?} should be rejected"
            );
        }

        let err = Allowlist::new(Vec::<&str>::new(), ["../sibling"]).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::InvalidEntry {
                reason: "escapes the source root",
                ..
            }
        ));
    }

    #[test]
    fn empty_allowlist() {
        let allowlist = Allowlist::new(Vec::<&str>::new(), Vec::<&str>::new()).unwrap();
        assert!(allowlist.is_empty());
    }
}
