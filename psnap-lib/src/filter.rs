use std::path::Path;

use glob::Pattern;

use crate::error::{SnapshotError, SnapshotResult};
use crate::slash_path;

/// Decides whether a path, relative to the source root, belongs in a snapshot.
///
/// A directory that is not included is pruned together with its subtree.
pub trait PathFilter {
    fn includes(&self, relative: &Path) -> bool;
}

impl<F> PathFilter for F
where
    F: Fn(&Path) -> bool,
{
    fn includes(&self, relative: &Path) -> bool {
        self(relative)
    }
}

/// Includes everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAll;

impl PathFilter for IncludeAll {
    fn includes(&self, _relative: &Path) -> bool {
        true
    }
}

/// Excludes paths matching any of a set of glob patterns.
///
/// A pattern is tried against the whole relative path (with `/` separators)
/// and against the final component, so `node_modules` prunes that directory
/// at any depth while `src/*.map` only applies under `src`.
#[derive(Debug, Clone, Default)]
pub struct SkipPatterns {
    patterns: Vec<Pattern>,
}

impl SkipPatterns {
    pub fn new<I, S>(raw: I) -> SnapshotResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = raw
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(p).map_err(|source| SnapshotError::Pattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<SnapshotResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn is_skipped(&self, relative: &Path) -> bool {
        let joined = slash_path(relative);
        let name = relative.file_name().map(|n| n.to_string_lossy());
        self.patterns.iter().any(|p| {
            p.matches(&joined) || name.as_deref().is_some_and(|n| p.matches(n))
        })
    }
}

impl PathFilter for SkipPatterns {
    fn includes(&self, relative: &Path) -> bool {
        !self.is_skipped(relative)
    }
}
