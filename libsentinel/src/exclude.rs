//! Path exclusions.
//!
//! Patterns are globs. Each one is tried against the absolute path, the
//! path relative to the watched root and, for patterns without a
//! separator, the bare file name. A path is excluded when it or any of its
//! ancestors below the root matches.

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct PathExclusions {
    root: PathBuf,
    patterns: Vec<Pattern>,
}

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl PathExclusions {
    pub fn new<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                let raw = raw.as_ref().trim_end_matches('/');
                Pattern::new(raw)
                    .map_err(|e| Error::Config(format!("invalid exclusion pattern `{raw}`: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            root: root.to_path_buf(),
            patterns,
        })
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        path.ancestors()
            .take_while(|a| *a != self.root && a.starts_with(&self.root))
            .any(|a| self.matches(a))
    }

    fn matches(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let name = path.file_name().map(Path::new);

        self.patterns.iter().any(|p| {
            p.matches_path_with(path, OPTIONS)
                || p.matches_path_with(relative, OPTIONS)
                || (!p.as_str().contains('/')
                    && name.is_some_and(|n| p.matches_path_with(n, OPTIONS)))
        })
    }
}
