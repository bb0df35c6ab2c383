//! Architectural Enforcement Integration Tests
//!
//! Source-level checks over the library crate:
//! - No blocking sleeps (timing goes through tokio so tests can pause time)
//! - No printing; output belongs to the front end, diagnostics to `tracing`
//! - No `unwrap()`/`expect()` outside test modules
//!
//! Each check reads the production part of a file only: everything before
//! the first `#[cfg(test)]` line.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A forbidden pattern found in production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the match
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.text)
    }
}

/// Root of the `duel-core` sources
#[must_use]
pub fn core_src() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../conductor/core/src")
}

/// Every `.rs` file under `root`, sorted
#[must_use]
pub fn rust_sources(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().is_some_and(|ext| ext == "rs"))
        .collect();
    files.sort();
    files
}

/// Lines of `source` before the test module, skipping comments
pub fn production_lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
    source
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
}

/// Find `patterns` in the production part of every source under `root`
#[must_use]
pub fn scan(root: &Path, patterns: &[&str]) -> Vec<Violation> {
    let mut found = Vec::new();
    for path in rust_sources(root) {
        let Ok(source) = fs::read_to_string(&path) else {
            continue;
        };
        for (line, text) in production_lines(&source) {
            if patterns.iter().any(|p| text.contains(p)) {
                found.push(Violation {
                    path: path.clone(),
                    line,
                    text: text.trim().to_string(),
                });
            }
        }
    }
    found
}

/// Panic listing every violation, if any
///
/// # Panics
///
/// Panics when `violations` is not empty.
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    let listing: Vec<String> = violations.iter().map(ToString::to_string).collect();
    panic!("{rule}: {} violation(s)\n{}", violations.len(), listing.join("\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n// x.unwrap()\nfn b() {}\n#[cfg(test)]\nmod tests {}\n";
        let lines: Vec<(usize, &str)> = production_lines(source).collect();
        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "fn b() {}")]);
    }

    #[test]
    fn test_core_sources_found() {
        let files = rust_sources(&core_src());
        assert!(files.iter().any(|p| p.ends_with("lib.rs")));
        assert!(files.iter().any(|p| p.ends_with("decoder.rs")));
    }
}
