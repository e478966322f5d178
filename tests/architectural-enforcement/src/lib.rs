//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! on the relay crates:
//! - No sleep() calls in production code
//! - No unwrap()/expect() in production code
//! - No process-wide mutable singletons (registries and tokens are passed explicitly)
//!
//! These tests are designed to catch violations early in the development cycle.
//! Shared source-scanning helpers live here; the checks live in `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["relay/core/src", "relay/replay/src"];

/// A line of production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLine {
    /// 1-based line number
    pub number: usize,
    /// The line with any trailing `//` comment removed
    pub code: String,
}

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Every `.rs` file under the production directories
#[must_use]
pub fn production_files() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }

        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files
}

/// Production lines of a source file
///
/// Comments are stripped and scanning stops at the first `#[cfg(test)]`,
/// which in this workspace always opens the trailing test module.
#[must_use]
pub fn production_lines(content: &str) -> Vec<CodeLine> {
    let mut lines = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }

        let code = line.split("//").next().unwrap_or(line);
        lines.push(CodeLine {
            number: idx + 1,
            code: code.to_string(),
        });
    }

    lines
}

/// Scan every production file and collect `path:line - code` for matching lines
pub fn find_violations(is_violation: impl Fn(&str) -> bool) -> Vec<String> {
    let mut violations = Vec::new();

    for path in production_files() {
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => continue,
        };

        for line in production_lines(&content) {
            if is_violation(&line.code) {
                violations.push(format!(
                    "{}:{} - {}",
                    path.display(),
                    line.number,
                    line.code.trim()
                ));
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = concat!(
            "fn a() {}\n",
            "// note .unwrap()\n",
            "let x = y; // trailing\n",
            "#[cfg(test)]\n",
            "mod tests {}\n",
        );
        let lines = production_lines(source);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[1].code, "let x = y; ");
    }

    #[test]
    fn test_production_files_found() {
        let files = production_files();
        assert!(files.iter().any(|p| p.ends_with("relay/core/src/lib.rs")));
        assert!(files.iter().any(|p| p.ends_with("relay/replay/src/main.rs")));
    }
}
