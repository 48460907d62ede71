//! Architectural Enforcement Integration Tests
//!
//! Source-scanning tests that keep the analysis core honest:
//! - No ambient global state holding a session or analyst
//! - No blocking I/O inside async functions
//! - No terminal output from the headless core
//!
//! This library holds the scanning helpers shared by the tests under
//! `tests/`. The scanner is line-based, not a parser: it is tuned to the
//! layout rustfmt produces.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["parecer/core/src", "parecer/cli/src"];

/// The headless library's source directory
pub const CORE_DIR: &str = "parecer/core/src";

/// One line of production code
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// File the line came from
    pub path: PathBuf,
    /// 1-based line number
    pub number: usize,
    /// Full line text
    pub text: String,
    /// Line text with any trailing `//` comment removed
    pub code: String,
    /// Whether the nearest enclosing function is `async`
    pub in_async_fn: bool,
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.text.trim())
    }
}

/// The workspace root
///
/// Tests run with the package directory as working directory, so paths are
/// resolved from the manifest instead.
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// All `.rs` files under `dir` (relative to the workspace root)
///
/// # Panics
///
/// Panics if the directory does not exist, so a moved crate cannot make a
/// test pass by scanning nothing.
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    assert!(root.is_dir(), "source directory {} not found", root.display());

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// Production lines of one file
///
/// Everything from the first `#[cfg(test)]` onwards is test code and is
/// skipped, as are doc comments.
#[must_use]
pub fn production_lines(path: &Path) -> Vec<SourceLine> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    let mut in_async_fn = false;

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        if let Some(is_async) = fn_signature(trimmed) {
            in_async_fn = is_async;
        }

        let code = line.split("//").next().unwrap_or(line).to_string();
        lines.push(SourceLine {
            path: path.to_path_buf(),
            number: idx + 1,
            text: line.to_string(),
            code,
            in_async_fn,
        });
    }

    lines
}

/// Production lines of every file under the given directories
#[must_use]
pub fn scan(dirs: &[&str]) -> Vec<SourceLine> {
    dirs.iter()
        .flat_map(|dir| rust_files(dir))
        .flat_map(|path| production_lines(&path))
        .collect()
}

/// If `line` starts a function, whether that function is `async`
#[must_use]
pub fn fn_signature(line: &str) -> Option<bool> {
    let mut rest = line;
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }

    let is_async = rest.starts_with("async ");
    if let Some(stripped) = rest.strip_prefix("async ") {
        rest = stripped;
    }
    rest.starts_with("fn ").then_some(is_async)
}

/// Print violations and fail
///
/// # Panics
///
/// Always, when `violations` is not empty.
pub fn report(title: &str, violations: &[SourceLine], guidance: &[&str]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!();
    for line in guidance {
        eprintln!("  {line}");
    }

    panic!("\nFound {} violation(s). Fix these before merging!", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_signature_detection() {
        assert_eq!(fn_signature("pub async fn analyze(&self) {"), Some(true));
        assert_eq!(fn_signature("async fn emit(&self) {"), Some(true));
        assert_eq!(fn_signature("pub fn load_config_with_env("), Some(false));
        assert_eq!(fn_signature("pub(crate) fn push(&mut self) {"), Some(false));
        assert_eq!(fn_signature("let f = fn_name();"), None);
    }

    #[test]
    fn test_workspace_root_holds_the_core() {
        assert!(workspace_root().join(CORE_DIR).is_dir());
    }
}
