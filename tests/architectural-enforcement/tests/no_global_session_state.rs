//! Integration Test: No Ambient Session State
//!
//! **Policy**: the conversation session, transcript and in-flight guard are
//! fields of an explicitly owned `Analyst`. Nothing in production code may
//! hold state in a process-wide global.
//!
//! Constants are fine; mutable or lazily initialized statics are not.

use architectural_enforcement::{report, scan, SourceLine, CORE_DIR, PRODUCTION_DIRS};

/// Test that production code declares no global state
#[test]
fn test_no_global_state() {
    let violations: Vec<SourceLine> = scan(PRODUCTION_DIRS)
        .into_iter()
        .filter(|line| is_global_state(&line.code))
        .collect();

    report(
        "Global state found in production code!",
        &violations,
        &[
            "FORBIDDEN: static items, lazy_static!, thread_local!, OnceLock, OnceCell, LazyLock",
            "REQUIRED: own the state in a struct and pass it explicitly",
        ],
    );
}

/// Test that the headless core never writes to the terminal
#[test]
fn test_core_does_not_print() {
    let violations: Vec<SourceLine> = scan(&[CORE_DIR])
        .into_iter()
        .filter(|line| {
            ["println!", "print!(", "eprintln!", "eprint!(", "dbg!("]
                .iter()
                .any(|m| line.code.contains(m))
        })
        .collect();

    report(
        "Terminal output found in the headless core!",
        &violations,
        &[
            "The core reports through tracing and AnalystEvent only.",
            "Surfaces decide what reaches the terminal.",
        ],
    );
}

fn is_global_state(code: &str) -> bool {
    let trimmed = code.trim_start();
    let declares_static = ["static ", "pub static ", "pub(crate) static "]
        .iter()
        .any(|p| trimmed.starts_with(p));

    declares_static
        || ["lazy_static!", "thread_local!", "OnceLock", "OnceCell", "LazyLock"]
            .iter()
            .any(|m| code.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_state_detection() {
        assert!(is_global_state("static SESSION: Mutex<Option<Chat>> = Mutex::new(None);"));
        assert!(is_global_state("pub static ANALYST: OnceLock<Analyst> = OnceLock::new();"));
        assert!(!is_global_state("pub const SUBJECT_MARKER: &str = \"{{PROCEDIMENTO}}\";"));
        assert!(!is_global_state("    fn name(&self) -> &'static str {"));
    }
}
