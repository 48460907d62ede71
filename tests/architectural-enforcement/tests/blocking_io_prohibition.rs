//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async code in the core and the CLI MUST NOT block the runtime.
//! **Required**: `tokio::fs`, `tokio::io`, async `reqwest`; never `std::fs`,
//! `std::net` or `reqwest::blocking` inside an `async fn`.
//!
//! Blocking calls in non-async functions are acceptable: configuration is
//! loaded that way before any request runs.

use architectural_enforcement::{report, scan, SourceLine, PRODUCTION_DIRS};

/// Test that async production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_async_code() {
    let violations: Vec<SourceLine> = scan(PRODUCTION_DIRS)
        .into_iter()
        .filter(|line| line.in_async_fn && is_blocking(&line.code))
        .collect();

    report(
        "CRITICAL: Blocking I/O calls found in async code!",
        &violations,
        &[
            "FORBIDDEN in async fn:",
            "  - std::fs::read(), std::fs::write(), std::fs::File",
            "  - std::net::TcpStream",
            "  - std::io::stdin(), std::io::stdout()",
            "  - reqwest::blocking::*",
            "REQUIRED:",
            "  - tokio::fs::read().await, tokio::fs::write().await",
            "  - tokio::io::stdin(), tokio::io::stdout()",
        ],
    );
}

/// Test that the blocking configuration loader never runs on the runtime
#[test]
fn test_config_loaded_outside_async_code() {
    let violations: Vec<SourceLine> = scan(PRODUCTION_DIRS)
        .into_iter()
        .filter(|line| line.in_async_fn && calls_config_loader(&line.code))
        .collect();

    report(
        "Configuration loaded inside async code!",
        &violations,
        &[
            "load_config* reads files with std::fs.",
            "Load configuration in a plain fn before the runtime starts.",
        ],
    );
}

/// Test that async code writes stdout through `tokio::io::stdout`
#[test]
fn test_no_stdout_macros_in_async_code() {
    let violations: Vec<SourceLine> = scan(PRODUCTION_DIRS)
        .into_iter()
        .filter(|line| line.in_async_fn && prints_to_stdout(&line.code))
        .collect();

    report(
        "Blocking stdout macros found in async code!",
        &violations,
        &["REQUIRED: tokio::io::stdout() with AsyncWriteExt::write_all"],
    );
}

/// Test that `std::fs` is only imported where it is used outside async code
#[test]
fn test_no_std_fs_imports_in_core() {
    let violations: Vec<SourceLine> = scan(&[architectural_enforcement::CORE_DIR])
        .into_iter()
        .filter(|line| line.code.trim_start().starts_with("use std::fs"))
        .collect();

    report(
        "Blocking filesystem module imported in the core",
        &violations,
        &["Call std::fs by path in the one non-async loader that needs it, or use tokio::fs."],
    );
}

fn is_blocking(code: &str) -> bool {
    code.contains("std::fs::")
        || code.contains("std::net::")
        || code.contains("reqwest::blocking")
        || code.contains("std::io::stdin()")
        || code.contains("std::io::stdout()")
        || (code.contains("std::process::Command") && !code.contains("tokio::process"))
}

fn calls_config_loader(code: &str) -> bool {
    ["load_config(", "load_config_from_path(", "load_config_with_env("]
        .iter()
        .any(|call| code.contains(call))
}

fn prints_to_stdout(code: &str) -> bool {
    let code = code.replace("eprintln!(", "").replace("eprint!(", "");
    code.contains("println!(") || code.contains("print!(")
}

#[cfg(test)]
mod tests {
    use super::*;
    use architectural_enforcement::fn_signature;

    #[test]
    fn test_blocking_io_detection() {
        assert!(is_blocking("    let s = std::fs::read_to_string(path)?;"));
        assert!(is_blocking("    let out = std::io::stdout().lock();"));
        assert!(!is_blocking("    let s = tokio::fs::read_to_string(path).await?;"));
        assert!(!is_blocking("    .with_writer(std::io::stderr)"));
    }

    #[test]
    fn test_config_loader_and_stdout_detection() {
        assert!(calls_config_loader("    let config = load_config_from_path(path)?;"));
        assert!(!calls_config_loader("    let path = default_config_path();"));
        assert!(prints_to_stdout("            None => println!(\"{text}\"),"));
        assert!(!prints_to_stdout("        eprintln!(\"{HELP}\");"));
    }

    #[test]
    fn test_async_context_detection() {
        assert_eq!(fn_signature("pub async fn composer(&self) -> Result<()> {"), Some(true));
        assert_eq!(fn_signature("fn main() {"), Some(false));
    }
}
