//! Integration tests for CLI argument handling
//!
//! Runs the built binary; only paths that exit without serving are exercised.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_watermelon-api"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute watermelon-api")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("watermelon-api"), "Help should mention watermelon-api");
    assert!(stdout.contains("--port"), "Help should mention --port flag");
    assert!(stdout.contains("--refresh"), "Help should mention --refresh flag");
}

#[test]
fn test_zero_timeout_prints_error_and_exits() {
    let output = run_cli(&["--timeout-secs", "0"]);
    assert!(!output.status.success(), "Expected zero timeout to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("timeout"),
        "Should print error message about the timeout: {}",
        stderr
    );
}

#[test]
fn test_non_numeric_port_is_rejected() {
    let output = run_cli(&["--port", "http"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--port"), "clap should name the flag: {}", stderr);
}

#[test]
fn test_refresh_against_unreachable_upstream_fails() {
    let cache_dir = tempfile::TempDir::new().unwrap();
    // Port 9 (discard) on localhost refuses connections
    let output = run_cli(&[
        "--refresh",
        "--upstream-url",
        "http://127.0.0.1:9",
        "--timeout-secs",
        "2",
        "--cache-dir",
        cache_dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success(), "Expected refresh to fail");
    assert!(!cache_dir.path().join("data_cache.json").exists());
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use watermelon_api::cli::{Cli, CliError, Settings};

    #[test]
    fn test_cli_refresh_defaults_to_false() {
        let cli = Cli::parse_from(["watermelon-api"]);
        assert!(!cli.refresh);
    }

    #[test]
    fn test_settings_from_cli_with_endpoints() {
        let cli = Cli::parse_from([
            "watermelon-api",
            "--upstream-url",
            "http://localhost:1234",
            "--perplexity-url",
            "http://localhost:1235/chat/completions",
        ]);
        let settings = Settings::from_cli(&cli).unwrap();
        assert_eq!(settings.upstream_url, "http://localhost:1234");
        assert_eq!(
            settings.perplexity_url,
            "http://localhost:1235/chat/completions"
        );
    }

    #[test]
    fn test_settings_from_cli_rejects_bad_openrouter_url() {
        let cli = Cli::parse_from(["watermelon-api", "--openrouter-url", "openrouter"]);
        let result = Settings::from_cli(&cli);
        assert!(matches!(result, Err(CliError::InvalidUrl { .. })));
    }
}
