//! Integration tests for the promptline CLI.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Nothing listens on the discard port.
const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

/// A promptline Command isolated from the user's config and environment.
fn promptline(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("promptline");
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env_remove("PROMPTLINE_ENDPOINT")
        .env_remove("PROMPTLINE_MODEL")
        .env_remove("RUST_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        let dir = create_temp_project();
        promptline(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("ask"))
            .stdout(predicate::str::contains("assemble"));
    }

    #[test]
    fn test_version() {
        let dir = create_temp_project();
        promptline(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["assemble", "hello", "--strategy", "clever"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using default configuration"))
            .stdout(predicate::str::contains("model = \"llama3.2\""));
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created promptline.toml"));

        let path = dir.path().join(".promptline/promptline.toml");
        assert!(path.exists());
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("[defaults]"));

        promptline(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".promptline")).unwrap();
        fs::write(
            dir.path().join(".promptline/promptline.toml"),
            "[backend]\nendpoint = \"localhost:11434\"\n\n[defaults]\nchunk_size = 0\n",
        )
        .unwrap();

        promptline(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("backend.endpoint"))
            .stdout(predicate::str::contains("chunk_size"));
    }

    #[test]
    fn test_config_validate_clean_file() {
        let dir = create_temp_project();
        promptline(&dir).args(["config", "init"]).assert().success();
        promptline(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_env_endpoint_shown_as_effective() {
        let dir = create_temp_project();
        promptline(&dir)
            .env("PROMPTLINE_ENDPOINT", "http://gpu-box:11434")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("endpoint = \"http://gpu-box:11434\""));
    }
}

// =============================================================================
// Assemble / Limit / Ask Tests
// =============================================================================

mod conversation {
    use super::*;

    #[test]
    fn test_assemble_without_server() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["--endpoint", DEAD_ENDPOINT, "assemble", "What is Rust?"])
            .args(["--strategy", "basic", "--system", "Be brief."])
            .assert()
            .success()
            .stdout(predicate::str::contains("effective_limit = 8192"))
            .stdout(predicate::str::contains("Be brief."))
            .stdout(predicate::str::contains("User: What is Rust?"));
    }

    #[test]
    fn test_assemble_with_history_and_context() {
        let dir = create_temp_project();
        fs::write(
            dir.path().join("history.json"),
            r#"[{"role":"user","content":"Hi"},{"role":"assistant","content":"Hello!"}]"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "Rust 1.85 shipped edition 2024.").unwrap();

        promptline(&dir)
            .args(["--endpoint", DEAD_ENDPOINT, "assemble", "Which edition?"])
            .args(["--history", "history.json", "--context-file", "notes.txt"])
            .args(["--no-summarize"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Relevant context:"))
            .stdout(predicate::str::contains("Assistant: Hello!"))
            .stdout(predicate::str::contains("User: Which edition?"));
    }

    #[test]
    fn test_assemble_reads_prompt_from_stdin() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["--endpoint", DEAD_ENDPOINT, "assemble"])
            .write_stdin("piped question\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("User: piped question"));
    }

    #[test]
    fn test_nothing_to_send() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["--endpoint", DEAD_ENDPOINT, "assemble"])
            .write_stdin("")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Nothing to send"));
    }

    #[test]
    fn test_bad_history_file() {
        let dir = create_temp_project();
        fs::write(dir.path().join("history.json"), "not json").unwrap();
        promptline(&dir)
            .args(["--endpoint", DEAD_ENDPOINT, "assemble", "hi"])
            .args(["--history", "history.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse history file"));
    }

    #[test]
    fn test_limit_falls_back_to_configured() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["--endpoint", DEAD_ENDPOINT, "limit", "llama3.2", "--user-limit", "4096"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Detected:   unknown"))
            .stdout(predicate::str::contains("Effective:  4096"));
    }

    #[test]
    fn test_ask_unreachable_backend() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["--endpoint", DEAD_ENDPOINT, "ask", "hello"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Could not connect"));
    }

    #[test]
    fn test_ask_json_reports_error_event() {
        let dir = create_temp_project();
        promptline(&dir)
            .args(["--endpoint", DEAD_ENDPOINT, "ask", "hello", "--json"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("\"type\":\"error\""))
            .stdout(predicate::str::contains("\"is_fatal\":true"));
    }
}
