//! Integration tests for configuration management
//!
//! These tests verify that a config file on disk is loaded, validated and
//! processed with path expansion, and that it drives what the engine builds.

use std::fs;
use tempfile::TempDir;

use exa_engine::config::Config;
use exa_engine::handlers::{build_registry, open_memory};

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_full_config_file() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let prompt = dir.path().join("prompt.md");
    fs::write(&prompt, "You are a terse assistant.").unwrap();

    let path = write_config(
        &dir,
        &format!(
            r#"
[core]
log_level = "debug"
data_dir = "{data}"

[llm]
default_provider = "ollama"
request_timeout_secs = 30

[llm.ollama]
base_url = "http://10.0.0.5:11434"
model = "qwen2.5:7b"

[llm.openai]
model = "gpt-4o-mini"

[agent]
max_turns = 4
memory_top_k = 5
system_prompt_path = "{prompt}"

[agent.retry]
max_attempts = 2
backoff_ms = 100

[memory]
enabled = true
db_file = "facts.db"

[tools]
calendar = true
reminders = false
email = true
save-preference = false
"#,
            data = data_dir.display(),
            prompt = prompt.display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.core.log_level, "debug");
    assert!(data_dir.is_dir());
    assert_eq!(config.llm.request_timeout_secs, 30);
    assert_eq!(config.llm.ollama.model, "qwen2.5:7b");
    assert_eq!(config.llm.openai.model, "gpt-4o-mini");
    assert_eq!(config.llm.openai.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.agent.max_turns, 4);
    assert_eq!(config.agent.memory_top_k, 5);
    assert_eq!(config.agent.system_prompt_path.as_deref(), Some(prompt.as_path()));
    assert_eq!(config.agent.retry.max_attempts, 2);
    assert_eq!(config.agent.retry.backoff_ms, 100);
    assert_eq!(config.memory_db_path(), data_dir.join("facts.db"));
    assert!(!config.tools.reminders);
    assert!(!config.tools.save_preference);
}

#[test]
fn test_zero_bounds_are_rejected() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().display().to_string();

    for (section, key) in [
        ("agent", "max_turns"),
        ("llm", "request_timeout_secs"),
        ("agent.retry", "max_attempts"),
    ] {
        let mut body = format!("[core]\ndata_dir = \"{}\"\n\n[llm]\ndefault_provider = \"ollama\"\n", data);
        if section == "llm" {
            body.push_str(&format!("{} = 0\n", key));
        } else {
            body.push_str(&format!("\n[{}]\n{} = 0\n", section, key));
        }

        let err = Config::from_toml_str(&body).unwrap_err();
        assert!(err.to_string().contains(key), "{}: {}", key, err);
    }
}

#[test]
fn test_invalid_log_level_is_rejected() {
    let err = Config::from_toml_str(
        r#"
[core]
log_level = "verbose"

[llm]
default_provider = "ollama"
"#,
    )
    .unwrap_err();

    assert!(err.to_string().contains("Invalid log level"));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_serialized_config_parses_back() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.core.data_dir = dir.path().to_path_buf();
    config.agent.max_turns = 7;
    config.tools.email = false;

    let text = toml::to_string_pretty(&config).unwrap();
    assert!(text.contains("save-preference"));

    let parsed = Config::from_toml_str(&text).unwrap();
    assert_eq!(parsed.agent.max_turns, 7);
    assert!(!parsed.tools.email);
    assert_eq!(parsed.core.data_dir, dir.path());
}

#[tokio::test]
async fn test_tool_flags_shape_the_registry() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[core]
data_dir = "{}"

[llm]
default_provider = "ollama"

[memory]
enabled = false

[tools]
calendar = false
"#,
            dir.path().display()
        ),
    );
    let config = Config::load_from_path(&path).unwrap();

    let memory = open_memory(&config).await;
    assert!(memory.is_none());

    let registry = build_registry(&config, memory).unwrap();
    assert_eq!(registry.names(), vec!["email", "reminders"]);
}
