use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fairquote_core::config::{resolve_config_path, AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

/// Effective configuration with per-key source attribution. Secrets are never printed.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let file_path = resolve_config_path(None);
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);
    let attribution = Attribution { file_path, file_doc };

    let api_key = if config.llm.has_api_key() { "<redacted>" } else { "<unset>" };
    let entries = vec![
        attribution.entry("llm.api_key", &["FAIRQUOTE_LLM_API_KEY"], api_key.to_string()),
        attribution.entry("llm.base_url", &["FAIRQUOTE_LLM_BASE_URL"], config.llm.base_url.clone()),
        attribution.entry("llm.model", &["FAIRQUOTE_LLM_MODEL"], config.llm.model.clone()),
        attribution.entry(
            "llm.timeout_secs",
            &["FAIRQUOTE_LLM_TIMEOUT_SECS"],
            config.llm.timeout_secs.to_string(),
        ),
        attribution.entry(
            "llm.max_tokens",
            &["FAIRQUOTE_LLM_MAX_TOKENS"],
            config.llm.max_tokens.to_string(),
        ),
        attribution.entry("vat.endpoint", &["FAIRQUOTE_VAT_ENDPOINT"], config.vat.endpoint.clone()),
        attribution.entry(
            "vat.timeout_secs",
            &["FAIRQUOTE_VAT_TIMEOUT_SECS"],
            config.vat.timeout_secs.to_string(),
        ),
        attribution.entry(
            "vat.max_attempts",
            &["FAIRQUOTE_VAT_MAX_ATTEMPTS"],
            config.vat.max_attempts.to_string(),
        ),
        attribution.entry(
            "vat.base_delay_ms",
            &["FAIRQUOTE_VAT_BASE_DELAY_MS"],
            config.vat.base_delay_ms.to_string(),
        ),
        attribution.entry(
            "vat.jitter_pct",
            &["FAIRQUOTE_VAT_JITTER_PCT"],
            config.vat.jitter_pct.to_string(),
        ),
        attribution.entry(
            "vat.valid_ttl_secs",
            &["FAIRQUOTE_VAT_VALID_TTL_SECS"],
            config.vat.valid_ttl_secs.to_string(),
        ),
        attribution.entry(
            "vat.unverified_ttl_secs",
            &["FAIRQUOTE_VAT_UNVERIFIED_TTL_SECS"],
            config.vat.unverified_ttl_secs.to_string(),
        ),
        attribution.entry(
            "logging.level",
            &["FAIRQUOTE_LOGGING_LEVEL", "FAIRQUOTE_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        attribution.entry(
            "logging.format",
            &["FAIRQUOTE_LOGGING_FORMAT", "FAIRQUOTE_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ];

    let message = entries
        .iter()
        .map(|entry| format!("- {} = {} (source: {})", entry.key, entry.value, entry.source))
        .collect::<Vec<_>>()
        .join("\n");
    CommandResult::success_with_data(
        "config",
        format!("effective config (source precedence: env > file > default):\n{message}"),
        &entries,
    )
}

struct Attribution {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl Attribution {
    fn entry(&self, key: &'static str, env_keys: &[&str], value: String) -> ConfigEntry {
        ConfigEntry { key, value, source: self.source_of(key, env_keys) }
    }

    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        let in_file = self.file_doc.as_ref().is_some_and(|doc| {
            key_path.split('.').try_fold(doc, |node, key| node.get(key)).is_some()
        });
        match (&self.file_path, in_file) {
            (Some(path), true) => format!("file ({})", path.display()),
            _ => "default".to_string(),
        }
    }
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}
