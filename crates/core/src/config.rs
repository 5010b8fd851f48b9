use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling for completion length; the assistant reply is a short JSON object.
pub const MAX_COMPLETION_TOKENS: u32 = 4096;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub vat: VatConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct VatConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub jitter_pct: u8,
    pub valid_ttl_secs: u64,
    pub unverified_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub vat_endpoint: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                timeout_secs: 30,
                max_tokens: 1024,
            },
            vat: VatConfig {
                endpoint: "https://ec.europa.eu/taxation_customs/vies/rest-api/check-vat-number"
                    .to_string(),
                timeout_secs: 10,
                max_attempts: 3,
                base_delay_ms: 500,
                jitter_pct: 20,
                valid_ttl_secs: 24 * 60 * 60,
                unverified_ttl_secs: 5 * 60,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("fairquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(vat) = patch.vat {
            if let Some(endpoint) = vat.endpoint {
                self.vat.endpoint = endpoint;
            }
            if let Some(timeout_secs) = vat.timeout_secs {
                self.vat.timeout_secs = timeout_secs;
            }
            if let Some(max_attempts) = vat.max_attempts {
                self.vat.max_attempts = max_attempts;
            }
            if let Some(base_delay_ms) = vat.base_delay_ms {
                self.vat.base_delay_ms = base_delay_ms;
            }
            if let Some(jitter_pct) = vat.jitter_pct {
                self.vat.jitter_pct = jitter_pct;
            }
            if let Some(valid_ttl_secs) = vat.valid_ttl_secs {
                self.vat.valid_ttl_secs = valid_ttl_secs;
            }
            if let Some(unverified_ttl_secs) = vat.unverified_ttl_secs {
                self.vat.unverified_ttl_secs = unverified_ttl_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FAIRQUOTE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FAIRQUOTE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("FAIRQUOTE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("FAIRQUOTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("FAIRQUOTE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FAIRQUOTE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("FAIRQUOTE_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("FAIRQUOTE_VAT_ENDPOINT") {
            self.vat.endpoint = value;
        }
        if let Some(value) = read_env("FAIRQUOTE_VAT_TIMEOUT_SECS") {
            self.vat.timeout_secs = parse_u64("FAIRQUOTE_VAT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FAIRQUOTE_VAT_MAX_ATTEMPTS") {
            self.vat.max_attempts = parse_u32("FAIRQUOTE_VAT_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("FAIRQUOTE_VAT_BASE_DELAY_MS") {
            self.vat.base_delay_ms = parse_u64("FAIRQUOTE_VAT_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("FAIRQUOTE_VAT_JITTER_PCT") {
            self.vat.jitter_pct = parse_u8("FAIRQUOTE_VAT_JITTER_PCT", &value)?;
        }
        if let Some(value) = read_env("FAIRQUOTE_VAT_VALID_TTL_SECS") {
            self.vat.valid_ttl_secs = parse_u64("FAIRQUOTE_VAT_VALID_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("FAIRQUOTE_VAT_UNVERIFIED_TTL_SECS") {
            self.vat.unverified_ttl_secs =
                parse_u64("FAIRQUOTE_VAT_UNVERIFIED_TTL_SECS", &value)?;
        }

        let log_level =
            read_env("FAIRQUOTE_LOGGING_LEVEL").or_else(|| read_env("FAIRQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FAIRQUOTE_LOGGING_FORMAT").or_else(|| read_env("FAIRQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(vat_endpoint) = overrides.vat_endpoint {
            self.vat.endpoint = vat_endpoint;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_vat(&self.vat)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// First existing config file: the explicit path, else `fairquote.toml`, else
/// `config/fairquote.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fairquote.toml"), PathBuf::from("config/fairquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 || llm.max_tokens > MAX_COMPLETION_TOKENS {
        return Err(ConfigError::Validation(format!(
            "llm.max_tokens must be in range 1..={MAX_COMPLETION_TOKENS}"
        )));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_vat(vat: &VatConfig) -> Result<(), ConfigError> {
    if !is_http_url(&vat.endpoint) {
        return Err(ConfigError::Validation(
            "vat.endpoint must start with http:// or https://".to_string(),
        ));
    }

    if vat.timeout_secs == 0 || vat.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "vat.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if vat.max_attempts == 0 || vat.max_attempts > 10 {
        return Err(ConfigError::Validation(
            "vat.max_attempts must be in range 1..=10".to_string(),
        ));
    }

    if vat.jitter_pct > 33 {
        return Err(ConfigError::Validation("vat.jitter_pct must be at most 33".to_string()));
    }

    if vat.unverified_ttl_secs == 0 || vat.valid_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "vat cache TTLs must be greater than zero".to_string(),
        ));
    }

    if vat.unverified_ttl_secs > vat.valid_ttl_secs {
        return Err(ConfigError::Validation(
            "vat.unverified_ttl_secs must not exceed vat.valid_ttl_secs".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    vat: Option<VatPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct VatPatch {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    jitter_pct: Option<u8>,
    valid_ttl_secs: Option<u64>,
    unverified_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_without_any_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        ensure(config.vat.max_attempts == 3, "default vat attempts should be 3")?;
        ensure(config.vat.jitter_pct == 20, "default jitter should be 20%")?;
        ensure(
            config.vat.unverified_ttl_secs < config.vat.valid_ttl_secs,
            "unverified ttl should be shorter than definitive ttl",
        )?;
        ensure(!config.llm.has_api_key(), "no api key by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_FAIRQUOTE_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("fairquote.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_FAIRQUOTE_KEY}"
max_tokens = 2048

[vat]
max_attempts = 4
unverified_ttl_secs = 60
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|k| k.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(config.llm.max_tokens == 2048, "max tokens should come from file")?;
            ensure(config.vat.max_attempts == 4, "attempts should come from file")?;
            ensure(config.vat.unverified_ttl_secs == 60, "ttl should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_FAIRQUOTE_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FAIRQUOTE_LLM_MODEL", "model-from-env");
        env::set_var("FAIRQUOTE_VAT_TIMEOUT_SECS", "7");
        env::set_var("FAIRQUOTE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("fairquote.toml");
            fs::write(
                &path,
                r#"
[llm]
model = "model-from-file"

[vat]
timeout_secs = 20
endpoint = "https://vies.example.test/check"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "model-from-env", "env model should win over file")?;
            ensure(config.vat.timeout_secs == 7, "env timeout should win over file")?;
            ensure(
                config.vat.endpoint == "https://vies.example.test/check",
                "file endpoint should win over default",
            )?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json format should be set from env alias",
            )?;
            Ok(())
        })();

        clear_vars(&["FAIRQUOTE_LLM_MODEL", "FAIRQUOTE_VAT_TIMEOUT_SECS", "FAIRQUOTE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn invalid_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FAIRQUOTE_VAT_MAX_ATTEMPTS", "three");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override failure".to_string()),
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "FAIRQUOTE_VAT_MAX_ATTEMPTS", "error should name the env key")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["FAIRQUOTE_VAT_MAX_ATTEMPTS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FAIRQUOTE_VAT_UNVERIFIED_TTL_SECS", "999999");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("unverified_ttl_secs")
                ),
                "validation failure should mention vat.unverified_ttl_secs",
            ),
        };

        clear_vars(&["FAIRQUOTE_VAT_UNVERIFIED_TTL_SECS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FAIRQUOTE_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(config.llm.has_api_key(), "api key should be loaded")?;
            Ok(())
        })();

        clear_vars(&["FAIRQUOTE_LLM_API_KEY"]);
        result
    }
}
