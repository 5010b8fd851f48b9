use std::env;
use std::io::Write;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use fairquote_agent::llm::{CompletionRequest, LlmClient, LlmError};
use fairquote_agent::runtime::{AgentRuntime, RuntimeSettings};
use fairquote_cli::commands::{ask, config, extract, quote, resolve, vat};
use fairquote_core::cpq::catalog::Catalog;
use fairquote_core::domain::order::{OrderLine, OrderLineColorConfig};
use fairquote_vat::{
    InMemoryTtlCache, RegistryError, RegistryResponse, VatClient, VatClientOptions, VatNumber,
    VatRegistry,
};
use serde_json::Value;

const SCENARIO_ORDER: &str = r#"[
  {"collectionId": "cuty", "colors": [
    {"caratIndex": 2, "color": "Black", "quantity": 3},
    {"caratIndex": 2, "color": "Red", "quantity": 2}
  ]},
  {"collectionId": "cubix", "colors": [
    {"caratIndex": 1, "color": "Navy", "quantity": 4}
  ]}
]"#;

#[test]
fn quote_prices_an_order_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(SCENARIO_ORDER.as_bytes()).expect("write order");

    let result = quote::run(file.path());
    assert_eq!(result.exit_code, 0, "expected successful quote");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "quote");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["data"]["subtotal"], "461");
    assert_eq!(payload["data"]["total"], "461");
    assert_eq!(payload["data"]["minimumMet"], false);
    assert_eq!(payload["data"]["warnings"].as_array().map(Vec::len), Some(1));
}

#[test]
fn quote_reports_unreadable_order_files() {
    let result = quote::run(std::path::Path::new("/definitely/not/here/order.json"));
    assert_eq!(result.exit_code, 4);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "input");
}

#[test]
fn extract_recovers_a_fenced_reply_and_prices_it() {
    let raw = "Sure! Here is the order:\n```json\n{\"message\": \"**Starter** order\", \
               \"quote\": {\"lines\": [{\"product\": \"CUTY\", \"carat\": \"0.20ct\", \
               \"colors\": {\"Black\": 3, \"Red\": 2}}, {\"product\": \"cubix\", \
               \"carat\": \"0.10ct\", \"color\": \"navy\", \"quantity\": 4}]}}\n```";

    let result = extract::run(raw);
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["data"]["strategy"], "fenced_block");
    assert_eq!(payload["data"]["reply"]["message"], "Starter order");
    assert_eq!(payload["data"]["quote"]["subtotal"], "461");
    assert_eq!(payload["data"]["reconciled"]["lines"][1]["colors"][0]["color"], "Navy");
}

#[test]
fn extract_falls_back_to_plain_text() {
    let result = extract::run("I could not find that collection, sorry.");
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["data"]["strategy"], "plain_text");
    assert_eq!(payload["data"]["reply"]["message"], "I could not find that collection, sorry.");
    assert!(payload["data"].get("quote").is_none());
}

#[test]
fn resolve_maps_free_text_and_carats() {
    let result = resolve::run("cuty classic", Some("0.20 ct"));
    assert_eq!(result.exit_code, 0);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["data"]["collection_id"], "cuty");
    assert_eq!(payload["data"]["carat"]["index"], 2);
    assert_eq!(payload["data"]["carat"]["price"], 65);
    assert_eq!(payload["data"]["carat"]["matched"], true);

    let fallback = parse_payload(&resolve::run("CUTY", Some("2ct")).output);
    assert_eq!(fallback["data"]["carat"]["index"], 0);
    assert_eq!(fallback["data"]["carat"]["matched"], false);

    let unknown = resolve::run("diamond tiara", None);
    assert_eq!(unknown.exit_code, 4);
    assert_eq!(parse_payload(&unknown.output)["error_class"], "unknown_collection");
}

struct FixedRegistry(Result<RegistryResponse, RegistryError>);

#[async_trait]
impl VatRegistry for FixedRegistry {
    async fn check(&self, _vat: &VatNumber) -> Result<RegistryResponse, RegistryError> {
        self.0.clone()
    }
}

fn vat_client(response: Result<RegistryResponse, RegistryError>) -> VatClient {
    VatClient::new(
        Arc::new(FixedRegistry(response)),
        Arc::new(InMemoryTtlCache::new()),
        VatClientOptions::default(),
    )
}

#[tokio::test]
async fn vat_reports_a_valid_company() {
    let client = vat_client(Ok(RegistryResponse::new(
        200,
        r#"{"valid":true,"name":"ACME GmbH","address":"Berlin"}"#,
    )));

    let result = vat::run_with_client(&client, "de 123 456 789").await;
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["data"]["status"], "VALID");
    assert_eq!(payload["data"]["companyName"], "ACME GmbH");
    assert_eq!(payload["message"], "DE123456789 is VALID (ACME GmbH)");
}

#[tokio::test]
async fn vat_rejects_bad_format_without_failing_the_command() {
    let client = vat_client(Err(RegistryError::Timeout));

    let result = vat::run_with_client(&client, "not a vat number").await;
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["data"]["status"], "INVALID");
    assert_eq!(payload["data"]["reason"], "INVALID_FORMAT");
    assert_eq!(payload["data"]["attempts"], 0);
}

struct CannedLlm(Result<String, LlmError>);

#[async_trait]
impl LlmClient for CannedLlm {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        self.0.clone()
    }
}

fn agent(reply: Result<String, LlmError>) -> AgentRuntime {
    AgentRuntime::new(
        Arc::new(CannedLlm(reply)),
        Catalog::standard(),
        RuntimeSettings {
            model: "test-model".to_string(),
            max_tokens: 512,
            timeout: Duration::from_secs(5),
        },
    )
}

#[tokio::test]
async fn ask_replaces_the_order_from_the_reply() {
    let agent = agent(Ok(r#"{"message":"Added CUBIX.","quote":[
        {"product":"CUBIX","carat":"0.10ct","color":"Navy","quantity":4}
    ]}"#
        .to_string()));
    let current = vec![OrderLine::new("cuty", vec![OrderLineColorConfig::new("Black", 3.0)])];

    let result = ask::run_with_agent(&agent, &current, "swap to cubix navy").await;
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["message"], "Added CUBIX.");
    assert_eq!(payload["data"]["orderReplaced"], true);
    assert_eq!(payload["data"]["order"][0]["collectionId"], "cubix");
    assert_eq!(payload["data"]["quote"]["subtotal"], "136");
}

#[tokio::test]
async fn ask_failure_keeps_the_order_and_reports_upstream_error() {
    let agent = agent(Err(LlmError::Api { status: 529, message: "overloaded".to_string() }));

    let result = ask::run_with_agent(&agent, &[], "hello").await;
    assert_eq!(result.exit_code, 5);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "service_unavailable");
}

#[test]
fn ask_requires_an_api_key() {
    with_env(&[], || {
        let result = ask::run("3 CUTY in black", None);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_keys() {
    with_env(&[("FAIRQUOTE_LLM_MODEL", "env-model"), ("FAIRQUOTE_LLM_API_KEY", "sk-secret")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);
        assert!(!result.output.contains("sk-secret"));

        let payload = parse_payload(&result.output);
        let entries = payload["data"].as_array().expect("entries");
        let model = entries.iter().find(|entry| entry["key"] == "llm.model").expect("model");
        assert_eq!(model["value"], "env-model");
        assert_eq!(model["source"], "env (FAIRQUOTE_LLM_MODEL)");
        let key = entries.iter().find(|entry| entry["key"] == "llm.api_key").expect("key");
        assert_eq!(key["value"], "<redacted>");
    });
}

#[test]
fn config_reports_invalid_env_overrides() {
    with_env(&[("FAIRQUOTE_VAT_MAX_ATTEMPTS", "many")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "FAIRQUOTE_LLM_API_KEY",
        "FAIRQUOTE_LLM_BASE_URL",
        "FAIRQUOTE_LLM_MODEL",
        "FAIRQUOTE_LLM_TIMEOUT_SECS",
        "FAIRQUOTE_LLM_MAX_TOKENS",
        "FAIRQUOTE_VAT_ENDPOINT",
        "FAIRQUOTE_VAT_TIMEOUT_SECS",
        "FAIRQUOTE_VAT_MAX_ATTEMPTS",
        "FAIRQUOTE_VAT_BASE_DELAY_MS",
        "FAIRQUOTE_VAT_JITTER_PCT",
        "FAIRQUOTE_VAT_VALID_TTL_SECS",
        "FAIRQUOTE_VAT_UNVERIFIED_TTL_SECS",
        "FAIRQUOTE_LOGGING_LEVEL",
        "FAIRQUOTE_LOGGING_FORMAT",
        "FAIRQUOTE_LOG_LEVEL",
        "FAIRQUOTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
