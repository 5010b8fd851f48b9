pub mod ask;
pub mod config;
pub mod extract;
pub mod quote;
pub mod resolve;
pub mod vat;

use std::fs;
use std::path::Path;

use anyhow::Context;
use fairquote_core::domain::order::OrderLine;
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_INPUT: u8 = 4;
pub const EXIT_UPSTREAM: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok(command, message.into(), None)
    }

    /// Success envelope carrying a structured payload under `data`.
    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::ok(command, message.into(), Some(value)),
            Err(error) => Self::failure(command, "serialization", error.to_string(), EXIT_RUNTIME),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn ok(command: &str, message: String, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Reads an order file: either a bare array of lines or `{"lines": [...]}`.
pub fn read_order_file(path: &Path) -> anyhow::Result<Vec<OrderLine>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read `{}`", path.display()))?;
    parse_order(&raw).with_context(|| format!("could not parse `{}`", path.display()))
}

pub fn parse_order(raw: &str) -> Result<Vec<OrderLine>, serde_json::Error> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum OrderDocument {
        Lines(Vec<OrderLine>),
        Wrapped { lines: Vec<OrderLine> },
    }

    Ok(match serde_json::from_str::<OrderDocument>(raw)? {
        OrderDocument::Lines(lines) | OrderDocument::Wrapped { lines } => lines,
    })
}

pub(crate) fn current_thread_runtime(
    command: &str,
) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        )
    })
}
