use std::path::Path;
use std::sync::Arc;

use fairquote_agent::llm::AnthropicClient;
use fairquote_agent::runtime::{AgentRuntime, RuntimeSettings};
use fairquote_core::config::{AppConfig, LoadOptions};
use fairquote_core::cpq::catalog::Catalog;
use fairquote_core::domain::order::OrderLine;

use crate::commands::{
    current_thread_runtime, read_order_file, CommandResult, EXIT_CONFIG, EXIT_INPUT, EXIT_UPSTREAM,
};

pub fn run(text: &str, order_path: Option<&Path>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };
    if !config.llm.has_api_key() {
        return CommandResult::failure(
            "ask",
            "config_validation",
            "no API key configured (set FAIRQUOTE_LLM_API_KEY)",
            EXIT_CONFIG,
        );
    }

    let current_order = match order_path.map(read_order_file).transpose() {
        Ok(order) => order.unwrap_or_default(),
        Err(error) => {
            return CommandResult::failure("ask", "input", format!("{error:#}"), EXIT_INPUT);
        }
    };

    let client = match AnthropicClient::from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            );
        }
    };
    let agent = AgentRuntime::new(
        Arc::new(client),
        Catalog::standard(),
        RuntimeSettings::from(&config.llm),
    );

    let runtime = match current_thread_runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    runtime.block_on(run_with_agent(&agent, &current_order, text))
}

/// Single stateless turn. A failed turn reports the user-facing message and
/// leaves the given order as it was.
pub async fn run_with_agent(
    agent: &AgentRuntime,
    current_order: &[OrderLine],
    text: &str,
) -> CommandResult {
    let turn = agent.handle_turn(&[], current_order, text).await;

    match &turn.error {
        Some(error) => CommandResult::failure(
            "ask",
            error.error_class,
            format!("{} ({})", error.user_message, error.detail),
            EXIT_UPSTREAM,
        ),
        None => CommandResult::success_with_data("ask", turn.message.clone(), &turn),
    }
}
