use std::sync::Arc;
use std::time::Duration;

use fairquote_core::config::{LlmConfig, MAX_COMPLETION_TOKENS};
use fairquote_core::cpq::catalog::Catalog;
use fairquote_core::cpq::pricing::{DeterministicQuoteEngine, QuoteEngine};
use fairquote_core::cpq::resolver::CatalogResolver;
use fairquote_core::domain::order::OrderLine;
use fairquote_core::domain::quote::Quote;
use fairquote_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extract::{extract_json_with_strategy, strip_markdown};
use crate::llm::{ChatMessage, CompletionRequest, LlmClient, LlmError};
use crate::prompt::{build_system_prompt, render_user_turn};
use crate::reconcile::{reconcile, UnresolvedLine};
use crate::reply::AssistantReply;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&LlmConfig> for RuntimeSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnError {
    pub error_class: &'static str,
    pub user_message: String,
    pub detail: String,
}

/// Outcome of one assistant turn. `order` is the order after the turn, whether
/// or not the reply replaced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantTurn {
    pub correlation_id: String,
    pub message: String,
    pub options: Vec<String>,
    pub order: Vec<OrderLine>,
    pub order_replaced: bool,
    pub quote: Quote,
    pub unresolved: Vec<UnresolvedLine>,
    pub raw_reply: Option<String>,
    pub error: Option<TurnError>,
}

impl AssistantTurn {
    /// History entry to send back on the next turn, when the model answered.
    pub fn history_entry(&self) -> Option<ChatMessage> {
        self.raw_reply.as_ref().map(|raw| ChatMessage::assistant(raw.clone()))
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    resolver: CatalogResolver,
    engine: DeterministicQuoteEngine,
    settings: RuntimeSettings,
    system_prompt: String,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, catalog: Catalog, settings: RuntimeSettings) -> Self {
        let settings = RuntimeSettings {
            max_tokens: settings.max_tokens.clamp(1, MAX_COMPLETION_TOKENS),
            ..settings
        };
        Self {
            llm,
            resolver: CatalogResolver::new(catalog),
            engine: DeterministicQuoteEngine::new(catalog),
            settings,
            system_prompt: build_system_prompt(&catalog),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn build_request(
        &self,
        history: &[ChatMessage],
        current_order: &[OrderLine],
        user_text: &str,
    ) -> CompletionRequest {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(render_user_turn(current_order, user_text)));

        CompletionRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            system: self.system_prompt.clone(),
            messages,
        }
    }

    /// One request/response cycle. A reply with a structured order replaces
    /// `current_order` wholesale; any failure leaves it untouched.
    pub async fn handle_turn(
        &self,
        history: &[ChatMessage],
        current_order: &[OrderLine],
        user_text: &str,
    ) -> AssistantTurn {
        let correlation_id = Uuid::new_v4().to_string();
        let request = self.build_request(history, current_order, user_text);

        info!(
            event_name = "agent.turn.started",
            correlation_id = %correlation_id,
            history_len = history.len(),
            order_lines = current_order.len(),
            "assistant turn started"
        );

        let completion = match timeout(self.settings.timeout, self.llm.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout),
        };

        let raw = match completion {
            Ok(raw) => raw,
            Err(error) => return self.failed_turn(correlation_id, current_order, error),
        };

        let (value, strategy) = extract_json_with_strategy(&raw);
        let reply = AssistantReply::from_value(&value);
        debug!(
            event_name = "agent.turn.extracted",
            correlation_id = %correlation_id,
            strategy = strategy.as_str(),
            has_quote = reply.has_quote(),
            "assistant reply extracted"
        );

        let (order, order_replaced, unresolved) = match &reply.quote {
            Some(payload) => {
                let reconciled = reconcile(payload, &self.resolver);
                (reconciled.lines, true, reconciled.unresolved)
            }
            None => (current_order.to_vec(), false, Vec::new()),
        };
        let quote = self.engine.calculate(&order);

        info!(
            event_name = "agent.turn.finished",
            correlation_id = %correlation_id,
            order_replaced,
            unresolved = unresolved.len(),
            subtotal = %quote.subtotal,
            "assistant turn finished"
        );

        AssistantTurn {
            correlation_id,
            message: strip_markdown(&reply.message),
            options: reply.options,
            order,
            order_replaced,
            quote,
            unresolved,
            raw_reply: Some(raw),
            error: None,
        }
    }

    fn failed_turn(
        &self,
        correlation_id: String,
        current_order: &[OrderLine],
        error: LlmError,
    ) -> AssistantTurn {
        let detail = error.to_string();
        let interface = application_error(&error, &self.settings).into_interface(&correlation_id);

        warn!(
            event_name = "agent.turn.failed",
            correlation_id = %correlation_id,
            error = %detail,
            "assistant turn failed"
        );

        AssistantTurn {
            message: interface.user_message().to_string(),
            options: Vec::new(),
            order: current_order.to_vec(),
            order_replaced: false,
            quote: self.engine.calculate(current_order),
            unresolved: Vec::new(),
            raw_reply: None,
            error: Some(TurnError {
                error_class: error_class(&interface),
                user_message: interface.user_message().to_string(),
                detail,
            }),
            correlation_id,
        }
    }
}

fn application_error(error: &LlmError, settings: &RuntimeSettings) -> ApplicationError {
    match error {
        LlmError::MissingApiKey => ApplicationError::Configuration(error.to_string()),
        LlmError::Timeout => ApplicationError::Timeout(settings.timeout.as_secs()),
        LlmError::Transport(_) | LlmError::Api { .. } | LlmError::InvalidResponse(_) => {
            ApplicationError::Integration(error.to_string())
        }
    }
}

fn error_class(error: &InterfaceError) -> &'static str {
    match error {
        InterfaceError::BadRequest { .. } => "bad_request",
        InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
        InterfaceError::Internal { .. } => "internal",
    }
}
