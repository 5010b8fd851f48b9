use fairquote_agent::extract::{extract_json_with_strategy, strip_markdown};
use fairquote_agent::reconcile::{reconcile, Reconciliation};
use fairquote_agent::reply::AssistantReply;
use fairquote_core::cpq::pricing::calculate_quote;
use fairquote_core::cpq::resolver::CatalogResolver;
use fairquote_core::domain::quote::Quote;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ExtractReport {
    strategy: &'static str,
    reply: AssistantReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    reconciled: Option<Reconciliation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quote: Option<Quote>,
}

/// Runs a pasted completion through extraction and reconciliation, offline.
pub fn run(raw: &str) -> CommandResult {
    let (value, strategy) = extract_json_with_strategy(raw);
    let mut reply = AssistantReply::from_value(&value);
    reply.message = strip_markdown(&reply.message);

    let reconciled =
        reply.quote.as_ref().map(|payload| reconcile(payload, &CatalogResolver::default()));
    let quote = reconciled.as_ref().map(|reconciled| calculate_quote(&reconciled.lines));

    let message = match &quote {
        Some(quote) => format!("extracted via {}: {}", strategy.as_str(), quote.summary()),
        None => format!("extracted via {}: no order proposed", strategy.as_str()),
    };
    let report = ExtractReport { strategy: strategy.as_str(), reply, reconciled, quote };
    CommandResult::success_with_data("extract", message, &report)
}
