//! Order assistant - turns a salesperson's free text into a priced order
//!
//! The model proposes; the catalog decides. One turn runs:
//! 1. **Prompting** (`prompt`) - catalog, business rules and the reply contract
//! 2. **Completion** (`llm`) - a single call through the pluggable `LlmClient`
//! 3. **Extraction** (`extract`, `reply`) - recover a JSON reply from whatever text came back
//! 4. **Reconciliation** (`reconcile`) - map suggested lines onto canonical catalog entries
//!
//! `AgentRuntime` (see `runtime`) ties the steps together and prices the
//! resulting order with the deterministic quote engine.
//!
//! # Safety Principle
//!
//! The model never sets a price. Prices in a reply are ignored; every total
//! comes from `fairquote_core`.

pub mod extract;
pub mod llm;
pub mod prompt;
pub mod reconcile;
pub mod reply;
pub mod runtime;

pub use extract::{extract_json, strip_markdown, ExtractionStrategy};
pub use llm::{AnthropicClient, ChatMessage, CompletionRequest, LlmClient, LlmError, Role};
pub use reconcile::{reconcile, Reconciliation, SkipReason, UnresolvedLine};
pub use reply::{AssistantReply, QuotePayload, SuggestedColor, SuggestedLine};
pub use runtime::{AgentRuntime, AssistantTurn, RuntimeSettings, TurnError};
