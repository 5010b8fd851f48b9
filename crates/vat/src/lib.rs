//! VAT number validation against the EU VIES registry.
//!
//! The registry is slow and frequently busy, so a lookup is wrapped in a
//! per-attempt timeout, retried with jittered exponential backoff, and its
//! answer is classified into `VALID`, `INVALID` or `UNVERIFIED`. Verdicts are
//! cached by `COUNTRY:NUMBER`, briefly when unverified.
//!
//! - `parse` - syntax check and normalization, no network
//! - `retry` - backoff state machine
//! - `cache` - TTL cache seam with an in-memory store
//! - `registry` - transport seam and the HTTP implementation
//! - `classify` - registry answer to verdict
//! - `client` - the orchestrating `VatClient`

pub mod cache;
pub mod classify;
pub mod client;
pub mod parse;
pub mod registry;
pub mod retry;
pub mod verdict;

pub use cache::{InMemoryTtlCache, TtlCache};
pub use client::{VatClient, VatClientOptions};
pub use parse::{parse_vat_number, VatFormatError, VatNumber};
pub use registry::{HttpVatRegistry, RegistryError, RegistryResponse, VatRegistry};
pub use retry::{BackoffPolicy, JitterSource, RetrySchedule, RetryState};
pub use verdict::{VatStatus, VatVerdict};
