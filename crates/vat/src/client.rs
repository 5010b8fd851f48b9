use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fairquote_core::config::VatConfig;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::cache::{InMemoryTtlCache, TtlCache};
use crate::classify::{classify_error, classify_response, Classification};
use crate::parse::{clean_vat_input, parse_vat_number, VatNumber};
use crate::registry::{HttpVatRegistry, RegistryError, VatRegistry};
use crate::retry::{
    AttemptOutcome, BackoffPolicy, JitterSource, RandomJitter, RetrySchedule, RetryState,
};
use crate::verdict::{VatStatus, VatVerdict};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VatClientOptions {
    pub attempt_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub definitive_ttl: Duration,
    pub unverified_ttl: Duration,
}

impl Default for VatClientOptions {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
            definitive_ttl: Duration::from_secs(24 * 60 * 60),
            unverified_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl From<&VatConfig> for VatClientOptions {
    fn from(config: &VatConfig) -> Self {
        Self {
            attempt_timeout: Duration::from_secs(config.timeout_secs),
            backoff: BackoffPolicy {
                max_attempts: config.max_attempts,
                base_delay: Duration::from_millis(config.base_delay_ms),
                jitter_pct: config.jitter_pct,
            },
            definitive_ttl: Duration::from_secs(config.valid_ttl_secs),
            unverified_ttl: Duration::from_secs(config.unverified_ttl_secs),
        }
    }
}

/// Orchestrates parse, cache lookup, bounded retries and classification.
pub struct VatClient {
    registry: Arc<dyn VatRegistry>,
    cache: Arc<dyn TtlCache>,
    jitter: Arc<dyn JitterSource>,
    options: VatClientOptions,
}

impl VatClient {
    pub fn new(
        registry: Arc<dyn VatRegistry>,
        cache: Arc<dyn TtlCache>,
        options: VatClientOptions,
    ) -> Self {
        Self { registry, cache, jitter: Arc::new(RandomJitter), options }
    }

    pub fn from_config(config: &VatConfig) -> Result<Self, RegistryError> {
        let options = VatClientOptions::from(config);
        let registry = HttpVatRegistry::new(config.endpoint.clone(), options.attempt_timeout)?;
        Ok(Self::new(Arc::new(registry), Arc::new(InMemoryTtlCache::new()), options))
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn options(&self) -> &VatClientOptions {
        &self.options
    }

    pub async fn validate(&self, input: &str) -> VatVerdict {
        let vat = match parse_vat_number(input) {
            Ok(vat) => vat,
            Err(error) => {
                let cleaned = clean_vat_input(input);
                let (country, number) = split_prefix(&cleaned);
                debug!(
                    event_name = "vat.format_rejected",
                    input = %cleaned,
                    error = %error,
                    "VAT number rejected before lookup"
                );
                return VatVerdict::invalid_format(country, number);
            }
        };

        let key = vat.key();
        if let Some(cached) = self.cache.get(&key).await {
            debug!(
                event_name = "vat.cache_hit",
                vat_key = %key,
                status = cached.status.as_str(),
                "serving cached VAT verdict"
            );
            return cached;
        }

        let verdict = self.lookup_with_retries(&vat).await;

        let ttl = match verdict.status {
            VatStatus::Unverified => self.options.unverified_ttl,
            VatStatus::Valid | VatStatus::Invalid => self.options.definitive_ttl,
        };
        let purged = self.cache.purge_expired().await;
        if purged > 0 {
            debug!(event_name = "vat.cache_purged", purged, "dropped expired VAT verdicts");
        }
        self.cache.put(&key, verdict.clone(), ttl).await;

        info!(
            event_name = "vat.validated",
            vat_key = %key,
            status = verdict.status.as_str(),
            reason = verdict.reason().unwrap_or(""),
            attempts = verdict.attempts,
            "VAT validation finished"
        );
        verdict
    }

    async fn lookup_with_retries(&self, vat: &VatNumber) -> VatVerdict {
        let mut schedule = RetrySchedule::new(self.options.backoff, self.jitter.clone());

        loop {
            let attempt = schedule.attempt();
            let Classification { verdict, retryable } = self.attempt(vat).await;
            let verdict = verdict.with_attempts(attempt).with_checked_at(Utc::now());

            let outcome =
                if retryable { AttemptOutcome::Retryable } else { AttemptOutcome::Terminal };

            match schedule.on_outcome(outcome) {
                RetryState::Retrying { next_attempt, delay } => {
                    warn!(
                        event_name = "vat.retry_scheduled",
                        vat_key = %vat.key(),
                        reason = verdict.reason().unwrap_or(""),
                        next_attempt,
                        delay_ms = delay.as_millis() as u64,
                        "VAT registry busy, retrying"
                    );
                    sleep(delay).await;
                    schedule.resume();
                }
                RetryState::GaveUp { attempts } => {
                    warn!(
                        event_name = "vat.retries_exhausted",
                        vat_key = %vat.key(),
                        attempts,
                        "VAT registry unavailable after all attempts"
                    );
                    break verdict;
                }
                RetryState::Succeeded { .. } | RetryState::Attempting(_) => break verdict,
            }
        }
    }

    async fn attempt(&self, vat: &VatNumber) -> Classification {
        match timeout(self.options.attempt_timeout, self.registry.check(vat)).await {
            Ok(Ok(response)) => classify_response(vat, &response),
            Ok(Err(error)) => classify_error(vat, &error),
            Err(_) => classify_error(vat, &RegistryError::Timeout),
        }
    }
}

fn split_prefix(cleaned: &str) -> (&str, &str) {
    match cleaned.char_indices().nth(2) {
        Some((index, _)) => cleaned.split_at(index),
        None => (cleaned, ""),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::{VatClient, VatClientOptions};
    use crate::cache::{InMemoryTtlCache, TtlCache};
    use crate::parse::VatNumber;
    use crate::registry::{RegistryError, RegistryResponse, VatRegistry};
    use crate::retry::{BackoffPolicy, FixedJitter};
    use crate::verdict::VatStatus;

    const BUSY: &str = r#"{"valid":false,"userError":"MS_MAX_CONCURRENT_REQ"}"#;
    const VALID: &str = r#"{"valid":true,"name":"ACME GmbH","address":"Berlin"}"#;
    const INVALID: &str = r#"{"valid":false,"userError":"INVALID"}"#;

    type Scripted = Result<RegistryResponse, RegistryError>;

    struct ScriptedRegistry {
        script: Mutex<VecDeque<Scripted>>,
        fallback: Scripted,
        calls: AtomicU32,
        call_times: Mutex<Vec<Instant>>,
        delay: Option<Duration>,
    }

    impl ScriptedRegistry {
        fn new(script: Vec<Scripted>, fallback: Scripted) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicU32::new(0),
                call_times: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn always(response: Scripted) -> Self {
            Self::new(Vec::new(), response)
        }

        fn hanging(delay: Duration) -> Self {
            Self { delay: Some(delay), ..Self::always(Ok(RegistryResponse::new(200, VALID))) }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn gaps(&self) -> Vec<Duration> {
            let times = self.call_times.lock().expect("call times");
            times.windows(2).map(|pair| pair[1] - pair[0]).collect()
        }
    }

    #[async_trait]
    impl VatRegistry for ScriptedRegistry {
        async fn check(&self, _vat: &VatNumber) -> Result<RegistryResponse, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_times.lock().expect("call times").push(Instant::now());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().expect("script").pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn options() -> VatClientOptions {
        VatClientOptions {
            attempt_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(500),
                jitter_pct: 20,
            },
            definitive_ttl: Duration::from_secs(24 * 60 * 60),
            unverified_ttl: Duration::from_secs(5 * 60),
        }
    }

    /// Paused-clock timers fire on millisecond ticks.
    fn within(actual: Duration, expected: Duration) -> bool {
        actual >= expected && actual <= expected + Duration::from_millis(2)
    }

    fn client(registry: Arc<ScriptedRegistry>, cache: Arc<InMemoryTtlCache>) -> VatClient {
        VatClient::new(registry, cache, options()).with_jitter(Arc::new(FixedJitter(0.0)))
    }

    #[tokio::test(start_paused = true)]
    async fn definitive_invalid_answer_makes_exactly_one_call() {
        let registry =
            Arc::new(ScriptedRegistry::always(Ok(RegistryResponse::new(200, INVALID))));
        let client = client(registry.clone(), Arc::new(InMemoryTtlCache::new()));

        let verdict = client.validate("DE123456789").await;

        assert_eq!(verdict.status, VatStatus::Invalid);
        assert!(!verdict.valid);
        assert_eq!(verdict.attempts, 1);
        assert!(verdict.checked_at.is_some());
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_registry_is_retried_with_growing_delays() {
        let registry = Arc::new(ScriptedRegistry::always(Ok(RegistryResponse::new(200, BUSY))));
        let client = client(registry.clone(), Arc::new(InMemoryTtlCache::new()));

        let verdict = client.validate("DE123456789").await;

        assert_eq!(verdict.status, VatStatus::Unverified);
        assert_eq!(verdict.reason(), Some("MS_MAX_CONCURRENT_REQ"));
        assert_eq!(verdict.attempts, 3);
        assert_eq!(registry.calls(), 3);

        let gaps = registry.gaps();
        assert_eq!(gaps.len(), 2);
        assert!(within(gaps[0], Duration::from_millis(500)), "first gap {:?}", gaps[0]);
        assert!(within(gaps[1], Duration::from_millis(1000)), "second gap {:?}", gaps[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn jittered_delays_stay_monotonic() {
        let registry = Arc::new(ScriptedRegistry::always(Ok(RegistryResponse::new(503, ""))));
        let client = VatClient::new(registry.clone(), Arc::new(InMemoryTtlCache::new()), options());

        let verdict = client.validate("FR12345678901").await;

        assert_eq!(verdict.reason(), Some("HTTP_503"));
        let gaps = registry.gaps();
        assert_eq!(gaps.len(), 2);
        assert!(gaps[0] >= Duration::from_millis(400) && gaps[0] <= Duration::from_millis(602));
        assert!(gaps[1] > gaps[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_retry_succeeds() {
        let registry = Arc::new(ScriptedRegistry::new(
            vec![
                Ok(RegistryResponse::new(200, BUSY)),
                Err(RegistryError::Transport("connection reset".to_string())),
            ],
            Ok(RegistryResponse::new(200, VALID)),
        ));
        let client = client(registry.clone(), Arc::new(InMemoryTtlCache::new()));

        let verdict = client.validate("de 123 456 789").await;

        assert_eq!(verdict.status, VatStatus::Valid);
        assert_eq!(verdict.company_name.as_deref(), Some("ACME GmbH"));
        assert_eq!(verdict.attempts, 3);
        assert_eq!(registry.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_registry_times_out_into_unverified() {
        let registry = Arc::new(ScriptedRegistry::hanging(Duration::from_secs(60)));
        let client = client(registry.clone(), Arc::new(InMemoryTtlCache::new()));

        let verdict = client.validate("DE123456789").await;

        assert_eq!(verdict.status, VatStatus::Unverified);
        assert_eq!(verdict.reason(), Some("TIMEOUT"));
        assert_eq!(registry.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn ambiguous_payload_is_not_retried() {
        let registry = Arc::new(ScriptedRegistry::always(Ok(RegistryResponse::new(200, "{}"))));
        let client = client(registry.clone(), Arc::new(InMemoryTtlCache::new()));

        let verdict = client.validate("DE123456789").await;

        assert_eq!(verdict.status, VatStatus::Unverified);
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_input_never_reaches_the_registry() {
        let registry = Arc::new(ScriptedRegistry::always(Ok(RegistryResponse::new(200, VALID))));
        let cache = Arc::new(InMemoryTtlCache::new());
        let client = client(registry.clone(), cache.clone());

        let verdict = client.validate("US-123").await;

        assert_eq!(verdict.status, VatStatus::Invalid);
        assert_eq!(verdict.reason(), Some("INVALID_FORMAT"));
        assert_eq!(verdict.country_code, "US");
        assert_eq!(verdict.vat_number, "123");
        assert_eq!(verdict.attempts, 0);
        assert_eq!(registry.calls(), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn definitive_verdicts_are_cached_for_a_day() {
        let registry = Arc::new(ScriptedRegistry::always(Ok(RegistryResponse::new(200, VALID))));
        let client = client(registry.clone(), Arc::new(InMemoryTtlCache::new()));

        assert!(client.validate("DE123456789").await.valid);
        tokio::time::advance(Duration::from_secs(23 * 60 * 60)).await;
        assert!(client.validate("DE-123.456.789").await.valid);
        assert_eq!(registry.calls(), 1);

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        client.validate("DE123456789").await;
        assert_eq!(registry.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unverified_verdicts_expire_after_five_minutes() {
        let registry = Arc::new(ScriptedRegistry::new(
            vec![Ok(RegistryResponse::new(200, "{}"))],
            Ok(RegistryResponse::new(200, VALID)),
        ));
        let cache = Arc::new(InMemoryTtlCache::new());
        let client = client(registry.clone(), cache.clone());

        assert_eq!(client.validate("DE123456789").await.status, VatStatus::Unverified);
        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        assert_eq!(client.validate("DE123456789").await.status, VatStatus::Unverified);
        assert_eq!(registry.calls(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(client.validate("DE123456789").await.status, VatStatus::Valid);
        assert_eq!(registry.calls(), 2);
        assert!(cache.get("DE:123456789").await.is_some_and(|v| v.valid));
    }

    #[tokio::test(start_paused = true)]
    async fn storing_a_verdict_evicts_expired_ones() {
        let registry = Arc::new(ScriptedRegistry::always(Ok(RegistryResponse::new(200, "{}"))));
        let cache = Arc::new(InMemoryTtlCache::new());
        let client = client(registry.clone(), cache.clone());

        client.validate("DE123456789").await;
        assert_eq!(cache.len().await, 1);

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        client.validate("FR12345678901").await;

        assert_eq!(registry.calls(), 2);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("FR:12345678901").await.is_some());
    }
}
