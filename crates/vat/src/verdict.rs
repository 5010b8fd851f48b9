use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REASON_INVALID_FORMAT: &str = "INVALID_FORMAT";
pub const REASON_INVALID_INPUT: &str = "INVALID_INPUT";
pub const REASON_TIMEOUT: &str = "TIMEOUT";
pub const REASON_TRANSPORT: &str = "TRANSPORT_ERROR";
pub const REASON_UNPARSEABLE: &str = "UNPARSEABLE_RESPONSE";
pub const REASON_AMBIGUOUS: &str = "AMBIGUOUS_RESPONSE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VatStatus {
    Valid,
    Invalid,
    Unverified,
}

impl VatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Unverified => "UNVERIFIED",
        }
    }

    /// `true` when the registry gave a definitive answer.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Unverified)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VatVerdict {
    pub status: VatStatus,
    pub valid: bool,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub reason: Option<String>,
    pub country_code: String,
    pub vat_number: String,
    pub attempts: u32,
    pub checked_at: Option<DateTime<Utc>>,
}

impl VatVerdict {
    fn base(status: VatStatus, country_code: &str, vat_number: &str) -> Self {
        Self {
            status,
            valid: matches!(status, VatStatus::Valid),
            company_name: None,
            company_address: None,
            reason: None,
            country_code: country_code.to_string(),
            vat_number: vat_number.to_string(),
            attempts: 0,
            checked_at: None,
        }
    }

    pub fn valid(
        country_code: &str,
        vat_number: &str,
        company_name: Option<String>,
        company_address: Option<String>,
    ) -> Self {
        Self {
            company_name,
            company_address,
            ..Self::base(VatStatus::Valid, country_code, vat_number)
        }
    }

    pub fn invalid(country_code: &str, vat_number: &str, reason: Option<String>) -> Self {
        Self { reason, ..Self::base(VatStatus::Invalid, country_code, vat_number) }
    }

    pub fn unverified(country_code: &str, vat_number: &str, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::base(VatStatus::Unverified, country_code, vat_number)
        }
    }

    /// Verdict for input that never reached the registry. Country and number
    /// carry the cleaned-up input so the caller can show what was rejected.
    pub fn invalid_format(country_code: &str, vat_number: &str) -> Self {
        Self::invalid(country_code, vat_number, Some(REASON_INVALID_FORMAT.to_string()))
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_checked_at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = Some(checked_at);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}
