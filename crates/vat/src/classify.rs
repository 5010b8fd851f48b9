//! Pure classification of registry answers into verdicts.
//!
//! An explicit error code in the payload wins over the `valid` flag. Busy
//! codes, transport failures and throttling statuses are retryable; anything
//! the classifier does not recognize is `UNVERIFIED` and final.

use serde_json::Value;

use crate::parse::VatNumber;
use crate::registry::{RegistryError, RegistryResponse};
use crate::verdict::{
    VatVerdict, REASON_AMBIGUOUS, REASON_INVALID_INPUT, REASON_TIMEOUT, REASON_TRANSPORT,
    REASON_UNPARSEABLE,
};

pub const BUSY_CODES: &[&str] = &[
    "MS_UNAVAILABLE",
    "MS_MAX_CONCURRENT_REQ",
    "GLOBAL_MAX_CONCURRENT_REQ",
    "SERVICE_UNAVAILABLE",
    "TIMEOUT",
    "SERVER_BUSY",
];

const RETRYABLE_STATUSES: &[u16] = &[429, 503, 504];

/// Placeholder the registry uses for withheld company details.
const WITHHELD: &str = "---";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub verdict: VatVerdict,
    pub retryable: bool,
}

impl Classification {
    fn terminal(verdict: VatVerdict) -> Self {
        Self { verdict, retryable: false }
    }

    fn retryable(verdict: VatVerdict) -> Self {
        Self { verdict, retryable: true }
    }
}

pub fn classify_error(vat: &VatNumber, error: &RegistryError) -> Classification {
    let reason = match error {
        RegistryError::Timeout => REASON_TIMEOUT,
        RegistryError::Transport(_) => REASON_TRANSPORT,
    };
    Classification::retryable(VatVerdict::unverified(&vat.country_code, &vat.number, reason))
}

pub fn classify_response(vat: &VatNumber, response: &RegistryResponse) -> Classification {
    let country = vat.country_code.as_str();
    let number = vat.number.as_str();

    if RETRYABLE_STATUSES.contains(&response.status) {
        return Classification::retryable(VatVerdict::unverified(
            country,
            number,
            format!("HTTP_{}", response.status),
        ));
    }

    let Ok(Value::Object(body)) = serde_json::from_str::<Value>(&response.body) else {
        return Classification::terminal(VatVerdict::unverified(
            country,
            number,
            REASON_UNPARSEABLE,
        ));
    };

    if let Some(code) = error_code(&body) {
        let code = code.to_ascii_uppercase();
        if BUSY_CODES.contains(&code.as_str()) {
            return Classification::retryable(VatVerdict::unverified(country, number, code));
        }
        if code == REASON_INVALID_INPUT {
            return Classification::terminal(VatVerdict::invalid(country, number, Some(code)));
        }
        return Classification::terminal(VatVerdict::unverified(country, number, code));
    }

    let valid_flag = body.get("valid").and_then(Value::as_bool).or_else(|| {
        match body.get("userError").and_then(Value::as_str) {
            Some("VALID") => Some(true),
            Some("INVALID") => Some(false),
            _ => None,
        }
    });

    match valid_flag {
        Some(true) => Classification::terminal(VatVerdict::valid(
            country,
            number,
            company_field(&body, &["name", "traderName"]),
            company_field(&body, &["address", "traderAddress"]),
        )),
        Some(false) => Classification::terminal(VatVerdict::invalid(country, number, None)),
        None if !(200..300).contains(&response.status) => Classification::terminal(
            VatVerdict::unverified(country, number, format!("HTTP_{}", response.status)),
        ),
        None => Classification::terminal(VatVerdict::unverified(country, number, REASON_AMBIGUOUS)),
    }
}

/// Error code from `errorWrappers[0].error`, a non-verdict `userError`, or a
/// top-level `error`/`errorCode` string.
fn error_code(body: &serde_json::Map<String, Value>) -> Option<String> {
    let wrapped = body
        .get("errorWrappers")
        .and_then(Value::as_array)
        .and_then(|wrappers| wrappers.first())
        .and_then(|wrapper| wrapper.get("error"))
        .and_then(Value::as_str);

    let user_error = body
        .get("userError")
        .and_then(Value::as_str)
        .filter(|code| !matches!(*code, "VALID" | "INVALID"));

    let top_level = ["error", "errorCode"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str));

    wrapped
        .or(user_error)
        .or(top_level)
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}

fn company_field(body: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        body.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty() && *value != WITHHELD)
            .map(str::to_string)
    })
}
