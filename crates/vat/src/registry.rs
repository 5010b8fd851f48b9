use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::parse::VatNumber;

/// Raw registry answer: HTTP status plus the undecoded body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryResponse {
    pub status: u16,
    pub body: String,
}

impl RegistryResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry transport failed: {0}")]
    Transport(String),
    #[error("registry request timed out")]
    Timeout,
}

impl From<reqwest::Error> for RegistryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// One lookup against the VAT registry. Implementations never interpret the body.
#[async_trait]
pub trait VatRegistry: Send + Sync {
    async fn check(&self, vat: &VatNumber) -> Result<RegistryResponse, RegistryError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckVatRequest<'a> {
    country_code: &'a str,
    vat_number: &'a str,
}

/// VIES REST endpoint (`check-vat-number`).
pub struct HttpVatRegistry {
    client: Client,
    endpoint: String,
}

impl HttpVatRegistry {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VatRegistry for HttpVatRegistry {
    async fn check(&self, vat: &VatNumber) -> Result<RegistryResponse, RegistryError> {
        let request = CheckVatRequest { country_code: &vat.country_code, vat_number: &vat.number };

        let response = self
            .client
            .post(&self.endpoint)
            .header("accept", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        // Error statuses still carry a body worth classifying. A body cut off
        // mid-read is a transport failure, not an empty answer.
        let body = response.text().await?;

        Ok(RegistryResponse { status, body })
    }
}
