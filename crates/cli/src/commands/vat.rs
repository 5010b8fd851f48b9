use fairquote_core::config::{AppConfig, LoadOptions};
use fairquote_vat::{VatClient, VatStatus, VatVerdict};

use crate::commands::{current_thread_runtime, CommandResult, EXIT_CONFIG, EXIT_RUNTIME};

pub fn run(number: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "vat",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let client = match VatClient::from_config(&config.vat) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure("vat", "client_init", error.to_string(), EXIT_RUNTIME);
        }
    };

    let runtime = match current_thread_runtime("vat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    runtime.block_on(run_with_client(&client, number))
}

/// Every verdict is a successful command; `UNVERIFIED` is an answer, not an error.
pub async fn run_with_client(client: &VatClient, number: &str) -> CommandResult {
    let verdict = client.validate(number).await;
    let message = match (verdict.status, verdict.reason()) {
        (VatStatus::Valid, _) => match &verdict.company_name {
            Some(name) => format!("{} is VALID ({name})", verdict_key(&verdict)),
            None => format!("{} is VALID", verdict_key(&verdict)),
        },
        (status, Some(reason)) => {
            format!("{} is {} ({reason})", verdict_key(&verdict), status.as_str())
        }
        (status, None) => format!("{} is {}", verdict_key(&verdict), status.as_str()),
    };
    CommandResult::success_with_data("vat", message, &verdict)
}

fn verdict_key(verdict: &VatVerdict) -> String {
    format!("{}{}", verdict.country_code, verdict.vat_number)
}
