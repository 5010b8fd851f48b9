use std::fmt;

use thiserror::Error;

/// EU member prefixes accepted by the registry, plus `XI` for Northern Ireland.
pub const EU_PREFIXES: &[&str] = &[
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "EL", "ES", "FI", "FR", "HR", "HU", "IE",
    "IT", "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK", "XI",
];

const MIN_NUMBER_LEN: usize = 2;
const MAX_NUMBER_LEN: usize = 12;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VatNumber {
    pub country_code: String,
    pub number: String,
}

impl VatNumber {
    /// Cache key, `COUNTRY:NUMBER`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.country_code, self.number)
    }
}

impl fmt::Display for VatNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.country_code, self.number)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VatFormatError {
    #[error("VAT number is empty")]
    Empty,
    #[error("`{0}` is not an EU VAT prefix")]
    UnknownPrefix(String),
    #[error("VAT number body must be {MIN_NUMBER_LEN}-{MAX_NUMBER_LEN} letters or digits")]
    InvalidNumber,
}

/// Strips separators and uppercases. Used for both parsing and reporting.
pub fn clean_vat_input(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn parse_vat_number(input: &str) -> Result<VatNumber, VatFormatError> {
    let cleaned = clean_vat_input(input);
    if cleaned.is_empty() {
        return Err(VatFormatError::Empty);
    }

    let prefix: String = cleaned.chars().take(2).collect();
    let country_code = match prefix.as_str() {
        "GR" => "EL".to_string(),
        code if EU_PREFIXES.contains(&code) => code.to_string(),
        _ => return Err(VatFormatError::UnknownPrefix(prefix)),
    };

    let number: String = cleaned.chars().skip(2).collect();
    let len = number.chars().count();
    if !(MIN_NUMBER_LEN..=MAX_NUMBER_LEN).contains(&len)
        || !number.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(VatFormatError::InvalidNumber);
    }

    Ok(VatNumber { country_code, number })
}
