//! Typed view of an extracted assistant reply.
//!
//! Every field is checked on its own. A field with the wrong type is dropped
//! rather than failing the whole reply, so a half-broken completion still
//! yields its message and whatever order lines survived.

use serde::Serialize;
use serde_json::{Map, Value};

const PRODUCT_KEYS: &[&str] = &["product", "collection", "collectionId", "name"];
const LINE_LIST_KEYS: &[&str] = &["lines", "items", "orderLines", "products"];
const QUANTITY_KEYS: &[&str] =
    &["quantityPerColor", "qtyPerColor", "quantity", "qty", "pieces", "pcs"];

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub message: String,
    pub quote: Option<QuotePayload>,
    pub options: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePayload {
    pub lines: Vec<SuggestedLine>,
}

/// One AI-proposed line before it is mapped onto the catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedLine {
    pub product: String,
    pub carat: Option<String>,
    pub housing: Option<String>,
    pub housing_type: Option<String>,
    pub attachment: Option<String>,
    pub shape: Option<String>,
    pub size: Option<String>,
    pub colors: Vec<SuggestedColor>,
    /// Line-level quantity, shared by every color without its own.
    pub quantity: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedColor {
    pub name: String,
    pub quantity: Option<f64>,
}

impl AssistantReply {
    pub fn from_value(value: &Map<String, Value>) -> Self {
        let message = value.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
        let quote = value.get("quote").and_then(QuotePayload::from_value);
        let options = value.get("options").map(parse_options).unwrap_or_default();

        Self { message, quote, options }
    }

    pub fn has_quote(&self) -> bool {
        self.quote.is_some()
    }
}

impl QuotePayload {
    /// Accepts `{lines: [...]}` (or a known alias) and a bare array of lines.
    /// `null` and anything without a line list is "no quote".
    pub fn from_value(value: &Value) -> Option<Self> {
        let raw_lines = match value {
            Value::Array(lines) => lines,
            Value::Object(object) => {
                LINE_LIST_KEYS.iter().find_map(|key| object.get(*key).and_then(Value::as_array))?
            }
            _ => return None,
        };

        let lines = raw_lines.iter().filter_map(SuggestedLine::from_value).collect();
        Some(Self { lines })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl SuggestedLine {
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let product = first_string(object, PRODUCT_KEYS)?;

        let mut colors = object.get("colors").map(parse_colors).unwrap_or_default();
        if colors.is_empty() {
            if let Some(name) = first_string(object, &["color", "colour"]) {
                colors.push(SuggestedColor { name, quantity: None });
            }
        }

        Some(Self {
            product,
            carat: object.get("carat").and_then(text_or_number),
            housing: first_string(object, &["housing"]),
            housing_type: first_string(object, &["housingType"]),
            attachment: first_string(object, &["attachment"]),
            shape: first_string(object, &["shape"]),
            size: first_string(object, &["size"]),
            colors,
            quantity: first_quantity(object),
        })
    }
}

fn parse_colors(value: &Value) -> Vec<SuggestedColor> {
    match value {
        Value::String(name) => split_color_list(name),
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(name) => {
                    non_empty(name).map(|name| SuggestedColor { name, quantity: None })
                }
                Value::Object(object) => {
                    let name = first_string(object, &["name", "color", "colour"])?;
                    Some(SuggestedColor { name, quantity: first_quantity(object) })
                }
                _ => None,
            })
            .collect(),
        Value::Object(object) => object
            .iter()
            .filter_map(|(name, qty)| {
                let name = non_empty(name)?;
                Some(SuggestedColor { name, quantity: number(qty) })
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn split_color_list(text: &str) -> Vec<SuggestedColor> {
    text.split([',', '/'])
        .filter_map(non_empty)
        .map(|name| SuggestedColor { name, quantity: None })
        .collect()
}

fn parse_options(value: &Value) -> Vec<String> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(text) => non_empty(text),
            Value::Object(object) => first_string(object, &["label", "text", "value"]),
            _ => None,
        })
        .collect()
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| object.get(*key).and_then(Value::as_str).and_then(non_empty))
}

fn first_quantity(object: &Map<String, Value>) -> Option<f64> {
    QUANTITY_KEYS.iter().find_map(|key| object.get(*key).and_then(number))
}

/// Numbers, or strings that parse as numbers. Non-finite values are dropped.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

fn text_or_number(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
