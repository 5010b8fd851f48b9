//! Recovers the JSON object from a free-form completion.
//!
//! Strategies run in order and the first one that yields a JSON *object*
//! wins: the whole trimmed text, a fenced code block, a string-aware balanced
//! brace scan from the first `{`, then the text with every fence marker
//! removed. When all of them fail the text itself becomes the message.

use serde_json::{Map, Value};

const FENCE: &str = "```";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionStrategy {
    WholeText,
    FencedBlock,
    BalancedBraces,
    FencesStripped,
    PlainText,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WholeText => "whole_text",
            Self::FencedBlock => "fenced_block",
            Self::BalancedBraces => "balanced_braces",
            Self::FencesStripped => "fences_stripped",
            Self::PlainText => "plain_text",
        }
    }
}

/// Never fails. The returned object always has a `message` key.
pub fn extract_json(raw: &str) -> Map<String, Value> {
    extract_json_with_strategy(raw).0
}

pub fn extract_json_with_strategy(raw: &str) -> (Map<String, Value>, ExtractionStrategy) {
    let trimmed = raw.trim();

    let parsed = parse_object(trimmed)
        .map(|object| (object, ExtractionStrategy::WholeText))
        .or_else(|| {
            fenced_block(trimmed)
                .and_then(parse_object)
                .map(|object| (object, ExtractionStrategy::FencedBlock))
        })
        .or_else(|| {
            balanced_object(trimmed)
                .and_then(parse_object)
                .map(|object| (object, ExtractionStrategy::BalancedBraces))
        })
        .or_else(|| {
            parse_object(trimmed.replace(FENCE, "").trim())
                .map(|object| (object, ExtractionStrategy::FencesStripped))
        });

    if let Some((mut object, strategy)) = parsed {
        object.entry("message").or_insert_with(|| Value::String(String::new()));
        object.entry("quote").or_insert(Value::Null);
        return (object, strategy);
    }

    let mut fallback = Map::new();
    fallback.insert("message".to_string(), Value::String(trim_json_debris(trimmed)));
    fallback.insert("quote".to_string(), Value::Null);
    (fallback, ExtractionStrategy::PlainText)
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Contents of the first fenced block, with or without a language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_fence = &text[open + FENCE.len()..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let tag = after_fence[..body_start].trim();
    // A tag is a single word; anything else is the block body on the fence line.
    let body_start = if tag.chars().all(|c| c.is_ascii_alphanumeric()) { body_start } else { 0 };
    let body = &after_fence[body_start..];
    let close = body.find(FENCE)?;
    Some(body[..close].trim())
}

/// The first `{...}` run with braces balanced outside of string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Drops a trailing fenced block or trailing `{...}` run from a plain-text reply.
fn trim_json_debris(text: &str) -> String {
    if let Some(open) = text.find(FENCE) {
        let head = text[..open].trim_end();
        if !head.is_empty() {
            return head.to_string();
        }
    }

    if text.ends_with('}') {
        if let Some(open) = text.find('{') {
            let head = text[..open].trim_end();
            if !head.is_empty() {
                return head.to_string();
            }
        }
    }

    text.to_string()
}

/// Plain-text rendering for chat bubbles.
pub fn strip_markdown(text: &str) -> String {
    text.lines().map(strip_markdown_line).collect::<Vec<_>>().join("\n").trim().to_string()
}

fn strip_markdown_line(line: &str) -> String {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, rest) = line.split_at(indent_len);

    let rest = {
        let without_hashes = rest.trim_start_matches('#');
        if without_hashes.len() != rest.len() && without_hashes.starts_with(' ') {
            without_hashes.trim_start()
        } else {
            rest
        }
    };

    let (bullet, rest) = match rest.strip_prefix("- ").or_else(|| rest.strip_prefix("* ")) {
        Some(item) => ("• ", item),
        None => ("", rest),
    };

    let cleaned: String = rest.chars().filter(|c| !matches!(c, '*' | '`')).collect();
    let cleaned = strip_underscore_emphasis(&cleaned);

    format!("{indent}{bullet}{cleaned}")
}

/// Removes `_` used as emphasis markers while keeping it inside words like `snake_case`.
fn strip_underscore_emphasis(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|(i, c)| {
            if **c != '_' {
                return true;
            }
            let before = i
                .checked_sub(1)
                .and_then(|j| chars.get(j))
                .is_some_and(|c| c.is_alphanumeric());
            let after = chars.get(i + 1).is_some_and(|c| c.is_alphanumeric());
            before && after
        })
        .map(|(_, c)| *c)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_json, extract_json_with_strategy, strip_markdown, ExtractionStrategy};

    #[test]
    fn parses_a_bare_object() {
        let (value, strategy) = extract_json_with_strategy(r#"{"message":"hi","quote":null}"#);
        assert_eq!(serde_json::Value::Object(value), json!({"message": "hi", "quote": null}));
        assert_eq!(strategy, ExtractionStrategy::WholeText);
    }

    #[test]
    fn parses_a_fenced_block_with_or_without_tag() {
        let tagged = "Here you go:\n```json\n{\"message\":\"hi\"}\n```";
        let (value, strategy) = extract_json_with_strategy(tagged);
        assert_eq!(serde_json::Value::Object(value), json!({"message": "hi", "quote": null}));
        assert_eq!(strategy, ExtractionStrategy::FencedBlock);

        let untagged = "Sure!\n```\n{\"message\":\"hi\"}\n```\nAnything else?";
        assert_eq!(
            serde_json::Value::Object(extract_json(untagged)),
            json!({"message": "hi", "quote": null})
        );
    }

    #[test]
    fn balanced_scan_ignores_braces_inside_strings() {
        let raw = r#"Sure thing. {"message":"use } and { freely","quote":null} Let me know!"#;
        let (value, strategy) = extract_json_with_strategy(raw);
        assert_eq!(value.get("message"), Some(&json!("use } and { freely")));
        assert_eq!(strategy, ExtractionStrategy::BalancedBraces);
    }

    #[test]
    fn escaped_quotes_do_not_end_the_string() {
        let raw = r#"prefix {"message":"say \"}\" now","quote":null} suffix"#;
        assert_eq!(extract_json(raw).get("message"), Some(&json!("say \"}\" now")));
    }

    #[test]
    fn stray_fences_are_stripped_as_a_last_resort() {
        let raw = "```json {\"message\":\"inline\"}```";
        let (value, strategy) = extract_json_with_strategy(raw);
        assert_eq!(value.get("message"), Some(&json!("inline")));
        assert!(matches!(
            strategy,
            ExtractionStrategy::FencedBlock
                | ExtractionStrategy::BalancedBraces
                | ExtractionStrategy::FencesStripped
        ));
    }

    #[test]
    fn arrays_and_scalars_do_not_count_as_success() {
        let value = extract_json("[1, 2, 3]");
        assert_eq!(value.get("message"), Some(&json!("[1, 2, 3]")));
        assert_eq!(value.get("quote"), Some(&json!(null)));
    }

    #[test]
    fn plain_text_becomes_the_message() {
        let (value, strategy) = extract_json_with_strategy("no json here at all");
        assert_eq!(
            serde_json::Value::Object(value),
            json!({"message": "no json here at all", "quote": null})
        );
        assert_eq!(strategy, ExtractionStrategy::PlainText);
    }

    #[test]
    fn trailing_json_debris_is_trimmed_from_the_message() {
        let broken_fence = "Here is your order.\n```json\n{\"message\": oops}\n```";
        assert_eq!(extract_json(broken_fence).get("message"), Some(&json!("Here is your order.")));

        let broken_object = "Here is your order. {\"message\": oops}";
        assert_eq!(extract_json(broken_object).get("message"), Some(&json!("Here is your order.")));
    }

    #[test]
    fn objects_without_message_get_an_empty_one() {
        let value = extract_json(r#"{"quote":null}"#);
        assert_eq!(value.get("message"), Some(&json!("")));
    }

    #[test]
    fn objects_without_quote_get_a_null_one() {
        let (value, strategy) = extract_json_with_strategy(r#"{"message":"hi"}"#);
        assert_eq!(serde_json::Value::Object(value), json!({"message": "hi", "quote": null}));
        assert_eq!(strategy, ExtractionStrategy::WholeText);

        let kept = extract_json(r#"{"message":"hi","quote":{"items":[]}}"#);
        assert_eq!(kept.get("quote"), Some(&json!({"items": []})));
    }

    #[test]
    fn strip_markdown_removes_emphasis_and_headings() {
        let text =
            "## Your order\n**CUTY** in _Black_ and `Red`\n- 3 pcs\n* 2 pcs\nsnake_case stays";
        assert_eq!(
            strip_markdown(text),
            "Your order\nCUTY in Black and Red\n• 3 pcs\n• 2 pcs\nsnake_case stays"
        );
    }

    #[test]
    fn strip_markdown_keeps_hash_without_space() {
        assert_eq!(strip_markdown("#1 bestseller"), "#1 bestseller");
    }
}
