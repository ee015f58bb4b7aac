use anyhow::{anyhow, Result};
use serde_json::Value;
use tracing::warn;

/// Info string of a widget fence. The payload is a JSON object or a
/// one-line DSL (`<type> <id> ...`) and is never rewritten.
pub const WIDGET_TAG: &str = "markdown-ui-widget";

const FENCE: &str = "```";

/// A widget block found in documentation or rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetBlock {
    /// Payload between the opening tag and the closing fence, trimmed.
    pub payload: String,
}

/// What a widget payload declares about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSpec {
    pub kind: String,
    pub id: String,
}

impl WidgetBlock {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into().trim().to_string(),
        }
    }

    pub fn spec(&self) -> Result<WidgetSpec> {
        parse_payload(&self.payload)
    }
}

/// Find every widget block in raw documentation text.
///
/// Matches the opening fence lazily up to the next closing fence, so an
/// unterminated block is not a widget.
pub fn extract_blocks(text: &str) -> Vec<WidgetBlock> {
    let opener = format!("{}{}", FENCE, WIDGET_TAG);
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&opener) {
        let body = &rest[start + opener.len()..];
        match body.find(FENCE) {
            Some(end) => {
                blocks.push(WidgetBlock::new(&body[..end]));
                rest = &body[end + FENCE.len()..];
            }
            None => break,
        }
    }

    blocks
}

/// Parse a widget payload into its kind and id.
pub fn parse_payload(payload: &str) -> Result<WidgetSpec> {
    let payload = payload.trim();

    if payload.starts_with('{') || payload.starts_with('[') {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| anyhow!("Invalid JSON in widget: {}", e))?;
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("Widget JSON has no string 'id' field"))?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();

        return Ok(WidgetSpec {
            kind: kind.to_string(),
            id: id.to_string(),
        });
    }

    let mut tokens = payload.split_whitespace();
    let kind = tokens
        .next()
        .ok_or_else(|| anyhow!("Widget payload is empty"))?;
    let id = tokens
        .next()
        .map(|t| t.trim_matches(|c| c == '"' || c == '\''))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("Widget '{}' declares no id", kind))?;

    Ok(WidgetSpec {
        kind: kind.to_string(),
        id: id.to_string(),
    })
}

/// Warn about malformed widget payloads in `text`. Returns how many were
/// malformed. The text itself is left untouched.
pub fn lint(text: &str, context: &str) -> usize {
    let mut malformed = 0;
    for block in extract_blocks(text) {
        if let Err(e) = block.spec() {
            warn!("Malformed widget in {}: {} ({})", context, e, block.payload);
            malformed += 1;
        }
    }
    malformed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_widget() {
        let text = "Adds one.\n```markdown-ui-widget\n{\"type\":\"button\",\"id\":\"increment\"}\n```\nDone.";
        let blocks = extract_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].payload, "{\"type\":\"button\",\"id\":\"increment\"}");

        let spec = blocks[0].spec().unwrap();
        assert_eq!(spec.id, "increment");
        assert_eq!(spec.kind, "button");
    }

    #[test]
    fn test_extract_multiple_and_unterminated() {
        let text = "```markdown-ui-widget\nbutton increment\n``` and ```markdown-ui-widget\nform setNumber\n``` then ```markdown-ui-widget\nnever closed";
        let ids: Vec<String> = extract_blocks(text)
            .iter()
            .map(|b| b.spec().unwrap().id)
            .collect();
        assert_eq!(ids, vec!["increment", "setNumber"]);
    }

    #[test]
    fn test_other_fences_are_ignored() {
        let text = "```solidity\nfunction increment() public;\n```";
        assert!(extract_blocks(text).is_empty());
    }

    #[test]
    fn test_dsl_payload_strips_quotes() {
        let spec = parse_payload("form \"setNumber\" [newValue]").unwrap();
        assert_eq!(spec.kind, "form");
        assert_eq!(spec.id, "setNumber");
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(parse_payload("{not json").is_err());
        assert!(parse_payload("{\"type\":\"button\"}").is_err());
        assert!(parse_payload("button").is_err());
        assert!(parse_payload("   ").is_err());
    }

    #[test]
    fn test_lint_counts_without_modifying() {
        let text = "```markdown-ui-widget\n{broken\n```\n```markdown-ui-widget\nbutton increment\n```";
        assert_eq!(lint(text, "increment()"), 1);
    }
}
