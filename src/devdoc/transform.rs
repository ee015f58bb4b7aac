use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, warn};

use super::{widget, ContractRecord};

/// Heading rendered in place of an empty document.
pub const EMPTY_PLACEHOLDER: &str = "# No markdown widgets found";

#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// `chrono` strftime pattern for the verification date.
    pub date_format: String,
    /// Zone the verification date is shown in. `None` is the local zone.
    pub offset: Option<FixedOffset>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            date_format: "%-m/%-d/%Y".to_string(),
            offset: None,
        }
    }
}

/// Convert a contract record to markdown.
///
/// Every field is optional. A record with no header fields and no methods
/// yields an empty string; see [`EMPTY_PLACEHOLDER`]. Widget blocks inside
/// method and param text are copied through unchanged.
pub fn transform(record: &ContractRecord, options: &MarkdownOptions) -> String {
    let devdoc = &record.devdoc;
    let mut markdown = String::new();

    if let Some(title) = present(&devdoc.title) {
        markdown.push_str(&format!("# {}\n\n", title));
    }

    if let Some(details) = present(&devdoc.details) {
        markdown.push_str(&format!("{}\n\n", details));
    }

    if let (Some(address), Some(chain_id)) = (present(&record.address), present(&record.chain_id)) {
        markdown.push_str(&format!(
            "**Contract:** `{}` on Chain ID `{}`\n\n",
            address, chain_id
        ));
    }

    if let Some(verified_at) = present(&record.verified_at) {
        markdown.push_str(&format!(
            "**Verified:** {}\n\n",
            format_date(verified_at, options)
        ));
    }

    for (name, method) in &devdoc.methods {
        markdown.push_str(&format!("## {}\n\n", name));

        if let Some(details) = present(&method.details) {
            let (details, _) = doc_text(details, name);
            markdown.push_str(&format!("{}\n\n", details));
        }

        if let Some(params) = &method.params {
            for (param, description) in params {
                let (description, _) =
                    doc_text(description, &format!("{} param {}", name, param));
                markdown.push_str(&format!("**{}:** {}\n\n", param, description));
            }
        }
    }

    debug!(
        "Transformed devdoc with {} methods into {} bytes of markdown",
        devdoc.methods.len(),
        markdown.len()
    );
    markdown
}

/// Unescape devdoc text and lint the widgets it contains. Returns the text
/// and the number of malformed widgets.
fn doc_text(raw: &str, context: &str) -> (String, usize) {
    let text = unescape_newlines(raw);
    let malformed = widget::lint(&text, context);
    (text, malformed)
}

/// Replace literal two-character `\n` sequences with line breaks.
pub fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

fn format_date(timestamp: &str, options: &MarkdownOptions) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => match options.offset {
            Some(offset) => parsed
                .with_timezone(&offset)
                .format(&options.date_format)
                .to_string(),
            None => parsed
                .with_timezone(&Local)
                .format(&options.date_format)
                .to_string(),
        },
        Err(e) => {
            warn!("Unparseable verification timestamp '{}': {}", timestamp, e);
            timestamp.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devdoc::{DevDoc, MethodDoc};
    use indexmap::IndexMap;

    fn to_markdown(record: &ContractRecord) -> String {
        transform(record, &MarkdownOptions::default())
    }

    fn utc() -> MarkdownOptions {
        MarkdownOptions {
            offset: FixedOffset::east_opt(0),
            ..MarkdownOptions::default()
        }
    }

    fn method(details: Option<&str>, params: &[(&str, &str)]) -> MethodDoc {
        MethodDoc {
            details: details.map(str::to_string),
            params: if params.is_empty() {
                None
            } else {
                Some(
                    params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                )
            },
        }
    }

    fn record_with(methods: Vec<(&str, MethodDoc)>) -> ContractRecord {
        ContractRecord {
            devdoc: DevDoc {
                methods: methods
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect::<IndexMap<_, _>>(),
                ..DevDoc::default()
            },
            ..ContractRecord::default()
        }
    }

    #[test]
    fn test_empty_record_is_empty_string() {
        assert_eq!(to_markdown(&ContractRecord::default()), "");
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let mut record = ContractRecord::default();
        record.devdoc.title = Some(String::new());
        record.address = Some(String::new());
        record.chain_id = Some("1".to_string());
        assert_eq!(to_markdown(&record), "");
    }

    #[test]
    fn test_method_details_unescape_newlines() {
        let record = record_with(vec![("foo", method(Some("line1\\nline2"), &[]))]);
        let markdown = to_markdown(&record);

        assert!(markdown.contains("## foo"));
        let lines: Vec<&str> = markdown.lines().collect();
        let line1 = lines.iter().position(|l| *l == "line1").unwrap();
        assert_eq!(lines[line1 + 1], "line2");
        assert!(lines.iter().position(|l| *l == "## foo").unwrap() < line1);
    }

    #[test]
    fn test_params_render_bold_names() {
        let record = record_with(vec![("setNumber(uint256)", method(None, &[("x", "desc")]))]);
        let markdown = to_markdown(&record);
        assert!(markdown.lines().any(|l| l.starts_with("**x:**") && l.ends_with("desc")));
    }

    #[test]
    fn test_param_descriptions_unescape_newlines() {
        let record = record_with(vec![("f", method(None, &[("x", "a\\nb")]))]);
        assert_eq!(to_markdown(&record), "## f\n\n**x:** a\nb\n\n");
    }

    #[test]
    fn test_widget_blocks_pass_through_verbatim() {
        let widget = "```markdown-ui-widget\n{ \"type\": \"button\",   \"id\": \"increment\" }\n```";
        let broken = "```markdown-ui-widget\n{oops\n```";
        let record = record_with(vec![(
            "increment()",
            method(Some(widget), &[("v", broken)]),
        )]);
        let markdown = to_markdown(&record);
        assert!(markdown.contains(widget));
        assert!(markdown.contains(broken));
    }

    #[test]
    fn test_escaped_widget_is_not_malformed() {
        let raw = "Adds one\\n```markdown-ui-widget\\n{\"type\":\"button\",\"id\":\"increment\"}\\n```";
        let (text, malformed) = doc_text(raw, "increment()");
        assert_eq!(malformed, 0);
        assert_eq!(
            text,
            "Adds one\n```markdown-ui-widget\n{\"type\":\"button\",\"id\":\"increment\"}\n```"
        );

        let (_, malformed) = doc_text("```markdown-ui-widget\\nbutton\\n```", "f");
        assert_eq!(malformed, 1);
    }

    #[test]
    fn test_identification_line_requires_both_fields() {
        let mut record = ContractRecord::default();
        record.address = Some("0xABC".to_string());
        record.chain_id = Some("1".to_string());
        let markdown = to_markdown(&record);
        assert!(markdown
            .lines()
            .any(|l| l.contains("0xABC") && l.contains('1') && l.starts_with("**Contract:**")));

        record.chain_id = None;
        assert!(!to_markdown(&record).contains("0xABC"));

        record.chain_id = Some("1".to_string());
        record.address = None;
        assert!(!to_markdown(&record).contains("**Contract:**"));
    }

    #[test]
    fn test_full_document_layout() {
        let mut record = record_with(vec![
            ("increment()", method(Some("Adds one"), &[])),
            ("setNumber(uint256)", method(None, &[("newNumber", "New value")])),
        ]);
        record.devdoc.title = Some("Counter".to_string());
        record.devdoc.details = Some("A simple counter".to_string());
        record.address = Some("0xABC".to_string());
        record.chain_id = Some("1".to_string());
        record.verified_at = Some("2024-03-05T10:00:00Z".to_string());

        let expected = "# Counter\n\n\
A simple counter\n\n\
**Contract:** `0xABC` on Chain ID `1`\n\n\
**Verified:** 3/5/2024\n\n\
## increment()\n\n\
Adds one\n\n\
## setNumber(uint256)\n\n\
**newNumber:** New value\n\n";
        assert_eq!(transform(&record, &utc()), expected);
    }

    #[test]
    fn test_methods_keep_document_order() {
        let record = record_with(vec![
            ("zeta()", MethodDoc::default()),
            ("alpha()", MethodDoc::default()),
        ]);
        let markdown = to_markdown(&record);
        assert!(markdown.find("## zeta()").unwrap() < markdown.find("## alpha()").unwrap());
        assert!(markdown.contains("## zeta()\n\n## alpha()"));
    }

    #[test]
    fn test_unparseable_timestamp_is_kept() {
        let mut record = ContractRecord::default();
        record.verified_at = Some("yesterday".to_string());
        assert_eq!(to_markdown(&record), "**Verified:** yesterday\n\n");
    }

    #[test]
    fn test_date_respects_offset() {
        let mut record = ContractRecord::default();
        record.verified_at = Some("2024-03-05T23:30:00Z".to_string());
        let options = MarkdownOptions {
            offset: FixedOffset::east_opt(2 * 3600),
            ..MarkdownOptions::default()
        };
        assert_eq!(transform(&record, &options), "**Verified:** 3/6/2024\n\n");
    }
}
