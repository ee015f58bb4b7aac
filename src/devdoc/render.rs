use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag};
use tracing::{debug, warn};

use super::transform::EMPTY_PLACEHOLDER;
use super::widget::{WidgetBlock, WIDGET_TAG};

/// Output of a completed render. Widgets listed here exist in `html`, so
/// handlers can be attached to them without waiting.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub markdown: String,
    pub html: String,
    pub widgets: Vec<WidgetBlock>,
}

impl RenderedDocument {
    /// Ids of all well-formed widgets, in document order.
    pub fn widget_ids(&self) -> Vec<String> {
        self.widgets
            .iter()
            .filter_map(|block| match block.spec() {
                Ok(spec) => {
                    debug!("Found {} widget '{}'", spec.kind, spec.id);
                    Some(spec.id)
                }
                Err(e) => {
                    warn!("Skipping widget without usable id: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Render markdown to HTML, substituting the placeholder heading for an
/// empty document.
pub fn render(markdown: &str) -> RenderedDocument {
    let markdown = if markdown.trim().is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        markdown.to_string()
    };

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let events: Vec<Event> = Parser::new_ext(&markdown, options).collect();
    let widgets = collect_widgets(&events);

    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, events.into_iter());

    debug!("Rendered document with {} widgets", widgets.len());
    RenderedDocument {
        markdown,
        html: html_output,
        widgets,
    }
}

fn collect_widgets(events: &[Event]) -> Vec<WidgetBlock> {
    let mut widgets = Vec::new();
    let mut current: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang)))
                if lang.trim() == WIDGET_TAG =>
            {
                current = Some(String::new());
            }
            Event::Text(text) => {
                if let Some(buffer) = current.as_mut() {
                    buffer.push_str(text);
                }
            }
            Event::End(Tag::CodeBlock(_)) => {
                if let Some(payload) = current.take() {
                    widgets.push(WidgetBlock::new(payload));
                }
            }
            _ => {}
        }
    }

    widgets
}
