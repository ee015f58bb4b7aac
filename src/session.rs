use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::config::ContractConfig;
use crate::devdoc::{
    render::{render, RenderedDocument},
    transform::{transform, MarkdownOptions},
    ContractRecord,
};
use crate::dispatch::{Dispatcher, EventReport, WidgetEvent};
use crate::sourcify::SourcifyClient;

/// Everything produced by one page load. Never modified after loading.
#[derive(Debug, Clone)]
pub struct DocPage {
    pub record: ContractRecord,
    pub rendered: RenderedDocument,
}

impl DocPage {
    /// Transform and render a fetched record.
    pub fn from_record(record: ContractRecord, options: &MarkdownOptions) -> Self {
        let markdown = transform(&record, options);
        let rendered = render(&markdown);
        Self { record, rendered }
    }
}

/// Fetch, transform and render the configured contract's documentation.
pub async fn load_page(
    sourcify: &SourcifyClient,
    contract: &ContractConfig,
    options: &MarkdownOptions,
) -> Result<DocPage> {
    let record = sourcify
        .fetch_contract(&contract.chain_id, &contract.address)
        .await
        .map_err(|e| anyhow!("Error fetching contract data: {}", e))?;

    let page = DocPage::from_record(record, options);
    info!(
        "Loaded documentation page with {} widgets",
        page.rendered.widgets.len()
    );
    Ok(page)
}

/// Dispatch newline-delimited JSON widget events from `input`, one at a
/// time, writing one JSON report line per event to `output`.
///
/// Returns the number of events dispatched. Lines that are not events are
/// logged and skipped.
pub async fn run_events<R, W>(dispatcher: &Dispatcher, input: R, output: &mut W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut dispatched = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: WidgetEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring malformed widget event: {}", e);
                continue;
            }
        };

        let outcome = dispatcher.dispatch(&event).await;
        write_report(output, &outcome.report(&event.id)).await?;
        dispatched += 1;
    }

    info!("Event stream closed after {} events", dispatched);
    Ok(dispatched)
}

pub async fn write_report<W>(output: &mut W, report: &EventReport) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(report)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}
