use alloy::{json_abi::JsonAbi, primitives::U256};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::devdoc::render::RenderedDocument;
use crate::ethereum::{utils, ContractReader, ContractWriter, TransactionInfo, WriteCall};

/// One user interaction with a rendered widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetEvent {
    pub id: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetAction {
    Increment,
    SetNumber,
}

impl WidgetAction {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "increment" => Some(Self::Increment),
            "setNumber" => Some(Self::SetNumber),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::SetNumber => "setNumber",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid input for {widget}: {reason}")]
    InvalidInput { widget: &'static str, reason: String },
    #[error("no account available: {0}")]
    Account(String),
    #[error("{0}")]
    Simulation(String),
    #[error("{0}")]
    Submission(String),
    #[error("transaction {0} reverted")]
    Reverted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoWallet,
    NoAbi,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// No handler is attached for the widget.
    Ignored,
    /// A precondition is missing; nothing was sent.
    Skipped(SkipReason),
    Confirmed {
        transaction: TransactionInfo,
        /// Freshly read observed value, `None` if the re-read failed.
        observed: Option<Value>,
    },
    Failed(DispatchError),
}

/// Printable summary of a dispatch, one per event.
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<Value>,
}

impl DispatchOutcome {
    pub fn report(&self, id: &str) -> EventReport {
        let (status, detail, transaction, counter) = match self {
            Self::Ignored => ("ignored", None, None, None),
            Self::Skipped(SkipReason::NoWallet) => {
                ("skipped", Some("no wallet connected".to_string()), None, None)
            }
            Self::Skipped(SkipReason::NoAbi) => {
                ("skipped", Some("contract ABI not loaded".to_string()), None, None)
            }
            Self::Confirmed {
                transaction,
                observed,
            } => ("confirmed", None, Some(transaction.clone()), observed.clone()),
            Self::Failed(e) => ("failed", Some(e.to_string()), None, None),
        };

        EventReport {
            id: id.to_string(),
            status,
            detail,
            transaction,
            counter,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Submitted by `setNumber` when `newValue` is unusable. `None` rejects.
    pub set_number_fallback: Option<u64>,
    /// View function re-read after each confirmed transaction.
    pub observed_function: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            set_number_fallback: None,
            observed_function: "number".to_string(),
        }
    }
}

/// Handlers are bound from a completed [`RenderedDocument`], and only for
/// recognized widget ids.
pub struct Dispatcher {
    reader: Arc<dyn ContractReader>,
    wallet: Option<Arc<dyn ContractWriter>>,
    abi: Option<Arc<JsonAbi>>,
    settings: DispatchSettings,
    bound: HashSet<WidgetAction>,
}

impl Dispatcher {
    pub fn new(
        reader: Arc<dyn ContractReader>,
        wallet: Option<Arc<dyn ContractWriter>>,
        abi: Option<Arc<JsonAbi>>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            reader,
            wallet,
            abi,
            settings,
            bound: HashSet::new(),
        }
    }

    /// Attach handlers to the recognized widgets of a completed render.
    /// Returns the newly bound actions in document order.
    pub fn attach(&mut self, page: &RenderedDocument) -> Vec<WidgetAction> {
        let mut attached = Vec::new();

        for id in page.widget_ids() {
            match WidgetAction::from_id(&id) {
                Some(action) => {
                    if self.bound.insert(action) {
                        debug!("Attached handler to widget '{}'", id);
                        attached.push(action);
                    }
                }
                None => debug!("Widget '{}' has no contract handler", id),
            }
        }

        info!("Attached {} widget handlers", attached.len());
        attached
    }

    pub fn is_bound(&self, action: WidgetAction) -> bool {
        self.bound.contains(&action)
    }

    /// Handle one widget event. Every failure is logged and returned as an
    /// outcome; nothing is retried.
    pub async fn dispatch(&self, event: &WidgetEvent) -> DispatchOutcome {
        let Some(action) = WidgetAction::from_id(&event.id).filter(|a| self.is_bound(*a)) else {
            debug!("Ignoring event for unbound widget '{}'", event.id);
            return DispatchOutcome::Ignored;
        };

        let Some(wallet) = &self.wallet else {
            info!("No wallet connected, '{}' not dispatched", event.id);
            return DispatchOutcome::Skipped(SkipReason::NoWallet);
        };

        let Some(abi) = &self.abi else {
            info!("Contract ABI not loaded, '{}' not dispatched", event.id);
            return DispatchOutcome::Skipped(SkipReason::NoAbi);
        };

        let call = match self.build_call(action, &event.value) {
            Ok(call) => call,
            Err(e) => {
                warn!("Rejected widget input: {}", e);
                return DispatchOutcome::Failed(e);
            }
        };

        let account = match wallet.account().await {
            Ok(account) => account,
            Err(e) => {
                error!("Failed to get account: {}", e);
                return DispatchOutcome::Failed(DispatchError::Account(e.to_string()));
            }
        };

        if let Err(e) = wallet.simulate(abi, account, &call).await {
            error!("Error simulating {}: {}", call.function_name, e);
            return DispatchOutcome::Failed(DispatchError::Simulation(e.to_string()));
        }

        let transaction = match wallet.submit(abi, account, &call).await {
            Ok(transaction) => transaction,
            Err(e) => {
                error!("Error submitting {}: {}", call.function_name, e);
                return DispatchOutcome::Failed(DispatchError::Submission(e.to_string()));
            }
        };

        if !transaction.status {
            error!("Transaction {} reverted", transaction.hash);
            return DispatchOutcome::Failed(DispatchError::Reverted(transaction.hash));
        }

        info!(
            "{} confirmed in block {} ({})",
            call.function_name, transaction.block_number, transaction.hash
        );

        let observed = match self.reader.read(abi, &self.settings.observed_function).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to re-read {}: {}", self.settings.observed_function, e);
                None
            }
        };

        DispatchOutcome::Confirmed {
            transaction,
            observed,
        }
    }

    /// Read the observed value, if an ABI is loaded.
    pub async fn refresh(&self) -> Result<Option<Value>> {
        match &self.abi {
            Some(abi) => Ok(Some(
                self.reader
                    .read(abi, &self.settings.observed_function)
                    .await?,
            )),
            None => Ok(None),
        }
    }

    fn build_call(&self, action: WidgetAction, value: &Value) -> Result<WriteCall, DispatchError> {
        let args = match action {
            WidgetAction::Increment => Vec::new(),
            WidgetAction::SetNumber => vec![self.new_value(value)?],
        };

        Ok(WriteCall {
            function_name: action.id().to_string(),
            args,
        })
    }

    fn new_value(&self, value: &Value) -> Result<Value, DispatchError> {
        match parse_new_value(value) {
            Ok(parsed) => Ok(parsed),
            Err(reason) => match self.settings.set_number_fallback {
                Some(fallback) => {
                    warn!("{}, submitting configured fallback {}", reason, fallback);
                    Ok(Value::from(fallback))
                }
                None => Err(DispatchError::InvalidInput {
                    widget: WidgetAction::SetNumber.id(),
                    reason,
                }),
            },
        }
    }
}

/// Extract the integer `newValue` field of a `setNumber` submission.
fn parse_new_value(value: &Value) -> Result<Value, String> {
    let field = value
        .get("newValue")
        .ok_or_else(|| "missing field 'newValue'".to_string())?;

    let number = match field {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("'newValue' is not a non-negative integer: {}", n))?,
        Value::String(s) => {
            let parsed = utils::parse_uint(s).map_err(|e| format!("'newValue': {}", e))?;
            return Ok(if parsed <= U256::from(u64::MAX) {
                Value::from(parsed.to::<u64>())
            } else {
                Value::String(parsed.to_string())
            });
        }
        other => return Err(format!("'newValue' must be a number or string, got {}", other)),
    };

    Ok(Value::from(number))
}
