pub mod abi;
pub mod contract;
pub mod provider;
pub mod utils;

use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, U256},
};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A state-changing call on the documented contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteCall {
    pub function_name: String,
    /// Positional arguments, encoded against the function's ABI inputs.
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub gas_used: u64,
    pub block_number: u64,
    pub status: bool,
}

/// Signing side of a connected wallet.
#[async_trait]
pub trait ContractWriter: Send + Sync {
    /// The account transactions are sent from.
    async fn account(&self) -> Result<Address>;

    /// Dry-run `call` from `from`. Errors when the call would revert.
    async fn simulate(&self, abi: &JsonAbi, from: Address, call: &WriteCall) -> Result<()>;

    /// Sign, send and wait for the receipt of `call`.
    async fn submit(&self, abi: &JsonAbi, from: Address, call: &WriteCall)
        -> Result<TransactionInfo>;
}

/// Read-only access to the documented contract.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn read(&self, abi: &JsonAbi, function_name: &str) -> Result<Value>;
}

/// Reads `number()` from any counter contract. Backs the proxy endpoint.
#[async_trait]
pub trait CounterSource: Send + Sync {
    async fn read_counter(&self, address: &str) -> Result<U256>;
}
