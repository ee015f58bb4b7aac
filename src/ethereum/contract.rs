use alloy::{
    json_abi::JsonAbi,
    network::ReceiptResponse,
    primitives::{Address, Bytes, U256},
    providers::{Provider, RootProvider},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    abi::{self, Counter},
    utils, ContractReader, ContractWriter, CounterSource, TransactionInfo, WriteCall,
};

/// Client for the documented contract over a single long-lived provider.
///
/// `P` is either a plain RPC provider (reads only) or a wallet-filling
/// provider built once from the connected signer.
#[derive(Debug, Clone)]
pub struct ChainClient<P> {
    provider: P,
    contract: Address,
    account: Option<Address>,
    explorer_url: Option<String>,
}

impl<P> ChainClient<P>
where
    P: Provider<Http<Client>>,
{
    pub fn new(provider: P, contract: Address) -> Self {
        Self {
            provider,
            contract,
            account: None,
            explorer_url: None,
        }
    }

    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_explorer(mut self, explorer_url: Option<String>) -> Self {
        self.explorer_url = explorer_url;
        self
    }

    fn build_request(&self, abi: &JsonAbi, call: &WriteCall) -> Result<TransactionRequest> {
        utils::validate_function_name(&call.function_name)
            .map_err(|e| anyhow!("Invalid function name: {}", e))?;

        let function = abi::find_function(abi, &call.function_name)?;
        let calldata = abi::encode_call(function, &call.args)
            .map_err(|e| anyhow!("Failed to encode function call: {}", e))?;

        debug!(
            "Encoded {} calldata: 0x{}",
            call.function_name,
            hex::encode(&calldata)
        );

        Ok(TransactionRequest::default()
            .to(self.contract)
            .input(calldata.into()))
    }
}

#[async_trait]
impl<P> ContractReader for ChainClient<P>
where
    P: Provider<Http<Client>> + 'static,
{
    async fn read(&self, abi: &JsonAbi, function_name: &str) -> Result<Value> {
        let function = abi::find_function(abi, function_name)?;
        let calldata = abi::encode_call(function, &[])?;

        let request = TransactionRequest::default()
            .to(self.contract)
            .input(calldata.into());

        let result_bytes = self.provider.call(&request).await.map_err(|e| {
            anyhow!(
                "Failed to read {}: {}",
                function_name,
                utils::interpret_rpc_error(&e.to_string())
            )
        })?;

        abi::decode_output(function, &result_bytes)
    }
}

#[async_trait]
impl<P> ContractWriter for ChainClient<P>
where
    P: Provider<Http<Client>> + 'static,
{
    async fn account(&self) -> Result<Address> {
        self.account
            .ok_or_else(|| anyhow!("No account connected to this client"))
    }

    async fn simulate(&self, abi: &JsonAbi, from: Address, call: &WriteCall) -> Result<()> {
        let request = self.build_request(abi, call)?.from(from);

        self.provider.call(&request).await.map_err(|e| {
            anyhow!(
                "Transaction simulation failed: {}",
                utils::interpret_rpc_error(&e.to_string())
            )
        })?;

        debug!("Simulation of {} from {:?} succeeded", call.function_name, from);
        Ok(())
    }

    async fn submit(
        &self,
        abi: &JsonAbi,
        from: Address,
        call: &WriteCall,
    ) -> Result<TransactionInfo> {
        let request = self.build_request(abi, call)?.from(from);

        info!("Sending {} to contract: {:?}", call.function_name, self.contract);

        let pending_tx = self.provider.send_transaction(request).await.map_err(|e| {
            anyhow!(
                "Failed to send transaction: {}",
                utils::interpret_rpc_error(&e.to_string())
            )
        })?;

        let tx_hash = *pending_tx.tx_hash();
        info!("Transaction sent with hash: {:?}", tx_hash);
        if let Some(explorer) = &self.explorer_url {
            info!("View transaction: {}/tx/0x{:x}", explorer, tx_hash);
        }

        let receipt = pending_tx.get_receipt().await.map_err(|e| {
            anyhow!(
                "Transaction was sent but confirmation failed: {}. Transaction hash: 0x{:x}",
                e,
                tx_hash
            )
        })?;

        Ok(TransactionInfo {
            hash: format!("0x{:x}", tx_hash),
            from: format!("0x{:x}", from),
            to: format!("0x{:x}", self.contract),
            gas_used: receipt.gas_used() as u64,
            block_number: receipt.block_number.unwrap_or_default(),
            status: receipt.status(),
        })
    }
}

/// Reads the counter of arbitrary addresses with the built-in Counter ABI.
#[derive(Debug, Clone)]
pub struct RpcCounterSource {
    provider: RootProvider<Http<Client>>,
}

impl RpcCounterSource {
    pub fn new(provider: RootProvider<Http<Client>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CounterSource for RpcCounterSource {
    async fn read_counter(&self, address: &str) -> Result<U256> {
        let address = utils::validate_address(address)
            .map_err(|e| anyhow!("Invalid contract address: {}", e))?;

        let calldata = Bytes::from(Counter::numberCall {}.abi_encode());
        let request = TransactionRequest::default()
            .to(address)
            .input(calldata.into());

        let result_bytes = self.provider.call(&request).await.map_err(|e| {
            anyhow!(
                "Failed to read counter: {}",
                utils::interpret_rpc_error(&e.to_string())
            )
        })?;

        let decoded = Counter::numberCall::abi_decode_returns(&result_bytes, true)
            .map_err(|e| anyhow!("Failed to decode counter value: {}", e))?;

        Ok(decoded._0)
    }
}
