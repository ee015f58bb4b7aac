use crate::config::{Config, NetworkConfig};
use alloy::{
    providers::{Provider, ProviderBuilder, RootProvider},
    signers::local::PrivateKeySigner,
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// Read-only RPC providers, one per configured network. Built once at
/// start-up and shared for the life of the process.
#[derive(Debug)]
pub struct ProviderManager {
    providers: HashMap<String, RootProvider<Http<Client>>>,
    config: Config,
}

impl ProviderManager {
    pub fn new(config: Config) -> Result<Self> {
        let mut providers = HashMap::new();

        for (network_name, network_config) in &config.networks {
            let provider = Self::create_provider(network_config).map_err(|e| {
                anyhow!("Invalid RPC URL for network '{}': {}", network_name, e)
            })?;
            providers.insert(network_name.clone(), provider);
        }

        Ok(Self { providers, config })
    }

    fn create_provider(network_config: &NetworkConfig) -> Result<RootProvider<Http<Client>>> {
        let provider = ProviderBuilder::new().on_http(network_config.rpc_url.parse()?);

        Ok(provider)
    }

    pub fn get_provider(&self, network: Option<&str>) -> Result<&RootProvider<Http<Client>>> {
        let network_name = network.unwrap_or(&self.config.default_network);
        self.providers
            .get(network_name)
            .ok_or_else(|| anyhow!("Network '{}' not found", network_name))
    }

    pub fn get_network_config(&self, network: Option<&str>) -> Result<&NetworkConfig> {
        self.config.network(network)
    }

    /// Validates network connectivity with detailed error information
    pub async fn validate_network_connection(&self, network: Option<&str>) -> Result<()> {
        let network_name = network.unwrap_or(&self.config.default_network);
        let provider = self
            .get_provider(network)
            .map_err(|e| anyhow!("Network '{}' is not configured: {}", network_name, e))?;

        match provider.get_block_number().await {
            Ok(_) => Ok(()),
            Err(e) => Err(anyhow!(
                "Cannot connect to network '{}': {}. Please check your RPC endpoint configuration and network connectivity.",
                network_name,
                crate::ethereum::utils::interpret_rpc_error(&e.to_string())
            )),
        }
    }
}

/// Detect the wallet. Returns `None` when the configured key variable is
/// unset, which is the "no wallet connected" state.
pub fn load_signer(config: &Config) -> Result<Option<PrivateKeySigner>> {
    let Ok(private_key) = std::env::var(&config.wallet.private_key_env) else {
        tracing::info!(
            "{} not set, widget transactions are disabled",
            config.wallet.private_key_env
        );
        return Ok(None);
    };

    let private_key = private_key.trim();
    let private_key = private_key.strip_prefix("0x").unwrap_or(private_key);

    let signer = PrivateKeySigner::from_str(private_key)
        .map_err(|e| anyhow!("Invalid private key in {}: {}", config.wallet.private_key_env, e))?;

    tracing::info!("Wallet connected: {:?}", signer.address());
    Ok(Some(signer))
}
