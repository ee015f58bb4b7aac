use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: HashMap<String, NetworkConfig>,
    pub default_network: String,
    pub contract: ContractConfig,
    pub verification: VerificationConfig,
    pub wallet: WalletConfig,
    pub widgets: WidgetConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_url: Option<String>,
}

/// The contract whose devdoc is rendered and whose widgets are dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    pub address: String,
    pub chain_id: String,
    /// View function re-read after every confirmed transaction.
    pub observed_function: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub base_url: String,
    pub include_abi: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the signer's private key.
    pub private_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Value submitted by `setNumber` when `newValue` is missing or not an
    /// integer. Unset means such input is rejected.
    pub set_number_fallback: Option<u64>,
    pub date_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = HashMap::new();

        networks.insert(
            "ethereum".to_string(),
            NetworkConfig {
                rpc_url: "https://eth-mainnet.g.alchemy.com/v2/demo".to_string(),
                chain_id: 1,
                explorer_url: Some("https://etherscan.io".to_string()),
            },
        );

        networks.insert(
            "sepolia".to_string(),
            NetworkConfig {
                rpc_url: "https://eth-sepolia.g.alchemy.com/v2/demo".to_string(),
                chain_id: 11155111,
                explorer_url: Some("https://sepolia.etherscan.io".to_string()),
            },
        );

        networks.insert(
            "anvil".to_string(),
            NetworkConfig {
                rpc_url: "http://127.0.0.1:8545".to_string(),
                chain_id: 31337,
                explorer_url: None,
            },
        );

        Self {
            networks,
            default_network: "sepolia".to_string(),
            contract: ContractConfig {
                address: "0xF7eb390231F0Db11C673390f3C25e613D7228659".to_string(),
                chain_id: "11155111".to_string(),
                observed_function: "number".to_string(),
            },
            verification: VerificationConfig {
                base_url: "https://sourcify.dev/server".to_string(),
                include_abi: true,
            },
            wallet: WalletConfig {
                private_key_env: "WALLET_PRIVATE_KEY".to_string(),
            },
            widgets: WidgetConfig {
                set_number_fallback: None,
                date_format: "%-m/%-d/%Y".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1:3000".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    #[allow(dead_code)]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    pub fn network(&self, name: Option<&str>) -> Result<&NetworkConfig> {
        let name = name.unwrap_or(&self.default_network);
        self.networks
            .get(name)
            .ok_or_else(|| anyhow!("Network '{}' not configured", name))
    }

    /// Name of the network the configured contract is deployed on.
    ///
    /// The default network is kept when its chain id matches the contract's;
    /// otherwise a network with the contract's chain id is chosen. With no
    /// match the default network is used and a warning is logged.
    pub fn contract_network(&self) -> Result<&str> {
        let chain_id = self.contract.chain_id.trim();
        let default = self.network(None)?;
        if default.chain_id.to_string() == chain_id {
            return Ok(&self.default_network);
        }

        let mut matching: Vec<&String> = self
            .networks
            .iter()
            .filter(|(_, network)| network.chain_id.to_string() == chain_id)
            .map(|(name, _)| name)
            .collect();
        matching.sort();

        match matching.first() {
            Some(name) => {
                tracing::warn!(
                    "Network '{}' is chain {} but the contract is on chain {}, using '{}'",
                    self.default_network,
                    default.chain_id,
                    chain_id,
                    name
                );
                Ok(name.as_str())
            }
            None => {
                tracing::warn!(
                    "No configured network has chain id {}, using '{}' (chain {})",
                    chain_id,
                    self.default_network,
                    default.chain_id
                );
                Ok(&self.default_network)
            }
        }
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_key) = std::env::var("ALCHEMY_API_KEY") {
            tracing::info!("Using ALCHEMY_API_KEY environment variable for RPC URLs");

            for (network_name, network_config) in &mut self.networks {
                if network_config.rpc_url.contains("alchemy.com/v2/demo") {
                    network_config.rpc_url = network_config
                        .rpc_url
                        .replace("/demo", &format!("/{}", api_key));
                    tracing::debug!("Updated {} RPC URL with API key", network_name);
                } else if network_config.rpc_url.contains("YOUR_API_KEY_HERE") {
                    network_config.rpc_url = network_config
                        .rpc_url
                        .replace("YOUR_API_KEY_HERE", &api_key);
                    tracing::debug!("Updated {} RPC URL with API key", network_name);
                }
            }
        } else {
            for (network_name, network_config) in &self.networks {
                if network_config.rpc_url.contains("/demo") {
                    tracing::warn!("Using demo RPC endpoint for {}, set ALCHEMY_API_KEY environment variable for better reliability", network_name);
                }
            }
        }

        if let Ok(base_url) = std::env::var("SOURCIFY_URL") {
            tracing::debug!("SOURCIFY_URL overrides verification service base URL");
            self.verification.base_url = base_url;
        }
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<std::path::PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("devdoc-ui").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# devdoc-ui configuration file
# Controls which contract is documented, where its devdoc comes from,
# and how widget interactions are turned into transactions.

# Network used for reads, writes and the proxy server
default_network = "sepolia"

[networks.ethereum]
rpc_url = "https://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 1
explorer_url = "https://etherscan.io"

[networks.sepolia]
rpc_url = "https://eth-sepolia.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 11155111
explorer_url = "https://sepolia.etherscan.io"

[networks.anvil]
rpc_url = "http://127.0.0.1:8545"
chain_id = 31337

# Contract whose devdoc is rendered
[contract]
address = "0xF7eb390231F0Db11C673390f3C25e613D7228659"
chain_id = "11155111"
observed_function = "number"

# Contract verification service
[verification]
base_url = "https://sourcify.dev/server"
include_abi = true

# The wallet is only connected when this variable is set
[wallet]
private_key_env = "WALLET_PRIVATE_KEY"

[widgets]
date_format = "%-m/%-d/%Y"
# Submit this value when setNumber receives no usable newValue.
# Without it, such input is rejected.
# set_number_fallback = 42

# Backend proxy
[server]
bind_address = "127.0.0.1:3000"

# Environment variables that can be used:
# ALCHEMY_API_KEY - Your Alchemy API key (replace YOUR_API_KEY_HERE above)
# SOURCIFY_URL - Override the verification service base URL
# WALLET_PRIVATE_KEY - Signer key used for widget transactions
"#;
        sample_config.to_string()
    }
}
