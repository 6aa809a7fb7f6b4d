use crate::ethereum::{
    deployer::AddressSource,
    transaction::{ConfirmOptions, GasParams},
    utils,
};
use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: HashMap<String, NetworkConfig>,
    pub default_network: String,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub staking: StakingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_url: Option<String>,
    pub gas: GasConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    pub gas_limit: u64,
    /// Legacy gas price in wei
    pub gas_price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    pub poll_interval_ms: u64,
    /// 0 waits forever
    pub timeout_secs: u64,
    pub confirmations: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub factory: Option<String>,
    pub implementation: Option<String>,
    pub staking_token: Option<String>,
    /// Initializer signature, e.g. "initialize(address owner, address stakingToken)"
    pub initializer: Option<String>,
    /// Event whose emitter is the new instance, e.g. "Initialized(uint64)"
    pub creation_event: Option<String>,
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    pub instance: Option<String>,
    /// Amount in whole tokens ("5", "0.5") or base units ("5000wei")
    pub amount: String,
    pub decimals: u8,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub check_open: bool,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            timeout_secs: 300,
            confirmations: 1,
        }
    }
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            instance: None,
            amount: "5".to_string(),
            decimals: 18,
            gas_limit: 1_000_000,
            gas_price: 5_000_000_000, // 5 Gwei
            check_open: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = HashMap::new();

        networks.insert(
            "bsc-testnet".to_string(),
            NetworkConfig {
                rpc_url: "https://data-seed-prebsc-1-s1.binance.org:8545/".to_string(),
                chain_id: 97,
                explorer_url: Some("https://testnet.bscscan.com".to_string()),
                gas: GasConfig {
                    gas_limit: 3_000_000,
                    gas_price: 5_000_000_000, // 5 Gwei
                },
            },
        );

        networks.insert(
            "bsc".to_string(),
            NetworkConfig {
                rpc_url: "https://bsc-dataseed.binance.org/".to_string(),
                chain_id: 56,
                explorer_url: Some("https://bscscan.com".to_string()),
                gas: GasConfig {
                    gas_limit: 3_000_000,
                    gas_price: 3_000_000_000, // 3 Gwei
                },
            },
        );

        networks.insert(
            "localhost".to_string(),
            NetworkConfig {
                rpc_url: "http://127.0.0.1:8545".to_string(),
                chain_id: 31337,
                explorer_url: None,
                gas: GasConfig {
                    gas_limit: 5_000_000,
                    gas_price: 2_000_000_000, // 2 Gwei
                },
            },
        );

        Self {
            networks,
            default_network: "bsc-testnet".to_string(),
            confirmation: ConfirmationConfig::default(),
            deployment: DeploymentConfig::default(),
            staking: StakingConfig::default(),
        }
    }
}

impl ConfirmationConfig {
    pub fn options(&self) -> ConfirmOptions {
        ConfirmOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            confirmations: self.confirmations.max(1),
        }
    }
}

impl DeploymentConfig {
    pub fn address_source(&self) -> Result<AddressSource> {
        match self.creation_event.as_deref() {
            Some(signature) if !signature.trim().is_empty() => {
                Ok(AddressSource::EventSignature(utils::event_topic(signature)?))
            }
            _ => Ok(AddressSource::FirstLog),
        }
    }
}

impl StakingConfig {
    pub fn amount(&self) -> Result<U256> {
        utils::parse_amount(&self.amount, self.decimals)
    }

    pub fn gas(&self) -> GasParams {
        GasParams {
            gas_limit: self.gas_limit,
            gas_price: self.gas_price as u128,
        }
    }
}

impl NetworkConfig {
    pub fn gas(&self) -> GasParams {
        GasParams {
            gas_limit: self.gas.gas_limit,
            gas_price: self.gas.gas_price as u128,
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

    /// Apply environment variable overrides to configuration.
    /// `RPC_URL` is applied later, once the network is final.
    fn apply_env_vars(&mut self) {
        if let Ok(network) = std::env::var("NETWORK") {
            tracing::debug!("Using NETWORK environment variable: {}", network);
            self.default_network = network;
        }

        if let Ok(factory) = std::env::var("FACTORY_ADDRESS") {
            self.deployment.factory = Some(factory);
        }

        if let Ok(implementation) = std::env::var("IMPLEMENTATION_ADDRESS") {
            self.deployment.implementation = Some(implementation);
        }
    }

    pub fn network(&self, name: Option<&str>) -> Result<&NetworkConfig> {
        let network_name = name.unwrap_or(&self.default_network);
        self.networks.get(network_name).ok_or_else(|| {
            let mut available: Vec<&String> = self.networks.keys().collect();
            available.sort();
            anyhow!(
                "Network '{}' not configured. Available networks: {}",
                network_name,
                available
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    pub fn network_mut(&mut self, name: Option<&str>) -> Result<&mut NetworkConfig> {
        let network_name = name.unwrap_or(&self.default_network).to_string();
        self.networks
            .get_mut(&network_name)
            .ok_or_else(|| anyhow!("Network '{}' not configured", network_name))
    }

    /// Signing key from the environment. Never read from the config file.
    pub fn private_key_from_env() -> Result<String> {
        std::env::var("TESTNET_PRIVATE_KEY")
            .or_else(|_| std::env::var("PRIVATE_KEY"))
            .map_err(|_| {
                anyhow!("No signing key: set TESTNET_PRIVATE_KEY (or PRIVATE_KEY) or pass --private-key")
            })
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<std::path::PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("clone-deployer").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# Clone Deployer Configuration File
# Networks, confirmation policy, deployment targets and staking defaults

# Default network to use when none is specified
default_network = "bsc-testnet"

[networks.bsc-testnet]
rpc_url = "https://data-seed-prebsc-1-s1.binance.org:8545/"
chain_id = 97
explorer_url = "https://testnet.bscscan.com"

[networks.bsc-testnet.gas]
gas_limit = 3_000_000
gas_price = 5_000_000_000  # 5 Gwei

[networks.localhost]
rpc_url = "http://127.0.0.1:8545"
chain_id = 31337

[networks.localhost.gas]
gas_limit = 5_000_000
gas_price = 2_000_000_000  # 2 Gwei

# How long to wait for transactions to be mined
[confirmation]
poll_interval_ms = 3000
timeout_secs = 300      # 0 waits forever
confirmations = 1

[deployment]
factory = "0x2c3E69CfB6b3cc8879598bd531e6622929e3014e"
implementation = "0xd20360f9cb804d34523b4EAb96602fD1D30EC9be"
staking_token = "0xF87bD72Da7fb8aDAa4E91AaFAC4100663F4b5A7D"
initializer = "initialize(address owner, address stakingToken)"
# Event emitted by the new clone; without it the first receipt log is used
creation_event = "Initialized(uint64)"

[staking]
# instance = "0x..."
amount = "5"              # whole tokens, or e.g. "5000000000000000000wei"
decimals = 18
gas_limit = 1_000_000
gas_price = 5_000_000_000 # 5 Gwei
check_open = true

# Environment variables that can be used:
# TESTNET_PRIVATE_KEY / PRIVATE_KEY - signing key (required for transactions)
# NETWORK - overrides default_network
# RPC_URL - overrides the selected network's rpc_url
# FACTORY_ADDRESS / IMPLEMENTATION_ADDRESS - override [deployment]
# A .env file in the working directory is loaded automatically.
"#;
        sample_config.to_string()
    }
}

/// Parses an optional configured address, naming the setting on failure.
pub fn configured_address(value: Option<&str>, setting: &str) -> Result<Address> {
    let value = value.ok_or_else(|| anyhow!("Missing {}: set it in the config file or pass it on the command line", setting))?;
    utils::validate_address(value).map_err(|e| anyhow!("Invalid {}: {}", setting, e))
}
