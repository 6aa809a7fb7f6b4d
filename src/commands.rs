use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info};

use crate::{
    config::{configured_address, Config, NetworkConfig},
    ethereum::{
        abi::{self, Artifact, Initializer, DEFAULT_INITIALIZER},
        deployer::{CloneDeployer, CloneRequest},
        provider::{ChainClient, RpcClient},
        signer::Signer,
        staking::{self, StakingInvoker},
        error::ClientError,
        transaction::{EventSink, GasParams, TransactionConfirmer, TransactionSubmitter},
        utils, TxEvent,
    },
};

#[derive(Debug, Default)]
pub struct DeployCloneArgs {
    pub factory: Option<String>,
    pub implementation: Option<String>,
    pub owner: Option<String>,
    pub token: Option<String>,
    /// Raw JSON initializer arguments; replaces owner/token when given
    pub args: Option<String>,
    pub artifact: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct StakeArgs {
    pub instance: Option<String>,
    pub amount: Option<String>,
}

/// Connected client plus the signer-bound workflows.
#[derive(Debug)]
pub struct Session {
    network: NetworkConfig,
    signer_address: alloy::primitives::Address,
    deployer: CloneDeployer,
    staking: StakingInvoker,
    config: Config,
    events: UnboundedReceiver<TxEvent>,
}

impl Session {
    pub async fn open(config: Config, network: Option<&str>, private_key: &str) -> Result<Self> {
        let network = config.network(network)?.clone();
        let client: Arc<dyn ChainClient> = Arc::new(RpcClient::connect(&network).await?);
        let signer = Arc::new(Signer::from_private_key(private_key)?);
        let signer_address = signer.address();
        info!("Signing as 0x{:x}", signer_address);

        let (sender, receiver) = mpsc::unbounded_channel();
        let events = EventSink::new(sender);
        let submitter =
            TransactionSubmitter::new(client.clone(), signer, network.chain_id, events.clone());
        let confirmer =
            TransactionConfirmer::new(client.clone(), config.confirmation.options(), events);

        let deployer = CloneDeployer::new(
            submitter.clone(),
            confirmer.clone(),
            config.deployment.address_source()?,
        );
        let staking = StakingInvoker::new(client, submitter, confirmer);

        Ok(Self {
            network,
            signer_address,
            deployer,
            staking,
            config,
            events: receiver,
        })
    }

    fn explorer(&self) -> Option<&str> {
        self.network.explorer_url.as_deref()
    }

    fn deployment_gas(&self) -> GasParams {
        let mut gas = self.network.gas();
        if let Some(limit) = self.config.deployment.gas_limit {
            gas.gas_limit = limit;
        }
        gas
    }

    pub async fn deploy_implementation(&mut self, bytecode_path: &Path) -> Result<String> {
        let bytecode = abi::load_bytecode(bytecode_path).await?;
        info!("Deploying {} bytes of creation code", bytecode.len());

        let deployed = self
            .deployer
            .deploy_implementation(bytecode, self.deployment_gas())
            .await
            .map_err(|e| report("Implementation deployment failed", e, self.explorer()))?;
        with_events(&deployed, &mut self.events)
    }

    pub async fn deploy_clone(&mut self, args: &DeployCloneArgs) -> Result<String> {
        let deployment = &self.config.deployment;
        let factory = configured_address(
            args.factory.as_deref().or(deployment.factory.as_deref()),
            "factory address",
        )?;
        let implementation = configured_address(
            args.implementation
                .as_deref()
                .or(deployment.implementation.as_deref()),
            "implementation address",
        )?;

        let initializer = match &args.artifact {
            Some(path) => Initializer::from_artifact(&Artifact::load(path).await?)?,
            None => Initializer::from_signature(
                deployment.initializer.as_deref().unwrap_or(DEFAULT_INITIALIZER),
            )?,
        };

        let init_args = match &args.args {
            Some(raw) => serde_json::from_str::<Value>(raw)
                .map_err(|e| anyhow!("Initializer arguments must be JSON: {}", e))?,
            None => {
                let owner = match args.owner.as_deref() {
                    Some(owner) => utils::validate_address(owner)?,
                    None => self.signer_address,
                };
                let token = configured_address(
                    args.token.as_deref().or(deployment.staking_token.as_deref()),
                    "staking token address",
                )?;
                abi::initialize_args(owner, token)
            }
        };

        let request = CloneRequest {
            factory,
            implementation,
            initializer,
            init_args,
            gas: self.deployment_gas(),
        };

        let instance = self
            .deployer
            .deploy_clone(&request)
            .await
            .map_err(|e| report("Clone deployment failed", e, self.explorer()))?;
        with_events(&instance, &mut self.events)
    }

    pub async fn stake(&mut self, args: &StakeArgs) -> Result<String> {
        let staking = &self.config.staking;
        let instance = configured_address(
            args.instance.as_deref().or(staking.instance.as_deref()),
            "pool instance address",
        )?;
        let amount = match args.amount.as_deref() {
            Some(amount) => utils::parse_amount(amount, staking.decimals)?,
            None => staking.amount()?,
        };

        let outcome = self
            .staking
            .stake(instance, amount, staking.gas(), staking.check_open)
            .await
            .map_err(|e| report("Stake failed", e, self.explorer()))?;
        with_events(&outcome, &mut self.events)
    }
}

/// `isOpen()` needs no signing key.
pub async fn is_open(config: &Config, network: Option<&str>, instance: &str) -> Result<String> {
    let instance = utils::validate_address(instance)?;
    let client = RpcClient::connect(config.network(network)?).await?;
    let open = staking::read_is_open(&client, instance)
        .await
        .map_err(|e| report("isOpen() failed", e, None))?;

    to_json(&serde_json::json!({
        "instance": instance,
        "isOpen": open,
    }))
}

fn report(context: &str, e: ClientError, explorer_url: Option<&str>) -> anyhow::Error {
    error!("{}: {}", context, e);
    if let (Some(hash), Some(explorer)) = (e.tx_hash(), explorer_url) {
        error!("See {}/tx/0x{:x}", explorer.trim_end_matches('/'), hash);
    }
    anyhow!("{}: {}", context, e)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| anyhow!("Failed to serialize result: {}", e))
}

#[derive(Serialize)]
struct CommandOutput<'a, T: Serialize> {
    #[serde(flatten)]
    result: &'a T,
    events: Vec<TxEvent>,
}

/// Result JSON plus the progress events emitted while producing it.
fn with_events<T: Serialize>(result: &T, events: &mut UnboundedReceiver<TxEvent>) -> Result<String> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    to_json(&CommandOutput {
        result,
        events: drained,
    })
}
