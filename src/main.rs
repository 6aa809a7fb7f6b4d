mod commands;
mod config;
mod ethereum;

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use commands::{DeployCloneArgs, Session, StakeArgs};
use config::Config;
use std::path::PathBuf;
use tracing::{error, info};

fn cli() -> Command {
    Command::new("clone-deployer")
        .version("0.1.0")
        .about("Deploy factory clones of a staking pool and stake into them")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .global(true)
                .help("Network to use (bsc-testnet, bsc, localhost)"),
        )
        .arg(
            Arg::new("rpc-url")
                .short('r')
                .long("rpc-url")
                .value_name("URL")
                .global(true)
                .help("RPC endpoint URL"),
        )
        .arg(
            Arg::new("private-key")
                .long("private-key")
                .value_name("HEX")
                .global(true)
                .help("Signing key (defaults to TESTNET_PRIVATE_KEY)"),
        )
        .arg(
            Arg::new("gas-limit")
                .long("gas-limit")
                .value_name("GAS")
                .global(true)
                .value_parser(clap::value_parser!(u64))
                .help("Gas limit for the transaction"),
        )
        .arg(
            Arg::new("gas-price")
                .long("gas-price")
                .value_name("GWEI")
                .global(true)
                .value_parser(clap::value_parser!(u64))
                .help("Gas price in gwei"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .global(true)
                .value_parser(clap::value_parser!(u64))
                .help("Stop waiting for confirmation after this many seconds (0 = never)"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("deploy-implementation")
                .about("Deploy the implementation contract from creation bytecode")
                .arg(
                    Arg::new("bytecode")
                        .long("bytecode")
                        .value_name("FILE")
                        .required(true)
                        .help("Hex bytecode file or compiled artifact JSON"),
                ),
        )
        .subcommand(
            Command::new("deploy-clone")
                .about("Clone the implementation through the factory and initialize it")
                .arg(Arg::new("factory").long("factory").value_name("ADDRESS"))
                .arg(
                    Arg::new("implementation")
                        .long("implementation")
                        .value_name("ADDRESS"),
                )
                .arg(
                    Arg::new("owner")
                        .long("owner")
                        .value_name("ADDRESS")
                        .help("Pool owner (defaults to the signer)"),
                )
                .arg(
                    Arg::new("token")
                        .long("token")
                        .value_name("ADDRESS")
                        .help("Staking token address"),
                )
                .arg(
                    Arg::new("args")
                        .long("args")
                        .value_name("JSON")
                        .help("Initializer arguments as a JSON array or object"),
                )
                .arg(
                    Arg::new("artifact")
                        .long("artifact")
                        .value_name("FILE")
                        .help("Implementation artifact whose ABI provides initialize()"),
                ),
        )
        .subcommand(
            Command::new("stake")
                .about("Stake into a deployed pool instance")
                .arg(Arg::new("instance").long("instance").value_name("ADDRESS"))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .value_name("AMOUNT")
                        .help("Whole tokens (e.g. 5) or base units (e.g. 5000wei)"),
                ),
        )
        .subcommand(
            Command::new("is-open")
                .about("Read isOpen() on a pool instance")
                .arg(
                    Arg::new("instance")
                        .long("instance")
                        .value_name("ADDRESS")
                        .required(true),
                ),
        )
}

fn string_arg(matches: &ArgMatches, name: &str) -> Option<String> {
    matches.get_one::<String>(name).cloned()
}

/// Command line values take precedence over the file and environment.
/// `env_rpc_url` (from `RPC_URL`) applies to whichever network ends up selected.
fn apply_overrides(
    config: &mut Config,
    matches: &ArgMatches,
    env_rpc_url: Option<String>,
) -> Result<()> {
    if let Some(network) = matches.get_one::<String>("network") {
        config.default_network = network.clone();
    }

    let network = config.network_mut(None)?;
    if let Some(rpc_url) = matches.get_one::<String>("rpc-url").cloned().or(env_rpc_url) {
        network.rpc_url = rpc_url;
    }
    if let Some(gas_limit) = matches.get_one::<u64>("gas-limit") {
        network.gas.gas_limit = *gas_limit;
        config.staking.gas_limit = *gas_limit;
        config.deployment.gas_limit = None;
    }
    if let Some(gas_price) = matches.get_one::<u64>("gas-price") {
        let wei = u64::try_from(ethereum::utils::gwei(*gas_price))
            .map_err(|_| anyhow::anyhow!("Gas price of {} gwei is too large", gas_price))?;
        config.network_mut(None)?.gas.gas_price = wei;
        config.staking.gas_price = wei;
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.confirmation.timeout_secs = *timeout;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            error!("Failed to load .env file: {}", e);
        }
    }

    let matches = cli().get_matches();

    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .or_else(|| Config::default_config_path().ok().filter(|p| p.exists()));
    let mut config = Config::load_or_default(config_path).await;
    apply_overrides(&mut config, &matches, std::env::var("RPC_URL").ok())?;

    info!("Network: {}", config.default_network);

    let Some((name, sub)) = matches.subcommand() else {
        cli().print_help()?;
        return Ok(());
    };

    let output = if name == "is-open" {
        let instance = sub
            .get_one::<String>("instance")
            .map(String::as_str)
            .unwrap_or_default();
        commands::is_open(&config, None, instance).await?
    } else {
        let private_key = match matches.get_one::<String>("private-key") {
            Some(key) => key.clone(),
            None => Config::private_key_from_env()?,
        };
        let mut session = Session::open(config, None, &private_key).await?;

        match name {
            "deploy-implementation" => {
                let path = sub
                    .get_one::<String>("bytecode")
                    .map(PathBuf::from)
                    .unwrap_or_default();
                session.deploy_implementation(&path).await?
            }
            "deploy-clone" => {
                let args = DeployCloneArgs {
                    factory: string_arg(sub, "factory"),
                    implementation: string_arg(sub, "implementation"),
                    owner: string_arg(sub, "owner"),
                    token: string_arg(sub, "token"),
                    args: string_arg(sub, "args"),
                    artifact: string_arg(sub, "artifact").map(PathBuf::from),
                };
                session.deploy_clone(&args).await?
            }
            "stake" => {
                let args = StakeArgs {
                    instance: string_arg(sub, "instance"),
                    amount: string_arg(sub, "amount"),
                };
                session.stake(&args).await?
            }
            other => return Err(anyhow::anyhow!("Unknown command: {}", other)),
        }
    };

    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_overrides() {
        let matches = cli().get_matches_from([
            "clone-deployer",
            "--network",
            "localhost",
            "--rpc-url",
            "http://127.0.0.1:9545",
            "--gas-price",
            "7",
            "--timeout",
            "0",
            "stake",
            "--amount",
            "1",
        ]);

        let mut config = Config::default();
        apply_overrides(&mut config, &matches, None).unwrap();

        let network = config.network(None).unwrap();
        assert_eq!(config.default_network, "localhost");
        assert_eq!(network.rpc_url, "http://127.0.0.1:9545");
        assert_eq!(network.gas.gas_price, 7_000_000_000);
        assert_eq!(config.staking.gas_price, 7_000_000_000);
        assert_eq!(config.confirmation.options().timeout, None);

        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "stake");
        assert_eq!(string_arg(sub, "amount").as_deref(), Some("1"));
    }

    #[test]
    fn test_env_rpc_url_applies_to_selected_network() {
        let matches = cli().get_matches_from(["clone-deployer", "--network", "localhost", "stake"]);
        let mut config = Config::default();
        let testnet_url = config.network(Some("bsc-testnet")).unwrap().rpc_url.clone();

        apply_overrides(&mut config, &matches, Some("http://10.0.0.5:8545".to_string())).unwrap();

        assert_eq!(config.network(None).unwrap().rpc_url, "http://10.0.0.5:8545");
        assert_eq!(config.network(Some("bsc-testnet")).unwrap().rpc_url, testnet_url);
    }

    #[test]
    fn test_rpc_url_flag_beats_environment() {
        let matches = cli().get_matches_from([
            "clone-deployer",
            "--network",
            "localhost",
            "--rpc-url",
            "http://127.0.0.1:9545",
            "stake",
        ]);
        let mut config = Config::default();

        apply_overrides(&mut config, &matches, Some("http://10.0.0.5:8545".to_string())).unwrap();

        assert_eq!(config.network(None).unwrap().rpc_url, "http://127.0.0.1:9545");
    }

    #[test]
    fn test_oversized_gas_price_is_an_error() {
        let matches = cli().get_matches_from([
            "clone-deployer",
            "--network",
            "localhost",
            "--gas-price",
            "20000000000",
            "stake",
        ]);
        let mut config = Config::default();
        let before = config.network(None).unwrap().gas.gas_price;

        assert!(apply_overrides(&mut config, &matches, None).is_err());
        assert_eq!(config.network(None).unwrap().gas.gas_price, before);
    }

    #[test]
    fn test_unknown_network_is_an_error() {
        let matches = cli().get_matches_from(["clone-deployer", "--network", "nowhere", "stake"]);
        let mut config = Config::default();
        assert!(apply_overrides(&mut config, &matches, None).is_err());
    }
}
