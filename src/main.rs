mod config;
mod devdoc;
mod dispatch;
mod ethereum;
mod server;
mod session;
mod sourcify;

use alloy::{network::EthereumWallet, providers::ProviderBuilder};
use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use config::Config;
use devdoc::transform::MarkdownOptions;
use dispatch::{DispatchSettings, Dispatcher, WidgetEvent};
use ethereum::{
    contract::{ChainClient, RpcCounterSource},
    provider::{load_signer, ProviderManager},
    utils, ContractWriter,
};
use server::ProxyState;
use sourcify::SourcifyClient;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries markdown, HTML and event reports
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = Command::new("devdoc-ui")
        .version("0.1.0")
        .about("Render verified contract devdoc as markdown and dispatch its widgets")
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
                .help("Network used for reads and transactions (sepolia, anvil, ethereum)"),
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
            Command::new("render")
                .about("Fetch the contract devdoc and print it as markdown")
                .arg(contract_address_arg())
                .arg(chain_id_arg())
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help("Print rendered HTML instead of markdown")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("session")
                .about("Load the page, then dispatch widget events read as JSON lines from stdin")
                .arg(contract_address_arg())
                .arg(chain_id_arg()),
        )
        .subcommand(
            Command::new("dispatch")
                .about("Load the page and dispatch a single widget event")
                .arg(contract_address_arg())
                .arg(chain_id_arg())
                .arg(
                    Arg::new("widget")
                        .short('w')
                        .long("widget")
                        .value_name("ID")
                        .required(true)
                        .help("Widget identifier (increment, setNumber)"),
                )
                .arg(
                    Arg::new("value")
                        .long("value")
                        .value_name("JSON")
                        .help("Widget value, e.g. '{\"newValue\":\"7\"}'"),
                ),
        )
        .subcommand(
            Command::new("serve").about("Run the backend proxy server").arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("ADDR")
                    .help("Address to listen on"),
            ),
        )
        .get_matches();

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

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;

    if let Some(network) = matches.get_one::<String>("network") {
        config.default_network = network.clone();
    }

    if let Some(rpc_url) = matches.get_one::<String>("rpc-url") {
        if let Some(network_config) = config.networks.get_mut(&config.default_network) {
            network_config.rpc_url = rpc_url.clone();
        }
    }

    info!("Default network: {}", config.default_network);

    let result = match matches.subcommand() {
        Some(("render", sub)) => run_render(config, sub).await,
        Some(("session", sub)) => run_session(config, sub).await,
        Some(("dispatch", sub)) => run_dispatch(config, sub).await,
        Some(("serve", sub)) => run_serve(config, sub).await,
        _ => Err(anyhow!(
            "No command given. Use one of: render, session, dispatch, serve"
        )),
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

fn contract_address_arg() -> Arg {
    Arg::new("address")
        .short('a')
        .long("address")
        .value_name("ADDRESS")
        .help("Contract address (defaults to the configured contract)")
}

fn chain_id_arg() -> Arg {
    Arg::new("chain-id")
        .long("chain-id")
        .value_name("CHAIN_ID")
        .help("Chain id the contract was verified on")
}

fn apply_contract_overrides(config: &mut Config, sub: &ArgMatches) {
    if let Some(address) = sub.get_one::<String>("address") {
        config.contract.address = address.clone();
    }
    if let Some(chain_id) = sub.get_one::<String>("chain-id") {
        config.contract.chain_id = chain_id.clone();
    }
}

fn markdown_options(config: &Config) -> MarkdownOptions {
    MarkdownOptions {
        date_format: config.widgets.date_format.clone(),
        offset: None,
    }
}

async fn run_render(mut config: Config, sub: &ArgMatches) -> Result<()> {
    apply_contract_overrides(&mut config, sub);

    let sourcify = SourcifyClient::new(&config.verification);
    let page = session::load_page(&sourcify, &config.contract, &markdown_options(&config)).await?;

    if sub.get_flag("html") {
        println!("{}", page.rendered.html);
    } else {
        println!("{}", page.rendered.markdown);
    }
    Ok(())
}

/// Builds the shared clients once and binds the dispatcher to a loaded page.
async fn prepare_dispatcher(config: &Config) -> Result<Dispatcher> {
    let sourcify = SourcifyClient::new(&config.verification);
    let page = session::load_page(&sourcify, &config.contract, &markdown_options(config)).await?;

    let contract = utils::validate_address(&config.contract.address)
        .map_err(|e| anyhow!("Invalid contract address: {}", e))?;

    let providers = ProviderManager::new(config.clone())?;
    let network_name = config.contract_network()?;
    let network = providers.get_network_config(Some(network_name))?;
    let reader = Arc::new(ChainClient::new(
        providers.get_provider(Some(network_name))?.clone(),
        contract,
    ));
    info!("Contract calls go to network {}", network_name);

    let wallet: Option<Arc<dyn ContractWriter>> = match load_signer(config)? {
        Some(signer) => {
            let account = signer.address();
            let url = network
                .rpc_url
                .parse()
                .map_err(|e| anyhow!("Invalid RPC URL '{}': {}", network.rpc_url, e))?;
            let provider = ProviderBuilder::new()
                .with_recommended_fillers()
                .wallet(EthereumWallet::from(signer))
                .on_http(url);
            let client = ChainClient::new(provider, contract)
                .with_account(account)
                .with_explorer(network.explorer_url.clone());
            Some(Arc::new(client) as Arc<dyn ContractWriter>)
        }
        None => None,
    };

    if page.record.abi.is_none() {
        warn!("Verification record has no ABI, widget transactions are disabled");
    }

    let mut dispatcher = Dispatcher::new(
        reader,
        wallet,
        page.record.abi.clone().map(Arc::new),
        DispatchSettings {
            set_number_fallback: config.widgets.set_number_fallback,
            observed_function: config.contract.observed_function.clone(),
        },
    );
    dispatcher.attach(&page.rendered);

    match dispatcher.refresh().await {
        Ok(Some(value)) => info!("{}: {}", config.contract.observed_function, value),
        Ok(None) => {}
        Err(e) => warn!("Failed to read {}: {}", config.contract.observed_function, e),
    }

    Ok(dispatcher)
}

async fn run_session(mut config: Config, sub: &ArgMatches) -> Result<()> {
    apply_contract_overrides(&mut config, sub);
    let dispatcher = prepare_dispatcher(&config).await?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    session::run_events(&dispatcher, stdin, &mut stdout).await?;
    Ok(())
}

async fn run_dispatch(mut config: Config, sub: &ArgMatches) -> Result<()> {
    apply_contract_overrides(&mut config, sub);

    let id = sub
        .get_one::<String>("widget")
        .cloned()
        .ok_or_else(|| anyhow!("--widget is required"))?;
    let value = match sub.get_one::<String>("value") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| anyhow!("--value is not valid JSON: {}", e))?,
        None => serde_json::Value::Null,
    };

    let dispatcher = prepare_dispatcher(&config).await?;
    let event = WidgetEvent { id, value };
    let outcome = dispatcher.dispatch(&event).await;

    let mut stdout = tokio::io::stdout();
    session::write_report(&mut stdout, &outcome.report(&event.id)).await
}

async fn run_serve(mut config: Config, sub: &ArgMatches) -> Result<()> {
    if let Some(bind) = sub.get_one::<String>("bind") {
        config.server.bind_address = bind.clone();
    }

    let addr = config
        .server
        .bind_address
        .parse()
        .map_err(|e| anyhow!("Invalid bind address '{}': {}", config.server.bind_address, e))?;

    let providers = ProviderManager::new(config.clone())?;
    if let Err(e) = providers.validate_network_connection(None).await {
        warn!("{}", e);
    }

    let counter = RpcCounterSource::new(providers.get_provider(None)?.clone());
    server::serve(addr, ProxyState::new(Arc::new(counter))).await
}
