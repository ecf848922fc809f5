use color_eyre::eyre::{
    Result,
    eyre,
};
use fuels::prelude::ContractId;
use kiosk_client::{
    client,
    deployment,
    errors,
    wallets,
};
use std::str::FromStr;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: kiosk-client (--atm | --game) (--devnet | --testnet | --local) [--rpc-url <url>]\n\
         [--wallet <name>] [--wallet-dir <path>] [--contract <id>]\n\
         \n\
         Flags:\n\
           --atm               Operate the on-chain ATM\n\
           --game              Operate the guessing game\n\
           --devnet            Connect to Fuel devnet (default RPC {})\n\
           --testnet           Connect to Fuel testnet (default RPC {})\n\
           --local             Connect to a local Fuel node (default RPC {})\n\
           --rpc-url <url>     Override the RPC URL for the selected network\n\
           --wallet <name>     forc-wallet profile to use (defaults to the first one found)\n\
           --wallet-dir <path> Override forc-wallet directory (defaults to ~/.fuel/wallets)\n\
           --contract <id>     Bind this contract id instead of the recorded deployment",
        client::DEFAULT_DEVNET_RPC_URL,
        client::DEFAULT_TESTNET_RPC_URL,
        client::DEFAULT_LOCAL_RPC_URL,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<client::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Devnet,
        Testnet,
        Local,
    }

    let mut args = std::env::args().skip(1);
    let mut app: Option<client::AppKind> = None;
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut contract: Option<ContractId> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--atm" => {
                if app.is_some() {
                    return Err(eyre!("Choose exactly one of --atm/--game"));
                }
                app = Some(client::AppKind::Atm);
            }
            "--game" => {
                if app.is_some() {
                    return Err(eyre!("Choose exactly one of --atm/--game"));
                }
                app = Some(client::AppKind::Game);
            }
            "--devnet" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(NetworkFlag::Devnet);
            }
            "--testnet" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(NetworkFlag::Testnet);
            }
            "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(NetworkFlag::Local);
            }
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                if network_flag.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--devnet/--testnet/--local)"
                    ));
                }
                custom_url = Some(url);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--contract" => {
                let id = args
                    .next()
                    .ok_or_else(|| eyre!("--contract requires a contract id"))?;
                if contract.is_some() {
                    return Err(eyre!("--contract may only be specified once"));
                }
                let parsed = ContractId::from_str(id.trim_start_matches("fuel"))
                    .map_err(|e| eyre!("'{id}' is not a valid contract id: {e:?}"))?;
                contract = Some(parsed);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let app = app.ok_or_else(|| eyre!("Select an application with --atm or --game"))?;
    let network = match network_flag {
        None => {
            return Err(eyre!(
                "Select a network with --devnet, --testnet, or --local"
            ));
        }
        Some(NetworkFlag::Devnet) => client::NetworkTarget::Devnet {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_DEVNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Testnet) => client::NetworkTarget::Testnet {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_TESTNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Local) => client::NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    let dir = wallets::resolve_wallet_dir(wallet_dir.as_deref())?;
    let wallets = client::WalletConfig::ForcKeystore {
        owner: wallet_name,
        dir,
    };

    Ok(client::AppConfig {
        app,
        network,
        wallets,
        contract,
    })
}

// The TUI owns the terminal, so diagnostics go to a rolling log file.
fn init_tracing() -> WorkerGuard {
    let file_appender = rolling::daily("logs", "kiosk-client.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _guard = init_tracing();
    deployment::ensure_structure()?;
    let app_config = parse_cli_args()?;
    if let Err(err) = client::run_app(app_config).await {
        let failure = errors::classify(&err);
        tracing::error!(kind = ?failure.kind, message = %failure.message, "exiting on failure");
        eprintln!("{}", failure.display_text());
        std::process::exit(1);
    }
    Ok(())
}
