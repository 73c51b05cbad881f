use crate::{
    gateway::DEFAULT_POLL_INTERVAL,
    wallets,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://soroban-testnet.stellar.org";
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const LOCAL_PASSPHRASE: &str = "Standalone Network ; February 2017";
pub const LOCAL_CONTRACT_ID: &str = "local-pixel-pet";
pub const DEFAULT_DATA_DIR: &str = "~/.pixel-pet";

pub const USAGE: &str = "Usage: pixel-pet (--testnet | --local) [--rpc-url <url>]\n\
     [--contract-id <id>] [--wallet <name>] [--wallet-dir <path>]\n\
     [--data-dir <path>] [--poll-ms <n>]\n\
     \n\
     Flags:\n\
       --testnet           Play against the public testnet contract\n\
       --local             Play against an in-process ledger with dev wallets\n\
       --rpc-url <url>     Override the testnet RPC URL\n\
       --contract-id <id>  Deployed pet contract (required with --testnet)\n\
       --wallet <name>     Connect this wallet at startup\n\
       --wallet-dir <path> Keystore directory (defaults to ~/.pixel-pet/wallets)\n\
       --data-dir <path>   Game snapshot and log directory (defaults to ~/.pixel-pet)\n\
       --poll-ms <n>       Transaction status polling interval in milliseconds";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetworkTarget {
    Testnet { url: String, contract_id: String },
    Local,
}

impl NetworkTarget {
    pub fn passphrase(&self) -> &'static str {
        match self {
            NetworkTarget::Testnet { .. } => TESTNET_PASSPHRASE,
            NetworkTarget::Local => LOCAL_PASSPHRASE,
        }
    }

    pub fn contract_id(&self) -> &str {
        match self {
            NetworkTarget::Testnet { contract_id, .. } => contract_id,
            NetworkTarget::Local => LOCAL_CONTRACT_ID,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WalletConfig {
    Keystore { dir: PathBuf },
    Dev,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub wallets: WalletConfig,
    pub startup_wallet: Option<String>,
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
}

#[derive(Debug, Eq, PartialEq)]
pub enum CliCommand {
    Run(AppConfig),
    Help,
}

pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .wrap_err_with(|| format!("Failed to expand path {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn set_once(slot: &mut Option<String>, flag: &str, value: Option<String>, what: &str) -> Result<()> {
    let value = value.ok_or_else(|| eyre!("{flag} requires {what}"))?;
    if slot.is_some() {
        return Err(eyre!("{flag} may only be specified once"));
    }
    *slot = Some(value);
    Ok(())
}

/// Parses flags, without the program name.
pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliCommand> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Testnet,
        Local,
    }

    let mut args = args.into_iter();
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut contract_id: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut data_dir: Option<String> = None;
    let mut poll_ms: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--testnet" | "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --testnet/--local"
                    ));
                }
                network_flag = Some(if arg == "--testnet" {
                    NetworkFlag::Testnet
                } else {
                    NetworkFlag::Local
                });
            }
            "--rpc-url" => {
                if network_flag.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--testnet/--local)"
                    ));
                }
                set_once(&mut custom_url, "--rpc-url", args.next(), "a URL argument")?;
            }
            "--contract-id" => {
                set_once(&mut contract_id, "--contract-id", args.next(), "a contract id")?
            }
            "--wallet-dir" => {
                set_once(&mut wallet_dir, "--wallet-dir", args.next(), "a path argument")?
            }
            "--wallet" => {
                set_once(&mut wallet_name, "--wallet", args.next(), "a wallet name")?
            }
            "--data-dir" => {
                set_once(&mut data_dir, "--data-dir", args.next(), "a path argument")?
            }
            "--poll-ms" => {
                set_once(&mut poll_ms, "--poll-ms", args.next(), "a number of milliseconds")?
            }
            "--help" | "-h" => return Ok(CliCommand::Help),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag {
        None => return Err(eyre!("Select a network with --testnet or --local")),
        Some(NetworkFlag::Testnet) => NetworkTarget::Testnet {
            url: custom_url.unwrap_or_else(|| DEFAULT_TESTNET_RPC_URL.to_string()),
            contract_id: contract_id
                .ok_or_else(|| eyre!("--testnet requires --contract-id <id>"))?,
        },
        Some(NetworkFlag::Local) => {
            if custom_url.is_some() {
                return Err(eyre!("--rpc-url cannot be used with --local"));
            }
            if contract_id.is_some() {
                return Err(eyre!("--contract-id cannot be used with --local"));
            }
            NetworkTarget::Local
        }
    };

    let wallets = match (&network, wallet_dir) {
        (NetworkTarget::Local, None) => WalletConfig::Dev,
        (_, dir) => WalletConfig::Keystore {
            dir: wallets::resolve_wallet_dir(dir.as_deref())?,
        },
    };

    let poll_interval = match poll_ms {
        Some(ms) => Duration::from_millis(
            ms.parse()
                .wrap_err_with(|| format!("--poll-ms expects a number, got {ms}"))?,
        ),
        None => DEFAULT_POLL_INTERVAL,
    };

    Ok(CliCommand::Run(AppConfig {
        network,
        wallets,
        startup_wallet: wallet_name,
        data_dir: expand_path(data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))?,
        poll_interval,
    }))
}
