//! zinc-cli: command-line access to the Zinc wallet engine.
//!
//! Derives addresses and keys locally, validates addresses, and queries or
//! spends through the same provider fallback chain the server uses.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use zinc_core::address::{self, AddressKind, Network};
use zinc_core::amount::format_coins;
use zinc_core::constants::{DEFAULT_BRANCH_ID, DEFAULT_FEE_RATE, parse_branch_id};
use zinc_providers::{ProviderSpec, build_sources};
use zinc_service::{AmountInput, MemoryTxStore, SendRequest, ServiceConfig, WalletService};
use zinc_wallet::KeyDerivation;

/// Zinc command-line interface for transparent Zcash addresses.
#[derive(Parser)]
#[command(name = "zinc-cli")]
#[command(version, about = "Non-custodial transparent-address wallet tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the P2PKH and TEX addresses for an account identifier.
    Address(KeyArgs),
    /// Check whether an address is well formed.
    Validate(ValidateArgs),
    /// Print the WIF private key for an account identifier.
    ExportKey(ExportKeyArgs),
    /// Query an address balance from the providers.
    Balance(BalanceArgs),
    /// Build, sign, and broadcast a payment.
    Send(SendArgs),
}

#[derive(Args)]
struct KeyArgs {
    /// Account identifier the key is derived from.
    #[arg(short, long)]
    seed: String,

    /// Network (mainnet or testnet).
    #[arg(short, long, default_value = "mainnet")]
    network: String,

    /// Server secret for hardened derivation.
    #[arg(long, env = "ZINC_KEY_SALT", hide_env_values = true)]
    key_salt: Option<String>,
}

#[derive(Args)]
struct ValidateArgs {
    /// Address to check.
    address: String,
}

#[derive(Args)]
struct ExportKeyArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// Acknowledge that the printed key spends every output sent to the address.
    #[arg(long)]
    i_understand: bool,
}

#[derive(Args)]
struct ProviderArgs {
    /// Comma-separated provider list (kind=url, kinds insight, bridge, rpc).
    #[arg(short, long, env = "ZINC_PROVIDERS")]
    providers: String,

    /// Per-call provider timeout in seconds.
    #[arg(long, default_value_t = 15)]
    timeout: u64,
}

#[derive(Args)]
struct BalanceArgs {
    /// Address to query (P2PKH, P2SH, or TEX).
    address: String,

    /// Network the address belongs to (mainnet or testnet).
    #[arg(short, long, default_value = "mainnet")]
    network: String,

    #[command(flatten)]
    providers: ProviderArgs,
}

#[derive(Args)]
struct SendArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// Recipient address.
    #[arg(short, long)]
    to: String,

    /// Amount in ZEC (e.g. 0.015). Digits past the eighth decimal are dropped.
    #[arg(short, long)]
    amount: String,

    /// Fee rate in zatoshis per estimated byte.
    #[arg(long, default_value_t = DEFAULT_FEE_RATE)]
    fee_rate: u64,

    /// Consensus branch id to sign for, in hex. Defaults to the current upgrade.
    #[arg(long, env = "ZINC_BRANCH_ID", value_parser = branch_id_arg)]
    branch_id: Option<u32>,

    #[command(flatten)]
    providers: ProviderArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Address(args) => cmd_address(args),
        Commands::Validate(args) => cmd_validate(args),
        Commands::ExportKey(args) => cmd_export_key(args),
        Commands::Balance(args) => cmd_balance(args).await,
        Commands::Send(args) => cmd_send(args).await,
    }
}

fn cmd_address(args: KeyArgs) -> Result<()> {
    let network = parse_network(&args.network)?;
    let service = offline_service(&args, network, DEFAULT_FEE_RATE)?;
    let addresses = service.generate_addresses(&args.seed);
    println!("Network:     {}", network_name(network));
    println!("Transparent: {}", addresses.transparent);
    println!("TEX:         {}", addresses.tex);
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    match address::decode(args.address.trim()) {
        Ok(addr) => {
            println!(
                "valid {} address on {}",
                kind_name(addr.kind()),
                network_name(addr.network())
            );
            Ok(())
        }
        Err(e) => bail!("invalid address: {e}"),
    }
}

fn cmd_export_key(args: ExportKeyArgs) -> Result<()> {
    if !args.i_understand {
        bail!("Refusing to print a private key without --i-understand");
    }
    let network = parse_network(&args.key.network)?;
    let service = offline_service(&args.key, network, DEFAULT_FEE_RATE)?;
    let exported = service.export_key(&args.key.seed);

    eprintln!("WARNING: anyone holding this key can spend every output sent to the address.");
    println!("Address: {}", exported.address);
    println!("WIF:     {}", exported.wif.as_str());
    Ok(())
}

async fn cmd_balance(args: BalanceArgs) -> Result<()> {
    let network = parse_network(&args.network)?;
    let config = ServiceConfig {
        network,
        ..ServiceConfig::default()
    };
    let service = online_service(config, &args.providers)?;

    let balance = service
        .balance(&args.address)
        .await
        .context("Balance query failed")?;

    println!("Address: {}", balance.address);
    println!(
        "Balance: {} ZEC ({} zatoshis)",
        format_coins(balance.balance),
        balance.balance
    );
    println!("UTXOs:   {}", balance.utxo_count);
    Ok(())
}

async fn cmd_send(args: SendArgs) -> Result<()> {
    let network = parse_network(&args.key.network)?;
    let config = ServiceConfig {
        network,
        fee_rate: args.fee_rate,
        branch_id: args.branch_id.unwrap_or(DEFAULT_BRANCH_ID),
        key_derivation: derivation(&args.key),
        ..ServiceConfig::default()
    };
    let service = online_service(config, &args.providers)?;

    let receipt = service
        .send(SendRequest {
            user: args.key.seed.clone(),
            seed: args.key.seed.clone(),
            to_address: args.to.clone(),
            amount: AmountInput::Coins(args.amount.clone()),
            memo: None,
        })
        .await
        .context("Send failed")?;

    println!("Transaction broadcast.");
    println!("  TxID:   {}", receipt.txid);
    println!("  To:     {}", args.to.trim());
    println!("  Fee:    {} ZEC", format_coins(receipt.fee));
    if let Some(change) = receipt.change {
        println!("  Change: {} ZEC", format_coins(change));
    }
    Ok(())
}

fn derivation(args: &KeyArgs) -> KeyDerivation {
    match args.key_salt.as_deref().filter(|s| !s.is_empty()) {
        Some(salt) => KeyDerivation::salted(salt.as_bytes().to_vec()),
        None => KeyDerivation::legacy(),
    }
}

/// Service without providers, for purely local key operations.
fn offline_service(args: &KeyArgs, network: Network, fee_rate: u64) -> Result<WalletService> {
    let config = ServiceConfig {
        network,
        fee_rate,
        key_derivation: derivation(args),
        ..ServiceConfig::default()
    };
    let (utxos, chain) = build_sources(&[], config.provider_timeout)?;
    Ok(WalletService::new(
        &config,
        utxos,
        chain,
        Arc::new(MemoryTxStore::new()),
    ))
}

/// Records of CLI sends are kept in memory only.
fn online_service(mut config: ServiceConfig, providers: &ProviderArgs) -> Result<WalletService> {
    if providers.timeout == 0 {
        bail!("--timeout must be at least 1 second");
    }
    config.providers = ProviderSpec::parse_list(&providers.providers)
        .context("Invalid provider list")?;
    if config.providers.is_empty() {
        warn!("no providers given");
    }
    config.provider_timeout = Duration::from_secs(providers.timeout);

    let (utxos, chain) = build_sources(&config.providers, config.provider_timeout)
        .context("Failed to construct providers")?;
    Ok(WalletService::new(
        &config,
        utxos,
        chain,
        Arc::new(MemoryTxStore::new()),
    ))
}

/// Parse network string to Network enum.
fn parse_network(s: &str) -> Result<Network> {
    match s.to_lowercase().as_str() {
        "mainnet" => Ok(Network::Mainnet),
        "testnet" => Ok(Network::Testnet),
        _ => bail!("Invalid network (must be 'mainnet' or 'testnet')"),
    }
}

fn branch_id_arg(s: &str) -> Result<u32, String> {
    parse_branch_id(s).ok_or_else(|| format!("'{s}' is not a 32-bit hex branch id"))
}

/// Human-readable network name.
fn network_name(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "Mainnet",
        Network::Testnet => "Testnet",
    }
}

fn kind_name(kind: AddressKind) -> &'static str {
    match kind {
        AddressKind::P2pkh => "P2PKH",
        AddressKind::P2sh => "P2SH",
        AddressKind::Tex => "TEX",
    }
}
