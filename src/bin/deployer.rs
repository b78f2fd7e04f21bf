//! # bb-deployer CLI
//!
//! Deploys the ByteBeasts reward contracts and wires up their permissions.
//!
//! ```bash
//! # Deploy everything to the configured network
//! bb-deployer --network sepolia deploy
//!
//! # Wire up permissions against the persisted manifest
//! bb-deployer --network sepolia init
//!
//! # Inspect what is deployed where
//! bb-deployer --network sepolia show
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use starknet::core::types::FieldElement;
use std::path::PathBuf;

use bb_deployer::config::{DeployerConfig, DeployerCredentials};
use bb_deployer::context::RuntimeContext;
use bb_deployer::manifest::ManifestStore;
use bb_deployer::pipeline::{
    reward_deploy_pipeline, reward_init_pipeline, run_pipeline, DEFAULT_BASE_URL,
};
use bb_deployer::types::Network;

#[derive(Parser)]
#[command(name = "bb-deployer")]
#[command(about = "Deploy the ByteBeasts reward contracts and wire up permissions")]
#[command(version)]
struct Cli {
    /// Target network: devnet, sepolia or mainnet (falls back to $NETWORK)
    #[arg(short, long)]
    network: Option<String>,

    /// Override the RPC endpoint from the environment profile
    #[arg(long)]
    rpc_url: Option<String>,

    /// Fee safety multiplier in percent (200 = double the estimate)
    #[arg(long)]
    fee_multiplier: Option<u64>,

    /// Scarb build output directory with the compiled classes
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Scarb package name (artifact file prefix)
    #[arg(long)]
    package: Option<String>,

    /// Directory holding the per-network manifest files
    #[arg(long)]
    manifest_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Declare and deploy the reward contracts
    Deploy {
        /// Backend base URL used in token metadata URIs
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Contract owner (defaults to the deployer account)
        #[arg(long)]
        owner: Option<String>,
    },

    /// Wire up permissions between the deployed contracts
    Init,

    /// Print the manifest for the selected network
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()))
        .with_target(false)
        .init();

    let network = resolve_network(cli.network.as_deref())?;
    let config = build_config(&cli, network)?;

    match cli.command {
        Commands::Deploy { ref base_url, ref owner } => {
            cmd_deploy(config, base_url, owner.as_deref()).await
        }
        Commands::Init => cmd_init(config).await,
        Commands::Show => cmd_show(config),
    }
}

/// Network from the flag, else `$NETWORK`, else devnet.
fn resolve_network(flag: Option<&str>) -> Result<Network> {
    let raw = match flag {
        Some(value) => value.to_string(),
        None => std::env::var("NETWORK").unwrap_or_else(|_| "devnet".to_string()),
    };
    raw.parse().context("invalid network selection")
}

fn build_config(cli: &Cli, network: Network) -> Result<DeployerConfig> {
    let mut config = DeployerConfig::from_env(network)
        .with_context(|| format!("failed to load configuration for {}", network))?;

    if let Some(rpc_url) = &cli.rpc_url {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(fee_multiplier) = cli.fee_multiplier {
        config.fee_multiplier_percent = fee_multiplier;
    }
    if let Some(artifacts_dir) = &cli.artifacts_dir {
        config.artifacts_dir = artifacts_dir.clone();
    }
    if let Some(package) = &cli.package {
        config.scarb_package = package.clone();
    }
    if let Some(manifest_dir) = &cli.manifest_dir {
        config.manifest_dir = manifest_dir.clone();
    }

    Ok(config)
}

async fn connect(config: &DeployerConfig) -> Result<RuntimeContext> {
    let credentials = DeployerCredentials::from_env(config.network)
        .with_context(|| format!("failed to load credentials for {}", config.network))?;
    let ctx = RuntimeContext::new(config.clone(), credentials)?;
    ctx.connect().await?;
    Ok(ctx)
}

async fn cmd_deploy(config: DeployerConfig, base_url: &str, owner: Option<&str>) -> Result<()> {
    let ctx = connect(&config).await?;

    let owner = match owner {
        Some(raw) => FieldElement::from_hex_be(raw).context("invalid --owner address")?,
        None => ctx.deployer_address(),
    };

    let mut store = ManifestStore::open(&config.manifest_dir, config.network)?;
    let pipeline = reward_deploy_pipeline(owner, base_url.trim_end_matches('/'));
    let outcomes = run_pipeline(&ctx, &mut store, &pipeline).await?;

    println!("All setup done ({} calls executed)", outcomes.len());
    Ok(())
}

async fn cmd_init(config: DeployerConfig) -> Result<()> {
    let ctx = connect(&config).await?;

    let mut store = ManifestStore::open(&config.manifest_dir, config.network)?;
    let outcomes = run_pipeline(&ctx, &mut store, &reward_init_pipeline()).await?;

    println!("Initialization completed ({} calls executed)", outcomes.len());
    Ok(())
}

fn cmd_show(config: DeployerConfig) -> Result<()> {
    let store = ManifestStore::open(&config.manifest_dir, config.network)?;

    if store.manifest().is_empty() {
        println!("No deployments recorded for {}", config.network);
        return Ok(());
    }

    println!("Deployments on {}:", config.network);
    for (name, record) in store.manifest().iter() {
        println!(
            "  {:<14} address {:#x}  class hash {:#x}  deployed {}",
            name.as_str(),
            record.address,
            record.class_hash,
            record.deployed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
