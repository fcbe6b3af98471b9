//! `tallychain`: run a node, or drive a wallet against one.
//!
//! `node` boots storage, the genesis descriptor, `State`, the `Worker`,
//! and the `axum` HTTP surface. `miner` is the same node wired for
//! continuous proof-of-work, kept as a separate subcommand because that's
//! how the upstream tooling split it. `wallet` offers the key-management
//! and signing helpers a human operator drives by hand.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use tallychain_core::account::AccountID;
use tallychain_core::config::{Config, Consensus as ConfigConsensus};
use tallychain_core::genesis::Genesis;
use tallychain_core::mempool::Strategy;
use tallychain_core::peer::Peer;
use tallychain_core::state::{State, StateConfig};
use tallychain_core::storage::disk::Disk;
use tallychain_core::transaction::Tx;
use tallychain_core::worker::Worker;
use tallychain_network::worker::{Consensus as WorkerConsensus, TokioWorker};
use tallychain_wallet::Wallet;

#[derive(Parser)]
#[command(name = "tallychain")]
#[command(about = "A small account-based blockchain node", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full node: storage, consensus worker, and the HTTP surface.
    Node(NodeArgs),
    /// Run a node pinned to proof-of-work, regardless of `--consensus`.
    Miner(NodeArgs),
    /// Wallet key management and transaction signing.
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },
}

#[derive(clap::Args)]
struct NodeArgs {
    /// Path to the genesis descriptor JSON file.
    #[arg(long)]
    genesis: PathBuf,
    /// Directory block files are written to.
    #[arg(long, default_value = "./zblock")]
    db_path: String,
    /// Address this node's HTTP surface listens on and announces to peers.
    #[arg(long, default_value = "0.0.0.0:8080")]
    host: String,
    /// Account credited with mining rewards and gas fees.
    #[arg(long)]
    beneficiary: String,
    /// Comma-separated `host:port` list of peers to sync with on startup.
    #[arg(long, value_delimiter = ',')]
    peers: Vec<String>,
    /// `pow` or `poa`.
    #[arg(long, default_value = "pow")]
    consensus: String,
    /// `tip` or `tip-advanced`.
    #[arg(long, default_value = "tip")]
    mempool_strategy: String,
    /// Directory of `<account_id>.txt` display names, scanned once at boot.
    #[arg(long)]
    names_dir: Option<String>,
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Generate a new keypair and print its account id.
    New {
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the account id for an existing keypair.
    Address {
        #[arg(long)]
        key: PathBuf,
    },
    /// Sign a transfer and print the wire-ready `SignedTx` as JSON.
    Sign {
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        chain_id: u16,
        #[arg(long)]
        nonce: u64,
        #[arg(long)]
        to: String,
        #[arg(long)]
        value: u64,
        #[arg(long, default_value_t = 0)]
        tip: u64,
    },
    /// Sign a transfer and submit it to a node's public HTTP surface.
    Send {
        #[arg(long)]
        key: PathBuf,
        /// `host:port` of the node to submit to.
        #[arg(long)]
        node: String,
        #[arg(long)]
        chain_id: u16,
        #[arg(long)]
        nonce: u64,
        #[arg(long)]
        to: String,
        #[arg(long)]
        value: u64,
        #[arg(long, default_value_t = 0)]
        tip: u64,
    },
}

fn parse_consensus(raw: &str) -> ConfigConsensus {
    match raw {
        "poa" => ConfigConsensus::Poa,
        _ => ConfigConsensus::Pow,
    }
}

fn parse_strategy(raw: &str) -> Strategy {
    match raw {
        "tip-advanced" => Strategy::TipAdvanced,
        _ => Strategy::Tip,
    }
}

async fn run_node(args: NodeArgs, force_pow: bool) -> anyhow::Result<()> {
    let genesis = Genesis::load(&args.genesis)?;
    let beneficiary = AccountID::try_from(args.beneficiary.as_str())?;
    let consensus = if force_pow { ConfigConsensus::Pow } else { parse_consensus(&args.consensus) };

    let config = Config::builder()
        .beneficiary(beneficiary)
        .host(args.host.clone())
        .db_path(args.db_path.clone())
        .known_peers(args.peers.clone())
        .consensus(consensus)
        .mempool_strategy(parse_strategy(&args.mempool_strategy))
        .names_dir(args.names_dir.clone())
        .finish();

    let disk = Disk::new(&config.db_path)?;
    let state_config = StateConfig {
        beneficiary: config.beneficiary.clone(),
        host: config.host.clone(),
        mempool_strategy: config.mempool_strategy,
        names_dir: config.names_dir.clone(),
    };
    let state = Arc::new(State::new(genesis, Box::new(disk), state_config)?);

    for host in &config.known_peers {
        state.add_known_peer(Peer::new(host.clone()));
    }

    let worker_consensus = match config.consensus {
        ConfigConsensus::Pow => WorkerConsensus::ProofOfWork,
        ConfigConsensus::Poa => WorkerConsensus::ProofOfAuthority,
    };
    let worker = TokioWorker::spawn(Arc::clone(&state), worker_consensus).await;

    let listener = tokio::net::TcpListener::bind(&config.host).await?;
    tracing::info!(host = %config.host, "tallychain node listening");

    let app = tallychain_rpc::router(Arc::clone(&state));

    tokio::select! {
        result = axum::serve(listener, app) => result.map_err(anyhow::Error::from)?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    worker.shutdown();
    Ok(())
}

fn run_wallet(command: WalletCommand) -> anyhow::Result<()> {
    match command {
        WalletCommand::New { out } => {
            let wallet = Wallet::generate();
            wallet.save(&out)?;
            println!("{}", wallet.account_id()?);
        }
        WalletCommand::Address { key } => {
            let wallet = Wallet::load(&key)?;
            println!("{}", wallet.account_id()?);
        }
        WalletCommand::Sign { key, chain_id, nonce, to, value, tip } => {
            let wallet = Wallet::load(&key)?;
            let to = AccountID::try_from(to.as_str())?;
            let mut tx = Tx::new(chain_id, wallet.account_id()?, to, value, tip);
            tx.nonce = nonce;
            let signed = wallet.sign(tx)?;
            println!("{}", serde_json::to_string_pretty(&signed)?);
        }
        WalletCommand::Send { key, node, chain_id, nonce, to, value, tip } => {
            let wallet = Wallet::load(&key)?;
            let to = AccountID::try_from(to.as_str())?;
            let mut tx = Tx::new(chain_id, wallet.account_id()?, to, value, tip);
            tx.nonce = nonce;
            let signed = wallet.sign(tx)?;

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(submit_to_node(&node, &signed))?;
            println!("submitted");
        }
    }
    Ok(())
}

/// Posts a signed transaction straight to a node's public `/v1/tx/commit`
/// endpoint. This is the wallet's only HTTP dependency; it deliberately
/// does not share `tallychain_network::NetClient`, which only speaks the
/// node-to-node private surface.
async fn submit_to_node(host: &str, signed: &tallychain_core::transaction::SignedTx) -> anyhow::Result<()> {
    let url = format!("http://{host}/v1/tx/commit");
    let response = reqwest::Client::new().post(&url).json(signed).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("node rejected transaction: {}", response.text().await.unwrap_or_default());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Node(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_node(args, false))?;
        }
        Commands::Miner(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_node(args, true))?;
        }
        Commands::Wallet { command } => run_wallet(command)?,
    }
    Ok(())
}
