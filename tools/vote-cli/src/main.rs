//! vote-cli: terminal client for a relayed on-chain election.
//!
//! Reads tallies from the ledger, follows `VoteCast` events live, and submits
//! votes through the registry and relayer. Administrative writes are signed by
//! the node's unlocked account.
//!
//! ## Usage
//!
//! ```bash
//! # Follow the tally until Ctrl-C
//! vote-cli watch
//!
//! # Cast a vote
//! vote-cli vote --dni 12345678 --fingerprint abc --candidate 2
//!
//! # Point at another deployment (flags override VOTE_* variables)
//! vote-cli --rpc-url http://node:8545 --contract 0x... tally
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vote_sync::{
    CandidateMeta, FnListener, HttpRpcClient, RpcWallet, SyncConfig, SyncLayer, TallySnapshot,
    ViewGuard, VoteEvent, VotePage, VoteQuery, VoteSyncApi, WalletProvider,
};

/// Election tally and vote submission client
#[derive(Parser, Debug)]
#[command(name = "vote-cli")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ledger JSON-RPC endpoint (overrides VOTE_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Ledger websocket endpoint (overrides VOTE_WS_URL)
    #[arg(long, global = true)]
    ws_url: Option<String>,

    /// Relayer base URL (overrides VOTE_RELAYER_URL)
    #[arg(long, global = true)]
    relayer_url: Option<String>,

    /// Registry base URL (overrides VOTE_REGISTRY_URL)
    #[arg(long, global = true)]
    registry_url: Option<String>,

    /// Voting contract address (overrides VOTE_CONTRACT_ADDRESS)
    #[arg(long, global = true)]
    contract: Option<String>,

    /// Poll the HTTP endpoint instead of subscribing over websocket
    #[arg(long, global = true)]
    no_realtime: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tally and follow votes until Ctrl-C
    Watch,
    /// Print the current tally once
    Tally,
    /// Fetch a proof for the voter and submit a vote
    Vote {
        /// Voter document number
        #[arg(long)]
        dni: String,
        /// Voter fingerprint
        #[arg(long)]
        fingerprint: String,
        /// Candidate id
        #[arg(long)]
        candidate: u64,
        /// Let the relayer fetch the proof itself
        #[arg(long)]
        simple: bool,
    },
    /// List recorded votes
    Votes {
        /// Election id (defaults to the current one)
        #[arg(long)]
        election: Option<u64>,
        /// Only votes for this candidate
        #[arg(long)]
        candidate: Option<u64>,
        /// First vote index
        #[arg(long, default_value = "0")]
        start: u64,
        /// Page size
        #[arg(long, default_value = "20")]
        limit: u64,
    },
    /// Publish the registry's current root on-chain
    SyncRoot,
    /// Show candidate images, or replace them with --set
    Meta {
        /// `<candidate-id>=<image-url>`, repeatable
        #[arg(long = "set", value_parser = parse_meta)]
        set: Vec<CandidateMeta>,
    },
    /// Create a new election
    CreateElection {
        /// Election title
        title: String,
    },
    /// Add a candidate to the current election
    AddCandidate {
        /// Candidate name
        name: String,
    },
    /// Close the current election
    CloseElection,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_config(&args)?;

    let wallet: Arc<dyn WalletProvider> = Arc::new(RpcWallet::new(
        HttpRpcClient::with_timeout(config.rpc_url.clone(), config.request_timeout())
            .context("invalid RPC endpoint")?,
    ));
    let sync = SyncLayer::connect(&config, Some(wallet))
        .await
        .context("failed to start sync layer")?;

    let result = run(&sync, args.command, args.json).await;
    sync.shutdown();
    result
}

/// `VOTE_*` variables first, then command-line overrides.
fn load_config(args: &Args) -> Result<SyncConfig> {
    let mut config = SyncConfig::from_env().context("invalid VOTE_* environment")?;
    if let Some(url) = &args.rpc_url {
        config.rpc_url = url.clone();
    }
    if let Some(url) = &args.ws_url {
        config.ws_url = url.clone();
    }
    if let Some(url) = &args.relayer_url {
        config.relayer_url = url.clone();
    }
    if let Some(url) = &args.registry_url {
        config.registry_url = url.clone();
    }
    if let Some(address) = &args.contract {
        config.contract_address = address.clone();
    }
    if args.no_realtime {
        config.ws_url.clear();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(sync: &Arc<SyncLayer>, command: Command, as_json: bool) -> Result<()> {
    match command {
        Command::Watch => watch(sync, as_json).await,
        Command::Tally => {
            let snapshot = sync.reload().await.context("failed to load tally")?;
            print_tally(&snapshot, as_json);
            Ok(())
        }
        Command::Vote {
            dni,
            fingerprint,
            candidate,
            simple,
        } => {
            let handle = if simple {
                sync.relayer()
                    .submit_vote_simple(candidate, &dni, &fingerprint)
                    .await
            } else {
                sync.cast_vote(&dni, &fingerprint, candidate).await
            }
            .context("vote was not submitted")?;
            print_value(as_json, json!({ "txHash": handle.tx_hash }), || {
                format!("vote submitted in {handle}")
            });
            Ok(())
        }
        Command::Votes {
            election,
            candidate,
            start,
            limit,
        } => {
            let election = match election {
                Some(id) => id,
                None => sync.reader().current_election_id().await?,
            };
            let page = match candidate {
                Some(candidate) => {
                    sync.relayer()
                        .list_votes_by_candidate(election, candidate, start, limit)
                        .await
                }
                None => {
                    sync.relayer()
                        .list_votes(VoteQuery::page(election, start, limit))
                        .await
                }
            }
            .context("failed to list votes")?;
            print_votes(&page, as_json);
            Ok(())
        }
        Command::SyncRoot => {
            let sync_root = sync
                .relayer()
                .sync_root_from_registry()
                .await
                .context("root sync failed")?;
            print_value(as_json, json!(sync_root), || {
                format!("root {} published in {}", sync_root.root, sync_root.tx_hash)
            });
            Ok(())
        }
        Command::Meta { set } => {
            let election = sync.reader().current_election_id().await?;
            if election == 0 {
                bail!("no election has been created");
            }
            if !set.is_empty() {
                sync.relayer()
                    .save_candidate_meta(election, &set)
                    .await
                    .context("failed to save candidate images")?;
                info!(election, count = set.len(), "candidate images saved");
            }
            let images = sync.relayer().get_candidate_meta(election).await?;
            print_value(as_json, json!(images), || {
                images
                    .iter()
                    .map(|(id, url)| format!("{id:>4}  {url}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            Ok(())
        }
        Command::CreateElection { title } => {
            sync.wallet().connect().await.context("no signer")?;
            let handle = sync.admin().create_election(&title).await?;
            println!("election \"{title}\" created in {handle}");
            Ok(())
        }
        Command::AddCandidate { name } => {
            sync.wallet().connect().await.context("no signer")?;
            let handle = sync.admin().add_candidate(&name).await?;
            println!("candidate \"{name}\" added in {handle}");
            Ok(())
        }
        Command::CloseElection => {
            sync.wallet().connect().await.context("no signer")?;
            let handle = sync.admin().close_current_election().await?;
            println!("election closed in {handle}");
            Ok(())
        }
    }
}

/// Reload, then print the tally after every applied vote until Ctrl-C.
async fn watch(sync: &Arc<SyncLayer>, as_json: bool) -> Result<()> {
    let snapshot = sync.reload().await.context("initial reload failed")?;
    print_tally(&snapshot, as_json);

    let view = ViewGuard::new();
    let listener_view = view.clone();
    let layer = Arc::clone(sync);
    let subscription = sync.on_vote(FnListener(move |event: VoteEvent| {
        let view = listener_view.clone();
        let layer = Arc::clone(&layer);
        async move {
            view.apply_if_live(layer.snapshot(), |snapshot| {
                if !as_json {
                    println!(
                        "vote: candidate {} now at {} (election {})",
                        event.candidate_id, event.new_total, event.election_id
                    );
                }
                print_tally(&snapshot, as_json);
            });
        }
    }));
    info!(state = ?sync.connection_state(), "watching votes, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    view.close();
    subscription.unsubscribe().await;
    Ok(())
}

fn print_value(as_json: bool, value: serde_json::Value, text: impl FnOnce() -> String) {
    if as_json {
        println!("{value}");
    } else {
        println!("{}", text());
    }
}

fn print_tally(snapshot: &TallySnapshot, as_json: bool) {
    if as_json {
        println!("{}", json!(snapshot));
        return;
    }
    if snapshot.election_id == 0 {
        println!("no election has been created");
        return;
    }
    println!(
        "election #{}  total votes: {}",
        snapshot.election_id, snapshot.total_votes
    );
    for candidate in &snapshot.candidates {
        println!(
            "{:>4}  {:<24} {:>8} {:>6.1}%",
            candidate.id,
            candidate.name,
            candidate.vote_count,
            snapshot.share(candidate.id).unwrap_or(0.0)
        );
    }
}

fn print_votes(page: &VotePage, as_json: bool) {
    if as_json {
        println!("{}", json!(page));
        return;
    }
    println!(
        "election #{}  votes {}..{} of {}",
        page.election_id,
        page.start,
        page.start + page.items.len() as u64,
        page.total
    );
    for vote in &page.items {
        println!(
            "{:>6}  candidate {:>4}  at {}",
            vote.id, vote.candidate_id, vote.timestamp
        );
    }
}

fn parse_meta(raw: &str) -> Result<CandidateMeta, String> {
    let (id, url) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <candidate-id>=<image-url>, got {raw:?}"))?;
    let candidate_id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid candidate id {id:?}"))?;
    Ok(CandidateMeta {
        candidate_id,
        image_url: url.trim().to_string(),
    })
}
