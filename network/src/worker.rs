//! The async side of a node: a [`tallychain_core::worker::Worker`]
//! implementation that owns the mining loop, periodic peer sync, and
//! transaction/block gossip, all driven over [`NetClient`].
//!
//! Four tasks run for the lifetime of the node: one consensus task (PoW or
//! PoA, chosen by [`Consensus`]), one peer-sync task, one tx-gossip task,
//! and a one-shot startup sync that runs once before the others are
//! considered live. Every signal `State` sends the worker (start mining,
//! cancel mining, share a tx) is a non-blocking `try_send` on a bounded
//! channel; a full channel just means the signal was already pending.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tallychain_core::block::BlockData;
use tallychain_core::peer::Peer;
use tallychain_core::state::State;
use tallychain_core::transaction::BlockTx;
use tallychain_core::worker::Worker;

use crate::client::NetClient;

/// How the consensus task decides when to mine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consensus {
    /// Mine continuously whenever the mempool is non-empty.
    ProofOfWork,
    /// Mine only on a 5-second cycle boundary, and only if this node wins
    /// the round's leader election.
    ProofOfAuthority,
}

const SHARE_TX_CAPACITY: usize = 100;
const PEER_SYNC_INTERVAL: Duration = Duration::from_secs(30);
const POA_CYCLE: Duration = Duration::from_secs(5);

/// A running node's async worker tasks, and the handle `State` uses to
/// signal them.
pub struct TokioWorker {
    start_mining_tx: mpsc::Sender<()>,
    cancel_mining_tx: mpsc::Sender<()>,
    share_tx_tx: mpsc::Sender<BlockTx>,
    cancel_flag: Arc<AtomicBool>,
    shutdown: CancellationToken,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TokioWorker {
    /// Runs the one-shot startup sync against every known external peer,
    /// then spawns the four long-running tasks and installs `self` as
    /// `state`'s worker.
    pub async fn spawn(state: Arc<State>, consensus: Consensus) -> Arc<Self> {
        sync_once(&state).await;

        let (start_mining_tx, start_mining_rx) = mpsc::channel(1);
        let (cancel_mining_tx, cancel_mining_rx) = mpsc::channel(1);
        let (share_tx_tx, share_tx_rx) = mpsc::channel(SHARE_TX_CAPACITY);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let worker = Arc::new(Self {
            start_mining_tx,
            cancel_mining_tx,
            share_tx_tx,
            cancel_flag: Arc::clone(&cancel_flag),
            shutdown: shutdown.clone(),
            tasks: std::sync::Mutex::new(Vec::new()),
        });

        let consensus_task = tokio::spawn(consensus_operations(
            Arc::clone(&state),
            consensus,
            start_mining_rx,
            cancel_mining_rx,
            cancel_flag,
            shutdown.clone(),
        ));
        let peer_task = tokio::spawn(peer_operations(Arc::clone(&state), shutdown.clone()));
        let share_tx_task = tokio::spawn(share_tx_operations(Arc::clone(&state), share_tx_rx, shutdown.clone()));

        *worker.tasks.lock().expect("worker task list poisoned") = vec![consensus_task, peer_task, share_tx_task];

        state.set_worker(Arc::clone(&worker) as Arc<dyn Worker>);
        worker
    }
}

impl Worker for TokioWorker {
    fn signal_start_mining(&self) {
        let _ = self.start_mining_tx.try_send(());
    }

    fn signal_cancel_mining(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        let _ = self.cancel_mining_tx.try_send(());
    }

    fn signal_share_tx(&self, tx: BlockTx) {
        let _ = self.share_tx_tx.try_send(tx);
    }

    fn shutdown(&self) {
        self.signal_cancel_mining();
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().expect("worker task list poisoned"));
        for task in tasks {
            task.abort();
        }
    }
}

/// One round of peer discovery, mempool pull, and block catch-up against
/// every known external peer, run once before the long-running tasks
/// start and again on [`PEER_SYNC_INTERVAL`] inside [`peer_operations`].
async fn sync_once(state: &Arc<State>) {
    for peer in state.known_external_peers() {
        let client = NetClient::new(&peer.host);

        let status = match client.status().await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(peer = %peer.host, %err, "peer status request failed during sync");
                continue;
            }
        };

        for known in status.known_peers {
            if known.host != state.host() {
                state.add_known_peer(known);
            }
        }

        match client.mempool().await {
            Ok(pool) => {
                for tx in pool {
                    if let Err(err) = state.upsert_node_tx(tx) {
                        tracing::warn!(peer = %peer.host, %err, "peer mempool tx rejected during sync");
                    }
                }
            }
            Err(err) => tracing::warn!(peer = %peer.host, %err, "peer mempool request failed during sync"),
        }

        let local_latest = latest_block_number(state);
        if status.latest_block_num > local_latest {
            match client.blocks(local_latest + 1, tallychain_core::state::QUERY_LATEST).await {
                Ok(blocks) => {
                    for block in blocks {
                        if let Err(err) = state.process_proposed_block(block) {
                            tracing::warn!(peer = %peer.host, %err, "peer block rejected during sync");
                        }
                    }
                }
                Err(err) => tracing::warn!(peer = %peer.host, %err, "peer block catch-up failed during sync"),
            }
        }
    }

    announce_availability(state).await;
}

fn latest_block_number(state: &State) -> u64 {
    state.status().map(|status| status.latest_block_num).unwrap_or(0)
}

async fn announce_availability(state: &Arc<State>) {
    let self_peer = Peer::new(state.host().to_string());
    for peer in state.known_external_peers() {
        let client = NetClient::new(&peer.host);
        if let Err(err) = client.submit_peer(&self_peer).await {
            tracing::warn!(peer = %peer.host, %err, "failed to announce availability to peer");
        }
    }
}

/// Periodic health check over the known peer set: peers that fail to
/// answer a status request are dropped, unlike [`sync_once`], which only
/// logs and moves on.
async fn peer_operations(state: Arc<State>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(PEER_SYNC_INTERVAL) => {
                for peer in state.known_external_peers() {
                    let client = NetClient::new(&peer.host);
                    match client.status().await {
                        Ok(status) => {
                            for known in status.known_peers {
                                if known.host != state.host() {
                                    state.add_known_peer(known);
                                }
                            }
                        }
                        Err(err) => {
                            tracing::warn!(peer = %peer.host, %err, "peer unreachable, dropping from known peers");
                            state.remove_known_peer(&peer);
                        }
                    }
                }
                announce_availability(&state).await;
            }
            _ = shutdown.cancelled() => return,
        }
    }
}

/// Forwards wallet-submitted transactions to every known external peer as
/// they're queued via [`TokioWorker::signal_share_tx`].
async fn share_tx_operations(state: Arc<State>, mut share_tx_rx: mpsc::Receiver<BlockTx>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            Some(tx) = share_tx_rx.recv() => {
                for peer in state.known_external_peers() {
                    let client = NetClient::new(&peer.host);
                    if let Err(err) = client.submit_tx(&tx).await {
                        tracing::warn!(peer = %peer.host, %err, "failed to share tx with peer");
                    }
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn consensus_operations(
    state: Arc<State>,
    consensus: Consensus,
    start_mining_rx: mpsc::Receiver<()>,
    cancel_mining_rx: mpsc::Receiver<()>,
    cancel_flag: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    match consensus {
        Consensus::ProofOfWork => pow_operations(state, start_mining_rx, cancel_mining_rx, cancel_flag, shutdown).await,
        Consensus::ProofOfAuthority => poa_operations(state, cancel_mining_rx, cancel_flag, shutdown).await,
    }
}

/// Mines whenever signaled, racing the blocking PoW search against a
/// cancellation signal. Re-signals itself if the mempool still has work
/// left once a mining attempt completes.
async fn pow_operations(
    state: Arc<State>,
    mut start_mining_rx: mpsc::Receiver<()>,
    mut cancel_mining_rx: mpsc::Receiver<()>,
    cancel_flag: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            Some(()) = start_mining_rx.recv() => {
                // Drain a stale cancel signal left over from a previous round,
                // and keep mining rounds back to back while the mempool still
                // has work, instead of waiting for another external signal.
                while state.mempool_len() > 0 {
                    while cancel_mining_rx.try_recv().is_ok() {}
                    cancel_flag.store(false, Ordering::SeqCst);
                    if !run_mining_attempt(&state, &cancel_flag).await {
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}

/// Mines on a 5-second cycle boundary, only when this node wins the
/// round's leader election.
async fn poa_operations(
    state: Arc<State>,
    mut cancel_mining_rx: mpsc::Receiver<()>,
    cancel_flag: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(duration_until_next_cycle()) => {
                if elected_leader(&state) == state.host() && state.mempool_len() > 0 {
                    while cancel_mining_rx.try_recv().is_ok() {}
                    cancel_flag.store(false, Ordering::SeqCst);
                    run_mining_attempt(&state, &cancel_flag).await;
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}

/// Runs one mining attempt off the async reactor and, if it produces a
/// block, proposes it to every known external peer. Returns whether a
/// block was actually mined, so callers can decide whether it's worth
/// looping for another round.
async fn run_mining_attempt(state: &Arc<State>, cancel_flag: &Arc<AtomicBool>) -> bool {
    let blocking_state = Arc::clone(state);
    let blocking_cancel_flag = Arc::clone(cancel_flag);

    let mined = tokio::task::spawn_blocking(move || {
        blocking_state.mine_new_block(|| blocking_cancel_flag.load(Ordering::SeqCst))
    })
    .await;

    match mined {
        Ok(Ok(block)) => {
            match block.to_block_data() {
                Ok(block_data) => propose_block_to_peers(state, &block_data).await,
                Err(err) => tracing::error!(%err, "mined block failed to serialize for propagation"),
            }
            true
        }
        Ok(Err(err)) => {
            tracing::info!(%err, "mining attempt did not produce a block");
            false
        }
        Err(err) => {
            tracing::error!(%err, "mining task panicked");
            false
        }
    }
}

async fn propose_block_to_peers(state: &Arc<State>, block_data: &BlockData) {
    for peer in state.known_external_peers() {
        let client = NetClient::new(&peer.host);
        if let Err(err) = client.propose_block(block_data).await {
            tracing::warn!(peer = %peer.host, %err, "failed to propose mined block to peer");
        }
    }
}

/// Rounds up to the next 5-second wall-clock boundary, the way the
/// original PoA ticker resets itself every cycle.
fn duration_until_next_cycle() -> Duration {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch");
    let cycle_secs = POA_CYCLE.as_secs();
    let remainder = now.as_secs() % cycle_secs;
    Duration::from_secs(cycle_secs - remainder)
}

/// Deterministically picks one host out of the node's full known-peer
/// list (self included) using an FNV-1a hash of the latest block's hash,
/// the same algorithm the original leader election uses.
fn elected_leader(state: &State) -> String {
    let mut names: Vec<String> = state.known_peers().into_iter().map(|p| p.host).collect();
    names.sort();
    if names.is_empty() {
        return state.host().to_string();
    }

    let latest_hash = state.status().map(|s| s.latest_block_hash).unwrap_or_default();
    let index = (fnv1a_32(latest_hash.as_bytes()) as usize) % names.len();
    names[index].clone()
}

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
