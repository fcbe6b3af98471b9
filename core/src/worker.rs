//! The signaling surface `State` uses to wake the worker, expressed as a
//! trait so this crate never has to depend on an async runtime.
//!
//! `State` is constructed before the worker exists (the worker needs a
//! `State` to drive), so it installs a [`NoopWorker`] at construction time
//! and swaps in the real implementation via [`crate::state::State::set_worker`]
//! once the network crate has spawned its tasks. Every method is expected
//! to be a cheap, non-blocking signal (a `try_send` on a bounded channel),
//! never a call that waits on the worker itself.

use crate::transaction::BlockTx;

/// Idempotent signals a `State` sends to its worker.
pub trait Worker: Send + Sync {
    /// Wake the consensus task to attempt mining with the current mempool.
    fn signal_start_mining(&self);
    /// Ask an in-flight mining attempt to abort.
    fn signal_cancel_mining(&self);
    /// Queue `tx` for gossip to known peers.
    fn signal_share_tx(&self, tx: BlockTx);
    /// Begin a graceful shutdown of every worker task.
    fn shutdown(&self);
}

/// A worker handle that drops every signal. Installed before the real
/// worker exists and used by tests that don't need mining or gossip.
pub struct NoopWorker;

impl Worker for NoopWorker {
    fn signal_start_mining(&self) {}
    fn signal_cancel_mining(&self) {}
    fn signal_share_tx(&self, _tx: BlockTx) {}
    fn shutdown(&self) {}
}
