//! Peer-to-peer transport for a `tallychain` node: an HTTP client for
//! talking to other nodes and a [`tokio`]-based [`Worker`](tallychain_core::worker::Worker)
//! implementation that drives mining, gossip, and periodic peer sync.

pub mod client;
pub mod worker;

pub use client::NetClient;
pub use worker::TokioWorker;
