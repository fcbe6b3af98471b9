//! A thin REST client over a peer's `/v1/node` surface.
//!
//! Mirrors the original node-to-node transport: a 404 means "the peer
//! simply has nothing to say" and is treated as success with a default
//! value, any other non-2xx status carries the peer's error body, and a
//! request that never completes (DNS, connect, timeout) is a distinct
//! [`Error::PeerUnreachable`] so callers can tell "peer said no" from
//! "peer isn't there".

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use tallychain_core::block::BlockData;
use tallychain_core::error::{Error, Result};
use tallychain_core::peer::{Peer, PeerStatus};
use tallychain_core::transaction::BlockTx;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to a single peer's `/v1/node` HTTP surface.
pub struct NetClient {
    http: reqwest::Client,
    base_url: String,
}

impl NetClient {
    pub fn new(host: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client configuration is valid");
        Self { http, base_url: format!("http://{host}/v1/node") }
    }

    pub async fn status(&self) -> Result<PeerStatus> {
        self.get(&format!("{}/status", self.base_url)).await
    }

    pub async fn mempool(&self) -> Result<Vec<BlockTx>> {
        self.get(&format!("{}/tx/list", self.base_url)).await
    }

    /// Inclusive block range; mirrors [`tallychain_core::state::State::query_blocks_by_number`].
    pub async fn blocks(&self, from: u64, to: u64) -> Result<Vec<BlockData>> {
        self.get(&format!("{}/block/list/{from}/{to}", self.base_url)).await
    }

    pub async fn submit_peer(&self, peer: &Peer) -> Result<()> {
        self.post_ignoring_body(&format!("{}/peers", self.base_url), peer).await
    }

    pub async fn submit_tx(&self, tx: &BlockTx) -> Result<()> {
        self.post_ignoring_body(&format!("{}/tx/submit", self.base_url), tx).await
    }

    pub async fn propose_block(&self, block: &BlockData) -> Result<()> {
        self.post_ignoring_body(&format!("{}/block/propose", self.base_url), block).await
    }

    async fn get<Resp: DeserializeOwned + Default>(&self, url: &str) -> Result<Resp> {
        let response = self.http.get(url).send().await.map_err(|_| Error::PeerUnreachable)?;
        Self::decode(response).await
    }

    async fn post_ignoring_body<Req: Serialize>(&self, url: &str, body: &Req) -> Result<()> {
        let response = self.http.post(url).json(body).send().await.map_err(|_| Error::PeerUnreachable)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::PeerBadStatus(body))
    }

    async fn decode<Resp: DeserializeOwned + Default>(response: reqwest::Response) -> Result<Resp> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Resp::default());
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::PeerBadStatus(body));
        }
        response.json::<Resp>().await.map_err(|_| Error::PeerUnreachable)
    }
}
