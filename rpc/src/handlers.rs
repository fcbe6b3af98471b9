//! Handler bodies for the public and private HTTP surfaces. Every handler
//! does exactly three things: pull path/body data out of the request,
//! call one `State` method, and serialize the result as JSON.

use std::sync::Arc;

use axum::extract::{Path, State as AxumState};
use axum::Json;
use serde::{Deserialize, Serialize};

use tallychain_core::account::{Account, AccountID};
use tallychain_core::block::BlockData;
use tallychain_core::genesis::Genesis;
use tallychain_core::peer::{Peer, PeerStatus};
use tallychain_core::state::{State, QUERY_LATEST};
use tallychain_core::transaction::{BlockTx, SignedTx};

use crate::error::ApiError;

type AppState = AxumState<Arc<State>>;

// -- public surface (`/v1`) --

pub async fn genesis(AxumState(state): AppState) -> Json<Genesis> {
    Json(state.genesis().clone())
}

/// An account plus whatever display name the name service has on file for
/// it; `name` falls back to the raw account id when there's no entry.
#[derive(Serialize)]
pub struct NamedAccount {
    #[serde(flatten)]
    account: Account,
    name: String,
}

/// A mempool entry decorated with the sender's display name, for the same
/// reason as [`NamedAccount`].
#[derive(Serialize)]
pub struct NamedBlockTx {
    #[serde(flatten)]
    tx: BlockTx,
    from_name: String,
}

pub async fn accounts_list(AxumState(state): AppState) -> Json<Vec<NamedAccount>> {
    let accounts = state
        .accounts()
        .into_iter()
        .map(|account| {
            let name = state.name_for(&account.account_id);
            NamedAccount { account, name }
        })
        .collect();
    Json(accounts)
}

pub async fn account_by_id(
    AxumState(state): AppState,
    Path(id): Path<String>,
) -> Result<Json<NamedAccount>, ApiError> {
    let account_id = AccountID::try_from(id)?;
    let account = state.query_account(&account_id)?;
    let name = state.name_for(&account.account_id);
    Ok(Json(NamedAccount { account, name }))
}

pub async fn mempool_list(AxumState(state): AppState) -> Json<Vec<NamedBlockTx>> {
    let named = state
        .mempool_transactions()
        .into_iter()
        .map(|tx| {
            let from_name = state.name_for(&tx.signed_tx.tx.from);
            NamedBlockTx { tx, from_name }
        })
        .collect();
    Json(named)
}

pub async fn mempool_list_for_account(
    AxumState(state): AppState,
    Path(account): Path<String>,
) -> Result<Json<Vec<NamedBlockTx>>, ApiError> {
    let account_id = AccountID::try_from(account)?;
    let from_name = state.name_for(&account_id);
    let filtered = state
        .mempool_transactions()
        .into_iter()
        .filter(|tx| tx.signed_tx.tx.from == account_id)
        .map(|tx| NamedBlockTx { tx, from_name: from_name.clone() })
        .collect();
    Ok(Json(filtered))
}

#[derive(Serialize)]
pub struct CommitReceipt {
    accepted: bool,
}

pub async fn tx_commit(AxumState(state): AppState, Json(signed): Json<SignedTx>) -> Result<Json<CommitReceipt>, ApiError> {
    state.upsert_wallet_tx(signed)?;
    Ok(Json(CommitReceipt { accepted: true }))
}

// -- private surface (`/v1/node`) --

pub async fn status(AxumState(state): AppState) -> Result<Json<PeerStatus>, ApiError> {
    Ok(Json(state.status()?))
}

pub async fn node_tx_list(AxumState(state): AppState) -> Json<Vec<BlockTx>> {
    Json(state.mempool_transactions())
}

/// Accepts the literal `latest` in either path segment as the
/// [`QUERY_LATEST`] sentinel, matching the upstream node's HTTP surface.
fn parse_block_bound(raw: &str) -> Result<u64, ApiError> {
    if raw.eq_ignore_ascii_case("latest") {
        return Ok(QUERY_LATEST);
    }
    raw.parse::<u64>().map_err(|_| ApiError::bad_request("block number must be an integer or \"latest\""))
}

pub async fn block_list(
    AxumState(state): AppState,
    Path((from, to)): Path<(String, String)>,
) -> Result<Json<Vec<BlockData>>, ApiError> {
    let from = parse_block_bound(&from)?;
    let to = parse_block_bound(&to)?;
    Ok(Json(state.query_blocks_by_number(from, to)?))
}

#[derive(Deserialize)]
pub struct PeerBody {
    host: String,
}

pub async fn submit_peer(AxumState(state): AppState, Json(body): Json<PeerBody>) -> Json<bool> {
    Json(state.add_known_peer(Peer::new(body.host)))
}

pub async fn submit_tx(AxumState(state): AppState, Json(block_tx): Json<BlockTx>) -> Result<Json<CommitReceipt>, ApiError> {
    state.upsert_node_tx(block_tx)?;
    Ok(Json(CommitReceipt { accepted: true }))
}

pub async fn propose_block(AxumState(state): AppState, Json(block_data): Json<BlockData>) -> Result<Json<CommitReceipt>, ApiError> {
    state.process_proposed_block(block_data)?;
    Ok(Json(CommitReceipt { accepted: true }))
}
