//! The node's REST surface: two `axum` routers (public `/v1`, private
//! `/v1/node`) that decode/encode JSON and delegate straight to
//! [`tallychain_core::state::State`]. Handlers carry no business logic of
//! their own; every invariant lives in the core crate.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tallychain_core::state::State;

pub use error::ApiError;

/// Builds the combined `/v1` (public) + `/v1/node` (private) router over a
/// shared `State`.
pub fn router(state: Arc<State>) -> Router {
    let public = Router::new()
        .route("/genesis/list", get(handlers::genesis))
        .route("/accounts/list", get(handlers::accounts_list))
        .route("/accounts/list/:id", get(handlers::account_by_id))
        .route("/tx/uncommited/list", get(handlers::mempool_list))
        .route("/tx/uncommited/list/:account", get(handlers::mempool_list_for_account))
        .route("/tx/commit", post(handlers::tx_commit));

    let private = Router::new()
        .route("/status", get(handlers::status))
        .route("/tx/list", get(handlers::node_tx_list))
        .route("/block/list/:from/:to", get(handlers::block_list))
        .route("/peers", post(handlers::submit_peer))
        .route("/tx/submit", post(handlers::submit_tx))
        .route("/block/propose", post(handlers::propose_block));

    Router::new().nest("/v1", public.nest("/node", private)).with_state(state)
}
