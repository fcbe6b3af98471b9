//! Exercises the `/v1` and `/v1/node` routers end to end over in-process
//! HTTP requests (no socket): build a `State`, wrap it in the router, and
//! drive it with `tower::ServiceExt::oneshot`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use k256::ecdsa::SigningKey;
use rand_core::OsRng;
use tower::ServiceExt;

use tallychain_core::account::AccountID;
use tallychain_core::genesis::Genesis;
use tallychain_core::mempool::Strategy;
use tallychain_core::signature;
use tallychain_core::state::{State, StateConfig};
use tallychain_core::storage::disk::Disk;
use tallychain_core::transaction::Tx;

fn test_state(balances: Vec<(AccountID, u64)>, beneficiary: AccountID) -> (Arc<State>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let disk = Disk::new(dir.path()).unwrap();
    let mut map = BTreeMap::new();
    for (id, balance) in balances {
        map.insert(id.as_str().to_string(), balance);
    }
    let genesis =
        Genesis { chain_id: 1, difficulty: 0, trans_per_block: 10, mining_reward: 100, gas_price: 1, balances: map };
    let config =
        StateConfig { beneficiary, host: "self:8080".into(), mempool_strategy: Strategy::Tip, names_dir: None };
    (Arc::new(State::new(genesis, Box::new(disk), config).unwrap()), dir)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn genesis_list_returns_the_loaded_genesis() {
    let miner = AccountID::try_from(format!("0x{:040x}", 1)).unwrap();
    let (state, _dir) = test_state(vec![], miner);
    let app = tallychain_rpc::router(state);

    let response =
        app.oneshot(Request::builder().uri("/v1/genesis/list").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["chain_id"], 1);
}

#[tokio::test]
async fn tx_commit_accepts_a_well_formed_signed_tx() {
    let key_a = SigningKey::random(&mut OsRng);
    let a = signature::account_id_from_verifying_key(key_a.verifying_key()).unwrap();
    let b = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
    let miner = AccountID::try_from(format!("0x{:040x}", 3)).unwrap();
    let (state, _dir) = test_state(vec![(a.clone(), 1000)], miner);
    let app = tallychain_rpc::router(state);

    let mut tx = Tx::new(1, a, b, 100, 5);
    tx.nonce = 1;
    let signed = tx.sign(&key_a).unwrap();
    let payload = serde_json::to_vec(&signed).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/tx/commit")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tx_commit_rejects_tampered_signature_with_400() {
    let key_a = SigningKey::random(&mut OsRng);
    let a = signature::account_id_from_verifying_key(key_a.verifying_key()).unwrap();
    let b = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
    let c = AccountID::try_from(format!("0x{:040x}", 4)).unwrap();
    let miner = AccountID::try_from(format!("0x{:040x}", 3)).unwrap();
    let (state, _dir) = test_state(vec![(a.clone(), 1000)], miner);
    let app = tallychain_rpc::router(state);

    let mut tx = Tx::new(1, a, b, 100, 5);
    tx.nonce = 1;
    let mut signed = tx.sign(&key_a).unwrap();
    signed.tx.to = c;
    let payload = serde_json::to_vec(&signed).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/tx/commit")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn node_status_reports_latest_block_and_known_peers() {
    let miner = AccountID::try_from(format!("0x{:040x}", 1)).unwrap();
    let (state, _dir) = test_state(vec![], miner);
    state.add_known_peer(tallychain_core::peer::Peer::new("peer-a:8080"));
    let app = tallychain_rpc::router(state);

    let response =
        app.oneshot(Request::builder().uri("/v1/node/status").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["latest_block_num"], 0);
    assert_eq!(body["known_peers"][0]["host"], "peer-a:8080");
}

#[tokio::test]
async fn block_list_accepts_the_latest_sentinel() {
    let miner = AccountID::try_from(format!("0x{:040x}", 1)).unwrap();
    let (state, _dir) = test_state(vec![], miner);
    let app = tallychain_rpc::router(state);

    let response = app
        .oneshot(Request::builder().uri("/v1/node/block/list/1/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn account_by_id_rejects_malformed_address_with_400() {
    let miner = AccountID::try_from(format!("0x{:040x}", 1)).unwrap();
    let (state, _dir) = test_state(vec![], miner);
    let app = tallychain_rpc::router(state);

    let response =
        app.oneshot(Request::builder().uri("/v1/accounts/list/not-an-address").body(Body::empty()).unwrap())
            .await
            .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn propose_block_with_bad_state_root_returns_406() {
    let miner = AccountID::try_from(format!("0x{:040x}", 1)).unwrap();
    let (state, _dir) = test_state(vec![], miner.clone());

    let prev = tallychain_core::block::BlockHeader {
        number: 0,
        prev_block_hash: signature::ZERO_HASH.to_string(),
        timestamp: 0,
        beneficiary: miner.clone(),
        difficulty: 0,
        mining_reward: 0,
        state_root: signature::ZERO_HASH.to_string(),
        trans_root: signature::ZERO_HASH.to_string(),
        nonce: 0,
    };
    let key_a = SigningKey::random(&mut OsRng);
    let a = signature::account_id_from_verifying_key(key_a.verifying_key()).unwrap();
    let mut tx = Tx::new(1, a, miner.clone(), 1, 1);
    tx.nonce = 1;
    let block_tx = tallychain_core::transaction::BlockTx::new(tx.sign(&key_a).unwrap(), 0, 1, 1);
    let args = tallychain_core::block::PowArgs {
        beneficiary: miner,
        difficulty: 0,
        mining_reward: 100,
        state_root: "0xbad".to_string(),
        trans: vec![block_tx],
    };
    let block = tallychain_core::block::pow(args, &prev, || false).unwrap();
    let block_data = block.to_block_data().unwrap();
    let payload = serde_json::to_vec(&block_data).unwrap();

    let app = tallychain_rpc::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/node/block/propose")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}
