//! Maps [`tallychain_core::Error`] onto HTTP status codes per the node's
//! external-interface error propagation rules: malformed wallet
//! submissions are a client error, a bad peer-proposed block is reported
//! but doesn't get the peer removed from the set, and everything else is
//! either "not found" or an internal failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tallychain_core::Error;

pub enum ApiError {
    Core(Error),
    BadRequest(String),
}

impl ApiError {
    /// A malformed-request error that has no corresponding core [`Error`]
    /// variant (e.g. a path segment that isn't a number or `"latest"`).
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Core(err) => (status_for(&err), err.to_string()),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidChainId
        | Error::InvalidAccountId(_)
        | Error::SameFromTo
        | Error::InvalidSignature
        | Error::SignatureMismatch
        | Error::InvalidNonce { .. }
        | Error::InsufficientFunds
        | Error::ReplaceBelowMinimumBump => StatusCode::BAD_REQUEST,

        Error::ChainForked
        | Error::InvalidDifficulty
        | Error::InvalidHash
        | Error::InvalidBlockNumber
        | Error::InvalidPrevBlockHash
        | Error::InvalidBlockTimestamp
        | Error::InvalidStateRoot
        | Error::InvalidTransRoot => StatusCode::NOT_ACCEPTABLE,

        Error::AccountNotFound => StatusCode::NOT_FOUND,

        Error::NoTransactions | Error::Cancelled => StatusCode::CONFLICT,

        Error::PeerUnreachable | Error::PeerBadStatus(_) => StatusCode::BAD_GATEWAY,

        Error::Merkle(_) | Error::Storage(_) | Error::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
