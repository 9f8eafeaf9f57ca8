use openssl::error::ErrorStack;
use reqwest::header::ToStrError;
use thiserror::Error;

/// Error taxonomy for the ACME engine.
///
/// Nothing in the engine retries automatically: the first unrecoverable
/// condition is surfaced immediately, carrying the server's diagnostic body
/// when one is available.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(#[from] ErrorStack),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("no replay-nonce available from the CA")]
    Nonce,

    #[error("authorization for {domain} ended in status \"{status}\": {detail}")]
    Authorization {
        domain: String,
        status: String,
        detail: String,
    },

    #[error("challenge error for {domain}: {reason}")]
    Challenge { domain: String, reason: String },

    #[error("certificate finalization failed: {0}")]
    Certificate(String),

    #[error("state error: {0}")]
    State(String),

    #[error("invalid header value: {0}")]
    Header(#[from] ToStrError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
