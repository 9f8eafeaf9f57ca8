// Holds the single current Replay-Nonce. A nonce is used at most once:
// next() consumes the cached value, refreshing from GET <ca>/directory if
// none is cached, and the caller must replenish via store() from the
// response that follows.

use crate::error::{Error, Result};
use crate::http::{header, HttpClient};

pub struct NonceStore {
    current: Option<String>,
}

impl NonceStore {
    pub fn new() -> Self {
        NonceStore { current: None }
    }

    /// Returns the current nonce, refreshing from the CA's directory
    /// endpoint if none is cached. Consumes the cached value.
    pub fn next(&mut self, http: &dyn HttpClient, ca_base_url: &str) -> Result<String> {
        if let Some(nonce) = self.current.take() {
            return Ok(nonce);
        }
        self.refresh(http, ca_base_url)
    }

    fn refresh(&mut self, http: &dyn HttpClient, ca_base_url: &str) -> Result<String> {
        let resp = http.get(&format!("{ca_base_url}/directory"))?;
        header(&resp.headers, "replay-nonce").ok_or(Error::Nonce)
    }

    /// Replenishes the cached nonce from a response's raw header block, if
    /// it carries one. A response without a `Replay-Nonce` header leaves the
    /// cache untouched, so the next `next()` call falls back to a refresh.
    pub fn store(&mut self, headers: &str) {
        if let Some(nonce) = header(headers, "replay-nonce") {
            self.current = Some(nonce);
        }
    }
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new()
    }
}
