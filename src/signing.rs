// Builds a JWS in the legacy flattened wire shape (header, protected,
// payload, signature), where header is the plaintext mirror of protected
// minus the nonce, and POSTs it, capturing the response and replenishing
// the nonce store.

use openssl::pkey::{PKey, Private};
use serde_json::{json, Value};

use crate::crypto::{b64url_encode, canonical_json, jwk, sign_rs256};
use crate::error::Result;
use crate::http::{HttpClient, RawResponse};
use crate::nonce::NonceStore;

const EMPTY_PAYLOAD: &str = "";

/// Resolves `uri` against `ca_base_url` if it isn't already absolute.
pub fn resolve_uri(ca_base_url: &str, uri: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        uri.to_string()
    } else {
        format!("{ca_base_url}{}", if uri.starts_with('/') { uri.to_string() } else { format!("/{uri}") })
    }
}

// Performs one JWS-signed POST, returning the raw CA response. The nonce
// store is consumed then replenished around the call, so request N+1
// always carries the nonce observed in response N.
#[allow(clippy::too_many_arguments)]
pub fn signed_request(
    http: &dyn HttpClient,
    nonces: &mut NonceStore,
    ca_base_url: &str,
    uri: &str,
    account_key: &PKey<Private>,
    payload: Option<&Value>,
) -> Result<RawResponse> {
    let absolute_uri = resolve_uri(ca_base_url, uri);
    let nonce = nonces.next(http, ca_base_url)?;

    let jwk_value = jwk(account_key)?;
    let protected = json!({
        "alg": "RS256",
        "jwk": jwk_value,
        "nonce": nonce,
    });
    let header = json!({
        "alg": "RS256",
        "jwk": jwk_value,
    });

    let (payload64, is_empty) = match payload {
        Some(value) => (b64url_encode(canonical_json(value)?.as_bytes()), false),
        None => (EMPTY_PAYLOAD.to_string(), true),
    };
    let protected64 = b64url_encode(canonical_json(&protected)?.as_bytes());

    let signature = sign_rs256(account_key, &protected64, &payload64)?;
    let signature64 = b64url_encode(&signature);

    let body = json!({
        "header": header,
        "protected": protected64,
        "payload": if is_empty { Value::String(String::new()) } else { Value::String(payload64) },
        "signature": signature64,
    });
    let body_bytes = canonical_json(&body)?.into_bytes();

    let resp = http.post(&absolute_uri, body_bytes)?;
    nonces.store(&resp.headers);
    Ok(resp)
}
