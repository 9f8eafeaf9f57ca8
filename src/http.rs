// A minimal HTTP client exposing GET/POST and the raw response header block
// so callers can pull Location:, Replay-Nonce:, and repeated Link: headers
// out themselves.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use crate::error::{Error, Result};

/// A captured HTTP response: status code, the raw header block, and the body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// One `Name: value` line per header, `\r\n`-joined; repeated header
    /// names (e.g. multiple `Link:` headers) appear on separate lines so
    /// every value survives.
    pub headers: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Narrow transport interface the rest of the engine is built against, so
/// tests can inject a scripted fake CA instead of hitting the network.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<RawResponse>;
    fn post(&self, url: &str, body: Vec<u8>) -> Result<RawResponse>;
}

/// Default transport: `reqwest`'s blocking client, TLS verified, no
/// automatic redirect following (callers parse bodies/headers themselves),
/// 30s per-call timeout.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(ReqwestHttpClient { client })
    }

    fn capture(resp: reqwest::blocking::Response) -> Result<RawResponse> {
        let status = resp.status().as_u16();
        let mut headers = String::new();
        for (name, value) in resp.headers().iter() {
            headers.push_str(name.as_str());
            headers.push_str(": ");
            headers.push_str(value.to_str()?);
            headers.push_str("\r\n");
        }
        let body = resp.bytes()?.to_vec();
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: &str) -> Result<RawResponse> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()?;
        Self::capture(resp)
    }

    fn post(&self, url: &str, body: Vec<u8>) -> Result<RawResponse> {
        let resp = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .body(body)
            .send()?;
        Self::capture(resp)
    }
}

/// Case-insensitive extraction of the first occurrence of `name` from a raw
/// header block.
pub fn header(block: &str, name: &str) -> Option<String> {
    let name_lower = name.to_ascii_lowercase();
    block.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().to_ascii_lowercase() == name_lower {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

/// Case-insensitive extraction of every occurrence of `name` from a raw
/// header block, in order. Used for repeated `Link:` headers.
pub fn header_all(block: &str, name: &str) -> Vec<String> {
    let name_lower = name.to_ascii_lowercase();
    block
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim().to_ascii_lowercase() == name_lower {
                Some(value.trim().to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Parses `Link: <url>; rel="up"` header values, returning the URLs whose
/// `rel` parameter is `up`, in header order.
pub fn link_rel_up_urls(block: &str) -> Vec<String> {
    header_all(block, "link")
        .into_iter()
        .filter_map(|value| parse_link_header(&value))
        .collect()
}

fn parse_link_header(value: &str) -> Option<String> {
    let (url_part, params) = value.split_once(';')?;
    let url = url_part.trim().trim_start_matches('<').trim_end_matches('>');
    let is_rel_up = params
        .split(';')
        .any(|param| param.trim().trim_matches('"') == "rel=up" || param.trim() == "rel=\"up\"");
    if is_rel_up {
        Some(url.to_string())
    } else {
        None
    }
}
