// An ACME protocol engine: JWS-signed request/response flow against a
// Certificate Authority, together with HTTP-01 challenge orchestration.
// Most callers want `generate_certificate_for_domain`; `AcmeSession` is the
// lower-level state machine for callers that want to supply their own
// HttpClient, LoggerSink, or ChallengeProvider.

pub mod account;
pub mod challenge;
pub mod config;
pub mod crypto;
pub mod dh;
pub mod directory;
pub mod error;
pub mod http;
pub mod logging;
pub mod nonce;
pub mod session;
pub mod signing;

pub use config::{Config, DistinguishedName};
pub use error::{Error, Result};
pub use session::{AcmeSession, CertificateBundle};

use std::sync::Arc;

use challenge::{ChallengeProvider, Http01Provider};
use config::well_known_path;
use dh::OpensslDhParams;
use http::{HttpClient, ReqwestHttpClient};
use logging::DefaultLoggerSink;

// Builds the default collaborators (a real reqwest HTTP client, the HTTP-01
// challenge provider rooted at config.web_root_dir, and the log-facade
// logger sink), then registers the account and issues a certificate for
// `domains`. Callers that need a fake CA or an alternate challenge type
// should construct an AcmeSession directly instead.
pub fn generate_certificate_for_domain(
    config: Config,
    domains: &[String],
) -> Result<CertificateBundle> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);

    let provider_config = config.clone();
    let challenge_provider: Arc<dyn ChallengeProvider> = Arc::new(Http01Provider::new(
        http.clone(),
        config.web_server_file_perm,
        move |domain: &str| well_known_path(&provider_config, domain),
    ));

    let logger = Arc::new(DefaultLoggerSink);
    let dh_provider = Arc::new(OpensslDhParams);

    let mut session = AcmeSession::new(config, http, challenge_provider, logger, dh_provider)?;
    session.register_account()?;
    session.issue(domains)
}
