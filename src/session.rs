// The ACME session: registers the account, drives each domain through
// local self-check, authorization, HTTP-01 challenge, and polling, then
// finalizes with a CSR and assembles the certificate bundle.

use std::sync::Arc;

use openssl::pkey::{PKey, Private};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::account::Account;
use crate::challenge::{select_challenge, Challenge, ChallengeProvider};
use crate::config::Config;
use crate::crypto::{b64url_encode, build_csr, der_to_pem_certificate, key_authorization};
use crate::dh::DhParamsProvider;
use crate::directory::AcmeDirectory;
use crate::error::{Error, Result};
use crate::http::{header, link_rel_up_urls, HttpClient};
use crate::logging::LoggerSink;
use crate::nonce::NonceStore;
use crate::signing::signed_request;

// leaf, chain, key, plus an optional DH parameters PEM.
#[derive(Debug, Clone)]
pub struct CertificateBundle {
    pub leaf: String,
    pub chain: String,
    pub key: String,
    pub dh_params: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    status: String,
    #[serde(default)]
    challenges: Vec<Challenge>,
}

// The protocol state machine. One session drives exactly one run: domains
// are processed strictly in order, never in parallel, and register_account
// may only succeed once per session.
pub struct AcmeSession {
    config: Config,
    directory: AcmeDirectory,
    http: Arc<dyn HttpClient>,
    nonces: NonceStore,
    challenge_provider: Arc<dyn ChallengeProvider>,
    logger: Arc<dyn LoggerSink>,
    dh_provider: Arc<dyn DhParamsProvider>,
    account: Option<Account>,
    registered: bool,
}

impl AcmeSession {
    pub fn new(
        mut config: Config,
        http: Arc<dyn HttpClient>,
        challenge_provider: Arc<dyn ChallengeProvider>,
        logger: Arc<dyn LoggerSink>,
        dh_provider: Arc<dyn DhParamsProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let directory = AcmeDirectory::new(config.ca_base_url());
        Ok(AcmeSession {
            config,
            directory,
            http,
            nonces: NonceStore::new(),
            challenge_provider,
            logger,
            dh_provider,
            account: None,
            registered: false,
        })
    }

    // Registers (or reuses) the account. Must be called exactly once before
    // issue(); a second call is rejected rather than silently re-registering.
    pub fn register_account(&mut self) -> Result<()> {
        if self.registered {
            return Err(Error::State(
                "AcmeSession::register_account called a second time on the same session".to_string(),
            ));
        }

        let account = Account::load_or_create(
            &self.config.account_dir,
            self.config.cert_account_contact.clone(),
            self.config.cert_rsa_key_bits,
        )?;

        let mut payload = serde_json::Map::new();
        payload.insert("resource".to_string(), json!("new-reg"));
        payload.insert("contact".to_string(), json!(account.contact));
        if let Some(agreement) = &self.config.agreement {
            payload.insert("agreement".to_string(), json!(agreement));
        }

        self.logger.info("registering ACME account");
        let resp = signed_request(
            self.http.as_ref(),
            &mut self.nonces,
            &self.directory.base_url,
            &self.directory.new_reg,
            &account.key,
            Some(&Value::Object(payload)),
        )?;

        if resp.status != 201 {
            return Err(Error::UnexpectedStatus {
                status: resp.status,
                url: self.directory.new_reg.clone(),
                body: diagnostic_detail(&resp.body),
            });
        }

        self.logger.notice("account registered");
        self.account = Some(account);
        self.registered = true;
        Ok(())
    }

    // Drives every domain through authorization and returns the issued
    // bundle. register_account must have already succeeded.
    pub fn issue(&mut self, domains: &[String]) -> Result<CertificateBundle> {
        if !self.registered {
            return Err(Error::State(
                "AcmeSession::issue called before register_account".to_string(),
            ));
        }
        if domains.is_empty() {
            return Err(Error::Configuration(
                "at least one domain is required".to_string(),
            ));
        }

        // Local self-check for every domain happens before any CA contact at
        // all: if any domain fails, the session aborts without ever calling
        // new-authz for any domain.
        for domain in domains {
            self.logger.info(&format!("checking local control of {domain}"));
            self.challenge_provider.validate_domain_control(domain)?;
        }

        for domain in domains {
            self.logger.info(&format!("requesting authorization for {domain}"));
            self.authorize_domain(domain)?;
        }

        self.logger.info("finalizing order");
        self.finalize(domains)
    }

    fn account_key(&self) -> PKey<Private> {
        self.account
            .as_ref()
            .expect("register_account must succeed before authorize_domain/finalize")
            .key
            .clone()
    }

    fn authorize_domain(&mut self, domain: &str) -> Result<()> {
        let account_key = self.account_key();

        let payload = json!({
            "resource": "new-authz",
            "identifier": { "type": "dns", "value": domain },
        });
        let resp = signed_request(
            self.http.as_ref(),
            &mut self.nonces,
            &self.directory.base_url,
            &self.directory.new_authz,
            &account_key,
            Some(&payload),
        )?;
        if resp.status != 201 {
            return Err(Error::UnexpectedStatus {
                status: resp.status,
                url: self.directory.new_authz.clone(),
                body: diagnostic_detail(&resp.body),
            });
        }
        let authz_url = header(&resp.headers, "location").ok_or_else(|| Error::Authorization {
            domain: domain.to_string(),
            status: "missing-location".to_string(),
            detail: "new-authz response carried no Location header".to_string(),
        })?;

        let authz_body: AuthorizationResponse = serde_json::from_slice(&resp.body)?;
        let challenge = select_challenge(&authz_body.challenges, self.challenge_provider.as_ref())
            .cloned()
            .ok_or_else(|| Error::Challenge {
                domain: domain.to_string(),
                reason: format!(
                    "CA offered no {} challenge",
                    self.challenge_provider.challenge_type()
                ),
            })?;

        let key_auth = key_authorization(&challenge.token, &account_key)?;

        if let Err(e) = self
            .challenge_provider
            .prepare_challenge(domain, &challenge, &key_auth)
        {
            self.challenge_provider.cleanup_challenge(domain, &challenge);
            return Err(e);
        }

        let outcome = self.submit_and_poll_challenge(domain, &challenge, &key_auth, &authz_url, &account_key);
        self.challenge_provider.cleanup_challenge(domain, &challenge);
        outcome
    }

    fn submit_and_poll_challenge(
        &mut self,
        domain: &str,
        challenge: &Challenge,
        key_auth: &str,
        authz_url: &str,
        account_key: &PKey<Private>,
    ) -> Result<()> {
        let payload = json!({
            "resource": "challenge",
            "type": challenge.challenge_type,
            "keyAuthorization": key_auth,
            "token": challenge.token,
        });
        let resp = signed_request(
            self.http.as_ref(),
            &mut self.nonces,
            &self.directory.base_url,
            &challenge.uri,
            account_key,
            Some(&payload),
        )?;
        if !resp.is_success() {
            return Err(Error::Challenge {
                domain: domain.to_string(),
                reason: format!("challenge submission returned status {}", resp.status),
            });
        }

        let (status, body) = self.poll_authorization(domain, authz_url)?;
        if status != "valid" {
            return Err(Error::Authorization {
                domain: domain.to_string(),
                status,
                detail: diagnostic_detail(&body),
            });
        }
        self.logger.notice(&format!("{domain} authorized"));
        Ok(())
    }

    fn poll_authorization(&self, domain: &str, authz_url: &str) -> Result<(String, Vec<u8>)> {
        for attempt in 0..self.config.poll_max_attempts {
            let resp = self.http.get(authz_url)?;
            let parsed: Value = serde_json::from_slice(&resp.body)?;
            let status = parsed
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("")
                .to_string();
            if status != "pending" {
                return Ok((status, resp.body));
            }
            self.logger
                .debug(&format!("authorization for {domain} still pending (attempt {attempt})"));
            std::thread::sleep(self.config.poll_interval);
        }
        Err(Error::Authorization {
            domain: domain.to_string(),
            status: "pending".to_string(),
            detail: "authorization polling budget exhausted".to_string(),
        })
    }

    fn finalize(&mut self, domains: &[String]) -> Result<CertificateBundle> {
        let account_key = self.account_key();
        let (domain_key, csr) = build_csr(
            domains,
            &self.config.cert_distinguished_name,
            self.config.cert_rsa_key_bits,
        )?;
        let csr_der = csr.to_der()?;
        let payload = json!({
            "resource": "new-cert",
            "csr": b64url_encode(&csr_der),
        });

        let resp = signed_request(
            self.http.as_ref(),
            &mut self.nonces,
            &self.directory.base_url,
            &self.directory.new_cert,
            &account_key,
            Some(&payload),
        )?;
        if resp.status != 201 {
            return Err(Error::Certificate(format!(
                "new-cert returned status {}: {}",
                resp.status,
                diagnostic_detail(&resp.body)
            )));
        }
        let cert_url = header(&resp.headers, "location").ok_or_else(|| {
            Error::Certificate("new-cert response carried no Location header".to_string())
        })?;

        let (der, issuer_urls) = self.poll_certificate(&cert_url)?;
        let leaf = der_to_pem_certificate(&der);

        let mut chain = String::new();
        for issuer_url in issuer_urls {
            let issuer_resp = self.http.get(&issuer_url)?;
            if !issuer_resp.is_success() {
                return Err(Error::Certificate(format!(
                    "failed to fetch issuer certificate at {issuer_url}: status {}",
                    issuer_resp.status
                )));
            }
            chain.push_str(&der_to_pem_certificate(&issuer_resp.body));
        }

        let key_pem = domain_key.private_key_to_pem_pkcs8()?;
        let key = String::from_utf8_lossy(&key_pem).into_owned();

        let dh_params = match self.config.resolved_dh_param_file() {
            Some(path) => Some(
                self.dh_provider
                    .load_or_generate(&path, self.config.cert_rsa_key_bits)?,
            ),
            None => None,
        };

        self.logger.notice("certificate issued");
        Ok(CertificateBundle {
            leaf,
            chain,
            key,
            dh_params,
        })
    }

    fn poll_certificate(&self, cert_url: &str) -> Result<(Vec<u8>, Vec<String>)> {
        for attempt in 0..self.config.poll_max_attempts {
            let resp = self.http.get(cert_url)?;
            match resp.status {
                202 => {
                    self.logger
                        .debug(&format!("certificate still processing (attempt {attempt})"));
                    std::thread::sleep(self.config.poll_interval);
                }
                200 => {
                    let issuer_urls = link_rel_up_urls(&resp.headers);
                    return Ok((resp.body, issuer_urls));
                }
                other => {
                    return Err(Error::Certificate(format!(
                        "unexpected status {other} while polling certificate: {}",
                        diagnostic_detail(&resp.body)
                    )))
                }
            }
        }
        Err(Error::Certificate(
            "certificate polling budget exhausted".to_string(),
        ))
    }
}

// Pulls a human-readable diagnostic out of a CA problem body, falling back
// to the raw bytes when the body isn't the expected error/detail shape.
fn diagnostic_detail(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(detail) = value
            .get("error")
            .and_then(|e| e.get("detail"))
            .and_then(|d| d.as_str())
        {
            return detail.to_string();
        }
        if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLoggerSink;

    #[test]
    fn diagnostic_detail_prefers_error_detail_field() {
        let body = br#"{"status":"invalid","error":{"detail":"dns problem"}}"#;
        assert_eq!(diagnostic_detail(body), "dns problem");
    }

    #[test]
    fn diagnostic_detail_falls_back_to_raw_body() {
        assert_eq!(diagnostic_detail(b"not json"), "not json");
    }

    #[test]
    fn issue_without_registration_is_a_state_error() {
        use crate::challenge::ChallengeProvider;
        use crate::dh::DhParamsProvider;
        use crate::http::RawResponse;
        use std::path::Path;

        struct DummyHttp;
        impl HttpClient for DummyHttp {
            fn get(&self, _url: &str) -> Result<RawResponse> {
                unreachable!()
            }
            fn post(&self, _url: &str, _body: Vec<u8>) -> Result<RawResponse> {
                unreachable!()
            }
        }
        struct DummyChallenge;
        impl ChallengeProvider for DummyChallenge {
            fn challenge_type(&self) -> &'static str {
                "http-01"
            }
            fn validate_domain_control(&self, _domain: &str) -> Result<()> {
                unreachable!()
            }
            fn prepare_challenge(&self, _domain: &str, _c: &Challenge, _k: &str) -> Result<()> {
                unreachable!()
            }
            fn cleanup_challenge(&self, _domain: &str, _c: &Challenge) {}
        }
        struct DummyDh;
        impl DhParamsProvider for DummyDh {
            fn load_or_generate(&self, _path: &Path, _bits: u32) -> Result<String> {
                unreachable!()
            }
        }

        let mut config = Config::default();
        config.cert_account_contact = vec!["mailto:ops@example.org".to_string()];
        config.cert_distinguished_name.country = Some("US".to_string());

        let mut session = AcmeSession::new(
            config,
            Arc::new(DummyHttp),
            Arc::new(DummyChallenge),
            Arc::new(NullLoggerSink),
            Arc::new(DummyDh),
        )
        .unwrap();

        let result = session.issue(&["example.com".to_string()]);
        assert!(matches!(result, Err(Error::State(_))));
    }
}
