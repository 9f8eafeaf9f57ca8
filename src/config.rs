// Typed configuration surface for the ACME engine. Loading configuration
// from a file or the environment remains a thin CLI concern (see bin.rs);
// this module only defines the shape the engine consumes and validates it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// The shipped-but-unconfigured contact list. A deployment that still carries
/// these verbatim has not actually been configured and must be rejected
/// before any network call.
pub const DEFAULT_CONTACTS: &[&str] = &["mailto:cert-admin@example.com", "tel:+12025551212"];

const LETS_ENCRYPT_CA: &str = "https://acme-v01.api.letsencrypt.org";
const LETS_ENCRYPT_STAGING_CA: &str = "https://acme-staging.api.letsencrypt.org";

/// The Distinguished Name fields used when building a domain CSR.
///
/// `country` is required (the CSR subject must include at least a country);
/// the rest are optional and simply omitted from the subject when absent.
#[derive(Debug, Clone, Default)]
pub struct DistinguishedName {
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
}

/// Every option the engine recognizes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Switches to the staging CA URL when set.
    pub debug: bool,
    /// Production CA base URL (directory lives at `<ca>/directory`).
    pub ca: String,
    /// Staging CA base URL, used when `debug` is set.
    pub ca_testing: String,
    /// Subscriber Agreement URL included in registration, if any.
    pub agreement: Option<String>,
    /// DN fields used for the CSR subject.
    pub cert_distinguished_name: DistinguishedName,
    /// Non-empty, non-default contact URIs (`mailto:`/`tel:`).
    pub cert_account_contact: Vec<String>,
    /// Requested key types; currently only `"RSA"` is supported.
    pub cert_key_types: Vec<String>,
    /// RSA modulus size in bits for both the account and domain keys.
    pub cert_rsa_key_bits: u32,
    /// Digest algorithm name, informational (engine always signs RS256 / SHA-256).
    pub cert_digest_alg: String,
    /// Absolute path, or relative to `account_dir`; `None` disables DH params.
    pub dh_param_file: Option<PathBuf>,
    /// Root of the operator's web server document root.
    pub web_root_dir: PathBuf,
    /// Append the domain name as a path segment under `web_root_dir`.
    pub append_domain: bool,
    /// Append `.well-known/acme-challenge` under the (possibly domain-qualified) root.
    pub append_well_known_path: bool,
    /// Unix file mode applied to challenge token files so the web server can read them.
    pub web_server_file_perm: u32,
    /// Directory holding the persisted account key (`private.key`).
    pub account_dir: PathBuf,
    /// Output directory for issued bundles, by convention.
    pub cert_dir: PathBuf,
    /// Pacing between polling attempts (authorization and certificate polling).
    pub poll_interval: Duration,
    /// Ceiling on the number of polling attempts.
    pub poll_max_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: false,
            ca: LETS_ENCRYPT_CA.to_string(),
            ca_testing: LETS_ENCRYPT_STAGING_CA.to_string(),
            agreement: None,
            cert_distinguished_name: DistinguishedName::default(),
            cert_account_contact: Vec::new(),
            cert_key_types: vec!["RSA".to_string()],
            cert_rsa_key_bits: 2048,
            cert_digest_alg: "sha256".to_string(),
            dh_param_file: None,
            web_root_dir: PathBuf::from("/var/www"),
            append_domain: false,
            append_well_known_path: true,
            web_server_file_perm: 0o644,
            account_dir: PathBuf::from("./account"),
            cert_dir: PathBuf::from("./certs"),
            poll_interval: Duration::from_secs(3),
            poll_max_attempts: 60,
        }
    }
}

impl Config {
    /// The CA base URL the engine should talk to, given `debug`.
    pub fn ca_base_url(&self) -> &str {
        if self.debug {
            &self.ca_testing
        } else {
            &self.ca
        }
    }

    // Validates the configuration and normalizes trailing slashes on the CA
    // and web root paths. Must be called and must succeed before any network
    // call, in particular before account registration.
    pub fn validate(&mut self) -> Result<()> {
        if self.cert_account_contact.is_empty() {
            return Err(Error::Configuration(
                "certAccountContact must not be empty".to_string(),
            ));
        }
        if contacts_are_default(&self.cert_account_contact) {
            return Err(Error::Configuration(
                "certAccountContact still contains the shipped default contacts; configure a real contact before running".to_string(),
            ));
        }
        if self.cert_distinguished_name.country.is_none() {
            return Err(Error::Configuration(
                "certDistinguishedName must include countryName".to_string(),
            ));
        }
        if self.cert_key_types != ["RSA"] {
            return Err(Error::Configuration(format!(
                "unsupported certKeyTypes {:?}; only [\"RSA\"] is implemented",
                self.cert_key_types
            )));
        }
        self.ca = rtrim_slash(&self.ca);
        self.ca_testing = rtrim_slash(&self.ca_testing);
        self.web_root_dir = PathBuf::from(rtrim_slash(&self.web_root_dir.to_string_lossy()));
        Ok(())
    }

    /// Resolves the DH parameter file to an absolute path, relative to
    /// `account_dir` when given as a relative path.
    pub fn resolved_dh_param_file(&self) -> Option<PathBuf> {
        self.dh_param_file.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.account_dir.join(p)
            }
        })
    }
}

fn contacts_are_default(contact: &[String]) -> bool {
    contact.len() == DEFAULT_CONTACTS.len()
        && contact
            .iter()
            .zip(DEFAULT_CONTACTS.iter())
            .all(|(a, b)| a == b)
}

fn rtrim_slash(s: &str) -> String {
    s.trim_end_matches('/').to_string()
}

/// Resolves the well-known challenge directory for `domain` per
/// `append_domain`/`append_well_known_path`.
pub fn well_known_path(config: &Config, domain: &str) -> PathBuf {
    let mut path = config.web_root_dir.clone();
    if config.append_domain {
        path.push(domain);
    }
    if config.append_well_known_path {
        path.push(".well-known");
        path.push("acme-challenge");
    }
    path
}
