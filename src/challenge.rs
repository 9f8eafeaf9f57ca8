// The HTTP-01 challenge provider: local self-check plus prepare/cleanup of
// the well-known token file the CA validates against.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::http::HttpClient;

/// A single challenge offered by the CA inside an authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub challenge_type: String,
    pub uri: String,
    pub token: String,
    #[serde(default)]
    pub status: Option<String>,
}

// Self-check, prepare, and cleanup for one challenge type. No back-reference
// to the owning session, just the narrow collaborators each step needs.
pub trait ChallengeProvider: Send + Sync {
    // The `type` attribute this provider acts on, e.g. `"http-01"`.
    fn challenge_type(&self) -> &'static str;

    // Confirms the operator's own web server serves content correctly at
    // the well-known path, before any CA interaction is attempted.
    fn validate_domain_control(&self, domain: &str) -> Result<()>;

    // Publishes the key authorization for `challenge.token` under `domain`'s
    // well-known path and confirms it is fetchable.
    fn prepare_challenge(&self, domain: &str, challenge: &Challenge, key_authorization: &str) -> Result<()>;

    // Removes the token file. Idempotent and best-effort: failures here are
    // logged by callers, never escalated into a fatal error.
    fn cleanup_challenge(&self, domain: &str, challenge: &Challenge);
}

// RAII guard for a challenge token file. Writes on construction, removes on
// drop, so cleanup happens on panics and early returns too.
struct ChallengeFile {
    path: PathBuf,
}

impl ChallengeFile {
    fn create(path: PathBuf, content: &str, mode: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o755))?;
        }
        fs::write(&path, content)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
        Ok(ChallengeFile { path })
    }
}

impl Drop for ChallengeFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

// HTTP-01 implementation. Depends only on a well-known-path resolver, an
// HTTP client for the self-check/validation fetch, and a file mode. No
// back-reference to the owning session.
pub struct Http01Provider {
    http: Arc<dyn HttpClient>,
    file_perm: u32,
    well_known_path: Box<dyn Fn(&str) -> PathBuf + Send + Sync>,
}

impl Http01Provider {
    pub fn new(
        http: Arc<dyn HttpClient>,
        file_perm: u32,
        well_known_path: impl Fn(&str) -> PathBuf + Send + Sync + 'static,
    ) -> Self {
        Http01Provider {
            http,
            file_perm,
            well_known_path: Box::new(well_known_path),
        }
    }

    fn well_known_dir(&self, domain: &str) -> PathBuf {
        (self.well_known_path)(domain)
    }
}

impl ChallengeProvider for Http01Provider {
    fn challenge_type(&self) -> &'static str {
        "http-01"
    }

    fn validate_domain_control(&self, domain: &str) -> Result<()> {
        let dir = self.well_known_dir(domain);
        let _file = ChallengeFile::create(dir.join("local_check.txt"), "OK", self.file_perm)
            .map_err(|e| Error::Challenge {
                domain: domain.to_string(),
                reason: format!("could not write local self-check file: {e}"),
            })?;

        let url = format!("http://{domain}/.well-known/acme-challenge/local_check.txt");
        let resp = self.http.get(&url).map_err(|e| Error::Challenge {
            domain: domain.to_string(),
            reason: format!("self-check fetch failed: {e}"),
        })?;

        if resp.status != 200 || resp.body_str() != "OK" {
            return Err(Error::Challenge {
                domain: domain.to_string(),
                reason: format!(
                    "self-check returned status {} body {:?}, expected 200 \"OK\"",
                    resp.status,
                    resp.body_str()
                ),
            });
        }
        Ok(())
    }

    fn prepare_challenge(&self, domain: &str, challenge: &Challenge, key_authorization: &str) -> Result<()> {
        let dir = self.well_known_dir(domain);
        let file = ChallengeFile::create(dir.join(&challenge.token), key_authorization, self.file_perm)
            .map_err(|e| Error::Challenge {
                domain: domain.to_string(),
                reason: format!("could not write challenge token file: {e}"),
            })?;

        let url = format!("http://{domain}/.well-known/acme-challenge/{}", challenge.token);
        let resp = self.http.get(&url).map_err(|e| Error::Challenge {
            domain: domain.to_string(),
            reason: format!("challenge token fetch failed: {e}"),
        })?;

        if resp.body_str() != key_authorization {
            return Err(Error::Challenge {
                domain: domain.to_string(),
                reason: "challenge token served an unexpected body".to_string(),
            });
        }

        // The file must stay in place until the CA fetches it. The session
        // calls cleanup_challenge explicitly, so forget the guard here.
        std::mem::forget(file);
        Ok(())
    }

    fn cleanup_challenge(&self, domain: &str, challenge: &Challenge) {
        let path = self.well_known_dir(domain).join(&challenge.token);
        let _ = fs::remove_file(path);
    }
}

// Selects the first challenge in `challenges` whose type matches `provider`.
// Ties break in favor of the first match in the CA's own ordering.
pub fn select_challenge<'a>(
    challenges: &'a [Challenge],
    provider: &dyn ChallengeProvider,
) -> Option<&'a Challenge> {
    challenges
        .iter()
        .find(|c| c.challenge_type == provider.challenge_type())
}
