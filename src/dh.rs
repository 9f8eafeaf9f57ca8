// Diffie-Hellman parameter generation, a narrow external collaborator.
// `CertificateBundle` can optionally carry the result.

use std::fs;
use std::path::Path;

use openssl::dh::Dh;
use openssl::pkey::PKey;

use crate::error::Result;

/// Loads persisted DH parameters, or generates and persists fresh ones.
pub trait DhParamsProvider: Send + Sync {
    fn load_or_generate(&self, path: &Path, bits: u32) -> Result<String>;
}

pub struct OpensslDhParams;

impl DhParamsProvider for OpensslDhParams {
    fn load_or_generate(&self, path: &Path, bits: u32) -> Result<String> {
        if path.exists() {
            return Ok(fs::read_to_string(path)?);
        }
        let params = Dh::generate_params(bits, 2)?;
        let keyed: Dh<_> = params.generate_key()?;
        let pkey = PKey::from_dh(keyed)?;
        let pem = pkey.private_key_to_pem_pkcs8()?;
        let pem_string = String::from_utf8_lossy(&pem).into_owned();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &pem_string)?;
        Ok(pem_string)
    }
}
