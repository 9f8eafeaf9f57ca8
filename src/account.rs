// Account: an RSA key pair persisted under an account directory, with a
// contact list. Created once if the private key file is absent, otherwise
// reused.

use std::path::Path;

use openssl::pkey::{PKey, Private};

use crate::crypto::{generate_rsa_key, load_private_key, persist_private_key};
use crate::error::Result;

pub struct Account {
    pub key: PKey<Private>,
    pub contact: Vec<String>,
}

impl Account {
    /// Loads the account key from `account_dir` if `private.key` already
    /// exists there, otherwise generates and persists a fresh one.
    pub fn load_or_create(account_dir: &Path, contact: Vec<String>, rsa_bits: u32) -> Result<Self> {
        let key = match load_private_key(account_dir)? {
            Some(key) => key,
            None => {
                let key = generate_rsa_key(rsa_bits)?;
                persist_private_key(&key, account_dir)?;
                key
            }
        };
        Ok(Account { key, contact })
    }
}
