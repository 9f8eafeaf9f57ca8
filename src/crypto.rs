// Crypto primitives: RSA keygen, JWK encoding, base64url, SHA-256,
// RS256 signing, and CSR assembly with a SAN extension.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::{Padding, Rsa};
use openssl::sign::Signer;
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509Req, X509ReqBuilder};
use serde_json::{json, Value};

use crate::config::DistinguishedName;
use crate::error::Result;

/// base64url (no padding) encoding.
pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// base64url (no padding) decoding.
pub fn b64url_decode(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| crate::error::Error::Configuration(format!("invalid base64url input: {e}")))
}

/// Generates a fresh RSA private key of `bits` modulus size.
pub fn generate_rsa_key(bits: u32) -> Result<PKey<Private>> {
    let rsa = Rsa::generate(bits)?;
    Ok(PKey::from_rsa(rsa)?)
}

/// Persists `key` as `<dir>/private.key`, creating `dir` (owner-only, `0700`)
/// if it doesn't exist yet. Returns the path written.
pub fn persist_private_key(key: &PKey<Private>, dir: &Path) -> Result<std::path::PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    let path = dir.join("private.key");
    let pem = key.private_key_to_pem_pkcs8()?;
    fs::write(&path, &pem)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    Ok(path)
}

/// Loads a private key previously written by [`persist_private_key`], if present.
pub fn load_private_key(dir: &Path) -> Result<Option<PKey<Private>>> {
    let path = dir.join("private.key");
    if !path.exists() {
        return Ok(None);
    }
    let pem = fs::read(path)?;
    Ok(Some(PKey::private_key_from_pem(&pem)?))
}

// The JWK `n`/`e` parameters of `key`. `serde_json::Value::Object` is
// backed by a `BTreeMap`, so this already serializes with keys in
// canonical alphabetical order (e, kty, n).
pub fn jwk(key: &PKey<Private>) -> Result<Value> {
    let rsa = key.rsa()?;
    let n = b64url_encode(&rsa.n().to_vec());
    let e = b64url_encode(&rsa.e().to_vec());
    Ok(json!({ "kty": "RSA", "n": n, "e": e }))
}

/// Deterministic (whitespace-free, stable key order) JSON serialization,
/// relying on `serde_json::Value`'s default alphabetical object ordering.
pub fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// The key-authorization string for a challenge `token` and the account key:
/// `token + "." + base64url(SHA-256(canonical_jwk_json))`.
pub fn key_authorization(token: &str, account_key: &PKey<Private>) -> Result<String> {
    let jwk_value = jwk(account_key)?;
    let canonical = canonical_json(&jwk_value)?;
    let digest = hash(MessageDigest::sha256(), canonical.as_bytes())?;
    Ok(format!("{token}.{}", b64url_encode(&digest)))
}

/// Signs `protected64 + "." + payload64` with RSA-PKCS1v1.5/SHA-256.
pub fn sign_rs256(account_key: &PKey<Private>, protected64: &str, payload64: &str) -> Result<Vec<u8>> {
    let mut signer = Signer::new(MessageDigest::sha256(), account_key)?;
    signer.set_rsa_padding(Padding::PKCS1)?;
    let signing_input = format!("{protected64}.{payload64}");
    signer.update(signing_input.as_bytes())?;
    Ok(signer.sign_to_vec()?)
}

// Builds a PKCS#10 CSR for `domains` (domains[0] is the common name, every
// domain is a DNS: SAN entry), signed by a fresh domain key.
pub fn build_csr(
    domains: &[String],
    dn: &DistinguishedName,
    bits: u32,
) -> Result<(PKey<Private>, X509Req)> {
    assert!(!domains.is_empty(), "build_csr requires at least one domain");

    let domain_key = generate_rsa_key(bits)?;

    let mut builder = X509ReqBuilder::new()?;
    builder.set_pubkey(&domain_key)?;

    let mut name_builder = X509NameBuilder::new()?;
    if let Some(country) = &dn.country {
        name_builder.append_entry_by_nid(Nid::COUNTRYNAME, country)?;
    }
    if let Some(state) = &dn.state {
        name_builder.append_entry_by_nid(Nid::STATEORPROVINCENAME, state)?;
    }
    if let Some(locality) = &dn.locality {
        name_builder.append_entry_by_nid(Nid::LOCALITYNAME, locality)?;
    }
    if let Some(org) = &dn.organization {
        name_builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, org)?;
    }
    if let Some(ou) = &dn.organizational_unit {
        name_builder.append_entry_by_nid(Nid::ORGANIZATIONALUNITNAME, ou)?;
    }
    name_builder.append_entry_by_nid(Nid::COMMONNAME, &domains[0])?;
    let name = name_builder.build();
    builder.set_subject_name(&name)?;

    let mut san = SubjectAlternativeName::new();
    for domain in domains {
        san.dns(domain);
    }
    let san_extension = san.build(&builder.x509v3_context(None))?;
    let mut extensions = Stack::new()?;
    extensions.push(san_extension)?;
    builder.add_extensions(&extensions)?;

    builder.sign(&domain_key, MessageDigest::sha256())?;

    Ok((domain_key, builder.build()))
}

/// PEM-armors `der` as a certificate, wrapping the base64 body at 64 columns
/// (certificates must round-trip through standard PEM tooling).
pub fn der_to_pem_certificate(der: &[u8]) -> String {
    pem_armor(der, "CERTIFICATE")
}

fn pem_armor(der: &[u8], label: &str) -> String {
    use base64::engine::general_purpose::STANDARD;
    let encoded = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in encoded.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 output is ascii"));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}
