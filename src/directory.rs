// AcmeDirectory: the CA base URL and its derived legacy endpoint paths.
// Bound once at session construction.

// Every signed request carries a full jwk and a resource discriminator in
// its payload rather than addressing a per-resource URL, so the paths here
// are fixed rather than read back from a directory document.
#[derive(Debug, Clone)]
pub struct AcmeDirectory {
    pub base_url: String,
    pub new_reg: String,
    pub new_authz: String,
    pub new_cert: String,
}

impl AcmeDirectory {
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        AcmeDirectory {
            new_reg: format!("{base}/acme/new-reg"),
            new_authz: format!("{base}/acme/new-authz"),
            new_cert: format!("{base}/acme/new-cert"),
            base_url: base,
        }
    }
}
