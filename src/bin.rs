use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use acme::config::DistinguishedName;
use acme::{generate_certificate_for_domain, Config};
use clap::Parser;
use flexi_logger::Logger;
use log::{error, info};

/// An ACME client: obtains an X.509 certificate via HTTP-01 domain
/// validation and prints the resulting bundle's output directory.
#[derive(Parser, Debug)]
#[command(version, author = "Siddhant Ray <siddhant.r98@gmail.com>")]
struct Args {
    /// DNS name to request a certificate for; repeat for SAN entries.
    #[arg(short, long = "domain", required = true)]
    domains: Vec<String>,

    /// Account contact URI (`mailto:`/`tel:`); repeat for multiple contacts.
    #[arg(short, long = "contact", required = true)]
    contacts: Vec<String>,

    /// countryName for the CSR's Distinguished Name (required).
    #[arg(long)]
    country: String,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    locality: Option<String>,
    #[arg(long)]
    organization: Option<String>,
    #[arg(long = "organizational-unit")]
    organizational_unit: Option<String>,

    /// Override the production CA base URL.
    #[arg(long)]
    ca: Option<String>,
    /// Use the staging CA.
    #[arg(long)]
    debug: bool,
    /// Subscriber Agreement URL to include in registration.
    #[arg(long)]
    agreement: Option<String>,

    /// Web server document root the operator controls.
    #[arg(long, default_value = "/var/www")]
    web_root_dir: PathBuf,
    /// Append the domain name under `web_root_dir` before `.well-known`.
    #[arg(long)]
    append_domain: bool,
    /// Unix file mode applied to challenge token files.
    #[arg(long, default_value_t = 0o644)]
    web_server_file_perm: u32,

    /// Directory holding the persisted account key.
    #[arg(long, default_value = "./account")]
    account_dir: PathBuf,
    /// Output directory for the issued bundle.
    #[arg(long, default_value = "./certs")]
    cert_dir: PathBuf,

    /// RSA modulus size in bits for the account and domain keys.
    #[arg(long, default_value_t = 2048)]
    rsa_key_bits: u32,

    /// Absolute path, or relative to `account_dir`, for DH parameters; omit to disable.
    #[arg(long)]
    dh_param_file: Option<PathBuf>,

    /// Seconds to wait between authorization/certificate poll attempts.
    #[arg(long, default_value_t = 3)]
    poll_interval_secs: u64,
    /// Maximum number of poll attempts before giving up.
    #[arg(long, default_value_t = 60)]
    poll_max_attempts: usize,

    /// Enables debug-level logging to stdout.
    #[arg(short, long)]
    verbose: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut config = Config {
            debug: args.debug,
            cert_account_contact: args.contacts,
            cert_distinguished_name: DistinguishedName {
                country: Some(args.country),
                state: args.state,
                locality: args.locality,
                organization: args.organization,
                organizational_unit: args.organizational_unit,
            },
            cert_rsa_key_bits: args.rsa_key_bits,
            dh_param_file: args.dh_param_file,
            web_root_dir: args.web_root_dir,
            append_domain: args.append_domain,
            web_server_file_perm: args.web_server_file_perm,
            account_dir: args.account_dir,
            cert_dir: args.cert_dir,
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            poll_max_attempts: args.poll_max_attempts,
            agreement: args.agreement,
            ..Config::default()
        };
        if let Some(ca) = args.ca {
            config.ca = ca;
        }
        config
    }
}

fn run() -> Result<(), acme::Error> {
    let args = Args::parse();

    if args.verbose {
        Logger::try_with_str("debug")
            .map_err(|e| acme::Error::Configuration(format!("logger initialization failed: {e}")))?
            .start()
            .map_err(|e| acme::Error::Configuration(format!("logger start failed: {e}")))?;
    }

    let domains = args.domains.clone();
    let cert_dir = args.cert_dir.clone();
    let config: Config = args.into();

    info!("requesting certificate for {domains:?}");
    let bundle = generate_certificate_for_domain(config, &domains)?;

    let out_dir = cert_dir.join(&domains[0]);
    std::fs::create_dir_all(&out_dir)?;
    std::fs::write(out_dir.join("cert.pem"), &bundle.leaf)?;
    std::fs::write(out_dir.join("chain.pem"), &bundle.chain)?;
    std::fs::write(out_dir.join("privkey.pem"), &bundle.key)?;
    if let Some(dh) = &bundle.dh_params {
        std::fs::write(out_dir.join("dhparam.pem"), dh)?;
    }

    info!("certificate written to {}", out_dir.display());
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
