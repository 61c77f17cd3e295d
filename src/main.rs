//! mno-sso command line tool
//!
//! Drives the SSO flow outside a web host: builds the IdP redirect URL,
//! consumes a posted SAML response into a stored session, and runs the
//! session validity check against the identity authority.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

use mno_sso::{
    ConfigRegistry, ConsumedResponse, HttpSessionValidator, Identity, Membership,
    RedbSessionStore, Session, SessionStore, DEFAULT_PRESET,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "mno-sso")]
#[command(about = "SAML single sign-on and session revalidation tool")]
struct Args {
    /// Presets file (JSON object mapping preset names to settings)
    #[arg(long, default_value = "/etc/mno-sso/presets.json", env = "MNO_SSO_CONFIG")]
    config: PathBuf,

    /// Session database path
    #[arg(long, default_value = "/var/lib/mno-sso/sessions.redb", env = "MNO_SSO_STORE")]
    store: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, env = "MNO_SSO_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the IdP redirect URL that starts a login
    AuthnUrl {
        #[arg(long, default_value = DEFAULT_PRESET)]
        preset: String,

        /// Extra query parameter appended to the URL (key=value, repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },

    /// Consume a base64 SAMLResponse and store the resulting session
    Consume {
        #[arg(long, default_value = DEFAULT_PRESET)]
        preset: String,

        /// Visitor (host session) identifier
        #[arg(long)]
        visitor: String,

        /// File holding the posted SAMLResponse value
        #[arg(long)]
        response: PathBuf,
    },

    /// Check whether a visitor's session is still valid (exit code 1 if not)
    Check {
        #[arg(long, default_value = DEFAULT_PRESET)]
        preset: String,

        /// Visitor (host session) identifier
        #[arg(long)]
        visitor: String,

        /// Accept visitors that have no session at all
        #[arg(long)]
        if_session: bool,
    },

    /// Remove a visitor's session
    Logout {
        #[arg(long, default_value = DEFAULT_PRESET)]
        preset: String,

        /// Visitor (host session) identifier
        #[arg(long)]
        visitor: String,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn visitor_store(path: &Path, visitor: &str) -> Result<Arc<dyn SessionStore>> {
    let store = RedbSessionStore::open(path)?;
    Ok(Arc::new(store.for_visitor(visitor)))
}

async fn run(args: Args) -> Result<ExitCode> {
    let registry = ConfigRegistry::load(&args.config)?;
    debug!(presets = ?registry.presets(), "Presets registered");

    match args.command {
        Command::AuthnUrl { preset, params } => {
            let config = registry.get(&preset)?;
            let request = mno_sso::AuthnRequest::build(&config)?;
            println!("{}", request.redirect_url(&params)?);
        }

        Command::Consume {
            preset,
            visitor,
            response,
        } => {
            let config = registry.get(&preset)?;
            let encoded = std::fs::read_to_string(&response)
                .with_context(|| format!("Failed to read SAML response: {:?}", response))?;

            let consumed = ConsumedResponse::from_base64(&encoded, config.clock_skew_secs)?;
            let identity = Identity::from_attributes(&consumed.attributes);
            let membership = Membership::from_attributes(&consumed.attributes);

            let store = visitor_store(&args.store, &visitor)?;
            let session = Session::from_identity(&registry, &preset, store, &identity)?;
            session.save()?;

            info!(
                preset = %preset,
                visitor = %visitor,
                uid = %identity.uid,
                group_uid = %membership.group_uid,
                "Session created from SAML response"
            );

            println!(
                "{}",
                json!({
                    "uid": identity.uid,
                    "email": identity.email,
                    "group_uid": membership.group_uid,
                    "role": membership.role,
                    "recheck": mno_sso::timestamp::format_utc(&session.recheck),
                })
            );
        }

        Command::Check {
            preset,
            visitor,
            if_session,
        } => {
            let config = registry.get(&preset)?;
            let store = visitor_store(&args.store, &visitor)?;
            let mut session = Session::load(&registry, &preset, store)?;

            // Presets without SLO carry no session-check endpoint.
            let valid = if config.slo_enabled {
                let validator = HttpSessionValidator::new(&config)?;
                session.is_valid(&validator, if_session).await
            } else {
                true
            };

            println!("{}", if valid { "valid" } else { "invalid" });
            if !valid {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Logout { preset, visitor } => {
            let store = visitor_store(&args.store, &visitor)?;
            let mut session = Session::load(&registry, &preset, store)?;
            let removed = session.destroy()?;
            println!("{}", if removed { "logged out" } else { "no session" });
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
        .with_writer(std::io::stderr)
        .json()
        .init();

    run(args).await
}
