//! share-gate: share-link access server for the remodeling CRM.
//!
//! Issues share links for estimates, invoices, projects and documents, trades
//! claimed links for short-lived share tokens, and guards the share routes so
//! only share-scoped tokens get through.
//!
//! Usage:
//!   share-gate serve                                  # Default port 7171
//!   share-gate serve --port 8080 --cors               # Custom port, browser frontend
//!   share-gate mint --workspace W1 --target est-1     # Print a share token
//!   share-gate mint --workspace W1 --user u-1         # Print a member session token
//!   share-gate inspect <token>                        # Run the share guard on a token

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use serde_json::{Value, json};
use share_server::{ShareDecision, ShareGuard, ShareServer};
use share_services::token::{MAX_TOKEN_TTL_SECS, SHARE_TOKEN_TTL_SECS};
use share_services::{HmacTokenService, ShareGrant, ShareLinkConfig};
use share_transport::{TransportConfig, TransportServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "share-gate", about = "share-gate: share-link access server")]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.share-gate/logs/share-gate.log if no path given)
    #[arg(long, global = true, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (0 for OS-assigned)
        #[arg(long, default_value = "7171")]
        port: u16,

        /// Hostname to bind to
        #[arg(long, default_value = "127.0.0.1")]
        hostname: String,

        /// Token signing secret (random per process if not provided)
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: Option<String>,

        /// Frontend base URL used when building share URLs
        #[arg(long, env = "FRONTEND_URL", default_value = "")]
        frontend_url: String,

        /// Share token lifetime in seconds
        #[arg(long, default_value_t = SHARE_TOKEN_TTL_SECS, value_parser = ttl_secs_parser())]
        share_ttl_secs: i64,

        /// Enable permissive CORS
        #[arg(long)]
        cors: bool,
    },

    /// Mint a signed token
    Mint {
        /// Token signing secret
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Workspace the token belongs to
        #[arg(long)]
        workspace: String,

        /// Shared resource id
        #[arg(long)]
        target: Option<String>,

        /// Comma-separated permissions
        #[arg(long, value_delimiter = ',')]
        perms: Vec<String>,

        /// Token scope (share tokens only)
        #[arg(long, default_value = "share")]
        scope: String,

        /// Lifetime in seconds
        #[arg(long, default_value_t = SHARE_TOKEN_TTL_SECS, value_parser = ttl_secs_parser())]
        ttl_secs: i64,

        /// Mint a member session token for this user instead of a share token
        #[arg(long)]
        user: Option<String>,

        /// Member role for session tokens
        #[arg(long, requires = "user")]
        role: Option<String>,
    },

    /// Run the share guard against a token and print the decision
    Inspect {
        /// Token signing secret
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Bearer token to inspect
        token: String,
    },
}

fn ttl_secs_parser() -> clap::builder::RangedI64ValueParser<i64> {
    clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECS)
}

fn init_tracing(verbose: bool, log_file: Option<&str>) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(log_file_arg) = log_file {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        let log_path = if log_file_arg == "DEFAULT" {
            PathBuf::from(&home).join(".share-gate/logs/share-gate.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn token_service(secret: String) -> Result<Arc<HmacTokenService>> {
    let tokens = HmacTokenService::new(SecretString::from(secret)).context("Invalid signing secret")?;
    Ok(Arc::new(tokens))
}

/// Run `token` through the share guard exactly as an `Authorization: Bearer` header.
fn inspect_report(guard: &ShareGuard<HmacTokenService>, token: &str) -> Result<Value> {
    let value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
        .context("Token contains characters not allowed in a header")?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);

    Ok(match guard.evaluate(&headers) {
        ShareDecision::Admitted(claims) => json!({ "decision": "admit", "claims": claims }),
        ShareDecision::Denied(reason) => json!({ "decision": "deny", "reason": reason.to_string() }),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Command::Serve {
            port,
            hostname,
            secret,
            frontend_url,
            share_ttl_secs,
            cors,
        } => serve(port, hostname, secret, frontend_url, share_ttl_secs, cors, cli.verbose).await,
        Command::Mint {
            secret,
            workspace,
            target,
            perms,
            scope,
            ttl_secs,
            user,
            role,
        } => {
            let tokens = token_service(secret)?;
            let ttl = chrono::Duration::seconds(ttl_secs);
            let token = match user {
                Some(user) => tokens.mint_session(&user, &workspace, role.as_deref(), ttl)?,
                None => {
                    let mut grant = ShareGrant::new(workspace).with_perms(perms).with_scope(scope);
                    grant.target_id = target;
                    tokens.mint_share(grant, ttl)?
                }
            };
            println!("{token}");
            Ok(())
        }
        Command::Inspect { secret, token } => {
            let guard = ShareGuard::new(token_service(secret)?);
            let report = inspect_report(&guard, &token)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(
    port: u16,
    hostname: String,
    secret: Option<String>,
    frontend_url: String,
    share_ttl_secs: i64,
    cors: bool,
    verbose: bool,
) -> Result<()> {
    let secret_was_explicit = secret.is_some();
    let secret = secret.unwrap_or_else(|| {
        use rand::Rng;
        let bytes: [u8; 32] = rand::rng().random();
        hex::encode(bytes)
    });
    if !secret_was_explicit {
        warn!("No JWT_SECRET configured; tokens will not survive a restart");
    }

    let tokens = token_service(secret)?;
    let server = ShareServer::in_memory(
        tokens,
        ShareLinkConfig {
            frontend_url: frontend_url.clone(),
            share_token_ttl: chrono::Duration::seconds(share_ttl_secs),
        },
    );

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                        share-gate                            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Port:       {port}");
    println!("  Binding:    {hostname}");
    println!(
        "  Frontend:   {}",
        if frontend_url.is_empty() { "(relative share URLs)" } else { &frontend_url }
    );
    println!("  Share TTL:  {share_ttl_secs}s");
    if secret_was_explicit {
        println!("  Secret:     configured");
    } else {
        println!("  Secret:     generated for this process");
    }
    println!();

    let transport_config = TransportConfig {
        port,
        hostname: hostname.clone(),
        enable_cors: cors,
        verbose_logging: verbose,
    };

    let mut transport = TransportServer::start(transport_config, server)
        .await
        .map_err(|e| anyhow!("Failed to start transport: {e}"))?;

    println!("────────────────────────────────────────────────────────────────");
    println!();
    println!("  Server running on http://{hostname}:{}", transport.port());
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;

    println!();
    println!("  Shutting down...");
    transport.stop().await;
    info!("share-gate stopped");
    println!("  Server stopped.");
    Ok(())
}
