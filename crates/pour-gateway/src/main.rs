//! # pour-gateway
//!
//! Gateway binary: loads settings, wires the auth gate into the socket
//! server and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pour_auth::{AuthGate, HttpUserDirectory, JwtManager, StaticUserDirectory, UserDirectory};
use pour_core::logging::{LogFormat, init_subscriber};
use pour_core::{Role, UserId};
use pour_server::config::ServerConfig;
use pour_server::metrics::install_recorder;
use pour_server::server::GatewayServer;
use pour_settings::{AuthSettings, DirectoryKind, DirectorySettings, PourSettings};

/// Real-time presence and room-broadcast gateway.
#[derive(Parser, Debug)]
#[command(name = "pour-gateway", about = "Pour real-time gateway")]
struct Cli {
    /// Settings file (defaults to `~/.pour/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter, e.g. `info,pour_server=debug` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a signed token for local testing.
    IssueToken {
        /// User id to put in the token.
        #[arg(long)]
        user: String,
        /// Role hint carried in the token.
        #[arg(long, default_value = "customer")]
        role: Role,
        /// Lifetime in seconds.
        #[arg(long, default_value = "3600")]
        ttl: i64,
    },
}

fn load(cli: &Cli) -> Result<PourSettings> {
    let path = cli.config.clone().unwrap_or_else(pour_settings::settings_path);
    let mut settings = pour_settings::load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    if let Some(host) = &cli.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    settings.validate().context("invalid settings")?;
    Ok(settings)
}

fn build_verifier(auth: &AuthSettings) -> JwtManager {
    let mut jwt = JwtManager::new(&auth.jwt_secret).with_leeway(auth.leeway_secs);
    if let Some(issuer) = &auth.issuer {
        jwt = jwt.with_issuer(issuer.clone());
    }
    if let Some(audience) = &auth.audience {
        jwt = jwt.with_audience(audience.clone());
    }
    jwt
}

fn build_directory(dir: &DirectorySettings) -> Result<Arc<dyn UserDirectory>> {
    match dir.kind {
        DirectoryKind::Static => {
            let directory = match dir.users_file.as_deref() {
                Some(file) => StaticUserDirectory::from_file(Path::new(file))
                    .with_context(|| format!("failed to load users from {file}"))?,
                None => {
                    tracing::warn!("static directory with no users file; every login will fail");
                    StaticUserDirectory::new()
                }
            };
            tracing::info!(users = directory.len(), "static user directory ready");
            Ok(Arc::new(directory))
        }
        DirectoryKind::Http => {
            let Some(base_url) = dir.base_url.as_deref() else {
                bail!("directory.baseUrl is required for the http directory");
            };
            let directory = HttpUserDirectory::new(
                base_url,
                dir.api_key.clone(),
                Duration::from_millis(dir.timeout_ms),
            )
            .context("failed to build user directory client")?;
            tracing::info!(%base_url, "http user directory ready");
            Ok(Arc::new(directory))
        }
    }
}

async fn serve(settings: &PourSettings) -> Result<()> {
    let metrics = install_recorder().context("failed to install metrics recorder")?;
    let gate = AuthGate::new(
        Arc::new(build_verifier(&settings.auth)),
        build_directory(&settings.directory)?,
    );
    let config = ServerConfig::from_settings(settings);
    if config.internal_api_key.is_none() {
        tracing::info!("no internal API key; /presence and /emit disabled");
    }

    let server = GatewayServer::new(config, gate, metrics);
    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!("pour gateway listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    tracing::info!("shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;
    let format = if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_subscriber(&settings.logging.level, format);

    match cli.command {
        Some(Command::IssueToken { user, role, ttl }) => {
            let token = build_verifier(&settings.auth)
                .issue(&UserId::from(user), role, ttl)
                .context("failed to sign token")?;
            println!("{token}");
            Ok(())
        }
        None => serve(&settings).await,
    }
}
