//! itpd — ITP image server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use itp_core::config::{ItpConfig, ServerConfig};
use itp_services::{ResourceRoot, SequenceClock, Server};

fn print_usage() {
    println!("Usage: itpd [--port <port>] [--bind <addr>] [--root <dir>]");
    println!();
    println!("Options:");
    println!("  --port <port>   TCP port to listen on");
    println!("  --bind <addr>   Address to listen on");
    println!("  --root <dir>    Directory holding <name>.<EXT> images");
}

/// Apply command-line overrides on top of the loaded config.
fn apply_args(server: &mut ServerConfig, args: &[String]) -> Result<bool> {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                server.port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--bind" => {
                i += 1;
                server.bind = args.get(i).context("--bind requires a value")?.clone();
            }
            "--root" => {
                i += 1;
                server.resource_root = PathBuf::from(args.get(i).context("--root requires a value")?);
            }
            "help" | "--help" | "-h" => return Ok(false),
            other => anyhow::bail!("unknown argument: {other}"),
        }
        i += 1;
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = ItpConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = ItpConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        ItpConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !apply_args(&mut config.server, &args)? {
        print_usage();
        return Ok(());
    }
    let server_config = config.server;

    if !server_config.resource_root.is_dir() {
        tracing::warn!(
            root = %server_config.resource_root.display(),
            "resource root does not exist, every request will be answered not found"
        );
    }

    let clock = Arc::new(SequenceClock::new(Duration::from_millis(server_config.tick_ms)));
    clock.start();

    let server = Server::bind(
        (server_config.bind.as_str(), server_config.port),
        ResourceRoot::new(server_config.resource_root.clone()),
        clock.clone(),
        server_config.max_name_bytes,
    )
    .await?;

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let result = server.run(shutdown_tx.subscribe()).await;

    clock.stop();
    tracing::info!(ticks = clock.current_timestamp(), "itpd stopped");
    result
}
