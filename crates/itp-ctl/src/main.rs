//! itp-ctl — fetch one image from an ITP server and open it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use itp_core::config::{ClientConfig, ItpConfig};
use itp_services::{ClientError, ClientOptions, ClientSession, NoViewer, SystemViewer, Viewer};

// ── Arguments ─────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Command {
    Fetch(String),
    Help,
}

/// Apply flags on top of the loaded config and return what to do.
fn parse_args(client: &mut ClientConfig, args: &[String]) -> Result<Command> {
    let mut file = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                client.host = args.get(i).context("--host requires a value")?.clone();
            }
            "--port" => {
                i += 1;
                client.port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--version" => {
                i += 1;
                client.version = args
                    .get(i)
                    .context("--version requires a value")?
                    .parse()
                    .context("--version must be a number")?;
            }
            "--dir" => {
                i += 1;
                client.download_dir = PathBuf::from(args.get(i).context("--dir requires a value")?);
            }
            "--no-open" => client.open_viewer = false,
            "help" | "--help" | "-h" => return Ok(Command::Help),
            flag if flag.starts_with("--") => anyhow::bail!("unknown option: {flag}"),
            name => {
                if file.replace(name.to_string()).is_some() {
                    anyhow::bail!("only one file can be fetched per invocation");
                }
            }
        }
        i += 1;
    }
    Ok(file.map(Command::Fetch).unwrap_or(Command::Help))
}

fn print_usage() {
    println!("Usage: itp-ctl [options] <file>");
    println!();
    println!("Fetches <file> (e.g. photo.png) from an ITP server, saves it and");
    println!("opens it with the default image viewer.");
    println!();
    println!("Options:");
    println!("  --host <host>     Server host");
    println!("  --port <port>     Server port");
    println!("  --version <n>     Protocol version to send (0-15)");
    println!("  --dir <dir>       Directory to save the image in");
    println!("  --no-open         Save only, do not launch a viewer");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = ItpConfig::load().unwrap_or_else(|e| {
        eprintln!("warning: {e}, using defaults");
        ItpConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    let file = match parse_args(&mut config.client, &args)? {
        Command::Fetch(file) => file,
        Command::Help => {
            print_usage();
            return Ok(());
        }
    };

    let viewer: Arc<dyn Viewer> = if config.client.open_viewer {
        Arc::new(SystemViewer)
    } else {
        Arc::new(NoViewer)
    };
    let mut session = ClientSession::new(ClientOptions::from(&config.client), viewer);

    match session.fetch(&file).await {
        Ok(fetched) => {
            println!(
                "Saved {} ({} bytes, sequence {})",
                fetched.path.display(),
                fetched.size,
                fetched.sequence
            );
            Ok(())
        }
        Err(ClientError::NotFound { name }) => {
            eprintln!("Cannot display {name}: not found on server");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Cannot display {file}: {e}");
            std::process::exit(1);
        }
    }
}
