//! livereload demo - a tiny HTTP server that restarts itself on change.
//!
//! Usage:
//!   livereload-demo                          # serve on 0.0.0.0:8000
//!   livereload-demo --watch src              # also restart on edits under src/
//!   livereload-demo --exclude /usr/ --port 9000
//!
//! Rebuild the binary (`cargo build`) while it runs and the server restarts
//! into the new build.

use anyhow::{Context, Result};
use clap::Parser;
use livereload::{LiveReloader, ReloadMode, WatcherConfig};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "livereload-demo")]
#[command(about = "Demo server for livereload", long_about = None)]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Seconds between change checks
    #[arg(short, long)]
    interval: Option<f64>,

    /// Extra file or directory to watch (repeatable)
    #[arg(short, long = "watch")]
    watch: Vec<PathBuf>,

    /// Ignore paths containing this substring (repeatable)
    #[arg(short, long = "exclude")]
    exclude: Vec<String>,

    /// Load watcher settings from a TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Spawn a new process and exit instead of exec-ing in place
    #[arg(long)]
    spawn: bool,

    /// Wake early on filesystem events
    #[arg(long)]
    events: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => WatcherConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WatcherConfig::load()?,
    };

    if let Some(interval) = cli.interval {
        config = config.with_poll_interval_secs(interval);
    }
    for path in cli.watch {
        config = config.with_extra_path(path);
    }
    for pattern in cli.exclude {
        config = config.with_exclude_pattern(pattern);
    }
    if cli.spawn {
        config = config.with_reload_mode(ReloadMode::SpawnExit);
    }
    if cli.events {
        config = config.with_fs_events(true);
    }

    // Start watching before serving, so edits during startup are caught too.
    let reloader = LiveReloader::new(config)?;
    reloader.start_watcher_task()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(&cli.host, cli.port))
}

async fn serve(host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding {}:{}", host, port))?;
    info!(host, port, pid = std::process::id(), "demo server listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection");
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream).await {
                            debug!(error = %e, "client handler error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept error"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("demo server shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_client(mut stream: TcpStream) -> Result<()> {
    let mut buf = [0u8; 1024];
    let _ = stream.read(&mut buf).await?;

    let body = "hello\n";
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
