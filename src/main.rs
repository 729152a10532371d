//! Threadwatch CLI
//!
//! Command-line interface for watching a thread:
//! - Watch a thread page and render new posts into a local mirror
//! - Show the cursor a page starts from
//! - Generate a default config file
//!
//! # Configuration
//!
//! Settings come from `--config`, or the first of
//! `~/.config/threadwatch/config.toml`, `/etc/threadwatch/config.toml` and
//! `./threadwatch.toml`. `THREADWATCH_*` environment variables override the
//! file, and command-line flags override both. `RUST_LOG` overrides the log
//! level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use threadwatch::config::{generate_default_config, DefaultLoad};
use threadwatch::{
    find_marker, Config, Cursor, LoggingConfig, MarkupMode, Page, PageMirror, Poller, Renderer,
    ThreadClient,
};

#[derive(Parser)]
#[command(name = "threadwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Watch a discussion thread and render new posts as they arrive")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll a thread and render new posts
    Watch {
        /// Thread page URL (default: watch.url from the config)
        url: Option<String>,
        /// Wait between poll cycles in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,
        /// Mirror the rendered page to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Render post fields as plain text instead of markup
        #[arg(long)]
        escape: bool,
        /// Run a single poll cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Show the cursor a thread page starts from
    Cursor {
        /// Thread page URL (default: watch.url from the config)
        url: Option<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_deref());
    }

    let (mut config, loaded) = match &cli.config {
        Some(path) => (Config::load_with_env(path)?, None),
        None => {
            let loaded = Config::load_default();
            (loaded.config.clone(), Some(loaded))
        }
    };

    match cli.command {
        Commands::Watch {
            url,
            interval_ms,
            output,
            escape,
            once,
        } => {
            if let Some(url) = url {
                config.watch.url = Some(url);
            }
            if let Some(ms) = interval_ms {
                config.watch.interval_ms = ms;
            }
            if let Some(path) = output {
                config.output.file = Some(path);
            }
            if escape {
                config.render.markup = MarkupMode::Escaped;
            }
            config.validate()?;
            init_tracing(&config.logging);
            report_config(cli.config.as_deref(), loaded.as_ref());

            run_watch(config, once).await
        }
        Commands::Cursor { url } => {
            if let Some(url) = url {
                config.watch.url = Some(url);
            }
            config.validate()?;
            init_tracing(&config.logging);
            report_config(cli.config.as_deref(), loaded.as_ref());

            show_cursor(&config).await
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("threadwatch={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn report_config(explicit: Option<&std::path::Path>, loaded: Option<&DefaultLoad>) {
    match (explicit, loaded) {
        (Some(path), _) => tracing::info!("Loaded config from {:?}", path),
        (None, Some(loaded)) => loaded.report(),
        (None, None) => {}
    }
}

fn thread_url(config: &Config) -> anyhow::Result<String> {
    config
        .watch
        .url
        .clone()
        .context("no thread URL given (pass one or set THREADWATCH_URL)")
}

async fn run_watch(config: Config, once: bool) -> anyhow::Result<()> {
    let url = thread_url(&config)?;
    tracing::info!("Threadwatch v{}", env!("CARGO_PKG_VERSION"));

    let client = ThreadClient::new(config.client_config(&url))?;

    tracing::info!(url = %url, "Fetching thread page");
    let html = client
        .fetch_page()
        .await
        .with_context(|| format!("failed to fetch thread page {}", url))?;

    let page = Page::parse(html, &config.render.container_id)?;
    let cursor = page.initial_cursor();
    tracing::info!(
        cursor = %cursor,
        container = page.container_id(),
        markup = %config.render.markup,
        "Thread page loaded"
    );

    let mirror = PageMirror::new(page, config.output.file.clone());
    if let Some(path) = mirror.output() {
        tracing::info!(path = ?path, "Mirroring page");
    }
    mirror.write()?;

    let mut poller = Poller::new(
        client,
        mirror,
        Renderer::new(config.render_config()),
        cursor,
        config.poller_config(),
    );

    if once {
        let report = poller.poll_cycle().await?;
        tracing::info!(
            received = report.received,
            rendered = report.rendered,
            cursor = %report.cursor,
            "Poll cycle complete"
        );
        let mirror = poller.into_sink();
        if mirror.output().is_none() {
            println!("{}", mirror.page().html());
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let stats = poller.run(shutdown_rx).await;
    tracing::info!(
        "Threadwatch stopped after {} cycles, {} posts rendered",
        stats.cycles,
        stats.rendered
    );

    Ok(())
}

async fn show_cursor(config: &Config) -> anyhow::Result<()> {
    let url = thread_url(config)?;
    let client = ThreadClient::new(config.client_config(&url))?;
    let html = client
        .fetch_page()
        .await
        .with_context(|| format!("failed to fetch thread page {}", url))?;

    match find_marker(&html) {
        Ok(text) => {
            let cursor = Cursor::from_marker(text);
            println!("cursor: {}", cursor);
            println!("first poll: {}", client.poll_url(&cursor));
        }
        Err(e) => {
            println!("marker missing: {}", e);
            println!("first poll: {}", client.poll_url(&Cursor::Unset));
        }
    }

    Ok(())
}

fn write_default_config(output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Config written to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping poller");
}
