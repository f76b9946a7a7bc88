// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cattle_teardown::collector::logs::{collect_logs, LogsOptions};
use cattle_teardown::collector::stats::{collect_stats, StatsOptions};
use cattle_teardown::config::{InstallationConfig, RetrySettings};
use cattle_teardown::constants::{collector, DEFAULT_NAMESPACE};
use cattle_teardown::kubernetes::create_client;
use cattle_teardown::teardown::Teardown;

#[derive(Parser, Debug)]
#[command(
    name = "cattle-teardown",
    version,
    about = "Rancher management plane cleanup and diagnostics"
)]
struct Cli {
    /// Managed cluster kubeconfig
    #[arg(short = 'c', long, env = "KUBECONFIG", global = true)]
    kubeconfig: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remove the Rancher management plane and everything it left behind
    Remove {
        /// Namespace the management plane is installed in
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Collect logs from every node into a tarball
    Logs {
        /// Cluster logs tarball
        #[arg(short, long, default_value = collector::DEFAULT_LOGS_OUTPUT)]
        output: PathBuf,

        /// Fetch logs for a single node
        #[arg(short, long)]
        node: Option<String>,

        /// Collector image, defaults to the running agent's image
        #[arg(long)]
        image: Option<String>,
    },
    /// Show node statistics until interrupted
    Stats {
        /// Show stats for a single node
        #[arg(short, long)]
        node: Option<String>,

        /// Alternative command to run on the nodes
        #[arg(short, long, default_value = collector::DEFAULT_STATS_COMMAND)]
        stats_command: String,

        /// Collector image, defaults to the running agent's image
        #[arg(long)]
        image: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "info,cattle_teardown=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let client = create_client(cli.kubeconfig.as_deref())
        .await
        .context("Failed to create Kubernetes client")?;

    match cli.command {
        Command::Remove { namespace, force } => {
            if !force && !confirm(&namespace).await? {
                info!("Aborted");
                return Ok(());
            }

            let settings = RetrySettings::from_env()?;
            let teardown = Teardown::new(client, InstallationConfig::new(&namespace), settings);
            let report = teardown
                .run()
                .await
                .with_context(|| format!("Failed to remove management plane from {}", namespace))?;
            info!("Removed or cleaned {} objects", report.total_changes());
        }
        Command::Logs {
            output,
            node,
            image,
        } => {
            let opts = LogsOptions {
                output,
                node,
                image,
                namespace: DEFAULT_NAMESPACE.to_string(),
            };
            collect_logs(&client, &opts, &shutdown_token())
                .await
                .context("Failed to collect cluster logs")?;
        }
        Command::Stats {
            node,
            stats_command,
            image,
        } => {
            let opts = StatsOptions {
                node,
                command: stats_command,
                image,
                namespace: DEFAULT_NAMESPACE.to_string(),
                interval: Duration::from_secs(collector::STATS_INTERVAL_SECS),
            };
            collect_stats(&client, &opts, &shutdown_token())
                .await
                .context("Failed to collect node stats")?;
        }
    }

    Ok(())
}

async fn confirm(namespace: &str) -> Result<bool> {
    let prompt = format!(
        "Are you sure you want to remove Rancher Management Plane in Namespace [{}] [y/n]: ",
        namespace
    );
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Token cancelled on Ctrl-C or SIGTERM
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
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
                    warn!("Failed to listen for SIGTERM: {}", e);
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
        info!("User interrupt, cleaning up..");
        cancel.cancel();
    });

    token
}
