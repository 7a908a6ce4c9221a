//! `fleetdeck` command line.

pub mod prompt;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::{HttpFleetApi, SharedApi};
use crate::config::{load_config, ConsoleConfig};
use crate::models::AgentAction;
use crate::monitor::{NodeHealthMonitor, NodeView, Thresholds};
use crate::poller::{DeploymentPoller, PollOutcome, PollTask};
use crate::view::{render_overview, render_progress};
use crate::wizard::WizardSession;

#[derive(Debug, Parser)]
#[command(name = "fleetdeck", version, about = "Deploy and watch AI-inference nodes")]
pub struct Cli {
    /// Config file (defaults to $FLEETDECK_CONFIG or fleetdeck.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override api.base_url
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive deployment wizard, then wait for the node and watch the fleet
    Wizard,
    /// Live health overview of registered nodes
    Monitor {
        /// Nodes to watch; all registered nodes when omitted
        ips: Vec<String>,
        /// Refresh once, print and exit
        #[arg(long)]
        once: bool,
    },
    /// Current agent status of one node
    Status { ip: String },
    /// Send a control action to a node agent
    Control {
        ip: String,
        #[arg(value_parser = parse_action)]
        action: AgentAction,
    },
    /// Wait for a freshly deployed node to come up
    Poll { node: String },
    /// Unregister a node
    Remove { ip: String },
}

fn parse_action(raw: &str) -> Result<AgentAction, String> {
    AgentAction::parse(raw)
        .ok_or_else(|| format!("expected start, stop, fix-docker or restart, got `{raw}`"))
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut cfg: ConsoleConfig = load_config(cli.config.as_deref()).await;
    if let Some(url) = cli.base_url {
        cfg.api.base_url = url;
    }
    cfg.validate().context("invalid configuration")?;
    info!(api = %cfg.api.base_url, prefix = %cfg.api.prefix, "fleet management api");

    let api: SharedApi =
        Arc::new(HttpFleetApi::new(&cfg.api).context("failed to build HTTP client")?);

    match cli.command {
        Command::Wizard => run_wizard(api, &cfg).await,
        Command::Monitor { ips, once } => run_monitor(api, &cfg, ips, once).await,
        Command::Status { ip } => {
            let status = api.agent_status(&ip).await.context("status query failed")?;
            let th = Thresholds::from(&cfg.monitor);
            let view = NodeView::build(&ip, status.as_ref(), chrono::Utc::now(), &th);
            print!("{}", render_overview(&[view]));
            Ok(())
        }
        Command::Control { ip, action } => {
            let monitor = NodeHealthMonitor::new(api, &cfg.monitor);
            let message = monitor.control(&ip, action).await.context("agent control failed")?;
            println!("✅ {message}");
            Ok(())
        }
        Command::Poll { node } => {
            let outcome = run_poll(api, &cfg, &node).await?;
            if !outcome.is_ready() {
                bail!("{} is not ready after {} attempts", outcome.node, outcome.attempts);
            }
            Ok(())
        }
        Command::Remove { ip } => {
            let monitor = NodeHealthMonitor::new(api, &cfg.monitor);
            monitor.remove(&ip).await.context("node removal failed")?;
            println!("✅ {ip} removed");
            Ok(())
        }
    }
}

async fn run_wizard(api: SharedApi, cfg: &ConsoleConfig) -> Result<()> {
    let poller = DeploymentPoller::new(api.clone(), &cfg.poller);
    let max = poller.max_attempts();
    let mut session = WizardSession::with_poller(api.clone(), poller);
    if prompt::run_wizard(&mut session).await?.is_none() {
        return Ok(());
    }
    let task = session.take_poll().context("deployment accepted but no node to poll")?;

    let outcome = follow_poll(task, max).await?;
    if !outcome.is_ready() {
        println!("Restart with `fleetdeck poll {}` once the node is reachable.", outcome.node);
        return Ok(());
    }
    // hand off to the overview with the new node always on the board
    let mut nodes = api.list_nodes().await.unwrap_or_default();
    if !nodes.iter().any(|n| crate::models::probe_address(n) == outcome.node) {
        nodes.push(outcome.node.clone());
    }
    run_monitor(api, cfg, nodes, false).await
}

pub async fn run_poll(api: SharedApi, cfg: &ConsoleConfig, node: &str) -> Result<PollOutcome> {
    let poller = DeploymentPoller::new(api, &cfg.poller);
    let max = poller.max_attempts();
    let Some(task) = poller.start(node) else {
        bail!("no target node to poll");
    };
    follow_poll(task, max).await
}

/// Follow a poll until it finishes or the operator interrupts it.
async fn follow_poll(task: PollTask, max: u32) -> Result<PollOutcome> {
    let PollTask { node, handle, mut progress } = task;
    println!("⏳ Waiting for the agent on {node} ...");

    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let p = progress.borrow_and_update().clone();
                println!("{}", render_progress(&p, max));
                if p.phase.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.cancel().await;
                bail!("polling of {node} interrupted");
            }
        }
    }
    handle
        .join()
        .await
        .with_context(|| format!("poller for {node} stopped unexpectedly"))
}

async fn run_monitor(
    api: SharedApi,
    cfg: &ConsoleConfig,
    ips: Vec<String>,
    once: bool,
) -> Result<()> {
    let mut monitor = NodeHealthMonitor::new(api, &cfg.monitor);
    if ips.is_empty() {
        match monitor.load_nodes().await {
            Ok(count) => info!(count, "registered nodes loaded"),
            Err(e) => warn!(error = %e, "could not load node list"),
        }
    } else {
        monitor.set_nodes(ips);
    }

    if once {
        monitor.refresh_once().await;
        print!("{}", render_overview(&monitor.views()));
        return Ok(());
    }

    let mut updates = monitor.subscribe();
    monitor.show();
    println!("👀 Watching nodes every {}s (Ctrl-C to stop)", cfg.monitor.interval().as_secs());
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                // let the rest of the fan-out land before redrawing
                tokio::time::sleep(Duration::from_millis(200)).await;
                updates.mark_unchanged();
                println!();
                print!("{}", render_overview(&monitor.views()));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    monitor.hide().await;
    Ok(())
}
