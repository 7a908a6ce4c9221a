//! Post-submission deployment poller.
//!
//! Watches one freshly provisioned node until its agent is online with
//! docker active and at least one service, or the attempt budget runs out.
//! Individual query failures only count as a `Waiting` tick.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::SharedApi;
use crate::config::PollerConf;
use crate::error::ApiError;
use crate::models::{probe_address, AgentStatus};
use crate::schedule::TaskHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Offline, unregistered, or the query failed.
    Waiting,
    /// Online but no workload services yet.
    Starting,
    Ready,
    TimedOut,
}

impl PollPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            PollPhase::Waiting => "waiting",
            PollPhase::Starting => "starting",
            PollPhase::Ready => "ready",
            PollPhase::TimedOut => "timed out",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PollPhase::Ready | PollPhase::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollProgress {
    pub node: String,
    pub attempt: u32,
    pub phase: PollPhase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub node: String,
    pub phase: PollPhase,
    pub attempts: u32,
    pub last_status: Option<AgentStatus>,
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        self.phase == PollPhase::Ready
    }
}

/// A running poll: the task plus a progress feed for the surface.
pub struct PollTask {
    pub node: String,
    pub handle: TaskHandle<PollOutcome>,
    pub progress: watch::Receiver<PollProgress>,
}

impl PollTask {
    /// Wait for the terminal outcome. `None` if the task was canceled.
    pub async fn finish(self) -> Option<PollOutcome> {
        self.handle.join().await
    }
}

/// Phase implied by one status query.
pub fn observe(result: &Result<Option<AgentStatus>, ApiError>) -> PollPhase {
    match result {
        Ok(Some(status)) if status.is_online() => {
            if status.services.is_empty() {
                PollPhase::Starting
            } else if status.docker_active() {
                PollPhase::Ready
            } else {
                PollPhase::Waiting
            }
        }
        _ => PollPhase::Waiting,
    }
}

#[derive(Clone)]
pub struct DeploymentPoller {
    api: SharedApi,
    interval: Duration,
    max_attempts: u32,
}

impl DeploymentPoller {
    pub fn new(api: SharedApi, conf: &PollerConf) -> Self {
        Self { api, interval: conf.interval(), max_attempts: conf.max_attempts.max(1) }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Start polling `node` (`host[:port]`). Returns `None` for an empty entry.
    pub fn start(&self, node: &str) -> Option<PollTask> {
        let ip = probe_address(node);
        if ip.is_empty() {
            warn!("no target node, poller not started");
            return None;
        }
        info!(node = %ip, attempts = self.max_attempts, "waiting for agent");

        let (tx, progress) = watch::channel(PollProgress {
            node: ip.clone(),
            attempt: 0,
            phase: PollPhase::Waiting,
        });
        let tx = Arc::new(tx);
        let api = self.api.clone();
        let max_attempts = self.max_attempts;
        let target = ip.clone();
        let mut attempt = 0u32;

        let handle = TaskHandle::every(self.interval, move || {
            attempt += 1;
            let attempt = attempt;
            let api = api.clone();
            let tx = tx.clone();
            let ip = target.clone();
            async move {
                let result = api.agent_status(&ip).await;
                if let Err(e) = &result {
                    debug!(node = %ip, attempt, error = %e, "status query failed");
                }
                let mut phase = observe(&result);
                if phase != PollPhase::Ready && attempt >= max_attempts {
                    phase = PollPhase::TimedOut;
                }
                tx.send_replace(PollProgress { node: ip.clone(), attempt, phase });

                match phase {
                    PollPhase::Ready => info!(node = %ip, attempt, "agent ready"),
                    PollPhase::TimedOut => {
                        warn!(node = %ip, attempt, "agent did not come up in time")
                    }
                    _ => return ControlFlow::Continue(()),
                }
                ControlFlow::Break(PollOutcome {
                    node: ip,
                    phase,
                    attempts: attempt,
                    last_status: result.ok().flatten(),
                })
            }
        });

        Some(PollTask { node: ip, handle, progress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceStatus;

    fn status(state: &str, docker: &str, services: usize) -> AgentStatus {
        AgentStatus {
            node_ip: "10.0.0.5".into(),
            status: state.into(),
            docker_status: docker.into(),
            services: (0..services)
                .map(|i| ServiceStatus {
                    name: format!("svc-{i}"),
                    state: "running".into(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn phases_follow_agent_progress() {
        assert_eq!(observe(&Ok(None)), PollPhase::Waiting);
        assert_eq!(observe(&Ok(Some(status("offline", "", 0)))), PollPhase::Waiting);
        assert_eq!(observe(&Ok(Some(status("online", "active", 0)))), PollPhase::Starting);
        assert_eq!(observe(&Ok(Some(status("online", "active", 2)))), PollPhase::Ready);
    }

    #[test]
    fn services_without_docker_keep_waiting() {
        assert_eq!(observe(&Ok(Some(status("online", "inactive", 1)))), PollPhase::Waiting);
    }

    #[test]
    fn failures_are_just_another_wait() {
        let err = ApiError::Status { status: 502, message: "bad gateway".into() };
        assert_eq!(observe(&Err(err)), PollPhase::Waiting);
    }
}
