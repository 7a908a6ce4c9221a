//! Node health monitor.
//!
//! Keeps a board of displayed nodes, refreshes each node's agent status
//! independently on a fixed cadence while the overview is shown, and
//! classifies health from heartbeat age at render time.

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::SharedApi;
use crate::config::MonitorConf;
use crate::error::ApiError;
use crate::models::{probe_address, AgentAction, AgentStatus};
use crate::schedule::TaskHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthClass {
    Online,
    Warning,
    /// Seen before, heartbeat stale.
    Down,
    /// Never reported, or no data at all.
    Offline,
}

impl HealthClass {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthClass::Online => "online",
            HealthClass::Warning => "warning",
            HealthClass::Down => "down",
            HealthClass::Offline => "offline",
        }
    }

    /// Whether live metrics may be shown for this class.
    pub fn shows_metrics(self) -> bool {
        matches!(self, HealthClass::Online | HealthClass::Warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub online_within_secs: i64,
    pub warning_within_secs: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { online_within_secs: 10, warning_within_secs: 30 }
    }
}

impl From<&MonitorConf> for Thresholds {
    fn from(conf: &MonitorConf) -> Self {
        Self {
            online_within_secs: conf.online_within_secs,
            warning_within_secs: conf.warning_within_secs,
        }
    }
}

/// Heartbeat age in whole seconds; an agent clock ahead of ours counts as 0.
pub fn heartbeat_age(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_seen).num_seconds().max(0)
}

pub fn classify(status: Option<&AgentStatus>, now: DateTime<Utc>, th: &Thresholds) -> HealthClass {
    let Some(last_seen) = status.and_then(|s| s.last_seen) else {
        return HealthClass::Offline;
    };
    // fractional seconds past a threshold already belong to the next class
    let age_ms = (now - last_seen).num_milliseconds().max(0);
    if age_ms <= th.online_within_secs * 1000 {
        HealthClass::Online
    } else if age_ms <= th.warning_within_secs * 1000 {
        HealthClass::Warning
    } else {
        HealthClass::Down
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRow {
    pub name: String,
    pub image: String,
    pub state: String,
    pub uptime: Option<String>,
}

/// Display-ready row for one node. Metrics are `None` when they would be stale.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub ip: String,
    pub class: HealthClass,
    pub hostname: String,
    pub age_secs: Option<i64>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub docker_status: Option<String>,
    pub gpu_status: String,
    pub os_spec: String,
    pub deployment_time: Option<String>,
    pub services: Vec<ServiceRow>,
}

impl NodeView {
    pub fn build(
        ip: &str,
        status: Option<&AgentStatus>,
        now: DateTime<Utc>,
        th: &Thresholds,
    ) -> Self {
        let class = classify(status, now, th);
        let live = class.shows_metrics();
        let Some(s) = status else {
            return Self {
                ip: ip.to_string(),
                class,
                hostname: String::new(),
                age_secs: None,
                cpu_usage: None,
                memory_usage: None,
                docker_status: None,
                gpu_status: String::new(),
                os_spec: String::new(),
                deployment_time: None,
                services: Vec::new(),
            };
        };
        Self {
            ip: ip.to_string(),
            class,
            hostname: s.hostname.clone(),
            age_secs: s.last_seen.map(|t| heartbeat_age(t, now)),
            cpu_usage: live.then_some(s.cpu_usage),
            memory_usage: live.then_some(s.memory_usage),
            docker_status: live.then(|| s.docker_status.clone()),
            gpu_status: s.gpu_status.clone(),
            os_spec: s.os_spec.clone(),
            deployment_time: s.deployment_time.clone(),
            services: s
                .services
                .iter()
                .map(|svc| ServiceRow {
                    name: svc.name.clone(),
                    image: svc.image.clone(),
                    state: svc.state.clone(),
                    uptime: live.then(|| svc.uptime.clone()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NodeEntry {
    status: Option<AgentStatus>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Displayed nodes in order, with their latest snapshot.
#[derive(Debug, Default)]
pub struct NodeBoard {
    order: Vec<String>,
    entries: HashMap<String, NodeEntry>,
}

impl NodeBoard {
    /// Replace the displayed node set; snapshots of kept nodes survive.
    pub fn set_nodes<I: IntoIterator<Item = String>>(&mut self, nodes: I) {
        let mut order: Vec<String> = Vec::new();
        for ip in nodes.into_iter().map(|n| probe_address(&n)) {
            if !ip.is_empty() && !order.contains(&ip) {
                order.push(ip);
            }
        }
        self.entries.retain(|ip, _| order.contains(ip));
        for ip in &order {
            self.entries
                .entry(ip.clone())
                .or_insert(NodeEntry { status: None, refreshed_at: None });
        }
        self.order = order;
    }

    pub fn nodes(&self) -> &[String] {
        &self.order
    }

    pub fn remove(&mut self, ip: &str) -> bool {
        self.order.retain(|n| n != ip);
        self.entries.remove(ip).is_some()
    }

    /// Full replacement of one node's snapshot; unknown nodes are ignored.
    fn replace(&mut self, ip: &str, status: Option<AgentStatus>, at: DateTime<Utc>) -> bool {
        match self.entries.get_mut(ip) {
            Some(entry) => {
                entry.status = status;
                entry.refreshed_at = Some(at);
                true
            }
            None => false,
        }
    }

    pub fn status(&self, ip: &str) -> Option<&AgentStatus> {
        self.entries.get(ip).and_then(|e| e.status.as_ref())
    }

    /// When the last status query for `ip` landed, successful or not.
    pub fn refreshed_at(&self, ip: &str) -> Option<DateTime<Utc>> {
        self.entries.get(ip).and_then(|e| e.refreshed_at)
    }

    pub fn views(&self, now: DateTime<Utc>, th: &Thresholds) -> Vec<NodeView> {
        self.order
            .iter()
            .map(|ip| NodeView::build(ip, self.status(ip), now, th))
            .collect()
    }
}

/// Board shared between the monitor handle and its refresh task.
pub type SharedBoard = Arc<Mutex<NodeBoard>>;

struct MonitorCore {
    api: SharedApi,
    board: SharedBoard,
    updates: watch::Sender<u64>,
}

impl MonitorCore {
    async fn refresh(&self, now: DateTime<Utc>) {
        let nodes = self.board.lock().nodes().to_vec();
        let mut pending: FuturesUnordered<_> = nodes
            .into_iter()
            .map(|ip| {
                let api = self.api.clone();
                async move {
                    let result = api.agent_status(&ip).await;
                    (ip, result)
                }
            })
            .collect();

        while let Some((ip, result)) = pending.next().await {
            let snapshot = match result {
                Ok(status) => status,
                Err(e) => {
                    debug!(node = %ip, error = %e, "status query failed");
                    None
                }
            };
            let landed = self.board.lock().replace(&ip, snapshot, now);
            if landed {
                self.updates.send_modify(|generation| *generation += 1);
            }
        }
    }
}

pub struct NodeHealthMonitor {
    core: Arc<MonitorCore>,
    thresholds: Thresholds,
    interval: Duration,
    task: Option<TaskHandle<()>>,
}

impl NodeHealthMonitor {
    pub fn new(api: SharedApi, conf: &MonitorConf) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            core: Arc::new(MonitorCore {
                api,
                board: Arc::new(Mutex::new(NodeBoard::default())),
                updates,
            }),
            thresholds: Thresholds::from(conf),
            interval: conf.interval(),
            task: None,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn board(&self) -> SharedBoard {
        self.core.board.clone()
    }

    pub fn set_nodes<I: IntoIterator<Item = String>>(&self, nodes: I) {
        self.core.board.lock().set_nodes(nodes);
        self.core.updates.send_modify(|generation| *generation += 1);
    }

    /// Populate the board from the management API's node list.
    pub async fn load_nodes(&self) -> Result<usize, ApiError> {
        let nodes = self.core.api.list_nodes().await?;
        self.set_nodes(nodes);
        Ok(self.core.board.lock().nodes().len())
    }

    /// Bumped every time a node's snapshot lands or the node set changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.core.updates.subscribe()
    }

    pub async fn refresh_once_at(&self, now: DateTime<Utc>) {
        self.core.refresh(now).await;
    }

    pub async fn refresh_once(&self) {
        self.refresh_once_at(Utc::now()).await;
    }

    pub fn views_at(&self, now: DateTime<Utc>) -> Vec<NodeView> {
        self.core.board.lock().views(now, &self.thresholds)
    }

    pub fn views(&self) -> Vec<NodeView> {
        self.views_at(Utc::now())
    }

    /// Overview became visible: start the refresh loop unless already running.
    pub fn show(&mut self) {
        if self.is_active() {
            return;
        }
        info!(nodes = self.core.board.lock().nodes().len(), "node monitor started");
        let core = self.core.clone();
        self.task = Some(TaskHandle::every(self.interval, move || {
            let core = core.clone();
            async move {
                core.refresh(Utc::now()).await;
                ControlFlow::Continue(())
            }
        }));
    }

    /// Overview left: stop the loop.
    pub async fn hide(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel().await;
            info!("node monitor stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn control(&self, ip: &str, action: AgentAction) -> Result<String, ApiError> {
        info!(node = %ip, action = action.as_str(), "agent control");
        self.core.api.agent_control(ip, action).await
    }

    /// Unregister the node and drop it from the board.
    pub async fn remove(&self, ip: &str) -> Result<(), ApiError> {
        if let Err(e) = self.core.api.remove_node(ip).await {
            warn!(node = %ip, error = %e, "node removal failed");
            return Err(e);
        }
        if self.core.board.lock().remove(ip) {
            self.core.updates.send_modify(|generation| *generation += 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn seen(secs_ago: i64) -> AgentStatus {
        AgentStatus {
            node_ip: "10.0.0.5".into(),
            hostname: "gpu-01".into(),
            status: "online".into(),
            last_seen: Some(now() - chrono::Duration::seconds(secs_ago)),
            cpu_usage: 37.5,
            memory_usage: 61.0,
            docker_status: "active".into(),
            services: vec![ServiceStatus {
                name: "vllm".into(),
                image: "vllm/vllm-openai".into(),
                state: "running".into(),
                uptime: "2h".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn heartbeat_age_drives_the_class() {
        let th = Thresholds::default();
        assert_eq!(classify(Some(&seen(5)), now(), &th), HealthClass::Online);
        assert_eq!(classify(Some(&seen(10)), now(), &th), HealthClass::Online);
        assert_eq!(classify(Some(&seen(15)), now(), &th), HealthClass::Warning);
        assert_eq!(classify(Some(&seen(30)), now(), &th), HealthClass::Warning);
        assert_eq!(classify(Some(&seen(45)), now(), &th), HealthClass::Down);
        assert_eq!(classify(None, now(), &th), HealthClass::Offline);
    }

    #[test]
    fn fractional_ages_past_a_threshold_move_up_a_class() {
        let th = Thresholds::default();
        let aged = |ms: i64| AgentStatus {
            last_seen: Some(now() - chrono::Duration::milliseconds(ms)),
            ..seen(0)
        };
        assert_eq!(classify(Some(&aged(10_000)), now(), &th), HealthClass::Online);
        assert_eq!(classify(Some(&aged(10_001)), now(), &th), HealthClass::Warning);
        assert_eq!(classify(Some(&aged(10_900)), now(), &th), HealthClass::Warning);
        assert_eq!(classify(Some(&aged(30_000)), now(), &th), HealthClass::Warning);
        assert_eq!(classify(Some(&aged(30_001)), now(), &th), HealthClass::Down);

        let view = NodeView::build("10.0.0.5", Some(&aged(30_900)), now(), &th);
        assert_eq!(view.class, HealthClass::Down);
        assert_eq!(view.cpu_usage, None);
    }

    #[test]
    fn clock_skew_counts_as_fresh() {
        assert_eq!(classify(Some(&seen(-20)), now(), &Thresholds::default()), HealthClass::Online);
    }

    #[test]
    fn placeholder_record_is_offline() {
        let placeholder = AgentStatus::placeholder("10.0.0.5");
        assert_eq!(
            classify(Some(&placeholder), now(), &Thresholds::default()),
            HealthClass::Offline
        );
    }

    #[test]
    fn down_nodes_hide_stale_metrics() {
        let view = NodeView::build("10.0.0.5", Some(&seen(45)), now(), &Thresholds::default());
        assert_eq!(view.class, HealthClass::Down);
        assert_eq!(view.cpu_usage, None);
        assert_eq!(view.memory_usage, None);
        assert_eq!(view.services[0].uptime, None);
        assert_eq!(view.services[0].name, "vllm");

        let view = NodeView::build("10.0.0.5", Some(&seen(15)), now(), &Thresholds::default());
        assert_eq!(view.cpu_usage, Some(37.5));
        assert_eq!(view.services[0].uptime.as_deref(), Some("2h"));
    }

    #[test]
    fn board_replaces_snapshots_instead_of_merging() {
        let mut board = NodeBoard::default();
        board.set_nodes(["10.0.0.5:22", "10.0.0.5", "10.0.0.6"].map(String::from).to_vec());
        assert_eq!(board.nodes(), ["10.0.0.5", "10.0.0.6"]);

        assert!(board.replace("10.0.0.5", Some(seen(1)), now()));
        assert!(board.replace("10.0.0.5", Some(seen(1)), now()));
        let first = board.views(now(), &Thresholds::default());
        let second = board.views(now(), &Thresholds::default());
        assert_eq!(first, second);
        assert_eq!(first[0].services.len(), 1);

        assert!(board.replace("10.0.0.5", None, now()));
        assert_eq!(board.views(now(), &Thresholds::default())[0].class, HealthClass::Offline);
        assert_eq!(board.refreshed_at("10.0.0.5"), Some(now()));
        assert_eq!(board.refreshed_at("10.0.0.6"), None);
        assert!(!board.replace("10.9.9.9", Some(seen(1)), now()));
    }

    #[test]
    fn removed_nodes_leave_the_board() {
        let mut board = NodeBoard::default();
        board.set_nodes(vec!["10.0.0.5".to_string(), "10.0.0.6".to_string()]);
        assert!(board.remove("10.0.0.5"));
        assert_eq!(board.nodes(), ["10.0.0.6"]);
        assert!(!board.replace("10.0.0.5", Some(seen(1)), now()));
    }
}
