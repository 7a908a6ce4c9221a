/*!
Stub de l'API Fleet Management pour tests sans serveur

Implémente `FleetApi` en mémoire: les réponses sont scriptées par le test
et chaque appel est enregistré pour les assertions.
*/

use async_trait::async_trait;
use fleetdeck_console::models::{
    probe_address, AgentAction, AgentStatus, DeploymentConfig, DiscoverRequest, HardwareReport,
    HardwareRequest, ModelInfo, ProbeKind, ProbeReply, ProbeRequest,
};
use fleetdeck_console::{ApiError, FleetApi};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Réponse scriptée de `deploy/status` pour un noeud
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedStatus {
    Report(AgentStatus),
    /// Agent jamais vu (404 côté serveur)
    Unknown,
    /// Erreur HTTP avec ce code
    Fail(u16),
}

/// Appel reçu par le stub, dans l'ordre d'arrivée
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    ListNodes,
    SaveNodes(Vec<String>),
    TestConnection(ProbeRequest),
    DiscoverModels(DiscoverRequest),
    DetectHardware(HardwareRequest),
    AgentStatus(String),
    AgentControl { ip: String, action: AgentAction },
    Generate(DeploymentConfig),
    RemoveNode(String),
}

#[derive(Default)]
struct Inner {
    nodes: Vec<String>,
    nodes_error: Option<String>,
    statuses: HashMap<String, VecDeque<ScriptedStatus>>,
    latency: HashMap<String, Duration>,
    probe_replies: HashMap<ProbeKind, ProbeReply>,
    probe_error: Option<String>,
    models: Vec<String>,
    hardware: HardwareReport,
    generate_error: Option<String>,
    calls: Vec<RecordedCall>,
}

/// `FleetApi` en mémoire, partageable entre la console et le test
#[derive(Default)]
pub struct MockFleetApi {
    inner: Mutex<Inner>,
}

fn status_error(status: u16, message: &str) -> ApiError {
    ApiError::Status { status, message: message.to_string() }
}

impl MockFleetApi {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- script ----

    /// Liste de noeuds enregistrés renvoyée par `deploy/nodes`
    pub fn set_nodes<I, S>(&self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.lock();
        inner.nodes = nodes.into_iter().map(Into::into).collect();
        inner.nodes_error = None;
    }

    /// Fait échouer `list_nodes` (HTTP 500)
    pub fn fail_list_nodes(&self, message: &str) {
        self.inner.lock().nodes_error = Some(message.to_string());
    }

    /// Séquence de réponses pour `ip`; la dernière se répète indéfiniment
    pub fn script_status(&self, ip: &str, steps: Vec<ScriptedStatus>) {
        self.inner.lock().statuses.insert(ip.to_string(), steps.into());
    }

    /// Réponse fixe pour `ip`
    pub fn set_status(&self, ip: &str, status: AgentStatus) {
        self.script_status(ip, vec![ScriptedStatus::Report(status)]);
    }

    /// Retarde les réponses de statut de `ip` (temps tokio)
    pub fn set_latency(&self, ip: &str, delay: Duration) {
        self.inner.lock().latency.insert(ip.to_string(), delay);
    }

    /// Par défaut toute sonde réussit
    pub fn set_probe_reply(&self, kind: ProbeKind, reply: ProbeReply) {
        self.inner.lock().probe_replies.insert(kind, reply);
    }

    /// Sonde sans réponse exploitable (transport coupé)
    pub fn fail_probes(&self, message: &str) {
        self.inner.lock().probe_error = Some(message.to_string());
    }

    pub fn set_models<I, S>(&self, models: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.lock().models = models.into_iter().map(Into::into).collect();
    }

    pub fn set_hardware(&self, report: HardwareReport) {
        self.inner.lock().hardware = report;
    }

    pub fn fail_generate(&self, message: &str) {
        self.inner.lock().generate_error = Some(message.to_string());
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn registered_nodes(&self) -> Vec<String> {
        self.inner.lock().nodes.clone()
    }

    /// Configurations reçues par `deploy/generate`
    pub fn generate_calls(&self) -> Vec<DeploymentConfig> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Generate(cfg) => Some(cfg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn probe_calls(&self, kind: ProbeKind) -> Vec<ProbeRequest> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RecordedCall::TestConnection(req) if req.kind == kind => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn status_queries(&self, ip: &str) -> usize {
        self.count(|c| matches!(c, RecordedCall::AgentStatus(q) if q == ip))
    }

    pub fn count(&self, pred: impl Fn(&RecordedCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: RecordedCall) {
        self.inner.lock().calls.push(call);
    }

    fn next_status(&self, ip: &str) -> (ScriptedStatus, Option<Duration>) {
        let mut inner = self.inner.lock();
        let delay = inner.latency.get(ip).copied();
        let step = match inner.statuses.get_mut(ip) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        (step.unwrap_or(ScriptedStatus::Unknown), delay)
    }

    fn is_known(&self, ip: &str) -> bool {
        let inner = self.inner.lock();
        inner.statuses.contains_key(ip) || inner.nodes.iter().any(|n| probe_address(n) == ip)
    }
}

#[async_trait]
impl FleetApi for MockFleetApi {
    async fn list_nodes(&self) -> Result<Vec<String>, ApiError> {
        self.record(RecordedCall::ListNodes);
        let inner = self.inner.lock();
        match &inner.nodes_error {
            Some(msg) => Err(status_error(500, msg)),
            None => Ok(inner.nodes.clone()),
        }
    }

    async fn save_nodes(&self, nodes: &[String]) -> Result<(), ApiError> {
        self.record(RecordedCall::SaveNodes(nodes.to_vec()));
        log::info!("💾 [MOCK] {} nodes saved", nodes.len());
        self.inner.lock().nodes = nodes.to_vec();
        Ok(())
    }

    async fn test_connection(&self, request: &ProbeRequest) -> Result<ProbeReply, ApiError> {
        self.record(RecordedCall::TestConnection(request.clone()));
        let inner = self.inner.lock();
        if let Some(msg) = &inner.probe_error {
            return Err(ApiError::Rejected(msg.clone()));
        }
        let reply = inner
            .probe_replies
            .get(&request.kind)
            .cloned()
            .unwrap_or_else(|| ProbeReply::success(format!("{} reachable", request.kind.as_str())));
        log::info!("🔌 [MOCK] probe {} {} -> {}", request.kind.as_str(), request.host, reply.status);
        Ok(reply)
    }

    async fn discover_models(&self, request: &DiscoverRequest) -> Result<Vec<ModelInfo>, ApiError> {
        self.record(RecordedCall::DiscoverModels(request.clone()));
        let models = self.inner.lock().models.clone();
        Ok(models.into_iter().map(|id| ModelInfo { id }).collect())
    }

    async fn detect_hardware(&self, request: &HardwareRequest) -> Result<HardwareReport, ApiError> {
        self.record(RecordedCall::DetectHardware(request.clone()));
        Ok(self.inner.lock().hardware.clone())
    }

    async fn agent_status(&self, ip: &str) -> Result<Option<AgentStatus>, ApiError> {
        self.record(RecordedCall::AgentStatus(ip.to_string()));
        let (step, delay) = self.next_status(ip);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match step {
            ScriptedStatus::Report(status) => Ok(Some(status)),
            ScriptedStatus::Unknown => Ok(None),
            ScriptedStatus::Fail(code) => Err(status_error(code, "status unavailable")),
        }
    }

    async fn agent_control(&self, ip: &str, action: AgentAction) -> Result<String, ApiError> {
        self.record(RecordedCall::AgentControl { ip: ip.to_string(), action });
        if !self.is_known(ip) {
            return Err(status_error(404, "agent not found"));
        }
        log::info!("🎛️ [MOCK] {} -> {}", action.as_str(), ip);
        Ok(format!("{} command sent to {}", action.as_str(), ip))
    }

    async fn generate(&self, config: &DeploymentConfig) -> Result<serde_json::Value, ApiError> {
        self.record(RecordedCall::Generate(config.clone()));
        if let Some(msg) = self.inner.lock().generate_error.clone() {
            return Err(status_error(500, &msg));
        }
        log::info!("🚀 [MOCK] deployment generated for {:?}", config.target_nodes);
        Ok(serde_json::json!({ "deployment_id": "dep-1" }))
    }

    async fn remove_node(&self, ip: &str) -> Result<(), ApiError> {
        self.record(RecordedCall::RemoveNode(ip.to_string()));
        if !self.is_known(ip) {
            return Err(status_error(404, "node not found"));
        }
        let mut inner = self.inner.lock();
        inner.nodes.retain(|n| probe_address(n) != ip);
        inner.statuses.remove(ip);
        Ok(())
    }
}
