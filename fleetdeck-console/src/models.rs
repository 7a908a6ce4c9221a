use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_SSH_PORT: u16 = 22;

// ---- agent snapshots ----

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ServiceStatus {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: String,
    pub uptime: String,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Point-in-time report of a node agent, as relayed by the management API.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AgentStatus {
    pub node_ip: String,
    pub hostname: String,
    pub status: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub docker_status: String,
    pub gpu_status: String,
    pub os_spec: String,
    #[serde(deserialize_with = "blank_as_none")]
    pub deployment_time: Option<String>,
    pub services: Vec<ServiceStatus>,
}

/// The API sends `""` for a node that was never deployed through it.
fn blank_as_none<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

impl AgentStatus {
    /// Record for an agent that never reported.
    pub fn placeholder(ip: &str) -> Self {
        Self {
            node_ip: ip.to_string(),
            status: "offline".into(),
            ..Default::default()
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == "online"
    }

    pub fn docker_active(&self) -> bool {
        self.docker_status == "active"
    }
}

// ---- node list ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub ip: String,
    pub ssh_port: u16,
}

impl NodeRecord {
    /// Parse `host[:port]`; missing or unparsable ports fall back to 22.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        let ip = probe_address(entry);
        if ip.is_empty() {
            return None;
        }
        let ssh_port = port_suffix(entry)
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_SSH_PORT);
        Some(Self { ip, ssh_port })
    }
}

/// Split operator-typed node text on newlines and commas, keeping order.
pub fn split_node_list(text: &str) -> Vec<String> {
    text.split(['\n', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Address part of a `host[:port]` entry. Accepts `[v6]:port` and bare IPv6.
pub fn probe_address(entry: &str) -> String {
    let entry = entry.trim();
    if let Some(rest) = entry.strip_prefix('[') {
        return rest.split(']').next().unwrap_or_default().to_string();
    }
    match entry.matches(':').count() {
        1 => entry.split(':').next().unwrap_or_default().to_string(),
        _ => entry.to_string(),
    }
}

fn port_suffix(entry: &str) -> Option<&str> {
    if entry.starts_with('[') {
        return entry.rsplit_once("]:").map(|(_, p)| p);
    }
    if entry.matches(':').count() == 1 {
        return entry.split_once(':').map(|(_, p)| p);
    }
    None
}

// ---- enumerations shared by the wizard and the API ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    NewDeployment,
    IntegrateExisting,
}

impl DeploymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentMode::NewDeployment => "new_deployment",
            DeploymentMode::IntegrateExisting => "integrate_existing",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "new_deployment" => Some(Self::NewDeployment),
            "integrate_existing" => Some(Self::IntegrateExisting),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Nvidia,
    Ascend,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Nvidia => "nvidia",
            Platform::Ascend => "ascend",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "nvidia" => Some(Self::Nvidia),
            "ascend" => Some(Self::Ascend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorDbKind {
    Milvus,
    Qdrant,
    Chroma,
}

impl VectorDbKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VectorDbKind::Milvus => "milvus",
            VectorDbKind::Qdrant => "qdrant",
            VectorDbKind::Chroma => "chroma",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "milvus" => Some(Self::Milvus),
            "qdrant" => Some(Self::Qdrant),
            "chroma" => Some(Self::Chroma),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentAction {
    Start,
    Stop,
    FixDocker,
    Restart,
}

impl AgentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentAction::Start => "start",
            AgentAction::Stop => "stop",
            AgentAction::FixDocker => "fix-docker",
            AgentAction::Restart => "restart",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "fix-docker" => Some(Self::FixDocker),
            "restart" => Some(Self::Restart),
            _ => None,
        }
    }
}

// ---- submission payload ----

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VectorDbConfig {
    pub kind: VectorDbKind,
    pub host: String,
    pub port: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeploymentConfig {
    pub mgmt_host: String,
    pub mgmt_port: String,
    pub mode: DeploymentMode,
    pub platform: Platform,
    pub target_nodes: Vec<String>,
    pub model_name: String,
    pub inference_host: String,
    pub inference_port: String,
    pub enable_rag: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rag: Option<ServiceEndpoint>,
    pub enable_vectordb: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vectordb: Option<VectorDbConfig>,
    pub enable_parser: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parser: Option<ServiceEndpoint>,
}

impl DeploymentConfig {
    /// Address the poller watches after submission.
    pub fn first_node_address(&self) -> Option<String> {
        self.target_nodes
            .first()
            .map(|n| probe_address(n))
            .filter(|a| !a.is_empty())
    }
}

// ---- probe / discovery exchanges ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Ssh,
    Inference,
    RagApp,
    Vectordb,
    Parser,
}

impl ProbeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeKind::Ssh => "ssh",
            ProbeKind::Inference => "inference",
            ProbeKind::RagApp => "rag_app",
            ProbeKind::Vectordb => "vectordb",
            ProbeKind::Parser => "parser",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ssh" => Some(Self::Ssh),
            "inference" => Some(Self::Inference),
            "rag_app" | "rag" => Some(Self::RagApp),
            "vectordb" => Some(Self::Vectordb),
            "parser" => Some(Self::Parser),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProbeRequest {
    #[serde(rename = "type")]
    pub kind: ProbeKind,
    pub host: String,
    pub port: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ProbeReply {
    pub status: String,
    pub message: String,
}

impl ProbeReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self { status: "success".into(), message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "error".into(), message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DiscoverRequest {
    pub host: String,
    pub port: String,
    pub mode: DeploymentMode,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HardwareRequest {
    pub host: String,
    pub port: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct HardwareReport {
    pub status: String,
    pub platform: Option<String>,
    pub details: String,
}

impl HardwareReport {
    pub fn detected_platform(&self) -> Option<Platform> {
        if self.status != "success" {
            return None;
        }
        self.platform.as_deref().and_then(Platform::parse)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ControlRequest {
    pub ip: String,
    pub action: AgentAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_text_splits_on_newlines_and_commas() {
        let nodes = split_node_list(" 10.0.0.5:22\n10.0.0.6 , ,\n\n10.0.0.7:2222 ");
        assert_eq!(nodes, vec!["10.0.0.5:22", "10.0.0.6", "10.0.0.7:2222"]);
    }

    #[test]
    fn probe_address_strips_port() {
        assert_eq!(probe_address("10.0.0.5:22"), "10.0.0.5");
        assert_eq!(probe_address("gpu-01"), "gpu-01");
        assert_eq!(probe_address("[fe80::1]:22"), "fe80::1");
        assert_eq!(probe_address("fe80::1"), "fe80::1");
    }

    #[test]
    fn node_record_defaults_ssh_port() {
        assert_eq!(
            NodeRecord::parse("10.0.0.5"),
            Some(NodeRecord { ip: "10.0.0.5".into(), ssh_port: 22 })
        );
        assert_eq!(NodeRecord::parse("10.0.0.5:2200").map(|n| n.ssh_port), Some(2200));
        assert_eq!(NodeRecord::parse("[::1]:2201").map(|n| n.ssh_port), Some(2201));
        assert_eq!(NodeRecord::parse("   "), None);
    }

    #[test]
    fn agent_status_decodes_wire_names() {
        let raw = r#"{
            "node_ip": "10.0.0.5", "hostname": "gpu-01", "status": "online",
            "last_seen": "2026-03-01T10:00:00Z", "cpu_usage": 12.5, "memory_usage": 40.0,
            "docker_status": "active", "gpu_status": "1x A100", "os_spec": "Ubuntu 22.04",
            "services": [{"id": "a1", "name": "vllm", "image": "vllm:latest",
                          "status": "Up 3 minutes", "state": "running", "uptime": "3m"}]
        }"#;
        let status: AgentStatus = serde_json::from_str(raw).unwrap();
        assert!(status.is_online());
        assert!(status.docker_active());
        assert!(status.last_seen.is_some());
        assert_eq!(status.deployment_time, None);
        assert!(status.services[0].is_running());
    }

    #[test]
    fn blank_deployment_time_means_never_deployed() {
        let status: AgentStatus =
            serde_json::from_str(r#"{"node_ip": "10.0.0.5", "deployment_time": ""}"#).unwrap();
        assert_eq!(status.deployment_time, None);

        let status: AgentStatus = serde_json::from_str(r#"{"deployment_time": null}"#).unwrap();
        assert_eq!(status.deployment_time, None);

        let status: AgentStatus =
            serde_json::from_str(r#"{"deployment_time": "2026-03-01 10:00:00"}"#).unwrap();
        assert_eq!(status.deployment_time.as_deref(), Some("2026-03-01 10:00:00"));
    }

    #[test]
    fn config_serializes_nested_services() {
        let cfg = DeploymentConfig {
            mgmt_host: "10.0.0.1".into(),
            mgmt_port: "3000".into(),
            mode: DeploymentMode::NewDeployment,
            platform: Platform::Nvidia,
            target_nodes: vec!["10.0.0.5:22".into()],
            model_name: "qwen2".into(),
            inference_host: "10.0.0.5".into(),
            inference_port: "8000".into(),
            enable_rag: true,
            rag: Some(ServiceEndpoint { host: "10.0.0.5".into(), port: "3001".into() }),
            enable_vectordb: true,
            vectordb: Some(VectorDbConfig {
                kind: VectorDbKind::Qdrant,
                host: "10.0.0.5".into(),
                port: "6333".into(),
            }),
            enable_parser: false,
            parser: None,
        };
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["target_nodes"], serde_json::json!(["10.0.0.5:22"]));
        assert_eq!(v["rag"]["port"], "3001");
        assert_eq!(v["vectordb"]["kind"], "qdrant");
        assert_eq!(v["mode"], "new_deployment");
        assert!(v.get("parser").is_none());
        assert_eq!(cfg.first_node_address().as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn hardware_report_only_counts_on_success() {
        let ok = HardwareReport {
            status: "success".into(),
            platform: Some("Ascend".into()),
            details: String::new(),
        };
        assert_eq!(ok.detected_platform(), Some(Platform::Ascend));
        let failed = HardwareReport { status: "error".into(), ..ok };
        assert_eq!(failed.detected_platform(), None);
    }
}
