//! Client side of the Fleet Management API.
//!
//! `FleetApi` is the seam every orchestration component talks through; the
//! HTTP implementation lives in [`http`], and tests plug in the devkit stub.

mod http;

pub use http::HttpFleetApi;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{
    AgentAction, AgentStatus, DeploymentConfig, DiscoverRequest, HardwareReport, HardwareRequest,
    ModelInfo, ProbeReply, ProbeRequest,
};

pub type SharedApi = Arc<dyn FleetApi>;

#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Registered node entries, `ip[:port]`.
    async fn list_nodes(&self) -> Result<Vec<String>, ApiError>;

    async fn save_nodes(&self, nodes: &[String]) -> Result<(), ApiError>;

    /// Probe replies carry their own success flag; `Err` means no usable reply.
    async fn test_connection(&self, request: &ProbeRequest) -> Result<ProbeReply, ApiError>;

    async fn discover_models(&self, request: &DiscoverRequest) -> Result<Vec<ModelInfo>, ApiError>;

    async fn detect_hardware(&self, request: &HardwareRequest) -> Result<HardwareReport, ApiError>;

    /// `Ok(None)` when the agent never reported.
    async fn agent_status(&self, ip: &str) -> Result<Option<AgentStatus>, ApiError>;

    /// Returns the operator-facing message of the API.
    async fn agent_control(&self, ip: &str, action: AgentAction) -> Result<String, ApiError>;

    async fn generate(&self, config: &DeploymentConfig) -> Result<serde_json::Value, ApiError>;

    async fn remove_node(&self, ip: &str) -> Result<(), ApiError>;
}

/// `{success, data, message, error}` envelope used by most endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub success: Option<bool>,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// An explicit `success: false` or an `error` field rejects the reply.
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if let Some(err) = self.error {
            return Err(ApiError::Rejected(err));
        }
        if self.success == Some(false) {
            return Err(ApiError::Rejected(
                self.message.unwrap_or_else(|| "request failed".into()),
            ));
        }
        Ok(self.data)
    }
}

/// Node list replies come as `{success, data: [...]}` or `{nodes: [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NodesReply {
    Nodes { nodes: Vec<String> },
    Wrapped(Envelope<Vec<String>>),
}

impl NodesReply {
    pub fn into_nodes(self) -> Result<Vec<String>, ApiError> {
        match self {
            NodesReply::Nodes { nodes } => Ok(nodes),
            NodesReply::Wrapped(env) => Ok(env.into_result()?.unwrap_or_default()),
        }
    }
}

/// Model discovery nests the model array: `{success, data: {data: [{id}]}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelPage {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_reply_accepts_both_envelopes() {
        let a: NodesReply = serde_json::from_str(r#"{"nodes": ["10.0.0.5:22"]}"#).unwrap();
        assert_eq!(a.into_nodes().unwrap(), vec!["10.0.0.5:22"]);

        let b: NodesReply =
            serde_json::from_str(r#"{"success": true, "data": ["10.0.0.6"]}"#).unwrap();
        assert_eq!(b.into_nodes().unwrap(), vec!["10.0.0.6"]);
    }

    #[test]
    fn envelope_rejections_carry_the_message() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"success": false, "message": "disk full"}"#).unwrap();
        match env.into_result() {
            Err(ApiError::Rejected(msg)) => assert_eq!(msg, "disk full"),
            other => panic!("unexpected {other:?}"),
        }

        let env: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"error": "IP is required"}"#).unwrap();
        assert!(matches!(env.into_result(), Err(ApiError::Rejected(_))));
    }

    #[test]
    fn model_page_unwraps_nested_data() {
        let env: Envelope<ModelPage> =
            serde_json::from_str(r#"{"success": true, "data": {"data": [{"id": "qwen2"}]}}"#)
                .unwrap();
        let page = env.into_result().unwrap().unwrap();
        assert_eq!(page.data[0].id, "qwen2");
    }
}
