use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Envelope, FleetApi, ModelPage, NodesReply};
use crate::config::ApiConf;
use crate::error::ApiError;
use crate::models::{
    AgentAction, AgentStatus, ControlRequest, DeploymentConfig, DiscoverRequest, HardwareReport,
    HardwareRequest, ModelInfo, ProbeReply, ProbeRequest,
};

/// reqwest-backed `FleetApi`.
#[derive(Clone)]
pub struct HttpFleetApi {
    client: Client,
    root: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct StatusEnvelope {
    data: AgentStatus,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusReply {
    Wrapped(StatusEnvelope),
    Bare(AgentStatus),
}

impl HttpFleetApi {
    pub fn new(conf: &ApiConf) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(conf.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            root: join_root(&conf.base_url, &conf.prefix),
            token: conf.token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.root, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send and decode, mapping non-2xx statuses to `ApiError::Status`.
    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let (status, body) = self.send_raw(req).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Decode the body whatever the status; only an undecodable non-2xx is an error.
    async fn send_lenient<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let (status, body) = self.send_raw(req).await?;
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(status_error(status, &body)),
            Err(e) => Err(ApiError::Decode(e)),
        }
    }

    async fn send_raw(&self, req: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
        let resp = self.authorize(req).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(%status, bytes = body.len(), "fleet api reply");
        Ok((status, body))
    }
}

#[async_trait]
impl FleetApi for HttpFleetApi {
    async fn list_nodes(&self) -> Result<Vec<String>, ApiError> {
        let reply: NodesReply = self.send_json(self.client.get(self.url("deploy/nodes"))).await?;
        reply.into_nodes()
    }

    async fn save_nodes(&self, nodes: &[String]) -> Result<(), ApiError> {
        let req = self
            .client
            .post(self.url("deploy/nodes"))
            .json(&serde_json::json!({ "nodes": nodes }));
        let env: Envelope<serde_json::Value> = self.send_json(req).await?;
        env.into_result().map(|_| ())
    }

    async fn test_connection(&self, request: &ProbeRequest) -> Result<ProbeReply, ApiError> {
        let req = self.client.post(self.url("deploy/test-connection")).json(request);
        self.send_lenient(req).await
    }

    async fn discover_models(&self, request: &DiscoverRequest) -> Result<Vec<ModelInfo>, ApiError> {
        let req = self.client.post(self.url("deploy/discover-models")).json(request);
        let env: Envelope<ModelPage> = self.send_json(req).await?;
        Ok(env.into_result()?.map(|page| page.data).unwrap_or_default())
    }

    async fn detect_hardware(&self, request: &HardwareRequest) -> Result<HardwareReport, ApiError> {
        let req = self.client.post(self.url("deploy/detect-hardware")).json(request);
        self.send_lenient(req).await
    }

    async fn agent_status(&self, ip: &str) -> Result<Option<AgentStatus>, ApiError> {
        let req = self
            .client
            .get(self.url("deploy/status"))
            .query(&[("ip", ip)]);
        let (status, body) = self.send_raw(req).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        let reply: StatusReply = serde_json::from_str(&body)?;
        Ok(Some(match reply {
            StatusReply::Wrapped(env) => env.data,
            StatusReply::Bare(status) => status,
        }))
    }

    async fn agent_control(&self, ip: &str, action: AgentAction) -> Result<String, ApiError> {
        let body = ControlRequest { ip: ip.to_string(), action };
        let req = self.client.post(self.url("agent/control")).json(&body);
        let env: Envelope<serde_json::Value> = self.send_json(req).await?;
        let message = env.message.clone();
        let data = env.into_result()?;
        Ok(message
            .or_else(|| data.and_then(|d| d.as_str().map(str::to_string)))
            .unwrap_or_else(|| format!("{} sent to {}", action.as_str(), ip)))
    }

    async fn generate(&self, config: &DeploymentConfig) -> Result<serde_json::Value, ApiError> {
        let req = self.client.post(self.url("deploy/generate")).json(config);
        let env: Envelope<serde_json::Value> = self.send_json(req).await?;
        Ok(env.into_result()?.unwrap_or(serde_json::Value::Null))
    }

    async fn remove_node(&self, ip: &str) -> Result<(), ApiError> {
        let req = self.client.delete(self.url("nodes")).query(&[("ip", ip)]);
        let env: Envelope<serde_json::Value> = self.send_json(req).await?;
        env.into_result().map(|_| ())
    }
}

fn join_root(base_url: &str, prefix: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{prefix}")
    }
}

/// Prefer the API's `error`/`message` field over the raw body.
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    if status.is_server_error() {
        warn!(%status, %message, "fleet api server error");
    }
    ApiError::Status { status: status.as_u16(), message }
}
