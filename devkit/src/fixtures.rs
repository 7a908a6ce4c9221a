/*!
Builders de statuts agent pour les tests

Produit des `AgentStatus` réalistes sans écrire tous les champs à la main.
*/

use chrono::{DateTime, Duration, Utc};
use fleetdeck_console::models::{AgentStatus, ServiceStatus};

/// Builder fluide pour `AgentStatus`
#[derive(Debug, Clone)]
pub struct AgentStatusBuilder {
    status: AgentStatus,
}

impl AgentStatusBuilder {
    /// Agent hors ligne, jamais vu
    pub fn new(ip: &str) -> Self {
        let suffix = ip.rsplit(['.', ':']).next().unwrap_or(ip);
        Self {
            status: AgentStatus {
                node_ip: ip.to_string(),
                hostname: format!("gpu-node-{suffix}"),
                status: "offline".into(),
                os_spec: "Ubuntu 22.04".into(),
                ..Default::default()
            },
        }
    }

    /// Agent en ligne, docker actif, aucun service encore lancé
    pub fn starting(ip: &str) -> Self {
        Self::new(ip).online().docker("active").metrics(12.5, 30.0)
    }

    /// Agent prêt: docker actif et un service d'inférence en marche
    pub fn ready(ip: &str) -> Self {
        Self::starting(ip).service("vllm", "vllm/vllm-openai:latest", "5 minutes")
    }

    pub fn online(mut self) -> Self {
        self.status.status = "online".into();
        self
    }

    pub fn offline(mut self) -> Self {
        self.status.status = "offline".into();
        self
    }

    pub fn docker(mut self, state: &str) -> Self {
        self.status.docker_status = state.into();
        self
    }

    pub fn metrics(mut self, cpu: f64, memory: f64) -> Self {
        self.status.cpu_usage = cpu;
        self.status.memory_usage = memory;
        self
    }

    pub fn gpu(mut self, gpu: &str) -> Self {
        self.status.gpu_status = gpu.into();
        self
    }

    pub fn service(mut self, name: &str, image: &str, uptime: &str) -> Self {
        let id = format!("{:012x}", self.status.services.len() + 1);
        self.status.services.push(ServiceStatus {
            id,
            name: name.into(),
            image: image.into(),
            status: format!("Up {uptime}"),
            state: "running".into(),
            uptime: uptime.into(),
        });
        self
    }

    pub fn seen_at(mut self, at: DateTime<Utc>) -> Self {
        self.status.last_seen = Some(at);
        self
    }

    pub fn seen_secs_ago(self, now: DateTime<Utc>, secs: i64) -> Self {
        self.seen_at(now - Duration::seconds(secs))
    }

    pub fn deployed_at(mut self, at: &str) -> Self {
        self.status.deployment_time = Some(at.into());
        self
    }

    pub fn build(self) -> AgentStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_poller_expectations() {
        let starting = AgentStatusBuilder::starting("10.0.0.5").build();
        assert!(starting.is_online() && starting.docker_active());
        assert!(starting.services.is_empty());

        let ready = AgentStatusBuilder::ready("10.0.0.5").build();
        assert_eq!(ready.services.len(), 1);
        assert!(ready.services[0].is_running());
        assert_eq!(ready.hostname, "gpu-node-5");
    }
}
