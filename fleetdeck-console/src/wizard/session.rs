use std::collections::VecDeque;
use tracing::{info, warn};

use super::controller::{transition, Effect, Notice, WizardEvent, WizardState};
use crate::api::SharedApi;
use crate::poller::{DeploymentPoller, PollTask};

/// Drives a [`WizardState`] against a live `FleetApi`.
///
/// Every effect is awaited in turn and its completion is fed back as an
/// event, so a single `dispatch` settles the wizard before returning.
/// With a poller attached, an accepted deployment starts polling its first
/// node right away; the running [`PollTask`] is kept for the caller.
pub struct WizardSession {
    api: SharedApi,
    state: WizardState,
    poller: Option<DeploymentPoller>,
    poll: Option<PollTask>,
}

impl WizardSession {
    pub fn new(api: SharedApi) -> Self {
        Self { api, state: WizardState::new(), poller: None, poll: None }
    }

    pub fn with_poller(api: SharedApi, poller: DeploymentPoller) -> Self {
        Self { poller: Some(poller), ..Self::new(api) }
    }

    /// Poll started by the hand-off, if any. Taken once.
    pub fn take_poll(&mut self) -> Option<PollTask> {
        self.poll.take()
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Address to watch once the deployment was accepted.
    pub fn handoff(&self) -> Option<&str> {
        self.state.handoff()
    }

    pub async fn dispatch(&mut self, event: WizardEvent) -> Vec<Notice> {
        let mut queue = VecDeque::from([event]);
        let mut notices = Vec::new();
        while let Some(event) = queue.pop_front() {
            let (next, outcome) = transition(std::mem::take(&mut self.state), event);
            self.state = next;
            notices.extend(outcome.notices);
            for effect in outcome.effects {
                if let Some(done) = self.run(effect).await {
                    queue.push_back(done);
                }
            }
        }
        notices
    }

    async fn run(&mut self, effect: Effect) -> Option<WizardEvent> {
        match effect {
            Effect::FetchNodes => {
                let result = self.api.list_nodes().await.map_err(|e| e.operator_message());
                Some(WizardEvent::NodesFetched(result))
            }
            Effect::SaveNodes(nodes) => {
                info!(count = nodes.len(), "saving target nodes");
                let result = self.api.save_nodes(&nodes).await.map_err(|e| e.operator_message());
                Some(WizardEvent::NodesSaved(result))
            }
            Effect::Probe(request) => {
                info!(kind = request.kind.as_str(), host = %request.host, "testing connection");
                let result =
                    self.api.test_connection(&request).await.map_err(|e| e.operator_message());
                Some(WizardEvent::ProbeFinished { request, result })
            }
            Effect::DiscoverModels(request) => {
                let result = self
                    .api
                    .discover_models(&request)
                    .await
                    .map(|models| models.into_iter().map(|m| m.id).collect())
                    .map_err(|e| e.operator_message());
                Some(WizardEvent::ModelsDiscovered { request, result })
            }
            Effect::DetectHardware(request) => {
                let result =
                    self.api.detect_hardware(&request).await.map_err(|e| e.operator_message());
                Some(WizardEvent::HardwareDetected(result))
            }
            Effect::Generate(config) => {
                info!(
                    nodes = config.target_nodes.len(),
                    mode = config.mode.as_str(),
                    "submitting deployment"
                );
                let result = match self.api.generate(&config).await {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        warn!(error = %e, "deployment submission failed");
                        Err(e.operator_message())
                    }
                };
                Some(WizardEvent::SubmitFinished(result))
            }
            Effect::StartPoller(addr) => {
                info!(node = %addr, "handing off to deployment poller");
                if let Some(poller) = &self.poller {
                    let task = poller.start(&addr);
                    if let Some(previous) = std::mem::replace(&mut self.poll, task) {
                        previous.handle.cancel().await;
                    }
                }
                None
            }
        }
    }
}
