//! Wizard state machine.
//!
//! [`transition`] is pure: it takes the current [`WizardState`] and one
//! [`WizardEvent`], and returns the next state plus an [`Outcome`] listing the
//! side effects to run and the notices to show. Network completions come
//! back in as events (`ProbeFinished`, `NodesFetched`, ...).

use tracing::{debug, warn};

use super::form::{ChoiceGroup, FieldId, FormState, Section};
use super::gate::VerificationGate;
use super::payload::build_config;
use super::steps::{step, TOTAL_STEPS};
use super::validator::validate;
use crate::models::{
    probe_address, DeploymentConfig, DeploymentMode, DiscoverRequest, HardwareReport,
    HardwareRequest, NodeRecord, Platform, ProbeKind, ProbeReply, ProbeRequest, DEFAULT_SSH_PORT,
};

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    Edit(FieldId, String),
    Choose(ChoiceGroup, String),
    Toggle(Section, bool),
    Next,
    Back,
    Probe(ProbeKind),
    ProbeFinished { request: ProbeRequest, result: Result<ProbeReply, String> },
    DiscoverModels,
    ModelsDiscovered { request: DiscoverRequest, result: Result<Vec<String>, String> },
    DetectHardware,
    HardwareDetected(Result<HardwareReport, String>),
    NodesFetched(Result<Vec<String>, String>),
    SaveNodes,
    NodesSaved(Result<(), String>),
    Submit,
    SubmitFinished(Result<(), String>),
    Reset,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchNodes,
    SaveNodes(Vec<String>),
    Probe(ProbeRequest),
    DiscoverModels(DiscoverRequest),
    DetectHardware(HardwareRequest),
    Generate(DeploymentConfig),
    /// Hand the node address over to the deployment poller.
    StartPoller(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    pub notices: Vec<Notice>,
}

impl Outcome {
    fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn info(&mut self, text: impl Into<String>) {
        self.notices.push(Notice { level: NoticeLevel::Info, text: text.into() });
    }

    fn success(&mut self, text: impl Into<String>) {
        self.notices.push(Notice { level: NoticeLevel::Success, text: text.into() });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.notices.push(Notice { level: NoticeLevel::Error, text: text.into() });
    }
}

/// One provisioning session: position, verification flags and form input.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    step: u8,
    gate: VerificationGate,
    form: FormState,
    submitted: Option<DeploymentConfig>,
    submitting: bool,
    handoff: Option<String>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: 1,
            gate: VerificationGate::default(),
            form: FormState::default(),
            submitted: None,
            submitting: false,
            handoff: None,
        }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn total_steps(&self) -> u8 {
        TOTAL_STEPS
    }

    pub fn is_terminal(&self) -> bool {
        self.step == TOTAL_STEPS
    }

    pub fn gate(&self) -> &VerificationGate {
        &self.gate
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Whether Next (or Submit on the last step) is enabled.
    pub fn can_advance(&self) -> bool {
        validate(self.step, &self.form, &self.gate)
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Address handed to the poller once the submission succeeded.
    pub fn handoff(&self) -> Option<&str> {
        self.handoff.as_deref()
    }

    pub fn submitted(&self) -> Option<&DeploymentConfig> {
        self.submitted.as_ref()
    }

    /// The request `kind` would send for the current inputs.
    pub fn probe_request(&self, kind: ProbeKind) -> Option<ProbeRequest> {
        let form = &self.form;
        let (host, port) = match kind {
            ProbeKind::Ssh => {
                let nodes = form.target_nodes();
                if nodes.is_empty() {
                    return None;
                }
                (nodes.join("\n"), DEFAULT_SSH_PORT.to_string())
            }
            ProbeKind::Inference => pair(form, FieldId::InferenceHost, FieldId::InferencePort)?,
            ProbeKind::RagApp => pair(form, FieldId::RagHost, FieldId::RagPort)?,
            ProbeKind::Vectordb => pair(form, FieldId::VectordbHost, FieldId::VectordbPort)?,
            ProbeKind::Parser => pair(form, FieldId::ParserHost, FieldId::ParserPort)?,
        };
        Some(ProbeRequest { kind, host, port })
    }

    pub fn discover_request(&self) -> Option<DiscoverRequest> {
        let mode = self.form.mode();
        let host = self.form.value(FieldId::InferenceHost).trim().to_string();
        if mode == DeploymentMode::IntegrateExisting && host.is_empty() {
            return None;
        }
        Some(DiscoverRequest {
            host,
            port: self.form.value(FieldId::InferencePort).trim().to_string(),
            mode,
        })
    }

    pub fn hardware_request(&self) -> Option<HardwareRequest> {
        let first = self.form.target_nodes().into_iter().next()?;
        let record = NodeRecord::parse(&first)?;
        Some(HardwareRequest { host: record.ip, port: record.ssh_port.to_string() })
    }

    fn enter(&mut self, target: u8, out: &mut Outcome) {
        self.step = target.clamp(1, TOTAL_STEPS);
        debug!(step = self.step, "wizard step entered");
        if step(self.step).is_node_dependent() {
            out.effect(Effect::FetchNodes);
        }
    }

    fn edit(&mut self, field: FieldId, value: String) {
        self.form.set_value(field, value);
        self.gate.field_edited(field);
    }

    /// Rebuild node selects: API list first, then typed nodes, deduplicated.
    fn merge_node_choices(&mut self, api_nodes: &[String]) {
        let mut merged: Vec<String> = Vec::new();
        let typed = self.form.target_addresses();
        for addr in api_nodes.iter().map(|n| probe_address(n)).chain(typed) {
            if !addr.is_empty() && !merged.contains(&addr) {
                merged.push(addr);
            }
        }
        for field in FieldId::ALL.into_iter().filter(|f| f.is_node_dependent()) {
            let current = self.form.value(field).trim().to_string();
            if !current.is_empty() && !merged.contains(&current) {
                self.edit(field, String::new());
            }
        }
        self.form.set_node_choices(merged);
    }

    fn clear_models(&mut self) {
        self.form.set_models(Vec::new());
        if !self.form.value(FieldId::ModelName).is_empty() {
            self.form.set_value(FieldId::ModelName, String::new());
        }
    }
}

fn pair(form: &FormState, host: FieldId, port: FieldId) -> Option<(String, String)> {
    let host = form.value(host).trim();
    let port = form.value(port).trim();
    if host.is_empty() || port.is_empty() {
        return None;
    }
    Some((host.to_string(), port.to_string()))
}

/// Apply one event.
pub fn transition(mut state: WizardState, event: WizardEvent) -> (WizardState, Outcome) {
    let mut out = Outcome::default();
    match event {
        WizardEvent::Edit(field, value) => state.edit(field, value),

        WizardEvent::Choose(group, value) => {
            if !state.form.set_choice(group, &value) {
                out.error(format!("`{}` is not a valid {}", value, group.as_str()));
                return (state, out);
            }
            if group == ChoiceGroup::Mode {
                state.gate.mode_changed();
                state.clear_models();
                if state.form.mode() == DeploymentMode::NewDeployment {
                    if let Some(req) = state.discover_request() {
                        out.effect(Effect::DiscoverModels(req));
                    }
                }
            }
        }

        WizardEvent::Toggle(section, on) => state.form.set_enabled(section, on),

        WizardEvent::Next => {
            if state.is_terminal() || !state.can_advance() {
                return (state, out);
            }
            let target = state.step + 1;
            state.enter(target, &mut out);
            if target == 2 {
                if let Some(req) = state.hardware_request() {
                    out.effect(Effect::DetectHardware(req));
                }
            }
            if target == 3 && state.form.mode() == DeploymentMode::NewDeployment {
                if let Some(req) = state.discover_request() {
                    out.effect(Effect::DiscoverModels(req));
                }
            }
        }

        WizardEvent::Back => {
            if state.step > 1 {
                let target = state.step - 1;
                state.enter(target, &mut out);
            }
        }

        WizardEvent::Probe(kind) => match state.probe_request(kind) {
            Some(req) => out.effect(Effect::Probe(req)),
            None => out.error(format!("fill in the {} host and port first", kind.as_str())),
        },

        WizardEvent::ProbeFinished { request, result } => {
            let current = state.probe_request(request.kind).as_ref() == Some(&request);
            let label = request.kind.as_str();
            match result {
                Ok(reply) if reply.is_success() => {
                    if !current {
                        out.info(format!("{label} inputs changed during the check, verify again"));
                    } else {
                        match request.kind {
                            ProbeKind::Ssh => state.gate.confirm_ssh(),
                            ProbeKind::Inference => state.gate.confirm_inference(),
                            _ => {}
                        }
                        out.success(if reply.message.is_empty() {
                            format!("{label} connection verified")
                        } else {
                            reply.message
                        });
                    }
                }
                failed => {
                    if current {
                        match request.kind {
                            ProbeKind::Ssh => state.gate.invalidate_ssh(),
                            ProbeKind::Inference => state.gate.invalidate_inference(),
                            _ => {}
                        }
                    }
                    let reason = match failed {
                        Ok(reply) => reply.message,
                        Err(e) => e,
                    };
                    out.error(format!("{label} check failed: {reason}"));
                }
            }
        }

        WizardEvent::DiscoverModels => match state.discover_request() {
            Some(req) => out.effect(Effect::DiscoverModels(req)),
            None => out.error("select an inference host first"),
        },

        WizardEvent::ModelsDiscovered { request, result } => {
            if state.discover_request().as_ref() != Some(&request) {
                debug!(?request, "stale model discovery ignored");
                return (state, out);
            }
            match result {
                Ok(models) => {
                    let selected = state.form.value(FieldId::ModelName).to_string();
                    if !selected.is_empty() && !models.contains(&selected) {
                        state.form.set_value(FieldId::ModelName, String::new());
                    }
                    if request.mode == DeploymentMode::NewDeployment && !models.is_empty() {
                        state.gate.confirm_inference();
                    }
                    if models.is_empty() {
                        out.info("no models found");
                    }
                    state.form.set_models(models);
                }
                Err(e) => out.error(format!("model discovery failed: {e}")),
            }
        }

        WizardEvent::DetectHardware => match state.hardware_request() {
            Some(req) => out.effect(Effect::DetectHardware(req)),
            None => out.error("enter at least one target node first"),
        },

        WizardEvent::HardwareDetected(result) => match result {
            Ok(report) => match report.detected_platform() {
                Some(platform) if state.form.choice(ChoiceGroup::Platform).is_none() => {
                    state.form.set_choice(ChoiceGroup::Platform, platform.as_str());
                    out.info(format!("detected {} hardware", platform_label(platform)));
                }
                Some(platform) => {
                    let label = platform_label(platform);
                    out.info(format!("detected {label} hardware (keeping your choice)"))
                }
                None if !report.details.is_empty() => out.info(report.details),
                None => out.info("hardware could not be detected"),
            },
            Err(e) => out.info(format!("hardware detection failed: {e}")),
        },

        WizardEvent::NodesFetched(result) => match result {
            Ok(nodes) => state.merge_node_choices(&nodes),
            Err(e) => {
                warn!(error = %e, "node list fetch failed, using typed nodes");
                state.merge_node_choices(&[]);
            }
        },

        WizardEvent::SaveNodes => {
            let nodes = state.form.target_nodes();
            if nodes.is_empty() {
                out.error("enter at least one target node first");
            } else {
                out.effect(Effect::SaveNodes(nodes));
            }
        }

        WizardEvent::NodesSaved(result) => match result {
            Ok(()) => out.success("node list saved"),
            Err(e) => out.error(format!("saving nodes failed: {e}")),
        },

        WizardEvent::Submit => {
            if !state.is_terminal() || state.submitting || state.handoff.is_some() {
                return (state, out);
            }
            if let Some(bad) = (1..=TOTAL_STEPS).find(|&n| !validate(n, &state.form, &state.gate)) {
                out.error(format!("step {} ({}) is incomplete", bad, step(bad).title));
                return (state, out);
            }
            match build_config(&state.form) {
                Ok(cfg) => {
                    state.submitting = true;
                    state.submitted = Some(cfg.clone());
                    out.effect(Effect::Generate(cfg));
                }
                Err(e) => out.error(format!("cannot submit: {e}")),
            }
        }

        WizardEvent::SubmitFinished(result) => {
            state.submitting = false;
            match result {
                Ok(()) => {
                    out.success("deployment started");
                    match state.submitted.as_ref().and_then(DeploymentConfig::first_node_address) {
                        Some(addr) => {
                            state.handoff = Some(addr.clone());
                            out.effect(Effect::StartPoller(addr));
                        }
                        None => out.info("no target node to watch"),
                    }
                }
                Err(e) => {
                    state.submitted = None;
                    out.error(format!("deployment failed: {e}"));
                }
            }
        }

        WizardEvent::Reset => state = WizardState::new(),
    }
    (state, out)
}

fn platform_label(platform: Platform) -> &'static str {
    match platform {
        Platform::Nvidia => "NVIDIA",
        Platform::Ascend => "Ascend",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(state: WizardState, events: Vec<WizardEvent>) -> (WizardState, Vec<Outcome>) {
        let mut outs = Vec::new();
        let mut state = state;
        for ev in events {
            let (next, out) = transition(state, ev);
            state = next;
            outs.push(out);
        }
        (state, outs)
    }

    fn ssh_ok(state: &WizardState) -> WizardEvent {
        WizardEvent::ProbeFinished {
            request: state.probe_request(ProbeKind::Ssh).unwrap(),
            result: Ok(ProbeReply::success("ok")),
        }
    }

    fn on_step_one() -> WizardState {
        apply(
            WizardState::new(),
            vec![
                WizardEvent::Edit(FieldId::MgmtHost, "10.0.0.1".into()),
                WizardEvent::Edit(FieldId::MgmtPort, "3000".into()),
                WizardEvent::Edit(FieldId::TargetNodes, "10.0.0.5:22".into()),
            ],
        )
        .0
    }

    #[test]
    fn next_is_silent_while_blocked() {
        let (state, out) = transition(on_step_one(), WizardEvent::Next);
        assert_eq!(state.step(), 1);
        assert_eq!(out, Outcome::default());
    }

    #[test]
    fn ssh_success_opens_step_one_and_detects_hardware() {
        let state = on_step_one();
        let ev = ssh_ok(&state);
        let (state, _) = transition(state, ev);
        assert!(state.gate().ssh());
        assert!(state.can_advance());

        let (state, out) = transition(state, WizardEvent::Next);
        assert_eq!(state.step(), 2);
        assert_eq!(
            out.effects,
            vec![Effect::DetectHardware(HardwareRequest {
                host: "10.0.0.5".into(),
                port: "22".into()
            })]
        );
    }

    #[test]
    fn editing_nodes_after_probe_drops_ssh() {
        let state = on_step_one();
        let ev = ssh_ok(&state);
        let (state, _) = apply(
            state,
            vec![ev, WizardEvent::Edit(FieldId::TargetNodes, "10.0.0.5:22\n10.0.0.6".into())],
        );
        assert!(!state.gate().ssh());
        assert!(!state.can_advance());
    }

    #[test]
    fn stale_probe_success_is_not_counted() {
        let state = on_step_one();
        let stale = ssh_ok(&state);
        let (state, outs) = apply(
            state,
            vec![WizardEvent::Edit(FieldId::TargetNodes, "10.0.0.9".into()), stale],
        );
        assert!(!state.gate().ssh());
        assert_eq!(outs[1].notices[0].level, NoticeLevel::Info);
    }

    #[test]
    fn failed_probe_clears_flag_and_is_surfaced() {
        let state = on_step_one();
        let ok = ssh_ok(&state);
        let request = state.probe_request(ProbeKind::Ssh).unwrap();
        let (state, outs) = apply(
            state,
            vec![
                ok,
                WizardEvent::ProbeFinished {
                    request,
                    result: Ok(ProbeReply::error("auth failed")),
                },
            ],
        );
        assert!(!state.gate().ssh());
        assert_eq!(outs[1].notices[0].level, NoticeLevel::Error);
        assert!(outs[1].notices[0].text.contains("auth failed"));
    }

    #[test]
    fn probe_without_inputs_is_refused() {
        let (_, out) = transition(WizardState::new(), WizardEvent::Probe(ProbeKind::Inference));
        assert!(out.effects.is_empty());
        assert_eq!(out.notices[0].level, NoticeLevel::Error);
    }

    #[test]
    fn mode_change_always_drops_inference() {
        let mut state = WizardState::new();
        state.gate.confirm_inference();
        state.form.set_models(vec!["qwen2".into()]);
        state.form.set_value(FieldId::ModelName, "qwen2".into());

        let (state, out) =
            transition(state, WizardEvent::Choose(ChoiceGroup::Mode, "integrate_existing".into()));
        assert!(!state.gate().inference());
        assert!(state.form().models().is_empty());
        assert_eq!(state.form().value(FieldId::ModelName), "");
        assert!(out.effects.is_empty());

        let (state, out) =
            transition(state, WizardEvent::Choose(ChoiceGroup::Mode, "new_deployment".into()));
        assert!(!state.gate().inference());
        assert!(matches!(
            out.effects[0],
            Effect::DiscoverModels(ref r) if r.mode == DeploymentMode::NewDeployment
        ));
    }

    #[test]
    fn unknown_choice_is_rejected() {
        let choose = WizardEvent::Choose(ChoiceGroup::Platform, "tpu".into());
        let (state, out) = transition(WizardState::new(), choose);
        assert_eq!(state.form().choice(ChoiceGroup::Platform), None);
        assert_eq!(out.notices[0].level, NoticeLevel::Error);
    }

    #[test]
    fn local_discovery_verifies_inference_only_in_new_deployment() {
        let state = WizardState::new();
        let request = state.discover_request().unwrap();
        let (state, _) = transition(
            state,
            WizardEvent::ModelsDiscovered { request, result: Ok(vec!["qwen2".into()]) },
        );
        assert!(state.gate().inference());
        assert_eq!(state.form().models(), ["qwen2".to_string()]);

        let (state, _) = apply(
            WizardState::new(),
            vec![
                WizardEvent::Choose(ChoiceGroup::Mode, "integrate_existing".into()),
                WizardEvent::Edit(FieldId::InferenceHost, "10.0.0.7".into()),
            ],
        );
        let request = state.discover_request().unwrap();
        let (state, _) = transition(
            state,
            WizardEvent::ModelsDiscovered { request, result: Ok(vec!["llama3".into()]) },
        );
        assert!(!state.gate().inference());
        assert_eq!(state.form().models(), ["llama3".to_string()]);
    }

    #[test]
    fn discovery_from_the_old_mode_is_ignored() {
        let state = WizardState::new();
        let request = state.discover_request().unwrap();
        let (state, _) = apply(
            state,
            vec![
                WizardEvent::Choose(ChoiceGroup::Mode, "integrate_existing".into()),
                WizardEvent::Edit(FieldId::InferenceHost, "10.0.0.7".into()),
                WizardEvent::ModelsDiscovered { request, result: Ok(vec!["qwen2".into()]) },
            ],
        );
        assert!(!state.gate().inference());
        assert!(state.form().models().is_empty());
    }

    #[test]
    fn detected_platform_never_overrides_a_choice() {
        let report = HardwareReport {
            status: "success".into(),
            platform: Some("ascend".into()),
            details: String::new(),
        };
        let (state, _) =
            transition(WizardState::new(), WizardEvent::HardwareDetected(Ok(report.clone())));
        assert_eq!(state.form().choice(ChoiceGroup::Platform), Some("ascend"));

        let (state, _) = apply(
            WizardState::new(),
            vec![
                WizardEvent::Choose(ChoiceGroup::Platform, "nvidia".into()),
                WizardEvent::HardwareDetected(Ok(report)),
            ],
        );
        assert_eq!(state.form().choice(ChoiceGroup::Platform), Some("nvidia"));
    }

    #[test]
    fn fetched_nodes_merge_with_typed_ones() {
        let (state, _) = apply(
            WizardState::new(),
            vec![
                WizardEvent::Edit(FieldId::TargetNodes, "10.0.0.9:22\n10.0.0.5".into()),
                WizardEvent::Edit(FieldId::InferenceHost, "10.0.0.5".into()),
                WizardEvent::Edit(FieldId::RagHost, "10.9.9.9".into()),
                WizardEvent::NodesFetched(Ok(vec!["10.0.0.5:22".into(), "10.0.0.6".into()])),
            ],
        );
        assert_eq!(state.form().node_choices(), ["10.0.0.5", "10.0.0.6", "10.0.0.9"]);
        assert_eq!(state.form().value(FieldId::InferenceHost), "10.0.0.5");
        assert_eq!(state.form().value(FieldId::RagHost), "");
    }

    #[test]
    fn fetch_failure_falls_back_to_typed_nodes() {
        let (state, out) = apply(
            WizardState::new(),
            vec![
                WizardEvent::Edit(FieldId::TargetNodes, "10.0.0.9:22".into()),
                WizardEvent::NodesFetched(Err("connection refused".into())),
            ],
        );
        assert_eq!(state.form().node_choices(), ["10.0.0.9"]);
        assert!(out[1].notices.is_empty());
    }

    #[test]
    fn back_is_never_blocked_and_stops_at_one() {
        let mut state = WizardState::new();
        state.step = 3;
        let (state, out) = transition(state, WizardEvent::Back);
        assert_eq!(state.step(), 2);
        assert!(out.effects.is_empty());
        let (state, _) = transition(state, WizardEvent::Back);
        let (state, _) = transition(state, WizardEvent::Back);
        assert_eq!(state.step(), 1);
    }

    #[test]
    fn submit_outside_the_last_step_does_nothing() {
        let (state, out) = transition(on_step_one(), WizardEvent::Submit);
        assert_eq!(state.step(), 1);
        assert_eq!(out, Outcome::default());
    }

    #[test]
    fn submit_failure_keeps_position_and_allows_resubmit() {
        let mut state = on_step_one();
        let ev = ssh_ok(&state);
        state = transition(state, ev).0;
        state.form.set_choice(ChoiceGroup::Platform, "nvidia");
        state.form.set_value(FieldId::InferenceHost, "10.0.0.5".into());
        state.form.set_value(FieldId::ModelName, "qwen2".into());
        state.form.set_enabled(Section::Rag, false);
        state.gate.confirm_inference();
        state.step = TOTAL_STEPS;

        let (state, out) = transition(state, WizardEvent::Submit);
        assert!(state.is_submitting());
        assert!(matches!(out.effects[..], [Effect::Generate(_)]));

        let (state, out) = transition(state, WizardEvent::Submit);
        assert!(out.effects.is_empty());

        let (state, out) = transition(state, WizardEvent::SubmitFinished(Err("HTTP 500".into())));
        assert_eq!(state.step(), TOTAL_STEPS);
        assert!(!state.is_submitting());
        assert!(out.effects.is_empty());
        assert_eq!(out.notices[0].level, NoticeLevel::Error);

        let (_, out) = transition(state, WizardEvent::Submit);
        assert_eq!(out.effects.len(), 1);
    }

    #[test]
    fn submit_revalidates_earlier_steps() {
        let mut state = on_step_one();
        state.form.set_choice(ChoiceGroup::Platform, "nvidia");
        state.step = TOTAL_STEPS;
        let (state, out) = transition(state, WizardEvent::Submit);
        assert!(!state.is_submitting());
        assert!(out.notices[0].text.contains("step 1"));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = on_step_one();
        state.gate.confirm_ssh();
        state.step = 4;
        let (state, _) = transition(state, WizardEvent::Reset);
        assert_eq!(state, WizardState::new());
    }
}
