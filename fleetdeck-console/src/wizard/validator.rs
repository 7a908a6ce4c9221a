use super::form::{ChoiceGroup, FieldId, FormState};
use super::gate::VerificationGate;
use super::steps::{step, StepCheck};

/// Why a step cannot be left forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
    EmptyField(FieldId),
    NoSelection(ChoiceGroup),
    NoTargetNodes,
    SshUnverified,
    InferenceUnverified,
}

impl Blocker {
    pub fn describe(&self) -> String {
        match self {
            Blocker::EmptyField(f) => format!("{} is required", f.as_str()),
            Blocker::NoSelection(g) => format!("choose a {}", g.as_str()),
            Blocker::NoTargetNodes => "enter at least one target node".into(),
            Blocker::SshUnverified => "verify SSH connectivity first".into(),
            Blocker::InferenceUnverified => "verify the inference service first".into(),
        }
    }
}

/// Every blocker of step `number`, looking only at visible fields.
pub fn blockers(number: u8, form: &FormState, gate: &VerificationGate) -> Vec<Blocker> {
    let spec = step(number);
    let mut out = Vec::new();

    for &field in spec.fields {
        if form.is_visible(field) && form.value(field).trim().is_empty() {
            out.push(Blocker::EmptyField(field));
        }
    }
    for &group in spec.groups {
        if form.is_group_visible(group) && form.choice(group).is_none() {
            out.push(Blocker::NoSelection(group));
        }
    }
    match spec.check {
        Some(StepCheck::NodeList) => {
            if form.target_nodes().is_empty() {
                out.push(Blocker::NoTargetNodes);
            }
            if !gate.ssh() {
                out.push(Blocker::SshUnverified);
            }
        }
        Some(StepCheck::InferenceConnection) => {
            if !gate.inference() {
                out.push(Blocker::InferenceUnverified);
            }
        }
        None => {}
    }
    out
}

/// Forward navigation is allowed iff the step has no blockers.
pub fn validate(number: u8, form: &FormState, gate: &VerificationGate) -> bool {
    blockers(number, form, gate).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::form::Section;

    fn step_one_filled() -> FormState {
        let mut form = FormState::default();
        form.set_value(FieldId::MgmtHost, "10.0.0.1".into());
        form.set_value(FieldId::MgmtPort, "3000".into());
        form.set_value(FieldId::TargetNodes, "10.0.0.5:22".into());
        form
    }

    #[test]
    fn node_step_needs_ssh_verification() {
        let form = step_one_filled();
        let mut gate = VerificationGate::default();
        assert_eq!(blockers(1, &form, &gate), vec![Blocker::SshUnverified]);
        gate.confirm_ssh();
        assert!(validate(1, &form, &gate));
    }

    #[test]
    fn whitespace_only_counts_as_empty() {
        let mut form = step_one_filled();
        form.set_value(FieldId::MgmtPort, "   ".into());
        let mut gate = VerificationGate::default();
        gate.confirm_ssh();
        assert_eq!(blockers(1, &form, &gate), vec![Blocker::EmptyField(FieldId::MgmtPort)]);
    }

    #[test]
    fn separators_alone_are_not_a_node_list() {
        let mut form = step_one_filled();
        form.set_value(FieldId::TargetNodes, " ,\n ".into());
        let mut gate = VerificationGate::default();
        gate.confirm_ssh();
        assert!(blockers(1, &form, &gate).contains(&Blocker::NoTargetNodes));
    }

    #[test]
    fn platform_must_be_chosen() {
        let mut form = FormState::default();
        let gate = VerificationGate::default();
        assert_eq!(blockers(2, &form, &gate), vec![Blocker::NoSelection(ChoiceGroup::Platform)]);
        form.set_choice(ChoiceGroup::Platform, "nvidia");
        assert!(validate(2, &form, &gate));
    }

    #[test]
    fn inference_step_needs_the_inference_flag() {
        let mut form = FormState::default();
        form.set_value(FieldId::InferenceHost, "10.0.0.5".into());
        form.set_value(FieldId::ModelName, "qwen2".into());
        let mut gate = VerificationGate::default();
        assert_eq!(blockers(3, &form, &gate), vec![Blocker::InferenceUnverified]);
        gate.confirm_inference();
        assert!(validate(3, &form, &gate));
    }

    #[test]
    fn hidden_sections_are_exempt() {
        let mut form = FormState::default();
        let gate = VerificationGate::default();
        assert_eq!(blockers(4, &form, &gate), vec![Blocker::EmptyField(FieldId::RagHost)]);

        form.set_enabled(Section::Rag, false);
        assert!(validate(4, &form, &gate));

        form.set_enabled(Section::Parser, true);
        assert_eq!(blockers(4, &form, &gate), vec![Blocker::EmptyField(FieldId::ParserHost)]);
    }

    #[test]
    fn review_step_is_always_valid() {
        assert!(validate(5, &FormState::default(), &VerificationGate::default()));
    }
}
