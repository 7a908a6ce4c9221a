use super::form::{ChoiceGroup, FieldId};

pub const TOTAL_STEPS: u8 = 5;

/// Network check a step needs on top of its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCheck {
    NodeList,
    InferenceConnection,
}

#[derive(Debug)]
pub struct StepSpec {
    pub number: u8,
    pub title: &'static str,
    pub fields: &'static [FieldId],
    pub groups: &'static [ChoiceGroup],
    pub check: Option<StepCheck>,
}

impl StepSpec {
    /// Steps whose host selects come from the live node list.
    pub fn is_node_dependent(&self) -> bool {
        self.fields.iter().any(|f| f.is_node_dependent())
    }
}

pub static STEPS: [StepSpec; TOTAL_STEPS as usize] = [
    StepSpec {
        number: 1,
        title: "Target nodes",
        fields: &[FieldId::MgmtHost, FieldId::MgmtPort, FieldId::TargetNodes],
        groups: &[],
        check: Some(StepCheck::NodeList),
    },
    StepSpec {
        number: 2,
        title: "Mode & platform",
        fields: &[],
        groups: &[ChoiceGroup::Mode, ChoiceGroup::Platform],
        check: None,
    },
    StepSpec {
        number: 3,
        title: "Inference service",
        fields: &[FieldId::InferenceHost, FieldId::InferencePort, FieldId::ModelName],
        groups: &[],
        check: Some(StepCheck::InferenceConnection),
    },
    StepSpec {
        number: 4,
        title: "Knowledge services",
        fields: &[
            FieldId::RagHost,
            FieldId::RagPort,
            FieldId::VectordbHost,
            FieldId::VectordbPort,
            FieldId::ParserHost,
            FieldId::ParserPort,
        ],
        groups: &[ChoiceGroup::VectorDb],
        check: None,
    },
    StepSpec {
        number: 5,
        title: "Review & deploy",
        fields: &[],
        groups: &[],
        check: None,
    },
];

/// Descriptor of step `number`, clamped into `1..=TOTAL_STEPS`.
pub fn step(number: u8) -> &'static StepSpec {
    let idx = number.clamp(1, TOTAL_STEPS) as usize - 1;
    &STEPS[idx]
}
