use std::collections::{BTreeMap, BTreeSet};

use crate::models::{probe_address, split_node_list, DeploymentMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    Text,
    Number,
    Select,
    TextArea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldId {
    MgmtHost,
    MgmtPort,
    TargetNodes,
    InferenceHost,
    InferencePort,
    ModelName,
    RagHost,
    RagPort,
    VectordbHost,
    VectordbPort,
    ParserHost,
    ParserPort,
}

impl FieldId {
    pub const ALL: [FieldId; 12] = [
        FieldId::MgmtHost,
        FieldId::MgmtPort,
        FieldId::TargetNodes,
        FieldId::InferenceHost,
        FieldId::InferencePort,
        FieldId::ModelName,
        FieldId::RagHost,
        FieldId::RagPort,
        FieldId::VectordbHost,
        FieldId::VectordbPort,
        FieldId::ParserHost,
        FieldId::ParserPort,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldId::MgmtHost => "mgmt_host",
            FieldId::MgmtPort => "mgmt_port",
            FieldId::TargetNodes => "target_nodes",
            FieldId::InferenceHost => "inference_host",
            FieldId::InferencePort => "inference_port",
            FieldId::ModelName => "model_name",
            FieldId::RagHost => "rag_host",
            FieldId::RagPort => "rag_port",
            FieldId::VectordbHost => "vectordb_host",
            FieldId::VectordbPort => "vectordb_port",
            FieldId::ParserHost => "parser_host",
            FieldId::ParserPort => "parser_port",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == raw)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            FieldId::MgmtHost => FieldKind::Text,
            FieldId::TargetNodes => FieldKind::TextArea,
            FieldId::MgmtPort
            | FieldId::InferencePort
            | FieldId::RagPort
            | FieldId::VectordbPort
            | FieldId::ParserPort => FieldKind::Number,
            FieldId::InferenceHost
            | FieldId::ModelName
            | FieldId::RagHost
            | FieldId::VectordbHost
            | FieldId::ParserHost => FieldKind::Select,
        }
    }

    /// Conditional section the field lives in, if any.
    pub fn section(self) -> Option<Section> {
        match self {
            FieldId::RagHost | FieldId::RagPort => Some(Section::Rag),
            FieldId::VectordbHost | FieldId::VectordbPort => Some(Section::VectorDb),
            FieldId::ParserHost | FieldId::ParserPort => Some(Section::Parser),
            _ => None,
        }
    }

    /// Host selects populated from the live node list.
    pub fn is_node_dependent(self) -> bool {
        matches!(
            self,
            FieldId::InferenceHost | FieldId::RagHost | FieldId::VectordbHost | FieldId::ParserHost
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChoiceGroup {
    Mode,
    Platform,
    VectorDb,
}

impl ChoiceGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            ChoiceGroup::Mode => "mode",
            ChoiceGroup::Platform => "platform",
            ChoiceGroup::VectorDb => "vector_db",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mode" => Some(Self::Mode),
            "platform" => Some(Self::Platform),
            "vector_db" | "vectordb" => Some(Self::VectorDb),
            _ => None,
        }
    }

    pub fn options(self) -> &'static [&'static str] {
        match self {
            ChoiceGroup::Mode => &["new_deployment", "integrate_existing"],
            ChoiceGroup::Platform => &["nvidia", "ascend"],
            ChoiceGroup::VectorDb => &["milvus", "qdrant", "chroma"],
        }
    }

    pub fn section(self) -> Option<Section> {
        match self {
            ChoiceGroup::VectorDb => Some(Section::VectorDb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Rag,
    VectorDb,
    Parser,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Rag, Section::VectorDb, Section::Parser];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Rag => "rag",
            Section::VectorDb => "vectordb",
            Section::Parser => "parser",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rag" => Some(Self::Rag),
            "vectordb" | "vector_db" => Some(Self::VectorDb),
            "parser" => Some(Self::Parser),
            _ => None,
        }
    }
}

/// Raw operator input, exactly as typed or chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    values: BTreeMap<FieldId, String>,
    choices: BTreeMap<ChoiceGroup, String>,
    enabled: BTreeSet<Section>,
    node_choices: Vec<String>,
    models: Vec<String>,
}

impl Default for FormState {
    fn default() -> Self {
        let mut form = Self {
            values: BTreeMap::new(),
            choices: BTreeMap::new(),
            enabled: BTreeSet::new(),
            node_choices: Vec::new(),
            models: Vec::new(),
        };
        form.values.insert(FieldId::InferencePort, "8000".into());
        form.values.insert(FieldId::RagPort, "3001".into());
        form.values.insert(FieldId::VectordbPort, "19530".into());
        form.values.insert(FieldId::ParserPort, "8010".into());
        form.choices.insert(ChoiceGroup::Mode, DeploymentMode::NewDeployment.as_str().into());
        form.choices.insert(ChoiceGroup::VectorDb, "milvus".into());
        form.enabled.insert(Section::Rag);
        form
    }
}

impl FormState {
    pub fn value(&self, field: FieldId) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    pub(crate) fn set_value(&mut self, field: FieldId, value: String) {
        self.values.insert(field, value);
    }

    pub fn choice(&self, group: ChoiceGroup) -> Option<&str> {
        self.choices.get(&group).map(String::as_str)
    }

    /// Returns false when `value` is not an option of the group.
    pub(crate) fn set_choice(&mut self, group: ChoiceGroup, value: &str) -> bool {
        if !group.options().contains(&value) {
            return false;
        }
        self.choices.insert(group, value.to_string());
        true
    }

    pub fn is_enabled(&self, section: Section) -> bool {
        self.enabled.contains(&section)
    }

    pub(crate) fn set_enabled(&mut self, section: Section, on: bool) {
        if on {
            self.enabled.insert(section);
        } else {
            self.enabled.remove(&section);
        }
    }

    /// Hidden when its conditional section is switched off.
    pub fn is_visible(&self, field: FieldId) -> bool {
        field.section().map_or(true, |s| self.is_enabled(s))
    }

    pub fn is_group_visible(&self, group: ChoiceGroup) -> bool {
        group.section().map_or(true, |s| self.is_enabled(s))
    }

    pub fn mode(&self) -> DeploymentMode {
        self.choice(ChoiceGroup::Mode)
            .and_then(DeploymentMode::parse)
            .unwrap_or(DeploymentMode::NewDeployment)
    }

    /// Typed target node entries, `host[:port]`, in order.
    pub fn target_nodes(&self) -> Vec<String> {
        split_node_list(self.value(FieldId::TargetNodes))
    }

    /// Probe addresses of the typed target nodes, deduplicated.
    pub fn target_addresses(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for addr in self.target_nodes().iter().map(|n| probe_address(n)) {
            if !addr.is_empty() && !out.contains(&addr) {
                out.push(addr);
            }
        }
        out
    }

    pub fn node_choices(&self) -> &[String] {
        &self.node_choices
    }

    pub(crate) fn set_node_choices(&mut self, nodes: Vec<String>) {
        self.node_choices = nodes;
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub(crate) fn set_models(&mut self, models: Vec<String>) {
        self.models = models;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_wizard_layout() {
        let form = FormState::default();
        assert_eq!(form.mode(), DeploymentMode::NewDeployment);
        assert_eq!(form.value(FieldId::InferencePort), "8000");
        assert_eq!(form.value(FieldId::RagPort), "3001");
        assert!(form.is_enabled(Section::Rag));
        assert!(!form.is_enabled(Section::VectorDb));
        assert!(!form.is_enabled(Section::Parser));
        assert_eq!(form.choice(ChoiceGroup::Platform), None);
    }

    #[test]
    fn hidden_sections_hide_their_fields() {
        let mut form = FormState::default();
        assert!(!form.is_visible(FieldId::ParserHost));
        assert!(form.is_visible(FieldId::RagHost));
        assert!(form.is_visible(FieldId::MgmtHost));
        form.set_enabled(Section::Rag, false);
        assert!(!form.is_visible(FieldId::RagPort));
        assert!(!form.is_group_visible(ChoiceGroup::VectorDb));
    }

    #[test]
    fn choices_outside_the_group_are_refused() {
        let mut form = FormState::default();
        assert!(!form.set_choice(ChoiceGroup::Platform, "tpu"));
        assert!(form.set_choice(ChoiceGroup::Platform, "ascend"));
        assert_eq!(form.choice(ChoiceGroup::Platform), Some("ascend"));
    }

    #[test]
    fn target_addresses_are_deduplicated() {
        let mut form = FormState::default();
        form.set_value(FieldId::TargetNodes, "10.0.0.5:22\n10.0.0.5:2222, 10.0.0.6".into());
        assert_eq!(form.target_addresses(), vec!["10.0.0.5", "10.0.0.6"]);
        assert_eq!(form.target_nodes().len(), 3);
    }
}
