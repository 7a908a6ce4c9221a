use super::form::{ChoiceGroup, FieldId, FormState, Section};
use crate::error::PayloadError;
use crate::models::{
    DeploymentConfig, DeploymentMode, Platform, ServiceEndpoint, VectorDbConfig, VectorDbKind,
};

fn required(form: &FormState, field: FieldId) -> Result<String, PayloadError> {
    let value = form.value(field).trim();
    if value.is_empty() {
        return Err(PayloadError::MissingField(field));
    }
    Ok(value.to_string())
}

fn chosen<T>(
    form: &FormState,
    group: ChoiceGroup,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, PayloadError> {
    let raw = form.choice(group).ok_or(PayloadError::MissingChoice(group))?;
    parse(raw).ok_or_else(|| PayloadError::InvalidChoice { group, value: raw.to_string() })
}

fn endpoint(
    form: &FormState,
    host: FieldId,
    port: FieldId,
) -> Result<ServiceEndpoint, PayloadError> {
    Ok(ServiceEndpoint { host: required(form, host)?, port: required(form, port)? })
}

/// Assemble the submission payload from the current form.
pub fn build_config(form: &FormState) -> Result<DeploymentConfig, PayloadError> {
    let target_nodes = form.target_nodes();
    if target_nodes.is_empty() {
        return Err(PayloadError::NoTargetNodes);
    }

    let rag = if form.is_enabled(Section::Rag) {
        Some(endpoint(form, FieldId::RagHost, FieldId::RagPort)?)
    } else {
        None
    };
    let vectordb = if form.is_enabled(Section::VectorDb) {
        let ServiceEndpoint { host, port } =
            endpoint(form, FieldId::VectordbHost, FieldId::VectordbPort)?;
        let kind = chosen(form, ChoiceGroup::VectorDb, VectorDbKind::parse)?;
        Some(VectorDbConfig { kind, host, port })
    } else {
        None
    };
    let parser = if form.is_enabled(Section::Parser) {
        Some(endpoint(form, FieldId::ParserHost, FieldId::ParserPort)?)
    } else {
        None
    };

    Ok(DeploymentConfig {
        mgmt_host: required(form, FieldId::MgmtHost)?,
        mgmt_port: required(form, FieldId::MgmtPort)?,
        mode: chosen(form, ChoiceGroup::Mode, DeploymentMode::parse)?,
        platform: chosen(form, ChoiceGroup::Platform, Platform::parse)?,
        target_nodes,
        model_name: required(form, FieldId::ModelName)?,
        inference_host: required(form, FieldId::InferenceHost)?,
        inference_port: required(form, FieldId::InferencePort)?,
        enable_rag: rag.is_some(),
        rag,
        enable_vectordb: vectordb.is_some(),
        vectordb,
        enable_parser: parser.is_some(),
        parser,
    })
}
