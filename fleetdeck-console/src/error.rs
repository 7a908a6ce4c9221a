use crate::wizard::{ChoiceGroup, FieldId};

/// Failures talking to the Fleet Management API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Human-readable message for operator notices.
    pub fn operator_message(&self) -> String {
        match self {
            ApiError::Transport(_) => "failed to contact the management server".to_string(),
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Reasons a `DeploymentConfig` cannot be assembled from the form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("required field `{}` is empty", .0.as_str())]
    MissingField(FieldId),
    #[error("no option selected for `{}`", .0.as_str())]
    MissingChoice(ChoiceGroup),
    #[error("unknown value `{value}` for `{}`", group.as_str())]
    InvalidChoice { group: ChoiceGroup, value: String },
    #[error("target node list is empty")]
    NoTargetNodes,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
