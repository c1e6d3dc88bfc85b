use thiserror::Error;

use crate::types::ResourceKind;

#[derive(Error, Debug)]
pub enum InfraGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Discovery of {kind} failed: {message}")]
    Discovery { kind: ResourceKind, message: String },

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Host collection error: {0}")]
    Host(String),

    #[error("Duplicate identity in generation: {0}")]
    DuplicateIdentity(String),

    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    /// A throttled task failed; `label` names the submission.
    #[error("{label} error: {source}")]
    Task {
        label: String,
        #[source]
        source: Box<InfraGraphError>,
    },

    #[error("Task join error: {0}")]
    Join(String),
}

impl InfraGraphError {
    pub fn discovery(kind: ResourceKind, message: impl std::fmt::Display) -> Self {
        Self::Discovery {
            kind,
            message: message.to_string(),
        }
    }

    pub fn labeled(label: impl Into<String>, source: InfraGraphError) -> Self {
        Self::Task {
            label: label.into(),
            source: Box::new(source),
        }
    }

    /// Strips throttle labels and returns the error the task produced.
    pub fn root(&self) -> &InfraGraphError {
        match self {
            Self::Task { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, InfraGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_errors_keep_the_task_error() {
        let err = InfraGraphError::labeled(
            "DatabaseInstance",
            InfraGraphError::discovery(ResourceKind::DatabaseInstance, "connection reset"),
        );
        assert_eq!(
            err.to_string(),
            "DatabaseInstance error: Discovery of DatabaseInstance failed: connection reset"
        );
        assert!(matches!(
            err.root(),
            InfraGraphError::Discovery {
                kind: ResourceKind::DatabaseInstance,
                ..
            }
        ));
    }
}
