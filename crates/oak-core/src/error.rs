use crate::pipeline::StageErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OakError {
    #[error("not initialized: run 'oak init' first")]
    NotInitialized,

    #[error(".oak directory already exists at {0}")]
    AlreadyInitialized(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("unknown IDE: {0}")]
    UnknownIde(String),

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("unknown skill: {0}")]
    UnknownSkill(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("feature '{feature}' is required by: {dependents}")]
    FeatureRequired { feature: String, dependents: String },

    #[error("project root is not writable: {0}")]
    NotWritable(String),

    #[error("project root does not exist: {0}")]
    RootMissing(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl OakError {
    /// Coarse category used when a stage failure is reported.
    pub fn kind(&self) -> StageErrorKind {
        match self {
            OakError::Io(e) => match e.kind() {
                std::io::ErrorKind::PermissionDenied => StageErrorKind::PermissionDenied,
                std::io::ErrorKind::NotFound => StageErrorKind::NotFound,
                _ => StageErrorKind::Uncategorized,
            },
            OakError::NotWritable(_) => StageErrorKind::PermissionDenied,
            OakError::NotInitialized | OakError::RootMissing(_) => StageErrorKind::NotFound,
            OakError::UnknownAgent(_)
            | OakError::UnknownIde(_)
            | OakError::UnknownFeature(_)
            | OakError::UnknownSkill(_)
            | OakError::InvalidValue { .. } => StageErrorKind::InvalidValue,
            _ => StageErrorKind::Uncategorized,
        }
    }
}

pub type Result<T> = std::result::Result<T, OakError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_keep_their_category() {
        let denied = OakError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(denied.kind(), StageErrorKind::PermissionDenied);

        let missing = OakError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(missing.kind(), StageErrorKind::NotFound);

        let other = OakError::from(std::io::Error::other("disk on fire"));
        assert_eq!(other.kind(), StageErrorKind::Uncategorized);
    }

    #[test]
    fn lookup_failures_are_invalid_values() {
        assert_eq!(
            OakError::UnknownAgent("emacs".into()).kind(),
            StageErrorKind::InvalidValue
        );
        assert_eq!(
            OakError::InvalidValue {
                field: "agents".into(),
                reason: "empty".into()
            }
            .kind(),
            StageErrorKind::InvalidValue
        );
        assert_eq!(
            OakError::FeatureRequired {
                feature: "constitution".into(),
                dependents: "rfc".into()
            }
            .kind(),
            StageErrorKind::Uncategorized
        );
    }
}
