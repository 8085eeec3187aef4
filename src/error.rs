//! Unified error handling for schema-warden
//!
//! Every fallible operation in the control plane lands in [`WardenError`].
//! Tool handlers never let these escape through the MCP protocol: they are
//! converted to in-band [`ErrorPayload`] values at the tool boundary.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the control plane.
#[derive(Error, Debug)]
pub enum WardenError {
    /// No registry is configured under the given name.
    #[error("Registry '{name}' not found")]
    RegistryNotFound { name: String },

    /// The registry endpoint could not be reached at the transport level.
    #[error("Registry '{name}' unreachable: {message}")]
    RegistryUnreachable {
        name: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A write was attempted against a registry (or process) configured read-only.
    #[error("Operation blocked: {message}")]
    ReadonlyBlocked {
        message: String,
        registry: Option<String>,
        global: bool,
    },

    #[error("Subject '{subject}' not found")]
    SubjectNotFound { subject: String, registry: String },

    #[error("Version {version} of subject '{subject}' not found")]
    VersionNotFound {
        subject: String,
        version: i32,
        registry: String,
    },

    /// The upstream registry rejected the schema body.
    #[error("Schema rejected by registry: {message}")]
    SchemaInvalid { message: String },

    /// The upstream registry reports the schema as incompatible.
    #[error("Compatibility violation for subject '{subject}': {message}")]
    CompatibilityViolation { subject: String, message: String },

    /// Upstream returned 405 on a mode change; it does not support IMPORT.
    #[error("Registry '{registry}' does not support IMPORT mode")]
    ImportModeUnsupported { registry: String },

    /// Subject already present in the target under a non-overwrite policy.
    #[error("Subject '{subject}' already exists in '{registry}'")]
    ConflictExists { subject: String, registry: String },

    #[error("Task {task_id} was cancelled")]
    TaskCancelled { task_id: String },

    #[error("Task manager is shutting down")]
    TaskShuttingDown,

    #[error("Elicitation request {request_id} has expired")]
    ElicitationExpired { request_id: String },

    #[error("Invalid elicitation response: {message}")]
    ElicitationInvalid { request_id: String, message: String },

    /// A response was already stored for this request.
    #[error("Elicitation request {request_id} already has a response")]
    ElicitationDuplicate { request_id: String },

    #[error("Workflow '{workflow_id}' not found")]
    WorkflowUnknown { workflow_id: String },

    #[error("Workflow step '{step_id}' not found in workflow '{workflow_id}'")]
    WorkflowStepMissing {
        workflow_id: String,
        step_id: String,
    },

    /// Upstream returned a non-2xx status that maps to no narrower kind.
    #[error("Registry '{registry}' returned HTTP {status}: {body}")]
    Upstream {
        registry: String,
        status: u16,
        body: String,
    },

    /// Configuration errors (bad env values, missing fleet).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Local persistence errors (learning store).
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Stable machine-readable codes, one per error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RegistryNotFound,
    RegistryUnreachable,
    ReadonlyBlocked,
    SubjectNotFound,
    VersionNotFound,
    SchemaInvalid,
    CompatibilityViolation,
    ImportModeUnsupported,
    ConflictExists,
    TaskCancelled,
    TaskShuttingDown,
    ElicitationExpired,
    ElicitationInvalid,
    ElicitationDuplicate,
    WorkflowUnknown,
    WorkflowStepMissing,
    Upstream,
    Config,
    Storage,
}

impl WardenError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WardenError::RegistryNotFound { .. } => ErrorCode::RegistryNotFound,
            WardenError::RegistryUnreachable { .. } => ErrorCode::RegistryUnreachable,
            WardenError::ReadonlyBlocked { .. } => ErrorCode::ReadonlyBlocked,
            WardenError::SubjectNotFound { .. } => ErrorCode::SubjectNotFound,
            WardenError::VersionNotFound { .. } => ErrorCode::VersionNotFound,
            WardenError::SchemaInvalid { .. } => ErrorCode::SchemaInvalid,
            WardenError::CompatibilityViolation { .. } => ErrorCode::CompatibilityViolation,
            WardenError::ImportModeUnsupported { .. } => ErrorCode::ImportModeUnsupported,
            WardenError::ConflictExists { .. } => ErrorCode::ConflictExists,
            WardenError::TaskCancelled { .. } => ErrorCode::TaskCancelled,
            WardenError::TaskShuttingDown => ErrorCode::TaskShuttingDown,
            WardenError::ElicitationExpired { .. } => ErrorCode::ElicitationExpired,
            WardenError::ElicitationInvalid { .. } => ErrorCode::ElicitationInvalid,
            WardenError::ElicitationDuplicate { .. } => ErrorCode::ElicitationDuplicate,
            WardenError::WorkflowUnknown { .. } => ErrorCode::WorkflowUnknown,
            WardenError::WorkflowStepMissing { .. } => ErrorCode::WorkflowStepMissing,
            WardenError::Upstream { .. } => ErrorCode::Upstream,
            WardenError::Config { .. } => ErrorCode::Config,
            WardenError::Storage { .. } => ErrorCode::Storage,
        }
    }

    /// Classify an upstream HTTP status into a narrow kind where one exists.
    pub fn from_upstream_status(
        registry: &str,
        subject: Option<&str>,
        status: u16,
        body: String,
    ) -> Self {
        match status {
            404 => match subject {
                Some(subject) => WardenError::SubjectNotFound {
                    subject: subject.to_string(),
                    registry: registry.to_string(),
                },
                None => WardenError::Upstream {
                    registry: registry.to_string(),
                    status,
                    body,
                },
            },
            405 => WardenError::ImportModeUnsupported {
                registry: registry.to_string(),
            },
            409 => WardenError::ConflictExists {
                subject: subject.unwrap_or("<unknown>").to_string(),
                registry: registry.to_string(),
            },
            422 => WardenError::SchemaInvalid { message: body },
            _ => WardenError::Upstream {
                registry: registry.to_string(),
                status,
                body,
            },
        }
    }
}

/// The in-band error object returned by every tool on failure.
///
/// Successful operations never carry `error`.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ErrorPayload {
    /// Short human-readable message.
    pub error: String,
    /// Optional longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Stable machine-readable code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Set when the error is a readonly refusal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly_mode: Option<bool>,
    /// Registry the refusal applies to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl From<&WardenError> for ErrorPayload {
    fn from(err: &WardenError) -> Self {
        let code = serde_json::to_value(err.code())
            .ok()
            .and_then(|v| v.as_str().map(str::to_string));
        let (readonly_mode, registry) = match err {
            WardenError::ReadonlyBlocked { registry, .. } => (Some(true), registry.clone()),
            _ => (None, None),
        };
        let details = std::error::Error::source(err).map(|s| s.to_string());
        ErrorPayload {
            error: err.to_string(),
            details,
            code,
            readonly_mode,
            registry,
        }
    }
}

impl From<WardenError> for ErrorPayload {
    fn from(err: WardenError) -> Self {
        ErrorPayload::from(&err)
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_mapping() {
        let err = WardenError::from_upstream_status("dev", Some("orders"), 404, String::new());
        assert!(matches!(err, WardenError::SubjectNotFound { .. }));

        let err = WardenError::from_upstream_status("dev", None, 405, String::new());
        assert!(matches!(err, WardenError::ImportModeUnsupported { .. }));

        let err = WardenError::from_upstream_status("dev", Some("orders"), 409, String::new());
        assert!(matches!(err, WardenError::ConflictExists { .. }));

        let err = WardenError::from_upstream_status("dev", None, 500, "boom".to_string());
        assert!(matches!(err, WardenError::Upstream { status: 500, .. }));
    }

    #[test]
    fn test_readonly_payload_carries_registry() {
        let err = WardenError::ReadonlyBlocked {
            message: "Registry 'prod' is running in READONLY mode".to_string(),
            registry: Some("prod".to_string()),
            global: false,
        };
        let payload = ErrorPayload::from(&err);
        assert_eq!(payload.readonly_mode, Some(true));
        assert_eq!(payload.registry.as_deref(), Some("prod"));
        assert!(payload.error.contains("READONLY"));
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let payload = ErrorPayload::from(WardenError::TaskShuttingDown);
        assert_eq!(payload.code.as_deref(), Some("TASK_SHUTTING_DOWN"));
    }
}
