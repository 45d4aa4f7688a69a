//! Error taxonomy for the deployment pipeline
//!
//! Every variant names the stage it belongs to. Local validation errors
//! (`Validation`, `ContainerNotFound`, `DanglingMount`,
//! `IncompatibleResources`) are raised before any remote mutation; remote
//! failures preserve the orchestrator's message verbatim and are never
//! retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    /// Input failed shape or range validation before anything left the
    /// process.
    #[error("invalid input for `{field}`: {message}")]
    Validation { field: String, message: String },

    /// The targeted container does not exist in the remote task definition.
    #[error("container `{name}` not found in task definition family `{family}`")]
    ContainerNotFound { family: String, name: String },

    /// A mount point references a volume absent from both the request and
    /// the remote descriptor.
    #[error(
        "mount point `{container_path}` references volume `{source_volume}` \
         which is defined neither in the request nor on the remote task definition"
    )]
    DanglingMount {
        container_path: String,
        source_volume: String,
    },

    /// The cpu/memory pair is outside the supported combination table.
    #[error("unsupported cpu/memory combination: {cpu} cpu units with {memory} MB")]
    IncompatibleResources { cpu: u32, memory: u32 },

    /// The orchestrator refused a call; its message is preserved verbatim.
    #[error("remote rejected {operation}: {message}")]
    RemoteRejection {
        operation: &'static str,
        message: String,
    },
}

impl DeployError {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DeployError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
