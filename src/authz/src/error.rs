//! Error types for the authorization engine

use crate::types::{EntityId, EntityKind};
use thiserror::Error;

/// Broad category of an [`AuthzError`]
///
/// Lets callers react to a class of failure without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Permission tree registration or lookup failed
    Structural,
    /// Payload supplied where none is allowed, or missing where required
    Payload,
    /// Unknown or colliding entity identifier
    Identity,
    /// Mutation would break acyclicity of the role graph
    GraphIntegrity,
    /// Serialization, file or configuration adapter failure
    Adapter,
}

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Node was registered before
    #[error("Permission node `{node}` has been registered before")]
    DuplicateNode { node: String },

    /// A nested node was registered before its wildcard parent
    #[error("Permission node `{node}` requires the parent node `{parent}` to be registered first")]
    MissingParent { node: String, parent: String },

    /// The resolved parent is a leaf and cannot carry children
    #[error("Permission node `{node}` cannot be nested under the leaf node `{parent}`")]
    InvalidParent { node: String, parent: String },

    /// Malformed node string
    #[error("Invalid permission node `{node}`: {reason}")]
    InvalidNode { node: String, reason: String },

    /// Node was never registered
    #[error("Unknown permission node `{node}`")]
    UnknownPermission { node: String },

    /// Payload node used without a payload
    #[error("Permission node `{node}` requires a payload")]
    MissingPayload { node: String },

    /// Payload given for a node that takes none
    #[error("Permission node `{node}` does not take a payload, got `{payload}`")]
    UnusedPayload { node: String, payload: String },

    /// Entity ID already in use
    #[error("{kind} ID `{id}` is already in use")]
    EntityIdCollision { kind: EntityKind, id: EntityId },

    /// Entity ID does not exist
    #[error("Unknown {kind} ID `{id}`")]
    UnknownEntity { kind: EntityKind, id: EntityId },

    /// Entity ID could not be parsed or violates configured limits
    #[error("Invalid entity ID `{id}`: {reason}")]
    InvalidEntityId { id: String, reason: String },

    /// Inheritance edge rejected because it would close a cycle
    #[error("Cyclic dependencies detected between roles `{parent}` and `{child}`: {path}")]
    RoleCycle {
        parent: EntityId,
        child: EntityId,
        path: String,
    },

    /// Topological traversal revisited a role that was still in progress
    #[error("Circular dependency detected: {0}")]
    CycleDetected(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File extension not recognised by the serialization adapter
    #[error("Unknown file extension `{0}`, possible extensions are: `json`, `yaml`, `yml`")]
    UnsupportedFormat(String),

    /// No file path given and none configured
    #[error("No file path has been specified")]
    MissingPath,

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialized state references something it never defines
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl AuthzError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateNode { .. }
            | Self::MissingParent { .. }
            | Self::InvalidParent { .. }
            | Self::InvalidNode { .. }
            | Self::UnknownPermission { .. } => ErrorKind::Structural,
            Self::MissingPayload { .. } | Self::UnusedPayload { .. } => ErrorKind::Payload,
            Self::EntityIdCollision { .. }
            | Self::UnknownEntity { .. }
            | Self::InvalidEntityId { .. } => ErrorKind::Identity,
            Self::RoleCycle { .. } | Self::CycleDetected(_) => ErrorKind::GraphIntegrity,
            Self::Json(_)
            | Self::Yaml(_)
            | Self::Io(_)
            | Self::UnsupportedFormat(_)
            | Self::MissingPath
            | Self::InvalidConfig(_)
            | Self::InvalidData(_) => ErrorKind::Adapter,
        }
    }

    pub(crate) fn unknown_subject(id: &EntityId) -> Self {
        Self::UnknownEntity {
            kind: EntityKind::Subject,
            id: id.clone(),
        }
    }

    pub(crate) fn unknown_role(id: &EntityId) -> Self {
        Self::UnknownEntity {
            kind: EntityKind::Role,
            id: id.clone(),
        }
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
