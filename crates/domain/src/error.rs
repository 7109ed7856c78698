//! Common error types used across the workspace.
//!
//! Each layer defines typed errors and converts into [`HubError`] via
//! `#[from]`. Externally exposed operations return these as machine-readable
//! kinds; raw panics never cross a component boundary.

use crate::capability::Capability;

/// Top-level error for every fallible core operation.
///
/// Wrapper variants carry the cause in their message: these strings end up
/// in failed queue entries and event records, where the underlying reason
/// must survive for later inspection.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A domain invariant was violated.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A device, script, or queue entry was absent.
    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// A duplicate identifier on register or uniqueness-constrained upsert.
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Bad protocol configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport-layer connect failure.
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Transport-layer send failure.
    #[error("send error: {0}")]
    Send(#[from] SendError),

    /// Storage-adjacent failure (the in-progress mutation was rolled back).
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A referenced record does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    /// The kind of record ("Device", "Script", "QueueEntry", …).
    pub entity: &'static str,
    /// The identifier that was looked up.
    pub id: String,
}

/// A record with the same identifier already exists.
#[derive(Debug, thiserror::Error)]
#[error("{entity} already exists: {id}")]
pub struct ConflictError {
    /// The kind of record.
    pub entity: &'static str,
    /// The conflicting identifier.
    pub id: String,
}

/// Domain invariant violations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Device identifier is empty.
    #[error("device identifier must not be empty")]
    EmptyDeviceId,

    /// Device identifier is not a valid hardware address.
    #[error("invalid hardware address: {0}")]
    InvalidHardwareAddress(String),

    /// Name field is empty.
    #[error("name must not be empty")]
    EmptyName,

    /// Script name is empty.
    #[error("script name must not be empty")]
    EmptyScriptName,

    /// Automation has no actions.
    #[error("automation must have at least one action")]
    NoActions,

    /// Command requires a capability the device does not declare.
    #[error("command '{command}' requires capability '{capability}'")]
    MissingCapability {
        command: String,
        capability: Capability,
    },
}

/// Bad protocol configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No adapter factory registered under this protocol name.
    #[error("unsupported protocol: {0}")]
    UnknownProtocol(String),

    /// The configuration payload does not fit the adapter's schema.
    #[error("invalid configuration for protocol '{protocol}': {reason}")]
    Invalid { protocol: String, reason: String },
}

/// Transport connect failure.
#[derive(Debug, thiserror::Error)]
#[error("failed to connect {protocol} adapter: {reason}")]
pub struct ConnectError {
    /// Protocol name.
    pub protocol: String,
    /// Human-readable cause.
    pub reason: String,
}

/// Transport send failure, subtyped so callers can tell a timeout apart
/// from a rejection and decide their own retry policy. The core never
/// retries automatically.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The caller-supplied timeout elapsed before the transport confirmed
    /// delivery.
    #[error("send timed out")]
    Timeout,

    /// The transport refused the command.
    #[error("send rejected: {0}")]
    Rejected(String),

    /// The transport is not connected or the peer is unreachable.
    #[error("peer unreachable: {0}")]
    Unreachable(String),
}
