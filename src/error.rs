//! Error taxonomy for the sync engine
//!
//! Two failure classes exist: fatal (protocol version disagreement, framing
//! corruption) and recoverable (forward references that have not arrived
//! yet, externally removed scene objects). Recoverable errors are logged and
//! retried or degraded; fatal errors end the session or drop the message.

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Header protocol version does not equal the compiled constant.
    /// Fatal: the session must be torn down, never retried.
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    ProtocolMismatch { expected: i32, found: i32 },

    /// Declared payload size disagrees with the available bytes.
    /// Fatal to the current message.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A bone or reference path could not be found in the registry. The
    /// affected field is left unset and resolution retries next batch.
    #[error("unresolved dependency: '{path}' -> '{target}'")]
    UnresolvedDependency { path: String, target: String },

    /// An instance's declared parent path has no registry entry. The
    /// instance is parented at the scene root instead of being dropped.
    #[error("missing parent '{parent}' for instance '{path}'")]
    MissingParent { path: String, parent: String },

    /// The local object backing a registry entry vanished externally.
    /// The entry is purged on next access.
    #[error("stale local object behind '{path}'")]
    StaleLocalObject { path: String },

    /// Importer rejected an asset payload. Isolated per asset; the rest of
    /// the batch still applies.
    #[error("asset import failed for '{path}': {reason}")]
    AssetImportFailed { path: String, reason: String },

    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error("session closed")]
    SessionClosed,
}

impl SyncError {
    /// Fatal errors end the session; everything else degrades or retries.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::ProtocolMismatch { .. } | SyncError::MalformedPayload(_)
        )
    }
}
