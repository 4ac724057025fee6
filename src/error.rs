//! Error types for static pod OTA upgrades

use thiserror::Error;

/// Main error type for upgrade operations
///
/// Absence of an upgrade source record is deliberately *not* represented
/// here: "not yet eligible" is an ordinary outcome callers poll on, modeled
/// as `Option`/[`crate::precheck::PreCheck::SourceMissing`] instead of an
/// error variant.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error other than not-found
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Malformed composite pod identifier
    #[error("pod name format error: {0}")]
    Format(String),

    /// Manifest generation failure (directory creation or file write)
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Upgrade source fetch failure during Apply, annotated with the
    /// static pod whose upgrade failed
    #[error("failed to fetch upgrade source for static pod {static_name}: {source}")]
    Fetch {
        /// Static pod whose source record could not be retrieved
        static_name: String,
        /// Underlying client error
        #[source]
        source: kube::Error,
    },
}

impl Error {
    /// Create a format error with the given message
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a manifest error with the given message
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }
}
