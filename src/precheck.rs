//! Upgrade admissibility check
//!
//! PreCheck runs before any upgrade attempt and separates three states the
//! caller handles differently: a malformed pod identifier (hard rejection),
//! an upgrade source that has not been published yet (poll again later), and
//! ready to apply.

use tracing::debug;

use crate::name;
use crate::source::{self, SourceClient};
use crate::Error;

/// Outcome of a successful PreCheck call
///
/// Infrastructure failures and malformed identifiers are `Err`; both
/// variants here are ordinary outcomes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreCheck {
    /// Upgrade source is published; the upgrade may proceed
    Ready {
        /// Resolved static pod name
        static_name: String,
    },
    /// No upgrade source record yet - not an error, callers poll and retry
    SourceMissing {
        /// Resolved static pod name
        static_name: String,
    },
}

impl PreCheck {
    /// Whether the upgrade is admissible
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// The resolved static pod name, whichever the outcome
    pub fn static_name(&self) -> &str {
        match self {
            Self::Ready { static_name } | Self::SourceMissing { static_name } => static_name,
        }
    }
}

/// Decide whether an OTA upgrade is admissible for a static pod
///
/// Resolves the composite identifier, then checks that an upgrade source
/// record exists for the resolved name. Existence only - content is fetched
/// later by Apply.
///
/// # Errors
///
/// [`Error::Format`] for a malformed identifier, [`Error::Kube`] when the
/// existence check itself fails. An absent record is `Ok(SourceMissing)`,
/// never an error.
pub async fn pre_check<C: SourceClient + ?Sized>(
    client: &C,
    pod_identifier: &str,
    node_name: &str,
    namespace: &str,
) -> Result<PreCheck, Error> {
    let static_name = name::resolve(pod_identifier, node_name)?;

    if source::record_exists(client, &static_name, namespace).await? {
        debug!(
            pod = %pod_identifier,
            static_pod = %static_name,
            namespace = %namespace,
            "upgrade source published, upgrade admissible"
        );
        Ok(PreCheck::Ready { static_name })
    } else {
        debug!(
            pod = %pod_identifier,
            static_pod = %static_name,
            namespace = %namespace,
            "upgrade source not published yet"
        );
        Ok(PreCheck::SourceMissing { static_name })
    }
}
