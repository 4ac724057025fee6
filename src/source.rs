//! Upgrade source records
//!
//! An external controller publishes the desired manifest for each static pod
//! in a conventionally named ConfigMap: `static-pod-ota-<staticPodName>` in
//! the pod's namespace, with a `data` entry keyed by the static pod name
//! holding the manifest text. This module owns the read side of that
//! convention; the record is produced and mutated only by the controller.
//!
//! Access goes through the narrow [`SourceClient`] capability trait so the
//! rest of the crate can be tested against a mock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
#[cfg(test)]
use mockall::automock;

use crate::{Error, SOURCE_CONFIGMAP_PREFIX};

/// Data held by one upgrade source record: static pod name to manifest text
///
/// Manifest text is opaque here; this crate never parses it.
pub type SourceRecord = BTreeMap<String, String>;

/// Conventional name of the upgrade source ConfigMap for a static pod
pub fn configmap_name(static_name: &str) -> String {
    format!("{SOURCE_CONFIGMAP_PREFIX}{static_name}")
}

/// Trait abstracting the cluster read for upgrade source records
///
/// The one capability this crate needs from the control plane. Implemented
/// by [`KubeSourceClient`] in production and mocked in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Get a namespaced record by exact object name
    ///
    /// Returns `Ok(None)` when the object does not exist - a legitimate
    /// "not yet eligible" state, not a failure. Any other API error is
    /// surfaced to the caller.
    async fn get_record(&self, namespace: &str, name: &str)
        -> Result<Option<SourceRecord>, Error>;
}

/// Fetch the published manifest text for a static pod
///
/// Resolves the conventional ConfigMap name, reads the record, and extracts
/// the `static_name` data entry. Returns `Ok(None)` when the record is
/// absent or when it exists without the expected key - a controller may
/// publish a record before populating all keys, so a missing key means "not
/// yet eligible", not corruption.
pub async fn fetch_manifest<C: SourceClient + ?Sized>(
    client: &C,
    static_name: &str,
    namespace: &str,
) -> Result<Option<String>, Error> {
    let name = configmap_name(static_name);
    let Some(record) = client.get_record(namespace, &name).await? else {
        return Ok(None);
    };
    Ok(record.get(static_name).cloned())
}

/// Check whether an upgrade source record has been published for a static pod
///
/// Existence only; content is not inspected. `Err` means the cluster could
/// not be asked, which callers must report rather than treat as absence.
pub async fn record_exists<C: SourceClient + ?Sized>(
    client: &C,
    static_name: &str,
    namespace: &str,
) -> Result<bool, Error> {
    let name = configmap_name(static_name);
    Ok(client.get_record(namespace, &name).await?.is_some())
}

// =============================================================================
// Real Implementation
// =============================================================================

/// Source client backed by a real Kubernetes client
#[derive(Clone)]
pub struct KubeSourceClient {
    client: kube::Client,
}

impl KubeSourceClient {
    /// Create a source client wrapping the given Kubernetes client
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceClient for KubeSourceClient {
    async fn get_record(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SourceRecord>, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(cm) => Ok(Some(cm.data.unwrap_or_default())),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
