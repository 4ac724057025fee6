//! Composite pod identifier resolution
//!
//! Static pods surface in the cluster under a composite name,
//! `<staticPodName>-<nodeName>`, joined with a single hyphen. This module
//! recovers the static pod name from that convention. Pure string work, no
//! side effects.

use crate::Error;

/// Resolve a composite pod identifier into its static pod name
///
/// Strips the trailing `-<node_name>` suffix from `pod_identifier`. Fails
/// with [`Error::Format`] when the suffix is missing or when nothing remains
/// once it is stripped. A format failure is a hard rejection of the request,
/// never a "not found".
///
/// # Arguments
///
/// * `pod_identifier` - composite name, e.g. `nginx-worker-1`
/// * `node_name` - name of the node the pod runs on, e.g. `worker-1`
pub fn resolve(pod_identifier: &str, node_name: &str) -> Result<String, Error> {
    let suffix = format!("-{node_name}");
    match pod_identifier.strip_suffix(suffix.as_str()) {
        Some("") => Err(Error::format(format!(
            "pod identifier {pod_identifier:?} has an empty static pod name"
        ))),
        Some(static_name) => Ok(static_name.to_string()),
        None => Err(Error::format(format!(
            "pod identifier {pod_identifier:?} does not end with \"-{node_name}\""
        ))),
    }
}
