//! Static pod OTA upgrade core
//!
//! This crate implements the node-side mechanism for over-the-air upgrades of
//! static pods: pods defined by manifest files on a node and recreated by a
//! node-local watcher rather than the cluster scheduler.
//!
//! # Architecture
//!
//! An external controller publishes the desired manifest for each static pod
//! in a conventionally named ConfigMap. On the node, a caller (an agent HTTP
//! handler, or the CLI in this crate) drives two operations:
//!
//! - **PreCheck**: parse the composite `<staticPodName>-<nodeName>` pod
//!   identifier and check that an upgrade source ConfigMap has been published
//!   for that static pod. Distinguishes malformed identifiers (hard
//!   rejection), "not yet eligible" (poll again later), and ready.
//! - **Apply**: fetch the published manifest text and write it atomically
//!   into the directory the static pod watcher observes. The watcher picks
//!   up the file and recreates the pod; this crate never deletes manifests
//!   and never supervises the recreated pod.
//!
//! All cluster access goes through the narrow [`source::SourceClient`]
//! capability trait, so every decision in this crate is testable against a
//! mock without a running apiserver.
//!
//! # Modules
//!
//! - [`name`] - composite pod identifier resolution
//! - [`source`] - upgrade source records and the cluster client seam
//! - [`precheck`] - upgrade admissibility check
//! - [`upgrader`] - manifest materialization for the watcher
//! - [`config`] - explicit per-invocation configuration
//! - [`error`] - error types

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod name;
pub mod precheck;
pub mod source;
pub mod upgrader;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// Shared conventions between this crate, the controller publishing upgrade
// source ConfigMaps, and the node-local watcher consuming manifests.

/// Default directory the static pod watcher observes for upgrade manifests
///
/// Overridable per invocation through [`config::UpgradeConfig`].
pub const DEFAULT_UPGRADE_DIR: &str = "/tmp/manifests";

/// Suffix appended to a static pod name to form its manifest filename
pub const MANIFEST_SUFFIX: &str = ".yaml";

/// Name prefix of upgrade source ConfigMaps
///
/// The controller publishes the manifest for static pod `nginx` in a
/// ConfigMap named `static-pod-ota-nginx`.
pub const SOURCE_CONFIGMAP_PREFIX: &str = "static-pod-ota-";
