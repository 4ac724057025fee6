//! Manifest materialization for the static pod watcher
//!
//! Apply is the handoff point of an OTA upgrade: fetch the published
//! manifest text and write it into the watched upgrade directory, where an
//! out-of-process watcher recreates the pod. Two properties matter here:
//!
//! - The watcher polls the directory, so it must never observe a truncated
//!   manifest at the final path. Writes are staged in the same directory and
//!   renamed into place.
//! - "Nothing published" is not a failure. Apply against an absent source is
//!   an idempotent no-op, distinguishing "no work to do" from "failed to do
//!   work".
//!
//! Apply never retries internally and never deletes manifests; retry policy
//! and manifest consumption belong to the caller and the watcher.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::UpgradeConfig;
use crate::source::{self, SourceClient};
use crate::Error;

/// Per-static-pod advisory locks
///
/// Distinct static pods write distinct files and may apply concurrently;
/// concurrent applies for the *same* static pod are serialized here so the
/// fetch-then-rename sequence of one apply cannot interleave with another's.
static APPLY_LOCKS: LazyLock<DashMap<String, Arc<Mutex<()>>>> = LazyLock::new(DashMap::new);

fn apply_lock(static_name: &str) -> Arc<Mutex<()>> {
    APPLY_LOCKS
        .entry(static_name.to_string())
        .or_default()
        .clone()
}

/// One OTA upgrade attempt for a single static pod
pub struct StaticPodUpgrader<C: SourceClient + ?Sized> {
    client: Arc<C>,
    /// Namespace holding the upgrade source record
    namespace: String,
    /// Full composite pod identifier, kept for log context
    pod_name: String,
    /// Resolved static pod name; the join key between the source record's
    /// data and the manifest filename
    static_name: String,
    config: UpgradeConfig,
}

impl<C: SourceClient + ?Sized> StaticPodUpgrader<C> {
    /// Create an upgrader for one static pod
    ///
    /// `static_name` should come from a successful
    /// [`pre_check`](crate::precheck::pre_check).
    pub fn new(
        client: Arc<C>,
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        static_name: impl Into<String>,
        config: UpgradeConfig,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            static_name: static_name.into(),
            config,
        }
    }

    /// Fetch the published manifest and materialize it for the watcher
    ///
    /// Fetch strictly precedes the write - no speculative writing. When no
    /// manifest is published (record or key absent) this succeeds as a
    /// no-op. Fetch failures are annotated with the static pod name; write
    /// failures with the target path.
    pub async fn apply(&self) -> Result<(), Error> {
        let lock = apply_lock(&self.static_name);
        let _guard = lock.lock().await;

        let content =
            match source::fetch_manifest(self.client.as_ref(), &self.static_name, &self.namespace)
                .await
            {
                Ok(content) => content,
                Err(Error::Kube(source)) => {
                    return Err(Error::Fetch {
                        static_name: self.static_name.clone(),
                        source,
                    })
                }
                Err(e) => return Err(e),
            };

        let Some(content) = content else {
            info!(
                pod = %self.pod_name,
                static_pod = %self.static_name,
                "no upgrade manifest published, nothing to apply"
            );
            return Ok(());
        };

        let path = self.config.manifest_path(&self.static_name);
        gen_upgrade_manifest(&path, &content).await?;
        info!(
            pod = %self.pod_name,
            static_pod = %self.static_name,
            path = %path.display(),
            "generated upgrade manifest"
        );
        Ok(())
    }
}

/// Write manifest content durably at the given path
///
/// Creates missing parent directories, then replaces whatever is at `path`
/// with `content`. The content is staged in a sibling file and renamed into
/// place, so a reader polling the directory sees either the old manifest or
/// the new one, never a partial write.
pub async fn gen_upgrade_manifest(path: &Path, content: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::manifest(format!(
                "failed to create upgrade dir {}: {e}",
                parent.display()
            ))
        })?;
    }

    let staged = staging_path(path);
    tokio::fs::write(&staged, content).await.map_err(|e| {
        Error::manifest(format!(
            "failed to write staged manifest {}: {e}",
            staged.display()
        ))
    })?;
    tokio::fs::rename(&staged, path).await.map_err(|e| {
        Error::manifest(format!(
            "failed to move manifest into place at {}: {e}",
            path.display()
        ))
    })?;
    Ok(())
}

// Staged next to the target: rename is only atomic within a filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MockSourceClient, SourceRecord};
    use tempfile::TempDir;

    const NGINX_MANIFEST: &str = "\
apiVersion: v1
kind: Pod
metadata:
  name: nginx
spec:
  containers:
    - name: web
      image: nginx:1.19.2
";

    fn nginx_record() -> SourceRecord {
        let mut data = SourceRecord::new();
        data.insert("nginx".to_string(), NGINX_MANIFEST.to_string());
        data
    }

    fn upgrader_with(
        client: MockSourceClient,
        dir: &TempDir,
    ) -> StaticPodUpgrader<MockSourceClient> {
        StaticPodUpgrader::new(
            Arc::new(client),
            "default",
            "nginx-node",
            "nginx",
            UpgradeConfig::new(dir.path()),
        )
    }

    // ==========================================================================
    // Story: Applying an Upgrade
    //
    // The watcher only sees the final file; everything up to the rename is
    // this module's business. These tests cover first install (no target
    // file yet), overwrite of stale content, and the no-op path.
    // ==========================================================================

    /// First install: target file absent beforehand, present with the
    /// fetched content afterward
    #[tokio::test]
    async fn when_no_manifest_exists_yet_apply_creates_it() {
        let dir = TempDir::new().unwrap();
        let mut client = MockSourceClient::new();
        client
            .expect_get_record()
            .withf(|namespace, name| namespace == "default" && name == "static-pod-ota-nginx")
            .returning(|_, _| Ok(Some(nginx_record())));

        let upgrader = upgrader_with(client, &dir);
        upgrader.apply().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("nginx.yaml")).unwrap();
        assert_eq!(written, NGINX_MANIFEST);
    }

    /// Stale content from a previous upgrade is replaced
    #[tokio::test]
    async fn when_a_stale_manifest_exists_apply_overwrites_it() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("nginx.yaml"), "old manifest").unwrap();

        let mut client = MockSourceClient::new();
        client
            .expect_get_record()
            .returning(|_, _| Ok(Some(nginx_record())));

        let upgrader = upgrader_with(client, &dir);
        upgrader.apply().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("nginx.yaml")).unwrap();
        assert_eq!(written, NGINX_MANIFEST);
    }

    /// Applying twice with an unchanged source yields identical content
    #[tokio::test]
    async fn apply_is_idempotent_for_an_unchanged_source() {
        let dir = TempDir::new().unwrap();
        let mut client = MockSourceClient::new();
        client
            .expect_get_record()
            .times(2)
            .returning(|_, _| Ok(Some(nginx_record())));

        let upgrader = upgrader_with(client, &dir);
        upgrader.apply().await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("nginx.yaml")).unwrap();
        upgrader.apply().await.unwrap();
        let second = std::fs::read_to_string(dir.path().join("nginx.yaml")).unwrap();
        assert_eq!(first, second);
    }

    /// Nothing published: silent success, nothing written
    #[tokio::test]
    async fn when_no_source_is_published_apply_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let mut client = MockSourceClient::new();
        client.expect_get_record().returning(|_, _| Ok(None));

        let upgrader = upgrader_with(client, &dir);
        upgrader.apply().await.unwrap();

        assert!(!dir.path().join("nginx.yaml").exists());
    }

    /// Record published without this pod's key: also a no-op
    #[tokio::test]
    async fn when_the_record_lacks_this_pods_key_apply_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let mut client = MockSourceClient::new();
        client.expect_get_record().returning(|_, _| {
            let mut data = SourceRecord::new();
            data.insert("other-pod".to_string(), "manifest".to_string());
            Ok(Some(data))
        });

        let upgrader = upgrader_with(client, &dir);
        upgrader.apply().await.unwrap();

        assert!(!dir.path().join("nginx.yaml").exists());
    }

    /// Fetch failures are surfaced annotated with the static pod name
    #[tokio::test]
    async fn when_the_fetch_fails_apply_names_the_static_pod() {
        let dir = TempDir::new().unwrap();
        let mut client = MockSourceClient::new();
        client.expect_get_record().returning(|_, _| {
            Err(Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "connection refused".to_string(),
                reason: "InternalError".to_string(),
                code: 500,
            })))
        });

        let upgrader = upgrader_with(client, &dir);
        let err = upgrader.apply().await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(err.to_string().contains("nginx"));
        assert!(!dir.path().join("nginx.yaml").exists());
    }

    // ==========================================================================
    // Story: Durable Manifest Generation
    // ==========================================================================

    /// Round-trip: bytes written equal bytes read, missing directories are
    /// created along the way
    #[tokio::test]
    async fn gen_upgrade_manifest_round_trips_and_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("etcd.yaml");
        let data = "test data";

        gen_upgrade_manifest(&path, data).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), data);
    }

    /// No staging residue is left next to the manifest
    #[tokio::test]
    async fn gen_upgrade_manifest_leaves_no_staged_file_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nginx.yaml");

        gen_upgrade_manifest(&path, "data").await.unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("nginx.yaml.tmp").exists());
    }

    /// Writing into an unwritable location fails with the path in the error
    #[cfg(unix)]
    #[tokio::test]
    async fn gen_upgrade_manifest_reports_the_failing_path() {
        let err = gen_upgrade_manifest(Path::new("/proc/static-pod-ota/nginx.yaml"), "data")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
        assert!(err.to_string().contains("/proc/static-pod-ota"));
    }
}
