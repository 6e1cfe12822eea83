//! Manifest persistence
//!
//! Manifests are written once and never edited. A new manifest for a
//! service supersedes (deletes) that service's older manifests, so each
//! service has at most one current manifest on disk.

use ecs_deploy_common::DeploymentManifest;
use ecs_deploy_common::manifest::parse_manifest_file_name;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Manifest persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create deployments directory '{}'", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize manifest")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write manifest '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest '{}' already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Failed to list deployments directory '{}'", path.display())]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory of deployment manifests
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store holding the manifest at `manifest_path`.
    ///
    /// A bare file name lives in the current directory; `fallback` is used
    /// only when the path has no parent at all.
    pub fn for_manifest(manifest_path: &Path, fallback: impl Into<PathBuf>) -> Self {
        match manifest_path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Self::new("."),
            Some(parent) => Self::new(parent),
            None => Self::new(fallback),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `manifest` atomically, then remove older manifests of the same service.
    ///
    /// The file appears complete or not at all, and an existing file with
    /// the same name is never overwritten.
    pub fn save(&self, manifest: &DeploymentManifest) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(manifest.file_name());
        let json = manifest.to_json()?;

        let write_err = |source: std::io::Error| StoreError::Write {
            path: path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                StoreError::AlreadyExists { path: path.clone() }
            } else {
                write_err(e.error)
            }
        })?;

        info!(path = %path.display(), "Deployment manifest saved");
        self.supersede(&manifest.service_name, &path);
        Ok(path)
    }

    /// Manifest files for exactly `service_name`, oldest first
    pub fn list(&self, service_name: &str) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::List {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut found: Vec<(String, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let (service, timestamp) = parse_manifest_file_name(&name)?;
                (service == service_name).then(|| (timestamp.to_string(), entry.path()))
            })
            .collect();
        found.sort();

        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Remove every manifest of `service_name` except `keep`
    fn supersede(&self, service_name: &str, keep: &Path) {
        let previous = match self.list(service_name) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(error = %e, "Could not look for superseded manifests");
                return;
            }
        };

        for path in previous.into_iter().filter(|p| p != keep) {
            match std::fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "Removed superseded manifest"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove superseded manifest"
                ),
            }
        }
    }
}
