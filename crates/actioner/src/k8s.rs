//! Ambient Kubernetes credential resolution.
//!
//! Tried in order:
//! 1. The `KUBECONFIG` environment variable
//! 2. The default kubeconfig file (`~/.kube/config`)
//! 3. In-cluster service account configuration

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Error, Result};

/// Default kubeconfig location (`~/.kube/config`).
#[must_use]
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".kube").join("config"))
}

/// Resolve a cluster configuration from the ambient environment.
pub async fn resolve_config() -> Result<Config> {
    let options = KubeConfigOptions::default();

    if let Some(kubeconfig) = Kubeconfig::from_env().map_err(|e| {
        Error::ClusterCredentials(format!("failed to build config from KUBECONFIG: {e}"))
    })? {
        debug!("Using kubeconfig from KUBECONFIG");
        return Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| {
                Error::ClusterCredentials(format!("failed to build config from KUBECONFIG: {e}"))
            });
    }

    if let Some(path) = default_kubeconfig_path().filter(|p| p.exists()) {
        debug!(path = %path.display(), "Using default kubeconfig");
        let kubeconfig = Kubeconfig::read_from(&path).map_err(|e| {
            Error::ClusterCredentials(format!("failed to build config from default kubeconfig: {e}"))
        })?;
        return Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| {
                Error::ClusterCredentials(format!(
                    "failed to build config from default kubeconfig: {e}"
                ))
            });
    }

    debug!("Falling back to in-cluster configuration");
    Config::incluster()
        .map_err(|e| Error::ClusterCredentials(format!("failed to load in-cluster config: {e}")))
}

/// Build a client from ambient credentials.
pub async fn client() -> Result<Client> {
    let config = resolve_config().await?;
    Client::try_from(config).map_err(Error::Kube)
}
