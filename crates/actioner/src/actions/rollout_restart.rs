//! `rollout-restart-deployment`: the equivalent of
//! `kubectl -n <namespace> rollout restart deployment <deployment>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{Action, ActionOptions};
use crate::error::{Error, Result};
use crate::k8s;
use crate::models::AlertGroupEvent;
use crate::observer::{DispatchObserver, Observation};

/// Pod template annotation bumped to trigger a rollout.
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Bound on the whole patch call.
pub const PATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends strategic-merge patches to deployments.
#[async_trait]
pub trait WorkloadPatcher: Send + Sync {
    /// Apply `patch` to `deployment` in `namespace`.
    async fn patch_deployment(&self, namespace: &str, deployment: &str, patch: &Value)
        -> Result<()>;
}

/// [`WorkloadPatcher`] backed by the Kubernetes API.
pub struct KubePatcher {
    client: Option<Client>,
}

impl KubePatcher {
    /// Resolve credentials from the environment on every call.
    #[must_use]
    pub fn ambient() -> Self {
        Self { client: None }
    }

    /// Use an already-built client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    async fn client(&self) -> Result<Client> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => k8s::client().await,
        }
    }
}

#[async_trait]
impl WorkloadPatcher for KubePatcher {
    async fn patch_deployment(
        &self,
        namespace: &str,
        deployment: &str,
        patch: &Value,
    ) -> Result<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client().await?, namespace);
        deployments
            .patch(deployment, &PatchParams::default(), &Patch::Strategic(patch))
            .await
            .map_err(Error::PatchRejected)?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
struct RestartOptions {
    namespace: String,
    deployment: String,
}

/// Restarts a deployment's rollout by bumping its restart annotation.
///
/// Options:
/// - `deployment` (required)
/// - `namespace` (optional, defaults to the event's `namespace` common label)
pub struct RolloutRestartAction {
    patcher: Arc<dyn WorkloadPatcher>,
    observer: Arc<dyn DispatchObserver>,
}

impl RolloutRestartAction {
    /// Registry name.
    pub const NAME: &'static str = "rollout-restart-deployment";

    /// Create the action.
    #[must_use]
    pub fn new(patcher: Arc<dyn WorkloadPatcher>, observer: Arc<dyn DispatchObserver>) -> Self {
        Self { patcher, observer }
    }

    fn parse_options(
        &self,
        event: &AlertGroupEvent,
        options: &ActionOptions,
    ) -> Result<RestartOptions> {
        let mut namespace = None;
        let mut deployment = None;

        for (key, value) in options {
            match key.as_str() {
                "namespace" => namespace = Some(value.clone()),
                "deployment" => deployment = Some(value.clone()),
                _ => self.observer.observe(Observation::UnknownOption {
                    action: Self::NAME,
                    option: key.clone(),
                }),
            }
        }

        let deployment = deployment
            .filter(|d| !d.is_empty())
            .ok_or(Error::MissingOption("deployment"))?;
        let namespace = namespace
            .filter(|n| !n.is_empty())
            .or_else(|| event.common_labels.get("namespace").cloned())
            .ok_or(Error::MissingOption("namespace"))?;

        Ok(RestartOptions {
            namespace,
            deployment,
        })
    }
}

/// Restart annotation value: `YYYYMMDDHHMMSS`.
#[must_use]
pub fn restart_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Strategic-merge patch setting the restart annotation on the pod template.
#[must_use]
pub fn restart_patch(restarted_at: &str) -> Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        RESTARTED_AT_ANNOTATION: restarted_at
                    }
                }
            }
        }
    })
}

#[async_trait]
impl Action for RolloutRestartAction {
    async fn execute(&self, event: &AlertGroupEvent, options: &ActionOptions) -> Result<()> {
        let opts = self.parse_options(event, options)?;

        self.observer.observe(Observation::RestartingDeployment {
            namespace: opts.namespace.clone(),
            deployment: opts.deployment.clone(),
        });

        let patch = restart_patch(&restart_timestamp(Utc::now()));
        tokio::time::timeout(
            PATCH_TIMEOUT,
            self.patcher
                .patch_deployment(&opts.namespace, &opts.deployment, &patch),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: "rollout restart",
            timeout: PATCH_TIMEOUT,
        })?
    }
}
