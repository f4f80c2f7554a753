//! Remediation actions and the registry that names them.

pub mod remote_command;
pub mod rollout_restart;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::AlertGroupEvent;
use crate::observer::DispatchObserver;

pub use remote_command::RemoteCommandAction;
pub use rollout_restart::{KubePatcher, RolloutRestartAction, WorkloadPatcher};

/// Options passed from a rule to its action.
pub type ActionOptions = HashMap<String, String>;

/// A remediation capability invoked when a rule matches.
#[async_trait]
pub trait Action: Send + Sync {
    /// Run the action for `event` with the rule's `options`.
    async fn execute(&self, event: &AlertGroupEvent, options: &ActionOptions) -> Result<()>;
}

/// Immutable mapping from action name to capability.
///
/// Names are exact and case-sensitive. Rules are not checked against the
/// registry when it is built; an unknown name only surfaces when a rule
/// naming it matches.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Registry with the built-in actions, reporting to `observer`.
    #[must_use]
    pub fn builtin(observer: Arc<dyn DispatchObserver>) -> Self {
        Self::builder()
            .register(
                RolloutRestartAction::NAME,
                Arc::new(RolloutRestartAction::new(
                    Arc::new(KubePatcher::ambient()),
                    observer.clone(),
                )),
            )
            .register(
                RemoteCommandAction::NAME,
                Arc::new(RemoteCommandAction::new(observer)),
            )
            .build()
    }

    /// Start an empty registry.
    #[must_use]
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::default()
    }

    /// Resolve an action by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Collects actions before freezing them into an [`ActionRegistry`].
#[derive(Default)]
pub struct ActionRegistryBuilder {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistryBuilder {
    /// Register `action` under `name`, replacing any earlier registration.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, action: Arc<dyn Action>) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            actions: self.actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::TracingObserver;

    struct Noop;

    #[async_trait]
    impl Action for Noop {
        async fn execute(&self, _event: &AlertGroupEvent, _options: &ActionOptions) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_builtin_names() {
        let registry = ActionRegistry::builtin(Arc::new(TracingObserver));
        assert_eq!(registry.names(), vec!["rollout-restart-deployment", "ssh"]);
        assert!(registry.lookup("ssh").is_some());
        assert!(registry.lookup("rollout-restart-deployment").is_some());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = ActionRegistry::builder()
            .register("noop", Arc::new(Noop))
            .build();
        assert!(registry.lookup("noop").is_some());
        assert!(registry.lookup("Noop").is_none());
        assert!(registry.lookup("noop ").is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = ActionRegistry::default();
        assert!(registry.names().is_empty());
        assert!(registry.lookup("ssh").is_none());
    }
}
