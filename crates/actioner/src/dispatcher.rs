//! Rule evaluation and action invocation.

use std::sync::Arc;

use crate::actions::ActionRegistry;
use crate::error::{Error, Result};
use crate::models::AlertGroupEvent;
use crate::observer::{DispatchObserver, Observation};
use crate::rules::Rule;

/// Evaluates rules in order against incoming events and runs matching actions.
///
/// Holds no per-event state, so one dispatcher can serve concurrent requests.
#[derive(Clone)]
pub struct RuleDispatcher {
    rules: Arc<[Rule]>,
    registry: ActionRegistry,
    observer: Arc<dyn DispatchObserver>,
}

impl RuleDispatcher {
    /// Build a dispatcher over a fixed rule list.
    #[must_use]
    pub fn new(
        rules: Vec<Rule>,
        registry: ActionRegistry,
        observer: Arc<dyn DispatchObserver>,
    ) -> Self {
        Self {
            rules: rules.into(),
            registry,
            observer,
        }
    }

    /// Configured rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run every matching rule's action for a firing event.
    ///
    /// Non-firing events succeed without evaluating any rule. Matching rules
    /// run sequentially in configuration order; the first lookup or action
    /// failure stops dispatch and is returned, so later rules never run.
    pub async fn dispatch(&self, event: &AlertGroupEvent) -> Result<()> {
        self.observer.observe(Observation::EventReceived {
            status: event.status,
            alert_name: event.alert_name().to_string(),
            alerts: event.alerts.len(),
        });

        if !event.is_firing() {
            self.observer.observe(Observation::EventIgnored {
                status: event.status,
            });
            return Ok(());
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matches(event) {
                continue;
            }
            self.observer.observe(Observation::RuleMatched {
                index,
                action: rule.action.clone(),
            });

            let action = self
                .registry
                .lookup(&rule.action)
                .ok_or_else(|| Error::ActionNotFound(rule.action.clone()))?;

            self.observer.observe(Observation::ActionStarted {
                action: rule.action.clone(),
            });
            if let Err(e) = action.execute(event, &rule.options).await {
                self.observer.observe(Observation::ActionFailed {
                    action: rule.action.clone(),
                    error: e.to_string(),
                });
                return Err(e);
            }
            self.observer.observe(Observation::ActionSucceeded {
                action: rule.action.clone(),
            });
        }

        Ok(())
    }
}
