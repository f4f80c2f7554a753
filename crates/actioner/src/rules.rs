//! Remediation rules and label matching.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{AlertGroupEvent, Labels};

/// Binding from label predicates to a named action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Labels that must all be present in the event's common labels
    #[serde(default)]
    pub match_common_labels: Labels,
    /// Labels that must all be present in the event's group labels
    #[serde(default)]
    pub match_group_labels: Labels,
    /// Registered action name
    pub action: String,
    /// Action-specific options
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl Rule {
    /// Check whether this rule applies to the event.
    ///
    /// Both predicates must hold. Status is not considered here.
    #[must_use]
    pub fn matches(&self, event: &AlertGroupEvent) -> bool {
        labels_match(&self.match_common_labels, &event.common_labels)
            && labels_match(&self.match_group_labels, &event.group_labels)
    }
}

/// Every predicate key must exist in `labels` with an equal value.
///
/// An empty predicate matches anything.
#[must_use]
pub fn labels_match(predicate: &Labels, labels: &Labels) -> bool {
    predicate
        .iter()
        .all(|(key, expected)| labels.get(key) == Some(expected))
}
