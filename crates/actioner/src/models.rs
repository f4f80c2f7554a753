//! Alertmanager webhook payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label or annotation set.
pub type Labels = HashMap<String, String>;

/// Alert (or alert group) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Alert is active
    Firing,
    /// Alert has cleared
    Resolved,
}

impl AlertStatus {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alertmanager webhook payload: one notification for a group of alerts.
///
/// Reference: <https://prometheus.io/docs/alerting/latest/configuration/#webhook_config>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertGroupEvent {
    /// Version of the payload format
    #[serde(default)]
    pub version: String,
    /// Key identifying the group of alerts
    #[serde(default)]
    pub group_key: String,
    /// Number of alerts dropped because of `max_alerts`
    #[serde(default)]
    pub truncated_alerts: u32,
    /// Status of the group as a whole
    pub status: AlertStatus,
    /// Receiver that routed this notification
    #[serde(default)]
    pub receiver: String,
    /// Labels the group was formed on
    #[serde(default)]
    pub group_labels: Labels,
    /// Labels shared by every alert in the group
    #[serde(default)]
    pub common_labels: Labels,
    /// Annotations shared by every alert in the group
    #[serde(default)]
    pub common_annotations: Labels,
    /// Backlink to Alertmanager
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
    /// Alerts in this notification, in Alertmanager's order
    #[serde(default)]
    pub alerts: Vec<AlertRecord>,
}

impl AlertGroupEvent {
    /// Check if the group is firing.
    #[must_use]
    pub fn is_firing(&self) -> bool {
        self.status == AlertStatus::Firing
    }

    /// Name of the alert, taken from the common `alertname` label.
    #[must_use]
    pub fn alert_name(&self) -> &str {
        self.common_labels
            .get("alertname")
            .map_or("unknown", String::as_str)
    }
}

/// Individual alert from Alertmanager.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// Status of this alert
    pub status: AlertStatus,
    /// Alert labels
    #[serde(default)]
    pub labels: Labels,
    /// Alert annotations
    #[serde(default)]
    pub annotations: Labels,
    /// When the alert started firing
    pub starts_at: DateTime<Utc>,
    /// When the alert ended (zero time while firing)
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /// Link to the rule that generated the alert
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
    /// Unique fingerprint for this alert
    #[serde(default)]
    pub fingerprint: String,
}
