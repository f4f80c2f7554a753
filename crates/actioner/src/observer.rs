//! Observation hook for dispatch and action progress.
//!
//! The dispatcher and actions never log directly; they report
//! [`Observation`]s to a [`DispatchObserver`]. Production code installs
//! [`TracingObserver`], tests install [`RecordingObserver`] and assert on
//! what was seen.

use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::models::AlertStatus;

/// Which remote stream a line of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Remote standard output
    Stdout,
    /// Remote standard error
    Stderr,
}

/// Something worth reporting while handling an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// An event entered the dispatcher
    EventReceived {
        /// Group status
        status: AlertStatus,
        /// `alertname` common label
        alert_name: String,
        /// Number of alerts in the group
        alerts: usize,
    },
    /// Event was not firing; no rule evaluated
    EventIgnored {
        /// Group status
        status: AlertStatus,
    },
    /// Rule at `index` matched the event
    RuleMatched {
        /// Position in the configured rule list
        index: usize,
        /// Action the rule names
        action: String,
    },
    /// Action is about to run
    ActionStarted {
        /// Action name
        action: String,
    },
    /// Action returned an error; dispatch stops
    ActionFailed {
        /// Action name
        action: String,
        /// Error message
        error: String,
    },
    /// Action completed successfully
    ActionSucceeded {
        /// Action name
        action: String,
    },
    /// An option key the action does not understand
    UnknownOption {
        /// Action name
        action: &'static str,
        /// Ignored key
        option: String,
    },
    /// Rollout restart is about to patch a deployment
    RestartingDeployment {
        /// Target namespace
        namespace: String,
        /// Target deployment
        deployment: String,
    },
    /// Remote command is about to run
    RunningCommand {
        /// Command line
        command: String,
        /// Remote host
        host: String,
        /// Remote port
        port: u16,
        /// Login user
        user: String,
    },
    /// One line of remote command output
    CommandOutput {
        /// Source stream
        stream: OutputStream,
        /// Line content without the trailing newline
        line: String,
    },
}

/// Receiver of [`Observation`]s.
///
/// Called synchronously from whichever task or blocking thread produced the
/// observation, so implementations must be cheap and thread safe.
pub trait DispatchObserver: Send + Sync {
    /// Record one observation.
    fn observe(&self, observation: Observation);
}

/// Forwards observations to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn observe(&self, observation: Observation) {
        match observation {
            Observation::EventReceived {
                status,
                alert_name,
                alerts,
            } => info!(%status, alert = %alert_name, alerts, "Received alert group"),
            Observation::EventIgnored { status } => {
                info!(%status, "Alert group not firing, skipping rules");
            }
            Observation::RuleMatched { index, action } => {
                info!(rule = index, action = %action, "Rule matched");
            }
            Observation::ActionStarted { action } => info!(action = %action, "Executing action"),
            Observation::ActionFailed { action, error } => {
                error!(action = %action, error = %error, "Action failed");
            }
            Observation::ActionSucceeded { action } => info!(action = %action, "Action succeeded"),
            Observation::UnknownOption { action, option } => {
                warn!(action, option = %option, "Unknown option");
            }
            Observation::RestartingDeployment {
                namespace,
                deployment,
            } => info!(namespace = %namespace, deployment = %deployment, "Restarting deployment"),
            Observation::RunningCommand {
                command,
                host,
                port,
                user,
            } => info!(command = %command, host = %host, port, user = %user, "Running command"),
            Observation::CommandOutput { stream, line } => match stream {
                OutputStream::Stdout => info!(stream = "stdout", "{line}"),
                OutputStream::Stderr => error!(stream = "stderr", "{line}"),
            },
        }
    }
}

/// Keeps every observation in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observation>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything observed so far.
    #[must_use]
    pub fn observations(&self) -> Vec<Observation> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of actions that were started, in order.
    #[must_use]
    pub fn started_actions(&self) -> Vec<String> {
        self.observations()
            .into_iter()
            .filter_map(|o| match o {
                Observation::ActionStarted { action } => Some(action),
                _ => None,
            })
            .collect()
    }
}

impl DispatchObserver for RecordingObserver {
    fn observe(&self, observation: Observation) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let recorder = RecordingObserver::new();
        recorder.observe(Observation::ActionStarted {
            action: "a".to_string(),
        });
        recorder.observe(Observation::ActionSucceeded {
            action: "a".to_string(),
        });
        recorder.observe(Observation::ActionStarted {
            action: "b".to_string(),
        });

        assert_eq!(recorder.observations().len(), 3);
        assert_eq!(recorder.started_actions(), vec!["a", "b"]);
    }

    #[test]
    fn test_tracing_observer_accepts_everything() {
        let observer = TracingObserver;
        observer.observe(Observation::CommandOutput {
            stream: OutputStream::Stderr,
            line: "disk full".to_string(),
        });
        observer.observe(Observation::EventIgnored {
            status: AlertStatus::Resolved,
        });
    }
}
