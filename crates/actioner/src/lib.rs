//! Alert-triggered remediation.
//!
//! This crate provides:
//! - Alertmanager webhook payload types
//! - Label-matching rules and the dispatcher that evaluates them
//! - The action registry with rollout-restart and SSH remote-command actions
//! - `known_hosts`-style host key and certificate verification
//! - Prometheus counters fed from dispatch observations
//! - The HTTP servers, signal handling and configuration used by the
//!   `metrics-actioner` binary

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod actions;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hostkeys;
pub mod k8s;
pub mod metrics;
pub mod models;
pub mod observer;
pub mod rules;
pub mod server;
pub mod shutdown;

pub use actions::{Action, ActionOptions, ActionRegistry};
pub use config::Config;
pub use dispatcher::RuleDispatcher;
pub use error::{Error, ErrorKind, Result};
pub use hostkeys::{HostKeyPolicy, TrustDatabase};
pub use metrics::{Metrics, MetricsObserver};
pub use models::{AlertGroupEvent, AlertRecord, AlertStatus, Labels};
pub use observer::{DispatchObserver, Observation, RecordingObserver, TracingObserver};
pub use rules::Rule;
pub use server::HttpServer;
