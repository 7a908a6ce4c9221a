//! Fleetdeck console - deployment wizard and node health monitor
//!
//! Client-side orchestration for provisioning and supervising an AI-inference
//! node fleet through a remote Fleet Management API:
//! - Multi-step deployment wizard with step validation and a verification gate
//! - Deployment poller that waits for a freshly provisioned node's agent
//! - Node health monitor classifying every registered node from its heartbeat

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod poller;
pub mod schedule;
pub mod view;
pub mod wizard;

pub use api::{FleetApi, HttpFleetApi};
pub use config::ConsoleConfig;
pub use error::{ApiError, ConfigError, PayloadError};
pub use monitor::{HealthClass, NodeHealthMonitor};
pub use poller::{DeploymentPoller, PollOutcome, PollPhase};
pub use wizard::{WizardEvent, WizardSession, WizardState};
