//! Alert delivery to chat backends.
//!
//! Two backends are supported:
//! - generic webhook (Slack, Discord, custom receivers)
//! - Microsoft Teams channel messages via the Graph API
//!
//! Each call sends exactly one message and never retries.

pub mod teams;
pub mod webhook;

use crate::http::HttpPoster;
use std::fmt;

pub use teams::TeamsConfig;
pub use webhook::WebhookConfig;

/// Why an alert was not delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    /// The selected backend has no destination configured. Nothing was sent.
    NotConfigured(&'static str),
    /// Teams credentials are incomplete. Checked before any request is made.
    Auth { missing: Vec<&'static str> },
    /// Transport failure or non-2xx response.
    Delivery(String),
}

impl fmt::Display for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured(var) => write!(f, "{} not set, skipping alert", var),
            Self::Auth { missing } => write!(f, "Missing Teams config: {}", missing.join(", ")),
            Self::Delivery(msg) => write!(f, "Alert delivery failed: {}", msg),
        }
    }
}

impl std::error::Error for AlertError {}

/// The configured alert destination.
#[derive(Debug, Clone)]
pub enum AlertBackend {
    Webhook(WebhookConfig),
    Teams(TeamsConfig),
}

impl AlertBackend {
    /// Pick a backend from its configured name. Only `teams` selects Teams;
    /// anything else, including an unset value, falls back to the webhook.
    pub fn select(name: Option<&str>, webhook: WebhookConfig, teams: TeamsConfig) -> Self {
        match name.map(|n| n.trim().to_lowercase()).as_deref() {
            Some("teams") => AlertBackend::Teams(teams),
            _ => AlertBackend::Webhook(webhook),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertBackend::Webhook(_) => "webhook",
            AlertBackend::Teams(_) => "teams",
        }
    }

    /// Deliver `message` through this backend.
    pub async fn send(&self, http: &dyn HttpPoster, message: &str) -> Result<(), AlertError> {
        match self {
            AlertBackend::Webhook(config) => webhook::send(http, config, message).await,
            AlertBackend::Teams(config) => teams::send(http, config, message).await,
        }
    }
}

impl fmt::Display for AlertBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
