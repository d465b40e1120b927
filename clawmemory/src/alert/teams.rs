//! Microsoft Teams alerts via the Graph API.
//!
//! Every send exchanges the stored refresh token for a fresh access token and
//! then posts one channel message. Tokens are not cached between runs.

use super::AlertError;
use crate::http::HttpPoster;
use crate::util::truncate_chars;
use serde_json::json;
use std::fmt;

const TOKEN_AUTHORITY: &str = "https://login.microsoftonline.com";
const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Teams credentials as read from the environment. Any of them may be absent;
/// `send` refuses to make a request unless all six are present.
#[derive(Clone, Default)]
pub struct TeamsConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub team_id: Option<String>,
    pub channel_id: Option<String>,
}

impl fmt::Debug for TeamsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("TeamsConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("team_id", &self.team_id)
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

/// A fully populated credential set.
struct TeamsCredentials<'a> {
    tenant_id: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    team_id: &'a str,
    channel_id: &'a str,
}

impl TeamsConfig {
    /// Check every credential up front. Blank values count as missing.
    fn credentials(&self) -> Result<TeamsCredentials<'_>, AlertError> {
        let mut missing = Vec::new();
        let credentials = TeamsCredentials {
            tenant_id: required("TEAM_TENANT_ID", &self.tenant_id, &mut missing),
            client_id: required("TEAM_CLIENT_ID", &self.client_id, &mut missing),
            client_secret: required("TEAM_CLIENT_SECRET", &self.client_secret, &mut missing),
            refresh_token: required("TEAM_REFRESH_TOKEN", &self.refresh_token, &mut missing),
            team_id: required("TEAM_ID", &self.team_id, &mut missing),
            channel_id: required("TEAM_CHANNEL_ID", &self.channel_id, &mut missing),
        };

        if missing.is_empty() {
            Ok(credentials)
        } else {
            Err(AlertError::Auth { missing })
        }
    }
}

fn required<'a>(
    name: &'static str,
    value: &'a Option<String>,
    missing: &mut Vec<&'static str>,
) -> &'a str {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(name);
            ""
        }
    }
}

/// Post `message` to the configured Teams channel.
pub async fn send(
    http: &dyn HttpPoster,
    config: &TeamsConfig,
    message: &str,
) -> Result<(), AlertError> {
    let credentials = config.credentials()?;

    let access_token = fetch_access_token(http, &credentials).await?;

    let url = format!(
        "{}/teams/{}/channels/{}/messages",
        GRAPH_API_BASE, credentials.team_id, credentials.channel_id
    );
    let payload = json!({ "body": { "content": message } });

    let reply = http
        .post_json(&url, &payload, Some(&access_token))
        .await
        .map_err(|e| AlertError::Delivery(format!("Teams message request failed: {}", e)))?;

    if !reply.is_success() {
        return Err(AlertError::Delivery(format!(
            "Graph API error ({}): {}",
            reply.status,
            truncate_chars(&reply.body, 200)
        )));
    }

    log::info!("[ALERT] Teams alert sent");
    Ok(())
}

/// Exchange the refresh token for a short-lived Graph access token.
async fn fetch_access_token(
    http: &dyn HttpPoster,
    credentials: &TeamsCredentials<'_>,
) -> Result<String, AlertError> {
    let url = format!(
        "{}/{}/oauth2/v2.0/token",
        TOKEN_AUTHORITY, credentials.tenant_id
    );

    let reply = http
        .post_form(
            &url,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token),
                ("client_id", credentials.client_id),
                ("client_secret", credentials.client_secret),
                ("scope", GRAPH_SCOPE),
            ],
        )
        .await
        .map_err(|e| AlertError::Delivery(format!("Failed to refresh token: {}", e)))?;

    if !reply.is_success() {
        return Err(AlertError::Delivery(format!(
            "Token refresh failed ({}): {}",
            reply.status,
            truncate_chars(&reply.body, 200)
        )));
    }

    #[derive(serde::Deserialize)]
    struct TokenResponse {
        access_token: String,
    }

    let token: TokenResponse = serde_json::from_str(&reply.body)
        .map_err(|e| AlertError::Delivery(format!("Failed to parse token response: {}", e)))?;

    Ok(token.access_token)
}
