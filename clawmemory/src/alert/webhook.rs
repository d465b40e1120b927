//! Generic webhook alerts (Slack, Discord, custom receivers).

use super::AlertError;
use crate::http::HttpPoster;
use crate::util::truncate_chars;
use serde_json::json;

#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub url: Option<String>,
}

/// POST `message` to the webhook.
///
/// The payload carries the text under both `text` (Slack) and `content`
/// (Discord) so one shape works for either receiver.
pub async fn send(
    http: &dyn HttpPoster,
    config: &WebhookConfig,
    message: &str,
) -> Result<(), AlertError> {
    let url = match config.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => return Err(AlertError::NotConfigured("ALERT_WEBHOOK_URL")),
    };

    let payload = json!({ "text": message, "content": message });

    let reply = http
        .post_json(url, &payload, None)
        .await
        .map_err(|e| AlertError::Delivery(format!("Webhook request failed: {}", e)))?;

    if !reply.is_success() {
        return Err(AlertError::Delivery(format!(
            "Webhook returned HTTP {}: {}",
            reply.status,
            truncate_chars(&reply.body, 200)
        )));
    }

    log::info!("[ALERT] Webhook alert sent");
    Ok(())
}
