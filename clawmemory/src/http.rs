use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound POST requests used by the alert backends.
///
/// `Err` means the request never produced a response (connect failure,
/// timeout, unreadable body). Non-2xx responses come back as `Ok` and are
/// judged by the caller.
#[async_trait]
pub trait HttpPoster: Send + Sync {
    /// POST a JSON body, optionally with a bearer token.
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<HttpReply, String>;

    /// POST an `application/x-www-form-urlencoded` body.
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, String>;
}

/// `reqwest`-backed poster. Every request is bounded by the configured timeout.
pub struct ReqwestPoster {
    client: Client,
}

impl ReqwestPoster {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpPoster for ReqwestPoster {
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<HttpReply, String> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        read_reply(response).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, String> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        read_reply(response).await
    }
}

async fn read_reply(response: reqwest::Response) -> Result<HttpReply, String> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response: {}", e))?;
    Ok(HttpReply { status, body })
}
