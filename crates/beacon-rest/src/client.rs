//! REST client trait and its `reqwest` implementation.

use std::time::Duration;

use async_trait::async_trait;
use beacon_settings::RestSettings;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::RestError;

/// Stateless request/response collaborator.
///
/// Implementations carry no protocol state; every call is independent.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Issue one request and return the decoded JSON body.
    ///
    /// An empty body (e.g. `204 No Content`) yields [`Value::Null`].
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Value, RestError>;
}

/// [`RestClient`] over `reqwest`, authorizing with a bot credential.
pub struct HttpRestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRestClient {
    /// Build a client from settings. `token` is sent as `Authorization: Bot <token>`.
    pub fn new(settings: &RestSettings, token: Option<String>) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Value, RestError> {
        debug!(%method, path, "rest request");

        let mut req = self.http.request(method, self.url_for(path));
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bot {token}"));
        }
        if let Some(headers) = headers {
            req = req.headers(headers);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            warn!(status = status.as_u16(), path, %message, "rest request failed");
            return Err(RestError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
