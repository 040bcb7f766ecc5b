//! Webhook client.
//!
//! Turns a [`WebhookConfig`] plus a payload into one HTTP call and reduces
//! the response to text.

use std::collections::HashMap;

use chrono::{Local, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use tracing::{debug, info};

use snipline_core::template;
use snipline_core::types::{HttpMethod, WebhookConfig};

use crate::error::ActionError;

/// A response body after normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseText {
    /// JSON body re-serialized with 2-space indentation.
    Json(String),
    /// Body returned as received. Used for non-JSON content types and for
    /// bodies that claim JSON but do not parse.
    Raw(String),
}

impl ResponseText {
    /// Normalize `body` according to `content_type`.
    pub fn from_body(content_type: Option<&str>, body: String) -> Self {
        let claims_json = content_type.is_some_and(|ct| ct.contains("application/json"));
        if !claims_json {
            return ResponseText::Raw(body);
        }
        match serde_json::from_str::<serde_json::Value>(&body)
            .and_then(|v| serde_json::to_string_pretty(&v))
        {
            Ok(pretty) => ResponseText::Json(pretty),
            Err(e) => {
                debug!(error = %e, "Response claimed JSON but did not parse; keeping raw text");
                ResponseText::Raw(body)
            }
        }
    }

    pub fn into_string(self) -> String {
        match self {
            ResponseText::Json(s) | ResponseText::Raw(s) => s,
        }
    }
}

#[derive(Clone)]
pub struct WebhookClient {
    http: Client,
}

impl WebhookClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Execute `config` with `payload`.
    ///
    /// When `structured` is true the payload is already a JSON document and
    /// is sent verbatim as the body instead of rendering the body template.
    pub async fn invoke(
        &self,
        config: &WebhookConfig,
        payload: &str,
        structured: bool,
    ) -> Result<String, ActionError> {
        let url = render_url(&config.url, payload);
        info!(webhook = %config.name, method = %config.method, "Invoking webhook");

        let mut request = self.http.request(to_method(config.method), &url);
        for (name, value) in &config.headers {
            if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        request = request.header(CONTENT_TYPE, "application/json");

        if config.method.has_body() {
            request = request.body(build_body(config.body.as_deref(), payload, structured));
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ActionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        debug!(webhook = %config.name, status = status.as_u16(), "Webhook succeeded");
        Ok(ResponseText::from_body(content_type.as_deref(), body).into_string())
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Substitute `{{text}}` in the URL with the percent-encoded payload.
pub fn render_url(url: &str, payload: &str) -> String {
    let encoded = urlencoding::encode(payload);
    template::render_text(url, &encoded)
}

/// Request body for POST/PUT.
pub fn build_body(body_template: Option<&str>, payload: &str, structured: bool) -> String {
    if structured {
        return payload.to_string();
    }
    match body_template.filter(|t| !t.is_empty()) {
        Some(tpl) => {
            let now = Local::now();
            let timestamp = Utc::now().to_rfc3339();
            let date = now.format("%x").to_string();
            let time = now.format("%X").to_string();
            let vars = HashMap::from([
                (template::TEXT, payload),
                (template::TIMESTAMP, timestamp.as_str()),
                (template::DATE, date.as_str()),
                (template::TIME, time.as_str()),
            ]);
            template::render(tpl, &vars)
        }
        None => payload.to_string(),
    }
}
