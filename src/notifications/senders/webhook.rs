use async_trait::async_trait;
use reqwest::{Client, Method, header};
use std::collections::HashMap;
use tera::{Context, Tera};

use super::{NotificationSender, SenderError};
use crate::notifications::models::ChannelConfig;

/// Pushes alerts to an arbitrary HTTP endpoint.
pub struct WebhookSender {
    client: Client,
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl WebhookSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn parse_method(method: &str) -> Result<Method, SenderError> {
    match method.to_uppercase().as_str() {
        "POST" => Ok(Method::POST),
        "GET" => Ok(Method::GET),
        _ => Err(SenderError::InvalidConfiguration(format!(
            "Unsupported HTTP method: {method}"
        ))),
    }
}

/// Renders the POST body; without a template the plain message is wrapped as `{"text": ...}`.
fn render_body(
    body_template: Option<&str>,
    message: &str,
    context: &HashMap<String, String>,
) -> Result<String, SenderError> {
    let Some(template) = body_template else {
        return Ok(serde_json::json!({ "text": message }).to_string());
    };
    let mut tera_context = Context::new();
    for (key, value) in context {
        tera_context.insert(key, value);
    }
    tera_context.insert("message", message);
    Tera::one_off(template, &tera_context, false)
        .map_err(|e| SenderError::TemplatingError(e.to_string()))
}

fn build_headers(headers: &HashMap<String, String>) -> Result<header::HeaderMap, SenderError> {
    let mut header_map = header::HeaderMap::new();
    for (key, value) in headers {
        let header_name = header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| SenderError::InvalidConfiguration(format!("Invalid header name: {e}")))?;
        let header_value = header::HeaderValue::from_str(value)
            .map_err(|e| SenderError::InvalidConfiguration(format!("Invalid header value: {e}")))?;
        header_map.insert(header_name, header_value);
    }
    Ok(header_map)
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), SenderError> {
        let ChannelConfig::Webhook {
            url,
            method,
            headers,
            body_template,
        } = config
        else {
            return Err(SenderError::InvalidConfiguration(
                "Expected Webhook config, but found a different type.".to_string(),
            ));
        };

        let http_method = parse_method(method)?;
        let mut request_builder = self.client.request(http_method.clone(), url);

        if let Some(h) = headers {
            request_builder = request_builder.headers(build_headers(h)?);
        }

        if http_method == Method::POST {
            let rendered_body = render_body(body_template.as_deref(), message, context)?;
            request_builder = request_builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(rendered_body);
        }

        let response = request_builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
