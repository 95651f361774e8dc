//! HTTP Request Block
//!
//! Performs an HTTP request and exposes the response.

use std::time::Duration;

use async_trait::async_trait;
use block_engine::{
    extension_keys, BlockCategory, BlockDefinition, BlockEngineError, BlockExecutor, BlockInputs, BlockOutputs,
    ExecutionContext, InputPort, OutputPort, PortDataType, Result,
};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::config::HttpConfig;
use crate::ports::{as_text, config_str, config_u64, optional, outputs, require_text};
use crate::BlockDescriptor;

/// HTTP Request Block
///
/// Uses the `reqwest::Client` from the execution extensions when present,
/// otherwise a client owned by the block. Non-2xx responses are not errors;
/// they are reported through `status` and `ok`.
///
/// # Inputs
/// - `url` (required) - Request URL
/// - `data` - Request body; strings are sent as text, everything else as JSON
/// - `requestHeaders` - Header object merged over the configured headers
///
/// # Configuration
/// - `method` - HTTP method (default: GET)
/// - `headers` - Header object
/// - `timeoutMs` - Overrides the configured timeout
///
/// # Outputs
/// - `status`, `body`, `headers`, `ok`
pub struct HttpRequestBlock {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpRequestBlock {
    pub const PORT_URL: &'static str = "url";
    pub const PORT_DATA: &'static str = "data";
    pub const PORT_REQUEST_HEADERS: &'static str = "requestHeaders";
    pub const PORT_STATUS: &'static str = "status";
    pub const PORT_BODY: &'static str = "body";
    pub const PORT_HEADERS: &'static str = "headers";
    pub const PORT_OK: &'static str = "ok";

    pub fn new(config: HttpConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn method(config: &Value) -> Result<Method> {
        let method = config_str(config, "method").unwrap_or("GET").to_uppercase();
        Method::from_bytes(method.as_bytes())
            .map_err(|_| BlockEngineError::failed(format!("Invalid HTTP method '{}'", method)))
    }

    /// Configured headers with input headers layered on top
    fn headers(config: &Value, inputs: &BlockInputs) -> Vec<(String, String)> {
        let mut merged: Map<String, Value> = Map::new();
        for source in [config.get("headers"), optional(inputs, Self::PORT_REQUEST_HEADERS)] {
            if let Some(Value::Object(map)) = source {
                merged.extend(map.clone());
            }
        }
        merged.into_iter().map(|(k, v)| (k, as_text(&v))).collect()
    }
}

impl BlockDescriptor for HttpRequestBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("http-request", BlockCategory::Action, "HTTP Request")
            .with_description("Sends an HTTP request and outputs the response")
            .input(InputPort::required(Self::PORT_URL, "URL", PortDataType::Text))
            .input(InputPort::optional(Self::PORT_DATA, "Data", PortDataType::Any).accepting([PortDataType::Any]))
            .input(
                InputPort::optional(Self::PORT_REQUEST_HEADERS, "Request Headers", PortDataType::Object)
                    .with_default(json!({})),
            )
            .output(OutputPort::new(Self::PORT_STATUS, "Status", PortDataType::Number))
            .output(OutputPort::new(Self::PORT_BODY, "Body", PortDataType::Any))
            .output(OutputPort::new(Self::PORT_HEADERS, "Headers", PortDataType::Object))
            .output(OutputPort::new(Self::PORT_OK, "OK", PortDataType::Boolean))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "method": { "type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"] },
                    "headers": { "type": "object" },
                    "timeoutMs": { "type": "integer", "minimum": 1 }
                }
            }))
            .with_default_config(json!({ "method": "GET", "headers": {} }))
    }
}

#[async_trait]
impl BlockExecutor for HttpRequestBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let url = require_text(&inputs, Self::PORT_URL)?;
        let method = Self::method(config)?;
        let timeout = config_u64(config, "timeoutMs").unwrap_or(self.config.timeout_ms);

        let client = ctx
            .extensions
            .get::<reqwest::Client>(extension_keys::HTTP_CLIENT)
            .unwrap_or(&self.client);

        log::debug!("HttpRequestBlock {}: {} {}", ctx.instance_id, method, url);

        let mut request = client
            .request(method, &url)
            .timeout(Duration::from_millis(timeout))
            .header(reqwest::header::USER_AGENT, &self.config.user_agent);
        for (name, value) in Self::headers(config, &inputs) {
            request = request.header(name, value);
        }
        request = match optional(&inputs, Self::PORT_DATA) {
            Some(Value::String(text)) => request.body(text.clone()),
            Some(body) => request.json(body),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| BlockEngineError::failed(format!("HTTP request to {} failed: {}", url, e)))?;

        let status = response.status();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
            .collect();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        let text = response
            .text()
            .await
            .map_err(|e| BlockEngineError::failed(format!("Failed to read response body: {}", e)))?;
        let body = if is_json {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        if !status.is_success() {
            log::warn!("HttpRequestBlock {}: {} returned {}", ctx.instance_id, url, status);
        }

        Ok(outputs([
            (Self::PORT_STATUS, json!(status.as_u16())),
            (Self::PORT_BODY, body),
            (Self::PORT_HEADERS, Value::Object(headers)),
            (Self::PORT_OK, json!(status.is_success())),
        ]))
    }
}
