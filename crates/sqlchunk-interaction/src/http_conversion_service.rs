//! HttpConversionService - JSON-over-HTTP client for the conversion service.
//!
//! Both endpoints take a JSON body and answer with a JSON object. Error
//! answers carry a `detail` that is either a string or an object with
//! `message`/`exception` fields.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use sqlchunk_core::config::ServiceConfig;
use sqlchunk_core::service::{
    ConversionService, ConvertChunkRequest, ConvertChunkResponse, NormalizePromptRequest,
    NormalizePromptResponse, ServiceError,
};

/// [`ConversionService`] backed by the remote HTTP service.
///
/// No request timeout is applied; a slow conversion simply keeps its slot.
#[derive(Clone)]
pub struct HttpConversionService {
    client: Client,
    normalize_url: String,
    convert_url: String,
}

impl HttpConversionService {
    pub fn new(base_url: &str, normalize_path: &str, convert_path: &str) -> Self {
        Self {
            client: Client::new(),
            normalize_url: join_url(base_url, normalize_path),
            convert_url: join_url(base_url, convert_path),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.base_url, &config.normalize_path, &config.convert_path)
    }

    pub fn normalize_url(&self) -> &str {
        &self.normalize_url
    }

    pub fn convert_url(&self) -> &str {
        &self.convert_url
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Value, ServiceError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| ServiceError::Transport(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ServiceError::Transport(format!("failed to read response: {err}")))?;
        let parsed = serde_json::from_str::<Value>(&text).ok();

        if !status.is_success() {
            return Err(map_http_error(status, parsed.as_ref()));
        }

        parsed.ok_or_else(|| {
            ServiceError::UnexpectedShape(format!("response from {url} is not JSON"))
        })
    }
}

#[async_trait]
impl ConversionService for HttpConversionService {
    async fn normalize_prompt(
        &self,
        request: &NormalizePromptRequest,
    ) -> Result<NormalizePromptResponse, ServiceError> {
        tracing::debug!(task_id = %request.task_id, chunks = request.chunked_sql.len(), "Requesting prompt normalization");
        let body = self.post_json(&self.normalize_url, request).await?;
        extract_general_prompt(&body).map(|general_prompt| NormalizePromptResponse { general_prompt })
    }

    async fn convert_chunk(
        &self,
        request: &ConvertChunkRequest,
    ) -> Result<ConvertChunkResponse, ServiceError> {
        tracing::debug!(task_id = %request.task_id, "Requesting chunk conversion");
        let body = self.post_json(&self.convert_url, request).await?;
        Ok(extract_convert_response(&body))
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim().trim_end_matches('/'),
        path.trim().trim_start_matches('/')
    )
}

/// Any string is accepted; an empty one leaves the session pending.
fn extract_general_prompt(body: &Value) -> Result<String, ServiceError> {
    match body.get("general_prompt").and_then(Value::as_str) {
        Some(prompt) => Ok(prompt.to_string()),
        None => Err(ServiceError::UnexpectedShape(
            "the service returned no general_prompt or an unexpected format".to_string(),
        )),
    }
}

/// Non-string fields read as empty.
fn extract_convert_response(body: &Value) -> ConvertChunkResponse {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    ConvertChunkResponse {
        sql: field("sql"),
        exception: field("exception"),
    }
}

fn map_http_error(status: StatusCode, body: Option<&Value>) -> ServiceError {
    let message = body
        .and_then(|b| b.get("detail"))
        .and_then(detail_message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    ServiceError::Service {
        status: Some(status.as_u16()),
        message,
    }
}

/// A string detail is the message; an object prefers `exception`, then `message`.
fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["exception", "message"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| Some(detail.to_string())),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
