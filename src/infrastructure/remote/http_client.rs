use crate::application::ports::{CredentialProvider, RecordRemote, RemoteError};
use crate::domain::entities::RemoteRecord;
use crate::domain::value_objects::{RecordData, RecordId};
use crate::shared::config::RemoteConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const TARGET: &str = "remote::http";

/// Thin JSON client for the claims REST API.
///
/// Retries are not done here; callers own the retry policy.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::ConfigurationError(format!("HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(
        config: &RemoteConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, AppError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
            credentials,
        )
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = self.credentials.bearer_token() {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Send and decode a JSON response. An empty 2xx body decodes to `null`.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, RemoteError> {
        let mut request = self.request(method.clone(), path);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            tracing::debug!(target: TARGET, %method, path, error = %err, "request failed");
            RemoteError::Network(err.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| RemoteError::Network(err.to_string()))?;

        if !status.is_success() {
            tracing::debug!(
                target: TARGET,
                %method,
                path,
                status = status.as_u16(),
                "request rejected"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| RemoteError::Decode(err.to_string()))
    }

    /// Reachability check used by the connectivity probe.
    pub async fn ping(&self, path: &str) -> bool {
        match self.request(Method::GET, path).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(_) => false,
        }
    }
}

/// [`RecordRemote`] over a REST collection: `GET path`, `POST path`, `PATCH path/{id}`.
pub struct HttpRecordRemote {
    api: ApiClient,
    records_path: String,
}

impl HttpRecordRemote {
    pub fn new(api: ApiClient, records_path: impl Into<String>) -> Self {
        Self {
            api,
            records_path: records_path.into().trim_end_matches('/').to_string(),
        }
    }

    fn record_path(&self, id: &RecordId) -> String {
        format!("{}/{}", self.records_path, id)
    }
}

#[async_trait]
impl RecordRemote for HttpRecordRemote {
    async fn list(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        let body = self
            .api
            .send_json(Method::GET, &self.records_path, None)
            .await?;
        let items = match unwrap_envelope(body) {
            Value::Array(items) => items,
            other => {
                return Err(RemoteError::Decode(format!(
                    "expected a list of records, got {}",
                    kind_of(&other)
                )));
            }
        };
        items.into_iter().map(decode_record).collect()
    }

    async fn create(&self, record: &RecordData) -> Result<RemoteRecord, RemoteError> {
        let body = self
            .api
            .send_json(Method::POST, &self.records_path, Some(&record.to_value()))
            .await?;
        decode_record(unwrap_envelope(body))
    }

    async fn update(
        &self,
        id: &RecordId,
        updates: &RecordData,
    ) -> Result<RemoteRecord, RemoteError> {
        let body = self
            .api
            .send_json(Method::PATCH, &self.record_path(id), Some(&updates.to_value()))
            .await?;
        match unwrap_envelope(body) {
            // Some endpoints answer a PATCH with no body.
            Value::Null => Ok(RemoteRecord {
                id: id.clone(),
                data: updates.clone(),
            }),
            value => decode_record(value),
        }
    }
}

/// Accept both bare payloads and `{ "data": ... }` / `{ "records": ... }` envelopes.
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if !map.contains_key("id") => {
            for key in ["data", "records"] {
                if let Some(inner) = map.remove(key) {
                    if inner.is_array() || inner.is_object() {
                        return inner;
                    }
                    map.insert(key.to_string(), inner);
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn decode_record(value: Value) -> Result<RemoteRecord, RemoteError> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(RemoteError::Decode(format!(
                "expected a record object, got {}",
                kind_of(&other)
            )));
        }
    };
    let id = match map.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(RemoteError::Decode("record without id".to_string())),
    };
    let id = RecordId::new(id).map_err(RemoteError::Decode)?;
    Ok(RemoteRecord {
        id,
        data: RecordData::from_map(map),
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
