use super::http_client::ApiClient;
use crate::application::ports::{HandlerError, OperationHandler};
use crate::domain::value_objects::OperationPayload;
use async_trait::async_trait;
use reqwest::Method;

/// Delivers a queued operation by POSTing its payload to a fixed endpoint.
pub struct HttpOperationHandler {
    api: ApiClient,
    path: String,
}

impl HttpOperationHandler {
    pub fn new(api: ApiClient, path: impl Into<String>) -> Self {
        Self {
            api,
            path: path.into(),
        }
    }
}

#[async_trait]
impl OperationHandler for HttpOperationHandler {
    async fn handle(&self, payload: &OperationPayload) -> Result<(), HandlerError> {
        self.api
            .send_json(Method::POST, &self.path, Some(payload.as_json()))
            .await
            .map(|_| ())
            .map_err(HandlerError::from)
    }
}
