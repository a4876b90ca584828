use crate::application::ports::remote_api::RemoteError;
use crate::domain::value_objects::OperationPayload;
use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// Consumes one retry and is attempted again after backoff.
    #[error("{0}")]
    Retryable(String),

    /// Discarded immediately; retrying cannot succeed.
    #[error("{0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn retryable(message: impl Into<String>) -> Self {
        HandlerError::Retryable(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        HandlerError::Permanent(message.into())
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, HandlerError::Permanent(_))
    }
}

impl From<RemoteError> for HandlerError {
    fn from(err: RemoteError) -> Self {
        if err.is_retryable() {
            HandlerError::Retryable(err.to_string())
        } else {
            HandlerError::Permanent(err.to_string())
        }
    }
}

/// Executor for one operation kind. Must tolerate at-least-once delivery.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn handle(&self, payload: &OperationPayload) -> Result<(), HandlerError>;
}

pub struct FnHandler<F> {
    f: F,
}

/// Adapt an async closure into an [`OperationHandler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(OperationPayload) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> OperationHandler for FnHandler<F>
where
    F: Fn(OperationPayload) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync,
{
    async fn handle(&self, payload: &OperationPayload) -> Result<(), HandlerError> {
        (self.f)(payload.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn remote_errors_classify_into_handler_errors() {
        let transient: HandlerError = RemoteError::Network("timeout".into()).into();
        assert!(!transient.is_permanent());

        let rejected: HandlerError = RemoteError::Status {
            status: 422,
            body: "bad phone".into(),
        }
        .into();
        assert!(rejected.is_permanent());
    }

    #[tokio::test]
    async fn closures_adapt_into_handlers() {
        let handler = handler_fn(|payload: OperationPayload| {
            async move {
                if payload.as_json().get("fail").is_some() {
                    Err(HandlerError::retryable("asked to fail"))
                } else {
                    Ok(())
                }
            }
            .boxed()
        });

        let ok = OperationPayload::new(serde_json::json!({"to": "+1555"})).unwrap();
        let fail = OperationPayload::new(serde_json::json!({"fail": true})).unwrap();
        assert!(handler.handle(&ok).await.is_ok());
        assert!(handler.handle(&fail).await.is_err());
    }
}
