use serde::{Deserialize, Serialize};
use std::fmt;

/// Handler registry key. Unknown tags survive as `Other` so persisted
/// operations written by a newer build are never dropped on load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    PhotoUpload,
    SmsSend,
    EmailSend,
    Other(String),
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::PhotoUpload => "photo_upload",
            OperationKind::SmsSend => "sms_send",
            OperationKind::EmailSend => "email_send",
            OperationKind::Other(value) => value.as_str(),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for OperationKind {
    fn from(value: &str) -> Self {
        match value {
            "photo_upload" => OperationKind::PhotoUpload,
            "sms_send" => OperationKind::SmsSend,
            "email_send" => OperationKind::EmailSend,
            other => OperationKind::Other(other.to_string()),
        }
    }
}

impl From<String> for OperationKind {
    fn from(value: String) -> Self {
        OperationKind::from(value.as_str())
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.as_str().to_string()
    }
}
