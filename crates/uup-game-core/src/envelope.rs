use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{lenient, GameError};

/// Message used when a failure envelope carries neither `data.reason` nor `message`.
pub const UNSPECIFIED_FAILURE: &str = "request failed without a reason";

/// Envelope exactly as the backend sends it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEnvelope {
    #[serde(deserialize_with = "lenient::flag")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

fn string_field<'a>(data: Option<&'a Value>, key: &str) -> Option<&'a str> {
    data.and_then(|data| data.get(key)).and_then(Value::as_str)
}

impl RawEnvelope {
    /// Resolve the human-readable message, which the backend nests in `data.reason`
    /// (failures) or `data.message` (successes) on some code paths and leaves at the top
    /// level on others.
    #[must_use]
    pub fn normalize(self) -> ServerResponse {
        let data_key = if self.success { "message" } else { "reason" };
        let message = string_field(self.data.as_ref(), data_key)
            .map(str::to_string)
            .or(self.message);
        let data = self.data.unwrap_or(Value::Null);

        if self.success {
            ServerResponse::Success { message: message.unwrap_or_default(), data }
        } else {
            ServerResponse::Failure {
                message: message.unwrap_or_else(|| UNSPECIFIED_FAILURE.to_string()),
                data,
            }
        }
    }
}

/// Normalized provider response. Serializes as `{success, message, data}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(into = "ResponseBody", from = "ResponseBody")]
pub enum ServerResponse {
    Success { message: String, data: Value },
    Failure { message: String, data: Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseBody {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

impl From<ServerResponse> for ResponseBody {
    fn from(response: ServerResponse) -> Self {
        match response {
            ServerResponse::Success { message, data } => Self { success: true, message, data },
            ServerResponse::Failure { message, data } => Self { success: false, message, data },
        }
    }
}

impl From<ResponseBody> for ServerResponse {
    fn from(body: ResponseBody) -> Self {
        if body.success {
            Self::Success { message: body.message, data: body.data }
        } else {
            Self::Failure { message: body.message, data: body.data }
        }
    }
}

impl From<RawEnvelope> for ServerResponse {
    fn from(raw: RawEnvelope) -> Self {
        raw.normalize()
    }
}

impl ServerResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    #[must_use]
    pub fn data(&self) -> &Value {
        match self {
            Self::Success { data, .. } | Self::Failure { data, .. } => data,
        }
    }

    /// Unwrap the payload of a successful response.
    ///
    /// # Errors
    /// Returns [`GameError::Provider`] carrying the normalized message on failure.
    pub fn into_data(self) -> Result<Value, GameError> {
        match self {
            Self::Success { data, .. } => Ok(data),
            Self::Failure { message, .. } => Err(GameError::Provider(message)),
        }
    }
}
