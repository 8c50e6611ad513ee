//! Uniform success/failure envelope returned by every gateway call.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Outcome of a gateway call.
///
/// On the wire this is `{success, data?, message?, error?}` where the
/// success tag decides which payload fields are present.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult<T = Value> {
  Success { data: T, message: Option<String> },
  Failure { error: String },
}

impl<T> CallResult<T> {
  pub fn ok(data: T) -> Self {
    CallResult::Success {
      data,
      message: None,
    }
  }

  pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
    CallResult::Success {
      data,
      message: Some(message.into()),
    }
  }

  pub fn fail(error: impl Into<String>) -> Self {
    CallResult::Failure {
      error: error.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, CallResult::Success { .. })
  }

  /// Convert into a std Result, dropping the success message
  pub fn into_result(self) -> Result<T, String> {
    match self {
      CallResult::Success { data, .. } => Ok(data),
      CallResult::Failure { error } => Err(error),
    }
  }
}

#[cfg(test)]
impl<T> CallResult<T> {
  pub fn data(&self) -> Option<&T> {
    match self {
      CallResult::Success { data, .. } => Some(data),
      CallResult::Failure { .. } => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      CallResult::Success { .. } => None,
      CallResult::Failure { error } => Some(error),
    }
  }

  pub fn message(&self) -> Option<&str> {
    match self {
      CallResult::Success { message, .. } => message.as_deref(),
      CallResult::Failure { .. } => None,
    }
  }
}

impl CallResult<Value> {
  /// Read a remote response envelope without re-validating it.
  ///
  /// Anything but `success: true` counts as a failure; a failure without an
  /// `error` string gets a generic one so the message is never empty.
  pub fn from_envelope(body: Value) -> Self {
    let mut body = match body {
      Value::Object(map) => map,
      other => {
        return CallResult::fail(format!("Unexpected response body: {}", other));
      }
    };

    let success = matches!(body.get("success"), Some(Value::Bool(true)));
    let message = match body.remove("message") {
      Some(Value::String(s)) => Some(s),
      _ => None,
    };

    if success {
      CallResult::Success {
        data: body.remove("data").unwrap_or(Value::Null),
        message,
      }
    } else {
      let error = match body.remove("error") {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(other @ (Value::Object(_) | Value::Array(_) | Value::Number(_) | Value::Bool(_))) => {
          other.to_string()
        }
        _ => message.unwrap_or_else(|| "Request was not successful".to_string()),
      };
      CallResult::Failure { error }
    }
  }

  /// Deserialize the success payload into a concrete type
  pub fn decode<T: DeserializeOwned>(self) -> CallResult<T> {
    match self {
      CallResult::Success { data, message } => match serde_json::from_value(data) {
        Ok(data) => CallResult::Success { data, message },
        Err(e) => CallResult::fail(format!("Malformed response data: {}", e)),
      },
      CallResult::Failure { error } => CallResult::Failure { error },
    }
  }
}

#[derive(Serialize)]
struct Envelope<T> {
  success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  data: Option<T>,
  #[serde(skip_serializing_if = "Option::is_none")]
  message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

impl<T: Serialize> Serialize for CallResult<T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let envelope = match self {
      CallResult::Success { data, message } => Envelope {
        success: true,
        data: Some(data),
        message: message.clone(),
        error: None,
      },
      CallResult::Failure { error } => Envelope {
        success: false,
        data: None,
        message: None,
        error: Some(error.clone()),
      },
    };
    envelope.serialize(serializer)
  }
}
