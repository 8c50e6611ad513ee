use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::result::CallResult;

/// JSON object sent as a call payload
pub type Payload = serde_json::Map<String, Value>;

/// One teaching report row as stored by the backend
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingReport {
  #[serde(default, deserialize_with = "lenient_string")]
  pub teacher_id: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub date: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub classroom: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub period: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub subject: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub teacher: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub status: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub reporter: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub time: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub term: Option<String>,
}

/// A user record as returned by `getUsers`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(default, deserialize_with = "lenient_string")]
  pub username: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub name: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub role: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub classroom: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub line_id: Option<String>,
}

/// A classroom that has not reported for the day
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissingReport {
  #[serde(default, deserialize_with = "lenient_string")]
  pub classroom: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub level: Option<String>,
}

/// Snapshot produced by the backup composite
#[derive(Debug, Clone, Serialize)]
pub struct BackupSnapshot {
  pub timestamp: String,
  pub reports: Value,
  pub users: Value,
  pub subjects: Value,
}

/// Outcome of one classroom reminder
#[derive(Debug, Clone, Serialize)]
pub struct ReminderOutcome {
  pub classroom: String,
  pub level: String,
  pub result: CallResult,
}

/// Aggregate of the daily reminder fan-out
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderReport {
  pub sent: usize,
  pub total: usize,
  pub results: Vec<ReminderOutcome>,
}

/// Accept strings, numbers and booleans as text; null reads as absent.
///
/// Sheet-backed rows carry whatever type the cell had.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v = Option::<Value>::deserialize(deserializer)?;
  Ok(match v {
    None | Some(Value::Null) => None,
    Some(Value::String(s)) => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    Some(Value::Bool(b)) => Some(b.to_string()),
    Some(other) => Some(other.to_string()),
  })
}
