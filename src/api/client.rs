use chrono::{NaiveDate, Utc};
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use tracing::{debug, error};
use url::Url;

use crate::config::Config;

use super::operation::{Method, Operation};
use super::result::CallResult;
use super::transport::{HttpRequest, HttpTransport, Transport};
use super::types::Payload;

/// Default text for classroom reminders; `{classroom}` and `{level}` are filled in
pub const DEFAULT_REMINDER_TEMPLATE: &str = "Reminder: classroom {classroom} (level {level}) has not \
reported today's teaching yet. Please report before 17:30. If you already have, please ignore this message.";

/// Teaching-record API gateway.
///
/// Every call is exactly one round-trip against the configured endpoint, and
/// every outcome comes back as a [`CallResult`]; transport problems never
/// surface as `Err`.
#[derive(Clone)]
pub struct Gateway<T = HttpTransport> {
  endpoint: Url,
  transport: T,
  pub(super) reminder_template: String,
}

impl Gateway<HttpTransport> {
  pub fn new(config: &Config) -> Result<Self> {
    let endpoint = config.api_url()?;
    let transport = HttpTransport::new()?;

    Ok(
      Self::with_transport(endpoint, transport)
        .with_reminder_template(config.reminders.template.clone()),
    )
  }
}

impl<T: Transport> Gateway<T> {
  pub fn with_transport(endpoint: Url, transport: T) -> Self {
    Self {
      endpoint,
      transport,
      reminder_template: DEFAULT_REMINDER_TEMPLATE.to_string(),
    }
  }

  pub fn with_reminder_template(mut self, template: impl Into<String>) -> Self {
    self.reminder_template = template.into();
    self
  }

  /// Endpoint URL with `action=<action>` appended
  fn action_url(&self, action: &str) -> Url {
    let mut url = self.endpoint.clone();
    url.query_pairs_mut().append_pair("action", action);
    url
  }

  /// Perform one call against the backend.
  ///
  /// GET requests carry no body, so the payload is not transmitted for them.
  pub async fn call(&self, op: Operation, payload: &Payload, method: Method) -> CallResult {
    match self.round_trip(op, payload, method).await {
      Ok(result) => result,
      Err(e) => {
        error!(action = op.action(), "API call error: {:#}", e);
        CallResult::fail(e.to_string())
      }
    }
  }

  async fn round_trip(&self, op: Operation, payload: &Payload, method: Method) -> Result<CallResult> {
    let url = self.action_url(op.action());
    let body = match method {
      Method::Get => None,
      Method::Post => Some(
        serde_json::to_vec(payload).map_err(|e| eyre!("Failed to encode payload: {}", e))?,
      ),
    };

    debug!(action = op.action(), method = method.as_str(), "calling backend");

    let response = self.transport.send(HttpRequest { method, url, body }).await?;

    if !response.is_success() {
      return Err(eyre!("HTTP error! status: {}", response.status));
    }

    let body: Value = serde_json::from_slice(&response.body)
      .map_err(|e| eyre!("Malformed JSON response: {}", e))?;

    Ok(CallResult::from_envelope(body))
  }

  /// Call with the operation's usual verb
  async fn invoke(&self, op: Operation, payload: Payload) -> CallResult {
    self.call(op, &payload, op.default_method()).await
  }

  /// Check that the endpoint answers; the response body is ignored
  pub async fn ping(&self) -> CallResult<()> {
    let request = HttpRequest::get(self.action_url(Operation::Test.action()));
    match self.transport.send(request).await {
      Ok(response) if response.is_success() => CallResult::ok_with_message((), "API connected"),
      Ok(response) => {
        error!(status = response.status, "API connection failed");
        CallResult::fail(format!(
          "API connection failed (status {})",
          response.status
        ))
      }
      Err(e) => {
        error!("API connection error: {:#}", e);
        CallResult::fail(e.to_string())
      }
    }
  }

  // Reports

  pub async fn create_report(&self, report: Payload) -> CallResult {
    self.invoke(Operation::CreateReport, report).await
  }

  pub async fn get_reports(&self, filters: Payload) -> CallResult {
    self.invoke(Operation::ReadReports, filters).await
  }

  pub async fn update_report(&self, id: impl Into<Value>, fields: Payload) -> CallResult {
    self.invoke(Operation::UpdateReport, with_id(id, fields)).await
  }

  pub async fn delete_report(&self, id: impl Into<Value>) -> CallResult {
    self.invoke(Operation::DeleteReport, with_id(id, Payload::new())).await
  }

  // Users

  pub async fn get_users(&self, role: Option<&str>) -> CallResult {
    let mut filters = Payload::new();
    if let Some(role) = role {
      filters.insert("role".into(), json!(role));
    }
    self.invoke(Operation::GetUsers, filters).await
  }

  pub async fn create_user(&self, user: Payload) -> CallResult {
    self.invoke(Operation::CreateUser, user).await
  }

  pub async fn update_user(&self, id: impl Into<Value>, fields: Payload) -> CallResult {
    self.invoke(Operation::UpdateUser, with_id(id, fields)).await
  }

  pub async fn delete_user(&self, id: impl Into<Value>) -> CallResult {
    self.invoke(Operation::DeleteUser, with_id(id, Payload::new())).await
  }

  // Subjects

  pub async fn get_subjects(&self) -> CallResult {
    self.invoke(Operation::GetSubjects, Payload::new()).await
  }

  pub async fn create_subject(&self, subject: Payload) -> CallResult {
    self.invoke(Operation::CreateSubject, subject).await
  }

  pub async fn update_subject(&self, id: impl Into<Value>, fields: Payload) -> CallResult {
    self.invoke(Operation::UpdateSubject, with_id(id, fields)).await
  }

  pub async fn delete_subject(&self, id: impl Into<Value>) -> CallResult {
    self.invoke(Operation::DeleteSubject, with_id(id, Payload::new())).await
  }

  // Statistics

  pub async fn get_statistics(&self, date_range: Payload) -> CallResult {
    self.invoke(Operation::GetStatistics, date_range).await
  }

  pub async fn get_attendance(&self, grade: Option<&str>, date: Option<&str>) -> CallResult {
    let mut filters = Payload::new();
    if let Some(grade) = grade {
      filters.insert("grade".into(), json!(grade));
    }
    if let Some(date) = date {
      filters.insert("date".into(), json!(date));
    }
    self.invoke(Operation::GetAttendance, filters).await
  }

  /// Classrooms without a report on `date` (today, UTC, when not given)
  pub async fn get_missing_reports(&self, date: Option<NaiveDate>) -> CallResult {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let mut filters = Payload::new();
    filters.insert("date".into(), json!(date.format("%Y-%m-%d").to_string()));
    self.invoke(Operation::GetMissingReports, filters).await
  }

  // LINE messaging

  pub async fn send_line_message(&self, user_id: &str, message: &str) -> CallResult {
    let mut payload = Payload::new();
    payload.insert("userId".into(), json!(user_id));
    payload.insert("message".into(), json!(message));
    self.invoke(Operation::SendLineMessage, payload).await
  }

  pub async fn send_broadcast_to_teachers(&self, message: &str) -> CallResult {
    let mut payload = Payload::new();
    payload.insert("role".into(), json!("teacher"));
    payload.insert("message".into(), json!(message));
    self.invoke(Operation::SendBroadcast, payload).await
  }

  // Raw sheet access

  pub async fn get_sheet_data(&self, sheet_name: &str, range: Option<&str>) -> CallResult {
    self
      .invoke(
        Operation::GetSheetData,
        sheet_payload(sheet_name, "range", json!(range.unwrap_or("A:Z"))),
      )
      .await
  }

  pub async fn append_to_sheet(&self, sheet_name: &str, data: Value) -> CallResult {
    self
      .invoke(Operation::AppendToSheet, sheet_payload(sheet_name, "data", data))
      .await
  }

  pub async fn clear_sheet(&self, sheet_name: &str, range: Option<&str>) -> CallResult {
    self
      .invoke(
        Operation::ClearSheet,
        sheet_payload(sheet_name, "range", json!(range.unwrap_or("A2:Z"))),
      )
      .await
  }
}

/// `{id, ...fields}`: a field named `id` overrides the explicit one
fn with_id(id: impl Into<Value>, fields: Payload) -> Payload {
  let mut payload = Payload::new();
  payload.insert("id".into(), id.into());
  payload.extend(fields);
  payload
}

fn sheet_payload(sheet_name: &str, key: &str, value: Value) -> Payload {
  let mut payload = Payload::new();
  payload.insert("sheetName".into(), json!(sheet_name));
  payload.insert(key.into(), value);
  payload
}
