//! Classroom reminders over LINE.

use futures::future::join_all;
use tracing::{error, info, warn};

use super::client::Gateway;
use super::result::CallResult;
use super::transport::Transport;
use super::types::{MissingReport, ReminderOutcome, ReminderReport, User};

impl<T: Transport> Gateway<T> {
  /// Remind one classroom that it has not reported today
  pub async fn send_classroom_reminder(&self, classroom: &str, level: &str) -> CallResult {
    let users = match self.get_users(None).await.decode::<Vec<User>>() {
      CallResult::Success { data, .. } => data,
      CallResult::Failure { error } => return CallResult::fail(error),
    };

    self.remind_classroom(&users, classroom, level).await
  }

  /// Remind every classroom that is missing today's report.
  ///
  /// Reminders go out concurrently and the whole fan-out is awaited; the
  /// result counts how many sends succeeded. A failure while fetching the
  /// missing classrooms or the user list fails the whole operation.
  pub async fn send_daily_reminders(&self) -> CallResult<ReminderReport> {
    let missing = match self.get_missing_reports(None).await.decode::<Vec<MissingReport>>() {
      CallResult::Success { data, .. } => data,
      CallResult::Failure { error } => {
        error!("Send daily reminders error: {}", error);
        return CallResult::fail(error);
      }
    };

    if missing.is_empty() {
      return CallResult::ok_with_message(ReminderReport::default(), "No classrooms need a reminder");
    }

    let users = match self.get_users(None).await.decode::<Vec<User>>() {
      CallResult::Success { data, .. } => data,
      CallResult::Failure { error } => {
        error!("Send daily reminders error: {}", error);
        return CallResult::fail(error);
      }
    };

    let sends = missing.iter().map(|entry| {
      let classroom = entry.classroom.clone().unwrap_or_default();
      let level = entry.level.clone().unwrap_or_default();
      let users = &users;
      async move {
        let result = self.remind_classroom(users, &classroom, &level).await;
        ReminderOutcome {
          classroom,
          level,
          result,
        }
      }
    });
    let results = join_all(sends).await;

    let sent = results.iter().filter(|r| r.result.is_success()).count();
    let total = results.len();
    info!(sent, total, "daily reminders dispatched");

    CallResult::ok_with_message(
      ReminderReport {
        sent,
        total,
        results,
      },
      format!("Sent reminders to {} classrooms", sent),
    )
  }

  async fn remind_classroom(&self, users: &[User], classroom: &str, level: &str) -> CallResult {
    let Some(line_id) = find_recipient(users, classroom) else {
      warn!(classroom, "no reminder recipient");
      return CallResult::fail(format!("No user or LINE ID found for classroom {}", classroom));
    };

    let message = render_reminder(&self.reminder_template, classroom, level);
    self.send_line_message(line_id, &message).await
  }
}

/// LINE id of the first student registered to `classroom`
fn find_recipient<'a>(users: &'a [User], classroom: &str) -> Option<&'a str> {
  users
    .iter()
    .find(|u| u.classroom.as_deref() == Some(classroom) && u.role.as_deref() == Some("student"))
    .and_then(|u| u.line_id.as_deref())
    .filter(|id| !id.is_empty())
}

fn render_reminder(template: &str, classroom: &str, level: &str) -> String {
  template
    .replace("{classroom}", classroom)
    .replace("{level}", level)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{action_of, body_json, json_response, status_response, ScriptedTransport};
  use serde_json::{json, Value};
  use url::Url;

  fn gateway(transport: ScriptedTransport) -> Gateway<ScriptedTransport> {
    let endpoint = Url::parse("https://api.example.com/exec").unwrap();
    Gateway::with_transport(endpoint, transport).with_reminder_template("{classroom}|{level}")
  }

  fn users() -> Value {
    json!([
      {"role": "teacher", "classroom": "M.1/1", "lineId": "T-1"},
      {"role": "student", "classroom": "M.1/1", "lineId": "S-11"},
      {"role": "student", "classroom": "M.1/2", "lineId": "S-12"},
      {"role": "student", "classroom": "M.2/1", "lineId": "S-21"},
      {"role": "student", "classroom": "M.3/1"}
    ])
  }

  /// Backend stub: fixed missing list and users; LINE sends to `failing` ids fail
  fn backend(missing: Value, failing: &'static [&'static str]) -> ScriptedTransport {
    ScriptedTransport::new(move |request| {
      let response = match action_of(request).as_deref() {
        Some("getMissingReports") => json!({"success": true, "data": missing}),
        Some("getUsers") => json!({"success": true, "data": users()}),
        Some("sendLineMessage") => {
          let body = body_json(request);
          let user_id = body["userId"].as_str().unwrap_or_default().to_string();
          if failing.contains(&user_id.as_str()) {
            json!({"success": false, "error": "quota exceeded"})
          } else {
            json!({"success": true, "data": {"to": user_id}})
          }
        }
        _ => json!({"success": false, "error": "unexpected"}),
      };
      Ok(json_response(response))
    })
  }

  #[tokio::test]
  async fn test_one_message_per_missing_classroom() {
    let missing = json!([
      {"classroom": "M.1/1", "level": "M.1"},
      {"classroom": "M.1/2", "level": "M.1"},
      {"classroom": "M.2/1", "level": "M.2"}
    ]);
    let transport = backend(missing, &[]);
    let result = gateway(transport.clone()).send_daily_reminders().await;

    let report = result.data().expect("should succeed");
    assert_eq!(report.total, 3);
    assert_eq!(report.sent, 3);

    let sends: Vec<_> = transport
      .requests()
      .into_iter()
      .filter(|r| action_of(r).as_deref() == Some("sendLineMessage"))
      .collect();
    assert_eq!(sends.len(), 3);

    let mut recipients: Vec<String> = sends
      .iter()
      .map(|r| body_json(r)["userId"].as_str().unwrap().to_string())
      .collect();
    recipients.sort();
    assert_eq!(recipients, vec!["S-11", "S-12", "S-21"]);
  }

  #[tokio::test]
  async fn test_success_count_matches_individual_results() {
    let missing = json!([
      {"classroom": "M.1/1", "level": "M.1"},
      {"classroom": "M.1/2", "level": "M.1"},
      {"classroom": "M.2/1", "level": "M.2"}
    ]);
    let transport = backend(missing, &["S-12"]);
    let result = gateway(transport).send_daily_reminders().await;

    assert!(result.is_success());
    let report = result.data().unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.sent, 2);
    let failed: Vec<_> = report
      .results
      .iter()
      .filter(|r| !r.result.is_success())
      .map(|r| r.classroom.as_str())
      .collect();
    assert_eq!(failed, vec!["M.1/2"]);
    assert_eq!(result.message(), Some("Sent reminders to 2 classrooms"));
  }

  #[tokio::test]
  async fn test_classroom_without_line_id_fails_without_sending() {
    let missing = json!([{"classroom": "M.3/1", "level": "M.3"}]);
    let transport = backend(missing, &[]);
    let result = gateway(transport.clone()).send_daily_reminders().await;

    let report = result.data().unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.total, 1);
    assert!(!transport.actions().contains(&"sendLineMessage".to_string()));
  }

  #[tokio::test]
  async fn test_nothing_missing_skips_user_lookup() {
    let transport = backend(json!([]), &[]);
    let result = gateway(transport.clone()).send_daily_reminders().await;

    assert_eq!(result.message(), Some("No classrooms need a reminder"));
    assert_eq!(transport.actions(), vec!["getMissingReports"]);
  }

  #[tokio::test]
  async fn test_fetch_failure_short_circuits() {
    let transport = ScriptedTransport::new(|_| Ok(status_response(500)));
    let result = gateway(transport.clone()).send_daily_reminders().await;

    assert!(!result.is_success());
    assert_eq!(transport.actions(), vec!["getMissingReports"]);
  }

  #[tokio::test]
  async fn test_missing_list_of_wrong_shape_fails() {
    let transport = backend(json!({"classroom": "M.1/1"}), &[]);
    let result = gateway(transport).send_daily_reminders().await;
    assert!(result.error().unwrap().starts_with("Malformed response data"));
  }

  #[tokio::test]
  async fn test_single_classroom_reminder_uses_template() {
    let transport = backend(json!([]), &[]);
    let result = gateway(transport.clone())
      .send_classroom_reminder("M.2/1", "M.2")
      .await;

    assert!(result.is_success());
    let send = transport
      .requests()
      .into_iter()
      .find(|r| action_of(r).as_deref() == Some("sendLineMessage"))
      .unwrap();
    assert_eq!(
      body_json(&send),
      json!({"userId": "S-21", "message": "M.2/1|M.2"})
    );
  }

  #[test]
  fn test_teacher_is_never_the_recipient() {
    let users: Vec<User> = serde_json::from_value(json!([
      {"role": "teacher", "classroom": "M.4/1", "lineId": "T-9"},
      {"role": "student", "classroom": "M.4/1", "lineId": ""}
    ]))
    .unwrap();
    assert_eq!(find_recipient(&users, "M.4/1"), None);
  }
}
