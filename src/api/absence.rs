//! Teacher absence statistics computed from teaching reports.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use super::client::Gateway;
use super::result::CallResult;
use super::transport::Transport;
use super::types::{Payload, TeachingReport};

/// Report statuses that count as the teacher being absent
/// ("no teacher" and "substitute teacher" as the backend records them)
pub const ABSENT_STATUSES: [&str; 2] = ["ไม่มีผู้สอน", "ผู้สอนแทน"];

/// Window of reports to consider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
  Week,
  #[default]
  Month,
  Term,
  Year,
  All,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceSummary {
  pub period: Period,
  pub total_classes: usize,
  pub absent_classes: usize,
  pub absence_percentage: f64,
  pub details: Vec<AbsenceDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbsenceDetail {
  pub date: Option<String>,
  pub classroom: Option<String>,
  pub status: Option<String>,
}

impl<T: Transport> Gateway<T> {
  pub async fn calculate_teacher_absence(
    &self,
    teacher_id: &str,
    period: Period,
  ) -> CallResult<AbsenceSummary> {
    self
      .calculate_teacher_absence_at(teacher_id, period, Utc::now())
      .await
  }

  pub async fn calculate_teacher_absence_at(
    &self,
    teacher_id: &str,
    period: Period,
    now: DateTime<Utc>,
  ) -> CallResult<AbsenceSummary> {
    let mut filters = Payload::new();
    filters.insert("teacherId".into(), json!(teacher_id));

    let reports = match self.get_reports(filters).await.decode::<Vec<TeachingReport>>() {
      CallResult::Success { data, .. } => data,
      CallResult::Failure { error } => {
        error!(teacher_id, "Calculate teacher absence error: {}", error);
        return CallResult::fail("Could not fetch report data");
      }
    };

    // The filter above is not transmitted on GET; rows that name a teacher are narrowed here
    let reports: Vec<TeachingReport> = reports
      .into_iter()
      .filter(|r| r.teacher_id.as_deref().map_or(true, |id| id == teacher_id))
      .collect();

    CallResult::ok(summarize_absence(&reports, period, now))
  }
}

pub fn summarize_absence(reports: &[TeachingReport], period: Period, now: DateTime<Utc>) -> AbsenceSummary {
  let in_period: Vec<&TeachingReport> = reports
    .iter()
    .filter(|r| in_period(r, period, now))
    .collect();

  let total_classes = in_period.len();
  let absent_classes = in_period
    .iter()
    .filter(|r| {
      r.status
        .as_deref()
        .is_some_and(|s| ABSENT_STATUSES.contains(&s))
    })
    .count();

  AbsenceSummary {
    period,
    total_classes,
    absent_classes,
    absence_percentage: percentage(absent_classes, total_classes),
    details: in_period
      .iter()
      .map(|r| AbsenceDetail {
        date: r.date.clone(),
        classroom: r.classroom.clone(),
        status: r.status.clone(),
      })
      .collect(),
  }
}

fn in_period(report: &TeachingReport, period: Period, now: DateTime<Utc>) -> bool {
  let since = |days: i64| {
    report
      .date
      .as_deref()
      .and_then(parse_report_date)
      .is_some_and(|date| date >= now - Duration::days(days))
  };

  match period {
    Period::Week => since(7),
    Period::Month => since(30),
    Period::Year => since(365),
    Period::Term => report.term.as_deref() == Some(current_semester(now).to_string().as_str()),
    Period::All => true,
  }
}

/// Report dates are either plain `YYYY-MM-DD` (midnight UTC) or RFC 3339
fn parse_report_date(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
}

/// Semester 1 runs May through October, semester 2 the rest of the year
pub fn current_semester(now: DateTime<Utc>) -> u32 {
  if (5..=10).contains(&now.month()) {
    1
  } else {
    2
  }
}

/// `part / total` as a percentage rounded to two decimals; 0 when total is 0
pub fn percentage(part: usize, total: usize) -> f64 {
  if total == 0 {
    return 0.0;
  }
  (part as f64 / total as f64 * 10_000.0).round() / 100.0
}
