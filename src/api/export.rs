//! Export of teaching reports to CSV or JSON.

use chrono::{NaiveDate, Utc};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use super::client::Gateway;
use super::result::CallResult;
use super::transport::Transport;
use super::types::{Payload, TeachingReport};

const CSV_HEADERS: [&str; 8] = [
  "Date", "Classroom", "Period", "Subject", "Teacher", "Status", "Reporter", "Time",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
  #[default]
  Csv,
  /// Compact JSON intended for spreadsheet import
  Excel,
  Json,
}

impl ExportFormat {
  pub fn extension(self) -> &'static str {
    match self {
      ExportFormat::Csv => "csv",
      ExportFormat::Excel => "excel",
      ExportFormat::Json => "json",
    }
  }

  pub fn mime_type(self) -> &'static str {
    match self {
      ExportFormat::Csv => "text/csv",
      ExportFormat::Excel | ExportFormat::Json => "application/json",
    }
  }
}

/// Rendered export ready to be written somewhere
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
  pub content: String,
  pub filename: String,
  pub mime_type: String,
}

impl<T: Transport> Gateway<T> {
  pub async fn export_data(&self, format: ExportFormat, filters: Payload) -> CallResult<ExportFile> {
    self
      .export_data_on(format, filters, Utc::now().date_naive())
      .await
  }

  pub async fn export_data_on(
    &self,
    format: ExportFormat,
    filters: Payload,
    today: NaiveDate,
  ) -> CallResult<ExportFile> {
    let data = match self.get_reports(filters).await.into_result() {
      Ok(data) => data,
      Err(e) => {
        error!("Export data error: {}", e);
        return CallResult::fail("Could not fetch data");
      }
    };

    let content = match render(format, data) {
      Ok(content) => content,
      Err(e) => {
        error!("Export data error: {}", e);
        return CallResult::fail(e);
      }
    };

    CallResult::ok(ExportFile {
      content,
      filename: format!(
        "teaching-report_{}.{}",
        today.format("%Y-%m-%d"),
        format.extension()
      ),
      mime_type: format.mime_type().to_string(),
    })
  }
}

fn render(format: ExportFormat, data: Value) -> Result<String, String> {
  match format {
    ExportFormat::Csv => {
      let reports: Vec<TeachingReport> =
        serde_json::from_value(data).map_err(|e| format!("Malformed response data: {}", e))?;
      Ok(render_csv(&reports))
    }
    ExportFormat::Excel => serde_json::to_string(&data).map_err(|e| e.to_string()),
    ExportFormat::Json => serde_json::to_string_pretty(&data).map_err(|e| e.to_string()),
  }
}

/// Header row plus one line per report; every field is quoted, missing fields are empty
pub fn render_csv(reports: &[TeachingReport]) -> String {
  let mut content = CSV_HEADERS.join(",");
  content.push('\n');

  for report in reports {
    let row = [
      &report.date,
      &report.classroom,
      &report.period,
      &report.subject,
      &report.teacher,
      &report.status,
      &report.reporter,
      &report.time,
    ]
    .iter()
    .map(|field| quote(field.as_deref().unwrap_or("")))
    .collect::<Vec<_>>()
    .join(",");

    content.push_str(&row);
    content.push('\n');
  }

  content
}

fn quote(field: &str) -> String {
  format!("\"{}\"", field.replace('"', "\"\""))
}
