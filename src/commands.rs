//! Command line surface.

use chrono::NaiveDate;
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::PathBuf;

use crate::api::absence::Period;
use crate::api::export::ExportFormat;
use crate::api::Payload;
use crate::session::Role;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Check that the backend answers
  Ping,
  /// List the operations the backend supports
  Operations,
  /// Invoke any operation directly
  Call {
    /// Operation identifier, e.g. getUsers
    action: String,
    /// Send as GET (the payload is not transmitted)
    #[arg(long)]
    get: bool,
    /// JSON object payload
    #[arg(long, default_value = "{}")]
    data: String,
  },
  /// Teaching reports
  #[command(subcommand)]
  Report(CrudCommand),
  /// Users
  #[command(subcommand)]
  User(UserCommand),
  /// Subjects
  #[command(subcommand)]
  Subject(CrudCommand),
  /// Aggregate statistics
  Stats {
    /// JSON object with the date range
    #[arg(long, default_value = "{}")]
    range: String,
  },
  /// Attendance by grade and date
  Attendance {
    #[arg(long)]
    grade: Option<String>,
    #[arg(long)]
    date: Option<String>,
  },
  /// Classrooms that have not reported
  Missing {
    /// Day to check (defaults to today, UTC)
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// LINE messaging
  #[command(subcommand)]
  Line(LineCommand),
  /// Remind every classroom that has not reported today
  Reminders,
  /// Snapshot reports, users and subjects
  Backup {
    /// Write the snapshot here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Export teaching reports to a file
  Export {
    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    format: ExportFormat,
    /// JSON object of report filters
    #[arg(long, default_value = "{}")]
    filters: String,
    /// Directory to write the file into
    #[arg(long, default_value = ".")]
    dir: PathBuf,
  },
  /// Absence statistics for one teacher
  Absence {
    teacher_id: String,
    #[arg(long, value_enum, default_value_t = Period::Month)]
    period: Period,
  },
  /// Raw sheet access
  #[command(subcommand)]
  Sheet(SheetCommand),
  /// Offline shell cache
  #[command(subcommand)]
  Cache(CacheCommand),
  /// Login session
  #[command(subcommand)]
  Session(SessionCommand),
}

#[derive(Subcommand, Debug)]
pub enum CrudCommand {
  List {
    /// JSON object of filters (not transmitted on GET)
    #[arg(long, default_value = "{}")]
    filters: String,
  },
  Create {
    /// JSON object describing the record
    data: String,
  },
  Update {
    id: String,
    /// JSON object of fields to change
    data: String,
  },
  Delete {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
  List {
    #[arg(long, value_enum)]
    role: Option<Role>,
  },
  Create {
    data: String,
  },
  Update {
    id: String,
    data: String,
  },
  Delete {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum LineCommand {
  /// Message one LINE user
  Send { user_id: String, message: String },
  /// Message every teacher
  Broadcast { message: String },
  /// Remind one classroom
  Remind { classroom: String, level: String },
}

#[derive(Subcommand, Debug)]
pub enum SheetCommand {
  Get {
    sheet: String,
    #[arg(long)]
    range: Option<String>,
  },
  Append {
    sheet: String,
    /// JSON rows to append
    data: String,
  },
  Clear {
    sheet: String,
    #[arg(long)]
    range: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
  /// Pre-fetch the manifest into the configured generation
  Install,
  /// Delete every generation except the configured one
  Activate,
  /// Fetch a resource through the cache
  Get {
    url: String,
    /// Write the body here
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// List stored generations
  Generations,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
  /// Start a session for a user record
  Start {
    username: String,
    #[arg(long, value_enum)]
    role: Role,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    classroom: Option<String>,
    #[arg(long)]
    line_id: Option<String>,
  },
  Show,
  End,
}

/// Parse a JSON object given on the command line
pub fn parse_payload(raw: &str) -> Result<Payload> {
  match serde_json::from_str::<Value>(raw) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(other) => Err(eyre!("Expected a JSON object, got: {}", other)),
    Err(e) => Err(eyre!("Invalid JSON '{}': {}", raw, e)),
  }
}

/// Parse any JSON value given on the command line
pub fn parse_json(raw: &str) -> Result<Value> {
  serde_json::from_str(raw).map_err(|e| eyre!("Invalid JSON '{}': {}", raw, e))
}

/// Ids that look numeric are sent as numbers, like the sheet stores them
pub fn parse_id(raw: &str) -> Value {
  match raw.parse::<i64>() {
    Ok(n) => Value::from(n),
    Err(_) => Value::from(raw),
  }
}
