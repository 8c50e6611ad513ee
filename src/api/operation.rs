//! Remote actions exposed by the teaching-record backend.

use color_eyre::{eyre::eyre, Result};
use std::fmt;
use std::str::FromStr;

/// HTTP verb used for a gateway call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
  Get,
  #[default]
  Post,
}

impl Method {
  pub fn as_str(self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
    }
  }
}

/// A named remote action.
///
/// The set is closed: anything the backend understands has a variant here,
/// and the wire identifier is fixed per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  CreateReport,
  ReadReports,
  UpdateReport,
  DeleteReport,
  GetUsers,
  CreateUser,
  UpdateUser,
  DeleteUser,
  GetSubjects,
  CreateSubject,
  UpdateSubject,
  DeleteSubject,
  GetStatistics,
  GetAttendance,
  GetMissingReports,
  SendLineMessage,
  SendBroadcast,
  GetSheetData,
  AppendToSheet,
  ClearSheet,
  /// Connectivity check
  Test,
}

/// Every operation the backend supports
pub const OPERATIONS: &[Operation] = &[
  Operation::CreateReport,
  Operation::ReadReports,
  Operation::UpdateReport,
  Operation::DeleteReport,
  Operation::GetUsers,
  Operation::CreateUser,
  Operation::UpdateUser,
  Operation::DeleteUser,
  Operation::GetSubjects,
  Operation::CreateSubject,
  Operation::UpdateSubject,
  Operation::DeleteSubject,
  Operation::GetStatistics,
  Operation::GetAttendance,
  Operation::GetMissingReports,
  Operation::SendLineMessage,
  Operation::SendBroadcast,
  Operation::GetSheetData,
  Operation::AppendToSheet,
  Operation::ClearSheet,
  Operation::Test,
];

impl Operation {
  /// Identifier sent as the `action` query parameter
  pub fn action(self) -> &'static str {
    match self {
      Operation::CreateReport => "createReport",
      Operation::ReadReports => "readReports",
      Operation::UpdateReport => "updateReport",
      Operation::DeleteReport => "deleteReport",
      Operation::GetUsers => "getUsers",
      Operation::CreateUser => "createUser",
      Operation::UpdateUser => "updateUser",
      Operation::DeleteUser => "deleteUser",
      Operation::GetSubjects => "getSubjects",
      Operation::CreateSubject => "createSubject",
      Operation::UpdateSubject => "updateSubject",
      Operation::DeleteSubject => "deleteSubject",
      Operation::GetStatistics => "getStatistics",
      Operation::GetAttendance => "getAttendance",
      Operation::GetMissingReports => "getMissingReports",
      Operation::SendLineMessage => "sendLineMessage",
      Operation::SendBroadcast => "sendBroadcast",
      Operation::GetSheetData => "getSheetData",
      Operation::AppendToSheet => "appendToSheet",
      Operation::ClearSheet => "clearSheet",
      Operation::Test => "test",
    }
  }

  /// Verb the derived helpers use for this operation
  pub fn default_method(self) -> Method {
    match self {
      Operation::ReadReports
      | Operation::GetUsers
      | Operation::GetSubjects
      | Operation::GetStatistics
      | Operation::GetAttendance
      | Operation::GetMissingReports
      | Operation::GetSheetData
      | Operation::Test => Method::Get,
      Operation::CreateReport
      | Operation::UpdateReport
      | Operation::DeleteReport
      | Operation::CreateUser
      | Operation::UpdateUser
      | Operation::DeleteUser
      | Operation::CreateSubject
      | Operation::UpdateSubject
      | Operation::DeleteSubject
      | Operation::SendLineMessage
      | Operation::SendBroadcast
      | Operation::AppendToSheet
      | Operation::ClearSheet => Method::Post,
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Operation::CreateReport => "Record whether a class was taught",
      Operation::ReadReports => "List teaching reports",
      Operation::UpdateReport => "Edit a teaching report",
      Operation::DeleteReport => "Remove a teaching report",
      Operation::GetUsers => "List users, optionally by role",
      Operation::CreateUser => "Add a user",
      Operation::UpdateUser => "Edit a user",
      Operation::DeleteUser => "Remove a user",
      Operation::GetSubjects => "List subjects",
      Operation::CreateSubject => "Add a subject",
      Operation::UpdateSubject => "Edit a subject",
      Operation::DeleteSubject => "Remove a subject",
      Operation::GetStatistics => "Aggregate report statistics",
      Operation::GetAttendance => "Attendance by grade and date",
      Operation::GetMissingReports => "Classrooms that have not reported",
      Operation::SendLineMessage => "Push a LINE message to one user",
      Operation::SendBroadcast => "Push a LINE message to every user of a role",
      Operation::GetSheetData => "Read a raw sheet range",
      Operation::AppendToSheet => "Append rows to a sheet",
      Operation::ClearSheet => "Clear a sheet range",
      Operation::Test => "Connectivity check",
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.action())
  }
}

impl FromStr for Operation {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    if let Some(op) = OPERATIONS.iter().find(|op| op.action() == s) {
      return Ok(*op);
    }

    let suggestions: Vec<&str> = get_suggestions(s)
      .into_iter()
      .take(3)
      .map(Operation::action)
      .collect();
    if suggestions.is_empty() {
      Err(eyre!("Unknown operation '{}'", s))
    } else {
      Err(eyre!(
        "Unknown operation '{}' (did you mean: {}?)",
        s,
        suggestions.join(", ")
      ))
    }
  }
}

/// Get operations whose action resembles the given input, best match first
pub fn get_suggestions(input: &str) -> Vec<Operation> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return OPERATIONS.to_vec();
  }

  let mut matches: Vec<(Operation, u32)> = Vec::new();

  for &op in OPERATIONS {
    let action = op.action().to_lowercase();

    if action == input_lower {
      matches.push((op, 0));
      continue;
    }

    if action.starts_with(&input_lower) {
      matches.push((op, 1));
      continue;
    }

    if action.contains(&input_lower) {
      matches.push((op, 2));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(op, _)| op).collect()
}
