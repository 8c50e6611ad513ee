//! Login session owned by a single store.
//!
//! The session is persisted as three key-value entries (current user record,
//! current role, login time) and handed to callers as an explicit value.

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::api::types::User;
use crate::db::Database;

const USER_KEY: &str = "currentUser";
const ROLE_KEY: &str = "currentRole";
const LOGIN_TIME_KEY: &str = "loginTime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Teacher,
  Student,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::Admin => "admin",
      Role::Teacher => "teacher",
      Role::Student => "student",
    }
  }

  fn parse(s: &str) -> Option<Self> {
    match s {
      "admin" => Some(Role::Admin),
      "teacher" => Some(Role::Teacher),
      "student" => Some(Role::Student),
      _ => None,
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Identity of whoever is using the client
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
  pub user: User,
  pub role: Role,
  pub login_time: DateTime<Utc>,
}

impl Session {
  pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
    now - self.login_time > max_age
  }

  pub fn display_name(&self) -> &str {
    self
      .user
      .name
      .as_deref()
      .or(self.user.username.as_deref())
      .unwrap_or("unknown")
  }
}

/// Owns the persisted session: created at login, destroyed at logout or expiry
pub struct SessionStore {
  db: Arc<Database>,
  max_age: Duration,
}

impl SessionStore {
  pub fn new(db: Arc<Database>, max_age_hours: i64) -> Self {
    Self {
      db,
      max_age: Duration::hours(max_age_hours),
    }
  }

  /// Start a session, replacing any previous one
  pub fn begin(&self, user: User, role: Role) -> Result<Session> {
    self.begin_at(user, role, Utc::now())
  }

  fn begin_at(&self, user: User, role: Role, now: DateTime<Utc>) -> Result<Session> {
    let session = Session {
      user,
      role,
      login_time: now,
    };

    let user_json =
      serde_json::to_string(&session.user).map_err(|e| eyre!("Failed to serialize user: {}", e))?;

    let mut conn = self.db.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for (key, value) in [
      (USER_KEY, user_json),
      (ROLE_KEY, role.as_str().to_string()),
      (LOGIN_TIME_KEY, now.to_rfc3339()),
    ] {
      tx.execute(
        "INSERT OR REPLACE INTO session (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store session: {}", e))?;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    info!(role = %role, user = session.display_name(), "session started");
    Ok(session)
  }

  /// Current session, if any. An expired session is destroyed and reads as none.
  pub fn current(&self) -> Result<Option<Session>> {
    self.current_at(Utc::now())
  }

  fn current_at(&self, now: DateTime<Utc>) -> Result<Option<Session>> {
    let Some(session) = self.read()? else {
      return Ok(None);
    };

    if session.is_expired(now, self.max_age) {
      info!(user = session.display_name(), "session expired");
      self.end()?;
      return Ok(None);
    }

    Ok(Some(session))
  }

  /// Current session with the given role, or an error explaining why not
  pub fn require(&self, role: Role) -> Result<Session> {
    match self.current()? {
      Some(session) if session.role == role => Ok(session),
      Some(session) => Err(eyre!(
        "This command needs the {} role; current session is {}",
        role,
        session.role
      )),
      None => Err(eyre!("No active session. Run `trec session start` first.")),
    }
  }

  /// Destroy the session
  pub fn end(&self) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute(
        "DELETE FROM session WHERE key IN (?, ?, ?)",
        params![USER_KEY, ROLE_KEY, LOGIN_TIME_KEY],
      )
      .map_err(|e| eyre!("Failed to clear session: {}", e))?;
    Ok(())
  }

  /// Read the three entries; a partial or unreadable session counts as absent
  fn read(&self) -> Result<Option<Session>> {
    let user = self.get(USER_KEY)?;
    let role = self.get(ROLE_KEY)?;
    let login_time = self.get(LOGIN_TIME_KEY)?;

    let (Some(user), Some(role), Some(login_time)) = (user, role, login_time) else {
      return Ok(None);
    };

    let user: Option<User> = serde_json::from_str(&user).ok();
    let role = Role::parse(&role);
    let login_time = DateTime::parse_from_rfc3339(&login_time)
      .ok()
      .map(|t| t.with_timezone(&Utc));

    Ok(match (user, role, login_time) {
      (Some(user), Some(role), Some(login_time)) => Some(Session {
        user,
        role,
        login_time,
      }),
      _ => None,
    })
  }

  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.db.conn()?;
    conn
      .query_row(
        "SELECT value FROM session WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read session: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn store() -> SessionStore {
    SessionStore::new(Arc::new(Database::open_in_memory().unwrap()), 8)
  }

  fn admin() -> User {
    User {
      username: Some("admin".to_string()),
      name: Some("School Admin".to_string()),
      role: Some("admin".to_string()),
      ..Default::default()
    }
  }

  fn login_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
  }

  #[test]
  fn test_begin_then_read_back() {
    let store = store();
    let started = store.begin_at(admin(), Role::Admin, login_time()).unwrap();

    let current = store
      .current_at(login_time() + Duration::hours(1))
      .unwrap()
      .unwrap();
    assert_eq!(current, started);
    assert_eq!(current.display_name(), "School Admin");
  }

  #[test]
  fn test_expired_session_is_destroyed() {
    let store = store();
    store.begin_at(admin(), Role::Admin, login_time()).unwrap();

    let later = login_time() + Duration::hours(8) + Duration::minutes(1);
    assert!(store.current_at(later).unwrap().is_none());
    // Gone for good, even when checked at the original time
    assert!(store.current_at(login_time()).unwrap().is_none());
  }

  #[test]
  fn test_end_clears_all_entries() {
    let store = store();
    store.begin(admin(), Role::Teacher).unwrap();
    store.end().unwrap();
    assert!(store.current().unwrap().is_none());
    assert!(store.get(USER_KEY).unwrap().is_none());
    assert!(store.get(LOGIN_TIME_KEY).unwrap().is_none());
  }

  #[test]
  fn test_require_checks_role() {
    let store = store();
    assert!(store.require(Role::Admin).is_err());

    store.begin(admin(), Role::Teacher).unwrap();
    let err = store.require(Role::Admin).unwrap_err();
    assert!(err.to_string().contains("admin"));

    store.begin(admin(), Role::Admin).unwrap();
    assert_eq!(store.require(Role::Admin).unwrap().role, Role::Admin);
  }

  #[test]
  fn test_corrupt_entry_reads_as_no_session() {
    let store = store();
    store.begin(admin(), Role::Admin).unwrap();
    store
      .db
      .conn()
      .unwrap()
      .execute(
        "UPDATE session SET value = 'root' WHERE key = ?",
        params![ROLE_KEY],
      )
      .unwrap();
    assert!(store.current().unwrap().is_none());
  }
}
