use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::operation::OPERATIONS;
use crate::api::transport::HttpTransport;
use crate::api::types::User;
use crate::api::{CallResult, Gateway, Method, Operation};
use crate::commands::{
  parse_id, parse_json, parse_payload, CacheCommand, Command, CrudCommand, LineCommand,
  SessionCommand, SheetCommand, UserCommand,
};
use crate::config::Config;
use crate::db::Database;
use crate::offline::{CacheManifest, FetchSource, OfflineCache, SqliteStorage};
use crate::session::{Role, SessionStore};

/// Main application state
pub struct App {
  config: Config,
  gateway: Gateway,
  db: Arc<Database>,
  sessions: SessionStore,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let gateway = Gateway::new(&config)?;
    let db = Arc::new(Database::open()?);
    let sessions = SessionStore::new(db.clone(), config.session.max_age_hours);

    Ok(Self {
      config,
      gateway,
      db,
      sessions,
    })
  }

  /// Run one command; returns whether it succeeded
  pub async fn run(&self, command: Command) -> Result<bool> {
    info!(?command, "running command");

    match command {
      Command::Ping => Ok(print_result(&self.gateway.ping().await)),
      Command::Operations => {
        for &op in OPERATIONS {
          println!(
            "{:<20} {:<5} {}",
            op.action(),
            op.default_method().as_str(),
            op.description()
          );
        }
        Ok(true)
      }
      Command::Call { action, get, data } => {
        let op: Operation = action.parse()?;
        let method = if get { Method::Get } else { Method::Post };
        let payload = parse_payload(&data)?;
        Ok(print_result(&self.gateway.call(op, &payload, method).await))
      }
      Command::Report(cmd) => self.run_reports(cmd).await,
      Command::User(cmd) => self.run_users(cmd).await,
      Command::Subject(cmd) => self.run_subjects(cmd).await,
      Command::Stats { range } => {
        let range = parse_payload(&range)?;
        Ok(print_result(&self.gateway.get_statistics(range).await))
      }
      Command::Attendance { grade, date } => Ok(print_result(
        &self
          .gateway
          .get_attendance(grade.as_deref(), date.as_deref())
          .await,
      )),
      Command::Missing { date } => Ok(print_result(&self.gateway.get_missing_reports(date).await)),
      Command::Line(cmd) => self.run_line(cmd).await,
      Command::Reminders => {
        self.sessions.require(Role::Admin)?;
        Ok(print_result(&self.gateway.send_daily_reminders().await))
      }
      Command::Backup { output } => {
        self.sessions.require(Role::Admin)?;
        let result = self.gateway.backup_data().await;
        match (&result, output) {
          (CallResult::Success { data, .. }, Some(path)) => {
            write_json(&path, data)?;
            println!("Backup written to {}", path.display());
            Ok(true)
          }
          _ => Ok(print_result(&result)),
        }
      }
      Command::Export {
        format,
        filters,
        dir,
      } => {
        self.sessions.require(Role::Admin)?;
        let filters = parse_payload(&filters)?;
        match self.gateway.export_data(format, filters).await {
          CallResult::Success { data, .. } => {
            let path = dir.join(&data.filename);
            std::fs::write(&path, data.content)
              .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
            println!("Exported {} to {}", data.mime_type, path.display());
            Ok(true)
          }
          failure => Ok(print_result(&failure)),
        }
      }
      Command::Absence { teacher_id, period } => Ok(print_result(
        &self
          .gateway
          .calculate_teacher_absence(&teacher_id, period)
          .await,
      )),
      Command::Sheet(cmd) => self.run_sheet(cmd).await,
      Command::Cache(cmd) => self.run_cache(cmd).await,
      Command::Session(cmd) => self.run_session(cmd),
    }
  }

  async fn run_reports(&self, cmd: CrudCommand) -> Result<bool> {
    let result = match cmd {
      CrudCommand::List { filters } => self.gateway.get_reports(parse_payload(&filters)?).await,
      CrudCommand::Create { data } => self.gateway.create_report(parse_payload(&data)?).await,
      CrudCommand::Update { id, data } => {
        self
          .gateway
          .update_report(parse_id(&id), parse_payload(&data)?)
          .await
      }
      CrudCommand::Delete { id } => self.gateway.delete_report(parse_id(&id)).await,
    };
    Ok(print_result(&result))
  }

  async fn run_users(&self, cmd: UserCommand) -> Result<bool> {
    let result = match cmd {
      UserCommand::List { role } => self.gateway.get_users(role.map(Role::as_str)).await,
      UserCommand::Create { data } => {
        self.sessions.require(Role::Admin)?;
        self.gateway.create_user(parse_payload(&data)?).await
      }
      UserCommand::Update { id, data } => {
        self.sessions.require(Role::Admin)?;
        self
          .gateway
          .update_user(parse_id(&id), parse_payload(&data)?)
          .await
      }
      UserCommand::Delete { id } => {
        self.sessions.require(Role::Admin)?;
        self.gateway.delete_user(parse_id(&id)).await
      }
    };
    Ok(print_result(&result))
  }

  async fn run_subjects(&self, cmd: CrudCommand) -> Result<bool> {
    let result = match cmd {
      // Subjects take no filters
      CrudCommand::List { .. } => self.gateway.get_subjects().await,
      CrudCommand::Create { data } => self.gateway.create_subject(parse_payload(&data)?).await,
      CrudCommand::Update { id, data } => {
        self
          .gateway
          .update_subject(parse_id(&id), parse_payload(&data)?)
          .await
      }
      CrudCommand::Delete { id } => self.gateway.delete_subject(parse_id(&id)).await,
    };
    Ok(print_result(&result))
  }

  async fn run_line(&self, cmd: LineCommand) -> Result<bool> {
    let result = match cmd {
      LineCommand::Send { user_id, message } => {
        self.gateway.send_line_message(&user_id, &message).await
      }
      LineCommand::Broadcast { message } => {
        self.sessions.require(Role::Admin)?;
        self.gateway.send_broadcast_to_teachers(&message).await
      }
      LineCommand::Remind { classroom, level } => {
        self.gateway.send_classroom_reminder(&classroom, &level).await
      }
    };
    Ok(print_result(&result))
  }

  async fn run_sheet(&self, cmd: SheetCommand) -> Result<bool> {
    let result = match cmd {
      SheetCommand::Get { sheet, range } => {
        self.gateway.get_sheet_data(&sheet, range.as_deref()).await
      }
      SheetCommand::Append { sheet, data } => {
        self.gateway.append_to_sheet(&sheet, parse_json(&data)?).await
      }
      SheetCommand::Clear { sheet, range } => {
        self.gateway.clear_sheet(&sheet, range.as_deref()).await
      }
    };
    Ok(print_result(&result))
  }

  fn offline_cache(&self) -> Result<OfflineCache<SqliteStorage, HttpTransport>> {
    let origin = self.config.offline_origin()?;
    let manifest = CacheManifest::resolve(&origin, self.config.offline.manifest.as_slice())?;
    if manifest.is_empty() {
      warn!(generation = %self.config.offline.generation, "offline manifest is empty");
    }
    Ok(OfflineCache::new(
      self.config.offline.generation.clone(),
      manifest,
      SqliteStorage::new(self.db.clone()),
      HttpTransport::new()?,
    ))
  }

  async fn run_cache(&self, cmd: CacheCommand) -> Result<bool> {
    let mut cache = self.offline_cache()?;

    match cmd {
      CacheCommand::Install => {
        let count = cache.install().await?;
        println!("Installed {} entries into {}", count, cache.generation());
      }
      CacheCommand::Activate => {
        let removed = cache.activate().await?;
        if removed.is_empty() {
          println!("{} is active; nothing to remove", cache.generation());
        } else {
          println!(
            "{} is active; removed {}",
            cache.generation(),
            removed.join(", ")
          );
        }
      }
      CacheCommand::Get { url, output } => {
        let origin = self.config.offline_origin()?;
        let url = origin
          .join(&url)
          .map_err(|e| eyre!("Invalid URL '{}': {}", url, e))?;
        let result = cache.fetch(&url).await?;
        let source = match result.source {
          FetchSource::Cache => "cache",
          FetchSource::Network => "network",
        };
        println!(
          "{} {} ({} bytes from {})",
          result.response.status,
          url,
          result.response.body.len(),
          source
        );
        if let Some(path) = output {
          std::fs::write(&path, &result.response.body)
            .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
        }
      }
      CacheCommand::Generations => {
        use crate::offline::CacheStorage;

        for name in cache.storage().generation_names()? {
          let marker = if name == cache.generation() { "*" } else { " " };
          let count = cache.storage().entry_count(&name)?;
          println!("{} {} ({} entries)", marker, name, count);
        }
      }
    }

    debug!(state = ?cache.state(), "offline cache command finished");
    Ok(true)
  }

  fn run_session(&self, cmd: SessionCommand) -> Result<bool> {
    match cmd {
      SessionCommand::Start {
        username,
        role,
        name,
        classroom,
        line_id,
      } => {
        let user = User {
          username: Some(username),
          name,
          role: Some(role.as_str().to_string()),
          classroom,
          line_id,
        };
        let session = self.sessions.begin(user, role)?;
        println!("Signed in as {} ({})", session.display_name(), session.role);
      }
      SessionCommand::Show => match self.sessions.current()? {
        Some(session) => println!(
          "{} ({}) since {}",
          session.display_name(),
          session.role,
          session.login_time.to_rfc3339()
        ),
        None => println!("No active session"),
      },
      SessionCommand::End => {
        self.sessions.end()?;
        println!("Signed out");
      }
    }
    Ok(true)
  }
}

/// Print the envelope as JSON; returns the success tag
fn print_result<T: Serialize>(result: &CallResult<T>) -> bool {
  match serde_json::to_string_pretty(result) {
    Ok(json) => println!("{}", json),
    Err(e) => eprintln!("Failed to render result: {}", e),
  }
  result.is_success()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
  let json =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to serialize output: {}", e))?;
  std::fs::write(path, json).map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))
}
