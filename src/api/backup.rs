use chrono::{SecondsFormat, Utc};
use futures::future::try_join3;
use tracing::error;

use super::client::Gateway;
use super::result::CallResult;
use super::transport::Transport;
use super::types::{BackupSnapshot, Payload};

impl<T: Transport> Gateway<T> {
  /// Fetch reports, users and subjects concurrently into one snapshot.
  ///
  /// All three must succeed. The first failure settles the whole backup and
  /// the returned error does not say which part failed.
  pub async fn backup_data(&self) -> CallResult<BackupSnapshot> {
    let fetched = try_join3(
      async { self.get_reports(Payload::new()).await.into_result() },
      async { self.get_users(None).await.into_result() },
      async { self.get_subjects().await.into_result() },
    )
    .await;

    match fetched {
      Ok((reports, users, subjects)) => CallResult::ok(BackupSnapshot {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        reports,
        users,
        subjects,
      }),
      Err(cause) => {
        error!("Backup data error: {}", cause);
        CallResult::fail("Could not fetch all data")
      }
    }
  }
}
