//! Cache-first interceptor with a versioned generation lifecycle.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::transport::{HttpRequest, HttpResponse, Transport};

use super::manifest::CacheManifest;
use super::storage::{CacheStorage, CachedResponse};

/// Lifecycle state of the cache worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Lifecycle not started yet
  Parsed,
  Installing,
  Installed,
  Activating,
  Active,
  /// Install failed; this worker never becomes active
  Redundant,
}

/// Indicates where a fetched response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
  Cache,
  Network,
}

/// Response handed back to the caller of [`OfflineCache::fetch`]
#[derive(Debug, Clone)]
pub struct FetchResult {
  pub response: HttpResponse,
  pub source: FetchSource,
}

/// Offline cache for one deployed generation.
///
/// Install populates the generation from the manifest, activate deletes every
/// other generation, and fetch serves stored responses before the network.
pub struct OfflineCache<S: CacheStorage, T: Transport> {
  generation: String,
  manifest: CacheManifest,
  storage: Arc<S>,
  transport: T,
  state: WorkerState,
}

impl<S: CacheStorage, T: Transport> OfflineCache<S, T> {
  pub fn new(generation: impl Into<String>, manifest: CacheManifest, storage: S, transport: T) -> Self {
    Self {
      generation: generation.into(),
      manifest,
      storage: Arc::new(storage),
      transport,
      state: WorkerState::Parsed,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn generation(&self) -> &str {
    &self.generation
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Fetch every manifest entry and store them under the current generation.
  ///
  /// All-or-nothing: if any fetch fails or returns a non-2xx status, nothing
  /// is written and the generation is not created.
  pub async fn install(&mut self) -> Result<usize> {
    self.state = WorkerState::Installing;
    info!(
      generation = %self.generation,
      entries = self.manifest.len(),
      "installing cache generation"
    );

    match self.populate().await {
      Ok(count) => {
        self.state = WorkerState::Installed;
        info!(generation = %self.generation, count, "cache generation installed");
        Ok(count)
      }
      Err(e) => {
        self.state = WorkerState::Redundant;
        warn!(generation = %self.generation, "cache install failed: {:#}", e);
        Err(e.wrap_err(format!("Failed to install cache generation '{}'", self.generation)))
      }
    }
  }

  async fn populate(&self) -> Result<usize> {
    let fetches = self.manifest.entries().iter().map(|url| async move {
      let response = self.transport.send(HttpRequest::get(url.clone())).await?;
      if !response.is_success() {
        return Err(eyre!("{} returned status {}", url, response.status));
      }
      Ok::<_, color_eyre::Report>(CachedResponse {
        request_key: url.to_string(),
        status: response.status,
        content_type: response.content_type,
        body: response.body,
      })
    });
    let entries = try_join_all(fetches).await?;

    self
      .storage
      .store_generation(&self.generation, &self.manifest.fingerprint(), &entries)?;

    Ok(entries.len())
  }

  /// Delete every generation other than the current one.
  ///
  /// The current generation must already be stored, so activation never
  /// leaves the cache without a live generation. Returns the names that
  /// were removed.
  pub async fn activate(&mut self) -> Result<Vec<String>> {
    if self.state == WorkerState::Redundant {
      return Err(eyre!(
        "Cannot activate cache generation '{}' after a failed install",
        self.generation
      ));
    }
    let names = self.storage.generation_names()?;
    if !names.contains(&self.generation) {
      return Err(eyre!("Cache generation '{}' is not installed", self.generation));
    }
    self.state = WorkerState::Activating;

    let mut removed = Vec::new();
    for name in names {
      if name != self.generation && self.storage.delete_generation(&name)? {
        debug!(generation = %name, "deleted stale cache generation");
        removed.push(name);
      }
    }

    self.state = WorkerState::Active;
    info!(generation = %self.generation, removed = removed.len(), "cache generation active");
    Ok(removed)
  }

  /// Serve from the current generation, falling back to the network.
  ///
  /// Misses are not written back.
  pub async fn fetch(&self, url: &Url) -> Result<FetchResult> {
    if let Some(cached) = self.storage.lookup(&self.generation, url.as_str())? {
      debug!(url = %url, "cache hit");
      return Ok(FetchResult {
        response: HttpResponse {
          status: cached.status,
          content_type: cached.content_type,
          body: cached.body,
        },
        source: FetchSource::Cache,
      });
    }

    debug!(url = %url, "cache miss");
    let response = self.transport.send(HttpRequest::get(url.clone())).await?;
    Ok(FetchResult {
      response,
      source: FetchSource::Network,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use crate::offline::storage::SqliteStorage;
  use crate::testing::{status_response, text_response, ScriptedTransport};

  fn origin() -> Url {
    Url::parse("https://school.example/").unwrap()
  }

  fn storage() -> SqliteStorage {
    SqliteStorage::new(Arc::new(Database::open_in_memory().unwrap()))
  }

  fn manifest(paths: &[&str]) -> CacheManifest {
    CacheManifest::resolve(&origin(), paths).unwrap()
  }

  /// Serves the path as the body; paths containing "broken" answer 404
  fn network() -> ScriptedTransport {
    ScriptedTransport::new(|request| {
      if request.url.path().contains("broken") {
        Ok(status_response(404))
      } else {
        Ok(text_response(request.url.as_str()))
      }
    })
  }

  #[tokio::test]
  async fn test_install_stores_every_entry() {
    let transport = network();
    let mut cache = OfflineCache::new(
      "v1",
      manifest(&["/", "/index.html", "/js/app.js"]),
      storage(),
      transport.clone(),
    );

    assert_eq!(cache.install().await.unwrap(), 3);
    assert_eq!(cache.state(), WorkerState::Installed);
    assert_eq!(cache.storage().entry_count("v1").unwrap(), 3);
    assert_eq!(transport.requests().len(), 3);

    let stored = cache
      .storage()
      .lookup("v1", "https://school.example/js/app.js")
      .unwrap()
      .unwrap();
    assert_eq!(stored.body, b"https://school.example/js/app.js");
  }

  #[tokio::test]
  async fn test_failed_fetch_creates_nothing() {
    let mut cache = OfflineCache::new(
      "v1",
      manifest(&["/", "/broken.js", "/js/app.js"]),
      storage(),
      network(),
    );

    let err = cache.install().await.unwrap_err();
    assert!(format!("{:#}", err).contains("404"));
    assert_eq!(cache.state(), WorkerState::Redundant);
    assert!(cache.storage().generation_names().unwrap().is_empty());
    assert_eq!(cache.storage().entry_count("v1").unwrap(), 0);
    assert!(cache.activate().await.is_err());
  }

  #[tokio::test]
  async fn test_transport_error_fails_install() {
    let transport = ScriptedTransport::new(|_| Err(eyre!("offline")));
    let mut cache = OfflineCache::new("v1", manifest(&["/"]), storage(), transport);
    assert!(cache.install().await.is_err());
    assert!(cache.storage().generation_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_activate_keeps_only_current_generation() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    for name in ["v1", "v2", "v3"] {
      SqliteStorage::new(db.clone())
        .store_generation(name, "h", &[])
        .unwrap();
    }

    let mut cache = OfflineCache::new("v3", manifest(&[]), SqliteStorage::new(db), network());
    let mut removed = cache.activate().await.unwrap();
    removed.sort();

    assert_eq!(removed, vec!["v1", "v2"]);
    assert_eq!(cache.storage().generation_names().unwrap(), vec!["v3"]);
    assert_eq!(cache.state(), WorkerState::Active);
  }

  #[tokio::test]
  async fn test_activate_without_install_keeps_previous_generation() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let mut previous = OfflineCache::new("v1", manifest(&["/"]), SqliteStorage::new(db.clone()), network());
    previous.install().await.unwrap();

    // Install of v2 fails in one run, activate is attempted in the next
    let mut failed = OfflineCache::new(
      "v2",
      manifest(&["/broken.js"]),
      SqliteStorage::new(db.clone()),
      network(),
    );
    assert!(failed.install().await.is_err());

    let mut fresh = OfflineCache::new("v2", manifest(&["/broken.js"]), SqliteStorage::new(db), network());
    let err = fresh.activate().await.unwrap_err();
    assert!(err.to_string().contains("not installed"));
    assert_eq!(fresh.state(), WorkerState::Parsed);
    assert_eq!(fresh.storage().generation_names().unwrap(), vec!["v1"]);
    assert_eq!(fresh.storage().entry_count("v1").unwrap(), 1);
  }

  #[tokio::test]
  async fn test_hits_never_reach_network() {
    let transport = network();
    let mut cache = OfflineCache::new("v1", manifest(&["/index.html"]), storage(), transport.clone());
    cache.install().await.unwrap();
    cache.activate().await.unwrap();
    let before = transport.requests().len();

    let url = Url::parse("https://school.example/index.html").unwrap();
    let result = cache.fetch(&url).await.unwrap();

    assert_eq!(result.source, FetchSource::Cache);
    assert_eq!(result.response.status, 200);
    assert_eq!(transport.requests().len(), before);
  }

  #[tokio::test]
  async fn test_misses_go_to_network_and_are_not_stored() {
    let transport = network();
    let mut cache = OfflineCache::new("v1", manifest(&["/index.html"]), storage(), transport.clone());
    cache.install().await.unwrap();

    let url = Url::parse("https://school.example/index.html?lang=th").unwrap();
    let result = cache.fetch(&url).await.unwrap();
    assert_eq!(result.source, FetchSource::Network);
    assert_eq!(result.response.body, url.as_str().as_bytes());

    let again = cache.fetch(&url).await.unwrap();
    assert_eq!(again.source, FetchSource::Network);
    assert_eq!(cache.storage().entry_count("v1").unwrap(), 1);
  }
}
