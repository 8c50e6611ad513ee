//! Cache generation storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::db::Database;

/// A stored response for one request identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub request_key: String,
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

/// Trait for cache generation backends.
pub trait CacheStorage: Send + Sync {
  /// Names of every generation currently stored.
  fn generation_names(&self) -> Result<Vec<String>>;

  /// Create (or extend) a generation with the given entries in one step.
  ///
  /// Either every entry is stored or nothing is. Storing into an existing
  /// generation with a different manifest fingerprint is an error.
  fn store_generation(
    &self,
    generation: &str,
    manifest_hash: &str,
    entries: &[CachedResponse],
  ) -> Result<()>;

  /// Exact-key lookup within one generation.
  fn lookup(&self, generation: &str, request_key: &str) -> Result<Option<CachedResponse>>;

  /// Remove a generation and all of its entries. Returns whether it existed.
  fn delete_generation(&self, generation: &str) -> Result<bool>;

  /// Number of entries stored under a generation.
  fn entry_count(&self, generation: &str) -> Result<usize>;
}

/// SQLite-based generation storage.
pub struct SqliteStorage {
  db: Arc<Database>,
}

impl SqliteStorage {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

impl CacheStorage for SqliteStorage {
  fn generation_names(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT name FROM cache_generations ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache generations: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache generation: {}", e))?;

    Ok(names)
  }

  fn store_generation(
    &self,
    generation: &str,
    manifest_hash: &str,
    entries: &[CachedResponse],
  ) -> Result<()> {
    let mut conn = self.db.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let existing: Option<String> = tx
      .query_row(
        "SELECT manifest_hash FROM cache_generations WHERE name = ?",
        params![generation],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache generation: {}", e))?;

    match existing {
      Some(hash) if hash != manifest_hash => {
        return Err(eyre!(
          "Cache generation '{}' was installed from a different manifest; bump the generation name",
          generation
        ));
      }
      Some(_) => {}
      None => {
        tx.execute(
          "INSERT INTO cache_generations (name, manifest_hash, created_at)
           VALUES (?, ?, datetime('now'))",
          params![generation, manifest_hash],
        )
        .map_err(|e| eyre!("Failed to create cache generation: {}", e))?;
      }
    }

    for entry in entries {
      tx.execute(
        "INSERT OR REPLACE INTO cache_entries
           (generation, request_hash, request_key, status, content_type, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          generation,
          request_hash(&entry.request_key),
          entry.request_key,
          entry.status,
          entry.content_type,
          entry.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", entry.request_key, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn lookup(&self, generation: &str, request_key: &str) -> Result<Option<CachedResponse>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare(
        "SELECT request_key, status, content_type, body FROM cache_entries
         WHERE generation = ? AND request_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let found = stmt
      .query_row(params![generation, request_hash(request_key)], |row| {
        Ok(CachedResponse {
          request_key: row.get(0)?,
          status: row.get(1)?,
          content_type: row.get(2)?,
          body: row.get(3)?,
        })
      })
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", request_key, e))?;

    // Guard against hash collisions; keys must match exactly
    Ok(found.filter(|r| r.request_key == request_key))
  }

  fn delete_generation(&self, generation: &str) -> Result<bool> {
    let mut conn = self.db.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE generation = ?",
      params![generation],
    )
    .map_err(|e| eyre!("Failed to delete cache entries: {}", e))?;
    let removed = tx
      .execute(
        "DELETE FROM cache_generations WHERE name = ?",
        params![generation],
      )
      .map_err(|e| eyre!("Failed to delete cache generation: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn entry_count(&self, generation: &str) -> Result<usize> {
    let conn = self.db.conn()?;
    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE generation = ?",
        params![generation],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;

    Ok(count as usize)
  }
}

/// SHA256 of the request identity, for fixed-length keys
fn request_hash(request_key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(request_key.as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn storage() -> SqliteStorage {
    SqliteStorage::new(Arc::new(Database::open_in_memory().unwrap()))
  }

  fn entry(key: &str) -> CachedResponse {
    CachedResponse {
      request_key: key.to_string(),
      status: 200,
      content_type: Some("text/html".to_string()),
      body: format!("body of {}", key).into_bytes(),
    }
  }

  #[test]
  fn test_store_and_lookup() {
    let storage = storage();
    storage
      .store_generation("v1", "h", &[entry("https://a/"), entry("https://a/x.js")])
      .unwrap();

    assert_eq!(storage.entry_count("v1").unwrap(), 2);
    assert_eq!(
      storage.lookup("v1", "https://a/x.js").unwrap(),
      Some(entry("https://a/x.js"))
    );
    assert_eq!(storage.lookup("v1", "https://a/x.js?v=2").unwrap(), None);
    assert_eq!(storage.lookup("v2", "https://a/x.js").unwrap(), None);
  }

  #[test]
  fn test_empty_generation_is_still_listed() {
    let storage = storage();
    storage.store_generation("v1", "h", &[]).unwrap();
    assert_eq!(storage.generation_names().unwrap(), vec!["v1"]);
    assert_eq!(storage.entry_count("v1").unwrap(), 0);
  }

  #[test]
  fn test_manifest_change_requires_new_generation() {
    let storage = storage();
    storage.store_generation("v1", "one", &[entry("https://a/")]).unwrap();
    storage.store_generation("v1", "one", &[entry("https://a/")]).unwrap();
    assert!(storage
      .store_generation("v1", "two", &[entry("https://a/")])
      .is_err());
  }

  #[test]
  fn test_delete_generation() {
    let storage = storage();
    storage.store_generation("v1", "h", &[entry("https://a/")]).unwrap();
    storage.store_generation("v2", "h", &[entry("https://a/")]).unwrap();

    assert!(storage.delete_generation("v1").unwrap());
    assert!(!storage.delete_generation("v1").unwrap());
    assert_eq!(storage.generation_names().unwrap(), vec!["v2"]);
    assert_eq!(storage.entry_count("v1").unwrap(), 0);
    assert_eq!(storage.entry_count("v2").unwrap(), 1);
  }
}
