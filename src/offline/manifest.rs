use color_eyre::{eyre::eyre, Result};
use sha2::{Digest, Sha256};
use url::Url;

/// Application shell pre-cached by default
pub const DEFAULT_MANIFEST: &[&str] = &[
  "/",
  "/index.html",
  "/login.html",
  "/dashboard_admin.html",
  "/dashboard_teacher.html",
  "/dashboard_student.html",
  "/profile.html",
  "/subjects.html",
  "/report.html",
  "/history.html",
  "/users.html",
  "/reset-password.html",
  "/retrospective.html",
  "/js/app.js",
  "/js/auth.js",
  "/js/dashboard.js",
  "/js/api.js",
  "/assets/logo.png",
  "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
  "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
  "https://cdn.jsdelivr.net/npm/chart.js",
  "https://fonts.googleapis.com/css2?family=Sarabun:wght@300;400;500;600;700&display=swap",
  "https://fonts.googleapis.com/css2?family=Prompt:wght@300;400;500;600;700&display=swap",
];

/// Ordered set of request identities to pre-cache.
///
/// Relative entries are resolved against the app origin; duplicates after
/// resolution are dropped, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManifest {
  entries: Vec<Url>,
}

impl CacheManifest {
  pub fn resolve<S: AsRef<str>>(origin: &Url, paths: &[S]) -> Result<Self> {
    let mut entries: Vec<Url> = Vec::with_capacity(paths.len());

    for path in paths {
      let path = path.as_ref();
      let url = origin
        .join(path)
        .map_err(|e| eyre!("Invalid manifest entry '{}': {}", path, e))?;
      if !entries.contains(&url) {
        entries.push(url);
      }
    }

    Ok(Self { entries })
  }

  pub fn entries(&self) -> &[Url] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Stable fingerprint of the entry list, order included
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    for url in &self.entries {
      hasher.update(url.as_str().as_bytes());
      hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
  }
}
