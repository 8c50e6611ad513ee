//! HTTP transport seam shared by the gateway and the offline cache.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use url::Url;

use super::operation::Method;

/// A single outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
  pub method: Method,
  pub url: Url,
  /// JSON body; always `None` for GET
  pub body: Option<Vec<u8>>,
}

impl HttpRequest {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::Get,
      url,
      body: None,
    }
  }
}

/// A fully buffered response
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Something that can perform one HTTP round-trip.
///
/// `Err` means the round-trip itself failed (DNS, connect, TLS, reading
/// the body). Any status code, including 4xx/5xx, is an `Ok` response.
pub trait Transport: Send + Sync {
  fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// Transport backed by a shared reqwest client
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("trec/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
    let url = request.url.to_string();

    let mut builder = match request.method {
      Method::Get => self.client.get(request.url),
      Method::Post => self.client.post(request.url),
    };
    if let Some(body) = request.body {
      builder = builder.header(CONTENT_TYPE, "application/json").body(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", url, e))?
      .to_vec();

    Ok(HttpResponse {
      status,
      content_type,
      body,
    })
  }
}
