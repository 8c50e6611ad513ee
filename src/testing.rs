//! Scripted in-process transport and log capture for unit tests.

use color_eyre::Result;
use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::api::transport::{HttpRequest, HttpResponse, Transport};

type Responder = dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync;

/// Records every request and answers with a closure
#[derive(Clone)]
pub struct ScriptedTransport {
  requests: Arc<Mutex<Vec<HttpRequest>>>,
  responder: Arc<Responder>,
}

impl ScriptedTransport {
  pub fn new(responder: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static) -> Self {
    Self {
      requests: Arc::new(Mutex::new(Vec::new())),
      responder: Arc::new(responder),
    }
  }

  pub fn requests(&self) -> Vec<HttpRequest> {
    self.requests.lock().unwrap().clone()
  }

  /// `action` query values of every recorded request, in order
  pub fn actions(&self) -> Vec<String> {
    self.requests().iter().filter_map(action_of).collect()
  }
}

impl Transport for ScriptedTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
    self.requests.lock().unwrap().push(request.clone());
    tokio::task::yield_now().await;
    (self.responder)(&request)
  }
}

pub fn json_response(value: Value) -> HttpResponse {
  HttpResponse {
    status: 200,
    content_type: Some("application/json".to_string()),
    body: serde_json::to_vec(&value).unwrap(),
  }
}

pub fn text_response(body: &str) -> HttpResponse {
  HttpResponse {
    status: 200,
    content_type: Some("text/plain".to_string()),
    body: body.as_bytes().to_vec(),
  }
}

pub fn status_response(status: u16) -> HttpResponse {
  HttpResponse {
    status,
    content_type: None,
    body: Vec::new(),
  }
}

pub fn action_of(request: &HttpRequest) -> Option<String> {
  request
    .url
    .query_pairs()
    .find(|(k, _)| k == "action")
    .map(|(_, v)| v.into_owned())
}

pub fn body_json(request: &HttpRequest) -> Value {
  serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap()
}

/// Collects formatted log lines for the current thread while installed
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
  pub fn install(&self) -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
      .with_writer(self.clone())
      .with_ansi(false)
      .finish();
    tracing::subscriber::set_default(subscriber)
  }

  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

impl io::Write for LogCapture {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for LogCapture {
  type Writer = LogCapture;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}
