//! Fire-and-forget transports
//!
//! A [`Transport`] takes a [`BeaconRequest`] and a completion callback and
//! returns immediately. The completion runs once the request settles, and
//! nothing waits on it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::envelope::Envelope;
use crate::error::{Error, Result};

/// Content type of every beacon body
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Callback run once a dispatched request settles
pub type Completion = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// One outgoing POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconRequest {
    pub endpoint: String,
    pub method: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// The request may outlive the page or session that issued it
    pub keepalive: bool,
}

impl BeaconRequest {
    /// JSON POST with keepalive
    pub fn json(endpoint: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: "POST",
            content_type: JSON_CONTENT_TYPE,
            body,
            keepalive: true,
        }
    }
}

/// Sends beacon requests without blocking the caller
pub trait Transport {
    fn dispatch(&self, request: BeaconRequest, on_complete: Completion);
}

/// Counters kept by [`HttpTransport`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    pub dispatched: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Tracking {
    dispatched: AtomicUsize,
    delivered: AtomicUsize,
    failed: AtomicUsize,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Tracking {
    fn begin(&self) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self, delivered: bool) {
        if delivered {
            self.delivered.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// HTTP transport backed by `reqwest`
///
/// Each request runs as a detached task on the given tokio runtime, so it
/// keeps going after the tracker that issued it is destroyed.
pub struct HttpTransport {
    http_client: reqwest::Client,
    runtime: Handle,
    tracking: Arc<Tracking>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("stats", &self.stats())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport with no request timeout
    pub fn new(runtime: Handle) -> Result<Self> {
        Self::build(runtime, None)
    }

    /// Create a transport whose requests give up after `timeout`
    pub fn with_timeout(runtime: Handle, timeout: Duration) -> Result<Self> {
        Self::build(runtime, Some(timeout))
    }

    fn build(runtime: Handle, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            runtime,
            tracking: Arc::new(Tracking::default()),
        })
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            dispatched: self.tracking.dispatched.load(Ordering::SeqCst),
            delivered: self.tracking.delivered.load(Ordering::SeqCst),
            failed: self.tracking.failed.load(Ordering::SeqCst),
        }
    }

    /// Requests dispatched but not yet settled
    pub fn in_flight(&self) -> usize {
        self.tracking.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no request is in flight
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.tracking.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }
}

impl Transport for HttpTransport {
    fn dispatch(&self, request: BeaconRequest, on_complete: Completion) {
        self.tracking.begin();
        let http_client = self.http_client.clone();
        let tracking = self.tracking.clone();

        self.runtime.spawn(async move {
            let result = post(&http_client, request).await;
            let delivered = result.is_ok();
            on_complete(result);
            tracking.finish(delivered);
        });
    }
}

async fn post(http_client: &reqwest::Client, request: BeaconRequest) -> Result<()> {
    let response = http_client
        .post(&request.endpoint)
        .header(CONTENT_TYPE, request.content_type)
        .body(request.body)
        .send()
        .await
        .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    Err(Error::Transport(format!(
        "collector error ({}): {}",
        status, error_text
    )))
}

/// How [`RecordingTransport`] settles requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingMode {
    /// Complete successfully right away
    Succeed,
    /// Complete with a transport error right away
    Fail(String),
    /// Keep completions until `complete_held` or `fail_held`
    Hold,
}

#[derive(Default)]
struct Recording {
    requests: Vec<BeaconRequest>,
    mode: Option<RecordingMode>,
    held: Vec<Completion>,
}

/// In-memory transport that records every request
///
/// Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Rc<RefCell<Recording>>,
}

impl fmt::Debug for RecordingTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("RecordingTransport")
            .field("requests", &inner.requests.len())
            .field("mode", &inner.mode)
            .field("held", &inner.held.len())
            .finish()
    }
}

impl RecordingTransport {
    /// Transport that records and succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that records and fails every request with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        let transport = Self::default();
        transport.set_mode(RecordingMode::Fail(message.into()));
        transport
    }

    /// Transport that records and leaves requests pending
    pub fn holding() -> Self {
        let transport = Self::default();
        transport.set_mode(RecordingMode::Hold);
        transport
    }

    pub fn set_mode(&self, mode: RecordingMode) {
        self.inner.borrow_mut().mode = Some(mode);
    }

    pub fn requests(&self) -> Vec<BeaconRequest> {
        self.inner.borrow().requests.clone()
    }

    /// Decoded bodies of every recorded request
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.inner
            .borrow()
            .requests
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().requests.is_empty()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().requests.clear();
    }

    /// Number of requests waiting to settle
    pub fn pending(&self) -> usize {
        self.inner.borrow().held.len()
    }

    /// Settle every held request successfully; returns how many settled
    pub fn complete_held(&self) -> usize {
        self.settle_held(|| Ok(()))
    }

    /// Settle every held request with a transport error
    pub fn fail_held(&self, message: &str) -> usize {
        self.settle_held(|| Err(Error::Transport(message.to_string())))
    }

    fn settle_held(&self, result: impl Fn() -> Result<()>) -> usize {
        let held = std::mem::take(&mut self.inner.borrow_mut().held);
        let count = held.len();
        for on_complete in held {
            on_complete(result());
        }
        count
    }
}

impl Transport for RecordingTransport {
    fn dispatch(&self, request: BeaconRequest, on_complete: Completion) {
        let mode = {
            let mut inner = self.inner.borrow_mut();
            inner.requests.push(request);
            inner.mode.clone().unwrap_or(RecordingMode::Succeed)
        };

        match mode {
            RecordingMode::Succeed => on_complete(Ok(())),
            RecordingMode::Fail(message) => on_complete(Err(Error::Transport(message))),
            RecordingMode::Hold => self.inner.borrow_mut().held.push(on_complete),
        }
    }
}
