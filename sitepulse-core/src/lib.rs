//! # sitepulse-core
//!
//! Core library for sitepulse - client-side page view and event tracking.
//!
//! This library provides:
//! - A headless browser substrate (location, history, document, storage)
//! - Tracking sessions with page view, SPA navigation and click tracking
//! - Persistent client identifiers with an ephemeral fallback
//! - Fire-and-forget delivery over HTTP
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Every tracked action flows through the same pipeline:
//! - **Session:** a [`Tracker`] bound to a [`Window`] and a [`Transport`]
//! - **Envelope:** built fresh from the window at send time, carrying the
//!   resolved client identifier
//! - **Delivery:** handed to the transport without waiting; failures end in
//!   a debug-gated warning, never an error
//!
//! Sessions can be owned directly ([`Tracker::start`]) or kept in the
//! single-instance [`registry`], which the standalone [`bootstrap`] uses.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use sitepulse_core::{Environment, RecordingTransport, Tracker, TrackerConfig, Window};
//!
//! let window = Window::builder("https://example.com/").build().expect("valid url");
//! let transport = RecordingTransport::new();
//! let config = TrackerConfig::new("my-site", "https://collect.example.com/api/event");
//!
//! let tracker = Tracker::start(config, Some(Environment::new(window, Rc::new(transport))));
//! tracker.track_event("signup");
//! tracker.destroy();
//! ```

// Re-export commonly used items at the crate root
pub use browser::{KeyValueStore, Window};
pub use config::{Config, NavigationStrategy, TrackerConfig};
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use envelope::{Envelope, EventType};
pub use error::{Error, Result};
pub use outcome::{DeliveryReport, Misuse, Suppression, TrackOutcome};
pub use session::{Environment, Tracker};
pub use transport::{HttpTransport, RecordingTransport, Transport};

// Public modules
pub mod bootstrap;
pub mod browser;
pub mod clicks;
pub mod client_id;
pub mod config;
pub mod delivery;
pub mod diagnostics;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod navigation;
pub mod outcome;
pub mod registry;
pub mod session;
pub mod transport;
