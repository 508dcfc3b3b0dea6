//! Warning policy for the tracking surface
//!
//! Nothing on the tracking surface returns an error. Every failure path ends
//! in a warning, and whether that warning is emitted depends on its class:
//!
//! - configuration defects and misuse without a session always warn
//! - empty endpoints, transport failures and other operational noise only
//!   warn when the session's `debug` flag is set
//!
//! [`Diagnostics`] applies that policy in one place. Each emitted warning goes
//! to `tracing` and is also recorded, so callers and tests can inspect what
//! was reported.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Warnings a [`Diagnostics`] keeps before dropping the oldest
pub const DEFAULT_CAPACITY: usize = 256;

/// Category of a reported warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    MissingSiteId,
    MissingEndpoint,
    NoBrowserContext,
    NoActiveSession,
    EmptyEventName,
    EmptyEndpoint,
    TransportFailed,
    MissingBootstrapSiteId,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::MissingSiteId => "missing_site_id",
            WarningKind::MissingEndpoint => "missing_endpoint",
            WarningKind::NoBrowserContext => "no_browser_context",
            WarningKind::NoActiveSession => "no_active_session",
            WarningKind::EmptyEventName => "empty_event_name",
            WarningKind::EmptyEndpoint => "empty_endpoint",
            WarningKind::TransportFailed => "transport_failed",
            WarningKind::MissingBootstrapSiteId => "missing_bootstrap_site_id",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A warning that was emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug)]
struct Record {
    warnings: VecDeque<Warning>,
    capacity: usize,
    dropped: usize,
}

/// Shared warning sink
///
/// Cheap to clone; clones share the same record. Safe to move into transport
/// completions that run on other threads. The record is a ring of at most
/// `capacity` warnings; every warning still reaches `tracing`.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    record: Arc<Mutex<Record>>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink keeping the most recent `capacity` warnings
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            record: Arc::new(Mutex::new(Record {
                warnings: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                capacity,
                dropped: 0,
            })),
        }
    }

    /// Emit a warning regardless of the debug flag
    pub fn warn(&self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(kind = %kind, "[sitepulse] {}", message);

        let mut record = self.lock();
        if record.capacity == 0 {
            record.dropped += 1;
            return;
        }
        if record.warnings.len() == record.capacity {
            record.warnings.pop_front();
            record.dropped += 1;
        }
        record.warnings.push_back(Warning { kind, message });
    }

    /// Emit a warning only when `debug` is set. Returns whether it was emitted.
    pub fn debug_warn(&self, debug: bool, kind: WarningKind, message: impl Into<String>) -> bool {
        if !debug {
            return false;
        }
        self.warn(kind, message);
        true
    }

    /// Snapshot of the retained warnings, oldest first
    pub fn warnings(&self) -> Vec<Warning> {
        self.lock().warnings.iter().cloned().collect()
    }

    /// Retained warnings of one kind
    pub fn count(&self, kind: WarningKind) -> usize {
        self.lock().warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Warnings evicted to stay within capacity
    pub fn dropped(&self) -> usize {
        self.lock().dropped
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn is_empty(&self) -> bool {
        self.lock().warnings.is_empty()
    }

    pub fn clear(&self) {
        let mut record = self.lock();
        record.warnings.clear();
        record.dropped = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Record> {
        // A poisoned record still holds valid warnings
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_always_records() {
        let diagnostics = Diagnostics::new();
        diagnostics.warn(WarningKind::MissingSiteId, "site_id is required");
        assert_eq!(diagnostics.count(WarningKind::MissingSiteId), 1);
        assert_eq!(diagnostics.warnings()[0].message, "site_id is required");
    }

    #[test]
    fn test_debug_warn_is_gated() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.debug_warn(false, WarningKind::EmptyEndpoint, "no endpoint"));
        assert!(diagnostics.is_empty());
        assert!(diagnostics.debug_warn(true, WarningKind::EmptyEndpoint, "no endpoint"));
        assert_eq!(diagnostics.count(WarningKind::EmptyEndpoint), 1);
    }

    #[test]
    fn test_clones_share_records() {
        let diagnostics = Diagnostics::new();
        let clone = diagnostics.clone();
        std::thread::spawn(move || clone.warn(WarningKind::TransportFailed, "boom"))
            .join()
            .unwrap();
        assert_eq!(diagnostics.count(WarningKind::TransportFailed), 1);
        diagnostics.clear();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_record_is_bounded() {
        let diagnostics = Diagnostics::with_capacity(3);
        for i in 0..10 {
            diagnostics.warn(WarningKind::NoActiveSession, format!("call {}", i));
        }

        let warnings = diagnostics.warnings();
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[0].message, "call 7");
        assert_eq!(warnings[2].message, "call 9");
        assert_eq!(diagnostics.dropped(), 7);
    }

    #[test]
    fn test_default_capacity_caps_repeated_misuse() {
        let diagnostics = Diagnostics::new();
        for _ in 0..(DEFAULT_CAPACITY * 4) {
            diagnostics.warn(WarningKind::NoActiveSession, "tracker not initialized");
        }
        assert_eq!(diagnostics.count(WarningKind::NoActiveSession), DEFAULT_CAPACITY);
        assert_eq!(diagnostics.dropped(), DEFAULT_CAPACITY * 3);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let diagnostics = Diagnostics::with_capacity(0);
        diagnostics.warn(WarningKind::TransportFailed, "boom");
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.dropped(), 1);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(WarningKind::NoActiveSession.to_string(), "no_active_session");
        assert_eq!(
            WarningKind::MissingBootstrapSiteId.as_str(),
            "missing_bootstrap_site_id"
        );
    }
}
