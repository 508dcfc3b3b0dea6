//! Single-instance session registry
//!
//! Pages that want one tracker per window go through [`init`] instead of
//! owning a [`Tracker`] themselves. The registry keeps at most one current
//! session per thread: starting a new one destroys the previous one first.
//!
//! The free functions ([`track_event`], [`track_page_view`],
//! [`track_custom_event`]) and the [`CompatApi`] object published on the
//! window are thin adapters over the current session.

use std::cell::RefCell;
use std::rc::Rc;

use crate::browser::GlobalValue;
use crate::config::TrackerConfig;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::outcome::{Misuse, TrackOutcome};
use crate::session::{EmptyNameWarning, Environment, Tracker};

/// Window slot holding the [`CompatApi`] while a session is current
pub const COMPAT_GLOBAL: &str = "sitepulse";

thread_local! {
    static CURRENT: RefCell<Option<Tracker>> = const { RefCell::new(None) };
    static DIAGNOSTICS: Diagnostics = Diagnostics::new();
}

/// Ambient tracking surface for code that does not hold a [`Tracker`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatApi;

impl CompatApi {
    pub fn track_page_view(&self) -> TrackOutcome {
        track_page_view()
    }

    pub fn track_custom_event(&self, name: &str) -> TrackOutcome {
        track_custom_event(name)
    }
}

/// Start a session and make it current, destroying any previous one
///
/// Without a browser context the returned tracker is inert and the registry
/// is left untouched.
pub fn init(config: TrackerConfig, env: Option<Environment>) -> Tracker {
    let Some(env) = env else {
        return Tracker::start(config, None);
    };

    if let Some(previous) = get_instance() {
        tracing::debug!("superseding current tracking session");
        previous.destroy();
    }

    let window = env.window().clone();
    let tracker = Tracker::start(config, Some(env));
    CURRENT.with(|current| *current.borrow_mut() = Some(tracker.clone()));
    window.set_global(COMPAT_GLOBAL, GlobalValue::Object(Rc::new(CompatApi)));
    tracker
}

/// Forget `tracker` if it is current. Called from [`Tracker::destroy`].
pub(crate) fn release(tracker: &Tracker) {
    let was_current = CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        match current.as_ref() {
            Some(held) if held.ptr_eq(tracker) => current.take().is_some(),
            _ => false,
        }
    });
    if was_current {
        if let Some(window) = tracker.window() {
            window.remove_global(COMPAT_GLOBAL);
        }
    }
}

/// True iff a current session exists and is active
pub fn is_ready() -> bool {
    get_instance().is_some_and(|tracker| tracker.is_active())
}

/// The current session, if any
pub fn get_instance() -> Option<Tracker> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Destroy the current session, if any
pub fn shutdown() {
    if let Some(tracker) = get_instance() {
        tracker.destroy();
    }
}

/// Sink for warnings raised when no session is current
pub fn diagnostics() -> Diagnostics {
    DIAGNOSTICS.with(|diagnostics| diagnostics.clone())
}

fn without_session() -> TrackOutcome {
    diagnostics().warn(
        WarningKind::NoActiveSession,
        "tracker not initialized, call init first",
    );
    TrackOutcome::Rejected(Misuse::NoActiveSession)
}

/// Emit a page view on the current session
pub fn track_page_view() -> TrackOutcome {
    match get_instance() {
        Some(tracker) => tracker.track_page_view(),
        None => without_session(),
    }
}

/// Emit a custom event on the current session
///
/// Unlike [`Tracker::track_event`], an empty name only warns in debug mode.
pub fn track_event(name: &str) -> TrackOutcome {
    match get_instance() {
        Some(tracker) => tracker.track_event_with(name, EmptyNameWarning::DebugOnly),
        None => without_session(),
    }
}

/// Alias of [`track_event`] under the compatibility name
pub fn track_custom_event(name: &str) -> TrackOutcome {
    track_event(name)
}
