//! Tracking sessions
//!
//! A [`Tracker`] is the handle to one session: a configuration bound to a
//! window, with its click delegate and navigation watcher installed. Handles
//! are cheap clones of the same session.
//!
//! A window carries at most one live session. Starting a session on a window
//! that already has one destroys the older session first, so navigation and
//! clicks are never reported twice.
//!
//! Starting a session without a window yields an inert tracker whose
//! operations do nothing. Destroying a session uninstalls everything it
//! installed and clears its configuration; later calls on any clone of the
//! handle are rejected as having no active session.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::browser::{Event, EventKind, ListenerId, Window};
use crate::clicks::ClickDelegate;
use crate::config::TrackerConfig;
use crate::delivery;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::envelope::{Envelope, EventType};
use crate::navigation::{self, NavigationWatcher};
use crate::outcome::{Misuse, TrackOutcome};
use crate::registry;
use crate::transport::Transport;

/// The window and transport a session runs against
#[derive(Clone)]
pub struct Environment {
    window: Rc<Window>,
    transport: Rc<dyn Transport>,
    diagnostics: Diagnostics,
}

impl Environment {
    pub fn new(window: Rc<Window>, transport: Rc<dyn Transport>) -> Self {
        Self {
            window,
            transport,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Report warnings into an existing sink
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn window(&self) -> &Rc<Window> {
        &self.window
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

/// How an empty event name is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EmptyNameWarning {
    Always,
    DebugOnly,
}

#[derive(Default)]
struct SessionState {
    config: Option<TrackerConfig>,
    clicks: Option<ClickDelegate>,
    navigation: Option<Box<dyn NavigationWatcher>>,
    pending_page_view: Option<ListenerId>,
}

struct Session {
    env: Option<Environment>,
    diagnostics: Diagnostics,
    state: RefCell<SessionState>,
}

impl Session {
    /// Undo every side effect of `start`. Returns false if already torn down.
    fn teardown(&self) -> bool {
        let (clicks, navigation, pending) = {
            let mut state = self.state.borrow_mut();
            if state.config.take().is_none() {
                return false;
            }
            (
                state.clicks.take(),
                state.navigation.take(),
                state.pending_page_view.take(),
            )
        };

        if let Some(env) = &self.env {
            let window = env.window.as_ref();
            window.release_instrumentation(self as *const Session as *const ());
            if let Some(mut clicks) = clicks {
                clicks.uninstall(window);
            }
            if let Some(mut navigation) = navigation {
                navigation.uninstall(window);
            }
            if let Some(id) = pending {
                window.remove_event_listener(id);
            }
        }
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handle to a tracking session
#[derive(Clone)]
pub struct Tracker {
    session: Rc<Session>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("active", &self.is_active())
            .field("inert", &self.is_inert())
            .field("config", &self.config())
            .finish()
    }
}

impl Tracker {
    /// Start a session on a window
    ///
    /// Pass `None` when there is no browser context; the returned tracker is
    /// inert. Missing site id or endpoint produce warnings but the session
    /// still starts. A session already live on the same window is destroyed
    /// first; handles to it report no active session afterwards.
    pub fn start(config: TrackerConfig, env: Option<Environment>) -> Tracker {
        let Some(env) = env else {
            return Tracker::inert(Diagnostics::new());
        };
        let diagnostics = env.diagnostics.clone();

        if let Some(previous) = env.window.instrumentation::<Session>() {
            tracing::debug!("superseding the session already live on this window");
            Tracker { session: previous }.destroy();
        }

        for field in config.missing_fields() {
            let kind = match field {
                "site_id" => WarningKind::MissingSiteId,
                _ => WarningKind::MissingEndpoint,
            };
            diagnostics.warn(kind, format!("{} is required", field));
        }

        let window = env.window.clone();
        let session = Rc::new(Session {
            env: Some(env),
            diagnostics,
            state: RefCell::new(SessionState::default()),
        });
        let owner: Weak<dyn Any> = Rc::downgrade(&session) as Weak<dyn Any>;
        window.claim_instrumentation(owner);

        let tracker = Tracker { session };
        tracker.wire(&window, config);
        tracker
    }

    /// A tracker with no browser context
    pub fn inert(diagnostics: Diagnostics) -> Tracker {
        diagnostics.warn(
            WarningKind::NoBrowserContext,
            "no browser context available, tracking disabled",
        );
        Tracker {
            session: Rc::new(Session {
                env: None,
                diagnostics,
                state: RefCell::new(SessionState::default()),
            }),
        }
    }

    fn wire(&self, window: &Rc<Window>, config: TrackerConfig) {
        let weak = Rc::downgrade(&self.session);

        let clicks = config.track_clicks.then(|| {
            let mut delegate = ClickDelegate::new();
            let weak = weak.clone();
            delegate.install(
                window,
                Rc::new(move |name: &str| {
                    if let Some(tracker) = Tracker::upgrade(&weak) {
                        tracker.emit(EventType::Custom, Some(name));
                    }
                }),
            );
            delegate
        });

        let navigation = config.track_spa_navigation.then(|| {
            let mut watcher = navigation::watcher_for(config.navigation);
            let weak = weak.clone();
            watcher.install(
                window,
                Rc::new(move |_: &Window| {
                    if let Some(tracker) = Tracker::upgrade(&weak) {
                        tracker.emit(EventType::PageView, None);
                    }
                }),
            );
            watcher
        });

        let auto_page_view = config.track_page_view_on_init;
        let deferred = auto_page_view && !window.ready_state().is_interactive();
        let pending_page_view = deferred.then(|| {
            window.add_event_listener(EventKind::DomContentLoaded, deferred_page_view(weak))
        });

        tracing::debug!(
            site_id = %config.site_id,
            clicks = config.track_clicks,
            spa_navigation = config.track_spa_navigation,
            deferred_page_view = deferred,
            "tracking session started"
        );

        {
            let mut state = self.session.state.borrow_mut();
            state.config = Some(config);
            state.clicks = clicks;
            state.navigation = navigation;
            state.pending_page_view = pending_page_view;
        }

        if auto_page_view && !deferred {
            self.emit(EventType::PageView, None);
        }
    }

    fn upgrade(weak: &Weak<Session>) -> Option<Tracker> {
        weak.upgrade().map(|session| Tracker { session })
    }

    /// Emit a page view for the current URL
    pub fn track_page_view(&self) -> TrackOutcome {
        self.emit(EventType::PageView, None)
    }

    /// Emit a custom event. Empty names are rejected with a warning.
    pub fn track_event(&self, name: &str) -> TrackOutcome {
        self.track_event_with(name, EmptyNameWarning::Always)
    }

    pub(crate) fn track_event_with(&self, name: &str, empty_name: EmptyNameWarning) -> TrackOutcome {
        if self.is_inert() {
            return TrackOutcome::Inert;
        }
        if name.is_empty() {
            let message = "event name is required";
            match empty_name {
                EmptyNameWarning::Always => {
                    self.session.diagnostics.warn(WarningKind::EmptyEventName, message);
                }
                EmptyNameWarning::DebugOnly => {
                    let debug = self.config().map(|c| c.debug).unwrap_or(false);
                    self.session
                        .diagnostics
                        .debug_warn(debug, WarningKind::EmptyEventName, message);
                }
            }
            return TrackOutcome::Rejected(Misuse::EmptyEventName);
        }
        self.emit(EventType::Custom, Some(name))
    }

    fn emit(&self, kind: EventType, name: Option<&str>) -> TrackOutcome {
        let Some(env) = &self.session.env else {
            return TrackOutcome::Inert;
        };
        let Some(config) = self.config() else {
            self.session.diagnostics.warn(
                WarningKind::NoActiveSession,
                "tracker not initialized, call init first",
            );
            return TrackOutcome::Rejected(Misuse::NoActiveSession);
        };

        let envelope = Envelope::build(kind, name, &config.site_id, &env.window);
        delivery::send(
            &envelope,
            &config,
            env.transport.as_ref(),
            &self.session.diagnostics,
        )
    }

    /// Stop the session and undo everything `start` installed. Idempotent.
    pub fn destroy(&self) {
        if self.session.teardown() {
            tracing::debug!("tracking session destroyed");
        }
        registry::release(self);
    }

    /// True until `destroy`; always false for inert trackers
    pub fn is_active(&self) -> bool {
        self.session.env.is_some() && self.session.state.borrow().config.is_some()
    }

    /// True when started without a browser context
    pub fn is_inert(&self) -> bool {
        self.session.env.is_none()
    }

    /// Configuration of a live session
    pub fn config(&self) -> Option<TrackerConfig> {
        self.session.state.borrow().config.clone()
    }

    pub fn window(&self) -> Option<&Rc<Window>> {
        self.session.env.as_ref().map(|env| &env.window)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.session.diagnostics
    }

    /// True if both handles refer to the same session
    pub fn ptr_eq(&self, other: &Tracker) -> bool {
        Rc::ptr_eq(&self.session, &other.session)
    }
}

/// One-shot `DOMContentLoaded` listener emitting the startup page view
fn deferred_page_view(weak: Weak<Session>) -> crate::browser::Listener {
    Rc::new(move |window: &Window, _event: &Event| {
        let Some(tracker) = Tracker::upgrade(&weak) else {
            return;
        };
        let pending = tracker.session.state.borrow_mut().pending_page_view.take();
        if let Some(id) = pending {
            window.remove_event_listener(id);
            tracker.emit(EventType::PageView, None);
        }
    })
}
