//! Single-page-application route change detection
//!
//! A [`NavigationWatcher`] calls its `on_change` callback once per distinct
//! URL. Both strategies share [`UrlMarker`]: the last URL a page view was
//! emitted for, compared against the full `href` after each navigation
//! completes. Repeated navigations to the same URL emit nothing.
//!
//! - [`HistoryPatch`] wraps `pushState`/`replaceState` and listens for `popstate`
//! - [`NavigateEvents`] listens for `NavigateSuccess` and `popstate` only
//!
//! Uninstalling a [`HistoryPatch`] puts an original entry point back only
//! while the slot still holds the patch's own wrapper. A wrapper that someone
//! else has since wrapped stays in their chain as a silent pass-through.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::browser::{Event, EventKind, HistoryFn, HistoryMethod, Listener, ListenerId, Window};
use crate::config::NavigationStrategy;

/// Callback fired when the URL changes
pub type OnChange = Rc<dyn Fn(&Window)>;

/// Install/uninstall pair for route change detection
pub trait NavigationWatcher {
    /// Start watching. Records the current URL as the baseline.
    fn install(&mut self, window: &Window, on_change: OnChange);

    /// Stop watching and undo every change `install` made. Safe to call
    /// without a prior `install`.
    fn uninstall(&mut self, window: &Window);

    fn is_installed(&self) -> bool;
}

/// Build the watcher for a configured strategy
pub fn watcher_for(strategy: NavigationStrategy) -> Box<dyn NavigationWatcher> {
    match strategy {
        NavigationStrategy::HistoryPatch => Box::new(HistoryPatch::new()),
        NavigationStrategy::NavigateEvents => Box::new(NavigateEvents::new()),
    }
}

/// Last URL a navigation page view was emitted for
#[derive(Debug, Clone, Default)]
pub struct UrlMarker {
    last: Rc<RefCell<Option<String>>>,
}

impl UrlMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: String) {
        *self.last.borrow_mut() = Some(url);
    }

    pub fn get(&self) -> Option<String> {
        self.last.borrow().clone()
    }

    pub fn clear(&self) {
        self.last.borrow_mut().take();
    }

    /// Record the window's URL; returns true if it differs from the marker
    pub fn advance(&self, window: &Window) -> bool {
        let current = window.href();
        let mut last = self.last.borrow_mut();
        if last.as_deref() == Some(current.as_str()) {
            return false;
        }
        *last = Some(current);
        true
    }
}

fn check_and_emit(window: &Window, marker: &UrlMarker, on_change: &OnChange) {
    if marker.advance(window) {
        on_change(window);
    }
}

fn change_listener(marker: &UrlMarker, on_change: &OnChange) -> Listener {
    let marker = marker.clone();
    let on_change = on_change.clone();
    Rc::new(move |window: &Window, _event: &Event| check_and_emit(window, &marker, &on_change))
}

struct PatchedMethod {
    method: HistoryMethod,
    original: HistoryFn,
    wrapper: HistoryFn,
}

/// Wraps the history entry points, remembering the originals
#[derive(Default)]
pub struct HistoryPatch {
    marker: UrlMarker,
    patched: Vec<PatchedMethod>,
    enabled: Option<Rc<Cell<bool>>>,
    popstate: Option<ListenerId>,
}

impl HistoryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self) -> &UrlMarker {
        &self.marker
    }

    fn wrap(&self, original: HistoryFn, enabled: &Rc<Cell<bool>>, on_change: &OnChange) -> HistoryFn {
        let marker = self.marker.clone();
        let enabled = enabled.clone();
        let on_change = on_change.clone();
        Rc::new(move |window: &Window, url: &str| {
            original(window, url)?;
            if enabled.get() {
                check_and_emit(window, &marker, &on_change);
            }
            Ok(())
        })
    }
}

impl NavigationWatcher for HistoryPatch {
    fn install(&mut self, window: &Window, on_change: OnChange) {
        if self.is_installed() {
            self.uninstall(window);
        }
        self.marker.set(window.href());

        let enabled = Rc::new(Cell::new(true));
        for method in [HistoryMethod::PushState, HistoryMethod::ReplaceState] {
            let original = window.history_fn(method);
            let wrapper = self.wrap(original.clone(), &enabled, &on_change);
            window.set_history_fn(method, wrapper.clone());
            self.patched.push(PatchedMethod {
                method,
                original,
                wrapper,
            });
        }
        self.enabled = Some(enabled);

        self.popstate = Some(window.add_event_listener(
            EventKind::PopState,
            change_listener(&self.marker, &on_change),
        ));
        tracing::debug!("history entry points patched");
    }

    fn uninstall(&mut self, window: &Window) {
        if let Some(enabled) = self.enabled.take() {
            enabled.set(false);
        }
        for patched in self.patched.drain(..) {
            if Rc::ptr_eq(&window.history_fn(patched.method), &patched.wrapper) {
                window.set_history_fn(patched.method, patched.original);
            } else {
                tracing::debug!(
                    method = ?patched.method,
                    "history entry point rewrapped since install, leaving pass-through"
                );
            }
        }
        if let Some(id) = self.popstate.take() {
            window.remove_event_listener(id);
        }
        self.marker.clear();
    }

    fn is_installed(&self) -> bool {
        !self.patched.is_empty()
    }
}

/// Event-subscription strategy; leaves the history entry points alone
#[derive(Default)]
pub struct NavigateEvents {
    marker: UrlMarker,
    listeners: Vec<ListenerId>,
}

impl NavigateEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self) -> &UrlMarker {
        &self.marker
    }
}

impl NavigationWatcher for NavigateEvents {
    fn install(&mut self, window: &Window, on_change: OnChange) {
        if self.is_installed() {
            self.uninstall(window);
        }
        self.marker.set(window.href());
        for kind in [EventKind::NavigateSuccess, EventKind::PopState] {
            let id = window.add_event_listener(kind, change_listener(&self.marker, &on_change));
            self.listeners.push(id);
        }
    }

    fn uninstall(&mut self, window: &Window) {
        for id in self.listeners.drain(..) {
            window.remove_event_listener(id);
        }
        self.marker.clear();
    }

    fn is_installed(&self) -> bool {
        !self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn setup() -> (Rc<Window>, Rc<Cell<usize>>, OnChange) {
        let window = Window::builder("https://app.example.com/home").build().unwrap();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let on_change: OnChange = Rc::new(move |_| counter.set(counter.get() + 1));
        (window, count, on_change)
    }

    #[test]
    fn test_patch_dedups_by_full_url() {
        let (window, count, on_change) = setup();
        let mut patch = HistoryPatch::new();
        patch.install(&window, on_change);

        window.push_state("/home").unwrap();
        assert_eq!(count.get(), 0);

        window.push_state("/settings").unwrap();
        window.push_state("/settings").unwrap();
        window.replace_state("/settings").unwrap();
        assert_eq!(count.get(), 1);

        window.push_state("/settings?tab=billing").unwrap();
        assert_eq!(count.get(), 2);
        assert_eq!(
            patch.marker().get().as_deref(),
            Some("https://app.example.com/settings?tab=billing")
        );
    }

    #[test]
    fn test_patch_popstate() {
        let (window, count, on_change) = setup();
        let mut patch = HistoryPatch::new();
        patch.install(&window, on_change);

        window.push_state("/a").unwrap();
        window.back();
        assert_eq!(count.get(), 2);
        assert_eq!(window.pathname(), "/home");
    }

    #[test]
    fn test_patch_failed_navigation_emits_nothing() {
        let (window, count, on_change) = setup();
        let mut patch = HistoryPatch::new();
        patch.install(&window, on_change);

        assert!(window.push_state("http://[::1").is_err());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_patch_uninstall_restores_originals() {
        let (window, count, on_change) = setup();
        let push = window.history_fn(HistoryMethod::PushState);
        let replace = window.history_fn(HistoryMethod::ReplaceState);

        let mut patch = HistoryPatch::new();
        patch.install(&window, on_change);
        assert!(patch.is_installed());
        assert!(!Rc::ptr_eq(&window.history_fn(HistoryMethod::PushState), &push));

        patch.uninstall(&window);
        assert!(!patch.is_installed());
        assert!(Rc::ptr_eq(&window.history_fn(HistoryMethod::PushState), &push));
        assert!(Rc::ptr_eq(&window.history_fn(HistoryMethod::ReplaceState), &replace));
        assert_eq!(window.listener_count(EventKind::PopState), 0);
        assert_eq!(patch.marker().get(), None);

        window.push_state("/after").unwrap();
        window.back();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_out_of_order_uninstall_keeps_newer_wrapper() {
        let (window, first_count, first_change) = setup();
        let (_, second_count, second_change) = setup();
        let native = window.history_fn(HistoryMethod::PushState);

        let mut first = HistoryPatch::new();
        first.install(&window, first_change);
        let mut second = HistoryPatch::new();
        second.install(&window, second_change);
        let second_wrapper = window.history_fn(HistoryMethod::PushState);

        // The older patch sits inside the newer one's chain; it must not
        // yank the newer wrapper out of the slot.
        first.uninstall(&window);
        assert!(Rc::ptr_eq(&window.history_fn(HistoryMethod::PushState), &second_wrapper));

        window.push_state("/a").unwrap();
        assert_eq!(first_count.get(), 0);
        assert_eq!(second_count.get(), 1);
        assert_eq!(window.href(), "https://app.example.com/a");

        second.uninstall(&window);
        window.push_state("/b").unwrap();
        assert_eq!(first_count.get(), 0);
        assert_eq!(second_count.get(), 1);
        assert_eq!(window.href(), "https://app.example.com/b");
        assert!(!Rc::ptr_eq(&window.history_fn(HistoryMethod::PushState), &native));
    }

    #[test]
    fn test_in_order_uninstall_restores_native() {
        let (window, _, first_change) = setup();
        let (_, _, second_change) = setup();
        let native = window.history_fn(HistoryMethod::PushState);

        let mut first = HistoryPatch::new();
        first.install(&window, first_change);
        let mut second = HistoryPatch::new();
        second.install(&window, second_change);

        second.uninstall(&window);
        first.uninstall(&window);
        assert!(Rc::ptr_eq(&window.history_fn(HistoryMethod::PushState), &native));
    }

    #[test]
    fn test_uninstall_without_install_is_safe() {
        let (window, _, _) = setup();
        let mut patch = HistoryPatch::new();
        patch.uninstall(&window);
        let mut events = NavigateEvents::new();
        events.uninstall(&window);
        assert!(!patch.is_installed());
        assert!(!events.is_installed());
    }

    #[test]
    fn test_navigate_events_strategy() {
        let (window, count, on_change) = setup();
        let push = window.history_fn(HistoryMethod::PushState);
        let mut events = NavigateEvents::new();
        events.install(&window, on_change);

        assert!(Rc::ptr_eq(&window.history_fn(HistoryMethod::PushState), &push));

        window.push_state("/a").unwrap();
        window.push_state("/a").unwrap();
        window.push_state("/b").unwrap();
        window.back();
        assert_eq!(count.get(), 3);

        events.uninstall(&window);
        assert_eq!(window.listener_count(EventKind::NavigateSuccess), 0);
        assert_eq!(window.listener_count(EventKind::PopState), 0);
        window.push_state("/c").unwrap();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_watcher_for_strategy() {
        let (window, _, on_change) = setup();
        let mut watcher = watcher_for(NavigationStrategy::NavigateEvents);
        watcher.install(&window, on_change);
        assert_eq!(window.listener_count(EventKind::NavigateSuccess), 1);
        watcher.uninstall(&window);
        assert_eq!(window.listener_count(EventKind::NavigateSuccess), 0);
    }
}
