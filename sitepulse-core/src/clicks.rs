//! Delegated click tracking
//!
//! One listener at the document root handles clicks on any element, including
//! elements added after installation. A click counts when the target, or its
//! nearest ancestor carrying [`TRACK_ATTRIBUTE`], has a non-empty value for it.

use std::rc::Rc;

use crate::browser::{Event, EventKind, ListenerId, Window};

/// Element attribute naming the custom event a click emits
pub const TRACK_ATTRIBUTE: &str = "data-pulse-event";

/// Callback receiving the event name of a tracked click
pub type OnTrackedClick = Rc<dyn Fn(&str)>;

/// Document-root click listener
#[derive(Debug, Default)]
pub struct ClickDelegate {
    listener: Option<ListenerId>,
}

impl ClickDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, window: &Window, on_click: OnTrackedClick) {
        self.uninstall(window);
        let id = window.add_event_listener(
            EventKind::Click,
            Rc::new(move |window: &Window, event: &Event| {
                if let Some(name) = tracked_event_name(window, event) {
                    on_click(&name);
                }
            }),
        );
        self.listener = Some(id);
    }

    pub fn uninstall(&mut self, window: &Window) {
        if let Some(id) = self.listener.take() {
            window.remove_event_listener(id);
        }
    }

    pub fn is_installed(&self) -> bool {
        self.listener.is_some()
    }
}

/// Event name for a click, if the target sits inside a marked element
pub fn tracked_event_name(window: &Window, event: &Event) -> Option<String> {
    let target = event.target?;
    let document = window.document();
    let marked = document.closest_with_attribute(target, TRACK_ATTRIBUTE)?;
    document
        .attribute(marked, TRACK_ATTRIBUTE)
        .filter(|name| !name.is_empty())
}
