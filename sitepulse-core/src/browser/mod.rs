//! In-process browser substrate
//!
//! A [`Window`] is the execution context the tracker instruments: location
//! and history, the document, navigator and screen properties, event
//! listeners, named globals and key-value storage. It is single-threaded and
//! shared as `Rc<Window>`.
//!
//! ## History entry points
//!
//! `push_state` and `replace_state` run through replaceable [`HistoryFn`]
//! slots. The native implementations update the history stack and fire
//! [`EventKind::NavigateSuccess`]. An interceptor can take the current
//! function, install a wrapper, and later put the original back untouched.

mod document;
mod storage;

pub use document::{Document, ElementId, ReadyState};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, UnavailableStorage};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use url::Url;

use crate::error::Result;

/// Replaceable history mutation entry point
pub type HistoryFn = Rc<dyn Fn(&Window, &str) -> Result<()>>;

/// Event listener callback
pub type Listener = Rc<dyn Fn(&Window, &Event)>;

/// Single-argument function published as a global
pub type GlobalFn = Rc<dyn Fn(&str)>;

/// Identifies a registered listener for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Events the window dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Click reaching the document root
    Click,
    /// Back/forward traversal
    PopState,
    /// Document left the loading state
    DomContentLoaded,
    /// A native history mutation completed
    NavigateSuccess,
}

/// A dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Element the event originated on, for clicks
    pub target: Option<ElementId>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self { kind, target: None }
    }

    pub fn click(target: ElementId) -> Self {
        Self {
            kind: EventKind::Click,
            target: Some(target),
        }
    }
}

/// Which history entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMethod {
    PushState,
    ReplaceState,
}

/// Value stored in a named global slot
#[derive(Clone)]
pub enum GlobalValue {
    Text(String),
    Flag(bool),
    Object(Rc<dyn Any>),
    Function(GlobalFn),
}

impl fmt::Debug for GlobalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            GlobalValue::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            GlobalValue::Object(_) => f.write_str("Object(..)"),
            GlobalValue::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Navigator properties
#[derive(Debug, Clone)]
pub struct Navigator {
    pub user_agent: String,
    pub language: Option<String>,
}

/// Screen dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
}

struct HistoryStack {
    entries: Vec<Url>,
    index: usize,
}

impl HistoryStack {
    fn current(&self) -> &Url {
        &self.entries[self.index]
    }
}

/// Browser-like execution context
pub struct Window {
    history: RefCell<HistoryStack>,
    push_state_fn: RefCell<HistoryFn>,
    replace_state_fn: RefCell<HistoryFn>,
    document: Document,
    ready_state: Cell<ReadyState>,
    navigator: Navigator,
    screen: Cell<Screen>,
    timezone_offset: i32,
    storage: Rc<dyn KeyValueStore>,
    listeners: RefCell<Vec<(ListenerId, EventKind, Listener)>>,
    next_listener: Cell<u64>,
    globals: RefCell<HashMap<String, GlobalValue>>,
    instrumentation: RefCell<Option<Weak<dyn Any>>>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("href", &self.href())
            .field("ready_state", &self.ready_state.get())
            .field("listeners", &self.listeners.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Window {
    /// Start building a window loaded at `url`
    pub fn builder(url: impl Into<String>) -> WindowBuilder {
        WindowBuilder::new(url)
    }

    // ----- location & history -----

    /// Full current URL
    pub fn href(&self) -> String {
        self.history.borrow().current().to_string()
    }

    /// Path component of the current URL
    pub fn pathname(&self) -> String {
        self.history.borrow().current().path().to_string()
    }

    /// Resolve `url` against the current location
    pub fn resolve(&self, url: &str) -> Result<Url> {
        Ok(self.history.borrow().current().join(url)?)
    }

    /// `history.pushState` through the current entry point
    pub fn push_state(&self, url: &str) -> Result<()> {
        let entry = self.push_state_fn.borrow().clone();
        entry(self, url)
    }

    /// `history.replaceState` through the current entry point
    pub fn replace_state(&self, url: &str) -> Result<()> {
        let entry = self.replace_state_fn.borrow().clone();
        entry(self, url)
    }

    /// The function currently installed for `method`
    pub fn history_fn(&self, method: HistoryMethod) -> HistoryFn {
        match method {
            HistoryMethod::PushState => self.push_state_fn.borrow().clone(),
            HistoryMethod::ReplaceState => self.replace_state_fn.borrow().clone(),
        }
    }

    /// Install `entry` for `method`, returning the function it replaces
    pub fn set_history_fn(&self, method: HistoryMethod, entry: HistoryFn) -> HistoryFn {
        let slot = match method {
            HistoryMethod::PushState => &self.push_state_fn,
            HistoryMethod::ReplaceState => &self.replace_state_fn,
        };
        slot.replace(entry)
    }

    /// Step back one history entry, firing `popstate`. Returns false at the start.
    pub fn back(&self) -> bool {
        {
            let mut history = self.history.borrow_mut();
            if history.index == 0 {
                return false;
            }
            history.index -= 1;
        }
        self.dispatch(&Event::new(EventKind::PopState));
        true
    }

    /// Step forward one history entry, firing `popstate`. Returns false at the end.
    pub fn forward(&self) -> bool {
        {
            let mut history = self.history.borrow_mut();
            if history.index + 1 >= history.entries.len() {
                return false;
            }
            history.index += 1;
        }
        self.dispatch(&Event::new(EventKind::PopState));
        true
    }

    /// Number of entries in the session history
    pub fn history_len(&self) -> usize {
        self.history.borrow().entries.len()
    }

    fn commit_push(&self, url: Url) {
        let mut history = self.history.borrow_mut();
        let keep = history.index + 1;
        history.entries.truncate(keep);
        history.entries.push(url);
        history.index = history.entries.len() - 1;
    }

    fn commit_replace(&self, url: Url) {
        let mut history = self.history.borrow_mut();
        let index = history.index;
        history.entries[index] = url;
    }

    // ----- document -----

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state.get()
    }

    /// Advance the document's ready state; leaving `Loading` fires `DOMContentLoaded`
    pub fn set_ready_state(&self, state: ReadyState) {
        let previous = self.ready_state.replace(state);
        if !previous.is_interactive() && state.is_interactive() {
            self.dispatch(&Event::new(EventKind::DomContentLoaded));
        }
    }

    /// Dispatch a click originating on `target`
    pub fn click(&self, target: ElementId) {
        self.dispatch(&Event::click(target));
    }

    // ----- environment -----

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn screen(&self) -> Screen {
        self.screen.get()
    }

    pub fn resize_screen(&self, width: u32, height: u32) {
        self.screen.set(Screen { width, height });
    }

    /// Minutes from local time to UTC (positive west of Greenwich)
    pub fn timezone_offset(&self) -> i32 {
        self.timezone_offset
    }

    pub fn storage(&self) -> &dyn KeyValueStore {
        self.storage.as_ref()
    }

    // ----- events -----

    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, kind, listener));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    /// Run every listener registered for the event's kind, in registration order
    pub fn dispatch(&self, event: &Event) {
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in matching {
            listener(self, event);
        }
    }

    // ----- globals -----

    pub fn set_global(&self, name: &str, value: GlobalValue) -> Option<GlobalValue> {
        self.globals.borrow_mut().insert(name.to_string(), value)
    }

    pub fn global(&self, name: &str) -> Option<GlobalValue> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn remove_global(&self, name: &str) -> Option<GlobalValue> {
        self.globals.borrow_mut().remove(name)
    }

    /// Text slot, ignoring slots of other types
    pub fn global_text(&self, name: &str) -> Option<String> {
        match self.global(name) {
            Some(GlobalValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Flag slot, ignoring slots of other types
    pub fn global_flag(&self, name: &str) -> Option<bool> {
        match self.global(name) {
            Some(GlobalValue::Flag(flag)) => Some(flag),
            _ => None,
        }
    }

    /// Object slot downcast to `T`
    pub fn global_object<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        match self.global(name) {
            Some(GlobalValue::Object(object)) => object.downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Call a function slot; returns false when the slot holds no function
    pub fn call_global(&self, name: &str, arg: &str) -> bool {
        match self.global(name) {
            Some(GlobalValue::Function(function)) => {
                function(arg);
                true
            }
            _ => false,
        }
    }

    // ----- instrumentation owner -----

    /// The live owner of this window's instrumentation, if any
    ///
    /// Held weakly so the window never keeps its owner alive.
    pub(crate) fn instrumentation<T: 'static>(&self) -> Option<Rc<T>> {
        let owner = self.instrumentation.borrow().as_ref()?.upgrade()?;
        owner.downcast::<T>().ok()
    }

    pub(crate) fn claim_instrumentation(&self, owner: Weak<dyn Any>) {
        *self.instrumentation.borrow_mut() = Some(owner);
    }

    /// Clear the owner slot if `owner` still holds it
    pub(crate) fn release_instrumentation(&self, owner: *const ()) {
        let mut slot = self.instrumentation.borrow_mut();
        let held = slot
            .as_ref()
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr() as *const (), owner));
        if held {
            slot.take();
        }
    }
}

fn native_push_state(window: &Window, url: &str) -> Result<()> {
    let target = window.resolve(url)?;
    window.commit_push(target);
    window.dispatch(&Event::new(EventKind::NavigateSuccess));
    Ok(())
}

fn native_replace_state(window: &Window, url: &str) -> Result<()> {
    let target = window.resolve(url)?;
    window.commit_replace(target);
    window.dispatch(&Event::new(EventKind::NavigateSuccess));
    Ok(())
}

/// Local timezone offset in browser convention
fn local_timezone_offset() -> i32 {
    -(chrono::Local::now().offset().local_minus_utc() / 60)
}

/// Builder for [`Window`]
pub struct WindowBuilder {
    url: String,
    title: String,
    referrer: String,
    user_agent: String,
    language: Option<String>,
    screen: Screen,
    timezone_offset: Option<i32>,
    ready_state: ReadyState,
    storage: Option<Rc<dyn KeyValueStore>>,
}

impl WindowBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            referrer: String::new(),
            user_agent: format!("sitepulse/{}", env!("CARGO_PKG_VERSION")),
            language: Some("en-US".to_string()),
            screen: Screen {
                width: 1280,
                height: 720,
            },
            timezone_offset: None,
            ready_state: ReadyState::Complete,
            storage: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn screen(mut self, width: u32, height: u32) -> Self {
        self.screen = Screen { width, height };
        self
    }

    pub fn timezone_offset(mut self, minutes: i32) -> Self {
        self.timezone_offset = Some(minutes);
        self
    }

    pub fn ready_state(mut self, state: ReadyState) -> Self {
        self.ready_state = state;
        self
    }

    pub fn storage(mut self, storage: Rc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the window; fails if the initial URL is not absolute
    pub fn build(self) -> Result<Rc<Window>> {
        let location = Url::parse(&self.url)?;
        let storage = self
            .storage
            .unwrap_or_else(|| Rc::new(MemoryStorage::new()) as Rc<dyn KeyValueStore>);

        Ok(Rc::new(Window {
            history: RefCell::new(HistoryStack {
                entries: vec![location],
                index: 0,
            }),
            push_state_fn: RefCell::new(Rc::new(native_push_state) as HistoryFn),
            replace_state_fn: RefCell::new(Rc::new(native_replace_state) as HistoryFn),
            document: Document::new(self.title, self.referrer),
            ready_state: Cell::new(self.ready_state),
            navigator: Navigator {
                user_agent: self.user_agent,
                language: self.language,
            },
            screen: Cell::new(self.screen),
            timezone_offset: self.timezone_offset.unwrap_or_else(local_timezone_offset),
            storage,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            globals: RefCell::new(HashMap::new()),
            instrumentation: RefCell::new(None),
        }))
    }
}
