//! Standalone load-time bootstrap
//!
//! A page embedding the standalone build sets a few window slots before the
//! script loads. [`bootstrap`] reads them once and starts the registry session
//! if a site id is present. It also publishes the [`ALIAS_GLOBAL`] function,
//! which takes an event name and forwards to [`registry::track_event`].

use std::rc::Rc;

use crate::browser::{GlobalValue, Window};
use crate::config::{TrackerConfig, DEFAULT_ENDPOINT};
use crate::diagnostics::WarningKind;
use crate::registry;
use crate::session::{Environment, Tracker};
use crate::transport::Transport;

pub const SITE_ID_GLOBAL: &str = "SITEPULSE_SITE_ID";
pub const ENDPOINT_GLOBAL: &str = "SITEPULSE_ENDPOINT";
pub const DEBUG_GLOBAL: &str = "SITEPULSE_DEBUG";

/// Single-argument shorthand for `track_event`
pub const ALIAS_GLOBAL: &str = "pulse";

/// Configuration derived from the window slots, if a site id is set
pub fn config_from_globals(window: &Window) -> Option<TrackerConfig> {
    let site_id = window
        .global_text(SITE_ID_GLOBAL)
        .filter(|site_id| !site_id.is_empty())?;
    let endpoint = window
        .global_text(ENDPOINT_GLOBAL)
        .filter(|endpoint| !endpoint.is_empty())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let debug = window.global_flag(DEBUG_GLOBAL).unwrap_or(false);
    Some(TrackerConfig::new(site_id, endpoint).with_debug(debug))
}

/// Start tracking from window slots; returns `None` when no site id is set
pub fn bootstrap(window: &Rc<Window>, transport: Rc<dyn Transport>) -> Option<Tracker> {
    let Some(config) = config_from_globals(window) else {
        let debug = window.global_flag(DEBUG_GLOBAL).unwrap_or(false);
        registry::diagnostics().debug_warn(
            debug,
            WarningKind::MissingBootstrapSiteId,
            format!("{} not set, tracking disabled", SITE_ID_GLOBAL),
        );
        return None;
    };

    let tracker = registry::init(config, Some(Environment::new(window.clone(), transport)));
    window.set_global(
        ALIAS_GLOBAL,
        GlobalValue::Function(Rc::new(|name: &str| {
            registry::track_event(name);
        })),
    );
    Some(tracker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EventType;
    use crate::transport::RecordingTransport;

    fn window() -> Rc<Window> {
        Window::builder("https://example.com/pricing")
            .title("Pricing")
            .build()
            .unwrap()
    }

    #[test]
    fn test_bootstrap_without_site_id_does_nothing() {
        registry::shutdown();
        let window = window();
        window.set_global(DEBUG_GLOBAL, GlobalValue::Flag(true));
        let transport = RecordingTransport::new();
        let before = registry::diagnostics().count(WarningKind::MissingBootstrapSiteId);

        assert!(bootstrap(&window, Rc::new(transport.clone())).is_none());
        assert!(!registry::is_ready());
        assert!(transport.is_empty());
        assert!(window.global(ALIAS_GLOBAL).is_none());
        assert_eq!(
            registry::diagnostics().count(WarningKind::MissingBootstrapSiteId),
            before + 1
        );
    }

    #[test]
    fn test_bootstrap_defaults_endpoint() {
        let window = window();
        window.set_global(SITE_ID_GLOBAL, GlobalValue::Text("site-42".into()));

        let config = config_from_globals(&window).unwrap();
        assert_eq!(config.site_id, "site-42");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(!config.debug);
    }

    #[test]
    fn test_bootstrap_starts_session_and_alias() {
        let window = window();
        window.set_global(SITE_ID_GLOBAL, GlobalValue::Text("site-42".into()));
        window.set_global(
            ENDPOINT_GLOBAL,
            GlobalValue::Text("https://collect.example.com/e".into()),
        );
        let transport = RecordingTransport::new();

        let tracker = bootstrap(&window, Rc::new(transport.clone())).unwrap();
        assert!(registry::is_ready());
        assert!(window.call_global(ALIAS_GLOBAL, "upgrade_click"));

        let envelopes = transport.envelopes();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].kind, EventType::PageView);
        assert_eq!(envelopes[1].kind, EventType::Custom);
        assert_eq!(envelopes[1].name, "upgrade_click");
        assert_eq!(envelopes[1].identifier, "site-42");
        assert_eq!(transport.requests()[0].endpoint, "https://collect.example.com/e");

        tracker.destroy();
    }
}
