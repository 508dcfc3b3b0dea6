//! Telemetry envelope sent for every tracked action
//!
//! Every field is read from the window at build time. Nothing is cached
//! between calls: the URL, referrer and screen size can all change while a
//! page is open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::browser::Window;
use crate::client_id;

/// Classification of a tracked action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    Custom,
}

/// Wire payload, serialized as the JSON request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Site identifier from the session config
    pub identifier: String,

    #[serde(rename = "type")]
    pub kind: EventType,

    /// Event name for custom events; page title (or path) for page views
    pub name: String,

    pub client_id: String,
    pub url: String,
    pub path: String,
    pub referer: Option<String>,
    pub user_agent: String,
    pub language: Option<String>,
    pub device_width: u32,
    pub device_height: u32,

    /// Minutes from local time to UTC
    pub timezone_offset: i32,

    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Build an envelope from the window's current state
    ///
    /// Resolves the client identifier exactly once.
    pub fn build(kind: EventType, name: Option<&str>, site_id: &str, window: &Window) -> Self {
        let document = window.document();
        let path = window.pathname();
        let name = match (kind, name) {
            (_, Some(name)) => name.to_string(),
            (EventType::PageView, None) => page_name(&document.title(), &path),
            (EventType::Custom, None) => String::new(),
        };
        let referrer = document.referrer();
        let screen = window.screen();
        let navigator = window.navigator();

        Envelope {
            identifier: site_id.to_string(),
            kind,
            name,
            client_id: client_id::resolve(window.storage()).into_id(),
            url: window.href(),
            path,
            referer: (!referrer.is_empty()).then(|| referrer.to_string()),
            user_agent: navigator.user_agent.clone(),
            language: navigator.language.clone(),
            device_width: screen.width,
            device_height: screen.height,
            timezone_offset: window.timezone_offset(),
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

fn page_name(title: &str, path: &str) -> String {
    if title.trim().is_empty() {
        path.to_string()
    } else {
        title.to_string()
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{KeyValueStore, MemoryStorage};
    use std::rc::Rc;

    fn window(title: &str, referrer: &str) -> Rc<Window> {
        Window::builder("https://shop.example.com/products/42?ref=mail")
            .title(title)
            .referrer(referrer)
            .user_agent("TestAgent/1.0")
            .language(Some("de-DE".to_string()))
            .screen(390, 844)
            .timezone_offset(-60)
            .build()
            .unwrap()
    }

    #[test]
    fn test_page_view_fields() {
        let window = window("Product 42", "https://search.example.org/");
        let envelope = Envelope::build(EventType::PageView, None, "shop", &window);

        assert_eq!(envelope.identifier, "shop");
        assert_eq!(envelope.kind, EventType::PageView);
        assert_eq!(envelope.name, "Product 42");
        assert_eq!(envelope.url, "https://shop.example.com/products/42?ref=mail");
        assert_eq!(envelope.path, "/products/42");
        assert_eq!(envelope.referer.as_deref(), Some("https://search.example.org/"));
        assert_eq!(envelope.user_agent, "TestAgent/1.0");
        assert_eq!(envelope.language.as_deref(), Some("de-DE"));
        assert_eq!((envelope.device_width, envelope.device_height), (390, 844));
        assert_eq!(envelope.timezone_offset, -60);
    }

    #[test]
    fn test_page_view_name_falls_back_to_path() {
        let window = window("", "");
        let envelope = Envelope::build(EventType::PageView, None, "shop", &window);
        assert_eq!(envelope.name, "/products/42");
        assert_eq!(envelope.referer, None);
    }

    #[test]
    fn test_fields_are_read_fresh_each_time() {
        let window = window("Shop", "");
        let before = Envelope::build(EventType::Custom, Some("a"), "shop", &window);
        window.resize_screen(1024, 768);
        window.push_state("/cart").unwrap();
        let after = Envelope::build(EventType::Custom, Some("b"), "shop", &window);

        assert_eq!(before.device_width, 390);
        assert_eq!(after.device_width, 1024);
        assert_eq!(after.path, "/cart");
        assert_eq!(before.client_id, after.client_id);
    }

    #[test]
    fn test_wire_keys() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set(crate::client_id::STORAGE_KEY, "cid-1").unwrap();
        let window = Window::builder("https://example.com/")
            .storage(storage)
            .language(None)
            .build()
            .unwrap();
        let envelope = Envelope::build(EventType::Custom, Some("signup"), "site", &window);
        let json: serde_json::Value = serde_json::from_slice(&envelope.to_json().unwrap()).unwrap();

        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "client_id",
                "device_height",
                "device_width",
                "identifier",
                "language",
                "name",
                "path",
                "referer",
                "timestamp",
                "timezone_offset",
                "type",
                "url",
                "user_agent",
            ]
        );
        assert_eq!(json["type"], "custom");
        assert_eq!(json["client_id"], "cid-1");
        assert!(json["language"].is_null());

        let timestamp = json["timestamp"].as_str().unwrap();
        assert!(timestamp.ends_with('Z'));
        assert_eq!(timestamp.len(), "2024-01-01T00:00:00.000Z".len());
    }

    #[test]
    fn test_envelope_parses_back() {
        let window = window("Shop", "");
        let envelope = Envelope::build(EventType::PageView, None, "shop", &window);
        let parsed: Envelope = serde_json::from_slice(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(parsed.kind, EventType::PageView);
        assert_eq!(parsed.timestamp.timestamp_millis(), envelope.timestamp.timestamp_millis());
    }
}
