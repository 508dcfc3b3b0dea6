//! Per-browser client identifier
//!
//! The identifier is read from storage under [`STORAGE_KEY`], created and
//! persisted on first use, and replaced by a fresh `session_`-prefixed value
//! on every call while storage is failing. Ephemeral values are never
//! cached, so each tracked action on a page without storage carries a
//! different one.

use chrono::Utc;
use uuid::Uuid;

use crate::browser::KeyValueStore;
use crate::error::Error;

/// Storage key holding the persisted identifier
pub const STORAGE_KEY: &str = "sitepulse_client_id";

/// Prefix marking an identifier that could not be persisted
pub const EPHEMERAL_PREFIX: &str = "session_";

/// Where a resolved identifier came from
#[derive(Debug)]
pub enum IdSource {
    /// Read back from storage
    Stored,
    /// Generated and persisted by this call
    Created,
    /// Storage failed; generated for this call only
    Ephemeral(Error),
}

/// A resolved identifier and its provenance
#[derive(Debug)]
pub struct ClientIdResolution {
    pub id: String,
    pub source: IdSource,
}

impl ClientIdResolution {
    pub fn is_persistent(&self) -> bool {
        !matches!(self.source, IdSource::Ephemeral(_))
    }

    pub fn into_id(self) -> String {
        self.id
    }
}

/// Resolve the client identifier. Never fails.
pub fn resolve(store: &dyn KeyValueStore) -> ClientIdResolution {
    match lookup_or_create(store) {
        Ok(resolution) => resolution,
        Err(err) => {
            tracing::debug!(error = %err, "client id storage unavailable, using ephemeral id");
            ClientIdResolution {
                id: ephemeral_id(),
                source: IdSource::Ephemeral(err),
            }
        }
    }
}

fn lookup_or_create(store: &dyn KeyValueStore) -> Result<ClientIdResolution, Error> {
    if let Some(id) = store.get(STORAGE_KEY)? {
        return Ok(ClientIdResolution {
            id,
            source: IdSource::Stored,
        });
    }

    let id = generate_id();
    store.set(STORAGE_KEY, &id)?;
    Ok(ClientIdResolution {
        id,
        source: IdSource::Created,
    })
}

/// Random v4 UUID
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Non-persisted identifier: prefix, random base-36 fragment, base-36 time
pub fn ephemeral_id() -> String {
    let random = (Uuid::new_v4().as_u128() & u64::MAX as u128) as u64;
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    compose_ephemeral(random, millis)
}

fn compose_ephemeral(random: u64, millis: u64) -> String {
    format!("{}{}{}", EPHEMERAL_PREFIX, to_base36(random), to_base36(millis))
}

/// True if `id` carries the ephemeral prefix
pub fn is_ephemeral(id: &str) -> bool {
    id.starts_with(EPHEMERAL_PREFIX)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
