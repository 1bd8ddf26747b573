//! Session identity resolution from the kiosk link's query parameters.
//!
//! A kiosk link normally carries both a session id and the machine it was
//! issued for. A link with a machine but no session is a fresh start, so a
//! session id is minted. A link with a session but no machine cannot be
//! fulfilled and is reported as corrupted, as are links with neither and
//! links whose session id is malformed.

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;

use serde::Deserialize;
use uuid::Uuid;

pub const MAX_SESSION_ID_LEN: usize = 128;

/// Raw query parameters of a kiosk link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingParams {
    pub session: Option<String>,
    pub machine_id: Option<String>,
    pub goods_id: Option<String>,
}

/// Identity handed to the submission guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub has_valid_context: bool,
    pub machine_id: Option<String>,
    pub goods_id: Option<String>,
    /// The session id was generated here rather than taken from the link.
    pub minted: bool,
}

impl SessionContext {
    /// Valid context for `session_id` on `machine_id`.
    #[must_use]
    pub fn valid(session_id: impl Into<String>, machine_id: impl Into<String>, goods_id: Option<String>) -> Self {
        Self {
            session_id: session_id.into(),
            has_valid_context: true,
            machine_id: Some(machine_id.into()),
            goods_id,
            minted: false,
        }
    }
}

/// Resolve the link parameters into a session context.
#[must_use]
pub fn resolve(params: &RoutingParams) -> SessionContext {
    let session = clean(params.session.as_deref());
    let machine_id = clean(params.machine_id.as_deref());
    let goods_id = clean(params.goods_id.as_deref());
    let has_machine = machine_id.is_some();

    let (session_id, has_valid_context, minted) = match session {
        Some(id) if is_valid_session_id(&id) => (id, has_machine, false),
        // Malformed ids are never used as record keys.
        Some(_) => (Uuid::new_v4().to_string(), false, true),
        None => (Uuid::new_v4().to_string(), has_machine, true),
    };

    SessionContext { session_id, has_valid_context, machine_id, goods_id, minted }
}

/// Session ids are opaque tokens of `[A-Za-z0-9_-]`, at most 128 bytes.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn clean(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
