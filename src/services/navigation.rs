//! Terminal view pinning.
//!
//! Once a session reaches a terminal state the editor must not come back,
//! whether the user presses back, reloads, or reopens the link. The guard
//! reports terminal states through [`TerminalNavigation`]; the host answers
//! every later page load for that session with the pinned view.

#[cfg(test)]
#[path = "navigation_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalView {
    /// Confirmation screen shown after a design was sent to print.
    Submitted,
    /// Error screen for links without a usable routing context.
    CorruptedLink,
}

/// Host capability that keeps a session on its terminal view.
pub trait TerminalNavigation: Send + Sync {
    fn engage(&self, session_id: &str, view: TerminalView);
}

/// In-process navigation guard backing the session route.
///
/// Only confirmation views are pinned by session id. A corrupted link has no
/// trustworthy id to pin against, so it is answered per request from the
/// resolved context instead.
#[derive(Debug, Default)]
pub struct HostNavigation {
    pinned: RwLock<HashMap<String, TerminalView>>,
}

impl HostNavigation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The view pinned for `session_id`, if any.
    #[must_use]
    pub fn terminal_view(&self, session_id: &str) -> Option<TerminalView> {
        self.pinned.read().unwrap_or_else(PoisonError::into_inner).get(session_id).copied()
    }
}

impl TerminalNavigation for HostNavigation {
    fn engage(&self, session_id: &str, view: TerminalView) {
        match view {
            TerminalView::Submitted => {
                let prev = self
                    .pinned
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(session_id.to_string(), view);
                if prev.is_none() {
                    info!(%session_id, "confirmation view pinned");
                }
            }
            TerminalView::CorruptedLink => {
                warn!(%session_id, "corrupted link view engaged");
            }
        }
    }
}
