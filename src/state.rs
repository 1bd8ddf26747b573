//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the guard registry, which owns the record store and the
//! fulfillment collaborator, plus the navigation guard that pins terminal
//! views for the session route.

use std::sync::Arc;

use crate::services::fulfillment::SubmitCollaborator;
use crate::services::guard::GuardRegistry;
use crate::services::navigation::HostNavigation;
use crate::services::store::RecordStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; every field is Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub guards: Arc<GuardRegistry>,
    pub navigation: Arc<HostNavigation>,
    /// Goods id used when the kiosk link doesn't carry one.
    pub default_goods_id: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        submitter: Arc<dyn SubmitCollaborator>,
        default_goods_id: Option<String>,
    ) -> Self {
        let navigation = Arc::new(HostNavigation::new());
        let guards = Arc::new(GuardRegistry::new(store, submitter, navigation.clone()));
        Self { guards, navigation, default_goods_id }
    }
}
