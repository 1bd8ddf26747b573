//! Session routes: resolve the kiosk link and submit the finished design.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::CACHE_CONTROL;
use axum::response::{IntoResponse, Json, Response};
use canvas::camera::Point;
use canvas::transform::{Rect, Scale, Transform};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::services::ErrorCode;
use crate::services::fulfillment::{DesignPayload, SubmitReceipt};
use crate::services::guard::{GuardError, GuardState, SubmitOutcome};
use crate::services::identity::{self, RoutingParams};
use crate::services::navigation::TerminalView;
use crate::state::AppState;

// =============================================================================
// RESOLVE
// =============================================================================

/// Which page the kiosk should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionView {
    Editor,
    Submitted,
    CorruptedLink,
}

impl From<GuardState> for SessionView {
    fn from(state: GuardState) -> Self {
        match state {
            GuardState::Idle | GuardState::Submitting => Self::Editor,
            GuardState::Submitted | GuardState::Locked => Self::Submitted,
            GuardState::Corrupted => Self::CorruptedLink,
        }
    }
}

impl From<TerminalView> for SessionView {
    fn from(view: TerminalView) -> Self {
        match view {
            TerminalView::Submitted => Self::Submitted,
            TerminalView::CorruptedLink => Self::CorruptedLink,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub view: SessionView,
    pub state: GuardState,
    pub machine_id: Option<String>,
    pub goods_id: Option<String>,
    pub may_submit: bool,
    pub terminal: bool,
    pub minted: bool,
}

/// `GET /api/session` — resolve the link and initialize the session's guard.
///
/// A pinned terminal view is answered before anything else, so back and
/// reload never bring the editor back.
pub async fn resolve_session(
    State(state): State<AppState>,
    Query(params): Query<RoutingParams>,
) -> Result<Response, StatusCode> {
    let mut context = identity::resolve(&params);
    if context.goods_id.is_none() {
        context.goods_id.clone_from(&state.default_goods_id);
    }

    if context.has_valid_context {
        if let Some(view) = state.navigation.terminal_view(&context.session_id) {
            let guard_state = match state.guards.get(&context.session_id) {
                Some(guard) => guard.state(),
                None => GuardState::Locked,
            };
            let body = SessionResponse {
                session_id: context.session_id,
                view: view.into(),
                state: guard_state,
                machine_id: context.machine_id,
                goods_id: context.goods_id,
                may_submit: false,
                terminal: true,
                minted: context.minted,
            };
            return Ok(no_store(body));
        }
    }

    let minted = context.minted;
    let guard = state.guards.get_or_init(context).await.map_err(|e| {
        warn!(error_code = e.error_code(), error = %e, "session init failed");
        guard_error_to_status(&e)
    })?;
    let guard_state = guard.state();
    let ctx = guard.context();
    info!(session_id = %ctx.session_id, state = ?guard_state, "session resolved");

    Ok(no_store(SessionResponse {
        session_id: ctx.session_id.clone(),
        view: guard_state.into(),
        state: guard_state,
        machine_id: ctx.machine_id.clone(),
        goods_id: ctx.goods_id.clone(),
        may_submit: guard_state.may_submit(),
        terminal: guard_state.is_terminal(),
        minted,
    }))
}

fn no_store(body: SessionResponse) -> Response {
    ([(CACHE_CONTROL, "no-store")], Json(body)).into_response()
}

// =============================================================================
// SUBMIT
// =============================================================================

fn unit_scale() -> f64 {
    1.0
}

/// Final placement of the image as reported by the canvas engine.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TransformBody {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "unit_scale")]
    pub scale_x: f64,
    #[serde(default = "unit_scale")]
    pub scale_y: f64,
    #[serde(default)]
    pub rotation_deg: f64,
}

impl TransformBody {
    fn to_transform(self) -> Option<Transform> {
        let finite = [self.center_x, self.center_y, self.width, self.height, self.scale_x, self.scale_y, self.rotation_deg]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let mut transform = Transform::new(Point::new(self.center_x, self.center_y), self.width, self.height);
        transform.set_scale(Scale { x: self.scale_x, y: self.scale_y });
        transform.set_rotation_deg(self.rotation_deg);
        Some(transform)
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub image_url: String,
    pub transform: TransformBody,
    pub print_area: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Submitted,
    AlreadySubmitted,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    pub works_id: Option<String>,
    pub order_id: Option<String>,
    pub order_confirmed: bool,
    pub queue_length: Option<u64>,
    pub record_persisted: bool,
}

impl SubmitResponse {
    fn submitted(receipt: SubmitReceipt, record_persisted: bool) -> Self {
        Self {
            status: SubmitStatus::Submitted,
            works_id: Some(receipt.works_id),
            order_id: receipt.order_id,
            order_confirmed: receipt.order_confirmed,
            queue_length: receipt.queue_length,
            record_persisted,
        }
    }
}

/// `POST /api/session/{id}/submit` — hand the design to fulfillment once.
pub async fn submit_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<SubmitResponse>, StatusCode> {
    let Some(guard) = state.guards.get(&session_id) else {
        return Err(StatusCode::NOT_FOUND);
    };
    if guard.state() == GuardState::Corrupted {
        let err = GuardError::CorruptedContext;
        warn!(%session_id, error_code = err.error_code(), "submit against a corrupted link");
        return Err(guard_error_to_status(&err));
    }

    let image_url = body.image_url.trim();
    if image_url.is_empty() || !body.print_area.is_valid() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let Some(transform) = body.transform.to_transform() else {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    };
    let ctx = guard.context();
    let (Some(machine_id), Some(goods_id)) = (ctx.machine_id.clone(), ctx.goods_id.clone()) else {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    };
    let payload = DesignPayload::from_transform(&transform, body.print_area, image_url, machine_id, goods_id);

    // Once started, the submission runs to completion even if the client goes away.
    let task = tokio::spawn(async move { guard.check_and_submit(&session_id, &payload).await });
    let result = task.await.map_err(|e| {
        warn!(error = %e, "submit task failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    submit_result_to_response(result).map(Json)
}

pub(crate) fn submit_result_to_response(result: Result<SubmitOutcome, GuardError>) -> Result<SubmitResponse, StatusCode> {
    match result {
        Ok(SubmitOutcome::Submitted(receipt)) => Ok(SubmitResponse::submitted(receipt, true)),
        Ok(SubmitOutcome::AlreadySubmitted) => Ok(SubmitResponse {
            status: SubmitStatus::AlreadySubmitted,
            works_id: None,
            order_id: None,
            order_confirmed: false,
            queue_length: None,
            record_persisted: true,
        }),
        Err(GuardError::RecordNotPersisted { receipt, .. }) => Ok(SubmitResponse::submitted(receipt, false)),
        Err(e) => {
            warn!(error_code = e.error_code(), retryable = e.retryable(), error = %e, "submit rejected");
            Err(guard_error_to_status(&e))
        }
    }
}

pub(crate) fn guard_error_to_status(err: &GuardError) -> StatusCode {
    match err {
        GuardError::InFlight => StatusCode::CONFLICT,
        GuardError::SubmitFailed(_) => StatusCode::BAD_GATEWAY,
        GuardError::CorruptedContext => StatusCode::GONE,
        GuardError::SessionMismatch { .. } | GuardError::MachineMismatch { .. } => StatusCode::BAD_REQUEST,
        GuardError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        GuardError::RecordNotPersisted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
