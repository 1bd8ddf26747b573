//! Kiosk fulfillment API client.
//!
//! DESIGN
//! ======
//! A submission is two calls against the same endpoint, selected by the `s`
//! field of the JSON body: `Works.save` stores the composed design and returns
//! a works id, then `Order.create` queues that works id on the machine. A
//! final `Machine.wait` reads the machine's queue length; it is informational
//! and never fails a submission. Bodies and response parsing are pure
//! functions so they can be tested without a server.
//!
//! ERROR HANDLING
//! ==============
//! There are no retries here; a failed submission goes back to the guard,
//! which lets the user try again. Only definite failures are reported as
//! errors. Once `Works.save` has produced a works id, an `Order.create` that
//! answers 2xx with a body we can't read is treated as placed but unconfirmed,
//! since a retry could print the design twice.

#[cfg(test)]
#[path = "fulfillment_test.rs"]
mod tests;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use canvas::camera::Point;
use canvas::transform::{Rect, Transform};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::FulfillmentConfig;

const WORKS_PLATFORM: u8 = 4;
const WORKS_TERMINAL: u8 = 2;
const ORDER_TERMINAL: u8 = 4;
const ORDER_TYPE: u8 = 2;
const COMPONENT_INDEX: u32 = 100;
const MACHINE_WAIT_PAGE_SIZE: u32 = 20;
const SUCCESS_CODES: [i64; 2] = [0, 200];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("failed to build HTTP client: {0}")]
    HttpClientBuild(String),
    #[error("fulfillment request failed: {0}")]
    Request(String),
    #[error("{step} returned status {status}: {body}")]
    Status { step: &'static str, status: u16, body: String },
    #[error("failed to parse {step} response: {message}")]
    Parse { step: &'static str, message: String },
    #[error("Works.save response has no works id")]
    MissingWorksId,
    #[error("{step} rejected (code {code:?}): {message}")]
    Rejected { step: &'static str, code: Option<i64>, message: String },
    #[error("fulfillment API is not configured")]
    NotConfigured,
}

impl super::ErrorCode for SubmitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::HttpClientBuild(_) => "E_FULFILLMENT_CLIENT",
            Self::Request(_) => "E_FULFILLMENT_REQUEST",
            Self::Status { .. } => "E_FULFILLMENT_STATUS",
            Self::Parse { .. } => "E_FULFILLMENT_PARSE",
            Self::MissingWorksId => "E_FULFILLMENT_NO_WORKS_ID",
            Self::Rejected { .. } => "E_FULFILLMENT_REJECTED",
            Self::NotConfigured => "E_FULFILLMENT_NOT_CONFIGURED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Placement of the image inside the print area, in the kiosk's component
/// layout. Every coordinate is relative to the print-area origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Component {
    pub width: f64,
    pub height: f64,
    pub top: f64,
    pub left: f64,
    pub zoom: f64,
    pub rotate: f64,
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub upper_right_x: f64,
    pub upper_right_y: f64,
    pub lower_left_x: f64,
    pub lower_left_y: f64,
    pub lower_right_x: f64,
    pub lower_right_y: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub image_left: f64,
    pub image_top: f64,
    pub image_width: f64,
    pub image_height: f64,
}

/// Everything the fulfillment API needs to print one design.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignPayload {
    pub machine_id: String,
    pub goods_id: String,
    pub image_url: String,
    pub component: Component,
}

impl DesignPayload {
    /// Build a payload from the final placement of the image.
    #[must_use]
    pub fn from_transform(
        transform: &Transform,
        print_area: Rect,
        image_url: impl Into<String>,
        machine_id: impl Into<String>,
        goods_id: impl Into<String>,
    ) -> Self {
        let rel = |p: Point| Point::new(p.x - print_area.left, p.y - print_area.top);
        let (width, height) = transform.scaled_size();
        let center = rel(transform.position());
        let left = center.x - width / 2.0;
        let top = center.y - height / 2.0;
        let [ul, ur, lr, ll] = transform.corners().map(rel);

        Self {
            machine_id: machine_id.into(),
            goods_id: goods_id.into(),
            image_url: image_url.into(),
            component: Component {
                width,
                height,
                top,
                left,
                zoom: 1.0,
                rotate: transform.rotation_deg(),
                upper_left_x: ul.x,
                upper_left_y: ul.y,
                upper_right_x: ur.x,
                upper_right_y: ur.y,
                lower_left_x: ll.x,
                lower_left_y: ll.y,
                lower_right_x: lr.x,
                lower_right_y: lr.y,
                center_x: center.x,
                center_y: center.y,
                image_left: left,
                image_top: top,
                image_width: width,
                image_height: height,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub works_id: String,
    pub order_id: Option<String>,
    /// `Order.create` answered with a readable success body.
    pub order_confirmed: bool,
    /// Jobs waiting on the machine after the order, when the API reported it.
    pub queue_length: Option<u64>,
}

/// Hands a finished design to fulfillment. Called at most once per accepted
/// submission; implementations must not retry on their own.
#[async_trait::async_trait]
pub trait SubmitCollaborator: Send + Sync {
    async fn submit(&self, payload: &DesignPayload) -> Result<SubmitReceipt, SubmitError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct FulfillmentClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    language: String,
}

impl FulfillmentClient {
    /// # Errors
    ///
    /// Returns [`SubmitError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &FulfillmentConfig) -> Result<Self, SubmitError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| SubmitError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            token: config.token.clone(),
            language: config.language.clone(),
        })
    }

    async fn post(&self, step: &'static str, body: &Value) -> Result<String, SubmitError> {
        let response = self
            .http
            .post(&self.api_url)
            .header("token", &self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| SubmitError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| SubmitError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(SubmitError::Status { step, status, body: text });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl SubmitCollaborator for FulfillmentClient {
    async fn submit(&self, payload: &DesignPayload) -> Result<SubmitReceipt, SubmitError> {
        let text = self.post("Works.save", &works_save_body(payload)).await?;
        let works_id = parse_works_id(&text)?;
        info!(%works_id, machine_id = %payload.machine_id, "works saved");

        let text = self
            .post("Order.create", &order_create_body(payload, &works_id, &self.language, unix_secs()))
            .await?;
        let (order_id, order_confirmed) = match parse_order(&text)? {
            OrderOutcome::Placed(order_id) => {
                info!(%works_id, order_id = ?order_id, "order created");
                (order_id, true)
            }
            OrderOutcome::Unconfirmed => {
                warn!(%works_id, body = %text, "Order.create body unreadable; treating order as placed");
                (None, false)
            }
        };

        let queue_length = match self.post("Machine.wait", &machine_wait_body(payload)).await {
            Ok(text) => parse_queue_length(&text),
            Err(e) => {
                warn!(%works_id, error = %e, "Machine.wait failed; queue length unknown");
                None
            }
        };

        Ok(SubmitReceipt { works_id, order_id, order_confirmed, queue_length })
    }
}

/// Stand-in used when the fulfillment API isn't configured. Every
/// submission fails, so the guard stays retryable.
pub struct UnconfiguredSubmitter;

#[async_trait::async_trait]
impl SubmitCollaborator for UnconfiguredSubmitter {
    async fn submit(&self, _payload: &DesignPayload) -> Result<SubmitReceipt, SubmitError> {
        Err(SubmitError::NotConfigured)
    }
}

fn unix_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

fn works_save_body(payload: &DesignPayload) -> Value {
    let c = &payload.component;
    json!({
        "s": "Works.save",
        "components": [{
            "is_under": 0,
            "is_discount": 0,
            "id": null,
            "type": 0,
            "material_id": 0,
            "works_id": null,
            "original_id": 0,
            "index": COMPONENT_INDEX,
            "font_family": ".ttf",
            "font_style": "regular",
            "font_size": 0,
            "font_color": "",
            "under_color": "#00000000",
            "width": c.width,
            "height": c.height,
            "top": c.top,
            "left": c.left,
            "zoom": c.zoom,
            "rotate": c.rotate,
            "content": payload.image_url,
            "upper_left_x": c.upper_left_x,
            "upper_left_y": c.upper_left_y,
            "upper_right_x": c.upper_right_x,
            "upper_right_y": c.upper_right_y,
            "lower_left_x": c.lower_left_x,
            "lower_left_y": c.lower_left_y,
            "lower_right_x": c.lower_right_x,
            "lower_right_y": c.lower_right_y,
            "center_x": c.center_x,
            "center_y": c.center_y,
            "image_left": c.image_left,
            "image_top": c.image_top,
            "image_width": c.image_width,
            "image_height": c.image_height,
        }],
        "works_id": null,
        "goods_id": payload.goods_id,
        "template": null,
        "template_price": null,
        "template_user_id": null,
        "user_id": null,
        "platform": WORKS_PLATFORM,
        "shape_image": "",
        "shape_id": "",
        "shape_price": "",
        "machine_id": payload.machine_id,
        "terminal": WORKS_TERMINAL,
        "background_color": null,
    })
}

fn order_create_body(payload: &DesignPayload, works_id: &str, language: &str, create_time: u64) -> Value {
    json!({
        "s": "Order.create",
        "type": ORDER_TYPE,
        "machine_id": payload.machine_id,
        "goods_id": payload.goods_id,
        "works_id": works_id,
        "surface_type": 0,
        "surface_id": 0,
        "surface_color_series_id": 0,
        "surface_color_id": 0,
        "language": language,
        "terminal": ORDER_TERMINAL,
        "create_time": create_time,
    })
}

fn machine_wait_body(payload: &DesignPayload) -> Value {
    json!({
        "s": "Machine.wait",
        "machine_id": payload.machine_id,
        "page": 1,
        "per_page": MACHINE_WAIT_PAGE_SIZE,
        "total": 0,
    })
}

/// Envelope shared by every API call. The result code arrives as `code` or
/// `ret` depending on the endpoint; 0 and 200 mean success.
#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    ret: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl ApiResponse {
    fn result_code(&self) -> Option<i64> {
        self.code.or(self.ret)
    }

    /// `Err` when the envelope reports a failure code.
    fn check(self, step: &'static str) -> Result<Self, SubmitError> {
        match self.result_code() {
            Some(code) if !SUCCESS_CODES.contains(&code) => Err(SubmitError::Rejected {
                step,
                code: Some(code),
                message: self.msg.unwrap_or_default(),
            }),
            _ => Ok(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OrderOutcome {
    Placed(Option<String>),
    /// 2xx, but the body isn't a readable envelope.
    Unconfirmed,
}

/// Read an id that the API may send as either a string or a number.
fn id_field(data: Option<&Value>, key: &str) -> Option<String> {
    match data?.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_works_id(json: &str) -> Result<String, SubmitError> {
    let api: ApiResponse = serde_json::from_str(json)
        .map_err(|e| SubmitError::Parse { step: "Works.save", message: e.to_string() })?;
    let api = api.check("Works.save")?;
    id_field(api.data.as_ref(), "id").ok_or(SubmitError::MissingWorksId)
}

/// Classify an `Order.create` 2xx body.
///
/// A failure code, or no result code and no `data`, is a rejection: nothing
/// was queued and the user may retry. An unreadable body is `Unconfirmed`.
fn parse_order(json: &str) -> Result<OrderOutcome, SubmitError> {
    let Ok(api) = serde_json::from_str::<ApiResponse>(json) else {
        return Ok(OrderOutcome::Unconfirmed);
    };
    let api = api.check("Order.create")?;
    let data = api.data.as_ref().filter(|d| !d.is_null());
    if api.result_code().is_none() && data.is_none() {
        return Err(SubmitError::Rejected {
            step: "Order.create",
            code: None,
            message: api.msg.unwrap_or_else(|| "response has no data".into()),
        });
    }
    Ok(OrderOutcome::Placed(id_field(data, "order_id").or_else(|| id_field(data, "id"))))
}

fn parse_queue_length(json: &str) -> Option<u64> {
    let api: ApiResponse = serde_json::from_str::<ApiResponse>(json).ok()?.check("Machine.wait").ok()?;
    api.data?.get("total")?.as_u64()
}
