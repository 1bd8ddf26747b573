//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the submission lifecycle, record persistence, and the
//! fulfillment API so route handlers stay focused on protocol translation.

pub mod fulfillment;
pub mod guard;
pub mod identity;
pub mod navigation;
pub mod store;

/// Trait for domain errors that carry a stable, machine-readable code.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
