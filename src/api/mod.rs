//! Remote review API contract.
//!
//! The server owns all durable state and scheduling logic; this client
//! only calls four endpoints and displays what comes back:
//!
//! - `POST /api/v1/members` — register a device for an email
//! - `GET /api/v1/members` — list devices (doubles as the auth probe:
//!   success means the device is verified, 401 means still pending)
//! - `DELETE /api/v1/device` — remove a device from the account
//! - `POST /api/v1/reviews` — save a URL for spaced-repetition review
//!
//! The trait seam exists so the orchestrator can be exercised against an
//! in-memory fake; `HttpApi` is the production implementation.

pub mod http;

pub use http::HttpApi;

use crate::error::ApiError;
use async_trait::async_trait;
use serde::Deserialize;

/// Response to a device registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredMember {
    pub email: String,
    pub identifier: String,
}

/// One registered device, as reported by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub identifier: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Response to the member/device listing (and auth probe).
#[derive(Debug, Clone, Deserialize)]
pub struct MemberDevices {
    pub email: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Response to saving a review URL: the echoed URL plus the schedule the
/// server computed for it.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedReview {
    pub url: String,
    #[serde(rename = "scheduledAts")]
    pub scheduled_ats: Vec<String>,
}

/// The four remote operations the client performs.
#[async_trait]
pub trait ReviewApi: Send + Sync {
    /// Register this device for `email`. The server mails a verification
    /// link and returns the opaque device identifier.
    async fn register_device(&self, email: &str) -> Result<RegisteredMember, ApiError>;

    /// List the account's devices. Succeeds only for verified devices,
    /// which is why this call doubles as the auth probe.
    async fn get_devices(&self, email: &str, identifier: &str) -> Result<MemberDevices, ApiError>;

    /// Delete `target_identifier` from the account, authenticated as
    /// `device_identifier`.
    async fn delete_device(
        &self,
        email: &str,
        device_identifier: &str,
        target_identifier: &str,
    ) -> Result<(), ApiError>;

    /// Save `target_url` for review; returns the computed schedule.
    async fn save_review_url(
        &self,
        identifier: &str,
        target_url: &str,
    ) -> Result<SavedReview, ApiError>;
}
