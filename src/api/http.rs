//! HTTP implementation of the review API over reqwest.

use super::{MemberDevices, RegisteredMember, ReviewApi, SavedReview};
use crate::error::{ApiError, ErrorKind};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

/// Server error payload: `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Review API client backed by reqwest.
pub struct HttpApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpApi {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and classify the outcome.
    ///
    /// - connection failure → `NetworkError`
    /// - 204 → success with no body
    /// - other non-2xx → kind from the status table, carrying the
    ///   server's `message` field when the error body parses
    /// - 2xx with an unparseable body → treated as an empty body
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            tracing::debug!(status = status.as_u16(), "review api request failed");
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        Ok(serde_json::from_slice(&body).ok())
    }
}

/// The typed endpoints always carry a body on success; a 2xx with no
/// parseable payload still surfaces as a plain (non-logout) error.
fn required<T>(body: Option<T>) -> Result<T, ApiError> {
    body.ok_or_else(|| {
        ApiError::new(
            ErrorKind::BadRequest,
            Some("Server returned an empty response.".into()),
        )
    })
}

#[async_trait]
impl ReviewApi for HttpApi {
    async fn register_device(&self, email: &str) -> Result<RegisteredMember, ApiError> {
        let request = self
            .http
            .post(self.endpoint_url("/api/v1/members"))
            .json(&json!({ "email": email }));
        required(self.execute(request).await?)
    }

    async fn get_devices(&self, email: &str, identifier: &str) -> Result<MemberDevices, ApiError> {
        let request = self
            .http
            .get(self.endpoint_url("/api/v1/members"))
            .query(&[("email", email), ("identifier", identifier)]);
        required(self.execute(request).await?)
    }

    async fn delete_device(
        &self,
        email: &str,
        device_identifier: &str,
        target_identifier: &str,
    ) -> Result<(), ApiError> {
        let request = self
            .http
            .delete(self.endpoint_url("/api/v1/device"))
            .json(&json!({
                "email": email,
                "deviceIdentifier": device_identifier,
                "targetDeviceIdentifier": target_identifier,
            }));
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn save_review_url(
        &self,
        identifier: &str,
        target_url: &str,
    ) -> Result<SavedReview, ApiError> {
        let request = self
            .http
            .post(self.endpoint_url("/api/v1/reviews"))
            .json(&json!({ "identifier": identifier, "targetUrl": target_url }));
        required(self.execute(request).await?)
    }
}
