pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::courier::{CourierProfile, ProfileUpdate};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::statistics::{CourierStatistics, Earnings};

/// Error envelope the backend attaches to non-2xx responses. Every field is
/// optional; anything unrecognized is ignored rather than failing the parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorPayload {
    pub error: Option<String>,
    pub code: Option<String>,
    pub detail: Option<String>,
    pub status: Option<String>,
    pub action_required: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The server answered with a failure status, possibly carrying a
    /// structured error body.
    #[error("api error (http {status})")]
    Api {
        status: u16,
        payload: Option<ErrorPayload>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            GatewayError::Api { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    /// Server-provided detail text, or the given fallback when the failure
    /// carried no usable body.
    pub fn detail_or(&self, fallback: &str) -> String {
        self.payload()
            .and_then(|payload| payload.detail.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Network-facing collaborator performing every remote call the courier core
/// needs. The store owns no transport details; swapping implementations
/// (HTTP, stubs in tests) happens behind this trait.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn get_profile(&self) -> Result<CourierProfile, GatewayError>;

    async fn update_profile(&self, update: &ProfileUpdate)
        -> Result<CourierProfile, GatewayError>;

    async fn get_available_deliveries(&self) -> Result<Vec<Delivery>, GatewayError>;

    async fn get_nearby_deliveries(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
    ) -> Result<Vec<Delivery>, GatewayError>;

    async fn accept_delivery(&self, id: &str) -> Result<Delivery, GatewayError>;

    async fn reject_delivery(&self, id: &str, reason: Option<&str>) -> Result<(), GatewayError>;

    async fn update_delivery_status(
        &self,
        id: &str,
        status: DeliveryStatus,
    ) -> Result<Delivery, GatewayError>;

    async fn update_position(&self, latitude: f64, longitude: f64) -> Result<(), GatewayError>;

    async fn get_statistics(&self) -> Result<CourierStatistics, GatewayError>;

    async fn get_earnings(&self) -> Result<Earnings, GatewayError>;
}
