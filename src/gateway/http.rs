use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::Config;
use crate::error::StoreError;
use crate::gateway::{DeliveryGateway, ErrorPayload, GatewayError};
use crate::models::courier::{CourierProfile, ProfileUpdate};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::statistics::{CourierStatistics, Earnings};

/// Backend routes, relative to the configured base URL.
mod routes {
    pub const PROFILE: &str = "livreurs/me/";
    pub const UPDATE_PROFILE: &str = "livreurs/update_profile/";
    pub const AVAILABLE_DELIVERIES: &str = "livreurs/commandes_disponibles/";
    pub const ACCEPT_DELIVERY: &str = "livreurs/accepter_commande/";
    pub const REJECT_DELIVERY: &str = "livreurs/rejeter_commande/";
    pub const DELIVERY_STATUS: &str = "livreurs/update_status/";
    pub const UPDATE_POSITION: &str = "livreurs/update_position/";
    pub const STATISTICS: &str = "livreurs/statistiques/";
    pub const EARNINGS: &str = "livreurs/revenus/";
}

/// Reqwest-backed gateway speaking the courier backend's REST routes.
///
/// Authentication headers are the session collaborator's responsibility:
/// callers hand over a `reqwest::Client` already carrying them.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    default_radius_km: f64,
}

impl HttpGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            default_radius_km: 10.0,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| StoreError::Config(format!("http client: {err}")))?;

        let mut gateway = Self::new(client, config.gateway_base_url.clone());
        gateway.default_radius_km = config.default_radius_km;
        Ok(gateway)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let response = Self::check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }

    /// Turns a non-2xx response into `GatewayError::Api`, parsing the error
    /// envelope when the body is JSON and ignoring it otherwise.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let payload = response
            .bytes()
            .await
            .ok()
            .and_then(|body| serde_json::from_slice::<ErrorPayload>(&body).ok());

        Err(GatewayError::Api {
            status: status.as_u16(),
            payload,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        Self::decode(response).await
    }

    async fn post_unit(&self, path: &str, body: &serde_json::Value) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl DeliveryGateway for HttpGateway {
    async fn get_profile(&self) -> Result<CourierProfile, GatewayError> {
        self.get(routes::PROFILE).await
    }

    async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<CourierProfile, GatewayError> {
        let response = self
            .client
            .put(self.url(routes::UPDATE_PROFILE))
            .json(update)
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        Self::decode(response).await
    }

    async fn get_available_deliveries(&self) -> Result<Vec<Delivery>, GatewayError> {
        self.get(routes::AVAILABLE_DELIVERIES).await
    }

    async fn get_nearby_deliveries(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
    ) -> Result<Vec<Delivery>, GatewayError> {
        let radius = radius_km.unwrap_or(self.default_radius_km);
        let path = format!(
            "{}?latitude={latitude}&longitude={longitude}&radius={radius}",
            routes::AVAILABLE_DELIVERIES
        );
        self.get(&path).await
    }

    async fn accept_delivery(&self, id: &str) -> Result<Delivery, GatewayError> {
        self.post_json(routes::ACCEPT_DELIVERY, &json!({ "commande_id": id }))
            .await
    }

    async fn reject_delivery(&self, id: &str, reason: Option<&str>) -> Result<(), GatewayError> {
        self.post_unit(
            routes::REJECT_DELIVERY,
            &json!({ "commande_id": id, "reason": reason }),
        )
        .await
    }

    async fn update_delivery_status(
        &self,
        id: &str,
        status: DeliveryStatus,
    ) -> Result<Delivery, GatewayError> {
        self.post_json(
            routes::DELIVERY_STATUS,
            &json!({ "commande_id": id, "status": status }),
        )
        .await
    }

    async fn update_position(&self, latitude: f64, longitude: f64) -> Result<(), GatewayError> {
        self.post_unit(
            routes::UPDATE_POSITION,
            &json!({ "latitude": latitude, "longitude": longitude }),
        )
        .await
    }

    async fn get_statistics(&self) -> Result<CourierStatistics, GatewayError> {
        self.get(routes::STATISTICS).await
    }

    async fn get_earnings(&self) -> Result<Earnings, GatewayError> {
        self.get(routes::EARNINGS).await
    }
}
