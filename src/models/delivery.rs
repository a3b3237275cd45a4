use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::courier::Address;

/// Lifecycle states of an accepted delivery, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Accepted,
    PickedUp,
    AtDeliveryLocation,
    Delivered,
}

impl DeliveryStatus {
    pub fn rank(self) -> u8 {
        match self {
            DeliveryStatus::Accepted => 0,
            DeliveryStatus::PickedUp => 1,
            DeliveryStatus::AtDeliveryLocation => 2,
            DeliveryStatus::Delivered => 3,
        }
    }

    /// Display-only completion fraction. Carries no transition authority.
    pub fn progress(self) -> f64 {
        match self {
            DeliveryStatus::Accepted => 0.2,
            DeliveryStatus::PickedUp => 0.6,
            DeliveryStatus::AtDeliveryLocation => 0.8,
            DeliveryStatus::Delivered => 1.0,
        }
    }

    /// Whether moving from `prev` to `self` strictly advances the lifecycle.
    /// Used to flag suspicious server responses, not to reject them.
    pub fn is_forward_from(self, prev: DeliveryStatus) -> bool {
        self.rank() > prev.rank()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: String,
    pub restaurant_id: String,
    pub customer_id: String,
    pub pickup_address: Address,
    pub delivery_address: Address,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub delivery_fee: f64,
    pub status: DeliveryStatus,
    /// Advisory estimates for display; ignored by all lifecycle logic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_min: Option<u32>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus;

    #[test]
    fn progress_fractions_match_display_contract() {
        assert_eq!(DeliveryStatus::Accepted.progress(), 0.2);
        assert_eq!(DeliveryStatus::PickedUp.progress(), 0.6);
        assert_eq!(DeliveryStatus::AtDeliveryLocation.progress(), 0.8);
        assert_eq!(DeliveryStatus::Delivered.progress(), 1.0);
    }

    #[test]
    fn wire_strings_are_snake_case() {
        let encoded = serde_json::to_string(&DeliveryStatus::AtDeliveryLocation).unwrap();
        assert_eq!(encoded, "\"at_delivery_location\"");

        let decoded: DeliveryStatus = serde_json::from_str("\"picked_up\"").unwrap();
        assert_eq!(decoded, DeliveryStatus::PickedUp);
    }

    #[test]
    fn forward_check_rejects_backward_and_same_rank() {
        assert!(DeliveryStatus::PickedUp.is_forward_from(DeliveryStatus::Accepted));
        assert!(DeliveryStatus::Delivered.is_forward_from(DeliveryStatus::Accepted));
        assert!(!DeliveryStatus::Accepted.is_forward_from(DeliveryStatus::PickedUp));
        assert!(!DeliveryStatus::PickedUp.is_forward_from(DeliveryStatus::PickedUp));
    }
}
