use serde::{Deserialize, Serialize};

/// Per-period delivery statistics, replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierStatistics {
    pub deliveries_today: u32,
    pub deliveries_week: u32,
    pub deliveries_month: u32,
    pub earnings_today: f64,
    pub earnings_week: f64,
    pub earnings_month: f64,
    pub distance_today_km: f64,
    pub distance_week_km: f64,
    pub distance_month_km: f64,
    pub active_time_minutes: u32,
    pub average_rating_period: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earnings {
    pub total: f64,
    pub today: f64,
    pub week: f64,
    pub month: f64,
}
