// Battery domain model - Home battery status as reported by the inverter
use serde::Deserialize;
use std::fmt;

/// Power (W) below which the battery counts as idle.
const ACTIVITY_THRESHOLD_W: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryActivity {
    Charging,
    Discharging,
    Idle,
}

impl BatteryActivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryActivity::Charging => "charging",
            BatteryActivity::Discharging => "discharging",
            BatteryActivity::Idle => "idle",
        }
    }
}

impl fmt::Display for BatteryActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown_status() -> String {
    "unknown".to_string()
}

/// Status document of the battery's local API. Missing readings default to zero.
#[derive(Debug, Clone, Deserialize)]
pub struct BatteryStatus {
    /// User state of charge (%)
    #[serde(rename = "USOC", default)]
    pub soc: f64,
    #[serde(rename = "Production_W", default)]
    pub production_w: f64,
    #[serde(rename = "Consumption_W", default)]
    pub consumption_w: f64,
    /// Positive means export
    #[serde(rename = "GridFeedIn_W", default)]
    pub grid_feed_in_w: f64,
    /// Positive means import; absent on older firmware
    #[serde(rename = "GridPurchase_W", default)]
    pub grid_purchase_w: f64,
    /// Positive means discharge, negative means charge
    #[serde(rename = "Pac_total_W", default)]
    pub pac_total_w: f64,
    #[serde(rename = "SystemStatus", default = "unknown_status")]
    pub system_status: String,
}

impl BatteryStatus {
    pub fn charging_w(&self) -> f64 {
        f64::max(0.0, -self.pac_total_w)
    }

    pub fn discharging_w(&self) -> f64 {
        f64::max(0.0, self.pac_total_w)
    }

    pub fn activity(&self) -> BatteryActivity {
        if self.charging_w() > ACTIVITY_THRESHOLD_W {
            BatteryActivity::Charging
        } else if self.discharging_w() > ACTIVITY_THRESHOLD_W {
            BatteryActivity::Discharging
        } else {
            BatteryActivity::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(pac_total_w: f64) -> BatteryStatus {
        serde_json::from_value(serde_json::json!({ "Pac_total_W": pac_total_w })).unwrap()
    }

    #[test]
    fn test_missing_fields_default() {
        let status: BatteryStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status.soc, 0.0);
        assert_eq!(status.grid_purchase_w, 0.0);
        assert_eq!(status.system_status, "unknown");
    }

    #[test]
    fn test_power_split() {
        let charging = status(-1200.0);
        assert_eq!(charging.charging_w(), 1200.0);
        assert_eq!(charging.discharging_w(), 0.0);

        let discharging = status(800.0);
        assert_eq!(discharging.charging_w(), 0.0);
        assert_eq!(discharging.discharging_w(), 800.0);
    }

    #[test]
    fn test_activity_thresholds() {
        assert_eq!(status(-51.0).activity(), BatteryActivity::Charging);
        assert_eq!(status(51.0).activity(), BatteryActivity::Discharging);
        assert_eq!(status(50.0).activity(), BatteryActivity::Idle);
        assert_eq!(status(-50.0).activity(), BatteryActivity::Idle);
        assert_eq!(status(0.0).activity(), BatteryActivity::Idle);
    }
}
