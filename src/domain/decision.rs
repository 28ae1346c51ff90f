// Decision domain model - Price-driven battery mode selection
use serde::Serialize;
use std::fmt;

/// Minimum P75 - P25 spread (ct/kWh) before charging or discharging is worth it.
pub const MIN_SPREAD_CT: f64 = 8.0;
pub const TARGET_POWER_W: i64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Charge,
    Discharge,
    Hold,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Charge => "CHARGE",
            Mode::Discharge => "DISCHARGE",
            Mode::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionResult {
    pub mode: Mode,
    pub target_w: i64,
    pub reason: String,
}

impl DecisionResult {
    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            mode: Mode::Hold,
            target_w: 0,
            reason: reason.into(),
        }
    }
}

impl Default for DecisionResult {
    fn default() -> Self {
        Self::hold("initial state")
    }
}

/// Linear interpolation between closest ranks. `sorted` must be ascending.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        len => {
            let idx = (len - 1) as f64 * q;
            let lo = idx as usize;
            let hi = usize::min(lo + 1, len - 1);
            let frac = idx - lo as f64;
            Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
        }
    }
}

/// Pick a battery mode from the current price and today's sorted price forecast.
pub fn decide(current_price: Option<f64>, today_prices: &[f64]) -> DecisionResult {
    let Some(price) = current_price else {
        return DecisionResult::hold("missing current price");
    };

    let (Some(p25), Some(p75)) = (percentile(today_prices, 0.25), percentile(today_prices, 0.75))
    else {
        return DecisionResult::hold("missing today forecast");
    };
    let spread = p75 - p25;

    if price <= p25 && spread >= MIN_SPREAD_CT {
        DecisionResult {
            mode: Mode::Charge,
            target_w: TARGET_POWER_W,
            reason: format!("price={price:.2}<=P25={p25:.2}, spread={spread:.2}ct"),
        }
    } else if price >= p75 && spread >= MIN_SPREAD_CT {
        DecisionResult {
            mode: Mode::Discharge,
            target_w: TARGET_POWER_W,
            reason: format!("price={price:.2}>=P75={p75:.2}, spread={spread:.2}ct"),
        }
    } else {
        DecisionResult::hold(format!(
            "price={price:.2}, P25={p25:.2}, P75={p75:.2}, spread={spread:.2}ct"
        ))
    }
}
