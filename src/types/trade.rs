use serde::{Deserialize, Serialize};

/// One day from a trade-history JSON export.
///
/// Field names mirror the export's keys: volume, min price, max price,
/// first traded price and last traded price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeDay {
    #[serde(rename = "V")]
    pub volume: f64,
    #[serde(rename = "MN")]
    pub min_price: f64,
    #[serde(rename = "MX")]
    pub max_price: f64,
    #[serde(rename = "F")]
    pub first_price: f64,
    #[serde(rename = "L")]
    pub last_price: f64,
}

impl TradeDay {
    pub const NUM_FEATURES: usize = 4;

    /// Feature vector used to predict the next day's last price.
    pub fn to_features(&self) -> [f64; Self::NUM_FEATURES] {
        [self.volume, self.min_price, self.max_price, self.first_price]
    }
}
