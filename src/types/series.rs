use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of adjusted close-price history.
///
/// `price` is the close price divided by the accumulated split ratio
/// detected while loading, so a 5x split does not show up as an 80% crash.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: NaiveDate, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Chronologically ordered price history (oldest first).
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn last_n(&self, n: usize) -> &[PricePoint] {
        let len = self.points.len();
        if n >= len {
            &self.points[..]
        } else {
            &self.points[len - n..]
        }
    }
}

impl std::ops::Deref for PriceSeries {
    type Target = [PricePoint];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}
