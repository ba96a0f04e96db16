pub mod split;
pub mod windowing;

pub use split::{cut_index, split_by_percent, SplitError, TrainTestSplit};
pub use windowing::compute_windows;

use crate::types::PricePoint;

/// One training example: a fixed-size window of consecutive price points
/// and its label, the arithmetic mean of the window's prices.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub window: Vec<PricePoint>,
    pub label: f64,
}

impl Example {
    /// The window's prices as the model input row.
    pub fn input(&self) -> Vec<f64> {
        self.window.iter().map(|p| p.price).collect()
    }
}

/// Windowed examples in chronological order (ascending start offset).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub examples: Vec<Example>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn inputs(&self) -> Vec<Vec<f64>> {
        self.examples.iter().map(|e| e.input()).collect()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.examples.iter().map(|e| e.label).collect()
    }
}
