use crate::types::PricePoint;

use super::{Dataset, Example};

/// Slide a fixed-size window over the series and emit one example per
/// start offset, labeled with the window's simple moving average.
///
/// A window larger than the series produces an empty dataset rather than
/// an error; a window equal to the series length produces exactly one
/// example. Pure function: the source series is never mutated.
pub fn compute_windows(series: &[PricePoint], window_size: usize) -> Dataset {
    let mut examples = Vec::new();
    if window_size == 0 || window_size > series.len() {
        return Dataset { examples };
    }

    for start in 0..=(series.len() - window_size) {
        let window = &series[start..start + window_size];
        let sum: f64 = window.iter().map(|p| p.price).sum();
        let avg = sum / window_size as f64;
        examples.push(Example {
            window: window.to_vec(),
            label: avg,
        });
    }

    Dataset { examples }
}
