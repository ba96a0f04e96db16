use chrono::NaiveDate;
use thiserror::Error;

use crate::types::PricePoint;

use super::Dataset;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplitError {
    #[error("split percent must be within [0, 100], got {0}")]
    InvalidPercent(f64),
    #[error("dataset has {dataset_len} examples but the series yields {timestamps_len} aligned timestamps")]
    Misaligned {
        dataset_len: usize,
        timestamps_len: usize,
    },
}

/// Index of the first holdout element for a `percent` training prefix.
pub fn cut_index(len: usize, percent: f64) -> Result<usize, SplitError> {
    if !(0.0..=100.0).contains(&percent) || percent.is_nan() {
        return Err(SplitError::InvalidPercent(percent));
    }
    Ok((percent / 100.0 * len as f64).floor() as usize)
}

/// Split a sequence into a training prefix of `floor(percent/100 * len)`
/// elements and a holdout suffix of the remainder.
pub fn split_by_percent<T>(items: &[T], percent: f64) -> Result<(&[T], &[T]), SplitError> {
    let cut = cut_index(items.len(), percent)?;
    Ok(items.split_at(cut))
}

/// A dataset partitioned at a single cut point, with the timestamp
/// sequence that aligns each example to its plotting date.
///
/// The cut index is computed once and applied identically to inputs,
/// labels and timestamps. The aligned timestamp for example `i` is the
/// source series date at `i + window_size - 1` (the last day inside the
/// window), which yields exactly one timestamp per example.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub cut: usize,
    pub train_inputs: Vec<Vec<f64>>,
    pub holdout_inputs: Vec<Vec<f64>>,
    pub train_labels: Vec<f64>,
    pub holdout_labels: Vec<f64>,
    pub train_timestamps: Vec<NaiveDate>,
    pub holdout_timestamps: Vec<NaiveDate>,
}

impl TrainTestSplit {
    pub fn new(
        dataset: &Dataset,
        series: &[PricePoint],
        window_size: usize,
        percent: f64,
    ) -> Result<Self, SplitError> {
        let timestamps = aligned_timestamps(series, window_size);
        if timestamps.len() != dataset.len() {
            return Err(SplitError::Misaligned {
                dataset_len: dataset.len(),
                timestamps_len: timestamps.len(),
            });
        }

        let cut = cut_index(dataset.len(), percent)?;
        let inputs = dataset.inputs();
        let labels = dataset.labels();

        let (train_inputs, holdout_inputs) = split_owned(inputs, cut);
        let (train_labels, holdout_labels) = split_owned(labels, cut);
        let (train_timestamps, holdout_timestamps) = split_owned(timestamps, cut);

        Ok(Self {
            cut,
            train_inputs,
            holdout_inputs,
            train_labels,
            holdout_labels,
            train_timestamps,
            holdout_timestamps,
        })
    }
}

/// One plotting date per windowed example: the series timestamps from
/// index `window_size - 1` onward.
pub fn aligned_timestamps(series: &[PricePoint], window_size: usize) -> Vec<NaiveDate> {
    if window_size == 0 || window_size > series.len() {
        return Vec::new();
    }
    series[window_size - 1..]
        .iter()
        .map(|p| p.timestamp)
        .collect()
}

fn split_owned<T>(mut items: Vec<T>, cut: usize) -> (Vec<T>, Vec<T>) {
    let suffix = items.split_off(cut);
    (items, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::compute_windows;
    use chrono::NaiveDate;

    fn series(n: usize) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        (0..n)
            .map(|i| PricePoint::new(start + chrono::Days::new(i as u64), (i + 1) as f64))
            .collect()
    }

    #[test]
    fn test_split_lengths_sum() {
        let items: Vec<usize> = (0..100).collect();
        for p in [0.0, 10.0, 33.0, 50.0, 70.0, 99.0, 100.0] {
            let (prefix, suffix) = split_by_percent(&items, p).unwrap();
            assert_eq!(prefix.len() + suffix.len(), items.len());
            assert_eq!(prefix.len(), (p / 100.0 * 100.0).floor() as usize);
        }
    }

    #[test]
    fn test_seventy_thirty() {
        let items: Vec<usize> = (0..100).collect();
        let (prefix, suffix) = split_by_percent(&items, 70.0).unwrap();
        assert_eq!(prefix.len(), 70);
        assert_eq!(suffix.len(), 30);
        assert_eq!(prefix.last(), Some(&69));
        assert_eq!(suffix.first(), Some(&70));
    }

    #[test]
    fn test_invalid_percent_rejected() {
        let items = [1, 2, 3];
        assert!(matches!(
            split_by_percent(&items, -0.1),
            Err(SplitError::InvalidPercent(_))
        ));
        assert!(matches!(
            split_by_percent(&items, 100.5),
            Err(SplitError::InvalidPercent(_))
        ));
        assert!(matches!(
            split_by_percent(&items, f64::NAN),
            Err(SplitError::InvalidPercent(_))
        ));
    }

    #[test]
    fn test_cut_floor_on_uneven_lengths() {
        // 70% of 51 = 35.7 -> 35
        assert_eq!(cut_index(51, 70.0).unwrap(), 35);
        assert_eq!(cut_index(0, 70.0).unwrap(), 0);
    }

    #[test]
    fn test_aligned_timestamps_match_example_count() {
        let s = series(60);
        let ds = compute_windows(&s, 15);
        let ts = aligned_timestamps(&s, 15);
        assert_eq!(ts.len(), ds.len());
        // first example's date is the last day of the first window
        assert_eq!(ts[0], s[14].timestamp);
    }

    #[test]
    fn test_train_test_split_uses_one_cut() {
        let s = series(60);
        let ds = compute_windows(&s, 10);
        let split = TrainTestSplit::new(&ds, &s, 10, 70.0).unwrap();

        assert_eq!(split.cut, (0.7 * ds.len() as f64).floor() as usize);
        assert_eq!(split.train_inputs.len(), split.cut);
        assert_eq!(split.train_labels.len(), split.cut);
        assert_eq!(split.train_timestamps.len(), split.cut);
        assert_eq!(
            split.holdout_inputs.len() + split.train_inputs.len(),
            ds.len()
        );
        assert_eq!(split.holdout_labels.len(), split.holdout_inputs.len());
        assert_eq!(split.holdout_timestamps.len(), split.holdout_inputs.len());
    }
}
