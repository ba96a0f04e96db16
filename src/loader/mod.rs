use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::types::{PricePoint, PriceSeries, TradeDay};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("row {row}: missing {field}")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: invalid close price {value:?}")]
    BadPrice { row: usize, value: String },
    #[error("row {row}: invalid date {value:?}, expected YYYYMMDD")]
    BadDate { row: usize, value: String },
    #[error("file contains no data rows")]
    Empty,
}

/// Raw daily row as exported (fipiran column names, newest day first).
#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "ClosePrice")]
    close_price: Option<String>,
    #[serde(rename = "GDate")]
    date: Option<String>,
    #[serde(rename = "LVal18AFC", default)]
    symbol: Option<String>,
}

/// Parsed price history plus the header metadata shown to the user.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub symbol: Option<String>,
    pub last_traded: NaiveDate,
    pub series: PriceSeries,
}

/// Load a daily price CSV and adjust close prices for split-like jumps.
///
/// The export lists the newest day first. Walking in file order, a
/// close-to-previous-close ratio above 1.1 marks a split boundary; the
/// ratio accumulates and every subsequent (older) close is divided by
/// it. Any row missing its price or date rejects the entire file.
pub fn load_price_csv(path: impl AsRef<Path>) -> Result<LoadedSeries, LoaderError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<DailyRow>().enumerate() {
        let row = record?;
        let close = non_empty(row.close_price).ok_or(LoaderError::MissingField {
            row: index,
            field: "ClosePrice",
        })?;
        let date = non_empty(row.date).ok_or(LoaderError::MissingField {
            row: index,
            field: "GDate",
        })?;

        let close = Decimal::from_str(close.trim()).map_err(|_| LoaderError::BadPrice {
            row: index,
            value: close.clone(),
        })?;
        let date = parse_compact_date(&date, index)?;
        rows.push((date, close, row.symbol));
    }

    if rows.is_empty() {
        return Err(LoaderError::Empty);
    }

    let symbol = rows[0].2.clone();
    let last_traded = rows[0].0;

    let mut points = Vec::with_capacity(rows.len());
    let mut ratio_of_price = Decimal::ZERO;
    let mut last_close = rows[0].1;
    for (index, (date, close, _)) in rows.iter().enumerate() {
        if !last_close.is_zero() && *close / last_close > dec!(1.1) {
            ratio_of_price += *close / last_close;
        }
        last_close = *close;

        let divisor = if ratio_of_price.is_zero() {
            Decimal::ONE
        } else {
            ratio_of_price
        };
        let price = (*close / divisor)
            .to_f64()
            .ok_or_else(|| LoaderError::BadPrice {
                row: index,
                value: close.to_string(),
            })?;
        points.push(PricePoint::new(*date, price));
    }

    // Export order is newest first; the pipeline wants chronological
    points.reverse();

    info!(
        rows = points.len(),
        symbol = symbol.as_deref().unwrap_or("?"),
        %last_traded,
        "loaded price series"
    );

    Ok(LoadedSeries {
        symbol,
        last_traded,
        series: PriceSeries::new(points),
    })
}

/// Load a trade-history JSON export (`V`/`MN`/`MX`/`F`/`L` per day).
pub fn load_trade_history(path: impl AsRef<Path>) -> Result<Vec<TradeDay>, LoaderError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let days: Vec<TradeDay> = serde_json::from_reader(file)?;
    if days.is_empty() {
        return Err(LoaderError::Empty);
    }
    info!(days = days.len(), "loaded trade history");
    Ok(days)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Dates arrive as `YYYYMMDD` digit strings.
fn parse_compact_date(value: &str, row: usize) -> Result<NaiveDate, LoaderError> {
    let digits = value.trim();
    let bad = || LoaderError::BadDate {
        row,
        value: value.to_string(),
    };

    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let year: i32 = digits[..4].parse().map_err(|_| bad())?;
    let month: u32 = digits[4..6].parse().map_err(|_| bad())?;
    let day: u32 = digits[6..8].parse().map_err(|_| bad())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)
}
