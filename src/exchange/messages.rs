use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::types::{Candle, Ticker24h};

/// `exchangeInfo` response; only the symbol list is used.
#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

/// One instrument descriptor from `exchangeInfo`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub base_asset: String,
}

/// `ticker/price` → `{"symbol": "...", "price": "123.45"}`.
/// The price must be present, a string, and parse to a finite number.
pub fn parse_price_payload(v: &Value) -> Result<f64> {
    let raw = v
        .get("price")
        .ok_or_else(|| AppError::MalformedPayload("missing price field".to_string()))?
        .as_str()
        .ok_or_else(|| AppError::MalformedPayload("price is not a string".to_string()))?;
    parse_decimal_str(raw, "price")
}

/// `ticker/24hr` → `{"lastPrice": "...", "priceChangePercent": "..."}`.
pub fn parse_ticker_24h_payload(v: &Value) -> Result<Ticker24h> {
    let field = |name: &str| -> Result<f64> {
        let raw = v
            .get(name)
            .and_then(|x| x.as_str())
            .ok_or_else(|| AppError::MalformedPayload(format!("missing {name}")))?;
        parse_decimal_str(raw, name)
    };
    Ok(Ticker24h {
        last_price: field("lastPrice")?,
        price_change_percent: field("priceChangePercent")?,
    })
}

/// `klines` → array of fixed-width arrays:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`, prices as strings.
pub fn parse_klines_payload(v: &Value) -> Result<Vec<Candle>> {
    let rows = v
        .as_array()
        .ok_or_else(|| AppError::MalformedPayload("klines response is not an array".to_string()))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let cols = row
                .as_array()
                .ok_or_else(|| AppError::MalformedPayload(format!("kline {i} is not an array")))?;
            parse_kline_row(cols)
                .map_err(|e| AppError::MalformedPayload(format!("kline {i}: {e}")))
        })
        .collect()
}

fn parse_kline_row(cols: &[Value]) -> Result<Candle> {
    if cols.len() < 6 {
        return Err(AppError::MalformedPayload(format!(
            "expected at least 6 columns, got {}",
            cols.len()
        )));
    }

    let open_time_ms = cols[0]
        .as_i64()
        .ok_or_else(|| AppError::MalformedPayload("open time is not an integer".to_string()))?;

    let price_at = |idx: usize, name: &str| -> Result<f64> {
        let raw = cols[idx]
            .as_str()
            .ok_or_else(|| AppError::MalformedPayload(format!("{name} is not a string")))?;
        parse_decimal_str(raw, name)
    };

    Ok(Candle {
        open_time_ms,
        open: price_at(1, "open")?,
        high: price_at(2, "high")?,
        low: price_at(3, "low")?,
        close: price_at(4, "close")?,
        volume: price_at(5, "volume")?,
    })
}

fn parse_decimal_str(raw: &str, name: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(AppError::MalformedPayload(format!("{name} is not numeric: {raw:?}"))),
    }
}
