use crate::config::QUOTE_ASSET_SUFFIX;
use crate::error::{AppError, Result};

/// Legacy perpetual-futures marker some users still type (`BTCUSDT.P`).
const PERP_MARKER: &str = ".P";

/// Canonical form of a user-entered ticker.
///
/// Trims, uppercases and drops every character outside `[A-Z0-9.]`. A symbol
/// carrying the `.P` marker has its first occurrence removed and is otherwise
/// left alone; anything else gets the `USDT` quote appended when missing.
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let mut symbol: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '.')
        .collect();

    if symbol.is_empty() {
        return Err(AppError::InvalidInput("ticker is empty".to_string()));
    }

    if symbol.contains(PERP_MARKER) {
        symbol = symbol.replacen(PERP_MARKER, "", 1);
    } else if !symbol.ends_with(QUOTE_ASSET_SUFFIX) {
        symbol.push_str(QUOTE_ASSET_SUFFIX);
    }

    if symbol.is_empty() {
        return Err(AppError::InvalidInput("ticker is empty".to_string()));
    }
    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_quote_asset() {
        assert_eq!(normalize_symbol(" btc ").unwrap(), "BTCUSDT");
        assert_eq!(normalize_symbol("ethusdt").unwrap(), "ETHUSDT");
    }

    #[test]
    fn strips_foreign_characters() {
        assert_eq!(normalize_symbol("sol/usdt").unwrap(), "SOLUSDT");
        assert_eq!(normalize_symbol("1000-pepe").unwrap(), "1000PEPEUSDT");
    }

    #[test]
    fn perp_marker_is_removed_without_appending() {
        assert_eq!(normalize_symbol("btcusdt.p").unwrap(), "BTCUSDT");
        assert_eq!(normalize_symbol("BTC.P").unwrap(), "BTC");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(normalize_symbol("   "), Err(AppError::InvalidInput(_))));
        assert!(matches!(normalize_symbol("$$$"), Err(AppError::InvalidInput(_))));
        assert!(matches!(normalize_symbol(".p"), Err(AppError::InvalidInput(_))));
    }
}
