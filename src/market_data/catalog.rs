use std::collections::HashMap;

use crate::config::{QUOTE_ASSET_SUFFIX, SUGGEST_MAX_RESULTS, SUGGEST_MIN_QUERY_LEN, TRADING_STATUS};
use crate::exchange::messages::SymbolInfo;
use crate::types::{InstrumentInfo, Market};

/// symbol → instrument. A symbol appears under one market at a time.
pub type Catalog = HashMap<String, InstrumentInfo>;

/// Built-in list used when neither catalog request succeeds.
/// Applied in order, so a later entry for the same symbol replaces an earlier
/// one; the futures entries therefore win for symbols listed twice.
const FALLBACK_INSTRUMENTS: &[(&str, &str, Market)] = &[
    ("BTCUSDT", "Bitcoin", Market::Spot),
    ("ETHUSDT", "Ethereum", Market::Spot),
    ("BNBUSDT", "Binance Coin", Market::Spot),
    ("SOLUSDT", "Solana", Market::Spot),
    ("XRPUSDT", "Ripple", Market::Spot),
    ("ADAUSDT", "Cardano", Market::Spot),
    ("DOGEUSDT", "Dogecoin", Market::Spot),
    ("DOTUSDT", "Polkadot", Market::Spot),
    ("SHIBUSDT", "Shiba Inu", Market::Spot),
    ("MATICUSDT", "Polygon", Market::Spot),
    ("BTCUSDT", "Bitcoin Futures", Market::Futures),
    ("ETHUSDT", "Ethereum Futures", Market::Futures),
    ("SOLUSDT", "Solana Futures", Market::Futures),
    ("XRPUSDT", "Ripple Futures", Market::Futures),
    ("ADAUSDT", "Cardano Futures", Market::Futures),
    ("LINKUSDT", "Chainlink", Market::Spot),
    ("AVAXUSDT", "Avalanche", Market::Spot),
    ("LTCUSDT", "Litecoin", Market::Spot),
    ("ATOMUSDT", "Cosmos", Market::Spot),
    ("UNIUSDT", "Uniswap", Market::Spot),
    ("LINKUSDT", "Chainlink Futures", Market::Futures),
    ("AVAXUSDT", "Avalanche Futures", Market::Futures),
    ("LTCUSDT", "Litecoin Futures", Market::Futures),
    ("ATOMUSDT", "Cosmos Futures", Market::Futures),
    ("UNIUSDT", "Uniswap Futures", Market::Futures),
];

pub fn fallback_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    for &(symbol, name, market) in FALLBACK_INSTRUMENTS {
        catalog.insert(
            symbol.to_string(),
            InstrumentInfo {
                display_name: name.to_string(),
                market,
            },
        );
    }
    catalog
}

/// Insert every trading, USDT-quoted instrument into `catalog` under `market`,
/// overwriting existing entries. Returns the number of instruments accepted.
pub fn merge_symbols(catalog: &mut Catalog, symbols: &[SymbolInfo], market: Market) -> usize {
    let mut accepted = 0;
    for s in symbols {
        if s.status != TRADING_STATUS || !s.symbol.ends_with(QUOTE_ASSET_SUFFIX) {
            continue;
        }
        let display_name = if s.base_asset.is_empty() {
            base_name(&s.symbol)
        } else {
            s.base_asset.clone()
        };
        catalog.insert(s.symbol.clone(), InstrumentInfo { display_name, market });
        accepted += 1;
    }
    accepted
}

/// Symbols containing `query` (case-insensitive), alphabetical, at most
/// `SUGGEST_MAX_RESULTS`. Queries shorter than `SUGGEST_MIN_QUERY_LEN` after
/// trimming match nothing.
pub fn search(catalog: &Catalog, query: &str) -> Vec<(String, InstrumentInfo)> {
    let needle = query.trim().to_uppercase();
    if needle.chars().count() < SUGGEST_MIN_QUERY_LEN {
        return Vec::new();
    }
    let mut hits: Vec<(&String, &InstrumentInfo)> =
        catalog.iter().filter(|(symbol, _)| symbol.contains(&needle)).collect();
    hits.sort_by(|a, b| a.0.cmp(b.0));
    hits.into_iter()
        .take(SUGGEST_MAX_RESULTS)
        .map(|(symbol, info)| (symbol.clone(), info.clone()))
        .collect()
}

/// `BTCUSDT` → `BTC`. Used as the display name when nothing better is known.
pub fn base_name(symbol: &str) -> String {
    symbol
        .strip_suffix(QUOTE_ASSET_SUFFIX)
        .filter(|s| !s.is_empty())
        .unwrap_or(symbol)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(symbol: &str, status: &str, base: &str) -> SymbolInfo {
        SymbolInfo {
            symbol: symbol.to_string(),
            status: status.to_string(),
            base_asset: base.to_string(),
        }
    }

    #[test]
    fn fallback_entries_are_well_formed() {
        let catalog = fallback_catalog();
        assert!(catalog.len() >= 15 && catalog.len() <= 20, "len={}", catalog.len());
        for (symbol, info) in &catalog {
            assert!(symbol.ends_with("USDT"), "{symbol}");
            assert!(matches!(info.market, Market::Spot | Market::Futures));
            assert!(!info.display_name.is_empty(), "{symbol} has empty name");
        }
    }

    #[test]
    fn fallback_duplicates_resolve_to_futures() {
        let catalog = fallback_catalog();
        assert_eq!(catalog["BTCUSDT"].market, Market::Futures);
        assert_eq!(catalog["BTCUSDT"].display_name, "Bitcoin Futures");
        assert_eq!(catalog["BNBUSDT"].market, Market::Spot);
    }

    #[test]
    fn merge_filters_status_and_quote_asset() {
        let mut catalog = Catalog::new();
        let n = merge_symbols(
            &mut catalog,
            &[
                sym("BTCUSDT", "TRADING", "BTC"),
                sym("ETHBTC", "TRADING", "ETH"),
                sym("LUNAUSDT", "BREAK", "LUNA"),
            ],
            Market::Spot,
        );
        assert_eq!(n, 1);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog["BTCUSDT"].display_name, "BTC");
    }

    #[test]
    fn later_merge_overwrites_same_symbol() {
        let mut catalog = Catalog::new();
        merge_symbols(&mut catalog, &[sym("BTCUSDT", "TRADING", "BTC")], Market::Spot);
        merge_symbols(&mut catalog, &[sym("BTCUSDT", "TRADING", "BTC")], Market::Futures);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog["BTCUSDT"].market, Market::Futures);
    }

    #[test]
    fn search_needs_two_characters() {
        let catalog = fallback_catalog();
        assert!(search(&catalog, "b").is_empty());
        assert!(search(&catalog, "  e ").is_empty());
        assert!(!search(&catalog, "bt").is_empty());
    }

    #[test]
    fn search_matches_substring_case_insensitively() {
        let catalog = fallback_catalog();
        let hits = search(&catalog, "ada");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "ADAUSDT");
        assert_eq!(hits[0].1.market, Market::Futures);
        assert!(search(&catalog, "zzz").is_empty());
    }

    #[test]
    fn search_caps_results_in_symbol_order() {
        let mut catalog = Catalog::new();
        let symbols: Vec<SymbolInfo> = (0..15).map(|i| sym(&format!("T{i:02}USDT"), "TRADING", "")).collect();
        merge_symbols(&mut catalog, &symbols, Market::Spot);

        let hits = search(&catalog, "usdt");
        assert_eq!(hits.len(), 10);
        assert_eq!(hits[0].0, "T00USDT");
        assert_eq!(hits[9].0, "T09USDT");
    }

    #[test]
    fn base_name_strips_quote_suffix() {
        assert_eq!(base_name("PEPEUSDT"), "PEPE");
        assert_eq!(base_name("USDT"), "USDT");
        assert_eq!(base_name("BTC"), "BTC");
    }
}
