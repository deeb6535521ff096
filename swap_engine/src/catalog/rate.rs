use super::PriceMap;

/// Price assumed for a currency the catalog does not know (or before it
/// has loaded at all).
pub const MISSING_PRICE: f64 = 1.0;

fn price_or_default(prices: Option<&PriceMap>, currency: &str) -> f64 {
    prices
        .and_then(|prices| prices.get(currency))
        .map(|token| token.price)
        .unwrap_or(MISSING_PRICE)
}

/// How many `to` units one `from` unit buys, before fees.
pub fn exchange_rate(prices: Option<&PriceMap>, from: &str, to: &str) -> f64 {
    price_or_default(prices, from) / price_or_default(prices, to)
}

/// Value of `amount` units of `token` expressed in the anchor currency.
///
/// Unlike [`exchange_rate`] this does not assume a default price: if either
/// price is unknown, or the amount is zero, the value is `0`.
pub fn usd_value(prices: Option<&PriceMap>, anchor: &str, token: &str, amount: f64) -> f64 {
    let Some(prices) = prices else {
        return 0.0;
    };
    match (prices.get(token), prices.get(anchor)) {
        (Some(token), Some(anchor)) if amount != 0.0 => amount * token.price / anchor.price,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::price_map;
    use maplit::btreemap;

    #[test]
    fn test_rate_is_price_ratio() {
        let prices = price_map(btreemap! {"USD" => 1.0, "ETH" => 3000.0});
        assert_eq!(exchange_rate(Some(&prices), "ETH", "USD"), 3000.0);
        assert_eq!(exchange_rate(Some(&prices), "USD", "ETH"), 1.0 / 3000.0);
        assert_eq!(exchange_rate(Some(&prices), "ETH", "ETH"), 1.0);
    }

    #[test]
    fn test_missing_price_counts_as_one() {
        let prices = price_map(btreemap! {"ETH" => 3000.0});
        assert_eq!(exchange_rate(Some(&prices), "ETH", "ATOM"), 3000.0);
        assert_eq!(exchange_rate(Some(&prices), "ATOM", "ETH"), 1.0 / 3000.0);
        assert_eq!(exchange_rate(None, "ETH", "USD"), 1.0);
    }

    #[test]
    fn test_usd_value_degrades_to_zero() {
        let prices = price_map(btreemap! {"USD" => 1.0, "ETH" => 3000.0});
        assert_eq!(usd_value(Some(&prices), "USD", "ETH", 2.0), 6000.0);
        assert_eq!(usd_value(Some(&prices), "USD", "ETH", 0.0), 0.0);
        assert_eq!(usd_value(Some(&prices), "USD", "WBTC", 2.0), 0.0);
        assert_eq!(usd_value(Some(&prices), "EUR", "ETH", 2.0), 0.0);
        assert_eq!(usd_value(None, "USD", "ETH", 2.0), 0.0);
    }
}
