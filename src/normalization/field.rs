use std::num::ParseFloatError;

use crate::feed::Product;

/// Display-text cleanup: trim, then first character upper and the rest lower.
pub fn capitalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
        None => String::new(),
    }
}

/// Identifier cleanup for the natural key: trim and upper-case, never
/// capitalized like display text.
pub fn identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Round a monetary amount to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Parse a wire numeric that uses `,` as the decimal separator.
pub fn decimal_comma(raw: &str) -> Result<f64, ParseFloatError> {
    raw.trim().replace(',', ".").parse::<f64>()
}

/// Field-level normalization applied to every parsed record before it is
/// considered canonical. Pure and idempotent: applying it twice yields the
/// same record as applying it once.
pub fn normalize(mut product: Product) -> Product {
    product.stock_code = identifier(&product.stock_code);
    product.name = capitalize(&product.name);
    product.price_unit = capitalize(&product.price_unit);
    product.product_type = capitalize(&product.product_type);
    product.series = capitalize(&product.series);
    product.sample_size = product.sample_size.as_deref().map(capitalize);
    product.status = product.status.as_deref().map(capitalize);
    product.fabric = product.fabric.as_deref().map(capitalize);
    product.model_measurements = product.model_measurements.as_deref().map(capitalize);
    product.product_measurements = product.product_measurements.as_deref().map(capitalize);
    product.price = product.price.map(round4);
    product.discounted_price = product.discounted_price.map(round4);
    // Rounding can zero out a tiny discount; keep the derived flag consistent.
    product.is_discounted = product.discounted_price.is_some_and(|v| v > 0.0);
    product
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Color;
    use chrono::Utc;

    fn sample() -> Product {
        let now = Utc::now();
        Product {
            stock_code: " abc123 ".into(),
            name: "  summer DRESS ".into(),
            color: vec![Color::Red, Color::Beige],
            price: Some(123.45678),
            discounted_price: Some(100.00001),
            is_discounted: true,
            images: vec!["/img/1.jpg".into()],
            quantity: 5,
            price_unit: "USD".into(),
            product_type: "dress".into(),
            series: "1S2M2L".into(),
            sample_size: Some(" s ".into()),
            status: None,
            fabric: Some("%100 cotton".into()),
            model_measurements: None,
            product_measurements: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn capitalizes_display_text() {
        assert_eq!(capitalize("  summer DRESS "), "Summer dress");
        assert_eq!(capitalize("a"), "A");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("   "), "");
    }

    #[test]
    fn upper_cases_the_natural_key() {
        assert_eq!(identifier(" abc123 "), "ABC123");
        assert_eq!(identifier("ABC123"), "ABC123");
    }

    #[test]
    fn rounds_to_four_decimal_places() {
        assert_eq!(round4(123.45678), 123.4568);
        assert_eq!(round4(100.0), 100.0);
    }

    #[test]
    fn parses_comma_decimals() {
        assert_eq!(decimal_comma("123,4500").unwrap(), 123.45);
        assert_eq!(decimal_comma(" 5,99 ").unwrap(), 5.99);
        assert_eq!(decimal_comma("7.25").unwrap(), 7.25);
        assert!(decimal_comma("n/a").is_err());
        assert!(decimal_comma("").is_err());
    }

    #[test]
    fn normalizes_fields() {
        let normalized = normalize(sample());
        assert_eq!(normalized.stock_code, "ABC123");
        assert_eq!(normalized.name, "Summer dress");
        assert_eq!(normalized.price_unit, "Usd");
        assert_eq!(normalized.product_type, "Dress");
        assert_eq!(normalized.series, "1s2m2l");
        assert_eq!(normalized.sample_size.as_deref(), Some("S"));
        assert_eq!(normalized.fabric.as_deref(), Some("%100 cotton"));
        assert_eq!(normalized.price, Some(123.4568));
        assert_eq!(normalized.discounted_price, Some(100.0));
        assert!(normalized.is_discounted);
    }

    #[test]
    fn absent_numerics_stay_absent() {
        let mut product = sample();
        product.price = None;
        product.discounted_price = None;
        let normalized = normalize(product);
        assert_eq!(normalized.price, None);
        assert_eq!(normalized.discounted_price, None);
        assert!(!normalized.is_discounted);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize(sample());
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }
}
