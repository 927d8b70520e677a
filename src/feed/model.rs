use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed color vocabulary for the vendor feed.
///
/// The wire tokens are a mix of English and Turkish (`Bej`, `Turuncu`,
/// `Sarı`, `Ekru`, `Vizon`); both spellings parse, the canonical English
/// name is what gets stored. Anything outside this set rejects the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Color {
    Beige,
    Orange,
    Red,
    Blue,
    Green,
    Yellow,
    Ecru,
    Mink,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Beige => "Beige",
            Color::Orange => "Orange",
            Color::Red => "Red",
            Color::Blue => "Blue",
            Color::Green => "Green",
            Color::Yellow => "Yellow",
            Color::Ecru => "Ecru",
            Color::Mink => "Mink",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized color token {0:?}")]
pub struct UnknownColor(pub String);

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim();
        match token.to_lowercase().as_str() {
            "beige" | "bej" => Ok(Color::Beige),
            "orange" | "turuncu" => Ok(Color::Orange),
            "red" => Ok(Color::Red),
            "blue" => Ok(Color::Blue),
            "green" => Ok(Color::Green),
            "yellow" | "sarı" => Ok(Color::Yellow),
            "ecru" | "ekru" => Ok(Color::Ecru),
            "mink" | "vizon" => Ok(Color::Mink),
            _ => Err(UnknownColor(token.to_string())),
        }
    }
}

/// One product record from the vendor catalog, keyed by `stock_code`.
///
/// Serialized field names are camelCase to match the document shape the
/// store has always used (`stockCode`, `discountedPrice`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub stock_code: String,
    pub name: String,
    pub color: Vec<Color>,
    pub price: Option<f64>,
    pub discounted_price: Option<f64>,
    pub is_discounted: bool,
    pub images: Vec<String>,
    pub quantity: i64,
    pub price_unit: String,
    pub product_type: String,
    pub series: String,
    pub sample_size: Option<String>,
    pub status: Option<String>,
    pub fabric: Option<String>,
    pub model_measurements: Option<String>,
    pub product_measurements: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog element that failed required-field or vocabulary validation.
/// Carries the serialized source element for operator diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub reason: String,
    pub source: String,
}
