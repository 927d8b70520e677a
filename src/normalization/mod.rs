pub mod field;

pub use field::{capitalize, decimal_comma, identifier, normalize, round4};
