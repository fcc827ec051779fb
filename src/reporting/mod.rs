//! Report arithmetic. Handlers fetch rows; everything here is pure and
//! works on `rust_decimal::Decimal` amounts and `chrono` dates.

pub mod aging;
pub mod breakdown;
pub mod series;
pub mod statements;
pub mod tax;

pub use breakdown::{percent_of, percentages, round_money};
