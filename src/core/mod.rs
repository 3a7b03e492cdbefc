//! Core VAT types and errors shared by the rate, VIES and calculation modules.

pub mod countries;
mod error;
mod types;

pub use countries::{is_eu, normalize_country};
pub use error::*;
pub use types::*;
