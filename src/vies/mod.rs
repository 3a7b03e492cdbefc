//! EU VIES VAT number validation.
//!
//! # Example
//!
//! ```ignore
//! use eurovat::vies::ViesClient;
//!
//! let client = ViesClient::new(&config.vies, store.clone())?;
//! let result = client.validate("DE123456789").await?;
//! if result.valid {
//!     println!("{}", result.name.unwrap_or_default());
//! }
//! ```

mod client;
mod format;
mod soap;

pub use client::{ViesClient, ViesResult};
pub use format::{MIN_VAT_NUMBER_LEN, normalize_vat_number, split_vat_number};
pub use soap::{CheckVatResponse, check_vat_request, parse_check_vat_response};
