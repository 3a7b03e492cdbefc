//! # eurovat
//!
//! VAT calculation for EU e-commerce: member-state rate tables kept current
//! by a daily sync, VIES VAT-number validation for B2B reverse charge, and
//! per-line and per-cart tax breakdowns.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Amounts are rounded to cents with halves away from zero.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use eurovat::config::ViesConfig;
//! use eurovat::rates::RateCache;
//! use eurovat::service::VatService;
//! use eurovat::store::MemoryStore;
//! use eurovat::vies::ViesClient;
//! use eurovat::*;
//! use rust_decimal_macros::dec;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), VatError> {
//! let store = Arc::new(MemoryStore::with_settings(StoreVatSettings {
//!     vat_enabled: true,
//!     vat_country_code: "DE".into(),
//!     vat_prices_include_vat: true,
//!     vat_default_category: VatCategory::Standard,
//!     vat_b2b_reverse_charge_enabled: true,
//! }));
//!
//! let cache = Arc::new(RateCache::new());
//! cache.load(&[VatRate {
//!     id: 1,
//!     country_code: "ES".into(),
//!     rate_type: RateType::Standard,
//!     rate: dec!(21),
//!     valid_from: Utc::now().date_naive(),
//!     valid_to: None,
//!     source: "manual".into(),
//!     synced_at: Utc::now(),
//! }]);
//!
//! let vies = Arc::new(ViesClient::new(&ViesConfig::default(), store.clone())?);
//! let service = VatService::new(cache, store, vies);
//!
//! let line = service
//!     .calculate_for_product(&VatInput {
//!         product_id: 1,
//!         product_vat_category_id: None,
//!         price: dec!(121.00),
//!         destination_country: "ES".into(),
//!         customer_vat_number: None,
//!         quantity: 1,
//!     })
//!     .await?;
//!
//! assert_eq!(line.net_amount, dec!(100.00));
//! assert_eq!(line.vat_amount, dec!(21.00));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `postgres` (default) | `PgStore` over sqlx, with migrations |
//! | `telemetry` | JSON `tracing` subscriber setup |
//! | `cli` | The `eurovat-sync` binary |
//! | `all` | Everything |

pub mod config;
pub mod core;
pub mod rates;
pub mod service;
pub mod store;
pub mod vies;
mod xml;

#[cfg(feature = "telemetry")]
pub mod telemetry;

// Re-export core types at crate root for convenience
pub use crate::core::*;
