//! Persistence seams for rate history, the VIES cache and catalogue lookups.
//!
//! [`MemoryStore`] backs tests and single-process setups; [`PgStore`]
//! (feature `postgres`) talks to the relational database through a sqlx pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{
    ProductVatOverride, RateEntry, RateType, StoreVatSettings, VatError, VatRate, ViesCacheEntry,
};

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// Outcome of diffing fetched rates against the active rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateChanges {
    /// Active rows whose value was confirmed; only `synced_at` moves.
    pub unchanged: Vec<i64>,
    /// Active rows whose value changed; they get `valid_to` set.
    pub superseded: Vec<i64>,
    /// New active rows (changed values and first-seen rates).
    pub inserted: Vec<RateEntry>,
}

impl RateChanges {
    pub fn is_empty(&self) -> bool {
        self.unchanged.is_empty() && self.superseded.is_empty() && self.inserted.is_empty()
    }
}

/// Storage for `vat_rates`.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Every row with `valid_to IS NULL`.
    async fn active_rates(&self) -> Result<Vec<VatRate>, VatError>;

    /// Apply a diff atomically: touch unchanged rows, expire superseded rows
    /// as of `now`'s date, insert new rows valid from `now`'s date.
    async fn apply_changes(
        &self,
        changes: &RateChanges,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VatError>;

    /// Full history for one country and type, oldest first.
    async fn rate_history(
        &self,
        country_code: &str,
        rate_type: RateType,
    ) -> Result<Vec<VatRate>, VatError>;
}

/// Storage for `vies_validation_cache`.
#[async_trait]
pub trait ViesCacheStore: Send + Sync {
    /// Entry for a normalized VAT number, fresh or not.
    async fn get_entry(&self, vat_number: &str) -> Result<Option<ViesCacheEntry>, VatError>;

    /// Insert or replace the entry keyed by `entry.vat_number`.
    async fn upsert_entry(&self, entry: &ViesCacheEntry) -> Result<(), VatError>;
}

/// Read-only access to store settings and product overrides.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn store_settings(&self) -> Result<StoreVatSettings, VatError>;

    async fn product_override(
        &self,
        product_id: i64,
        country_code: &str,
    ) -> Result<Option<ProductVatOverride>, VatError>;
}
