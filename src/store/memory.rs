use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CatalogStore, RateChanges, RateStore, ViesCacheStore};
use crate::core::{
    ProductVatOverride, RateType, StoreVatSettings, VatError, VatRate, ViesCacheEntry,
    normalize_country,
};

#[derive(Default)]
struct Tables {
    rates: Vec<VatRate>,
    next_rate_id: i64,
    vies: HashMap<String, ViesCacheEntry>,
    settings: StoreVatSettings,
    overrides: HashMap<(i64, String), ProductVatOverride>,
}

/// In-process implementation of every store trait.
///
/// Keeps the same append/expire semantics as the SQL schema, so rate history
/// can be inspected in tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: StoreVatSettings) -> Self {
        Self {
            tables: RwLock::new(Tables {
                settings,
                ..Default::default()
            }),
        }
    }

    pub async fn set_settings(&self, settings: StoreVatSettings) {
        self.tables.write().await.settings = settings;
    }

    pub async fn add_override(&self, entry: ProductVatOverride) {
        let key = (entry.product_id, normalize_country(&entry.country_code));
        self.tables.write().await.overrides.insert(key, entry);
    }

    /// Every row, active and expired.
    pub async fn all_rates(&self) -> Vec<VatRate> {
        self.tables.read().await.rates.clone()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn active_rates(&self) -> Result<Vec<VatRate>, VatError> {
        let tables = self.tables.read().await;
        Ok(tables.rates.iter().filter(|r| r.is_active()).cloned().collect())
    }

    async fn apply_changes(
        &self,
        changes: &RateChanges,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VatError> {
        let today = now.date_naive();
        let mut tables = self.tables.write().await;

        for row in tables.rates.iter_mut() {
            if changes.unchanged.contains(&row.id) {
                row.synced_at = now;
            } else if changes.superseded.contains(&row.id) {
                row.valid_to = Some(today);
                row.synced_at = now;
            }
        }

        for entry in &changes.inserted {
            tables.next_rate_id += 1;
            let id = tables.next_rate_id;
            tables.rates.push(VatRate {
                id,
                country_code: entry.country_code.clone(),
                rate_type: entry.rate_type,
                rate: entry.rate,
                valid_from: today,
                valid_to: None,
                source: source.to_string(),
                synced_at: now,
            });
        }

        Ok(())
    }

    async fn rate_history(
        &self,
        country_code: &str,
        rate_type: RateType,
    ) -> Result<Vec<VatRate>, VatError> {
        let country = normalize_country(country_code);
        let tables = self.tables.read().await;
        Ok(tables
            .rates
            .iter()
            .filter(|r| r.country_code == country && r.rate_type == rate_type)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ViesCacheStore for MemoryStore {
    async fn get_entry(&self, vat_number: &str) -> Result<Option<ViesCacheEntry>, VatError> {
        Ok(self.tables.read().await.vies.get(vat_number).cloned())
    }

    async fn upsert_entry(&self, entry: &ViesCacheEntry) -> Result<(), VatError> {
        self.tables
            .write()
            .await
            .vies
            .insert(entry.vat_number.clone(), entry.clone());
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn store_settings(&self) -> Result<StoreVatSettings, VatError> {
        Ok(self.tables.read().await.settings.clone())
    }

    async fn product_override(
        &self,
        product_id: i64,
        country_code: &str,
    ) -> Result<Option<ProductVatOverride>, VatError> {
        let key = (product_id, normalize_country(country_code));
        Ok(self.tables.read().await.overrides.get(&key).cloned())
    }
}
