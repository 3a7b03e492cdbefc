use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::cache::RateCache;
use super::json::JsonRateSource;
use super::source::RateSource;
use super::tedb::TedbRateSource;
use crate::config::SyncConfig;
use crate::core::{RateEntry, RateType, VatError, VatRate, normalize_country};
use crate::store::{RateChanges, RateStore};

/// Outcome of one [`RateSyncer::sync`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Name of the source whose rates were saved.
    pub source: Option<String>,
    /// Number of rate entries fetched from that source.
    pub rates_loaded: usize,
    pub error: Option<String>,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetches rates from an ordered chain of sources, persists the diff and
/// reloads the shared [`RateCache`].
pub struct RateSyncer {
    sources: Vec<Box<dyn RateSource>>,
    store: Arc<dyn RateStore>,
    cache: Arc<RateCache>,
}

impl RateSyncer {
    /// A syncer with no sources; add them with [`with_source`](Self::with_source).
    pub fn new(store: Arc<dyn RateStore>, cache: Arc<RateCache>) -> Self {
        Self {
            sources: Vec::new(),
            store,
            cache,
        }
    }

    /// Append a source. Sources are tried in the order they were added.
    pub fn with_source(mut self, source: impl RateSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// TEDB first, the JSON table as fallback.
    pub fn from_config(
        config: &SyncConfig,
        store: Arc<dyn RateStore>,
        cache: Arc<RateCache>,
    ) -> Result<Self, VatError> {
        Ok(Self::new(store, cache)
            .with_source(TedbRateSource::new(config)?)
            .with_source(JsonRateSource::new(config)?))
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Run one sync. Errors are reported in the result, never raised.
    pub async fn sync(&self) -> SyncResult {
        let mut failures = Vec::new();

        for source in &self.sources {
            let name = source.name();
            match source.fetch().await {
                Ok(rates) if rates.is_empty() => {
                    warn!(source = name, "rate source returned no rates, trying next");
                    failures.push(format!("{name}: no rates"));
                }
                Ok(rates) => return self.persist(name, &rates).await,
                Err(e) => {
                    warn!(source = name, error = %e, "rate source failed, trying next");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        let err = if failures.is_empty() {
            VatError::SourcesExhausted("no rate sources configured".into())
        } else {
            VatError::SourcesExhausted(failures.join("; "))
        };
        error!(error = %err, "rate sync failed");
        SyncResult {
            source: None,
            rates_loaded: 0,
            error: Some(err.to_string()),
        }
    }

    async fn persist(&self, source: &str, rates: &[RateEntry]) -> SyncResult {
        let outcome = match self.save_rates(rates, source).await {
            Ok(changes) => self.warm_cache().await.map(|_| changes),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(changes) => {
                info!(
                    source,
                    rates_loaded = rates.len(),
                    unchanged = changes.unchanged.len(),
                    superseded = changes.superseded.len(),
                    inserted = changes.inserted.len(),
                    "VAT rates synced"
                );
                SyncResult {
                    source: Some(source.to_string()),
                    rates_loaded: rates.len(),
                    error: None,
                }
            }
            Err(e) => {
                error!(source, error = %e, "failed to persist VAT rates");
                SyncResult {
                    source: Some(source.to_string()),
                    rates_loaded: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Diff `rates` against the active rows and apply the result.
    ///
    /// Saving the same set twice leaves the history unchanged apart from
    /// `synced_at`.
    pub async fn save_rates(
        &self,
        rates: &[RateEntry],
        source: &str,
    ) -> Result<RateChanges, VatError> {
        let active = self.store.active_rates().await?;
        let changes = plan_changes(&active, rates);
        self.store.apply_changes(&changes, source, Utc::now()).await?;
        Ok(changes)
    }

    /// Load the active set into the cache without fetching. Returns the
    /// number of rates loaded.
    pub async fn warm_cache(&self) -> Result<usize, VatError> {
        let active = self.store.active_rates().await?;
        self.cache.load(&active);
        Ok(active.len())
    }
}

/// Compute the changes needed to make `incoming` the active rate set.
///
/// Duplicate incoming keys resolve to the last entry. Active rows absent from
/// `incoming` are left alone.
pub fn plan_changes(active: &[VatRate], incoming: &[RateEntry]) -> RateChanges {
    let current: HashMap<(String, RateType), &VatRate> = active
        .iter()
        .filter(|r| r.is_active())
        .map(|r| ((normalize_country(&r.country_code), r.rate_type), r))
        .collect();

    let mut latest: BTreeMap<(String, RateType), &RateEntry> = BTreeMap::new();
    for entry in incoming {
        latest.insert((normalize_country(&entry.country_code), entry.rate_type), entry);
    }

    let mut changes = RateChanges::default();
    for ((country_code, rate_type), entry) in latest {
        match current.get(&(country_code.clone(), rate_type)) {
            Some(row) if row.rate == entry.rate => changes.unchanged.push(row.id),
            Some(row) => {
                changes.superseded.push(row.id);
                changes
                    .inserted
                    .push(RateEntry::new(country_code, rate_type, entry.rate));
            }
            None => changes
                .inserted
                .push(RateEntry::new(country_code, rate_type, entry.rate)),
        }
    }
    changes
}
