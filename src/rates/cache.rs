use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::core::{RateType, VatRate, normalize_country};

#[derive(Debug, Default)]
struct RateTable {
    rates: HashMap<(String, RateType), Decimal>,
    loaded_at: Option<DateTime<Utc>>,
}

/// In-memory `(country, rate type) -> rate` table shared between the sync
/// task and request handlers.
///
/// `load` builds a complete new table and swaps it in under the write lock,
/// so readers see either the old or the new set, never a mix.
#[derive(Debug, Default)]
pub struct RateCache {
    table: RwLock<Arc<RateTable>>,
}

impl RateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole table with `rates`. Pass the active set.
    pub fn load(&self, rates: &[VatRate]) {
        let mut map = HashMap::with_capacity(rates.len());
        for r in rates {
            map.insert((normalize_country(&r.country_code), r.rate_type), r.rate);
        }
        let table = Arc::new(RateTable {
            rates: map,
            loaded_at: Some(Utc::now()),
        });

        let mut guard = self.table.write().unwrap_or_else(PoisonError::into_inner);
        *guard = table;
    }

    /// Rate for `country` (ISO or `EL`) and `rate_type`; `None` when unknown.
    pub fn get(&self, country: &str, rate_type: RateType) -> Option<Decimal> {
        self.snapshot()
            .rates
            .get(&(normalize_country(country), rate_type))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.snapshot().rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().rates.is_empty()
    }

    /// When the current table was loaded; `None` before the first load.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().loaded_at
    }

    fn snapshot(&self) -> Arc<RateTable> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
