use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core::{RateEntry, RateType, VatError, normalize_country};

/// One fetch strategy in the sync chain.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Provenance recorded in `vat_rates.source`.
    fn name(&self) -> &str;

    /// Fetch the current rate table, flattened.
    async fn fetch(&self) -> Result<Vec<RateEntry>, VatError>;
}

/// Rates published for one country. `None` means "not applicable".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryRates {
    pub country_code: String,
    pub standard: Option<Decimal>,
    pub reduced: Option<Decimal>,
    /// Second reduced rate; only used when `reduced` is not applicable.
    pub reduced_alt: Option<Decimal>,
    pub super_reduced: Option<Decimal>,
    pub parking: Option<Decimal>,
}

/// Flatten per-country tables into `(country, type, rate)` entries.
///
/// Not-applicable fields are skipped. Every country with a standard rate also
/// gets a zero rate, since no source publishes it explicitly.
pub fn flatten(countries: &[CountryRates]) -> Vec<RateEntry> {
    let mut out = Vec::new();
    for c in countries {
        let country = normalize_country(&c.country_code);
        let fields = [
            (RateType::Standard, c.standard),
            (RateType::Reduced, c.reduced.or(c.reduced_alt)),
            (RateType::SuperReduced, c.super_reduced),
            (RateType::Parking, c.parking),
        ];
        for (rate_type, value) in fields {
            if let Some(rate) = value {
                out.push(RateEntry::new(country.clone(), rate_type, rate));
            }
        }
        if c.standard.is_some() {
            out.push(RateEntry::new(country, RateType::Zero, Decimal::ZERO));
        }
    }
    out
}
