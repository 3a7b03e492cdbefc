//! Secondary source: a JSON rate table keyed by country.
//!
//! ```json
//! {"rates": {"AT": {"country": "Austria", "standard_rate": 20,
//!   "reduced_rate": 10, "reduced_rate_alt": 13,
//!   "super_reduced_rate": false, "parking_rate": 12}}}
//! ```
//!
//! `false` marks a rate type the country does not have.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use tracing::debug;

use super::source::{CountryRates, RateSource, flatten};
use crate::config::SyncConfig;
use crate::core::{RateEntry, VatError};

/// A rate field: a non-negative number, or `false` for "not applicable".
///
/// Any other JSON shape (`true`, strings, `null`, objects) is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateValue(pub Option<Decimal>);

impl<'de> Deserialize<'de> for RateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RateValueVisitor)
    }
}

struct RateValueVisitor;

impl<'de> Visitor<'de> for RateValueVisitor {
    type Value = RateValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative rate or `false`")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<RateValue, E> {
        if v {
            Err(E::invalid_value(de::Unexpected::Bool(true), &self))
        } else {
            Ok(RateValue(None))
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RateValue, E> {
        Ok(RateValue(Some(Decimal::from(v))))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RateValue, E> {
        if v < 0 {
            return Err(E::invalid_value(de::Unexpected::Signed(v), &self));
        }
        Ok(RateValue(Some(Decimal::from(v))))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RateValue, E> {
        if !v.is_finite() || v < 0.0 {
            return Err(E::invalid_value(de::Unexpected::Float(v), &self));
        }
        Decimal::from_f64(v)
            .map(|d| RateValue(Some(d.normalize())))
            .ok_or_else(|| E::invalid_value(de::Unexpected::Float(v), &self))
    }
}

#[derive(Debug, Deserialize)]
struct RatesDocument {
    rates: BTreeMap<String, CountryDocument>,
}

#[derive(Debug, Deserialize)]
struct CountryDocument {
    #[serde(default)]
    standard_rate: RateValue,
    #[serde(default)]
    reduced_rate: RateValue,
    #[serde(default)]
    reduced_rate_alt: RateValue,
    #[serde(default)]
    super_reduced_rate: RateValue,
    #[serde(default)]
    parking_rate: RateValue,
}

/// Decode the JSON rate document into per-country tables.
pub fn parse_rates_json(body: &str) -> Result<Vec<CountryRates>, VatError> {
    let doc: RatesDocument = serde_json::from_str(body)
        .map_err(|e| VatError::Parse(format!("JSON rate table: {e}")))?;

    Ok(doc
        .rates
        .into_iter()
        .map(|(code, c)| CountryRates {
            country_code: code,
            standard: c.standard_rate.0,
            reduced: c.reduced_rate.0,
            reduced_alt: c.reduced_rate_alt.0,
            super_reduced: c.super_reduced_rate.0,
            parking: c.parking_rate.0,
        })
        .collect())
}

/// Fetches the JSON rate table over HTTP.
pub struct JsonRateSource {
    http: reqwest::Client,
    url: String,
}

impl JsonRateSource {
    pub const NAME: &'static str = "json";

    pub fn new(config: &SyncConfig) -> Result<Self, VatError> {
        let http = reqwest::Client::builder()
            .timeout(config.json_timeout())
            .build()
            .map_err(|e| VatError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: config.json_rates_url.clone(),
        })
    }
}

#[async_trait]
impl RateSource for JsonRateSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self) -> Result<Vec<RateEntry>, VatError> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(VatError::Api {
                endpoint: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let countries = parse_rates_json(&body)?;
        debug!(countries = countries.len(), "JSON rate table decoded");
        Ok(flatten(&countries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn accepts_numbers_and_false() {
        let countries = parse_rates_json(
            r#"{"rates": {
                "AT": {"country": "Austria", "standard_rate": 20, "reduced_rate": 10,
                       "reduced_rate_alt": 13, "super_reduced_rate": false, "parking_rate": 12},
                "FR": {"country": "France", "standard_rate": 20.0, "reduced_rate": 10,
                       "reduced_rate_alt": 5.5, "super_reduced_rate": 2.1, "parking_rate": false}
            }}"#,
        )
        .unwrap();
        assert_eq!(countries.len(), 2);
        let at = &countries[0];
        assert_eq!(at.country_code, "AT");
        assert_eq!(at.standard, Some(dec!(20)));
        assert_eq!(at.super_reduced, None);
        let fr = &countries[1];
        assert_eq!(fr.reduced_alt, Some(dec!(5.5)));
        assert_eq!(fr.super_reduced, Some(dec!(2.1)));
        assert_eq!(fr.parking, None);
    }

    #[test]
    fn rejects_true() {
        let err = parse_rates_json(r#"{"rates": {"AT": {"standard_rate": true}}}"#).unwrap_err();
        assert!(matches!(err, VatError::Parse(_)));
    }

    #[test]
    fn rejects_strings_and_null() {
        assert!(parse_rates_json(r#"{"rates": {"AT": {"standard_rate": "20"}}}"#).is_err());
        assert!(parse_rates_json(r#"{"rates": {"AT": {"standard_rate": null}}}"#).is_err());
        assert!(parse_rates_json(r#"{"rates": {"AT": {"standard_rate": -1}}}"#).is_err());
    }

    #[test]
    fn missing_fields_are_not_applicable() {
        let countries = parse_rates_json(r#"{"rates": {"DK": {"standard_rate": 25}}}"#).unwrap();
        assert_eq!(countries[0].reduced, None);
    }

    #[test]
    fn rejects_missing_rates_object() {
        assert!(parse_rates_json(r#"{"countries": {}}"#).is_err());
    }
}
