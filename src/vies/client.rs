use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::format::{normalize_vat_number, split_vat_number};
use super::soap::{CheckVatResponse, check_vat_request, parse_check_vat_response};
use crate::config::ViesConfig;
use crate::core::countries::service_country;
use crate::core::{VatError, ViesCacheEntry};
use crate::store::ViesCacheStore;

/// Result of a VIES VAT number check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViesResult {
    /// Normalized number including country prefix (the cache key).
    pub vat_number: String,
    /// Whether the VAT number is currently valid.
    pub valid: bool,
    /// Date of the request as reported by VIES.
    pub request_date: Option<String>,
    /// Registered company name (if available).
    pub name: Option<String>,
    /// Registered address (if available).
    pub address: Option<String>,
    /// Request identifier. Plain `checkVat` calls never return one, so this
    /// is only set for cache entries written by callers that use
    /// `checkVatApprox`.
    pub consultation_number: Option<String>,
    /// Served from the cache without a network call.
    pub cached: bool,
}

impl ViesResult {
    fn from_entry(entry: ViesCacheEntry) -> Self {
        Self {
            vat_number: entry.vat_number,
            valid: entry.is_valid,
            request_date: Some(entry.validated_at.date_naive().to_string()),
            name: entry.company_name,
            address: entry.company_address,
            consultation_number: entry.consultation_number,
            cached: true,
        }
    }
}

/// VIES SOAP client with a persisted result cache.
///
/// Lookups are served from the cache while an entry is fresh; otherwise a
/// `checkVat` request is sent and its answer cached for the configured TTL.
pub struct ViesClient {
    http: reqwest::Client,
    endpoint: String,
    ttl: chrono::Duration,
    store: Arc<dyn ViesCacheStore>,
}

impl ViesClient {
    pub fn new(config: &ViesConfig, store: Arc<dyn ViesCacheStore>) -> Result<Self, VatError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers({
                let mut headers = HeaderMap::new();
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/xml; charset=utf-8"),
                );
                headers.insert("SOAPAction", HeaderValue::from_static(""));
                headers
            })
            .build()
            .map_err(|e| VatError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            ttl: config.cache_ttl(),
            store,
        })
    }

    /// Validate `vat_number` (country prefix included, e.g. `"DE123456789"`).
    ///
    /// # Errors
    ///
    /// `VatError::InvalidVatNumber` for inputs that cannot be sent (no network
    /// call is made), `Network`/`Api`/`SoapFault`/`Parse` when VIES could not
    /// give an answer, and `Storage` when the cache cannot be read. A VIES
    /// "not valid" answer is `Ok` with `valid == false`.
    #[instrument(skip(self))]
    pub async fn validate(&self, vat_number: &str) -> Result<ViesResult, VatError> {
        let normalized = normalize_vat_number(vat_number);
        let (country, number) = split_vat_number(&normalized)?;

        if let Some(entry) = self.fresh_entry(&normalized).await? {
            debug!(vat_number = %normalized, "VIES cache hit");
            return Ok(ViesResult::from_entry(entry));
        }

        let resp = self.check_remote(country, number).await?;
        let now = Utc::now();
        let entry = ViesCacheEntry {
            vat_number: normalized.clone(),
            is_valid: resp.valid,
            company_name: resp.name.clone(),
            company_address: resp.address.clone(),
            consultation_number: None,
            validated_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        if let Err(e) = self.store.upsert_entry(&entry).await {
            warn!(vat_number = %normalized, error = %e, "failed to cache VIES result");
        }

        info!(vat_number = %normalized, valid = resp.valid, "VIES validation completed");

        Ok(ViesResult {
            vat_number: normalized,
            valid: resp.valid,
            request_date: resp.request_date,
            name: resp.name,
            address: resp.address,
            consultation_number: None,
            cached: false,
        })
    }

    /// Fresh cache entry for `vat_number`, without touching the network.
    ///
    /// Numbers too short to be valid simply have no entry.
    pub async fn cached(&self, vat_number: &str) -> Result<Option<ViesCacheEntry>, VatError> {
        let normalized = normalize_vat_number(vat_number);
        if split_vat_number(&normalized).is_err() {
            return Ok(None);
        }
        self.fresh_entry(&normalized).await
    }

    async fn fresh_entry(&self, normalized: &str) -> Result<Option<ViesCacheEntry>, VatError> {
        let now = Utc::now();
        Ok(self
            .store
            .get_entry(normalized)
            .await?
            .filter(|e| e.is_fresh(now)))
    }

    async fn check_remote(&self, country: &str, number: &str) -> Result<CheckVatResponse, VatError> {
        let body = check_vat_request(&service_country(country), number)?;

        let resp = self.http.post(&self.endpoint).body(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        // VIES reports faults with HTTP 500 and a SOAP body
        if !status.is_success() {
            if let Ok(Some(fault)) = crate::xml::soap_fault(&text) {
                return Err(VatError::SoapFault(fault));
            }
            return Err(VatError::Api {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body: text,
            });
        }

        parse_check_vat_response(&text)
    }
}
