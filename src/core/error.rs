use thiserror::Error;

use super::RateType;

/// Errors surfaced by rate sync, VIES validation and VAT calculation.
///
/// A disabled store, a VIES "not valid" answer and cache misses are not
/// errors; they are reported through result values.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VatError {
    /// The VAT number cannot be sent to VIES (too short, no country prefix).
    #[error("invalid VAT number '{value}': {reason}")]
    InvalidVatNumber { value: String, reason: String },

    /// Transport failure, including timeouts.
    #[error("network error: {0}")]
    Network(String),

    /// Remote endpoint answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// SOAP fault returned by VIES or TEDB (e.g. `MS_UNAVAILABLE`).
    #[error("SOAP fault: {0}")]
    SoapFault(String),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Neither the requested nor the standard rate is known for a country.
    #[error("no VAT rate for {country} ({rate_type})")]
    RateNotFound { country: String, rate_type: RateType },

    /// Every configured rate source failed.
    #[error("all rate sources failed: {0}")]
    SourcesExhausted(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for VatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for VatError {
    fn from(e: sqlx::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
