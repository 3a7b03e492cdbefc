//! Primary source: the European Commission's Taxes in Europe Database
//! (TEDB) `retrieveVatRates` SOAP operation.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use tracing::debug;

use super::source::{CountryRates, RateSource, flatten};
use crate::config::SyncConfig;
use crate::core::countries::{EU_MEMBER_STATES, service_country};
use crate::core::{RateEntry, VatError};
use crate::xml::{SOAP_ENV_NS, XmlNode, XmlWriter, path_ends_with, walk};

const SERVICE_NS: &str = "urn:ec.europa.eu:taxud:tedb:services:v1:IVatRetrievalService";
const TYPES_NS: &str = "urn:ec.europa.eu:taxud:tedb:services:v1:IVatRetrievalService:types";

/// Build a `retrieveVatRatesReqMsg` for `member_states` as of `situation_on`.
pub fn retrieve_rates_request(
    member_states: &[&str],
    situation_on: NaiveDate,
) -> Result<String, VatError> {
    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "soapenv:Envelope",
        &[
            ("xmlns:soapenv", SOAP_ENV_NS),
            ("xmlns:urn", SERVICE_NS),
            ("xmlns:urn1", TYPES_NS),
        ],
    )?;
    w.empty_element("soapenv:Header")?;
    w.start_element("soapenv:Body")?;
    w.start_element("urn:retrieveVatRatesReqMsg")?;
    w.start_element("urn1:memberStates")?;
    for ms in member_states {
        w.text_element("urn1:isoCode", &service_country(ms))?;
    }
    w.end_element("urn1:memberStates")?;
    w.text_element("urn1:situationOn", &situation_on.format("%Y-%m-%d").to_string())?;
    w.end_element("urn:retrieveVatRatesReqMsg")?;
    w.end_element("soapenv:Body")?;
    w.end_element("soapenv:Envelope")?;
    w.into_string()
}

#[derive(Debug, Default)]
struct RateResult {
    member_state: String,
    kind: String,
    rate_kind: String,
    value: Option<Decimal>,
}

/// Parse a `retrieveVatRatesRespMsg` into per-country tables.
///
/// TEDB lists one result per rate and goods category; the highest value per
/// rate kind is kept, and the two highest distinct reduced rates become
/// `reduced` and `reduced_alt`.
pub fn parse_retrieve_rates_response(xml: &str) -> Result<Vec<CountryRates>, VatError> {
    let mut results: Vec<RateResult> = Vec::new();
    let mut current = RateResult::default();
    let mut fault: Option<String> = None;
    let mut bad_value: Option<String> = None;

    walk(xml, |node| match node {
        XmlNode::Text { path, text } => {
            if path_ends_with(path, &["Fault", "faultstring"]) {
                fault = Some(text.to_string());
            } else if path_ends_with(path, &["vatRateResults", "memberState"]) {
                current.member_state = text.to_string();
            } else if path_ends_with(path, &["vatRateResults", "type"]) {
                current.kind = text.to_string();
            } else if path_ends_with(path, &["vatRateResults", "rate", "type"]) {
                current.rate_kind = text.to_string();
            } else if path_ends_with(path, &["vatRateResults", "rate", "value"]) {
                match Decimal::from_str(text) {
                    Ok(v) => current.value = Some(v.normalize()),
                    Err(_) => bad_value = Some(text.to_string()),
                }
            }
        }
        XmlNode::End { path } => {
            if path_ends_with(path, &["vatRateResults"]) {
                results.push(std::mem::take(&mut current));
            }
        }
    })?;

    if let Some(fault) = fault {
        return Err(VatError::SoapFault(fault));
    }
    if let Some(value) = bad_value {
        return Err(VatError::Parse(format!("TEDB rate value '{value}' is not a number")));
    }
    if results.is_empty() {
        return Err(VatError::Parse("TEDB response has no vatRateResults".into()));
    }

    let mut by_country: BTreeMap<String, (CountryRates, Vec<Decimal>)> = BTreeMap::new();
    for r in results {
        let Some(value) = r.value else { continue };
        if r.member_state.is_empty() {
            continue;
        }
        let (rates, reduced) = by_country
            .entry(r.member_state.clone())
            .or_insert_with(|| {
                (
                    CountryRates {
                        country_code: r.member_state.clone(),
                        ..Default::default()
                    },
                    Vec::new(),
                )
            });

        match (r.kind.as_str(), r.rate_kind.as_str()) {
            ("STANDARD", _) | (_, "DEFAULT") => keep_max(&mut rates.standard, value),
            (_, "REDUCED_RATE") => reduced.push(value),
            (_, "SUPER_REDUCED_RATE") => keep_max(&mut rates.super_reduced, value),
            (_, "PARKING_RATE") => keep_max(&mut rates.parking, value),
            _ => {}
        }
    }

    Ok(by_country
        .into_values()
        .map(|(mut rates, mut reduced)| {
            reduced.sort_by(|a, b| b.cmp(a));
            reduced.dedup();
            rates.reduced = reduced.first().copied();
            rates.reduced_alt = reduced.get(1).copied();
            rates
        })
        .collect())
}

fn keep_max(slot: &mut Option<Decimal>, value: Decimal) {
    if slot.is_none_or(|v| value > v) {
        *slot = Some(value);
    }
}

/// Fetches current rates for every member state from TEDB.
pub struct TedbRateSource {
    http: reqwest::Client,
    endpoint: String,
}

impl TedbRateSource {
    pub const NAME: &'static str = "tedb";

    pub fn new(config: &SyncConfig) -> Result<Self, VatError> {
        let http = reqwest::Client::builder()
            .timeout(config.tedb_timeout())
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
            endpoint: config.tedb_endpoint.clone(),
        })
    }
}

#[async_trait]
impl RateSource for TedbRateSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self) -> Result<Vec<RateEntry>, VatError> {
        let body = retrieve_rates_request(EU_MEMBER_STATES, Utc::now().date_naive())?;
        let resp = self.http.post(&self.endpoint).body(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(VatError::Api {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body: text,
            });
        }

        let countries = parse_retrieve_rates_response(&text)?;
        debug!(countries = countries.len(), "TEDB rate table decoded");
        Ok(flatten(&countries))
    }
}
