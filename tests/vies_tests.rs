//! VIES client against a mocked `checkVat` endpoint.

use std::sync::Arc;

use chrono::{Duration, Utc};
use eurovat::config::ViesConfig;
use eurovat::store::{MemoryStore, ViesCacheStore};
use eurovat::vies::ViesClient;
use eurovat::*;
use wiremock::matchers::{body_string_contains, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn check_vat_response(country: &str, number: &str, valid: bool, name: &str) -> String {
    format!(
        r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Header/>
  <env:Body>
    <ns2:checkVatResponse xmlns:ns2="urn:ec.europa.eu:taxud:vies:services:checkVat:types">
      <ns2:countryCode>{country}</ns2:countryCode>
      <ns2:vatNumber>{number}</ns2:vatNumber>
      <ns2:requestDate>2024-06-15+02:00</ns2:requestDate>
      <ns2:valid>{valid}</ns2:valid>
      <ns2:name>{name}</ns2:name>
      <ns2:address>---</ns2:address>
    </ns2:checkVatResponse>
  </env:Body>
</env:Envelope>"#
    )
}

const FAULT: &str = r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Body>
    <env:Fault>
      <faultcode>env:Server</faultcode>
      <faultstring>MS_UNAVAILABLE</faultstring>
    </env:Fault>
  </env:Body>
</env:Envelope>"#;

fn client(server: &MockServer, store: Arc<MemoryStore>) -> ViesClient {
    let config = ViesConfig {
        endpoint: server.uri(),
        timeout_secs: 5,
        cache_ttl_secs: 3600,
    };
    ViesClient::new(&config, store).unwrap()
}

#[tokio::test]
async fn fresh_cache_entry_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    store
        .upsert_entry(&ViesCacheEntry {
            vat_number: "DE123456789".into(),
            is_valid: true,
            company_name: Some("Muster GmbH".into()),
            company_address: None,
            consultation_number: None,
            validated_at: now,
            expires_at: now + Duration::hours(1),
        })
        .await
        .unwrap();

    let result = client(&server, store).validate("de 123.456.789").await.unwrap();
    assert!(result.cached);
    assert!(result.valid);
    assert_eq!(result.name.as_deref(), Some("Muster GmbH"));
}

#[tokio::test]
async fn miss_queries_vies_and_caches_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "text/xml; charset=utf-8"))
        .and(body_string_contains("<urn:countryCode>DE</urn:countryCode>"))
        .and(body_string_contains("<urn:vatNumber>123456789</urn:vatNumber>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(check_vat_response(
            "DE",
            "123456789",
            true,
            "Muster GmbH",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let vies = client(&server, store.clone());

    let result = vies.validate("DE123456789").await.unwrap();
    assert!(!result.cached);
    assert!(result.valid);
    assert_eq!(result.name.as_deref(), Some("Muster GmbH"));
    assert_eq!(result.address, None);
    assert_eq!(result.request_date.as_deref(), Some("2024-06-15+02:00"));
    assert_eq!(result.consultation_number, None);

    let entry = store.get_entry("DE123456789").await.unwrap().unwrap();
    assert!(entry.is_valid);
    let ttl = entry.expires_at - entry.validated_at;
    assert_eq!(ttl, Duration::seconds(3600));

    // Second call is answered from the cache; the mock expects one hit.
    let again = vies.validate("DE123456789").await.unwrap();
    assert!(again.cached);
    assert!(vies.cached("DE123456789").await.unwrap().is_some());
}

#[tokio::test]
async fn oversized_ttl_is_capped_when_caching() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(check_vat_response(
            "DE",
            "123456789",
            true,
            "Muster GmbH",
        )))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let config = ViesConfig {
        endpoint: server.uri(),
        timeout_secs: 5,
        cache_ttl_secs: u64::MAX,
    };
    let vies = ViesClient::new(&config, store.clone()).unwrap();

    let result = vies.validate("DE123456789").await.unwrap();
    assert!(result.valid);

    let entry = store.get_entry("DE123456789").await.unwrap().unwrap();
    let ttl = entry.expires_at - entry.validated_at;
    assert_eq!(
        ttl,
        Duration::seconds(eurovat::config::MAX_VIES_CACHE_TTL_SECS as i64)
    );
}

#[tokio::test]
async fn invalid_answer_is_cached_as_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(check_vat_response(
            "FR", "00000000000", false, "---",
        )))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let result = client(&server, store.clone())
        .validate("FR00000000000")
        .await
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.name, None);
    assert!(!store.get_entry("FR00000000000").await.unwrap().unwrap().is_valid);
}

#[tokio::test]
async fn greek_numbers_are_sent_as_el() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("<urn:countryCode>EL</urn:countryCode>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(check_vat_response(
            "EL", "123456789", true, "ETAIREIA AE",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server, Arc::new(MemoryStore::new()))
        .validate("GR123456789")
        .await
        .unwrap();
    assert!(result.valid);
}

#[tokio::test]
async fn soap_fault_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(FAULT))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let err = client(&server, store.clone())
        .validate("DE123456789")
        .await
        .unwrap_err();
    assert!(matches!(err, VatError::SoapFault(ref s) if s == "MS_UNAVAILABLE"));
    assert!(store.get_entry("DE123456789").await.unwrap().is_none());
}

#[tokio::test]
async fn http_error_without_fault_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server, Arc::new(MemoryStore::new()))
        .validate("DE123456789")
        .await
        .unwrap_err();
    assert!(matches!(err, VatError::Api { status: 502, .. }));
}

#[tokio::test]
async fn too_short_number_never_reaches_vies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, Arc::new(MemoryStore::new()))
        .validate("XY")
        .await
        .unwrap_err();
    assert!(matches!(err, VatError::InvalidVatNumber { .. }));
}
