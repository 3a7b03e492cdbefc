use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use eurovat::config::ViesConfig;
use eurovat::rates::RateCache;
use eurovat::service::VatService;
use eurovat::store::{MemoryStore, ViesCacheStore};
use eurovat::vies::ViesClient;
use eurovat::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn rate(country: &str, rate_type: RateType, value: Decimal) -> VatRate {
    VatRate {
        id: 0,
        country_code: country.into(),
        rate_type,
        rate: value,
        valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        valid_to: None,
        source: "test".into(),
        synced_at: Utc::now(),
    }
}

fn spanish_store(include_vat: bool) -> StoreVatSettings {
    StoreVatSettings {
        vat_enabled: true,
        vat_country_code: "ES".into(),
        vat_prices_include_vat: include_vat,
        vat_default_category: VatCategory::Standard,
        vat_b2b_reverse_charge_enabled: true,
    }
}

fn line(country: &str, price: Decimal, quantity: i32) -> VatInput {
    VatInput {
        product_id: 1,
        product_vat_category_id: None,
        price,
        destination_country: country.into(),
        customer_vat_number: None,
        quantity,
    }
}

fn vies_entry(vat_number: &str, valid: bool, expires_in: Duration) -> ViesCacheEntry {
    let now = Utc::now();
    ViesCacheEntry {
        vat_number: vat_number.into(),
        is_valid: valid,
        company_name: Some("Muster GmbH".into()),
        company_address: Some("Hauptstr. 1, 10115 Berlin".into()),
        consultation_number: None,
        validated_at: now - Duration::hours(1),
        expires_at: now + expires_in,
    }
}

fn setup(settings: StoreVatSettings) -> (Arc<MemoryStore>, VatService) {
    let store = Arc::new(MemoryStore::with_settings(settings));
    let cache = Arc::new(RateCache::new());
    cache.load(&[
        rate("ES", RateType::Standard, dec!(21)),
        rate("ES", RateType::Reduced, dec!(10)),
        rate("ES", RateType::SuperReduced, dec!(4)),
        rate("DE", RateType::Standard, dec!(19)),
        rate("DE", RateType::Reduced, dec!(7)),
        rate("DE", RateType::Zero, dec!(0)),
        rate("GR", RateType::Standard, dec!(24)),
    ]);
    let vies = Arc::new(ViesClient::new(&ViesConfig::default(), store.clone()).unwrap());
    let service = VatService::new(cache, store.clone(), vies);
    (store, service)
}

// ---------------------------------------------------------------------------
// Disabled VAT
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disabled_store_charges_no_vat() {
    let mut settings = spanish_store(true);
    settings.vat_enabled = false;
    let (_, service) = setup(settings);

    let r = service
        .calculate_for_product(&line("DE", dec!(49.99), 2))
        .await
        .unwrap();
    assert_eq!(r.rate, Decimal::ZERO);
    assert_eq!(r.vat_amount, Decimal::ZERO);
    assert_eq!(r.net_amount, dec!(49.99));
    assert_eq!(r.gross_amount, dec!(49.99));
    assert_eq!(r.line_gross, dec!(99.98));
    assert_eq!(r.exempt_reason, Some(ExemptReason::Disabled));
    assert!(!r.reverse_charge);
}

// ---------------------------------------------------------------------------
// Rate application
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gross_price_split_at_destination_rate() {
    let (_, service) = setup(spanish_store(true));
    let r = service
        .calculate_for_product(&line("ES", dec!(121.00), 1))
        .await
        .unwrap();
    assert_eq!(r.rate, dec!(21));
    assert_eq!(r.net_amount, dec!(100.00));
    assert_eq!(r.vat_amount, dec!(21.00));
    assert_eq!(r.gross_amount, dec!(121.00));
    assert_eq!(r.exempt_reason, None);
}

#[tokio::test]
async fn greek_destination_accepts_el() {
    let (_, service) = setup(spanish_store(false));
    let r = service
        .calculate_for_product(&line("el", dec!(100.00), 1))
        .await
        .unwrap();
    assert_eq!(r.country_code, "GR");
    assert_eq!(r.vat_amount, dec!(24.00));
}

#[tokio::test]
async fn missing_category_rate_falls_back_to_standard() {
    let (_, service) = setup(spanish_store(false));
    let mut input = line("DE", dec!(10.00), 1);
    input.product_vat_category_id = Some(VatCategory::SuperReduced.id());
    let r = service.calculate_for_product(&input).await.unwrap();
    assert_eq!(r.category, VatCategory::SuperReduced);
    assert_eq!(r.rate_type, RateType::Standard);
    assert!(r.used_fallback_rate);
    assert_eq!(r.vat_amount, dec!(1.90));
}

#[tokio::test]
async fn zero_category_uses_zero_rate() {
    let (_, service) = setup(spanish_store(false));
    let mut input = line("DE", dec!(10.00), 1);
    input.product_vat_category_id = Some(VatCategory::Zero.id());
    let r = service.calculate_for_product(&input).await.unwrap();
    assert_eq!(r.rate, Decimal::ZERO);
    assert!(!r.used_fallback_rate);
    assert_eq!(r.gross_amount, dec!(10.00));
}

#[tokio::test]
async fn unknown_destination_is_rate_not_found() {
    let (_, service) = setup(spanish_store(false));
    let err = service
        .calculate_for_product(&line("PL", dec!(10.00), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, VatError::RateNotFound { .. }));
}

#[tokio::test]
async fn non_positive_quantity_counts_as_one() {
    let (_, service) = setup(spanish_store(false));
    let r = service
        .calculate_for_product(&line("ES", dec!(10.00), 0))
        .await
        .unwrap();
    assert_eq!(r.quantity, 1);
    assert_eq!(r.line_gross, dec!(12.10));
}

// ---------------------------------------------------------------------------
// Reverse charge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reverse_charge_for_verified_cross_border_customer() {
    let (store, service) = setup(spanish_store(true));
    store
        .upsert_entry(&vies_entry("DE123456789", true, Duration::hours(12)))
        .await
        .unwrap();

    let mut input = line("DE", dec!(119.00), 2);
    input.customer_vat_number = Some("DE 123 456 789".into());
    let r = service.calculate_for_product(&input).await.unwrap();

    assert!(r.reverse_charge);
    assert_eq!(r.exempt_reason, Some(ExemptReason::ReverseCharge));
    assert_eq!(r.rate, Decimal::ZERO);
    assert_eq!(r.vat_amount, Decimal::ZERO);
    assert_eq!(r.net_amount, dec!(100.00));
    assert_eq!(r.gross_amount, dec!(100.00));
    assert_eq!(r.line_net, dec!(200.00));
    assert_eq!(r.company_name.as_deref(), Some("Muster GmbH"));
}

#[tokio::test]
async fn domestic_b2b_is_taxed() {
    let (store, service) = setup(spanish_store(false));
    store
        .upsert_entry(&vies_entry("ESB12345678", true, Duration::hours(12)))
        .await
        .unwrap();

    let mut input = line("ES", dec!(100.00), 1);
    input.customer_vat_number = Some("ESB12345678".into());
    let r = service.calculate_for_product(&input).await.unwrap();

    assert!(!r.reverse_charge);
    assert_eq!(r.rate, dec!(21));
    assert_eq!(r.vat_amount, dec!(21.00));
}

#[tokio::test]
async fn expired_vies_entry_is_taxed() {
    let (store, service) = setup(spanish_store(false));
    store
        .upsert_entry(&vies_entry("DE123456789", true, -Duration::minutes(1)))
        .await
        .unwrap();

    let mut input = line("DE", dec!(100.00), 1);
    input.customer_vat_number = Some("DE123456789".into());
    let r = service.calculate_for_product(&input).await.unwrap();

    assert!(!r.reverse_charge);
    assert_eq!(r.rate, dec!(19));
    assert_eq!(r.vat_amount, dec!(19.00));
    assert_eq!(r.company_name, None);
}

#[tokio::test]
async fn invalid_vies_entry_is_taxed() {
    let (store, service) = setup(spanish_store(false));
    store
        .upsert_entry(&vies_entry("DE123456789", false, Duration::hours(12)))
        .await
        .unwrap();

    let mut input = line("DE", dec!(100.00), 1);
    input.customer_vat_number = Some("DE123456789".into());
    let r = service.calculate_for_product(&input).await.unwrap();
    assert!(!r.reverse_charge);
}

#[tokio::test]
async fn unknown_vat_number_is_taxed_without_network() {
    let (_, service) = setup(spanish_store(false));
    let mut input = line("DE", dec!(100.00), 1);
    input.customer_vat_number = Some("DE999999999".into());
    let r = service.calculate_for_product(&input).await.unwrap();
    assert!(!r.reverse_charge);
    assert_eq!(r.vat_amount, dec!(19.00));
}

// ---------------------------------------------------------------------------
// Category precedence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn override_then_product_then_default() {
    let mut settings = spanish_store(false);
    settings.vat_default_category = VatCategory::Reduced;
    let (store, service) = setup(settings);

    let r = service
        .calculate_for_product(&line("DE", dec!(100.00), 1))
        .await
        .unwrap();
    assert_eq!(r.category, VatCategory::Reduced);

    let mut input = line("DE", dec!(100.00), 1);
    input.product_vat_category_id = Some(VatCategory::Standard.id());
    let r = service.calculate_for_product(&input).await.unwrap();
    assert_eq!(r.category, VatCategory::Standard);

    store
        .add_override(ProductVatOverride {
            product_id: 1,
            country_code: "DE".into(),
            vat_category_id: VatCategory::Zero.id(),
            notes: Some("books".into()),
        })
        .await;
    let r = service.calculate_for_product(&input).await.unwrap();
    assert_eq!(r.category, VatCategory::Zero);
    assert_eq!(r.vat_amount, Decimal::ZERO);

    // Override is per destination
    let mut es = input.clone();
    es.destination_country = "ES".into();
    let r = service.calculate_for_product(&es).await.unwrap();
    assert_eq!(r.category, VatCategory::Standard);
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cart_sums_line_totals() {
    let (_, service) = setup(spanish_store(false));
    let mut reduced = line("DE", dec!(50.00), 3);
    reduced.product_id = 2;
    reduced.product_vat_category_id = Some(VatCategory::Reduced.id());

    let (lines, summary) = service
        .calculate_for_cart(&[line("DE", dec!(100.00), 2), reduced])
        .await
        .unwrap();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].product_id, 1);
    assert_eq!(lines[1].product_id, 2);
    assert_eq!(summary.total_net, dec!(350.00));
    assert_eq!(summary.total_vat, dec!(48.50));
    assert_eq!(summary.total_gross, dec!(398.50));
    assert_eq!(summary.item_count, 2);
    assert!(!summary.reverse_charge_applied);
}

#[tokio::test]
async fn empty_cart_has_zero_summary() {
    let (_, service) = setup(spanish_store(false));
    let (lines, summary) = service.calculate_for_cart(&[]).await.unwrap();
    assert!(lines.is_empty());
    assert_eq!(summary, VatSummary::default());
}

#[tokio::test]
async fn cart_stops_at_first_error() {
    let (_, service) = setup(spanish_store(false));
    let result = service
        .calculate_for_cart(&[line("DE", dec!(1.00), 1), line("PL", dec!(1.00), 1)])
        .await;
    assert!(result.is_err());
}
