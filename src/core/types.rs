use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of rate a member state levies. Each country publishes at most one
/// active percentage per rate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    /// Standard rate (e.g. 19% in Germany).
    Standard,
    /// Reduced rate (e.g. 7% in Germany).
    Reduced,
    /// Super-reduced rate, below 5% (e.g. 2.1% in France).
    SuperReduced,
    /// Zero rate.
    Zero,
    /// Parking rate, a transitional rate of at least 12%.
    Parking,
}

impl RateType {
    /// All rate types, in persistence order.
    pub const ALL: [RateType; 5] = [
        Self::Standard,
        Self::Reduced,
        Self::SuperReduced,
        Self::Zero,
        Self::Parking,
    ];

    /// Identifier used in the `vat_rates.rate_type` column.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Reduced => "reduced",
            Self::SuperReduced => "super_reduced",
            Self::Zero => "zero",
            Self::Parking => "parking",
        }
    }

    /// Parse from the column identifier.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "standard" => Some(Self::Standard),
            "reduced" => Some(Self::Reduced),
            "super_reduced" => Some(Self::SuperReduced),
            "zero" => Some(Self::Zero),
            "parking" => Some(Self::Parking),
            _ => None,
        }
    }
}

impl fmt::Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// VAT category a product is assigned to. Seeded once into `vat_categories`
/// with fixed IDs; products and overrides reference it by ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatCategory {
    Standard,
    Reduced,
    SuperReduced,
    Zero,
}

impl VatCategory {
    /// Seeded primary key in `vat_categories`.
    pub fn id(&self) -> i32 {
        match self {
            Self::Standard => 1,
            Self::Reduced => 2,
            Self::SuperReduced => 3,
            Self::Zero => 4,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::Standard),
            2 => Some(Self::Reduced),
            3 => Some(Self::SuperReduced),
            4 => Some(Self::Zero),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        self.rate_type().code()
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "standard" => Some(Self::Standard),
            "reduced" => Some(Self::Reduced),
            "super_reduced" => Some(Self::SuperReduced),
            "zero" => Some(Self::Zero),
            _ => None,
        }
    }

    /// Rate type looked up in the rate table for this category.
    pub fn rate_type(&self) -> RateType {
        match self {
            Self::Standard => RateType::Standard,
            Self::Reduced => RateType::Reduced,
            Self::SuperReduced => RateType::SuperReduced,
            Self::Zero => RateType::Zero,
        }
    }
}

/// A persisted row of `vat_rates`.
///
/// The row with `valid_to == None` is the active rate for its
/// `(country_code, rate_type)`. Superseded rows keep their history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatRate {
    pub id: i64,
    /// ISO 3166-1 alpha-2 code (Greece is `GR`).
    pub country_code: String,
    pub rate_type: RateType,
    /// Percentage, e.g. `19` for 19%.
    pub rate: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    /// Name of the source the rate was fetched from.
    pub source: String,
    /// Last time a sync confirmed this rate.
    pub synced_at: DateTime<Utc>,
}

impl VatRate {
    pub fn is_active(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// A single `(country, rate type, rate)` triple as produced by a rate source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEntry {
    pub country_code: String,
    pub rate_type: RateType,
    pub rate: Decimal,
}

impl RateEntry {
    pub fn new(country_code: impl Into<String>, rate_type: RateType, rate: Decimal) -> Self {
        Self {
            country_code: country_code.into(),
            rate_type,
            rate,
        }
    }
}

/// Per-product, per-destination category pin. Takes precedence over the
/// product's own category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVatOverride {
    pub product_id: i64,
    pub country_code: String,
    pub vat_category_id: i32,
    pub notes: Option<String>,
}

/// VAT columns of the store settings singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreVatSettings {
    /// Master switch. When off every calculation returns a zero-VAT result.
    pub vat_enabled: bool,
    /// Home jurisdiction of the seller.
    pub vat_country_code: String,
    /// Whether catalogue prices are gross (VAT included).
    pub vat_prices_include_vat: bool,
    /// Category for products without one.
    pub vat_default_category: VatCategory,
    /// Allow B2B reverse charge for cross-border sales.
    pub vat_b2b_reverse_charge_enabled: bool,
}

impl Default for StoreVatSettings {
    fn default() -> Self {
        Self {
            vat_enabled: false,
            vat_country_code: String::new(),
            vat_prices_include_vat: false,
            vat_default_category: VatCategory::Standard,
            vat_b2b_reverse_charge_enabled: false,
        }
    }
}

/// Persisted VIES validation outcome, keyed by normalized VAT number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViesCacheEntry {
    pub vat_number: String,
    pub is_valid: bool,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    /// Request identifier returned by VIES `checkVatApprox`. The client only
    /// issues `checkVat`, so entries it writes leave this empty.
    pub consultation_number: Option<String>,
    pub validated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ViesCacheEntry {
    /// An entry is fresh strictly before its expiry instant.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// One priced line handed in by the checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatInput {
    pub product_id: i64,
    /// The product's own category (`vat_categories.id`).
    pub product_vat_category_id: Option<i32>,
    /// Unit price; gross or net depending on `vat_prices_include_vat`.
    pub price: Decimal,
    pub destination_country: String,
    pub customer_vat_number: Option<String>,
    pub quantity: i32,
}

/// Why a calculation charged no VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptReason {
    /// VAT is switched off for the store.
    Disabled,
    /// Cross-border B2B sale to a VIES-verified customer.
    ReverseCharge,
}

/// Authoritative tax breakdown for one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatCalculationResult {
    pub product_id: i64,
    pub country_code: String,
    pub category: VatCategory,
    /// Percentage applied; zero when exempt.
    pub rate: Decimal,
    /// Rate type that supplied `rate`.
    pub rate_type: RateType,
    /// `true` when the category had no rate and the standard rate was used.
    pub used_fallback_rate: bool,
    pub net_amount: Decimal,
    pub vat_amount: Decimal,
    pub gross_amount: Decimal,
    /// Quantity used for the line totals (after clamping).
    pub quantity: i32,
    pub line_net: Decimal,
    pub line_vat: Decimal,
    pub line_gross: Decimal,
    pub reverse_charge: bool,
    pub exempt_reason: Option<ExemptReason>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

/// Cart-level sums of line totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VatSummary {
    pub total_net: Decimal,
    pub total_vat: Decimal,
    pub total_gross: Decimal,
    pub item_count: usize,
    /// Any line was reverse-charged.
    pub reverse_charge_applied: bool,
}

impl VatSummary {
    pub fn add(&mut self, line: &VatCalculationResult) {
        self.total_net += line.line_net;
        self.total_vat += line.line_vat;
        self.total_gross += line.line_gross;
        self.item_count += 1;
        self.reverse_charge_applied |= line.reverse_charge;
    }
}
