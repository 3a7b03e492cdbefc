//! VAT calculation for checkout lines and carts.
//!
//! Rates come from the shared [`RateCache`], categories from product
//! overrides and store settings, and reverse-charge eligibility from the
//! VIES cache. No network call is made during a calculation.

mod amounts;

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

pub use amounts::{UnitAmounts, effective_quantity, net_of, round_money, split_price};

use crate::core::{
    ExemptReason, RateType, StoreVatSettings, VatCalculationResult, VatCategory, VatError,
    VatInput, VatSummary, ViesCacheEntry, normalize_country,
};
use crate::rates::RateCache;
use crate::store::CatalogStore;
use crate::vies::ViesClient;

/// Resolved rate for a destination and category.
struct AppliedRate {
    rate: Decimal,
    rate_type: RateType,
    used_fallback: bool,
}

pub struct VatService {
    cache: Arc<RateCache>,
    catalog: Arc<dyn CatalogStore>,
    vies: Arc<ViesClient>,
}

impl VatService {
    pub fn new(cache: Arc<RateCache>, catalog: Arc<dyn CatalogStore>, vies: Arc<ViesClient>) -> Self {
        Self {
            cache,
            catalog,
            vies,
        }
    }

    /// Tax breakdown for one line.
    ///
    /// # Errors
    ///
    /// `RateNotFound` when the destination has neither the category's rate
    /// nor a standard rate; `Storage` when settings, overrides or the VIES
    /// cache cannot be read.
    #[instrument(skip(self, input), fields(product_id = input.product_id, country = %input.destination_country))]
    pub async fn calculate_for_product(
        &self,
        input: &VatInput,
    ) -> Result<VatCalculationResult, VatError> {
        let settings = self.catalog.store_settings().await?;
        let country = normalize_country(&input.destination_country);
        let quantity = effective_quantity(input.quantity);

        if !settings.vat_enabled {
            let category = settings.vat_default_category;
            let price = round_money(input.price);
            let amounts = UnitAmounts {
                net: price,
                vat: Decimal::ZERO,
                gross: price,
            };
            return Ok(line(
                input,
                country,
                category,
                AppliedRate {
                    rate: Decimal::ZERO,
                    rate_type: category.rate_type(),
                    used_fallback: false,
                },
                amounts,
                quantity,
                Some(ExemptReason::Disabled),
                None,
            ));
        }

        let category = self.resolve_category(input, &country, &settings).await?;

        if let Some(entry) = self.reverse_charge_entry(input, &country, &settings).await? {
            let net = if settings.vat_prices_include_vat {
                match self.lookup_rate(&country, category) {
                    Ok(applied) => net_of(input.price, applied.rate),
                    Err(_) => round_money(input.price),
                }
            } else {
                round_money(input.price)
            };
            debug!(vat_number = %entry.vat_number, "reverse charge applied");
            return Ok(line(
                input,
                country,
                category,
                AppliedRate {
                    rate: Decimal::ZERO,
                    rate_type: category.rate_type(),
                    used_fallback: false,
                },
                UnitAmounts {
                    net,
                    vat: Decimal::ZERO,
                    gross: net,
                },
                quantity,
                Some(ExemptReason::ReverseCharge),
                Some(entry),
            ));
        }

        let applied = self.lookup_rate(&country, category)?;
        let amounts = split_price(input.price, applied.rate, settings.vat_prices_include_vat);
        Ok(line(input, country, category, applied, amounts, quantity, None, None))
    }

    /// Calculate every line in order and sum the line totals.
    pub async fn calculate_for_cart(
        &self,
        items: &[VatInput],
    ) -> Result<(Vec<VatCalculationResult>, VatSummary), VatError> {
        let mut lines = Vec::with_capacity(items.len());
        let mut summary = VatSummary::default();
        for item in items {
            let result = self.calculate_for_product(item).await?;
            summary.add(&result);
            lines.push(result);
        }
        Ok((lines, summary))
    }

    /// Override for (product, destination), then the product's category,
    /// then the store default. Unknown category IDs are skipped.
    async fn resolve_category(
        &self,
        input: &VatInput,
        country: &str,
        settings: &StoreVatSettings,
    ) -> Result<VatCategory, VatError> {
        if let Some(ov) = self.catalog.product_override(input.product_id, country).await? {
            match VatCategory::from_id(ov.vat_category_id) {
                Some(category) => return Ok(category),
                None => warn!(category_id = ov.vat_category_id, "unknown VAT category on override"),
            }
        }

        if let Some(id) = input.product_vat_category_id {
            match VatCategory::from_id(id) {
                Some(category) => return Ok(category),
                None => warn!(category_id = id, "unknown VAT category on product"),
            }
        }

        Ok(settings.vat_default_category)
    }

    /// Fresh, valid VIES entry when the line qualifies for reverse charge.
    async fn reverse_charge_entry(
        &self,
        input: &VatInput,
        country: &str,
        settings: &StoreVatSettings,
    ) -> Result<Option<ViesCacheEntry>, VatError> {
        if !settings.vat_b2b_reverse_charge_enabled {
            return Ok(None);
        }
        if country == normalize_country(&settings.vat_country_code) {
            return Ok(None);
        }
        let Some(vat_number) = input
            .customer_vat_number
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };

        Ok(self.vies.cached(vat_number).await?.filter(|e| e.is_valid))
    }

    fn lookup_rate(&self, country: &str, category: VatCategory) -> Result<AppliedRate, VatError> {
        let rate_type = category.rate_type();
        if let Some(rate) = self.cache.get(country, rate_type) {
            return Ok(AppliedRate {
                rate,
                rate_type,
                used_fallback: false,
            });
        }

        match self.cache.get(country, RateType::Standard) {
            Some(rate) => {
                if rate_type != RateType::Standard {
                    warn!(country, %rate_type, "no rate for category, using standard rate");
                }
                Ok(AppliedRate {
                    rate,
                    rate_type: RateType::Standard,
                    used_fallback: true,
                })
            }
            None => Err(VatError::RateNotFound {
                country: country.to_string(),
                rate_type,
            }),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn line(
    input: &VatInput,
    country_code: String,
    category: VatCategory,
    applied: AppliedRate,
    amounts: UnitAmounts,
    quantity: i32,
    exempt_reason: Option<ExemptReason>,
    vies: Option<ViesCacheEntry>,
) -> VatCalculationResult {
    let qty = Decimal::from(quantity);
    let (company_name, company_address) = vies
        .map(|e| (e.company_name, e.company_address))
        .unwrap_or_default();

    VatCalculationResult {
        product_id: input.product_id,
        country_code,
        category,
        rate: applied.rate,
        rate_type: applied.rate_type,
        used_fallback_rate: applied.used_fallback,
        net_amount: amounts.net,
        vat_amount: amounts.vat,
        gross_amount: amounts.gross,
        quantity,
        line_net: amounts.net * qty,
        line_vat: amounts.vat * qty,
        line_gross: amounts.gross * qty,
        reverse_charge: exempt_reason == Some(ExemptReason::ReverseCharge),
        exempt_reason,
        company_name,
        company_address,
    }
}
