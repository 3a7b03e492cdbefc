use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument, warn};

use super::{CatalogStore, RateChanges, RateStore, ViesCacheStore};
use crate::config::DatabaseConfig;
use crate::core::{
    ProductVatOverride, RateType, StoreVatSettings, VatCategory, VatError, VatRate,
    ViesCacheEntry, normalize_country,
};

#[derive(Debug, FromRow)]
struct VatRateRow {
    id: i64,
    country_code: String,
    rate_type: String,
    rate: Decimal,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
    source: String,
    synced_at: DateTime<Utc>,
}

impl TryFrom<VatRateRow> for VatRate {
    type Error = VatError;

    fn try_from(row: VatRateRow) -> Result<Self, Self::Error> {
        let rate_type = RateType::from_code(&row.rate_type).ok_or_else(|| {
            VatError::Storage(format!(
                "vat_rates.id={} has unknown rate_type '{}'",
                row.id, row.rate_type
            ))
        })?;
        Ok(VatRate {
            id: row.id,
            country_code: row.country_code,
            rate_type,
            rate: row.rate,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            source: row.source,
            synced_at: row.synced_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ViesCacheRow {
    vat_number: String,
    is_valid: bool,
    company_name: Option<String>,
    company_address: Option<String>,
    consultation_number: Option<String>,
    validated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<ViesCacheRow> for ViesCacheEntry {
    fn from(row: ViesCacheRow) -> Self {
        Self {
            vat_number: row.vat_number,
            is_valid: row.is_valid,
            company_name: row.company_name,
            company_address: row.company_address,
            consultation_number: row.consultation_number,
            validated_at: row.validated_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    vat_enabled: bool,
    vat_country_code: String,
    vat_prices_include_vat: bool,
    vat_default_category: String,
    vat_b2b_reverse_charge_enabled: bool,
}

#[derive(Debug, FromRow)]
struct OverrideRow {
    product_id: i64,
    country_code: String,
    vat_category_id: i32,
    notes: Option<String>,
}

const RATE_COLUMNS: &str =
    "id, country_code, rate_type, rate, valid_from, valid_to, source, synced_at";

/// Postgres-backed store over a pooled connection.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a connection pool using `config.url`.
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, VatError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| VatError::Config("database url is not set".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the VAT tables and seed `vat_categories`.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), VatError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| VatError::Storage(format!("migration failed: {e}")))?;
        info!("database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl RateStore for PgStore {
    async fn active_rates(&self) -> Result<Vec<VatRate>, VatError> {
        let rows = sqlx::query_as::<_, VatRateRow>(&format!(
            "SELECT {RATE_COLUMNS} FROM vat_rates WHERE valid_to IS NULL ORDER BY country_code, rate_type"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(VatRate::try_from).collect()
    }

    #[instrument(skip(self, changes), fields(
        unchanged = changes.unchanged.len(),
        superseded = changes.superseded.len(),
        inserted = changes.inserted.len(),
    ))]
    async fn apply_changes(
        &self,
        changes: &RateChanges,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VatError> {
        let today = now.date_naive();
        let mut tx = self.pool.begin().await?;

        if !changes.unchanged.is_empty() {
            sqlx::query("UPDATE vat_rates SET synced_at = $1 WHERE id = ANY($2)")
                .bind(now)
                .bind(&changes.unchanged)
                .execute(&mut *tx)
                .await?;
        }

        if !changes.superseded.is_empty() {
            sqlx::query(
                "UPDATE vat_rates SET valid_to = $1, synced_at = $2 WHERE id = ANY($3) AND valid_to IS NULL",
            )
            .bind(today)
            .bind(now)
            .bind(&changes.superseded)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &changes.inserted {
            sqlx::query(
                r#"
                INSERT INTO vat_rates (country_code, rate_type, rate, valid_from, valid_to, source, synced_at)
                VALUES ($1, $2, $3, $4, NULL, $5, $6)
                "#,
            )
            .bind(&entry.country_code)
            .bind(entry.rate_type.code())
            .bind(entry.rate)
            .bind(today)
            .bind(source)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn rate_history(
        &self,
        country_code: &str,
        rate_type: RateType,
    ) -> Result<Vec<VatRate>, VatError> {
        let rows = sqlx::query_as::<_, VatRateRow>(&format!(
            "SELECT {RATE_COLUMNS} FROM vat_rates WHERE country_code = $1 AND rate_type = $2 ORDER BY valid_from, id"
        ))
        .bind(normalize_country(country_code))
        .bind(rate_type.code())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(VatRate::try_from).collect()
    }
}

#[async_trait]
impl ViesCacheStore for PgStore {
    async fn get_entry(&self, vat_number: &str) -> Result<Option<ViesCacheEntry>, VatError> {
        let row = sqlx::query_as::<_, ViesCacheRow>(
            r#"
            SELECT vat_number, is_valid, company_name, company_address, consultation_number, validated_at, expires_at
            FROM vies_validation_cache
            WHERE vat_number = $1
            "#,
        )
        .bind(vat_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ViesCacheEntry::from))
    }

    async fn upsert_entry(&self, entry: &ViesCacheEntry) -> Result<(), VatError> {
        sqlx::query(
            r#"
            INSERT INTO vies_validation_cache
                (vat_number, is_valid, company_name, company_address, consultation_number, validated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (vat_number) DO UPDATE SET
                is_valid = EXCLUDED.is_valid,
                company_name = EXCLUDED.company_name,
                company_address = EXCLUDED.company_address,
                consultation_number = EXCLUDED.consultation_number,
                validated_at = EXCLUDED.validated_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&entry.vat_number)
        .bind(entry.is_valid)
        .bind(&entry.company_name)
        .bind(&entry.company_address)
        .bind(&entry.consultation_number)
        .bind(entry.validated_at)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn store_settings(&self) -> Result<StoreVatSettings, VatError> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT vat_enabled, vat_country_code, vat_prices_include_vat,
                   vat_default_category, vat_b2b_reverse_charge_enabled
            FROM store_settings
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            warn!("store_settings row missing, VAT treated as disabled");
            return Ok(StoreVatSettings::default());
        };

        let vat_default_category =
            VatCategory::from_code(&row.vat_default_category).unwrap_or_else(|| {
                warn!(
                    category = %row.vat_default_category,
                    "unknown default VAT category, using standard"
                );
                VatCategory::Standard
            });

        Ok(StoreVatSettings {
            vat_enabled: row.vat_enabled,
            vat_country_code: normalize_country(&row.vat_country_code),
            vat_prices_include_vat: row.vat_prices_include_vat,
            vat_default_category,
            vat_b2b_reverse_charge_enabled: row.vat_b2b_reverse_charge_enabled,
        })
    }

    async fn product_override(
        &self,
        product_id: i64,
        country_code: &str,
    ) -> Result<Option<ProductVatOverride>, VatError> {
        let row = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT product_id, country_code, vat_category_id, notes
            FROM product_vat_overrides
            WHERE product_id = $1 AND country_code = $2
            "#,
        )
        .bind(product_id)
        .bind(normalize_country(country_code))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ProductVatOverride {
            product_id: r.product_id,
            country_code: r.country_code,
            vat_category_id: r.vat_category_id,
            notes: r.notes,
        }))
    }
}
