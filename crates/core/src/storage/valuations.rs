use crate::storage::{contains_pattern, LabelCount, LIKE_ESCAPE};
use crate::valuation::{PropertyType, ValuationInput, ValuationResult, ValuationStatus};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};

pub const DEFAULT_RECENT_LIMIT: i64 = 10;
pub const DEFAULT_BY_LOCATION_LIMIT: i64 = 5;

/// A persisted valuation: the input columns, the computed figures and request bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StoredValuation {
    pub id: i64,

    pub location: String,
    pub property_type: String,
    pub surface: f64,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floor: Option<String>,
    pub year_built: Option<i32>,
    pub neighborhood: Option<String>,
    pub distance_to_beach: Option<f64>,
    pub distance_to_center: Option<f64>,
    pub transport_score: Option<i32>,
    pub amenities_score: Option<i32>,
    pub condition: Option<String>,
    pub renovation_needed: bool,
    pub estimated_renovation_cost: Option<f64>,
    pub current_market_price: Option<f64>,

    pub estimated_value: Option<f64>,
    pub price_per_sqm: Option<f64>,
    pub rental_potential_monthly: Option<f64>,
    pub rental_yield_percentage: Option<f64>,
    pub confidence_score: Option<f64>,
    pub recommendations: Vec<String>,
    pub investment_potential: Option<String>,
    pub roi_1year: Option<f64>,
    pub roi_3year: Option<f64>,
    pub roi_5year: Option<f64>,
    pub risk_level: Option<String>,
    pub risk_factors: Vec<String>,
    pub market_trend: Option<String>,

    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub requester_phone: Option<String>,
    pub request_purpose: String,

    pub status: String,
    pub error: Option<String>,
    pub processing_time_seconds: Option<f64>,
    pub as_of_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StoredValuation {
    pub fn is_completed(&self) -> bool {
        self.status == ValuationStatus::Completed.as_str()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValuationFilter {
    /// Substring match.
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub status: Option<String>,
    pub requester_email: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LocationStat {
    pub location: String,
    pub count: i64,
    pub avg_price_per_sqm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PropertyTypeStat {
    pub property_type: String,
    pub count: i64,
    pub avg_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValuationStats {
    pub total_valuations: i64,
    pub completed_valuations: i64,
    pub average_confidence_score: f64,
    pub average_processing_time: f64,
    pub top_locations: Vec<LocationStat>,
    pub property_types: Vec<PropertyTypeStat>,
    pub investment_potential: Vec<LabelCount>,
    pub risk_levels: Vec<LabelCount>,
}

/// Persists one valuation call, successful or not.
pub async fn insert_valuation(
    pool: &sqlx::PgPool,
    input: &ValuationInput,
    result: &ValuationResult,
    processing_time_seconds: f64,
) -> anyhow::Result<StoredValuation> {
    let f = result.figures.as_ref();

    let row = sqlx::query_as::<_, StoredValuation>(
        "INSERT INTO property_valuations ( \
            location, property_type, surface, rooms, bathrooms, floor, year_built, \
            neighborhood, distance_to_beach, distance_to_center, transport_score, amenities_score, \
            condition, renovation_needed, estimated_renovation_cost, current_market_price, \
            estimated_value, price_per_sqm, rental_potential_monthly, rental_yield_percentage, \
            confidence_score, recommendations, investment_potential, roi_1year, roi_3year, roi_5year, \
            risk_level, risk_factors, market_trend, \
            requester_name, requester_email, requester_phone, request_purpose, \
            status, error, processing_time_seconds, as_of_date, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                 $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, \
                 $30, $31, $32, $33, $34, $35, $36, $37, \
                 CASE WHEN $34 = 'completed' THEN now() END) \
         RETURNING *",
    )
    .bind(&input.location)
    .bind(input.property_type.as_str())
    .bind(input.surface)
    .bind(input.rooms)
    .bind(input.bathrooms)
    .bind(&input.floor)
    .bind(input.year_built)
    .bind(&input.neighborhood)
    .bind(input.distance_to_beach)
    .bind(input.distance_to_center)
    .bind(input.transport_score)
    .bind(input.amenities_score)
    .bind(input.condition.as_ref().map(|c| c.as_str().to_string()))
    .bind(input.renovation_needed)
    .bind(input.estimated_renovation_cost)
    .bind(input.current_market_price)
    .bind(f.map(|f| f.estimated_value))
    .bind(f.map(|f| f.price_per_sqm))
    .bind(f.map(|f| f.rental_potential_monthly))
    .bind(f.map(|f| f.rental_yield_percentage))
    .bind(f.map(|f| f.confidence_score))
    .bind(f.map(|f| f.recommendations.clone()).unwrap_or_default())
    .bind(f.map(|f| f.investment_potential.as_str()))
    .bind(f.map(|f| f.roi_1year))
    .bind(f.map(|f| f.roi_3year))
    .bind(f.map(|f| f.roi_5year))
    .bind(f.map(|f| f.risk_level.as_str()))
    .bind(f.map(|f| f.risk_factors.clone()).unwrap_or_default())
    .bind(f.map(|f| f.market_trend.as_str()))
    .bind(&input.requester.name)
    .bind(&input.requester.email)
    .bind(&input.requester.phone)
    .bind(&input.request_purpose)
    .bind(result.status.as_str())
    .bind(&result.error)
    .bind(processing_time_seconds)
    .bind(result.as_of_date)
    .fetch_one(pool)
    .await
    .context("insert property_valuations failed")?;

    Ok(row)
}

pub async fn get_valuation(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<StoredValuation>> {
    sqlx::query_as::<_, StoredValuation>("SELECT * FROM property_valuations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("select property_valuation failed")
}

pub async fn list_valuations(
    pool: &sqlx::PgPool,
    filter: &ValuationFilter,
) -> anyhow::Result<Vec<StoredValuation>> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM property_valuations WHERE TRUE");
    if let Some(location) = &filter.location {
        qb.push(" AND location ILIKE ")
            .push_bind(contains_pattern(location))
            .push(LIKE_ESCAPE);
    }
    if let Some(property_type) = &filter.property_type {
        // Spanish labels are stored under their canonical name.
        let canonical = PropertyType::parse(property_type)
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| property_type.clone());
        qb.push(" AND property_type = ").push_bind(canonical);
    }
    if let Some(status) = &filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(email) = &filter.requester_email {
        qb.push(" AND lower(requester_email) = lower(").push_bind(email).push(")");
    }
    qb.push(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }

    qb.build_query_as::<StoredValuation>()
        .fetch_all(pool)
        .await
        .context("select property_valuations failed")
}

/// Latest completed valuations.
pub async fn recent_valuations(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<Vec<StoredValuation>> {
    sqlx::query_as::<_, StoredValuation>(
        "SELECT * FROM property_valuations WHERE status = 'completed' \
         ORDER BY created_at DESC, id DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("select recent property_valuations failed")
}

/// Latest completed valuations whose location contains `location`.
pub async fn valuations_by_location(
    pool: &sqlx::PgPool,
    location: &str,
    limit: i64,
) -> anyhow::Result<Vec<StoredValuation>> {
    sqlx::query_as::<_, StoredValuation>(
        "SELECT * FROM property_valuations WHERE status = 'completed' AND location ILIKE $1 ESCAPE '\\' \
         ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(contains_pattern(location))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("select property_valuations by location failed")
}

pub async fn valuation_stats(pool: &sqlx::PgPool) -> anyhow::Result<ValuationStats> {
    let (total_valuations, completed_valuations, average_confidence_score, average_processing_time): (
        i64,
        i64,
        f64,
        f64,
    ) = sqlx::query_as(
        "SELECT count(*), \
                count(*) FILTER (WHERE status = 'completed'), \
                COALESCE(AVG(confidence_score), 0)::float8, \
                COALESCE(AVG(processing_time_seconds), 0)::float8 \
         FROM property_valuations",
    )
    .fetch_one(pool)
    .await
    .context("select valuation totals failed")?;

    let top_locations = sqlx::query_as::<_, LocationStat>(
        "SELECT location, count(*) AS count, COALESCE(AVG(price_per_sqm), 0)::float8 AS avg_price_per_sqm \
         FROM property_valuations GROUP BY location ORDER BY count(*) DESC, location LIMIT 10",
    )
    .fetch_all(pool)
    .await
    .context("select valuations by location failed")?;

    let property_types = sqlx::query_as::<_, PropertyTypeStat>(
        "SELECT property_type, count(*) AS count, COALESCE(AVG(estimated_value), 0)::float8 AS avg_value \
         FROM property_valuations GROUP BY property_type ORDER BY count(*) DESC, property_type",
    )
    .fetch_all(pool)
    .await
    .context("select valuations by property type failed")?;

    let investment_potential = sqlx::query_as::<_, LabelCount>(
        "SELECT investment_potential AS label, count(*) AS count FROM property_valuations \
         GROUP BY investment_potential ORDER BY count(*) DESC",
    )
    .fetch_all(pool)
    .await
    .context("select valuations by investment potential failed")?;

    let risk_levels = sqlx::query_as::<_, LabelCount>(
        "SELECT risk_level AS label, count(*) AS count FROM property_valuations \
         GROUP BY risk_level ORDER BY count(*) DESC",
    )
    .fetch_all(pool)
    .await
    .context("select valuations by risk level failed")?;

    Ok(ValuationStats {
        total_valuations,
        completed_valuations,
        average_confidence_score,
        average_processing_time,
        top_locations,
        property_types,
        investment_potential,
        risk_levels,
    })
}
