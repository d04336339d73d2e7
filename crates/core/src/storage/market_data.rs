use crate::storage::{contains_pattern, LIKE_ESCAPE};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};

pub const MARKET_DATA_LIMIT: i64 = 100;

/// Aggregated market statistics for one location and property type at a given date.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MarketData {
    pub id: i64,
    pub location: String,
    pub property_type: String,

    pub average_price_per_sqm: Option<f64>,
    pub median_price_per_sqm: Option<f64>,
    pub min_price_per_sqm: Option<f64>,
    pub max_price_per_sqm: Option<f64>,

    pub properties_sold_last_month: Option<i32>,
    pub average_days_on_market: Option<i32>,
    pub price_trend_percentage: Option<f64>,

    pub average_rental_yield: Option<f64>,
    pub average_rental_price_per_sqm: Option<f64>,
    pub occupancy_rate: Option<f64>,

    pub data_source: Option<String>,
    pub confidence_level: Option<f64>,
    pub sample_size: Option<i32>,

    pub data_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

pub async fn list_market_data(
    pool: &sqlx::PgPool,
    location: Option<&str>,
    property_type: Option<&str>,
) -> anyhow::Result<Vec<MarketData>> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM market_data WHERE TRUE");
    if let Some(location) = location {
        qb.push(" AND location ILIKE ")
            .push_bind(contains_pattern(location))
            .push(LIKE_ESCAPE);
    }
    if let Some(property_type) = property_type {
        qb.push(" AND property_type = ").push_bind(property_type.to_string());
    }
    qb.push(" ORDER BY data_date DESC, id DESC LIMIT ")
        .push_bind(MARKET_DATA_LIMIT);

    qb.build_query_as::<MarketData>()
        .fetch_all(pool)
        .await
        .context("select market_data failed")
}
