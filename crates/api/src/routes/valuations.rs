use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use inmo_core::domain::contract::{CompareRequest, ValuationRequest};
use inmo_core::error::CoreError;
use inmo_core::storage::{self, market_data, valuations};
use inmo_core::time::season::today_in_madrid;
use inmo_core::valuation::compare::compare_properties;
use inmo_core::valuation::renovation::propose_renovation;
use inmo_core::valuation::{compute_valuation, ValuationFigures, ValuationInput};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const QUICK_RECOMMENDATIONS: usize = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/valuation/property", post(value_property))
        .route("/valuation/quick", post(quick_valuation))
        .route("/valuation/compare", post(compare))
        .route("/valuation/stats", get(stats))
        .route("/valuation/renovation-proposal", post(renovation_proposal))
        .route("/valuation/:id", get(get_valuation))
        .route("/valuations", get(list_valuations))
        .route("/valuations/recent", get(recent_valuations))
        .route("/valuations/by-location/:location", get(by_location))
        .route("/market-data", get(list_market_data))
}

/// Computes, persists and returns the stored row. A failed computation is stored too, then
/// reported as an internal error.
async fn value_and_store(
    state: &AppState,
    input: &ValuationInput,
) -> ApiResult<(valuations::StoredValuation, ValuationFigures, f64)> {
    let pool = state.db()?;
    let started = Instant::now();
    let result = compute_valuation(input, today_in_madrid());
    let processing_time = started.elapsed().as_secs_f64();

    let stored = valuations::insert_valuation(pool, input, &result, processing_time).await?;
    match result.figures {
        Some(figures) => {
            tracing::info!(
                valuation_id = stored.id,
                location = %input.location,
                estimated_value = figures.estimated_value,
                "valuation completed"
            );
            Ok((stored, figures, processing_time))
        }
        None => {
            let message = result.error.unwrap_or_default();
            Err(ApiError::Internal(
                CoreError::Computation(format!("valuation {} failed: {message}", stored.id)).into(),
            ))
        }
    }
}

async fn value_property(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ValuationRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let input = req.validate_and_into_input()?;
    let (stored, _, processing_time) = value_and_store(&state, &input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "valuation": stored,
            "message": "Property valuation completed successfully",
            "processing_time": format!("{processing_time:.2} seconds"),
        })),
    ))
}

async fn quick_valuation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ValuationRequest>,
) -> ApiResult<Json<Value>> {
    let input = req.validate_and_into_quick_input()?;
    let (stored, figures, _) = value_and_store(&state, &input).await?;
    let top: Vec<&String> = figures
        .recommendations
        .iter()
        .take(QUICK_RECOMMENDATIONS)
        .collect();
    Ok(Json(json!({
        "success": true,
        "valuation_id": stored.id,
        "estimated_value": figures.estimated_value,
        "price_per_sqm": figures.price_per_sqm,
        "rental_potential_monthly": figures.rental_potential_monthly,
        "rental_yield_percentage": figures.rental_yield_percentage,
        "roi_1year": figures.roi_1year,
        "investment_potential": figures.investment_potential,
        "confidence_score": figures.confidence_score,
        "recommendations": top,
        "message": "Valoración completada. Un experto te contactará pronto para análisis detallado.",
    })))
}

async fn compare(ApiJson(req): ApiJson<CompareRequest>) -> ApiResult<Json<Value>> {
    let inputs = req.validate_and_into_inputs()?;
    let comparison = compare_properties(&inputs, today_in_madrid())?;
    Ok(Json(json!({
        "success": true,
        "comparisons": comparison.comparisons,
        "analysis": {
            "best_roi": comparison.best_roi,
            "best_value": comparison.best_value,
            "total_properties": comparison.total_properties,
        },
        "message": "Property comparison completed successfully",
    })))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

async fn renovation_proposal(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ValuationRequest>,
) -> ApiResult<Json<Value>> {
    let input = req.validate_and_into_renovation_input()?;
    let (stored, figures, _) = value_and_store(&state, &input).await?;

    let mut proposal = propose_renovation(&input, &figures);
    proposal.payback_period_months = round_to(proposal.payback_period_months, 1);
    proposal.roi_first_year = round_to(proposal.roi_first_year, 2);

    Ok(Json(json!({
        "success": true,
        "valuation_id": stored.id,
        "renovation_proposal": proposal,
        "confidence_score": figures.confidence_score,
        "message": "Propuesta de reforma generada. Te contactaremos para concretar detalles.",
    })))
}

async fn get_valuation(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let valuation = valuations::get_valuation(state.db()?, id)
        .await?
        .ok_or_else(|| ApiError::not_found("valuation"))?;
    Ok(Json(json!({ "success": true, "valuation": valuation })))
}

#[derive(Debug, Default, Deserialize)]
struct ValuationListQuery {
    location: Option<String>,
    property_type: Option<String>,
    status: Option<String>,
    email: Option<String>,
    limit: Option<i64>,
}

async fn list_valuations(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(q): ApiQuery<ValuationListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = valuations::ValuationFilter {
        location: q.location,
        property_type: q.property_type,
        status: q.status,
        requester_email: q.email,
        limit: Some(storage::clamp_limit(q.limit, DEFAULT_LIST_LIMIT)),
    };
    let rows = valuations::list_valuations(state.db()?, &filter).await?;
    Ok(Json(json!({
        "success": true,
        "total": rows.len(),
        "valuations": rows,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

async fn recent_valuations(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let limit = storage::clamp_limit(q.limit, valuations::DEFAULT_RECENT_LIMIT);
    let rows = valuations::recent_valuations(state.db()?, limit).await?;
    Ok(Json(json!({ "success": true, "valuations": rows })))
}

async fn by_location(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(location): ApiPath<String>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let limit = storage::clamp_limit(q.limit, valuations::DEFAULT_BY_LOCATION_LIMIT);
    let rows = valuations::valuations_by_location(state.db()?, &location, limit).await?;
    Ok(Json(json!({
        "success": true,
        "location": location,
        "valuations": rows,
    })))
}

async fn stats(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<Json<Value>> {
    let stats = valuations::valuation_stats(state.db()?).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

#[derive(Debug, Default, Deserialize)]
struct MarketDataQuery {
    location: Option<String>,
    property_type: Option<String>,
}

async fn list_market_data(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<MarketDataQuery>,
) -> ApiResult<Json<Value>> {
    let rows = market_data::list_market_data(
        state.db()?,
        q.location.as_deref(),
        q.property_type.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "success": true, "market_data": rows })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_to(12.345, 1), 12.3);
        assert_eq!(round_to(7.126, 2), 7.13);
    }
}
