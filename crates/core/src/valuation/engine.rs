use super::tables::{self, ANNUAL_APPRECIATION};
use super::{
    Condition, InvestmentPotential, Multipliers, PropertyType, RiskLevel, ValuationFigures,
    ValuationInput, ValuationResult,
};
use crate::error::{CoreError, CoreResult};
use crate::time::season::Season;
use chrono::{Datelike, NaiveDate};

const CONFIDENCE_BASE: f64 = 85.0;
const CONFIDENCE_MIN: f64 = 60.0;
const CONFIDENCE_MAX: f64 = 95.0;

const AGE_RISK_YEARS: i32 = 40;
const SMALL_SURFACE_M2: f64 = 35.0;
const LARGE_SURFACE_M2: f64 = 200.0;

const COMPUTATION_FAILED: &str = "valuation could not be computed";

/// Values a property as of `as_of`. Reads nothing but its arguments.
///
/// Any non-finite intermediate marks the result as errored and drops every figure.
pub fn compute_valuation(input: &ValuationInput, as_of: NaiveDate) -> ValuationResult {
    match compute_figures(input, as_of) {
        Ok(figures) => ValuationResult::completed(as_of, figures),
        Err(err) => {
            tracing::warn!(
                location = %input.location,
                surface = input.surface,
                error = %err,
                "valuation failed"
            );
            ValuationResult::failed(as_of, COMPUTATION_FAILED)
        }
    }
}

fn compute_figures(input: &ValuationInput, as_of: NaiveDate) -> CoreResult<ValuationFigures> {
    let location = tables::normalize_location(&input.location);
    let season = Season::of(as_of);

    let base_price_per_sqm = tables::base_price_per_sqm(&input.location);
    let base_value = finite("base_value", base_price_per_sqm * input.surface)?;

    let multipliers = Multipliers {
        size: tables::size_multiplier(input.surface),
        condition: condition_multiplier(input.condition.as_ref()),
        location: finite("location_multiplier", location_multiplier(input))?,
        market: season.market_multiplier(),
    };

    let estimated_value = finite(
        "estimated_value",
        base_value * multipliers.size * multipliers.condition * multipliers.location * multipliers.market,
    )?;
    let price_per_sqm = if input.surface > 0.0 {
        finite("price_per_sqm", estimated_value / input.surface)?
    } else {
        0.0
    };

    let rental_rate = rental_rate(&location, input.property_type);
    let rental_potential_monthly = finite("rental_potential_monthly", estimated_value * rental_rate)?;
    let rental_yield_percentage = if estimated_value > 0.0 {
        finite(
            "rental_yield_percentage",
            (rental_potential_monthly * 12.0 / estimated_value) * 100.0,
        )?
    } else {
        0.0
    };

    let (roi_1year, roi_3year, roi_5year) = roi_projections(rental_yield_percentage);
    let (risk_score, risk_factors) = assess_risk(input, &location, as_of);
    let investment_potential = InvestmentPotential::from_roi_1year(roi_1year);

    Ok(ValuationFigures {
        base_price_per_sqm,
        base_value,
        multipliers,
        estimated_value,
        price_per_sqm,
        rental_potential_monthly,
        rental_yield_percentage,
        roi_1year,
        roi_3year,
        roi_5year,
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        risk_factors,
        investment_potential,
        confidence_score: confidence_score(input, &location),
        recommendations: recommendations(
            input,
            &location,
            investment_potential,
            rental_yield_percentage,
        ),
        market_trend: season.market_trend(),
    })
}

fn finite(step: &str, value: f64) -> CoreResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoreError::Computation(format!("{step} is not finite ({value})")))
    }
}

pub fn condition_multiplier(condition: Option<&Condition>) -> f64 {
    match condition {
        Some(Condition::Excellent) => 1.15,
        Some(Condition::Good) => 1.0,
        Some(Condition::Fair) => 0.85,
        Some(Condition::Poor) => 0.70,
        Some(Condition::Other(_)) | None => 1.0,
    }
}

pub fn location_multiplier(input: &ValuationInput) -> f64 {
    let mut multiplier = 1.0;
    if let Some(distance) = input.distance_to_beach {
        multiplier *= tables::beach_multiplier(distance);
    }
    if let Some(score) = input.transport_score {
        multiplier *= 0.9 + f64::from(score) / 100.0;
    }
    if let Some(score) = input.amenities_score {
        multiplier *= 0.95 + f64::from(score) / 200.0;
    }
    multiplier
}

fn rental_rate(location: &str, property_type: PropertyType) -> f64 {
    let mut rate = if tables::mentions_any(location, &tables::PREMIUM_RENTAL_LOCALITIES) {
        tables::PREMIUM_RENTAL_RATE
    } else if tables::mentions_any(location, &tables::COASTAL_RENTAL_LOCALITIES) {
        tables::COASTAL_RENTAL_RATE
    } else {
        tables::BASE_RENTAL_RATE
    };

    match property_type {
        PropertyType::Studio => rate *= 1.1,
        PropertyType::Villa => rate *= 0.9,
        PropertyType::Apartment | PropertyType::House => {}
    }
    rate
}

/// Appreciation compounds, rental income does not.
fn roi_projections(rental_yield_percentage: f64) -> (f64, f64, f64) {
    let rental_yield = rental_yield_percentage / 100.0;
    let appreciation = |years: i32| (1.0 + ANNUAL_APPRECIATION).powi(years) - 1.0;

    let roi_1year = rental_yield * 100.0;
    let roi_3year = (appreciation(3) + rental_yield * 3.0) * 100.0;
    let roi_5year = (appreciation(5) + rental_yield * 5.0) * 100.0;
    (roi_1year, roi_3year, roi_5year)
}

fn assess_risk(input: &ValuationInput, location: &str, as_of: NaiveDate) -> (u32, Vec<String>) {
    let mut score = 0;
    let mut factors = Vec::new();

    if tables::mentions(location, "barcelona") {
        score += 1;
        factors.push("Mercado muy competitivo en Barcelona".to_string());
    }

    if let Some(year_built) = input.year_built {
        if as_of.year() - year_built > AGE_RISK_YEARS {
            score += 2;
            factors.push("Propiedad antigua, posibles gastos de mantenimiento".to_string());
        }
    }

    if input.surface < SMALL_SURFACE_M2 {
        score += 1;
        factors.push("Superficie pequeña, mercado limitado".to_string());
    } else if input.surface > LARGE_SURFACE_M2 {
        score += 1;
        factors.push("Superficie grande, menor liquidez".to_string());
    }

    if input.condition.as_ref().is_some_and(Condition::needs_attention) {
        score += 2;
        factors.push("Estado de conservación requiere atención".to_string());
    }

    if input.renovation_needed {
        score += 2;
        factors.push("Necesita renovación, costes adicionales".to_string());
    }

    (score, factors)
}

fn confidence_score(input: &ValuationInput, location: &str) -> f64 {
    let mut confidence = CONFIDENCE_BASE;

    if input.year_built.is_none() {
        confidence -= 5.0;
    }
    if input.condition.is_none() {
        confidence -= 5.0;
    }
    if input.distance_to_beach.is_none() {
        confidence -= 3.0;
    }
    if input.transport_score.is_none() {
        confidence -= 3.0;
    }
    if input.amenities_score.is_none() {
        confidence -= 3.0;
    }

    if input.rooms.is_some() && input.bathrooms.is_some() && input.floor.is_some() {
        confidence += 5.0;
    }
    if tables::mentions_any(location, &tables::KNOWN_LOCALITIES) {
        confidence += 5.0;
    }

    confidence.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

// Order matters: some callers only show the first few entries.
fn recommendations(
    input: &ValuationInput,
    location: &str,
    potential: InvestmentPotential,
    rental_yield_percentage: f64,
) -> Vec<String> {
    let headline = match potential {
        InvestmentPotential::Excellent => "Excelente oportunidad de inversión con alta rentabilidad",
        InvestmentPotential::Good => "Buena oportunidad de inversión",
        InvestmentPotential::Fair => "Inversión moderada, considerar otros factores",
        InvestmentPotential::Poor => "Rentabilidad baja, evaluar cuidadosamente",
    };
    let mut out = vec![headline.to_string()];

    if input.renovation_needed {
        out.push("Considerar el programa 'Reforma sin Coste'".to_string());
    }
    if input.distance_to_beach.is_some_and(|d| d <= 1.0) {
        out.push("Proximidad a la playa aumenta potencial turístico".to_string());
    }
    if input.property_type == PropertyType::Studio && tables::mentions(location, "barcelona") {
        out.push("Estudios en Barcelona tienen alta demanda de alquiler".to_string());
    }
    if rental_yield_percentage > 7.0 {
        out.push("Excelente potencial de alquiler turístico".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::season::MarketTrend;
    use crate::valuation::ValuationStatus;

    fn november() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 15).unwrap()
    }

    fn july() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn barcelona_80() -> ValuationInput {
        let mut input = ValuationInput::new("Barcelona", PropertyType::Apartment, 80.0);
        input.condition = Some(Condition::Good);
        input
    }

    #[test]
    fn barcelona_apartment_in_november() {
        let result = compute_valuation(&barcelona_80(), november());
        assert_eq!(result.status, ValuationStatus::Completed);
        let f = result.figures.unwrap();

        assert_eq!(f.base_value, 360_000.0);
        assert_eq!(f.multipliers.size, 0.98);
        assert_eq!(f.multipliers.condition, 1.0);
        assert_eq!(f.multipliers.location, 1.0);
        assert_eq!(f.multipliers.market, 0.98);
        assert!(close(f.estimated_value, 345_744.0, 1e-6));
        assert!(close(f.price_per_sqm * 80.0, f.estimated_value, 1e-6));
        assert!(close(f.rental_potential_monthly, 2420.208, 1e-6));
        assert!(close(f.rental_yield_percentage, 8.4, 1e-9));
        assert!(close(f.roi_1year, 8.4, 1e-9));
        assert_eq!(f.investment_potential, InvestmentPotential::Excellent);
        assert_eq!(f.market_trend, MarketTrend::Declining);

        assert_eq!(f.risk_score, 1);
        assert_eq!(f.risk_level, RiskLevel::Low);
        assert_eq!(f.risk_factors, vec!["Mercado muy competitivo en Barcelona"]);

        // 85 - 5 (year) - 3 * 3 (beach, transport, amenities) + 5 (known locality)
        assert_eq!(f.confidence_score, 76.0);

        assert_eq!(
            f.recommendations,
            vec![
                "Excelente oportunidad de inversión con alta rentabilidad",
                "Excelente potencial de alquiler turístico",
            ]
        );
    }

    #[test]
    fn roi_projection_formula() {
        let f = compute_valuation(&barcelona_80(), november()).figures.unwrap();
        let y = f.rental_yield_percentage / 100.0;
        assert!(close(f.roi_3year, ((1.04f64).powi(3) - 1.0 + y * 3.0) * 100.0, 1e-9));
        assert!(close(f.roi_5year, ((1.04f64).powi(5) - 1.0 + y * 5.0) * 100.0, 1e-9));
        assert!(close(f.roi_3year, 37.6864, 1e-9));
    }

    #[test]
    fn zero_surface_gives_zero_price_per_sqm() {
        let input = ValuationInput::new("Barcelona", PropertyType::Apartment, 0.0);
        let result = compute_valuation(&input, november());
        assert!(result.is_completed());
        let f = result.figures.unwrap();
        assert_eq!(f.estimated_value, 0.0);
        assert_eq!(f.price_per_sqm, 0.0);
        assert_eq!(f.rental_yield_percentage, 0.0);
        assert_eq!(f.investment_potential, InvestmentPotential::Poor);
    }

    #[test]
    fn unrecognised_condition_is_neutral() {
        let mut input = barcelona_80();
        input.condition = Some(Condition::from("unknown_value"));
        let f = compute_valuation(&input, november()).figures.unwrap();
        assert_eq!(f.multipliers.condition, 1.0);
        assert!(close(f.estimated_value, 345_744.0, 1e-6));
        // Present, so no confidence penalty and no condition risk.
        assert_eq!(f.confidence_score, 76.0);
        assert_eq!(f.risk_score, 1);
    }

    #[test]
    fn condition_multipliers() {
        assert_eq!(condition_multiplier(Some(&Condition::Excellent)), 1.15);
        assert_eq!(condition_multiplier(Some(&Condition::Good)), 1.0);
        assert_eq!(condition_multiplier(Some(&Condition::Fair)), 0.85);
        assert_eq!(condition_multiplier(Some(&Condition::Poor)), 0.70);
        assert_eq!(condition_multiplier(None), 1.0);
    }

    #[test]
    fn location_bonuses_compound() {
        let mut input = ValuationInput::new("Sitges", PropertyType::Villa, 180.0);
        input.distance_to_beach = Some(0.3);
        input.transport_score = Some(8);
        input.amenities_score = Some(6);
        let expected = 1.2 * (0.9 + 8.0 / 100.0) * (0.95 + 6.0 / 200.0);
        assert!(close(location_multiplier(&input), expected, 1e-12));
    }

    #[test]
    fn summer_market_multiplier() {
        let f = compute_valuation(&barcelona_80(), july()).figures.unwrap();
        assert_eq!(f.multipliers.market, 1.08);
        assert_eq!(f.market_trend, MarketTrend::Rising);
        assert!(close(f.estimated_value, 360_000.0 * 0.98 * 1.08, 1e-6));
    }

    #[test]
    fn rental_rate_adjustments() {
        assert_eq!(rental_rate("barcelona", PropertyType::Apartment), 0.007);
        assert_eq!(rental_rate("badalona", PropertyType::House), 0.0065);
        assert_eq!(rental_rate("premià de mar, maresme", PropertyType::House), 0.0065);
        assert_eq!(rental_rate("girona", PropertyType::House), 0.006);
        assert!(close(rental_rate("sitges", PropertyType::Studio), 0.0077, 1e-12));
        assert!(close(rental_rate("girona", PropertyType::Villa), 0.0054, 1e-12));
    }

    #[test]
    fn every_risk_rule_fires_in_order() {
        let mut input = ValuationInput::new("Barcelona", PropertyType::Studio, 30.0);
        input.year_built = Some(1950);
        input.condition = Some(Condition::Poor);
        input.renovation_needed = true;
        let f = compute_valuation(&input, november()).figures.unwrap();
        assert_eq!(f.risk_score, 8);
        assert_eq!(f.risk_level, RiskLevel::High);
        assert_eq!(
            f.risk_factors,
            vec![
                "Mercado muy competitivo en Barcelona",
                "Propiedad antigua, posibles gastos de mantenimiento",
                "Superficie pequeña, mercado limitado",
                "Estado de conservación requiere atención",
                "Necesita renovación, costes adicionales",
            ]
        );
    }

    #[test]
    fn surface_risk_boundaries_are_exclusive() {
        let risk = |surface: f64| {
            let input = ValuationInput::new("Girona", PropertyType::House, surface);
            let f = compute_valuation(&input, november()).figures.unwrap();
            (f.risk_score, f.risk_factors)
        };

        assert_eq!(risk(35.0), (0, Vec::<String>::new()));
        assert_eq!(
            risk(34.9),
            (1, vec!["Superficie pequeña, mercado limitado".to_string()])
        );
        assert_eq!(risk(200.0), (0, Vec::<String>::new()));
        assert_eq!(
            risk(200.5),
            (1, vec!["Superficie grande, menor liquidez".to_string()])
        );
    }

    #[test]
    fn age_risk_uses_as_of_year() {
        let mut input = ValuationInput::new("Girona", PropertyType::House, 90.0);
        input.year_built = Some(1985);
        let at_40 = compute_valuation(&input, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let at_41 = compute_valuation(&input, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(at_40.figures.unwrap().risk_score, 0);
        assert_eq!(at_41.figures.unwrap().risk_score, 2);
    }

    #[test]
    fn risk_level_is_monotonic_in_score() {
        for score in 0..=8 {
            let expected = if score <= 2 {
                RiskLevel::Low
            } else if score <= 5 {
                RiskLevel::Medium
            } else {
                RiskLevel::High
            };
            assert_eq!(RiskLevel::from_score(score), expected);
            if score > 0 {
                assert!(RiskLevel::from_score(score) >= RiskLevel::from_score(score - 1));
            }
        }
    }

    #[test]
    fn recommendations_keep_check_order() {
        let mut input = ValuationInput::new("Barcelona", PropertyType::Studio, 35.0);
        input.renovation_needed = true;
        input.distance_to_beach = Some(0.8);
        let f = compute_valuation(&input, november()).figures.unwrap();
        assert_eq!(
            f.recommendations,
            vec![
                "Excelente oportunidad de inversión con alta rentabilidad",
                "Considerar el programa 'Reforma sin Coste'",
                "Proximidad a la playa aumenta potencial turístico",
                "Estudios en Barcelona tienen alta demanda de alquiler",
                "Excelente potencial de alquiler turístico",
            ]
        );
    }

    #[test]
    fn investment_potential_thresholds() {
        assert_eq!(InvestmentPotential::from_roi_1year(8.01), InvestmentPotential::Excellent);
        assert_eq!(InvestmentPotential::from_roi_1year(8.0), InvestmentPotential::Good);
        assert_eq!(InvestmentPotential::from_roi_1year(6.0), InvestmentPotential::Fair);
        assert_eq!(InvestmentPotential::from_roi_1year(4.0), InvestmentPotential::Poor);
        // Default-rate villa: 0.0054 * 12 = 6.48 %.
        let input = ValuationInput::new("Girona", PropertyType::Villa, 200.0);
        let f = compute_valuation(&input, november()).figures.unwrap();
        assert!(close(f.rental_yield_percentage, 6.48, 1e-9));
        assert_eq!(f.investment_potential, InvestmentPotential::Good);
        assert_eq!(f.recommendations, vec!["Buena oportunidad de inversión"]);
    }

    #[test]
    fn complete_data_raises_confidence_to_cap() {
        let mut input = barcelona_80();
        input.rooms = Some(3);
        input.bathrooms = Some(2);
        input.floor = Some("4".to_string());
        input.year_built = Some(2010);
        input.distance_to_beach = Some(1.5);
        input.transport_score = Some(9);
        input.amenities_score = Some(9);
        let f = compute_valuation(&input, november()).figures.unwrap();
        // 85 + 5 + 5 = 95, exactly the cap.
        assert_eq!(f.confidence_score, 95.0);
    }

    #[test]
    fn confidence_stays_within_bounds() {
        let locations = ["Barcelona", "Girona", "Mataró"];
        for location in locations {
            for with_year in [false, true] {
                for with_condition in [false, true] {
                    for with_scores in [false, true] {
                        for with_layout in [false, true] {
                            let mut input =
                                ValuationInput::new(location, PropertyType::House, 90.0);
                            if with_year {
                                input.year_built = Some(2000);
                            }
                            if with_condition {
                                input.condition = Some(Condition::Fair);
                            }
                            if with_scores {
                                input.distance_to_beach = Some(3.0);
                                input.transport_score = Some(5);
                                input.amenities_score = Some(5);
                            }
                            if with_layout {
                                input.rooms = Some(2);
                                input.bathrooms = Some(1);
                                input.floor = Some("bajo".to_string());
                            }
                            let f = compute_valuation(&input, november()).figures.unwrap();
                            assert!((60.0..=95.0).contains(&f.confidence_score));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn estimated_value_positive_for_positive_surface() {
        for surface in [1.0, 35.0, 40.0, 70.5, 120.0, 500.0] {
            for property_type in PropertyType::ALL {
                let input = ValuationInput::new("Calella", property_type, surface);
                let f = compute_valuation(&input, november()).figures.unwrap();
                assert!(f.estimated_value > 0.0);
                assert!(close(f.price_per_sqm * surface, f.estimated_value, 1e-6));
            }
        }
    }

    #[test]
    fn identical_inputs_are_deterministic() {
        let a = compute_valuation(&barcelona_80(), november());
        let b = compute_valuation(&barcelona_80(), november());
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn non_finite_input_yields_error_without_figures() {
        let input = ValuationInput::new("Barcelona", PropertyType::Apartment, f64::INFINITY);
        let result = compute_valuation(&input, november());
        assert_eq!(result.status, ValuationStatus::Error);
        assert!(result.figures.is_none());
        assert_eq!(result.error.as_deref(), Some(COMPUTATION_FAILED));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("estimated_value").is_none());
    }
}
