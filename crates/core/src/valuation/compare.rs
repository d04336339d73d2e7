use super::{
    compute_valuation, InvestmentPotential, PropertyType, RiskLevel, ValuationInput,
};
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MIN_PROPERTIES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub location: String,
    pub property_type: PropertyType,
    pub surface: f64,
    pub estimated_value: f64,
    pub price_per_sqm: f64,
    pub rental_potential_monthly: f64,
    pub rental_yield_percentage: f64,
    pub roi_1year: f64,
    pub investment_potential: InvestmentPotential,
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub comparisons: Vec<ComparisonRow>,
    pub best_roi: ComparisonRow,
    pub best_value: ComparisonRow,
    pub total_properties: usize,
}

/// Values every property (nothing is persisted) and picks the best ROI and the cheapest m².
/// Ties keep the earliest property.
pub fn compare_properties(inputs: &[ValuationInput], as_of: NaiveDate) -> CoreResult<Comparison> {
    if inputs.len() < MIN_PROPERTIES {
        return Err(CoreError::validation(
            "properties",
            format!("at least {MIN_PROPERTIES} properties required for comparison"),
        ));
    }

    let mut rows = Vec::with_capacity(inputs.len());
    for (idx, input) in inputs.iter().enumerate() {
        let result = compute_valuation(input, as_of);
        let Some(f) = result.figures else {
            return Err(CoreError::Computation(format!(
                "property #{idx} could not be valued"
            )));
        };
        rows.push(ComparisonRow {
            location: input.location.clone(),
            property_type: input.property_type,
            surface: input.surface,
            estimated_value: f.estimated_value,
            price_per_sqm: f.price_per_sqm,
            rental_potential_monthly: f.rental_potential_monthly,
            rental_yield_percentage: f.rental_yield_percentage,
            roi_1year: f.roi_1year,
            investment_potential: f.investment_potential,
            risk_level: f.risk_level,
            confidence_score: f.confidence_score,
        });
    }

    let mut best_roi = &rows[0];
    let mut best_value = &rows[0];
    for row in &rows[1..] {
        if row.roi_1year > best_roi.roi_1year {
            best_roi = row;
        }
        if row.price_per_sqm < best_value.price_per_sqm {
            best_value = row;
        }
    }

    Ok(Comparison {
        best_roi: best_roi.clone(),
        best_value: best_value.clone(),
        total_properties: rows.len(),
        comparisons: rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
    }

    #[test]
    fn requires_two_properties() {
        let one = vec![ValuationInput::new("Barcelona", PropertyType::Apartment, 80.0)];
        let err = compare_properties(&one, as_of()).unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "properties"));
    }

    #[test]
    fn picks_best_roi_and_cheapest_sqm() {
        let inputs = vec![
            ValuationInput::new("Girona", PropertyType::Villa, 200.0),
            ValuationInput::new("Barcelona", PropertyType::Studio, 30.0),
            ValuationInput::new("Calella", PropertyType::House, 120.0),
        ];
        let cmp = compare_properties(&inputs, as_of()).unwrap();
        assert_eq!(cmp.total_properties, 3);
        assert_eq!(cmp.best_roi.location, "Barcelona");
        assert_eq!(cmp.best_value.location, "Calella");
    }

    #[test]
    fn ties_keep_first() {
        let inputs = vec![
            ValuationInput::new("Mataró", PropertyType::House, 90.0),
            ValuationInput::new("mataró", PropertyType::House, 90.0),
        ];
        let cmp = compare_properties(&inputs, as_of()).unwrap();
        assert_eq!(cmp.best_roi.location, "Mataró");
        assert_eq!(cmp.best_value.location, "Mataró");
    }
}
