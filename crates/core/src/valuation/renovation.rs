use super::{Condition, ValuationFigures, ValuationInput};
use serde::{Deserialize, Serialize};

pub const RENOVATION_COST_PER_SQM: f64 = 800.0;
pub const POST_RENOVATION_VALUE_FACTOR: f64 = 1.25;
pub const POST_RENOVATION_RENTAL_FACTOR: f64 = 1.4;

const PROGRAM_BENEFITS: [&str; 6] = [
    "Financiación 100% de la reforma",
    "Sin coste inicial para el propietario",
    "Gestión completa del proyecto",
    "Garantía de calidad y plazos",
    "Incremento inmediato del valor",
    "Optimización para alquiler turístico",
];

const NEXT_STEPS: [&str; 5] = [
    "Visita técnica gratuita",
    "Presupuesto detallado",
    "Firma del acuerdo",
    "Inicio de obras",
    "Entrega y puesta en marcha",
];

/// Forced-renovation scenario built on top of a completed valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenovationProposal {
    pub current_value: f64,
    pub post_renovation_value: f64,
    pub value_increase: f64,
    pub renovation_cost: f64,
    pub current_rental_potential: f64,
    pub post_renovation_rental: f64,
    pub rental_increase: f64,
    pub annual_rental_income: f64,
    pub payback_period_months: f64,
    pub roi_first_year: f64,
    pub program_benefits: Vec<String>,
    pub next_steps: Vec<String>,
}

/// Worse condition means more work per square metre.
pub fn renovation_cost_multiplier(condition: Option<&Condition>) -> f64 {
    match condition {
        Some(Condition::Poor) => 1.3,
        Some(Condition::Fair) => 1.1,
        Some(Condition::Good) => 0.8,
        Some(Condition::Excellent) => 0.5,
        Some(Condition::Other(_)) | None => 1.0,
    }
}

pub fn renovation_cost(surface: f64, condition: Option<&Condition>) -> f64 {
    surface * RENOVATION_COST_PER_SQM * renovation_cost_multiplier(condition)
}

pub fn propose_renovation(input: &ValuationInput, figures: &ValuationFigures) -> RenovationProposal {
    let renovation_cost = renovation_cost(input.surface, input.condition.as_ref());
    let current_value = figures.estimated_value;
    let current_rental = figures.rental_potential_monthly;

    let post_renovation_value = current_value * POST_RENOVATION_VALUE_FACTOR;
    let post_renovation_rental = current_rental * POST_RENOVATION_RENTAL_FACTOR;
    let annual_rental_income = post_renovation_rental * 12.0;

    let payback_period_months = if post_renovation_rental > 0.0 {
        renovation_cost / post_renovation_rental
    } else {
        0.0
    };
    let roi_first_year = if renovation_cost > 0.0 {
        annual_rental_income / renovation_cost * 100.0
    } else {
        0.0
    };

    RenovationProposal {
        current_value,
        post_renovation_value,
        value_increase: post_renovation_value - current_value,
        renovation_cost,
        current_rental_potential: current_rental,
        post_renovation_rental,
        rental_increase: post_renovation_rental - current_rental,
        annual_rental_income,
        payback_period_months,
        roi_first_year,
        program_benefits: PROGRAM_BENEFITS.iter().map(|s| s.to_string()).collect(),
        next_steps: NEXT_STEPS.iter().map(|s| s.to_string()).collect(),
    }
}
