pub mod compare;
pub mod engine;
pub mod renovation;
pub mod tables;

pub use engine::compute_valuation;

use crate::time::season::MarketTrend;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    #[serde(alias = "apartamento")]
    Apartment,
    #[serde(alias = "casa")]
    House,
    Villa,
    #[serde(alias = "estudio")]
    Studio,
}

impl PropertyType {
    pub const ALL: [PropertyType; 4] = [
        PropertyType::Apartment,
        PropertyType::House,
        PropertyType::Villa,
        PropertyType::Studio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::House => "house",
            Self::Villa => "villa",
            Self::Studio => "studio",
        }
    }

    /// Accepts the English names and the Spanish labels used by the public site.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "apartment" | "apartamento" | "piso" => Some(Self::Apartment),
            "house" | "casa" => Some(Self::House),
            "villa" => Some(Self::Villa),
            "studio" | "estudio" => Some(Self::Studio),
            _ => None,
        }
    }
}

/// Property condition. Labels outside the four known grades are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Condition {
    Excellent,
    Good,
    Fair,
    Poor,
    Other(String),
}

impl Condition {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Other(label) => label,
        }
    }

    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Fair | Self::Poor)
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "excellent" => Self::Excellent,
            "good" => Self::Good,
            "fair" => Self::Fair,
            "poor" => Self::Poor,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requester {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Property attributes a valuation is computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationInput {
    pub location: String,
    pub property_type: PropertyType,
    /// Square metres.
    pub surface: f64,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floor: Option<String>,
    pub year_built: Option<i32>,
    pub neighborhood: Option<String>,
    /// Kilometres.
    pub distance_to_beach: Option<f64>,
    pub distance_to_center: Option<f64>,
    /// 1–10.
    pub transport_score: Option<i32>,
    /// 1–10.
    pub amenities_score: Option<i32>,
    pub condition: Option<Condition>,
    pub renovation_needed: bool,
    pub current_market_price: Option<f64>,
    pub estimated_renovation_cost: Option<f64>,
    pub requester: Requester,
    pub request_purpose: String,
}

impl ValuationInput {
    pub fn new(location: impl Into<String>, property_type: PropertyType, surface: f64) -> Self {
        Self {
            location: location.into(),
            property_type,
            surface,
            rooms: None,
            bathrooms: None,
            floor: None,
            year_built: None,
            neighborhood: None,
            distance_to_beach: None,
            distance_to_center: None,
            transport_score: None,
            amenities_score: None,
            condition: None,
            renovation_needed: false,
            current_market_price: None,
            estimated_renovation_cost: None,
            requester: Requester::default(),
            request_purpose: "curiosity".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationStatus {
    Processing,
    Completed,
    Error,
}

impl ValuationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=2 => Self::Low,
            3..=5 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentPotential {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl InvestmentPotential {
    pub fn from_roi_1year(roi: f64) -> Self {
        if roi > 8.0 {
            Self::Excellent
        } else if roi > 6.0 {
            Self::Good
        } else if roi > 4.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    pub size: f64,
    pub condition: f64,
    pub location: f64,
    pub market: f64,
}

/// Every derived number of a completed valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationFigures {
    pub base_price_per_sqm: f64,
    pub base_value: f64,
    pub multipliers: Multipliers,
    pub estimated_value: f64,
    pub price_per_sqm: f64,
    pub rental_potential_monthly: f64,
    pub rental_yield_percentage: f64,
    pub roi_1year: f64,
    pub roi_3year: f64,
    pub roi_5year: f64,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub investment_potential: InvestmentPotential,
    pub confidence_score: f64,
    pub recommendations: Vec<String>,
    pub market_trend: MarketTrend,
}

/// Outcome of one valuation call. `figures` is only present when `status` is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub status: ValuationStatus,
    pub as_of_date: NaiveDate,
    #[serde(flatten)]
    pub figures: Option<ValuationFigures>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ValuationResult {
    pub fn completed(as_of_date: NaiveDate, figures: ValuationFigures) -> Self {
        Self {
            status: ValuationStatus::Completed,
            as_of_date,
            figures: Some(figures),
            error: None,
        }
    }

    pub fn failed(as_of_date: NaiveDate, message: impl Into<String>) -> Self {
        Self {
            status: ValuationStatus::Error,
            as_of_date,
            figures: None,
            error: Some(message.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ValuationStatus::Completed
    }
}
