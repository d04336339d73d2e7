use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub const PROJECT_CATEGORIES: [&str; 3] = ["reforma-sin-coste", "compra-venta", "gestion-completa"];
pub const PROJECT_STATUSES: [&str; 4] = ["planning", "active", "completed", "sold"];
pub const IMAGE_TYPES: [&str; 4] = ["main", "before", "after", "gallery"];
pub const DEFAULT_ANALYTICS_TOTAL_DAYS: i32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub details: ProjectDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every writable project column.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ProjectDetails {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub property_type: String,
    pub category: String,

    pub surface: Option<f64>,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floor: Option<String>,
    pub year_built: Option<i32>,

    pub purchase_price: Option<f64>,
    pub renovation_cost: Option<f64>,
    pub total_investment: Option<f64>,
    pub expected_revenue: Option<f64>,
    pub actual_revenue: Option<f64>,
    pub roi_percentage: Option<f64>,

    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub duration_days: Option<i32>,

    pub status: String,
    pub occupancy_rate: Option<f64>,
    pub average_rating: Option<f64>,
    pub total_reviews: i32,

    pub main_image: Option<String>,
    pub before_image: Option<String>,
    pub after_image: Option<String>,
    pub gallery_images: Vec<String>,
    pub features: Vec<String>,
    pub amenities: Vec<String>,

    pub slug: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,

    pub client_id: Option<i64>,
}

/// `(revenue - investment) / investment * 100`, only when both are known and investment is non-zero.
pub fn roi_percentage(investment: Option<f64>, revenue: Option<f64>) -> Option<f64> {
    match (investment, revenue) {
        (Some(inv), Some(rev)) if inv != 0.0 => Some((rev - inv) / inv * 100.0),
        _ => None,
    }
}

pub fn duration_days(start: Option<NaiveDate>, completion: Option<NaiveDate>) -> Option<i32> {
    match (start, completion) {
        (Some(s), Some(c)) => i32::try_from((c - s).num_days()).ok(),
        _ => None,
    }
}

/// URL slug: lowercase, punctuation dropped, runs of spaces/hyphens collapsed into one hyphen.
/// Accented letters are kept.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_sep = true;
        }
    }
    slug
}

impl ProjectDetails {
    pub fn new(title: String, location: String, property_type: String, category: String) -> Self {
        Self {
            title,
            description: None,
            location,
            property_type,
            category,
            surface: None,
            rooms: None,
            bathrooms: None,
            floor: None,
            year_built: None,
            purchase_price: None,
            renovation_cost: None,
            total_investment: None,
            expected_revenue: None,
            actual_revenue: None,
            roi_percentage: None,
            start_date: None,
            completion_date: None,
            duration_days: None,
            status: "planning".to_string(),
            occupancy_rate: None,
            average_rating: None,
            total_reviews: 0,
            main_image: None,
            before_image: None,
            after_image: None,
            gallery_images: Vec::new(),
            features: Vec::new(),
            amenities: Vec::new(),
            slug: None,
            meta_title: None,
            meta_description: None,
            client_id: None,
        }
    }

    /// ROI from expected revenue at creation, from actual revenue afterwards; the previous value
    /// is kept when the inputs are incomplete.
    pub fn recalculate(&mut self, use_expected_revenue: bool) {
        let revenue = if use_expected_revenue {
            self.expected_revenue
        } else {
            self.actual_revenue
        };
        if let Some(roi) = roi_percentage(self.total_investment, revenue) {
            self.roi_percentage = Some(roi);
        }
        if let Some(days) = duration_days(self.start_date, self.completion_date) {
            self.duration_days = Some(days);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ProjectImage {
    pub id: i64,
    pub project_id: i64,
    pub image_url: String,
    pub image_type: String,
    pub caption: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ProjectAnalytics {
    pub id: i64,
    pub project_id: i64,
    pub month: NaiveDate,
    pub revenue: f64,
    pub expenses: f64,
    pub occupancy_days: i32,
    pub total_days: i32,
    pub bookings_count: i32,
    pub average_daily_rate: f64,
    pub guest_rating: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsView<'a> {
    #[serde(flatten)]
    pub analytics: &'a ProjectAnalytics,
    pub occupancy_rate: f64,
    pub net_profit: f64,
}

impl ProjectAnalytics {
    pub fn occupancy_rate(&self) -> f64 {
        if self.total_days > 0 {
            f64::from(self.occupancy_days) / f64::from(self.total_days) * 100.0
        } else {
            0.0
        }
    }

    pub fn net_profit(&self) -> f64 {
        self.revenue - self.expenses
    }

    pub fn view(&self) -> AnalyticsView<'_> {
        AnalyticsView {
            analytics: self,
            occupancy_rate: self.occupancy_rate(),
            net_profit: self.net_profit(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn details() -> ProjectDetails {
        ProjectDetails {
            title: "Ático en Sitges".to_string(),
            description: Some("Reforma integral".to_string()),
            location: "Sitges".to_string(),
            property_type: "apartment".to_string(),
            category: "reforma-sin-coste".to_string(),
            surface: Some(95.0),
            rooms: Some(3),
            bathrooms: Some(2),
            floor: Some("5".to_string()),
            year_built: Some(1978),
            purchase_price: Some(380_000.0),
            renovation_cost: Some(60_000.0),
            total_investment: Some(440_000.0),
            expected_revenue: Some(520_000.0),
            actual_revenue: None,
            roi_percentage: None,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 10),
            completion_date: NaiveDate::from_ymd_opt(2025, 4, 20),
            duration_days: None,
            status: "completed".to_string(),
            occupancy_rate: Some(78.0),
            average_rating: Some(4.8),
            total_reviews: 12,
            main_image: None,
            before_image: None,
            after_image: None,
            gallery_images: vec![],
            features: vec!["terraza".to_string()],
            amenities: vec![],
            slug: Some("atico-en-sitges".to_string()),
            meta_title: None,
            meta_description: None,
            client_id: Some(7),
        }
    }

    pub fn project() -> Project {
        let ts = Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap();
        Project {
            id: 3,
            details: details(),
            created_at: ts,
            updated_at: ts,
        }
    }
}
