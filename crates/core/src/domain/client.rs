use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub const INVESTMENT_EXPERIENCE: [&str; 4] = ["beginner", "intermediate", "advanced", "expert"];
pub const RISK_TOLERANCE: [&str; 3] = ["low", "medium", "high"];
pub const CLIENT_TYPES: [&str; 3] = ["individual", "company", "fund"];
pub const CLIENT_STATUSES: [&str; 3] = ["active", "inactive", "suspended"];
pub const KYC_STATUSES: [&str; 3] = ["pending", "approved", "rejected"];
pub const CONTACT_METHODS: [&str; 3] = ["email", "phone", "whatsapp"];
pub const LANGUAGES: [&str; 3] = ["es", "en", "ca"];
pub const CONTACT_TYPES: [&str; 4] = ["call", "email", "meeting", "whatsapp"];
pub const CONTACT_OUTCOMES: [&str; 4] = ["successful", "follow_up_needed", "no_response", "closed"];

/// A stored CRM client with its project counters.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Client {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub profile: ClientProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active_projects_count: i64,
    pub completed_projects_count: i64,
}

/// Every writable client column. Fields marked `skip` are only exposed through
/// [`SensitiveDetails`].
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ClientProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip)]
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,

    #[serde(skip)]
    pub address_line1: Option<String>,
    #[serde(skip)]
    pub address_line2: Option<String>,
    pub city: Option<String>,
    #[serde(skip)]
    pub state_province: Option<String>,
    #[serde(skip)]
    pub postal_code: Option<String>,
    pub country: Option<String>,

    pub occupation: Option<String>,
    pub company: Option<String>,
    #[serde(skip)]
    pub annual_income: Option<f64>,
    pub investment_experience: String,

    pub investment_budget_min: Option<f64>,
    pub investment_budget_max: Option<f64>,
    pub risk_tolerance: String,
    pub investment_goals: Vec<String>,
    pub preferred_locations: Vec<String>,
    pub preferred_property_types: Vec<String>,

    pub client_type: String,
    pub status: String,
    pub source: Option<String>,

    pub total_invested: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
    pub average_roi: f64,

    pub preferred_contact_method: String,
    pub language_preference: String,
    pub newsletter_subscribed: bool,
    pub marketing_consent: bool,

    pub kyc_status: String,
    #[serde(skip)]
    pub kyc_documents: Vec<String>,
    #[serde(skip)]
    pub tax_id: Option<String>,
    #[serde(skip)]
    pub legal_representative: Option<String>,

    #[serde(skip)]
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub last_contact_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitiveDetails {
    pub date_of_birth: Option<NaiveDate>,
    pub full_address: String,
    pub annual_income: Option<f64>,
    pub tax_id: Option<String>,
    pub legal_representative: Option<String>,
    pub kyc_documents: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioPerformance {
    pub total_invested: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
    pub average_roi: f64,
}

/// Serialized shape of a client: public fields, derived name, and optionally the sensitive block.
#[derive(Debug, Serialize)]
pub struct ClientView<'a> {
    #[serde(flatten)]
    pub client: &'a Client,
    pub full_name: String,
    #[serde(flatten)]
    pub sensitive: Option<SensitiveDetails>,
}

impl ClientProfile {
    /// A fresh profile with the account defaults applied.
    pub fn new(first_name: String, last_name: String, email: String) -> Self {
        Self {
            first_name,
            last_name,
            email,
            phone: None,
            date_of_birth: None,
            nationality: None,
            address_line1: None,
            address_line2: None,
            city: None,
            state_province: None,
            postal_code: None,
            country: None,
            occupation: None,
            company: None,
            annual_income: None,
            investment_experience: "beginner".to_string(),
            investment_budget_min: None,
            investment_budget_max: None,
            risk_tolerance: "medium".to_string(),
            investment_goals: Vec::new(),
            preferred_locations: Vec::new(),
            preferred_property_types: Vec::new(),
            client_type: "individual".to_string(),
            status: "active".to_string(),
            source: Some("website".to_string()),
            total_invested: 0.0,
            total_revenue: 0.0,
            total_profit: 0.0,
            average_roi: 0.0,
            preferred_contact_method: "email".to_string(),
            language_preference: "es".to_string(),
            newsletter_subscribed: true,
            marketing_consent: false,
            kyc_status: "pending".to_string(),
            kyc_documents: Vec::new(),
            tax_id: None,
            legal_representative: None,
            notes: None,
            tags: Vec::new(),
            last_contact_date: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn full_address(&self) -> String {
        [
            &self.address_line1,
            &self.address_line2,
            &self.city,
            &self.state_province,
            &self.postal_code,
            &self.country,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    pub fn sensitive_details(&self) -> SensitiveDetails {
        SensitiveDetails {
            date_of_birth: self.date_of_birth,
            full_address: self.full_address(),
            annual_income: self.annual_income,
            tax_id: self.tax_id.clone(),
            legal_representative: self.legal_representative.clone(),
            kyc_documents: self.kyc_documents.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Profit and ROI are recomputed from invested/revenue when anything was invested;
    /// otherwise the stored figures are returned untouched.
    pub fn portfolio_performance(&self) -> PortfolioPerformance {
        if self.total_invested > 0.0 {
            let total_profit = self.total_revenue - self.total_invested;
            PortfolioPerformance {
                total_invested: self.total_invested,
                total_revenue: self.total_revenue,
                total_profit,
                average_roi: total_profit / self.total_invested * 100.0,
            }
        } else {
            PortfolioPerformance {
                total_invested: self.total_invested,
                total_revenue: self.total_revenue,
                total_profit: self.total_profit,
                average_roi: self.average_roi,
            }
        }
    }

}

impl Client {
    pub fn full_name(&self) -> String {
        self.profile.full_name()
    }

    pub fn view(&self, include_sensitive: bool) -> ClientView<'_> {
        ClientView {
            client: self,
            full_name: self.full_name(),
            sensitive: include_sensitive.then(|| self.profile.sensitive_details()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ClientContact {
    pub id: i64,
    pub client_id: i64,
    pub contact_type: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub contact_date: DateTime<Utc>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub staff_member: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ClientDocument {
    pub id: i64,
    pub client_id: i64,
    pub document_type: String,
    pub document_name: String,
    #[serde(skip)]
    pub file_path: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub verification_status: String,
    pub verified_by: Option<String>,
    pub verification_date: Option<DateTime<Utc>>,
    pub verification_notes: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn profile() -> ClientProfile {
        ClientProfile {
            first_name: "Laia".to_string(),
            last_name: "Puig".to_string(),
            email: "laia@example.com".to_string(),
            phone: None,
            date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 17),
            nationality: Some("ES".to_string()),
            address_line1: Some("Carrer Major 1".to_string()),
            address_line2: None,
            city: Some("Badalona".to_string()),
            state_province: Some("".to_string()),
            postal_code: Some("08911".to_string()),
            country: Some("España".to_string()),
            occupation: None,
            company: None,
            annual_income: Some(72_000.0),
            investment_experience: "intermediate".to_string(),
            investment_budget_min: None,
            investment_budget_max: None,
            risk_tolerance: "medium".to_string(),
            investment_goals: vec!["rental".to_string()],
            preferred_locations: vec![],
            preferred_property_types: vec![],
            client_type: "individual".to_string(),
            status: "active".to_string(),
            source: Some("website".to_string()),
            total_invested: 0.0,
            total_revenue: 0.0,
            total_profit: 0.0,
            average_roi: 0.0,
            preferred_contact_method: "email".to_string(),
            language_preference: "es".to_string(),
            newsletter_subscribed: true,
            marketing_consent: false,
            kyc_status: "pending".to_string(),
            kyc_documents: vec!["dni.pdf".to_string()],
            tax_id: Some("12345678Z".to_string()),
            legal_representative: None,
            notes: Some("prefers mornings".to_string()),
            tags: vec!["vip".to_string()],
            last_contact_date: None,
        }
    }

    pub fn client() -> Client {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Client {
            id: 7,
            profile: profile(),
            created_at: ts,
            updated_at: ts,
            active_projects_count: 1,
            completed_projects_count: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{client, profile};

    #[test]
    fn full_address_skips_blank_parts() {
        assert_eq!(
            profile().full_address(),
            "Carrer Major 1, Badalona, 08911, España"
        );
    }

    #[test]
    fn performance_recomputes_when_invested() {
        let mut c = profile();
        c.total_invested = 200_000.0;
        c.total_revenue = 230_000.0;
        let p = c.portfolio_performance();
        assert_eq!(p.total_profit, 30_000.0);
        assert_eq!(p.average_roi, 15.0);
    }

    #[test]
    fn performance_keeps_stored_figures_without_investment() {
        let mut c = profile();
        c.average_roi = 3.5;
        assert_eq!(c.portfolio_performance().average_roi, 3.5);
    }

    #[test]
    fn public_view_hides_sensitive_fields() {
        let c = client();
        let public = serde_json::to_value(c.view(false)).unwrap();
        assert_eq!(public["full_name"], "Laia Puig");
        assert!(public.get("tax_id").is_none());
        assert!(public.get("notes").is_none());
        assert!(public.get("full_address").is_none());
        assert_eq!(public["tags"][0], "vip");

        let full = serde_json::to_value(c.view(true)).unwrap();
        assert_eq!(full["tax_id"], "12345678Z");
        assert_eq!(full["kyc_documents"][0], "dni.pdf");
        assert_eq!(full["full_address"], "Carrer Major 1, Badalona, 08911, España");
    }
}
