//! Request payloads as they arrive over the wire, and their validation into domain values.
//!
//! Every payload field is optional at the serde level so that a missing field is reported as a
//! validation error naming the field instead of a generic JSON rejection.

use crate::domain::client::{
    ClientProfile, CLIENT_STATUSES, CLIENT_TYPES, CONTACT_METHODS, CONTACT_OUTCOMES,
    CONTACT_TYPES, INVESTMENT_EXPERIENCE, KYC_STATUSES, LANGUAGES, RISK_TOLERANCE,
};
use crate::domain::project::{
    slugify, ProjectDetails, DEFAULT_ANALYTICS_TOTAL_DAYS, IMAGE_TYPES, PROJECT_CATEGORIES,
    PROJECT_STATUSES,
};
use crate::error::{CoreError, CoreResult};
use crate::valuation::renovation::renovation_cost;
use crate::valuation::{Condition, PropertyType, Requester, ValuationInput};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Europe::Madrid;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_REQUEST_PURPOSE: &str = "curiosity";
pub const DEFAULT_FORM_TYPE: &str = "general";
pub const RENOVATION_PURPOSE: &str = "renovation_proposal";
pub const QUICK_PURPOSE: &str = "website_form";

fn required_text(field: &str, value: Option<String>) -> CoreResult<String> {
    optional_text(value).ok_or_else(|| CoreError::missing(field))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> CoreResult<String> {
    let v = value.trim().to_lowercase();
    if allowed.contains(&v.as_str()) {
        Ok(v)
    } else {
        Err(CoreError::validation(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

fn non_negative(field: &str, value: f64) -> CoreResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CoreError::validation(field, "must be a non-negative number"))
    }
}

fn in_range_f64(field: &str, value: f64, lo: f64, hi: f64) -> CoreResult<f64> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        Ok(value)
    } else {
        Err(CoreError::validation(field, format!("must be between {lo} and {hi}")))
    }
}

fn in_range(field: &str, value: i32, lo: i32, hi: i32) -> CoreResult<i32> {
    if (lo..=hi).contains(&value) {
        Ok(value)
    } else {
        Err(CoreError::validation(field, format!("must be between {lo} and {hi}")))
    }
}

fn email_address(field: &str, value: String) -> CoreResult<String> {
    let v = value.trim().to_string();
    match v.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(v),
        _ => Err(CoreError::validation(field, "must be a valid email address")),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date (midnight UTC).
pub fn parse_timestamp(field: &str, value: &str) -> CoreResult<DateTime<Utc>> {
    let v = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(v) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.and_utc());
    }
    NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
        .ok_or_else(|| CoreError::validation(field, "must be a date or timestamp"))
}

/// Accepts `YYYY-MM` or `YYYY-MM-DD`; the result is always the first day of the month.
pub fn parse_month(field: &str, value: &str) -> CoreResult<NaiveDate> {
    let v = value.trim();
    let date = NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{v}-01"), "%Y-%m-%d"))
        .map_err(|_| CoreError::validation(field, "must be YYYY-MM or YYYY-MM-DD"))?;
    date.with_day(1)
        .ok_or_else(|| CoreError::validation(field, "must be YYYY-MM or YYYY-MM-DD"))
}

/// Floors arrive as `"3"`, `3`, `"bajo"`...
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    }))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub surface: Option<f64>,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub floor: Option<String>,
    pub year_built: Option<i32>,
    pub neighborhood: Option<String>,
    pub distance_to_beach: Option<f64>,
    pub distance_to_center: Option<f64>,
    pub transport_score: Option<i32>,
    pub amenities_score: Option<i32>,
    #[serde(alias = "current_condition")]
    pub condition: Option<String>,
    pub renovation_needed: Option<bool>,
    pub current_market_price: Option<f64>,
    pub estimated_renovation_cost: Option<f64>,
    #[serde(alias = "name")]
    pub requester_name: Option<String>,
    #[serde(alias = "email")]
    pub requester_email: Option<String>,
    #[serde(alias = "phone")]
    pub requester_phone: Option<String>,
    pub request_purpose: Option<String>,
}

impl ValuationRequest {
    pub fn validate_and_into_input(self) -> CoreResult<ValuationInput> {
        let location = required_text("location", self.location)?;
        let raw_type = required_text("property_type", self.property_type)?;
        let property_type = PropertyType::parse(&raw_type).ok_or_else(|| {
            CoreError::validation("property_type", format!("unknown property type `{raw_type}`"))
        })?;
        let surface = non_negative(
            "surface",
            self.surface.ok_or_else(|| CoreError::missing("surface"))?,
        )?;

        let mut input = ValuationInput::new(location, property_type, surface);
        input.rooms = self.rooms.map(|v| in_range("rooms", v, 0, 100)).transpose()?;
        input.bathrooms = self
            .bathrooms
            .map(|v| in_range("bathrooms", v, 0, 100))
            .transpose()?;
        input.floor = optional_text(self.floor);
        input.year_built = self
            .year_built
            .map(|v| in_range("year_built", v, 1000, 9999))
            .transpose()?;
        input.neighborhood = optional_text(self.neighborhood);
        input.distance_to_beach = self
            .distance_to_beach
            .map(|v| non_negative("distance_to_beach", v))
            .transpose()?;
        input.distance_to_center = self
            .distance_to_center
            .map(|v| non_negative("distance_to_center", v))
            .transpose()?;
        input.transport_score = self
            .transport_score
            .map(|v| in_range("transport_score", v, 1, 10))
            .transpose()?;
        input.amenities_score = self
            .amenities_score
            .map(|v| in_range("amenities_score", v, 1, 10))
            .transpose()?;
        input.condition = optional_text(self.condition).map(Condition::from);
        input.renovation_needed = self.renovation_needed.unwrap_or(false);
        input.current_market_price = self
            .current_market_price
            .map(|v| non_negative("current_market_price", v))
            .transpose()?;
        input.estimated_renovation_cost = self
            .estimated_renovation_cost
            .map(|v| non_negative("estimated_renovation_cost", v))
            .transpose()?;
        input.requester = Requester {
            name: optional_text(self.requester_name),
            email: optional_text(self.requester_email)
                .map(|e| email_address("email", e))
                .transpose()?,
            phone: optional_text(self.requester_phone),
        };
        input.request_purpose = optional_text(self.request_purpose)
            .unwrap_or_else(|| DEFAULT_REQUEST_PURPOSE.to_string());
        Ok(input)
    }
}

impl ValuationRequest {
    /// A renovation proposal needs the current condition, and is always valued as needing work.
    pub fn validate_and_into_renovation_input(self) -> CoreResult<ValuationInput> {
        if optional_text(self.condition.clone()).is_none() {
            return Err(CoreError::missing("current_condition"));
        }
        let mut input = self.validate_and_into_input()?;
        input.renovation_needed = true;
        input.request_purpose = RENOVATION_PURPOSE.to_string();
        input.estimated_renovation_cost =
            Some(renovation_cost(input.surface, input.condition.as_ref()));
        Ok(input)
    }
}

impl ValuationRequest {
    /// Website quick form: only location and surface are required. The property defaults to an
    /// apartment and is always valued in good condition; fields beyond rooms and contact details
    /// are ignored.
    pub fn validate_and_into_quick_input(self) -> CoreResult<ValuationInput> {
        let mut input = ValuationRequest {
            location: self.location,
            property_type: self
                .property_type
                .filter(|t| !t.trim().is_empty())
                .or_else(|| Some(PropertyType::Apartment.as_str().to_string())),
            surface: self.surface,
            rooms: self.rooms,
            condition: Some("good".to_string()),
            requester_name: self.requester_name,
            requester_email: self.requester_email,
            requester_phone: self.requester_phone,
            ..Default::default()
        }
        .validate_and_into_input()?;
        input.request_purpose = QUICK_PURPOSE.to_string();
        Ok(input)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompareRequest {
    pub properties: Option<Vec<ValuationRequest>>,
}

impl CompareRequest {
    /// Compared properties default to an apartment in good condition.
    pub fn validate_and_into_inputs(self) -> CoreResult<Vec<ValuationInput>> {
        let properties = self
            .properties
            .ok_or_else(|| CoreError::missing("properties"))?;
        properties
            .into_iter()
            .enumerate()
            .map(|(idx, mut p)| {
                p.property_type
                    .get_or_insert_with(|| PropertyType::Apartment.as_str().to_string());
                p.condition.get_or_insert_with(|| "good".to_string());
                p.validate_and_into_input().map_err(|e| match e {
                    CoreError::Validation { field, message } => {
                        CoreError::validation(format!("properties[{idx}].{field}"), message)
                    }
                    other => other,
                })
            })
            .collect()
    }
}

/// Client create/update body. On update an absent (or null) field leaves the stored value alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub occupation: Option<String>,
    pub company: Option<String>,
    pub annual_income: Option<f64>,
    pub investment_experience: Option<String>,
    pub investment_budget_min: Option<f64>,
    pub investment_budget_max: Option<f64>,
    pub risk_tolerance: Option<String>,
    pub investment_goals: Option<Vec<String>>,
    pub preferred_locations: Option<Vec<String>>,
    pub preferred_property_types: Option<Vec<String>>,
    pub client_type: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
    pub total_invested: Option<f64>,
    pub total_revenue: Option<f64>,
    pub total_profit: Option<f64>,
    pub average_roi: Option<f64>,
    pub preferred_contact_method: Option<String>,
    pub language_preference: Option<String>,
    pub newsletter_subscribed: Option<bool>,
    pub marketing_consent: Option<bool>,
    pub kyc_status: Option<String>,
    pub kyc_documents: Option<Vec<String>>,
    pub tax_id: Option<String>,
    pub legal_representative: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub last_contact_date: Option<String>,
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ClientPayload {
    pub fn validate_and_into_profile(mut self) -> CoreResult<ClientProfile> {
        let mut profile = ClientProfile::new(
            required_text("first_name", self.first_name.take())?,
            required_text("last_name", self.last_name.take())?,
            email_address("email", required_text("email", self.email.take())?)?,
        );
        self.apply_to(&mut profile)?;
        Ok(profile)
    }

    pub fn apply_to(self, p: &mut ClientProfile) -> CoreResult<()> {
        if let Some(v) = self.first_name {
            p.first_name = required_text("first_name", Some(v))?;
        }
        if let Some(v) = self.last_name {
            p.last_name = required_text("last_name", Some(v))?;
        }
        if let Some(v) = self.email {
            p.email = email_address("email", v)?;
        }
        if let Some(v) = self.phone {
            p.phone = optional_text(Some(v));
        }
        if let Some(v) = self.date_of_birth {
            p.date_of_birth = Some(v);
        }
        if let Some(v) = self.nationality {
            p.nationality = optional_text(Some(v));
        }
        if let Some(v) = self.address_line1 {
            p.address_line1 = optional_text(Some(v));
        }
        if let Some(v) = self.address_line2 {
            p.address_line2 = optional_text(Some(v));
        }
        if let Some(v) = self.city {
            p.city = optional_text(Some(v));
        }
        if let Some(v) = self.state_province {
            p.state_province = optional_text(Some(v));
        }
        if let Some(v) = self.postal_code {
            p.postal_code = optional_text(Some(v));
        }
        if let Some(v) = self.country {
            p.country = optional_text(Some(v));
        }
        if let Some(v) = self.occupation {
            p.occupation = optional_text(Some(v));
        }
        if let Some(v) = self.company {
            p.company = optional_text(Some(v));
        }
        if let Some(v) = self.annual_income {
            p.annual_income = Some(non_negative("annual_income", v)?);
        }
        if let Some(v) = self.investment_experience {
            p.investment_experience = one_of("investment_experience", &v, &INVESTMENT_EXPERIENCE)?;
        }
        if let Some(v) = self.investment_budget_min {
            p.investment_budget_min = Some(non_negative("investment_budget_min", v)?);
        }
        if let Some(v) = self.investment_budget_max {
            p.investment_budget_max = Some(non_negative("investment_budget_max", v)?);
        }
        if let Some(v) = self.risk_tolerance {
            p.risk_tolerance = one_of("risk_tolerance", &v, &RISK_TOLERANCE)?;
        }
        if let Some(v) = self.investment_goals {
            p.investment_goals = clean_list(v);
        }
        if let Some(v) = self.preferred_locations {
            p.preferred_locations = clean_list(v);
        }
        if let Some(v) = self.preferred_property_types {
            p.preferred_property_types = clean_list(v);
        }
        if let Some(v) = self.client_type {
            p.client_type = one_of("client_type", &v, &CLIENT_TYPES)?;
        }
        if let Some(v) = self.status {
            p.status = one_of("status", &v, &CLIENT_STATUSES)?;
        }
        if let Some(v) = self.source {
            p.source = optional_text(Some(v));
        }
        if let Some(v) = self.total_invested {
            p.total_invested = non_negative("total_invested", v)?;
        }
        if let Some(v) = self.total_revenue {
            p.total_revenue = non_negative("total_revenue", v)?;
        }
        if let Some(v) = self.total_profit {
            p.total_profit = v;
        }
        if let Some(v) = self.average_roi {
            p.average_roi = v;
        }
        if let Some(v) = self.preferred_contact_method {
            p.preferred_contact_method = one_of("preferred_contact_method", &v, &CONTACT_METHODS)?;
        }
        if let Some(v) = self.language_preference {
            p.language_preference = one_of("language_preference", &v, &LANGUAGES)?;
        }
        if let Some(v) = self.newsletter_subscribed {
            p.newsletter_subscribed = v;
        }
        if let Some(v) = self.marketing_consent {
            p.marketing_consent = v;
        }
        if let Some(v) = self.kyc_status {
            p.kyc_status = one_of("kyc_status", &v, &KYC_STATUSES)?;
        }
        if let Some(v) = self.kyc_documents {
            p.kyc_documents = clean_list(v);
        }
        if let Some(v) = self.tax_id {
            p.tax_id = optional_text(Some(v));
        }
        if let Some(v) = self.legal_representative {
            p.legal_representative = optional_text(Some(v));
        }
        if let Some(v) = self.notes {
            p.notes = optional_text(Some(v));
        }
        if let Some(v) = self.tags {
            p.tags = clean_list(v);
        }
        if let Some(v) = self.last_contact_date {
            p.last_contact_date = Some(parse_timestamp("last_contact_date", &v)?);
        }

        if let (Some(min), Some(max)) = (p.investment_budget_min, p.investment_budget_max) {
            if min > max {
                return Err(CoreError::validation(
                    "investment_budget_min",
                    "must not exceed investment_budget_max",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewClientContact {
    pub contact_type: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub staff_member: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientContactRequest {
    pub contact_type: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub follow_up_date: Option<String>,
    pub staff_member: Option<String>,
}

impl ClientContactRequest {
    pub fn validate_and_into_contact(self) -> CoreResult<NewClientContact> {
        let contact_type = required_text("contact_type", self.contact_type)?;
        Ok(NewClientContact {
            contact_type: one_of("contact_type", &contact_type, &CONTACT_TYPES)?,
            subject: optional_text(self.subject),
            description: optional_text(self.description),
            outcome: optional_text(self.outcome)
                .map(|o| one_of("outcome", &o, &CONTACT_OUTCOMES))
                .transpose()?,
            follow_up_date: optional_text(self.follow_up_date)
                .map(|d| parse_timestamp("follow_up_date", &d))
                .transpose()?,
            staff_member: optional_text(self.staff_member),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewClientDocument {
    pub document_type: String,
    pub document_name: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientDocumentRequest {
    pub document_type: Option<String>,
    pub document_name: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
}

impl ClientDocumentRequest {
    pub fn validate_and_into_document(self) -> CoreResult<NewClientDocument> {
        if let Some(size) = self.file_size {
            if size < 0 {
                return Err(CoreError::validation("file_size", "must be non-negative"));
            }
        }
        Ok(NewClientDocument {
            document_type: required_text("document_type", self.document_type)?,
            document_name: required_text("document_name", self.document_name)?,
            file_path: required_text("file_path", self.file_path)?,
            file_size: self.file_size,
            mime_type: optional_text(self.mime_type),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KycApprovalRequest {
    pub approved_by: Option<String>,
}

impl KycApprovalRequest {
    pub fn approver(self) -> String {
        optional_text(self.approved_by).unwrap_or_else(|| "System".to_string())
    }
}

/// Project create/update body. Same absent-means-unchanged rule as [`ClientPayload`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub category: Option<String>,
    pub surface: Option<f64>,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub floor: Option<String>,
    pub year_built: Option<i32>,
    pub purchase_price: Option<f64>,
    pub renovation_cost: Option<f64>,
    pub total_investment: Option<f64>,
    pub expected_revenue: Option<f64>,
    pub actual_revenue: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub occupancy_rate: Option<f64>,
    pub average_rating: Option<f64>,
    pub total_reviews: Option<i32>,
    pub main_image: Option<String>,
    pub before_image: Option<String>,
    pub after_image: Option<String>,
    pub gallery_images: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
    pub slug: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub client_id: Option<i64>,
}

fn project_property_type(value: &str) -> CoreResult<String> {
    PropertyType::parse(value)
        .map(|t| t.as_str().to_string())
        .ok_or_else(|| {
            CoreError::validation("property_type", format!("unknown property type `{value}`"))
        })
}

impl ProjectPayload {
    /// New project details with ROI taken from the expected revenue and a slug derived from the
    /// title when none was given. Slug uniqueness is settled by the store.
    pub fn validate_and_into_details(mut self) -> CoreResult<ProjectDetails> {
        let title = required_text("title", self.title.take())?;
        let location = required_text("location", self.location.take())?;
        let property_type =
            project_property_type(&required_text("property_type", self.property_type.take())?)?;
        let category = one_of(
            "category",
            &required_text("category", self.category.take())?,
            &PROJECT_CATEGORIES,
        )?;

        let mut details = ProjectDetails::new(title, location, property_type, category);
        self.apply_fields(&mut details)?;
        if details.slug.is_none() {
            details.slug = Some(slugify(&details.title)).filter(|s| !s.is_empty());
        }
        details.recalculate(true);
        Ok(details)
    }

    /// Applies an update; ROI is recomputed from the actual revenue.
    pub fn apply_update(self, details: &mut ProjectDetails) -> CoreResult<()> {
        self.apply_fields(details)?;
        details.recalculate(false);
        Ok(())
    }

    fn apply_fields(self, d: &mut ProjectDetails) -> CoreResult<()> {
        if let Some(v) = self.title {
            d.title = required_text("title", Some(v))?;
        }
        if let Some(v) = self.description {
            d.description = optional_text(Some(v));
        }
        if let Some(v) = self.location {
            d.location = required_text("location", Some(v))?;
        }
        if let Some(v) = self.property_type {
            d.property_type = project_property_type(&v)?;
        }
        if let Some(v) = self.category {
            d.category = one_of("category", &v, &PROJECT_CATEGORIES)?;
        }
        if let Some(v) = self.surface {
            d.surface = Some(non_negative("surface", v)?);
        }
        if let Some(v) = self.rooms {
            d.rooms = Some(in_range("rooms", v, 0, 100)?);
        }
        if let Some(v) = self.bathrooms {
            d.bathrooms = Some(in_range("bathrooms", v, 0, 100)?);
        }
        if let Some(v) = self.floor {
            d.floor = optional_text(Some(v));
        }
        if let Some(v) = self.year_built {
            d.year_built = Some(in_range("year_built", v, 1000, 9999)?);
        }
        if let Some(v) = self.purchase_price {
            d.purchase_price = Some(non_negative("purchase_price", v)?);
        }
        if let Some(v) = self.renovation_cost {
            d.renovation_cost = Some(non_negative("renovation_cost", v)?);
        }
        if let Some(v) = self.total_investment {
            d.total_investment = Some(non_negative("total_investment", v)?);
        }
        if let Some(v) = self.expected_revenue {
            d.expected_revenue = Some(non_negative("expected_revenue", v)?);
        }
        if let Some(v) = self.actual_revenue {
            d.actual_revenue = Some(non_negative("actual_revenue", v)?);
        }
        if let Some(v) = self.start_date {
            d.start_date = Some(v);
        }
        if let Some(v) = self.completion_date {
            d.completion_date = Some(v);
        }
        if let Some(v) = self.status {
            d.status = one_of("status", &v, &PROJECT_STATUSES)?;
        }
        if let Some(v) = self.occupancy_rate {
            d.occupancy_rate = Some(in_range_f64("occupancy_rate", v, 0.0, 100.0)?);
        }
        if let Some(v) = self.average_rating {
            d.average_rating = Some(in_range_f64("average_rating", v, 0.0, 5.0)?);
        }
        if let Some(v) = self.total_reviews {
            d.total_reviews = in_range("total_reviews", v, 0, i32::MAX)?;
        }
        if let Some(v) = self.main_image {
            d.main_image = optional_text(Some(v));
        }
        if let Some(v) = self.before_image {
            d.before_image = optional_text(Some(v));
        }
        if let Some(v) = self.after_image {
            d.after_image = optional_text(Some(v));
        }
        if let Some(v) = self.gallery_images {
            d.gallery_images = clean_list(v);
        }
        if let Some(v) = self.features {
            d.features = clean_list(v);
        }
        if let Some(v) = self.amenities {
            d.amenities = clean_list(v);
        }
        if let Some(v) = self.slug {
            d.slug = Some(slugify(&v)).filter(|s| !s.is_empty());
        }
        if let Some(v) = self.meta_title {
            d.meta_title = optional_text(Some(v));
        }
        if let Some(v) = self.meta_description {
            d.meta_description = optional_text(Some(v));
        }
        if let Some(v) = self.client_id {
            d.client_id = Some(v);
        }

        if let (Some(start), Some(end)) = (d.start_date, d.completion_date) {
            if end < start {
                return Err(CoreError::validation(
                    "completion_date",
                    "must not be before start_date",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProjectImage {
    pub image_url: String,
    pub image_type: String,
    pub caption: Option<String>,
    pub order_index: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectImageRequest {
    pub image_url: Option<String>,
    pub image_type: Option<String>,
    pub caption: Option<String>,
    pub order_index: Option<i32>,
}

impl ProjectImageRequest {
    pub fn validate_and_into_image(self) -> CoreResult<NewProjectImage> {
        let image_type = required_text("image_type", self.image_type)?;
        Ok(NewProjectImage {
            image_url: required_text("image_url", self.image_url)?,
            image_type: one_of("image_type", &image_type, &IMAGE_TYPES)?,
            caption: optional_text(self.caption),
            order_index: self
                .order_index
                .map(|v| in_range("order_index", v, 0, i32::MAX))
                .transpose()?
                .unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProjectAnalytics {
    pub month: NaiveDate,
    pub revenue: f64,
    pub expenses: f64,
    pub occupancy_days: i32,
    pub total_days: i32,
    pub bookings_count: i32,
    pub average_daily_rate: f64,
    pub guest_rating: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectAnalyticsRequest {
    pub month: Option<String>,
    pub revenue: Option<f64>,
    pub expenses: Option<f64>,
    pub occupancy_days: Option<i32>,
    pub total_days: Option<i32>,
    pub bookings_count: Option<i32>,
    pub average_daily_rate: Option<f64>,
    pub guest_rating: Option<f64>,
}

impl ProjectAnalyticsRequest {
    pub fn validate_and_into_analytics(self) -> CoreResult<NewProjectAnalytics> {
        let month = parse_month("month", &required_text("month", self.month)?)?;
        let total_days = in_range(
            "total_days",
            self.total_days.unwrap_or(DEFAULT_ANALYTICS_TOTAL_DAYS),
            1,
            31,
        )?;
        Ok(NewProjectAnalytics {
            month,
            revenue: non_negative("revenue", self.revenue.unwrap_or(0.0))?,
            expenses: non_negative("expenses", self.expenses.unwrap_or(0.0))?,
            occupancy_days: in_range("occupancy_days", self.occupancy_days.unwrap_or(0), 0, total_days)?,
            total_days,
            bookings_count: in_range("bookings_count", self.bookings_count.unwrap_or(0), 0, i32::MAX)?,
            average_daily_rate: non_negative(
                "average_daily_rate",
                self.average_daily_rate.unwrap_or(0.0),
            )?,
            guest_rating: in_range_f64("guest_rating", self.guest_rating.unwrap_or(0.0), 0.0, 5.0)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactSubmission {
    pub reference: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub form_type: String,
}

/// `ESKA` followed by the Madrid wall-clock time, e.g. `ESKA20250715103000`.
pub fn contact_reference(now: DateTime<Utc>) -> String {
    format!("ESKA{}", now.with_timezone(&Madrid).format("%Y%m%d%H%M%S"))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub form_type: Option<String>,
}

impl ContactRequest {
    /// A lead needs some way to reach back: an email or a phone number.
    pub fn validate_and_into_submission(self, now: DateTime<Utc>) -> CoreResult<ContactSubmission> {
        let email = optional_text(self.email)
            .map(|e| email_address("email", e))
            .transpose()?;
        let phone = optional_text(self.phone);
        if email.is_none() && phone.is_none() {
            return Err(CoreError::validation("email", "an email or phone is required"));
        }
        Ok(ContactSubmission {
            reference: contact_reference(now),
            name: optional_text(self.name),
            email,
            phone,
            message: optional_text(self.message),
            form_type: optional_text(self.form_type)
                .unwrap_or_else(|| DEFAULT_FORM_TYPE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_of(err: CoreError) -> String {
        match err {
            CoreError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn renovation_request_requires_condition_and_forces_flags() {
        let req: ValuationRequest = serde_json::from_value(
            json!({"location": "Badalona", "property_type": "apartment", "surface": 50}),
        )
        .unwrap();
        assert_eq!(
            field_of(req.clone().validate_and_into_renovation_input().unwrap_err()),
            "current_condition"
        );

        let input = ValuationRequest {
            condition: Some("fair".into()),
            ..req
        }
        .validate_and_into_renovation_input()
        .unwrap();
        assert!(input.renovation_needed);
        assert_eq!(input.request_purpose, RENOVATION_PURPOSE);
        assert_eq!(input.estimated_renovation_cost, Some(50.0 * 800.0 * 1.1));
    }

    #[test]
    fn quick_request_needs_only_location_and_surface() {
        let req: ValuationRequest = serde_json::from_value(json!({
            "location": "Barcelona",
            "surface": 80,
            "condition": "poor",
            "request_purpose": "investment",
            "year_built": 1950,
            "email": "ana@example.com",
        }))
        .unwrap();
        let input = req.validate_and_into_quick_input().unwrap();
        assert_eq!(input.property_type, PropertyType::Apartment);
        assert_eq!(input.condition, Some(Condition::Good));
        assert_eq!(input.request_purpose, QUICK_PURPOSE);
        assert_eq!(input.year_built, None);
        assert_eq!(input.requester.email.as_deref(), Some("ana@example.com"));

        let req: ValuationRequest =
            serde_json::from_value(json!({"location": "Sitges", "property_type": "casa", "surface": 120}))
                .unwrap();
        assert_eq!(
            req.validate_and_into_quick_input().unwrap().property_type,
            PropertyType::House
        );

        let req: ValuationRequest = serde_json::from_value(json!({"location": "Sitges"})).unwrap();
        assert_eq!(field_of(req.validate_and_into_quick_input().unwrap_err()), "surface");
    }

    #[test]
    fn valuation_request_requires_core_fields() {
        let req: ValuationRequest =
            serde_json::from_value(json!({"property_type": "apartment", "surface": 80})).unwrap();
        assert_eq!(field_of(req.validate_and_into_input().unwrap_err()), "location");

        let req: ValuationRequest =
            serde_json::from_value(json!({"location": "Sitges", "surface": 80})).unwrap();
        assert_eq!(field_of(req.validate_and_into_input().unwrap_err()), "property_type");

        let req: ValuationRequest =
            serde_json::from_value(json!({"location": "Sitges", "property_type": "casa"})).unwrap();
        assert_eq!(field_of(req.validate_and_into_input().unwrap_err()), "surface");
    }

    #[test]
    fn valuation_request_maps_aliases_and_defaults() {
        let req: ValuationRequest = serde_json::from_value(json!({
            "location": " Badalona ",
            "property_type": "apartamento",
            "surface": 65.5,
            "floor": 3,
            "current_condition": "Fair",
            "name": "Jordi",
            "email": "jordi@example.com",
        }))
        .unwrap();
        let input = req.validate_and_into_input().unwrap();
        assert_eq!(input.location, "Badalona");
        assert_eq!(input.property_type, PropertyType::Apartment);
        assert_eq!(input.floor.as_deref(), Some("3"));
        assert_eq!(input.condition, Some(Condition::Fair));
        assert_eq!(input.requester.name.as_deref(), Some("Jordi"));
        assert_eq!(input.request_purpose, DEFAULT_REQUEST_PURPOSE);
        assert!(!input.renovation_needed);
    }

    #[test]
    fn valuation_request_rejects_out_of_range_values() {
        let base = json!({"location": "Sitges", "property_type": "villa", "surface": 120});
        for (field, value) in [
            ("surface", json!(-1)),
            ("transport_score", json!(0)),
            ("amenities_score", json!(11)),
            ("distance_to_beach", json!(-0.5)),
            ("year_built", json!(99)),
            ("email", json!("nobody")),
        ] {
            let mut body = base.clone();
            body[field] = value;
            let req: ValuationRequest = serde_json::from_value(body).unwrap();
            assert_eq!(field_of(req.validate_and_into_input().unwrap_err()), field);
        }
    }

    #[test]
    fn blank_condition_counts_as_missing() {
        let req: ValuationRequest = serde_json::from_value(
            json!({"location": "Calella", "property_type": "house", "surface": 90, "condition": "  "}),
        )
        .unwrap();
        assert_eq!(req.validate_and_into_input().unwrap().condition, None);
    }

    #[test]
    fn compare_defaults_type_and_condition() {
        let req: CompareRequest = serde_json::from_value(json!({
            "properties": [
                {"location": "Mataró", "surface": 70},
                {"location": "Gavà", "surface": 95, "property_type": "house"},
            ]
        }))
        .unwrap();
        let inputs = req.validate_and_into_inputs().unwrap();
        assert_eq!(inputs[0].property_type, PropertyType::Apartment);
        assert_eq!(inputs[0].condition, Some(Condition::Good));
        assert_eq!(inputs[1].property_type, PropertyType::House);

        let bad: CompareRequest =
            serde_json::from_value(json!({"properties": [{"location": "Gavà"}]})).unwrap();
        assert_eq!(
            field_of(bad.validate_and_into_inputs().unwrap_err()),
            "properties[0].surface"
        );
        let missing = CompareRequest::default();
        assert_eq!(field_of(missing.validate_and_into_inputs().unwrap_err()), "properties");
    }

    #[test]
    fn client_payload_create_and_patch() {
        let payload: ClientPayload = serde_json::from_value(json!({
            "first_name": "Marta",
            "last_name": "Soler",
            "email": "marta@example.com",
            "risk_tolerance": "HIGH",
            "tags": ["vip", " ", "costa"],
        }))
        .unwrap();
        let mut profile = payload.validate_and_into_profile().unwrap();
        assert_eq!(profile.risk_tolerance, "high");
        assert_eq!(profile.tags, vec!["vip", "costa"]);
        assert_eq!(profile.investment_experience, "beginner");
        assert_eq!(profile.source.as_deref(), Some("website"));

        let patch: ClientPayload =
            serde_json::from_value(json!({"city": "Sitges", "phone": null})).unwrap();
        patch.apply_to(&mut profile).unwrap();
        assert_eq!(profile.city.as_deref(), Some("Sitges"));
        assert_eq!(profile.first_name, "Marta");

        let bad: ClientPayload =
            serde_json::from_value(json!({"client_type": "alien"})).unwrap();
        assert_eq!(field_of(bad.apply_to(&mut profile).unwrap_err()), "client_type");
    }

    #[test]
    fn client_payload_checks_budget_order() {
        let payload: ClientPayload = serde_json::from_value(json!({
            "first_name": "A", "last_name": "B", "email": "a@b.es",
            "investment_budget_min": 500000, "investment_budget_max": 100000,
        }))
        .unwrap();
        assert_eq!(
            field_of(payload.validate_and_into_profile().unwrap_err()),
            "investment_budget_min"
        );
    }

    #[test]
    fn project_payload_derives_slug_and_roi() {
        let payload: ProjectPayload = serde_json::from_value(json!({
            "title": "Casa del Mar, Calella",
            "location": "Calella",
            "property_type": "casa",
            "category": "compra-venta",
            "total_investment": 200000,
            "expected_revenue": 250000,
        }))
        .unwrap();
        let details = payload.validate_and_into_details().unwrap();
        assert_eq!(details.slug.as_deref(), Some("casa-del-mar-calella"));
        assert_eq!(details.property_type, "house");
        assert_eq!(details.status, "planning");
        assert_eq!(details.roi_percentage, Some(25.0));
    }

    #[test]
    fn project_update_uses_actual_revenue_and_checks_dates() {
        let mut details = crate::domain::project::fixtures::details();
        let patch: ProjectPayload =
            serde_json::from_value(json!({"actual_revenue": 528000})).unwrap();
        patch.apply_update(&mut details).unwrap();
        assert_eq!(details.roi_percentage, Some(20.0));

        let patch: ProjectPayload =
            serde_json::from_value(json!({"completion_date": "2024-12-31"})).unwrap();
        assert_eq!(
            field_of(patch.apply_update(&mut details).unwrap_err()),
            "completion_date"
        );
    }

    #[test]
    fn analytics_request_normalizes_month() {
        let req: ProjectAnalyticsRequest = serde_json::from_value(json!({
            "month": "2025-07",
            "revenue": 3000,
            "occupancy_days": 25,
        }))
        .unwrap();
        let a = req.validate_and_into_analytics().unwrap();
        assert_eq!(a.month, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(a.total_days, DEFAULT_ANALYTICS_TOTAL_DAYS);

        let over: ProjectAnalyticsRequest =
            serde_json::from_value(json!({"month": "2025-07-15", "occupancy_days": 40})).unwrap();
        assert_eq!(field_of(over.validate_and_into_analytics().unwrap_err()), "occupancy_days");
    }

    #[test]
    fn contact_needs_a_way_back() {
        let now = DateTime::parse_from_rfc3339("2025-07-15T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let req: ContactRequest =
            serde_json::from_value(json!({"name": "Pau", "message": "Hola"})).unwrap();
        assert_eq!(field_of(req.validate_and_into_submission(now).unwrap_err()), "email");

        let req: ContactRequest =
            serde_json::from_value(json!({"phone": "600000000"})).unwrap();
        let s = req.validate_and_into_submission(now).unwrap();
        // Madrid is UTC+2 in July.
        assert_eq!(s.reference, "ESKA20250715103000");
        assert_eq!(s.form_type, DEFAULT_FORM_TYPE);
    }

    #[test]
    fn timestamps_accept_common_shapes() {
        assert!(parse_timestamp("t", "2025-01-02T03:04:05+01:00").is_ok());
        assert!(parse_timestamp("t", "2025-01-02 03:04:05").is_ok());
        assert!(parse_timestamp("t", "2025-01-02").is_ok());
        assert!(parse_timestamp("t", "yesterday").is_err());
    }
}
