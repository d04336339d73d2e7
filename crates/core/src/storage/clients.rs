use crate::domain::client::{
    Client, ClientContact, ClientDocument, ClientProfile, PortfolioPerformance,
};
use crate::domain::contract::{NewClientContact, NewClientDocument};
use crate::domain::project::Project;
use crate::error::{CoreError, CoreResult};
use crate::storage::projects::{self, ProjectFilter};
use crate::storage::{contains_pattern, LabelCount, LIKE_ESCAPE};
use anyhow::Context;
use serde::Serialize;
use sqlx::{PgExecutor, Postgres, QueryBuilder};

const CLIENT_SELECT: &str = "SELECT c.*, \
     (SELECT count(*) FROM projects p WHERE p.client_id = c.id AND p.status = 'active') AS active_projects_count, \
     (SELECT count(*) FROM projects p WHERE p.client_id = c.id AND p.status = 'completed') AS completed_projects_count \
     FROM clients c";

const PROFILE_COLUMNS: &str = "first_name, last_name, email, phone, date_of_birth, nationality, \
     address_line1, address_line2, city, state_province, postal_code, country, \
     occupation, company, annual_income, investment_experience, \
     investment_budget_min, investment_budget_max, risk_tolerance, investment_goals, \
     preferred_locations, preferred_property_types, client_type, status, source, \
     total_invested, total_revenue, total_profit, average_roi, \
     preferred_contact_method, language_preference, newsletter_subscribed, marketing_consent, \
     kyc_status, kyc_documents, tax_id, legal_representative, notes, tags, last_contact_date";

const CONTACT_COLUMNS: &str = "id, client_id, contact_type, subject, description, outcome, \
     contact_date, follow_up_date, staff_member, created_at";

#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pub status: Option<String>,
    pub client_type: Option<String>,
    pub kyc_status: Option<String>,
    /// Case-insensitive match on first/last name, email or company.
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientPortfolio {
    pub client: Client,
    pub performance: PortfolioPerformance,
    pub projects: Vec<Project>,
    pub total_projects: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub total_clients: i64,
    pub active_clients: i64,
    pub kyc_approved: i64,
    pub total_invested: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
    pub average_investment_per_client: f64,
    pub client_types: Vec<LabelCount>,
    pub sources: Vec<LabelCount>,
    pub top_countries: Vec<LabelCount>,
}

fn push_profile_values<'a>(qb: &mut QueryBuilder<'a, Postgres>, p: &'a ClientProfile) {
    let mut values = qb.separated(", ");
    values
        .push_bind(&p.first_name)
        .push_bind(&p.last_name)
        .push_bind(&p.email)
        .push_bind(&p.phone)
        .push_bind(p.date_of_birth)
        .push_bind(&p.nationality)
        .push_bind(&p.address_line1)
        .push_bind(&p.address_line2)
        .push_bind(&p.city)
        .push_bind(&p.state_province)
        .push_bind(&p.postal_code)
        .push_bind(&p.country)
        .push_bind(&p.occupation)
        .push_bind(&p.company)
        .push_bind(p.annual_income)
        .push_bind(&p.investment_experience)
        .push_bind(p.investment_budget_min)
        .push_bind(p.investment_budget_max)
        .push_bind(&p.risk_tolerance)
        .push_bind(&p.investment_goals)
        .push_bind(&p.preferred_locations)
        .push_bind(&p.preferred_property_types)
        .push_bind(&p.client_type)
        .push_bind(&p.status)
        .push_bind(&p.source)
        .push_bind(p.total_invested)
        .push_bind(p.total_revenue)
        .push_bind(p.total_profit)
        .push_bind(p.average_roi)
        .push_bind(&p.preferred_contact_method)
        .push_bind(&p.language_preference)
        .push_bind(p.newsletter_subscribed)
        .push_bind(p.marketing_consent)
        .push_bind(&p.kyc_status)
        .push_bind(&p.kyc_documents)
        .push_bind(&p.tax_id)
        .push_bind(&p.legal_representative)
        .push_bind(&p.notes)
        .push_bind(&p.tags)
        .push_bind(p.last_contact_date);
}

async fn fetch_client<'e, E: PgExecutor<'e>>(ex: E, id: i64) -> anyhow::Result<Option<Client>> {
    sqlx::query_as::<_, Client>(&format!("{CLIENT_SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(ex)
        .await
        .context("select client failed")
}

async fn email_taken<'e, E: PgExecutor<'e>>(
    ex: E,
    email: &str,
    except_id: Option<i64>,
) -> anyhow::Result<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM clients WHERE lower(email) = lower($1) AND id <> $2)",
    )
    .bind(email)
    .bind(except_id.unwrap_or(0))
    .fetch_one(ex)
    .await
    .context("select client email failed")
}

fn duplicate_email() -> anyhow::Error {
    CoreError::validation("email", "a client with this email already exists").into()
}

pub async fn create_client(pool: &sqlx::PgPool, profile: &ClientProfile) -> anyhow::Result<Client> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    if email_taken(&mut *tx, &profile.email, None).await? {
        return Err(duplicate_email());
    }

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO clients ({PROFILE_COLUMNS}) VALUES ("
    ));
    push_profile_values(&mut qb, profile);
    qb.push(") RETURNING id");
    let id: i64 = qb
        .build_query_scalar()
        .fetch_one(&mut *tx)
        .await
        .context("insert clients failed")?;

    let client = fetch_client(&mut *tx, id)
        .await?
        .context("inserted client vanished")?;
    tx.commit().await.context("commit transaction failed")?;
    Ok(client)
}

pub async fn get_client(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<Client>> {
    fetch_client(pool, id).await
}

pub async fn list_clients(pool: &sqlx::PgPool, filter: &ClientFilter) -> anyhow::Result<Vec<Client>> {
    let mut qb = QueryBuilder::<Postgres>::new(CLIENT_SELECT);
    qb.push(" WHERE TRUE");
    if let Some(status) = &filter.status {
        qb.push(" AND c.status = ").push_bind(status);
    }
    if let Some(client_type) = &filter.client_type {
        qb.push(" AND c.client_type = ").push_bind(client_type);
    }
    if let Some(kyc_status) = &filter.kyc_status {
        qb.push(" AND c.kyc_status = ").push_bind(kyc_status);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search.trim());
        qb.push(" AND (c.first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR c.last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR c.email ILIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR c.company ILIKE ")
            .push_bind(pattern)
            .push(LIKE_ESCAPE)
            .push(")");
    }
    qb.push(" ORDER BY c.created_at DESC, c.id DESC");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }

    qb.build_query_as::<Client>()
        .fetch_all(pool)
        .await
        .context("select clients failed")
}

/// Applies `apply` to the stored profile under a row lock. `None` when the client does not exist.
pub async fn update_client<F>(pool: &sqlx::PgPool, id: i64, apply: F) -> anyhow::Result<Option<Client>>
where
    F: FnOnce(&mut ClientProfile) -> CoreResult<()> + Send,
{
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM clients WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("lock client row failed")?;
    if locked.is_none() {
        return Ok(None);
    }
    let current = fetch_client(&mut *tx, id)
        .await?
        .context("locked client vanished")?;

    let mut profile = current.profile.clone();
    apply(&mut profile)?;

    if profile.email.to_lowercase() != current.profile.email.to_lowercase()
        && email_taken(&mut *tx, &profile.email, Some(id)).await?
    {
        return Err(duplicate_email());
    }

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "UPDATE clients SET ({PROFILE_COLUMNS}) = ROW("
    ));
    push_profile_values(&mut qb, &profile);
    qb.push("), updated_at = now() WHERE id = ").push_bind(id);
    qb.build()
        .execute(&mut *tx)
        .await
        .context("update clients failed")?;

    let client = fetch_client(&mut *tx, id).await?;
    tx.commit().await.context("commit transaction failed")?;
    Ok(client)
}

/// Deletes the client with its contact log and documents. Projects stay, unlinked.
pub async fn delete_client(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query("DELETE FROM client_contacts WHERE client_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete client_contacts failed")?;
    sqlx::query("DELETE FROM client_documents WHERE client_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete client_documents failed")?;
    let deleted = sqlx::query("DELETE FROM clients WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete clients failed")?
        .rows_affected();

    tx.commit().await.context("commit transaction failed")?;
    Ok(deleted > 0)
}

pub async fn list_contacts(pool: &sqlx::PgPool, client_id: i64) -> anyhow::Result<Vec<ClientContact>> {
    sqlx::query_as::<_, ClientContact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM client_contacts WHERE client_id = $1 \
         ORDER BY contact_date DESC, id DESC"
    ))
    .bind(client_id)
    .fetch_all(pool)
    .await
    .context("select client_contacts failed")
}

async fn insert_contact(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    client_id: i64,
    contact: &NewClientContact,
) -> anyhow::Result<ClientContact> {
    let row = sqlx::query_as::<_, ClientContact>(&format!(
        "INSERT INTO client_contacts \
         (client_id, contact_type, subject, description, outcome, follow_up_date, staff_member) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {CONTACT_COLUMNS}"
    ))
    .bind(client_id)
    .bind(&contact.contact_type)
    .bind(&contact.subject)
    .bind(&contact.description)
    .bind(&contact.outcome)
    .bind(contact.follow_up_date)
    .bind(&contact.staff_member)
    .fetch_one(&mut **tx)
    .await
    .context("insert client_contacts failed")?;

    sqlx::query("UPDATE clients SET last_contact_date = $2, updated_at = now() WHERE id = $1")
        .bind(client_id)
        .bind(row.contact_date)
        .execute(&mut **tx)
        .await
        .context("update clients last_contact_date failed")?;

    Ok(row)
}

async fn client_exists<'e, E: PgExecutor<'e>>(ex: E, id: i64) -> anyhow::Result<bool> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1)")
        .bind(id)
        .fetch_one(ex)
        .await
        .context("select client existence failed")
}

/// Logs a contact and stamps the client's last contact date. `None` when the client does not exist.
pub async fn add_contact(
    pool: &sqlx::PgPool,
    client_id: i64,
    contact: &NewClientContact,
) -> anyhow::Result<Option<ClientContact>> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;
    if !client_exists(&mut *tx, client_id).await? {
        return Ok(None);
    }
    let row = insert_contact(&mut tx, client_id, contact).await?;
    tx.commit().await.context("commit transaction failed")?;
    Ok(Some(row))
}

pub async fn list_documents(pool: &sqlx::PgPool, client_id: i64) -> anyhow::Result<Vec<ClientDocument>> {
    sqlx::query_as::<_, ClientDocument>(
        "SELECT * FROM client_documents WHERE client_id = $1 ORDER BY uploaded_at DESC, id DESC",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await
    .context("select client_documents failed")
}

pub async fn add_document(
    pool: &sqlx::PgPool,
    client_id: i64,
    doc: &NewClientDocument,
) -> anyhow::Result<Option<ClientDocument>> {
    if !client_exists(pool, client_id).await? {
        return Ok(None);
    }
    let row = sqlx::query_as::<_, ClientDocument>(
        "INSERT INTO client_documents (client_id, document_type, document_name, file_path, file_size, mime_type) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(client_id)
    .bind(&doc.document_type)
    .bind(&doc.document_name)
    .bind(&doc.file_path)
    .bind(doc.file_size)
    .bind(&doc.mime_type)
    .fetch_one(pool)
    .await
    .context("insert client_documents failed")?;
    Ok(Some(row))
}

pub async fn get_portfolio(pool: &sqlx::PgPool, client_id: i64) -> anyhow::Result<Option<ClientPortfolio>> {
    let Some(client) = fetch_client(pool, client_id).await? else {
        return Ok(None);
    };
    let projects = projects::list_projects(
        pool,
        &ProjectFilter {
            client_id: Some(client_id),
            ..ProjectFilter::default()
        },
    )
    .await?;

    Ok(Some(ClientPortfolio {
        performance: client.profile.portfolio_performance(),
        total_projects: projects.len(),
        client,
        projects,
    }))
}

pub async fn top_investors(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<Vec<Client>> {
    sqlx::query_as::<_, Client>(&format!(
        "{CLIENT_SELECT} WHERE c.total_invested > 0 ORDER BY c.total_invested DESC, c.id LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("select top investors failed")
}

pub async fn top_roi(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<Vec<Client>> {
    sqlx::query_as::<_, Client>(&format!(
        "{CLIENT_SELECT} WHERE c.total_invested > 0 ORDER BY c.average_roi DESC, c.id LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("select top roi clients failed")
}

pub async fn client_stats(pool: &sqlx::PgPool) -> anyhow::Result<ClientStats> {
    let (total_clients, active_clients, kyc_approved, total_invested, total_revenue, avg_investment): (
        i64,
        i64,
        i64,
        f64,
        f64,
        f64,
    ) = sqlx::query_as(
        "SELECT count(*), \
                count(*) FILTER (WHERE status = 'active'), \
                count(*) FILTER (WHERE kyc_status = 'approved'), \
                COALESCE(SUM(total_invested), 0)::float8, \
                COALESCE(SUM(total_revenue), 0)::float8, \
                COALESCE(AVG(total_invested) FILTER (WHERE total_invested > 0), 0)::float8 \
         FROM clients",
    )
    .fetch_one(pool)
    .await
    .context("select client totals failed")?;

    let client_types = sqlx::query_as::<_, LabelCount>(
        "SELECT client_type AS label, count(*) AS count FROM clients \
         GROUP BY client_type ORDER BY count(*) DESC",
    )
    .fetch_all(pool)
    .await
    .context("select clients by type failed")?;

    let sources = sqlx::query_as::<_, LabelCount>(
        "SELECT source AS label, count(*) AS count FROM clients \
         GROUP BY source ORDER BY count(*) DESC",
    )
    .fetch_all(pool)
    .await
    .context("select clients by source failed")?;

    let top_countries = sqlx::query_as::<_, LabelCount>(
        "SELECT country AS label, count(*) AS count FROM clients WHERE country IS NOT NULL \
         GROUP BY country ORDER BY count(*) DESC LIMIT 10",
    )
    .fetch_all(pool)
    .await
    .context("select clients by country failed")?;

    Ok(ClientStats {
        total_clients,
        active_clients,
        kyc_approved,
        total_invested,
        total_revenue,
        total_profit: total_revenue - total_invested,
        average_investment_per_client: avg_investment,
        client_types,
        sources,
        top_countries,
    })
}

/// Marks KYC as approved and records it in the contact log. `None` when the client does not exist.
pub async fn approve_kyc(
    pool: &sqlx::PgPool,
    client_id: i64,
    approved_by: &str,
) -> anyhow::Result<Option<Client>> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let updated = sqlx::query(
        "UPDATE clients SET kyc_status = 'approved', updated_at = now() WHERE id = $1",
    )
    .bind(client_id)
    .execute(&mut *tx)
    .await
    .context("update clients kyc_status failed")?
    .rows_affected();
    if updated == 0 {
        return Ok(None);
    }

    let contact = NewClientContact {
        contact_type: "email".to_string(),
        subject: Some("KYC Approved".to_string()),
        description: Some("Client KYC documentation has been approved".to_string()),
        outcome: Some("successful".to_string()),
        follow_up_date: None,
        staff_member: Some(approved_by.to_string()),
    };
    insert_contact(&mut tx, client_id, &contact).await?;

    let client = fetch_client(&mut *tx, client_id).await?;
    tx.commit().await.context("commit transaction failed")?;
    tracing::info!(client_id, approved_by, "client KYC approved");
    Ok(client)
}
