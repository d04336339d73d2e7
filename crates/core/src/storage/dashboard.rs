use crate::domain::client::Client;
use crate::domain::project::Project;
use crate::storage::clients::{self, ClientFilter};
use crate::storage::projects::{self, ProjectFilter};
use crate::storage::valuations::{self, StoredValuation, ValuationFilter};
use anyhow::Context;
use serde::Serialize;

pub const RECENT_ACTIVITY_LIMIT: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectCounts {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientCounts {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValuationCounts {
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Financials {
    pub total_investment: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardCounts {
    pub projects: ProjectCounts,
    pub clients: ClientCounts,
    pub valuations: ValuationCounts,
    pub financial: Financials,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentActivity {
    pub projects: Vec<Project>,
    pub clients: Vec<Client>,
    pub valuations: Vec<StoredValuation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub stats: DashboardCounts,
    pub recent_activity: RecentActivity,
}

pub async fn dashboard_stats(pool: &sqlx::PgPool) -> anyhow::Result<DashboardStats> {
    let row: (i64, i64, i64, i64, i64, i64, i64, f64, f64) = sqlx::query_as(
        "SELECT \
            (SELECT count(*) FROM projects), \
            (SELECT count(*) FROM projects WHERE status = 'active'), \
            (SELECT count(*) FROM projects WHERE status = 'completed'), \
            (SELECT count(*) FROM clients), \
            (SELECT count(*) FROM clients WHERE status = 'active'), \
            (SELECT count(*) FROM property_valuations), \
            (SELECT count(*) FROM property_valuations WHERE status = 'completed'), \
            (SELECT COALESCE(SUM(total_investment), 0)::float8 FROM projects), \
            (SELECT COALESCE(SUM(actual_revenue), 0)::float8 FROM projects)",
    )
    .fetch_one(pool)
    .await
    .context("select dashboard counts failed")?;
    let (p_total, p_active, p_completed, c_total, c_active, v_total, v_completed, investment, revenue) =
        row;

    let recent_projects = projects::list_projects(
        pool,
        &ProjectFilter {
            limit: Some(RECENT_ACTIVITY_LIMIT),
            ..ProjectFilter::default()
        },
    )
    .await?;
    let recent_clients = clients::list_clients(
        pool,
        &ClientFilter {
            limit: Some(RECENT_ACTIVITY_LIMIT),
            ..ClientFilter::default()
        },
    )
    .await?;
    let recent_valuations = valuations::list_valuations(
        pool,
        &ValuationFilter {
            limit: Some(RECENT_ACTIVITY_LIMIT),
            ..ValuationFilter::default()
        },
    )
    .await?;

    Ok(DashboardStats {
        stats: DashboardCounts {
            projects: ProjectCounts {
                total: p_total,
                active: p_active,
                completed: p_completed,
            },
            clients: ClientCounts {
                total: c_total,
                active: c_active,
            },
            valuations: ValuationCounts {
                total: v_total,
                completed: v_completed,
            },
            financial: Financials {
                total_investment: investment,
                total_revenue: revenue,
                total_profit: revenue - investment,
            },
        },
        recent_activity: RecentActivity {
            projects: recent_projects,
            clients: recent_clients,
            valuations: recent_valuations,
        },
    })
}
