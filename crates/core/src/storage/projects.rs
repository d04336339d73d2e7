use crate::domain::contract::{NewProjectAnalytics, NewProjectImage};
use crate::domain::project::{Project, ProjectAnalytics, ProjectDetails, ProjectImage};
use crate::error::{CoreError, CoreResult};
use crate::storage::{contains_pattern, LabelCount, LIKE_ESCAPE};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, QueryBuilder};

const DETAIL_COLUMNS: &str = "title, description, location, property_type, category, \
     surface, rooms, bathrooms, floor, year_built, \
     purchase_price, renovation_cost, total_investment, expected_revenue, actual_revenue, roi_percentage, \
     start_date, completion_date, duration_days, \
     status, occupancy_rate, average_rating, total_reviews, \
     main_image, before_image, after_image, gallery_images, features, amenities, \
     slug, meta_title, meta_description, client_id";

pub const DEFAULT_FEATURED_LIMIT: i64 = 6;

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<i64>,
    /// Substring match.
    pub location: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSearch {
    /// Free text matched against title, description and location.
    pub q: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub total_projects: i64,
    pub active_projects: i64,
    pub completed_projects: i64,
    pub average_roi: f64,
    pub total_investment: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
    pub categories: Vec<LabelCount>,
    pub top_locations: Vec<LabelCount>,
}

fn push_detail_values<'a>(qb: &mut QueryBuilder<'a, Postgres>, d: &'a ProjectDetails) {
    let mut values = qb.separated(", ");
    values
        .push_bind(&d.title)
        .push_bind(&d.description)
        .push_bind(&d.location)
        .push_bind(&d.property_type)
        .push_bind(&d.category)
        .push_bind(d.surface)
        .push_bind(d.rooms)
        .push_bind(d.bathrooms)
        .push_bind(&d.floor)
        .push_bind(d.year_built)
        .push_bind(d.purchase_price)
        .push_bind(d.renovation_cost)
        .push_bind(d.total_investment)
        .push_bind(d.expected_revenue)
        .push_bind(d.actual_revenue)
        .push_bind(d.roi_percentage)
        .push_bind(d.start_date)
        .push_bind(d.completion_date)
        .push_bind(d.duration_days)
        .push_bind(&d.status)
        .push_bind(d.occupancy_rate)
        .push_bind(d.average_rating)
        .push_bind(d.total_reviews)
        .push_bind(&d.main_image)
        .push_bind(&d.before_image)
        .push_bind(&d.after_image)
        .push_bind(&d.gallery_images)
        .push_bind(&d.features)
        .push_bind(&d.amenities)
        .push_bind(&d.slug)
        .push_bind(&d.meta_title)
        .push_bind(&d.meta_description)
        .push_bind(d.client_id);
}

async fn fetch_project<'e, E: PgExecutor<'e>>(ex: E, id: i64) -> anyhow::Result<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(ex)
        .await
        .context("select project failed")
}

async fn project_exists<'e, E: PgExecutor<'e>>(ex: E, id: i64) -> anyhow::Result<bool> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
        .bind(id)
        .fetch_one(ex)
        .await
        .context("select project existence failed")
}

/// First free slug among `base`, `base-2`, `base-3`...
async fn unique_slug(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    base: &str,
    except_id: Option<i64>,
) -> anyhow::Result<String> {
    let mut candidate = base.to_string();
    let mut n = 1;
    loop {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE slug = $1 AND id <> $2)")
                .bind(&candidate)
                .bind(except_id.unwrap_or(0))
                .fetch_one(&mut **tx)
                .await
                .context("select project slug failed")?;
        if !taken {
            return Ok(candidate);
        }
        n += 1;
        candidate = format!("{base}-{n}");
    }
}

async fn ensure_client_exists(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    client_id: Option<i64>,
) -> anyhow::Result<()> {
    let Some(client_id) = client_id else {
        return Ok(());
    };
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1)")
        .bind(client_id)
        .fetch_one(&mut **tx)
        .await
        .context("select client existence failed")?;
    if exists {
        Ok(())
    } else {
        Err(CoreError::validation("client_id", format!("client {client_id} does not exist")).into())
    }
}

pub async fn create_project(pool: &sqlx::PgPool, details: ProjectDetails) -> anyhow::Result<Project> {
    let mut details = details;
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    ensure_client_exists(&mut tx, details.client_id).await?;
    if let Some(base) = details.slug.take() {
        details.slug = Some(unique_slug(&mut tx, &base, None).await?);
    }

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO projects ({DETAIL_COLUMNS}) VALUES ("
    ));
    push_detail_values(&mut qb, &details);
    qb.push(") RETURNING *");
    let project = qb
        .build_query_as::<Project>()
        .fetch_one(&mut *tx)
        .await
        .context("insert projects failed")?;

    tx.commit().await.context("commit transaction failed")?;
    tracing::info!(project_id = project.id, slug = ?project.details.slug, "project created");
    Ok(project)
}

pub async fn get_project(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<Project>> {
    fetch_project(pool, id).await
}

pub async fn list_projects(pool: &sqlx::PgPool, filter: &ProjectFilter) -> anyhow::Result<Vec<Project>> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM projects WHERE TRUE");
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(status) = &filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(client_id) = filter.client_id {
        qb.push(" AND client_id = ").push_bind(client_id);
    }
    if let Some(location) = &filter.location {
        qb.push(" AND location ILIKE ")
            .push_bind(contains_pattern(location))
            .push(LIKE_ESCAPE);
    }
    qb.push(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }

    qb.build_query_as::<Project>()
        .fetch_all(pool)
        .await
        .context("select projects failed")
}

/// Applies `apply` under a row lock; a changed slug is made unique again.
pub async fn update_project<F>(pool: &sqlx::PgPool, id: i64, apply: F) -> anyhow::Result<Option<Project>>
where
    F: FnOnce(&mut ProjectDetails) -> CoreResult<()> + Send,
{
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let Some(current) = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("select project for update failed")?
    else {
        return Ok(None);
    };

    let mut details = current.details.clone();
    apply(&mut details)?;

    if details.client_id != current.details.client_id {
        ensure_client_exists(&mut tx, details.client_id).await?;
    }
    if details.slug != current.details.slug {
        if let Some(base) = details.slug.take() {
            details.slug = Some(unique_slug(&mut tx, &base, Some(id)).await?);
        }
    }

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "UPDATE projects SET ({DETAIL_COLUMNS}) = ROW("
    ));
    push_detail_values(&mut qb, &details);
    qb.push("), updated_at = now() WHERE id = ").push_bind(id);
    qb.push(" RETURNING *");
    let project = qb
        .build_query_as::<Project>()
        .fetch_one(&mut *tx)
        .await
        .context("update projects failed")?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(Some(project))
}

/// Deletes the project with its images and analytics.
pub async fn delete_project(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query("DELETE FROM project_images WHERE project_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete project_images failed")?;
    sqlx::query("DELETE FROM project_analytics WHERE project_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete project_analytics failed")?;
    let deleted = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete projects failed")?
        .rows_affected();

    tx.commit().await.context("commit transaction failed")?;
    Ok(deleted > 0)
}

/// Completed projects, best ROI first, rating as tie-break.
pub async fn featured_projects(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<Vec<Project>> {
    sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE status = 'completed' \
         ORDER BY roi_percentage DESC NULLS LAST, average_rating DESC NULLS LAST, id \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("select featured projects failed")
}

pub async fn projects_by_category(
    pool: &sqlx::PgPool,
    category: &str,
    limit: Option<i64>,
) -> anyhow::Result<Vec<Project>> {
    list_projects(
        pool,
        &ProjectFilter {
            category: Some(category.to_string()),
            limit,
            ..ProjectFilter::default()
        },
    )
    .await
}

pub async fn search_projects(pool: &sqlx::PgPool, search: &ProjectSearch) -> anyhow::Result<Vec<Project>> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM projects WHERE TRUE");
    if let Some(q) = search.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = contains_pattern(q);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR location ILIKE ")
            .push_bind(pattern)
            .push(LIKE_ESCAPE)
            .push(")");
    }
    if let Some(location) = &search.location {
        qb.push(" AND location ILIKE ")
            .push_bind(contains_pattern(location))
            .push(LIKE_ESCAPE);
    }
    if let Some(property_type) = &search.property_type {
        qb.push(" AND property_type = ").push_bind(property_type);
    }
    if let Some(category) = &search.category {
        qb.push(" AND category = ").push_bind(category);
    }
    qb.push(" ORDER BY created_at DESC, id DESC");

    qb.build_query_as::<Project>()
        .fetch_all(pool)
        .await
        .context("search projects failed")
}

/// Monthly analytics, newest month first. `None` when the project does not exist.
pub async fn list_analytics(
    pool: &sqlx::PgPool,
    project_id: i64,
) -> anyhow::Result<Option<Vec<ProjectAnalytics>>> {
    if !project_exists(pool, project_id).await? {
        return Ok(None);
    }
    let rows = sqlx::query_as::<_, ProjectAnalytics>(
        "SELECT * FROM project_analytics WHERE project_id = $1 ORDER BY month DESC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .context("select project_analytics failed")?;
    Ok(Some(rows))
}

/// One row per project and month; a second row for the same month is a validation error.
pub async fn add_analytics(
    pool: &sqlx::PgPool,
    project_id: i64,
    a: &NewProjectAnalytics,
) -> anyhow::Result<Option<ProjectAnalytics>> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;
    if !project_exists(&mut *tx, project_id).await? {
        return Ok(None);
    }

    let duplicate: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM project_analytics WHERE project_id = $1 AND month = $2)",
    )
    .bind(project_id)
    .bind(a.month)
    .fetch_one(&mut *tx)
    .await
    .context("select project_analytics month failed")?;
    if duplicate {
        return Err(CoreError::validation(
            "month",
            format!("analytics for {} already recorded", a.month.format("%Y-%m")),
        )
        .into());
    }

    let row = sqlx::query_as::<_, ProjectAnalytics>(
        "INSERT INTO project_analytics \
         (project_id, month, revenue, expenses, occupancy_days, total_days, bookings_count, average_daily_rate, guest_rating) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING *",
    )
    .bind(project_id)
    .bind(a.month)
    .bind(a.revenue)
    .bind(a.expenses)
    .bind(a.occupancy_days)
    .bind(a.total_days)
    .bind(a.bookings_count)
    .bind(a.average_daily_rate)
    .bind(a.guest_rating)
    .fetch_one(&mut *tx)
    .await
    .context("insert project_analytics failed")?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(Some(row))
}

pub async fn list_images(
    pool: &sqlx::PgPool,
    project_id: i64,
) -> anyhow::Result<Option<Vec<ProjectImage>>> {
    if !project_exists(pool, project_id).await? {
        return Ok(None);
    }
    let rows = sqlx::query_as::<_, ProjectImage>(
        "SELECT * FROM project_images WHERE project_id = $1 ORDER BY order_index, id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .context("select project_images failed")?;
    Ok(Some(rows))
}

pub async fn add_image(
    pool: &sqlx::PgPool,
    project_id: i64,
    image: &NewProjectImage,
) -> anyhow::Result<Option<ProjectImage>> {
    if !project_exists(pool, project_id).await? {
        return Ok(None);
    }
    let row = sqlx::query_as::<_, ProjectImage>(
        "INSERT INTO project_images (project_id, image_url, image_type, caption, order_index) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(project_id)
    .bind(&image.image_url)
    .bind(&image.image_type)
    .bind(&image.caption)
    .bind(image.order_index)
    .fetch_one(pool)
    .await
    .context("insert project_images failed")?;
    Ok(Some(row))
}

pub async fn project_stats(pool: &sqlx::PgPool) -> anyhow::Result<ProjectStats> {
    let (total_projects, active_projects, completed_projects, average_roi, total_investment, total_revenue): (
        i64,
        i64,
        i64,
        f64,
        f64,
        f64,
    ) = sqlx::query_as(
        "SELECT count(*), \
                count(*) FILTER (WHERE status = 'active'), \
                count(*) FILTER (WHERE status = 'completed'), \
                COALESCE(AVG(roi_percentage), 0)::float8, \
                COALESCE(SUM(total_investment), 0)::float8, \
                COALESCE(SUM(actual_revenue), 0)::float8 \
         FROM projects",
    )
    .fetch_one(pool)
    .await
    .context("select project totals failed")?;

    let categories = sqlx::query_as::<_, LabelCount>(
        "SELECT category AS label, count(*) AS count FROM projects \
         GROUP BY category ORDER BY count(*) DESC",
    )
    .fetch_all(pool)
    .await
    .context("select projects by category failed")?;

    let top_locations = sqlx::query_as::<_, LabelCount>(
        "SELECT location AS label, count(*) AS count FROM projects \
         GROUP BY location ORDER BY count(*) DESC LIMIT 10",
    )
    .fetch_all(pool)
    .await
    .context("select projects by location failed")?;

    Ok(ProjectStats {
        total_projects,
        active_projects,
        completed_projects,
        average_roi,
        total_investment,
        total_revenue,
        total_profit: total_revenue - total_investment,
        categories,
        top_locations,
    })
}
