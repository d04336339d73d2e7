use crate::domain::contract::ContactSubmission;
use anyhow::Context;

pub async fn insert_contact_submission(
    pool: &sqlx::PgPool,
    submission: &ContactSubmission,
) -> anyhow::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO contact_submissions (reference, name, email, phone, message, form_type) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(&submission.reference)
    .bind(&submission.name)
    .bind(&submission.email)
    .bind(&submission.phone)
    .bind(&submission.message)
    .bind(&submission.form_type)
    .fetch_one(pool)
    .await
    .context("insert contact_submissions failed")
}
