pub mod clients;
pub mod contacts;
pub mod dashboard;
pub mod market_data;
pub mod projects;
pub mod valuations;

use anyhow::Context;
use serde::Serialize;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// One bucket of a `GROUP BY` distribution.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LabelCount {
    pub label: Option<String>,
    pub count: i64,
}

/// Limits from query strings are clamped to a sane page size.
pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, 500)
}

/// Appended after every `ILIKE` bound with [`contains_pattern`].
pub(crate) const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// `%text%` with LIKE wildcards in the user's text matched literally.
pub(crate) fn contains_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
