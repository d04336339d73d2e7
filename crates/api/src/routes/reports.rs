use anyhow::Context;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use inmo_core::domain::contract::ValuationRequest;
use inmo_core::error::CoreError;
use inmo_core::report;
use inmo_core::storage::{clients, valuations};
use inmo_core::time::season::today_in_madrid;
use inmo_core::valuation::compute_valuation;
use inmo_core::valuation::renovation::propose_renovation;
use std::path::{Path, PathBuf};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, CurrentUser};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-pdf/valuation/:id", get(valuation_pdf))
        .route("/generate-pdf/portfolio/:client_id", get(portfolio_pdf))
        .route("/generate-pdf/renovation-proposal", post(renovation_pdf))
}

fn report_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!(
        "{prefix}_{}_{}.pdf",
        Utc::now().format("%Y%m%d_%H%M%S"),
        uuid::Uuid::new_v4().simple()
    ))
}

/// Runs a blocking renderer off the async runtime and returns the written file.
async fn render<F>(path: PathBuf, write: F) -> ApiResult<Vec<u8>>
where
    F: FnOnce(&Path) -> anyhow::Result<()> + Send + 'static,
{
    let bytes = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
        write(&path)?;
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read report {}", path.display()))?;
        tracing::info!(path = %path.display(), size = bytes.len(), "report written");
        Ok(bytes)
    })
    .await
    .context("report task panicked")??;
    Ok(bytes)
}

fn pdf_response(download_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{download_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn valuation_pdf(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Response> {
    let valuation = valuations::get_valuation(state.db()?, id)
        .await?
        .ok_or_else(|| ApiError::not_found("valuation"))?;
    // Reject before touching the filesystem.
    report::valuation_report(&valuation)?;

    let path = report_path(&state.reports_dir(), &format!("valoracion_{id}"));
    let bytes = render(path, move |p| {
        report::write_valuation_report(&valuation, p, Utc::now())
    })
    .await?;
    Ok(pdf_response(&format!("valoracion_{id}.pdf"), bytes))
}

async fn portfolio_pdf(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(client_id): ApiPath<i64>,
) -> ApiResult<Response> {
    let portfolio = clients::get_portfolio(state.db()?, client_id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;

    let path = report_path(&state.reports_dir(), &format!("portfolio_{client_id}"));
    let bytes = render(path, move |p| {
        report::write_portfolio_report(&portfolio, p, Utc::now())
    })
    .await?;
    Ok(pdf_response(&format!("portfolio_{client_id}.pdf"), bytes))
}

/// Renders a proposal straight from the request; nothing is persisted.
async fn renovation_pdf(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ValuationRequest>,
) -> ApiResult<Response> {
    let input = req.validate_and_into_renovation_input()?;
    let result = compute_valuation(&input, today_in_madrid());
    let figures = result.figures.ok_or_else(|| {
        ApiError::Internal(
            CoreError::Computation(result.error.unwrap_or_default()).into(),
        )
    })?;
    let proposal = propose_renovation(&input, &figures);

    let path = report_path(&state.reports_dir(), "propuesta_reforma");
    let bytes = render(path, move |p| {
        report::write_renovation_report(&input, &proposal, p, Utc::now())
    })
    .await?;
    Ok(pdf_response("propuesta_reforma.pdf", bytes))
}

#[cfg(test)]
mod tests {
    use super::report_path;
    use std::path::Path;

    #[test]
    fn report_paths_are_unique_pdfs_under_the_reports_dir() {
        let a = report_path(Path::new("reports"), "valoracion_7");
        let b = report_path(Path::new("reports"), "valoracion_7");
        assert_ne!(a, b);
        assert!(a.starts_with("reports"));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("valoracion_7_"));
        assert!(name.ends_with(".pdf"));
    }
}
