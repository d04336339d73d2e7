use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use inmo_core::domain::contract::ContactRequest;
use inmo_core::storage::{contacts, dashboard};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::{ApiJson, CurrentUser};
use crate::AppState;

const SERVICE_NAME: &str = "inmo-api";

const PRIVACY_POLICY: &str = r#"
<h1>Política de Privacidad</h1>

<h2>1. Responsable del Tratamiento</h2>
<p>La empresa titular de este sitio es responsable del tratamiento de sus datos personales.</p>

<h2>2. Datos que Recopilamos</h2>
<ul>
    <li>Datos de contacto (nombre, email, teléfono)</li>
    <li>Información de inversión y preferencias</li>
    <li>Datos de navegación y cookies</li>
</ul>

<h2>3. Finalidad del Tratamiento</h2>
<ul>
    <li>Proporcionar nuestros servicios de inversión inmobiliaria</li>
    <li>Comunicarnos con usted sobre oportunidades de inversión</li>
    <li>Cumplir con obligaciones legales</li>
</ul>

<h2>4. Base Legal</h2>
<p>El tratamiento se basa en su consentimiento y en la ejecución de contratos.</p>

<h2>5. Derechos del Usuario</h2>
<p>Tiene derecho a acceder, rectificar, suprimir y portar sus datos.</p>
"#;

const COOKIES_POLICY: &str = r#"
<h1>Política de Cookies</h1>

<h2>¿Qué son las cookies?</h2>
<p>Las cookies son pequeños archivos de texto que se almacenan en su dispositivo cuando visita nuestro sitio web.</p>

<h2>Tipos de cookies que utilizamos</h2>
<ul>
    <li><strong>Cookies técnicas:</strong> Necesarias para el funcionamiento del sitio</li>
    <li><strong>Cookies analíticas:</strong> Para analizar el uso del sitio web</li>
    <li><strong>Cookies de personalización:</strong> Para recordar sus preferencias</li>
</ul>

<h2>Gestión de cookies</h2>
<p>Puede gestionar las cookies desde la configuración de su navegador.</p>
"#;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/contact", post(contact))
        .route("/legal/privacy", get(privacy))
        .route("/legal/cookies", get(cookies))
        .route("/dashboard/stats", get(dashboard_stats))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = if state.pool.is_some() { "connected" } else { "unavailable" };
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "timestamp": Utc::now().to_rfc3339(),
        "features": {
            "projects_management": true,
            "client_crm": true,
            "valuation": true,
            "pdf_generation": true,
            "user_authentication": true,
            "analytics": true,
        },
    }))
}

/// Leads are stored when a database is configured; otherwise they are only logged.
async fn contact(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ContactRequest>,
) -> ApiResult<Json<Value>> {
    let submission = req.validate_and_into_submission(Utc::now())?;
    match state.pool.as_ref() {
        Some(pool) => {
            let id = contacts::insert_contact_submission(pool, &submission).await?;
            tracing::info!(
                id,
                reference = %submission.reference,
                form_type = %submission.form_type,
                "contact submission stored"
            );
        }
        None => tracing::warn!(
            reference = %submission.reference,
            email = submission.email.as_deref().unwrap_or("-"),
            phone = submission.phone.as_deref().unwrap_or("-"),
            "contact submission received without a database"
        ),
    }
    Ok(Json(json!({
        "success": true,
        "message": "Mensaje recibido correctamente. Te contactaremos pronto.",
        "contact_id": submission.reference,
    })))
}

async fn privacy() -> Json<Value> {
    Json(json!({ "success": true, "content": PRIVACY_POLICY }))
}

async fn cookies() -> Json<Value> {
    Json(json!({ "success": true, "content": COOKIES_POLICY }))
}

async fn dashboard_stats(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<Json<Value>> {
    let d = dashboard::dashboard_stats(state.db()?).await?;
    let recent_clients: Vec<_> = d.recent_activity.clients.iter().map(|c| c.view(false)).collect();
    Ok(Json(json!({
        "success": true,
        "stats": d.stats,
        "recent_activity": {
            "projects": d.recent_activity.projects,
            "clients": recent_clients,
            "valuations": d.recent_activity.valuations,
        },
    })))
}
