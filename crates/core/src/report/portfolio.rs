use super::{
    format_eur, format_eur_opt, format_percent, format_percent_opt, property_type_label,
    ReportDocument,
};
use crate::storage::clients::ClientPortfolio;
use chrono::{DateTime, Utc};
use std::path::Path;

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn performance_band(average_roi: f64) -> &'static str {
    if average_roi > 10.0 {
        "excelente"
    } else if average_roi > 6.0 {
        "bueno"
    } else {
        "moderado"
    }
}

/// Advice for the client, most specific first.
pub fn portfolio_recommendations(average_roi: f64, projects: usize, total_invested: f64) -> Vec<String> {
    let mut recs = Vec::new();
    if average_roi < 6.0 {
        recs.push("Considere propiedades con mayor potencial de alquiler turístico".to_string());
    }
    if projects < 3 {
        recs.push("Diversifique su portfolio con propiedades en diferentes ubicaciones".to_string());
    }
    if total_invested < 200_000.0 {
        recs.push(
            "Explore oportunidades de inversión adicionales para maximizar beneficios".to_string(),
        );
    }
    recs.extend(
        [
            "Mantenga un seguimiento regular del rendimiento de sus propiedades",
            "Considere el programa 'Reforma sin Coste' para optimizar propiedades existentes",
            "Evalúe oportunidades en el mercado del Maresme y Barcelona",
        ]
        .map(String::from),
    );
    recs
}

pub fn portfolio_report(portfolio: &ClientPortfolio) -> ReportDocument {
    let client = &portfolio.client;
    let profile = &client.profile;
    let perf = &portfolio.performance;

    let mut doc = ReportDocument::new("Informe de portfolio de inversión");
    doc.subtitle(format!("Cliente nº {} · {}", client.id, client.full_name()));

    doc.section("Información del cliente")
        .row("Nombre", client.full_name())
        .row("Email", profile.email.clone())
        .row("Tipo de cliente", title_case(&profile.client_type))
        .row(
            "Experiencia en inversión",
            title_case(&profile.investment_experience),
        )
        .row("Tolerancia al riesgo", title_case(&profile.risk_tolerance))
        .row("Cliente desde", client.created_at.format("%d/%m/%Y").to_string());

    doc.spacer()
        .section("Resumen del portfolio")
        .row("Total invertido", format_eur(perf.total_invested))
        .row("Ingresos totales", format_eur(perf.total_revenue))
        .row("Beneficio total", format_eur(perf.total_profit))
        .row("ROI promedio", format_percent(perf.average_roi))
        .row("Proyectos activos", client.active_projects_count.to_string())
        .row(
            "Proyectos completados",
            client.completed_projects_count.to_string(),
        );

    if !portfolio.projects.is_empty() {
        doc.spacer().section("Detalle de proyectos");
        for project in &portfolio.projects {
            let d = &project.details;
            doc.paragraph(d.title.clone())
                .row("Ubicación", d.location.clone())
                .row("Tipo", property_type_label(&d.property_type))
                .row("Estado", title_case(&d.status))
                .row("Inversión", format_eur_opt(d.total_investment))
                .row("Ingresos", format_eur_opt(d.actual_revenue))
                .row("ROI", format_percent_opt(d.roi_percentage))
                .spacer();
        }
    }

    let diversification = if portfolio.total_projects > 2 {
        "Su estrategia de diversificación está funcionando bien."
    } else {
        "Considere diversificar su portfolio con más propiedades."
    };
    doc.spacer()
        .section("Análisis de rendimiento")
        .paragraph(format!(
            "Su portfolio muestra un rendimiento {} con un ROI promedio del {}. Con una inversión \
             total de {} ha generado ingresos por {}, con un beneficio neto de {}. {}",
            performance_band(perf.average_roi),
            format_percent(perf.average_roi),
            format_eur(perf.total_invested),
            format_eur(perf.total_revenue),
            format_eur(perf.total_profit),
            diversification
        ))
        .spacer()
        .section("Recomendaciones")
        .numbered(portfolio_recommendations(
            perf.average_roi,
            portfolio.total_projects,
            perf.total_invested,
        ));

    doc
}

pub fn write_portfolio_report(
    portfolio: &ClientPortfolio,
    path: &Path,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    portfolio_report(portfolio).write_pdf(path, generated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{client, project};
    use crate::report::Block;

    fn portfolio(projects: usize) -> ClientPortfolio {
        let mut client = client::fixtures::client();
        client.profile.total_invested = 300_000.0;
        client.profile.total_revenue = 336_000.0;
        let projects: Vec<_> = (0..projects).map(|_| project::fixtures::project()).collect();
        ClientPortfolio {
            performance: client.profile.portfolio_performance(),
            total_projects: projects.len(),
            projects,
            client,
        }
    }

    #[test]
    fn recommendations_depend_on_performance() {
        let weak = portfolio_recommendations(3.0, 1, 50_000.0);
        assert_eq!(weak.len(), 6);
        assert!(weak[0].contains("alquiler turístico"));

        let strong = portfolio_recommendations(12.0, 5, 500_000.0);
        assert_eq!(strong.len(), 3);
        assert!(strong[0].starts_with("Mantenga"));
    }

    #[test]
    fn summary_uses_recomputed_performance() {
        let doc = portfolio_report(&portfolio(0));
        assert!(doc.blocks.contains(&Block::Row {
            label: "Beneficio total".into(),
            value: "36.000 €".into(),
        }));
        assert!(doc.blocks.contains(&Block::Row {
            label: "ROI promedio".into(),
            value: "12,00%".into(),
        }));
        assert!(!doc
            .blocks
            .contains(&Block::Section("Detalle de proyectos".into())));
    }

    #[test]
    fn many_projects_span_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.pdf");
        let p = portfolio(12);
        write_portfolio_report(&p, &path, Utc::now()).unwrap();

        let loaded = lopdf::Document::load(&path).unwrap();
        let expected = portfolio_report(&p).layout().len();
        assert!(expected > 1);
        assert_eq!(loaded.get_pages().len(), expected);
    }
}
