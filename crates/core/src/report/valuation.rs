use super::{
    condition_label, format_eur_opt, format_percent_opt, or_not_available, property_type_label,
    ReportDocument,
};
use crate::error::CoreError;
use crate::storage::valuations::StoredValuation;
use chrono::{DateTime, Utc};
use std::path::Path;

const DISCLAIMER: &str = "Esta valoración es una estimación heurística basada en las \
     características declaradas del inmueble y en precios de referencia de la zona. No sustituye \
     a una tasación oficial realizada por un tasador certificado ni debe ser la única base de una \
     decisión de inversión.";

fn confidence_band(score: f64) -> &'static str {
    if score >= 90.0 {
        "Muy alta"
    } else if score >= 80.0 {
        "Alta"
    } else if score >= 70.0 {
        "Media"
    } else {
        "Baja"
    }
}

fn level_label(level: Option<&str>) -> String {
    match level {
        Some("low") => "Bajo".into(),
        Some("medium") => "Medio".into(),
        Some("high") => "Alto".into(),
        Some("excellent") => "Excelente".into(),
        Some("good") => "Bueno".into(),
        Some("fair") => "Regular".into(),
        Some("poor") => "Bajo".into(),
        Some(other) => other.to_string(),
        None => "N/D".into(),
    }
}

fn trend_label(trend: Option<&str>) -> &'static str {
    match trend {
        Some("rising") => "alcista",
        Some("declining") => "a la baja",
        _ => "estable",
    }
}

/// Only completed valuations have figures to report.
pub fn valuation_report(v: &StoredValuation) -> anyhow::Result<ReportDocument> {
    if !v.is_completed() {
        return Err(CoreError::validation(
            "status",
            format!("valuation {} is not completed (status {})", v.id, v.status),
        )
        .into());
    }

    let mut doc = ReportDocument::new("Informe de valoración inmobiliaria");
    doc.subtitle(format!(
        "Valoración nº {} · {} · fecha de referencia {}",
        v.id,
        v.location,
        v.as_of_date.format("%d/%m/%Y")
    ));

    doc.section("Datos de la propiedad")
        .row("Ubicación", v.location.clone())
        .row("Tipo de propiedad", property_type_label(&v.property_type))
        .row("Superficie", format!("{} m²", v.surface))
        .row("Habitaciones", or_not_available(v.rooms))
        .row("Baños", or_not_available(v.bathrooms))
        .row(
            "Estado",
            v.condition
                .as_deref()
                .map(condition_label)
                .unwrap_or_else(|| "N/D".to_string()),
        )
        .row("Año de construcción", or_not_available(v.year_built));
    if let Some(neighborhood) = &v.neighborhood {
        doc.row("Barrio", neighborhood.clone());
    }
    if let Some(d) = v.distance_to_beach {
        doc.row("Distancia a la playa", format!("{d} km"));
    }
    if let Some(d) = v.distance_to_center {
        doc.row("Distancia al centro", format!("{d} km"));
    }

    doc.spacer()
        .section("Resultados de la valoración")
        .row("Valor estimado", format_eur_opt(v.estimated_value))
        .row("Precio por m²", format_eur_opt(v.price_per_sqm))
        .row(
            "Potencial de alquiler mensual",
            format_eur_opt(v.rental_potential_monthly),
        )
        .row("Rentabilidad anual", format_percent_opt(v.rental_yield_percentage))
        .row("ROI esperado (1 año)", format_percent_opt(v.roi_1year))
        .row("ROI esperado (3 años)", format_percent_opt(v.roi_3year))
        .row("ROI esperado (5 años)", format_percent_opt(v.roi_5year))
        .row("Nivel de riesgo", level_label(v.risk_level.as_deref()))
        .row(
            "Potencial de inversión",
            level_label(v.investment_potential.as_deref()),
        );

    let confidence = v.confidence_score.unwrap_or(0.0);
    doc.spacer()
        .section("Confianza de la estimación")
        .paragraph(format!(
            "Puntuación de confianza: {confidence:.1}% ({})",
            confidence_band(confidence)
        ));

    if !v.recommendations.is_empty() {
        doc.spacer()
            .section("Recomendaciones")
            .numbered(&v.recommendations);
    }
    if !v.risk_factors.is_empty() {
        doc.spacer().section("Factores de riesgo");
        for factor in &v.risk_factors {
            doc.bullet(factor.clone());
        }
    }

    doc.spacer()
        .section("Análisis de mercado")
        .paragraph(format!(
            "El mercado de {} muestra una tendencia {} en el momento de la valoración. La \
             estimación tiene en cuenta la ubicación, las características del inmueble, su estado \
             y la estacionalidad de la demanda de alquiler.",
            v.location,
            trend_label(v.market_trend.as_deref())
        ))
        .spacer()
        .section("Aviso legal")
        .paragraph(DISCLAIMER);

    Ok(doc)
}

pub fn write_valuation_report(
    v: &StoredValuation,
    path: &Path,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    valuation_report(v)?.write_pdf(path, generated_at)
}


#[cfg(test)]
mod tests {
    use super::fixtures::stored_valuation;
    use super::*;
    use crate::report::Block;

    #[test]
    fn report_lists_figures_in_spanish() {
        let doc = valuation_report(&stored_valuation()).unwrap();
        assert!(doc.blocks.contains(&Block::Row {
            label: "Valor estimado".into(),
            value: "255.000 €".into(),
        }));
        assert!(doc.blocks.contains(&Block::Row {
            label: "Tipo de propiedad".into(),
            value: "Apartamento".into(),
        }));
        assert!(doc
            .blocks
            .contains(&Block::Paragraph("Puntuación de confianza: 87.5% (Alta)".into())));
        // No risk factors, no section for them.
        assert!(!doc
            .blocks
            .contains(&Block::Section("Factores de riesgo".into())));
    }

    #[test]
    fn failed_valuations_are_rejected() {
        let mut v = stored_valuation();
        v.status = "error".into();
        let err = valuation_report(&v).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::Validation { field, .. }) if field == "status"
        ));
    }

    #[test]
    fn writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valuation_42.pdf");
        write_valuation_report(&stored_valuation(), &path, Utc::now()).unwrap();
        let doc = lopdf::Document::load(&path).unwrap();
        assert!(!doc.get_pages().is_empty());
    }
}
