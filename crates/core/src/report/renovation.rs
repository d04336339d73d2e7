use super::{condition_label, format_eur, format_percent, or_not_available, property_type_label, ReportDocument};
use crate::valuation::renovation::RenovationProposal;
use crate::valuation::ValuationInput;
use chrono::{DateTime, Utc};
use std::path::Path;

const INTRO: &str = "El programa 'Reforma sin Coste' maximiza el valor y la rentabilidad de su \
     propiedad sin inversión inicial por su parte. Nuestro equipo se encarga de la financiación, \
     la gestión y la ejecución completa del proyecto.";

const CONTACT: &str = "Para concretar los detalles de la propuesta o agendar la visita técnica \
     gratuita, responda a este documento o contacte con su asesor.";

pub fn renovation_report(input: &ValuationInput, proposal: &RenovationProposal) -> ReportDocument {
    let mut doc = ReportDocument::new("Propuesta Reforma sin Coste");
    doc.subtitle(format!(
        "{} · {} · {} m²",
        input.location,
        property_type_label(input.property_type.as_str()),
        input.surface
    ));

    doc.section("Programa Reforma sin Coste")
        .paragraph(INTRO)
        .spacer()
        .section("Detalles de la propiedad")
        .row("Ubicación", input.location.clone())
        .row("Tipo", property_type_label(input.property_type.as_str()))
        .row("Superficie", format!("{} m²", input.surface))
        .row(
            "Estado actual",
            input
                .condition
                .as_ref()
                .map(|c| condition_label(c.as_str()))
                .unwrap_or_else(|| "N/D".to_string()),
        )
        .row("Habitaciones", or_not_available(input.rooms));

    doc.spacer()
        .section("Análisis financiero")
        .row("Valor actual", format_eur(proposal.current_value))
        .row("Valor post-renovación", format_eur(proposal.post_renovation_value))
        .row("Incremento de valor", format_eur(proposal.value_increase))
        .row("Coste de renovación", format_eur(proposal.renovation_cost))
        .row(
            "Alquiler actual potencial",
            format!("{}/mes", format_eur(proposal.current_rental_potential)),
        )
        .row(
            "Alquiler post-renovación",
            format!("{}/mes", format_eur(proposal.post_renovation_rental)),
        )
        .row(
            "Incremento alquiler",
            format!("{}/mes", format_eur(proposal.rental_increase)),
        )
        .row("Ingresos anuales", format_eur(proposal.annual_rental_income))
        .row(
            "Período de amortización",
            format!("{:.1} meses", proposal.payback_period_months).replace('.', ","),
        )
        .row("ROI primer año", format_percent(proposal.roi_first_year));

    doc.spacer().section("Beneficios del programa");
    for benefit in &proposal.program_benefits {
        doc.bullet(benefit.clone());
    }
    doc.spacer()
        .section("Próximos pasos")
        .numbered(&proposal.next_steps)
        .spacer()
        .section("Contacto")
        .paragraph(CONTACT);

    doc
}

pub fn write_renovation_report(
    input: &ValuationInput,
    proposal: &RenovationProposal,
    path: &Path,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    renovation_report(input, proposal).write_pdf(path, generated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Block;
    use crate::valuation::renovation::propose_renovation;
    use crate::valuation::{compute_valuation, Condition, PropertyType};
    use chrono::NaiveDate;

    fn proposal() -> (ValuationInput, RenovationProposal) {
        let mut input = ValuationInput::new("Badalona", PropertyType::Apartment, 70.0);
        input.condition = Some(Condition::Poor);
        input.rooms = Some(2);
        input.renovation_needed = true;
        let as_of = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let figures = compute_valuation(&input, as_of).figures.unwrap();
        let p = propose_renovation(&input, &figures);
        (input, p)
    }

    #[test]
    fn lists_cost_benefits_and_steps() {
        let (input, p) = proposal();
        let doc = renovation_report(&input, &p);
        assert!(doc.blocks.contains(&Block::Row {
            label: "Coste de renovación".into(),
            value: "72.800 €".into(),
        }));
        assert!(doc.blocks.contains(&Block::Row {
            label: "Estado actual".into(),
            value: "Malo".into(),
        }));
        let bullets = doc
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::Bullet(_)))
            .count();
        assert_eq!(bullets, p.program_benefits.len());
        assert!(doc
            .blocks
            .contains(&Block::Paragraph("1. Visita técnica gratuita".into())));
    }

    #[test]
    fn writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renovation.pdf");
        let (input, p) = proposal();
        write_renovation_report(&input, &p, &path, Utc::now()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(lopdf::Document::load(&path).is_ok());
    }
}
