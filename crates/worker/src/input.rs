use anyhow::Context;
use inmo_core::domain::contract::ValuationRequest;
use inmo_core::valuation::ValuationInput;
use std::path::Path;

/// Reads a valuation request in the same JSON shape the API accepts.
fn read_request(path: &Path) -> anyhow::Result<ValuationRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid valuation request in {}", path.display()))
}

pub fn read_valuation_input(path: &Path) -> anyhow::Result<ValuationInput> {
    Ok(read_request(path)?.validate_and_into_input()?)
}

pub fn read_renovation_input(path: &Path) -> anyhow::Result<ValuationInput> {
    Ok(read_request(path)?.validate_and_into_renovation_input()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inmo_core::error::CoreError;
    use inmo_core::valuation::PropertyType;

    fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("request.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn reads_api_shaped_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"{"location": "Sitges", "property_type": "piso", "surface": 65, "floor": 3}"#,
        );
        let input = read_valuation_input(&path).unwrap();
        assert_eq!(input.location, "Sitges");
        assert_eq!(input.property_type, PropertyType::Apartment);
        assert_eq!(input.floor.as_deref(), Some("3"));
    }

    #[test]
    fn validation_errors_keep_their_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"location": "Sitges", "property_type": "apartment", "surface": 65}"#);
        let err = read_renovation_input(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::Validation { field, .. }) if field == "current_condition"
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_valuation_input(Path::new("/nonexistent/request.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
