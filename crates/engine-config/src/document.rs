use std::path::Path;

use model::config::PipelineConfig;
use serde::Serialize;
use storage::StoreRegistry;

use crate::error::ConfigError;
use crate::finding::{Finding, Severity};

/// Reads and parses a config document from disk. Validation is separate;
/// this only fails on unreadable files and undeserializable JSON.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<PipelineConfig, ConfigError> {
    Ok(serde_json::from_str(raw)?)
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// True when nothing error-grade was found; warnings do not block a run.
    pub fn passed(&self) -> bool {
        !self
            .findings
            .iter()
            .any(|finding| finding.severity == Severity::Error)
    }
}

/// Validates a raw document without running it. A document that does not
/// even parse yields a single parse finding, so unknown transform kinds
/// show up here instead of panicking a run.
pub fn validate_document(raw: &str, registry: &StoreRegistry) -> ValidationReport {
    match serde_json::from_str::<PipelineConfig>(raw) {
        Ok(config) => validate_config(&config, registry),
        Err(err) => ValidationReport {
            findings: vec![Finding::new_parse_error(&err)],
        },
    }
}

/// Semantic checks over a parsed config: every location's scheme must have
/// a provider, every transform must construct, and per-scheme storage
/// options should belong to some location.
pub fn validate_config(config: &PipelineConfig, registry: &StoreRegistry) -> ValidationReport {
    let mut findings = Vec::new();

    let locations = [
        ("source", &config.source),
        ("destination", &config.destination),
        ("state", &config.state),
    ];
    for (field, location) in &locations {
        if !registry.knows_scheme(location.scheme()) {
            findings.push(Finding::new_unknown_scheme(
                field,
                &location.to_string(),
                &registry.schemes(),
            ));
        }
    }

    if config.transforms.is_empty() {
        findings.push(Finding::new_empty_transforms());
    }
    for (index, spec) in config.transforms.iter().enumerate() {
        // Building the stage is the validation: key decoding, level range
        // and sed script compilation all happen there.
        if let Err(err) = engine_processing::transform::build(spec) {
            findings.push(Finding::new_bad_transform(
                index,
                spec.kind(),
                &err.to_string(),
            ));
        }
    }

    for scheme in config.storage.schemes() {
        let used = locations
            .iter()
            .any(|(_, location)| location.scheme() == scheme);
        if !used {
            findings.push(Finding::new_unused_storage_options(scheme));
        }
    }

    ValidationReport { findings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::FindingKind;

    fn registry() -> StoreRegistry {
        StoreRegistry::with_defaults()
    }

    const VALID: &str = r#"{
        "source": "mem://in",
        "destination": "mem://out",
        "state": "mem://state",
        "transforms": [
            { "kind": "gzip_compress", "level": 4 },
            { "kind": "encrypt", "hex_key": "000102030405060708090a0b0c0d0e0f" }
        ]
    }"#;

    #[test]
    fn valid_document_has_no_findings() {
        let report = validate_document(VALID, &registry());
        assert!(report.passed());
        assert!(report.findings.is_empty());
    }

    #[test]
    fn unknown_transform_kind_is_a_parse_finding() {
        let raw = VALID.replace("gzip_compress", "brotli_compress");
        let report = validate_document(&raw, &registry());
        assert!(!report.passed());
        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.code, "PARSE_ERROR");
        assert_eq!(finding.kind, FindingKind::Document);
        assert!(finding.message.contains("unknown variant"), "{}", finding.message);
    }

    #[test]
    fn empty_transform_list_is_an_error() {
        let raw = r#"{
            "source": "mem://in",
            "destination": "mem://out",
            "state": "mem://state",
            "transforms": []
        }"#;
        let report = validate_document(raw, &registry());
        assert!(!report.passed());
        assert_eq!(report.findings[0].code, "EMPTY_TRANSFORMS");
    }

    #[test]
    fn bad_transform_arguments_name_the_index() {
        let raw = r#"{
            "source": "mem://in",
            "destination": "mem://out",
            "state": "mem://state",
            "transforms": [
                { "kind": "identity" },
                { "kind": "decrypt", "hex_key": "tooshort" },
                { "kind": "sed", "script": "q" }
            ]
        }"#;
        let report = validate_document(raw, &registry());
        let codes: Vec<_> = report.findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["BAD_TRANSFORM", "BAD_TRANSFORM"]);
        assert!(report.findings[0].message.contains("Transform 1"));
        assert!(report.findings[1].message.contains("Transform 2"));
    }

    #[test]
    fn unknown_scheme_names_field_and_alternatives() {
        let raw = r#"{
            "source": "s3://bucket/in",
            "destination": "mem://out",
            "state": "mem://state",
            "transforms": [{ "kind": "identity" }]
        }"#;
        let report = validate_document(raw, &registry());
        assert!(!report.passed());
        let finding = &report.findings[0];
        assert_eq!(finding.code, "UNKNOWN_SCHEME");
        assert!(finding.message.contains("`source`"));
        let suggestion = finding.suggestion.as_deref().unwrap();
        assert!(suggestion.contains("file") && suggestion.contains("mem"));
    }

    #[test]
    fn unused_storage_options_warn_but_pass() {
        let raw = r#"{
            "source": "mem://in",
            "destination": "mem://out",
            "state": "mem://state",
            "transforms": [{ "kind": "identity" }],
            "storage": { "s3": { "region": "eu-west-1" } }
        }"#;
        let report = validate_document(raw, &registry());
        assert!(report.passed());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].code, "UNUSED_STORAGE_OPTIONS");
        assert_eq!(report.findings[0].severity, Severity::Warning);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, VALID).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.source.scheme(), "mem");
        assert_eq!(config.transforms.len(), 2);

        let missing = load_config(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
