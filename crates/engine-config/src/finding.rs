use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FindingKind {
    /// The document itself could not be understood.
    Document,
    /// A source, destination or state location.
    Location,
    /// A transform descriptor.
    Transform,
    /// Per-scheme storage options.
    Storage,
}

/// One validation result, machine-readable code plus human message.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub kind: FindingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Constants for finding codes.
const CODE_PARSE_ERROR: &str = "PARSE_ERROR";
const CODE_EMPTY_TRANSFORMS: &str = "EMPTY_TRANSFORMS";
const CODE_BAD_TRANSFORM: &str = "BAD_TRANSFORM";
const CODE_UNKNOWN_SCHEME: &str = "UNKNOWN_SCHEME";
const CODE_UNUSED_STORAGE_OPTIONS: &str = "UNUSED_STORAGE_OPTIONS";

impl Finding {
    pub fn new(
        code: &str,
        message: String,
        severity: Severity,
        kind: FindingKind,
        suggestion: Option<String>,
    ) -> Self {
        Finding {
            code: code.to_string(),
            message,
            severity,
            kind,
            suggestion,
        }
    }

    pub fn new_parse_error(error: &serde_json::Error) -> Self {
        Self::new(
            CODE_PARSE_ERROR,
            format!("Config document is not valid: {error}"),
            Severity::Error,
            FindingKind::Document,
            Some("Check the JSON syntax and the spelling of transform kinds.".into()),
        )
    }

    pub fn new_empty_transforms() -> Self {
        Self::new(
            CODE_EMPTY_TRANSFORMS,
            "The transform list is empty.".into(),
            Severity::Error,
            FindingKind::Transform,
            Some("Add at least one transform; `identity` copies bytes unchanged.".into()),
        )
    }

    pub fn new_bad_transform(index: usize, kind: &str, error_message: &str) -> Self {
        Self::new(
            CODE_BAD_TRANSFORM,
            format!("Transform {index} (`{kind}`) is invalid: {error_message}"),
            Severity::Error,
            FindingKind::Transform,
            None,
        )
    }

    pub fn new_unknown_scheme(field: &str, location: &str, known: &[&str]) -> Self {
        Self::new(
            CODE_UNKNOWN_SCHEME,
            format!("`{field}` points at `{location}`, whose scheme has no registered provider."),
            Severity::Error,
            FindingKind::Location,
            Some(format!("Registered schemes: {}.", known.join(", "))),
        )
    }

    pub fn new_unused_storage_options(scheme: &str) -> Self {
        Self::new(
            CODE_UNUSED_STORAGE_OPTIONS,
            format!("Storage options for scheme `{scheme}` match none of the configured locations."),
            Severity::Warning,
            FindingKind::Storage,
            None,
        )
    }
}
