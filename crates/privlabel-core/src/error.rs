use thiserror::Error;

use crate::schema::ValidationErrors;

/// Failure to turn one tagged-text blob (or one output section) into findings.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON in output section: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid finding structure: {0}")]
    InvalidFindingStructure(ValidationErrors),

    #[error("missing <think> and <output> sections, and content is not a valid findings list")]
    MissingSections,

    #[error("expected exactly one `{marker}` marker, found {count}")]
    TagCount { marker: String, count: usize },

    #[error("<{0}> section is empty")]
    EmptySection(&'static str),

    #[error("internal validation failed: {0}")]
    InvalidRepr(ValidationErrors),
}

impl ParseError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "InvalidJSON",
            Self::InvalidFindingStructure(_) => "InvalidFindingStructure",
            Self::MissingSections => "MissingSections",
            Self::TagCount { .. } => "TagCount",
            Self::EmptySection(_) => "EmptySection",
            Self::InvalidRepr(_) => "InvalidRepr",
        }
    }

    /// Field-level diagnostics, when the failure came from schema validation.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::InvalidFindingStructure(e) | Self::InvalidRepr(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure while migrating an archive, either for the whole call or one key.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(
        "invalid input: expected a JSON object mapping filenames to tagged text strings, not valid JSON: {0}"
    )]
    InvalidJson(#[source] serde_json::Error),

    #[error(
        "invalid input: expected a JSON object mapping filenames to tagged text strings, found {0}"
    )]
    InvalidShape(&'static str),

    #[error("invalid data type for key `{key}`: expected string, found {found}")]
    KeyType { key: String, found: &'static str },

    #[error("failed to parse tagged text: {0}")]
    Parse(#[from] ParseError),
}

impl ArchiveError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) | Self::InvalidShape(_) => "InvalidArchiveShape",
            Self::KeyType { .. } => "KeyTypeError",
            Self::Parse(e) => e.code(),
        }
    }
}
