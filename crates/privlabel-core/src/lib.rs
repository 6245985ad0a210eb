//! Tagged-text finding protocol for image privacy review.
//!
//! Raw model output or an exported archive flows through
//! [`section`] → [`parse`] → [`normalize`] into [`InternalRepr`]s; on export,
//! [`compose`] writes them back out byte-for-byte predictably.

pub mod archive;
pub mod columnar;
pub mod compose;
mod error;
pub mod normalize;
pub mod parse;
pub mod repr;
pub mod schema;
pub mod section;

pub use archive::{GLOBAL_KEY, Migration, MigrationIssue, export_archive, migrate, migrate_with};
pub use compose::{FormatMode, format, format_findings_json, format_output_block};
pub use error::{ArchiveError, ParseError};
pub use normalize::normalize;
pub use parse::{
    ParseOptions, ParseWarning, Parsed, ValidationMode, parse_output_section,
    parse_output_section_with, parse_tagged_text, parse_tagged_text_with,
};
pub use repr::InternalRepr;
pub use schema::{
    BasicFinding, BoundingBox, Finding, FindingId, ValidationError, ValidationErrorKind,
    ValidationErrors,
};
pub use section::extract_section;
