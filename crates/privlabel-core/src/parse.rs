//! Tagged text → validated findings.
//!
//! Model output is unreliable, so the default mode recovers from two common
//! shapes: a single finding object where a list was expected, and a bare
//! JSON list with no `<think>`/`<output>` tags. Both recoveries succeed but
//! are reported as [`ParseWarning`]s. [`ValidationMode::Strict`] disables them
//! and also requires exactly one of each tag marker with non-empty sections.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ParseError;
use crate::normalize::normalize;
use crate::repr::InternalRepr;
use crate::schema::{BasicFinding, Finding, validate_basic_finding, validate_basic_findings};
use crate::section::{OUTPUT, THINK, count_marker, extract_section};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Missing tags and single-object output are recovered with a warning.
    #[default]
    Permissive,
    /// Exactly one of each marker, non-empty sections, list-shaped output.
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub mode: ValidationMode,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self {
            mode: ValidationMode::Strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.mode == ValidationMode::Strict
    }
}

/// A non-fatal recovery taken while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseWarning {
    SingleObjectWrapped,
    UntaggedOutput,
}

impl ParseWarning {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SingleObjectWrapped => "SingleObjectWrapped",
            Self::UntaggedOutput => "UntaggedOutput",
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleObjectWrapped => {
                f.write_str("output was a single finding object, wrapped it in a list")
            }
            Self::UntaggedOutput => f.write_str(
                "input has no <think>/<output> tags, parsed it as a bare findings list with empty think text",
            ),
        }
    }
}

/// A successfully parsed value plus any recoveries taken to get it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub warnings: Vec<ParseWarning>,
}

impl<T> Parsed<T> {
    fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        Parsed {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Parse the contents of an `<output>` block into normalized findings.
pub fn parse_output_section(raw: &str) -> Result<Parsed<Vec<Finding>>, ParseError> {
    parse_output_section_with(raw, &ParseOptions::default())
}

pub fn parse_output_section_with(
    raw: &str,
    options: &ParseOptions,
) -> Result<Parsed<Vec<Finding>>, ParseError> {
    Ok(parse_basic_findings(raw, options)?.map(|basics| normalize(&basics)))
}

/// Parse and validate an `<output>` block without assigning identity.
///
/// Empty or whitespace-only input is an empty list.
pub fn parse_basic_findings(
    raw: &str,
    options: &ParseOptions,
) -> Result<Parsed<Vec<BasicFinding>>, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Parsed::clean(Vec::new()));
    }

    let value: Value = serde_json::from_str(raw)?;

    let list_errors = match validate_basic_findings(&value) {
        Ok(list) => return Ok(Parsed::clean(list)),
        Err(e) => e,
    };

    if !options.is_strict() {
        match validate_basic_finding(&value) {
            Ok(single) => {
                let warning = ParseWarning::SingleObjectWrapped;
                warn!(%warning, "recovered single finding object");
                return Ok(Parsed {
                    value: vec![single],
                    warnings: vec![warning],
                });
            }
            // An object is closer to one finding than to a list, so its own
            // field errors are the useful diagnostics.
            Err(single_errors) if value.is_object() => {
                return Err(ParseError::InvalidFindingStructure(single_errors));
            }
            Err(_) => {}
        }
    }

    Err(ParseError::InvalidFindingStructure(list_errors))
}

/// Parse a full `<think>…</think><output>…</output>` blob.
pub fn parse_tagged_text(raw: &str) -> Result<Parsed<InternalRepr>, ParseError> {
    parse_tagged_text_with(raw, &ParseOptions::default())
}

pub fn parse_tagged_text_with(
    raw: &str,
    options: &ParseOptions,
) -> Result<Parsed<InternalRepr>, ParseError> {
    if raw.trim().is_empty() {
        return Ok(Parsed::clean(InternalRepr::default()));
    }

    if options.is_strict() {
        check_markers(raw)?;
    }

    let think = extract_section(raw, THINK);
    let output = extract_section(raw, OUTPUT);

    if options.is_strict() {
        if think.is_empty() {
            return Err(ParseError::EmptySection(THINK));
        }
        if output.is_empty() {
            return Err(ParseError::EmptySection(OUTPUT));
        }
    }

    let parsed = if think.is_empty() && output.is_empty() {
        // Possibly a bare findings list with no tags at all.
        let Ok(findings) = parse_output_section_with(raw.trim(), options) else {
            return Err(ParseError::MissingSections);
        };
        let warning = ParseWarning::UntaggedOutput;
        warn!(%warning, "recovered untagged output");
        let mut parsed = findings.map(|output| InternalRepr::new("", output));
        parsed.warnings.push(warning);
        parsed
    } else {
        parse_output_section_with(output, options)?.map(|output| InternalRepr::new(think, output))
    };

    parsed.value.validate().map_err(ParseError::InvalidRepr)?;
    Ok(parsed)
}

fn check_markers(raw: &str) -> Result<(), ParseError> {
    let counts: Vec<(String, usize)> = [THINK, OUTPUT]
        .into_iter()
        .flat_map(|tag| [format!("<{tag}>"), format!("</{tag}>")])
        .map(|marker| {
            let count = count_marker(raw, &marker);
            (marker, count)
        })
        .collect();

    // No tags at all is untagged output, which strict mode does not recover.
    if counts.iter().all(|(_, count)| *count == 0) {
        return Err(ParseError::MissingSections);
    }
    match counts.into_iter().find(|(_, count)| *count != 1) {
        Some((marker, count)) => Err(ParseError::TagCount { marker, count }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValidationErrorKind;

    const SINGLE: &str = r#"{"label":"x","description":"d","explanation":"e","bounding_box":[0,0,10,10],"severity":5}"#;

    fn tagged(think: &str, output: &str) -> String {
        format!("<think>\n{think}\n</think>\n<output>\n{output}\n</output>")
    }

    #[test]
    fn empty_output_section_is_empty_list() {
        let parsed = parse_output_section("").unwrap();
        assert!(parsed.value.is_empty());
        assert!(!parsed.has_warnings());

        let parsed = parse_output_section("  \n\t ").unwrap();
        assert!(parsed.value.is_empty());
    }

    #[test]
    fn parses_list_and_normalizes() {
        let raw = format!("[{SINGLE}, {SINGLE}]");
        let parsed = parse_output_section(&raw).unwrap();
        assert_eq!(parsed.value.len(), 2);
        assert_ne!(parsed.value[0].id, parsed.value[1].id);
        assert_eq!(parsed.value[0].label, "x");
        assert!(!parsed.has_warnings());
    }

    #[test]
    fn single_object_is_wrapped_with_warning() {
        let parsed = parse_output_section(SINGLE).unwrap();
        assert_eq!(parsed.value.len(), 1);
        assert_eq!(parsed.value[0].bounding_box.x_max(), 10.0);
        assert_eq!(parsed.warnings, vec![ParseWarning::SingleObjectWrapped]);
    }

    #[test]
    fn syntax_error_is_invalid_json() {
        let err = parse_output_section("[{\"label\": }]").unwrap_err();
        assert_eq!(err.code(), "InvalidJSON");

        // Trailing commas are not JSON.
        let err = parse_output_section("[1, 2,]").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn schema_failure_carries_field_paths() {
        let raw = r#"[{"label":"x","description":"d","explanation":"e","bounding_box":[0,0,-1,10],"severity":5}]"#;
        let err = parse_output_section(raw).unwrap_err();
        assert_eq!(err.code(), "InvalidFindingStructure");
        let diagnostics = err.validation_errors().unwrap();
        assert!(diagnostics.has_path("$[0].bounding_box[2]"));
    }

    #[test]
    fn bad_single_object_reports_its_own_fields() {
        let err = parse_output_section(r#"{"label":"x"}"#).unwrap_err();
        let diagnostics = err.validation_errors().unwrap();
        assert!(diagnostics.has_path("$.description"));
        assert!(diagnostics.has_path("$.bounding_box"));
    }

    #[test]
    fn scalar_output_is_invalid_structure() {
        let err = parse_output_section("42").unwrap_err();
        assert_eq!(err.code(), "InvalidFindingStructure");
    }

    #[test]
    fn degenerate_boxes_rejected() {
        for bbox in ["[5,0,5,10]", "[0,5,10,5]", "[10,0,5,10]", "[0,0,10,-2]"] {
            let raw = format!(
                r#"[{{"label":"x","description":"d","explanation":"e","bounding_box":{bbox},"severity":5}}]"#
            );
            let err = parse_output_section(&raw).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidFindingStructure(_)),
                "{bbox} should be rejected"
            );
        }
    }

    #[test]
    fn empty_tagged_text_is_empty_repr() {
        let parsed = parse_tagged_text("").unwrap();
        assert_eq!(parsed.value, InternalRepr::default());
        let parsed = parse_tagged_text("   \n").unwrap();
        assert_eq!(parsed.value, InternalRepr::default());
    }

    #[test]
    fn parses_tagged_text() {
        let raw = tagged("Looking at the image.", &format!("[{SINGLE}]"));
        let parsed = parse_tagged_text(&raw).unwrap();
        assert_eq!(parsed.value.think, "Looking at the image.");
        assert_eq!(parsed.value.output.len(), 1);
        assert!(!parsed.has_warnings());
    }

    #[test]
    fn reversed_tag_order_still_extracts() {
        let parsed = parse_tagged_text("<output>\n[]\n</output>\n<think>\nhello\n</think>").unwrap();
        assert_eq!(parsed.value.think, "hello");
        assert!(parsed.value.output.is_empty());
    }

    #[test]
    fn think_without_output_is_permitted() {
        let parsed = parse_tagged_text("<think>\nnothing private here\n</think>").unwrap();
        assert_eq!(parsed.value.think, "nothing private here");
        assert!(parsed.value.output.is_empty());
    }

    #[test]
    fn output_without_think_uses_empty_think() {
        let parsed = parse_tagged_text(&format!("<output>[{SINGLE}]</output>")).unwrap();
        assert_eq!(parsed.value.think, "");
        assert_eq!(parsed.value.output.len(), 1);
    }

    #[test]
    fn bare_json_list_recovered_with_warning() {
        let parsed = parse_tagged_text(&format!("\n[{SINGLE}]\n")).unwrap();
        assert_eq!(parsed.value.think, "");
        assert_eq!(parsed.value.output.len(), 1);
        assert_eq!(parsed.warnings, vec![ParseWarning::UntaggedOutput]);
    }

    #[test]
    fn bare_single_object_reports_both_recoveries() {
        let parsed = parse_tagged_text(SINGLE).unwrap();
        assert_eq!(parsed.value.output.len(), 1);
        assert_eq!(
            parsed.warnings,
            vec![
                ParseWarning::SingleObjectWrapped,
                ParseWarning::UntaggedOutput
            ]
        );
    }

    #[test]
    fn plain_prose_is_missing_sections() {
        let err = parse_tagged_text("The model refused to answer.").unwrap_err();
        assert_eq!(err.code(), "MissingSections");
    }

    #[test]
    fn bad_output_section_propagates() {
        let err = parse_tagged_text(&tagged("t", "[not json")).unwrap_err();
        assert_eq!(err.code(), "InvalidJSON");

        let err = parse_tagged_text(&tagged("t", r#"[{"label": 1}]"#)).unwrap_err();
        assert_eq!(err.code(), "InvalidFindingStructure");
    }

    #[test]
    fn strict_requires_single_markers() {
        let raw = format!("{}\n<think>again</think>", tagged("t", "[]"));
        let err = parse_tagged_text_with(&raw, &ParseOptions::strict()).unwrap_err();
        match err {
            ParseError::TagCount { marker, count } => {
                assert_eq!(marker, "<think>");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err =
            parse_tagged_text_with("<think>t</think>", &ParseOptions::strict()).unwrap_err();
        assert_eq!(err.code(), "TagCount");
    }

    #[test]
    fn strict_requires_non_empty_sections() {
        let err = parse_tagged_text_with(&tagged("", "[]"), &ParseOptions::strict()).unwrap_err();
        assert!(matches!(err, ParseError::EmptySection("think")));
    }

    #[test]
    fn strict_disables_recoveries() {
        let err = parse_tagged_text_with(SINGLE, &ParseOptions::strict()).unwrap_err();
        assert!(matches!(err, ParseError::MissingSections));

        let err = parse_tagged_text_with("[]", &ParseOptions::strict()).unwrap_err();
        assert_eq!(err.code(), "MissingSections");

        let err = parse_tagged_text_with(&tagged("t", SINGLE), &ParseOptions::strict()).unwrap_err();
        let diagnostics = err.validation_errors().unwrap();
        assert!(matches!(
            diagnostics.as_slice()[0].kind,
            ValidationErrorKind::WrongType {
                expected: "array",
                ..
            }
        ));
    }

    #[test]
    fn strict_accepts_canonical_text() {
        let parsed =
            parse_tagged_text_with(&tagged("t", &format!("[{SINGLE}]")), &ParseOptions::strict())
                .unwrap();
        assert_eq!(parsed.value.output.len(), 1);
    }

    #[test]
    fn options_deserialize_from_config() {
        let opts: ParseOptions = serde_json::from_str(r#"{"mode":"strict"}"#).unwrap();
        assert!(opts.is_strict());
        let opts: ParseOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.mode, ValidationMode::Permissive);
    }
}
