//! Bulk import and export of `{ imageKey: taggedText }` archives.
//!
//! Migration runs every key through [`parse_tagged_text_with`] independently.
//! A failing key is recorded and skipped; it never stops the others. The only
//! whole-call failure is a top level that is not a JSON object.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::compose::{FormatMode, format};
use crate::error::ArchiveError;
use crate::parse::{ParseOptions, ParseWarning, Parsed, parse_tagged_text_with};
use crate::repr::InternalRepr;
use crate::schema::json_type_name;

/// Key used for the issue raised when the archive itself is malformed.
pub const GLOBAL_KEY: &str = "GLOBAL";

const INVALID_ARCHIVE_SHAPE: &str = "InvalidArchiveShape";

/// One per-key (or global) outcome worth reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationIssue {
    pub key: String,
    pub code: &'static str,
    pub message: String,
    /// False for recoveries: the key was still migrated.
    pub fatal: bool,
}

impl MigrationIssue {
    fn failure(key: impl Into<String>, err: &ArchiveError) -> Self {
        Self {
            key: key.into(),
            code: err.code(),
            message: err.to_string(),
            fatal: true,
        }
    }

    fn recovered(key: impl Into<String>, warning: ParseWarning) -> Self {
        Self {
            key: key.into(),
            code: warning.code(),
            message: format!("partial success with warning: {warning}"),
            fatal: false,
        }
    }
}

/// Result of migrating one archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Migration {
    pub migrated: BTreeMap<String, InternalRepr>,
    pub errors: Vec<MigrationIssue>,
}

impl Migration {
    /// True when the archive was rejected as a whole.
    pub fn is_global_failure(&self) -> bool {
        self.errors.iter().any(|e| e.code == INVALID_ARCHIVE_SHAPE)
    }

    /// Keys that could not be migrated.
    pub fn failed_keys(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.fatal && e.code != INVALID_ARCHIVE_SHAPE)
            .map(|e| e.key.as_str())
            .collect()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &MigrationIssue> {
        self.errors.iter().filter(|e| !e.fatal)
    }
}

pub fn migrate(archive_json: &str) -> Migration {
    migrate_with(archive_json, &ParseOptions::default())
}

pub fn migrate_with(archive_json: &str, options: &ParseOptions) -> Migration {
    let mut migration = Migration::default();

    let entries = match parse_archive(archive_json) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "rejecting archive");
            migration.errors.push(MigrationIssue::failure(GLOBAL_KEY, &e));
            return migration;
        }
    };

    for (key, value) in &entries {
        match migrate_entry(key, value, options) {
            Ok(parsed) => {
                debug!(
                    key = %key,
                    findings = parsed.value.output.len(),
                    warnings = parsed.warnings.len(),
                    "migrated entry"
                );
                for warning in parsed.warnings {
                    migration
                        .errors
                        .push(MigrationIssue::recovered(key.as_str(), warning));
                }
                migration.migrated.insert(key.clone(), parsed.value);
            }
            Err(e) => {
                warn!(key = %key, code = e.code(), error = %e, "failed to migrate entry");
                migration
                    .errors
                    .push(MigrationIssue::failure(key.as_str(), &e));
            }
        }
    }

    info!(
        total = entries.len(),
        succeeded = migration.migrated.len(),
        failed = migration.failed_keys().len(),
        "archive migration complete"
    );
    migration
}

/// Serialize every repr in export mode into a pretty-printed archive object.
pub fn export_archive(labels: &BTreeMap<String, InternalRepr>) -> Result<String, serde_json::Error> {
    let exported: BTreeMap<&str, String> = labels
        .iter()
        .map(|(key, repr)| (key.as_str(), format(repr, FormatMode::Export)))
        .collect();
    serde_json::to_string_pretty(&exported)
}

fn parse_archive(archive_json: &str) -> Result<Map<String, Value>, ArchiveError> {
    let value: Value = serde_json::from_str(archive_json).map_err(ArchiveError::InvalidJson)?;
    match value {
        Value::Object(entries) => Ok(entries),
        other => Err(ArchiveError::InvalidShape(json_type_name(&other))),
    }
}

fn migrate_entry(
    key: &str,
    value: &Value,
    options: &ParseOptions,
) -> Result<Parsed<InternalRepr>, ArchiveError> {
    let Value::String(text) = value else {
        return Err(ArchiveError::KeyType {
            key: key.to_string(),
            found: json_type_name(value),
        });
    };
    Ok(parse_tagged_text_with(text, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GOOD: &str = "<think>\nA face.\n</think>\n<output>\n[{\"label\":\"Face\",\"description\":\"d\",\"explanation\":\"e\",\"bounding_box\":[1,2,30,40],\"severity\":6}]\n</output>";
    const SINGLE: &str = "<think>\nOne.\n</think>\n<output>\n{\"label\":\"Face\",\"description\":\"d\",\"explanation\":\"e\",\"bounding_box\":[1,2,30,40],\"severity\":6}\n</output>";

    fn archive(entries: Value) -> String {
        serde_json::to_string(&entries).unwrap()
    }

    #[test]
    fn one_bad_key_does_not_stop_the_rest() {
        let input = archive(json!({
            "a.jpg": GOOD,
            "b.jpg": "<think>\nx\n</think>\n<output>\n[{broken\n</output>",
            "c.jpg": "<think>\nNothing.\n</think>\n<output>\n[]\n</output>",
        }));
        let m = migrate(&input);
        assert_eq!(m.migrated.len(), 2);
        assert!(m.migrated.contains_key("a.jpg"));
        assert!(m.migrated.contains_key("c.jpg"));
        assert_eq!(m.errors.len(), 1);
        assert_eq!(m.errors[0].key, "b.jpg");
        assert_eq!(m.errors[0].code, "InvalidJSON");
        assert!(m.errors[0].fatal);
        assert_eq!(m.failed_keys(), vec!["b.jpg"]);
        assert!(!m.is_global_failure());
    }

    #[test]
    fn non_object_archives_fail_globally() {
        for input in ["[]", "null", "42", "\"text\"", "{not json"] {
            let m = migrate(input);
            assert!(m.migrated.is_empty(), "{input}");
            assert_eq!(m.errors.len(), 1, "{input}");
            assert_eq!(m.errors[0].key, GLOBAL_KEY);
            assert_eq!(m.errors[0].code, "InvalidArchiveShape");
            assert!(m.is_global_failure());
            assert!(m.failed_keys().is_empty());
        }
    }

    #[test]
    fn non_string_values_are_type_errors() {
        let input = archive(json!({ "a.jpg": GOOD, "b.jpg": 5, "c.jpg": { "think": "" } }));
        let m = migrate(&input);
        assert_eq!(m.migrated.len(), 1);
        let codes: Vec<_> = m.errors.iter().map(|e| (e.key.as_str(), e.code)).collect();
        assert_eq!(
            codes,
            vec![("b.jpg", "KeyTypeError"), ("c.jpg", "KeyTypeError")]
        );
        assert!(m.errors[0].message.contains("found number"));
        assert!(m.errors[1].message.contains("found object"));
    }

    #[test]
    fn recoveries_are_kept_and_reported() {
        let input = archive(json!({ "single.jpg": SINGLE, "bare.jpg": "[]" }));
        let m = migrate(&input);
        assert_eq!(m.migrated.len(), 2);
        assert_eq!(m.migrated["single.jpg"].output.len(), 1);
        assert!(m.failed_keys().is_empty());

        let warnings: Vec<_> = m.warnings().map(|e| (e.key.as_str(), e.code)).collect();
        assert_eq!(
            warnings,
            vec![
                ("bare.jpg", "UntaggedOutput"),
                ("single.jpg", "SingleObjectWrapped")
            ]
        );
    }

    #[test]
    fn strict_mode_rejects_recoveries() {
        let input = archive(json!({ "single.jpg": SINGLE, "good.jpg": GOOD }));
        let m = migrate_with(&input, &ParseOptions::strict());
        assert_eq!(m.migrated.len(), 1);
        assert_eq!(m.failed_keys(), vec!["single.jpg"]);
    }

    #[test]
    fn empty_string_value_is_empty_repr() {
        let m = migrate(&archive(json!({ "a.jpg": "" })));
        assert_eq!(m.migrated["a.jpg"], InternalRepr::default());
        assert!(m.errors.is_empty());
    }

    #[test]
    fn empty_archive_is_fine() {
        let m = migrate("{}");
        assert!(m.migrated.is_empty());
        assert!(m.errors.is_empty());
    }

    #[test]
    fn export_then_migrate_round_trips() {
        let m = migrate(&archive(json!({ "a.jpg": GOOD, "b.jpg": "" })));
        let exported = export_archive(&m.migrated).unwrap();

        let value: Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(
            value["b.jpg"],
            json!("<think>\n</think>\n<output>\n[]\n</output>")
        );
        assert!(exported.starts_with("{\n  \"a.jpg\": "));

        let again = migrate(&exported);
        assert!(again.errors.is_empty());
        assert_eq!(
            again.migrated["a.jpg"].basics(),
            m.migrated["a.jpg"].basics()
        );
        assert_eq!(again.migrated["a.jpg"].think, "A face.");
    }
}
