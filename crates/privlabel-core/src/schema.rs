//! Canonical finding shapes and their validation rules.
//!
//! Values arriving from a model or an import file are untyped JSON. The
//! `validate_*` functions turn a [`serde_json::Value`] into a typed shape or
//! report every violation, each tagged with the JSON path of the offending
//! field (`$[0].bounding_box[2]`, `$.output[1].id`, ...).
//!
//! A shape is accepted only when it is an object with exactly its required
//! fields, each of the right primitive type. Nothing is coerced.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::repr::InternalRepr;

/// Path of the document root in validation reports.
pub const ROOT: &str = "$";

const BASIC_FIELDS: &[&str] = &[
    "label",
    "description",
    "explanation",
    "bounding_box",
    "severity",
];

const FINDING_FIELDS: &[&str] = &[
    "label",
    "description",
    "explanation",
    "bounding_box",
    "severity",
    "color",
    "id",
];

const REPR_FIELDS: &[&str] = &["think", "output"];

// ── Errors ──

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("missing required field")]
    MissingField,
    #[error("unexpected field")]
    UnexpectedField,
    #[error("expected exactly 4 coordinates, found {0}")]
    WrongLength(usize),
    #[error("must be a finite number")]
    NotFinite,
    #[error("coordinate must be non-negative")]
    Negative,
    #[error("x_min must be less than x_max")]
    XOrder,
    #[error("y_min must be less than y_max")]
    YOrder,
    #[error("duplicate finding id `{0}`")]
    DuplicateId(String),
}

/// One schema violation at a specific field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {kind}")]
pub struct ValidationError {
    pub path: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Every violation found while validating one value, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// True if any violation is reported at exactly `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.0.iter().any(|e| e.path == path)
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ── Shapes ──

/// `[x_min, y_min, x_max, y_max]` in image pixels.
///
/// Only constructed through validation, so every instance has non-negative
/// coordinates with `x_min < x_max` and `y_min < y_max`. Edits replace the
/// whole box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundingBox([f64; 4]);

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, ValidationErrors> {
        Self::try_from([x_min, y_min, x_max, y_max])
    }

    pub fn x_min(&self) -> f64 {
        self.0[0]
    }

    pub fn y_min(&self) -> f64 {
        self.0[1]
    }

    pub fn x_max(&self) -> f64 {
        self.0[2]
    }

    pub fn y_max(&self) -> f64 {
        self.0[3]
    }

    pub fn coords(&self) -> [f64; 4] {
        self.0
    }

    pub fn width(&self) -> f64 {
        self.0[2] - self.0[0]
    }

    pub fn height(&self) -> f64 {
        self.0[3] - self.0[1]
    }

    /// Coordinates rounded to the nearest integer, halves rounding up.
    ///
    /// An axis that rounds to zero extent is widened to one pixel past its
    /// rounded minimum, so the result always validates as a box.
    pub fn rounded(&self) -> [f64; 4] {
        let [x_min, y_min, mut x_max, mut y_max] = self.0.map(f64::round);
        if x_max <= x_min {
            x_max = x_min + 1.0;
        }
        if y_max <= y_min {
            y_max = y_min + 1.0;
        }
        [x_min, y_min, x_max, y_max]
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = ValidationErrors;

    fn try_from(coords: [f64; 4]) -> Result<Self, Self::Error> {
        let violations = box_violations(&coords, ROOT);
        if violations.is_empty() {
            Ok(Self(coords))
        } else {
            Err(ValidationErrors(violations))
        }
    }
}

/// A model-authored finding without identity: the exchange-format record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicFinding {
    pub label: String,
    pub description: String,
    pub explanation: String,
    pub bounding_box: BoundingBox,
    /// 0-10 by convention, 0 meaning "not private". Not range-checked.
    pub severity: f64,
}

/// Opaque finding identifier, assigned once and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FindingId(String);

impl FindingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FindingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FindingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A [`BasicFinding`] with identity and a display colour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub label: String,
    pub description: String,
    pub explanation: String,
    pub bounding_box: BoundingBox,
    pub severity: f64,
    pub color: String,
    pub id: FindingId,
}

impl Finding {
    pub fn from_basic(basic: BasicFinding, id: FindingId, color: String) -> Self {
        Self {
            label: basic.label,
            description: basic.description,
            explanation: basic.explanation,
            bounding_box: basic.bounding_box,
            severity: basic.severity,
            color,
            id,
        }
    }

    /// Projection to the exchange format, dropping `id` and `color`.
    pub fn to_basic(&self) -> BasicFinding {
        BasicFinding {
            label: self.label.clone(),
            description: self.description.clone(),
            explanation: self.explanation.clone(),
            bounding_box: self.bounding_box,
            severity: self.severity,
        }
    }
}

// ── Public validators ──

pub fn validate_bounding_box(value: &Value) -> Result<BoundingBox, ValidationErrors> {
    run(value, check_bounding_box)
}

pub fn validate_basic_finding(value: &Value) -> Result<BasicFinding, ValidationErrors> {
    run(value, check_basic_finding)
}

pub fn validate_basic_findings(value: &Value) -> Result<Vec<BasicFinding>, ValidationErrors> {
    run(value, check_basic_finding_list)
}

/// Validate a finding carrying identity.
///
/// `id` may be a string or, for files written by the early sequential-id
/// scheme, a non-negative integer; both become an opaque [`FindingId`].
pub fn validate_finding(value: &Value) -> Result<Finding, ValidationErrors> {
    run(value, check_finding)
}

pub fn validate_findings(value: &Value) -> Result<Vec<Finding>, ValidationErrors> {
    run(value, check_finding_list)
}

/// Validate a serialized `{ think, output }` state, including id uniqueness.
pub fn validate_internal_repr(value: &Value) -> Result<InternalRepr, ValidationErrors> {
    let repr = run(value, check_internal_repr)?;
    repr.validate()?;
    Ok(repr)
}

type Check<T> = fn(&Value, &str, &mut Vec<ValidationError>) -> Option<T>;

fn run<T>(value: &Value, check: Check<T>) -> Result<T, ValidationErrors> {
    let mut errors = Vec::new();
    match check(value, ROOT, &mut errors) {
        Some(v) if errors.is_empty() => Ok(v),
        _ => Err(ValidationErrors(errors)),
    }
}

// ── Checks ──

fn check_bounding_box(
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<BoundingBox> {
    let Some(items) = value.as_array() else {
        errors.push(wrong_type(path, "array", value));
        return None;
    };
    if items.len() != 4 {
        errors.push(ValidationError::new(
            path,
            ValidationErrorKind::WrongLength(items.len()),
        ));
        return None;
    }

    let mut coords = [0.0; 4];
    let mut numeric = true;
    for (i, item) in items.iter().enumerate() {
        match item.as_f64() {
            Some(v) => coords[i] = v,
            None => {
                errors.push(wrong_type(&index(path, i), "number", item));
                numeric = false;
            }
        }
    }
    if !numeric {
        return None;
    }

    let violations = box_violations(&coords, path);
    if violations.is_empty() {
        Some(BoundingBox(coords))
    } else {
        errors.extend(violations);
        None
    }
}

fn box_violations(coords: &[f64; 4], path: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (i, v) in coords.iter().enumerate() {
        if !v.is_finite() {
            errors.push(ValidationError::new(
                index(path, i),
                ValidationErrorKind::NotFinite,
            ));
        } else if *v < 0.0 {
            errors.push(ValidationError::new(
                index(path, i),
                ValidationErrorKind::Negative,
            ));
        }
    }
    if !errors.is_empty() && coords.iter().any(|v| !v.is_finite()) {
        return errors;
    }
    if coords[0] >= coords[2] {
        errors.push(ValidationError::new(path, ValidationErrorKind::XOrder));
    }
    if coords[1] >= coords[3] {
        errors.push(ValidationError::new(path, ValidationErrorKind::YOrder));
    }
    errors
}

fn check_basic_finding(
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<BasicFinding> {
    let map = expect_object(value, path, errors)?;
    let start = errors.len();
    reject_unknown_fields(map, BASIC_FIELDS, path, errors);
    let basic = check_basic_fields(map, path, errors);
    if errors.len() > start { None } else { basic }
}

fn check_finding(
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<Finding> {
    let map = expect_object(value, path, errors)?;
    let start = errors.len();
    reject_unknown_fields(map, FINDING_FIELDS, path, errors);
    let basic = check_basic_fields(map, path, errors);
    let color = check_string(map, "color", path, errors);
    let id = check_id(map, path, errors);
    if errors.len() > start {
        return None;
    }
    Some(Finding::from_basic(basic?, id?, color?))
}

fn check_basic_finding_list(
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<Vec<BasicFinding>> {
    check_list(value, path, errors, check_basic_finding)
}

fn check_finding_list(
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<Vec<Finding>> {
    check_list(value, path, errors, check_finding)
}

fn check_internal_repr(
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<InternalRepr> {
    let map = expect_object(value, path, errors)?;
    let start = errors.len();
    reject_unknown_fields(map, REPR_FIELDS, path, errors);
    let think = check_string(map, "think", path, errors);
    let output_path = field(path, "output");
    let output = match map.get("output") {
        Some(v) => check_finding_list(v, &output_path, errors),
        None => {
            errors.push(ValidationError::new(
                output_path,
                ValidationErrorKind::MissingField,
            ));
            None
        }
    };
    if errors.len() > start {
        return None;
    }
    Some(InternalRepr::new(think?, output?))
}

fn check_list<T>(
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
    check: Check<T>,
) -> Option<Vec<T>> {
    let Some(items) = value.as_array() else {
        errors.push(wrong_type(path, "array", value));
        return None;
    };
    let start = errors.len();
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if let Some(v) = check(item, &index(path, i), errors) {
            out.push(v);
        }
    }
    (errors.len() == start).then_some(out)
}

fn check_basic_fields(
    map: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<BasicFinding> {
    let label = check_string(map, "label", path, errors);
    let description = check_string(map, "description", path, errors);
    let explanation = check_string(map, "explanation", path, errors);
    let bbox_path = field(path, "bounding_box");
    let bounding_box = match map.get("bounding_box") {
        Some(v) => check_bounding_box(v, &bbox_path, errors),
        None => {
            errors.push(ValidationError::new(
                bbox_path,
                ValidationErrorKind::MissingField,
            ));
            None
        }
    };
    let severity = check_number(map, "severity", path, errors);

    Some(BasicFinding {
        label: label?,
        description: description?,
        explanation: explanation?,
        bounding_box: bounding_box?,
        severity: severity?,
    })
}

fn check_id(
    map: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<FindingId> {
    let p = field(path, "id");
    match map.get("id") {
        Some(Value::String(s)) => Some(FindingId::from(s.as_str())),
        // Sequential integer ids from older exports.
        Some(Value::Number(n)) if n.is_u64() => Some(FindingId(n.to_string())),
        Some(other) => {
            errors.push(wrong_type(&p, "string or non-negative integer", other));
            None
        }
        None => {
            errors.push(ValidationError::new(p, ValidationErrorKind::MissingField));
            None
        }
    }
}

fn check_string(
    map: &Map<String, Value>,
    name: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<String> {
    let p = field(path, name);
    match map.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            errors.push(wrong_type(&p, "string", other));
            None
        }
        None => {
            errors.push(ValidationError::new(p, ValidationErrorKind::MissingField));
            None
        }
    }
}

fn check_number(
    map: &Map<String, Value>,
    name: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<f64> {
    let p = field(path, name);
    match map.get(name) {
        Some(v @ Value::Number(_)) => v.as_f64(),
        Some(other) => {
            errors.push(wrong_type(&p, "number", other));
            None
        }
        None => {
            errors.push(ValidationError::new(p, ValidationErrorKind::MissingField));
            None
        }
    }
}

fn expect_object<'a>(
    value: &'a Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a Map<String, Value>> {
    let map = value.as_object();
    if map.is_none() {
        errors.push(wrong_type(path, "object", value));
    }
    map
}

fn reject_unknown_fields(
    map: &Map<String, Value>,
    allowed: &[&str],
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            errors.push(ValidationError::new(
                field(path, key),
                ValidationErrorKind::UnexpectedField,
            ));
        }
    }
}

// ── Path helpers ──

pub(crate) fn field(path: &str, name: &str) -> String {
    format!("{path}.{name}")
}

pub(crate) fn index(path: &str, i: usize) -> String {
    format!("{path}[{i}]")
}

fn wrong_type(path: &str, expected: &'static str, found: &Value) -> ValidationError {
    ValidationError::new(
        path,
        ValidationErrorKind::WrongType {
            expected,
            found: json_type_name(found),
        },
    )
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
