//! Per-image state: reasoning text plus an ordered list of findings.

use std::collections::HashSet;

use serde::Serialize;

use crate::normalize::{next_color, next_id};
use crate::schema::{
    BasicFinding, BoundingBox, Finding, FindingId, ROOT, ValidationError, ValidationErrorKind,
    ValidationErrors, field, index,
};

/// Severity given to a box drawn by hand before the reviewer classifies it.
pub const DEFAULT_SEVERITY: f64 = 5.0;

/// The unit of per-image state.
///
/// `output` keeps insertion order end to end. Findings are edited in place
/// and keep their id; nothing here re-normalizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InternalRepr {
    pub think: String,
    pub output: Vec<Finding>,
}

impl InternalRepr {
    /// `think` is stored trimmed, the way it comes back from extraction.
    pub fn new(think: impl Into<String>, output: Vec<Finding>) -> Self {
        let think: String = think.into();
        Self {
            think: think.trim().to_string(),
            output,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.think.is_empty() && self.output.is_empty()
    }

    /// Exchange-format projection of every finding, in order.
    pub fn basics(&self) -> Vec<BasicFinding> {
        self.output.iter().map(Finding::to_basic).collect()
    }

    /// Append a model-authored finding, assigning it a fresh id and colour.
    pub fn add_finding(&mut self, basic: BasicFinding) -> FindingId {
        let id = next_id();
        self.output
            .push(Finding::from_basic(basic, id.clone(), next_color()));
        id
    }

    pub fn add_findings(&mut self, basics: impl IntoIterator<Item = BasicFinding>) -> Vec<FindingId> {
        basics.into_iter().map(|b| self.add_finding(b)).collect()
    }

    /// Append an unlabelled finding for a box drawn by the reviewer.
    pub fn add_box(&mut self, bounding_box: BoundingBox) -> FindingId {
        self.add_finding(BasicFinding {
            label: String::new(),
            description: String::new(),
            explanation: String::new(),
            bounding_box,
            severity: DEFAULT_SEVERITY,
        })
    }

    pub fn get(&self, id: &FindingId) -> Option<&Finding> {
        self.output.iter().find(|f| &f.id == id)
    }

    pub fn get_mut(&mut self, id: &FindingId) -> Option<&mut Finding> {
        self.output.iter_mut().find(|f| &f.id == id)
    }

    /// Replace a finding's box. Returns false if no finding has `id`.
    pub fn update_box(&mut self, id: &FindingId, bounding_box: BoundingBox) -> bool {
        match self.get_mut(id) {
            Some(finding) => {
                finding.bounding_box = bounding_box;
                true
            }
            None => false,
        }
    }

    pub fn remove_finding(&mut self, id: &FindingId) -> Option<Finding> {
        let pos = self.output.iter().position(|f| &f.id == id)?;
        Some(self.output.remove(pos))
    }

    pub fn clear(&mut self) {
        self.think.clear();
        self.output.clear();
    }

    /// Check invariants that typed construction alone cannot guarantee:
    /// unique ids and finite severities.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let output_path = field(ROOT, "output");
        let mut seen = HashSet::with_capacity(self.output.len());
        let mut errors = Vec::new();

        for (i, finding) in self.output.iter().enumerate() {
            let path = index(&output_path, i);
            if !seen.insert(&finding.id) {
                errors.push(ValidationError::new(
                    field(&path, "id"),
                    ValidationErrorKind::DuplicateId(finding.id.to_string()),
                ));
            }
            if !finding.severity.is_finite() {
                errors.push(ValidationError::new(
                    field(&path, "severity"),
                    ValidationErrorKind::NotFinite,
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}
