//! [`InternalRepr`] → canonical tagged text.
//!
//! The findings list is printed as 2-space-indented JSON with fixed key
//! order, except that every `bounding_box` stays on one line as
//! `[a, b, c, d]`. Exported files are re-edited by hand and diffed, so the
//! layout must be byte-stable. Numbers print like JavaScript's
//! `JSON.stringify`: integral values carry no fractional part.

use serde_json::Value;

use crate::repr::InternalRepr;
use crate::schema::{BasicFinding, Finding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    /// Coordinates rounded to the nearest integer, for persisted files.
    Export,
    /// Coordinates exactly as stored, for the editing view.
    Display,
}

/// One finding as it appears on the wire.
struct Row<'a> {
    label: &'a str,
    description: &'a str,
    explanation: &'a str,
    bounding_box: [f64; 4],
    severity: f64,
}

impl<'a> Row<'a> {
    fn from_finding(f: &'a Finding, mode: FormatMode) -> Self {
        let bounding_box = match mode {
            FormatMode::Export => f.bounding_box.rounded(),
            FormatMode::Display => f.bounding_box.coords(),
        };
        Self {
            label: &f.label,
            description: &f.description,
            explanation: &f.explanation,
            bounding_box,
            severity: f.severity,
        }
    }

    fn from_basic(b: &'a BasicFinding) -> Self {
        Self {
            label: &b.label,
            description: &b.description,
            explanation: &b.explanation,
            bounding_box: b.bounding_box.coords(),
            severity: b.severity,
        }
    }
}

/// Serialize a repr as `<think>…</think>\n<output>…</output>`.
///
/// `id` and `color` never reach the output.
pub fn format(repr: &InternalRepr, mode: FormatMode) -> String {
    let rows: Vec<Row<'_>> = repr
        .output
        .iter()
        .map(|f| Row::from_finding(f, mode))
        .collect();

    // Extraction trims section contents, so surrounding whitespace would not
    // survive a re-parse.
    let think = repr.think.trim();
    let think_block = if think.is_empty() {
        "<think>\n</think>".to_string()
    } else {
        format!("<think>\n{think}\n</think>")
    };

    format!("{think_block}\n{}", wrap_output(&render(&rows)))
}

/// The findings list alone, in the one-line-box layout.
pub fn format_findings_json(findings: &[BasicFinding]) -> String {
    let rows: Vec<Row<'_>> = findings.iter().map(Row::from_basic).collect();
    render(&rows)
}

/// The findings list wrapped in an `<output>` block.
pub fn format_output_block(findings: &[BasicFinding]) -> String {
    wrap_output(&format_findings_json(findings))
}

fn wrap_output(json: &str) -> String {
    format!("<output>\n{json}\n</output>")
}

fn render(rows: &[Row<'_>]) -> String {
    if rows.is_empty() {
        return "[]".to_string();
    }

    let objects: Vec<String> = rows
        .iter()
        .map(|row| {
            let fields = [
                ("label", json_string(row.label)),
                ("description", json_string(row.description)),
                ("explanation", json_string(row.explanation)),
                ("bounding_box", inline_array(&row.bounding_box)),
                ("severity", json_number(row.severity)),
            ];
            let body: Vec<String> = fields
                .iter()
                .map(|(key, value)| format!("    \"{key}\": {value}"))
                .collect();
            format!("  {{\n{}\n  }}", body.join(",\n"))
        })
        .collect();

    format!("[\n{}\n]", objects.join(",\n"))
}

fn inline_array(values: &[f64; 4]) -> String {
    let parts: Vec<String> = values.iter().map(|v| json_number(*v)).collect();
    format!("[{}]", parts.join(", "))
}

fn json_string(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}

fn json_number(v: f64) -> String {
    if !v.is_finite() {
        // What JSON.stringify does with NaN and infinities.
        return "null".to_string();
    }
    if v == 0.0 {
        // Covers -0.0.
        return "0".to_string();
    }
    v.to_string()
}
