//! Vertical card display for findings, plus migration summaries.
//!
//! Renders into a `String` so callers choose the stream.

use privlabel_core::{Finding, InternalRepr, Migration, ParseWarning};

const MAX_THINK_LINES: usize = 12;

// ── Public API ──

/// Render one image's findings as vertical cards.
pub fn findings_card(title: &str, repr: &InternalRepr, warnings: &[ParseWarning]) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {title} ===\n"));
    out.push_str(&format!("{} finding(s)\n\n", repr.output.len()));

    if !warnings.is_empty() {
        out.push_str("Warnings\n");
        for w in warnings {
            out.push_str(&format!("  {:<14} {}\n", w.code(), w));
        }
        out.push('\n');
    }

    out.push_str("Reasoning\n");
    if repr.think.is_empty() {
        out.push_str("  (empty)\n");
    } else {
        let lines: Vec<&str> = repr.think.lines().collect();
        for line in lines.iter().take(MAX_THINK_LINES) {
            out.push_str(&format!("  {line}\n"));
        }
        if lines.len() > MAX_THINK_LINES {
            out.push_str(&format!(
                "  ... {} more line(s)\n",
                lines.len() - MAX_THINK_LINES
            ));
        }
    }
    out.push('\n');

    for (i, finding) in repr.output.iter().enumerate() {
        push_finding(&mut out, i + 1, finding);
    }
    out
}

/// Succeeded/failed counts followed by one line per issue.
pub fn migration_summary(migration: &Migration) -> String {
    let failed = migration.failed_keys().len();
    let warned = migration.warnings().count();

    let mut out = String::new();
    if migration.is_global_failure() {
        out.push_str("Archive rejected\n");
    } else {
        out.push_str(&format!(
            "Migrated {} entr{} ({} failed, {} with warnings)\n",
            migration.migrated.len(),
            if migration.migrated.len() == 1 { "y" } else { "ies" },
            failed,
            warned,
        ));
    }
    for issue in &migration.errors {
        let level = if issue.fatal { "error" } else { "warn" };
        out.push_str(&format!(
            "  {level:<5} {:<24} [{}] {}\n",
            issue.key, issue.code, issue.message
        ));
    }
    out
}

// ── Card rendering ──

fn push_finding(out: &mut String, n: usize, f: &Finding) {
    let label = if f.label.is_empty() { "(unlabelled)" } else { &f.label };
    out.push_str(&format!("#{n} {label}\n"));
    push_row(out, "severity", &f.severity.to_string());
    let [x0, y0, x1, y1] = f.bounding_box.coords();
    push_row(out, "bounding_box", &format!("[{x0}, {y0}, {x1}, {y1}]"));
    push_row(
        out,
        "size",
        &format!("{} x {}", f.bounding_box.width(), f.bounding_box.height()),
    );
    push_row(out, "description", &f.description);
    push_row(out, "explanation", &f.explanation);
    push_row(out, "color", &f.color);
    push_row(out, "id", f.id.as_str());
    out.push('\n');
}

fn push_row(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push_str(&format!("  {name:<14} {value}\n"));
}
