use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use arrow::util::pretty::pretty_format_batches;
use privlabel_core::columnar::findings_batch;
use privlabel_core::{
    FormatMode, ParseOptions, export_archive, format, migrate_with, parse_tagged_text_with,
};
use tracing::{info, warn};

use crate::display;

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Migrate an archive and write the re-exported archive to `out_path`, or
/// `out` when no path is given. The summary goes to `report`.
pub fn migrate(
    archive: &Path,
    out_path: Option<&Path>,
    options: &ParseOptions,
    out: &mut dyn Write,
    report: &mut dyn Write,
) -> Result<()> {
    let input = read(archive)?;
    let migration = migrate_with(&input, options);
    report.write_all(display::migration_summary(&migration).as_bytes())?;
    ensure!(
        !migration.is_global_failure(),
        "{} is not a label archive",
        archive.display()
    );

    let exported = export_archive(&migration.migrated)?;
    match out_path {
        Some(path) => {
            fs::write(path, format!("{exported}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), entries = migration.migrated.len(), "wrote archive");
        }
        None => writeln!(out, "{exported}")?,
    }
    Ok(())
}

/// Re-serialize one tagged-text file in canonical layout.
pub fn format_file(
    path: &Path,
    display_mode: bool,
    options: &ParseOptions,
    out: &mut dyn Write,
) -> Result<()> {
    let text = read(path)?;
    let parsed = parse_tagged_text_with(&text, options)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    for w in &parsed.warnings {
        warn!(path = %path.display(), code = w.code(), "{w}");
    }
    let mode = if display_mode {
        FormatMode::Display
    } else {
        FormatMode::Export
    };
    writeln!(out, "{}", format(&parsed.value, mode))?;
    Ok(())
}

/// Print a tagged-text file as finding cards.
pub fn inspect(path: &Path, options: &ParseOptions, out: &mut dyn Write) -> Result<()> {
    let text = read(path)?;
    let parsed = parse_tagged_text_with(&text, options)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    out.write_all(display::findings_card(&title, &parsed.value, &parsed.warnings).as_bytes())?;
    Ok(())
}

/// Print every finding in an archive as one table.
pub fn table(
    archive: &Path,
    options: &ParseOptions,
    out: &mut dyn Write,
    report: &mut dyn Write,
) -> Result<()> {
    let input = read(archive)?;
    let migration = migrate_with(&input, options);
    if !migration.errors.is_empty() {
        report.write_all(display::migration_summary(&migration).as_bytes())?;
    }
    ensure!(
        !migration.is_global_failure(),
        "{} is not a label archive",
        archive.display()
    );

    let batch = findings_batch(&migration.migrated)?;
    writeln!(out, "{}", pretty_format_batches(&[batch])?)?;
    Ok(())
}
