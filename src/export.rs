use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::antigen::ResponseLogEntry;
use crate::report::{HarmonizedCount, SourceSummary};
use crate::TARGET_REPORT;

pub const CLEANED_ANTIGENS_FILE: &str = "manually_cleaned_antigens.csv";
pub const RESPONSES_FILE: &str = "output_responses.json";
pub const SOURCE_TABLE_FILE: &str = "output_antigens.csv";
pub const COUNT_TABLE_FILE: &str = "output_count_table.csv";

fn json_list(set: &BTreeSet<String>) -> Result<String> {
    serde_json::to_string(set).context("Failed to encode antigen set")
}

/// Distinct cleaned antigens, one per row under an `Antigens` header.
pub fn write_cleaned_antigens(path: &Path, cleaned: &BTreeSet<String>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["Antigens"])?;
    for antigen in cleaned {
        writer.write_record([antigen])?;
    }
    writer.flush()?;
    Ok(())
}

/// The full response log, successes and failures, as pretty JSON.
pub fn write_responses(path: &Path, responses: &[ResponseLogEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(responses).context("Failed to encode responses")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn write_source_table(path: &Path, summaries: &[SourceSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record([
        "Source ID",
        "Original Antigens",
        "Manually Cleaned Antigens",
        "LLM Harmonized Antigens",
        "Original Antigen Count",
        "Cleaned Antigen Count",
        "Harmonized Antigen Count",
    ])?;

    for summary in summaries {
        writer.write_record([
            summary.source_id.clone(),
            json_list(&summary.original)?,
            json_list(&summary.cleaned)?,
            json_list(&summary.harmonized)?,
            summary.original_count().to_string(),
            summary.cleaned_count().to_string(),
            summary.harmonized_count().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_count_table(path: &Path, counts: &[HarmonizedCount]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["LLM Harmonized Antigen", "Unique Source ID Count"])?;
    for count in counts {
        writer.write_record([count.harmonized_name.clone(), count.source_count.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Everything a run produces, ready to be written to one directory.
pub struct RunOutputs<'a> {
    pub cleaned: &'a BTreeSet<String>,
    pub responses: &'a [ResponseLogEntry],
    pub summaries: &'a [SourceSummary],
    pub counts: &'a [HarmonizedCount],
}

pub fn write_all(output_dir: &Path, outputs: &RunOutputs<'_>) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let cleaned_path = output_dir.join(CLEANED_ANTIGENS_FILE);
    let responses_path = output_dir.join(RESPONSES_FILE);
    let source_path = output_dir.join(SOURCE_TABLE_FILE);
    let count_path = output_dir.join(COUNT_TABLE_FILE);

    write_cleaned_antigens(&cleaned_path, outputs.cleaned)?;
    write_responses(&responses_path, outputs.responses)?;
    write_source_table(&source_path, outputs.summaries)?;
    write_count_table(&count_path, outputs.counts)?;

    info!(
        target: TARGET_REPORT,
        "Output and count tables have been saved to {}",
        output_dir.display()
    );
    Ok(vec![cleaned_path, responses_path, source_path, count_path])
}
