use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::antigen::{CleaningTable, HarmonizedTable, SourceRecord};
use crate::TARGET_REPORT;

/// Original → cleaned → harmonized antigen sets for one source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source_id: String,
    pub original: BTreeSet<String>,
    pub cleaned: BTreeSet<String>,
    pub harmonized: BTreeSet<String>,
}

impl SourceSummary {
    pub fn original_count(&self) -> usize {
        self.original.len()
    }

    pub fn cleaned_count(&self) -> usize {
        self.cleaned.len()
    }

    pub fn harmonized_count(&self) -> usize {
        self.harmonized.len()
    }
}

/// Number of distinct sources referencing a harmonized antigen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarmonizedCount {
    pub harmonized_name: String,
    pub source_count: usize,
}

/// Re-expand one record through both mapping stages. A cleaned antigen with
/// no harmonized entry passes through unchanged.
pub fn summarize_record(
    record: &SourceRecord,
    cleaning: &CleaningTable,
    harmonized: &HarmonizedTable,
) -> SourceSummary {
    let original = record.raw_antigens();
    let cleaned: BTreeSet<String> = original.iter().map(|raw| cleaning.cleaned(raw)).collect();
    let harmonized = cleaned
        .iter()
        .map(|c| harmonized.harmonized_or_identity(c))
        .collect();

    SourceSummary {
        source_id: record.source_id.clone(),
        original,
        cleaned,
        harmonized,
    }
}

pub fn summarize_records(
    records: &[SourceRecord],
    cleaning: &CleaningTable,
    harmonized: &HarmonizedTable,
) -> Vec<SourceSummary> {
    let summaries: Vec<SourceSummary> = records
        .iter()
        .map(|record| summarize_record(record, cleaning, harmonized))
        .collect();

    info!(
        target: TARGET_REPORT,
        "Summarized {} source records", summaries.len()
    );
    summaries
}

/// Count distinct source identifiers per harmonized antigen, sorted by name.
/// Repeat references from the same source count once.
pub fn count_sources(summaries: &[SourceSummary]) -> Vec<HarmonizedCount> {
    let mut sources_by_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for summary in summaries {
        for name in &summary.harmonized {
            sources_by_name
                .entry(name.as_str())
                .or_default()
                .insert(summary.source_id.as_str());
        }
    }

    sources_by_name
        .into_iter()
        .map(|(name, sources)| HarmonizedCount {
            harmonized_name: name.to_string(),
            source_count: sources.len(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(records: &[SourceRecord]) -> (CleaningTable, HarmonizedTable) {
        let cleaning = CleaningTable::from_records(records);
        let mut harmonized = HarmonizedTable::default();
        harmonized.insert("VIMENTIN", "VIM");
        harmonized.insert("VIM", "VIM");
        harmonized.insert("DAPI", "Nuclear");
        (cleaning, harmonized)
    }

    #[test]
    fn test_three_stage_sets() {
        let records = vec![SourceRecord::new("S1")
            .with_antibodies(["Anti-Vimentin", "CD3(2)"])
            .with_markers(["VIM", "CD3"])
            .with_channels(["DAPI-1", "DAPI-2"])];
        let (cleaning, harmonized) = tables(&records);

        let summary = summarize_record(&records[0], &cleaning, &harmonized);
        assert_eq!(summary.original_count(), 6);
        assert_eq!(summary.cleaned_count(), 4); // VIMENTIN, CD3, VIM, DAPI
        assert_eq!(summary.harmonized_count(), 3); // VIM, CD3, Nuclear
        assert!(summary.harmonized.contains("Nuclear"));
    }

    #[test]
    fn test_missing_mapping_falls_back_to_cleaned() {
        let records = vec![SourceRecord::new("S1").with_markers(["Target:FOXP3"])];
        let (cleaning, harmonized) = tables(&records);

        let summary = summarize_record(&records[0], &cleaning, &harmonized);
        assert_eq!(
            summary.harmonized.iter().collect::<Vec<_>>(),
            vec!["FOXP3"]
        );
    }

    #[test]
    fn test_same_name_from_two_fields_counts_once() {
        let records = vec![
            SourceRecord::new("S1")
                .with_antibodies(["Vimentin"])
                .with_markers(["VIM"]),
            SourceRecord::new("S2").with_channels(["anti-vimentin"]),
        ];
        let (cleaning, harmonized) = tables(&records);

        let summaries = summarize_records(&records, &cleaning, &harmonized);
        let counts = count_sources(&summaries);

        assert_eq!(
            counts,
            vec![HarmonizedCount {
                harmonized_name: "VIM".to_string(),
                source_count: 2,
            }]
        );
    }

    #[test]
    fn test_repeated_source_id_counts_once() {
        let records = vec![
            SourceRecord::new("S1").with_markers(["DAPI-1"]),
            SourceRecord::new("S1").with_markers(["DAPI-2"]),
            SourceRecord::new("S2").with_markers(["CD8"]),
        ];
        let (cleaning, harmonized) = tables(&records);

        let counts = count_sources(&summarize_records(&records, &cleaning, &harmonized));
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].harmonized_name, "CD8");
        assert_eq!(counts[0].source_count, 1);
        assert_eq!(counts[1].harmonized_name, "Nuclear");
        assert_eq!(counts[1].source_count, 1);
    }
}
