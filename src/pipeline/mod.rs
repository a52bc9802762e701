// src/pipeline/mod.rs
//
// End-to-end runs. Each pipeline reads its sheet once, builds every tree, and only then
// writes; any read or structure error returns before a file is touched.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::{
    columns::{build_tree, extract_sections},
    config::{ColumnarConfig, IndentedConfig},
    indent::{aggregate_parents, assemble, extract_rows},
    output::write_json,
    report::{self, AGGREGATE_TOLERANCE},
    taxonomy::Taxonomy,
    tree::{GeoTree, Precision},
    volume::synthesize_volume,
    workbook::WorkbookSource,
};

/// What a run read and wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Data rows or records taken from the sheet.
    pub rows: usize,
    pub geographies: usize,
    pub aggregates: usize,
    /// (geography, segment type) pairs the taxonomy expects but the data lacks.
    pub missing_segments: usize,
    pub written: Vec<PathBuf>,
}

fn log_summary(tree: &GeoTree, summary: &RunSummary) {
    if tree.is_empty() {
        warn!("no geographies found; written files are empty");
    }
    for (geo, node) in tree.geographies() {
        let segments: Vec<&str> = node.children().map(|(k, _)| k).collect();
        info!(geography = geo, segments = ?segments, "geography");
    }
    info!(
        rows = summary.rows,
        geographies = summary.geographies,
        aggregates = summary.aggregates,
        missing_segments = summary.missing_segments,
        written = ?summary.written,
        "run complete"
    );
}

/// Indentation-driven run: `value.json` from the sheet, `volume.json` derived from it.
#[tracing::instrument(level = "info", skip_all, fields(sheet = %config.sheet))]
pub fn run_indented(config: &IndentedConfig, source: &dyn WorkbookSource) -> Result<RunSummary> {
    // 1) read
    let sheet = source
        .read_sheet(&config.sheet)
        .with_context(|| format!("reading sheet '{}'", config.sheet))?;
    let rows = extract_rows(&sheet, &config.years);

    // 2) build
    let value = assemble(&rows);
    let parents = aggregate_parents(&rows);
    report::check_aggregates(&value, &parents);
    let volume = synthesize_volume(&value, config.seed);

    // derived volume scales each node on its own, so its sums are not checked
    if let Some(year) = config.years.first() {
        report::log_dataset(&value, "value", year, AGGREGATE_TOLERANCE);
    }

    // 3) write
    let value_path = config.value_path();
    let volume_path = config.volume_path();
    write_json(&value_path, &value, Precision::Tenths)?;
    write_json(&volume_path, &volume, Precision::Units)?;

    let summary = RunSummary {
        rows: rows.len(),
        geographies: value.geographies().count(),
        aggregates: report::tree_aggregates(&value).len(),
        missing_segments: 0,
        written: vec![value_path, volume_path],
    };
    log_summary(&value, &summary);
    Ok(summary)
}

/// Column-driven run: `value.json` and `volume.json` from the two sheet sections, plus
/// the `segmentation_analysis.json` skeleton from `taxonomy`.
#[tracing::instrument(level = "info", skip_all, fields(sheet = %config.sheet))]
pub fn run_columnar(
    config: &ColumnarConfig,
    source: &dyn WorkbookSource,
    taxonomy: &Taxonomy,
) -> Result<RunSummary> {
    // 1) read
    let sheet = source
        .read_sheet(&config.sheet)
        .with_context(|| format!("reading sheet '{}'", config.sheet))?;
    let sections = extract_sections(&sheet)
        .with_context(|| format!("parsing sheet '{}'", config.sheet))?;
    info!(
        years = sections.years.len(),
        value_records = sections.value.len(),
        volume_records = sections.volume.len(),
        "sections extracted"
    );

    // 2) build
    let value = build_tree(&sections.value, taxonomy, "value");
    let volume = build_tree(&sections.volume, taxonomy, "volume");
    let segmentation = taxonomy.segmentation_skeleton();

    if let Some(year) = sections.years.first() {
        report::log_dataset(&value, "value", year, AGGREGATE_TOLERANCE);
        report::log_dataset(&volume, "volume", year, AGGREGATE_TOLERANCE);
    }
    let missing_segments = report::log_missing_segment_types(&value, taxonomy, "value")
        + report::log_missing_segment_types(&volume, taxonomy, "volume");

    // 3) write
    let written = vec![
        config.value_path(),
        config.volume_path(),
        config.segmentation_path(),
    ];
    write_json(&written[0], &value, Precision::Tenths)?;
    write_json(&written[1], &volume, Precision::Units)?;
    write_json(&written[2], &segmentation, Precision::Tenths)?;

    let summary = RunSummary {
        rows: sections.value.len() + sections.volume.len(),
        geographies: value.geographies().count(),
        aggregates: report::tree_aggregates(&value).len(),
        missing_segments,
        written,
    };
    log_summary(&value, &summary);
    Ok(summary)
}
