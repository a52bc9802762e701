// src/columns/mod.rs
//
// Column-driven source: flat rows of `Region | Segment | Subsegment | <year>...`, in two
// blocks. The first `Region | Segment` header opens the Value block; a row starting
// with `Volume` ends it, and the second header opens the Volume block.

use anyhow::{bail, Result};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

use crate::taxonomy::{Taxonomy, BY_COUNTRY, BY_REGION, GLOBAL};
use crate::tree::{GeoTree, Node, YearValues};
use crate::workbook::{utils::format_number, SheetRow};

pub const REGION_HEADER: &str = "Region";
pub const SEGMENT_HEADER: &str = "Segment";
pub const VOLUME_MARKER: &str = "Volume";

const REGION_COL: usize = 0;
const SEGMENT_COL: usize = 1;
const SUBSEGMENT_COL: usize = 2;
const FIRST_YEAR_COL: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub region: String,
    pub segment: String,
    pub subsegment: String,
    pub values: YearValues,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections {
    pub years: Vec<String>,
    pub value: Vec<Record>,
    pub volume: Vec<Record>,
}

fn is_header(row: &SheetRow) -> bool {
    row.text(REGION_COL).as_deref() == Some(REGION_HEADER)
        && row.text(SEGMENT_COL).as_deref() == Some(SEGMENT_HEADER)
}

/// `(column, year label)` for every year heading; `2021`, `"2021"` and `2021.0` all
/// become `"2021"`.
fn header_years(header: &SheetRow) -> Vec<(usize, String)> {
    (FIRST_YEAR_COL..header.cells.len())
        .filter_map(|col| {
            let cell = header.value(col);
            if cell.is_empty() {
                return None;
            }
            match cell.as_f64() {
                Some(year) => Some((col, format_number(year.trunc()))),
                None => {
                    warn!(column = col + 1, "non-numeric year heading ignored");
                    None
                }
            }
        })
        .collect()
}

/// Split the sheet into Value and Volume records.
///
/// Fails only when no header row exists or it names no years; bad rows and bad cells
/// are skipped.
#[tracing::instrument(level = "info", skip_all, fields(rows = rows.len()))]
pub fn extract_sections(rows: &[SheetRow]) -> Result<Sections> {
    let headers: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| is_header(r))
        .map(|(idx, _)| idx)
        .collect();
    let Some(&value_header) = headers.first() else {
        bail!("no '{REGION_HEADER} | {SEGMENT_HEADER}' header row found");
    };
    let volume_header = headers.get(1).copied();
    let volume_marker = rows
        .iter()
        .enumerate()
        .skip(value_header + 1)
        .find(|(_, r)| r.text(REGION_COL).as_deref() == Some(VOLUME_MARKER))
        .map(|(idx, _)| idx);
    debug!(?headers, ?volume_marker, "section layout");

    let columns = header_years(&rows[value_header]);
    if columns.is_empty() {
        bail!("header row {} names no year columns", rows[value_header].number);
    }

    let value_end = volume_marker.or(volume_header).unwrap_or(rows.len());
    let value = parse_section(&rows[value_header + 1..value_end], &columns);
    let volume = volume_header
        .map(|h| parse_section(&rows[h + 1..], &columns))
        .unwrap_or_default();

    Ok(Sections {
        years: columns.into_iter().map(|(_, year)| year).collect(),
        value,
        volume,
    })
}

fn parse_section(rows: &[SheetRow], columns: &[(usize, String)]) -> Vec<Record> {
    rows.iter()
        .filter_map(|row| {
            let region = row.text(REGION_COL)?;
            let segment = row.text(SEGMENT_COL)?;
            let subsegment = row.text(SUBSEGMENT_COL)?;
            if region == REGION_HEADER || region == VOLUME_MARKER {
                return None;
            }

            let values: YearValues = columns
                .iter()
                .filter_map(|(col, year)| {
                    let cell = row.value(*col);
                    let parsed = cell.as_f64();
                    if parsed.is_none() && !cell.is_empty() {
                        trace!(row = row.number, year = %year, "unparseable year cell skipped");
                    }
                    parsed.map(|v| (year.clone(), v))
                })
                .collect();
            if values.is_empty() {
                return None;
            }

            Some(Record {
                region,
                segment,
                subsegment,
                values,
            })
        })
        .collect()
}

/// Build one dataset tree from flat records.
///
/// Geographies follow the taxonomy order (`Global`, regions, countries); one without
/// records is reported and left out, and records for geographies the taxonomy does not
/// know are ignored. Domain segment types keep record order. `By Region` rows only
/// count under `Global` and `By Country` rows only under a region; those rows are
/// collected into a rollup slot appended after the domain segment types. Every label is
/// passed through [`Taxonomy::canonical_label`] before it becomes a key.
#[tracing::instrument(level = "info", skip(records, taxonomy), fields(records = records.len()))]
pub fn build_tree(records: &[Record], taxonomy: &Taxonomy, dataset: &str) -> GeoTree {
    let mut by_geo: HashMap<String, Vec<&Record>> = HashMap::new();
    for rec in records {
        by_geo
            .entry(taxonomy.canonical_label(&rec.region))
            .or_default()
            .push(rec);
    }

    let mut tree = GeoTree::new();
    for geo in taxonomy.geographies() {
        let Some(recs) = by_geo.get(geo) else {
            warn!(dataset, geography = geo, "no records found for geography");
            continue;
        };

        let rollup_slot = if geo == GLOBAL {
            Some(BY_REGION)
        } else if taxonomy.is_region(geo) {
            Some(BY_COUNTRY)
        } else {
            None
        };

        let node = tree.geography_or_insert(geo);
        let mut rollup = Node::default();
        for rec in recs {
            let segment = taxonomy.canonical_label(&rec.segment);
            let subsegment = taxonomy.canonical_label(&rec.subsegment);
            let leaf = Node::leaf(rec.values.clone());

            if segment == BY_REGION || segment == BY_COUNTRY {
                if rollup_slot == Some(segment.as_str()) {
                    rollup.insert_child(subsegment, leaf);
                } else {
                    trace!(geography = geo, %segment, "rollup rows outside their level ignored");
                }
                continue;
            }
            node.child_or_insert(&segment).insert_child(subsegment, leaf);
        }

        if let Some(slot) = rollup_slot.filter(|_| rollup.has_children()) {
            node.insert_child(slot, rollup);
        }
    }

    let known: Vec<&str> = taxonomy.geographies();
    for geo in by_geo.keys().filter(|g| !known.contains(&g.as_str())) {
        debug!(dataset, geography = %geo, "records for unknown geography ignored");
    }
    tree
}
