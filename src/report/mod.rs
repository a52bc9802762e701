// src/report/mod.rs
//
// Post-build checks. Everything here only logs; a questionable dataset is still written.

use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::indent::SegmentKey;
use crate::taxonomy::{Taxonomy, BY_REGION, GLOBAL};
use crate::tree::{is_year_label, GeoTree, Node};

/// Default absolute slack when comparing an aggregate with the sum of its children.
/// Source totals are rounded independently of their parts.
pub const AGGREGATE_TOLERANCE: f64 = 0.5;

/// An aggregate whose own value for `year` is not the sum of its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub path: Vec<String>,
    pub year: String,
    pub own: f64,
    pub children_sum: f64,
}

/// Every aggregate node/year where `|own - Σ children| > tolerance`. Years no child
/// reports are not compared.
pub fn aggregate_mismatches(tree: &GeoTree, tolerance: f64) -> Vec<Mismatch> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk_mismatches(tree.root(), &mut path, tolerance, &mut out);
    out
}

fn walk_mismatches(node: &Node, path: &mut Vec<String>, tolerance: f64, out: &mut Vec<Mismatch>) {
    if let (true, Some(own)) = (node.is_aggregate(), node.own_values()) {
        for (year, value) in own {
            let parts: Vec<f64> = node
                .children()
                .filter_map(|(_, child)| child.own_values().and_then(|v| v.get(year)).copied())
                .collect();
            if parts.is_empty() {
                continue;
            }
            let children_sum: f64 = parts.iter().sum();
            if (value - children_sum).abs() > tolerance {
                out.push(Mismatch {
                    path: path.clone(),
                    year: year.clone(),
                    own: *value,
                    children_sum,
                });
            }
        }
    }
    for (key, child) in node.children() {
        path.push(key.to_string());
        walk_mismatches(child, path, tolerance, out);
        path.pop();
    }
}

/// Per segment type of `geography`: the sum of its direct sub-segments for `year`.
/// Aggregates contribute their own total, not their children's.
pub fn segment_totals(tree: &GeoTree, geography: &str, year: &str) -> Vec<(String, f64)> {
    tree.geography(geography)
        .map(|geo| {
            geo.children()
                .map(|(segment, node)| (segment.to_string(), sum_children(node, year)))
                .collect()
        })
        .unwrap_or_default()
}

fn sum_children(node: &Node, year: &str) -> f64 {
    node.children()
        .filter_map(|(_, child)| child.own_values().and_then(|v| v.get(year)))
        .sum()
}

/// `Global / By Region` summed for `year`, if the slot exists.
pub fn region_total(tree: &GeoTree, year: &str) -> Option<f64> {
    tree.get(&[GLOBAL, BY_REGION]).map(|n| sum_children(n, year))
}

/// Slash-joined paths of child keys that look like years; once flattened to JSON they
/// could not be told apart from a year value.
pub fn year_like_keys(tree: &GeoTree) -> Vec<String> {
    fn walk(node: &Node, prefix: &str, out: &mut Vec<String>) {
        for (key, child) in node.children() {
            let path = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{prefix}/{key}")
            };
            if is_year_label(key) {
                out.push(path.clone());
            }
            walk(child, &path, out);
        }
    }
    let mut out = Vec::new();
    walk(tree.root(), "", &mut out);
    out
}

/// Aggregate sub-segments present in the tree, as (geography, segment type, sub-segment).
pub fn tree_aggregates(tree: &GeoTree) -> BTreeSet<SegmentKey> {
    let mut out = BTreeSet::new();
    for (geo, geo_node) in tree.geographies() {
        for (seg, seg_node) in geo_node.children() {
            for (sub, sub_node) in seg_node.children() {
                if sub_node.is_aggregate() {
                    out.insert((geo.to_string(), seg.to_string(), sub.to_string()));
                }
            }
        }
    }
    out
}

/// Log the verification summary for one dataset.
pub fn log_dataset(tree: &GeoTree, dataset: &str, year: &str, tolerance: f64) {
    for (geo, _) in tree.geographies() {
        for (segment, total) in segment_totals(tree, geo, year) {
            info!(dataset, geography = geo, %segment, year, total = %format!("{total:.1}"), "segment total");
        }
    }
    if let Some(total) = region_total(tree, year) {
        info!(dataset, year, total = %format!("{total:.1}"), "Global By Region total");
    }

    let mismatches = aggregate_mismatches(tree, tolerance);
    for m in &mismatches {
        warn!(
            dataset,
            path = %m.path.join(" > "),
            year = %m.year,
            own = m.own,
            children_sum = m.children_sum,
            "aggregate differs from sum of children"
        );
    }
    for key in year_like_keys(tree) {
        warn!(dataset, path = %key, "segment label looks like a year");
    }
    info!(dataset, mismatches = mismatches.len(), "verification done");
}

/// `(geography, segment type)` for every taxonomy segment type a built geography lacks.
pub fn missing_segment_types(tree: &GeoTree, taxonomy: &Taxonomy) -> Vec<(String, String)> {
    tree.geographies()
        .flat_map(|(geo, node)| {
            taxonomy
                .segments
                .iter()
                .filter(move |s| node.child(&s.name).is_none())
                .map(move |s| (geo.to_string(), s.name.clone()))
        })
        .collect()
}

/// Warn once per segment type missing from a geography; returns how many were missing.
pub fn log_missing_segment_types(tree: &GeoTree, taxonomy: &Taxonomy, dataset: &str) -> usize {
    let missing = missing_segment_types(tree, taxonomy);
    for (geo, segment) in &missing {
        warn!(dataset, geography = %geo, %segment, "segment type missing");
    }
    missing.len()
}

/// Compare the contiguity scan with what the tree ended up holding.
pub fn check_aggregates(tree: &GeoTree, scanned: &BTreeSet<SegmentKey>) -> usize {
    let built = tree_aggregates(tree);
    let mut disagreements = 0;
    for (geo, seg, sub) in scanned.symmetric_difference(&built) {
        warn!(geography = %geo, segment = %seg, subsegment = %sub, "aggregate scan and tree disagree");
        disagreements += 1;
    }
    info!(aggregates = built.len(), disagreements, "aggregate parents checked");
    disagreements
}
