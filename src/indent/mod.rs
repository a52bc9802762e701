// src/indent/mod.rs
//
// Indentation-driven source: one label column whose cell indent encodes the level
//   0 geography, 1 segment type, 2 sub-segment, 3 leaf segment
// followed by one column per year.

use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::tree::{round_tenths, GeoTree, YearValues};
use crate::workbook::SheetRow;

pub const GEOGRAPHY_LEVEL: usize = 0;
pub const SEGMENT_TYPE_LEVEL: usize = 1;
pub const SUBSEGMENT_LEVEL: usize = 2;

const LABEL_COL: usize = 0;
const FIRST_YEAR_COL: usize = 1;
const FIRST_DATA_ROW: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct IndentedRow {
    /// 1-based sheet row, for diagnostics.
    pub row: u32,
    pub label: String,
    pub indent: u8,
    /// `None` when no year column held a value.
    pub years: Option<YearValues>,
}

impl IndentedRow {
    pub fn level(&self) -> usize {
        self.indent as usize
    }
}

/// Turn sheet rows into [`IndentedRow`]s.
///
/// - the header row and rows with a blank label are skipped
/// - an empty year cell counts as `0`, but only real values mark the row as having data
/// - a year cell that isn't a number is left out of the mapping
/// - values are rounded to one decimal
#[tracing::instrument(level = "info", skip_all, fields(rows = rows.len()))]
pub fn extract_rows(rows: &[SheetRow], years: &[String]) -> Vec<IndentedRow> {
    let out: Vec<IndentedRow> = rows
        .iter()
        .filter(|r| r.number >= FIRST_DATA_ROW)
        .filter_map(|r| {
            let label = r.text(LABEL_COL)?;
            let mut values = YearValues::new();
            let mut has_data = false;

            for (offset, year) in years.iter().enumerate() {
                let cell = r.value(FIRST_YEAR_COL + offset);
                if cell.is_empty() {
                    values.insert(year.clone(), 0.0);
                    continue;
                }
                match cell.as_f64() {
                    Some(v) => {
                        values.insert(year.clone(), round_tenths(v));
                        has_data = true;
                    }
                    None => trace!(row = r.number, year = %year, "non-numeric year cell skipped"),
                }
            }

            Some(IndentedRow {
                row: r.number,
                label,
                indent: r.indent(LABEL_COL),
                years: has_data.then_some(values),
            })
        })
        .collect();

    debug!(extracted = out.len(), "indented rows extracted");
    out
}

/// Fold rows, in document order, into the geography tree.
///
/// The accumulator is the stack of open ancestor labels, one per level. A row at level
/// `L` needs all `L` ancestors open, otherwise it is dropped; it then closes everything
/// at `L` and deeper and opens itself. Levels 0 and 1 only create containers. Deeper
/// rows carrying year data merge them into their node: if later rows open beneath it
/// the node becomes an aggregate, otherwise it stays a leaf. Deeper rows without data
/// add nothing but still open context for their children.
#[tracing::instrument(level = "info", skip_all, fields(rows = rows.len()))]
pub fn assemble(rows: &[IndentedRow]) -> GeoTree {
    let (tree, _open) = rows.iter().fold(
        (GeoTree::new(), Vec::<String>::new()),
        |(mut tree, mut open), row| {
            let level = row.level();
            if level > open.len() {
                trace!(row = row.row, label = %row.label, level, "row without context dropped");
                return (tree, open);
            }

            open.truncate(level);
            open.push(row.label.clone());

            if level < SUBSEGMENT_LEVEL {
                tree.root_mut().path_or_insert(open.as_slice());
            } else if let Some(values) = &row.years {
                tree
                    .root_mut()
                    .path_or_insert(open.as_slice())
                    .merge_values(values);
            }
            (tree, open)
        },
    );
    tree
}

/// (geography, segment type, sub-segment)
pub type SegmentKey = (String, String, String);

/// Scan context for [`aggregate_parents`].
#[derive(Debug, Clone, Copy, Default)]
struct Scope<'a> {
    geography: Option<&'a str>,
    segment_type: Option<&'a str>,
}

impl<'a> Scope<'a> {
    fn enter(self, row: &'a IndentedRow) -> Self {
        match row.level() {
            GEOGRAPHY_LEVEL => Scope {
                geography: Some(row.label.as_str()),
                segment_type: None,
            },
            SEGMENT_TYPE_LEVEL if self.geography.is_some() => Scope {
                segment_type: Some(row.label.as_str()),
                ..self
            },
            _ => self,
        }
    }
}

/// Sub-segments that head a run of child rows.
///
/// A sub-segment row with data is an aggregate parent when the contiguous run of deeper
/// rows after it adds at least one valued descendant. Within the run a row counts only
/// if its ancestors are open, the same rule [`assemble`] applies, so a dataless child
/// with nothing beneath it does not make a parent. A sibling or shallower row ends the
/// run. Rows seen before any geography or segment type are never parents.
pub fn aggregate_parents(rows: &[IndentedRow]) -> BTreeSet<SegmentKey> {
    let (_, parents) = rows.iter().enumerate().fold(
        (Scope::default(), BTreeSet::new()),
        |(scope, mut parents), (idx, row)| {
            let scope = scope.enter(row);
            if row.level() == SUBSEGMENT_LEVEL && row.years.is_some() {
                if let (Some(geo), Some(seg)) = (scope.geography, scope.segment_type) {
                    if heads_child_run(&rows[idx + 1..], SUBSEGMENT_LEVEL) {
                        parents.insert((geo.to_string(), seg.to_string(), row.label.clone()));
                    }
                }
            }
            (scope, parents)
        },
    );
    parents
}

fn heads_child_run(following: &[IndentedRow], level: usize) -> bool {
    // `open` is the depth of the open context, counted like `assemble`'s stack
    let mut open = level + 1;
    for row in following.iter().take_while(|r| r.level() > level) {
        if row.level() > open {
            continue;
        }
        if row.years.is_some() {
            return true;
        }
        open = row.level() + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Node, Precision};
    use crate::workbook::{Cell, CellValue};

    fn row(label: &str, indent: u8, years: &[(&str, f64)]) -> IndentedRow {
        IndentedRow {
            row: 0,
            label: label.to_string(),
            indent,
            years: (!years.is_empty())
                .then(|| years.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
        }
    }

    fn sheet_row(number: u32, cells: Vec<(CellValue, u8)>) -> SheetRow {
        SheetRow {
            number,
            cells: cells
                .into_iter()
                .map(|(value, indent)| Cell { value, indent })
                .collect(),
        }
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_mixed_aggregate_scenario() {
        let rows = vec![
            row("Global", 0, &[]),
            row("By Product", 1, &[]),
            row("Combo Products", 2, &[("2021", 100.0)]),
            row("Inhalers", 3, &[("2021", 60.0)]),
            row("Pumps", 3, &[("2021", 40.0)]),
        ];
        let tree = assemble(&rows);
        let json = serde_json::to_string(&tree.rounded(Precision::Units)).unwrap();
        assert_eq!(
            json,
            r#"{"Global":{"By Product":{"Combo Products":{"2021":100,"Inhalers":{"2021":60},"Pumps":{"2021":40}}}}}"#
        );

        let combo = tree
            .get(&["Global", "By Product", "Combo Products"])
            .unwrap();
        assert!(combo.is_aggregate());
        assert!(combo.child("Inhalers").is_some_and(Node::is_leaf));
    }

    #[test]
    fn test_children_stop_at_first_sibling() {
        let rows = vec![
            row("Global", 0, &[]),
            row("By Product", 1, &[]),
            row("Combo", 2, &[("2021", 10.0)]),
            row("A", 3, &[("2021", 4.0)]),
            row("B", 3, &[("2021", 6.0)]),
            row("Other", 2, &[("2021", 5.0)]),
            row("Stray", 3, &[("2021", 1.0)]),
        ];
        let tree = assemble(&rows);
        let product = tree.get(&["Global", "By Product"]).unwrap();
        let combo = product.child("Combo").unwrap();
        assert_eq!(combo.child_count(), 2);
        // "Stray" is contiguous with "Other", so it belongs there
        let other = product.child("Other").unwrap();
        assert!(other.is_aggregate());
        assert!(other.child("Stray").is_some());
    }

    #[test]
    fn test_shallower_rows_reset_context() {
        let rows = vec![
            row("Global", 0, &[]),
            row("By Product", 1, &[]),
            row("Combo", 2, &[("2021", 10.0)]),
            row("By Service", 1, &[]),
            // sub-segment context was cleared by the new segment type
            row("Orphan", 3, &[("2021", 1.0)]),
            row("Testing", 2, &[("2021", 3.0)]),
            row("North America", 0, &[]),
            // segment type context was cleared by the new geography
            row("Dropped", 2, &[("2021", 2.0)]),
        ];
        let tree = assemble(&rows);
        let service = tree.get(&["Global", "By Service"]).unwrap();
        assert_eq!(
            service.children().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["Testing"]
        );
        assert!(tree.get(&["Global", "By Service", "Orphan"]).is_none());
        let na = tree.geography("North America").unwrap();
        assert!(!na.has_children());
    }

    #[test]
    fn test_rows_before_any_geography_are_dropped() {
        let rows = vec![
            row("By Product", 1, &[]),
            row("Combo", 2, &[("2021", 10.0)]),
            row("Global", 0, &[]),
        ];
        let tree = assemble(&rows);
        assert_eq!(
            tree.geographies().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["Global"]
        );
        assert!(!tree.geography("Global").unwrap().has_children());
        assert!(aggregate_parents(&rows).is_empty());
    }

    #[test]
    fn test_dataless_subsegment_still_opens_context() {
        let rows = vec![
            row("Global", 0, &[]),
            row("By Product", 1, &[]),
            row("Devices", 2, &[]),
            row("Pens", 3, &[("2021", 2.0)]),
            row("Empty", 2, &[]),
        ];
        let tree = assemble(&rows);
        let devices = tree.get(&["Global", "By Product", "Devices"]).unwrap();
        assert!(devices.own_values().is_none());
        assert!(devices.child("Pens").is_some());
        // nothing beneath it and no data: no node at all
        assert!(tree.get(&["Global", "By Product", "Empty"]).is_none());
        assert!(aggregate_parents(&rows).is_empty());
    }

    #[test]
    fn test_aggregate_parents_matches_tree() {
        let rows = vec![
            row("Global", 0, &[]),
            row("By Product", 1, &[]),
            row("Combo", 2, &[("2021", 10.0)]),
            row("A", 3, &[("2021", 4.0)]),
            row("Other", 2, &[("2021", 5.0)]),
            row("North America", 0, &[]),
            row("By Product", 1, &[]),
            row("Combo", 2, &[("2021", 3.0)]),
            row("Deep", 4, &[("2021", 9.0)]),
            row("A", 3, &[("2021", 3.0)]),
        ];
        let parents = aggregate_parents(&rows);
        let expected: BTreeSet<SegmentKey> = [
            ("Global", "By Product", "Combo"),
            ("North America", "By Product", "Combo"),
        ]
        .into_iter()
        .map(|(g, s, l)| (g.to_string(), s.to_string(), l.to_string()))
        .collect();
        assert_eq!(parents, expected);

        let tree = assemble(&rows);
        for (geo, seg, sub) in &parents {
            let node = tree.get(&[geo, seg, sub]).unwrap();
            assert!(node.is_aggregate(), "{geo}/{seg}/{sub}");
        }
        assert!(tree
            .get(&["Global", "By Product", "Other"])
            .is_some_and(Node::is_leaf));
    }

    #[test]
    fn test_dataless_child_does_not_make_a_parent() {
        let rows = vec![
            row("Global", 0, &[]),
            row("By Product", 1, &[]),
            row("Combo", 2, &[("2021", 10.0)]),
            row("Blank", 3, &[]),
            row("Other", 2, &[("2021", 5.0)]),
            row("Header", 3, &[]),
            row("Pens", 4, &[("2021", 5.0)]),
        ];
        let parents = aggregate_parents(&rows);
        let tree = assemble(&rows);

        assert!(tree
            .get(&["Global", "By Product", "Combo"])
            .is_some_and(Node::is_leaf));
        assert!(tree
            .get(&["Global", "By Product", "Other", "Header", "Pens"])
            .is_some());
        let expected: BTreeSet<SegmentKey> =
            [("Global".to_string(), "By Product".to_string(), "Other".to_string())]
                .into_iter()
                .collect();
        assert_eq!(parents, expected);
        assert_eq!(crate::report::check_aggregates(&tree, &parents), 0);
    }

    #[test]
    fn test_extract_rows() {
        let years: Vec<String> = vec!["2021".into(), "2022".into(), "2023".into()];
        let rows = vec![
            sheet_row(1, vec![(text("Segment"), 0), (CellValue::Number(2021.0), 0)]),
            sheet_row(2, vec![(text(" Global "), 0)]),
            sheet_row(
                3,
                vec![
                    (text("Combo"), 2),
                    (CellValue::Number(12.34), 0),
                    (CellValue::Empty, 0),
                    (text("n/a"), 0),
                ],
            ),
            sheet_row(4, vec![(CellValue::Empty, 0), (CellValue::Number(1.0), 0)]),
            sheet_row(5, vec![(text("Blank"), 3), (text("  "), 0)]),
        ];

        let out = extract_rows(&rows, &years);
        assert_eq!(out.len(), 3);

        assert_eq!(out[0].label, "Global");
        assert_eq!(out[0].indent, 0);
        assert!(out[0].years.is_none());

        assert_eq!(out[1].indent, 2);
        let combo = out[1].years.as_ref().unwrap();
        assert_eq!(combo.get("2021"), Some(&12.3));
        assert_eq!(combo.get("2022"), Some(&0.0));
        assert_eq!(combo.get("2023"), None);

        assert_eq!(out[2].label, "Blank");
        assert!(out[2].years.is_none());
    }
}
