// src/tree/mod.rs
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// Year label (e.g. "2021") → value for that year.
///
/// Labels are four-digit years, so lexical order is chronological order.
pub type YearValues = BTreeMap<String, f64>;

/// True for digit-only labels such as `"2021"`; segment names never satisfy it.
pub fn is_year_label(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit())
}

/// One node of the segment hierarchy.
///
/// A node is a *leaf* when it only carries year values, an *aggregate* when it carries
/// its own totals and named children, and a *container* when it only has children.
/// The two halves are kept apart here and only merged into one JSON object by
/// [`Rounded`] at write time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    own_values: Option<YearValues>,
    /// Insertion-ordered; keys are unique.
    children: Vec<(String, Node)>,
}

impl Node {
    pub fn leaf(values: YearValues) -> Self {
        Self {
            own_values: Some(values),
            children: Vec::new(),
        }
    }

    pub fn own_values(&self) -> Option<&YearValues> {
        self.own_values.as_ref()
    }

    /// Overlay `values` onto this node's own values, creating them if absent.
    pub fn merge_values(&mut self, values: &YearValues) {
        let own = self.own_values.get_or_insert_with(YearValues::new);
        for (year, value) in values {
            own.insert(year.clone(), *value);
        }
    }

    /// Value of the earliest year this node carries.
    pub fn first_value(&self) -> Option<f64> {
        self.own_values
            .as_ref()
            .and_then(|v| v.values().next().copied())
    }

    pub fn is_leaf(&self) -> bool {
        self.own_values.is_some() && self.children.is_empty()
    }

    pub fn is_aggregate(&self) -> bool {
        self.own_values.is_some() && !self.children.is_empty()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(k, n)| (k.as_str(), n))
    }

    pub fn child(&self, key: &str) -> Option<&Node> {
        self.children.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.children
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, n)| n)
    }

    /// Child under `key`, appended as an empty container if missing.
    pub fn child_or_insert(&mut self, key: &str) -> &mut Node {
        let idx = match self.children.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.children.push((key.to_string(), Node::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[idx].1
    }

    /// Set `key` to `node`. An existing child is replaced in place, keeping its position.
    pub fn insert_child(&mut self, key: impl Into<String>, node: Node) {
        let key = key.into();
        match self.child_mut(&key) {
            Some(slot) => *slot = node,
            None => self.children.push((key, node)),
        }
    }

    /// Walk `path` from this node, creating empty containers along the way.
    pub fn path_or_insert<S: AsRef<str>>(&mut self, path: &[S]) -> &mut Node {
        path.iter()
            .fold(self, |node, key| node.child_or_insert(key.as_ref()))
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, key| node.child(key.as_ref()))
    }

    /// Serializable view of this node with values rounded to `precision`.
    pub fn rounded(&self, precision: Precision) -> Rounded<'_> {
        Rounded {
            node: self,
            precision,
        }
    }
}

/// Top level of a dataset: geography name → segment types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoTree {
    root: Node,
}

impl GeoTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_root(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn is_empty(&self) -> bool {
        !self.root.has_children()
    }

    pub fn geographies(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.root.children()
    }

    pub fn geography(&self, name: &str) -> Option<&Node> {
        self.root.child(name)
    }

    pub fn geography_or_insert(&mut self, name: &str) -> &mut Node {
        self.root.child_or_insert(name)
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
        self.root.get(path)
    }

    pub fn rounded(&self, precision: Precision) -> Rounded<'_> {
        self.root.rounded(precision)
    }
}

/// Output rounding for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// One decimal place, written as JSON floats (value datasets).
    Tenths,
    /// Whole numbers, written as JSON integers (volume datasets).
    Units,
}

impl Precision {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Precision::Tenths => round_tenths(value),
            Precision::Units => value.round(),
        }
    }
}

pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Flattens a [`Node`] into the dashboard's merged-key shape: own year values first,
/// then child objects, each in insertion order.
pub struct Rounded<'a> {
    node: &'a Node,
    precision: Precision,
}

impl Serialize for Rounded<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let own = self.node.own_values.as_ref();
        let len = own.map_or(0, BTreeMap::len) + self.node.children.len();
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(values) = own {
            for (year, value) in values {
                match self.precision {
                    Precision::Tenths => map.serialize_entry(year, &round_tenths(*value))?,
                    Precision::Units => map.serialize_entry(year, &(value.round() as i64))?,
                }
            }
        }
        for (key, child) in &self.node.children {
            map.serialize_entry(key, &child.rounded(self.precision))?;
        }
        map.end()
    }
}
