// src/taxonomy/mod.rs
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tree::GeoTree;

pub const GLOBAL: &str = "Global";
/// Segment type under `Global` whose sub-segments are regions.
pub const BY_REGION: &str = "By Region";
/// Segment type under a region whose sub-segments are its countries.
pub const BY_COUNTRY: &str = "By Country";

static SOLAR_YAML: &str = include_str!("solar.yaml");

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static CONJUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:\band\b|&)\s*").expect("conjunction regex"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Region {
    pub name: String,
    pub countries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentType {
    pub name: String,
    pub subsegments: Vec<String>,
}

/// Fixed geographic rollup plus the domain segment types of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Taxonomy {
    pub regions: Vec<Region>,
    pub segments: Vec<SegmentType>,
}

impl Taxonomy {
    /// The bundled micro-inverter taxonomy.
    pub fn solar() -> Result<Self> {
        Self::from_yaml(SOLAR_YAML).context("parsing bundled solar taxonomy")
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid taxonomy YAML")
    }

    /// `Global`, then every region, then every country, in declaration order.
    pub fn geographies(&self) -> Vec<&str> {
        let mut out = vec![GLOBAL];
        out.extend(self.regions.iter().map(|r| r.name.as_str()));
        out.extend(
            self.regions
                .iter()
                .flat_map(|r| r.countries.iter().map(String::as_str)),
        );
        out
    }

    pub fn is_region(&self, name: &str) -> bool {
        self.regions.iter().any(|r| r.name == name)
    }

    /// Geographies, rollup slot names, then segment types and their sub-segments.
    fn known_labels(&self) -> impl Iterator<Item = &str> {
        self.geographies()
            .into_iter()
            .chain([BY_REGION, BY_COUNTRY])
            .chain(
                self.segments
                    .iter()
                    .flat_map(|s| std::iter::once(&s.name).chain(&s.subsegments))
                    .map(String::as_str),
            )
    }

    /// Fold spelling variants of a known entity onto its taxonomy name.
    ///
    /// `"Middle East and Africa"`, `"middle east &  africa"` and
    /// `"Middle East & Africa"` all map to the declared `"Middle East & Africa"`.
    /// Unknown labels come back trimmed with inner whitespace collapsed.
    /// Applying it twice gives the same result as applying it once.
    pub fn canonical_label(&self, raw: &str) -> String {
        let tidy = tidy_label(raw);
        let key = fold_key(&tidy);
        self.known_labels()
            .find(|known| fold_key(known) == key)
            .map(str::to_string)
            .unwrap_or(tidy)
    }

    /// `Global` with every segment type → sub-segment, and `By Region` → region →
    /// country, all as empty objects.
    pub fn segmentation_skeleton(&self) -> GeoTree {
        let mut tree = GeoTree::new();
        let global = tree.geography_or_insert(GLOBAL);
        for segment in &self.segments {
            let node = global.child_or_insert(&segment.name);
            for sub in &segment.subsegments {
                node.child_or_insert(sub);
            }
        }
        let by_region = global.child_or_insert(BY_REGION);
        for region in &self.regions {
            let node = by_region.child_or_insert(&region.name);
            for country in &region.countries {
                node.child_or_insert(country);
            }
        }
        tree
    }
}

fn tidy_label(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

/// Comparison key: conjunctions unified to `&`, lowercase, single spaces.
fn fold_key(label: &str) -> String {
    CONJUNCTION
        .replace_all(&tidy_label(label), " & ")
        .trim()
        .to_lowercase()
}
