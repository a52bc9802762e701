// src/volume/mod.rs
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::ops::Range;
use tracing::debug;

use crate::tree::{GeoTree, Node, YearValues};

/// Multiplier range by the magnitude of a node's first year value.
/// Larger bases get smaller multipliers so unit counts land at a plausible scale.
const BANDS: [(f64, Range<f64>); 2] = [(10_000.0, 400.0..800.0), (1_000.0, 800.0..1_500.0)];
const SMALL_BASE: Range<f64> = 1_500.0..3_000.0;

/// Range a base value draws its multiplier from.
pub fn multiplier_range(base: f64) -> Range<f64> {
    BANDS
        .iter()
        .find(|(above, _)| base > *above)
        .map_or(SMALL_BASE, |(_, range)| range.clone())
}

/// Derive a unit-volume tree from a value tree.
///
/// Every node that carries its own year values draws one multiplier, from the band of
/// its first year value, and applies it to all of its years so the trend shape is kept.
/// Draws happen in pre-order: an aggregate draws before its children, and each child
/// draws its own. Containers draw nothing. The same `seed` and input always give the
/// same output.
#[tracing::instrument(level = "info", skip(values))]
pub fn synthesize_volume(values: &GeoTree, seed: u64) -> GeoTree {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut draws = 0usize;
    let root = convert(values.root(), &mut rng, &mut draws);
    debug!(draws, "volume multipliers drawn");
    GeoTree::from_root(root)
}

fn convert(node: &Node, rng: &mut StdRng, draws: &mut usize) -> Node {
    let mut out = match node.own_values() {
        Some(own) => {
            let base = node.first_value().unwrap_or(1.0);
            let factor = rng.random_range(multiplier_range(base));
            *draws += 1;
            Node::leaf(scale(own, factor))
        }
        None => Node::default(),
    };
    for (key, child) in node.children() {
        out.insert_child(key, convert(child, rng, draws));
    }
    out
}

fn scale(values: &YearValues, factor: f64) -> YearValues {
    values
        .iter()
        .map(|(year, v)| (year.clone(), (v * factor).round()))
        .collect()
}
