use ahash::AHashMap;
use serde::Serialize;
use tracing::info;

use super::Crosswalk;

/// Diagnostics describing how a crosswalk distributes past precincts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrosswalkStats {
    pub n_past: usize,
    pub mean_coverage: f64,
    pub min_coverage: f64,
    /// Past precincts whose fractions sum to less than the threshold.
    pub n_incomplete: usize,
    pub mean_splits: f64,
    pub max_splits: usize,
    pub n_one_to_one: usize,
}

/// Summarize coverage and splitting of a crosswalk. Diagnostics only; never fails.
pub fn validate_crosswalk(crosswalk: &Crosswalk, threshold: f64) -> CrosswalkStats {
    let mut per_past: AHashMap<&str, (f64, usize)> = AHashMap::new();
    for entry in crosswalk.entries() {
        let (coverage, splits) = per_past.entry(entry.past_id.as_str()).or_default();
        *coverage += entry.frac;
        *splits += 1;
    }

    let n_past = per_past.len();
    let denominator = n_past.max(1) as f64;
    let stats = CrosswalkStats {
        n_past,
        mean_coverage: per_past.values().map(|&(c, _)| c).sum::<f64>() / denominator,
        min_coverage: per_past.values().map(|&(c, _)| c).reduce(f64::min).unwrap_or(0.0),
        n_incomplete: per_past.values().filter(|&&(c, _)| c < threshold).count(),
        mean_splits: per_past.values().map(|&(_, s)| s as f64).sum::<f64>() / denominator,
        max_splits: per_past.values().map(|&(_, s)| s).max().unwrap_or(0),
        n_one_to_one: per_past.values().filter(|&&(_, s)| s == 1).count(),
    };

    info!(
        n_past = stats.n_past,
        mean_coverage = stats.mean_coverage,
        min_coverage = stats.min_coverage,
        n_incomplete = stats.n_incomplete,
        mean_splits = stats.mean_splits,
        max_splits = stats.max_splits,
        n_one_to_one = stats.n_one_to_one,
        "Crosswalk validation"
    );
    stats
}
