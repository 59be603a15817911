//! Relevance ranking and collinearity pruning of the pairwise matrix.
//!
//! Relevance is the k-nearest-neighbour mutual information between one
//! continuous feature and the binary label (Ross, 2014). Collinearity is the
//! absolute Pearson correlation of median-imputed columns.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use statrs::function::gamma::digamma;
use tracing::{info, warn};

use crate::config::FeatureConfig;
use crate::differentials::TrainingMatrix;
use crate::error::{FeatureError, Result};
use crate::manifest::{fingerprint_of, FeatureManifest, RemovedFeature, MANIFEST_VERSION};

const JITTER_SCALE: f64 = 1e-10;

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Fills nulls with the column median; `None` when the column has no values.
pub fn impute_median(column: &[Option<f64>]) -> Option<Vec<f64>> {
    let present = column.iter().flatten().copied().collect::<Vec<_>>();
    let fill = median(&present)?;
    Some(column.iter().map(|v| v.unwrap_or(fill)).collect())
}

/// Absolute Pearson correlation; `None` when either column is constant.
pub fn pearson_abs(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let r = (cov / (var_x.sqrt() * var_y.sqrt())).abs();
    r.is_finite().then_some(r.min(1.0))
}

/// Distance from `values[sorted[pos]]` to its k-th nearest neighbour among
/// `values[sorted[..]]`, excluding itself. `sorted` is ordered by value.
fn kth_neighbour_distance(values: &[f64], sorted: &[usize], pos: usize, k: usize) -> f64 {
    let x = values[sorted[pos]];
    let mut left = pos;
    let mut right = pos + 1;
    let mut dist = 0.0;
    for _ in 0..k {
        let dl = (left > 0).then(|| x - values[sorted[left - 1]]);
        let dr = (right < sorted.len()).then(|| values[sorted[right]] - x);
        match (dl, dr) {
            (Some(l), Some(r)) if l <= r => {
                dist = l;
                left -= 1;
            }
            (Some(_), Some(r)) => {
                dist = r;
                right += 1;
            }
            (Some(l), None) => {
                dist = l;
                left -= 1;
            }
            (None, Some(r)) => {
                dist = r;
                right += 1;
            }
            (None, None) => break,
        }
    }
    dist
}

/// Points of `sorted_values` strictly closer than `radius` to `x` (or equal to
/// `x` when the radius is zero). `x` itself is counted.
fn count_within(sorted_values: &[f64], x: f64, radius: f64) -> usize {
    if radius <= 0.0 {
        let lo = sorted_values.partition_point(|v| *v < x);
        let hi = sorted_values.partition_point(|v| *v <= x);
        return hi - lo;
    }
    let lo = sorted_values.partition_point(|v| *v < x - radius);
    let hi = sorted_values.partition_point(|v| *v <= x + radius);
    sorted_values[lo..hi]
        .iter()
        .filter(|v| (**v - x).abs() < radius)
        .count()
}

/// Mutual information between a continuous feature and a binary label.
///
/// `x` is expected to be scaled and jittered already; points whose label
/// occurs only once are ignored. Never negative.
pub fn mutual_info_continuous_binary(x: &[f64], labels: &[bool], neighbors: usize) -> f64 {
    let mut by_label: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, label) in labels.iter().enumerate() {
        by_label[usize::from(*label)].push(i);
    }

    let mut kept_values = Vec::new();
    let mut radii = Vec::new();
    let mut k_used = Vec::new();
    let mut label_counts = Vec::new();
    for members in &by_label {
        let count = members.len();
        if count < 2 {
            continue;
        }
        let k = neighbors.max(1).min(count - 1);
        let mut sorted = members.clone();
        sorted.sort_by(|a, b| x[*a].total_cmp(&x[*b]));
        for pos in 0..sorted.len() {
            kept_values.push(x[sorted[pos]]);
            radii.push(kth_neighbour_distance(x, &sorted, pos, k));
            k_used.push(k as f64);
            label_counts.push(count as f64);
        }
    }

    let n = kept_values.len();
    if n == 0 {
        return 0.0;
    }
    let mut sorted_all = kept_values.clone();
    sorted_all.sort_by(f64::total_cmp);

    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let psi_k = k_used.iter().map(|k| digamma(*k)).collect::<Vec<_>>();
    let psi_label = label_counts.iter().map(|c| digamma(*c)).collect::<Vec<_>>();
    let psi_m = kept_values
        .iter()
        .zip(&radii)
        .map(|(x, r)| digamma(count_within(&sorted_all, *x, *r) as f64))
        .collect::<Vec<_>>();

    let mi = digamma(n as f64) + mean(&psi_k) - mean(&psi_label) - mean(&psi_m);
    if mi.is_finite() { mi.max(0.0) } else { 0.0 }
}

/// Divides by the population standard deviation (no centring) and adds the
/// shared jitter vector.
fn scale_and_jitter(column: &[f64], jitter: &[f64]) -> Vec<f64> {
    let n = column.len() as f64;
    let mean = column.iter().sum::<f64>() / n;
    let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let scaled = column
        .iter()
        .map(|v| if std > 0.0 { v / std } else { *v })
        .collect::<Vec<_>>();
    let magnitude = (scaled.iter().map(|v| v.abs()).sum::<f64>() / n).max(1.0);
    scaled
        .iter()
        .zip(jitter)
        .map(|(v, j)| v + JITTER_SCALE * magnitude * j)
        .collect()
}

/// One jitter value per row, shared by every column so identical columns
/// receive identical scores whatever their position in the matrix.
fn jitter_vector(rows: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollinearPair {
    pub first: String,
    pub second: String,
    pub r: f64,
}

/// Pairs with |r| above `threshold`, strongest first, ties by names.
pub fn collinear_pairs(names: &[String], columns: &[Vec<f64>], threshold: f64) -> Vec<CollinearPair> {
    let mut pairs = (0..names.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            ((i + 1)..names.len()).filter_map(move |j| {
                let r = pearson_abs(&columns[i], &columns[j])?;
                (r > threshold).then(|| {
                    let (first, second) = if names[i] <= names[j] {
                        (names[i].clone(), names[j].clone())
                    } else {
                        (names[j].clone(), names[i].clone())
                    };
                    CollinearPair { first, second, r }
                })
            })
        })
        .collect::<Vec<_>>();
    pairs.sort_by(|a, b| {
        b.r.total_cmp(&a.r)
            .then_with(|| a.first.cmp(&b.first))
            .then_with(|| a.second.cmp(&b.second))
    });
    pairs
}

/// Greedy pruning: for each pair not already touched by a drop, removes the
/// lower-MI member; equal scores drop the lexicographically greater name.
pub fn prune_collinear(pairs: &[CollinearPair], mi: &BTreeMap<String, f64>) -> Vec<RemovedFeature> {
    let score = |name: &str| mi.get(name).copied().unwrap_or(0.0);
    let mut dropped: HashSet<&str> = HashSet::new();
    let mut removed = Vec::new();
    for pair in pairs {
        if dropped.contains(pair.first.as_str()) || dropped.contains(pair.second.as_str()) {
            continue;
        }
        let (s1, s2) = (score(&pair.first), score(&pair.second));
        let drop_first = match s1.total_cmp(&s2) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => pair.first > pair.second,
        };
        let (drop, keep, s_drop, s_keep) = if drop_first {
            (&pair.first, &pair.second, s1, s2)
        } else {
            (&pair.second, &pair.first, s2, s1)
        };
        dropped.insert(drop.as_str());
        removed.push(RemovedFeature {
            feature: drop.clone(),
            correlated_with: keep.clone(),
            r: round_to(pair.r, 4),
            mi_score_dropped: round_to(s_drop, 6),
            mi_score_kept: round_to(s_keep, 6),
        });
    }
    removed
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Scores, prunes and orders the numeric columns of `matrix`.
pub fn run_feature_selection(matrix: &TrainingMatrix, config: &FeatureConfig) -> Result<FeatureManifest> {
    if matrix.is_empty() {
        return Err(FeatureError::EmptyMatrix);
    }
    let labels = matrix.labels();

    let mut names = Vec::new();
    let mut columns = Vec::new();
    let mut removed_empty = Vec::new();
    for (idx, name) in matrix.feature_names.iter().enumerate() {
        let column = matrix.rows.iter().map(|r| r.features[idx]).collect::<Vec<_>>();
        match impute_median(&column) {
            Some(filled) => {
                names.push(name.clone());
                columns.push(filled);
            }
            None => removed_empty.push(name.clone()),
        }
    }
    if !removed_empty.is_empty() {
        warn!(features = ?removed_empty, "dropping all-null features");
    }

    info!(features = names.len(), rows = matrix.len(), "computing mutual information");
    let jitter = jitter_vector(matrix.len(), config.mi_seed);
    let scores = columns
        .par_iter()
        .map(|column| {
            let x = scale_and_jitter(column, &jitter);
            mutual_info_continuous_binary(&x, &labels, config.mi_neighbors)
        })
        .collect::<Vec<_>>();
    let mi = names
        .iter()
        .cloned()
        .zip(scores)
        .collect::<BTreeMap<String, f64>>();

    let pairs = collinear_pairs(&names, &columns, config.collinearity_threshold);
    let removed_collinear = prune_collinear(&pairs, &mi);
    let dropped = removed_collinear
        .iter()
        .map(|r| r.feature.as_str())
        .collect::<HashSet<_>>();

    let mut selected = names
        .iter()
        .filter(|n| !dropped.contains(n.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    selected.sort_by(|a, b| mi[b].total_cmp(&mi[a]).then_with(|| a.cmp(b)));

    let categorical = matrix.categorical_names.clone();
    let manifest = FeatureManifest {
        version: MANIFEST_VERSION,
        fingerprint: fingerprint_of(&selected, &categorical),
        generated_at: chrono::Utc::now().to_rfc3339(),
        n_training_rows: matrix.len(),
        n_features_before: matrix.feature_names.len(),
        n_features_removed_collinear: removed_collinear.len(),
        n_features_removed_empty: removed_empty.len(),
        n_features_selected: selected.len(),
        mi_scores: selected
            .iter()
            .map(|n| (n.clone(), round_to(mi[n], 6)))
            .collect(),
        feature_names: selected,
        removed_collinear,
        removed_empty,
        categorical_features: categorical,
    };
    info!(
        selected = manifest.n_features_selected,
        removed_collinear = manifest.n_features_removed_collinear,
        removed_empty = manifest.n_features_removed_empty,
        "feature selection complete"
    );
    Ok(manifest)
}
