// ============================================================
// Layer 4: Subset Splitter
// ============================================================
// Two ways of cutting a set-up dataset into pieces:
//
//   split_by_label → (normal rows, anomalous rows), order kept
//   random_split   → ([1 - r] share, [r] share), shuffled
//
// Subset lengths for a split of n rows with ratios r_i are
// floor(n * r_i); the leftover rows are handed out one at a
// time starting from the first subset. With label_aware the
// normal and anomalous rows are split separately and the
// pieces concatenated, so both labels keep their proportion
// in every subset.
//
// The permutation comes from a StdRng seeded with `seed` when
// given, so the same seed always yields the same subsets.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::dataset::AnomalyDataset;
use crate::domain::error::{DataError, DataResult};
use crate::domain::labels::LabelName;

/// Split into (normal, anomalous) datasets, keeping row order.
pub fn split_by_label(dataset: &AnomalyDataset) -> DataResult<(AnomalyDataset, AnomalyDataset)> {
    if !dataset.is_setup() {
        return Err(DataError::NotSetUp);
    }

    let (normal, anomalous): (Vec<_>, Vec<_>) = dataset
        .samples()
        .iter()
        .cloned()
        .partition(|s| s.is_normal());

    Ok((dataset.with_samples(normal), dataset.with_samples(anomalous)))
}

/// Randomly split `dataset` into two subsets holding roughly
/// `1 - split_ratio` and `split_ratio` of the rows.
///
/// # Example
/// ```ignore
/// let (train, holdout) = random_split(&train, 0.2, false, Some(42))?;
/// ```
pub fn random_split(
    dataset:     &AnomalyDataset,
    split_ratio: f64,
    label_aware: bool,
    seed:        Option<u64>,
) -> DataResult<(AnomalyDataset, AnomalyDataset)> {
    if !(0.0..=1.0).contains(&split_ratio) {
        return Err(DataError::InvalidRatio(split_ratio));
    }

    let mut subsets = random_split_ratios(dataset, &[1.0 - split_ratio, split_ratio], label_aware, seed)?;
    let second = subsets.pop().ok_or_else(|| DataError::Other("split produced no subsets".into()))?;
    let first  = subsets.pop().ok_or_else(|| DataError::Other("split produced one subset".into()))?;
    Ok((first, second))
}

/// General form of [`random_split`]: one subset per ratio.
/// Ratios must be non-negative and sum to one.
pub fn random_split_ratios(
    dataset:     &AnomalyDataset,
    ratios:      &[f64],
    label_aware: bool,
    seed:        Option<u64>,
) -> DataResult<Vec<AnomalyDataset>> {
    if !dataset.is_setup() {
        return Err(DataError::NotSetUp);
    }
    if let Some(bad) = ratios.iter().find(|r| !(0.0..=1.0).contains(*r)) {
        return Err(DataError::InvalidRatio(*bad));
    }
    let total: f64 = ratios.iter().sum();
    if ratios.is_empty() || (total - 1.0).abs() > 1e-6 {
        return Err(DataError::Other(format!("split ratios must sum to 1, got {total}")));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    // Groups of row indices that are split independently
    let groups: Vec<Vec<usize>> = if label_aware {
        [LabelName::Normal, LabelName::Abnormal]
            .iter()
            .map(|label| {
                dataset
                    .samples()
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.label_index == *label)
                    .map(|(i, _)| i)
                    .collect::<Vec<_>>()
            })
            .filter(|g| !g.is_empty())
            .collect()
    } else {
        vec![(0..dataset.sample_count()).collect()]
    };

    let mut per_subset: Vec<Vec<usize>> = vec![Vec::new(); ratios.len()];
    for group in &groups {
        let lengths = subset_lengths(group.len(), ratios);

        let mut order = group.clone();
        order.shuffle(&mut rng);

        let mut offset = 0;
        for (subset, len) in per_subset.iter_mut().zip(lengths) {
            subset.extend_from_slice(&order[offset..offset + len]);
            offset += len;
        }
    }

    if per_subset.iter().any(Vec::is_empty) {
        tracing::warn!(
            "Zero subset length encountered during splitting. One of the subsets \
             may be empty or hold only normal or only anomalous images."
        );
    }

    let subsets = per_subset
        .iter()
        .map(|indices| dataset.subsample(indices))
        .collect::<DataResult<Vec<_>>>()?;

    tracing::debug!(
        "Random split of {} rows into {:?}",
        dataset.sample_count(),
        subsets.iter().map(AnomalyDataset::sample_count).collect::<Vec<_>>(),
    );

    Ok(subsets)
}

/// floor(n * r_i), remainder distributed round-robin from the front.
fn subset_lengths(n: usize, ratios: &[f64]) -> Vec<usize> {
    // The epsilon absorbs float error such as 10 * (1.0 - 0.3) = 6.999…
    let mut lengths: Vec<usize> = ratios
        .iter()
        .map(|r| ((n as f64) * r + 1e-9).floor() as usize)
        .collect();

    let assigned: usize = lengths.iter().sum();
    let k = lengths.len();
    for i in 0..n.saturating_sub(assigned) {
        lengths[i % k] += 1;
    }
    lengths
}
