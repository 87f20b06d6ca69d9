use crate::common::*;
use fnv::FnvHashMap;
use matrix_util::sparse_stat::SparseRunningStatistics;

/// Feature selection result with selected indices and names
pub struct FeatureSelection {
    /// sorted indices of the selected rows
    pub selected_indices: Vec<usize>,
    pub selected_names: Vec<Box<str>>,
}

impl FeatureSelection {
    /// `x[selected, :]`
    pub fn apply(&self, x: &CscMat) -> anyhow::Result<CscMat> {
        x.select_rows(&self.selected_indices)
    }

    pub fn len(&self) -> usize {
        self.selected_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_indices.is_empty()
    }
}

/// `log(1 + x)` on every stored value
pub fn log1p_inplace(x: &mut CscMat) {
    x.values_mut().par_iter_mut().for_each(|v| *v = v.ln_1p());
}

/// Variance of `log1p(x)` per row, implicit zeros included
pub fn log_variance(x: &CscMat) -> Vec<f32> {
    let mut stat = SparseRunningStatistics::<f32>::new(x.nrows());
    stat.add_csc_with(x, |v| v.ln_1p());
    stat.variance()
}

/// Linear interpolation between the two closest ranks
pub fn percentile(values: &[f32], q: f32) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lb = pos.floor() as usize;
    let ub = pos.ceil() as usize;
    let frac = pos - lb as f32;
    sorted[lb] + (sorted[ub] - sorted[lb]) * frac
}

/// Keep features whose log-variance exceeds the `q`-th percentile
///
/// * `x` - features x cells
/// * `names` - one per row of `x`
/// * `q` - percentile in `[0, 100]`
pub fn select_highly_variable_features(
    x: &CscMat,
    names: &[Box<str>],
    q: f32,
) -> anyhow::Result<FeatureSelection> {
    if names.len() != x.nrows() {
        anyhow::bail!("{} names for {} features", names.len(), x.nrows());
    }
    if x.nrows() == 0 {
        anyhow::bail!("no feature to select from");
    }

    info!("Computing log-variance for {} features...", x.nrows());
    let variance = log_variance(x);
    let cutoff = percentile(&variance, q);

    let mut selected_indices: Vec<usize> = (0..variance.len())
        .filter(|&g| variance[g] > cutoff)
        .collect();

    if selected_indices.is_empty() {
        warn!("no feature above the {}th percentile; keeping ties", q);
        selected_indices = (0..variance.len())
            .filter(|&g| variance[g] >= cutoff)
            .collect();
    }

    let selected_names = selected_indices.iter().map(|&g| names[g].clone()).collect();

    info!(
        "Selected {} / {} highly variable features",
        selected_indices.len(),
        x.nrows()
    );

    Ok(FeatureSelection {
        selected_indices,
        selected_names,
    })
}

/// Keep the features listed in `wanted`, in their original row order;
/// unknown names are reported and skipped
pub fn select_features_by_name(
    names: &[Box<str>],
    wanted: &[Box<str>],
) -> anyhow::Result<FeatureSelection> {
    let name_to_index: FnvHashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_ref(), i))
        .collect();

    let mut selected_indices: Vec<usize> = vec![];
    let mut n_missing = 0;
    for w in wanted {
        match name_to_index.get(w.as_ref()) {
            Some(&i) => selected_indices.push(i),
            None => n_missing += 1,
        }
    }
    if n_missing > 0 {
        warn!("{} listed feature(s) not found", n_missing);
    }

    selected_indices.sort_unstable();
    selected_indices.dedup();

    if selected_indices.is_empty() {
        anyhow::bail!("none of the {} listed features found", wanted.len());
    }

    let selected_names = selected_indices.iter().map(|&g| names[g].clone()).collect();
    Ok(FeatureSelection {
        selected_indices,
        selected_names,
    })
}
