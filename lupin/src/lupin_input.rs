use clap::Args;
use lupin::common::*;
use lupin::feature_selection::*;
use lupin::{CoarsenArgs, CoarseningOracle, HeavyEdgeCoarsening, Hierarchy, HierarchyBuilder};
use matrix_util::common_io::read_lines;
use matrix_util::dmatrix_rsvd::RSVD;
use matrix_util::dmatrix_util::centre_rows_inplace;
use matrix_util::knn_graph::{KnnGraph, KnnGraphArgs};
use matrix_util::mtx_io::read_mtx;

/// Input and hierarchy construction options shared by every subcommand
#[derive(Args, Debug)]
pub struct HierarchyInputArgs {
    /// features x cells data in MatrixMarket format (`.mtx` or `.mtx.gz`)
    #[arg(required = true)]
    pub data_file: Box<str>,

    /// feature names, one per line (first word is used)
    #[arg(long, short = 'r')]
    pub row_names: Option<Box<str>>,

    /// keep only the features listed in this file instead of
    /// selecting highly variable ones
    #[arg(long)]
    pub feature_list: Option<Box<str>>,

    /// keep features above this percentile of log-variance
    #[arg(long, default_value_t = 90.0)]
    pub hvf_percentile: f32,

    /// number of principal components before the kNN search
    #[arg(long, short = 'p', default_value_t = 100)]
    pub n_pca: usize,

    /// #k-nearest neighbours
    #[arg(long, short = 'k', default_value_t = 10)]
    pub knn: usize,

    /// keep reciprocal kNN edges only
    #[arg(long, default_value_t = false)]
    pub reciprocal: bool,

    /// stop coarsening when this fraction of nodes is gone
    #[arg(long, default_value_t = 0.9)]
    pub reduction: f32,

    /// maximum number of coarsening steps
    #[arg(long, default_value_t = 10)]
    pub max_levels: usize,

    /// library size of each feature row after normalization
    #[arg(long, default_value_t = 10_000.0)]
    pub rescale: f32,

    /// diffusion time of the embedding
    #[arg(long, short = 't', default_value_t = 1)]
    pub diffusion_t: usize,

    /// verbosity
    #[arg(long, short)]
    pub verbose: bool,
}

pub fn init_logger(verbose: bool) {
    if verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}

fn read_feature_names(args: &HierarchyInputArgs, n_features: usize) -> anyhow::Result<Vec<Box<str>>> {
    let names: Vec<Box<str>> = match &args.row_names {
        Some(file) => read_lines(file)?
            .into_iter()
            .filter(|x| !x.trim().is_empty())
            .map(|x| {
                x.split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string()
                    .into_boxed_str()
            })
            .collect(),
        None => (0..n_features)
            .map(|i| i.to_string().into_boxed_str())
            .collect(),
    };

    if names.len() != n_features {
        anyhow::bail!(
            "{} feature names for {} rows in {}",
            names.len(),
            n_features,
            args.data_file
        );
    }
    Ok(names)
}

/// `k x cells` principal component scores of `log1p(x)`
fn principal_components(x: &CscMat, n_pca: usize) -> anyhow::Result<Mat> {
    let mut x_log = x.clone();
    log1p_inplace(&mut x_log);
    let mut dense = Mat::from(&x_log);
    centre_rows_inplace(&mut dense);

    let rank = n_pca.min(dense.nrows()).min(dense.ncols()).max(1);
    info!("PCA: {} components of [{} x {}]", rank, dense.nrows(), dense.ncols());
    let (_, d, v) = dense.rsvd(rank)?;

    // (V * diag(d))'
    let mut pcs = v.transpose();
    for (k, mut row) in pcs.row_iter_mut().enumerate() {
        row *= d[k];
    }
    Ok(pcs)
}

/// Read the data and go through feature selection, PCA, kNN graph,
/// coarsening and the hierarchy fit
pub fn build_hierarchy(args: &HierarchyInputArgs) -> anyhow::Result<Hierarchy> {
    let x = read_mtx(&args.data_file)?;
    info!("Read {} features x {} cells", x.nrows(), x.ncols());

    let names = read_feature_names(args, x.nrows())?;

    let selection = match &args.feature_list {
        Some(file) => {
            let wanted: Vec<Box<str>> = read_lines(file)?
                .into_iter()
                .map(|x| x.trim().to_string().into_boxed_str())
                .filter(|x| !x.is_empty())
                .collect();
            select_features_by_name(&names, &wanted)?
        }
        None => select_highly_variable_features(&x, &names, args.hvf_percentile)?,
    };
    let x = selection.apply(&x)?;

    let pcs = principal_components(&x, args.n_pca)?;

    let knn = KnnGraph::from_columns(
        &pcs,
        &KnnGraphArgs {
            knn: args.knn,
            reciprocal: args.reciprocal,
        },
    )?;
    let graph = knn.affinity()?;
    info!("kNN graph: {} nodes, {} edges", knn.num_nodes(), knn.num_edges());

    let coarsening = HeavyEdgeCoarsening::new(CoarsenArgs {
        reduction: args.reduction,
        max_levels: args.max_levels,
        ..CoarsenArgs::default()
    })
    .coarsen(&graph)?;
    info!("Coarsened into levels of {:?} nodes", coarsening.level_sizes());

    HierarchyBuilder::from_coarsening(coarsening)
        .with_features(x, selection.selected_names)
        .with_rescale(args.rescale)
        .fit()
}
