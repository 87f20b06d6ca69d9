use crate::lupin_input::*;
use clap::Args;
use lupin::common::*;
use lupin::{ActiveSelection, DiffusionMap, DiffusionMapArgs, Hierarchy, Session, View};
use matrix_util::common_io::{mkdir, write_lines};
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub input: HierarchyInputArgs,

    /// Output header
    #[arg(long, short, required = true)]
    pub out: Box<str>,
}

/// `level  size  total_weight  edges`, one line per level
pub fn level_summary(hierarchy: &Hierarchy) -> Vec<String> {
    let mut lines = vec!["level\tsize\ttotal_weight\tedges".to_string()];
    lines.extend((0..hierarchy.n_levels()).map(|l| {
        let total: f32 = hierarchy.node_weights(l).iter().sum();
        format!(
            "{}\t{}\t{}\t{}",
            l,
            hierarchy.level_size(l),
            total,
            hierarchy.n_edges(l)
        )
    }));
    lines
}

/// `x  y  weight  level  node`, one line per active node
pub fn view_lines(selection: &ActiveSelection, view: &View) -> Vec<String> {
    let mut lines = vec!["x\ty\tweight\tlevel\tnode".to_string()];
    let located = (0..selection.n_active()).filter_map(|i| selection.locate(i));
    for (i, (level, node)) in located.enumerate() {
        lines.push(format!(
            "{}\t{}\t{}\t{}\t{}",
            view.coords[(i, 0)],
            view.coords[(i, 1)],
            view.weights[i],
            level,
            node
        ));
    }
    lines
}

pub fn run_build(args: &BuildArgs) -> anyhow::Result<()> {
    init_logger(args.input.verbose);
    write_build_outputs(args)?;
    Ok(())
}

/// Build the hierarchy and write `{out}.levels.tsv` and `{out}.coords.tsv`
fn write_build_outputs(args: &BuildArgs) -> anyhow::Result<(String, String)> {
    let hierarchy = Arc::new(build_hierarchy(&args.input)?);

    let levels_file = format!("{}.levels.tsv", args.out);
    mkdir(&levels_file)?;
    write_lines(&level_summary(&hierarchy), &levels_file)?;
    info!("Wrote {}", levels_file);

    let embedder = DiffusionMap::new(DiffusionMapArgs {
        t: args.input.diffusion_t,
    });
    let session = Session::new(hierarchy, Box::new(embedder));
    let view = session.view()?;

    let coords_file = format!("{}.coords.tsv", args.out);
    write_lines(&view_lines(&session.selection(), &view), &coords_file)?;
    info!("Wrote {}", coords_file);

    Ok((levels_file, coords_file))
}
