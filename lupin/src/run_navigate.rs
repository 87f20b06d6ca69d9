use crate::lupin_input::*;
use crate::run_build::{level_summary, view_lines};
use clap::Args;
use lupin::common::*;
use lupin::{DiffusionMap, DiffusionMapArgs, Edit, Session, View};
use matrix_util::common_io::write_lines;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct NavigateArgs {
    #[command(flatten)]
    pub input: HierarchyInputArgs,

    /// read commands from this file instead of stdin
    #[arg(long)]
    pub script: Option<Box<str>>,
}

const HELP: &str = "\
commands (positions refer to the current display order):
  expand i j ...        refine the selected nodes, keep the rest
  zoom i j ...          refine the selected nodes, drop the rest
  filter i j ...        drop the selected nodes
  reset                 back to the coarsest level
  status                nodes per level and total weight
  levels                size, weight and edges of every level
  color-features g ...  score active nodes by features (names or indices)
  color-nodes i j ...   score features by the selected nodes
  features              embed the features over the active nodes
  save <file>           write the current coordinates
  quit";

enum Flow {
    Continue,
    Quit,
}

/// Positions that parse as unsigned integers; anything else is reported
fn parse_positions(words: &[&str]) -> Vec<usize> {
    words
        .iter()
        .filter_map(|w| match w.parse::<usize>() {
            Ok(i) => Some(i),
            Err(_) => {
                warn!("skipping `{}`: not a position", w);
                None
            }
        })
        .collect()
}

fn report_edit(out: &mut impl Write, edit: Edit, view: &View) -> anyhow::Result<()> {
    match edit {
        Edit::Applied { n_active } => writeln!(
            out,
            "{} active nodes, per level {:?}, total weight {}",
            n_active,
            view.level_counts,
            view.weights.iter().sum::<f32>()
        )?,
        Edit::NoSelection => writeln!(out, "nothing selected; no change")?,
    }
    Ok(())
}

fn handle(session: &Session, line: &str, out: &mut impl Write) -> anyhow::Result<Flow> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&cmd, rest)) = words.split_first() else {
        return Ok(Flow::Continue);
    };

    match cmd {
        "expand" | "zoom" | "filter" => {
            let flat = parse_positions(rest);
            let (edit, view) = match cmd {
                "expand" => session.expand(&flat)?,
                "zoom" => session.zoom(&flat)?,
                _ => session.filter(&flat)?,
            };
            report_edit(out, edit, &view)?;
        }
        "reset" => {
            let view = session.reset()?;
            report_edit(
                out,
                Edit::Applied {
                    n_active: view.weights.len(),
                },
                &view,
            )?;
        }
        "status" => {
            let selection = session.selection();
            writeln!(
                out,
                "{} active nodes, per level {:?}, total weight {}",
                selection.n_active(),
                selection.level_counts(),
                selection.total_weight()
            )?;
        }
        "levels" => {
            for l in level_summary(session.selection().hierarchy()) {
                writeln!(out, "{}", l)?;
            }
        }
        "color-features" => {
            let hierarchy = session.selection().hierarchy().clone();
            let features: Vec<usize> = rest
                .iter()
                .filter_map(|w| {
                    let g = hierarchy.feature_index(w).or_else(|| w.parse().ok());
                    if g.is_none() {
                        warn!("unknown feature `{}`", w);
                    }
                    g
                })
                .collect();
            let scores = session.color_by_features(&features)?;
            for (i, s) in scores.iter().enumerate() {
                writeln!(out, "{}\t{}", i, s)?;
            }
        }
        "color-nodes" => {
            let profile = session.color_by_nodes(&parse_positions(rest))?;
            let hierarchy = session.selection().hierarchy().clone();
            for (name, s) in hierarchy.feature_names().iter().zip(profile) {
                writeln!(out, "{}\t{}", name, s)?;
            }
        }
        "features" => {
            let (fv, totals) = session.feature_view()?;
            for (k, name) in fv.names.iter().enumerate() {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    name,
                    fv.coords[(k, 0)],
                    fv.coords[(k, 1)],
                    totals[k]
                )?;
            }
        }
        "save" => {
            let Some(&file) = rest.first() else {
                anyhow::bail!("save needs a file name");
            };
            let view = session.view()?;
            write_lines(&view_lines(&session.selection(), &view), file)?;
            writeln!(out, "wrote {}", file)?;
        }
        "help" | "?" => writeln!(out, "{}", HELP)?,
        "quit" | "exit" | "q" => return Ok(Flow::Quit),
        _ => writeln!(out, "unknown command `{}`; try `help`", cmd)?,
    }
    Ok(Flow::Continue)
}

fn run_loop(session: &Session, input: impl BufRead, out: &mut impl Write) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line?;
        match handle(session, line.trim(), out) {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => writeln!(out, "error: {}", e)?,
        }
        out.flush()?;
    }
    Ok(())
}

pub fn run_navigate(args: &NavigateArgs) -> anyhow::Result<()> {
    init_logger(args.input.verbose);

    let hierarchy = Arc::new(build_hierarchy(&args.input)?);
    let embedder = DiffusionMap::new(DiffusionMapArgs {
        t: args.input.diffusion_t,
    });
    let session = Session::new(hierarchy, Box::new(embedder));

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let view = session.view()?;
    writeln!(out, "{}", HELP)?;
    report_edit(
        &mut out,
        Edit::Applied {
            n_active: view.weights.len(),
        },
        &view,
    )?;

    match &args.script {
        Some(file) => run_loop(
            &session,
            matrix_util::common_io::open_buf_reader(file)?,
            &mut out,
        ),
        None => run_loop(&session, io::stdin().lock(), &mut out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lupin::common::CscMat;
    use lupin::refine_map::{CoarsenAssignment, RefineMap};
    use lupin::HierarchyBuilder;

    fn toy_session() -> anyhow::Result<Session> {
        let a0 = CoarsenAssignment::from_groups(4, &[vec![0, 1], vec![2, 3]])?;
        let r0 = RefineMap::from_assignment(&a0);
        let triplets: Vec<(usize, usize, f32)> = (0..r0.n_coarse())
            .flat_map(|k| r0.expand(k).map(move |i| (k, i, 1.0)))
            .collect();
        let c0 = CscMat::from_nonzero_triplets(2, 4, triplets)?;
        let g0 = CscMat::from_nonzero_triplets(
            4,
            4,
            vec![(0, 1, 1.0), (1, 0, 1.0), (2, 3, 1.0), (3, 2, 1.0)],
        )?;
        let h = HierarchyBuilder::new(vec![g0, CscMat::zeros(2, 2)], vec![a0], vec![c0]).fit()?;
        Ok(Session::new(Arc::new(h), Box::new(DiffusionMap::default())))
    }

    #[test]
    fn positions_skip_garbage() {
        assert_eq!(parse_positions(&["3", "x", "0"]), vec![3, 0]);
    }

    #[test]
    fn scripted_session() -> anyhow::Result<()> {
        let session = toy_session()?;
        let script = "status\nexpand 0\nbogus\nreset\nquit\nexpand 1\n";
        let mut out = Vec::new();
        run_loop(&session, script.as_bytes(), &mut out)?;

        let text = String::from_utf8(out)?;
        assert!(text.contains("2 active nodes, per level [0, 2]"));
        assert!(text.contains("3 active nodes, per level [2, 1]"));
        assert!(text.contains("unknown command `bogus`"));
        // nothing after quit runs
        assert_eq!(session.selection().level_counts(), vec![0, 2]);
        Ok(())
    }
}
