use crate::common::*;
use crate::embed::EmbeddingOracle;
use crate::hierarchy::Hierarchy;
use crate::lock::InteractionLock;
use crate::selection::{min_max_scale, ActiveSelection, Edit};
use std::cell::{Ref, RefCell};
use std::sync::Arc;

/// What the display needs after every interaction
pub struct View {
    /// `n_active x 2`
    pub coords: Mat,
    /// node weights, aligned with `coords` rows
    pub weights: Vec<f32>,
    pub level_counts: Vec<usize>,
}

/// Features laid out on their own canvas
pub struct FeatureView {
    /// feature rows that made it into `coords`
    pub features: Vec<usize>,
    pub names: Vec<Box<str>>,
    pub coords: Mat,
}

/// The object UI callbacks talk to.
///
/// Every entry point takes the interaction lock first, so a callback
/// fired while another is still running is rejected with
/// [`HierarchyError::Locked`]. Edits are staged on a copy of the active
/// set and committed only after the new view is ready.
pub struct Session {
    selection: RefCell<ActiveSelection>,
    lock: InteractionLock,
    embedder: Box<dyn EmbeddingOracle>,
}

impl Session {
    pub fn new(hierarchy: Arc<Hierarchy>, embedder: Box<dyn EmbeddingOracle>) -> Self {
        Self {
            selection: RefCell::new(ActiveSelection::new(hierarchy)),
            lock: InteractionLock::new(),
            embedder,
        }
    }

    pub fn lock(&self) -> &InteractionLock {
        &self.lock
    }

    pub fn selection(&self) -> Ref<'_, ActiveSelection> {
        self.selection.borrow()
    }

    fn render(&self, selection: &ActiveSelection) -> anyhow::Result<View> {
        let adj = selection.combined_adjacency()?;
        let coords = self.embedder.embed_affinity(&adj)?;
        Ok(View {
            coords,
            weights: selection.node_weights(),
            level_counts: selection.level_counts(),
        })
    }

    fn edit<F>(&self, apply: F) -> anyhow::Result<(Edit, View)>
    where
        F: FnOnce(&mut ActiveSelection) -> anyhow::Result<Edit>,
    {
        let _guard = self.lock.acquire()?;
        let mut staged = self.selection.borrow().clone();
        let outcome = apply(&mut staged)?;
        let view = self.render(&staged)?;
        *self.selection.borrow_mut() = staged;
        Ok((outcome, view))
    }

    /// Reveal finer detail under the selected nodes, keeping the rest
    pub fn expand(&self, flat: &[usize]) -> anyhow::Result<(Edit, View)> {
        self.edit(|s| s.refine(flat, false))
    }

    /// Refine the selected nodes and discard everything else
    pub fn zoom(&self, flat: &[usize]) -> anyhow::Result<(Edit, View)> {
        self.edit(|s| s.refine(flat, true))
    }

    pub fn filter(&self, flat: &[usize]) -> anyhow::Result<(Edit, View)> {
        self.edit(|s| s.remove(flat))
    }

    pub fn reset(&self) -> anyhow::Result<View> {
        let (_, view) = self.edit(|s| {
            s.reset();
            Ok(Edit::Applied {
                n_active: s.n_active(),
            })
        })?;
        Ok(view)
    }

    pub fn view(&self) -> anyhow::Result<View> {
        let _guard = self.lock.acquire()?;
        self.render(&self.selection.borrow())
    }

    /// Color of each active node by the chosen features
    pub fn color_by_features(&self, features: &[usize]) -> anyhow::Result<Vec<f32>> {
        let _guard = self.lock.acquire()?;
        self.selection.borrow().feature_scores(features)
    }

    /// Color of each feature by the chosen active nodes
    pub fn color_by_nodes(&self, flat: &[usize]) -> anyhow::Result<Vec<f32>> {
        let _guard = self.lock.acquire()?;
        self.selection.borrow().node_group_profile(flat)
    }

    /// Embedding of the features over the active nodes, with each
    /// feature's total expression scaled to [0, 1]
    pub fn feature_view(&self) -> anyhow::Result<(FeatureView, Vec<f32>)> {
        let _guard = self.lock.acquire()?;
        let selection = self.selection.borrow();
        let x = selection.feature_matrix()?;
        let (features, coords) = self.embedder.embed_features(&x)?;

        let names = selection.hierarchy().feature_names();
        let names = features.iter().map(|&g| names[g].clone()).collect();

        let totals = x.row_sums();
        let mut totals: Vec<f32> = features.iter().map(|&g| totals[g]).collect();
        min_max_scale(&mut totals);

        Ok((
            FeatureView {
                features,
                names,
                coords,
            },
            totals,
        ))
    }
}
