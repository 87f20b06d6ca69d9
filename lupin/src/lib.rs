//! Layered, user-driven inspection of a coarsened graph.
//!
//! A [`hierarchy::Hierarchy`] summarises a stack of coarsening levels
//! once; an [`selection::ActiveSelection`] then tracks which nodes of
//! which levels are on display and edits that cut interactively.

pub mod block_adjacency;
pub mod coarsen;
pub mod common;
pub mod embed;
pub mod error;
pub mod feature_selection;
pub mod hierarchy;
pub mod lock;
pub mod refine_map;
pub mod selection;
pub mod session;

pub use coarsen::{CoarsenArgs, Coarsening, CoarseningOracle, HeavyEdgeCoarsening};
pub use embed::{DiffusionMap, DiffusionMapArgs, EmbeddingOracle};
pub use error::HierarchyError;
pub use hierarchy::{Hierarchy, HierarchyBuilder};
pub use lock::InteractionLock;
pub use refine_map::{CoarsenAssignment, RefineMap};
pub use selection::{ActiveSelection, Edit};
pub use session::{FeatureView, Session, View};
