//! Tree node storage for the batched search.
//!
//! Nodes live in an arena ([`crate::tree::Tree`]) and reference each other
//! by index, which keeps ownership a simple arborescence and lets traversal
//! hold lightweight handles to nodes the tree already owns.

use rustc_hash::FxHashMap;
use xhot_core::Player;

/// Index into the node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One vertex of a search tree.
///
/// `value_prefix` is the discounted-reward prefix the external model
/// predicted when this node was expanded; the one-step reward of the edge
/// into this node is recovered as `value_prefix - parent_value_prefix`,
/// unless the parent carries `is_reset` (the model's reward accumulator was
/// reinitialised there), in which case `value_prefix` is the reward itself.
#[derive(Clone, Debug)]
pub struct Node {
    /// Probability from the parent's softmaxed policy slice.
    pub prior: f32,

    /// Times this node appeared on a completed search path.
    pub visit_count: u32,

    /// Accumulated bootstrap values; Q = value_sum / visit_count.
    pub value_sum: f64,

    /// Discounted-reward prefix returned by the model at expansion.
    pub value_prefix: f32,

    /// The parent's value prefix, cached during backpropagation.
    pub parent_value_prefix: f32,

    /// Whether the model reset its reward accumulator at this step.
    /// When set, children treat their own `value_prefix` as the reward.
    pub is_reset: bool,

    /// Side to move at this node; set at expansion.
    pub to_play: Player,

    /// Depth index into the external latent-state tensor (-1 before
    /// expansion).
    pub current_latent_state_index: i32,

    /// Which batch element produced this subtree (-1 before expansion).
    pub batch_index: i32,

    /// Legal per-head action indices. Empty until expansion, at which point
    /// an empty list defaults to the full policy range.
    pub legal_actions: Vec<u32>,

    /// Last selected x-hot action (all `-1` until a child is chosen).
    pub best_action: Vec<i32>,

    /// Sparse children table keyed by encoded x-hot action.
    pub children: FxHashMap<u64, NodeId>,
}

impl Node {
    /// Create an unexpanded node.
    pub fn new(prior: f32, legal_actions: Vec<u32>, num_heads: usize) -> Self {
        Self {
            prior,
            visit_count: 0,
            value_sum: 0.0,
            value_prefix: 0.0,
            parent_value_prefix: 0.0,
            is_reset: false,
            to_play: Player::Bot,
            current_latent_state_index: -1,
            batch_index: -1,
            legal_actions,
            best_action: vec![-1; num_heads],
            children: FxHashMap::default(),
        }
    }

    /// Mean accumulated value, 0 if unvisited.
    pub fn value(&self) -> f64 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f64
        }
    }

    /// A node is expanded iff it has children.
    pub fn expanded(&self) -> bool {
        !self.children.is_empty()
    }
}
