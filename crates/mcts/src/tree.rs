//! Arena-allocated search tree.
//!
//! Nodes are stored in a contiguous vector and referenced by [`NodeId`].
//! Each node exclusively owns its children; dropping the tree drops every
//! subtree at once, and traversal can record plain indices without touching
//! ownership.

use crate::minmax::MinMaxStats;
use crate::node::{Node, NodeId};
use xhot_core::{ActionSpace, Player, Result, SearchError};

/// Arena of search nodes sharing one x-hot action layout.
#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    space: ActionSpace,
}

impl Tree {
    pub fn new(space: ActionSpace) -> Self {
        Self {
            nodes: Vec::new(),
            space,
        }
    }

    pub fn action_space(&self) -> ActionSpace {
        self.space
    }

    /// Add a node to the arena, returning its handle.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get a reference to a node.
    ///
    /// # Panics
    /// Panics if the NodeId is invalid.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Get a mutable reference to a node.
    ///
    /// # Panics
    /// Panics if the NodeId is invalid.
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node, keeping the arena for reuse.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Look up the child reached by an encoded action key.
    pub fn child(&self, id: NodeId, key: u64) -> Option<NodeId> {
        self.get(id).children.get(&key).copied()
    }

    /// Look up the child reached by an x-hot action vector.
    ///
    /// Returns `None` when the vector does not span every head or no child
    /// exists for the encoded key; a correct traversal never observes either.
    pub fn child_for(&self, id: NodeId, actions: &[i32]) -> Option<NodeId> {
        if actions.len() != self.space.num_heads() {
            return None;
        }
        self.child(id, self.space.encode(actions))
    }

    /// Expand a node: store its model outputs and create one child per legal
    /// action, with priors from a numerically stable softmax over the legal
    /// slice of `policy_logits`.
    ///
    /// An empty legal-actions list defaults to the full policy range.
    /// Children start with an empty list of their own; legality is re-derived
    /// from the policy length at their expansion.
    ///
    /// # Errors
    /// Returns `LegalActionOutOfRange` if any legal action index falls
    /// outside `0..policy_logits.len()`; the node is left untouched.
    pub fn expand(
        &mut self,
        id: NodeId,
        to_play: Player,
        current_latent_state_index: i32,
        batch_index: i32,
        value_prefix: f32,
        policy_logits: &[f32],
    ) -> Result<()> {
        let limit = policy_logits.len();

        let legal_actions: Vec<u32> = if self.get(id).legal_actions.is_empty() {
            (0..limit as u32).collect()
        } else {
            self.get(id).legal_actions.clone()
        };
        for &a in &legal_actions {
            if a as usize >= limit {
                return Err(SearchError::LegalActionOutOfRange { action: a, limit });
            }
        }

        // Stable softmax over the legal slice: shift by the max logit before
        // exponentiating.
        let mut policy_max = f32::NEG_INFINITY;
        for &a in &legal_actions {
            policy_max = policy_max.max(policy_logits[a as usize]);
        }
        let exps: Vec<f32> = legal_actions
            .iter()
            .map(|&a| (policy_logits[a as usize] - policy_max).exp())
            .collect();
        let policy_sum: f32 = exps.iter().sum();

        let num_heads = self.space.num_heads();
        for (&a, &e) in legal_actions.iter().zip(exps.iter()) {
            let child = self.add(Node::new(e / policy_sum, Vec::new(), num_heads));
            self.get_mut(id).children.insert(a as u64, child);
        }

        let node = self.get_mut(id);
        node.to_play = to_play;
        node.current_latent_state_index = current_latent_state_index;
        node.batch_index = batch_index;
        node.value_prefix = value_prefix;
        node.legal_actions = legal_actions;
        Ok(())
    }

    /// Mix externally sampled Dirichlet noise into the children's priors:
    /// `prior <- (1 - fraction) * prior + fraction * noise`.
    ///
    /// # Errors
    /// Returns `BatchSizeMismatch` if the noise vector does not cover every
    /// legal action.
    pub fn add_exploration_noise(
        &mut self,
        id: NodeId,
        exploration_fraction: f32,
        noises: &[f32],
    ) -> Result<()> {
        let legal = self.get(id).legal_actions.clone();
        if noises.len() != legal.len() {
            return Err(SearchError::BatchSizeMismatch {
                what: "root noise",
                expected: legal.len(),
                got: noises.len(),
            });
        }

        for (&a, &noise) in legal.iter().zip(noises.iter()) {
            let child_id = self
                .child(id, a as u64)
                .expect("BUG: expanded node missing child for legal action");
            let child = self.get_mut(child_id);
            child.prior = child.prior * (1.0 - exploration_fraction) + noise * exploration_fraction;
        }
        Ok(())
    }

    /// Mean Q over the node's visited children.
    ///
    /// Each visited child contributes `qsa = true_reward + discount * Q`,
    /// with the reward recovered from the value-prefix difference (or taken
    /// verbatim when this node is reset). At the root the result is the pure
    /// mean; elsewhere the parent's Q contributes one pseudo-visit.
    pub fn compute_mean_q(&self, id: NodeId, is_root: bool, parent_q: f32, discount: f32) -> f32 {
        let node = self.get(id);
        let parent_value_prefix = node.value_prefix;

        let mut total_unsigned_q = 0.0f32;
        let mut total_visits = 0u32;
        for &child_id in node.children.values() {
            let child = self.get(child_id);
            if child.visit_count > 0 {
                let mut true_reward = child.value_prefix - parent_value_prefix;
                if node.is_reset {
                    true_reward = child.value_prefix;
                }
                total_unsigned_q += true_reward + discount * child.value() as f32;
                total_visits += 1;
            }
        }

        if is_root && total_visits > 0 {
            total_unsigned_q / total_visits as f32
        } else {
            (parent_q + total_unsigned_q) / (total_visits + 1) as f32
        }
    }

    /// Follow `best_action` links downward, collecting the current best
    /// trajectory of x-hot actions.
    pub fn trajectory(&self, id: NodeId) -> Vec<Vec<i32>> {
        let mut traj = Vec::new();
        let mut current = id;
        loop {
            let best = self.get(current).best_action.clone();
            if best.first().map_or(true, |&a| a < 0) {
                break;
            }
            current = self
                .child_for(current, &best)
                .expect("BUG: best_action points at a missing child");
            traj.push(best);
        }
        traj
    }

    /// Visit counts of the children indexed by the node's legal actions;
    /// empty if the node is unexpanded.
    pub fn children_distribution(&self, id: NodeId) -> Vec<u32> {
        let node = self.get(id);
        if !node.expanded() {
            return Vec::new();
        }
        node.legal_actions
            .iter()
            .map(|&a| {
                let child_id = self
                    .child(id, a as u64)
                    .expect("BUG: expanded node missing child for legal action");
                self.get(child_id).visit_count
            })
            .collect()
    }

    /// Refresh the min-max extrema from an entire subtree.
    ///
    /// Walks depth-first from `root`, caching each expanded child's
    /// `parent_value_prefix` and submitting every interior node's reset-aware
    /// `qsa` to `stats`. In self-play (`players == 2`) the child value enters
    /// with flipped sign, mirroring the selection-time value score.
    pub fn update_q(
        &mut self,
        root: NodeId,
        stats: &mut MinMaxStats,
        discount: f32,
        players: usize,
    ) {
        let mut stack: Vec<(NodeId, bool)> = vec![(root, false)];
        while let Some((id, parent_is_reset)) = stack.pop() {
            if id != root {
                let node = self.get(id);
                let mut true_reward = node.value_prefix - node.parent_value_prefix;
                if parent_is_reset {
                    true_reward = node.value_prefix;
                }
                let qsa = if players == 1 {
                    true_reward + discount * node.value() as f32
                } else {
                    true_reward + discount * -(node.value() as f32)
                };
                stats.update(qsa);
            }

            let node = self.get(id);
            let value_prefix = node.value_prefix;
            let is_reset = node.is_reset;
            let expanded_children: Vec<NodeId> = node
                .legal_actions
                .iter()
                .filter_map(|&a| self.child(id, a as u64))
                .filter(|&c| self.get(c).expanded())
                .collect();
            for child_id in expanded_children {
                self.get_mut(child_id).parent_value_prefix = value_prefix;
                stack.push((child_id, is_reset));
            }
        }
    }
}
