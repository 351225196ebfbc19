//! Fixed-size batch of search roots over one node arena.
//!
//! Every root independently owns its subtree; nothing is shared across batch
//! elements. A container is created per search and dropped with its trees
//! once the top-level decision is made.

use crate::node::{Node, NodeId};
use crate::tree::Tree;
use rand::Rng;
use rand_distr::{Dirichlet, Distribution};
use xhot_core::{players_from_batch, ActionSpace, Result, SearchError};

/// A batch of `N` root nodes and the arena holding their subtrees.
#[derive(Clone, Debug)]
pub struct Roots {
    tree: Tree,
    roots: Vec<NodeId>,
    legal_actions_list: Vec<Vec<u32>>,
}

impl Roots {
    /// Create `root_num` fresh roots, one per batch element, each carrying
    /// its own legal actions. An empty inner list means "derive legality
    /// from the policy length at expansion".
    ///
    /// # Errors
    /// Returns `BatchSizeMismatch` if the legal-actions list does not cover
    /// every root.
    pub fn new(
        root_num: usize,
        space: ActionSpace,
        legal_actions_list: Vec<Vec<u32>>,
    ) -> Result<Self> {
        if legal_actions_list.len() != root_num {
            return Err(SearchError::BatchSizeMismatch {
                what: "legal_actions_list",
                expected: root_num,
                got: legal_actions_list.len(),
            });
        }

        let mut tree = Tree::new(space);
        let roots = legal_actions_list
            .iter()
            .map(|legal| tree.add(Node::new(0.0, legal.clone(), space.num_heads())))
            .collect();

        Ok(Self {
            tree,
            roots,
            legal_actions_list,
        })
    }

    /// Number of batch elements.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn action_space(&self) -> ActionSpace {
        self.tree.action_space()
    }

    /// Handle of the `i`-th root.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn root_id(&self, i: usize) -> NodeId {
        self.roots[i]
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    fn check_len<T>(&self, what: &'static str, batch: &[T]) -> Result<()> {
        if batch.len() != self.roots.len() {
            return Err(SearchError::BatchSizeMismatch {
                what,
                expected: self.roots.len(),
                got: batch.len(),
            });
        }
        Ok(())
    }

    /// Expand every root from its model outputs, mix in exploration noise
    /// and mark each root visited once.
    ///
    /// The noise is supplied by the caller (see [`Roots::sample_root_noise`])
    /// so that searches stay reproducible under an injected RNG.
    pub fn prepare(
        &mut self,
        root_noise_weight: f32,
        noises: &[Vec<f32>],
        value_prefixes: &[f32],
        policies: &[Vec<f32>],
        to_play_batch: &[i32],
    ) -> Result<()> {
        self.check_len("noises", noises)?;
        self.prepare_inner(Some((root_noise_weight, noises)), value_prefixes, policies, to_play_batch)
    }

    /// Expand every root without exploration noise and mark it visited once.
    pub fn prepare_no_noise(
        &mut self,
        value_prefixes: &[f32],
        policies: &[Vec<f32>],
        to_play_batch: &[i32],
    ) -> Result<()> {
        self.prepare_inner(None, value_prefixes, policies, to_play_batch)
    }

    fn prepare_inner(
        &mut self,
        noise: Option<(f32, &[Vec<f32>])>,
        value_prefixes: &[f32],
        policies: &[Vec<f32>],
        to_play_batch: &[i32],
    ) -> Result<()> {
        self.check_len("value_prefixes", value_prefixes)?;
        self.check_len("policies", policies)?;
        self.check_len("to_play_batch", to_play_batch)?;
        let players = players_from_batch(to_play_batch)?;

        for i in 0..self.roots.len() {
            let root = self.roots[i];
            self.tree
                .expand(root, players[i], 0, i as i32, value_prefixes[i], &policies[i])?;
            if let Some((weight, noises)) = noise {
                self.tree.add_exploration_noise(root, weight, &noises[i])?;
            }
            self.tree.get_mut(root).visit_count += 1;
        }
        Ok(())
    }

    /// Drop every subtree and recreate fresh unexpanded roots for reuse.
    pub fn clear(&mut self) {
        let space = self.tree.action_space();
        self.tree.clear();
        self.roots = self
            .legal_actions_list
            .iter()
            .map(|legal| {
                self.tree
                    .add(Node::new(0.0, legal.clone(), space.num_heads()))
            })
            .collect();
    }

    /// Per-root visit counts of the root children, indexed by legal action.
    pub fn get_distributions(&self) -> Vec<Vec<u32>> {
        self.roots
            .iter()
            .map(|&r| self.tree.children_distribution(r))
            .collect()
    }

    /// Per-root value estimates.
    pub fn get_values(&self) -> Vec<f64> {
        self.roots.iter().map(|&r| self.tree.get(r).value()).collect()
    }

    /// Per-root best trajectories of x-hot actions.
    pub fn get_trajectories(&self) -> Vec<Vec<Vec<i32>>> {
        self.roots
            .iter()
            .map(|&r| self.tree.trajectory(r))
            .collect()
    }

    /// Sample one Dirichlet(alpha) noise vector per root, sized to the
    /// root's legal actions (or to the policy length when legality defaults
    /// at expansion).
    ///
    /// # Errors
    /// Returns `InvalidDirichletAlpha` when `alpha` is not finite and
    /// positive.
    pub fn sample_root_noise<R: Rng>(
        &self,
        alpha: f32,
        policies: &[Vec<f32>],
        rng: &mut R,
    ) -> Result<Vec<Vec<f32>>> {
        self.check_len("policies", policies)?;
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(SearchError::InvalidDirichletAlpha(alpha));
        }

        let mut noises = Vec::with_capacity(self.roots.len());
        for (legal, policy) in self.legal_actions_list.iter().zip(policies.iter()) {
            let n = if legal.is_empty() {
                policy.len()
            } else {
                legal.len()
            };
            // Dirichlet needs at least two components.
            if n < 2 {
                noises.push(vec![1.0; n]);
                continue;
            }
            let alphas = vec![alpha; n];
            let dirichlet = Dirichlet::new(&alphas)
                .map_err(|_| SearchError::InvalidDirichletAlpha(alpha))?;
            noises.push(dirichlet.sample(rng));
        }
        Ok(noises)
    }
}
