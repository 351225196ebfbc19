//! PUCT selection, batched traversal and backpropagation.
//!
//! One simulation touches every batch element: [`batch_traverse`] descends
//! each root to an unexpanded leaf, the caller runs one batched inference on
//! those leaves, and [`batch_backpropagate`] expands them and pushes the
//! bootstrap values back to the roots.

use crate::config::SearchConfig;
use crate::minmax::{MinMaxStats, MinMaxStatsList};
use crate::node::{Node, NodeId};
use crate::roots::Roots;
use crate::tree::Tree;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{SystemTime, UNIX_EPOCH};
use xhot_core::{players_from_batch, Player, Result, SearchError};

/// Scores within this distance of the running best are tie-broken uniformly
/// at random.
const TIE_EPSILON: f32 = 1e-6;

/// Per-simulation traversal output for a whole batch.
///
/// Populated by [`batch_traverse`]; consumed by the external inference call
/// and [`batch_backpropagate`].
#[derive(Clone, Debug, Default)]
pub struct SearchResults {
    num: usize,
    /// Root-to-leaf node handles, one path per batch element.
    pub search_paths: Vec<Vec<NodeId>>,
    /// Depth index of each leaf's parent in the external latent-state tensor.
    pub latent_state_index_in_search_path: Vec<i32>,
    /// Batch index of each leaf's parent in the external latent-state tensor.
    pub latent_state_index_in_batch: Vec<i32>,
    /// The x-hot action that reached each leaf.
    pub last_actions: Vec<Vec<i32>>,
    /// Descent length per batch element.
    pub search_lens: Vec<usize>,
    /// Side to move at each leaf after two-player flipping (wire encoding).
    pub virtual_to_play: Vec<i32>,
    /// The unexpanded leaf reached per batch element.
    pub nodes: Vec<NodeId>,
}

impl SearchResults {
    pub fn new(num: usize) -> Self {
        Self {
            num,
            search_paths: Vec::with_capacity(num),
            latent_state_index_in_search_path: Vec::with_capacity(num),
            latent_state_index_in_batch: Vec::with_capacity(num),
            last_actions: Vec::with_capacity(num),
            search_lens: Vec::with_capacity(num),
            virtual_to_play: Vec::with_capacity(num),
            nodes: Vec::with_capacity(num),
        }
    }

    pub fn num(&self) -> usize {
        self.num
    }

    fn reset(&mut self) {
        self.search_paths.clear();
        self.latent_state_index_in_search_path.clear();
        self.latent_state_index_in_batch.clear();
        self.last_actions.clear();
        self.search_lens.clear();
        self.virtual_to_play.clear();
        self.nodes.clear();
    }
}

/// PUCT score of one child.
///
/// The prior term decays with the child's visits and grows with the parent's
/// total; the value term is the child's reset-aware one-step reward plus its
/// discounted Q (sign-flipped in self-play), min-max normalized and clamped
/// into [0, 1]. Unvisited children fall back to the parent's mean Q.
#[allow(clippy::too_many_arguments)]
pub fn ucb_score(
    child: &Node,
    min_max_stats: &MinMaxStats,
    parent_mean_q: f32,
    parent_is_reset: bool,
    total_children_visit_counts: f32,
    parent_value_prefix: f32,
    pb_c_base: f32,
    pb_c_init: f32,
    discount: f32,
    players: usize,
) -> f32 {
    let mut pb_c = ((total_children_visit_counts + pb_c_base + 1.0) / pb_c_base).ln() + pb_c_init;
    pb_c *= total_children_visit_counts.sqrt() / (child.visit_count as f32 + 1.0);
    let prior_score = pb_c * child.prior;

    let value_score = if child.visit_count == 0 {
        parent_mean_q
    } else {
        let mut true_reward = child.value_prefix - parent_value_prefix;
        if parent_is_reset {
            true_reward = child.value_prefix;
        }
        if players == 1 {
            true_reward + discount * child.value() as f32
        } else {
            true_reward + discount * -(child.value() as f32)
        }
    };
    let value_score = min_max_stats.normalize(value_score).clamp(0.0, 1.0);

    prior_score + value_score
}

/// Select a child of an expanded node by PUCT score.
///
/// Returns an x-hot action vector with the chosen per-head index in slot 0
/// and `-1` sentinels elsewhere; only the first head is driven by selection.
pub fn select_child<R: Rng>(
    tree: &Tree,
    id: NodeId,
    min_max_stats: &MinMaxStats,
    config: &SearchConfig,
    mean_q: f32,
    players: usize,
    rng: &mut R,
) -> Vec<i32> {
    let node = tree.get(id);
    // The node's own visit from `prepare` does not count towards its
    // children.
    let total_children_visit_counts = node.visit_count.saturating_sub(1) as f32;

    let mut max_score = f32::NEG_INFINITY;
    let mut candidates: Vec<u32> = Vec::new();
    for &a in &node.legal_actions {
        let child_id = tree
            .child(id, a as u64)
            .expect("BUG: expanded node missing child for legal action");
        let score = ucb_score(
            tree.get(child_id),
            min_max_stats,
            mean_q,
            node.is_reset,
            total_children_visit_counts,
            node.value_prefix,
            config.pb_c_base,
            config.pb_c_init,
            config.discount,
            players,
        );
        if score > max_score {
            max_score = score;
            candidates.clear();
            candidates.push(a);
        } else if score >= max_score - TIE_EPSILON {
            candidates.push(a);
        }
    }

    let mut action = tree.action_space().sentinel();
    if !candidates.is_empty() {
        action[0] = candidates[rng.gen_range(0..candidates.len())] as i32;
    }
    action
}

/// Descend every root to an unexpanded leaf, seeding the tie-break RNG from
/// the wall clock.
pub fn batch_traverse(
    roots: &mut Roots,
    config: &SearchConfig,
    min_max_stats: &MinMaxStatsList,
    results: &mut SearchResults,
    virtual_to_play_batch: &[i32],
) -> Result<()> {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    batch_traverse_with(roots, config, min_max_stats, results, virtual_to_play_batch, &mut rng)
}

/// [`batch_traverse`] with an injected tie-break RNG, for reproducible
/// searches.
///
/// For each batch element, follows PUCT from the root until an unexpanded
/// node is reached, recording the search path, the leaf, the action that
/// reached it and the leaf parent's latent-state indices. In self-play the
/// side to move flips at every step; play-with-bot mode is selected when any
/// batch entry is `-1`.
pub fn batch_traverse_with<R: Rng>(
    roots: &mut Roots,
    config: &SearchConfig,
    min_max_stats: &MinMaxStatsList,
    results: &mut SearchResults,
    virtual_to_play_batch: &[i32],
    rng: &mut R,
) -> Result<()> {
    let num = roots.len();
    if results.num() != num {
        return Err(SearchError::BatchSizeMismatch {
            what: "search results",
            expected: num,
            got: results.num(),
        });
    }
    if min_max_stats.len() != num {
        return Err(SearchError::BatchSizeMismatch {
            what: "min_max_stats",
            expected: num,
            got: min_max_stats.len(),
        });
    }
    if virtual_to_play_batch.len() != num {
        return Err(SearchError::BatchSizeMismatch {
            what: "virtual_to_play_batch",
            expected: num,
            got: virtual_to_play_batch.len(),
        });
    }
    let to_play = players_from_batch(virtual_to_play_batch)?;
    let players = if to_play.iter().any(|p| !p.is_two_player()) {
        1
    } else {
        2
    };

    results.reset();
    for i in 0..num {
        let mut node_id = roots.root_id(i);
        let mut virtual_to_play = to_play[i];
        let mut is_root = true;
        let mut parent_q = 0.0f32;
        let mut search_len = 0usize;
        let mut last_action = roots.action_space().sentinel();
        let mut path = vec![node_id];

        while roots.tree().get(node_id).expanded() {
            let tree = roots.tree();
            let mean_q = tree.compute_mean_q(node_id, is_root, parent_q, config.discount);
            is_root = false;
            parent_q = mean_q;

            let actions = select_child(
                tree,
                node_id,
                &min_max_stats.stats[i],
                config,
                mean_q,
                players,
                rng,
            );
            if players > 1 {
                virtual_to_play = virtual_to_play.opponent();
            }

            let child = tree
                .child_for(node_id, &actions)
                .expect("BUG: selected action has no child");
            roots.tree_mut().get_mut(node_id).best_action = actions.clone();
            last_action = actions;

            node_id = child;
            path.push(node_id);
            search_len += 1;
        }

        assert!(
            path.len() >= 2,
            "BUG: roots must be prepared before traversal"
        );
        let parent = path[path.len() - 2];
        let tree = roots.tree();
        results
            .latent_state_index_in_search_path
            .push(tree.get(parent).current_latent_state_index);
        results
            .latent_state_index_in_batch
            .push(tree.get(parent).batch_index);
        results.search_lens.push(search_len);
        results.last_actions.push(last_action);
        results.virtual_to_play.push(virtual_to_play.as_i32());
        results.nodes.push(node_id);
        results.search_paths.push(path);
    }
    Ok(())
}

/// Push a bootstrap value up one search path, leaf to root.
///
/// Every node on the path gains one visit; `value_sum` accumulates the
/// running bootstrap, signed by side in self-play. The min-max extrema are
/// fed the raw prefix-difference reward, while the bootstrap recurrence uses
/// the reset-aware reward. An empty path is a no-op.
pub fn backpropagate(
    tree: &mut Tree,
    search_path: &[NodeId],
    min_max_stats: &mut MinMaxStats,
    to_play: Player,
    value: f32,
    discount: f32,
) {
    if search_path.is_empty() {
        return;
    }

    if !to_play.is_two_player() {
        // Play-with-bot: values live in one fixed perspective.
        let mut bootstrap_value = value;
        for i in (0..search_path.len()).rev() {
            let (parent_value_prefix, parent_is_reset) = if i >= 1 {
                let parent = tree.get(search_path[i - 1]);
                (parent.value_prefix, parent.is_reset)
            } else {
                (0.0, false)
            };

            let node = tree.get_mut(search_path[i]);
            node.value_sum += bootstrap_value as f64;
            node.visit_count += 1;
            node.parent_value_prefix = parent_value_prefix;

            let mut true_reward = node.value_prefix - parent_value_prefix;
            min_max_stats.update(true_reward + discount * node.value() as f32);
            if parent_is_reset {
                true_reward = node.value_prefix;
            }

            bootstrap_value = true_reward + discount * bootstrap_value;
        }
    } else {
        // Self-play: value_sum is signed by side, while value_prefix stays
        // in one fixed perspective and only feeds the reward recovery.
        let mut bootstrap_value = value;
        for i in (0..search_path.len()).rev() {
            let (parent_value_prefix, parent_is_reset) = if i >= 1 {
                let parent = tree.get(search_path[i - 1]);
                (parent.value_prefix, parent.is_reset)
            } else {
                (0.0, false)
            };

            let node = tree.get_mut(search_path[i]);
            let same_side = node.to_play == to_play;
            if same_side {
                node.value_sum += bootstrap_value as f64;
            } else {
                node.value_sum -= bootstrap_value as f64;
            }
            node.visit_count += 1;
            node.parent_value_prefix = parent_value_prefix;

            let mut true_reward = node.value_prefix - parent_value_prefix;
            min_max_stats.update(true_reward + discount * node.value() as f32);
            if parent_is_reset {
                true_reward = node.value_prefix;
            }

            bootstrap_value = if same_side {
                -true_reward + discount * bootstrap_value
            } else {
                true_reward + discount * bootstrap_value
            };
        }
    }
}

/// Expand the traversed leaves from one batched inference and backpropagate
/// the returned values along every search path.
///
/// `current_latent_state_index` is the depth the freshly expanded leaves
/// occupy in the external latent-state tensor (the 1-based simulation
/// index).
#[allow(clippy::too_many_arguments)]
pub fn batch_backpropagate(
    roots: &mut Roots,
    current_latent_state_index: i32,
    config: &SearchConfig,
    value_prefixes: &[f32],
    values: &[f32],
    policies: &[Vec<f32>],
    min_max_stats: &mut MinMaxStatsList,
    results: &SearchResults,
    is_reset_list: &[bool],
    to_play_batch: &[i32],
) -> Result<()> {
    let num = results.num();
    let check = |what: &'static str, got: usize| -> Result<()> {
        if got != num {
            return Err(SearchError::BatchSizeMismatch {
                what,
                expected: num,
                got,
            });
        }
        Ok(())
    };
    check("traversed nodes", results.nodes.len())?;
    check("value_prefixes", value_prefixes.len())?;
    check("values", values.len())?;
    check("policies", policies.len())?;
    check("min_max_stats", min_max_stats.len())?;
    check("is_reset_list", is_reset_list.len())?;
    check("to_play_batch", to_play_batch.len())?;
    let to_play = players_from_batch(to_play_batch)?;

    let tree = roots.tree_mut();
    for i in 0..num {
        let leaf = results.nodes[i];
        tree.expand(
            leaf,
            to_play[i],
            current_latent_state_index,
            i as i32,
            value_prefixes[i],
            &policies[i],
        )?;
        tree.get_mut(leaf).is_reset = is_reset_list[i];

        backpropagate(
            tree,
            &results.search_paths[i],
            &mut min_max_stats.stats[i],
            to_play[i],
            values[i],
            config.discount,
        );
    }
    Ok(())
}
