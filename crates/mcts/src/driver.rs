//! The per-search loop: prepare, then for each simulation gather leaves,
//! run one batched inference and apply expansion plus backpropagation.
//!
//! The driver moves data between phases and nothing else; every policy- and
//! reward-bearing decision lives in the tree, selection and backpropagation
//! code.

use crate::config::SearchConfig;
use crate::evaluator::{LeafBatch, RecurrentEvaluator};
use crate::minmax::MinMaxStatsList;
use crate::roots::Roots;
use crate::search::{batch_backpropagate, batch_traverse_with, SearchResults};
use rand::Rng;
use xhot_core::Result;

/// Root statistics extracted after the final simulation.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    /// Per-root child visit counts, indexed by legal action.
    pub distributions: Vec<Vec<u32>>,
    /// Per-root value estimates.
    pub values: Vec<f64>,
    /// Per-root best trajectories of x-hot actions.
    pub trajectories: Vec<Vec<Vec<i32>>>,
}

/// Run `config.num_simulations` simulations over already-prepared roots.
///
/// Each simulation traverses all roots, asks `evaluator` for one batched
/// inference over the gathered leaves and backpropagates the results. Leaves
/// of simulation `s` occupy depth `s` in the external latent-state tensor
/// (the roots hold depth 0).
pub fn run_simulations<E: RecurrentEvaluator, R: Rng>(
    roots: &mut Roots,
    config: &SearchConfig,
    min_max_stats: &mut MinMaxStatsList,
    to_play_batch: &[i32],
    evaluator: &mut E,
    rng: &mut R,
) -> Result<()> {
    for simulation in 0..config.num_simulations {
        let mut results = SearchResults::new(roots.len());
        batch_traverse_with(roots, config, min_max_stats, &mut results, to_play_batch, rng)?;

        let batch = evaluator.recurrent_inference(LeafBatch {
            latent_state_index_in_search_path: &results.latent_state_index_in_search_path,
            latent_state_index_in_batch: &results.latent_state_index_in_batch,
            last_actions: &results.last_actions,
        });

        let virtual_to_play = results.virtual_to_play.clone();
        batch_backpropagate(
            roots,
            (simulation + 1) as i32,
            config,
            &batch.value_prefixes,
            &batch.values,
            &batch.policy_logits,
            min_max_stats,
            &results,
            &batch.is_reset,
            &virtual_to_play,
        )?;
    }
    Ok(())
}

/// Run a whole search round: prepare the roots from their initial inference
/// outputs (sampling Dirichlet root noise when configured), run the
/// simulations and collect the root statistics.
pub fn run_search<E: RecurrentEvaluator, R: Rng>(
    roots: &mut Roots,
    config: &SearchConfig,
    value_prefixes: &[f32],
    policy_logits: &[Vec<f32>],
    to_play_batch: &[i32],
    evaluator: &mut E,
    rng: &mut R,
) -> Result<SearchOutcome> {
    if config.root_exploration_fraction > 0.0 {
        let noises = roots.sample_root_noise(config.root_dirichlet_alpha, policy_logits, rng)?;
        roots.prepare(
            config.root_exploration_fraction,
            &noises,
            value_prefixes,
            policy_logits,
            to_play_batch,
        )?;
    } else {
        roots.prepare_no_noise(value_prefixes, policy_logits, to_play_batch)?;
    }

    let mut min_max_stats = MinMaxStatsList::new(roots.len());
    run_simulations(roots, config, &mut min_max_stats, to_play_batch, evaluator, rng)?;

    Ok(SearchOutcome {
        distributions: roots.get_distributions(),
        values: roots.get_values(),
        trajectories: roots.get_trajectories(),
    })
}
