//! End-to-end scenarios driving the full prepare/traverse/backprop cycle.

use rand::rngs::mock::StepRng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use xhot_core::{ActionSpace, Player};
use xhot_mcts::{
    backpropagate, batch_backpropagate, batch_traverse_with, run_simulations, EvaluationBatch,
    LeafBatch, MinMaxStats, MinMaxStatsList, Node, RecurrentEvaluator, Roots, SearchConfig,
    SearchResults, Tree, UniformEvaluator,
};

fn config_with_discount(num_simulations: usize, discount: f32) -> SearchConfig {
    SearchConfig {
        discount,
        ..SearchConfig::for_evaluation(num_simulations)
    }
}

/// One play-with-bot simulation on a two-action root: the bootstrap mass
/// `1 + discount * 1` lands as `1` on the leaf and `discount` on the root.
#[test]
fn test_single_simulation_bootstrap() {
    let mut roots = Roots::new(1, ActionSpace::new(1, 2).unwrap(), vec![vec![0, 1]]).unwrap();
    roots
        .prepare_no_noise(&[0.0], &[vec![0.0, 0.0]], &[-1])
        .unwrap();

    let config = config_with_discount(1, 0.99);
    let mut stats = MinMaxStatsList::new(1);
    let mut results = SearchResults::new(1);
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    batch_traverse_with(&mut roots, &config, &stats, &mut results, &[-1], &mut rng).unwrap();

    let virtual_to_play = results.virtual_to_play.clone();
    batch_backpropagate(
        &mut roots,
        1,
        &config,
        &[0.0],
        &[1.0],
        &[vec![0.0, 0.0]],
        &mut stats,
        &results,
        &[false],
        &virtual_to_play,
    )
    .unwrap();

    let tree = roots.tree();
    let root = roots.root_id(0);
    assert_eq!(tree.get(root).visit_count, 2);
    assert!((tree.get(root).value_sum - 0.99).abs() < 1e-6);

    let leaf = results.nodes[0];
    assert!((tree.get(leaf).value_sum - 1.0).abs() < 1e-9);
    // Total mass along the path is 1 + 0.99 * 1.
    assert!((tree.get(root).value_sum + tree.get(leaf).value_sum - 1.99).abs() < 1e-6);

    // Zero logits leave both children with prior 0.5.
    for &child in tree.get(root).children.values() {
        assert!((tree.get(child).prior - 0.5).abs() < 1e-6);
    }
}

/// Tied scores break uniformly at random: over 10,000 fresh selections of a
/// two-way tie, each side lands within 3 sigma of half.
#[test]
fn test_tie_breaking_is_uniform() {
    let space = ActionSpace::new(1, 2).unwrap();
    let config = SearchConfig::for_evaluation(1);
    let mut rng = ChaCha8Rng::seed_from_u64(1234);

    let trials = 10_000;
    let mut first_action = 0u32;
    for _ in 0..trials {
        let mut roots = Roots::new(1, space, vec![vec![0, 1]]).unwrap();
        roots
            .prepare_no_noise(&[0.0], &[vec![0.0, 0.0]], &[-1])
            .unwrap();
        let stats = MinMaxStatsList::new(1);
        let mut results = SearchResults::new(1);
        batch_traverse_with(&mut roots, &config, &stats, &mut results, &[-1], &mut rng).unwrap();
        if results.last_actions[0][0] == 0 {
            first_action += 1;
        }
    }

    // sigma = sqrt(n * 0.5 * 0.5) = 50 for n = 10,000.
    let deviation = (first_action as i64 - 5000).abs();
    assert!(
        deviation <= 150,
        "tie-break counts {} / {} deviate more than 3 sigma",
        first_action,
        trials - first_action
    );
}

/// One self-play simulation: the leaf belongs to the opponent of the root
/// player, so its value counts against the root.
#[test]
fn test_two_player_simulation_flips_value_at_root() {
    let mut roots = Roots::new(1, ActionSpace::new(1, 2).unwrap(), vec![vec![0, 1]]).unwrap();
    roots
        .prepare_no_noise(&[0.0], &[vec![0.0, 0.0]], &[1])
        .unwrap();

    let config = config_with_discount(1, 0.99);
    let mut stats = MinMaxStatsList::new(1);
    let mut results = SearchResults::new(1);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    batch_traverse_with(&mut roots, &config, &stats, &mut results, &[1], &mut rng).unwrap();
    assert_eq!(results.virtual_to_play[0], 2);

    let virtual_to_play = results.virtual_to_play.clone();
    batch_backpropagate(
        &mut roots,
        1,
        &config,
        &[0.0],
        &[1.0],
        &[vec![0.0, 0.0]],
        &mut stats,
        &results,
        &[false],
        &virtual_to_play,
    )
    .unwrap();

    let tree = roots.tree();
    assert!((tree.get(results.nodes[0]).value_sum - 1.0).abs() < 1e-9);
    assert!((tree.get(roots.root_id(0)).value_sum + 0.99).abs() < 1e-6);
}

/// Sign-flip law: a two-player backprop of `v` through an all-opponent path
/// matches a play-with-bot backprop of `-v` node for node.
#[test]
fn test_two_player_matches_negated_single_player_on_opponent_path() {
    let build = |to_play: Player| {
        let mut tree = Tree::new(ActionSpace::new(1, 2).unwrap());
        let root = tree.add(Node::new(0.0, vec![0, 1], 1));
        tree.expand(root, to_play, 0, 0, 0.0, &[0.0, 0.0]).unwrap();
        let mid = tree.child(root, 0).unwrap();
        tree.expand(mid, to_play, 1, 0, 0.0, &[0.0, 0.0]).unwrap();
        let leaf = tree.child(mid, 0).unwrap();
        tree.expand(leaf, to_play, 2, 0, 0.0, &[0.0, 0.0]).unwrap();
        (tree, [root, mid, leaf])
    };

    let (mut two_player, path_a) = build(Player::Two);
    let mut stats = MinMaxStats::new();
    backpropagate(&mut two_player, &path_a, &mut stats, Player::One, 0.7, 0.99);

    let (mut single_player, path_b) = build(Player::Bot);
    let mut stats = MinMaxStats::new();
    backpropagate(&mut single_player, &path_b, &mut stats, Player::Bot, -0.7, 0.99);

    for (&a, &b) in path_a.iter().zip(path_b.iter()) {
        assert!((two_player.get(a).value() - single_player.get(b).value()).abs() < 1e-6);
    }
}

/// A parent flagged as reset hands its child the raw value prefix as reward.
#[test]
fn test_reset_parent_reward_is_child_prefix() {
    let mut tree = Tree::new(ActionSpace::new(1, 2).unwrap());
    let root = tree.add(Node::new(0.0, vec![0, 1], 1));
    tree.expand(root, Player::Bot, 0, 0, 5.0, &[0.0, 0.0]).unwrap();
    tree.get_mut(root).is_reset = true;

    let child = tree.child(root, 0).unwrap();
    tree.expand(child, Player::Bot, 1, 0, 3.0, &[0.0, 0.0]).unwrap();
    tree.get_mut(child).visit_count = 1;

    // With value() == 0 the mean Q over the single visited child is exactly
    // the reward: 3.0, not 3.0 - 5.0.
    let mean_q = tree.compute_mean_q(root, true, 0.0, 0.99);
    assert!((mean_q - 3.0).abs() < 1e-6);
}

/// Evaluator keyed purely on leaf content (parent depth and incoming
/// action), so batched and solo runs see identical model outputs.
struct ContentEvaluator {
    num_actions: usize,
}

impl RecurrentEvaluator for ContentEvaluator {
    fn recurrent_inference(&mut self, leaves: LeafBatch<'_>) -> EvaluationBatch {
        let num = leaves.len();
        let mut batch = EvaluationBatch {
            values: Vec::with_capacity(num),
            value_prefixes: Vec::with_capacity(num),
            policy_logits: Vec::with_capacity(num),
            is_reset: Vec::with_capacity(num),
        };
        for k in 0..num {
            let depth = leaves.latent_state_index_in_search_path[k];
            let action = leaves.last_actions[k][0].max(0);
            let h = (depth * 31 + action * 17) as f32;
            batch.values.push((h * 0.37).sin() * 0.5);
            batch.value_prefixes.push((h * 0.11).cos() * 0.2);
            batch
                .policy_logits
                .push((0..self.num_actions).map(|j| ((h + j as f32) * 0.53).sin()).collect());
            batch.is_reset.push((depth + action) % 4 == 0);
        }
        batch
    }
}

/// Batched processing must not leak state across roots: with a constant
/// tie-break (StepRng) and content-keyed inference, each root's tree comes
/// out identical to a solo run over the same data.
#[test]
fn test_batched_roots_match_solo_runs() {
    let space = ActionSpace::new(1, 3).unwrap();
    let config = config_with_discount(12, 0.99);
    let value_prefixes = [0.3f32, -0.2];
    let policies = [vec![2.0, 0.0, -1.0], vec![-1.0, 1.0, 0.5]];

    let run = |indices: &[usize]| {
        let legal: Vec<Vec<u32>> = indices.iter().map(|_| vec![0, 1, 2]).collect();
        let mut roots = Roots::new(indices.len(), space, legal).unwrap();
        let vp: Vec<f32> = indices.iter().map(|&i| value_prefixes[i]).collect();
        let pol: Vec<Vec<f32>> = indices.iter().map(|&i| policies[i].clone()).collect();
        let to_play = vec![-1; indices.len()];
        roots.prepare_no_noise(&vp, &pol, &to_play).unwrap();

        let mut stats = MinMaxStatsList::new(indices.len());
        let mut evaluator = ContentEvaluator { num_actions: 3 };
        let mut rng = StepRng::new(0, 0);
        run_simulations(&mut roots, &config, &mut stats, &to_play, &mut evaluator, &mut rng)
            .unwrap();
        (
            roots.get_distributions(),
            roots.get_values(),
            roots.get_trajectories(),
        )
    };

    let (batch_dist, batch_values, batch_trajs) = run(&[0, 1]);
    for (slot, &i) in [0usize, 1].iter().enumerate() {
        let (solo_dist, solo_values, solo_trajs) = run(&[i]);
        assert_eq!(batch_dist[slot], solo_dist[0]);
        assert!((batch_values[slot] - solo_values[0]).abs() < 1e-9);
        assert_eq!(batch_trajs[slot], solo_trajs[0]);
    }
}

/// Preparing two fresh root sets with identical inputs (including the noise
/// vectors) produces identical priors.
#[test]
fn test_prepare_is_reproducible_with_fixed_noise() {
    let space = ActionSpace::new(1, 3).unwrap();
    let noises = vec![vec![0.6f32, 0.3, 0.1]];

    let build = || {
        let mut roots = Roots::new(1, space, vec![vec![0, 1, 2]]).unwrap();
        roots
            .prepare(0.25, &noises, &[0.1], &[vec![0.4, 0.0, -0.3]], &[-1])
            .unwrap();
        roots
    };

    let a = build();
    let b = build();
    let tree_a = a.tree();
    let tree_b = b.tree();
    for action in 0..3u64 {
        let pa = tree_a.get(tree_a.child(a.root_id(0), action).unwrap()).prior;
        let pb = tree_b.get(tree_b.child(b.root_id(0), action).unwrap()).prior;
        assert_eq!(pa, pb);
    }
    assert_eq!(a.get_distributions(), b.get_distributions());
}

/// Every simulation adds exactly one visit to each node on its search path:
/// the root gains one per simulation on top of its prepare visit, and the
/// root children absorb one descent each.
#[test]
fn test_visit_accounting_over_simulations() {
    let mut roots = Roots::new(2, ActionSpace::new(1, 3).unwrap(), vec![vec![0, 1, 2], vec![0, 1, 2]])
        .unwrap();
    let to_play = [-1, -1];
    roots
        .prepare_no_noise(&[0.0, 0.0], &[vec![0.0; 3], vec![0.0; 3]], &to_play)
        .unwrap();

    let config = SearchConfig::for_evaluation(15);
    let mut stats = MinMaxStatsList::new(2);
    let mut evaluator = UniformEvaluator::new(3, 0.1);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    run_simulations(&mut roots, &config, &mut stats, &to_play, &mut evaluator, &mut rng).unwrap();

    for i in 0..2 {
        assert_eq!(roots.tree().get(roots.root_id(i)).visit_count, 16);
        assert_eq!(roots.get_distributions()[i].iter().sum::<u32>(), 15);
    }
}

/// A multi-head space still searches: selection drives head 0 and leaves the
/// trailing heads as sentinels all the way into the recorded trajectories.
#[test]
fn test_multi_head_search_uses_first_head() {
    let space = ActionSpace::new(4, 3).unwrap();
    let mut roots = Roots::new(1, space, vec![vec![0, 1, 2]]).unwrap();
    let to_play = [-1];
    roots
        .prepare_no_noise(&[0.0], &[vec![0.0; 3]], &to_play)
        .unwrap();

    let config = SearchConfig::for_evaluation(8);
    let mut stats = MinMaxStatsList::new(1);
    let mut evaluator = UniformEvaluator::new(3, 0.2);
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    run_simulations(&mut roots, &config, &mut stats, &to_play, &mut evaluator, &mut rng).unwrap();

    assert_eq!(roots.get_distributions()[0].iter().sum::<u32>(), 8);
    for action in &roots.get_trajectories()[0] {
        assert_eq!(action.len(), 4);
        assert!(action[0] >= 0);
        assert_eq!(&action[1..], &[-1, -1, -1][..]);
    }
}
