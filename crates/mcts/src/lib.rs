//! Batched Monte Carlo Tree Search with a multi-head ("x-hot") action space.
//!
//! This crate drives many independent PUCT searches in lockstep, one per
//! batch element, sharing a single external model for leaf evaluation. It
//! implements the EfficientZero-style value-prefix bookkeeping: nodes store
//! the model's discounted-reward prefix instead of per-step rewards, and
//! one-step rewards are recovered from prefix differences (or taken verbatim
//! after a reward-accumulator reset).
//!
//! # Features
//!
//! - **Batched**: one traversal/backprop pass per simulation covers every
//!   root, so the model sees a single dense inference batch
//! - **PUCT selection**: min-max normalized value scores, uniform random
//!   tie-breaking, reproducible under an injected RNG
//! - **Two game modes**: play-with-bot and two-player self-play, differing
//!   in how bootstrap values are signed during backpropagation
//! - **x-hot actions**: one discrete choice per head, folded into sparse
//!   children keys by [`xhot_core::ActionSpace`]
//!
//! # Example
//!
//! ```
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use xhot_core::ActionSpace;
//! use xhot_mcts::{run_search, Roots, SearchConfig, UniformEvaluator};
//!
//! let space = ActionSpace::new(1, 2).unwrap();
//! let mut roots = Roots::new(1, space, vec![vec![0, 1]]).unwrap();
//!
//! let config = SearchConfig::for_evaluation(8);
//! let mut evaluator = UniformEvaluator::new(2, 0.5);
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//!
//! let outcome = run_search(
//!     &mut roots,
//!     &config,
//!     &[0.0],
//!     &[vec![0.0, 0.0]],
//!     &[-1],
//!     &mut evaluator,
//!     &mut rng,
//! )
//! .unwrap();
//!
//! assert_eq!(outcome.distributions[0].iter().sum::<u32>(), 8);
//! ```

pub mod config;
pub mod driver;
pub mod evaluator;
pub mod minmax;
pub mod node;
pub mod roots;
pub mod search;
pub mod tree;

pub use config::SearchConfig;
pub use driver::{run_search, run_simulations, SearchOutcome};
pub use evaluator::{EvaluationBatch, LeafBatch, RecurrentEvaluator, UniformEvaluator};
pub use minmax::{MinMaxStats, MinMaxStatsList};
pub use node::{Node, NodeId};
pub use roots::Roots;
pub use search::{
    backpropagate, batch_backpropagate, batch_traverse, batch_traverse_with, select_child,
    ucb_score, SearchResults,
};
pub use tree::Tree;
