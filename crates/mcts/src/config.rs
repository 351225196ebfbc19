//! Search configuration parameters.
//!
//! These parameters control the PUCT selection rule, the reward discount and
//! the root exploration noise.

/// Search configuration parameters.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Number of simulations per search.
    pub num_simulations: usize,

    /// PUCT exploration constant base (c2 in the MuZero formulation).
    /// Part of the formula: c = pb_c_init + log((N + pb_c_base + 1) / pb_c_base)
    pub pb_c_base: f32,

    /// PUCT exploration constant init (c1 in the MuZero formulation).
    pub pb_c_init: f32,

    /// Discount factor applied to one-step rewards and bootstrap values.
    pub discount: f32,

    /// Dirichlet noise alpha for root exploration.
    /// Higher values = more uniform noise, lower = more concentrated.
    pub root_dirichlet_alpha: f32,

    /// Fraction of each root prior replaced with Dirichlet noise.
    /// 0 = no exploration noise, 1 = pure noise.
    pub root_exploration_fraction: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_simulations: 50,
            pb_c_base: 19652.0,
            pb_c_init: 1.25,
            discount: 0.997,
            root_dirichlet_alpha: 0.3,
            root_exploration_fraction: 0.25,
        }
    }
}

impl SearchConfig {
    /// Create a new config with the specified number of simulations.
    pub fn with_simulations(num_simulations: usize) -> Self {
        Self {
            num_simulations,
            ..Default::default()
        }
    }

    /// Create a config for evaluation (no root exploration noise).
    pub fn for_evaluation(num_simulations: usize) -> Self {
        Self {
            num_simulations,
            root_exploration_fraction: 0.0,
            ..Default::default()
        }
    }
}
