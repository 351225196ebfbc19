//! Domain types with enforced invariants.
//!
//! These types keep the raw integer batches that cross the engine boundary
//! honest at the type level:
//! - `Player`: the side to move, restricted to the three supported values
//! - `ActionSpace`: the multi-head ("x-hot") action layout and its encoding

use crate::{Result, SearchError};

/// The side to move at a node.
///
/// `Bot` (`-1` on the wire) selects play-with-bot mode, where values are
/// accumulated from a single fixed perspective. `One` and `Two` select
/// self-play mode, where values are perspective-relative and sign-flipped
/// during backpropagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Player {
    Bot,
    One,
    Two,
}

impl Player {
    /// The wire representation used by external batches.
    pub const fn as_i32(self) -> i32 {
        match self {
            Player::Bot => -1,
            Player::One => 1,
            Player::Two => 2,
        }
    }

    /// The other side in self-play mode. `Bot` has no opponent and is
    /// returned unchanged.
    pub const fn opponent(self) -> Self {
        match self {
            Player::Bot => Player::Bot,
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Whether this value selects self-play (two-player) semantics.
    pub const fn is_two_player(self) -> bool {
        !matches!(self, Player::Bot)
    }
}

impl TryFrom<i32> for Player {
    type Error = SearchError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            -1 => Ok(Player::Bot),
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(SearchError::InvalidToPlay(other)),
        }
    }
}

/// Converts a raw `to_play` batch into typed players, rejecting any entry
/// outside `{-1, 1, 2}`.
pub fn players_from_batch(to_play_batch: &[i32]) -> Result<Vec<Player>> {
    to_play_batch.iter().map(|&p| Player::try_from(p)).collect()
}

/// The multi-head action layout: one discrete choice per head, `H` heads of
/// `A` actions each.
///
/// An x-hot action is an `H`-vector of per-head indices; unset heads carry a
/// `-1` sentinel. The codec folds such a vector into a single `u64` key for
/// the sparse children table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionSpace {
    num_heads: usize,
    actions_per_head: usize,
}

impl ActionSpace {
    /// Create an action space with `num_heads` heads of `actions_per_head`
    /// actions each.
    ///
    /// # Errors
    /// Returns `InvalidActionSpace` unless both dimensions are at least 1.
    pub fn new(num_heads: usize, actions_per_head: usize) -> Result<Self> {
        if num_heads == 0 || actions_per_head == 0 {
            return Err(SearchError::InvalidActionSpace {
                num_heads,
                actions_per_head,
            });
        }
        Ok(Self {
            num_heads,
            actions_per_head,
        })
    }

    pub const fn num_heads(&self) -> usize {
        self.num_heads
    }

    pub const fn actions_per_head(&self) -> usize {
        self.actions_per_head
    }

    /// Size of the combined action space, `H * A`.
    pub const fn total_actions(&self) -> usize {
        self.num_heads * self.actions_per_head
    }

    /// An all-unset action vector (`-1` in every head slot).
    pub fn sentinel(&self) -> Vec<i32> {
        vec![-1; self.num_heads]
    }

    /// Fold an x-hot action vector into a single table key.
    ///
    /// Each valid head entry contributes `a + head * A`; out-of-range or
    /// sentinel entries are skipped, and the final key is clamped to
    /// `H * A - 1`. Note the per-head contributions are summed rather than
    /// mixed-radix combined, so only single-head vectors round-trip; the
    /// selection path only ever sets head 0, which keeps the key equal to
    /// the chosen action index.
    pub fn encode(&self, actions: &[i32]) -> u64 {
        let mut key = 0u64;
        for (head, &a) in actions.iter().take(self.num_heads).enumerate() {
            if a >= 0 && (a as usize) < self.actions_per_head {
                key += a as u64 + (head * self.actions_per_head) as u64;
            }
        }
        key.min(self.total_actions() as u64 - 1)
    }
}
