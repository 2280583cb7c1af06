use serde::{Deserialize, Serialize};

use super::types::Turn;

/// Chooses a bounded set of evenly spaced turns out of a run, for map
/// rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSelector {
    pub max_snapshots: usize,
    pub min_turn: Turn,
    pub min_spacing: Turn,
}

impl Default for SnapshotSelector {
    fn default() -> Self {
        SnapshotSelector {
            max_snapshots: 5,
            min_turn: 5,
            min_spacing: 10,
        }
    }
}

impl SnapshotSelector {
    /// Selects turns walking backwards from `max_turn`.
    ///
    /// Short runs get fewer turns rather than tighter spacing, `min_turn` is
    /// only added when it is more than `min_spacing` before the earliest
    /// selected turn.
    pub fn select(&self, max_turn: Turn) -> Vec<Turn> {
        if self.max_snapshots == 0 || max_turn < self.min_turn {
            return Vec::new();
        }
        if max_turn == self.min_turn {
            return vec![self.min_turn];
        }
        let range = max_turn - self.min_turn;
        let ideal = if self.max_snapshots > 1 {
            range / (self.max_snapshots as Turn - 1)
        } else {
            range
        };
        let spacing = ideal.max(self.min_spacing).max(1);
        let mut turns = vec![max_turn];
        let mut current = max_turn;
        while turns.len() < self.max_snapshots {
            match current.checked_sub(spacing) {
                Some(next) if next > self.min_turn => {
                    turns.push(next);
                    current = next;
                }
                _ => {
                    if current - self.min_turn > self.min_spacing {
                        turns.push(self.min_turn);
                    }
                    break;
                }
            }
        }
        turns.reverse();
        turns
    }
}

/// [SnapshotSelector::select] with the default parameters
pub fn select_snapshot_turns(max_turn: Turn) -> Vec<Turn> {
    SnapshotSelector::default().select(max_turn)
}
