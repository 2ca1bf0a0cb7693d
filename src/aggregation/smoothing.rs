//! Temporal smoothing of per-window classifications

use crate::types::BabyState;
use std::collections::VecDeque;

/// Majority vote over the last N window states.
///
/// Ties go to the state seen most recently. `Unknown` only wins when the
/// buffer holds nothing else.
#[derive(Debug, Clone)]
pub struct StateSmoother {
    window: usize,
    history: VecDeque<BabyState>,
}

impl StateSmoother {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            history: VecDeque::with_capacity(window),
        }
    }

    /// Record a state and return the smoothed one.
    pub fn push(&mut self, state: BabyState) -> BabyState {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(state);
        self.stable()
    }

    /// Current smoothed state; `Unknown` when empty
    pub fn stable(&self) -> BabyState {
        // (state, count, index of latest occurrence)
        let mut tally: Vec<(BabyState, usize, usize)> = Vec::with_capacity(4);
        for (idx, &state) in self.history.iter().enumerate() {
            if state == BabyState::Unknown {
                continue;
            }
            match tally.iter_mut().find(|(s, _, _)| *s == state) {
                Some(entry) => {
                    entry.1 += 1;
                    entry.2 = idx;
                }
                None => tally.push((state, 1, idx)),
            }
        }

        tally
            .into_iter()
            .max_by_key(|&(_, count, last)| (count, last))
            .map_or(BabyState::Unknown, |(state, _, _)| state)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BabyState::*;

    #[test]
    fn test_majority_wins() {
        let mut s = StateSmoother::new(5);
        for state in [Asleep, Asleep, AwakeCrying, Asleep] {
            s.push(state);
        }
        assert_eq!(s.stable(), Asleep);
    }

    #[test]
    fn test_tie_goes_to_most_recent() {
        let mut s = StateSmoother::new(4);
        for state in [Asleep, AwakePeaceful, Asleep, AwakePeaceful] {
            s.push(state);
        }
        assert_eq!(s.stable(), AwakePeaceful);
        assert_eq!(s.push(Asleep), Asleep);
    }

    #[test]
    fn test_unknown_never_wins_over_known() {
        let mut s = StateSmoother::new(5);
        for state in [Unknown, Unknown, Unknown, AwakeCrying] {
            s.push(state);
        }
        assert_eq!(s.stable(), AwakeCrying);

        let mut only_unknown = StateSmoother::new(3);
        assert_eq!(only_unknown.push(Unknown), Unknown);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut s = StateSmoother::new(3);
        for state in [NotPresent, NotPresent, Asleep, Asleep] {
            s.push(state);
        }
        assert_eq!(s.len(), 3);
        assert_eq!(s.stable(), Asleep);
    }

    #[test]
    fn test_window_of_one_follows_input() {
        let mut s = StateSmoother::new(0);
        assert_eq!(s.push(Asleep), Asleep);
        assert_eq!(s.push(NotPresent), NotPresent);
    }
}
