//! Nim positions
//!
//! A [`State`] is an ordered list of pile sizes. Piles are addressed by index,
//! but two states holding the same pile sizes in a different order are the
//! same position: equality, ordering and hashing all work on the sorted
//! multiset of sizes.

use std::{
    cmp::Ordering,
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    ops::{Index, IndexMut},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use super::Action;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    piles: Vec<u32>,
}

impl State {
    pub fn new(piles: Vec<u32>) -> Self {
        Self { piles }
    }

    /// A state with `len` piles of `size` objects each.
    pub fn uniform(len: usize, size: u32) -> Self {
        Self {
            piles: vec![size; len],
        }
    }

    pub fn piles(&self) -> &[u32] {
        &self.piles
    }

    /// Number of piles (including empty ones).
    pub fn len(&self) -> usize {
        self.piles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.piles.is_empty()
    }

    pub fn clear(&mut self) {
        self.piles.clear();
    }

    /// Checked pile access.
    pub fn pile(&self, pile: usize) -> Result<u32> {
        self.piles
            .get(pile)
            .copied()
            .ok_or(Error::PileOutOfRange {
                pile,
                piles: self.piles.len(),
            })
    }

    pub fn out_of_range(&self, pile: usize) -> bool {
        pile >= self.piles.len()
    }

    /// Total number of objects left on the table.
    pub fn total(&self) -> u64 {
        self.piles.iter().map(|&size| u64::from(size)).sum()
    }

    /// No objects left (an empty pile list counts as terminal too).
    pub fn is_terminal(&self) -> bool {
        self.piles.iter().all(|&size| size == 0)
    }

    /// Bitwise XOR of all pile sizes. Zero means the player to move loses
    /// under optimal play.
    pub fn nim_sum(&self) -> u32 {
        self.piles.iter().fold(0, |acc, &size| acc ^ size)
    }

    /// Every (pile, count) pair with `1 <= count <= piles[pile]`.
    pub fn legal_actions(&self) -> Vec<Action> {
        self.piles
            .iter()
            .enumerate()
            .flat_map(|(pile, &size)| (1..=size).map(move |count| Action::new(pile, count)))
            .collect()
    }

    /// Apply an action in place. The action must be valid for this state.
    pub fn apply_action(&mut self, action: &Action) {
        debug_assert!(action.is_valid(self), "illegal action {action} in {self}");
        self[action.pile] -= action.count;
    }

    /// Put back the objects removed by `action`.
    pub fn undo_action(&mut self, action: &Action) {
        self[action.pile] += action.count;
    }

    /// The state reached by applying `action`.
    pub fn child(&self, action: &Action) -> State {
        let mut next = self.clone();
        next.apply_action(action);
        next
    }

    /// The state `action` was applied to in order to reach this one.
    pub fn parent(&self, action: &Action) -> State {
        let mut previous = self.clone();
        previous.undo_action(action);
        previous
    }

    pub fn children(&self) -> Vec<State> {
        self.legal_actions()
            .iter()
            .map(|action| self.child(action))
            .collect()
    }

    /// Every position reachable from this one, this one included.
    ///
    /// A position is reachable iff each pile holds at most as many objects as
    /// the same pile here. Positions equal as multisets are reported once.
    pub fn all_states(&self) -> Vec<State> {
        let mut seen = HashSet::new();
        let mut states = Vec::new();
        let mut scratch = self.clone();
        self.collect_states(&mut scratch, 0, &mut seen, &mut states);
        states
    }

    fn collect_states(
        &self,
        scratch: &mut State,
        pile: usize,
        seen: &mut HashSet<State>,
        states: &mut Vec<State>,
    ) {
        if pile == self.piles.len() {
            if seen.insert(scratch.clone()) {
                states.push(scratch.clone());
            }
            return;
        }
        for size in 0..=self.piles[pile] {
            scratch.piles[pile] = size;
            self.collect_states(scratch, pile + 1, seen, states);
        }
        scratch.piles[pile] = self.piles[pile];
    }

    /// Pile sizes in ascending order; the identity of the position.
    pub fn canonical(&self) -> Vec<u32> {
        let mut sorted = self.piles.clone();
        sorted.sort_unstable();
        sorted
    }

    #[track_caller]
    fn check_range(&self, pile: usize) {
        if self.out_of_range(pile) {
            panic!(
                "pile {pile} is out of range for a state with {} piles",
                self.piles.len()
            );
        }
    }
}

impl From<Vec<u32>> for State {
    fn from(piles: Vec<u32>) -> Self {
        Self::new(piles)
    }
}

impl<const N: usize> From<[u32; N]> for State {
    fn from(piles: [u32; N]) -> Self {
        Self::new(piles.to_vec())
    }
}

impl Index<usize> for State {
    type Output = u32;

    #[track_caller]
    fn index(&self, pile: usize) -> &u32 {
        self.check_range(pile);
        &self.piles[pile]
    }
}

impl IndexMut<usize> for State {
    #[track_caller]
    fn index_mut(&mut self, pile: usize) -> &mut u32 {
        self.check_range(pile);
        &mut self.piles[pile]
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.piles.len() == other.piles.len() && self.canonical() == other.canonical()
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    /// Fewer objects first, then by sorted pile sizes.
    fn cmp(&self, other: &Self) -> Ordering {
        self.total()
            .cmp(&other.total())
            .then_with(|| self.canonical().cmp(&other.canonical()))
    }
}

/// Pile sizes separated by spaces. A state without piles renders as the empty
/// string, which does not parse back.
impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, size) in self.piles.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{size}")?;
        }
        Ok(())
    }
}

impl FromStr for State {
    type Err = Error;

    /// Parse one line of whitespace-separated non-negative integers.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let piles = s
            .split_whitespace()
            .map(|token| {
                token.parse::<u32>().map_err(|e| Error::ParseState {
                    input: s.to_string(),
                    reason: format!("pile size '{token}': {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if piles.is_empty() {
            return Err(Error::ParseState {
                input: s.to_string(),
                reason: "no pile sizes given".to_string(),
            });
        }

        Ok(Self { piles })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn hash_of(state: &State) -> u64 {
        let mut hasher = DefaultHasher::new();
        state.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_multiset_equality_and_hash() {
        let a = State::from([3, 1, 2]);
        let b = State::from([1, 2, 3]);
        let c = State::from([1, 2, 2]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn test_terminal() {
        assert!(State::default().is_terminal());
        assert!(State::from([0, 0]).is_terminal());
        assert!(!State::from([0, 1]).is_terminal());
    }

    #[test]
    fn test_legal_actions() {
        let state = State::from([2, 0, 1]);
        let actions = state.legal_actions();
        assert_eq!(
            actions,
            vec![Action::new(0, 1), Action::new(0, 2), Action::new(2, 1)]
        );
        assert!(State::from([0, 0]).legal_actions().is_empty());
    }

    #[test]
    fn test_child_and_parent_are_inverse() {
        let state = State::from([3, 4, 5]);
        for action in state.legal_actions() {
            let child = state.child(&action);
            assert_eq!(child.total() + u64::from(action.count), state.total());
            assert_eq!(child.parent(&action), state);
        }
    }

    #[test]
    fn test_apply_and_undo() {
        let mut state = State::from([3, 4]);
        let action = Action::new(1, 4);
        state.apply_action(&action);
        assert_eq!(state.piles(), &[3, 0]);
        state.undo_action(&action);
        assert_eq!(state.piles(), &[3, 4]);
    }

    #[test]
    fn test_all_states_deduplicates_permutations() {
        // {2,2}: (0,0) (0,1) (0,2) (1,1) (1,2) (2,2) as multisets
        let states = State::from([2, 2]).all_states();
        assert_eq!(states.len(), 6);

        // {1,2,3}: 2 * 3 * 4 = 24 vectors, no duplicates possible
        // beyond permutations of equal sizes
        let states = State::from([1, 2, 3]).all_states();
        let unique: HashSet<_> = states.iter().cloned().collect();
        assert_eq!(unique.len(), states.len());
        assert!(states.contains(&State::from([0, 0, 0])));
        assert!(states.contains(&State::from([1, 2, 3])));
    }

    #[test]
    fn test_nim_sum() {
        assert_eq!(State::from([1, 2, 3]).nim_sum(), 0);
        assert_eq!(State::from([3, 4, 5]).nim_sum(), 2);
        assert_eq!(State::default().nim_sum(), 0);
    }

    #[test]
    fn test_checked_pile_access() {
        let state = State::from([3, 4]);
        assert_eq!(state.pile(1).unwrap(), 4);
        assert!(matches!(
            state.pile(2),
            Err(Error::PileOutOfRange { pile: 2, piles: 2 })
        ));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_out_of_range_panics() {
        let state = State::from([3, 4]);
        let _ = state[5];
    }

    #[test]
    fn test_text_round_trip() {
        let state = State::from([3, 4, 5]);
        let text = state.to_string();
        assert_eq!(text, "3 4 5");
        let parsed: State = text.parse().unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_parse_failures() {
        assert!("".parse::<State>().is_err());
        assert!("3 -4 5".parse::<State>().is_err());
        assert!("3 four".parse::<State>().is_err());
    }

    #[test]
    fn test_ordering_by_total() {
        let mut states = vec![
            State::from([2, 2]),
            State::from([0, 1]),
            State::from([1, 0]),
            State::from([0, 0]),
        ];
        states.sort();
        assert_eq!(states[0], State::from([0, 0]));
        assert_eq!(states[3], State::from([2, 2]));
    }
}
