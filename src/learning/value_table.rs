//! Value table for tabular learning
//!
//! State-action values are not stored separately: the value of taking action
//! `a` in state `s` is the value of the afterstate `s.child(a)`.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::nim::{Action, State};

/// Value table mapping states to expected return.
///
/// Unseen states read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTable {
    values: HashMap<State, f64>,
}

/// One `state → value` pair of a table dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub state: State,
    pub value: f64,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every given state set to zero.
    pub fn with_states(states: &[State]) -> Self {
        Self {
            values: states.iter().map(|state| (state.clone(), 0.0)).collect(),
        }
    }

    /// Add every state not yet present with value zero; learned values stay.
    pub fn ensure_states(&mut self, states: &[State]) {
        for state in states {
            self.values.entry(state.clone()).or_insert(0.0);
        }
    }

    /// Get value for a state
    pub fn get(&self, state: &State) -> f64 {
        self.values.get(state).copied().unwrap_or(0.0)
    }

    /// Set value for a state
    pub fn set(&mut self, state: State, value: f64) {
        self.values.insert(state, value);
    }

    /// Value of taking `action` in `state`.
    pub fn action_value(&self, state: &State, action: &Action) -> f64 {
        self.get(&state.child(action))
    }

    /// Maximum action value over `actions`, or 0 when there are none.
    pub fn max_value(&self, state: &State, actions: &[Action]) -> f64 {
        if actions.is_empty() {
            return 0.0;
        }
        actions
            .iter()
            .map(|action| self.action_value(state, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Actions whose value ties the maximum, in the order given.
    pub fn greedy_actions(&self, state: &State, actions: &[Action]) -> Vec<Action> {
        let max = self.max_value(state, actions);
        actions
            .iter()
            .filter(|action| is_tied(self.action_value(state, action), max))
            .copied()
            .collect()
    }

    /// Move `state`'s value a fraction `step` of the way towards `target`.
    pub fn step_towards(&mut self, state: &State, target: f64, step: f64) {
        let value = self.get(state);
        self.set(state.clone(), value + step * (target - value));
    }

    /// Element-wise average of two tables over the union of their keys.
    pub fn average(&self, other: &ValueTable) -> ValueTable {
        let mut values = HashMap::with_capacity(self.values.len().max(other.values.len()));
        for state in self.values.keys().chain(other.values.keys()) {
            values
                .entry(state.clone())
                .or_insert_with(|| (self.get(state) + other.get(state)) / 2.0);
        }
        Self { values }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&State, &f64)> {
        self.values.iter()
    }

    /// Entries sorted by state, for dumps.
    pub fn entries(&self) -> Vec<ValueEntry> {
        let mut entries: Vec<_> = self
            .values
            .iter()
            .map(|(state, &value)| ValueEntry {
                state: state.clone(),
                value,
            })
            .collect();
        entries.sort_by(|a, b| a.state.cmp(&b.state));
        entries
    }

    pub fn contains(&self, state: &State) -> bool {
        self.values.contains_key(state)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Get total number of values stored
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Tolerance under which two action values count as tied.
pub const TIE_TOLERANCE: f64 = 1e-9;

pub(crate) fn is_tied(value: f64, max: f64) -> bool {
    (value - max).abs() <= TIE_TOLERANCE
}

impl FromIterator<(State, f64)> for ValueTable {
    fn from_iter<I: IntoIterator<Item = (State, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ValueTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.entries() {
            writeln!(f, "{}: {:.6}", entry.state, entry.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_states_read_zero() {
        let table = ValueTable::new();
        assert_eq!(table.get(&State::from([1, 2])), 0.0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_set_get_uses_multiset_keys() {
        let mut table = ValueTable::new();
        table.set(State::from([2, 1]), 0.75);
        assert_eq!(table.get(&State::from([1, 2])), 0.75);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_greedy_actions_keep_ties() {
        let state = State::from([1, 1]);
        let mut table = ValueTable::new();
        // Both actions lead to {0, 1}, so both must be greedy
        table.set(State::from([0, 1]), 0.5);
        let greedy = table.greedy_actions(&state, &state.legal_actions());
        assert_eq!(greedy.len(), 2);
    }

    #[test]
    fn test_max_value() {
        let state = State::from([2]);
        let mut table = ValueTable::new();
        table.set(State::from([1]), -0.5);
        table.set(State::from([0]), 1.0);
        assert_eq!(table.max_value(&state, &state.legal_actions()), 1.0);
        assert_eq!(table.max_value(&state, &[]), 0.0);
        assert_eq!(
            table.greedy_actions(&state, &state.legal_actions()),
            vec![Action::new(0, 2)]
        );
    }

    #[test]
    fn test_step_towards() {
        let mut table = ValueTable::new();
        let state = State::from([3]);
        table.step_towards(&state, 1.0, 0.5);
        assert!((table.get(&state) - 0.5).abs() < 1e-12);
        table.step_towards(&state, 1.0, 0.5);
        assert!((table.get(&state) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ensure_states_keeps_learned_values() {
        let mut table: ValueTable = [(State::from([1]), 0.5)].into_iter().collect();
        table.ensure_states(&State::from([2]).all_states());
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&State::from([1])), 0.5);
        assert!(table.contains(&State::from([2])));
    }

    #[test]
    fn test_average_over_union() {
        let a: ValueTable = [(State::from([1]), 1.0)].into_iter().collect();
        let b: ValueTable = [(State::from([2]), -1.0)].into_iter().collect();
        let avg = a.average(&b);
        assert_eq!(avg.get(&State::from([1])), 0.5);
        assert_eq!(avg.get(&State::from([2])), -0.5);
    }

    #[test]
    fn test_display_dump_sorted() {
        let table: ValueTable = [(State::from([2]), 0.25), (State::from([0]), 1.0)]
            .into_iter()
            .collect();
        assert_eq!(table.to_string(), "0: 1.000000\n2: 0.250000\n");
    }
}
