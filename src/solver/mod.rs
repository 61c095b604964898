use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

pub mod error;
pub mod learning;
pub mod policy;
pub mod q_learning;
pub mod schedule;
pub mod value_iteration;

pub use error::SolverError;
pub use learning::{learn, LearningConfig, LearningReport};
pub use policy::{extract_policy, extract_v_table, rollout, Policy};
pub use q_learning::{
    best_actions, choose_next_action, q_update, EpsilonGreedy, Exploration, Transition,
};
pub use schedule::{schedule_alpha, schedule_epsilon, Schedule};
pub use value_iteration::{solve, value_iteration, ValueIterationReport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MdpConfig {
    // Discount applied to every value and action-value update.
    pub gamma: f64,
}

impl Default for MdpConfig {
    fn default() -> Self {
        MdpConfig { gamma: 0.9 }
    }
}

/// A finite MDP with deterministic transitions.
///
/// The solvers never check move legality: `step` is expected to handle every
/// action in every nonterminal state. The terminal state is never listed in
/// `nonterminal_states` and its value stays 0.
pub trait Mdp {
    type State: Clone + Eq + Hash + Debug;
    type Action: Clone + Eq + Hash + Debug;

    fn nonterminal_states(&self) -> &[Self::State];

    // The same actions are offered in every nonterminal state.
    fn actions(&self) -> &[Self::Action];

    fn terminal_state(&self) -> Self::State;

    fn step(&self, state: &Self::State, action: &Self::Action) -> (Self::State, f64);

    fn reward(&self, state: &Self::State, action: &Self::Action, next_state: &Self::State) -> f64;

    fn is_goal(&self, state: &Self::State) -> bool;

    fn config(&self) -> &MdpConfig;
}

pub type VTable<S> = HashMap<S, f64>;

// All-zero value table covering every nonterminal state and the terminal state.
pub fn initial_v_table<M: Mdp>(mdp: &M) -> VTable<M::State> {
    mdp.nonterminal_states()
        .iter()
        .cloned()
        .chain(std::iter::once(mdp.terminal_state()))
        .map(|state| (state, 0.0))
        .collect()
}

/// Sparse action-value table.
///
/// Pairs that were never computed or visited are absent, and lookups report
/// them as `None` rather than as a zero value.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable<S: Eq + Hash, A: Eq + Hash> {
    states: HashMap<S, HashMap<A, f64>>,
}

impl<S: Eq + Hash, A: Eq + Hash> Default for QTable<S, A> {
    fn default() -> Self {
        QTable {
            states: HashMap::new(),
        }
    }
}

impl<S: Eq + Hash, A: Eq + Hash> QTable<S, A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, state: &S, action: &A) -> Option<f64> {
        self.states
            .get(state)
            .and_then(|action_values| action_values.get(action))
            .copied()
    }

    pub fn insert(&mut self, state: S, action: A, value: f64) {
        self.states.entry(state).or_default().insert(action, value);
    }

    // Maximum over the entries present for `state`, None if there are none.
    pub fn max_value(&self, state: &S) -> Option<f64> {
        self.states
            .get(state)?
            .values()
            .copied()
            .fold(None, |best: Option<f64>, v| {
                Some(best.map_or(v, |b| b.max(v)))
            })
    }

    pub fn state_actions(&self, state: &S) -> Option<&HashMap<A, f64>> {
        self.states.get(state)
    }

    pub fn contains_state(&self, state: &S) -> bool {
        self.states.contains_key(state)
    }

    pub fn states(&self) -> impl Iterator<Item = &S> + '_ {
        self.states.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, &A, f64)> + '_ {
        self.states.iter().flat_map(|(state, action_values)| {
            action_values
                .iter()
                .map(move |(action, value)| (state, action, *value))
        })
    }

    pub fn len(&self) -> usize {
        self.states.values().map(|action_values| action_values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
