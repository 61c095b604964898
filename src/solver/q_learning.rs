use rand::prelude::*;
use tracing::trace;

use crate::solver::error::Result;
use crate::solver::*;

// Action values closer than this to the maximum count as tied.
const TIE_TOLERANCE: f64 = 1e-9;

// A single sampled (S, A, R, S₊₁) step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, A> {
    pub state: S,
    pub action: A,
    pub reward: f64,
    pub next_state: S,
}

/// Exploration strategy used by `choose_next_action`.
///
/// `candidates` holds the greedy actions and `actions` the whole action set.
/// Returns None only when the pool it decided to draw from is empty.
pub trait Exploration<A> {
    fn select(&mut self, candidates: &[A], actions: &[A], epsilon: f64) -> Option<A>;
}

// ε-greedy: uniform among the greedy candidates with probability 1 - ε,
// uniform among all actions with probability ε.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<R> {
    rng: R,
}

impl<R: Rng> EpsilonGreedy<R> {
    pub fn new(rng: R) -> Self {
        EpsilonGreedy { rng }
    }
}

impl EpsilonGreedy<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<A: Clone, R: Rng> Exploration<A> for EpsilonGreedy<R> {
    fn select(&mut self, candidates: &[A], actions: &[A], epsilon: f64) -> Option<A> {
        let pool = if self.rng.gen::<f64>() < epsilon {
            actions
        } else {
            candidates
        };
        pool.choose(&mut self.rng).cloned()
    }
}

/// Applies one Q-learning update for the given transition:
///   Q(S, A) ← (1 - α)∙Q(S, A) + α∙[R + γ∙max Q(S₊₁, a)]
///
/// When S is a goal state the episode ends there, so the bootstrap term is 0
/// whatever S₊₁ is. Otherwise the maximum runs over the actions present for
/// S₊₁; a state with no entries yet (including the terminal state)
/// contributes 0. A missing Q(S, A) starts from 0.
pub fn q_update<M: Mdp>(
    mdp: &M,
    q_table: &mut QTable<M::State, M::Action>,
    transition: &Transition<M::State, M::Action>,
    alpha: f64,
) {
    let max_next_value = if mdp.is_goal(&transition.state) {
        0.0
    } else {
        q_table.max_value(&transition.next_state).unwrap_or(0.0)
    };

    let sample = transition.reward + mdp.config().gamma * max_next_value;
    let prev_value = q_table
        .get(&transition.state, &transition.action)
        .unwrap_or(0.0);
    let new_value = (1.0 - alpha) * prev_value + alpha * sample;

    trace!(
        state = ?transition.state,
        action = ?transition.action,
        prev_value,
        new_value,
        "q update"
    );
    q_table.insert(
        transition.state.clone(),
        transition.action.clone(),
        new_value,
    );
}

// All actions tied for the maximum known value in `state`, in `actions()` order.
// With nothing known about the state, falls back to the first action.
pub fn best_actions<M: Mdp>(
    mdp: &M,
    state: &M::State,
    q_table: &QTable<M::State, M::Action>,
) -> Vec<M::Action> {
    let max_value = mdp
        .actions()
        .iter()
        .filter_map(|action| q_table.get(state, action))
        .fold(f64::NEG_INFINITY, f64::max);

    let mut best: Vec<M::Action> = mdp
        .actions()
        .iter()
        .filter(|action| match q_table.get(state, action) {
            Some(value) => value == max_value || (value - max_value).abs() <= TIE_TOLERANCE,
            None => false,
        })
        .cloned()
        .collect();

    if best.is_empty() {
        best.extend(mdp.actions().first().cloned());
    }
    best
}

/// Chooses the next action in `state`, which must be neither terminal nor a goal.
///
/// The greedy candidates are handed to `exploration` together with the full
/// action set, so the randomness lives entirely in the strategy.
pub fn choose_next_action<M, E>(
    mdp: &M,
    state: &M::State,
    epsilon: f64,
    q_table: &QTable<M::State, M::Action>,
    exploration: &mut E,
) -> Result<M::Action>
where
    M: Mdp,
    E: Exploration<M::Action> + ?Sized,
{
    if mdp.actions().is_empty() {
        return Err(SolverError::NoActions);
    }

    let candidates = best_actions(mdp, state, q_table);
    exploration
        .select(&candidates, mdp.actions(), epsilon)
        .ok_or(SolverError::NoActions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::testing::*;
    use approx::assert_relative_eq;

    // Always returns the candidate (or action, when exploring) at a fixed index.
    struct Pick {
        index: usize,
        seen: Vec<(usize, usize, f64)>,
    }

    impl<A: Clone> Exploration<A> for Pick {
        fn select(&mut self, candidates: &[A], actions: &[A], epsilon: f64) -> Option<A> {
            self.seen.push((candidates.len(), actions.len(), epsilon));
            let pool = if epsilon >= 1.0 { actions } else { candidates };
            pool.get(self.index.min(pool.len().saturating_sub(1))).cloned()
        }
    }

    fn pick(index: usize) -> Pick {
        Pick {
            index,
            seen: Vec::new(),
        }
    }

    #[test]
    fn first_visit_into_unknown_state_bootstraps_zero() {
        let mdp = ToyMdp::new();
        let mut q_table = QTable::new();
        let transition = Transition {
            state: ToyState::A,
            action: ToyAction::Move,
            reward: 10.0,
            next_state: ToyState::T,
        };

        q_update(&mdp, &mut q_table, &transition, 0.5);

        // 0.5∙0 + 0.5∙(10 + 0.8∙0)
        assert_relative_eq!(q_table.get(&ToyState::A, &ToyAction::Move).unwrap(), 5.0);

        q_update(&mdp, &mut q_table, &transition, 0.5);
        assert_relative_eq!(q_table.get(&ToyState::A, &ToyAction::Move).unwrap(), 7.5);
    }

    #[test]
    fn update_bootstraps_from_best_next_action() {
        let mdp = ChainMdp::new(3, 0.5);
        let mut q_table = QTable::new();
        q_table.insert(1, ChainAction::Stay, 2.0);
        q_table.insert(1, ChainAction::Forward, 6.0);

        let transition = Transition {
            state: 0,
            action: ChainAction::Forward,
            reward: -1.0,
            next_state: 1,
        };
        q_update(&mdp, &mut q_table, &transition, 1.0);

        assert_relative_eq!(q_table.get(&0, &ChainAction::Forward).unwrap(), 2.0);
        assert_eq!(q_table.get(&0, &ChainAction::Stay), None);
    }

    #[test]
    fn negative_next_values_are_not_clipped_to_zero() {
        let mdp = ChainMdp::new(3, 0.5);
        let mut q_table = QTable::new();
        q_table.insert(1, ChainAction::Stay, -4.0);

        let transition = Transition {
            state: 0,
            action: ChainAction::Forward,
            reward: -1.0,
            next_state: 1,
        };
        q_update(&mdp, &mut q_table, &transition, 1.0);

        assert_relative_eq!(q_table.get(&0, &ChainAction::Forward).unwrap(), -3.0);
    }

    #[test]
    fn goal_update_ignores_next_state() {
        let mut mdp = ToyMdp::new();
        mdp.goal_a = true;

        let mut q_table = QTable::new();
        q_table.insert(ToyState::T, ToyAction::Move, 40.0);
        q_table.insert(ToyState::A, ToyAction::Move, 100.0);
        let mut other_table = q_table.clone();

        let to_terminal = Transition {
            state: ToyState::A,
            action: ToyAction::Move,
            reward: 10.0,
            next_state: ToyState::T,
        };
        let to_self = Transition {
            next_state: ToyState::A,
            ..to_terminal.clone()
        };
        q_update(&mdp, &mut q_table, &to_terminal, 0.5);
        q_update(&mdp, &mut other_table, &to_self, 0.5);

        let value = q_table.get(&ToyState::A, &ToyAction::Move).unwrap();
        assert_relative_eq!(value, 55.0);
        assert_eq!(other_table.get(&ToyState::A, &ToyAction::Move), Some(value));
    }

    #[test]
    fn best_actions_keeps_ties() {
        let mdp = ChainMdp::new(3, 0.9);
        let mut q_table = QTable::new();
        q_table.insert(0, ChainAction::Forward, 3.0);
        q_table.insert(0, ChainAction::Stay, 3.0);
        q_table.insert(1, ChainAction::Forward, 3.0);
        q_table.insert(1, ChainAction::Stay, 1.0);

        assert_eq!(
            best_actions(&mdp, &0, &q_table),
            vec![ChainAction::Stay, ChainAction::Forward]
        );
        assert_eq!(best_actions(&mdp, &1, &q_table), vec![ChainAction::Forward]);
    }

    #[test]
    fn best_actions_defaults_to_first_action() {
        let mdp = ChainMdp::new(3, 0.9);
        let q_table = QTable::new();
        assert_eq!(best_actions(&mdp, &0, &q_table), vec![ChainAction::Stay]);
    }

    #[test]
    fn choose_delegates_to_exploration() {
        let mdp = ChainMdp::new(3, 0.9);
        let mut q_table = QTable::new();
        q_table.insert(0, ChainAction::Forward, 1.0);
        q_table.insert(0, ChainAction::Stay, 0.5);

        let mut exploration = pick(0);
        let action = choose_next_action(&mdp, &0, 0.25, &q_table, &mut exploration).unwrap();
        assert_eq!(action, ChainAction::Forward);
        assert_eq!(exploration.seen, vec![(1, 2, 0.25)]);

        // Exploring draws from the whole action set.
        let mut exploration = pick(0);
        let action = choose_next_action(&mdp, &0, 1.0, &q_table, &mut exploration).unwrap();
        assert_eq!(action, ChainAction::Stay);
    }

    #[test]
    fn choose_on_unknown_state_does_not_fail() {
        let mdp = ChainMdp::new(3, 0.9);
        let mut exploration = pick(5);
        let action =
            choose_next_action(&mdp, &1, 0.0, &QTable::new(), &mut exploration).unwrap();
        assert_eq!(action, ChainAction::Stay);
    }

    #[test]
    fn choose_without_actions_is_an_error() {
        let mut mdp = ChainMdp::new(3, 0.9);
        mdp.actions.clear();
        let result = choose_next_action(&mdp, &0, 0.0, &QTable::new(), &mut pick(0));
        assert_eq!(result.unwrap_err(), SolverError::NoActions);
    }

    #[test]
    fn epsilon_greedy_extremes() {
        let candidates = vec![ChainAction::Forward];
        let actions = vec![ChainAction::Stay, ChainAction::Forward];

        let mut greedy = EpsilonGreedy::seeded(7);
        for _ in 0..100 {
            assert_eq!(
                greedy.select(&candidates, &actions, 0.0),
                Some(ChainAction::Forward)
            );
        }

        let mut random = EpsilonGreedy::seeded(7);
        let explored = (0..200)
            .filter_map(|_| random.select(&candidates, &actions, 1.0))
            .filter(|action| *action == ChainAction::Stay)
            .count();
        assert!(explored > 0 && explored < 200);
    }

    #[test]
    fn epsilon_greedy_spreads_over_ties() {
        let candidates = vec![ChainAction::Stay, ChainAction::Forward];
        let mut greedy = EpsilonGreedy::seeded(11);
        let stays = (0..400)
            .filter_map(|_| greedy.select(&candidates, &candidates, 0.0))
            .filter(|action| *action == ChainAction::Stay)
            .count();
        assert!(stays > 100 && stays < 300);
    }
}
