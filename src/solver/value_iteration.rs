use tracing::{debug, info};

use crate::solver::error::Result;
use crate::solver::*;

#[derive(Debug, Clone)]
pub struct ValueIterationReport<S: Eq + Hash, A: Eq + Hash> {
    pub v_table: VTable<S>,
    pub q_table: QTable<S, A>,
    // Maximum value change of every sweep, in order.
    pub deltas: Vec<f64>,
    pub converged: bool,
}

fn prev_value<S: Eq + Hash + Debug>(v_table: &VTable<S>, state: &S) -> Result<f64> {
    v_table
        .get(state)
        .copied()
        .ok_or_else(|| SolverError::MissingValue(format!("{:?}", state)))
}

/// Performs one synchronous Bellman optimality sweep over all nonterminal states.
///
/// Every action value is computed as `γ∙(R(s, a, s₊₁) + V(s₊₁))` with the reward
/// taken from `Mdp::reward`, and every read goes to `v_table`, never to the
/// values updated during this sweep. Returns the new value table, the action
/// values of this sweep and the maximum absolute change in state values.
pub fn value_iteration<M: Mdp>(
    mdp: &M,
    v_table: &VTable<M::State>,
) -> Result<(VTable<M::State>, QTable<M::State, M::Action>, f64)> {
    if mdp.actions().is_empty() {
        return Err(SolverError::NoActions);
    }

    let discount = mdp.config().gamma;
    let mut new_v_table = v_table.clone();
    let mut q_table = QTable::new();
    let mut max_delta: f64 = 0.0;

    for state in mdp.nonterminal_states() {
        let mut best_action_value = f64::NEG_INFINITY;
        for action in mdp.actions() {
            let (next_state, _) = mdp.step(state, action);
            let reward = mdp.reward(state, action, &next_state);
            let action_value = discount * (reward + prev_value(v_table, &next_state)?);
            q_table.insert(state.clone(), action.clone(), action_value);

            // Strict comparison keeps the first action on ties.
            if action_value > best_action_value {
                best_action_value = action_value;
            }
        }

        let delta = (best_action_value - prev_value(v_table, state)?).abs();
        max_delta = max_delta.max(delta);
        new_v_table.insert(state.clone(), best_action_value);
    }

    debug!(
        states = mdp.nonterminal_states().len(),
        max_delta, "value iteration sweep"
    );
    Ok((new_v_table, q_table, max_delta))
}

// Repeats sweeps until the maximum change drops below `threshold` or
// `max_sweeps` sweeps were made.
pub fn solve<M: Mdp>(
    mdp: &M,
    v_table: VTable<M::State>,
    threshold: f64,
    max_sweeps: usize,
) -> Result<ValueIterationReport<M::State, M::Action>> {
    let mut v_table = v_table;
    let mut q_table = QTable::new();
    let mut deltas = Vec::new();
    let mut converged = false;

    for sweep in 1..=max_sweeps {
        let (new_v_table, new_q_table, max_delta) = value_iteration(mdp, &v_table)?;
        v_table = new_v_table;
        q_table = new_q_table;
        deltas.push(max_delta);

        if max_delta < threshold {
            info!(sweep, max_delta, "value iteration converged");
            converged = true;
            break;
        }
    }

    if !converged {
        info!(max_sweeps, "value iteration stopped before converging");
    }

    Ok(ValueIterationReport {
        v_table,
        q_table,
        deltas,
        converged,
    })
}
