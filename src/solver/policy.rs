use crate::solver::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Policy<S: Eq + Hash, A> {
    // Greedy action for every nonterminal state.
    // None when the action-value table knows nothing about the state.
    pub states: HashMap<S, Option<A>>,
}

impl<S: Eq + Hash, A> Policy<S, A> {
    pub fn action(&self, state: &S) -> Option<&A> {
        self.states.get(state).and_then(|action| action.as_ref())
    }

    // Number of states that have no action determined yet.
    pub fn undetermined(&self) -> usize {
        self.states.values().filter(|action| action.is_none()).count()
    }
}

// Picks argmax Q(s, a) for every nonterminal state, looking only at the
// pairs present in the table. Ties go to the first action in `actions()`.
pub fn extract_policy<M: Mdp>(
    mdp: &M,
    q_table: &QTable<M::State, M::Action>,
) -> Policy<M::State, M::Action> {
    let states = mdp
        .nonterminal_states()
        .iter()
        .map(|state| {
            let mut best: Option<(&M::Action, f64)> = None;
            for action in mdp.actions() {
                if let Some(value) = q_table.get(state, action) {
                    if best.map_or(true, |(_, best_value)| value > best_value) {
                        best = Some((action, value));
                    }
                }
            }
            (state.clone(), best.map(|(action, _)| action.clone()))
        })
        .collect();

    Policy { states }
}

// V(s) = max over present actions of Q(s, a), for every state with an entry.
pub fn extract_v_table<S, A>(q_table: &QTable<S, A>) -> VTable<S>
where
    S: Eq + Hash + Clone,
    A: Eq + Hash,
{
    q_table
        .states()
        .filter_map(|state| {
            q_table
                .max_value(state)
                .map(|value| (state.clone(), value))
        })
        .collect()
}

// Follows the policy from `start` until the terminal state is reached, the
// policy has no action, or `max_steps` moves were made.
// Returns the visited (state, action) pairs and the total undiscounted reward.
pub fn rollout<M: Mdp>(
    mdp: &M,
    policy: &Policy<M::State, M::Action>,
    start: &M::State,
    max_steps: usize,
) -> (Vec<(M::State, M::Action)>, f64) {
    let terminal = mdp.terminal_state();
    let mut state = start.clone();
    let mut path = Vec::new();
    let mut total_reward = 0.0;

    for _ in 0..max_steps {
        if state == terminal {
            break;
        }
        let action = match policy.action(&state) {
            Some(action) => action.clone(),
            None => break,
        };

        let (next_state, reward) = mdp.step(&state, &action);
        total_reward += reward;
        path.push((state, action));
        state = next_state;
    }

    (path, total_reward)
}
