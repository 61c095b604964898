use tracing::{debug, info};

use crate::solver::error::Result;
use crate::solver::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningConfig {
    pub episodes: usize,
    // Episodes that do not reach the terminal state are cut after this many steps.
    pub max_episode_steps: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            episodes: 2000,
            max_episode_steps: 500,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearningReport {
    // Total number of Q updates, i.e. the last step count fed to the schedules.
    pub updates: u64,
    pub completed_episodes: usize,
    pub episode_lengths: Vec<usize>,
}

/// Runs Q-learning episodes from `start`, updating `q_table` in place.
///
/// Each step samples an action with `choose_next_action`, observes the
/// transition through `Mdp::step` and feeds it to `q_update`. A goal state is
/// left with the first action, which takes the episode to the terminal
/// state. The global step count drives both schedules.
pub fn learn<M, E, Eps, Alpha>(
    mdp: &M,
    start: &M::State,
    q_table: &mut QTable<M::State, M::Action>,
    config: &LearningConfig,
    epsilon: &Eps,
    alpha: &Alpha,
    exploration: &mut E,
) -> Result<LearningReport>
where
    M: Mdp,
    E: Exploration<M::Action> + ?Sized,
    Eps: Schedule + ?Sized,
    Alpha: Schedule + ?Sized,
{
    let exit_action = mdp.actions().first().ok_or(SolverError::NoActions)?;
    let terminal = mdp.terminal_state();
    let mut report = LearningReport::default();

    for episode in 0..config.episodes {
        let mut state = start.clone();
        let mut steps = 0;
        let mut completed = false;

        while steps < config.max_episode_steps {
            report.updates += 1;
            steps += 1;
            let n = report.updates;

            let action = if mdp.is_goal(&state) {
                exit_action.clone()
            } else {
                choose_next_action(mdp, &state, epsilon.value(n), q_table, exploration)?
            };
            let (next_state, reward) = mdp.step(&state, &action);
            let transition = Transition {
                state,
                action,
                reward,
                next_state,
            };
            q_update(mdp, q_table, &transition, alpha.value(n));

            if transition.next_state == terminal {
                completed = true;
                break;
            }
            state = transition.next_state;
        }

        if completed {
            report.completed_episodes += 1;
        }
        report.episode_lengths.push(steps);
        debug!(episode, steps, completed, "q-learning episode");
    }

    info!(
        episodes = config.episodes,
        completed = report.completed_episodes,
        updates = report.updates,
        entries = q_table.len(),
        "q-learning finished"
    );
    Ok(report)
}
