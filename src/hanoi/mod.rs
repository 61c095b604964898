use std::fmt;

use prettytable::{Cell, Row, Table};
use thiserror::Error;

use crate::solver::{Mdp, MdpConfig, Policy, VTable};

// Larger puzzles make full state enumeration impractical.
const MAX_STATES: usize = 1 << 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HanoiError {
    #[error("puzzle needs at least one disk")]
    NoDisks,

    #[error("puzzle needs at least 3 pegs, got {0}")]
    TooFewPegs(u8),

    #[error("discount factor must be in (0, 1], got {0}")]
    InvalidDiscount(f64),

    #[error("{pegs} pegs with {disks} disks give more than {max} states")]
    TooManyStates { disks: u8, pegs: u8, max: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TohState {
    // Peg of every disk, smallest disk first.
    Disks(Vec<u8>),
    Terminal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TohAction {
    pub from: u8,
    pub to: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TohConfig {
    pub disks: u8,
    pub pegs: u8,
    pub gamma: f64,
    // Collected when leaving a goal state for the terminal state.
    pub goal_reward: f64,
    pub step_reward: f64,
    // Moves from an empty peg or onto a smaller disk leave the state unchanged.
    pub illegal_reward: f64,
}

impl Default for TohConfig {
    fn default() -> Self {
        TohConfig {
            disks: 3,
            pegs: 3,
            gamma: 0.9,
            goal_reward: 100.0,
            step_reward: -1.0,
            illegal_reward: -10.0,
        }
    }
}

impl TohConfig {
    pub fn validate(&self) -> Result<(), HanoiError> {
        if self.disks == 0 {
            return Err(HanoiError::NoDisks);
        }
        if self.pegs < 3 {
            return Err(HanoiError::TooFewPegs(self.pegs));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(HanoiError::InvalidDiscount(self.gamma));
        }

        let too_many = HanoiError::TooManyStates {
            disks: self.disks,
            pegs: self.pegs,
            max: MAX_STATES,
        };
        (self.pegs as usize)
            .checked_pow(self.disks as u32)
            .filter(|count| *count <= MAX_STATES)
            .map(|_| ())
            .ok_or(too_many)
    }
}

impl fmt::Display for TohState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TohState::Disks(pegs) => {
                let pegs: Vec<String> = pegs.iter().map(|peg| peg.to_string()).collect();
                write!(f, "[{}]", pegs.join(" "))
            }
            TohState::Terminal => write!(f, "terminal"),
        }
    }
}

impl fmt::Display for TohAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}→{}", self.from, self.to)
    }
}

// Top (smallest) disk on `peg`, if any.
fn top_disk(pegs: &[u8], peg: u8) -> Option<usize> {
    pegs.iter().position(|p| *p == peg)
}

#[derive(Debug, Clone)]
pub struct TohMdp {
    puzzle: TohConfig,
    config: MdpConfig,
    states: Vec<TohState>,
    actions: Vec<TohAction>,
}

impl TohMdp {
    pub fn new(puzzle: TohConfig) -> Result<Self, HanoiError> {
        puzzle.validate()?;

        let disks = puzzle.disks as usize;
        let pegs = puzzle.pegs as usize;
        let count = pegs.pow(disks as u32);

        // Enumerate all assignments of disks to pegs, disk 0 as the lowest digit.
        let states = (0..count)
            .map(|index| {
                let assignment = (0..disks)
                    .map(|disk| ((index / pegs.pow(disk as u32)) % pegs) as u8)
                    .collect();
                TohState::Disks(assignment)
            })
            .collect();

        let actions = (0..puzzle.pegs)
            .flat_map(|from| {
                (0..puzzle.pegs)
                    .filter(move |to| *to != from)
                    .map(move |to| TohAction { from, to })
            })
            .collect();

        Ok(TohMdp {
            puzzle,
            config: MdpConfig { gamma: puzzle.gamma },
            states,
            actions,
        })
    }

    pub fn puzzle(&self) -> &TohConfig {
        &self.puzzle
    }

    // All disks on the first peg.
    pub fn start_state(&self) -> TohState {
        TohState::Disks(vec![0; self.puzzle.disks as usize])
    }

    // All disks on the last peg.
    pub fn goal_state(&self) -> TohState {
        TohState::Disks(vec![self.puzzle.pegs - 1; self.puzzle.disks as usize])
    }

    // Disk assignment after `action`, None if the move is illegal.
    pub fn apply(&self, pegs: &[u8], action: &TohAction) -> Option<Vec<u8>> {
        let moved = top_disk(pegs, action.from)?;
        if let Some(blocking) = top_disk(pegs, action.to) {
            if blocking < moved {
                return None;
            }
        }

        let mut next = pegs.to_vec();
        next[moved] = action.to;
        Some(next)
    }

    pub fn is_legal(&self, state: &TohState, action: &TohAction) -> bool {
        match state {
            TohState::Disks(pegs) => self.apply(pegs, action).is_some(),
            TohState::Terminal => false,
        }
    }
}

impl Mdp for TohMdp {
    type State = TohState;
    type Action = TohAction;

    fn nonterminal_states(&self) -> &[TohState] {
        &self.states
    }

    fn actions(&self) -> &[TohAction] {
        &self.actions
    }

    fn terminal_state(&self) -> TohState {
        TohState::Terminal
    }

    fn step(&self, state: &TohState, action: &TohAction) -> (TohState, f64) {
        match state {
            TohState::Terminal => (TohState::Terminal, 0.0),
            _ if self.is_goal(state) => (TohState::Terminal, self.puzzle.goal_reward),
            TohState::Disks(pegs) => match self.apply(pegs, action) {
                Some(next) => (TohState::Disks(next), self.puzzle.step_reward),
                None => (state.clone(), self.puzzle.illegal_reward),
            },
        }
    }

    fn reward(&self, state: &TohState, _action: &TohAction, next_state: &TohState) -> f64 {
        match (state, next_state) {
            (TohState::Terminal, _) => 0.0,
            (_, TohState::Terminal) => self.puzzle.goal_reward,
            _ if state == next_state => self.puzzle.illegal_reward,
            _ => self.puzzle.step_reward,
        }
    }

    fn is_goal(&self, state: &TohState) -> bool {
        match state {
            TohState::Disks(pegs) => pegs.iter().all(|peg| *peg == self.puzzle.pegs - 1),
            TohState::Terminal => false,
        }
    }

    fn config(&self) -> &MdpConfig {
        &self.config
    }
}

pub fn policy_table(mdp: &TohMdp, policy: &Policy<TohState, TohAction>) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("State"), Cell::new("Action")]));
    for state in mdp.nonterminal_states() {
        let symbol = match policy.action(state) {
            Some(action) => action.to_string(),
            None => "?".to_string(),
        };
        table.add_row(Row::new(vec![
            Cell::new(state.to_string().as_str()),
            Cell::new(symbol.as_str()),
        ]));
    }
    table
}

pub fn value_table(mdp: &TohMdp, state_values: &VTable<TohState>) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("State"), Cell::new("Value")]));
    for state in mdp.nonterminal_states() {
        let value = match state_values.get(state) {
            Some(value) => format!("{:.2}", value),
            None => "-".to_string(),
        };
        table.add_row(Row::new(vec![
            Cell::new(state.to_string().as_str()),
            Cell::new(value.as_str()),
        ]));
    }
    table
}
