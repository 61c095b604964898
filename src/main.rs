use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use plotlib::{
    page::Page,
    repr::Plot,
    style::{PointMarker, PointStyle},
    view::ContinuousView,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toh_solver::hanoi::{policy_table, value_table, TohConfig, TohMdp};
use toh_solver::solver::*;

#[derive(Parser)]
#[command(name = "toh_solver")]
#[command(author, version, about = "Solve the Tower of Hanoi MDP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Number of disks
    #[arg(long, default_value_t = 3, env = "TOH_DISKS", global = true)]
    disks: u8,

    /// Number of pegs
    #[arg(long, default_value_t = 3, env = "TOH_PEGS", global = true)]
    pegs: u8,

    /// Discount factor
    #[arg(long, default_value_t = 0.9, env = "TOH_GAMMA", global = true)]
    gamma: f64,

    /// Print the value and policy of every state
    #[arg(long, global = true)]
    tables: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep value iteration until the largest value change drops below a threshold
    ValueIteration {
        #[arg(long, default_value_t = 1e-6)]
        threshold: f64,

        #[arg(long, default_value_t = 1000)]
        max_sweeps: usize,

        /// Plot the largest value change of every sweep
        #[arg(long)]
        plot: bool,
    },

    /// Learn action values from sampled episodes
    QLearning {
        #[arg(long, default_value_t = 2000)]
        episodes: usize,

        #[arg(long, default_value_t = 500)]
        max_episode_steps: usize,

        /// Exploration seed, random when omitted
        #[arg(long, env = "TOH_SEED")]
        seed: Option<u64>,
    },
}

fn print_deltas(deltas: &[f64]) -> Result<()> {
    let values: Vec<(f64, f64)> = deltas
        .iter()
        .enumerate()
        .filter(|(_, delta)| **delta > 0.0)
        .map(|(i, delta)| ((i + 1) as f64, delta.log10()))
        .collect();
    if values.len() < 2 {
        return Ok(());
    }

    let s1 = Plot::new(values).point_style(PointStyle::new().marker(PointMarker::Circle));
    let v = ContinuousView::new()
        .add(s1)
        .x_range(0.0, (deltas.len() + 1) as f64)
        .x_label("Sweep")
        .y_label("log10(max delta)");
    let page = Page::single(&v)
        .dimensions(100, 30)
        .to_text()
        .map_err(|e| anyhow!("failed to plot deltas: {}", e))?;
    println!("{}", page);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("toh_solver={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mdp = TohMdp::new(TohConfig {
        disks: cli.disks,
        pegs: cli.pegs,
        gamma: cli.gamma,
        ..TohConfig::default()
    })
    .context("invalid puzzle")?;
    info!(
        states = mdp.nonterminal_states().len(),
        actions = mdp.actions().len(),
        "puzzle ready"
    );

    let (policy, state_values) = match cli.command {
        Commands::ValueIteration {
            threshold,
            max_sweeps,
            plot,
        } => {
            let report = solve(&mdp, initial_v_table(&mdp), threshold, max_sweeps)?;
            if !report.converged {
                warn!(threshold, max_sweeps, "value iteration did not converge");
            }
            if plot {
                print_deltas(&report.deltas)?;
            }
            (extract_policy(&mdp, &report.q_table), report.v_table)
        }
        Commands::QLearning {
            episodes,
            max_episode_steps,
            seed,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            info!(seed, "exploration seed");

            let mut q_table = QTable::new();
            let config = LearningConfig {
                episodes,
                max_episode_steps,
            };
            learn(
                &mdp,
                &mdp.start_state(),
                &mut q_table,
                &config,
                &schedule_epsilon,
                &schedule_alpha,
                &mut EpsilonGreedy::seeded(seed),
            )?;
            (extract_policy(&mdp, &q_table), extract_v_table(&q_table))
        }
    };

    if cli.tables {
        value_table(&mdp, &state_values).printstd();
        policy_table(&mdp, &policy).printstd();
    }

    let max_steps = mdp.nonterminal_states().len() + 1;
    let (path, total_reward) = rollout(&mdp, &policy, &mdp.start_state(), max_steps);
    let moves: Vec<_> = path
        .iter()
        .filter(|(state, _)| !mdp.is_goal(state))
        .collect();
    for (i, (state, action)) in moves.iter().enumerate() {
        println!("{:>3}. {} {}", i + 1, state, action);
    }

    if path.last().map_or(true, |(state, _)| !mdp.is_goal(state)) {
        warn!(moves = moves.len(), "policy does not reach the goal");
    } else {
        info!(moves = moves.len(), total_reward, "goal reached");
    }
    Ok(())
}
