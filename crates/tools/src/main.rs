use std::fs;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use nav_core::engine::{Bounds, is_reachable, validate_level};
use nav_core::{DoorId, Grid, GridSpec, Possession, Pos, Reachability};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that a level's goal is reachable from its spawn empty-handed
    Validate {
        /// Path to the level spec JSON file
        level: String,
        #[arg(long, default_value_t = 4096)]
        max_states: usize,
        #[arg(long, default_value_t = 64)]
        max_tokens: usize,
    },
    /// Ask a single reachability question against a level
    Probe {
        /// Path to the level spec JSON file
        level: String,
        #[arg(long)]
        start_y: i32,
        #[arg(long)]
        start_x: i32,
        /// Goal row; defaults to the level's goal
        #[arg(long)]
        goal_y: Option<i32>,
        /// Goal column; defaults to the level's goal
        #[arg(long)]
        goal_x: Option<i32>,
        /// Door ids whose keys the agent already holds (repeatable)
        #[arg(long = "key")]
        keys: Vec<u8>,
    },
}

fn load_grid(path: &str) -> Result<Grid> {
    let data =
        fs::read_to_string(path).with_context(|| format!("Failed to read level file: {path}"))?;
    let spec: GridSpec =
        serde_json::from_str(&data).with_context(|| "Failed to deserialize level JSON")?;
    Grid::from_spec(&spec).map_err(|e| anyhow::anyhow!("Level spec rejected: {e:?}"))
}

fn report(verdict: Reachability) -> Result<()> {
    match verdict {
        Reachability::Reachable => {
            println!("Verdict: reachable");
            Ok(())
        }
        Reachability::Unreachable(reason) => {
            println!("Verdict: unreachable ({reason:?})");
            bail!("goal unreachable");
        }
        Reachability::Inconclusive(bound) => {
            println!("Verdict: inconclusive (search bound {bound:?} exhausted)");
            bail!("verdict inconclusive; raise the search bounds");
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Validate { level, max_states, max_tokens } => {
            let grid = load_grid(&level)?;
            let verdict = validate_level(&grid, Bounds { max_states, max_tokens });
            println!("Level: {level} ({}x{})", grid.width(), grid.height());
            println!("Spawn: {:?}  Goal: {:?}", grid.spawn(), grid.goal());
            report(verdict)
        }
        Command::Probe { level, start_y, start_x, goal_y, goal_x, keys } => {
            let grid = load_grid(&level)?;
            let start = Pos { y: start_y, x: start_x };
            let goal = Pos {
                y: goal_y.unwrap_or(grid.goal().y),
                x: goal_x.unwrap_or(grid.goal().x),
            };
            let mut held = Possession::default();
            for door in keys {
                held.add_key(DoorId(door));
            }
            let verdict = is_reachable(&grid, start, &held, goal, Bounds::default());
            println!("Probe: {start:?} -> {goal:?} holding {} key(s)", held.key_count());
            report(verdict)
        }
    }
}
