//! Demo driver: plan one non-combat phase on a generated front line
//!
//! Builds a small seeded map (friendly west, hostile east, a sea lane in
//! between), runs the planner for the western player and prints the plan
//! as JSON.

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ironfront::combat::{ReachabilityThreatModel, StrengthOracle};
use ironfront::core::config::PlannerConfig;
use ironfront::core::error::Result;
use ironfront::core::types::{PlayerId, Relations, TerritoryId, UnitId};
use ironfront::executor::{MoveExecutor, RecordingExecutor};
use ironfront::map::{TerritoryGraph, TerritoryKind, Unit, UnitKind};
use ironfront::planner::NonCombatPlanner;

#[derive(Parser, Debug)]
#[command(name = "skirmish", about = "Plan one non-combat phase on a generated map")]
struct Args {
    /// Seed for map generation and the combat oracle
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Map width in territories
    #[arg(long, default_value_t = 6)]
    width: u32,

    /// Map height in territories
    #[arg(long, default_value_t = 4)]
    height: u32,

    /// Use standard-dice thresholds instead of low-luck
    #[arg(long)]
    standard: bool,
}

const US: PlayerId = PlayerId(0);
const THEM: PlayerId = PlayerId(1);

fn infantry(owner: PlayerId, at: TerritoryId) -> Unit {
    let mut unit = Unit::new(UnitId(0), owner, UnitKind::Land, at);
    unit.attack = 1;
    unit.defense = 2;
    unit.cost = 3;
    unit.movement = 1;
    unit.transport_cost = 1;
    unit
}

fn armour(owner: PlayerId, at: TerritoryId) -> Unit {
    let mut unit = Unit::new(UnitId(0), owner, UnitKind::Land, at);
    unit.attack = 3;
    unit.defense = 3;
    unit.cost = 6;
    unit.movement = 2;
    unit.transport_cost = 2;
    unit
}

fn transport(owner: PlayerId, at: TerritoryId) -> Unit {
    let mut unit = Unit::new(UnitId(0), owner, UnitKind::Transport, at);
    unit.cost = 7;
    unit.movement = 2;
    unit.transport_capacity = 2;
    unit
}

/// Grid map: columns west of the middle are ours, the middle column is a
/// sea lane, everything east belongs to the enemy
fn generate_map(rng: &mut ChaCha8Rng, width: u32, height: u32) -> TerritoryGraph {
    let mut graph = TerritoryGraph::new();
    let sea_column = width / 2;
    let mut grid: Vec<Vec<TerritoryId>> = Vec::new();
    for x in 0..width {
        let mut column = Vec::new();
        for y in 0..height {
            let name = format!("t{}-{}", x, y);
            let id = if x == sea_column {
                graph.add_territory(&name, TerritoryKind::Water, None, 0)
            } else {
                let owner = if x < sea_column { US } else { THEM };
                graph.add_territory(&name, TerritoryKind::Land, Some(owner), rng.gen_range(1..=4))
            };
            column.push(id);
        }
        grid.push(column);
    }
    for x in 0..width as usize {
        for y in 0..height as usize {
            if x + 1 < width as usize {
                graph.connect(grid[x][y], grid[x + 1][y]);
            }
            if y + 1 < height as usize {
                graph.connect(grid[x][y], grid[x][y + 1]);
            }
        }
    }
    graph.set_capital(grid[0][0]);
    graph.set_capital(grid[width as usize - 1][height as usize - 1]);

    for column in grid.iter().take(sea_column as usize) {
        for &t in column {
            for _ in 0..rng.gen_range(0..3) {
                graph.add_unit(infantry(US, t));
            }
            if rng.gen_bool(0.3) {
                graph.add_unit(armour(US, t));
            }
        }
    }
    for column in grid.iter().skip(sea_column as usize + 1) {
        for &t in column {
            for _ in 0..rng.gen_range(1..4) {
                graph.add_unit(infantry(THEM, t));
            }
        }
    }
    graph.add_unit(transport(US, grid[sea_column as usize][0]));
    graph
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let graph = generate_map(&mut rng, args.width.max(3), args.height.max(1));
    let relations = Relations::new();
    let config = if args.standard {
        PlannerConfig::standard()
    } else {
        PlannerConfig::low_luck()
    };
    let oracle = StrengthOracle::with_seed(args.seed);
    let threat_model = ReachabilityThreatModel::new();

    let planner = NonCombatPlanner::new(&graph, &relations, US, &config, &oracle, &threat_model)?;
    let outcome = planner.plan(None, None);

    let mut executor = RecordingExecutor::new();
    executor.execute(&graph, &relations, &outcome.plan, false)?;
    info!(
        moves = executor.orders.len(),
        amphib = executor.amphib_orders.len(),
        "plan validated"
    );

    let name_of = |t: TerritoryId| graph.territory(t).name.clone();
    for order in &executor.orders {
        info!(unit = ?order.unit, from = %name_of(order.from), to = %name_of(order.to), "move");
    }
    println!("{}", serde_json::to_string_pretty(&outcome.plan)?);
    Ok(())
}
