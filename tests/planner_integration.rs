//! End-to-end planner scenarios

use ahash::AHashSet;
use proptest::prelude::*;

use ironfront::combat::{ReachabilityThreatModel, StrengthOracle};
use ironfront::core::config::PlannerConfig;
use ironfront::core::types::{PlayerId, Relations, TerritoryId, UnitId};
use ironfront::executor::{MoveExecutor, RecordingExecutor};
use ironfront::map::{TerritoryGraph, TerritoryKind, Unit, UnitKind};
use ironfront::planner::NonCombatPlanner;

const US: PlayerId = PlayerId(0);
const THEM: PlayerId = PlayerId(1);

fn infantry(owner: PlayerId, at: TerritoryId, movement: u32) -> Unit {
    let mut unit = Unit::new(UnitId(0), owner, UnitKind::Land, at);
    unit.attack = 1;
    unit.defense = 2;
    unit.cost = 3;
    unit.movement = movement;
    unit.transport_cost = 1;
    unit
}

fn plan(graph: &TerritoryGraph) -> ironfront::planner::PlanOutcome {
    let relations = Relations::new();
    let config = PlannerConfig::low_luck();
    let oracle = StrengthOracle::new();
    let threat_model = ReachabilityThreatModel::new();
    let planner =
        NonCombatPlanner::new(graph, &relations, US, &config, &oracle, &threat_model)
            .expect("valid config");
    planner.plan(None, None)
}

#[test]
fn test_reserves_reinforce_threatened_capital() {
    let mut graph = TerritoryGraph::new();
    let capital = graph.add_territory("capital", TerritoryKind::Land, Some(US), 3);
    graph.set_capital(capital);
    let rear = graph.add_territory("rear", TerritoryKind::Land, Some(US), 1);
    let hostile = graph.add_territory("hostile", TerritoryKind::Land, Some(THEM), 2);
    graph.connect(capital, rear);
    graph.connect(capital, hostile);

    let mut factory = Unit::new(UnitId(0), US, UnitKind::Infrastructure, capital);
    factory.can_produce_units = true;
    graph.add_unit(factory);
    // Garrison that cannot leave
    graph.add_unit(infantry(US, capital, 0));
    graph.add_unit(infantry(US, capital, 0));
    let reserve = graph.add_unit(infantry(US, rear, 1));
    for _ in 0..3 {
        graph.add_unit(infantry(THEM, hostile, 1));
    }

    let outcome = plan(&graph);
    let order = outcome
        .plan
        .moves
        .iter()
        .find(|o| o.unit == reserve)
        .expect("reserve was ordered");
    assert_eq!(order.to, capital);
    assert!(outcome.move_map[&capital].can_hold);
}

#[test]
fn test_no_attackers_units_fall_through_to_placement() {
    let mut graph = TerritoryGraph::new();
    let rear = graph.add_territory("rear", TerritoryKind::Land, Some(US), 1);
    let front = graph.add_territory("front", TerritoryKind::Land, Some(US), 2);
    let empty = graph.add_territory("empty", TerritoryKind::Land, Some(THEM), 3);
    graph.connect(rear, front);
    graph.connect(front, empty);
    let mover = graph.add_unit(infantry(US, rear, 1));

    let outcome = plan(&graph);
    // With nothing to defend against, the unit still advances toward the
    // valuable side of the map
    let order = outcome
        .plan
        .moves
        .iter()
        .find(|o| o.unit == mover)
        .expect("unit was placed");
    assert_eq!(order.to, front);
}

#[test]
fn test_transport_lifts_two_units_to_coastal_front() {
    let mut graph = TerritoryGraph::new();
    let island = graph.add_territory("island", TerritoryKind::Land, Some(US), 1);
    let near_sea = graph.add_territory("near sea", TerritoryKind::Water, None, 0);
    let far_sea = graph.add_territory("far sea", TerritoryKind::Water, None, 0);
    let coast = graph.add_territory("coast", TerritoryKind::Land, Some(US), 2);
    let hostile = graph.add_territory("hostile", TerritoryKind::Land, Some(THEM), 3);
    graph.connect(island, near_sea);
    graph.connect(near_sea, far_sea);
    graph.connect(far_sea, coast);
    graph.connect(coast, hostile);

    let first = graph.add_unit(infantry(US, island, 1));
    let second = graph.add_unit(infantry(US, island, 1));
    // Coast garrison so the beachhead itself is not the cargo
    graph.add_unit(infantry(US, coast, 1));
    graph.add_unit(infantry(US, coast, 1));
    graph.add_unit(infantry(THEM, hostile, 1));
    let mut transport = Unit::new(UnitId(0), US, UnitKind::Transport, near_sea);
    transport.cost = 7;
    transport.movement = 2;
    transport.transport_capacity = 2;
    let transport = graph.add_unit(transport);

    let outcome = plan(&graph);
    let order = outcome
        .plan
        .amphib
        .iter()
        .find(|o| o.transport == transport)
        .expect("transport was used");
    assert_eq!(order.destination, coast);
    assert_eq!(order.unload_at, far_sea);
    let cargo: AHashSet<UnitId> = order.cargo.iter().copied().collect();
    let expected: AHashSet<UnitId> = [first, second].into_iter().collect();
    assert_eq!(cargo, expected);
}

#[test]
fn test_stuck_unit_receives_no_order() {
    let mut graph = TerritoryGraph::new();
    let alone = graph.add_territory("alone", TerritoryKind::Land, Some(US), 1);
    let water = graph.add_territory("water", TerritoryKind::Water, None, 0);
    graph.connect(alone, water);
    let stuck = graph.add_unit(infantry(US, alone, 1));

    let outcome = plan(&graph);
    assert!(outcome.plan.moves.iter().all(|o| o.unit != stuck));
    // The unit is pinned in place and counted as an immovable defender
    assert!(outcome.move_map[&alone].cant_move_units.contains(&stuck));
}

#[test]
fn test_plan_passes_executor_validation() {
    let mut graph = TerritoryGraph::new();
    let a = graph.add_territory("a", TerritoryKind::Land, Some(US), 2);
    let b = graph.add_territory("b", TerritoryKind::Land, Some(US), 1);
    let c = graph.add_territory("c", TerritoryKind::Land, Some(US), 3);
    let d = graph.add_territory("d", TerritoryKind::Land, Some(THEM), 2);
    graph.connect(a, b);
    graph.connect(b, c);
    graph.connect(c, d);
    graph.add_unit(infantry(US, a, 2));
    graph.add_unit(infantry(US, b, 1));
    graph.add_unit(infantry(US, c, 0));
    graph.add_unit(infantry(THEM, d, 1));
    graph.add_unit(infantry(THEM, d, 1));

    let outcome = plan(&graph);
    let mut executor = RecordingExecutor::new();
    executor
        .execute(&graph, &Relations::new(), &outcome.plan, true)
        .expect("every order is legal");
}

fn line_map(width: usize, placements: &[usize], productions: &[u32]) -> TerritoryGraph {
    let mut graph = TerritoryGraph::new();
    let mut ids = Vec::new();
    for x in 0..width {
        ids.push(graph.add_territory(
            &format!("t{}", x),
            TerritoryKind::Land,
            Some(US),
            productions[x],
        ));
    }
    let enemy = graph.add_territory(
        "enemy",
        TerritoryKind::Land,
        Some(THEM),
        productions[width % productions.len()],
    );
    for pair in ids.windows(2) {
        graph.connect(pair[0], pair[1]);
    }
    graph.connect(ids[width - 1], enemy);
    graph.add_unit(infantry(THEM, enemy, 1));
    for &slot in placements {
        graph.add_unit(infantry(US, ids[slot % width], (slot % 3) as u32));
    }
    graph
}

proptest! {
    /// Random line maps: every plan validates and no unit is ordered twice
    #[test]
    fn prop_orders_are_legal_and_exclusive(
        width in 2usize..6,
        placements in proptest::collection::vec(0usize..6, 1..8),
        productions in proptest::collection::vec(1u32..5, 6),
    ) {
        let graph = line_map(width, &placements, &productions);
        let outcome = plan(&graph);

        let mut executor = RecordingExecutor::new();
        prop_assert!(executor
            .execute(&graph, &Relations::new(), &outcome.plan, true)
            .is_ok());

        let mut seen: AHashSet<UnitId> = AHashSet::new();
        for order in &outcome.plan.moves {
            prop_assert!(seen.insert(order.unit), "unit ordered twice");
        }
        for order in &outcome.plan.amphib {
            prop_assert!(seen.insert(order.transport));
            for &unit in &order.cargo {
                prop_assert!(seen.insert(unit));
            }
        }
    }

    /// Random line maps: every owned unit ends the turn with exactly one
    /// account of itself. An ordered unit starts from where it stands; an
    /// unordered unit is only ever booked at its current territory.
    #[test]
    fn prop_every_unit_is_accounted_for(
        width in 2usize..6,
        placements in proptest::collection::vec(0usize..6, 1..8),
        productions in proptest::collection::vec(1u32..5, 6),
    ) {
        let graph = line_map(width, &placements, &productions);
        let outcome = plan(&graph);

        let mut ordered: AHashSet<UnitId> = AHashSet::new();
        for order in &outcome.plan.moves {
            prop_assert_eq!(order.from, graph.unit(order.unit).location);
            prop_assert!(order.to != order.from, "order to stay in place");
            ordered.insert(order.unit);
        }
        for order in &outcome.plan.amphib {
            ordered.insert(order.transport);
            ordered.extend(order.cargo.iter().copied());
        }

        for unit in graph.units().filter(|u| u.owner == US) {
            let booked_at: Vec<TerritoryId> = outcome
                .move_map
                .iter()
                .filter(|(_, a)| {
                    a.units.contains(&unit.id) || a.cant_move_units.contains(&unit.id)
                })
                .map(|(&t, _)| t)
                .collect();
            prop_assert!(booked_at.len() <= 1, "unit booked at several territories");
            if !ordered.contains(&unit.id) {
                for &t in &booked_at {
                    prop_assert_eq!(t, unit.location, "unordered unit booked away from home");
                }
            }
        }
    }
}
