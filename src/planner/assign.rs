//! Defense assignment: the window fixed-point search
//!
//! Tries to defend the top `n` prioritized territories at once, growing the
//! window while every territory in it verifies and shrinking the priority
//! list when one cannot be saved. Each iteration restarts from a clean
//! trial state, so a failed window leaves nothing behind.

use ahash::{AHashMap, AHashSet};
use tracing::{debug, trace};

use crate::combat::oracle::BattleOutcome;
use crate::core::types::{TerritoryId, UnitId};
use crate::map::routes::Passability;
use crate::planner::assessment::{sorted_keys, MoveMap, TerritoryAssessment};
use crate::planner::pool::UnitPool;
use crate::planner::transport::{carrier_capacity_allows, units_to_transport, AmphibPlan};
use crate::planner::value;
use crate::planner::PlanContext;

/// Defenders relevant to a battle estimate: committed, immovable and trial
/// units, minus AA guns, minus allied air over land (allied air cannot be
/// counted on to defend ground it cannot scramble over)
pub(crate) fn estimate_defenders(ctx: &PlanContext, assessment: &TerritoryAssessment) -> Vec<UnitId> {
    let on_land = ctx.graph.territory(assessment.territory).is_land();
    assessment
        .all_defenders()
        .into_iter()
        .filter(|&id| {
            let unit = ctx.graph.unit(id);
            if unit.is_aa {
                return false;
            }
            !(on_land && unit.is_air() && unit.owner != ctx.player)
        })
        .collect()
}

/// Battle outcome for a territory's current defender set, cached on the
/// assessment until the defenders change
pub(crate) fn cached_outcome(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    t: TerritoryId,
) -> Option<BattleOutcome> {
    let defenders = {
        let assessment = move_map.get(&t)?;
        if let Some(outcome) = assessment.battle_outcome {
            return Some(outcome);
        }
        estimate_defenders(ctx, assessment)
    };
    let assessment = move_map.get(&t)?;
    let outcome = ctx.oracle.evaluate(
        ctx.graph,
        t,
        &assessment.max_enemy_units,
        &defenders,
        &assessment.max_enemy_bombard_units,
    );
    if let Some(assessment) = move_map.get_mut(&t) {
        assessment.battle_outcome = Some(outcome);
    }
    Some(outcome)
}

fn add_temp(move_map: &mut MoveMap, t: TerritoryId, unit: UnitId) {
    if let Some(assessment) = move_map.get_mut(&t) {
        assessment.add_temp_unit(unit);
        assessment.battle_outcome = None;
    }
}

/// Allied carrier-borne fighters stacked with a moving carrier follow it
pub(crate) fn pull_carrier_air(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    assigned: &mut AHashSet<UnitId>,
    carrier: UnitId,
    destination: TerritoryId,
) {
    let unit = ctx.graph.unit(carrier);
    if !unit.is_carrier() {
        return;
    }
    let mut capacity = unit.carrier_capacity;
    let dependents: Vec<UnitId> = ctx
        .graph
        .units_in(unit.location)
        .filter(|u| {
            u.can_land_on_carrier
                && u.owner != ctx.player
                && ctx.relations.is_allied(ctx.player, u.owner)
        })
        .map(|u| u.id)
        .collect();
    for air in dependents {
        if capacity == 0 {
            break;
        }
        if assigned.insert(air) {
            add_temp(move_map, destination, air);
            capacity -= 1;
        }
    }
}

/// Whether the land forces the plan keeps near the capital outmatch every
/// enemy land unit within `enemy_distance` of it
pub(crate) fn has_local_land_superiority(
    ctx: &PlanContext,
    move_map: &MoveMap,
    capital: TerritoryId,
    enemy_distance: u32,
) -> bool {
    let passable = Passability::land(ctx.relations, ctx.player, true);
    let mut attackers: Vec<UnitId> = Vec::new();
    let mut threat_zone = vec![capital];
    threat_zone.extend(ctx.graph.neighbors_within(capital, enemy_distance, &passable));
    for t in &threat_zone {
        for unit in ctx.graph.units_in(*t) {
            if unit.is_land() && !unit.is_aa && ctx.relations.is_enemy(ctx.player, unit.owner) {
                attackers.push(unit.id);
            }
        }
    }
    if attackers.is_empty() {
        return true;
    }

    let defense_radius = enemy_distance.saturating_sub(1);
    let mut defense_zone = vec![capital];
    defense_zone.extend(ctx.graph.neighbors_within(capital, defense_radius, &passable));
    let mut defenders: Vec<UnitId> = Vec::new();
    for t in &defense_zone {
        match move_map.get(t) {
            Some(assessment) => {
                defenders.extend(assessment.all_defenders().into_iter().filter(|&id| {
                    let unit = ctx.graph.unit(id);
                    unit.is_land() && !unit.is_aa && ctx.relations.is_allied(ctx.player, unit.owner)
                }));
            }
            None => {
                defenders.extend(ctx.graph.units_in(*t).filter_map(|unit| {
                    (unit.is_land() && !unit.is_aa && ctx.relations.is_allied(ctx.player, unit.owner))
                        .then_some(unit.id)
                }));
            }
        }
    }
    defenders.sort_unstable();
    defenders.dedup();

    ctx.oracle
        .estimate_strength_difference(ctx.graph, capital, &attackers, &defenders)
        <= 50.0
}

/// Grow-and-verify search over the prioritized defense list
///
/// On return, the verified defenders are committed into the move map and
/// claimed out of the pools; `prioritized` retains only the territories the
/// final window could actually hold.
#[allow(clippy::too_many_arguments)]
pub(crate) fn move_units_to_defend(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    pool: &mut UnitPool,
    transport_pool: &mut UnitPool,
    amphib_plans: &mut Vec<AmphibPlan>,
    prioritized: &mut Vec<TerritoryId>,
    strategic_values: &AHashMap<TerritoryId, f64>,
    enemy_distance: Option<u32>,
) {
    if prioritized.is_empty() {
        return;
    }
    let mut num_to_defend = 1usize;
    loop {
        for t in sorted_keys(move_map) {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.reset_temp();
            }
        }
        let window: Vec<TerritoryId> = prioritized.iter().copied().take(num_to_defend).collect();
        trace!(window = ?window, "trying defense window");
        let mut assigned: AHashSet<UnitId> = AHashSet::new();
        let mut moved_transports: AHashSet<UnitId> = AHashSet::new();

        let sorted_units = pool.sorted_by_fewest_options(ctx.graph, &window);

        // Heavy surface units go where the enemy advantage is largest
        for &unit_id in &sorted_units {
            let unit = ctx.graph.unit(unit_id);
            if unit.is_air() || unit.is_carrier() {
                continue;
            }
            let mut best: Option<(f64, TerritoryId)> = None;
            for t in pool.options_in(unit_id, &window) {
                let Some(assessment) = move_map.get(&t) else {
                    continue;
                };
                let defenders = estimate_defenders(ctx, assessment);
                let estimate = ctx.oracle.estimate_strength_difference(
                    ctx.graph,
                    t,
                    &assessment.max_enemy_units,
                    &defenders,
                );
                if best.map(|(e, _)| estimate > e).unwrap_or(true) {
                    best = Some((estimate, t));
                }
            }
            if let Some((estimate, t)) = best {
                if estimate > ctx.config.strength_commit_threshold {
                    add_temp(move_map, t, unit_id);
                    assigned.insert(unit_id);
                }
            }
        }

        // Remaining surface units chase the highest attacker win chance,
        // gated so they only reinforce battles worth reinforcing
        for &unit_id in &sorted_units {
            if assigned.contains(&unit_id) {
                continue;
            }
            let unit = ctx.graph.unit(unit_id);
            if unit.is_air() {
                continue;
            }
            let mut best: Option<(f64, TerritoryId)> = None;
            for t in pool.options_in(unit_id, &window) {
                let Some(outcome) = cached_outcome(ctx, move_map, t) else {
                    continue;
                };
                if !passes_commit_gate(ctx, t, &outcome) {
                    continue;
                }
                // Any territory that passes the gate qualifies, even at a
                // 0% attacker win chance
                if best.map(|(w, _)| outcome.win_percentage > w).unwrap_or(true) {
                    best = Some((outcome.win_percentage, t));
                }
            }
            if let Some((_, t)) = best {
                add_temp(move_map, t, unit_id);
                assigned.insert(unit_id);
                pull_carrier_air(ctx, move_map, &mut assigned, unit_id, t);
            }
        }

        // Air last: landing constraints depend on where everyone else went
        for &unit_id in &sorted_units {
            if assigned.contains(&unit_id) {
                continue;
            }
            let unit = ctx.graph.unit(unit_id);
            if !unit.is_air() {
                continue;
            }
            let mut best: Option<(f64, TerritoryId)> = None;
            for t in pool.options_in(unit_id, &window) {
                let territory = ctx.graph.territory(t);
                if territory.is_water() {
                    if !unit.can_land_on_carrier {
                        continue;
                    }
                    let Some(assessment) = move_map.get(&t) else {
                        continue;
                    };
                    if !carrier_capacity_allows(ctx.graph, &assessment.all_defenders(), 1) {
                        continue;
                    }
                } else if territory.owner != Some(ctx.player)
                    && !value::has_factory(ctx.graph, ctx.relations, ctx.player, t)
                {
                    // Allied soil without a base cannot service our air
                    continue;
                }
                let Some(outcome) = cached_outcome(ctx, move_map, t) else {
                    continue;
                };
                if !passes_commit_gate(ctx, t, &outcome) {
                    continue;
                }
                if best.map(|(w, _)| outcome.win_percentage > w).unwrap_or(true) {
                    best = Some((outcome.win_percentage, t));
                }
            }
            if let Some((_, t)) = best {
                add_temp(move_map, t, unit_id);
                assigned.insert(unit_id);
            }
        }

        // Idle transports bolster sea territories that are currently losing
        for transport_id in transport_pool.sorted_by_fewest_options(ctx.graph, &window) {
            if moved_transports.contains(&transport_id) {
                continue;
            }
            for t in transport_pool.options_in(transport_id, &window) {
                let Some(outcome) = cached_outcome(ctx, move_map, t) else {
                    continue;
                };
                if outcome.tuv_swing > 0.0 {
                    add_temp(move_map, t, transport_id);
                    moved_transports.insert(transport_id);
                    break;
                }
            }
        }

        // Amphibious reinforcement into window land territories
        amphib_reinforce(
            ctx,
            move_map,
            amphib_plans,
            &window,
            &mut assigned,
            &mut moved_transports,
        );

        let success = window_verifies(ctx, move_map, prioritized, num_to_defend, &window, strategic_values, enemy_distance);

        if success {
            for &t in &window {
                if let Some(assessment) = move_map.get_mut(&t) {
                    assessment.can_attack = true;
                }
            }
            num_to_defend += 1;
            if num_to_defend > prioritized.len() {
                break;
            }
        } else {
            let failed = prioritized.remove(num_to_defend - 1);
            debug!(territory = %ctx.graph.territory(failed).name, "cannot hold, dropped from defense");
            if let Some(assessment) = move_map.get_mut(&failed) {
                assessment.can_hold = false;
            }
            if prioritized.is_empty() {
                for t in sorted_keys(move_map) {
                    if let Some(assessment) = move_map.get_mut(&t) {
                        assessment.reset_temp();
                    }
                }
                break;
            }
            if num_to_defend > prioritized.len() {
                num_to_defend = prioritized.len();
            }
        }
    }

    commit_trial_state(ctx, move_map, pool, transport_pool, amphib_plans);
}

/// Whether committing another defender to `t` is worthwhile at all
fn passes_commit_gate(ctx: &PlanContext, t: TerritoryId, outcome: &BattleOutcome) -> bool {
    let capital_gate = ctx.capital == Some(t)
        && outcome.win_percentage > 100.0 - ctx.config.win_percentage;
    let factory_gate = value::has_factory(ctx.graph, ctx.relations, ctx.player, t)
        && outcome.win_percentage > 100.0 - ctx.config.min_win_percentage;
    capital_gate || factory_gate || outcome.tuv_swing >= 0.0
}

fn amphib_reinforce(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    amphib_plans: &[AmphibPlan],
    window: &[TerritoryId],
    assigned: &mut AHashSet<UnitId>,
    moved_transports: &mut AHashSet<UnitId>,
) {
    for plan in amphib_plans {
        if moved_transports.contains(&plan.transport) {
            continue;
        }
        for t in plan.destinations() {
            if !window.contains(&t) {
                continue;
            }
            let Some(outcome) = cached_outcome(ctx, move_map, t) else {
                continue;
            };
            let factory_gate = value::has_factory(ctx.graph, ctx.relations, ctx.player, t)
                && outcome.win_percentage > 100.0 - ctx.config.win_percentage;
            if !(factory_gate || outcome.tuv_swing > 0.0) {
                continue;
            }

            let mut excluded: AHashSet<UnitId> = assigned.clone();
            for assessment in move_map.values() {
                excluded.extend(assessment.units.iter().copied());
                excluded.extend(assessment.temp_units.iter().copied());
            }
            let Some(origins) = plan.transport_map.get(&t) else {
                continue;
            };
            let cargo = units_to_transport(ctx.graph, ctx.player, plan.transport, origins, &excluded);
            if cargo.is_empty() {
                continue;
            }
            let load_from: AHashSet<TerritoryId> =
                cargo.iter().map(|&id| ctx.graph.unit(id).location).collect();

            // Safest unload position adjacent to the target that still
            // reaches every pickup
            let mut best: Option<(f64, TerritoryId)> = None;
            for w in plan.sea_positions() {
                if !ctx.graph.neighbors(t).contains(&w) {
                    continue;
                }
                let Some(origins_at_w) = plan.sea_transport_map.get(&w) else {
                    continue;
                };
                if !load_from.iter().all(|l| origins_at_w.contains(l)) {
                    continue;
                }
                let Some(water) = move_map.get(&w) else {
                    continue;
                };
                if !water.can_hold {
                    continue;
                }
                let mut defenders = estimate_defenders(ctx, water);
                defenders.push(plan.transport);
                let estimate = ctx.oracle.estimate_strength_difference(
                    ctx.graph,
                    w,
                    &water.max_enemy_units,
                    &defenders,
                );
                if best.map(|(e, _)| estimate < e).unwrap_or(true) {
                    best = Some((estimate, w));
                }
            }
            let Some((_, unload_at)) = best else {
                continue;
            };

            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_temp_units(&cargo);
                assessment.temp_amphib_map.insert(plan.transport, cargo.clone());
                assessment.transport_territory_map.insert(plan.transport, unload_at);
                assessment.battle_outcome = None;
            }
            assigned.extend(cargo);
            moved_transports.insert(plan.transport);
            break;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn window_verifies(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    prioritized: &[TerritoryId],
    num_to_defend: usize,
    window: &[TerritoryId],
    strategic_values: &AHashMap<TerritoryId, f64>,
    enemy_distance: Option<u32>,
) -> bool {
    let mut success = true;
    for &t in window {
        let (outcome, hold_value, min_swing, higher_strategic, extra_tuv) = {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            let defenders = estimate_defenders(ctx, assessment);
            let outcome = ctx.oracle.evaluate(
                ctx.graph,
                t,
                &assessment.max_enemy_units,
                &defenders,
                &assessment.max_enemy_bombard_units,
            );
            let territory = ctx.graph.territory(t);
            let factory = value::has_factory(ctx.graph, ctx.relations, ctx.player, t);
            let is_my_capital = ctx.capital == Some(t);

            let extra_tuv = value::tuv(ctx.graph, &assessment.temp_units);
            let mut unsafe_transport_tuv = 0.0;
            for (&transport, &w) in &assessment.transport_territory_map {
                let holds = move_map.get(&w).map(|a| a.can_hold).unwrap_or(false);
                if !holds {
                    unsafe_transport_tuv += ctx.graph.unit(transport).cost as f64;
                }
            }
            let factory_bonus = if factory { ctx.config.factory_hold_bonus } else { 0.0 };
            let capital_bonus = if is_my_capital { ctx.config.capital_hold_bonus } else { 0.0 };
            let hold_value = extra_tuv / ctx.config.hold_value_divisor
                * (1.0 + factory_bonus)
                * (1.0 + capital_bonus)
                - unsafe_transport_tuv;

            // Pulling land defenders out of strategically better territory
            // is only allowed when the defended territory is worth it
            let mut higher_strategic = true;
            if territory.is_land() && !is_my_capital && !factory {
                let sources: Vec<f64> = assessment
                    .temp_units
                    .iter()
                    .filter(|&&id| !ctx.graph.unit(id).is_air())
                    .map(|&id| {
                        strategic_values
                            .get(&ctx.graph.unit(id).location)
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .collect();
                if !sources.is_empty() {
                    let average = sources.iter().sum::<f64>() / sources.len() as f64;
                    let own = strategic_values.get(&t).copied().unwrap_or(0.0);
                    if own < average {
                        higher_strategic = false;
                    }
                }
            }
            let min_swing = assessment.min_battle_outcome.tuv_swing;
            (outcome, hold_value, min_swing, higher_strategic, extra_tuv)
        };
        if let Some(assessment) = move_map.get_mut(&t) {
            assessment.battle_outcome = Some(outcome);
        }
        if (outcome.tuv_swing - hold_value) > min_swing
            || (!higher_strategic && (outcome.tuv_swing + extra_tuv / 2.0) >= min_swing)
        {
            success = false;
        }
    }

    let current = prioritized[num_to_defend - 1];

    // A threatened capital must never lend its defenders elsewhere
    if success {
        if let Some(capital) = ctx.capital {
            if window.contains(&capital) && current != capital {
                let capital_threatened = move_map
                    .get(&capital)
                    .and_then(|a| a.battle_outcome)
                    .map(|o| o.win_percentage > 100.0 - ctx.config.win_percentage)
                    .unwrap_or(false);
                if capital_threatened {
                    let shares_defenders = match (move_map.get(&current), move_map.get(&capital)) {
                        (Some(a), Some(c)) => {
                            let capital_defenders: AHashSet<UnitId> =
                                c.max_defenders().into_iter().collect();
                            a.all_defenders().iter().any(|id| capital_defenders.contains(id))
                        }
                        _ => false,
                    };
                    if shares_defenders {
                        success = false;
                    }
                }
            }
        }
    }

    // Keep land superiority around the capital when the enemy is close
    if success {
        if let (Some(capital), Some(enemy_distance)) = (ctx.capital, enemy_distance) {
            if (2..=3).contains(&enemy_distance) && ctx.graph.territory(current).is_land() {
                let passable = Passability::land(ctx.relations, ctx.player, true);
                let distance = ctx.graph.distance(capital, current, &passable);
                let matters = distance
                    .map(|d| d > 0 && (enemy_distance == d || enemy_distance == d.saturating_sub(1)))
                    .unwrap_or(false);
                if matters && !has_local_land_superiority(ctx, move_map, capital, enemy_distance) {
                    success = false;
                }
            }
        }
    }

    success
}

/// Promote the surviving trial state into committed moves and retire the
/// claimed units from the pools
pub(crate) fn commit_trial_state(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    pool: &mut UnitPool,
    transport_pool: &mut UnitPool,
    amphib_plans: &mut Vec<AmphibPlan>,
) {
    let mut all_committed: AHashSet<UnitId> = AHashSet::new();
    for t in sorted_keys(move_map) {
        if let Some(assessment) = move_map.get_mut(&t) {
            let committed = assessment.commit_temp_units(ctx.graph, ctx.player);
            for unit in committed {
                pool.claim(unit);
                transport_pool.claim(unit);
                all_committed.insert(unit);
            }
        }
    }
    amphib_plans.retain(|plan| !all_committed.contains(&plan.transport));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::combat::oracle::{BattleOracle, StrengthOracle};
    use crate::core::config::PlannerConfig;
    use crate::core::types::{PlayerId, Relations};
    use crate::map::territory::{TerritoryGraph, TerritoryKind};
    use crate::map::unit::{Unit, UnitKind};

    fn combat_unit(
        graph: &mut TerritoryGraph,
        owner: PlayerId,
        attack: u32,
        defense: u32,
        at: TerritoryId,
    ) -> UnitId {
        let mut unit = Unit::new(UnitId(0), owner, UnitKind::Land, at);
        unit.attack = attack;
        unit.defense = defense;
        unit.cost = 3;
        unit.movement = 1;
        graph.add_unit(unit)
    }

    struct Fixture {
        graph: TerritoryGraph,
        relations: Relations,
        config: PlannerConfig,
        oracle: StrengthOracle,
    }

    impl Fixture {
        fn ctx(&self, capital: Option<TerritoryId>) -> PlanContext<'_> {
            PlanContext {
                graph: &self.graph,
                relations: &self.relations,
                player: PlayerId(0),
                config: &self.config,
                oracle: &self.oracle,
                capital,
            }
        }
    }

    #[test]
    fn test_reinforcement_commits_to_threatened_territory() {
        let mut graph = TerritoryGraph::new();
        let front = graph.add_territory("front", TerritoryKind::Land, Some(PlayerId(0)), 3);
        let rear = graph.add_territory("rear", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let hostile = graph.add_territory("hostile", TerritoryKind::Land, Some(PlayerId(1)), 2);
        graph.connect(front, rear);
        graph.connect(front, hostile);

        let garrison = combat_unit(&mut graph, PlayerId(0), 1, 2, front);
        let reserve = combat_unit(&mut graph, PlayerId(0), 1, 3, rear);
        let attacker = combat_unit(&mut graph, PlayerId(1), 3, 1, hostile);

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx(None);

        let mut move_map = MoveMap::new();
        let mut front_assessment = TerritoryAssessment::new(front);
        front_assessment.cant_move_units = vec![garrison];
        front_assessment.max_units = vec![reserve];
        front_assessment.max_enemy_units = vec![attacker];
        front_assessment.min_battle_outcome.tuv_swing = 2.0;
        front_assessment.min_battle_outcome.win_percentage = 70.0;
        move_map.insert(front, front_assessment);

        let mut pool = UnitPool::new();
        pool.insert(reserve, [front, rear].into_iter().collect());
        let mut transport_pool = UnitPool::new();
        let mut plans = Vec::new();
        let mut prioritized = vec![front];

        move_units_to_defend(
            &ctx,
            &mut move_map,
            &mut pool,
            &mut transport_pool,
            &mut plans,
            &mut prioritized,
            &AHashMap::new(),
            None,
        );

        assert_eq!(prioritized, vec![front]);
        assert!(move_map[&front].units.contains(&reserve));
        assert!(!pool.contains(reserve));
        assert!(move_map[&front].can_attack);
    }

    #[test]
    fn test_hopeless_window_drops_territory() {
        let mut graph = TerritoryGraph::new();
        let front = graph.add_territory("front", TerritoryKind::Land, Some(PlayerId(0)), 3);
        let hostile = graph.add_territory("hostile", TerritoryKind::Land, Some(PlayerId(1)), 2);
        graph.connect(front, hostile);

        let garrison = combat_unit(&mut graph, PlayerId(0), 1, 1, front);
        let attackers: Vec<UnitId> = (0..6)
            .map(|_| combat_unit(&mut graph, PlayerId(1), 3, 1, hostile))
            .collect();

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx(None);

        let mut move_map = MoveMap::new();
        let mut assessment = TerritoryAssessment::new(front);
        assessment.cant_move_units = vec![garrison];
        assessment.max_enemy_units = attackers;
        assessment.min_battle_outcome.tuv_swing = -1.0;
        move_map.insert(front, assessment);

        let mut pool = UnitPool::new();
        let mut transport_pool = UnitPool::new();
        let mut plans = Vec::new();
        let mut prioritized = vec![front];

        move_units_to_defend(
            &ctx,
            &mut move_map,
            &mut pool,
            &mut transport_pool,
            &mut plans,
            &mut prioritized,
            &AHashMap::new(),
            None,
        );

        // Nothing can reach the front, the verified swing exceeds the
        // baseline, so the territory drops out
        assert!(prioritized.is_empty());
        assert!(!move_map[&front].can_hold);
        assert!(move_map[&front].temp_units.is_empty());
    }

    #[test]
    fn test_safe_window_territory_still_accepts_defenders() {
        let mut graph = TerritoryGraph::new();
        let front = graph.add_territory("front", TerritoryKind::Land, Some(PlayerId(0)), 3);
        let rear = graph.add_territory("rear", TerritoryKind::Land, Some(PlayerId(0)), 1);
        graph.connect(front, rear);
        let reserve = combat_unit(&mut graph, PlayerId(0), 1, 3, rear);
        let mut fighter = Unit::new(UnitId(0), PlayerId(0), UnitKind::Air, rear);
        fighter.attack = 3;
        fighter.defense = 4;
        fighter.cost = 10;
        fighter.movement = 4;
        let fighter = graph.add_unit(fighter);

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx(None);

        let mut move_map = MoveMap::new();
        let mut assessment = TerritoryAssessment::new(front);
        assessment.max_units = vec![reserve, fighter];
        move_map.insert(front, assessment);

        let mut pool = UnitPool::new();
        pool.insert(reserve, [front, rear].into_iter().collect());
        pool.insert(fighter, [front, rear].into_iter().collect());
        let mut transport_pool = UnitPool::new();
        let mut plans = Vec::new();
        let mut prioritized = vec![front];

        move_units_to_defend(
            &ctx,
            &mut move_map,
            &mut pool,
            &mut transport_pool,
            &mut plans,
            &mut prioritized,
            &AHashMap::new(),
            None,
        );

        // No attacker reaches the front, so its best win chance is exactly
        // zero; surface and air defenders must still be able to settle there
        assert!(move_map[&front].units.contains(&reserve));
        assert!(move_map[&front].units.contains(&fighter));
    }

    #[test]
    fn test_local_superiority_with_no_enemies_nearby() {
        let mut graph = TerritoryGraph::new();
        let capital = graph.add_territory("capital", TerritoryKind::Land, Some(PlayerId(0)), 5);
        graph.set_capital(capital);
        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx(Some(capital));
        assert!(has_local_land_superiority(&ctx, &MoveMap::new(), capital, 3));
    }

    proptest! {
        /// However the search ends, the surviving priority list is an
        /// in-order subsequence of the original: verified territories are
        /// never skipped or reordered, only the unverifiable window tail is
        /// demoted
        #[test]
        fn prop_window_only_grows_or_demotes_tail(
            defenses in proptest::collection::vec(1u32..5, 3),
            attacker_count in 1usize..8,
            reserve_count in 0usize..3,
        ) {
            let mut graph = TerritoryGraph::new();
            let hostile =
                graph.add_territory("hostile", TerritoryKind::Land, Some(PlayerId(1)), 2);
            let rear = graph.add_territory("rear", TerritoryKind::Land, Some(PlayerId(0)), 1);
            let mut fronts = Vec::new();
            let mut garrisons = Vec::new();
            for (i, &defense) in defenses.iter().enumerate() {
                let t = graph.add_territory(
                    &format!("front{}", i),
                    TerritoryKind::Land,
                    Some(PlayerId(0)),
                    2,
                );
                graph.connect(t, hostile);
                graph.connect(t, rear);
                garrisons.push(combat_unit(&mut graph, PlayerId(0), 1, defense, t));
                fronts.push(t);
            }
            let attackers: Vec<UnitId> = (0..attacker_count)
                .map(|_| combat_unit(&mut graph, PlayerId(1), 3, 1, hostile))
                .collect();
            let reserves: Vec<UnitId> = (0..reserve_count)
                .map(|_| combat_unit(&mut graph, PlayerId(0), 1, 3, rear))
                .collect();

            let fixture = Fixture {
                graph,
                relations: Relations::new(),
                config: PlannerConfig::default(),
                oracle: StrengthOracle::new(),
            };
            let ctx = fixture.ctx(None);

            let mut move_map = MoveMap::new();
            for (i, &t) in fronts.iter().enumerate() {
                let mut assessment = TerritoryAssessment::new(t);
                assessment.cant_move_units = vec![garrisons[i]];
                assessment.max_units = reserves.clone();
                assessment.max_enemy_units = attackers.clone();
                assessment.min_battle_outcome =
                    fixture
                        .oracle
                        .evaluate(&fixture.graph, t, &attackers, &[garrisons[i]], &[]);
                move_map.insert(t, assessment);
            }

            let mut pool = UnitPool::new();
            for &reserve in &reserves {
                let mut options: AHashSet<TerritoryId> = fronts.iter().copied().collect();
                options.insert(rear);
                pool.insert(reserve, options);
            }
            let mut transport_pool = UnitPool::new();
            let mut plans = Vec::new();
            let mut prioritized = fronts.clone();
            let initial = prioritized.clone();

            move_units_to_defend(
                &ctx,
                &mut move_map,
                &mut pool,
                &mut transport_pool,
                &mut plans,
                &mut prioritized,
                &AHashMap::new(),
                None,
            );

            let mut remaining = initial.iter();
            for t in &prioritized {
                prop_assert!(remaining.any(|x| x == t), "priority order not preserved");
            }
            for &t in &initial {
                let assessment = &move_map[&t];
                if prioritized.contains(&t) {
                    prop_assert!(assessment.can_attack);
                    prop_assert!(assessment.can_hold);
                } else {
                    prop_assert!(!assessment.can_attack);
                    prop_assert!(!assessment.can_hold);
                    prop_assert!(assessment.units.is_empty());
                }
                prop_assert!(assessment.temp_units.is_empty());
            }
        }
    }
}
