//! Best-territory placement for units not needed on defense
//!
//! Runs after the defense windows commit. Sea movement (transports, their
//! escorts and air cover) is planned inside a fixed-point loop: when a
//! trial leaves some touched territory worse off than its baseline, that
//! territory is written off (value zeroed) and the whole sea pass repeats.
//! Land and air placement run once afterwards on what remains.

use ahash::AHashSet;
use ordered_float::OrderedFloat;
use tracing::{debug, trace};

use crate::core::types::{TerritoryId, UnitId};
use crate::map::routes::Passability;
use crate::map::unit::UnitKind;
use crate::planner::assessment::{sorted_keys, MoveMap};
use crate::planner::assign::{cached_outcome, commit_trial_state, estimate_defenders, pull_carrier_air};
use crate::planner::pool::UnitPool;
use crate::planner::transport::{
    carrier_capacity_allows, units_to_transport_capped, AmphibPlan,
};
use crate::planner::value;
use crate::planner::PlanContext;

/// Place everything still unclaimed after defense assignment
pub(crate) fn move_units_to_best(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    pool: &mut UnitPool,
    transport_pool: &mut UnitPool,
    amphib_plans: &mut Vec<AmphibPlan>,
) {
    loop {
        for t in sorted_keys(move_map) {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.reset_temp();
            }
        }
        let mut current_pool = pool.clone();
        let mut current_tpool = transport_pool.clone();
        let mut assigned: AHashSet<UnitId> = AHashSet::new();
        let mut touched: AHashSet<TerritoryId> = AHashSet::new();

        place_amphib(ctx, move_map, amphib_plans, &mut current_pool, &mut current_tpool, &mut assigned, &mut touched);
        place_loading_transports(ctx, move_map, &mut current_tpool, &mut touched);
        place_remaining_transports(ctx, move_map, &mut current_tpool);
        place_sea_units(ctx, move_map, &mut current_pool, &mut assigned, &mut touched);
        place_transport_air_cover(ctx, move_map, &mut current_pool, &mut assigned);

        if verify_touched(ctx, move_map, &touched) {
            commit_trial_state(ctx, move_map, pool, transport_pool, amphib_plans);
            break;
        }
        debug!("sea placement destabilized a territory, repeating pass");
    }

    place_land_units(ctx, move_map, pool);
    place_air_units(ctx, move_map, pool);
}

/// Every unit already spoken for in this trial
fn spoken_for(move_map: &MoveMap, assigned: &AHashSet<UnitId>) -> AHashSet<UnitId> {
    let mut excluded = assigned.clone();
    for assessment in move_map.values() {
        excluded.extend(assessment.units.iter().copied());
        excluded.extend(assessment.temp_units.iter().copied());
    }
    excluded
}

/// Amphib transports chase the most valuable land they can reinforce,
/// falling back to the most valuable sea position
#[allow(clippy::too_many_arguments)]
fn place_amphib(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    amphib_plans: &[AmphibPlan],
    current_pool: &mut UnitPool,
    current_tpool: &mut UnitPool,
    assigned: &mut AHashSet<UnitId>,
    touched: &mut AHashSet<TerritoryId>,
) {
    for plan in amphib_plans {
        if !current_tpool.contains(plan.transport) {
            continue;
        }
        let excluded = spoken_for(move_map, assigned);

        // Best land destination with cargo that has nowhere better to walk
        let mut best: Option<(f64, TerritoryId, Vec<UnitId>, TerritoryId)> = None;
        for t in plan.destinations() {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            if assessment.value <= 0.0 {
                continue;
            }
            if let Some((v, _, _, _)) = best {
                if assessment.value <= v {
                    continue;
                }
            }
            let Some(origins) = plan.transport_map.get(&t) else {
                continue;
            };
            let cargo = units_to_transport_capped(
                ctx.graph,
                ctx.player,
                plan.transport,
                origins,
                &excluded,
                current_pool,
                move_map,
                assessment.value,
            );
            if cargo.is_empty() {
                continue;
            }
            let load_from: AHashSet<TerritoryId> =
                cargo.iter().map(|&id| ctx.graph.unit(id).location).collect();
            let unload_at = plan
                .sea_positions()
                .into_iter()
                .filter(|w| ctx.graph.neighbors(t).contains(w))
                .filter(|w| {
                    plan.sea_transport_map
                        .get(w)
                        .map(|o| load_from.iter().all(|l| o.contains(l)))
                        .unwrap_or(false)
                })
                .filter(|w| move_map.get(w).map(|a| a.can_hold).unwrap_or(false))
                .max_by_key(|w| {
                    (
                        OrderedFloat(move_map.get(w).map(|a| a.sea_value).unwrap_or(0.0)),
                        *w,
                    )
                });
            if let Some(unload_at) = unload_at {
                best = Some((assessment.value, t, cargo, unload_at));
            }
        }
        if let Some((_, t, cargo, unload_at)) = best {
            trace!(transport = ?plan.transport, destination = %ctx.graph.territory(t).name, "amphib delivery");
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_temp_units(&cargo);
                assessment.temp_amphib_map.insert(plan.transport, cargo.clone());
                assessment.transport_territory_map.insert(plan.transport, unload_at);
                assessment.battle_outcome = None;
            }
            for &unit in &cargo {
                current_pool.claim(unit);
                assigned.insert(unit);
            }
            current_tpool.claim(plan.transport);
            touched.insert(unload_at);
            continue;
        }

        // Best sea position: ferry rear-area units forward and keep them
        // aboard or drop them on the best adjacent coast
        let mut best_sea: Option<(f64, TerritoryId, Vec<UnitId>)> = None;
        for w in plan.sea_positions() {
            let Some(assessment) = move_map.get(&w) else {
                continue;
            };
            if !assessment.can_hold || assessment.value <= 0.0 {
                continue;
            }
            if let Some((v, _, _)) = best_sea {
                if assessment.value <= v {
                    continue;
                }
            }
            let Some(origins) = plan.sea_transport_map.get(&w) else {
                continue;
            };
            // Units already adjacent to the target gain nothing from a lift
            let adjacent: AHashSet<TerritoryId> =
                ctx.graph.neighbors(w).iter().copied().collect();
            let origins: AHashSet<TerritoryId> =
                origins.iter().copied().filter(|o| !adjacent.contains(o)).collect();
            if origins.is_empty() {
                continue;
            }
            let cargo = units_to_transport_capped(
                ctx.graph,
                ctx.player,
                plan.transport,
                &origins,
                &excluded,
                current_pool,
                move_map,
                0.1,
            );
            if !cargo.is_empty() {
                best_sea = Some((assessment.value, w, cargo));
            }
        }
        if let Some((_, w, cargo)) = best_sea {
            // Only ferry when some coast at the destination can take the
            // units this turn
            let unload_land = ctx
                .graph
                .neighbors(w)
                .iter()
                .copied()
                .filter(|&n| {
                    let territory = ctx.graph.territory(n);
                    territory.is_land()
                        && territory
                            .owner
                            .map(|o| ctx.relations.is_allied(ctx.player, o))
                            .unwrap_or(false)
                })
                .filter(|n| move_map.get(n).map(|a| a.can_hold).unwrap_or(false))
                .max_by_key(|&n| {
                    let water_neighbors = ctx
                        .graph
                        .neighbors(n)
                        .iter()
                        .filter(|&&m| ctx.graph.territory(m).is_water())
                        .count();
                    (water_neighbors, n)
                });
            let Some(destination) = unload_land else {
                continue;
            };
            if let Some(assessment) = move_map.get_mut(&destination) {
                assessment.add_temp_units(&cargo);
                assessment.temp_amphib_map.insert(plan.transport, cargo.clone());
                assessment.transport_territory_map.insert(plan.transport, w);
                assessment.battle_outcome = None;
            }
            for &unit in &cargo {
                current_pool.claim(unit);
                assigned.insert(unit);
            }
            current_tpool.claim(plan.transport);
            touched.insert(w);
        }
    }
}

/// Idle transports steam toward the best loading territory they can serve
/// next turn
fn place_loading_transports(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    current_tpool: &mut UnitPool,
    touched: &mut AHashSet<TerritoryId>,
) {
    for transport_id in current_tpool.ids_sorted() {
        let transport = ctx.graph.unit(transport_id);
        if transport.movement == 0 {
            continue;
        }
        let sea_passable = Passability::sea(ctx.graph, ctx.relations, ctx.player, false);

        // Score loading territories; lower is better (close, many units to
        // lift, productive factory)
        let mut candidates: Vec<(f64, TerritoryId)> = Vec::new();
        for t in sorted_keys(move_map) {
            let territory = ctx.graph.territory(t);
            if !territory.is_land() {
                continue;
            }
            let Some(distance) =
                ctx.graph.distance_ignore_end(transport.location, t, &sea_passable)
            else {
                continue;
            };
            if distance == 0 {
                continue;
            }
            let units_to_load = ctx
                .graph
                .units_in(t)
                .filter(|u| u.owner == ctx.player && u.is_transportable())
                .count();
            let factory = value::has_factory(ctx.graph, ctx.relations, ctx.player, t);
            if distance == 1 && units_to_load > 0 && !factory {
                // Already in pickup range, the amphib planner handles it
                continue;
            }
            let turns_away = ((distance - 1) / transport.movement) as f64;
            let factory_production = if factory { territory.production as f64 } else { 0.0 };
            let load_value = move_map
                .get(&t)
                .map(|a| a.value)
                .unwrap_or(0.0)
                + 0.5 * turns_away
                - 0.1 * units_to_load as f64
                - 0.1 * factory_production;
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.load_value = load_value;
            }
            candidates.push((load_value, t));
        }
        candidates.sort_by_key(|&(v, t)| (OrderedFloat(v), t));

        let mut blocked: AHashSet<TerritoryId> = AHashSet::new();
        'candidates: for &(_, target) in &candidates {
            loop {
                let passable = |territory: &crate::map::territory::Territory| {
                    sea_passable(territory) && !blocked.contains(&territory.id)
                };
                let Some(path) = ctx.graph.path_ignore_end(transport.location, target, passable)
                else {
                    continue 'candidates;
                };
                // Last path entry is the land target; stop on the water leg
                let steps = &path[..path.len() - 1];
                let index = (transport.movement as usize).min(steps.len() - 1);
                let move_to = steps[index];
                if move_map.get(&move_to).map(|a| a.can_hold).unwrap_or(false) {
                    if let Some(assessment) = move_map.get_mut(&move_to) {
                        assessment.add_temp_unit(transport_id);
                        assessment.battle_outcome = None;
                    }
                    touched.insert(move_to);
                    current_tpool.claim(transport_id);
                    break 'candidates;
                }
                blocked.insert(move_to);
            }
        }
    }
}

/// Whatever transports remain hide in their statistically safest option
fn place_remaining_transports(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    current_tpool: &mut UnitPool,
) {
    for transport_id in current_tpool.ids_sorted() {
        let mut safest: Option<(f64, TerritoryId)> = None;
        let Some(options) = current_tpool.options(transport_id) else {
            continue;
        };
        let mut options: Vec<TerritoryId> = options.iter().copied().collect();
        options.sort_unstable();
        for t in options {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            let mut defenders = estimate_defenders(ctx, assessment);
            defenders.push(transport_id);
            let estimate = ctx.oracle.estimate_strength_difference(
                ctx.graph,
                t,
                &assessment.max_enemy_units,
                &defenders,
            );
            if safest.map(|(e, _)| estimate < e).unwrap_or(true) {
                safest = Some((estimate, t));
            }
        }
        if let Some((_, t)) = safest {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_temp_unit(transport_id);
                assessment.battle_outcome = None;
            }
            current_tpool.claim(transport_id);
        }
    }
}

/// Warships guard threatened transports first, then the best-scoring sea
/// position, then the safest reachable water
fn place_sea_units(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    current_pool: &mut UnitPool,
    assigned: &mut AHashSet<UnitId>,
    touched: &mut AHashSet<TerritoryId>,
) {
    for unit_id in current_pool.ids_sorted() {
        let unit = ctx.graph.unit(unit_id);
        if unit.kind != UnitKind::Sea {
            continue;
        }
        let Some(options) = current_pool.options(unit_id) else {
            continue;
        };
        let mut options: Vec<TerritoryId> = options.iter().copied().collect();
        options.sort_unstable();

        // Guard transports under threat
        let mut committed = false;
        for &t in &options {
            let holds_transport = move_map
                .get(&t)
                .map(|a| {
                    a.can_hold
                        && !a.max_enemy_units.is_empty()
                        && a.all_defenders().iter().any(|&id| {
                            let u = ctx.graph.unit(id);
                            u.is_transport() && u.owner == ctx.player
                        })
                })
                .unwrap_or(false);
            if !holds_transport {
                continue;
            }
            let Some(outcome) = cached_outcome(ctx, move_map, t) else {
                continue;
            };
            if outcome.win_percentage > 100.0 - ctx.config.win_percentage
                || outcome.tuv_swing > 0.0
            {
                if let Some(assessment) = move_map.get_mut(&t) {
                    assessment.add_temp_unit(unit_id);
                    assessment.battle_outcome = None;
                }
                current_pool.claim(unit_id);
                assigned.insert(unit_id);
                pull_carrier_air(ctx, move_map, assigned, unit_id, t);
                touched.insert(t);
                committed = true;
                break;
            }
        }
        if committed {
            continue;
        }

        // Best combined sea score
        let mut best: Option<(f64, TerritoryId)> = None;
        for &t in &options {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            if !assessment.can_hold {
                continue;
            }
            let transports = assessment
                .all_defenders()
                .iter()
                .filter(|&&id| {
                    let u = ctx.graph.unit(id);
                    u.is_transport() && u.owner == ctx.player
                })
                .count() as f64;
            let score = (1.0 + transports) * assessment.sea_value
                + (1.0 + 100.0 * transports) * assessment.value / 10000.0;
            if score <= 0.0 {
                continue;
            }
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, t));
            }
        }
        if let Some((_, t)) = best {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_temp_unit(unit_id);
                assessment.battle_outcome = None;
            }
            current_pool.claim(unit_id);
            assigned.insert(unit_id);
            pull_carrier_air(ctx, move_map, assigned, unit_id, t);
            touched.insert(t);
            continue;
        }

        // Safest reachable water
        let mut safest: Option<(f64, TerritoryId)> = None;
        for &t in &options {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            let mut defenders = estimate_defenders(ctx, assessment);
            defenders.push(unit_id);
            let estimate = ctx.oracle.estimate_strength_difference(
                ctx.graph,
                t,
                &assessment.max_enemy_units,
                &defenders,
            );
            if safest.map(|(e, _)| estimate < e).unwrap_or(true) {
                safest = Some((estimate, t));
            }
        }
        if let Some((_, t)) = safest {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_temp_unit(unit_id);
                assessment.battle_outcome = None;
            }
            current_pool.claim(unit_id);
            assigned.insert(unit_id);
            pull_carrier_air(ctx, move_map, assigned, unit_id, t);
        }
    }
}

/// Carrier-capable air reinforces water territories holding our transports
fn place_transport_air_cover(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    current_pool: &mut UnitPool,
    assigned: &mut AHashSet<UnitId>,
) {
    for unit_id in current_pool.ids_sorted() {
        let unit = ctx.graph.unit(unit_id);
        if !unit.is_air() || !unit.can_land_on_carrier {
            continue;
        }
        let Some(options) = current_pool.options(unit_id) else {
            continue;
        };
        let mut options: Vec<TerritoryId> = options.iter().copied().collect();
        options.sort_unstable();
        for t in options {
            if !ctx.graph.territory(t).is_water() {
                continue;
            }
            let suitable = move_map
                .get(&t)
                .map(|a| {
                    a.can_hold
                        && !a.max_enemy_units.is_empty()
                        && a.all_defenders().iter().any(|&id| {
                            let u = ctx.graph.unit(id);
                            u.is_transport() && u.owner == ctx.player
                        })
                        && carrier_capacity_allows(ctx.graph, &a.all_defenders(), 1)
                })
                .unwrap_or(false);
            if !suitable {
                continue;
            }
            let Some(outcome) = cached_outcome(ctx, move_map, t) else {
                continue;
            };
            if outcome.win_percentage > 100.0 - ctx.config.win_percentage
                || outcome.tuv_swing > 0.0
            {
                if let Some(assessment) = move_map.get_mut(&t) {
                    assessment.add_temp_unit(unit_id);
                    assessment.battle_outcome = None;
                }
                current_pool.claim(unit_id);
                assigned.insert(unit_id);
                break;
            }
        }
    }
}

/// Fixed-point condition: no touched territory may end up worse with its
/// trial units than it was without them
fn verify_touched(ctx: &PlanContext, move_map: &mut MoveMap, touched: &AHashSet<TerritoryId>) -> bool {
    let mut territories: Vec<TerritoryId> = touched.iter().copied().collect();
    territories.sort_unstable();
    let mut stable = true;
    for t in territories {
        let Some(assessment) = move_map.get(&t) else {
            continue;
        };
        let is_water = ctx.graph.territory(t).is_water();
        let defenders = estimate_defenders(ctx, assessment);
        let outcome = ctx.oracle.evaluate(
            ctx.graph,
            t,
            &assessment.max_enemy_units,
            &defenders,
            &assessment.max_enemy_bombard_units,
        );
        let temp: AHashSet<UnitId> = assessment.temp_units.iter().copied().collect();
        let baseline_defenders: Vec<UnitId> = defenders
            .iter()
            .copied()
            .filter(|id| !temp.contains(id))
            .collect();
        let baseline = ctx.oracle.evaluate(
            ctx.graph,
            t,
            &assessment.max_enemy_units,
            &baseline_defenders,
            &assessment.max_enemy_bombard_units,
        );
        let extra_tuv = value::tuv(ctx.graph, &assessment.temp_units);
        let water_penalty = if is_water { 1.0 } else { 0.0 };
        let hold_value =
            outcome.tuv_swing - extra_tuv / ctx.config.hold_value_divisor * (1.0 + water_penalty);
        if hold_value > baseline.tuv_swing {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.can_hold = false;
                assessment.value = 0.0;
                assessment.sea_value = 0.0;
            }
            debug!(territory = %ctx.graph.territory(t).name, "written off after trial placement");
            stable = false;
        }
    }
    stable
}

/// Land units walk to the best holdable territory, weighting places that
/// need amphibious lift; stragglers head for the nearest coastal factory,
/// then the safest option
fn place_land_units(ctx: &PlanContext, move_map: &mut MoveMap, pool: &mut UnitPool) {
    let coastal_factories: Vec<TerritoryId> = sorted_keys(move_map)
        .into_iter()
        .filter(|&t| {
            let territory = ctx.graph.territory(t);
            territory.is_land()
                && territory.owner == Some(ctx.player)
                && ctx
                    .graph
                    .units_in(t)
                    .any(|u| u.can_produce_units && u.owner == ctx.player)
                && ctx
                    .graph
                    .neighbors(t)
                    .iter()
                    .any(|&n| ctx.graph.territory(n).is_water())
        })
        .collect();

    for unit_id in pool.ids_sorted() {
        let unit = ctx.graph.unit(unit_id);
        if !unit.is_land() {
            continue;
        }
        let Some(options) = pool.options(unit_id) else {
            continue;
        };
        let mut options: Vec<TerritoryId> = options.iter().copied().collect();
        options.sort_unstable();

        // Highest value, amphib need breaking ties
        let mut best: Option<(f64, f64, TerritoryId)> = None;
        for &t in &options {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            if !assessment.can_hold || assessment.value <= 0.0 {
                continue;
            }
            let need = amphib_need(ctx, t);
            let better = match best {
                None => true,
                Some((v, n, _)) => {
                    assessment.value > v || (assessment.value == v && need > n)
                }
            };
            if better {
                best = Some((assessment.value, need, t));
            }
        }
        if let Some((_, _, t)) = best {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_unit(unit_id);
                assessment.battle_outcome = None;
            }
            pool.claim(unit_id);
            continue;
        }

        // March toward the nearest coastal factory
        if !coastal_factories.is_empty() {
            let allied = Passability::land(ctx.relations, ctx.player, false);
            let any_land = Passability::land(ctx.relations, ctx.player, true);
            let mut closest: Option<(u32, TerritoryId)> = None;
            for &t in &options {
                if !move_map.get(&t).map(|a| a.can_hold).unwrap_or(false) {
                    continue;
                }
                for &factory in &coastal_factories {
                    let distance = ctx
                        .graph
                        .distance(t, factory, &allied)
                        .or_else(|| ctx.graph.distance(t, factory, &any_land).map(|d| d * 10));
                    let Some(distance) = distance else {
                        continue;
                    };
                    if closest.map(|(d, _)| distance < d).unwrap_or(true) {
                        closest = Some((distance, t));
                    }
                }
            }
            if let Some((_, t)) = closest {
                if let Some(assessment) = move_map.get_mut(&t) {
                    assessment.add_unit(unit_id);
                    assessment.battle_outcome = None;
                }
                pool.claim(unit_id);
                continue;
            }
        }

        // Safest reachable
        let mut safest: Option<(f64, TerritoryId)> = None;
        for &t in &options {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            let mut defenders = estimate_defenders(ctx, assessment);
            defenders.push(unit_id);
            let estimate = ctx.oracle.estimate_strength_difference(
                ctx.graph,
                t,
                &assessment.max_enemy_units,
                &defenders,
            );
            if safest.map(|(e, _)| estimate < e).unwrap_or(true) {
                safest = Some((estimate, t));
            }
        }
        if let Some((_, t)) = safest {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_unit(unit_id);
                assessment.battle_outcome = None;
            }
            pool.claim(unit_id);
        }
    }
}

/// How much a territory wants land units for future amphibious lift:
/// unfilled transport capacity next door counts heavily, nearby capacity
/// and raw coastline less so
fn amphib_need(ctx: &PlanContext, t: TerritoryId) -> f64 {
    let neighbor_capacity: u32 = ctx
        .graph
        .neighbors(t)
        .iter()
        .filter(|&&n| ctx.graph.territory(n).is_water())
        .flat_map(|&n| ctx.graph.units_in(n))
        .filter(|u| u.is_transport() && u.owner == ctx.player)
        .map(|u| u.transport_capacity)
        .sum();
    let nearby_capacity: u32 = ctx
        .graph
        .neighbors_within(t, 2, |territory| territory.is_water())
        .iter()
        .flat_map(|&n| ctx.graph.units_in(n))
        .filter(|u| u.is_transport() && u.owner == ctx.player)
        .map(|u| u.transport_capacity)
        .sum();
    let sea_neighbors = ctx
        .graph
        .neighbors(t)
        .iter()
        .filter(|&&n| ctx.graph.territory(n).is_water())
        .count() as f64;
    let factory_weight = if value::has_factory(ctx.graph, ctx.relations, ctx.player, t) {
        10.0
    } else {
        0.0
    };
    1000.0 * neighbor_capacity as f64
        + 100.0 * nearby_capacity as f64
        + (1.0 + factory_weight) * sea_neighbors
}

/// Air settles where it threatens the most next turn while staying safe
fn place_air_units(ctx: &PlanContext, move_map: &mut MoveMap, pool: &mut UnitPool) {
    for unit_id in pool.ids_sorted() {
        let unit = ctx.graph.unit(unit_id);
        if !unit.is_air() {
            continue;
        }
        let Some(options) = pool.options(unit_id) else {
            continue;
        };
        let mut options: Vec<TerritoryId> = options.iter().copied().collect();
        options.sort_unstable();

        let mut best: Option<(f64, TerritoryId)> = None;
        for &t in &options {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            let territory = ctx.graph.territory(t);
            if territory.is_water() {
                if !unit.can_land_on_carrier
                    || !carrier_capacity_allows(ctx.graph, &assessment.all_defenders(), 1)
                {
                    continue;
                }
            }
            let mut defenders = estimate_defenders(ctx, assessment);
            defenders.push(unit_id);
            let outcome = ctx.oracle.evaluate(
                ctx.graph,
                t,
                &assessment.max_enemy_units,
                &defenders,
                &assessment.max_enemy_bombard_units,
            );
            if outcome.win_percentage >= ctx.config.min_win_percentage
                || outcome.tuv_swing > 0.0
            {
                if let Some(assessment) = move_map.get_mut(&t) {
                    assessment.can_hold = false;
                }
                continue;
            }
            let owned_defenders: Vec<UnitId> = defenders
                .iter()
                .copied()
                .filter(|&id| ctx.graph.unit(id).owner == ctx.player)
                .collect();
            let allied_only = ctx.oracle.evaluate(
                ctx.graph,
                t,
                &move_map.get(&t).map(|a| a.max_enemy_units.clone()).unwrap_or_default(),
                &owned_defenders,
                &move_map
                    .get(&t)
                    .map(|a| a.max_enemy_bombard_units.clone())
                    .unwrap_or_default(),
            );
            let cant_hold_without_allies = allied_only.win_percentage
                >= ctx.config.min_win_percentage
                || allied_only.tuv_swing > 0.0;
            let score = air_value(ctx, move_map, t, unit.movement, cant_hold_without_allies);
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, t));
            }
        }
        if let Some((_, t)) = best {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_unit(unit_id);
                assessment.battle_outcome = None;
            }
            pool.claim(unit_id);
            continue;
        }

        // Safest fallback
        let mut safest: Option<(f64, TerritoryId)> = None;
        for &t in &options {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            if ctx.graph.territory(t).is_water()
                && (!unit.can_land_on_carrier
                    || !carrier_capacity_allows(ctx.graph, &assessment.all_defenders(), 1))
            {
                continue;
            }
            let mut defenders = estimate_defenders(ctx, assessment);
            defenders.push(unit_id);
            let estimate = ctx.oracle.estimate_strength_difference(
                ctx.graph,
                t,
                &assessment.max_enemy_units,
                &defenders,
            );
            if safest.map(|(e, _)| estimate < e).unwrap_or(true) {
                safest = Some((estimate, t));
            }
        }
        if let Some((_, t)) = safest {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.add_unit(unit_id);
                assessment.battle_outcome = None;
            }
            pool.claim(unit_id);
        }
    }
}

/// Forward-basing score for air: what can be struck from here next turn
fn air_value(
    ctx: &PlanContext,
    move_map: &MoveMap,
    t: TerritoryId,
    range: u32,
    cant_hold_without_allies: bool,
) -> f64 {
    let strike_radius = (range / 2).max(1);
    let air_passable = Passability::air(ctx.player);
    let strike_zone = ctx.graph.neighbors_within(t, strike_radius, &air_passable);

    let is_enemy_land = |id: TerritoryId| {
        let territory = ctx.graph.territory(id);
        territory.is_land()
            && territory
                .owner
                .map(|o| ctx.relations.is_enemy(ctx.player, o))
                .unwrap_or(false)
    };
    let num_enemy_territories = strike_zone.iter().filter(|&&n| is_enemy_land(n)).count() as f64;
    let num_sea_attack = strike_zone
        .iter()
        .filter(|&&n| {
            ctx.graph
                .units_in(n)
                .any(|u| u.is_sea() && ctx.relations.is_enemy(ctx.player, u.owner))
        })
        .count() as f64;
    // Land strikes: enemy or crumbling territories next to our ground forces
    let num_land_attack = strike_zone
        .iter()
        .filter(|&&n| {
            let target = is_enemy_land(n)
                || move_map.get(&n).map(|a| !a.can_hold).unwrap_or(false);
            target
                && ctx.graph.neighbors(n).iter().any(|&m| {
                    ctx.graph
                        .units_in(m)
                        .any(|u| u.is_land() && u.owner == ctx.player)
                })
        })
        .count() as f64;
    let nearby = ctx
        .graph
        .neighbors_within(t, range, &air_passable)
        .iter()
        .filter(|&&n| is_enemy_land(n))
        .count() as f64;

    let factory = value::has_factory(ctx.graph, ctx.relations, ctx.player, t);
    let has_owned_carrier = move_map
        .get(&t)
        .map(|a| {
            a.all_defenders().iter().any(|&id| {
                let u = ctx.graph.unit(id);
                u.is_carrier() && u.owner == ctx.player
            })
        })
        .unwrap_or(false);

    let cant = if cant_hold_without_allies { 1.0 } else { 0.0 };
    let not_factory = if factory { 0.0 } else { 1.0 };
    (200.0 * num_sea_attack + 100.0 * num_land_attack + 10.0 * num_enemy_territories + nearby)
        / (1.0 + cant)
        / (1.0 + cant * not_factory)
        * (1.0 + if has_owned_carrier { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::oracle::StrengthOracle;
    use crate::core::config::PlannerConfig;
    use crate::core::types::{PlayerId, Relations};
    use crate::map::territory::{TerritoryGraph, TerritoryKind};
    use crate::map::unit::Unit;
    use crate::planner::assessment::TerritoryAssessment;

    struct Fixture {
        graph: TerritoryGraph,
        relations: Relations,
        config: PlannerConfig,
        oracle: StrengthOracle,
    }

    impl Fixture {
        fn ctx(&self) -> PlanContext<'_> {
            PlanContext {
                graph: &self.graph,
                relations: &self.relations,
                player: PlayerId(0),
                config: &self.config,
                oracle: &self.oracle,
                capital: None,
            }
        }
    }

    #[test]
    fn test_land_unit_walks_to_highest_value() {
        let mut graph = TerritoryGraph::new();
        let rear = graph.add_territory("rear", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let front = graph.add_territory("front", TerritoryKind::Land, Some(PlayerId(0)), 2);
        graph.connect(rear, front);
        let mut infantry = Unit::new(UnitId(0), PlayerId(0), UnitKind::Land, rear);
        infantry.movement = 1;
        let infantry = graph.add_unit(infantry);

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx();

        let mut move_map = MoveMap::new();
        let mut a = TerritoryAssessment::new(rear);
        a.value = 1.0;
        move_map.insert(rear, a);
        let mut b = TerritoryAssessment::new(front);
        b.value = 4.0;
        move_map.insert(front, b);

        let mut pool = UnitPool::new();
        pool.insert(infantry, [rear, front].into_iter().collect());
        let mut transport_pool = UnitPool::new();
        let mut plans = Vec::new();

        move_units_to_best(&ctx, &mut move_map, &mut pool, &mut transport_pool, &mut plans);
        assert!(move_map[&front].units.contains(&infantry));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_stuck_unit_stays_in_place() {
        let mut graph = TerritoryGraph::new();
        let only = graph.add_territory("only", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let mut infantry = Unit::new(UnitId(0), PlayerId(0), UnitKind::Land, only);
        infantry.movement = 1;
        let infantry = graph.add_unit(infantry);

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx();

        let mut move_map = MoveMap::new();
        let mut a = TerritoryAssessment::new(only);
        a.value = 0.0;
        a.can_hold = false;
        move_map.insert(only, a);

        let mut pool = UnitPool::new();
        pool.insert(infantry, [only].into_iter().collect());
        let mut transport_pool = UnitPool::new();
        let mut plans = Vec::new();

        move_units_to_best(&ctx, &mut move_map, &mut pool, &mut transport_pool, &mut plans);
        // Safest-option fallback keeps the unit at its only destination
        assert!(move_map[&only].units.contains(&infantry));
    }

    #[test]
    fn test_amphib_need_prefers_coast_with_transports() {
        let mut graph = TerritoryGraph::new();
        let coast = graph.add_territory("coast", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let inland = graph.add_territory("inland", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let bay = graph.add_territory("bay", TerritoryKind::Water, None, 0);
        graph.connect(coast, bay);
        graph.connect(coast, inland);
        let mut transport = Unit::new(UnitId(0), PlayerId(0), UnitKind::Transport, bay);
        transport.transport_capacity = 2;
        graph.add_unit(transport);

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx();
        assert!(amphib_need(&ctx, coast) > amphib_need(&ctx, inland));
    }
}
