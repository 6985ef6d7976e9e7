//! Infrastructure relocation
//!
//! Movable factories head for the most productive holdable territory, and
//! their destinations are cached so repeated planning inside one turn does
//! not redo the search. AA guns evacuate territories that are about to
//! fall, preferring destinations without AA coverage already in place.

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::core::types::{TerritoryId, UnitId};
use crate::planner::assessment::MoveMap;
use crate::planner::pool::UnitPool;
use crate::planner::value;
use crate::planner::PlanContext;

/// Cached factory destinations, reusable within the same turn
pub type FactoryMoveMap = AHashMap<UnitId, TerritoryId>;

pub(crate) fn move_infra(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    infra_pool: &mut UnitPool,
    cached: Option<FactoryMoveMap>,
) -> FactoryMoveMap {
    let mut factory_moves = cached.unwrap_or_default();
    move_factories(ctx, move_map, infra_pool, &mut factory_moves);
    move_aa_guns(ctx, move_map, infra_pool);
    factory_moves
}

fn factory_score(ctx: &PlanContext, move_map: &MoveMap, t: TerritoryId) -> f64 {
    let Some(assessment) = move_map.get(&t) else {
        return f64::NEG_INFINITY;
    };
    if !assessment.can_hold {
        return f64::NEG_INFINITY;
    }
    let territory = ctx.graph.territory(t);
    let occupied = ctx.graph.units_in(t).any(|u| u.can_produce_units);
    if territory.is_land() && territory.owner == Some(ctx.player) && !occupied {
        assessment.value * territory.production as f64 + 0.01 * territory.production as f64
    } else {
        0.1 * assessment.value
    }
}

fn move_factories(
    ctx: &PlanContext,
    move_map: &mut MoveMap,
    infra_pool: &mut UnitPool,
    factory_moves: &mut FactoryMoveMap,
) {
    for unit_id in infra_pool.ids_sorted() {
        let unit = ctx.graph.unit(unit_id);
        if !unit.can_produce_units {
            continue;
        }
        let destination = match factory_moves.get(&unit_id) {
            Some(&cached) if infra_pool.options(unit_id).map(|o| o.contains(&cached)).unwrap_or(false) => {
                Some(cached)
            }
            _ => {
                let Some(options) = infra_pool.options(unit_id) else {
                    continue;
                };
                let mut options: Vec<TerritoryId> = options.iter().copied().collect();
                options.sort_unstable();
                options
                    .into_iter()
                    .map(|t| (OrderedFloat(factory_score(ctx, move_map, t)), t))
                    .max()
                    .filter(|(score, _)| score.0 > f64::NEG_INFINITY)
                    .map(|(_, t)| t)
            }
        };
        let Some(destination) = destination else {
            continue;
        };
        if destination != unit.location {
            debug!(factory = ?unit_id, to = %ctx.graph.territory(destination).name, "relocating factory");
        }
        if let Some(assessment) = move_map.get_mut(&destination) {
            assessment.add_unit(unit_id);
        }
        factory_moves.insert(unit_id, destination);
        infra_pool.claim(unit_id);
    }
}

fn move_aa_guns(ctx: &PlanContext, move_map: &mut MoveMap, infra_pool: &mut UnitPool) {
    for unit_id in infra_pool.ids_sorted() {
        let unit = ctx.graph.unit(unit_id);
        if !unit.is_aa {
            continue;
        }
        let here = unit.location;
        // Only flee a doomed territory that has no factory worth guarding
        let doomed = move_map.get(&here).map(|a| !a.can_hold).unwrap_or(false);
        let guards_factory = value::has_factory(ctx.graph, ctx.relations, ctx.player, here);
        if !doomed || guards_factory {
            continue;
        }
        let Some(options) = infra_pool.options(unit_id) else {
            continue;
        };
        let mut options: Vec<TerritoryId> = options.iter().copied().collect();
        options.sort_unstable();
        let best = options
            .into_iter()
            .filter(|&t| t != here)
            .filter(|t| move_map.get(t).map(|a| a.can_hold).unwrap_or(false))
            .map(|t| {
                let covered = ctx
                    .graph
                    .units_in(t)
                    .any(|u| u.is_aa && ctx.relations.is_allied(ctx.player, u.owner));
                let assessment_value = move_map.get(&t).map(|a| a.value).unwrap_or(0.0);
                let score = if covered { 0.01 * assessment_value } else { assessment_value };
                (OrderedFloat(score), t)
            })
            .filter(|(score, _)| score.0 > 0.0)
            .max();
        if let Some((_, destination)) = best {
            debug!(aa = ?unit_id, to = %ctx.graph.territory(destination).name, "evacuating AA gun");
            if let Some(assessment) = move_map.get_mut(&destination) {
                assessment.add_unit(unit_id);
            }
            infra_pool.claim(unit_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::oracle::StrengthOracle;
    use crate::core::config::PlannerConfig;
    use crate::core::types::{PlayerId, Relations};
    use crate::map::territory::{TerritoryGraph, TerritoryKind};
    use crate::map::unit::{Unit, UnitKind};
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
    fn test_aa_gun_evacuates_doomed_territory() {
        let mut graph = TerritoryGraph::new();
        let doomed = graph.add_territory("doomed", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let safe = graph.add_territory("safe", TerritoryKind::Land, Some(PlayerId(0)), 2);
        graph.connect(doomed, safe);
        let mut aa = Unit::new(UnitId(0), PlayerId(0), UnitKind::Infrastructure, doomed);
        aa.is_aa = true;
        aa.movement = 1;
        let aa = graph.add_unit(aa);

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx();

        let mut move_map = MoveMap::new();
        let mut lost = TerritoryAssessment::new(doomed);
        lost.can_hold = false;
        move_map.insert(doomed, lost);
        let mut kept = TerritoryAssessment::new(safe);
        kept.value = 3.0;
        move_map.insert(safe, kept);

        let mut infra_pool = UnitPool::new();
        infra_pool.insert(aa, [doomed, safe].into_iter().collect());

        move_infra(&ctx, &mut move_map, &mut infra_pool, None);
        assert!(move_map[&safe].units.contains(&aa));
        assert!(infra_pool.is_empty());
    }

    #[test]
    fn test_aa_gun_stays_when_territory_holds() {
        let mut graph = TerritoryGraph::new();
        let held = graph.add_territory("held", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let other = graph.add_territory("other", TerritoryKind::Land, Some(PlayerId(0)), 2);
        graph.connect(held, other);
        let mut aa = Unit::new(UnitId(0), PlayerId(0), UnitKind::Infrastructure, held);
        aa.is_aa = true;
        aa.movement = 1;
        let aa = graph.add_unit(aa);

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx();

        let mut move_map = MoveMap::new();
        move_map.insert(held, TerritoryAssessment::new(held));
        let mut kept = TerritoryAssessment::new(other);
        kept.value = 3.0;
        move_map.insert(other, kept);

        let mut infra_pool = UnitPool::new();
        infra_pool.insert(aa, [held, other].into_iter().collect());

        move_infra(&ctx, &mut move_map, &mut infra_pool, None);
        assert!(infra_pool.contains(aa));
        assert!(move_map[&other].units.is_empty());
    }

    #[test]
    fn test_factory_prefers_productive_unoccupied_territory() {
        let mut graph = TerritoryGraph::new();
        let poor = graph.add_territory("poor", TerritoryKind::Land, Some(PlayerId(0)), 1);
        let rich = graph.add_territory("rich", TerritoryKind::Land, Some(PlayerId(0)), 5);
        graph.connect(poor, rich);
        let mut factory = Unit::new(UnitId(0), PlayerId(0), UnitKind::Infrastructure, poor);
        factory.can_produce_units = true;
        factory.movement = 1;
        let factory = graph.add_unit(factory);

        let fixture = Fixture {
            graph,
            relations: Relations::new(),
            config: PlannerConfig::default(),
            oracle: StrengthOracle::new(),
        };
        let ctx = fixture.ctx();

        let mut move_map = MoveMap::new();
        let mut a = TerritoryAssessment::new(poor);
        a.value = 2.0;
        move_map.insert(poor, a);
        let mut b = TerritoryAssessment::new(rich);
        b.value = 2.0;
        move_map.insert(rich, b);

        let mut infra_pool = UnitPool::new();
        infra_pool.insert(factory, [poor, rich].into_iter().collect());

        let moves = move_infra(&ctx, &mut move_map, &mut infra_pool, None);
        assert_eq!(moves[&factory], rich);
        assert!(move_map[&rich].units.contains(&factory));
    }
}
