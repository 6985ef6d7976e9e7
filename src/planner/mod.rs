//! Non-combat move planning
//!
//! The [`NonCombatPlanner`] decides, each turn, where every owned unit ends
//! the non-combat phase. Planning runs in stages: build movement options,
//! pin down what cannot move, classify which territories can be held,
//! prioritize and defend them through a growing verification window, place
//! everything left at its best territory, and finally relocate
//! infrastructure. The output is a [`NonCombatPlan`](crate::executor::NonCombatPlan)
//! for an executor to apply.

pub mod assessment;
mod assign;
mod holdability;
mod infra;
mod placement;
pub mod pool;
mod priorities;
pub mod transport;
mod value;

pub use assessment::{MoveMap, TerritoryAssessment};
pub use infra::FactoryMoveMap;
pub use pool::UnitPool;
pub use transport::AmphibPlan;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, info, warn};

use crate::combat::oracle::BattleOracle;
use crate::combat::threat::ThreatModel;
use crate::core::config::PlannerConfig;
use crate::core::error::Result;
use crate::core::types::{PlayerId, Relations, TerritoryId, UnitId};
use crate::executor::{AmphibOrder, MoveOrder, NonCombatPlan};
use crate::map::routes::{candidate_destinations, Passability};
use crate::map::territory::TerritoryGraph;
use crate::planner::assessment::sorted_keys;

/// Shared read-only state threaded through the planning stages
pub(crate) struct PlanContext<'a> {
    pub graph: &'a TerritoryGraph,
    pub relations: &'a Relations,
    pub player: PlayerId,
    pub config: &'a PlannerConfig,
    pub oracle: &'a dyn BattleOracle,
    pub capital: Option<TerritoryId>,
}

/// Result of one planning pass
#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: NonCombatPlan,
    /// Factory destinations, reusable within the same turn
    pub factory_moves: FactoryMoveMap,
    /// Final per-territory assessments, for diagnostics
    pub move_map: MoveMap,
}

pub struct NonCombatPlanner<'a> {
    graph: &'a TerritoryGraph,
    relations: &'a Relations,
    player: PlayerId,
    config: &'a PlannerConfig,
    oracle: &'a dyn BattleOracle,
    threat_model: &'a dyn ThreatModel,
}

impl<'a> NonCombatPlanner<'a> {
    pub fn new(
        graph: &'a TerritoryGraph,
        relations: &'a Relations,
        player: PlayerId,
        config: &'a PlannerConfig,
        oracle: &'a dyn BattleOracle,
        threat_model: &'a dyn ThreatModel,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            graph,
            relations,
            player,
            config,
            oracle,
            threat_model,
        })
    }

    /// Run the full planning pipeline for one turn
    ///
    /// `purchases` lists units already placed this turn that cannot move
    /// (pending factory production). `cached_factory_moves` replays factory
    /// relocation decisions from an earlier pass in the same turn.
    pub fn plan(
        &self,
        purchases: Option<&AHashMap<TerritoryId, Vec<UnitId>>>,
        cached_factory_moves: Option<FactoryMoveMap>,
    ) -> PlanOutcome {
        let capital = self.graph.capital_of(self.player);
        let ctx = PlanContext {
            graph: self.graph,
            relations: self.relations,
            player: self.player,
            config: self.config,
            oracle: self.oracle,
            capital,
        };
        info!(player = ?self.player, "planning non-combat moves");

        let (mut move_map, mut pool, mut transport_pool, mut infra_pool, mut amphib_plans) =
            self.build_options();
        self.find_units_that_cant_move(&mut move_map, &mut pool, &amphib_plans, purchases);
        self.garrison_border_territories(&mut move_map, &mut pool);

        let territories = sorted_keys(&move_map);
        let threats =
            self.threat_model
                .max_attackers(self.graph, self.relations, self.player, &territories);
        for (t, threat) in threats {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.max_enemy_units = threat.units;
                assessment.max_enemy_bombard_units = threat.bombard_units;
            }
        }

        holdability::classify(self.graph, self.config, self.oracle, &mut move_map);

        let cant_hold: AHashSet<TerritoryId> = move_map
            .iter()
            .filter(|(_, a)| !a.can_hold)
            .map(|(&t, _)| t)
            .collect();
        let land_values = value::strategic_values(self.graph, self.relations, self.player, &cant_hold);
        let sea_values =
            value::sea_strategic_values(self.graph, self.relations, self.player, &cant_hold);

        let mut prioritized = priorities::prioritize(
            self.graph,
            self.relations,
            self.player,
            self.config,
            &mut move_map,
            &land_values,
            &sea_values,
        );
        debug!(count = prioritized.len(), "territories prioritized for defense");

        let enemy_distance = self.enemy_distance_from_capital(capital);
        assign::move_units_to_defend(
            &ctx,
            &mut move_map,
            &mut pool,
            &mut transport_pool,
            &mut amphib_plans,
            &mut prioritized,
            &land_values,
            enemy_distance,
        );

        // Best-territory placement, with one retry that pulls everything in
        // around a capital that would otherwise lose the nearby land war
        let snapshot = (
            move_map.clone(),
            pool.clone(),
            transport_pool.clone(),
            amphib_plans.clone(),
        );
        self.apply_strategic_values(&mut move_map, &land_values, &sea_values, None);
        placement::move_units_to_best(
            &ctx,
            &mut move_map,
            &mut pool,
            &mut transport_pool,
            &mut amphib_plans,
        );
        if let (Some(capital), Some(distance)) = (capital, enemy_distance) {
            if (2..=3).contains(&distance)
                && !assign::has_local_land_superiority(&ctx, &move_map, capital, distance)
            {
                warn!("capital lacks local land superiority, replanning placement defensively");
                let (m, p, tp, ap) = snapshot;
                move_map = m;
                pool = p;
                transport_pool = tp;
                amphib_plans = ap;
                self.apply_strategic_values(
                    &mut move_map,
                    &land_values,
                    &sea_values,
                    Some((capital, distance.saturating_sub(1))),
                );
                placement::move_units_to_best(
                    &ctx,
                    &mut move_map,
                    &mut pool,
                    &mut transport_pool,
                    &mut amphib_plans,
                );
            }
        }

        let factory_moves =
            infra::move_infra(&ctx, &mut move_map, &mut infra_pool, cached_factory_moves);

        for unit in pool
            .ids_sorted()
            .into_iter()
            .chain(transport_pool.ids_sorted())
            .chain(infra_pool.ids_sorted())
        {
            warn!(unit = ?unit, "no destination chosen, unit stays in place");
        }

        let plan = self.emit_plan(&move_map);
        info!(orders = plan.units_ordered(), "non-combat plan complete");
        PlanOutcome {
            plan,
            factory_moves,
            move_map,
        }
    }

    /// Compute movement options for every owned unit and seed the move map
    fn build_options(&self) -> (MoveMap, UnitPool, UnitPool, UnitPool, Vec<AmphibPlan>) {
        let mut move_map = MoveMap::new();
        let mut pool = UnitPool::new();
        let mut transport_pool = UnitPool::new();
        let mut infra_pool = UnitPool::new();

        let mut ensure = |move_map: &mut MoveMap, t: TerritoryId| {
            move_map.entry(t).or_insert_with(|| TerritoryAssessment::new(t));
        };

        for unit in self.graph.units() {
            if !self.relations.is_allied(self.player, unit.owner) {
                continue;
            }
            ensure(&mut move_map, unit.location);
            if unit.owner != self.player {
                continue;
            }
            let destinations = candidate_destinations(self.graph, self.relations, unit);
            for &t in &destinations {
                ensure(&mut move_map, t);
            }
            if unit.is_infrastructure() {
                infra_pool.insert(unit.id, destinations);
            } else if unit.is_transport() {
                for &t in &destinations {
                    if let Some(assessment) = move_map.get_mut(&t) {
                        assessment.max_units.push(unit.id);
                    }
                }
                transport_pool.insert(unit.id, destinations);
            } else {
                for &t in &destinations {
                    if let Some(assessment) = move_map.get_mut(&t) {
                        assessment.max_units.push(unit.id);
                    }
                }
                pool.insert(unit.id, destinations);
            }
        }

        let amphib_plans = transport::build_amphib_plans(self.graph, self.relations, self.player);
        for plan in &amphib_plans {
            for (t, origins) in &plan.transport_map {
                ensure(&mut move_map, *t);
                let deliverable: Vec<UnitId> = self
                    .graph
                    .units()
                    .filter(|u| {
                        u.owner == self.player
                            && u.is_transportable()
                            && origins.contains(&u.location)
                    })
                    .map(|u| u.id)
                    .collect();
                if let Some(assessment) = move_map.get_mut(t) {
                    assessment.max_amphib_units.extend(deliverable);
                    assessment.max_amphib_units.sort_unstable();
                    assessment.max_amphib_units.dedup();
                }
            }
            for w in plan.sea_positions() {
                ensure(&mut move_map, w);
            }
        }

        for t in sorted_keys(&move_map) {
            if let Some(assessment) = move_map.get_mut(&t) {
                assessment.max_units.sort_unstable();
                assessment.max_units.dedup();
            }
        }
        (move_map, pool, transport_pool, infra_pool, amphib_plans)
    }

    /// Pin down every unit that cannot move this turn: allied garrisons,
    /// stuck units with no destination but home, pending purchases
    fn find_units_that_cant_move(
        &self,
        move_map: &mut MoveMap,
        pool: &mut UnitPool,
        amphib_plans: &[AmphibPlan],
        purchases: Option<&AHashMap<TerritoryId, Vec<UnitId>>>,
    ) {
        for unit in self.graph.units() {
            if unit.owner == self.player
                || !self.relations.is_allied(self.player, unit.owner)
            {
                continue;
            }
            if let Some(assessment) = move_map.get_mut(&unit.location) {
                assessment.add_cant_move_unit(unit.id);
            }
        }

        let liftable: AHashSet<TerritoryId> = amphib_plans
            .iter()
            .flat_map(|plan| plan.transport_map.values())
            .flatten()
            .copied()
            .collect();
        for unit_id in pool.ids_sorted() {
            let unit = self.graph.unit(unit_id);
            let stuck = pool
                .options(unit_id)
                .map(|o| o.len() == 1 && o.contains(&unit.location))
                .unwrap_or(false);
            let can_be_lifted = unit.is_transportable() && liftable.contains(&unit.location);
            if stuck && !can_be_lifted {
                pool.claim(unit_id);
                if let Some(assessment) = move_map.get_mut(&unit.location) {
                    assessment.add_cant_move_unit(unit_id);
                }
            }
        }

        if let Some(purchases) = purchases {
            let mut territories: Vec<&TerritoryId> = purchases.keys().collect();
            territories.sort_unstable();
            for &t in territories {
                if let Some(assessment) = move_map.get_mut(&t) {
                    for &unit in &purchases[&t] {
                        assessment.add_cant_move_unit(unit);
                    }
                }
            }
        }
    }

    /// Leave one cheap defender on each undefended owned border territory
    /// so it cannot be walked into for free
    fn garrison_border_territories(&self, move_map: &mut MoveMap, pool: &mut UnitPool) {
        for t in sorted_keys(move_map) {
            let territory = self.graph.territory(t);
            if !territory.is_land() || territory.owner != Some(self.player) {
                continue;
            }
            let borders_enemy = self.graph.neighbors(t).iter().any(|&n| {
                let neighbor = self.graph.territory(n);
                neighbor.is_land()
                    && neighbor
                        .owner
                        .map(|o| self.relations.is_enemy(self.player, o))
                        .unwrap_or(false)
            });
            if !borders_enemy {
                continue;
            }
            let already_defended = move_map
                .get(&t)
                .map(|a| {
                    a.cant_move_units
                        .iter()
                        .chain(a.units.iter())
                        .any(|&id| self.graph.unit(id).is_land())
                })
                .unwrap_or(false)
                || self
                    .graph
                    .units_in(t)
                    .any(|u| u.is_land() && u.owner == self.player && !pool.contains(u.id));
            if already_defended {
                continue;
            }
            let budget = territory.production + self.config.garrison_cost_slack;
            let candidate = pool
                .sorted_by_fewest_options(self.graph, &[t])
                .into_iter()
                .find(|&id| {
                    let unit = self.graph.unit(id);
                    unit.is_land() && unit.cost <= budget
                });
            if let Some(unit) = candidate {
                debug!(territory = %territory.name, unit = ?unit, "garrisoning border territory");
                pool.claim(unit);
                if let Some(assessment) = move_map.get_mut(&t) {
                    assessment.add_unit(unit);
                }
            }
        }
    }

    /// Land distance from the capital to the closest enemy-owned land
    fn enemy_distance_from_capital(&self, capital: Option<TerritoryId>) -> Option<u32> {
        let capital = capital?;
        let any_land = Passability::land(self.relations, self.player, true);
        self.graph
            .territories()
            .filter(|t| {
                t.is_land()
                    && t.owner
                        .map(|o| self.relations.is_enemy(self.player, o))
                        .unwrap_or(false)
            })
            .filter_map(|t| self.graph.distance(capital, t.id, &any_land))
            .min()
    }

    /// Write strategic values into the assessments for the placement pass.
    /// With `boost` set, land within the given radius of the capital is
    /// worth ten times more, so placement concentrates there.
    fn apply_strategic_values(
        &self,
        move_map: &mut MoveMap,
        land_values: &AHashMap<TerritoryId, f64>,
        sea_values: &AHashMap<TerritoryId, f64>,
        boost: Option<(TerritoryId, u32)>,
    ) {
        let boosted: AHashSet<TerritoryId> = match boost {
            Some((capital, radius)) => {
                let any_land = Passability::land(self.relations, self.player, true);
                let mut zone: AHashSet<TerritoryId> =
                    self.graph.neighbors_within(capital, radius, &any_land).into_iter().collect();
                zone.insert(capital);
                zone
            }
            None => AHashSet::new(),
        };
        for t in sorted_keys(move_map) {
            let Some(assessment) = move_map.get_mut(&t) else {
                continue;
            };
            if !assessment.can_hold {
                assessment.value = 0.0;
                assessment.sea_value = 0.0;
                continue;
            }
            if self.graph.territory(t).is_land() {
                let mut value = land_values.get(&t).copied().unwrap_or(0.0);
                if boosted.contains(&t) {
                    value *= 10.0;
                }
                assessment.value = value;
                assessment.sea_value = 0.0;
            } else {
                let value = sea_values.get(&t).copied().unwrap_or(0.0);
                assessment.value = value;
                assessment.sea_value = value;
            }
        }
    }

    /// Turn the committed move map into executable orders
    fn emit_plan(&self, move_map: &MoveMap) -> NonCombatPlan {
        let mut plan = NonCombatPlan::default();
        for t in sorted_keys(move_map) {
            let Some(assessment) = move_map.get(&t) else {
                continue;
            };
            let mut cargo_units: AHashSet<UnitId> = AHashSet::new();
            let mut transports: Vec<UnitId> =
                assessment.amphib_attack_map.keys().copied().collect();
            transports.sort_unstable();
            for transport in transports {
                let cargo = assessment.amphib_attack_map[&transport].clone();
                cargo_units.extend(cargo.iter().copied());
                let Some(&unload_at) = assessment.transport_territory_map.get(&transport) else {
                    warn!(transport = ?transport, "amphib assignment without unload position, skipped");
                    continue;
                };
                plan.amphib.push(AmphibOrder {
                    transport,
                    cargo,
                    unload_at,
                    destination: t,
                });
            }
            for &unit in &assessment.units {
                let u = self.graph.unit(unit);
                if u.owner != self.player
                    || cargo_units.contains(&unit)
                    || assessment.amphib_attack_map.contains_key(&unit)
                {
                    continue;
                }
                if u.location != t {
                    plan.moves.push(MoveOrder {
                        unit,
                        from: u.location,
                        to: t,
                    });
                }
            }
        }
        plan
    }
}
