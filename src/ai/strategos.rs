//! Turn planner for a computer-controlled faction
//!
//! Movement planning simulates attacks from every border province, then
//! accepts the best plans that do not share an origin or a target. Training
//! planning reads the rejected plans to find threats worth countering.

use ordered_float::OrderedFloat;
use std::sync::Arc;

use crate::ai::attack_plan::{PlanState, ProvinceAttackPlan};
use crate::ai::training::{ProvinceTrainingPlan, TrainingReason};
use crate::campaign::{AiLevel, CampaignMap, Faction, MovementOrder, Province, TrainingOrder};
use crate::combat::{attacking_counter, defending_counter, CombatSettings, ExpectedDamageCache};
use crate::core::config::{AiConfig, GameConfig};
use crate::core::error::{GameError, Result};
use crate::core::types::{FactionId, ProvinceId};
use crate::dice::{roll_successes, RandomSource};
use crate::units::UnitType;

/// An enemy unit type our attack had no answer to
struct Threat {
    target: ProvinceId,
    unit_type: Arc<UnitType>,
    quantity: u32,
    origins: Vec<ProvinceId>,
}

/// Everything the AI wants done this turn
#[derive(Debug, Clone, Default)]
pub struct TurnOrders {
    pub movements: Vec<MovementOrder>,
    pub training: Vec<TrainingOrder>,
}

pub struct Strategos {
    faction: FactionId,
    ai: AiConfig,
    settings: CombatSettings,
    plans: Vec<ProvinceAttackPlan>,
    simulations_run: u32,
}

impl Strategos {
    pub fn new(faction: FactionId, config: &GameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            faction,
            ai: config.ai.clone(),
            settings: CombatSettings::new(&config.combat)?,
            plans: Vec::new(),
            simulations_run: 0,
        })
    }

    /// Share an expected damage cache with other planners
    pub fn with_cache(mut self, cache: Arc<ExpectedDamageCache>) -> Self {
        self.settings = self.settings.with_cache(cache);
        self
    }

    pub fn faction(&self) -> FactionId {
        self.faction
    }

    /// Plans built by the last `select_movements`
    pub fn plans(&self) -> &[ProvinceAttackPlan] {
        &self.plans
    }

    /// Combats simulated by the last `select_movements`
    pub fn simulations_run(&self) -> u32 {
        self.simulations_run
    }

    pub fn plan_turn(&mut self, map: &CampaignMap, rng: &mut dyn RandomSource) -> Result<TurnOrders> {
        let movements = self.select_movements(map, rng)?;
        let training = self.select_training(map, rng)?;
        tracing::info!(
            "Faction {:?} turn: {} movements, {} training orders, {} simulations",
            self.faction,
            movements.len(),
            training.len(),
            self.simulations_run
        );
        Ok(TurnOrders {
            movements,
            training,
        })
    }

    pub fn select_movements(
        &mut self,
        map: &CampaignMap,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<MovementOrder>> {
        let faction = self.lookup_faction(map)?;
        let level = faction.ai_level;
        self.plans.clear();
        self.simulations_run = 0;

        let mut origins: Vec<&Province> = map
            .owned_provinces(self.faction)
            .filter(|p| p.garrison_quantity() > 0)
            .collect();
        origins.sort_by_key(|p| std::cmp::Reverse(p.garrison_quantity()));

        let mut movements = Vec::new();
        for origin in origins {
            if map.is_inner(origin.id, self.faction) {
                if let Some(order) = self.inner_move(map, origin) {
                    movements.push(order);
                }
                continue;
            }
            self.plan_border_attacks(map, origin, level, rng);
        }

        let cap = if level == AiLevel::Easy {
            self.ai.easy_review_cap
        } else {
            self.ai.review_cap
        };
        for index in select_plans(&mut self.plans, cap, self.ai.min_accept_score) {
            tracing::debug!(
                "Accepted attack on {:?} with score {:.1}",
                self.plans[index].target(),
                self.plans[index].score()
            );
            movements.extend(self.plans[index].orders().iter().cloned());
        }
        Ok(movements)
    }

    /// Whole garrison steps toward the nearest hostile province
    fn inner_move(&self, map: &CampaignMap, origin: &Province) -> Option<MovementOrder> {
        let mut best: Option<(ProvinceId, u32)> = None;
        for &neighbor in &origin.neighbors {
            let Some(distance) = map.distance_to_hostile(neighbor, self.faction) else {
                continue;
            };
            match best {
                Some((_, shortest)) if distance >= shortest => {}
                _ => best = Some((neighbor, distance)),
            }
        }
        let (destination, _) = best?;
        Some(MovementOrder::new(origin.id, destination, origin.garrison.clone()))
    }

    fn plan_border_attacks(
        &mut self,
        map: &CampaignMap,
        origin: &Province,
        level: AiLevel,
        rng: &mut dyn RandomSource,
    ) {
        let mut candidates = Vec::new();

        if level > AiLevel::Easy {
            for plan in &self.plans {
                let reviewable = plan.state() == PlanState::NotReviewed && plan.loss() > 0.0;
                if !reviewable || !origin.is_neighbor(plan.target()) {
                    continue;
                }
                let order = MovementOrder::new(origin.id, plan.target(), origin.garrison.clone());
                if let Some(extended) = plan.extended_with(order) {
                    candidates.push(extended);
                }
            }
        }

        for target in map.neighbors(origin.id) {
            if !map.is_hostile(target.id, self.faction) {
                continue;
            }
            let mut plan = ProvinceAttackPlan::new(target);
            plan.add_movement_order(MovementOrder::new(
                origin.id,
                target.id,
                origin.garrison.clone(),
            ));
            candidates.push(plan);
        }

        candidates.sort_by_key(|p| std::cmp::Reverse(OrderedFloat(p.value())));

        let mut best_score = f64::NEG_INFINITY;
        for plan in candidates.iter_mut() {
            if self.simulations_run >= self.ai.simulation_budget {
                break;
            }
            if plan.value() + plan.defenders_cost() as f64 <= best_score {
                continue;
            }
            let ran = plan.run_combat_simulations(map, self.faction, &self.ai, &self.settings, rng);
            self.simulations_run += ran;
            best_score = best_score.max(plan.score());
        }
        self.plans.extend(candidates);
    }

    pub fn select_training(
        &mut self,
        map: &CampaignMap,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<TrainingOrder>> {
        let faction = self.lookup_faction(map)?;
        let mut money = faction.money;

        let mut plans: Vec<ProvinceTrainingPlan> = map
            .owned_provinces(self.faction)
            .filter(|p| p.manpower > 0 && !p.trainable.is_empty())
            .map(|p| ProvinceTrainingPlan::new(p.id, p.manpower))
            .collect();

        if faction.ai_level > AiLevel::Easy {
            self.train_counters(map, &mut plans, &mut money);
        }
        if money > 0 {
            train_fodder(map, &mut plans, &mut money, rng);
        }
        if money > 0 {
            upgrade_fodder(map, faction, &mut plans, &mut money, rng);
        }

        Ok(plans.into_iter().flat_map(ProvinceTrainingPlan::into_orders).collect())
    }

    /// Queue counters in the provinces that launched a rejected, costly plan
    /// against a unit type the attacking army had no answer to. Each threat
    /// (target province and unit type) is countered once, however many plans
    /// and origins ran into it.
    fn train_counters(&self, map: &CampaignMap, plans: &mut [ProvinceTrainingPlan], money: &mut u64) {
        let math = &self.settings.math;
        let cache = &self.settings.cache;
        let epsilon = self.ai.decisive_epsilon;
        let ratio = self.ai.defending_counter_ratio;

        for threat in self.dangerous_threats() {
            let threat_type = threat.unit_type.as_ref();
            let mut countered = 0u32;
            for &origin in &threat.origins {
                if *money == 0 {
                    return;
                }
                let Some(province) = map.province(origin) else {
                    continue;
                };
                let Some(training) = plans.iter_mut().find(|t| t.province() == province.id) else {
                    continue;
                };
                let trainable = trainable_units(province);
                let counter = match attacking_counter(math, cache, threat_type, &trainable, epsilon) {
                    Some(unit) => Some((unit, threat.quantity / 2)),
                    None => defending_counter(math, cache, threat_type, &trainable, epsilon, ratio)
                        .map(|unit| (unit, threat.quantity)),
                };
                let Some((unit, wanted)) = counter else {
                    continue;
                };
                let quantity = wanted.saturating_sub(countered).min(affordable(&unit, *money));
                let queued = training.add(&unit, quantity, TrainingReason::Counter);
                *money -= unit.training_cost() as u64 * queued as u64;
                countered += queued;
            }
        }
    }

    /// Enemy stacks in costly rejected plans that the attacking army could
    /// not counter, merged per target and unit type
    fn dangerous_threats(&self) -> Vec<Threat> {
        let math = &self.settings.math;
        let cache = &self.settings.cache;
        let epsilon = self.ai.decisive_epsilon;
        let ratio = self.ai.defending_counter_ratio;

        let mut threats: Vec<Threat> = Vec::new();
        for plan in &self.plans {
            if plan.state() != PlanState::Rejected || plan.loss() < self.ai.danger_loss_tolerance {
                continue;
            }
            let army: Vec<Arc<UnitType>> = plan
                .orders()
                .iter()
                .flat_map(|o| o.units.iter().map(|u| Arc::clone(&u.unit_type)))
                .collect();

            for unit in plan.defenders().iter().filter(|u| u.quantity > 0) {
                let threat_type = unit.unit_type.as_ref();
                let answered = attacking_counter(math, cache, threat_type, &army, epsilon).is_some()
                    || defending_counter(math, cache, threat_type, &army, epsilon, ratio).is_some();
                if answered {
                    continue;
                }

                let existing = threats.iter().position(|t| {
                    t.target == plan.target() && t.unit_type.id() == threat_type.id()
                });
                let index = match existing {
                    Some(index) => {
                        threats[index].quantity = threats[index].quantity.max(unit.quantity);
                        index
                    }
                    None => {
                        tracing::debug!(
                            "{} in {:?} is dangerous, looking for counters",
                            threat_type.name(),
                            plan.target()
                        );
                        threats.push(Threat {
                            target: plan.target(),
                            unit_type: Arc::clone(&unit.unit_type),
                            quantity: unit.quantity,
                            origins: Vec::new(),
                        });
                        threats.len() - 1
                    }
                };
                let threat = &mut threats[index];
                for order in plan.orders() {
                    if !threat.origins.contains(&order.origin) {
                        threat.origins.push(order.origin);
                    }
                }
            }
        }
        threats
    }

    fn lookup_faction<'m>(&self, map: &'m CampaignMap) -> Result<&'m Faction> {
        map.faction(self.faction)
            .ok_or(GameError::UnknownFaction(self.faction.0))
    }
}

/// Accept the best-scoring reviewable plans, rejecting every plan that
/// clashes with an accepted one. Stops after `cap` acceptances or when the
/// best remaining plan scores no more than `min_score`, which rejects the
/// rest. Returns the accepted indices in acceptance order.
pub fn select_plans(plans: &mut [ProvinceAttackPlan], cap: usize, min_score: f64) -> Vec<usize> {
    let mut accepted = Vec::new();
    while accepted.len() < cap {
        // reversed so the earliest plan wins a tie
        let best = plans
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, p)| p.state() == PlanState::NotReviewed)
            .max_by_key(|(_, p)| OrderedFloat(p.score()))
            .map(|(i, _)| i);
        let Some(best) = best else {
            break;
        };

        if plans[best].score() <= min_score {
            for plan in plans.iter_mut().filter(|p| p.state() == PlanState::NotReviewed) {
                plan.set_state(PlanState::Rejected);
            }
            break;
        }

        plans[best].set_state(PlanState::Accepted);
        let orders = plans[best].orders().to_vec();
        for plan in plans.iter_mut().filter(|p| p.state() == PlanState::NotReviewed) {
            if !plan.is_compatible_with(&orders) {
                plan.set_state(PlanState::Rejected);
            }
        }
        accepted.push(best);
    }
    accepted
}

fn trainable_units(province: &Province) -> Vec<Arc<UnitType>> {
    province
        .trainable
        .iter()
        .filter(|u| u.is_trainable() && !u.is_hero())
        .cloned()
        .collect()
}

fn affordable(unit: &UnitType, money: u64) -> u32 {
    match unit.training_cost() {
        0 => u32::MAX,
        cost => (money / cost as u64).min(u32::MAX as u64) as u32,
    }
}

/// Spend spare manpower on the cheapest units, one at a time, picking at
/// random between equally cheap types
fn train_fodder(
    map: &CampaignMap,
    plans: &mut [ProvinceTrainingPlan],
    money: &mut u64,
    rng: &mut dyn RandomSource,
) {
    for training in plans.iter_mut() {
        let Some(province) = map.province(training.province()) else {
            continue;
        };
        let cheapest: Vec<Arc<UnitType>> = province
            .cheapest_trainable()
            .into_iter()
            .filter(|u| u.is_trainable())
            .collect();
        let Some(first) = cheapest.first() else {
            continue;
        };
        let quantity = training.manpower_left().min(affordable(first, *money));
        let cost = first.training_cost() as u64;
        for _ in 0..quantity {
            let pick = rng.uniform_int(0, cheapest.len() as i32 - 1) as usize;
            let unit = &cheapest[pick.min(cheapest.len() - 1)];
            if training.add(unit, 1, TrainingReason::Fodder) == 1 {
                *money -= cost;
            }
        }
        if *money == 0 {
            return;
        }
    }
}

/// Swap some fodder for costlier units, race homelands first
fn upgrade_fodder(
    map: &CampaignMap,
    faction: &Faction,
    plans: &mut [ProvinceTrainingPlan],
    money: &mut u64,
    rng: &mut dyn RandomSource,
) {
    let homeland = |training: &ProvinceTrainingPlan| {
        faction.race.is_some()
            && map
                .province(training.province())
                .map(|p| p.dwelling_race == faction.race)
                .unwrap_or(false)
    };
    let mut order: Vec<usize> = (0..plans.len()).collect();
    order.sort_by_key(|&i| !homeland(&plans[i]));

    for index in order {
        let training = &mut plans[index];
        let Some(province) = map.province(training.province()) else {
            continue;
        };
        let trainable = trainable_units(province);

        for (fodder, quantity) in training.fodder() {
            let upgrades = roll_successes(rng, quantity);
            for _ in 0..upgrades {
                let base = fodder.training_cost() as u64;
                let options: Vec<&Arc<UnitType>> = trainable
                    .iter()
                    .filter(|u| {
                        let cost = u.training_cost() as u64;
                        cost > base && cost - base <= *money
                    })
                    .collect();
                if options.is_empty() {
                    break;
                }
                let pick = rng.uniform_int(0, options.len() as i32 - 1) as usize;
                let unit = options[pick.min(options.len() - 1)];
                if training.take_fodder(&fodder) {
                    training.add(unit, 1, TrainingReason::Core);
                    *money -= unit.training_cost() as u64 - base;
                }
            }
            if *money == 0 {
                return;
            }
        }
    }
}
