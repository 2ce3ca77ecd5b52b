//! Attack plans: one target province, one or more movement orders into it,
//! and the result of simulating the resulting battle

use ahash::AHashSet;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::campaign::{CampaignMap, MovementOrder, Province};
use crate::combat::{Combat, CombatOutcome, CombatSettings, RollMode, UnitStack};
use crate::core::config::AiConfig;
use crate::core::types::{FactionId, ProvinceId};
use crate::dice::RandomSource;
use crate::units::Unit;

/// Where a plan stands in the turn's review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanState {
    /// Not simulated yet
    Incomplete,
    /// Simulated, waiting for the greedy pass
    NotReviewed,
    Accepted,
    Rejected,
}

/// Result of one simulated battle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub outcome: CombatOutcome,
    pub turns: u32,
    /// Training cost of attackers lost
    pub attacker_loss: u64,
    /// Training cost of playable-faction defenders destroyed
    pub enemy_loss: u64,
}

#[derive(Debug, Clone)]
pub struct ProvinceAttackPlan {
    target: ProvinceId,
    target_owner: Option<FactionId>,
    value: f64,
    defenders: Vec<Unit>,
    defenders_cost: u64,
    orders: Vec<MovementOrder>,
    simulations: Vec<SimulationSummary>,
    win_ratio: f64,
    gain: f64,
    loss: f64,
    enemy_loss: f64,
    state: PlanState,
}

impl ProvinceAttackPlan {
    /// Empty plan against `target`; the garrison is captured as it stands now
    pub fn new(target: &Province) -> Self {
        Self {
            target: target.id,
            target_owner: target.owner,
            value: target.value,
            defenders: target.garrison.clone(),
            defenders_cost: target.garrison_cost(),
            orders: Vec::new(),
            simulations: Vec::new(),
            win_ratio: 0.0,
            gain: 0.0,
            loss: 0.0,
            enemy_loss: 0.0,
            state: PlanState::Incomplete,
        }
    }

    pub fn target(&self) -> ProvinceId {
        self.target
    }

    pub fn target_owner(&self) -> Option<FactionId> {
        self.target_owner
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn defenders(&self) -> &[Unit] {
        &self.defenders
    }

    pub fn defenders_cost(&self) -> u64 {
        self.defenders_cost
    }

    pub fn orders(&self) -> &[MovementOrder] {
        &self.orders
    }

    pub fn simulations(&self) -> &[SimulationSummary] {
        &self.simulations
    }

    pub fn win_ratio(&self) -> f64 {
        self.win_ratio
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn loss(&self) -> f64 {
        self.loss
    }

    pub fn enemy_loss(&self) -> f64 {
        self.enemy_loss
    }

    pub fn state(&self) -> PlanState {
        self.state
    }

    pub fn set_state(&mut self, state: PlanState) {
        self.state = state;
    }

    pub fn score(&self) -> f64 {
        self.gain + self.enemy_loss - self.loss
    }

    /// Add an order into the target. Orders aimed elsewhere are dropped.
    pub fn add_movement_order(&mut self, order: MovementOrder) -> bool {
        if order.destination != self.target {
            tracing::warn!(
                "Order from {:?} heads to {:?}, not plan target {:?}; dropped",
                order.origin,
                order.destination,
                self.target
            );
            return false;
        }
        self.orders.push(order);
        true
    }

    /// Copy of this plan with one more order, ready to be simulated again
    pub fn extended_with(&self, order: MovementOrder) -> Option<Self> {
        let mut plan = self.clone();
        plan.simulations.clear();
        plan.state = PlanState::Incomplete;
        plan.add_movement_order(order).then_some(plan)
    }

    /// True when no order shares an origin or a destination with `orders`
    pub fn is_compatible_with(&self, orders: &[MovementOrder]) -> bool {
        self.orders.iter().all(|mine| {
            orders
                .iter()
                .all(|other| mine.origin != other.origin && mine.destination != other.destination)
        })
    }

    pub fn has_heroes(&self) -> bool {
        self.orders.iter().any(MovementOrder::has_heroes)
            || self
                .defenders
                .iter()
                .any(|u| u.quantity > 0 && u.unit_type.is_hero())
    }

    /// Record an evaluation computed elsewhere, leaving the plan ready for review
    pub fn with_evaluation(mut self, win_ratio: f64, loss: f64, enemy_loss: f64) -> Self {
        self.win_ratio = win_ratio;
        self.gain = self.value * win_ratio;
        self.loss = loss;
        self.enemy_loss = enemy_loss;
        self.state = PlanState::NotReviewed;
        self
    }

    /// Simulate the attack and score it. Returns the number of combats run.
    pub fn run_combat_simulations(
        &mut self,
        map: &CampaignMap,
        faction: FactionId,
        ai: &AiConfig,
        settings: &CombatSettings,
        rng: &mut dyn RandomSource,
    ) -> u32 {
        let defending_quantity: u32 = self.defenders.iter().map(|u| u.quantity).sum();
        if defending_quantity == 0 && ai.simulation_fidelity == 0 {
            self.simulations.clear();
            self.win_ratio = 1.0;
            self.gain = self.value;
            self.loss = 0.0;
            self.enemy_loss = 0.0;
            self.state = PlanState::NotReviewed;
            return 0;
        }

        let attackers = self.attacker_stacks(map, faction);
        let defenders = self.defender_stacks(map, faction, ai.simulation_fidelity);
        let playable: AHashSet<FactionId> = defenders
            .iter()
            .filter_map(UnitStack::owner)
            .filter(|owner| map.faction(*owner).map(|f| f.playable).unwrap_or(false))
            .collect();

        let mut runs = ai.simulations_per_plan;
        if self.has_heroes() {
            runs *= ai.hero_simulation_multiplier;
        }
        let seeds: Vec<u64> = (0..runs).map(|_| rng.next_seed()).collect();
        let settings = settings.clone().with_mode(RollMode::Live);
        let target = self.target;

        let simulate = |seed: &u64| {
            simulate_once(target, &attackers, &defenders, &playable, &settings, *seed)
        };
        let simulations: Vec<SimulationSummary> = if ai.parallel {
            seeds.par_iter().map(simulate).collect()
        } else {
            seeds.iter().map(simulate).collect()
        };

        let n = simulations.len().max(1) as f64;
        let wins = simulations
            .iter()
            .filter(|s| s.outcome == CombatOutcome::AttackerVictory)
            .count();
        self.win_ratio = wins as f64 / n;
        self.gain = self.value * self.win_ratio;
        self.loss = simulations.iter().map(|s| s.attacker_loss as f64).sum::<f64>() / n;
        self.enemy_loss = simulations.iter().map(|s| s.enemy_loss as f64).sum::<f64>() / n;
        self.simulations = simulations;
        self.state = PlanState::NotReviewed;

        tracing::debug!(
            "Plan on {:?}: {} runs, win ratio {:.2}, score {:.1}",
            self.target,
            runs,
            self.win_ratio,
            self.score()
        );
        runs
    }

    fn attacker_stacks(&self, map: &CampaignMap, faction: FactionId) -> Vec<UnitStack> {
        let bonus = map.wound_check_bonus(faction);
        self.orders
            .iter()
            .flat_map(|order| {
                order.units.iter().filter(|u| u.quantity > 0).map(move |u| {
                    UnitStack::new(u.clone())
                        .with_owner(faction)
                        .with_retreat(order.origin)
                        .with_wound_check_bonus(bonus)
                })
            })
            .collect()
    }

    /// Target garrison, plus at fidelity 1 and above the garrisons of every
    /// adjacent hostile major faction, standing in for their counterattack
    fn defender_stacks(&self, map: &CampaignMap, faction: FactionId, fidelity: u8) -> Vec<UnitStack> {
        let mut stacks = Vec::new();
        let mut add = |units: &[Unit], owner: Option<FactionId>| {
            for unit in units.iter().filter(|u| u.quantity > 0) {
                let mut stack = UnitStack::new(unit.clone());
                if let Some(owner) = owner {
                    stack = stack
                        .with_owner(owner)
                        .with_wound_check_bonus(map.wound_check_bonus(owner));
                }
                stacks.push(stack);
            }
        };
        add(self.defenders.as_slice(), self.target_owner);

        if fidelity > 0 {
            for neighbor in map.neighbors(self.target) {
                let Some(owner) = neighbor.owner else {
                    continue;
                };
                let major = map.faction(owner).map(|f| f.major).unwrap_or(false);
                if owner != faction && major {
                    add(neighbor.garrison.as_slice(), Some(owner));
                }
            }
        }
        stacks
    }
}

fn simulate_once(
    target: ProvinceId,
    attackers: &[UnitStack],
    defenders: &[UnitStack],
    playable: &AHashSet<FactionId>,
    settings: &CombatSettings,
    seed: u64,
) -> SimulationSummary {
    let attacker_cost: u64 = attackers.iter().map(UnitStack::training_cost).sum();
    let enemy_cost = playable_cost(defenders, playable);

    let mut combat = Combat::new(
        target,
        attackers.iter().map(UnitStack::clone_for_simulation).collect(),
        defenders.iter().map(UnitStack::clone_for_simulation).collect(),
        settings.clone(),
    );
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let outcome = combat.resolve_combat(&mut rng, &mut ());

    let (attacker_loss, enemy_loss) = if outcome == CombatOutcome::AttackerVictory {
        let surviving: u64 = combat.attackers().iter().map(UnitStack::training_cost).sum();
        (attacker_cost.saturating_sub(surviving), enemy_cost)
    } else {
        let surviving = playable_cost(combat.defenders(), playable);
        (attacker_cost, enemy_cost.saturating_sub(surviving))
    };

    SimulationSummary {
        outcome,
        turns: combat.turn(),
        attacker_loss,
        enemy_loss,
    }
}

fn playable_cost(stacks: &[UnitStack], playable: &AHashSet<FactionId>) -> u64 {
    stacks
        .iter()
        .filter(|s| s.owner().map(|o| playable.contains(&o)).unwrap_or(false))
        .map(UnitStack::training_cost)
        .sum()
}
