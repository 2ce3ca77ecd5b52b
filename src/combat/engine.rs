//! Combat state machine
//!
//! A round runs START -> MAGIC (creation, defensive, offensive) -> RANGED ->
//! SKIRMISH -> CHARGE -> MELEE -> DIVINE -> CLEANUP. Attack phases only roll
//! attacks; the caller resolves them one at a time with
//! `resolve_current_attack`, or hands the whole battle to `resolve_combat`.
//!
//! Rolls made at the start of a phase are resolved even if their source dies
//! before its turn comes, so both sides can be wiped out in the same phase.

use ahash::AHashSet;
use std::sync::Arc;

use crate::combat::cache::ExpectedDamageCache;
use crate::combat::events::{
    AttackResolution, CombatEvent, CombatEventLog, CombatObserver, CombatOutcome,
};
use crate::combat::math::{CombatMath, RolledAttack};
use crate::combat::phase::{CombatPhase, MagicPhase};
use crate::combat::rolls::{AttackRollResult, AttackRollResultsCollection};
use crate::combat::stack::{DamageOutcome, UnitStack};
use crate::combat::tactician::{select_cheapest_unit, TacticianPolicy};
use crate::core::config::CombatConfig;
use crate::core::error::Result;
use crate::core::types::{ProvinceId, Side, StackId};
use crate::dice::RandomSource;
use crate::units::{Spell, SpellEffects, SpellKind, SpellTiming, Unit, UnitType};

/// How attacks are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RollMode {
    /// Attack and defence dice are rolled
    #[default]
    Live,
    /// Each opportunity deals the stochastically rounded expected damage
    Estimated,
}

/// Who picks defending stacks for a side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideController {
    /// The caller picks with `Combat::choose_target`
    Human,
    Ai(TacticianPolicy),
}

impl Default for SideController {
    fn default() -> Self {
        SideController::Ai(TacticianPolicy::Cheapest)
    }
}

/// Everything a combat needs besides the stacks
#[derive(Debug, Clone)]
pub struct CombatSettings {
    pub mode: RollMode,
    pub attacker_controller: SideController,
    pub defender_controller: SideController,
    pub math: CombatMath,
    pub cache: Arc<ExpectedDamageCache>,
    pub max_turns: u32,
    pub healing_yields: bool,
}

impl CombatSettings {
    pub fn new(config: &CombatConfig) -> Result<Self> {
        Ok(Self {
            mode: RollMode::Live,
            attacker_controller: SideController::default(),
            defender_controller: SideController::default(),
            math: CombatMath::new(config)?,
            cache: Arc::new(ExpectedDamageCache::new()),
            max_turns: config.max_turns,
            healing_yields: config.healing_yields,
        })
    }

    pub fn with_mode(mut self, mode: RollMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_controllers(mut self, attacker: SideController, defender: SideController) -> Self {
        self.attacker_controller = attacker;
        self.defender_controller = defender;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ExpectedDamageCache>) -> Self {
        self.cache = cache;
        self
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Attacker => 0,
        Side::Defender => 1,
    }
}

const SIDES: [Side; 2] = [Side::Attacker, Side::Defender];

pub struct Combat {
    province: ProvinceId,
    attackers: Vec<UnitStack>,
    defenders: Vec<UnitStack>,
    attacker_rolls: Vec<AttackRollResultsCollection>,
    defender_rolls: Vec<AttackRollResultsCollection>,
    settings: CombatSettings,
    turn: u32,
    phase: CombatPhase,
    magic_phase: MagicPhase,
    phase_announced: bool,
    current_collection: Option<(Side, StackId)>,
    current_target: Option<StackId>,
    resolved_in_phase: [u32; 2],
    cast_this_round: AHashSet<(StackId, usize)>,
    next_stack_id: u32,
    over: bool,
    outcome: Option<CombatOutcome>,
}

impl Combat {
    /// Stacks are numbered as they enter; existing ids are replaced
    pub fn new(
        province: ProvinceId,
        attackers: Vec<UnitStack>,
        defenders: Vec<UnitStack>,
        settings: CombatSettings,
    ) -> Self {
        let mut combat = Self {
            province,
            attackers: Vec::with_capacity(attackers.len()),
            defenders: Vec::with_capacity(defenders.len()),
            attacker_rolls: Vec::new(),
            defender_rolls: Vec::new(),
            settings,
            turn: 1,
            phase: CombatPhase::Start,
            magic_phase: MagicPhase::UnitCreation,
            phase_announced: false,
            current_collection: None,
            current_target: None,
            resolved_in_phase: [0; 2],
            cast_this_round: AHashSet::new(),
            next_stack_id: 1,
            over: false,
            outcome: None,
        };
        for stack in attackers {
            combat.add_stack(Side::Attacker, stack);
        }
        for stack in defenders {
            combat.add_stack(Side::Defender, stack);
        }
        combat
    }

    fn add_stack(&mut self, side: Side, mut stack: UnitStack) -> StackId {
        let id = StackId(self.next_stack_id);
        self.next_stack_id += 1;
        stack.set_id(id);
        self.stacks_mut(side).push(stack);
        id
    }

    pub fn province(&self) -> ProvinceId {
        self.province
    }

    pub fn attackers(&self) -> &[UnitStack] {
        &self.attackers
    }

    pub fn defenders(&self) -> &[UnitStack] {
        &self.defenders
    }

    pub fn stacks(&self, side: Side) -> &[UnitStack] {
        match side {
            Side::Attacker => &self.attackers,
            Side::Defender => &self.defenders,
        }
    }

    fn stacks_mut(&mut self, side: Side) -> &mut Vec<UnitStack> {
        match side {
            Side::Attacker => &mut self.attackers,
            Side::Defender => &mut self.defenders,
        }
    }

    pub fn pending_rolls(&self, side: Side) -> &[AttackRollResultsCollection] {
        match side {
            Side::Attacker => &self.attacker_rolls,
            Side::Defender => &self.defender_rolls,
        }
    }

    fn rolls_mut(&mut self, side: Side) -> &mut Vec<AttackRollResultsCollection> {
        match side {
            Side::Attacker => &mut self.attacker_rolls,
            Side::Defender => &mut self.defender_rolls,
        }
    }

    pub fn has_pending_rolls(&self) -> bool {
        !self.attacker_rolls.is_empty() || !self.defender_rolls.is_empty()
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn phase(&self) -> CombatPhase {
        self.phase
    }

    pub fn magic_phase(&self) -> MagicPhase {
        self.magic_phase
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn outcome(&self) -> Option<CombatOutcome> {
        self.outcome
    }

    pub fn current_target(&self) -> Option<StackId> {
        self.current_target
    }

    pub fn find_stack(&self, id: StackId) -> Option<(Side, &UnitStack)> {
        SIDES.iter().find_map(|&side| {
            self.stacks(side)
                .iter()
                .find(|s| s.id() == id)
                .map(|stack| (side, stack))
        })
    }

    fn controller(&self, side: Side) -> SideController {
        match side {
            Side::Attacker => self.settings.attacker_controller,
            Side::Defender => self.settings.defender_controller,
        }
    }

    fn total_quantity(&self, side: Side) -> u32 {
        self.stacks(side).iter().map(UnitStack::quantity).sum()
    }

    /// Advance through phases until attack rolls are waiting, a step
    /// produced something the caller should see, or the combat ended
    pub fn perform_phase_actions(&mut self, rng: &mut dyn RandomSource) -> CombatEventLog {
        let mut log = CombatEventLog::new();
        loop {
            if self.check_end(rng, &mut log) || self.has_pending_rolls() {
                break;
            }
            let yielded = self.run_phase(rng, &mut log);
            if yielded || self.over {
                break;
            }
        }
        log
    }

    /// Run one step of the current phase. Returns true when control should
    /// go back to the caller.
    fn run_phase(&mut self, rng: &mut dyn RandomSource, log: &mut CombatEventLog) -> bool {
        if !self.phase_announced {
            self.phase_announced = true;
            tracing::trace!("Turn {} phase {:?}", self.turn, self.phase);
            log.push(CombatEvent::PhaseStarted {
                turn: self.turn,
                phase: self.phase,
            });
        }

        match self.phase {
            CombatPhase::Start => {
                for side in SIDES {
                    for stack in self.stacks_mut(side) {
                        let abilities = stack.unit_type().abilities();
                        stack.add_effects(abilities);
                    }
                }
                self.advance_phase();
                false
            }
            CombatPhase::Magic => {
                let timing = match self.magic_phase {
                    MagicPhase::UnitCreation => SpellTiming::Creation,
                    MagicPhase::Defensive => SpellTiming::Defensive,
                    MagicPhase::Offensive => SpellTiming::Offensive,
                };
                let mut produced = false;
                for side in SIDES {
                    produced |= self.cast_spells(rng, side, timing, true, log);
                }
                if produced {
                    return true;
                }
                match self.magic_phase.next() {
                    Some(next) => self.magic_phase = next,
                    None => {
                        self.magic_phase = MagicPhase::UnitCreation;
                        self.advance_phase();
                    }
                }
                false
            }
            CombatPhase::Ranged
            | CombatPhase::Skirmish
            | CombatPhase::Charge
            | CombatPhase::Melee => {
                self.generate_attack_rolls(rng, self.phase);
                self.advance_phase();
                false
            }
            CombatPhase::Divine => {
                let mut healed = false;
                for side in SIDES {
                    healed |= self.cast_spells(rng, side, SpellTiming::Restorative, true, log);
                }
                if healed && self.settings.healing_yields {
                    return true;
                }
                self.generate_attack_rolls(rng, CombatPhase::Divine);
                self.advance_phase();
                false
            }
            CombatPhase::Cleanup => {
                self.cleanup();
                if self.turn > self.settings.max_turns {
                    tracing::debug!(
                        "Combat in {:?} reached {} turns, calling a stalemate",
                        self.province,
                        self.settings.max_turns
                    );
                    self.finish(rng, Some(CombatOutcome::Stalemate), log);
                    return true;
                }
                false
            }
        }
    }

    fn advance_phase(&mut self) {
        self.phase = self.phase.next();
        self.phase_announced = false;
    }

    /// End-of-round expiry: conjured creatures leave, spell effects lapse
    fn cleanup(&mut self) {
        for side in SIDES {
            let stacks = self.stacks_mut(side);
            stacks.retain(|s| !s.unit_type().id().is_summoned_creature());
            for stack in stacks.iter_mut() {
                stack.clear_effects();
            }
        }
        self.cast_this_round.clear();
        self.turn += 1;
        self.advance_phase();
    }

    fn generate_attack_rolls(&mut self, rng: &mut dyn RandomSource, phase: CombatPhase) {
        let quality = phase.attack_quality();
        let estimated = self.settings.mode == RollMode::Estimated;
        let math = self.settings.math;

        for side in SIDES {
            let mut collections = Vec::new();
            for stack in self.stacks(side) {
                if stack.is_empty()
                    || stack.has_effect(SpellEffects::CONFUSION)
                    || !stack.unit_type().has_attacks_for(quality)
                {
                    continue;
                }
                let unit_type = stack.unit_type();
                let mut collection = AttackRollResultsCollection::new(stack.id(), side);

                if estimated {
                    // One opportunity per combatant; damage covers every attack
                    let Some(index) = unit_type
                        .attacks()
                        .iter()
                        .position(|a| a.has_quality(quality))
                    else {
                        continue;
                    };
                    for _ in 0..stack.quantity() {
                        collection.push(AttackRollResult::new(
                            stack.id(),
                            side,
                            Arc::clone(unit_type),
                            index,
                            phase,
                            RolledAttack::default(),
                            true,
                        ));
                    }
                } else {
                    for (index, attack) in unit_type.attacks().iter().enumerate() {
                        if !attack.has_quality(quality) {
                            continue;
                        }
                        for _ in 0..stack.quantity() * attack.count() {
                            let rolled = math.roll_attack(rng, attack);
                            collection.push(AttackRollResult::new(
                                stack.id(),
                                side,
                                Arc::clone(unit_type),
                                index,
                                phase,
                                rolled,
                                false,
                            ));
                        }
                    }
                }

                if !collection.is_empty() {
                    collections.push(collection);
                }
            }
            // Lowest skill resolves first
            collections.sort_by_key(AttackRollResultsCollection::first_skill);
            *self.rolls_mut(side) = collections;
        }

        self.resolved_in_phase = [0; 2];
        self.current_collection = None;
        self.current_target = None;
    }

    /// Cast every spell of `timing` held by `side`. Returns true if any
    /// spell took effect.
    fn cast_spells(
        &mut self,
        rng: &mut dyn RandomSource,
        side: Side,
        timing: SpellTiming,
        once_per_round: bool,
        log: &mut CombatEventLog,
    ) -> bool {
        // Stacks summoned during this pass do not cast in it
        let casters: Vec<(StackId, Arc<UnitType>)> = self
            .stacks(side)
            .iter()
            .filter(|s| !s.is_empty() && !s.has_effect(SpellEffects::CONFUSION))
            .map(|s| (s.id(), Arc::clone(s.unit_type())))
            .collect();

        let mut produced = false;
        for (caster, unit_type) in casters {
            for (index, spell) in unit_type.spells().iter().enumerate() {
                if spell.timing() != timing {
                    continue;
                }
                if once_per_round && !self.cast_this_round.insert((caster, index)) {
                    continue;
                }
                produced |= self.cast_spell(rng, side, caster, spell, log);
            }
        }
        produced
    }

    fn cast_spell(
        &mut self,
        rng: &mut dyn RandomSource,
        side: Side,
        caster: StackId,
        spell: &Spell,
        log: &mut CombatEventLog,
    ) -> bool {
        let Some(caster_stack) = self.stacks(side).iter().find(|s| s.id() == caster) else {
            return false;
        };
        let casters = caster_stack.quantity();
        let retreat_to = caster_stack.retreat_to();
        let owner = caster_stack.owner();
        let bonus = caster_stack.wound_check_bonus();
        let caster_type = Arc::clone(caster_stack.unit_type());
        let caster_effects = caster_stack.effects();

        let target = match spell.kind() {
            SpellKind::Summon {
                unit,
                quantity,
                illusory,
            } => {
                if *quantity == 0 {
                    return false;
                }
                let unit_type = if *illusory {
                    Arc::new(unit.illusory_copy())
                } else {
                    Arc::clone(unit)
                };
                let mut summoned = UnitStack::new(Unit::new(Arc::clone(&unit_type), *quantity))
                    .with_wound_check_bonus(bonus);
                if let Some(province) = retreat_to {
                    summoned = summoned.with_retreat(province);
                }
                if let Some(owner) = owner {
                    summoned = summoned.with_owner(owner);
                }
                let id = self.add_stack(side, summoned);
                log.push(CombatEvent::StackSummoned {
                    stack: id,
                    side,
                    unit: unit_type.name().to_string(),
                    quantity: *quantity,
                });
                Some(id)
            }
            SpellKind::Ward(effect) => {
                let Some(stack) = largest_without(self.stacks_mut(side), *effect, false) else {
                    return false;
                };
                stack.add_effects(*effect);
                Some(stack.id())
            }
            SpellKind::Curse(effect) => {
                let Some(stack) = largest_without(self.stacks_mut(side.opponent()), *effect, true)
                else {
                    return false;
                };
                stack.add_effects(*effect);
                Some(stack.id())
            }
            SpellKind::Bolt(attack) => {
                let Some(index) = self.pick_defender(
                    side.opponent(),
                    &caster_type,
                    caster_effects,
                    CombatPhase::Magic,
                ) else {
                    return false;
                };
                let math = self.settings.math;
                let stack = &mut self.stacks_mut(side.opponent())[index];
                for _ in 0..casters {
                    if stack.is_empty() {
                        break;
                    }
                    let damage =
                        math.unopposed_damage(rng, attack, stack.unit_type(), stack.effects());
                    stack.take_damage(rng, damage);
                }
                Some(stack.id())
            }
            SpellKind::Heal => {
                let Some(stack) = self
                    .stacks_mut(side)
                    .iter_mut()
                    .filter(|s| s.wounded() > 0)
                    .max_by_key(|s| s.wounded())
                else {
                    return false;
                };
                let healed = stack.heal();
                log.push(CombatEvent::StacksHealed {
                    stack: stack.id(),
                    side,
                    healed,
                });
                Some(stack.id())
            }
        };

        tracing::trace!("{:?} stack {:?} cast {}", side, caster, spell.name());
        log.push(CombatEvent::SpellCast {
            caster,
            side,
            spell: spell.name().to_string(),
            target,
        });
        true
    }

    /// Index of the stack on `side` that the side's controller sends to
    /// absorb an attack. Human sides fall back to the cheapest stack.
    fn pick_defender(
        &self,
        side: Side,
        attacker: &UnitType,
        attacker_effects: SpellEffects,
        phase: CombatPhase,
    ) -> Option<usize> {
        let stacks = self.stacks(side);
        match self.controller(side) {
            SideController::Ai(policy) => policy.select_defending_stack(
                stacks,
                attacker,
                attacker_effects,
                phase,
                &self.settings.math,
                &self.settings.cache,
            ),
            SideController::Human => select_cheapest_unit(stacks),
        }
    }

    /// The collection whose rolls resolve next
    ///
    /// Attackers go first, except that a human defender who has not yet
    /// resolved anything this phase is served first.
    pub fn select_attack_roll_collection(&mut self) -> Option<(Side, StackId)> {
        if let Some((side, source)) = self.current_collection {
            if self
                .pending_rolls(side)
                .iter()
                .any(|c| c.source() == source && !c.is_empty())
            {
                return Some((side, source));
            }
            self.current_collection = None;
        }

        let defender_first = self.controller(Side::Defender) == SideController::Human
            && self.resolved_in_phase[side_index(Side::Defender)] == 0
            && !self.defender_rolls.is_empty();
        let order = if defender_first {
            [Side::Defender, Side::Attacker]
        } else {
            [Side::Attacker, Side::Defender]
        };

        let next = order.iter().find_map(|&side| {
            self.pending_rolls(side)
                .iter()
                .find(|c| !c.is_empty())
                .map(|c| (side, c.source()))
        })?;
        self.current_collection = Some(next);
        self.current_target = None;
        Some(next)
    }

    /// The stack that will take the next attack, chosen by the defending
    /// side's tactician. `None` while a human side has not chosen.
    pub fn select_defending_stack(&mut self) -> Option<StackId> {
        let (side, _) = self.select_attack_roll_collection()?;
        let target_side = side.opponent();

        if let Some(target) = self.current_target {
            if self
                .stacks(target_side)
                .iter()
                .any(|s| s.id() == target && !s.is_empty())
            {
                return Some(target);
            }
            self.current_target = None;
        }

        let SideController::Ai(policy) = self.controller(target_side) else {
            return None;
        };
        let roll = self.next_roll()?;
        let attacker_effects = self
            .find_stack(roll.source)
            .map(|(_, s)| s.effects())
            .unwrap_or_default();
        let index = policy.select_defending_stack(
            self.stacks(target_side),
            &roll.unit_type,
            attacker_effects,
            roll.phase,
            &self.settings.math,
            &self.settings.cache,
        )?;
        let target = self.stacks(target_side)[index].id();
        self.current_target = Some(target);
        Some(target)
    }

    fn next_roll(&self) -> Option<AttackRollResult> {
        let (side, source) = self.current_collection?;
        self.pending_rolls(side)
            .iter()
            .find(|c| c.source() == source)
            .and_then(|c| c.front())
            .cloned()
    }

    /// Pick the target for the current attacking collection on behalf of a
    /// human side. Fails for a stack that is not a living enemy.
    pub fn choose_target(&mut self, target: StackId) -> bool {
        let Some((side, _)) = self.select_attack_roll_collection() else {
            return false;
        };
        let valid = self
            .stacks(side.opponent())
            .iter()
            .any(|s| s.id() == target && !s.is_empty());
        if valid {
            self.current_target = Some(target);
        }
        valid
    }

    /// Resolve one attack roll against the selected target
    ///
    /// `None` means nothing was resolved: no rolls are pending, a human side
    /// still has to choose, or the cached target was invalid (the cursors
    /// are reset so the caller can select again).
    pub fn resolve_current_attack(
        &mut self,
        rng: &mut dyn RandomSource,
    ) -> Option<AttackResolution> {
        let (side, source) = self.select_attack_roll_collection()?;
        let target_id = self.select_defending_stack()?;
        let target_side = side.opponent();

        let Some(target_index) = self
            .stacks(target_side)
            .iter()
            .position(|s| s.id() == target_id && !s.is_empty())
        else {
            tracing::debug!("Invalid target {:?} for {:?}, resetting", target_id, source);
            self.current_collection = None;
            self.current_target = None;
            return None;
        };

        let collection_index = self
            .pending_rolls(side)
            .iter()
            .position(|c| c.source() == source)?;
        let roll = self.rolls_mut(side)[collection_index].pop_front()?;
        if self.pending_rolls(side)[collection_index].is_empty() {
            self.rolls_mut(side).remove(collection_index);
            self.current_collection = None;
        }
        self.resolved_in_phase[side_index(side)] += 1;

        let attacker_effects = self
            .find_stack(source)
            .map(|(_, s)| s.effects())
            .unwrap_or_default();
        let math = self.settings.math;
        let cache = Arc::clone(&self.settings.cache);
        let attack = roll.attack()?;
        let attack_name = attack.name().to_string();

        let target = &mut self.stacks_mut(target_side)[target_index];
        let target_type = Arc::clone(target.unit_type());
        let target_effects = target.effects();

        let mut resolution = AttackResolution {
            attacker: source,
            attacker_side: side,
            defender: target_id,
            attack: attack_name,
            phase: roll.phase,
            attack_dice: (roll.positive_die, roll.negative_die),
            defense_dice: None,
            skill: roll.skill,
            defense_skill: 0,
            shield: 0,
            armor: 0,
            critical: roll.critical,
            hit: false,
            damage: 0,
            outcome: DamageOutcome::Unharmed,
            estimated: roll.estimated,
        };

        if roll.estimated {
            let damage = math.estimate_stack_attacks_damage(
                rng,
                &cache,
                &roll.unit_type,
                attacker_effects,
                &target_type,
                target_effects,
                roll.phase,
            );
            resolution.hit = damage > 0;
            resolution.damage = damage;
        } else {
            let report =
                math.resolve_roll(rng, &roll.rolled(), attack, &target_type, target_effects);
            resolution.defense_dice = Some((report.positive_die, report.negative_die));
            resolution.defense_skill = report.defense_skill;
            resolution.shield = report.shield;
            resolution.armor = report.armor;
            resolution.hit = report.hit;
            resolution.damage = report.damage;
        }

        resolution.outcome = target.take_damage(rng, resolution.damage);
        if target.is_empty() {
            self.current_target = None;
        }

        tracing::trace!(
            "{:?} {:?} {} -> {:?}: hit={} damage={} {:?}",
            side,
            source,
            resolution.attack,
            target_id,
            resolution.hit,
            resolution.damage,
            resolution.outcome
        );
        Some(resolution)
    }

    fn remove_empty_stacks(&mut self) {
        self.attackers.retain(|s| !s.is_empty());
        self.defenders.retain(|s| !s.is_empty());
    }

    /// Check whether the combat is decided and finish it if so
    pub fn end_of_combat_check(&mut self, rng: &mut dyn RandomSource) -> CombatEventLog {
        let mut log = CombatEventLog::new();
        self.check_end(rng, &mut log);
        log
    }

    fn check_end(&mut self, rng: &mut dyn RandomSource, log: &mut CombatEventLog) -> bool {
        if self.over {
            return true;
        }
        self.remove_empty_stacks();
        let attackers_alive = self.total_quantity(Side::Attacker) > 0;
        let defenders_alive = self.total_quantity(Side::Defender) > 0;

        if !attackers_alive {
            self.defender_rolls.clear();
        }
        if !defenders_alive {
            self.attacker_rolls.clear();
        }
        if self.has_pending_rolls() || (attackers_alive && defenders_alive) {
            return false;
        }
        self.finish(rng, None, log);
        true
    }

    /// Withdraw the attackers and end the combat now
    ///
    /// Healing spells are skipped when retreating before anything happened
    /// this round.
    pub fn retreat(&mut self, rng: &mut dyn RandomSource) -> CombatEventLog {
        let mut log = CombatEventLog::new();
        if !self.over {
            self.finish(rng, Some(CombatOutcome::Retreat), &mut log);
        }
        log
    }

    fn finish(
        &mut self,
        rng: &mut dyn RandomSource,
        forced: Option<CombatOutcome>,
        log: &mut CombatEventLog,
    ) {
        self.attacker_rolls.clear();
        self.defender_rolls.clear();
        self.current_collection = None;
        self.current_target = None;

        let retreat_at_start =
            forced == Some(CombatOutcome::Retreat) && self.phase == CombatPhase::Start;
        if !retreat_at_start {
            for side in SIDES {
                self.cast_spells(rng, side, SpellTiming::Restorative, false, log);
            }
        }

        for side in SIDES {
            for stack in self.stacks_mut(side).iter_mut() {
                let bonus = stack.wound_check_bonus();
                let report = stack.perform_wound_checks(rng, bonus);
                if report.recovered + report.died > 0 {
                    log.push(CombatEvent::WoundChecks {
                        stack: stack.id(),
                        side,
                        recovered: report.recovered,
                        died: report.died,
                    });
                }
            }
        }
        self.remove_empty_stacks();

        let outcome = forced.unwrap_or(
            match (self.attackers.is_empty(), self.defenders.is_empty()) {
                (true, true) => CombatOutcome::Draw,
                (false, true) => CombatOutcome::AttackerVictory,
                (true, false) => CombatOutcome::DefenderVictory,
                (false, false) => CombatOutcome::Stalemate,
            },
        );

        // Conjured stacks never outlive the battle
        for side in SIDES {
            self.stacks_mut(side).retain(|s| {
                !s.unit_type().id().is_summoned_creature() && !s.unit_type().is_illusory()
            });
        }

        let captured_province =
            (outcome == CombatOutcome::AttackerVictory).then_some(self.province);
        self.over = true;
        self.outcome = Some(outcome);
        tracing::debug!(
            "Combat in {:?} finished after {} turns: {:?}",
            self.province,
            self.turn,
            outcome
        );
        log.push(CombatEvent::CombatFinished {
            outcome,
            captured_province,
        });
    }

    /// Discard the current collection when nobody can be targeted
    fn fallback_target(&mut self) {
        let Some((side, source)) = self.select_attack_roll_collection() else {
            return;
        };
        match select_cheapest_unit(self.stacks(side.opponent())) {
            Some(index) => {
                self.current_target = Some(self.stacks(side.opponent())[index].id());
            }
            None => {
                tracing::warn!("No target for {:?} stack {:?}, dropping its rolls", side, source);
                self.rolls_mut(side).retain(|c| c.source() != source);
                self.current_collection = None;
            }
        }
    }

    /// Run the combat to the end, reporting every event to `observer`
    ///
    /// Human sides that have not picked a target get the cheapest enemy
    /// stack.
    pub fn resolve_combat(
        &mut self,
        rng: &mut dyn RandomSource,
        observer: &mut dyn CombatObserver,
    ) -> CombatOutcome {
        while !self.over {
            let log = self.perform_phase_actions(rng);
            log.iter().for_each(|event| observer.on_event(event));

            while self.has_pending_rolls() && !self.over {
                match self.resolve_current_attack(rng) {
                    Some(resolution) => {
                        observer.on_event(&CombatEvent::AttackResolved(resolution));
                    }
                    None => self.fallback_target(),
                }
                let log = self.end_of_combat_check(rng);
                log.iter().for_each(|event| observer.on_event(event));
            }
        }
        self.outcome.unwrap_or(CombatOutcome::Stalemate)
    }
}

/// Largest non-empty stack without `effect`; holy stacks are skipped for
/// curses
fn largest_without(
    stacks: &mut [UnitStack],
    effect: SpellEffects,
    hostile: bool,
) -> Option<&mut UnitStack> {
    stacks
        .iter_mut()
        .filter(|s| !s.is_empty() && !s.has_effect(effect))
        .filter(|s| !(hostile && s.unit_type().is_holy()))
        .max_by_key(|s| s.quantity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedRolls;
    use crate::testing::fixtures;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn settings() -> CombatSettings {
        CombatSettings::new(&CombatConfig::default()).unwrap()
    }

    #[test]
    fn test_stack_ids_assigned_in_order() {
        let combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::peasant(), 3)],
            vec![fixtures::stack(fixtures::spearman(), 2)],
            settings(),
        );
        assert_eq!(combat.attackers()[0].id(), StackId(1));
        assert_eq!(combat.defenders()[0].id(), StackId(2));
        assert_eq!(combat.phase(), CombatPhase::Start);
        assert_eq!(combat.turn(), 1);
    }

    #[test]
    fn test_phases_stop_at_first_attack_rolls() {
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::archer(), 2)],
            vec![fixtures::stack(fixtures::peasant(), 3)],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let log = combat.perform_phase_actions(&mut rng);

        // START, MAGIC, RANGED announced; archers rolled one shot each
        assert_eq!(
            log.iter()
                .filter(|e| matches!(e, CombatEvent::PhaseStarted { .. }))
                .count(),
            3
        );
        assert_eq!(combat.phase(), CombatPhase::Skirmish);
        assert_eq!(combat.pending_rolls(Side::Attacker).len(), 1);
        assert_eq!(combat.pending_rolls(Side::Attacker)[0].len(), 2);
        assert!(combat.pending_rolls(Side::Defender).is_empty());

        // Calling again does nothing until the rolls are resolved
        assert!(combat.perform_phase_actions(&mut rng).is_empty());
    }

    #[test]
    fn test_collections_sorted_by_skill() {
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![
                fixtures::stack(fixtures::knight(), 1),
                fixtures::stack(fixtures::peasant(), 1),
                fixtures::stack(fixtures::spearman(), 1),
            ],
            vec![fixtures::stack(fixtures::ogre(), 5)],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        // Charge phase: only the knight charges
        combat.perform_phase_actions(&mut rng);
        while combat.resolve_current_attack(&mut rng).is_some() {}
        combat.perform_phase_actions(&mut rng);
        assert_eq!(combat.phase(), CombatPhase::Divine);
        let skills: Vec<i32> = combat
            .pending_rolls(Side::Attacker)
            .iter()
            .map(|c| c.first_skill())
            .collect();
        assert_eq!(skills, vec![0, 2, 4]);
    }

    #[test]
    fn test_resolution_consumes_rolls() {
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::archer(), 2)],
            vec![fixtures::stack(fixtures::ogre(), 3)],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        combat.perform_phase_actions(&mut rng);
        let first = combat.resolve_current_attack(&mut rng).expect("first shot");
        assert_eq!(first.attacker, StackId(1));
        assert_eq!(first.defender, StackId(2));
        assert!(first.defense_dice.is_some());
        assert!(combat.resolve_current_attack(&mut rng).is_some());
        assert!(combat.resolve_current_attack(&mut rng).is_none());
        assert!(!combat.has_pending_rolls());
    }

    #[test]
    fn test_human_defender_must_choose() {
        let settings = settings().with_controllers(
            SideController::Ai(TacticianPolicy::Cheapest),
            SideController::Human,
        );
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::archer(), 1)],
            vec![
                fixtures::stack(fixtures::peasant(), 2),
                fixtures::stack(fixtures::ogre(), 1),
            ],
            settings,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        combat.perform_phase_actions(&mut rng);
        assert!(combat.resolve_current_attack(&mut rng).is_none());
        // Own side is not a valid target
        assert!(!combat.choose_target(StackId(1)));
        assert!(combat.choose_target(StackId(3)));
        let resolution = combat.resolve_current_attack(&mut rng).expect("resolved");
        assert_eq!(resolution.defender, StackId(3));
    }

    #[test]
    fn test_human_defender_resolves_first() {
        let settings = settings().with_controllers(SideController::Human, SideController::Human);
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::archer(), 1)],
            vec![fixtures::stack(fixtures::archer(), 1)],
            settings,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        combat.perform_phase_actions(&mut rng);
        assert_eq!(
            combat.select_attack_roll_collection(),
            Some((Side::Defender, StackId(2)))
        );
    }

    #[test]
    fn test_attackers_resolve_first_against_ai() {
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::archer(), 1)],
            vec![fixtures::stack(fixtures::archer(), 1)],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        combat.perform_phase_actions(&mut rng);
        assert_eq!(
            combat.select_attack_roll_collection(),
            Some((Side::Attacker, StackId(1)))
        );
    }

    #[test]
    fn test_retreat_at_start_skips_healing() {
        let mut priest = fixtures::stack(fixtures::priest(), 2);
        let mut rng = ScriptedRolls::new(vec![1]);
        priest.take_damage(&mut rng, 1);
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![priest],
            vec![fixtures::stack(fixtures::peasant(), 1)],
            settings(),
        );
        // Wound check roll of 2 on 1d2 fails for a combatant at 1 hp
        let mut rng = ScriptedRolls::new(vec![2]);
        let log = combat.retreat(&mut rng);
        assert!(combat.is_over());
        assert_eq!(combat.outcome(), Some(CombatOutcome::Retreat));
        assert!(!log.iter().any(|e| matches!(e, CombatEvent::StacksHealed { .. })));
        assert_eq!(combat.attackers()[0].quantity(), 1);
        assert_eq!(log.finishes().count(), 1);
        assert!(combat.retreat(&mut rng).is_empty());
    }

    #[test]
    fn test_retreat_later_heals_first() {
        let mut priest = fixtures::stack(fixtures::priest(), 2);
        let mut rng = ScriptedRolls::new(vec![1]);
        priest.take_damage(&mut rng, 1);
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![priest],
            vec![fixtures::stack(fixtures::peasant(), 1)],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        combat.perform_phase_actions(&mut rng);
        assert_ne!(combat.phase(), CombatPhase::Start);
        let log = combat.retreat(&mut rng);
        assert!(log.iter().any(|e| matches!(e, CombatEvent::StacksHealed { .. })));
        assert_eq!(combat.attackers()[0].quantity(), 2);
    }

    #[test]
    fn test_summon_yields_and_wolves_leave_at_cleanup() {
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::shaman(), 1)],
            vec![fixtures::stack(fixtures::pilgrim(), 1)],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let log = combat.perform_phase_actions(&mut rng);
        assert!(log
            .iter()
            .any(|e| matches!(e, CombatEvent::StackSummoned { quantity: 2, .. })));
        assert_eq!(combat.phase(), CombatPhase::Magic);
        assert_eq!(combat.magic_phase(), MagicPhase::UnitCreation);
        assert_eq!(combat.attackers().len(), 2);
        let wolves = combat.attackers()[1].id();

        // Second call does not summon again
        let log = combat.perform_phase_actions(&mut rng);
        assert!(!log
            .iter()
            .any(|e| matches!(e, CombatEvent::StackSummoned { .. })));

        // Run the round out; the pilgrim dies or the round ends
        while !combat.is_over() && combat.turn() == 1 {
            while combat.resolve_current_attack(&mut rng).is_some() {}
            combat.perform_phase_actions(&mut rng);
        }
        assert!(combat.attackers().iter().all(|s| s.id() != wolves));
    }

    #[test]
    fn test_illusions_have_one_hit_point() {
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::illusionist(), 1)],
            vec![fixtures::stack(fixtures::pilgrim(), 1)],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        combat.perform_phase_actions(&mut rng);
        let phantom = &combat.attackers()[1];
        assert!(phantom.unit_type().is_illusory());
        assert_eq!(phantom.max_hit_points(), 1);
        assert_eq!(phantom.quantity(), 2);
    }

    #[test]
    fn test_abilities_apply_at_start() {
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::golem(), 1)],
            vec![fixtures::stack(fixtures::pilgrim(), 1)],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        combat.perform_phase_actions(&mut rng);
        assert!(combat.attackers()[0].has_effect(SpellEffects::MAGIC_SHIELD));
    }

    #[test]
    fn test_curse_skips_holy_and_stops_attacks() {
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::warlock(), 1)],
            vec![
                fixtures::stack(fixtures::priest(), 5),
                fixtures::stack(fixtures::spearman(), 2),
            ],
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let log = combat.perform_phase_actions(&mut rng);
        assert!(log.iter().any(|e| matches!(
            e,
            CombatEvent::SpellCast { spell, target: Some(StackId(3)), .. } if spell == "Befuddle"
        )));
        let spearmen = combat.find_stack(StackId(3)).map(|(_, s)| s.effects());
        assert_eq!(spearmen, Some(SpellEffects::CONFUSION));
        assert!(!combat.defenders()[0].has_effect(SpellEffects::CONFUSION));
    }

    #[test]
    fn test_zero_defenders_captures_once() {
        let mut combat = Combat::new(
            ProvinceId(9),
            vec![fixtures::stack(fixtures::spearman(), 4)],
            Vec::new(),
            settings(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut log = CombatEventLog::new();
        let outcome = combat.resolve_combat(&mut rng, &mut log);
        assert_eq!(outcome, CombatOutcome::AttackerVictory);
        assert_eq!(
            log.finishes().collect::<Vec<_>>(),
            vec![(CombatOutcome::AttackerVictory, Some(ProvinceId(9)))]
        );
        assert_eq!(combat.attackers()[0].quantity(), 4);
        assert!(combat.perform_phase_actions(&mut rng).is_empty());
    }

    #[test]
    fn test_harmless_sides_stalemate() {
        let config = CombatConfig {
            max_turns: 3,
            ..CombatConfig::default()
        };
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::pilgrim(), 1)],
            vec![fixtures::stack(fixtures::pilgrim(), 1)],
            CombatSettings::new(&config).unwrap(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let outcome = combat.resolve_combat(&mut rng, &mut ());
        assert_eq!(outcome, CombatOutcome::Stalemate);
        assert_eq!(combat.turn(), 4);
    }

    #[test]
    fn test_estimated_mode_has_no_defence_dice() {
        let settings = settings().with_mode(RollMode::Estimated);
        let mut combat = Combat::new(
            ProvinceId(1),
            vec![fixtures::stack(fixtures::archer(), 3)],
            vec![fixtures::stack(fixtures::ogre(), 2)],
            settings,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut log = CombatEventLog::new();
        combat.resolve_combat(&mut rng, &mut log);
        assert!(log.attacks().count() > 0);
        assert!(log.attacks().all(|a| a.estimated && a.defense_dice.is_none()));
        assert!(combat.is_over());
    }
}
