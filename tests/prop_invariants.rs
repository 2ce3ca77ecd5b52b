//! Property-based tests for stack bookkeeping and damage math.
//!
//! Run with: cargo test --release prop_invariants

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use strategos::ai::{select_plans, PlanState, ProvinceAttackPlan};
use strategos::campaign::{MovementOrder, Province};
use strategos::combat::{CombatMath, DamageOutcome, UnitStack};
use strategos::core::config::CombatConfig;
use strategos::core::types::{ProvinceId, UnitTypeId};
use strategos::units::{Attack, AttackQualities, DamageExpression, SpellEffects, Unit, UnitType};

fn unit_type(hit_points: u32, armor: i32) -> Arc<UnitType> {
    Arc::new(
        UnitType::builder(UnitTypeId(1), "Subject")
            .training_cost(10)
            .hit_points(hit_points)
            .armor(armor)
            .build()
            .unwrap(),
    )
}

fn scored_plan(target: u32, origin: u32, score: f64) -> ProvinceAttackPlan {
    let province = Province::new(ProvinceId(target), "Target").with_value(score);
    let mut plan = ProvinceAttackPlan::new(&province);
    plan.add_movement_order(MovementOrder::new(
        ProvinceId(origin),
        ProvinceId(target),
        vec![Unit::new(unit_type(1, 0), 1)],
    ));
    plan.with_evaluation(1.0, 0.0, 0.0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Quantity always equals the histogram sum, whatever damage lands.
    #[test]
    fn prop_histogram_sum_is_quantity(
        hit_points in 1u32..8,
        quantity in 0u32..40,
        hits in proptest::collection::vec(0u32..10, 0..60),
        seed in any::<u64>(),
    ) {
        let mut stack = UnitStack::new(Unit::new(unit_type(hit_points, 0), quantity));
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut killed = 0;
        for damage in hits {
            if stack.take_damage(&mut rng, damage) == DamageOutcome::Killed {
                killed += 1;
            }
            prop_assert_eq!(stack.health().iter().sum::<u32>(), stack.quantity());
            prop_assert_eq!(stack.health().len(), hit_points as usize);
        }
        prop_assert_eq!(stack.quantity() + killed, quantity);
    }

    /// Healing twice changes nothing the second time.
    #[test]
    fn prop_heal_is_idempotent(
        hit_points in 1u32..8,
        quantity in 0u32..40,
        hits in proptest::collection::vec(0u32..4, 0..30),
        seed in any::<u64>(),
    ) {
        let mut stack = UnitStack::new(Unit::new(unit_type(hit_points, 0), quantity));
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for damage in hits {
            stack.take_damage(&mut rng, damage);
        }
        let survivors = stack.quantity();
        stack.heal();
        let healed = stack.health().to_vec();
        prop_assert_eq!(stack.heal(), 0);
        prop_assert_eq!(stack.health(), healed.as_slice());
        prop_assert_eq!(stack.quantity(), survivors);
        prop_assert_eq!(stack.wounded(), 0);
    }

    /// Rolled damage stays within the expression's bounds.
    #[test]
    fn prop_damage_within_bounds(
        dice in 1u32..4,
        sides in prop::sample::select(vec![2u32, 3, 4, 6, 8, 10, 12]),
        modifier in -5i32..6,
        seed in any::<u64>(),
    ) {
        let source = format!("{}d{}{:+}", dice, sides, modifier);
        let expression = DamageExpression::parse(&source).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..20 {
            let damage = expression.roll(&mut rng);
            prop_assert!(damage >= expression.min() && damage <= expression.max());
        }
        prop_assert_eq!(expression.min(), dice as i32 + modifier);
        prop_assert_eq!(expression.max(), (dice * sides) as i32 + modifier);
    }

    /// Expected damage never exceeds the target's hit points or goes negative.
    #[test]
    fn prop_expected_damage_bounded(
        hit_points in 1u32..10,
        armor in 0i32..6,
        skill in -2i32..6,
    ) {
        let math = CombatMath::new(&CombatConfig::default()).unwrap();
        let target = unit_type(hit_points, armor);
        let attack = Attack::new("Blade", "2d6", skill, 1, AttackQualities::MELEE).unwrap();
        let expected = math.expected_attack_damage(&attack, &target, SpellEffects::empty());
        prop_assert!(expected >= 0.0);
        prop_assert!(expected <= hit_points as f64);
    }

    /// Greedy selection never accepts two plans sharing an origin or target.
    #[test]
    fn prop_accepted_plans_are_pairwise_compatible(
        specs in proptest::collection::vec((100u32..106, 1u32..6, -5i32..20), 0..12),
        cap in 1usize..8,
    ) {
        let mut plans: Vec<ProvinceAttackPlan> = specs
            .iter()
            .map(|&(target, origin, score)| scored_plan(target, origin, score as f64))
            .collect();
        let accepted = select_plans(&mut plans, cap, 0.0);

        prop_assert!(accepted.len() <= cap);
        for (n, &i) in accepted.iter().enumerate() {
            prop_assert_eq!(plans[i].state(), PlanState::Accepted);
            prop_assert!(plans[i].score() > 0.0);
            for &j in &accepted[n + 1..] {
                prop_assert!(plans[i].is_compatible_with(plans[j].orders()));
            }
        }
    }
}
