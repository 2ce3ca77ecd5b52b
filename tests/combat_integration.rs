//! Combat integration tests
//!
//! Whole battles driven through `resolve_combat`, checked for outcome,
//! event log shape and agreement between live and estimated resolution.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use strategos::combat::{
    Combat, CombatEvent, CombatEventLog, CombatOutcome, CombatSettings, RollMode, UnitStack,
};
use strategos::core::config::CombatConfig;
use strategos::core::types::ProvinceId;
use strategos::dice::ScriptedRolls;
use strategos::testing::fixtures;

fn settings(mode: RollMode) -> CombatSettings {
    CombatSettings::new(&CombatConfig::default())
        .unwrap()
        .with_mode(mode)
}

fn win_ratio(
    attackers: &[UnitStack],
    defenders: &[UnitStack],
    mode: RollMode,
    runs: u64,
) -> f64 {
    let mut wins = 0;
    for seed in 0..runs {
        let mut combat = Combat::new(
            ProvinceId(1),
            attackers.iter().map(UnitStack::clone_for_simulation).collect(),
            defenders.iter().map(UnitStack::clone_for_simulation).collect(),
            settings(mode),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        if combat.resolve_combat(&mut rng, &mut ()) == CombatOutcome::AttackerVictory {
            wins += 1;
        }
    }
    wins as f64 / runs as f64
}

#[test]
fn test_undefended_province_falls_without_a_fight() {
    let mut combat = Combat::new(
        ProvinceId(7),
        vec![fixtures::stack(fixtures::knight(), 2)],
        Vec::new(),
        settings(RollMode::Live),
    );
    let mut log = CombatEventLog::new();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let outcome = combat.resolve_combat(&mut rng, &mut log);

    assert_eq!(outcome, CombatOutcome::AttackerVictory);
    assert_eq!(log.attacks().count(), 0);
    assert_eq!(
        log.finishes().collect::<Vec<_>>(),
        vec![(CombatOutcome::AttackerVictory, Some(ProvinceId(7)))]
    );
}

#[test]
fn test_simultaneous_volleys_draw() {
    // Every die shows 6: both archers hit for 6 and each kills the other
    let mut combat = Combat::new(
        ProvinceId(3),
        vec![fixtures::stack(fixtures::archer(), 1)],
        vec![fixtures::stack(fixtures::archer(), 1)],
        settings(RollMode::Live),
    );
    let mut log = CombatEventLog::new();
    let mut rng = ScriptedRolls::new(vec![6]);
    let outcome = combat.resolve_combat(&mut rng, &mut log);

    assert_eq!(outcome, CombatOutcome::Draw);
    assert_eq!(log.attacks().count(), 2);
    assert!(log.attacks().all(|a| a.hit));
    assert!(combat.attackers().is_empty());
    assert!(combat.defenders().is_empty());
    assert_eq!(
        log.finishes().collect::<Vec<_>>(),
        vec![(CombatOutcome::Draw, None)]
    );
}

#[test]
fn test_every_combat_finishes_exactly_once() {
    for seed in 0..20 {
        let mut combat = Combat::new(
            ProvinceId(2),
            vec![
                fixtures::stack(fixtures::spearman(), 5),
                fixtures::stack(fixtures::archer(), 3),
                fixtures::stack(fixtures::shaman(), 1),
            ],
            vec![
                fixtures::stack(fixtures::ogre(), 2),
                fixtures::stack(fixtures::priest(), 2),
                fixtures::stack(fixtures::warlock(), 1),
            ],
            settings(RollMode::Live),
        );
        let mut log = CombatEventLog::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let outcome = combat.resolve_combat(&mut rng, &mut log);

        let finishes: Vec<_> = log.finishes().collect();
        assert_eq!(finishes.len(), 1, "seed {}", seed);
        assert_eq!(finishes[0].0, outcome);
        assert!(combat.is_over());
        assert!(!combat.has_pending_rolls());
        // Summoned wolves never outlive the battle
        assert!(combat
            .attackers()
            .iter()
            .all(|s| !s.unit_type().id().is_summoned_creature()));
        assert!(matches!(
            log.events.last(),
            Some(CombatEvent::CombatFinished { .. })
        ));
    }
}

#[test]
fn test_survivors_are_healthy_after_wound_checks() {
    let mut combat = Combat::new(
        ProvinceId(4),
        vec![fixtures::stack(fixtures::knight(), 4)],
        vec![fixtures::stack(fixtures::spearman(), 3)],
        settings(RollMode::Live),
    );
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    combat.resolve_combat(&mut rng, &mut ());
    for stack in combat.attackers().iter().chain(combat.defenders()) {
        assert_eq!(stack.wounded(), 0);
        assert_eq!(stack.health().iter().sum::<u32>(), stack.quantity());
    }
}

#[test]
fn test_live_and_estimated_agree_on_lopsided_battle() {
    let attackers = vec![fixtures::stack(fixtures::knight(), 5)];
    let defenders = vec![fixtures::stack(fixtures::peasant(), 3)];

    let live = win_ratio(&attackers, &defenders, RollMode::Live, 100);
    let estimated = win_ratio(&attackers, &defenders, RollMode::Estimated, 100);
    assert!(live > 0.9, "live win ratio {}", live);
    assert!(estimated > 0.9, "estimated win ratio {}", estimated);
}
