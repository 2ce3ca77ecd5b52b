//! Fixture unit types, stacks and campaign maps
//!
//! Ids below 900 are ordinary units; the spirit wolf sits in the summoned
//! creature range.

use std::sync::Arc;

use crate::campaign::{AiLevel, CampaignMap, Faction, Province};
use crate::combat::UnitStack;
use crate::core::types::{FactionId, ProvinceId, RaceId, UnitTypeId};
use crate::units::{
    Attack, AttackQualities, Race, Spell, SpellEffects, SpellKind, Unit, UnitCatalog, UnitType,
};

fn attack(name: &str, damage: &str, skill: i32, count: u32, qualities: AttackQualities) -> Attack {
    match Attack::new(name, damage, skill, count, qualities) {
        Ok(attack) => attack,
        Err(e) => panic!("fixture attack {name}: {e}"),
    }
}

fn build(builder: crate::units::UnitTypeBuilder) -> UnitType {
    match builder.build() {
        Ok(unit) => unit,
        Err(e) => panic!("fixture unit: {e}"),
    }
}

/// 1 hp, no defences, 1d4 pitchfork
pub fn peasant() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(1), "Peasant")
            .training_cost(5)
            .hit_points(1)
            .attack(attack("Pitchfork", "1d4", 0, 1, AttackQualities::MELEE)),
    )
}

pub fn spearman() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(2), "Spearman")
            .training_cost(15)
            .hit_points(2)
            .defense(2)
            .shield(1)
            .armor(1)
            .attack(attack("Spear", "1d6", 2, 1, AttackQualities::MELEE)),
    )
}

pub fn archer() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(3), "Archer")
            .training_cost(20)
            .hit_points(1)
            .defense(1)
            .attack(attack("Longbow", "1d6", 3, 1, AttackQualities::RANGED))
            .attack(attack("Dagger", "1d3", 0, 1, AttackQualities::MELEE)),
    )
}

pub fn knight() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(4), "Knight")
            .training_cost(60)
            .hit_points(3)
            .defense(4)
            .shield(3)
            .armor(4)
            .attack(attack("Lance", "2d6", 4, 1, AttackQualities::CHARGE))
            .attack(attack("Sword", "1d8", 4, 1, AttackQualities::MELEE)),
    )
}

pub fn ogre() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(5), "Ogre")
            .training_cost(40)
            .hit_points(6)
            .defense(1)
            .armor(2)
            .attack(attack("Club", "2d6", 1, 1, AttackQualities::MELEE)),
    )
}

/// A hero: never picked as a counter
pub fn champion() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(6), "Champion")
            .training_cost(200)
            .hit_points(5)
            .defense(5)
            .shield(3)
            .armor(3)
            .hero(true)
            .trainable(false)
            .attack(attack("Throwing Axe", "2d6", 5, 1, AttackQualities::RANGED))
            .attack(attack("Greatsword", "2d8", 6, 2, AttackQualities::MELEE)),
    )
}

/// Summoned creature, dismissed at the end of every round
pub fn spirit_wolf() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(901), "Spirit Wolf")
            .hit_points(2)
            .defense(2)
            .trainable(false)
            .attack(attack("Bite", "1d6", 2, 1, AttackQualities::MELEE)),
    )
}

pub fn shaman() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(7), "Shaman")
            .training_cost(35)
            .hit_points(2)
            .defense(1)
            .attack(attack("Staff", "1d4", 1, 1, AttackQualities::MELEE))
            .spell(Spell::new(
                "Call Wolves",
                SpellKind::Summon {
                    unit: Arc::new(spirit_wolf()),
                    quantity: 2,
                    illusory: false,
                },
            )),
    )
}

pub fn illusionist() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(8), "Illusionist")
            .training_cost(35)
            .hit_points(1)
            .attack(attack("Knife", "1d3", 0, 1, AttackQualities::MELEE))
            .spell(Spell::new(
                "Phantom Knights",
                SpellKind::Summon {
                    unit: Arc::new(knight()),
                    quantity: 2,
                    illusory: true,
                },
            )),
    )
}

/// Holy healer with a divine smite
pub fn priest() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(9), "Priest")
            .training_cost(30)
            .hit_points(2)
            .defense(1)
            .holy(true)
            .attack(attack("Smite", "1d4", 2, 1, AttackQualities::DIVINE))
            .spell(Spell::new("Mend", SpellKind::Heal)),
    )
}

pub fn warlock() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(10), "Warlock")
            .training_cost(45)
            .hit_points(2)
            .attack(attack("Dagger", "1d3", 0, 1, AttackQualities::MELEE))
            .spell(Spell::new("Befuddle", SpellKind::Curse(SpellEffects::CONFUSION)))
            .spell(Spell::new(
                "Firebolt",
                SpellKind::Bolt(attack(
                    "Firebolt",
                    "1d6",
                    0,
                    1,
                    AttackQualities::MAGIC | AttackQualities::FIRE,
                )),
            )),
    )
}

pub fn warden() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(11), "Warden")
            .training_cost(30)
            .hit_points(2)
            .defense(2)
            .attack(attack("Mace", "1d6", 1, 1, AttackQualities::MELEE))
            .spell(Spell::new("Stone Skin", SpellKind::Ward(SpellEffects::STONE_SKIN))),
    )
}

/// Carries Magic Shield as an ability
pub fn golem() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(12), "Golem")
            .training_cost(80)
            .hit_points(4)
            .armor(3)
            .abilities(SpellEffects::MAGIC_SHIELD)
            .attack(attack("Fist", "1d8", 1, 1, AttackQualities::MELEE)),
    )
}

/// Cannot attack at all
pub fn pilgrim() -> UnitType {
    build(
        UnitType::builder(UnitTypeId(13), "Pilgrim")
            .training_cost(1)
            .hit_points(1),
    )
}

/// Every fixture unit type, in id order
pub fn catalog() -> UnitCatalog {
    let mut catalog = UnitCatalog::new();
    for unit in [
        peasant(),
        spearman(),
        archer(),
        knight(),
        ogre(),
        champion(),
        shaman(),
        illusionist(),
        priest(),
        warlock(),
        warden(),
        golem(),
        pilgrim(),
        spirit_wolf(),
    ] {
        catalog.insert(Arc::new(unit));
    }
    catalog
}

/// A full-health stack of `quantity` units
pub fn stack(unit: UnitType, quantity: u32) -> UnitStack {
    UnitStack::new(Unit::new(Arc::new(unit), quantity))
}

pub const PLAYER: FactionId = FactionId(1);
pub const HORDE: FactionId = FactionId(2);
pub const BANDITS: FactionId = FactionId(3);
pub const HUMANS: RaceId = RaceId(1);

pub const CAPITAL: ProvinceId = ProvinceId(1);
pub const BORDER: ProvinceId = ProvinceId(2);
pub const FARMS: ProvinceId = ProvinceId(3);
pub const HORDE_CAMP: ProvinceId = ProvinceId(4);
pub const WILDS: ProvinceId = ProvinceId(5);
pub const HIDEOUT: ProvinceId = ProvinceId(6);

/// Small frontier for planner tests
///
/// ```text
/// FARMS - CAPITAL - BORDER - HORDE_CAMP
///                     |  \
///                  WILDS  HIDEOUT
/// ```
///
/// The player holds the first three. The capital is inner and garrisoned
/// with spearmen, the border holds knights. The horde camp has peasants,
/// the wilds are empty and unclaimed, the bandit hideout holds an ogre.
pub fn frontier_map() -> CampaignMap {
    let peasant = Arc::new(peasant());
    let spearman = Arc::new(spearman());
    let archer = Arc::new(archer());

    let mut map = CampaignMap::new();
    let mut humans = Race::new(HUMANS, "Humans");
    humans.wound_check_bonus = 1;
    map.add_race(humans);
    map.add_faction(
        Faction::new(PLAYER, "Kingdom")
            .with_money(500)
            .with_race(HUMANS)
            .with_ai_level(AiLevel::Normal),
    );
    map.add_faction(Faction::new(HORDE, "Horde").with_money(300));
    map.add_faction(Faction::new(BANDITS, "Bandits").minor());

    let trainable = vec![Arc::clone(&peasant), Arc::clone(&spearman), archer];
    map.add_province(
        Province::new(CAPITAL, "Capital")
            .with_owner(PLAYER)
            .with_value(30.0)
            .with_manpower(2)
            .with_race(HUMANS)
            .with_trainable(trainable)
            .with_units(Arc::clone(&spearman), 4),
    );
    map.add_province(
        Province::new(BORDER, "Border March")
            .with_owner(PLAYER)
            .with_value(15.0)
            .with_units(Arc::new(knight()), 3),
    );
    map.add_province(Province::new(FARMS, "Farms").with_owner(PLAYER).with_value(10.0));
    map.add_province(
        Province::new(HORDE_CAMP, "Horde Camp")
            .with_owner(HORDE)
            .with_value(40.0)
            .with_units(peasant, 2),
    );
    map.add_province(Province::new(WILDS, "Wilds").with_value(10.0));
    map.add_province(
        Province::new(HIDEOUT, "Hideout")
            .with_owner(BANDITS)
            .with_value(5.0)
            .with_units(Arc::new(ogre()), 1),
    );

    for (a, b) in [
        (FARMS, CAPITAL),
        (CAPITAL, BORDER),
        (BORDER, HORDE_CAMP),
        (BORDER, WILDS),
        (BORDER, HIDEOUT),
    ] {
        if let Err(e) = map.connect(a, b) {
            panic!("frontier map: {e}");
        }
    }
    map
}
