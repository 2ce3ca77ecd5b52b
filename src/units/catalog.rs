//! Unit catalog loaded from TOML
//!
//! The catalog is built once at load time and passed by reference to
//! whatever needs lookup by name. There is no global registry.

use ahash::{AHashMap, AHashSet};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::core::error::{GameError, Result};
use crate::core::types::{RaceId, UnitTypeId};
use crate::units::attack::{Attack, AttackQualities};
use crate::units::race::Race;
use crate::units::spell::{Spell, SpellEffects, SpellKind};
use crate::units::unit_type::UnitType;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    race: Vec<Race>,
    #[serde(default)]
    unit: Vec<UnitDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct UnitDef {
    id: u32,
    name: String,
    training_cost: u32,
    hit_points: u32,
    #[serde(default)]
    defense: i32,
    #[serde(default)]
    shield: i32,
    #[serde(default)]
    armor: i32,
    #[serde(default)]
    hero: bool,
    #[serde(default)]
    holy: bool,
    #[serde(default = "default_true")]
    trainable: bool,
    #[serde(default)]
    abilities: Vec<String>,
    #[serde(default)]
    attack: Vec<AttackDef>,
    #[serde(default)]
    spell: Vec<SpellDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct AttackDef {
    name: String,
    damage: String,
    #[serde(default)]
    skill: i32,
    #[serde(default = "default_one")]
    count: u32,
    #[serde(default)]
    qualities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SpellDef {
    Summon {
        name: String,
        unit: String,
        #[serde(default = "default_one")]
        quantity: u32,
        #[serde(default)]
        illusory: bool,
    },
    Ward {
        name: String,
        effect: String,
    },
    Curse {
        name: String,
        effect: String,
    },
    Bolt {
        name: String,
        damage: String,
        #[serde(default)]
        qualities: Vec<String>,
    },
    Heal {
        name: String,
    },
}

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

fn parse_qualities(names: &[String]) -> Result<AttackQualities> {
    names.iter().try_fold(AttackQualities::empty(), |acc, name| {
        Ok(acc | AttackQualities::parse_name(name)?)
    })
}

fn parse_effects(names: &[String]) -> Result<SpellEffects> {
    names.iter().try_fold(SpellEffects::empty(), |acc, name| {
        Ok(acc | SpellEffects::parse_name(name)?)
    })
}

/// All unit types and races known to a game
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    units: Vec<Arc<UnitType>>,
    by_name: AHashMap<String, Arc<UnitType>>,
    by_id: AHashMap<UnitTypeId, Arc<UnitType>>,
    races: Vec<Race>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from TOML
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents)?;
        let mut builder = CatalogBuilder::new(&file.unit);
        for def in &file.unit {
            builder.resolve(&def.name)?;
        }

        let mut catalog = UnitCatalog::new();
        for race in file.race {
            catalog.add_race(race);
        }
        for def in &file.unit {
            if let Some(unit) = builder.built.get(&def.name) {
                catalog.insert(Arc::clone(unit));
            }
        }

        tracing::debug!(
            "Loaded unit catalog: {} units, {} races",
            catalog.units.len(),
            catalog.races.len()
        );
        Ok(catalog)
    }

    /// Load a catalog from a TOML file on disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Add or replace a unit type
    pub fn insert(&mut self, unit: Arc<UnitType>) {
        if let Some(old) = self.by_name.insert(unit.name().to_string(), Arc::clone(&unit)) {
            self.units.retain(|u| !Arc::ptr_eq(u, &old));
        }
        self.by_id.insert(unit.id(), Arc::clone(&unit));
        self.units.push(unit);
    }

    pub fn add_race(&mut self, race: Race) {
        self.races.retain(|r| r.id != race.id);
        self.races.push(race);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<UnitType>> {
        self.by_name.get(name)
    }

    /// Like `get`, but a missing name is an error
    pub fn require(&self, name: &str) -> Result<Arc<UnitType>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| GameError::UnknownUnitType(name.to_string()))
    }

    pub fn by_id(&self, id: UnitTypeId) -> Option<&Arc<UnitType>> {
        self.by_id.get(&id)
    }

    /// Unit types in load order
    pub fn units(&self) -> &[Arc<UnitType>] {
        &self.units
    }

    /// Unit types a province may train
    pub fn trainable(&self) -> Vec<Arc<UnitType>> {
        self.units
            .iter()
            .filter(|u| u.is_trainable() && !u.is_hero())
            .cloned()
            .collect()
    }

    pub fn races(&self) -> &[Race] {
        &self.races
    }

    pub fn race(&self, id: RaceId) -> Option<&Race> {
        self.races.iter().find(|r| r.id == id)
    }

    pub fn race_by_name(&self, name: &str) -> Result<&Race> {
        self.races
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| GameError::UnknownRace(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Resolves unit definitions depth-first so summon targets exist before
/// the units that conjure them
struct CatalogBuilder<'a> {
    defs: AHashMap<&'a str, &'a UnitDef>,
    built: AHashMap<String, Arc<UnitType>>,
    in_progress: AHashSet<String>,
}

impl<'a> CatalogBuilder<'a> {
    fn new(defs: &'a [UnitDef]) -> Self {
        Self {
            defs: defs.iter().map(|d| (d.name.as_str(), d)).collect(),
            built: AHashMap::new(),
            in_progress: AHashSet::new(),
        }
    }

    fn resolve(&mut self, name: &str) -> Result<Arc<UnitType>> {
        if let Some(unit) = self.built.get(name) {
            return Ok(Arc::clone(unit));
        }
        let def = *self
            .defs
            .get(name)
            .ok_or_else(|| GameError::UnknownUnitType(name.to_string()))?;
        if !self.in_progress.insert(name.to_string()) {
            return Err(GameError::InvalidUnit {
                name: name.to_string(),
                reason: "summon cycle".into(),
            });
        }

        let mut builder = UnitType::builder(UnitTypeId(def.id), &def.name)
            .training_cost(def.training_cost)
            .hit_points(def.hit_points)
            .defense(def.defense)
            .shield(def.shield)
            .armor(def.armor)
            .hero(def.hero)
            .holy(def.holy)
            .trainable(def.trainable)
            .abilities(parse_effects(&def.abilities)?);

        for attack in &def.attack {
            builder = builder.attack(Attack::new(
                &attack.name,
                &attack.damage,
                attack.skill,
                attack.count,
                parse_qualities(&attack.qualities)?,
            )?);
        }

        for spell in &def.spell {
            builder = builder.spell(self.build_spell(spell)?);
        }

        let unit = Arc::new(builder.build()?);
        self.in_progress.remove(name);
        self.built.insert(name.to_string(), Arc::clone(&unit));
        Ok(unit)
    }

    fn build_spell(&mut self, def: &SpellDef) -> Result<Spell> {
        let spell = match def {
            SpellDef::Summon {
                name,
                unit,
                quantity,
                illusory,
            } => Spell::new(
                name,
                SpellKind::Summon {
                    unit: self.resolve(unit)?,
                    quantity: *quantity,
                    illusory: *illusory,
                },
            ),
            SpellDef::Ward { name, effect } => {
                Spell::new(name, SpellKind::Ward(SpellEffects::parse_name(effect)?))
            }
            SpellDef::Curse { name, effect } => {
                Spell::new(name, SpellKind::Curse(SpellEffects::parse_name(effect)?))
            }
            SpellDef::Bolt {
                name,
                damage,
                qualities,
            } => Spell::new(
                name,
                SpellKind::Bolt(Attack::new(
                    name,
                    damage,
                    0,
                    1,
                    parse_qualities(qualities)? | AttackQualities::MAGIC,
                )?),
            ),
            SpellDef::Heal { name } => Spell::new(name, SpellKind::Heal),
        };
        Ok(spell)
    }
}
