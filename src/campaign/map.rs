//! Campaign map: provinces, factions and races with adjacency queries

use ahash::{AHashMap, AHashSet};

use crate::campaign::faction::Faction;
use crate::campaign::province::Province;
use crate::core::error::{GameError, Result};
use crate::core::types::{FactionId, ProvinceId, RaceId};
use crate::units::Race;

#[derive(Debug, Clone, Default)]
pub struct CampaignMap {
    provinces: Vec<Province>,
    index: AHashMap<ProvinceId, usize>,
    factions: AHashMap<FactionId, Faction>,
    races: AHashMap<RaceId, Race>,
}

impl CampaignMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a province, replacing any province with the same id
    pub fn add_province(&mut self, province: Province) {
        match self.index.get(&province.id) {
            Some(&i) => self.provinces[i] = province,
            None => {
                self.index.insert(province.id, self.provinces.len());
                self.provinces.push(province);
            }
        }
    }

    pub fn add_faction(&mut self, faction: Faction) {
        self.factions.insert(faction.id, faction);
    }

    pub fn add_race(&mut self, race: Race) {
        self.races.insert(race.id, race);
    }

    /// Make two provinces neighbours of each other
    pub fn connect(&mut self, a: ProvinceId, b: ProvinceId) -> Result<()> {
        if a == b {
            return Err(GameError::InvalidConfig(format!(
                "province {} cannot neighbour itself",
                a.0
            )));
        }
        for id in [a, b] {
            if self.province(id).is_none() {
                return Err(GameError::UnknownProvince(id.0));
            }
        }
        for (from, to) in [(a, b), (b, a)] {
            if let Some(province) = self.province_mut(from) {
                if !province.neighbors.contains(&to) {
                    province.neighbors.push(to);
                }
            }
        }
        Ok(())
    }

    pub fn province(&self, id: ProvinceId) -> Option<&Province> {
        self.index.get(&id).map(|&i| &self.provinces[i])
    }

    pub fn province_mut(&mut self, id: ProvinceId) -> Option<&mut Province> {
        self.index.get(&id).map(|&i| &mut self.provinces[i])
    }

    pub fn provinces(&self) -> &[Province] {
        &self.provinces
    }

    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    pub fn faction_mut(&mut self, id: FactionId) -> Option<&mut Faction> {
        self.factions.get_mut(&id)
    }

    pub fn race(&self, id: RaceId) -> Option<&Race> {
        self.races.get(&id)
    }

    /// Wound check bonus of a faction's race, 0 if it has none
    pub fn wound_check_bonus(&self, faction: FactionId) -> i32 {
        self.faction(faction)
            .and_then(|f| f.race)
            .and_then(|r| self.race(r))
            .map(|r| r.wound_check_bonus)
            .unwrap_or(0)
    }

    pub fn owned_provinces(&self, faction: FactionId) -> impl Iterator<Item = &Province> + '_ {
        self.provinces
            .iter()
            .filter(move |p| p.owner == Some(faction))
    }

    pub fn neighbors(&self, id: ProvinceId) -> impl Iterator<Item = &Province> + '_ {
        self.province(id)
            .into_iter()
            .flat_map(|p| p.neighbors.iter())
            .filter_map(move |&n| self.province(n))
    }

    /// Anything the faction does not own, unclaimed land included
    pub fn is_hostile(&self, province: ProvinceId, faction: FactionId) -> bool {
        self.province(province)
            .map(|p| p.owner != Some(faction))
            .unwrap_or(false)
    }

    /// Owned by the faction and surrounded by its own provinces
    pub fn is_inner(&self, province: ProvinceId, faction: FactionId) -> bool {
        let Some(p) = self.province(province) else {
            return false;
        };
        p.owner == Some(faction) && p.neighbors.iter().all(|&n| !self.is_hostile(n, faction))
    }

    /// Steps from `start` to the nearest hostile province, travelling only
    /// through the faction's own land. `None` when no hostile province can be
    /// reached.
    pub fn distance_to_hostile(&self, start: ProvinceId, faction: FactionId) -> Option<u32> {
        if self.province(start).is_none() {
            return None;
        }
        if self.is_hostile(start, faction) {
            return Some(0);
        }

        let mut visited = AHashSet::new();
        visited.insert(start);
        let mut ring = vec![start];
        let mut distance = 0;

        while !ring.is_empty() {
            distance += 1;
            let mut next = Vec::new();
            for &id in &ring {
                for neighbor in self.neighbors(id) {
                    if !visited.insert(neighbor.id) {
                        continue;
                    }
                    if neighbor.owner != Some(faction) {
                        return Some(distance);
                    }
                    next.push(neighbor.id);
                }
            }
            ring = next;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_map() -> CampaignMap {
        // 1 - 2 - 3 - 4, with 4 held by someone else and 5 an isolated pocket
        let mut map = CampaignMap::new();
        let ours = FactionId(1);
        for id in 1..=3 {
            map.add_province(Province::new(ProvinceId(id), format!("P{}", id)).with_owner(ours));
        }
        map.add_province(Province::new(ProvinceId(4), "Enemy").with_owner(FactionId(2)));
        map.add_province(Province::new(ProvinceId(5), "Island").with_owner(ours));
        map.connect(ProvinceId(1), ProvinceId(2)).unwrap();
        map.connect(ProvinceId(2), ProvinceId(3)).unwrap();
        map.connect(ProvinceId(3), ProvinceId(4)).unwrap();
        map
    }

    #[test]
    fn test_distance_rings() {
        let map = line_map();
        let ours = FactionId(1);
        assert_eq!(map.distance_to_hostile(ProvinceId(3), ours), Some(1));
        assert_eq!(map.distance_to_hostile(ProvinceId(2), ours), Some(2));
        assert_eq!(map.distance_to_hostile(ProvinceId(1), ours), Some(3));
        assert_eq!(map.distance_to_hostile(ProvinceId(4), ours), Some(0));
        assert_eq!(map.distance_to_hostile(ProvinceId(5), ours), None);
    }

    #[test]
    fn test_inner_and_hostile() {
        let map = line_map();
        let ours = FactionId(1);
        assert!(map.is_inner(ProvinceId(1), ours));
        assert!(map.is_inner(ProvinceId(2), ours));
        assert!(!map.is_inner(ProvinceId(3), ours));
        assert!(map.is_hostile(ProvinceId(4), ours));
        assert!(!map.is_hostile(ProvinceId(99), ours));
    }

    #[test]
    fn test_connect_is_symmetric_and_idempotent() {
        let mut map = line_map();
        map.connect(ProvinceId(2), ProvinceId(1)).unwrap();
        assert_eq!(map.province(ProvinceId(1)).unwrap().neighbors, vec![ProvinceId(2)]);
        assert!(map.connect(ProvinceId(1), ProvinceId(1)).is_err());
        assert!(matches!(
            map.connect(ProvinceId(1), ProvinceId(42)),
            Err(GameError::UnknownProvince(42))
        ));
    }

    #[test]
    fn test_wound_check_bonus_follows_race() {
        let mut map = line_map();
        let mut dwarves = Race::new(RaceId(3), "Dwarves");
        dwarves.wound_check_bonus = 2;
        map.add_race(dwarves);
        map.add_faction(Faction::new(FactionId(1), "Clan").with_race(RaceId(3)));
        assert_eq!(map.wound_check_bonus(FactionId(1)), 2);
        assert_eq!(map.wound_check_bonus(FactionId(2)), 0);
    }
}
