//! Pure, read-only game-data tables (spec §4.4 "bank-aware recipe
//! viability" depends on these; the loading mechanics that populate a
//! `Catalog` from the real game-data endpoints are out of scope, spec
//! §1). Everything here is an in-memory reference table queried by
//! `rt-rotation` and `rt-gear`; nothing in this crate mutates character
//! or bank state.

pub mod chain;

use rt_core::{Skill, Slot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a raw (non-craftable) item ultimately comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Obtained {
    Resource(String),
    Monster(String),
    /// No known source: must already be in the bank (task rewards,
    /// currency, npc-only items).
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub skill: Skill,
    pub level: u32,
    /// Quantity of `item.code` a single craft action produces.
    pub quantity: u32,
    pub materials: Vec<rt_core::ItemStack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub code: String,
    pub name: String,
    pub level: u32,
    pub equip_slot: Option<Slot>,
    pub craft: Option<Recipe>,
    pub obtained: Obtained,
}

impl Item {
    pub fn is_equipment(&self) -> bool {
        self.equip_slot.is_some()
    }
    pub fn is_craftable(&self) -> bool {
        self.craft.is_some()
    }
}

/// Monster rank, used by the event routine's target scoring and the
/// `maxMonsterType` filter (spec §4.5): elites score higher, bosses
/// require a group and are always skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonsterType {
    Normal,
    Elite,
    Boss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub code: String,
    pub level: u32,
    pub monster_type: MonsterType,
    pub hp: u32,
    pub attack_fire: i32,
    pub attack_earth: i32,
    pub attack_water: i32,
    pub attack_air: i32,
    pub res_fire: i32,
    pub res_earth: i32,
    pub res_water: i32,
    pub res_air: i32,
    pub critical_strike: u32,
    pub initiative: i32,
    /// Drop table: item codes this monster can drop on a win.
    pub drops: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub code: String,
    pub level: u32,
    pub skill: Skill,
    pub drops: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workshop {
    pub code: String,
    pub skill: Skill,
}

/// Snapshot of all static game data. Built once at startup and shared
/// read-only (spec §1 "game-data catalog ... treated as a read-only
/// dependency"); the loading mechanics themselves are out of scope, so
/// `Catalog::new` takes already-decoded tables rather than fetching
/// them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    items: HashMap<String, Item>,
    monsters: HashMap<String, Monster>,
    resources: HashMap<String, Resource>,
    workshops: HashMap<String, Workshop>,
}

impl Catalog {
    pub fn new(
        items: Vec<Item>,
        monsters: Vec<Monster>,
        resources: Vec<Resource>,
        workshops: Vec<Workshop>,
    ) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.code.clone(), i)).collect(),
            monsters: monsters
                .into_iter()
                .map(|m| (m.code.clone(), m))
                .collect(),
            resources: resources
                .into_iter()
                .map(|r| (r.code.clone(), r))
                .collect(),
            workshops: workshops
                .into_iter()
                .map(|w| (w.code.clone(), w))
                .collect(),
        }
    }

    pub fn item(&self, code: &str) -> Option<&Item> {
        self.items.get(code)
    }
    pub fn monster(&self, code: &str) -> Option<&Monster> {
        self.monsters.get(code)
    }
    pub fn resource(&self, code: &str) -> Option<&Resource> {
        self.resources.get(code)
    }
    pub fn workshop_for(&self, skill: Skill) -> Option<&Workshop> {
        self.workshops.values().find(|w| w.skill == skill)
    }

    pub fn resources_for_skill(&self, skill: Skill) -> impl Iterator<Item = &Resource> {
        self.resources.values().filter(move |r| r.skill == skill)
    }

    pub fn recipes_for_skill(&self, skill: Skill) -> impl Iterator<Item = &Item> {
        self.items
            .values()
            .filter(move |i| matches!(&i.craft, Some(r) if r.skill == skill))
    }

    /// Monsters a character of `level` can reasonably be sent against
    /// (spec §4.7 pre-verification filters further by simulated win
    /// chance; this is just the catalog-level level gate).
    pub fn monsters_up_to_level(&self, level: u32) -> impl Iterator<Item = &Monster> {
        self.monsters.values().filter(move |m| m.level <= level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Catalog {
        Catalog::new(
            vec![
                Item {
                    code: "copper_ore".into(),
                    name: "Copper Ore".into(),
                    level: 1,
                    equip_slot: None,
                    craft: None,
                    obtained: Obtained::Resource("copper_rocks".into()),
                },
                Item {
                    code: "copper".into(),
                    name: "Copper".into(),
                    level: 1,
                    equip_slot: None,
                    craft: Some(Recipe {
                        skill: Skill::Mining,
                        level: 1,
                        quantity: 1,
                        materials: vec![rt_core::ItemStack {
                            code: "copper_ore".into(),
                            quantity: 8,
                        }],
                    }),
                    obtained: Obtained::None,
                },
            ],
            vec![],
            vec![Resource {
                code: "copper_rocks".into(),
                level: 1,
                skill: Skill::Mining,
                drops: vec!["copper_ore".into()],
            }],
            vec![Workshop {
                code: "mining_workshop".into(),
                skill: Skill::Mining,
            }],
        )
    }

    #[test]
    fn looks_up_items_and_resources() {
        let cat = sample_catalog();
        assert!(cat.item("copper").unwrap().is_craftable());
        assert!(!cat.item("copper_ore").unwrap().is_craftable());
        assert_eq!(cat.resource("copper_rocks").unwrap().skill, Skill::Mining);
        assert!(cat.workshop_for(Skill::Mining).is_some());
        assert!(cat.workshop_for(Skill::Cooking).is_none());
    }

    #[test]
    fn recipes_for_skill_finds_craftables_only() {
        let cat = sample_catalog();
        let names: Vec<_> = cat.recipes_for_skill(Skill::Mining).map(|i| i.code.as_str()).collect();
        assert_eq!(names, vec!["copper"]);
    }
}
