use serde::{Deserialize, Serialize};
use std::fmt;

/// Gatherable/craftable skills a character can level. Combat and the two
/// task modes are rotation *modes*, not skills, and live in `rt-rotation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Mining,
    Woodcutting,
    Fishing,
    Cooking,
    Alchemy,
    Weaponcrafting,
    Gearcrafting,
    Jewelrycrafting,
}

impl Skill {
    pub const GATHERING: [Skill; 3] = [Skill::Mining, Skill::Woodcutting, Skill::Fishing];
    pub const CRAFTING: [Skill; 5] = [
        Skill::Cooking,
        Skill::Alchemy,
        Skill::Weaponcrafting,
        Skill::Gearcrafting,
        Skill::Jewelrycrafting,
    ];

    pub fn is_gathering(self) -> bool {
        Self::GATHERING.contains(&self)
    }
    pub fn is_crafting(self) -> bool {
        Self::CRAFTING.contains(&self)
    }
    /// Alchemy is the only skill that is both (spec §4.4 "alchemy dual-mode").
    pub fn is_hybrid(self) -> bool {
        matches!(self, Skill::Alchemy)
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Skill::Mining => "mining",
            Skill::Woodcutting => "woodcutting",
            Skill::Fishing => "fishing",
            Skill::Cooking => "cooking",
            Skill::Alchemy => "alchemy",
            Skill::Weaponcrafting => "weaponcrafting",
            Skill::Gearcrafting => "gearcrafting",
            Skill::Jewelrycrafting => "jewelrycrafting",
        };
        write!(f, "{s}")
    }
}

/// Equipment slot. Order here is arbitrary; `CARRY_SLOT_PRIORITY` below is
/// the order that matters for gear-state trimming (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Weapon,
    Shield,
    Helmet,
    BodyArmor,
    LegArmor,
    Boots,
    Bag,
    Amulet,
    Ring1,
    Ring2,
    Artifact1,
    Artifact2,
    Artifact3,
    Utility1,
    Utility2,
    Rune,
}

/// Trim order for the gear-state planner's carry budget (spec §4.3).
pub const CARRY_SLOT_PRIORITY: [Slot; 10] = [
    Slot::Weapon,
    Slot::Shield,
    Slot::Helmet,
    Slot::BodyArmor,
    Slot::LegArmor,
    Slot::Boots,
    Slot::Bag,
    Slot::Amulet,
    Slot::Ring1,
    Slot::Ring2,
];

/// How an order is ultimately fulfilled (spec §3 Order.sourceType).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    Gather,
    Fight,
    Craft,
}

impl fmt::Display for OrderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderSource::Gather => "gather",
            OrderSource::Fight => "fight",
            OrderSource::Craft => "craft",
        };
        write!(f, "{s}")
    }
}

/// One step of a recipe chain (spec §4.4, glossary "production plan").
/// Resolved lazily by the catalog; restartable and finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    Bank { item_code: String, quantity: u32 },
    Gather {
        item_code: String,
        resource_code: String,
        quantity: u32,
    },
    Fight {
        item_code: String,
        monster_code: String,
        quantity: u32,
    },
    Craft {
        item_code: String,
        recipe_code: String,
        quantity: u32,
    },
}

impl PlanStep {
    pub fn item_code(&self) -> &str {
        match self {
            PlanStep::Bank { item_code, .. }
            | PlanStep::Gather { item_code, .. }
            | PlanStep::Fight { item_code, .. }
            | PlanStep::Craft { item_code, .. } => item_code,
        }
    }
    pub fn quantity(&self) -> u32 {
        match self {
            PlanStep::Bank { quantity, .. }
            | PlanStep::Gather { quantity, .. }
            | PlanStep::Fight { quantity, .. }
            | PlanStep::Craft { quantity, .. } => *quantity,
        }
    }
}

/// A single `{code, quantity}` line in a character's inventory (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub code: String,
    pub quantity: u32,
}

/// `reserve = clamp(ceil(capacity*0.10), 8, 20)` (spec §4.4, glossary).
pub fn inventory_reserve(capacity: u32) -> u32 {
    let raw = (capacity as f64 * 0.10).ceil() as u32;
    raw.clamp(8, 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_is_clamped() {
        assert_eq!(inventory_reserve(20), 8);
        assert_eq!(inventory_reserve(300), 20);
        assert_eq!(inventory_reserve(90), 9);
    }

    #[test]
    fn batch_size_matches_spec_example() {
        // capacity=20, inventoryCount=0, materialsPerCraft=3, reserve=8 -> 4
        let capacity = 20u32;
        let inventory_count = 0u32;
        let materials_per_craft = 3u32;
        let reserve = 8u32;
        let usable = capacity - inventory_count - reserve;
        let batch = usable / materials_per_craft;
        assert_eq!(batch, 4);
    }
}
