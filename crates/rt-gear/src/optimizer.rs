//! The gear-optimization search itself is out of scope (spec §1): this
//! trait is the seam the planner consumes it through.

use async_trait::async_trait;
use rt_combat::CombatResult;
use rt_core::Slot;
use std::collections::HashMap;

/// One candidate equipment configuration: one item per occupied slot,
/// plus consumable utility stacks (spec §4.3 "multiset of equipment
/// codes derived from its loadout").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GearLoadout {
    pub slots: HashMap<Slot, String>,
    pub utilities: HashMap<String, u32>,
}

impl GearLoadout {
    /// Flattens slots and utilities into a single `{code -> count}`
    /// multiset — one count per occupied slot, utility slots counting
    /// as one regardless of the item's stack size.
    pub fn multiset(&self) -> HashMap<String, u32> {
        let mut out: HashMap<String, u32> = HashMap::new();
        for code in self.slots.values() {
            *out.entry(code.clone()).or_insert(0) += 1;
        }
        for code in self.utilities.keys() {
            *out.entry(code.clone()).or_insert(0) += 1;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeRecord {
    pub monster_code: String,
    pub monster_level: u32,
    pub loadout: GearLoadout,
    pub sim_result: CombatResult,
}

/// `optimize(char, monsterCode)` (spec §4.3 step 1): given a character
/// and a target monster, return the best loadout found and its
/// simulated outcome, or `None` if no loadout can beat it at all.
#[async_trait]
pub trait GearOptimizer: Send + Sync {
    async fn optimize(&self, char_name: &str, monster_code: &str, monster_level: u32) -> Option<OptimizeRecord>;
}

/// The catalog doesn't carry a tool/skill association for gathering
/// equipment, so the planner asks this separately-injectable seam for
/// "the best tool a character can use for this gathering skill" rather
/// than guessing from item names.
pub trait ToolCatalog: Send + Sync {
    fn best_tool_for_skill(&self, skill: rt_core::Skill, char_level: u32) -> Option<String>;
}

/// Default: no tool data available. A real deployment supplies a
/// `ToolCatalog` backed by whatever the game-data loader (out of scope
/// per spec §1) actually produces.
pub struct NoToolCatalog;

impl ToolCatalog for NoToolCatalog {
    fn best_tool_for_skill(&self, _skill: rt_core::Skill, _char_level: u32) -> Option<String> {
        None
    }
}
