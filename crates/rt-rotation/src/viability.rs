//! Bank-aware recipe-chain viability (spec §4.4 "Recipe-chain
//! viability rule"). A chain is viable for a character if every step
//! in it can actually be worked: gather steps need either the skill
//! level or enough stock already on hand, fight steps need a won
//! combat simulation (or enough stock already on hand), and bank
//! steps need enough stock already on hand, period.

use rt_catalog::Catalog;
use rt_core::{PlanStep, Skill};
use std::collections::HashMap;

/// Why a chain was rejected, naming the first step that failed (spec
/// §4.4 `_canClaimCraftOrderNow` reasons, reused here as the common
/// vocabulary between `pickNext` filtering and claim prechecks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnviableReason {
    InsufficientGatherSkill { resource_code: String },
    CombatNotViable { monster_code: String },
    MissingBankDependency { item_code: String },
}

impl UnviableReason {
    /// Rendered the way order blocks store a reason string (spec §4.4:
    /// `combat_not_viable:<monster>`, `missing_bank_dependency:<code>`,
    /// `insufficient_gather_skill`).
    pub fn as_block_reason(&self) -> String {
        match self {
            UnviableReason::InsufficientGatherSkill { .. } => "insufficient_gather_skill".to_string(),
            UnviableReason::CombatNotViable { monster_code } => format!("combat_not_viable:{monster_code}"),
            UnviableReason::MissingBankDependency { item_code } => format!("missing_bank_dependency:{item_code}"),
        }
    }
}

/// Everything the viability check needs about the character that isn't
/// itself part of the catalog: skill levels, and what's already on
/// hand (bank + inventory, pre-summed per item code since the rule
/// never distinguishes the two piles).
pub struct ViabilityContext<'a> {
    pub skill_levels: &'a HashMap<Skill, u32>,
    pub stock: &'a HashMap<String, u32>,
}

impl<'a> ViabilityContext<'a> {
    fn has(&self, item_code: &str) -> u32 {
        self.stock.get(item_code).copied().unwrap_or(0)
    }
}

/// Result of asking whether a character can beat a given monster right
/// now. Combat pre-verification is delegated to whatever external
/// oracle the caller wires in (spec §1: the gear optimizer, which
/// already answers "can this character win against this monster with
/// its best loadout", is out of scope and consumed as a pure
/// function) — `chain_is_viable` takes the answers as a map rather
/// than calling out itself, so it stays synchronous and testable.
pub fn chain_is_viable(
    steps: &[PlanStep],
    ctx: &ViabilityContext,
    catalog: &Catalog,
    combat_viable: &HashMap<String, bool>,
) -> Result<(), UnviableReason> {
    for step in steps {
        match step {
            PlanStep::Gather {
                item_code,
                resource_code,
                quantity,
            } => {
                let resource_ok = catalog
                    .resource(resource_code)
                    .map(|r| ctx.skill_levels.get(&r.skill).copied().unwrap_or(0) >= r.level)
                    .unwrap_or(false);
                if !resource_ok && ctx.has(item_code) < *quantity {
                    return Err(UnviableReason::InsufficientGatherSkill {
                        resource_code: resource_code.clone(),
                    });
                }
            }
            PlanStep::Fight {
                item_code,
                monster_code,
                quantity,
            } => {
                let covered_by_stock = ctx.has(item_code) >= *quantity;
                let wins = combat_viable.get(monster_code).copied().unwrap_or(false);
                if !covered_by_stock && !wins {
                    return Err(UnviableReason::CombatNotViable {
                        monster_code: monster_code.clone(),
                    });
                }
            }
            PlanStep::Bank { item_code, quantity } => {
                if ctx.has(item_code) < *quantity {
                    return Err(UnviableReason::MissingBankDependency {
                        item_code: item_code.clone(),
                    });
                }
            }
            PlanStep::Craft { .. } => {}
        }
    }
    Ok(())
}

/// A chain with no `Gather`/`Fight` steps is satisfiable purely from
/// what's already banked (spec §4.4 step 3 "prefer those whose chain
/// has no gather or fight steps").
pub fn is_bank_only(steps: &[PlanStep]) -> bool {
    steps
        .iter()
        .all(|s| matches!(s, PlanStep::Bank { .. } | PlanStep::Craft { .. }))
}
