//! Rotation goal state held per character (spec §4.4).

use rt_core::{PlanStep, Skill};
use std::collections::HashMap;

/// What the rotation is currently grinding toward. Skills partition
/// into gathering, crafting, hybrid (alchemy), combat, and the two
/// task modes (spec §4.4 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationTarget {
    Skill(Skill),
    Combat,
    NpcTask,
    ItemTask,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Goal {
    Gather {
        resource_code: String,
        item_code: String,
        skill: Skill,
        remaining: u32,
        claim_order_id: Option<String>,
    },
    Craft {
        item_code: String,
        recipe_code: String,
        skill: Skill,
        plan: Vec<PlanStep>,
        remaining: u32,
        bank_checked: bool,
        claim_order_id: Option<String>,
    },
    Combat {
        monster_code: String,
        remaining: u32,
        claim_order_id: Option<String>,
    },
    NpcTask,
    ItemTask {
        item_code: String,
        quantity: u32,
    },
}

impl Goal {
    pub fn has_claim(&self) -> bool {
        match self {
            Goal::Gather { claim_order_id, .. } | Goal::Craft { claim_order_id, .. } | Goal::Combat { claim_order_id, .. } => {
                claim_order_id.is_some()
            }
            Goal::NpcTask | Goal::ItemTask { .. } => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Goal::Gather { remaining, .. } | Goal::Craft { remaining, .. } | Goal::Combat { remaining, .. } => *remaining == 0,
            Goal::NpcTask => false,
            Goal::ItemTask { quantity, .. } => *quantity == 0,
        }
    }
}

/// One character's live rotation bookkeeping: the active goal, its
/// per-recipe block list, and the weight/budget config driving
/// `pick_next`.
#[derive(Debug, Default)]
pub struct RotationState {
    pub goal: Option<Goal>,
    /// `blockedRecipes[skill][itemCode] = nowMs + durationMs` (spec
    /// §4.4 "Recipe blocks").
    pub blocked_recipes: HashMap<Skill, HashMap<String, i64>>,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recipe_blocked(&self, skill: Skill, item_code: &str, now_ms: i64) -> bool {
        self.blocked_recipes
            .get(&skill)
            .and_then(|m| m.get(item_code))
            .map(|expires| *expires > now_ms)
            .unwrap_or(false)
    }

    pub fn block_recipe(&mut self, skill: Skill, item_code: &str, now_ms: i64, duration_ms: i64) {
        self.blocked_recipes
            .entry(skill)
            .or_default()
            .insert(item_code.to_string(), now_ms + duration_ms);
    }
}

/// Per-target sampling weight and remaining goal budget (spec §4.4
/// step 1: "using configured skill weights and remaining goal
/// budgets, sample a next skill").
#[derive(Debug, Clone)]
pub struct RotationConfig {
    pub weights: HashMap<RotationTarget, f64>,
    pub goal_budgets: HashMap<RotationTarget, u32>,
    pub order_board_fulfillment: bool,
    pub create_orders: bool,
    pub max_losses: u32,
    pub default_block_duration_ms: i64,
    /// `exchangeTargets` fed to the task-coin exchange when a task
    /// completes (spec §4.4 "then exchange coins opportunistically",
    /// §4.6 "derived from rotation config + a transient extra code").
    pub task_coin_targets: HashMap<String, u32>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            weights: HashMap::new(),
            goal_budgets: HashMap::new(),
            order_board_fulfillment: true,
            create_orders: true,
            max_losses: 3,
            default_block_duration_ms: 60_000,
            task_coin_targets: HashMap::new(),
        }
    }
}
