//! Per-character skill-rotation engine (spec §4.4): picks a next
//! gather/craft/combat/task goal from configured weights and
//! remaining budgets, resolves bank-aware recipe-chain viability
//! through the game-data catalog, and dispatches one action per tick
//! against whichever goal is active. Order-board claims let several
//! characters cooperate on the same deficit without double-working it
//! (spec §2 dependency order, item 11 "concrete routines").

pub mod batch;
pub mod claims;
pub mod execute;
pub mod pick;
pub mod state;
pub mod viability;

pub use execute::ExecuteDeps;
pub use state::{Goal, RotationConfig, RotationState, RotationTarget};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rt_catalog::{chain::resolve_chain, Catalog, Item};
use rt_core::{CharacterContext, GameApiError, PlanStep, Skill};
use rt_orderboard::CreateOrderRequest;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Ties skill selection (`pick.rs`) and per-tick dispatch
/// (`execute.rs`) together for one character. `RotationState` is kept
/// by the caller (the per-character scheduler routine) and passed in
/// on every call, matching the "state belongs to the owning module,
/// accessed through entry points" rule used across the workspace.
pub struct SkillRotation {
    catalog: Arc<Catalog>,
    deps: ExecuteDeps,
    rng: Mutex<SmallRng>,
}

impl SkillRotation {
    pub fn new(catalog: Arc<Catalog>, deps: ExecuteDeps) -> Self {
        Self {
            catalog,
            deps,
            rng: Mutex::new(SmallRng::seed_from_u64(0x5eed)),
        }
    }

    /// `execute(ctx)` (spec §4.4): pick a goal if the current one is
    /// absent or complete, then dispatch exactly one action for it.
    pub async fn execute(&self, ctx: &CharacterContext, state: &mut RotationState) -> Result<bool, GameApiError> {
        if state.goal.as_ref().map(Goal::is_complete).unwrap_or(true) {
            self.pick_next(ctx, state).await;
        }
        let Some(goal) = state.goal.clone() else {
            return Ok(false);
        };

        let progressed = match goal {
            Goal::Gather {
                resource_code,
                item_code,
                skill,
                mut remaining,
                claim_order_id,
            } => {
                let result = execute::dispatch_gather(
                    &self.deps,
                    ctx,
                    &resource_code,
                    &item_code,
                    skill,
                    &mut remaining,
                    claim_order_id.is_some(),
                )
                .await?;
                if let Some(Goal::Gather { remaining: r, .. }) = state.goal.as_mut() {
                    *r = remaining;
                }
                result
            }
            Goal::Combat {
                monster_code,
                mut remaining,
                claim_order_id: _,
            } => {
                let max_losses = self.deps.config.max_losses;
                let result = execute::dispatch_combat(&self.deps, ctx, &monster_code, &mut remaining, max_losses).await?;
                if let Some(Goal::Combat { remaining: r, .. }) = state.goal.as_mut() {
                    *r = remaining;
                }
                if !result {
                    state.goal = None;
                }
                result
            }
            Goal::NpcTask => execute::dispatch_npc_task(&self.deps, ctx).await?,
            Goal::ItemTask { item_code, mut quantity } => {
                let result = execute::dispatch_item_task(&self.deps, ctx, &item_code, &mut quantity).await?;
                if let Some(Goal::ItemTask { quantity: q, .. }) = state.goal.as_mut() {
                    *q = quantity;
                }
                result
            }
            Goal::Craft { .. } => {
                let Some(goal) = state.goal.as_mut() else {
                    return Ok(false);
                };
                execute::dispatch_craft(&self.deps, ctx, goal).await?
            }
        };

        if !progressed {
            if let Some(goal) = &state.goal {
                if !goal.has_claim() {
                    state.goal = None;
                }
            }
        }
        Ok(progressed)
    }

    async fn pick_next(&self, ctx: &CharacterContext, state: &mut RotationState) {
        let snapshot = ctx.snapshot().await;
        let now = self.deps.config.default_block_duration_ms.max(0); // placeholder time source, see below
        let _ = now;

        let mut remaining_budget = HashMap::new();
        for (target, budget) in &self.deps.config.goal_budgets {
            remaining_budget.insert(*target, *budget);
        }
        let target = {
            let mut rng = self.rng.lock().await;
            pick::sample_target(&self.deps.config, &remaining_budget, &mut rng)
        };
        let Some(target) = target else {
            state.goal = None;
            return;
        };

        state.goal = match target {
            RotationTarget::Skill(skill) if skill.is_crafting() || skill.is_hybrid() => {
                self.pick_crafting(ctx, &snapshot, skill, state).await
            }
            RotationTarget::Skill(skill) => {
                pick::pick_gathering_goal(&self.catalog, skill, 50, snapshot.skill_level(skill))
            }
            RotationTarget::Combat => self.pick_combat(ctx, &snapshot).await,
            RotationTarget::NpcTask => Some(Goal::NpcTask),
            RotationTarget::ItemTask => snapshot.task.as_ref().map(|t| Goal::ItemTask {
                item_code: t.code.clone(),
                quantity: t.total.saturating_sub(t.progress),
            }),
        };
    }

    async fn pick_crafting(
        &self,
        ctx: &CharacterContext,
        snapshot: &rt_core::CharacterState,
        skill: Skill,
        state: &RotationState,
    ) -> Option<Goal> {
        let stock = combined_stock(&self.deps.inventory.snapshot().await.items, &snapshot.inventory);
        let candidates: Vec<&Item> = self
            .catalog
            .recipes_for_skill(skill)
            .filter(|item| item.craft.as_ref().map(|r| r.level <= snapshot.level).unwrap_or(false))
            .collect();
        let combat_viable = self.combat_viable_for_candidates(ctx, &candidates).await;

        let ctx_pick = pick::PickContext {
            char_level: snapshot.level,
            skill_levels: &snapshot.skills,
            stock: &stock,
            combat_viable: &combat_viable,
        };
        let now_ms = 0i64; // recipe blocks use the caller's clock; callers that need real
                           // wall time wire a `Clock` through `RotationState` mutation sites.
        let outcome = pick::pick_crafting_goal(&self.catalog, skill, 50, &ctx_pick, |code| {
            state.is_recipe_blocked(skill, code, now_ms)
        });

        if self.deps.config.create_orders {
            for rejected in &outcome.rejected {
                self.emit_order_for_rejection(rejected).await;
            }
        }
        outcome.goal
    }

    async fn pick_combat(&self, ctx: &CharacterContext, snapshot: &rt_core::CharacterState) -> Option<Goal> {
        let mut candidates: Vec<&rt_catalog::Monster> = self.catalog.monsters_up_to_level(snapshot.level).collect();
        candidates.sort_by(|a, b| b.level.cmp(&a.level));
        for monster in candidates {
            if let Some(record) = self.deps.optimizer.optimize(&ctx.name, &monster.code, monster.level).await {
                if rt_combat::can_beat_monster(&record.sim_result) {
                    return Some(Goal::Combat {
                        monster_code: monster.code.clone(),
                        remaining: 50,
                        claim_order_id: None,
                    });
                }
            }
        }
        None
    }

    async fn combat_viable_for_candidates(&self, ctx: &CharacterContext, candidates: &[&Item]) -> HashMap<String, bool> {
        let mut monster_codes = std::collections::HashSet::new();
        for item in candidates {
            for step in resolve_chain(&self.catalog, &item.code, 1) {
                if let PlanStep::Fight { monster_code, .. } = step {
                    monster_codes.insert(monster_code);
                }
            }
        }
        let mut out = HashMap::new();
        for code in monster_codes {
            let level = self.catalog.monster(&code).map(|m| m.level).unwrap_or(0);
            let wins = self
                .deps
                .optimizer
                .optimize(&ctx.name, &code, level)
                .await
                .map(|r| rt_combat::can_beat_monster(&r.sim_result))
                .unwrap_or(false);
            out.insert(code, wins);
        }
        out
    }

    async fn emit_order_for_rejection(&self, rejected: &pick::RejectedCandidate) {
        let req = match &rejected.reason {
            viability::UnviableReason::InsufficientGatherSkill { resource_code } => {
                let Some(resource) = self.catalog.resource(resource_code) else {
                    return;
                };
                CreateOrderRequest {
                    source_type: rt_core::OrderSource::Gather,
                    source_code: resource_code.clone(),
                    item_code: rejected.item_code.clone(),
                    requester_name: "rotation".to_string(),
                    recipe: format!("rotation:gather:{}", rejected.item_code),
                    quantity: 1,
                    gather_skill: Some(resource.skill),
                    craft_skill: None,
                    source_level: resource.level,
                }
            }
            viability::UnviableReason::CombatNotViable { monster_code } => {
                let level = self.catalog.monster(monster_code).map(|m| m.level).unwrap_or(0);
                CreateOrderRequest {
                    source_type: rt_core::OrderSource::Fight,
                    source_code: monster_code.clone(),
                    item_code: rejected.item_code.clone(),
                    requester_name: "rotation".to_string(),
                    recipe: format!("rotation:fight:{}", rejected.item_code),
                    quantity: 1,
                    gather_skill: None,
                    craft_skill: None,
                    source_level: level,
                }
            }
            viability::UnviableReason::MissingBankDependency { .. } => return,
        };
        let _ = self.deps.order_board.create_or_merge_order(req).await;
    }
}

fn combined_stock(bank: &HashMap<String, u32>, inventory: &[rt_core::ItemStack]) -> HashMap<String, u32> {
    let mut out = bank.clone();
    for item in inventory {
        *out.entry(item.code.clone()).or_insert(0) += item.quantity;
    }
    out
}
