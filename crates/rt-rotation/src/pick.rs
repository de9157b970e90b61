//! Skill selection (spec §4.4 `pickNext`). Samples a next rotation
//! target from configured weights and remaining goal budgets, then —
//! for crafting skills — walks viable recipe candidates in preference
//! order and falls back to gathering the skill's resource when none
//! qualify.

use crate::state::{Goal, RotationConfig, RotationTarget};
use crate::viability::{chain_is_viable, is_bank_only, UnviableReason};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rt_catalog::{chain::resolve_chain, Catalog, Item};
use rt_core::{PlanStep, Skill};
use std::collections::HashMap;

/// Everything `pick_next` needs that isn't catalog data: where the
/// character stands and what's already banked/carried.
pub struct PickContext<'a> {
    pub char_level: u32,
    pub skill_levels: &'a HashMap<Skill, u32>,
    pub stock: &'a HashMap<String, u32>,
    pub combat_viable: &'a HashMap<String, bool>,
}

/// A crafting candidate rejected during filtering, carried along so
/// the caller can emit the order-board orders spec §4.4 step 4 asks
/// for ("for every viable recipe candidate rejected because a gather
/// skill is insufficient... emit a gather order for the deficient
/// dependency").
pub struct RejectedCandidate {
    pub item_code: String,
    pub reason: UnviableReason,
}

pub struct PickOutcome {
    pub goal: Option<Goal>,
    pub rejected: Vec<RejectedCandidate>,
}

/// Weighted sample over whatever targets currently have budget left
/// (spec §4.4 step 1). A target with no configured weight is never
/// picked; a target with zero remaining budget is skipped.
pub fn sample_target(
    config: &RotationConfig,
    remaining_budget: &HashMap<RotationTarget, u32>,
    rng: &mut SmallRng,
) -> Option<RotationTarget> {
    let candidates: Vec<(RotationTarget, f64)> = config
        .weights
        .iter()
        .filter(|(target, weight)| {
            **weight > 0.0
                && remaining_budget
                    .get(*target)
                    .copied()
                    .map(|b| b > 0)
                    .unwrap_or(true)
        })
        .map(|(t, w)| (*t, *w))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates
        .choose_weighted(rng, |(_, w)| *w)
        .ok()
        .map(|(t, _)| *t)
}

/// Resolves a goal for crafting skill `skill` (spec §4.4 steps 2-3):
/// enumerate eligible recipes, resolve each chain, filter by
/// viability, and prefer bank-only chains, then highest recipe level.
pub fn pick_crafting_goal(
    catalog: &Catalog,
    skill: Skill,
    remaining: u32,
    ctx: &PickContext,
    blocked: impl Fn(&str) -> bool,
) -> PickOutcome {
    let mut rejected = Vec::new();
    let mut bank_only: Option<(&Item, Vec<PlanStep>)> = None;
    let mut best_viable: Option<(&Item, Vec<PlanStep>)> = None;

    let mut candidates: Vec<&Item> = catalog
        .recipes_for_skill(skill)
        .filter(|item| item.craft.as_ref().map(|r| r.level <= ctx.char_level).unwrap_or(false))
        .collect();
    candidates.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.code.cmp(&b.code)));

    for item in candidates {
        if blocked(&item.code) {
            continue;
        }
        let steps = resolve_chain(catalog, &item.code, 1);
        match chain_is_viable(
            &steps,
            &crate::viability::ViabilityContext {
                skill_levels: ctx.skill_levels,
                stock: ctx.stock,
            },
            catalog,
            ctx.combat_viable,
        ) {
            Ok(()) => {
                if is_bank_only(&steps) && bank_only.is_none() {
                    bank_only = Some((item, steps));
                } else if best_viable.is_none() {
                    best_viable = Some((item, steps));
                }
            }
            Err(reason) => rejected.push(RejectedCandidate {
                item_code: item.code.clone(),
                reason,
            }),
        }
    }

    let chosen = bank_only.or(best_viable);
    let goal = chosen.map(|(item, plan)| {
        let recipe = item.craft.as_ref().expect("candidate filtered to craftable items");
        Goal::Craft {
            item_code: item.code.clone(),
            recipe_code: item.code.clone(),
            skill: recipe.skill,
            plan,
            remaining,
            bank_checked: false,
            claim_order_id: None,
        }
    });

    if goal.is_some() {
        return PickOutcome { goal, rejected };
    }

    // No viable recipe: fall back to gathering the skill's resource
    // (spec §4.4 step 3 "If none viable, fall back to gathering the
    // skill's associated resource").
    let fallback_resource = catalog
        .resources_for_skill(skill)
        .filter(|r| ctx.skill_levels.get(&r.skill).copied().unwrap_or(0) >= r.level)
        .min_by_key(|r| r.level);
    let goal = fallback_resource.and_then(|r| {
        r.drops.first().map(|item_code| Goal::Gather {
            resource_code: r.code.clone(),
            item_code: item_code.clone(),
            skill,
            remaining,
            claim_order_id: None,
        })
    });
    PickOutcome { goal, rejected }
}

/// Resolves a goal for a pure gathering skill: pick the highest-level
/// resource the character currently qualifies for.
pub fn pick_gathering_goal(catalog: &Catalog, skill: Skill, remaining: u32, char_skill_level: u32) -> Option<Goal> {
    let resource = catalog
        .resources_for_skill(skill)
        .filter(|r| r.level <= char_skill_level)
        .max_by_key(|r| r.level)?;
    let item_code = resource.drops.first()?.clone();
    Some(Goal::Gather {
        resource_code: resource.code.clone(),
        item_code,
        skill,
        remaining,
        claim_order_id: None,
    })
}
