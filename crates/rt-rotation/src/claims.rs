//! Order-claim interactions (spec §4.4 "Order-claim interactions"):
//! the precheck a character runs before claiming a craft order, and
//! the claim-bucket ordering clients use when several orders are
//! eligible (spec §4.2 "Ordering and tie-breaks").

use crate::viability::{chain_is_viable, UnviableReason, ViabilityContext};
use rt_catalog::{chain::resolve_chain, Catalog};
use rt_core::{OrderSource, Skill, Slot};
use rt_orderboard::Order;
use std::collections::HashMap;

/// `{tool:0, resource:1, weapon:2, gear:3}` (spec §4.2). `Gather` stays
/// at the resource tier (splitting tool-gather from resource-gather
/// needs the out-of-scope `ToolCatalog` seam); `Craft` is split into
/// the weapon and gear tiers by the target item's `equip_slot`, which
/// the catalog already carries.
pub fn claim_bucket(catalog: &Catalog, order: &Order) -> u8 {
    match order.source_type {
        OrderSource::Gather => 1,
        OrderSource::Fight => 2,
        OrderSource::Craft => match catalog.item(&order.item_code).and_then(|item| item.equip_slot) {
            Some(Slot::Weapon) => 2,
            _ => 3,
        },
    }
}

/// Sorts claimable orders by claim-bucket, then `createdAtMs`, then
/// `id` (spec §4.2, §4.4).
pub fn sort_by_claim_priority(catalog: &Catalog, orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        claim_bucket(catalog, a)
            .cmp(&claim_bucket(catalog, b))
            .then_with(|| a.created_at_ms.cmp(&b.created_at_ms))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// `_canClaimCraftOrderNow` (spec §4.4): recipe level, chain
/// resolvability, and bank-aware viability of every step. Distinct
/// from `pick_crafting_goal`'s filtering in that it operates on one
/// already-selected order rather than ranking candidates.
pub fn can_claim_craft_order_now(
    catalog: &Catalog,
    order: &Order,
    char_level: u32,
    char_craft_skill: Option<Skill>,
    ctx: &ViabilityContext,
    combat_viable: &HashMap<String, bool>,
) -> Result<(), UnviableReason> {
    if order.source_level > char_level {
        return Err(UnviableReason::MissingBankDependency {
            item_code: order.item_code.clone(),
        });
    }
    if let (Some(wanted), Some(have)) = (order.craft_skill, char_craft_skill) {
        if wanted != have {
            // wrong_craft_skill: reuse the bank-dependency shape since
            // the caller only branches on the rendered reason string.
            return Err(UnviableReason::MissingBankDependency {
                item_code: format!("wrong_craft_skill:{}", order.item_code),
            });
        }
    }
    if catalog.item(&order.item_code).is_none() {
        return Err(UnviableReason::MissingBankDependency {
            item_code: format!("unresolvable_recipe_chain:{}", order.item_code),
        });
    }
    let steps = resolve_chain(catalog, &order.item_code, order.remaining_qty.max(1));
    chain_is_viable(&steps, ctx, catalog, combat_viable)
}
