//! Deposit-bank routine (spec §4.1 baseline roster, priority 50):
//! deposits whatever inventory isn't protected by the gear-state
//! planner's owned/keep set once depositable fill reaches a
//! threshold.

use crate::routine::{Routine, RoutineConfig};
use async_trait::async_trait;
use rt_core::{CharacterContext, GameApiError, ItemStack};
use rt_gear::GearStatePlanner;
use rt_inventory::{bank_ops, InventoryManager};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct DepositBankRoutine {
    inventory: Arc<InventoryManager>,
    gear: Arc<GearStatePlanner>,
    config: RwLock<RoutineConfig>,
}

impl DepositBankRoutine {
    pub fn new(inventory: Arc<InventoryManager>, gear: Arc<GearStatePlanner>, config: RoutineConfig) -> Self {
        Self {
            inventory,
            gear,
            config: RwLock::new(config),
        }
    }

    /// Depositable quantity per item code: carried minus whatever the
    /// gear planner says this character should keep on hand (spec
    /// §4.3 `getOwnedKeepByCodeForInventory`).
    async fn depositable(&self, ctx: &CharacterContext) -> Vec<ItemStack> {
        let snapshot = ctx.snapshot().await;
        let equipment = snapshot.equipment.clone();
        let keep = self
            .gear
            .get_owned_keep_by_code_for_inventory(&ctx.name, |code| {
                equipment.values().filter(|v| v.as_str() == code).count() as u32
            })
            .await;
        snapshot
            .inventory
            .iter()
            .filter_map(|stack| {
                let keep_qty = keep.get(&stack.code).copied().unwrap_or(0);
                let depositable = stack.quantity.saturating_sub(keep_qty);
                if depositable > 0 {
                    Some(ItemStack {
                        code: stack.code.clone(),
                        quantity: depositable,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl Routine for DepositBankRoutine {
    fn name(&self) -> &str {
        "deposit_bank"
    }
    fn priority(&self) -> i32 {
        50
    }
    fn is_loop(&self) -> bool {
        false
    }
    fn is_urgent(&self) -> bool {
        false
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        let depositable = self.depositable(ctx).await;
        if depositable.is_empty() {
            return false;
        }
        let threshold = self.config.read().await.deposit_threshold_pct;
        if threshold <= 0.0 {
            return true;
        }
        let snapshot = ctx.snapshot().await;
        if snapshot.inventory_capacity == 0 {
            return false;
        }
        let depositable_count: u32 = depositable.iter().map(|s| s.quantity).sum();
        depositable_count as f64 / snapshot.inventory_capacity as f64 >= threshold
    }

    async fn can_be_preempted(&self, _ctx: &CharacterContext) -> bool {
        true
    }

    async fn execute(&self, ctx: &CharacterContext) -> Result<bool, GameApiError> {
        let items = self.depositable(ctx).await;
        if items.is_empty() {
            return Ok(false);
        }
        bank_ops::deposit_batch(&self.inventory, ctx.api().as_ref(), &ctx.name, &items)
            .await
            .map_err(|e| match e {
                bank_ops::BankOpsError::GameApi(inner) => inner,
            })?;
        Ok(true)
    }

    async fn update_config(&self, config: &RoutineConfig) {
        *self.config.write().await = config.clone();
    }
}
