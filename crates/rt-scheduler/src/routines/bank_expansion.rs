//! Bank-expansion routine (spec §4.1 baseline roster, priority 55):
//! buys the next bank slot once it's affordable under the configured
//! gold ceiling and buffer.

use crate::routine::{Routine, RoutineConfig};
use async_trait::async_trait;
use rt_core::{CharacterContext, GameApiError};
use rt_inventory::InventoryManager;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct BankExpansionRoutine {
    inventory: Arc<InventoryManager>,
    config: RwLock<RoutineConfig>,
    /// Learned from `get_bank_details`; `None` until the first check.
    last_known_cost: RwLock<Option<u64>>,
}

impl BankExpansionRoutine {
    pub fn new(inventory: Arc<InventoryManager>, config: RoutineConfig) -> Self {
        Self {
            inventory,
            config: RwLock::new(config),
            last_known_cost: RwLock::new(None),
        }
    }

    fn affordable(gold: u64, cost: u64, cfg: &RoutineConfig) -> bool {
        cost > 0
            && gold >= cost.saturating_add(cfg.bank_expansion_gold_buffer)
            && (cost as f64) <= gold as f64 * cfg.bank_expansion_max_gold_pct
    }
}

#[async_trait]
impl Routine for BankExpansionRoutine {
    fn name(&self) -> &str {
        "bank_expansion"
    }
    fn priority(&self) -> i32 {
        55
    }
    fn is_loop(&self) -> bool {
        false
    }
    fn is_urgent(&self) -> bool {
        false
    }

    async fn can_run(&self, _ctx: &CharacterContext) -> bool {
        let cfg = self.config.read().await;
        if !cfg.bank_expansion_enabled {
            return false;
        }
        let gold = self.inventory.snapshot().await.gold;
        match *self.last_known_cost.read().await {
            Some(cost) => Self::affordable(gold, cost, &cfg),
            // Cost hasn't been learned yet: let one execute pass find
            // out rather than never running at all.
            None => gold > 0,
        }
    }

    async fn can_be_preempted(&self, _ctx: &CharacterContext) -> bool {
        true
    }

    async fn execute(&self, ctx: &CharacterContext) -> Result<bool, GameApiError> {
        let details = ctx.api().get_bank_details().await?;
        *self.last_known_cost.write().await = Some(details.next_expansion_cost);

        let cfg = self.config.read().await.clone();
        if !Self::affordable(details.gold, details.next_expansion_cost, &cfg) {
            return Ok(false);
        }

        let result = ctx.api().buy_bank_expansion(&ctx.name).await?;
        ctx.apply_action_result(&result).await;
        rt_inventory::bank_ops::refresh(&self.inventory, ctx.api().as_ref())
            .await
            .map_err(|e| match e {
                rt_inventory::bank_ops::BankOpsError::GameApi(inner) => inner,
            })?;
        Ok(true)
    }

    async fn update_config(&self, config: &RoutineConfig) {
        *self.config.write().await = config.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_state, StubApi};
    use std::sync::Arc;

    #[tokio::test]
    async fn not_affordable_below_buffer() {
        let cfg = RoutineConfig {
            bank_expansion_gold_buffer: 500,
            bank_expansion_max_gold_pct: 1.0,
            ..RoutineConfig::default()
        };
        assert!(!BankExpansionRoutine::affordable(600, 200, &cfg));
        assert!(BankExpansionRoutine::affordable(800, 200, &cfg));
    }

    #[tokio::test]
    async fn cannot_run_while_disabled() {
        let inventory = Arc::new(InventoryManager::new());
        inventory.replace(10_000, vec![]).await;
        let cfg = RoutineConfig {
            bank_expansion_enabled: false,
            ..RoutineConfig::default()
        };
        let routine = BankExpansionRoutine::new(inventory.clone(), cfg);
        let ctx = CharacterContext::new(fixture_state("alice"), Arc::new(StubApi::new(fixture_state("alice"))));
        assert!(!routine.can_run(&ctx).await);
    }
}
