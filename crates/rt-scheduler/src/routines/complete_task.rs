//! Complete-task routine (spec §4.1 baseline roster, priority 45,
//! one-shot, non-urgent): turns in a finished task and opportunistically
//! runs the task-coin exchange (spec §4.6) when the configured targets
//! aren't already met.

use crate::routine::{Routine, RoutineConfig};
use async_trait::async_trait;
use rt_core::{CharacterContext, GameApiError};
use rt_events::task_coin::{self, ProactiveExchangeGate, TaskExchangeLock};
use rt_inventory::InventoryManager;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct CompleteTaskRoutine {
    inventory: Arc<InventoryManager>,
    task_lock: Arc<TaskExchangeLock>,
    proactive_gate: Arc<ProactiveExchangeGate>,
    config: RwLock<RoutineConfig>,
}

impl CompleteTaskRoutine {
    pub fn new(
        inventory: Arc<InventoryManager>,
        task_lock: Arc<TaskExchangeLock>,
        proactive_gate: Arc<ProactiveExchangeGate>,
        config: RoutineConfig,
    ) -> Self {
        Self {
            inventory,
            task_lock,
            proactive_gate,
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl Routine for CompleteTaskRoutine {
    fn name(&self) -> &str {
        "complete_task"
    }
    fn priority(&self) -> i32 {
        45
    }
    fn is_loop(&self) -> bool {
        false
    }
    fn is_urgent(&self) -> bool {
        false
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        ctx.snapshot().await.task_complete()
    }

    async fn can_be_preempted(&self, _ctx: &CharacterContext) -> bool {
        true
    }

    async fn execute(&self, ctx: &CharacterContext) -> Result<bool, GameApiError> {
        let result = ctx.api().complete_task(&ctx.name).await?;
        ctx.apply_action_result(&result).await;

        let targets = self.config.read().await.rotation.task_coin_targets.clone();
        if !targets.is_empty() && self.proactive_gate.is_eligible().await {
            self.proactive_gate.mark_attempted().await;
            let _ = task_coin::run_task_coin_exchange(ctx, &self.inventory, &self.task_lock, &targets).await;
        }
        Ok(true)
    }

    async fn update_config(&self, config: &RoutineConfig) {
        *self.config.write().await = config.clone();
    }
}
