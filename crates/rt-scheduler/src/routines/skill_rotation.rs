//! Skill-rotation routine (spec §4.1 baseline roster, priority 5, loop,
//! non-urgent): the lowest-priority fallback that keeps a character
//! busy gathering, crafting, fighting, or working a task whenever
//! nothing more important can run. Thin wrapper around
//! `rt_rotation::SkillRotation`, which owns the actual goal-picking and
//! dispatch logic; this routine only owns the per-character
//! `RotationState` and the preempt/loop bookkeeping the scheduler needs.

use crate::routine::{Routine, RoutineConfig};
use async_trait::async_trait;
use rt_core::{CharacterContext, GameApiError};
use rt_rotation::{RotationState, SkillRotation};
use tokio::sync::{Mutex, RwLock};

pub struct SkillRotationRoutine {
    inner: SkillRotation,
    state: Mutex<RotationState>,
    config: RwLock<RoutineConfig>,
}

impl SkillRotationRoutine {
    pub fn new(inner: SkillRotation, config: RoutineConfig) -> Self {
        Self {
            inner,
            state: Mutex::new(RotationState::new()),
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl Routine for SkillRotationRoutine {
    fn name(&self) -> &str {
        "skill_rotation"
    }
    fn priority(&self) -> i32 {
        5
    }
    fn is_loop(&self) -> bool {
        true
    }
    fn is_urgent(&self) -> bool {
        false
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        !ctx.snapshot().await.inventory_full()
    }

    async fn can_be_preempted(&self, _ctx: &CharacterContext) -> bool {
        true
    }

    async fn execute(&self, ctx: &CharacterContext) -> Result<bool, GameApiError> {
        let mut state = self.state.lock().await;
        self.inner.execute(ctx, &mut state).await
    }

    async fn update_config(&self, config: &RoutineConfig) {
        *self.config.write().await = config.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_state, StubApi};
    use rt_core::CharacterContext;
    use rt_events::task_coin::{ProactiveExchangeGate, TaskExchangeLock};
    use rt_gear::optimizer::{GearOptimizer, NoToolCatalog, OptimizeRecord};
    use rt_orderboard::OrderBoard;
    use rt_rotation::ExecuteDeps;
    use std::sync::Arc;

    struct NoOptimizer;

    #[async_trait::async_trait]
    impl GearOptimizer for NoOptimizer {
        async fn optimize(&self, _char_name: &str, _monster_code: &str, _monster_level: u32) -> Option<OptimizeRecord> {
            None
        }
    }

    #[tokio::test]
    async fn cannot_run_with_full_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let clock: Arc<dyn rt_core::Clock> = Arc::new(rt_core::FakeClock::new(0));
        let board = Arc::new(OrderBoard::load(dir.path().join("orders.json"), clock.clone()).await.unwrap());
        let deps = ExecuteDeps {
            catalog: Arc::new(rt_catalog::Catalog::new(vec![], vec![], vec![], vec![])),
            inventory: Arc::new(rt_inventory::InventoryManager::new()),
            order_board: board,
            optimizer: Arc::new(NoOptimizer),
            tools: Arc::new(NoToolCatalog),
            task_lock: Arc::new(TaskExchangeLock::new()),
            proactive_gate: Arc::new(ProactiveExchangeGate::new(clock)),
            config: Default::default(),
        };
        let rotation = SkillRotation::new(deps.catalog.clone(), deps);
        let routine = SkillRotationRoutine::new(rotation, RoutineConfig::default());

        let mut full = fixture_state("alice");
        full.inventory = vec![rt_core::ItemStack { code: "copper".into(), quantity: 10 }];
        full.inventory_capacity = 10;
        let ctx = CharacterContext::new(full.clone(), Arc::new(StubApi::new(full)));

        assert!(!routine.can_run(&ctx).await);
    }
}
