//! Rest routine (spec §4.1 baseline roster, priority 100, one-shot,
//! non-urgent): fires whenever HP drops below the configured trigger
//! and nothing more important can run.

use crate::routine::{Routine, RoutineConfig};
use async_trait::async_trait;
use rt_core::{wait_cooldown, CharacterContext, GameApiError};
use tokio::sync::RwLock;

/// Resting itself is not a distinct remote action in the out-of-scope
/// REST client (spec §1): natural HP regen happens between server
/// actions, so this routine's "action" is simply to refresh state and
/// wait a beat rather than call an endpoint that doesn't exist.
const REGEN_WAIT_SECONDS: f64 = 3.0;

pub struct RestRoutine {
    config: RwLock<RoutineConfig>,
}

impl RestRoutine {
    pub fn new(config: RoutineConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl Routine for RestRoutine {
    fn name(&self) -> &str {
        "rest"
    }
    fn priority(&self) -> i32 {
        100
    }
    fn is_loop(&self) -> bool {
        false
    }
    fn is_urgent(&self) -> bool {
        false
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        let snapshot = ctx.snapshot().await;
        let trigger = self.config.read().await.rest_trigger_pct;
        snapshot.hp_percent() < trigger
    }

    async fn can_be_preempted(&self, _ctx: &CharacterContext) -> bool {
        true
    }

    async fn execute(&self, ctx: &CharacterContext) -> Result<bool, GameApiError> {
        ctx.refresh().await?;
        wait_cooldown(REGEN_WAIT_SECONDS).await;
        Ok(true)
    }

    async fn update_config(&self, config: &RoutineConfig) {
        *self.config.write().await = config.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_core::{ActionResult, BankDetails, CharacterState, ItemStack, Position, Slot};
    use std::collections::HashMap;

    struct FakeApi;

    #[async_trait]
    impl rt_core::GameApi for FakeApi {
        async fn refresh_character(&self, _name: &str) -> Result<CharacterState, GameApiError> {
            Ok(CharacterState {
                name: "alice".into(),
                level: 1,
                hp: 90,
                max_hp: 100,
                gold: 0,
                position: Position { x: 0, y: 0 },
                skills: HashMap::new(),
                equipment: HashMap::new(),
                utilities: HashMap::new(),
                inventory: vec![],
                inventory_capacity: 10,
                task: None,
            })
        }
        async fn move_to(&self, _n: &str, _p: Position) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn fight(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn gather(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn craft(&self, _n: &str, _i: &str, _q: u32) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn equip(&self, _n: &str, _i: &str, _s: Slot, _q: u32) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn unequip(&self, _n: &str, _s: Slot) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn withdraw_bank(&self, _n: &str, _i: &str, _q: u32) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn deposit_bank(&self, _n: &str, _i: &str, _q: u32) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn withdraw_gold(&self, _n: &str, _a: u64) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn deposit_gold(&self, _n: &str, _a: u64) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn npc_buy(&self, _n: &str, _c: &str, _i: &str, _q: u32) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn accept_task(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn complete_task(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn cancel_task(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn task_trade(&self, _n: &str, _i: &str, _q: u32) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn task_exchange(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn buy_bank_expansion(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn get_bank_details(&self) -> Result<BankDetails, GameApiError> {
            unimplemented!()
        }
        async fn get_bank_items(&self) -> Result<Vec<ItemStack>, GameApiError> {
            unimplemented!()
        }
    }

    fn ctx(hp: u32) -> CharacterContext {
        CharacterContext::new(
            CharacterState {
                name: "alice".into(),
                level: 1,
                hp,
                max_hp: 100,
                gold: 0,
                position: Position { x: 0, y: 0 },
                skills: HashMap::new(),
                equipment: HashMap::new(),
                utilities: HashMap::new(),
                inventory: vec![],
                inventory_capacity: 10,
                task: None,
            },
            std::sync::Arc::new(FakeApi),
        )
    }

    #[tokio::test]
    async fn can_run_only_below_trigger() {
        let routine = RestRoutine::new(RoutineConfig::default());
        assert!(!routine.can_run(&ctx(80)).await);
        assert!(routine.can_run(&ctx(10)).await);
    }
}
