//! Per-character scheduling loop (spec §4.1 "Scheduling algorithm").

use crate::routine::Routine;
use rt_core::{wait_cooldown, CharacterContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Short idle wait when no routine is runnable (spec §4.1 step 5).
const IDLE_INTERVAL: Duration = Duration::from_millis(500);

/// Cooperative stop flag shared between a running scheduler and
/// whatever owns its lifecycle (`rt-runtime`'s shutdown path).
#[derive(Debug, Default)]
pub struct ShutdownSignal(AtomicBool);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives one character's routine roster: a registration-ordered
/// list, sequential dispatch, priority-preemption of in-progress loop
/// routines (spec §4.1 steps 2-4).
pub struct Scheduler {
    ctx: Arc<CharacterContext>,
    routines: Vec<Arc<dyn Routine>>,
}

impl Scheduler {
    pub fn new(ctx: Arc<CharacterContext>, routines: Vec<Arc<dyn Routine>>) -> Self {
        Self { ctx, routines }
    }

    /// Runs ticks until `shutdown` is set. Refreshing character state
    /// lazily (spec step 1) is left to each routine's own `can_run`/
    /// `execute`, which read the context's cached snapshot; nothing
    /// here forces an eager refresh every tick.
    pub async fn run(&self, shutdown: &ShutdownSignal) {
        let mut current: Option<Arc<dyn Routine>> = None;

        while !shutdown.is_set() {
            let mut candidates: Vec<(usize, Arc<dyn Routine>)> = Vec::new();
            for (i, routine) in self.routines.iter().enumerate() {
                if routine.can_run(&self.ctx).await {
                    candidates.push((i, routine.clone()));
                }
            }
            candidates.sort_by(|a, b| b.1.priority().cmp(&a.1.priority()).then(a.0.cmp(&b.0)));

            if let Some(running) = &current {
                if let Some((_, top)) = candidates.first() {
                    let strictly_higher = top.priority() > running.priority();
                    let may_preempt = top.is_urgent() || running.can_be_preempted(&self.ctx).await;
                    if strictly_higher && may_preempt {
                        current = None;
                    }
                }
            }

            let chosen = match &current {
                Some(running) => Some(running.clone()),
                None => candidates.first().map(|(_, r)| r.clone()),
            };

            let Some(routine) = chosen else {
                tokio::time::sleep(IDLE_INTERVAL).await;
                continue;
            };

            match routine.execute(&self.ctx).await {
                Ok(progressed) => {
                    current = if routine.is_loop() && progressed {
                        Some(routine)
                    } else {
                        None
                    };
                }
                Err(err) => {
                    log::warn!("routine '{}' errored for {}: {err}", routine.name(), self.ctx.name);
                    current = None;
                }
            }

            let cooldown = self.ctx.take_last_cooldown_seconds().await;
            wait_cooldown(cooldown).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rt_core::{CharacterState, GameApi, GameApiError, ItemStack, Position};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;

    struct FakeApi;

    #[async_trait]
    impl GameApi for FakeApi {
        async fn refresh_character(&self, _name: &str) -> Result<CharacterState, GameApiError> {
            unimplemented!()
        }
        async fn move_to(&self, _name: &str, _pos: Position) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn fight(&self, _name: &str) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn gather(&self, _name: &str) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn craft(&self, _name: &str, _item_code: &str, _quantity: u32) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn equip(
            &self,
            _name: &str,
            _item_code: &str,
            _slot: rt_core::Slot,
            _quantity: u32,
        ) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn unequip(&self, _name: &str, _slot: rt_core::Slot) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn withdraw_bank(&self, _name: &str, _item_code: &str, _quantity: u32) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn deposit_bank(&self, _name: &str, _item_code: &str, _quantity: u32) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn withdraw_gold(&self, _name: &str, _amount: u64) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn deposit_gold(&self, _name: &str, _amount: u64) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn npc_buy(&self, _name: &str, _npc_code: &str, _item_code: &str, _quantity: u32) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn accept_task(&self, _name: &str) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn complete_task(&self, _name: &str) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn cancel_task(&self, _name: &str) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn task_trade(&self, _name: &str, _item_code: &str, _quantity: u32) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn task_exchange(&self, _name: &str) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn buy_bank_expansion(&self, _name: &str) -> Result<rt_core::ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn get_bank_details(&self) -> Result<rt_core::BankDetails, GameApiError> {
            unimplemented!()
        }
        async fn get_bank_items(&self) -> Result<Vec<ItemStack>, GameApiError> {
            unimplemented!()
        }
    }

    struct CountingRoutine {
        priority: i32,
        loops: bool,
        calls: AtomicU32,
        max_calls: u32,
    }

    #[async_trait]
    impl Routine for CountingRoutine {
        fn name(&self) -> &str {
            "counting"
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn is_loop(&self) -> bool {
            self.loops
        }
        fn is_urgent(&self) -> bool {
            false
        }
        async fn can_run(&self, _ctx: &CharacterContext) -> bool {
            self.calls.load(Ordering::SeqCst) < self.max_calls
        }
        async fn can_be_preempted(&self, _ctx: &CharacterContext) -> bool {
            true
        }
        async fn execute(&self, _ctx: &CharacterContext) -> Result<bool, GameApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(n < self.max_calls)
        }
        async fn update_config(&self, _config: &crate::routine::RoutineConfig) {}
    }

    fn fixture_ctx() -> Arc<CharacterContext> {
        Arc::new(CharacterContext::new(
            CharacterState {
                name: "alice".into(),
                level: 1,
                hp: 100,
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
            Arc::new(FakeApi),
        ))
    }

    #[tokio::test]
    async fn loop_routine_keeps_running_until_it_stops_progressing() {
        let ctx = fixture_ctx();
        let routine = Arc::new(CountingRoutine {
            priority: 5,
            loops: true,
            calls: AtomicU32::new(0),
            max_calls: 3,
        });
        let scheduler = Scheduler::new(ctx, vec![routine.clone()]);
        let shutdown = Arc::new(ShutdownSignal::new());

        // Once `max_calls` is reached the routine stops being a runnable
        // candidate and `run` idles forever, so bound this in a spawned
        // task rather than awaiting it directly.
        let handle = tokio::spawn(async move {
            scheduler.run(&shutdown).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
        assert_eq!(routine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn higher_priority_candidate_wins_the_next_tick() {
        let ctx = fixture_ctx();
        let low = Arc::new(CountingRoutine {
            priority: 1,
            loops: true,
            calls: AtomicU32::new(0),
            max_calls: 100,
        });
        let high = Arc::new(CountingRoutine {
            priority: 10,
            loops: false,
            calls: AtomicU32::new(0),
            max_calls: 1,
        });
        let scheduler = Scheduler::new(ctx, vec![low.clone(), high.clone()]);
        let shutdown = Arc::new(ShutdownSignal::new());

        // Run a few ticks in a bounded task so the low routine's
        // unbounded loop doesn't spin forever in the test.
        let handle = tokio::spawn(async move {
            scheduler.run(&shutdown).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
        assert_eq!(high.calls.load(Ordering::SeqCst), 1);
    }
}
