//! Per-character priority-preemptive routine scheduler (spec §4.1).
//!
//! A [`Scheduler`] drives one character's [`routine::Routine`] roster;
//! [`build_baseline_roster`] assembles the six baseline behaviors
//! (spec §4.1 table) from the shared singletons an `rt-runtime`-style
//! caller already owns.

pub mod routine;
pub mod routines;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use routine::{Routine, RoutineConfig};
pub use routines::{BankExpansionRoutine, CompleteTaskRoutine, DepositBankRoutine, EventRoutine, RestRoutine, SkillRotationRoutine};
pub use scheduler::{Scheduler, ShutdownSignal};

use rt_catalog::Catalog;
use rt_core::Clock;
use rt_events::task_coin::{ProactiveExchangeGate, TaskExchangeLock};
use rt_events::{EventManager, NpcEventLock};
use rt_gear::{GearOptimizer, GearStatePlanner, ToolCatalog};
use rt_inventory::InventoryManager;
use rt_orderboard::OrderBoard;
use rt_rotation::{ExecuteDeps, SkillRotation};
use std::sync::Arc;

/// The account-wide and cross-character singletons every baseline
/// routine needs a handle to. One `RoutineDeps` is shared by every
/// character's scheduler; per-character state (bank snapshot aside)
/// lives inside the routines themselves.
pub struct RoutineDeps {
    pub catalog: Arc<Catalog>,
    pub inventory: Arc<InventoryManager>,
    pub order_board: Arc<OrderBoard>,
    pub gear: Arc<GearStatePlanner>,
    pub optimizer: Arc<dyn GearOptimizer>,
    pub tools: Arc<dyn ToolCatalog>,
    pub events: Arc<EventManager>,
    pub npc_lock: Arc<NpcEventLock>,
    pub task_lock: Arc<TaskExchangeLock>,
    pub proactive_gate: Arc<ProactiveExchangeGate>,
    pub clock: Arc<dyn Clock>,
}

/// Builds the baseline roster in spec §4.1 registration order: `Rest,
/// Event, BankExpansion, DepositBank, CompleteTask, SkillRotation`.
/// Registration order breaks ties between candidates of equal
/// priority in [`Scheduler`].
pub fn build_baseline_roster(deps: &RoutineDeps, config: RoutineConfig) -> Vec<Arc<dyn Routine>> {
    let rotation_deps = ExecuteDeps {
        catalog: deps.catalog.clone(),
        inventory: deps.inventory.clone(),
        order_board: deps.order_board.clone(),
        optimizer: deps.optimizer.clone(),
        tools: deps.tools.clone(),
        task_lock: deps.task_lock.clone(),
        proactive_gate: deps.proactive_gate.clone(),
        config: config.rotation.clone(),
    };
    let rotation = SkillRotation::new(deps.catalog.clone(), rotation_deps);

    vec![
        Arc::new(RestRoutine::new(config.clone())),
        Arc::new(EventRoutine::new(
            deps.events.clone(),
            deps.npc_lock.clone(),
            deps.catalog.clone(),
            deps.order_board.clone(),
            deps.inventory.clone(),
            deps.optimizer.clone(),
            deps.tools.clone(),
            deps.clock.clone(),
            config.clone(),
        )),
        Arc::new(BankExpansionRoutine::new(deps.inventory.clone(), config.clone())),
        Arc::new(DepositBankRoutine::new(deps.inventory.clone(), deps.gear.clone(), config.clone())),
        Arc::new(CompleteTaskRoutine::new(
            deps.inventory.clone(),
            deps.task_lock.clone(),
            deps.proactive_gate.clone(),
            config.clone(),
        )),
        Arc::new(SkillRotationRoutine::new(rotation, config)),
    ]
}
