//! Process lifecycle (spec §4.8 "Runtime manager"). One `RuntimeManager`
//! owns every account-wide singleton plus one `Scheduler` per character,
//! and serializes `start`/`stop`/`reload_config`/`restart` behind a
//! single operation lock the way the teacher's `Casino` serializes
//! table lifecycle operations.

use crate::config::{self, ConfigError};
use rt_catalog::Catalog;
use rt_core::{CharacterContext, Clock, GameApi};
use rt_events::task_coin::{ProactiveExchangeGate, TaskExchangeLock};
use rt_events::{EventManager, NpcEventLock};
use rt_gear::{GearOptimizer, GearStatePlanner, ToolCatalog};
use rt_inventory::InventoryManager;
use rt_orderboard::OrderBoard;
use rt_scheduler::{build_baseline_roster, Routine, RoutineDeps, Scheduler, ShutdownSignal};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Produces a character's `GameApi` handle. The REST client itself is
/// out of scope; callers supply one of these (typically backed by a
/// shared HTTP client keyed by character token).
pub trait GameApiFactory: Send + Sync {
    fn api_for(&self, character_name: &str) -> Arc<dyn GameApi>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub started_at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub state: RuntimeState,
    pub active: bool,
    pub operation: Option<OperationDescriptor>,
    pub updated_at_ms: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("operation '{0}' is already in progress")]
    OperationConflict(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

struct CharacterHandle {
    ctx: Arc<CharacterContext>,
    shutdown: Arc<ShutdownSignal>,
    routines: Vec<Arc<dyn Routine>>,
    task: JoinHandle<()>,
}

struct RuntimeSingletons {
    order_board: Arc<OrderBoard>,
    gear: Arc<GearStatePlanner>,
    inventory: Arc<InventoryManager>,
    events: Arc<EventManager>,
    npc_lock: Arc<NpcEventLock>,
    task_lock: Arc<TaskExchangeLock>,
    proactive_gate: Arc<ProactiveExchangeGate>,
}

/// Owns the full account-wide runtime: singletons, per-character
/// schedulers, and the config this was all built from.
pub struct RuntimeManager {
    config_path: PathBuf,
    catalog: Arc<Catalog>,
    optimizer: Arc<dyn GearOptimizer>,
    tools: Arc<dyn ToolCatalog>,
    api_factory: Arc<dyn GameApiFactory>,
    clock: Arc<dyn Clock>,

    op_lock: tokio::sync::Mutex<()>,
    state: RwLock<RuntimeState>,
    operation: RwLock<Option<OperationDescriptor>>,
    characters: RwLock<HashMap<String, CharacterHandle>>,
    singletons: RwLock<Option<RuntimeSingletons>>,
}

impl RuntimeManager {
    pub fn new(
        config_path: PathBuf,
        catalog: Arc<Catalog>,
        optimizer: Arc<dyn GearOptimizer>,
        tools: Arc<dyn ToolCatalog>,
        api_factory: Arc<dyn GameApiFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config_path,
            catalog,
            optimizer,
            tools,
            api_factory,
            clock,
            op_lock: tokio::sync::Mutex::new(()),
            state: RwLock::new(RuntimeState::Stopped),
            operation: RwLock::new(None),
            characters: RwLock::new(HashMap::new()),
            singletons: RwLock::new(None),
        }
    }

    pub async fn get_status(&self) -> RuntimeStatus {
        let state = *self.state.read().await;
        RuntimeStatus {
            state,
            active: state == RuntimeState::Running,
            operation: self.operation.read().await.clone(),
            updated_at_ms: self.clock.now_ms(),
        }
    }

    async fn begin_operation(&self, name: &str) -> Result<tokio::sync::MutexGuard<'_, ()>, RuntimeError> {
        let guard = self
            .op_lock
            .try_lock()
            .map_err(|_| RuntimeError::OperationConflict(name.to_string()))?;
        *self.operation.write().await = Some(OperationDescriptor {
            name: name.to_string(),
            started_at_ms: self.clock.now_ms(),
        });
        Ok(guard)
    }

    async fn end_operation(&self) {
        *self.operation.write().await = None;
    }

    /// Initializes every singleton, spawns one scheduler per
    /// configured character, and performs the one-time order-board
    /// hard-clear on first run (spec §4.8 "on start").
    pub async fn start(&self) -> Result<(), RuntimeError> {
        let _guard = self.begin_operation("start").await?;
        *self.state.write().await = RuntimeState::Starting;

        let result = self.do_start().await;
        match &result {
            Ok(()) => *self.state.write().await = RuntimeState::Running,
            Err(_) => *self.state.write().await = RuntimeState::Error,
        }
        self.end_operation().await;
        result
    }

    async fn do_start(&self) -> Result<(), RuntimeError> {
        let config_file = config::load_from_path(&self.config_path).await?;

        let order_board = Arc::new(
            OrderBoard::load(config_file.order_board_path.clone(), self.clock.clone())
                .await
                .map_err(anyhow::Error::from)?,
        );
        let gear = Arc::new(
            GearStatePlanner::load(
                config_file.gear_state_path.clone(),
                self.clock.clone(),
                self.catalog.clone(),
                self.optimizer.clone(),
                self.tools.clone(),
                order_board.clone(),
            )
            .await
            .map_err(anyhow::Error::from)?,
        );
        let inventory = Arc::new(InventoryManager::new());
        let events = Arc::new(EventManager::new(self.clock.clone()));
        let npc_lock = Arc::new(NpcEventLock::new(self.clock.clone()));
        let task_lock = Arc::new(TaskExchangeLock::new());
        let proactive_gate = Arc::new(ProactiveExchangeGate::new(self.clock.clone()));

        if !tokio::fs::try_exists(&config_file.rollout_marker_path).await.unwrap_or(false) {
            order_board.clear_order_board("order_board_v2_rollout").await;
            if let Some(parent) = config_file.rollout_marker_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(anyhow::Error::from)?;
            }
            tokio::fs::write(&config_file.rollout_marker_path, b"").await.map_err(anyhow::Error::from)?;
        }

        let deps = RoutineDeps {
            catalog: self.catalog.clone(),
            inventory: inventory.clone(),
            order_board: order_board.clone(),
            gear: gear.clone(),
            optimizer: self.optimizer.clone(),
            tools: self.tools.clone(),
            events: events.clone(),
            npc_lock: npc_lock.clone(),
            task_lock: task_lock.clone(),
            proactive_gate: proactive_gate.clone(),
            clock: self.clock.clone(),
        };

        let mut handles = HashMap::new();
        for resolved in config_file.resolve_characters() {
            let api = self.api_factory.api_for(&resolved.name);
            let state = api.refresh_character(&resolved.name).await.map_err(anyhow::Error::from)?;
            let ctx = Arc::new(CharacterContext::new(state, api));

            let routines: Vec<Arc<dyn Routine>> = build_baseline_roster(&deps, resolved.routine_config)
                .into_iter()
                .filter(|r| resolved.enabled_routines.contains(routine_type_name(r.as_ref())))
                .collect();

            let shutdown = Arc::new(ShutdownSignal::new());
            let scheduler = Scheduler::new(ctx.clone(), routines.clone());
            let task_shutdown = shutdown.clone();
            let task = tokio::spawn(async move {
                scheduler.run(&task_shutdown).await;
            });

            handles.insert(
                resolved.name.clone(),
                CharacterHandle {
                    ctx,
                    shutdown,
                    routines,
                    task,
                },
            );
        }

        *self.characters.write().await = handles;
        *self.singletons.write().await = Some(RuntimeSingletons {
            order_board,
            gear,
            inventory,
            events,
            npc_lock,
            task_lock,
            proactive_gate,
        });
        Ok(())
    }

    /// Cancels every scheduler, releases claims held by active
    /// characters, and flushes gear state to disk (spec §4.8 "on
    /// stop"). `graceful_timeout_ms` bounds how long a scheduler's
    /// in-flight tick is given to finish before it's abandoned.
    pub async fn stop(&self, graceful_timeout_ms: u64) -> Result<(), RuntimeError> {
        let _guard = self.begin_operation("stop").await?;
        *self.state.write().await = RuntimeState::Stopping;

        let result = self.do_stop(graceful_timeout_ms).await;
        match &result {
            Ok(()) => *self.state.write().await = RuntimeState::Stopped,
            Err(_) => *self.state.write().await = RuntimeState::Error,
        }
        self.end_operation().await;
        result
    }

    async fn do_stop(&self, graceful_timeout_ms: u64) -> Result<(), RuntimeError> {
        let handles = std::mem::take(&mut *self.characters.write().await);
        let names: Vec<String> = handles.keys().cloned().collect();

        for handle in handles.values() {
            handle.shutdown.trigger();
        }
        let timeout = Duration::from_millis(graceful_timeout_ms);
        for (name, handle) in handles {
            if tokio::time::timeout(timeout, handle.task).await.is_err() {
                log::warn!("scheduler for '{name}' did not stop within the graceful timeout");
            }
        }

        if let Some(singletons) = self.singletons.write().await.take() {
            singletons.order_board.release_claims_for_chars(&names, "runtime_stop").await;
            singletons.gear.flush().await.map_err(anyhow::Error::from)?;
        }
        Ok(())
    }

    /// Re-reads the config file and pushes the updated `RoutineConfig`
    /// into every running character's routines without restarting
    /// schedulers (spec §6 `POST /api/control/reload-config`).
    pub async fn reload_config(&self) -> Result<(), RuntimeError> {
        let _guard = self.begin_operation("reload-config").await?;

        let result = self.do_reload_config().await;
        if result.is_err() {
            *self.state.write().await = RuntimeState::Error;
        }
        self.end_operation().await;
        result
    }

    async fn do_reload_config(&self) -> Result<(), RuntimeError> {
        let config_file = config::load_from_path(&self.config_path).await?;
        let characters = self.characters.read().await;
        for resolved in config_file.resolve_characters() {
            if let Some(handle) = characters.get(&resolved.name) {
                for routine in &handle.routines {
                    routine.update_config(&resolved.routine_config).await;
                }
            }
        }
        Ok(())
    }

    /// Stops, then starts again from the same config path (spec §6
    /// `POST /api/control/restart`).
    pub async fn restart(&self, graceful_timeout_ms: u64) -> Result<(), RuntimeError> {
        self.stop(graceful_timeout_ms).await?;
        self.start().await
    }

    pub async fn singleton_order_board(&self) -> Option<Arc<OrderBoard>> {
        self.singletons.read().await.as_ref().map(|s| s.order_board.clone())
    }

    pub async fn singleton_gear(&self) -> Option<Arc<GearStatePlanner>> {
        self.singletons.read().await.as_ref().map(|s| s.gear.clone())
    }
}

/// Maps a built routine back to the config schema's `routines[].type`
/// name (spec §6), so `enabled_routines` can filter the roster
/// `build_baseline_roster` always assembles in full.
fn routine_type_name(routine: &dyn Routine) -> &'static str {
    match routine.name() {
        "rest" => "rest",
        "deposit_bank" => "depositBank",
        "bank_expansion" => "bankExpansion",
        "event" => "event",
        "complete_task" => "completeTask",
        "skill_rotation" => "skillRotation",
        other => {
            log::warn!("unrecognized routine name '{other}' while filtering enabled routines");
            "unknown"
        }
    }
}
