//! The routine contract every baseline behavior implements (spec
//! §4.1): `{name, priority, loop, urgent, canRun, canBePreempted,
//! execute, updateConfig}`.

use async_trait::async_trait;
use rt_core::{CharacterContext, GameApiError};
use std::collections::HashMap;

/// Tunables shared across the baseline routine roster for one
/// character. Each routine reads only the fields it cares about;
/// `rt-runtime`'s config loader is what actually populates this from
/// the on-disk character config.
#[derive(Debug, Clone)]
pub struct RoutineConfig {
    /// Rest routine fires once `hpPercent` drops below this.
    pub rest_trigger_pct: f64,
    /// Bank-expansion routine only buys the next slot if doing so
    /// would leave at least this fraction of current gold untouched.
    pub bank_expansion_max_gold_pct: f64,
    /// ...and always keeps at least this much gold in reserve.
    pub bank_expansion_gold_buffer: u64,
    pub bank_expansion_enabled: bool,
    /// Deposit-bank routine fires once depositable-inventory/capacity
    /// reaches this threshold (0 means "any depositable item at all").
    pub deposit_threshold_pct: f64,
    pub event_enabled: bool,
    pub max_monster_type: String,
    pub gather_resources: Option<Vec<String>>,
    pub npc_buy_list: HashMap<String, u32>,
    pub rotation: rt_rotation::RotationConfig,
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            rest_trigger_pct: 50.0,
            bank_expansion_max_gold_pct: 0.5,
            bank_expansion_gold_buffer: 1000,
            bank_expansion_enabled: true,
            deposit_threshold_pct: 0.8,
            event_enabled: true,
            max_monster_type: "elite".to_string(),
            gather_resources: None,
            npc_buy_list: HashMap::new(),
            rotation: rt_rotation::RotationConfig::default(),
        }
    }
}

/// One behavior a character's scheduler can dispatch. Mirrors the
/// teacher's `#[async_trait] impl Player` shape: state the routine
/// needs lives inside the struct, the trait methods only take the
/// character context.
#[async_trait]
pub trait Routine: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn is_loop(&self) -> bool;
    fn is_urgent(&self) -> bool;

    /// Cheap, read-only check against the last known snapshot (spec
    /// §4.1 "a routine's canRun is a cheap read-only check").
    async fn can_run(&self, ctx: &CharacterContext) -> bool;

    /// Whether a lower-priority urgent candidate may abandon this
    /// routine's in-progress loop iteration.
    async fn can_be_preempted(&self, ctx: &CharacterContext) -> bool;

    /// Performs one action (or one bookkeeping step) and reports
    /// whether progress was made. For `loop` routines, returning
    /// `true` requests another immediate iteration; `false` ends it.
    async fn execute(&self, ctx: &CharacterContext) -> Result<bool, GameApiError>;

    async fn update_config(&self, config: &RoutineConfig);
}
