//! Config loading (spec §6 "Recognized config options"). Deserializes
//! a characters JSON file into typed DTOs and converts each entry into
//! a `rt_scheduler::RoutineConfig`. File discovery, env overlay, and
//! CLI-flag merging are out of scope; this module only parses a given
//! path (spec §1 out-of-scope list).

use rt_rotation::RotationConfig;
use rt_scheduler::RoutineConfig;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

fn default_order_board_path() -> PathBuf {
    PathBuf::from("./report/order-board.json")
}
fn default_gear_state_path() -> PathBuf {
    PathBuf::from("./report/gear-state.json")
}
fn default_rollout_marker_path() -> PathBuf {
    PathBuf::from("./report/.order-board-v2-rollout")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Persist(#[from] rt_core::PersistError),
    #[error("config file not found: {0:?}")]
    NotFound(PathBuf),
}

/// Top-level characters-config file shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfigFile {
    #[serde(default = "default_order_board_path")]
    pub order_board_path: PathBuf,
    #[serde(default = "default_gear_state_path")]
    pub gear_state_path: PathBuf,
    #[serde(default = "default_rollout_marker_path")]
    pub rollout_marker_path: PathBuf,
    /// Account-level NPC shopping list (spec §6 `npcBuyList`). The
    /// `_any` key and per-npc-code keys both collapse into one flat
    /// `{item_code: qty}` map, since the event routine's shopping list
    /// doesn't currently distinguish NPCs.
    #[serde(default)]
    pub npc_buy_list: HashMap<String, u32>,
    pub characters: Vec<CharacterConfigFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterConfigFile {
    pub name: String,
    /// Routine type names to enable (spec §6 `routines[].type` in
    /// `{rest, depositBank, bankExpansion, event, completeTask,
    /// skillRotation}`). Empty enables all six.
    #[serde(default)]
    pub routines: Vec<String>,
    #[serde(default)]
    pub rest: RestOptions,
    #[serde(default)]
    pub deposit_bank: DepositBankOptions,
    #[serde(default)]
    pub bank_expansion: BankExpansionOptions,
    #[serde(default)]
    pub event: EventOptions,
    #[serde(default)]
    pub skill_rotation: SkillRotationOptions,
    /// Per-character override/addition to the account-level list.
    #[serde(default)]
    pub npc_buy_list: HashMap<String, u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestOptions {
    pub trigger_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepositBankOptions {
    pub threshold: Option<f64>,
    /// Accepted for schema compatibility; no marketplace or dedicated
    /// gold-deposit routine is built, so these have no effect.
    pub sell_on_ge: bool,
    pub recycle_equipment: bool,
    pub deposit_gold: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BankExpansionOptions {
    pub max_gold_pct: Option<f64>,
    pub gold_buffer: Option<u64>,
    /// Accepted for schema compatibility; the routine re-evaluates
    /// every scheduler tick rather than on a fixed interval.
    pub check_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventOptions {
    pub enabled: Option<bool>,
    pub max_monster_type: Option<String>,
    /// Resource codes to chase; absent means "any" (spec §6
    /// `event.resourceEvents`).
    pub resource_events: Option<Vec<String>>,
    /// Accepted for schema compatibility; the routine doesn't gate
    /// monster/NPC events by a separate boolean beyond `enabled` and
    /// `maxMonsterType`.
    pub monster_events: Option<bool>,
    pub npc_events: Option<bool>,
    pub min_time_remaining_ms: Option<i64>,
    pub cooldown_ms: Option<i64>,
    pub min_winrate: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillRotationOptions {
    /// Keyed by skill name (snake_case, e.g. `"mining"`) or `"combat"`,
    /// `"npc_task"`, `"item_task"`.
    pub weights: HashMap<String, f64>,
    pub order_board: OrderBoardOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderBoardOptions {
    pub enabled: Option<bool>,
    pub create_orders: Option<bool>,
    /// Accepted for schema compatibility; lease/retry durations are
    /// fixed constants in `rt-rotation`'s claim module today.
    pub fulfill_orders: Option<bool>,
    pub lease_ms: Option<i64>,
    pub blocked_retry_ms: Option<i64>,
}

/// Parses a `RotationTarget`-shaped config key: a `Skill` name in
/// snake_case, or one of `combat`/`npc_task`/`item_task`.
fn parse_rotation_target(key: &str) -> Option<rt_rotation::RotationTarget> {
    use rt_rotation::RotationTarget;
    match key {
        "combat" => Some(RotationTarget::Combat),
        "npc_task" => Some(RotationTarget::NpcTask),
        "item_task" => Some(RotationTarget::ItemTask),
        other => serde_json::from_value::<rt_core::Skill>(serde_json::Value::String(other.to_string()))
            .ok()
            .map(RotationTarget::Skill),
    }
}

/// Loads and parses a characters-config file at `path`. Discovery of
/// *which* file to load (env overlay, CLI merging) is the caller's
/// job; this is a direct `serde_json` read.
pub async fn load_from_path(path: &Path) -> Result<RuntimeConfigFile, ConfigError> {
    rt_core::persist::load_json(path).await?.ok_or_else(|| ConfigError::NotFound(path.to_path_buf()))
}

/// One character's resolved config: the shared `RoutineConfig` every
/// baseline routine reads, plus which routine types are enabled.
pub struct ResolvedCharacterConfig {
    pub name: String,
    pub routine_config: RoutineConfig,
    pub enabled_routines: HashSet<String>,
}

const ALL_ROUTINE_TYPES: [&str; 6] = ["rest", "depositBank", "bankExpansion", "event", "completeTask", "skillRotation"];

impl RuntimeConfigFile {
    /// Resolves every character entry into a `RoutineConfig`, merging
    /// the account-level `npcBuyList` with each character's own.
    pub fn resolve_characters(&self) -> Vec<ResolvedCharacterConfig> {
        self.characters.iter().map(|c| self.resolve_character(c)).collect()
    }

    fn resolve_character(&self, c: &CharacterConfigFile) -> ResolvedCharacterConfig {
        let mut cfg = RoutineConfig::default();

        if let Some(pct) = c.rest.trigger_pct {
            cfg.rest_trigger_pct = pct;
        }
        if let Some(pct) = c.deposit_bank.threshold {
            cfg.deposit_threshold_pct = pct;
        }
        if let Some(pct) = c.bank_expansion.max_gold_pct {
            cfg.bank_expansion_max_gold_pct = pct;
        }
        if let Some(buffer) = c.bank_expansion.gold_buffer {
            cfg.bank_expansion_gold_buffer = buffer;
        }
        if let Some(enabled) = c.event.enabled {
            cfg.event_enabled = enabled;
        }
        if let Some(max_type) = &c.event.max_monster_type {
            cfg.max_monster_type = max_type.clone();
        }
        cfg.gather_resources = c.event.resource_events.clone();

        let mut npc_buy_list = self.npc_buy_list.clone();
        npc_buy_list.extend(c.npc_buy_list.clone());
        cfg.npc_buy_list = npc_buy_list;

        let mut rotation = RotationConfig::default();
        for (key, weight) in &c.skill_rotation.weights {
            if let Some(target) = parse_rotation_target(key) {
                rotation.weights.insert(target, *weight);
            } else {
                log::warn!("unrecognized skillRotation.weights key '{key}' for character '{}'", c.name);
            }
        }
        if let Some(enabled) = c.skill_rotation.order_board.enabled {
            rotation.order_board_fulfillment = enabled;
        }
        if let Some(create) = c.skill_rotation.order_board.create_orders {
            rotation.create_orders = create;
        }
        cfg.rotation = rotation;

        let enabled_routines = if c.routines.is_empty() {
            ALL_ROUTINE_TYPES.iter().map(|s| s.to_string()).collect()
        } else {
            c.routines.iter().cloned().collect()
        };

        ResolvedCharacterConfig {
            name: c.name.clone(),
            routine_config: cfg,
            enabled_routines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_and_resolves_a_minimal_character() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("characters.json");
        tokio::fs::write(
            &path,
            serde_json::to_vec(&serde_json::json!({
                "npcBuyList": {"feather": 50},
                "characters": [{
                    "name": "alice",
                    "rest": {"triggerPct": 40.0},
                    "event": {"enabled": false, "maxMonsterType": "normal"},
                    "skillRotation": {"weights": {"mining": 2.0, "combat": 1.0}},
                }]
            }))
            .unwrap(),
        )
        .await
        .unwrap();

        let file = load_from_path(&path).await.unwrap();
        let resolved = file.resolve_characters();
        assert_eq!(resolved.len(), 1);
        let alice = &resolved[0];
        assert_eq!(alice.name, "alice");
        assert_eq!(alice.routine_config.rest_trigger_pct, 40.0);
        assert!(!alice.routine_config.event_enabled);
        assert_eq!(alice.routine_config.max_monster_type, "normal");
        assert_eq!(alice.routine_config.npc_buy_list.get("feather"), Some(&50));
        assert_eq!(
            alice.routine_config.rotation.weights.get(&rt_rotation::RotationTarget::Combat),
            Some(&1.0)
        );
        assert_eq!(alice.enabled_routines.len(), 6);
    }
}
