use crate::api::{ActionResult, GameApi};
use crate::model::{ItemStack, Skill, Slot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Map coordinate. Cheap, `Copy`, compared by value throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// In-progress task state, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub code: String,
    pub task_type: String,
    pub total: u32,
    pub progress: u32,
    pub coins: u32,
}

/// Live character record as last observed from the remote server
/// (spec §3 "Character context").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterState {
    pub name: String,
    pub level: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub gold: u64,
    pub position: Position,
    pub skills: HashMap<Skill, u32>,
    pub equipment: HashMap<Slot, String>,
    pub utilities: HashMap<String, u32>,
    pub inventory: Vec<ItemStack>,
    pub inventory_capacity: u32,
    pub task: Option<TaskState>,
}

impl CharacterState {
    pub fn hp_percent(&self) -> f64 {
        if self.max_hp == 0 {
            0.0
        } else {
            self.hp as f64 / self.max_hp as f64 * 100.0
        }
    }
    pub fn is_at(&self, pos: Position) -> bool {
        self.position == pos
    }
    pub fn inventory_count(&self) -> u32 {
        self.inventory.iter().map(|s| s.quantity).sum()
    }
    pub fn inventory_full(&self) -> bool {
        self.inventory_count() >= self.inventory_capacity
    }
    pub fn item_count(&self, code: &str) -> u32 {
        self.inventory
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }
    pub fn skill_level(&self, skill: Skill) -> u32 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }
    pub fn has_task(&self) -> bool {
        self.task.is_some()
    }
    pub fn task_complete(&self) -> bool {
        self.task
            .as_ref()
            .map(|t| t.progress >= t.total)
            .unwrap_or(false)
    }
    pub fn task_coins(&self) -> u32 {
        self.item_count("tasks_coin")
    }
    pub fn equipped_count(&self, code: &str) -> u32 {
        self.equipment
            .values()
            .filter(|c| c.as_str() == code)
            .count() as u32
            + self.utilities.get(code).copied().unwrap_or(0)
    }
}

/// Per-character handle: live state plus the API client used to mutate
/// it, and per-monster loss counters used by combat-bailout logic.
///
/// Wrapped in `RwLock` rather than requiring `&mut` everywhere because
/// multiple routines inspect a character's state between dispatch
/// decisions (scheduler `canRun` checks, spec §4.1 step 2) while only
/// the currently-dispatched routine mutates it.
pub struct CharacterContext {
    pub name: String,
    state: RwLock<CharacterState>,
    api: Arc<dyn GameApi>,
    losses: RwLock<HashMap<String, u32>>,
    last_cooldown_seconds: RwLock<f64>,
}

impl CharacterContext {
    pub fn new(state: CharacterState, api: Arc<dyn GameApi>) -> Self {
        Self {
            name: state.name.clone(),
            state: RwLock::new(state),
            api,
            losses: RwLock::new(HashMap::new()),
            last_cooldown_seconds: RwLock::new(0.0),
        }
    }

    pub fn api(&self) -> &Arc<dyn GameApi> {
        &self.api
    }

    pub async fn snapshot(&self) -> CharacterState {
        self.state.read().await.clone()
    }

    pub async fn refresh(&self) -> Result<(), crate::error::GameApiError> {
        let fresh = self.api.refresh_character(&self.name).await?;
        *self.state.write().await = fresh;
        Ok(())
    }

    /// Folds an API response into local state. Called after every
    /// action so the next scheduling decision sees up-to-date state
    /// without an extra round trip (spec §2 data flow).
    pub async fn apply_action_result(&self, result: &ActionResult) {
        *self.state.write().await = result.character.clone();
        *self.last_cooldown_seconds.write().await = result.cooldown_seconds;
    }

    /// Cooldown recorded by the most recent action, consumed by the
    /// scheduler between dispatches (spec §4.1 step 4: "wait for any
    /// cooldown the action recorded, then restart the tick").
    pub async fn take_last_cooldown_seconds(&self) -> f64 {
        let mut slot = self.last_cooldown_seconds.write().await;
        let value = *slot;
        *slot = 0.0;
        value
    }

    pub async fn record_loss(&self, monster_code: &str) {
        *self
            .losses
            .write()
            .await
            .entry(monster_code.to_string())
            .or_insert(0) += 1;
    }

    pub async fn consecutive_losses(&self, monster_code: &str) -> u32 {
        self.losses
            .read()
            .await
            .get(monster_code)
            .copied()
            .unwrap_or(0)
    }

    pub async fn clear_losses(&self, monster_code: &str) {
        self.losses.write().await.remove(monster_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn fixture() -> CharacterState {
        CharacterState {
            name: "alice".into(),
            level: 10,
            hp: 50,
            max_hp: 100,
            gold: 0,
            position: Position { x: 0, y: 0 },
            skills: Map::new(),
            equipment: Map::new(),
            utilities: Map::new(),
            inventory: vec![ItemStack {
                code: "copper_ore".into(),
                quantity: 3,
            }],
            inventory_capacity: 10,
            task: None,
        }
    }

    #[test]
    fn hp_percent_and_item_count() {
        let c = fixture();
        assert_eq!(c.hp_percent(), 50.0);
        assert_eq!(c.item_count("copper_ore"), 3);
        assert_eq!(c.item_count("missing"), 0);
    }

    #[test]
    fn inventory_full_compares_against_capacity() {
        let mut c = fixture();
        assert!(!c.inventory_full());
        c.inventory.push(ItemStack {
            code: "x".into(),
            quantity: 7,
        });
        assert!(c.inventory_full());
    }
}
