//! Shared test fixtures for the routine unit tests in this crate.

#![cfg(test)]

use async_trait::async_trait;
use rt_core::{ActionResult, BankDetails, CharacterState, GameApiError, ItemStack, Position, Slot};
use std::collections::HashMap;
use std::sync::Mutex;

/// A `GameApi` stub whose action methods all echo back a fixed
/// character state with zero cooldown; tests that need a method to do
/// something specific override behavior via the `on_*` closures.
pub struct StubApi {
    pub state: Mutex<CharacterState>,
}

impl StubApi {
    pub fn new(state: CharacterState) -> Self {
        Self { state: Mutex::new(state) }
    }

    fn result(&self) -> ActionResult {
        ActionResult {
            character: self.state.lock().unwrap().clone(),
            cooldown_seconds: 0.0,
        }
    }
}

#[async_trait]
impl rt_core::GameApi for StubApi {
    async fn refresh_character(&self, _name: &str) -> Result<CharacterState, GameApiError> {
        Ok(self.state.lock().unwrap().clone())
    }
    async fn move_to(&self, _name: &str, pos: Position) -> Result<ActionResult, GameApiError> {
        self.state.lock().unwrap().position = pos;
        Ok(self.result())
    }
    async fn fight(&self, _name: &str) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn gather(&self, _name: &str) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn craft(&self, _name: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn equip(&self, _name: &str, _item_code: &str, _slot: Slot, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn unequip(&self, _name: &str, _slot: Slot) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn withdraw_bank(&self, _name: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn deposit_bank(&self, _name: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn withdraw_gold(&self, _name: &str, _amount: u64) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn deposit_gold(&self, _name: &str, _amount: u64) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn npc_buy(&self, _name: &str, _npc_code: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn accept_task(&self, _name: &str) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn complete_task(&self, _name: &str) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn cancel_task(&self, _name: &str) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn task_trade(&self, _name: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn task_exchange(&self, _name: &str) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn buy_bank_expansion(&self, _name: &str) -> Result<ActionResult, GameApiError> {
        Ok(self.result())
    }
    async fn get_bank_details(&self) -> Result<BankDetails, GameApiError> {
        Ok(BankDetails {
            gold: 0,
            slots: 50,
            next_expansion_cost: 1000,
        })
    }
    async fn get_bank_items(&self) -> Result<Vec<ItemStack>, GameApiError> {
        Ok(vec![])
    }
}

pub fn fixture_state(name: &str) -> CharacterState {
    CharacterState {
        name: name.to_string(),
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
    }
}
