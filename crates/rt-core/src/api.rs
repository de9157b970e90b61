use crate::character::{CharacterState, Position};
use crate::error::GameApiError;
use crate::model::Slot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of a single REST action against the remote game server: the
/// character's fields as they stand after the action, plus the cooldown
/// the caller must wait out before issuing the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub character: CharacterState,
    pub cooldown_seconds: f64,
}

/// The out-of-scope REST API client (spec §1): HTTP transport, auth,
/// cooldown waits, and pagination are all someone else's problem. This
/// trait is the boundary the core dispatches through; every method is a
/// suspension point (spec §5).
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn refresh_character(&self, name: &str) -> Result<CharacterState, GameApiError>;
    async fn move_to(&self, name: &str, pos: Position) -> Result<ActionResult, GameApiError>;
    async fn fight(&self, name: &str) -> Result<ActionResult, GameApiError>;
    async fn gather(&self, name: &str) -> Result<ActionResult, GameApiError>;
    async fn craft(&self, name: &str, item_code: &str, quantity: u32)
        -> Result<ActionResult, GameApiError>;
    async fn equip(
        &self,
        name: &str,
        item_code: &str,
        slot: Slot,
        quantity: u32,
    ) -> Result<ActionResult, GameApiError>;
    async fn unequip(&self, name: &str, slot: Slot) -> Result<ActionResult, GameApiError>;
    async fn withdraw_bank(
        &self,
        name: &str,
        item_code: &str,
        quantity: u32,
    ) -> Result<ActionResult, GameApiError>;
    async fn deposit_bank(
        &self,
        name: &str,
        item_code: &str,
        quantity: u32,
    ) -> Result<ActionResult, GameApiError>;
    async fn withdraw_gold(&self, name: &str, amount: u64) -> Result<ActionResult, GameApiError>;
    async fn deposit_gold(&self, name: &str, amount: u64) -> Result<ActionResult, GameApiError>;
    async fn npc_buy(
        &self,
        name: &str,
        npc_code: &str,
        item_code: &str,
        quantity: u32,
    ) -> Result<ActionResult, GameApiError>;
    async fn accept_task(&self, name: &str) -> Result<ActionResult, GameApiError>;
    async fn complete_task(&self, name: &str) -> Result<ActionResult, GameApiError>;
    async fn cancel_task(&self, name: &str) -> Result<ActionResult, GameApiError>;
    async fn task_trade(
        &self,
        name: &str,
        item_code: &str,
        quantity: u32,
    ) -> Result<ActionResult, GameApiError>;
    async fn task_exchange(&self, name: &str) -> Result<ActionResult, GameApiError>;
    async fn buy_bank_expansion(&self, name: &str) -> Result<ActionResult, GameApiError>;
    async fn get_bank_details(&self) -> Result<BankDetails, GameApiError>;
    async fn get_bank_items(&self) -> Result<Vec<crate::model::ItemStack>, GameApiError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDetails {
    pub gold: u64,
    pub slots: u32,
    pub next_expansion_cost: u64,
}
