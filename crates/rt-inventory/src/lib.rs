//! Account-wide bank state: a revisioned snapshot plus per-character
//! reservations (spec §3 "Inventory / bank model"), and the batched
//! withdraw/deposit operations that sit on top of it (spec §2
//! dependency order, item 3; §8 "Bank is mutable by withdraw/deposit").
//!
//! The bank itself is one account-wide resource shared by every
//! character's routine; the reservation layer exists so two characters
//! planning concurrently don't both promise themselves the same last
//! few ore.

pub mod bank_ops;

use rt_core::ItemStack;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// `{gold, items, reservations, revision}` (spec §3). Cloned out of the
/// manager for callers that need a consistent read; the live copy stays
/// behind the lock.
#[derive(Debug, Clone, Default)]
pub struct BankSnapshot {
    pub gold: u64,
    pub items: HashMap<String, u32>,
    pub reservations: HashMap<String, HashMap<String, u32>>,
    pub revision: u64,
}

impl BankSnapshot {
    pub fn reserved_total(&self, item_code: &str) -> u32 {
        self.reservations
            .values()
            .filter_map(|by_item| by_item.get(item_code))
            .sum()
    }

    /// Stock not already pinned by some character's reservation.
    pub fn available(&self, item_code: &str) -> u32 {
        let have = self.items.get(item_code).copied().unwrap_or(0);
        have.saturating_sub(self.reserved_total(item_code))
    }
}

#[derive(Debug, Error)]
pub enum ReserveError {
    #[error("insufficient stock of {item_code}: requested {requested}, available {available}")]
    InsufficientStock {
        item_code: String,
        requested: u32,
        available: u32,
    },
}

/// Account-wide bank cache. One instance shared across every
/// character's scheduler (spec §4 "singletons"); guarded the way the
/// teacher guards its shared hosting registries.
pub struct InventoryManager {
    state: RwLock<BankSnapshot>,
}

impl Default for InventoryManager {
    fn default() -> Self {
        Self {
            state: RwLock::new(BankSnapshot::default()),
        }
    }
}

impl InventoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> BankSnapshot {
        self.state.read().await.clone()
    }

    /// Replaces the cached items/gold from a fresh read of the real
    /// bank, bumps the revision, and drops every reservation: they were
    /// promises against the *old* snapshot and must be re-derived
    /// against the new one.
    pub async fn replace(&self, gold: u64, items: Vec<ItemStack>) {
        let mut state = self.state.write().await;
        state.gold = gold;
        state.items = items.into_iter().map(|s| (s.code, s.quantity)).collect();
        state.reservations.clear();
        state.revision += 1;
    }

    pub async fn reserve(
        &self,
        char_name: &str,
        item_code: &str,
        quantity: u32,
    ) -> Result<(), ReserveError> {
        if quantity == 0 {
            return Ok(());
        }
        let mut state = self.state.write().await;
        let available = state.available(item_code);
        if available < quantity {
            return Err(ReserveError::InsufficientStock {
                item_code: item_code.to_string(),
                requested: quantity,
                available,
            });
        }
        *state
            .reservations
            .entry(char_name.to_string())
            .or_default()
            .entry(item_code.to_string())
            .or_insert(0) += quantity;
        Ok(())
    }

    pub async fn release(&self, char_name: &str, item_code: &str, quantity: u32) {
        let mut state = self.state.write().await;
        if let Some(by_item) = state.reservations.get_mut(char_name) {
            if let Some(held) = by_item.get_mut(item_code) {
                *held = held.saturating_sub(quantity);
                if *held == 0 {
                    by_item.remove(item_code);
                }
            }
            if by_item.is_empty() {
                state.reservations.remove(char_name);
            }
        }
    }

    pub async fn release_all_for(&self, char_name: &str) {
        self.state.write().await.reservations.remove(char_name);
    }

    /// Applies a successful withdrawal: decrements stock and releases
    /// the matching reservation. Does not touch `revision` since this
    /// reflects a withdrawal this process itself performed, not an
    /// external change.
    pub async fn apply_withdrawal(&self, char_name: &str, item_code: &str, quantity: u32) {
        {
            let mut state = self.state.write().await;
            if let Some(qty) = state.items.get_mut(item_code) {
                *qty = qty.saturating_sub(quantity);
            }
        }
        self.release(char_name, item_code, quantity).await;
    }

    pub async fn apply_deposit(&self, item_code: &str, quantity: u32) {
        let mut state = self.state.write().await;
        *state.items.entry(item_code.to_string()).or_insert(0) += quantity;
    }

    pub async fn apply_gold_withdrawal(&self, amount: u64) {
        let mut state = self.state.write().await;
        state.gold = state.gold.saturating_sub(amount);
    }

    pub async fn apply_gold_deposit(&self, amount: u64) {
        self.state.write().await.gold += amount;
    }
}
