//! Batched withdraw/deposit on top of `InventoryManager`: reserve
//! against the cached snapshot, fail fast on mismatch, force-refresh
//! from the real bank once, and fall back to per-item partial
//! withdrawal if the refreshed snapshot still can't cover everything
//! (spec §8 "reserves intended withdraws against the last snapshot,
//! fails-fast on mismatch, force-refreshes, and optionally falls back
//! per-item").

use crate::{InventoryManager, ReserveError};
use rt_core::{GameApiError, ItemStack};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BankOpsError {
    #[error(transparent)]
    GameApi(#[from] GameApiError),
}

/// Re-reads the real bank and replaces the cached snapshot.
pub async fn refresh(mgr: &InventoryManager, api: &dyn rt_core::GameApi) -> Result<(), BankOpsError> {
    let details = api.get_bank_details().await?;
    let items = api.get_bank_items().await?;
    mgr.replace(details.gold, items).await;
    Ok(())
}

async fn reserve_all(
    mgr: &InventoryManager,
    char_name: &str,
    requests: &[ItemStack],
) -> Result<(), ReserveError> {
    let mut reserved = Vec::with_capacity(requests.len());
    for req in requests {
        match mgr.reserve(char_name, &req.code, req.quantity).await {
            Ok(()) => reserved.push(req),
            Err(e) => {
                for done in reserved {
                    mgr.release(char_name, &done.code, done.quantity).await;
                }
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Withdraws as much of `requests` as the bank actually has, preferring
/// to satisfy the whole batch. Returns what was actually withdrawn,
/// which may be a strict subset of what was asked for once the
/// per-item fallback kicks in.
pub async fn withdraw_batch(
    mgr: &InventoryManager,
    api: &dyn rt_core::GameApi,
    char_name: &str,
    character: &str,
    requests: &[ItemStack],
) -> Result<Vec<ItemStack>, BankOpsError> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    if reserve_all(mgr, char_name, requests).await.is_err() {
        refresh(mgr, api).await?;
        if reserve_all(mgr, char_name, requests).await.is_err() {
            return withdraw_per_item(mgr, api, char_name, character, requests).await;
        }
    }

    let mut withdrawn = Vec::with_capacity(requests.len());
    for req in requests {
        api.withdraw_bank(character, &req.code, req.quantity).await?;
        mgr.apply_withdrawal(char_name, &req.code, req.quantity).await;
        withdrawn.push(req.clone());
    }
    Ok(withdrawn)
}

/// Per-item fallback: after a refresh still can't cover the whole
/// batch, take whatever each item can individually support rather than
/// failing the entire request.
async fn withdraw_per_item(
    mgr: &InventoryManager,
    api: &dyn rt_core::GameApi,
    char_name: &str,
    character: &str,
    requests: &[ItemStack],
) -> Result<Vec<ItemStack>, BankOpsError> {
    let mut withdrawn = Vec::new();
    for req in requests {
        let available = mgr.snapshot().await.available(&req.code);
        let quantity = available.min(req.quantity);
        if quantity == 0 {
            continue;
        }
        if mgr.reserve(char_name, &req.code, quantity).await.is_err() {
            continue;
        }
        api.withdraw_bank(character, &req.code, quantity).await?;
        mgr.apply_withdrawal(char_name, &req.code, quantity).await;
        withdrawn.push(ItemStack {
            code: req.code.clone(),
            quantity,
        });
    }
    Ok(withdrawn)
}

/// Deposits are never reservation-gated: a character always has the
/// items it's about to deposit.
pub async fn deposit_batch(
    mgr: &InventoryManager,
    api: &dyn rt_core::GameApi,
    character: &str,
    items: &[ItemStack],
) -> Result<(), BankOpsError> {
    for item in items {
        if item.quantity == 0 {
            continue;
        }
        api.deposit_bank(character, &item.code, item.quantity).await?;
        mgr.apply_deposit(&item.code, item.quantity).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rt_core::{ActionResult, BankDetails, CharacterState, Position, Slot};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeApi {
        bank_items: Mutex<Vec<ItemStack>>,
        bank_gold: Mutex<u64>,
    }

    fn char_state() -> CharacterState {
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
            inventory_capacity: 100,
            task: None,
        }
    }

    #[async_trait]
    impl rt_core::GameApi for FakeApi {
        async fn refresh_character(&self, _n: &str) -> Result<CharacterState, GameApiError> {
            Ok(char_state())
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
        async fn craft(&self, _n: &str, _c: &str, _q: u32) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn equip(
            &self,
            _n: &str,
            _c: &str,
            _s: Slot,
            _q: u32,
        ) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn unequip(&self, _n: &str, _s: Slot) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn withdraw_bank(
            &self,
            _n: &str,
            code: &str,
            quantity: u32,
        ) -> Result<ActionResult, GameApiError> {
            let mut items = self.bank_items.lock().unwrap();
            if let Some(entry) = items.iter_mut().find(|s| s.code == code) {
                entry.quantity = entry.quantity.saturating_sub(quantity);
            }
            Ok(ActionResult {
                character: char_state(),
                cooldown_seconds: 0.0,
            })
        }
        async fn deposit_bank(
            &self,
            _n: &str,
            code: &str,
            quantity: u32,
        ) -> Result<ActionResult, GameApiError> {
            let mut items = self.bank_items.lock().unwrap();
            if let Some(entry) = items.iter_mut().find(|s| s.code == code) {
                entry.quantity += quantity;
            } else {
                items.push(ItemStack {
                    code: code.to_string(),
                    quantity,
                });
            }
            Ok(ActionResult {
                character: char_state(),
                cooldown_seconds: 0.0,
            })
        }
        async fn withdraw_gold(&self, _n: &str, _a: u64) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn deposit_gold(&self, _n: &str, _a: u64) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn npc_buy(
            &self,
            _n: &str,
            _npc: &str,
            _c: &str,
            _q: u32,
        ) -> Result<ActionResult, GameApiError> {
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
        async fn task_trade(
            &self,
            _n: &str,
            _c: &str,
            _q: u32,
        ) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn task_exchange(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn buy_bank_expansion(&self, _n: &str) -> Result<ActionResult, GameApiError> {
            unimplemented!()
        }
        async fn get_bank_details(&self) -> Result<BankDetails, GameApiError> {
            Ok(BankDetails {
                gold: *self.bank_gold.lock().unwrap(),
                slots: 100,
                next_expansion_cost: 0,
            })
        }
        async fn get_bank_items(&self) -> Result<Vec<ItemStack>, GameApiError> {
            Ok(self.bank_items.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn withdraws_whole_batch_when_snapshot_is_fresh() {
        let mgr = InventoryManager::new();
        mgr.replace(
            0,
            vec![ItemStack {
                code: "copper_ore".into(),
                quantity: 20,
            }],
        )
        .await;
        let api = FakeApi {
            bank_items: Mutex::new(vec![ItemStack {
                code: "copper_ore".into(),
                quantity: 20,
            }]),
            bank_gold: Mutex::new(0),
        };

        let got = withdraw_batch(
            &mgr,
            &api,
            "alice",
            "alice",
            &[ItemStack {
                code: "copper_ore".into(),
                quantity: 8,
            }],
        )
        .await
        .unwrap();
        assert_eq!(got[0].quantity, 8);
        assert_eq!(mgr.snapshot().await.items["copper_ore"], 12);
    }

    #[tokio::test]
    async fn stale_snapshot_triggers_refresh_then_partial_fallback() {
        let mgr = InventoryManager::new();
        // Cached snapshot is stale-low; the real bank actually has 5.
        mgr.replace(
            0,
            vec![ItemStack {
                code: "copper_ore".into(),
                quantity: 3,
            }],
        )
        .await;
        let api = FakeApi {
            bank_items: Mutex::new(vec![ItemStack {
                code: "copper_ore".into(),
                quantity: 5,
            }]),
            bank_gold: Mutex::new(0),
        };

        let got = withdraw_batch(
            &mgr,
            &api,
            "alice",
            "alice",
            &[ItemStack {
                code: "copper_ore".into(),
                quantity: 100,
            }],
        )
        .await
        .unwrap();
        // Initial reserve against the stale-low cache fails, a refresh
        // picks up the real 5, the batch still can't be fully covered so
        // the per-item fallback takes whatever is actually available.
        assert_eq!(got[0].quantity, 5);
        assert_eq!(mgr.snapshot().await.items["copper_ore"], 0);
    }

    #[tokio::test]
    async fn deposit_batch_updates_snapshot() {
        let mgr = InventoryManager::new();
        let api = FakeApi {
            bank_items: Mutex::new(vec![]),
            bank_gold: Mutex::new(0),
        };
        deposit_batch(
            &mgr,
            &api,
            "alice",
            &[ItemStack {
                code: "copper_ore".into(),
                quantity: 4,
            }],
        )
        .await
        .unwrap();
        assert_eq!(mgr.snapshot().await.items["copper_ore"], 4);
    }
}
