//! Task-coin exchange procedure (spec §4.6): spend `tasks_coin` at the
//! task master for a chance at specific target items, banking whatever
//! matches and retrying until the targets are met or something blocks
//! progress. Guarded by a non-blocking lock so two characters never pile
//! onto the same exchange slot at once.

use rt_core::{CharacterContext, GameApiError, ItemStack};
use rt_inventory::{bank_ops, InventoryManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

const REQUIRED_COINS: u32 = 6;
const REQUIRED_FREE_SLOTS: u32 = 2;
const MAX_ATTEMPTS: u32 = 20;
const PROACTIVE_BACKOFF_MS: i64 = 60_000;

/// Non-blocking lock around the exchange counter. `try_acquire` never
/// waits: a busy lock is reported back to the caller as a result, not
/// as something worth awaiting on.
pub struct TaskExchangeLock(AtomicBool);

impl Default for TaskExchangeLock {
    fn default() -> Self {
        Self(AtomicBool::new(false))
    }
}

impl TaskExchangeLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskCoinOutcome {
    /// The bank already holds every target quantity; nothing to do.
    AlreadyMet,
    /// Another character is mid-exchange.
    LockBusy,
    /// Ran one or more exchanges and hit the targets.
    Completed { exchanges: u32 },
    /// Gave up: the reason names what's missing (`insufficient_coins`,
    /// `insufficient_inventory_slots`, or `attempt_limit_reached`).
    Blocked(String),
}

fn targets_met(bank_items: &HashMap<String, u32>, targets: &HashMap<String, u32>) -> bool {
    targets
        .iter()
        .all(|(code, qty)| bank_items.get(code).copied().unwrap_or(0) >= *qty)
}

/// Runs the exchange loop for one character until `targets` are met in
/// the bank or the procedure can't make further progress.
pub async fn run_task_coin_exchange(
    ctx: &CharacterContext,
    mgr: &InventoryManager,
    lock: &TaskExchangeLock,
    targets: &HashMap<String, u32>,
) -> Result<TaskCoinOutcome, GameApiError> {
    if targets_met(&mgr.snapshot().await.items, targets) {
        return Ok(TaskCoinOutcome::AlreadyMet);
    }
    if !lock.try_acquire() {
        return Ok(TaskCoinOutcome::LockBusy);
    }

    let outcome = run_locked(ctx, mgr, targets).await;
    lock.release();
    outcome
}

async fn run_locked(
    ctx: &CharacterContext,
    mgr: &InventoryManager,
    targets: &HashMap<String, u32>,
) -> Result<TaskCoinOutcome, GameApiError> {
    let api = ctx.api().clone();
    let mut exchanges = 0u32;

    for _ in 0..MAX_ATTEMPTS {
        if targets_met(&mgr.snapshot().await.items, targets) {
            return Ok(TaskCoinOutcome::Completed { exchanges });
        }

        let character = ctx.snapshot().await;
        let held_coins = character.item_count("tasks_coin");
        if held_coins < REQUIRED_COINS {
            let need = REQUIRED_COINS - held_coins;
            let withdrawn = bank_ops::withdraw_batch(
                mgr,
                api.as_ref(),
                &ctx.name,
                &ctx.name,
                &[ItemStack {
                    code: "tasks_coin".into(),
                    quantity: need,
                }],
            )
            .await
            .map_err(unwrap_game_api_error)?;
            let got: u32 = withdrawn.iter().map(|s| s.quantity).sum();
            if held_coins + got < REQUIRED_COINS {
                return Ok(TaskCoinOutcome::Blocked("insufficient_coins".into()));
            }
        }

        let character = ctx.snapshot().await;
        let free_slots = character.inventory_capacity.saturating_sub(character.inventory_count());
        if free_slots < REQUIRED_FREE_SLOTS {
            return Ok(TaskCoinOutcome::Blocked("insufficient_inventory_slots".into()));
        }

        let before = ctx.snapshot().await.inventory;
        let result = api.task_exchange(&ctx.name).await?;
        ctx.apply_action_result(&result).await;
        exchanges += 1;

        let gained = diff_gains(&before, &result.character.inventory);
        let to_deposit: Vec<ItemStack> = gained
            .into_iter()
            .filter(|s| targets.contains_key(&s.code))
            .collect();
        if !to_deposit.is_empty() {
            bank_ops::deposit_batch(mgr, api.as_ref(), &ctx.name, &to_deposit)
                .await
                .map_err(unwrap_game_api_error)?;
        } else {
            bank_ops::refresh(mgr, api.as_ref()).await.map_err(unwrap_game_api_error)?;
        }
    }

    Ok(TaskCoinOutcome::Blocked("attempt_limit_reached".into()))
}

fn unwrap_game_api_error(e: rt_inventory::bank_ops::BankOpsError) -> GameApiError {
    match e {
        rt_inventory::bank_ops::BankOpsError::GameApi(inner) => inner,
    }
}

fn diff_gains(before: &[ItemStack], after: &[ItemStack]) -> Vec<ItemStack> {
    after
        .iter()
        .filter_map(|post| {
            let prior = before.iter().find(|s| s.code == post.code).map(|s| s.quantity).unwrap_or(0);
            if post.quantity > prior {
                Some(ItemStack {
                    code: post.code.clone(),
                    quantity: post.quantity - prior,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Backoff gate for proactive (not task-driven) exchange attempts: once
/// triggered, the next attempt isn't eligible for another 60 seconds.
pub struct ProactiveExchangeGate {
    clock: Arc<dyn rt_core::Clock>,
    next_eligible_ms: RwLock<i64>,
}

impl ProactiveExchangeGate {
    pub fn new(clock: Arc<dyn rt_core::Clock>) -> Self {
        Self {
            clock,
            next_eligible_ms: RwLock::new(0),
        }
    }

    pub async fn is_eligible(&self) -> bool {
        self.clock.now_ms() >= *self.next_eligible_ms.read().await
    }

    pub async fn mark_attempted(&self) {
        *self.next_eligible_ms.write().await = self.clock.now_ms() + PROACTIVE_BACKOFF_MS;
    }
}
