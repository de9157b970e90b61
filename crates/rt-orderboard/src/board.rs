//! `OrderBoard`: the in-memory map plus the debounced persistence and
//! synchronous listener fanout wrapped around it (spec §4.2).

use crate::error::OrderBoardError;
use crate::model::{
    Claim, CreateOrderRequest, DepositRow, ListFilter, Order, OrderBoardSnapshot, OrderStatus,
};
use rt_core::persist::{atomic_write_json, load_json, Debouncer};
use rt_core::{Clock, ItemStack};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const DEFAULT_LEASE_MS: i64 = 120_000;
pub const DEFAULT_BLOCKED_RETRY_MS: i64 = 600_000;
const MIN_LEASE_MS: i64 = 1_000;
const MIN_BLOCKED_RETRY_MS: i64 = 1_000;
const PERSIST_DEBOUNCE: Duration = Duration::from_millis(250);

/// Event fanout payload (spec §4.2 `subscribeOrderBoardEvents`). Carries
/// a deep copy so listeners can't accidentally hold a reference into
/// the board's locked state.
#[derive(Debug, Clone)]
pub enum OrderBoardEvent {
    Created(Order),
    Claimed(Order),
    Released(Order),
    Blocked(Order),
    DepositsRecorded(Vec<DepositRow>),
    Cleared,
}

type Listener = Box<dyn Fn(&OrderBoardEvent) + Send + Sync>;

pub struct OrderBoard {
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<HashMap<String, Order>>>,
    debouncer: Debouncer,
    listeners: StdMutex<Vec<Listener>>,
    last_mutated_ms: Arc<AtomicI64>,
}

impl OrderBoard {
    /// Loads a prior snapshot if present, reopening any order whose
    /// claim has gone stale and pruning expired blocks (spec §4.2
    /// "Persistence").
    pub async fn load(path: PathBuf, clock: Arc<dyn Clock>) -> Result<Self, OrderBoardError> {
        let now = clock.now_ms();
        let mut orders = HashMap::new();
        if let Some(snapshot) = load_json::<OrderBoardSnapshot>(&path).await? {
            for mut order in snapshot.orders {
                if let Some(claim) = &order.claim {
                    if claim.is_expired(now) {
                        order.claim = None;
                    }
                }
                order.evict_expired_blocks(now);
                order.recompute_status(now);
                orders.insert(order.id.clone(), order);
            }
        }
        Ok(Self {
            clock,
            state: Arc::new(RwLock::new(orders)),
            debouncer: Debouncer::new(path, PERSIST_DEBOUNCE),
            listeners: StdMutex::new(Vec::new()),
            last_mutated_ms: Arc::new(AtomicI64::new(now)),
        })
    }

    pub fn subscribe(&self, listener: impl Fn(&OrderBoardEvent) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    fn notify(&self, event: OrderBoardEvent) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(&event);
        }
    }

    async fn schedule_persist(&self) {
        let state = Arc::clone(&self.state);
        let last_mutated = Arc::clone(&self.last_mutated_ms);
        let path = self.debouncer.path().to_path_buf();
        self.debouncer
            .schedule(move || async move {
                let guard = state.read().await;
                let mut orders: Vec<Order> = guard.values().cloned().collect();
                orders.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.id.cmp(&b.id)));
                let snapshot = OrderBoardSnapshot {
                    updated_at_ms: last_mutated.load(Ordering::Relaxed),
                    orders,
                };
                let _ = atomic_write_json(&path, &snapshot).await;
            })
            .await;
    }

    fn touch(&self, now: i64) {
        self.last_mutated_ms.store(now, Ordering::Relaxed);
    }

    pub async fn create_or_merge_order(
        &self,
        req: CreateOrderRequest,
    ) -> Result<Order, OrderBoardError> {
        if req.quantity == 0 {
            return Err(OrderBoardError::InvalidRequest("quantity must be > 0".into()));
        }
        let now = self.clock.now_ms();
        let merge_key = Order::merge_key_for(req.source_type, &req.source_code, &req.item_code);
        let contribution_key = Order::contribution_key(&req.requester_name, &req.recipe);

        let mut state = self.state.write().await;
        let existing_id = state
            .values()
            .find(|o| o.merge_key == merge_key && o.status != OrderStatus::Fulfilled)
            .map(|o| o.id.clone());

        let order = if let Some(id) = existing_id {
            let order = state.get_mut(&id).unwrap();
            let prev = order.contributions.get(&contribution_key).copied().unwrap_or(0);
            if prev == 0 {
                order.requested_qty += req.quantity;
                order.remaining_qty += req.quantity;
                order.contributions.insert(contribution_key, req.quantity);
            } else if req.quantity > prev {
                let delta = req.quantity - prev;
                order.requested_qty += delta;
                order.remaining_qty += delta;
                order.contributions.insert(contribution_key, req.quantity);
            }
            order.requesters.insert(req.requester_name.clone());
            order.recipes.insert(req.recipe.clone());
            order.updated_at_ms = now;
            order.recompute_status(now);
            order.clone()
        } else {
            let order = Order {
                id: Uuid::now_v7().to_string(),
                merge_key,
                item_code: req.item_code.clone(),
                source_type: req.source_type,
                source_code: req.source_code.clone(),
                gather_skill: req.gather_skill,
                craft_skill: req.craft_skill,
                source_level: req.source_level,
                requested_qty: req.quantity,
                remaining_qty: req.quantity,
                status: OrderStatus::Open,
                requesters: [req.requester_name.clone()].into_iter().collect(),
                recipes: [req.recipe.clone()].into_iter().collect(),
                contributions: [(contribution_key, req.quantity)].into_iter().collect(),
                claim: None,
                blocked_by_char: HashMap::new(),
                created_at_ms: now,
                updated_at_ms: now,
                fulfilled_at_ms: None,
            };
            state.insert(order.id.clone(), order.clone());
            order
        };
        drop(state);
        self.touch(now);
        self.schedule_persist().await;
        self.notify(OrderBoardEvent::Created(order.clone()));
        Ok(order)
    }

    pub async fn list_claimable_orders(&self, filter: ListFilter<'_>) -> Vec<Order> {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;
        let mut out = Vec::new();
        for order in state.values_mut() {
            order.evict_expired_blocks(now);
            order.recompute_status(now);
            if order.status != OrderStatus::Open {
                continue;
            }
            if order.is_blocked_for(filter.char_name, now) {
                continue;
            }
            if let Some(source_type) = filter.source_type {
                if order.source_type != source_type {
                    continue;
                }
            }
            if let Some(gather_skill) = filter.gather_skill {
                if order.gather_skill != Some(gather_skill) {
                    continue;
                }
            }
            if let Some(craft_skill) = filter.craft_skill {
                if order.craft_skill != Some(craft_skill) {
                    continue;
                }
            }
            out.push(order.clone());
        }
        out.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub async fn claim_order(&self, id: &str, char_name: &str, lease_ms: i64) -> Option<Order> {
        let now = self.clock.now_ms();
        let lease_ms = lease_ms.max(MIN_LEASE_MS);
        let order = {
            let mut state = self.state.write().await;
            let order = state.get_mut(id)?;
            order.evict_expired_blocks(now);
            order.recompute_status(now);
            if !order.is_claimable_by(char_name, now) {
                return None;
            }
            let claimed_at_ms = match &order.claim {
                Some(c) if c.char_name == char_name => c.claimed_at_ms,
                _ => now,
            };
            order.claim = Some(Claim {
                char_name: char_name.to_string(),
                claimed_at_ms,
                lease_ms,
                expires_at_ms: now + lease_ms,
            });
            order.updated_at_ms = now;
            order.recompute_status(now);
            order.clone()
        };
        self.touch(now);
        self.schedule_persist().await;
        self.notify(OrderBoardEvent::Claimed(order.clone()));
        Some(order)
    }

    pub async fn renew_claim(&self, id: &str, char_name: &str, lease_ms: i64) -> Option<Order> {
        let now = self.clock.now_ms();
        let lease_ms = lease_ms.max(MIN_LEASE_MS);
        let order = {
            let mut state = self.state.write().await;
            let order = state.get_mut(id)?;
            let owns_unexpired = matches!(&order.claim, Some(c) if c.char_name == char_name && !c.is_expired(now));
            if !owns_unexpired {
                return None;
            }
            if let Some(claim) = order.claim.as_mut() {
                claim.lease_ms = lease_ms;
                claim.expires_at_ms = now + lease_ms;
            }
            order.updated_at_ms = now;
            order.clone()
        };
        self.touch(now);
        self.schedule_persist().await;
        Some(order)
    }

    /// No-op (per spec invariant) when `char_name` is set but doesn't
    /// own the current claim.
    pub async fn release_claim(&self, id: &str, char_name: Option<&str>) -> Option<Order> {
        let now = self.clock.now_ms();
        let (order, changed) = {
            let mut state = self.state.write().await;
            let order = state.get_mut(id)?;
            let should_clear = match (&order.claim, char_name) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(c), Some(name)) => c.char_name == name,
            };
            if should_clear {
                order.claim = None;
                order.updated_at_ms = now;
                order.recompute_status(now);
            }
            (order.clone(), should_clear)
        };
        if changed {
            self.touch(now);
            self.schedule_persist().await;
            self.notify(OrderBoardEvent::Released(order.clone()));
        }
        Some(order)
    }

    pub async fn mark_char_blocked(
        &self,
        id: &str,
        char_name: &str,
        blocked_retry_ms: i64,
    ) -> Option<Order> {
        let now = self.clock.now_ms();
        let blocked_retry_ms = blocked_retry_ms.max(MIN_BLOCKED_RETRY_MS);
        let order = {
            let mut state = self.state.write().await;
            let order = state.get_mut(id)?;
            order.blocked_by_char.insert(char_name.to_string(), now + blocked_retry_ms);
            if matches!(&order.claim, Some(c) if c.char_name == char_name) {
                order.claim = None;
            }
            order.updated_at_ms = now;
            order.recompute_status(now);
            order.clone()
        };
        self.touch(now);
        self.schedule_persist().await;
        self.notify(OrderBoardEvent::Blocked(order.clone()));
        Some(order)
    }

    /// Two passes per spec §4.2: the depositor's own claimed orders
    /// first (non-opportunistic), then everything else they still have
    /// stock to cover (opportunistic).
    pub async fn record_deposits(&self, char_name: &str, items: &[ItemStack]) -> Vec<DepositRow> {
        let now = self.clock.now_ms();
        let mut available: HashMap<String, u32> =
            items.iter().map(|s| (s.code.clone(), s.quantity)).collect();
        let mut rows = Vec::new();

        let mut state = self.state.write().await;
        let mut ids: Vec<String> = state.values().map(|o| o.id.clone()).collect();
        ids.sort_by(|a, b| {
            let oa = &state[a];
            let ob = &state[b];
            oa.created_at_ms.cmp(&ob.created_at_ms).then_with(|| oa.id.cmp(&ob.id))
        });

        for opportunistic_pass in [false, true] {
            for id in &ids {
                let order = state.get_mut(id).unwrap();
                if order.remaining_qty == 0 {
                    continue;
                }
                let is_claimer =
                    matches!(&order.claim, Some(c) if c.char_name == char_name);
                if is_claimer == opportunistic_pass {
                    continue;
                }
                let Some(stock) = available.get_mut(&order.item_code) else {
                    continue;
                };
                let applied = (*stock).min(order.remaining_qty);
                if applied == 0 {
                    continue;
                }
                order.remaining_qty -= applied;
                *stock -= applied;
                order.updated_at_ms = now;
                order.recompute_status(now);
                rows.push(DepositRow {
                    order_id: order.id.clone(),
                    item_code: order.item_code.clone(),
                    quantity: applied,
                    opportunistic: opportunistic_pass,
                    status: order.status,
                });
            }
        }
        drop(state);
        self.touch(now);
        self.schedule_persist().await;
        self.notify(OrderBoardEvent::DepositsRecorded(rows.clone()));
        rows
    }

    pub async fn get_order_board_snapshot(&self) -> OrderBoardSnapshot {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state.values().cloned().collect();
        orders.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.id.cmp(&b.id)));
        OrderBoardSnapshot {
            updated_at_ms: self.last_mutated_ms.load(Ordering::Relaxed),
            orders,
        }
    }

    pub async fn clear_order_board(&self, reason: &str) {
        log::info!("clearing order board: {reason}");
        self.state.write().await.clear();
        self.touch(self.clock.now_ms());
        self.schedule_persist().await;
        self.notify(OrderBoardEvent::Cleared);
    }

    pub async fn release_claims_for_chars(&self, names: &[String], reason: &str) {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;
        for order in state.values_mut() {
            if let Some(claim) = &order.claim {
                if names.iter().any(|n| n == &claim.char_name) {
                    log::debug!("releasing claim on {} for shutdown: {reason}", order.id);
                    order.claim = None;
                    order.updated_at_ms = now;
                    order.recompute_status(now);
                }
            }
        }
        drop(state);
        self.touch(now);
        self.schedule_persist().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_core::{FakeClock, OrderSource};

    fn req(requester: &str, recipe: &str, quantity: u32) -> CreateOrderRequest {
        CreateOrderRequest {
            source_type: OrderSource::Gather,
            source_code: "copper_rocks".into(),
            item_code: "copper_ore".into(),
            requester_name: requester.into(),
            recipe: recipe.into(),
            quantity,
            gather_skill: None,
            craft_skill: None,
            source_level: 1,
        }
    }

    async fn board() -> OrderBoard {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.into_path().join("orders.json");
        OrderBoard::load(path, Arc::new(FakeClock::new(0))).await.unwrap()
    }

    #[tokio::test]
    async fn create_or_merge_is_idempotent_on_same_contribution() {
        let b = board().await;
        let o1 = b.create_or_merge_order(req("A", "bronze_sword", 3)).await.unwrap();
        let o2 = b.create_or_merge_order(req("A", "bronze_sword", 3)).await.unwrap();
        assert_eq!(o1.id, o2.id);
        assert_eq!(o2.requested_qty, 3);
        assert_eq!(o2.remaining_qty, 3);
    }

    #[tokio::test]
    async fn merge_and_opportunistic_deposit_matches_spec_example() {
        let b = board().await;
        b.create_or_merge_order(req("A", "bronze_sword", 3)).await.unwrap();
        let order = b.create_or_merge_order(req("B", "bronze_helmet", 2)).await.unwrap();
        assert_eq!(order.requested_qty, 5);

        b.claim_order(&order.id, "WorkerA", 2000).await.unwrap();

        let rows = b
            .record_deposits("WorkerB", &[ItemStack { code: "copper_ore".into(), quantity: 2 }])
            .await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].opportunistic);
        assert_eq!(rows[0].quantity, 2);

        let rows = b
            .record_deposits("WorkerA", &[ItemStack { code: "copper_ore".into(), quantity: 2 }])
            .await;
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].opportunistic);

        let snapshot = b.get_order_board_snapshot().await;
        assert_eq!(snapshot.orders[0].remaining_qty, 1);
    }

    #[tokio::test]
    async fn claim_lifecycle_and_block() {
        let b = board().await;
        let order = b.create_or_merge_order(req("A", "r", 99)).await.unwrap();
        b.claim_order(&order.id, "WorkerA", 2000).await.unwrap();

        let after_block = b.mark_char_blocked(&order.id, "WorkerA", 2000).await.unwrap();
        assert!(after_block.claim.is_none());
        assert_eq!(after_block.status, OrderStatus::Open);

        let claimable_a = b
            .list_claimable_orders(ListFilter { char_name: "WorkerA", ..Default::default() })
            .await;
        assert!(claimable_a.is_empty());
        let claimable_b = b
            .list_claimable_orders(ListFilter { char_name: "WorkerB", ..Default::default() })
            .await;
        assert_eq!(claimable_b.len(), 1);

        b.claim_order(&order.id, "WorkerB", 2000).await.unwrap();
        let rows = b
            .record_deposits("WorkerB", &[ItemStack { code: "copper_ore".into(), quantity: 99 }])
            .await;
        assert_eq!(rows[0].status, OrderStatus::Fulfilled);
    }

    #[tokio::test]
    async fn release_claim_by_wrong_char_is_a_no_op() {
        let b = board().await;
        let order = b.create_or_merge_order(req("A", "r", 5)).await.unwrap();
        b.claim_order(&order.id, "WorkerA", 2000).await.unwrap();
        let after = b.release_claim(&order.id, Some("WorkerB")).await.unwrap();
        assert!(after.claim.is_some());
        assert_eq!(after.claim.unwrap().char_name, "WorkerA");
    }

    #[tokio::test]
    async fn reloading_reopens_stale_claims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.into_path().join("orders.json");
        let clock = Arc::new(FakeClock::new(0));
        let b = OrderBoard::load(path.clone(), clock.clone()).await.unwrap();
        let order = b.create_or_merge_order(req("A", "r", 5)).await.unwrap();
        b.claim_order(&order.id, "WorkerA", 1_000).await.unwrap();
        b.schedule_persist().await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        clock.advance(10_000);
        let reloaded = OrderBoard::load(path, clock).await.unwrap();
        let snapshot = reloaded.get_order_board_snapshot().await;
        assert!(snapshot.orders[0].claim.is_none());
        assert_eq!(snapshot.orders[0].status, OrderStatus::Open);
    }
}
