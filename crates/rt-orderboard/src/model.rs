//! Order board data model (spec §3 "Order").

use rt_core::{OrderSource, Skill};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Claimed,
    Fulfilled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub char_name: String,
    pub claimed_at_ms: i64,
    pub lease_ms: i64,
    pub expires_at_ms: i64,
}

impl Claim {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub merge_key: String,
    pub item_code: String,
    pub source_type: OrderSource,
    pub source_code: String,
    pub gather_skill: Option<Skill>,
    pub craft_skill: Option<Skill>,
    pub source_level: u32,
    pub requested_qty: u32,
    pub remaining_qty: u32,
    pub status: OrderStatus,
    pub requesters: HashSet<String>,
    pub recipes: HashSet<String>,
    /// Keyed by `"requester::recipe"` (spec §4.2 `createOrMergeOrder`).
    pub contributions: HashMap<String, u32>,
    pub claim: Option<Claim>,
    pub blocked_by_char: HashMap<String, i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub fulfilled_at_ms: Option<i64>,
}

impl Order {
    pub fn contribution_key(requester: &str, recipe: &str) -> String {
        format!("{requester}::{recipe}")
    }

    pub fn merge_key_for(source_type: OrderSource, source_code: &str, item_code: &str) -> String {
        format!("{source_type}:{source_code}:{item_code}")
    }

    /// Drops expired entries from `blockedByChar` (spec §4.2 "Blocks
    /// eviction": performed whenever an order is inspected).
    pub fn evict_expired_blocks(&mut self, now_ms: i64) {
        self.blocked_by_char.retain(|_, expires| *expires > now_ms);
    }

    pub fn is_blocked_for(&self, char_name: &str, now_ms: i64) -> bool {
        self.blocked_by_char
            .get(char_name)
            .map(|expires| *expires > now_ms)
            .unwrap_or(false)
    }

    pub fn is_claimable_by(&self, char_name: &str, now_ms: i64) -> bool {
        if self.status == OrderStatus::Fulfilled {
            return false;
        }
        if self.is_blocked_for(char_name, now_ms) {
            return false;
        }
        match &self.claim {
            None => true,
            Some(claim) => claim.is_expired(now_ms) || claim.char_name == char_name,
        }
    }

    pub fn recompute_status(&mut self, now_ms: i64) {
        if self.remaining_qty == 0 {
            if self.status != OrderStatus::Fulfilled {
                self.fulfilled_at_ms = Some(now_ms);
            }
            self.status = OrderStatus::Fulfilled;
            return;
        }
        self.status = match &self.claim {
            Some(claim) if !claim.is_expired(now_ms) => OrderStatus::Claimed,
            _ => OrderStatus::Open,
        };
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub source_type: OrderSource,
    pub source_code: String,
    pub item_code: String,
    pub requester_name: String,
    pub recipe: String,
    pub quantity: u32,
    pub gather_skill: Option<Skill>,
    pub craft_skill: Option<Skill>,
    pub source_level: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter<'a> {
    pub source_type: Option<OrderSource>,
    pub gather_skill: Option<Skill>,
    pub craft_skill: Option<Skill>,
    pub char_name: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRow {
    pub order_id: String,
    pub item_code: String,
    pub quantity: u32,
    pub opportunistic: bool,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBoardSnapshot {
    pub updated_at_ms: i64,
    pub orders: Vec<Order>,
}
