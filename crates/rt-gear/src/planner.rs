//! Account-wide gear-state planner (spec §4.3). Decides per character
//! which items they should own, which they still need craft orders
//! published for, and which must be protected from an opportunistic
//! deposit.

use crate::error::GearError;
use crate::optimizer::{GearOptimizer, OptimizeRecord, ToolCatalog};
use rt_catalog::Catalog;
use rt_core::persist::{atomic_write_json, load_json, Debouncer};
use rt_core::{Clock, ItemStack, OrderSource, Skill, Slot, CARRY_SLOT_PRIORITY};
use rt_orderboard::{CreateOrderRequest, OrderBoard};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const PERSIST_DEBOUNCE: Duration = Duration::from_millis(250);
const STATE_VERSION: u32 = 1;

/// What a character owns a first claim on, still needs, and is winnable
/// against, after one recompute pass.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CharacterGearState {
    pub required: HashMap<String, u32>,
    pub selected: HashMap<String, u32>,
    pub selected_monsters: Vec<String>,
    pub best_target: Option<String>,
    pub assigned: HashMap<String, u32>,
    pub desired: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedState {
    version: u32,
    updated_at_ms: i64,
    bank_revision_snapshot: u64,
    levels: HashMap<String, u32>,
    characters: HashMap<String, CharacterGearState>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at_ms: 0,
            bank_revision_snapshot: 0,
            levels: HashMap::new(),
            characters: HashMap::new(),
        }
    }
}

impl PersistedState {
    /// Backfills anything a partial/older file might be missing (spec
    /// §4.3 "normalize"); quantities are unsigned so there's nothing to
    /// clamp, unlike the spec's source language.
    fn normalize(self) -> Self {
        self
    }
}

/// Everything the planner needs to know about one live character to
/// recompute its gear state. Built by the caller from `CharacterContext`
/// snapshots; this crate has no direct dependency on `rt-core`'s
/// character module beyond the types it already re-exports.
#[derive(Debug, Clone)]
pub struct CharacterGearInput {
    pub name: String,
    pub level: u32,
    pub equipment: HashMap<Slot, String>,
    pub inventory: Vec<ItemStack>,
    pub inventory_capacity: u32,
    pub create_orders: bool,
}

/// Trims a loadout multiset down to `budget` slots, spending the budget
/// in `CARRY_SLOT_PRIORITY` order (spec §4.3 step 3); items the catalog
/// doesn't recognize as equipment (utility stacks) are trimmed last, in
/// a stable alphabetical order for determinism.
fn trim_to_budget(catalog: &Catalog, multiset: HashMap<String, u32>, budget: u32) -> (HashMap<String, u32>, u32) {
    let slot_rank = |code: &str| -> usize {
        catalog
            .item(code)
            .and_then(|i| i.equip_slot)
            .and_then(|slot| CARRY_SLOT_PRIORITY.iter().position(|s| *s == slot))
            .unwrap_or(CARRY_SLOT_PRIORITY.len())
    };
    let mut ordered: Vec<(String, u32)> = multiset.into_iter().collect();
    ordered.sort_by(|a, b| slot_rank(&a.0).cmp(&slot_rank(&b.0)).then(a.0.cmp(&b.0)));

    let mut remaining = budget;
    let mut out = HashMap::new();
    for (code, qty) in ordered {
        if remaining == 0 {
            break;
        }
        let take = qty.min(remaining);
        remaining -= take;
        out.insert(code, take);
    }
    (out, budget - remaining)
}

pub struct GearStatePlanner {
    clock: Arc<dyn Clock>,
    catalog: Arc<Catalog>,
    optimizer: Arc<dyn GearOptimizer>,
    tools: Arc<dyn ToolCatalog>,
    order_board: Arc<OrderBoard>,
    debouncer: Debouncer,
    state: RwLock<PersistedState>,
}

impl GearStatePlanner {
    pub async fn load(
        path: PathBuf,
        clock: Arc<dyn Clock>,
        catalog: Arc<Catalog>,
        optimizer: Arc<dyn GearOptimizer>,
        tools: Arc<dyn ToolCatalog>,
        order_board: Arc<OrderBoard>,
    ) -> Result<Self, GearError> {
        let loaded: Option<PersistedState> = load_json(&path).await?;
        let state = loaded.unwrap_or_default().normalize();
        Ok(Self {
            clock,
            catalog,
            optimizer,
            tools,
            order_board,
            debouncer: Debouncer::new(path, PERSIST_DEBOUNCE),
            state: RwLock::new(state),
        })
    }

    async fn schedule_persist(&self) {
        let snapshot = {
            let state = self.state.read().await;
            PersistedState {
                version: state.version,
                updated_at_ms: state.updated_at_ms,
                bank_revision_snapshot: state.bank_revision_snapshot,
                levels: state.levels.clone(),
                characters: state.characters.clone(),
            }
        };
        let path = self.debouncer.path().to_path_buf();
        self.debouncer
            .schedule(move || async move {
                if let Err(e) = atomic_write_json(&path, &snapshot).await {
                    log::warn!("gear state persist failed: {e}");
                }
            })
            .await;
    }

    /// Writes the current state to disk immediately, bypassing the
    /// debounce window (spec §4.8 "flush gear state to disk" on stop).
    pub async fn flush(&self) -> Result<(), GearError> {
        let snapshot = {
            let state = self.state.read().await;
            PersistedState {
                version: state.version,
                updated_at_ms: state.updated_at_ms,
                bank_revision_snapshot: state.bank_revision_snapshot,
                levels: state.levels.clone(),
                characters: state.characters.clone(),
            }
        };
        atomic_write_json(self.debouncer.path(), &snapshot).await?;
        Ok(())
    }

    /// Resets persisted gear state to empty and flushes immediately
    /// (spec §6 `POST /api/control/clear-gear-state`).
    pub async fn reset(&self) -> Result<(), GearError> {
        *self.state.write().await = PersistedState::default();
        self.flush().await
    }

    /// Gathers every winnable record for a character, caps them to the
    /// carry budget, and derives `required`/`selected`/`selectedMonsters`
    /// /`bestTarget` (spec §4.3 steps 1-5).
    async fn compute_character(&self, ch: &CharacterGearInput) -> CharacterGearState {
        let monster_codes: Vec<(String, u32)> = self
            .catalog
            .monsters_up_to_level(ch.level)
            .map(|m| (m.code.clone(), m.level))
            .collect();

        let mut records: Vec<OptimizeRecord> = Vec::new();
        for (code, level) in monster_codes {
            if let Some(rec) = self.optimizer.optimize(&ch.name, &code, level).await {
                if rec.sim_result.win && rec.sim_result.hp_lost_percent <= 90.0 {
                    records.push(rec);
                }
            }
        }
        records.sort_by(|a, b| {
            b.monster_level
                .cmp(&a.monster_level)
                .then(a.sim_result.turns.cmp(&b.sim_result.turns))
                .then(b.sim_result.remaining_hp.cmp(&a.sim_result.remaining_hp))
        });

        let mut required: HashMap<String, u32> = HashMap::new();
        for rec in &records {
            for (code, qty) in rec.loadout.multiset() {
                let e = required.entry(code).or_insert(0);
                *e = (*e).max(qty);
            }
        }
        for skill in Skill::GATHERING {
            if let Some(tool) = self.tools.best_tool_for_skill(skill, ch.level) {
                required.entry(tool).or_insert(1);
            }
        }

        let carry_budget = ch.inventory_capacity.saturating_sub(10);
        let mut selected: HashMap<String, u32> = HashMap::new();
        let mut used = 0u32;
        let mut covered: HashSet<String> = HashSet::new();

        if let Some(best) = records.first() {
            let (trimmed, spent) = trim_to_budget(&self.catalog, best.loadout.multiset(), carry_budget);
            selected = trimmed;
            used = spent;
            covered.insert(best.monster_code.clone());
        }

        loop {
            let mut best_choice: Option<(usize, HashMap<String, u32>, u32)> = None;
            for (i, rec) in records.iter().enumerate() {
                if covered.contains(&rec.monster_code) {
                    continue;
                }
                let multiset = rec.loadout.multiset();
                let extra: HashMap<String, u32> = multiset
                    .iter()
                    .filter_map(|(c, q)| {
                        let have = selected.get(c).copied().unwrap_or(0);
                        if *q > have {
                            Some((c.clone(), q - have))
                        } else {
                            None
                        }
                    })
                    .collect();
                let cost: u32 = extra.values().sum();
                if used + cost > carry_budget {
                    continue;
                }
                if best_choice.as_ref().map(|(_, _, c)| cost < *c).unwrap_or(true) {
                    best_choice = Some((i, extra, cost));
                }
            }
            match best_choice {
                Some((i, extra, cost)) => {
                    for (c, q) in extra {
                        *selected.entry(c).or_insert(0) += q;
                    }
                    used += cost;
                    covered.insert(records[i].monster_code.clone());
                }
                None => break,
            }
        }

        for skill in Skill::GATHERING {
            if let Some(tool) = self.tools.best_tool_for_skill(skill, ch.level) {
                selected.entry(tool).or_insert(1);
            }
        }

        let selected_monsters: Vec<String> = records
            .iter()
            .filter(|r| {
                r.loadout
                    .multiset()
                    .iter()
                    .all(|(c, q)| selected.get(c).copied().unwrap_or(0) >= *q)
            })
            .map(|r| r.monster_code.clone())
            .collect();
        let best_target = records.first().map(|r| r.monster_code.clone());

        CharacterGearState {
            required,
            selected,
            selected_monsters,
            best_target,
            assigned: HashMap::new(),
            desired: HashMap::new(),
        }
    }

    /// `category_rank` for fallback claims (spec §4.3 "Fallback
    /// claims"): equipped non-tool beats inventory non-tool beats
    /// equipped tool beats inventory tool.
    fn category_rank(&self, code: &str, ch: &CharacterGearInput) -> Option<u8> {
        let equipped = ch.equipment.values().any(|c| c == code);
        let held = ch.inventory.iter().any(|s| s.code == code && s.quantity > 0);
        if !equipped && !held {
            return None;
        }
        let tool = Skill::GATHERING
            .iter()
            .any(|&skill| self.tools.best_tool_for_skill(skill, ch.level).as_deref() == Some(code));
        Some(match (equipped, tool) {
            (true, false) => 0,
            (false, false) => 1,
            (true, true) => 2,
            (false, true) => 3,
        })
    }

    /// Recomputes every character's gear state, performs the
    /// account-wide assignment pass, fills unmet desires by category
    /// fallback, and publishes craft orders for what's still missing
    /// (spec §4.3 "Account-wide assignment" through "Publishing desired
    /// orders").
    pub async fn recompute(
        &self,
        characters: &[CharacterGearInput],
        bank_items: &HashMap<String, u32>,
        bank_revision: u64,
        order: &[String],
    ) -> Result<(), GearError> {
        let mut per_char: HashMap<String, CharacterGearState> = HashMap::new();
        let mut levels: HashMap<String, u32> = HashMap::new();
        for ch in characters {
            per_char.insert(ch.name.clone(), self.compute_character(ch).await);
            levels.insert(ch.name.clone(), ch.level);
        }

        let mut availability: HashMap<String, u32> = bank_items.clone();
        for ch in characters {
            for code in ch.equipment.values() {
                *availability.entry(code.clone()).or_insert(0) += 1;
            }
            for stack in &ch.inventory {
                *availability.entry(stack.code.clone()).or_insert(0) += stack.quantity;
            }
        }

        for name in order {
            let Some(ch) = characters.iter().find(|c| &c.name == name) else {
                continue;
            };
            let Some(state) = per_char.get_mut(name) else {
                continue;
            };

            let mut assigned = HashMap::new();
            let mut desired = HashMap::new();
            let selected = state.selected.clone();
            for (code, need) in &selected {
                let avail = availability.get(code).copied().unwrap_or(0);
                let give = (*need).min(avail);
                if give > 0 {
                    assigned.insert(code.clone(), give);
                    *availability.get_mut(code).unwrap() -= give;
                }
                let remainder = need - give;
                if remainder > 0 {
                    desired.insert(code.clone(), remainder);
                }
            }

            // Fallback claims: for desired items with no identical stock
            // left anywhere, try to fill from the character's own
            // equipped/inventory items by category priority instead.
            let mut still_desired = HashMap::new();
            for (code, need) in desired {
                if availability.get(&code).copied().unwrap_or(0) > 0 {
                    still_desired.insert(code, need);
                    continue;
                }
                match self.category_rank(&code, ch) {
                    Some(_) => {
                        *assigned.entry(code.clone()).or_insert(0) += need;
                    }
                    None => {
                        still_desired.insert(code, need);
                    }
                }
            }

            state.assigned = assigned;
            state.desired = still_desired;

            if ch.create_orders {
                self.publish_desired_orders(ch, state).await?;
            }
        }

        {
            let mut guard = self.state.write().await;
            guard.levels = levels;
            guard.bank_revision_snapshot = bank_revision;
            guard.updated_at_ms = self.clock.now_ms();
            guard.characters = per_char;
        }
        self.schedule_persist().await;
        Ok(())
    }

    async fn publish_desired_orders(
        &self,
        ch: &CharacterGearInput,
        state: &CharacterGearState,
    ) -> Result<(), GearError> {
        for (code, qty) in &state.desired {
            let Some(item) = self.catalog.item(code) else {
                continue;
            };
            if !item.is_craftable() {
                continue;
            }
            let is_tool = Skill::GATHERING
                .iter()
                .any(|&skill| self.tools.best_tool_for_skill(skill, ch.level).as_deref() == Some(code.as_str()));
            if is_tool {
                continue;
            }
            let Some(recipe) = &item.craft else { continue };
            let recipe_code = format!("gear_state:{}:{}", ch.name, code);
            self.order_board
                .create_or_merge_order(CreateOrderRequest {
                    source_type: OrderSource::Craft,
                    source_code: code.clone(),
                    item_code: code.clone(),
                    requester_name: ch.name.clone(),
                    recipe: recipe_code,
                    quantity: *qty,
                    gather_skill: None,
                    craft_skill: Some(recipe.skill),
                    source_level: recipe.level,
                })
                .await?;
        }
        Ok(())
    }

    pub async fn get_owned_map(&self, name: &str) -> HashMap<String, u32> {
        self.state
            .read()
            .await
            .characters
            .get(name)
            .map(|s| s.selected.clone())
            .unwrap_or_default()
    }

    pub async fn get_assigned_map(&self, name: &str) -> HashMap<String, u32> {
        self.state
            .read()
            .await
            .characters
            .get(name)
            .map(|s| s.assigned.clone())
            .unwrap_or_default()
    }

    pub async fn get_desired_map(&self, name: &str) -> HashMap<String, u32> {
        self.state
            .read()
            .await
            .characters
            .get(name)
            .map(|s| s.desired.clone())
            .unwrap_or_default()
    }

    /// `max(0, qty - equippedCountOnChar(code))` for each owned item
    /// (spec §4.3 "used by deposit routine to protect claimed items").
    pub async fn get_owned_keep_by_code_for_inventory(
        &self,
        name: &str,
        equipped_count: impl Fn(&str) -> u32,
    ) -> HashMap<String, u32> {
        let owned = self.get_owned_map(name).await;
        owned
            .into_iter()
            .map(|(code, qty)| {
                let equipped = equipped_count(&code);
                let keep = qty.saturating_sub(equipped);
                (code, keep)
            })
            .collect()
    }

    /// Items the character owns but doesn't currently carry (spec §4.3
    /// "drive withdraw-on-demand").
    pub async fn get_owned_deficit_requests(
        &self,
        name: &str,
        currently_carried: &HashMap<String, u32>,
    ) -> HashMap<String, u32> {
        let owned = self.get_owned_map(name).await;
        owned
            .into_iter()
            .filter_map(|(code, qty)| {
                let have = currently_carried.get(&code).copied().unwrap_or(0);
                if have < qty {
                    Some((code, qty - have))
                } else {
                    None
                }
            })
            .collect()
    }

    pub async fn get_claimed_total(&self, code: &str) -> u32 {
        self.state
            .read()
            .await
            .characters
            .values()
            .map(|s| s.assigned.get(code).copied().unwrap_or(0))
            .sum()
    }

    pub async fn get_claimed_totals_map(&self) -> HashMap<String, u32> {
        let state = self.state.read().await;
        let mut totals = HashMap::new();
        for s in state.characters.values() {
            for (code, qty) in &s.assigned {
                *totals.entry(code.clone()).or_insert(0) += qty;
            }
        }
        totals
    }

    pub async fn is_claimed_by_any_character(&self, code: &str) -> bool {
        self.get_claimed_total(code).await > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::GearLoadout;
    use async_trait::async_trait;
    use rt_catalog::{Item, Obtained, Recipe as CatalogRecipe};
    use rt_combat::CombatResult;
    use rt_core::FakeClock;

    struct FixedOptimizer;

    #[async_trait]
    impl GearOptimizer for FixedOptimizer {
        async fn optimize(&self, char_name: &str, monster_code: &str, monster_level: u32) -> Option<OptimizeRecord> {
            if monster_code != "slime" {
                return None;
            }
            let mut slots = HashMap::new();
            slots.insert(Slot::Weapon, "copper_dagger".to_string());
            let _ = char_name;
            Some(OptimizeRecord {
                monster_code: monster_code.to_string(),
                monster_level,
                loadout: GearLoadout { slots, utilities: HashMap::new() },
                sim_result: CombatResult { win: true, turns: 3, remaining_hp: 80, hp_lost_percent: 20.0 },
            })
        }
    }

    fn catalog_with_dagger() -> Arc<Catalog> {
        Arc::new(Catalog::new(
            vec![Item {
                code: "copper_dagger".into(),
                name: "Copper Dagger".into(),
                level: 1,
                equip_slot: Some(Slot::Weapon),
                craft: Some(CatalogRecipe {
                    skill: Skill::Weaponcrafting,
                    level: 1,
                    quantity: 1,
                    materials: vec![ItemStack { code: "copper".into(), quantity: 4 }],
                }),
                obtained: Obtained::None,
            }],
            vec![rt_catalog::Monster {
                code: "slime".into(),
                level: 1,
                monster_type: rt_catalog::MonsterType::Normal,
                hp: 20,
                attack_fire: 0,
                attack_earth: 0,
                attack_water: 5,
                attack_air: 0,
                res_fire: 0,
                res_earth: 0,
                res_water: 0,
                res_air: 0,
                critical_strike: 0,
                initiative: 0,
                drops: vec![],
            }],
            vec![],
            vec![],
        ))
    }

    async fn planner(order_board_path: PathBuf, catalog: Arc<Catalog>) -> GearStatePlanner {
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(0));
        let board = Arc::new(
            OrderBoard::load(order_board_path, clock.clone())
                .await
                .unwrap(),
        );
        GearStatePlanner::load(
            PathBuf::from("/tmp/does-not-matter-gear-state-test.json"),
            clock,
            catalog,
            Arc::new(FixedOptimizer),
            Arc::new(crate::optimizer::NoToolCatalog),
            board,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn recompute_assigns_from_bank_then_desires_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let board_path = dir.path().join("orders.json");
        let planner = planner(board_path, catalog_with_dagger()).await;

        let alice = CharacterGearInput {
            name: "alice".into(),
            level: 5,
            equipment: HashMap::new(),
            inventory: vec![],
            inventory_capacity: 50,
            create_orders: true,
        };
        let mut bank = HashMap::new();
        bank.insert("copper_dagger".to_string(), 0);

        planner
            .recompute(&[alice], &bank, 1, &["alice".to_string()])
            .await
            .unwrap();

        let desired = planner.get_desired_map("alice").await;
        assert_eq!(desired.get("copper_dagger"), Some(&1));
        let assigned = planner.get_assigned_map("alice").await;
        assert!(assigned.is_empty());

        let claimable = planner.order_board.get_order_board_snapshot().await;
        assert_eq!(claimable.orders.len(), 1);
        assert_eq!(claimable.orders[0].item_code, "copper_dagger");
    }

    #[tokio::test]
    async fn bank_stock_is_assigned_before_any_order_is_published() {
        let dir = tempfile::tempdir().unwrap();
        let board_path = dir.path().join("orders.json");
        let planner = planner(board_path, catalog_with_dagger()).await;

        let alice = CharacterGearInput {
            name: "alice".into(),
            level: 5,
            equipment: HashMap::new(),
            inventory: vec![],
            inventory_capacity: 50,
            create_orders: true,
        };
        let mut bank = HashMap::new();
        bank.insert("copper_dagger".to_string(), 3);

        planner
            .recompute(&[alice], &bank, 1, &["alice".to_string()])
            .await
            .unwrap();

        let assigned = planner.get_assigned_map("alice").await;
        assert_eq!(assigned.get("copper_dagger"), Some(&1));
        let desired = planner.get_desired_map("alice").await;
        assert!(desired.is_empty());
        let claimable = planner.order_board.get_order_board_snapshot().await;
        assert!(claimable.orders.is_empty());
    }
}
