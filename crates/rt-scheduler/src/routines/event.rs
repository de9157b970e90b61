//! Event routine (spec §4.1 baseline roster, priority 90, loop,
//! urgent): chases live monster/resource/NPC events reported by the
//! event manager, sticking to one target while it's active and off
//! cooldown.

use crate::routine::{Routine, RoutineConfig};
use async_trait::async_trait;
use rt_catalog::{Catalog, MonsterType};
use rt_core::{codes, CharacterContext, Clock, GameApiError, Position, Skill, Slot};
use rt_events::{EventManager, NpcEventLock};
use rt_gear::{GearOptimizer, ToolCatalog};
use rt_inventory::InventoryManager;
use rt_orderboard::OrderBoard;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Short cooldown after a loss/path-failure/gear-not-ready decision
/// (spec §4.5); also doubles as the NPC per-tick backoff.
const SHORT_COOLDOWN_MS: i64 = 30_000;
/// Floor for the "simulation says this is an expected loss" cooldown
/// (spec §4.5 "a longer cooldown lasting until the event expires, min
/// 60s").
const SIM_FAILURE_MIN_COOLDOWN_MS: i64 = 60_000;
const NPC_BUY_API_CAP: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Monster { event_code: String, monster_code: String },
    Resource { event_code: String, resource_code: String, skill: Skill },
    Npc { event_code: String, npc_code: String },
}

impl Target {
    fn event_code(&self) -> &str {
        match self {
            Target::Monster { event_code, .. } | Target::Resource { event_code, .. } | Target::Npc { event_code, .. } => event_code,
        }
    }
}

#[derive(Default)]
struct EventRoutineState {
    target: Option<Target>,
    cooldowns: HashMap<String, i64>,
    npc_skip_list: HashMap<String, std::collections::HashSet<String>>,
}

pub struct EventRoutine {
    events: Arc<EventManager>,
    npc_lock: Arc<NpcEventLock>,
    catalog: Arc<Catalog>,
    order_board: Arc<OrderBoard>,
    inventory: Arc<InventoryManager>,
    optimizer: Arc<dyn GearOptimizer>,
    tools: Arc<dyn ToolCatalog>,
    clock: Arc<dyn Clock>,
    config: RwLock<RoutineConfig>,
    state: RwLock<EventRoutineState>,
}

impl EventRoutine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: Arc<EventManager>,
        npc_lock: Arc<NpcEventLock>,
        catalog: Arc<Catalog>,
        order_board: Arc<OrderBoard>,
        inventory: Arc<InventoryManager>,
        optimizer: Arc<dyn GearOptimizer>,
        tools: Arc<dyn ToolCatalog>,
        clock: Arc<dyn Clock>,
        config: RoutineConfig,
    ) -> Self {
        Self {
            events,
            npc_lock,
            catalog,
            order_board,
            inventory,
            optimizer,
            tools,
            clock,
            config: RwLock::new(config),
            state: RwLock::new(EventRoutineState::default()),
        }
    }

    async fn on_cooldown(&self, event_code: &str) -> bool {
        let now = self.clock.now_ms();
        self.state
            .read()
            .await
            .cooldowns
            .get(event_code)
            .map(|expires| *expires > now)
            .unwrap_or(false)
    }

    async fn set_short_cooldown(&self, event_code: &str) {
        let until = self.clock.now_ms() + SHORT_COOLDOWN_MS;
        self.state.write().await.cooldowns.insert(event_code.to_string(), until);
    }

    async fn set_sim_failure_cooldown(&self, event_code: &str) {
        let now = self.clock.now_ms();
        let expiry = self.events.get_time_remaining(event_code).await.map(|remaining| now + remaining);
        let until = expiry.unwrap_or(now).max(now + SIM_FAILURE_MIN_COOLDOWN_MS);
        self.state.write().await.cooldowns.insert(event_code.to_string(), until);
    }

    fn monster_type_allowed(&self, monster_type: MonsterType, max_monster_type: &str) -> bool {
        match monster_type {
            MonsterType::Boss => false,
            MonsterType::Elite => max_monster_type != "normal",
            MonsterType::Normal => true,
        }
    }

    async fn find_best_event(&self, ctx: &CharacterContext) -> Option<Target> {
        let cfg = self.config.read().await;
        let snapshot = ctx.snapshot().await;

        let mut best: Option<(f64, Target)> = None;

        for entry in self.events.get_active_monster_events().await {
            if self.on_cooldown(&entry.code).await {
                continue;
            }
            let Some(monster) = self.catalog.monster(&entry.content_code) else {
                continue;
            };
            if !self.monster_type_allowed(monster.monster_type, &cfg.max_monster_type) {
                continue;
            }
            let score = monster.level as f64 + if monster.monster_type == MonsterType::Elite { 20.0 } else { 0.0 };
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((
                    score,
                    Target::Monster {
                        event_code: entry.code.clone(),
                        monster_code: monster.code.clone(),
                    },
                ));
            }
        }

        for entry in self.events.get_active_resource_events().await {
            if self.on_cooldown(&entry.code).await {
                continue;
            }
            let Some(resource) = self.catalog.resource(&entry.content_code) else {
                continue;
            };
            if resource.level > snapshot.skill_level(resource.skill) {
                continue;
            }
            if let Some(filter) = &cfg.gather_resources {
                if !filter.iter().any(|code| code == &resource.code) {
                    continue;
                }
            }
            let score = resource.level as f64;
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((
                    score,
                    Target::Resource {
                        event_code: entry.code.clone(),
                        resource_code: resource.code.clone(),
                        skill: resource.skill,
                    },
                ));
            }
        }

        if let Some((_, target)) = best {
            return Some(target);
        }

        for entry in self.events.get_active_npc_events().await {
            if self.on_cooldown(&entry.code).await {
                continue;
            }
            if self.npc_lock.is_held().await && !self.npc_lock.is_held_by(&ctx.name).await {
                continue;
            }
            let shopping_list = self.build_shopping_list(&entry.content_code, &cfg, &snapshot).await;
            if shopping_list.is_empty() {
                continue;
            }
            return Some(Target::Npc {
                event_code: entry.code.clone(),
                npc_code: entry.content_code.clone(),
            });
        }

        None
    }

    /// Sticky selection (spec §4.5 `_findBestEvent`): keeps the current
    /// target while it's still active and off cooldown, otherwise picks
    /// fresh.
    async fn select_target(&self, ctx: &CharacterContext) -> Option<Target> {
        {
            let state = self.state.read().await;
            if let Some(target) = &state.target {
                let code = target.event_code().to_string();
                drop(state);
                if self.events.is_event_active(&code).await && !self.on_cooldown(&code).await {
                    return self.state.read().await.target.clone();
                }
                self.state.write().await.target = None;
            }
        }
        let found = self.find_best_event(ctx).await;
        self.state.write().await.target = found.clone();
        found
    }

    /// Shopping list merges `npcBuyList` config against current
    /// holdings; items already known unsold by this NPC (error 441) are
    /// skipped. Items this catalog has no gather/craft source for
    /// (`Obtained::None`) and that appear in an open order are folded
    /// in as a secondary demand signal (spec §4.5 "merged with ... open
    /// orders").
    async fn build_shopping_list(
        &self,
        npc_code: &str,
        cfg: &RoutineConfig,
        snapshot: &rt_core::CharacterState,
    ) -> HashMap<String, u32> {
        let state = self.state.read().await;
        let skip = state.npc_skip_list.get(npc_code).cloned().unwrap_or_default();
        drop(state);

        let mut wanted: HashMap<String, u32> = HashMap::new();
        for (code, qty) in &cfg.npc_buy_list {
            if skip.contains(code) {
                continue;
            }
            let have = snapshot.item_count(code);
            if have < *qty {
                wanted.insert(code.clone(), qty - have);
            }
        }

        let board_snapshot = self.order_board.get_order_board_snapshot().await;
        for order in &board_snapshot.orders {
            if skip.contains(&order.item_code) || order.remaining_qty == 0 {
                continue;
            }
            if !matches!(self.catalog.item(&order.item_code).map(|i| &i.obtained), Some(rt_catalog::Obtained::None)) {
                continue;
            }
            wanted
                .entry(order.item_code.clone())
                .and_modify(|q| *q = (*q).max(order.remaining_qty))
                .or_insert(order.remaining_qty);
        }

        wanted
    }

    async fn equip(&self, ctx: &CharacterContext, slots: &HashMap<Slot, String>) -> Result<(), GameApiError> {
        let snapshot = ctx.snapshot().await;
        for (slot, code) in slots {
            if snapshot.equipment.get(slot) == Some(code) {
                continue;
            }
            let result = ctx.api().equip(&ctx.name, code, *slot, 1).await?;
            ctx.apply_action_result(&result).await;
        }
        Ok(())
    }

    async fn move_to_event(&self, ctx: &CharacterContext, event_code: &str) -> Result<bool, GameApiError> {
        let snapshot = ctx.snapshot().await;
        let position = self
            .events
            .get_active_monster_events()
            .await
            .into_iter()
            .chain(self.events.get_active_resource_events().await)
            .chain(self.events.get_active_npc_events().await)
            .find(|e| e.code == event_code)
            .and_then(|e| e.position)
            .unwrap_or(Position { x: 0, y: 0 });
        if snapshot.is_at(position) {
            return Ok(false);
        }
        let result = ctx.api().move_to(&ctx.name, position).await?;
        ctx.apply_action_result(&result).await;
        Ok(true)
    }

    async fn execute_monster(&self, ctx: &CharacterContext, event_code: &str, monster_code: &str) -> Result<bool, GameApiError> {
        let snapshot = ctx.snapshot().await;
        let monster_level = self.catalog.monster(monster_code).map(|m| m.level).unwrap_or(snapshot.level);

        let Some(record) = self.optimizer.optimize(&ctx.name, monster_code, monster_level).await else {
            self.set_sim_failure_cooldown(event_code).await;
            return Ok(false);
        };
        if !rt_combat::can_beat_monster(&record.sim_result) {
            self.set_sim_failure_cooldown(event_code).await;
            return Ok(false);
        }

        self.equip(ctx, &record.loadout.slots).await?;
        for (code, quantity) in &record.loadout.utilities {
            let result = ctx.api().equip(&ctx.name, code, Slot::Utility1, *quantity).await?;
            ctx.apply_action_result(&result).await;
        }

        if self.move_to_event(ctx, event_code).await? {
            return Ok(true);
        }

        // Rest-before-fight: attempt a refresh to let regen land; press
        // on regardless of whether HP actually recovered.
        let _ = ctx.refresh().await;

        let result = ctx.api().fight(&ctx.name).await?;
        ctx.apply_action_result(&result).await;

        let after = ctx.snapshot().await;
        if after.hp == 0 {
            ctx.record_loss(monster_code).await;
            self.set_short_cooldown(event_code).await;
        } else {
            ctx.clear_losses(monster_code).await;
        }
        Ok(true)
    }

    async fn execute_resource(&self, ctx: &CharacterContext, event_code: &str, _resource_code: &str, skill: Skill) -> Result<bool, GameApiError> {
        let snapshot = ctx.snapshot().await;

        if snapshot.inventory_full() {
            // Yield: preserve the sticky target so gathering resumes
            // once the deposit-bank routine frees space.
            return Ok(false);
        }

        if skill.is_gathering() {
            if let Some(tool) = self.tools.best_tool_for_skill(skill, snapshot.level) {
                self.equip(ctx, &HashMap::from([(Slot::Weapon, tool)])).await?;
            }
        }

        if self.move_to_event(ctx, event_code).await? {
            return Ok(true);
        }

        match ctx.api().gather(&ctx.name).await {
            Ok(result) => {
                ctx.apply_action_result(&result).await;
                Ok(true)
            }
            Err(err) if err.code == codes::WRONG_MAP_TILE => {
                self.set_short_cooldown(event_code).await;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn execute_npc(&self, ctx: &CharacterContext, event_code: &str, npc_code: &str) -> Result<bool, GameApiError> {
        if !self.npc_lock.acquire(&ctx.name, npc_code, Some(event_code.to_string())).await {
            self.set_short_cooldown(event_code).await;
            return Ok(false);
        }

        let outcome = self.run_npc_purchase(ctx, event_code, npc_code).await;
        if outcome.as_ref().map(|progressed| !progressed).unwrap_or(true) {
            self.npc_lock.release(&ctx.name).await;
        }
        outcome
    }

    async fn run_npc_purchase(&self, ctx: &CharacterContext, event_code: &str, npc_code: &str) -> Result<bool, GameApiError> {
        let cfg = self.config.read().await.clone();
        let snapshot = ctx.snapshot().await;
        let shopping_list = self.build_shopping_list(npc_code, &cfg, &snapshot).await;
        let Some((item_code, wanted)) = shopping_list.into_iter().next() else {
            self.set_short_cooldown(event_code).await;
            return Ok(false);
        };

        if snapshot.inventory_full() {
            self.set_short_cooldown(event_code).await;
            return Ok(false);
        }

        if self.move_to_event(ctx, event_code).await? {
            return Ok(true);
        }

        let quantity = wanted.min(NPC_BUY_API_CAP);
        let bank_gold = self.inventory.snapshot().await.gold;
        if snapshot.gold == 0 && bank_gold > 0 {
            let amount = bank_gold.min(10_000);
            let withdraw = ctx.api().withdraw_gold(&ctx.name, amount).await?;
            ctx.apply_action_result(&withdraw).await;
            self.inventory.apply_gold_withdrawal(amount).await;
            return Ok(true);
        }

        match ctx.api().npc_buy(&ctx.name, npc_code, &item_code, quantity).await {
            Ok(result) => {
                ctx.apply_action_result(&result).await;
                Ok(true)
            }
            Err(err) if err.code == codes::NPC_ITEM_NOT_SOLD => {
                self.state
                    .write()
                    .await
                    .npc_skip_list
                    .entry(npc_code.to_string())
                    .or_default()
                    .insert(item_code);
                Ok(true)
            }
            Err(err) if err.code == codes::INSUFFICIENT_GOLD => {
                self.set_short_cooldown(event_code).await;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl Routine for EventRoutine {
    fn name(&self) -> &str {
        "event"
    }
    fn priority(&self) -> i32 {
        90
    }
    fn is_loop(&self) -> bool {
        true
    }
    fn is_urgent(&self) -> bool {
        true
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        if !self.config.read().await.event_enabled {
            return false;
        }
        if ctx.snapshot().await.inventory_full() {
            return false;
        }
        self.select_target(ctx).await.is_some()
    }

    async fn can_be_preempted(&self, _ctx: &CharacterContext) -> bool {
        false
    }

    async fn execute(&self, ctx: &CharacterContext) -> Result<bool, GameApiError> {
        let Some(target) = self.select_target(ctx).await else {
            return Ok(false);
        };

        match target {
            Target::Monster { event_code, monster_code } => self.execute_monster(ctx, &event_code, &monster_code).await,
            Target::Resource {
                event_code,
                resource_code,
                skill,
            } => self.execute_resource(ctx, &event_code, &resource_code, skill).await,
            Target::Npc { event_code, npc_code } => self.execute_npc(ctx, &event_code, &npc_code).await,
        }
    }

    async fn update_config(&self, config: &RoutineConfig) {
        *self.config.write().await = config.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_state, StubApi};
    use async_trait::async_trait;
    use rt_catalog::Monster;
    use rt_core::{Clock, FakeClock};
    use rt_gear::optimizer::{GearOptimizer, NoToolCatalog, OptimizeRecord};
    use rt_orderboard::OrderBoard;
    use serde_json::json;

    struct NoOptimizer;

    #[async_trait]
    impl GearOptimizer for NoOptimizer {
        async fn optimize(&self, _char_name: &str, _monster_code: &str, _monster_level: u32) -> Option<OptimizeRecord> {
            None
        }
    }

    async fn fixture_routine(dir: &std::path::Path) -> (EventRoutine, Arc<EventManager>) {
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(0));
        let events = Arc::new(EventManager::new(clock.clone()));
        let npc_lock = Arc::new(NpcEventLock::new(clock.clone()));
        let catalog = Arc::new(Catalog::new(
            vec![],
            vec![Monster {
                code: "elite_wolf".into(),
                level: 10,
                monster_type: MonsterType::Elite,
                hp: 100,
                attack_fire: 0,
                attack_earth: 0,
                attack_water: 0,
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
        ));
        let board = Arc::new(OrderBoard::load(dir.join("orders.json"), clock.clone()).await.unwrap());
        let inventory = Arc::new(InventoryManager::new());
        let routine = EventRoutine::new(
            events.clone(),
            npc_lock,
            catalog,
            board,
            inventory,
            Arc::new(NoOptimizer),
            Arc::new(NoToolCatalog),
            clock,
            RoutineConfig::default(),
        );
        (routine, events)
    }

    #[tokio::test]
    async fn max_monster_type_normal_filters_out_elites() {
        let dir = tempfile::tempdir().unwrap();
        let (routine, events) = fixture_routine(dir.path()).await;
        events
            .handle_event_spawn(&json!({
                "map": {"content": {"type": "monster", "code": "elite_wolf"}, "x": 1, "y": 1},
                "expiration": 3_600_000,
            }))
            .await;

        let cfg = RoutineConfig {
            max_monster_type: "normal".to_string(),
            ..RoutineConfig::default()
        };
        routine.update_config(&cfg).await;

        let state = fixture_state("alice");
        let ctx = CharacterContext::new(state.clone(), Arc::new(StubApi::new(state)));
        assert!(!routine.can_run(&ctx).await);
    }

    #[tokio::test]
    async fn no_events_means_cannot_run() {
        let dir = tempfile::tempdir().unwrap();
        let (routine, _events) = fixture_routine(dir.path()).await;
        let state = fixture_state("alice");
        let ctx = CharacterContext::new(state.clone(), Arc::new(StubApi::new(state)));
        assert!(!routine.can_run(&ctx).await);
    }
}
