//! Live spawn/removal tracking for monster, resource, and NPC events
//! (spec §4.5). Fed by an adapter's websocket callbacks; this module
//! only owns the in-memory map and the parsing of whatever shape the
//! adapter hands it.

use rt_core::{Clock, Position};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Events stop counting as active 30s before they actually expire
/// (spec §4.5).
const PRE_EXPIRY_MS: i64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Monster,
    Resource,
    Npc,
}

impl ContentType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "monster" => Some(ContentType::Monster),
            "resource" => Some(ContentType::Resource),
            "npc" => Some(ContentType::Npc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventEntry {
    pub code: String,
    pub content_type: Option<ContentType>,
    pub content_code: String,
    pub position: Option<Position>,
    pub expiration_ms: Option<i64>,
    pub created_at_ms: i64,
}

struct ParsedSpawn {
    event_code: String,
    content_type: Option<ContentType>,
    content_code: String,
    position: Option<Position>,
    expiration_ms: Option<i64>,
}

fn parse_position(map: &Value) -> Option<Position> {
    let x = map.get("x")?.as_i64()? as i32;
    let y = map.get("y")?.as_i64()? as i32;
    Some(Position { x, y })
}

/// Accepts the four spawn/remove payload shapes in the order listed in
/// spec §4.5: `{map:{content:{type,code}}}`, `{content:{type,code},
/// map}`, `{code, type?, map}`, `{name, map}` as a last resort. When a
/// shape has no distinct event code of its own, the content code
/// doubles as the map key.
fn parse_payload(payload: &Value) -> Option<ParsedSpawn> {
    let expiration_ms = payload.get("expiration").and_then(Value::as_i64);

    if let Some(map) = payload.get("map") {
        if let Some(content) = map.get("content") {
            let content_code = content.get("code")?.as_str()?.to_string();
            let content_type = content.get("type").and_then(Value::as_str).and_then(ContentType::parse);
            let event_code = payload
                .get("code")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| content_code.clone());
            return Some(ParsedSpawn {
                event_code,
                content_type,
                content_code,
                position: parse_position(map),
                expiration_ms,
            });
        }
    }
    if let Some(content) = payload.get("content") {
        let content_code = content.get("code")?.as_str()?.to_string();
        let content_type = content.get("type").and_then(Value::as_str).and_then(ContentType::parse);
        let event_code = payload
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| content_code.clone());
        let position = payload.get("map").and_then(parse_position);
        return Some(ParsedSpawn {
            event_code,
            content_type,
            content_code,
            position,
            expiration_ms,
        });
    }
    if let Some(code) = payload.get("code").and_then(Value::as_str) {
        let content_type = payload.get("type").and_then(Value::as_str).and_then(ContentType::parse);
        let position = payload.get("map").and_then(parse_position);
        return Some(ParsedSpawn {
            event_code: code.to_string(),
            content_type,
            content_code: code.to_string(),
            position,
            expiration_ms,
        });
    }
    if let Some(name) = payload.get("name").and_then(Value::as_str) {
        let position = payload.get("map").and_then(parse_position);
        return Some(ParsedSpawn {
            event_code: name.to_string(),
            content_type: None,
            content_code: name.to_string(),
            position,
            expiration_ms,
        });
    }
    None
}

pub struct EventManager {
    clock: Arc<dyn Clock>,
    active: RwLock<HashMap<String, EventEntry>>,
}

impl EventManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            active: RwLock::new(HashMap::new()),
        }
    }

    pub async fn handle_event_spawn(&self, payload: &Value) -> Option<EventEntry> {
        let parsed = parse_payload(payload)?;
        let entry = EventEntry {
            code: parsed.event_code.clone(),
            content_type: parsed.content_type,
            content_code: parsed.content_code,
            position: parsed.position,
            expiration_ms: parsed.expiration_ms,
            created_at_ms: self.clock.now_ms(),
        };
        self.active.write().await.insert(parsed.event_code, entry.clone());
        Some(entry)
    }

    pub async fn handle_event_removed(&self, payload: &Value) -> bool {
        let Some(parsed) = parse_payload(payload) else {
            return false;
        };
        self.active.write().await.remove(&parsed.event_code).is_some()
    }

    async fn prune_stale(&self) {
        let now = self.clock.now_ms();
        self.active.write().await.retain(|_, e| match e.expiration_ms {
            Some(exp) => exp - now >= PRE_EXPIRY_MS,
            None => true,
        });
    }

    pub async fn is_event_active(&self, code: &str) -> bool {
        self.prune_stale().await;
        self.active.read().await.contains_key(code)
    }

    pub async fn get_time_remaining(&self, code: &str) -> Option<i64> {
        let now = self.clock.now_ms();
        self.active
            .read()
            .await
            .get(code)
            .and_then(|e| e.expiration_ms)
            .map(|exp| (exp - now).max(0))
    }

    async fn active_by_type(&self, content_type: ContentType) -> Vec<EventEntry> {
        self.prune_stale().await;
        self.active
            .read()
            .await
            .values()
            .filter(|e| e.content_type == Some(content_type))
            .cloned()
            .collect()
    }

    pub async fn get_active_monster_events(&self) -> Vec<EventEntry> {
        self.active_by_type(ContentType::Monster).await
    }
    pub async fn get_active_resource_events(&self) -> Vec<EventEntry> {
        self.active_by_type(ContentType::Resource).await
    }
    pub async fn get_active_npc_events(&self) -> Vec<EventEntry> {
        self.active_by_type(ContentType::Npc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_core::FakeClock;
    use serde_json::json;

    #[tokio::test]
    async fn spawn_then_removed_by_content_code_yields_empty_map() {
        let mgr = EventManager::new(Arc::new(FakeClock::new(0)));
        mgr.handle_event_spawn(&json!({
            "map": {"content": {"type": "monster", "code": "demon"}, "x": 5, "y": 10},
            "expiration": 3_600_000,
        }))
        .await
        .unwrap();
        assert!(mgr.is_event_active("demon").await);

        let removed = mgr
            .handle_event_removed(&json!({"map": {"content": {"code": "demon"}}}))
            .await;
        assert!(removed);
        assert!(mgr.get_active_monster_events().await.is_empty());
    }

    #[tokio::test]
    async fn events_within_30s_of_expiry_are_inactive() {
        let clock = Arc::new(FakeClock::new(0));
        let mgr = EventManager::new(clock.clone());
        mgr.handle_event_spawn(&json!({
            "content": {"type": "resource", "code": "iron_rocks"},
            "map": {"x": 1, "y": 2},
            "expiration": 40_000,
        }))
        .await;
        assert!(mgr.is_event_active("iron_rocks").await);
        clock.advance(20_000);
        assert!(!mgr.is_event_active("iron_rocks").await);
    }

    #[tokio::test]
    async fn last_resort_name_shape_is_accepted() {
        let mgr = EventManager::new(Arc::new(FakeClock::new(0)));
        mgr.handle_event_spawn(&json!({"name": "bandit_camp", "map": {"x": 0, "y": 0}}))
            .await
            .unwrap();
        assert!(mgr.is_event_active("bandit_camp").await);
    }
}
