//! Cross-character NPC interaction lock (spec §4.5). Only one character
//! may be mid-dialogue with a given NPC at a time; the lock self-releases
//! after a TTL so a crashed holder can't wedge the NPC forever.

use rt_core::Clock;
use std::sync::Arc;
use tokio::sync::RwLock;

const LOCK_TTL_MS: i64 = 5 * 60_000;

#[derive(Debug, Clone)]
struct Held {
    char_name: String,
    npc_code: String,
    event_code: Option<String>,
    acquired_at_ms: i64,
}

pub struct NpcEventLock {
    clock: Arc<dyn Clock>,
    held: RwLock<Option<Held>>,
}

impl NpcEventLock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            held: RwLock::new(None),
        }
    }

    fn is_expired(&self, held: &Held, now: i64) -> bool {
        now - held.acquired_at_ms >= LOCK_TTL_MS
    }

    /// Acquires the lock for `char_name`/`npc_code`. Re-entrant: a
    /// character already holding the lock for the same NPC may
    /// reacquire it without being blocked by its own hold.
    pub async fn acquire(&self, char_name: &str, npc_code: &str, event_code: Option<String>) -> bool {
        let now = self.clock.now_ms();
        let mut guard = self.held.write().await;
        if let Some(held) = guard.as_ref() {
            if self.is_expired(held, now) {
                *guard = None;
            } else if held.char_name == char_name && held.npc_code == npc_code {
                // Re-entrant: refresh the timestamp, keep holding.
                guard.as_mut().unwrap().acquired_at_ms = now;
                return true;
            } else {
                return false;
            }
        }
        *guard = Some(Held {
            char_name: char_name.to_string(),
            npc_code: npc_code.to_string(),
            event_code,
            acquired_at_ms: now,
        });
        true
    }

    /// Releases the lock, but only if `char_name` is the current holder.
    pub async fn release(&self, char_name: &str) {
        let mut guard = self.held.write().await;
        if guard.as_ref().map(|h| h.char_name.as_str()) == Some(char_name) {
            *guard = None;
        }
    }

    pub async fn is_held(&self) -> bool {
        let now = self.clock.now_ms();
        let guard = self.held.read().await;
        match guard.as_ref() {
            Some(h) => !self.is_expired(h, now),
            None => false,
        }
    }

    pub async fn is_held_by(&self, char_name: &str) -> bool {
        let now = self.clock.now_ms();
        let guard = self.held.read().await;
        match guard.as_ref() {
            Some(h) => h.char_name == char_name && !self.is_expired(h, now),
            None => false,
        }
    }

    pub async fn get_holder(&self) -> Option<(String, String, Option<String>)> {
        let now = self.clock.now_ms();
        let guard = self.held.read().await;
        guard.as_ref().and_then(|h| {
            if self.is_expired(h, now) {
                None
            } else {
                Some((h.char_name.clone(), h.npc_code.clone(), h.event_code.clone()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_core::FakeClock;

    #[tokio::test]
    async fn second_character_is_blocked_until_release() {
        let lock = NpcEventLock::new(Arc::new(FakeClock::new(0)));
        assert!(lock.acquire("alice", "merchant", None).await);
        assert!(!lock.acquire("bob", "merchant", None).await);
        lock.release("alice").await;
        assert!(lock.acquire("bob", "merchant", None).await);
    }

    #[tokio::test]
    async fn same_character_reacquire_is_reentrant() {
        let lock = NpcEventLock::new(Arc::new(FakeClock::new(0)));
        assert!(lock.acquire("alice", "merchant", None).await);
        assert!(lock.acquire("alice", "merchant", None).await);
    }

    #[tokio::test]
    async fn lock_self_releases_after_ttl() {
        let clock = Arc::new(FakeClock::new(0));
        let lock = NpcEventLock::new(clock.clone());
        assert!(lock.acquire("alice", "merchant", None).await);
        clock.advance(LOCK_TTL_MS + 1);
        assert!(!lock.is_held().await);
        assert!(lock.acquire("bob", "merchant", None).await);
    }

    #[tokio::test]
    async fn release_by_non_holder_is_a_no_op() {
        let lock = NpcEventLock::new(Arc::new(FakeClock::new(0)));
        lock.acquire("alice", "merchant", None).await;
        lock.release("bob").await;
        assert!(lock.is_held_by("alice").await);
    }
}
