//! Live event tracking, the cross-character NPC lock, and the
//! task-coin exchange procedure (spec §2 dependency order, item 8:
//! "module-global maps; updated by subscribed websocket stream
//! callbacks (adapter-supplied)").

pub mod event_manager;
pub mod npc_lock;
pub mod task_coin;

pub use event_manager::{ContentType, EventEntry, EventManager};
pub use npc_lock::NpcEventLock;
pub use task_coin::{ProactiveExchangeGate, TaskCoinOutcome, TaskExchangeLock};
