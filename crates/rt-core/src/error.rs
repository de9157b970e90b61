use thiserror::Error;

/// Error returned by the (out-of-scope) REST API client.
///
/// Retinue's core never constructs these itself — they arrive from the
/// adapter that wraps the remote game server. Routines match on `code`
/// per the taxonomy in spec §7; unmatched codes propagate.
#[derive(Debug, Clone, Error)]
#[error("game api error {code}: {message}")]
pub struct GameApiError {
    pub code: u32,
    pub message: String,
}

impl GameApiError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Conditional API codes every routine must branch on explicitly (§6, §7).
pub mod codes {
    pub const NPC_ITEM_NOT_SOLD: u32 = 441;
    pub const TASK_TRADE_MISSING_ITEMS: u32 = 478;
    pub const EQUIP_ADDITIVE_UNSUPPORTED_A: u32 = 485;
    pub const EQUIP_ADDITIVE_UNSUPPORTED_B: u32 = 491;
    pub const INSUFFICIENT_GOLD: u32 = 492;
    pub const SKILL_TOO_LOW: u32 = 493;
    pub const INVENTORY_FULL: u32 = 497;
    pub const WRONG_MAP_TILE: u32 = 598;
}

/// Errors raised by on-disk persistence (JSON atomic writer).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error persisting {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error persisting {path}: {source}")]
    Serde {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
