//! Shared primitives for retinue: time, persistence, the character
//! context, and the out-of-scope REST API boundary.
//!
//! Everything downstream (`rt-inventory`, `rt-catalog`, `rt-combat`,
//! `rt-gear`, `rt-orderboard`, `rt-events`, `rt-rotation`,
//! `rt-scheduler`, `rt-runtime`) depends on this crate; this crate
//! depends on nothing in the workspace (spec §2 dependency order,
//! item 1).

pub mod api;
pub mod character;
pub mod clock;
pub mod error;
pub mod model;
pub mod persist;

pub use api::{ActionResult, BankDetails, GameApi};
pub use character::{CharacterContext, CharacterState, Position, TaskState};
pub use clock::{wait_cooldown, Clock, FakeClock, SystemClock};
pub use error::{codes, GameApiError, PersistError};
pub use model::{inventory_reserve, ItemStack, OrderSource, PlanStep, Skill, Slot, CARRY_SLOT_PRIORITY};
