//! Account-wide gear-state planner (spec §4.3). Depends on the game
//! catalog, the bank snapshot, and the order board; the optimization
//! search itself is out of scope and consumed through the
//! `GearOptimizer` trait (spec §2 dependency order, item 9).

pub mod error;
pub mod optimizer;
pub mod planner;

pub use error::GearError;
pub use optimizer::{GearLoadout, GearOptimizer, NoToolCatalog, OptimizeRecord, ToolCatalog};
pub use planner::{CharacterGearInput, CharacterGearState, GearStatePlanner};
