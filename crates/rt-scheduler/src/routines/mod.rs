//! The baseline routine roster (spec §4.1 table), in registration
//! order: `Rest, Event, BankExpansion, DepositBank, CompleteTask,
//! SkillRotation`. Registration order is also tie-break order for
//! candidates of equal priority in the scheduler.

mod bank_expansion;
mod complete_task;
mod deposit_bank;
mod event;
mod rest;
mod skill_rotation;

pub use bank_expansion::BankExpansionRoutine;
pub use complete_task::CompleteTaskRoutine;
pub use deposit_bank::DepositBankRoutine;
pub use event::EventRoutine;
pub use rest::RestRoutine;
pub use skill_rotation::SkillRotationRoutine;
