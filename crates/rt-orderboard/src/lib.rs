//! Persistent, merge-keyed order board with leased claims (spec §4.2;
//! dependency order item 7: "depends on persistence and time; no API
//! calls").

pub mod board;
pub mod error;
pub mod model;

pub use board::{OrderBoard, OrderBoardEvent, DEFAULT_BLOCKED_RETRY_MS, DEFAULT_LEASE_MS};
pub use error::OrderBoardError;
pub use model::{
    Claim, CreateOrderRequest, DepositRow, ListFilter, Order, OrderBoardSnapshot, OrderStatus,
};
