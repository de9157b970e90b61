use thiserror::Error;

#[derive(Debug, Error)]
pub enum GearError {
    #[error(transparent)]
    Persist(#[from] rt_core::PersistError),
    #[error(transparent)]
    OrderBoard(#[from] rt_orderboard::OrderBoardError),
}
