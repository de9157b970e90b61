use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderBoardError {
    #[error("invalid order request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Persist(#[from] rt_core::PersistError),
}
