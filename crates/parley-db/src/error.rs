use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A message with this id is already persisted. The caller must drop
    /// the event instead of broadcasting it.
    #[error("message {0} already exists")]
    DuplicateId(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
