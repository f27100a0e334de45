use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "db")]
    #[error("SQLite error: {0}")]
    DbError(#[from] sqlx::Error),
    #[cfg(feature = "db")]
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Item was not created.")]
    NotCreated,
}
