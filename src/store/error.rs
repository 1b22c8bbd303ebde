use thiserror::Error;

/// Errors produced by the repository layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed record (or a record it references) does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A unique name is already taken by a different record.
    #[error("{entity} named '{name}' already exists")]
    Conflict { entity: &'static str, name: String },

    /// Unexpected failure of the underlying store.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, name: impl ToString) -> Self {
        Self::Conflict {
            entity,
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the store layer.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
