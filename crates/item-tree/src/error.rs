use crate::types::{CollectionId, ItemId};

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("item {item} not found in {scope}")]
    NotFound { item: ItemId, scope: String },

    #[error("no root item for collection {collection} in {scope}")]
    RootNotFound {
        collection: CollectionId,
        scope: String,
    },

    #[error("Tree store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("traversal cancelled")]
    Cancelled,

    #[error("traversal exceeded {limit} store queries")]
    TraversalLimit { limit: u64 },

    #[error("Filter parse error: {0}")]
    FilterParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, TreeError>;

impl TreeError {
    pub(crate) fn not_found(item: ItemId, scope: impl Into<String>) -> Self {
        Self::NotFound {
            item,
            scope: scope.into(),
        }
    }
}
