//! Navigation over stored item hierarchies.
//!
//! This crate provides:
//! - Nested-set bounds resolution for items and collection roots
//! - Filtered next/previous lookup in depth-first order
//! - Visibility filter expressions with a small text syntax
//! - An in-memory tree store with compressed on-disk snapshots

pub mod bounds;
pub mod cancel;
pub mod config;
pub mod error;
pub mod filter;
pub mod navigator;
pub mod scope;
pub mod store;
pub mod types;

// Re-export main types
pub use bounds::BoundsResolver;
pub use cancel::{CancellationToken, LookupVersionTracker};
pub use config::{load_navigator_config, EmptyContainerPolicy, NavigatorConfig};
pub use error::{Result, TreeError};
pub use filter::{FilterParser, FilterTerm, VisibilityFilter};
pub use navigator::TreeNavigator;
pub use store::{HierarchyBuilder, MemoryTreeStore, StoreScope, TreeStore};
pub use types::{
    Adjacent, Collection, CollectionId, Direction, Item, ItemId, ItemMode, ItemRow,
    ItemTreeBounds, ScopeTable,
};
