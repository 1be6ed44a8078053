//! Read-only access to stored hierarchies.
//!
//! The navigator only ever talks to a [`TreeStore`]. Every query is scoped
//! to one scope table (and, for shared tables, one collection) and filtered
//! by a caller-supplied [`VisibilityFilter`]. Sibling order is always
//! `(name, id)` ascending so that duplicate names still rank totally.

mod builder;
mod memory;
mod snapshot;

pub use builder::HierarchyBuilder;
pub use memory::{MemorySnapshot, MemoryTreeStore};
pub use snapshot::{
    load_scope_snapshot, write_scope_snapshot, ScopeSnapshot, SCOPE_SNAPSHOT_VERSION,
};

use std::fmt;

use crate::error::Result;
use crate::filter::VisibilityFilter;
use crate::types::{Collection, CollectionId, ItemId, ItemRow, ScopeTable};

/// Where a query runs: a scope table, optionally narrowed to one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreScope {
    pub table: ScopeTable,
    pub collection_id: CollectionId,
    /// Set for tables shared by many collections.
    pub restrict_to_collection: bool,
}

impl StoreScope {
    /// Scope over a table shared between collections.
    pub fn shared(table: impl Into<ScopeTable>, collection_id: CollectionId) -> Self {
        Self {
            table: table.into(),
            collection_id,
            restrict_to_collection: true,
        }
    }

    /// Scope over a table holding a single collection.
    pub fn dedicated(table: impl Into<ScopeTable>, collection_id: CollectionId) -> Self {
        Self {
            table: table.into(),
            collection_id,
            restrict_to_collection: false,
        }
    }

    #[inline]
    pub fn admits_collection(&self, collection_id: CollectionId) -> bool {
        !self.restrict_to_collection || self.collection_id == collection_id
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.restrict_to_collection {
            write!(f, "{} (collection {})", self.table, self.collection_id)
        } else {
            write!(f, "{}", self.table)
        }
    }
}

/// Read-only hierarchy queries consumed by the navigator.
///
/// Implementations must answer a whole traversal from one consistent view;
/// the navigator issues several queries per call and does not guard against
/// structural changes in between.
pub trait TreeStore {
    /// Looks up the collection record, if the store knows it.
    fn collection(&self, collection_id: CollectionId) -> Result<Option<Collection>>;

    /// Fetches one row through the filtered view.
    fn row(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        item: ItemId,
    ) -> Result<Option<ItemRow>>;

    /// Fetches the row without a parent, unfiltered.
    fn root_row(&self, scope: &StoreScope) -> Result<Option<ItemRow>>;

    /// Number of visible children of `parent`.
    fn count_visible_children(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
    ) -> Result<u64>;

    /// 0-based position of `item` among the visible children of `parent`,
    /// `None` if it is not one of them.
    fn rank_of(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
        item: ItemId,
    ) -> Result<Option<u64>>;

    /// The visible child of `parent` at `rank`.
    fn child_at_rank(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
        rank: u64,
    ) -> Result<Option<ItemRow>>;

    /// Number of visible rows whose left bound lies in `[left, right]`.
    fn count_descendants_in_range(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        left: i64,
        right: i64,
    ) -> Result<u64>;

    /// Number of plain files whose left bound lies in `[left, right]`.
    fn count_plain_files(&self, scope: &StoreScope, left: i64, right: i64) -> Result<u64>;
}

impl<S: TreeStore + ?Sized> TreeStore for &S {
    fn collection(&self, collection_id: CollectionId) -> Result<Option<Collection>> {
        (**self).collection(collection_id)
    }

    fn row(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        item: ItemId,
    ) -> Result<Option<ItemRow>> {
        (**self).row(scope, filter, item)
    }

    fn root_row(&self, scope: &StoreScope) -> Result<Option<ItemRow>> {
        (**self).root_row(scope)
    }

    fn count_visible_children(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
    ) -> Result<u64> {
        (**self).count_visible_children(scope, filter, parent)
    }

    fn rank_of(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
        item: ItemId,
    ) -> Result<Option<u64>> {
        (**self).rank_of(scope, filter, parent, item)
    }

    fn child_at_rank(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
        rank: u64,
    ) -> Result<Option<ItemRow>> {
        (**self).child_at_rank(scope, filter, parent, rank)
    }

    fn count_descendants_in_range(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        left: i64,
        right: i64,
    ) -> Result<u64> {
        (**self).count_descendants_in_range(scope, filter, left, right)
    }

    fn count_plain_files(&self, scope: &StoreScope, left: i64, right: i64) -> Result<u64> {
        (**self).count_plain_files(scope, left, right)
    }
}
