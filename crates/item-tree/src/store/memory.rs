//! In-memory tree store.
//!
//! Rows are grouped per scope table. Each table keeps a children index
//! sorted by `(name, id)` and a left-bound index for interval counts, so
//! rank and range queries never need to walk the whole table.

use std::path::Path;

use fnv::FnvHashMap;
use parking_lot::{RwLock, RwLockReadGuard};

use super::snapshot::{load_scope_snapshot, write_scope_snapshot, ScopeSnapshot};
use super::{StoreScope, TreeStore};
use crate::error::{Result, TreeError};
use crate::filter::VisibilityFilter;
use crate::types::{Collection, CollectionId, ItemId, ItemRow, ScopeTable};

// ---------------------------------------------------------------------------
// Scope rows
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ScopeRows {
    rows: FnvHashMap<ItemId, ItemRow>,
    /// Children per parent, sorted by `(name, id)`. Roots live under `None`.
    children: FnvHashMap<Option<ItemId>, Vec<ItemId>>,
    /// `(left, id)` pairs sorted ascending.
    by_left: Vec<(i64, ItemId)>,
}

impl ScopeRows {
    /// Validates the nested-set layout and builds the lookup indices.
    fn from_rows(table: &ScopeTable, rows: Vec<ItemRow>) -> Result<Self> {
        let mut by_collection: FnvHashMap<CollectionId, Vec<&ItemRow>> = FnvHashMap::default();
        for row in &rows {
            if row.left >= row.right {
                return Err(TreeError::InvalidInput(format!(
                    "item {} in {table} has inverted bounds [{}, {}]",
                    row.id, row.left, row.right
                )));
            }
            by_collection.entry(row.collection_id).or_default().push(row);
        }
        for (collection_id, collection_rows) in by_collection.iter_mut() {
            validate_nesting(table, *collection_id, collection_rows)?;
        }

        let mut scope_rows = ScopeRows::default();
        for row in rows {
            let id = row.id;
            scope_rows.children.entry(row.parent).or_default().push(id);
            scope_rows.by_left.push((row.left, id));
            if scope_rows.rows.insert(id, row).is_some() {
                return Err(TreeError::InvalidInput(format!(
                    "duplicate item id {id} in {table}"
                )));
            }
        }

        let rows_by_id = &scope_rows.rows;
        for siblings in scope_rows.children.values_mut() {
            siblings.sort_by(|a, b| {
                let (a, b) = (&rows_by_id[a], &rows_by_id[b]);
                a.name.cmp(&b.name).then(a.id.cmp(&b.id))
            });
        }
        scope_rows.by_left.sort_unstable();

        Ok(scope_rows)
    }

    fn visible_children<'a>(
        &'a self,
        scope: &'a StoreScope,
        filter: &'a VisibilityFilter,
        parent: ItemId,
    ) -> impl Iterator<Item = &'a ItemRow> + 'a {
        self.children
            .get(&Some(parent))
            .into_iter()
            .flatten()
            .filter_map(|id| self.rows.get(id))
            .filter(move |row| scope.admits_collection(row.collection_id) && filter.matches(row))
    }

    fn rows_in_range<'a>(
        &'a self,
        scope: &'a StoreScope,
        left: i64,
        right: i64,
    ) -> impl Iterator<Item = &'a ItemRow> + 'a {
        let start = self.by_left.partition_point(|(l, _)| *l < left);
        let end = self.by_left.partition_point(|(l, _)| *l <= right);
        self.by_left[start..end.max(start)]
            .iter()
            .filter_map(|(_, id)| self.rows.get(id))
            .filter(move |row| scope.admits_collection(row.collection_id))
    }
}

/// Checks one collection's rows form a single properly nested tree.
fn validate_nesting(
    table: &ScopeTable,
    collection_id: CollectionId,
    rows: &mut [&ItemRow],
) -> Result<()> {
    rows.sort_by_key(|row| (row.left, row.right));

    let mut open: Vec<&ItemRow> = Vec::new();
    let mut root_seen = false;
    for row in rows.iter() {
        while open.last().is_some_and(|top| top.right < row.left) {
            open.pop();
        }
        match open.last() {
            None => {
                if row.parent.is_some() {
                    return Err(TreeError::InvalidInput(format!(
                        "item {} in {table} names a parent but is not nested in any interval",
                        row.id
                    )));
                }
                if root_seen {
                    return Err(TreeError::InvalidInput(format!(
                        "collection {collection_id} in {table} has more than one root"
                    )));
                }
                root_seen = true;
            }
            Some(top) => {
                if row.left <= top.left || row.right >= top.right {
                    return Err(TreeError::InvalidInput(format!(
                        "item {} in {table} overlaps item {} without nesting",
                        row.id, top.id
                    )));
                }
                if row.parent != Some(top.id) {
                    return Err(TreeError::InvalidInput(format!(
                        "item {} in {table} is nested in item {} but names parent {:?}",
                        row.id,
                        top.id,
                        row.parent.map(ItemId::get)
                    )));
                }
            }
        }
        open.push(row);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    tables: FnvHashMap<ScopeTable, ScopeRows>,
    collections: FnvHashMap<CollectionId, Collection>,
}

impl MemoryState {
    fn table(&self, scope: &StoreScope) -> Result<&ScopeRows> {
        self.tables.get(&scope.table).ok_or_else(|| {
            TreeError::StoreUnavailable(format!("scope table {} is not loaded", scope.table))
        })
    }
}

impl TreeStore for MemoryState {
    fn collection(&self, collection_id: CollectionId) -> Result<Option<Collection>> {
        Ok(self.collections.get(&collection_id).cloned())
    }

    fn row(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        item: ItemId,
    ) -> Result<Option<ItemRow>> {
        Ok(self
            .table(scope)?
            .rows
            .get(&item)
            .filter(|row| scope.admits_collection(row.collection_id) && filter.matches(row))
            .cloned())
    }

    fn root_row(&self, scope: &StoreScope) -> Result<Option<ItemRow>> {
        let table = self.table(scope)?;
        Ok(table
            .children
            .get(&None)
            .into_iter()
            .flatten()
            .filter_map(|id| table.rows.get(id))
            .find(|row| scope.admits_collection(row.collection_id))
            .cloned())
    }

    fn count_visible_children(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
    ) -> Result<u64> {
        Ok(self
            .table(scope)?
            .visible_children(scope, filter, parent)
            .count() as u64)
    }

    fn rank_of(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
        item: ItemId,
    ) -> Result<Option<u64>> {
        Ok(self
            .table(scope)?
            .visible_children(scope, filter, parent)
            .position(|row| row.id == item)
            .map(|rank| rank as u64))
    }

    fn child_at_rank(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        parent: ItemId,
        rank: u64,
    ) -> Result<Option<ItemRow>> {
        let Ok(rank) = usize::try_from(rank) else {
            return Ok(None);
        };
        Ok(self
            .table(scope)?
            .visible_children(scope, filter, parent)
            .nth(rank)
            .cloned())
    }

    fn count_descendants_in_range(
        &self,
        scope: &StoreScope,
        filter: &VisibilityFilter,
        left: i64,
        right: i64,
    ) -> Result<u64> {
        Ok(self
            .table(scope)?
            .rows_in_range(scope, left, right)
            .filter(|row| filter.matches(row))
            .count() as u64)
    }

    fn count_plain_files(&self, scope: &StoreScope, left: i64, right: i64) -> Result<u64> {
        Ok(self
            .table(scope)?
            .rows_in_range(scope, left, right)
            .filter(|row| row.is_plain_file())
            .count() as u64)
    }
}

// ---------------------------------------------------------------------------
// Public store
// ---------------------------------------------------------------------------

/// Thread-safe in-memory [`TreeStore`].
///
/// Single queries take a read lock each. Use [`MemoryTreeStore::snapshot`] to
/// run a whole traversal against one consistent view.
#[derive(Debug, Default)]
pub struct MemoryTreeStore {
    state: RwLock<MemoryState>,
}

/// A read guard over the whole store.
pub struct MemorySnapshot<'a> {
    guard: RwLockReadGuard<'a, MemoryState>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store for reading until the snapshot is dropped.
    pub fn snapshot(&self) -> MemorySnapshot<'_> {
        MemorySnapshot {
            guard: self.state.read(),
        }
    }

    pub fn register_collection(&self, collection: Collection) {
        self.state.write().collections.insert(collection.id, collection);
    }

    /// Replaces the contents of a scope table after validating its layout.
    pub fn load_scope(&self, table: impl Into<ScopeTable>, rows: Vec<ItemRow>) -> Result<()> {
        self.install_scope(table.into(), rows, Vec::new())
    }

    /// Validates `rows`, then publishes the table and the collection records
    /// together. Nothing is changed if validation fails.
    fn install_scope(
        &self,
        table: ScopeTable,
        rows: Vec<ItemRow>,
        collections: Vec<Collection>,
    ) -> Result<()> {
        let row_count = rows.len();
        let scope_rows = ScopeRows::from_rows(&table, rows)?;

        let mut state = self.state.write();
        for collection in collections {
            state.collections.insert(collection.id, collection);
        }
        state.tables.insert(table.clone(), scope_rows);
        drop(state);

        log::debug!("loaded scope table {table} ({row_count} rows)");
        Ok(())
    }

    pub fn has_scope(&self, table: &ScopeTable) -> bool {
        self.state.read().tables.contains_key(table)
    }

    /// Rows of a scope table ordered by left bound.
    pub fn export_scope(&self, table: &ScopeTable) -> Option<Vec<ItemRow>> {
        let state = self.state.read();
        let scope_rows = state.tables.get(table)?;
        Some(
            scope_rows
                .by_left
                .iter()
                .filter_map(|(_, id)| scope_rows.rows.get(id).cloned())
                .collect(),
        )
    }

    /// Writes a scope table and the collections stored in it to disk.
    pub fn save_scope(&self, table: &ScopeTable, path: &Path) -> Result<()> {
        let rows = self.export_scope(table).ok_or_else(|| {
            TreeError::StoreUnavailable(format!("scope table {table} is not loaded"))
        })?;
        let collections = {
            let state = self.state.read();
            let mut collections = state
                .collections
                .values()
                .filter(|collection| rows.iter().any(|row| row.collection_id == collection.id))
                .cloned()
                .collect::<Vec<_>>();
            collections.sort_by_key(|collection| collection.id);
            collections
        };
        write_scope_snapshot(path, &ScopeSnapshot::new(table.clone(), collections, rows))
    }

    /// Loads a scope table previously written with [`MemoryTreeStore::save_scope`].
    pub fn load_scope_file(&self, path: &Path) -> Result<ScopeTable> {
        let snapshot = load_scope_snapshot(path)?;
        let table = snapshot.table.clone();
        self.install_scope(table.clone(), snapshot.rows, snapshot.collections)?;
        Ok(table)
    }
}

macro_rules! delegate_tree_store {
    ($ty:ty, $state:ident => $access:expr) => {
        impl TreeStore for $ty {
            fn collection(&self, collection_id: CollectionId) -> Result<Option<Collection>> {
                let $state = self;
                $access.collection(collection_id)
            }

            fn row(
                &self,
                scope: &StoreScope,
                filter: &VisibilityFilter,
                item: ItemId,
            ) -> Result<Option<ItemRow>> {
                let $state = self;
                $access.row(scope, filter, item)
            }

            fn root_row(&self, scope: &StoreScope) -> Result<Option<ItemRow>> {
                let $state = self;
                $access.root_row(scope)
            }

            fn count_visible_children(
                &self,
                scope: &StoreScope,
                filter: &VisibilityFilter,
                parent: ItemId,
            ) -> Result<u64> {
                let $state = self;
                $access.count_visible_children(scope, filter, parent)
            }

            fn rank_of(
                &self,
                scope: &StoreScope,
                filter: &VisibilityFilter,
                parent: ItemId,
                item: ItemId,
            ) -> Result<Option<u64>> {
                let $state = self;
                $access.rank_of(scope, filter, parent, item)
            }

            fn child_at_rank(
                &self,
                scope: &StoreScope,
                filter: &VisibilityFilter,
                parent: ItemId,
                rank: u64,
            ) -> Result<Option<ItemRow>> {
                let $state = self;
                $access.child_at_rank(scope, filter, parent, rank)
            }

            fn count_descendants_in_range(
                &self,
                scope: &StoreScope,
                filter: &VisibilityFilter,
                left: i64,
                right: i64,
            ) -> Result<u64> {
                let $state = self;
                $access.count_descendants_in_range(scope, filter, left, right)
            }

            fn count_plain_files(&self, scope: &StoreScope, left: i64, right: i64) -> Result<u64> {
                let $state = self;
                $access.count_plain_files(scope, left, right)
            }
        }
    };
}

delegate_tree_store!(MemoryTreeStore, store => store.state.read());
delegate_tree_store!(MemorySnapshot<'_>, snapshot => snapshot.guard);
