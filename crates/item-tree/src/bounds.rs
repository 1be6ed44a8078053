//! Resolution of item ids into bounds and items.

use crate::config::NavigatorConfig;
use crate::error::{Result, TreeError};
use crate::filter::VisibilityFilter;
use crate::scope::{resolve_scope, scope_in_table};
use crate::store::{StoreScope, TreeStore};
use crate::types::{CollectionId, Item, ItemId, ItemTreeBounds, ScopeTable};

/// Turns item ids into [`ItemTreeBounds`] and [`Item`] values.
///
/// Nothing is cached: every call reads the store again.
pub struct BoundsResolver<'a, S: ?Sized> {
    store: &'a S,
    config: &'a NavigatorConfig,
}

impl<'a, S: TreeStore + ?Sized> BoundsResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a NavigatorConfig) -> Self {
        Self { store, config }
    }

    /// Scope of the table holding the collection.
    pub fn scope_for(&self, collection_id: CollectionId) -> Result<StoreScope> {
        resolve_scope(self.store, self.config, collection_id)
    }

    /// Bounds of `item` in `table`.
    pub fn resolve(
        &self,
        collection_id: CollectionId,
        item: ItemId,
        table: &ScopeTable,
    ) -> Result<ItemTreeBounds> {
        let scope = scope_in_table(self.config, table, collection_id);
        Ok(self
            .resolve_item(&scope, item, &VisibilityFilter::all())?
            .into_bounds())
    }

    /// Bounds of `item` in whichever table holds the collection.
    pub fn resolve_for_collection(
        &self,
        collection_id: CollectionId,
        item: ItemId,
    ) -> Result<ItemTreeBounds> {
        let scope = self.scope_for(collection_id)?;
        Ok(self
            .resolve_item(&scope, item, &VisibilityFilter::all())?
            .into_bounds())
    }

    /// The item as seen through `filter`.
    pub fn resolve_item(
        &self,
        scope: &StoreScope,
        item: ItemId,
        filter: &VisibilityFilter,
    ) -> Result<Item> {
        let row = self
            .store
            .row(scope, filter, item)?
            .ok_or_else(|| TreeError::not_found(item, scope.to_string()))?;
        Ok(Item::from_row(row, &scope.table))
    }

    /// Bounds of the collection's root, the row without a parent.
    pub fn resolve_root(
        &self,
        collection_id: CollectionId,
        table: &ScopeTable,
    ) -> Result<ItemTreeBounds> {
        let scope = scope_in_table(self.config, table, collection_id);
        let row = self
            .store
            .root_row(&scope)?
            .ok_or_else(|| TreeError::RootNotFound {
                collection: collection_id,
                scope: scope.to_string(),
            })?;
        Ok(ItemTreeBounds::from_row(&row, &scope.table))
    }

    pub fn root_item_id(&self, collection_id: CollectionId, table: &ScopeTable) -> Result<ItemId> {
        Ok(self.resolve_root(collection_id, table)?.item_id())
    }

    pub fn left_and_right(
        &self,
        collection_id: CollectionId,
        item: ItemId,
        table: &ScopeTable,
    ) -> Result<(i64, i64)> {
        let bounds = self.resolve(collection_id, item, table)?;
        Ok((bounds.left(), bounds.right()))
    }

    /// Plain files inside the interval, the item itself included.
    pub fn count_plain_files(&self, bounds: &ItemTreeBounds) -> Result<u64> {
        let scope = scope_in_table(self.config, bounds.table(), bounds.collection_id());
        self.store
            .count_plain_files(&scope, bounds.left(), bounds.right())
    }

    /// Rows visible under `filter` inside the interval, the item itself included.
    pub fn containing_item_count(
        &self,
        bounds: &ItemTreeBounds,
        filter: &VisibilityFilter,
    ) -> Result<u64> {
        let scope = scope_in_table(self.config, bounds.table(), bounds.collection_id());
        self.store
            .count_descendants_in_range(&scope, filter, bounds.left(), bounds.right())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{HierarchyBuilder, MemoryTreeStore};
    use crate::types::Collection;

    fn fixture() -> MemoryTreeStore {
        let mut builder = HierarchyBuilder::new(CollectionId::new(1), "upload.tar");
        let root = builder.root();
        let docs = builder.container(root, "docs").unwrap();
        builder.file(docs, "README", 5).unwrap();
        builder.file(docs, "NOTES", 6).unwrap();
        builder.file(root, "setup.py", 7).unwrap();

        let store = MemoryTreeStore::new();
        store.register_collection(Collection {
            id: CollectionId::new(1),
            scope_table: None,
        });
        store.load_scope("uploadtree", builder.build()).unwrap();
        store
    }

    #[test]
    fn resolves_bounds_and_root() {
        let store = fixture();
        let config = NavigatorConfig::default();
        let resolver = BoundsResolver::new(&store, &config);
        let table = ScopeTable::default();
        let collection = CollectionId::new(1);

        let root = resolver.resolve_root(collection, &table).unwrap();
        assert_eq!(root.item_id(), ItemId::new(1));
        assert_eq!((root.left(), root.right()), (1, 10));

        let docs = resolver.resolve(collection, ItemId::new(2), &table).unwrap();
        assert!(root.contains(&docs));
        assert_eq!(docs.descendant_count(), 2);
        assert_eq!(
            resolver
                .left_and_right(collection, ItemId::new(3), &table)
                .unwrap(),
            (3, 4)
        );
        assert_eq!(
            resolver
                .resolve_for_collection(collection, ItemId::new(2))
                .unwrap(),
            docs
        );
        assert_eq!(
            resolver.root_item_id(collection, &table).unwrap(),
            ItemId::new(1)
        );
    }

    #[test]
    fn missing_rows_are_not_found() {
        let store = fixture();
        let config = NavigatorConfig::default();
        let resolver = BoundsResolver::new(&store, &config);

        let error = resolver
            .resolve(CollectionId::new(1), ItemId::new(99), &ScopeTable::default())
            .unwrap_err();
        assert!(matches!(error, TreeError::NotFound { item, .. } if item == ItemId::new(99)));

        let error = resolver
            .resolve_root(CollectionId::new(2), &ScopeTable::default())
            .unwrap_err();
        assert!(matches!(error, TreeError::RootNotFound { .. }));
    }

    #[test]
    fn filtered_item_is_not_found() {
        let store = fixture();
        let config = NavigatorConfig::default();
        let resolver = BoundsResolver::new(&store, &config);
        let scope = resolver.scope_for(CollectionId::new(1)).unwrap();

        let hidden = VisibilityFilter::name_contains("readme").negate();
        assert!(resolver
            .resolve_item(&scope, ItemId::new(3), &hidden)
            .is_err());
        let item = resolver
            .resolve_item(&scope, ItemId::new(4), &hidden)
            .unwrap();
        assert_eq!(item.name(), "NOTES");
        assert_eq!(item.parent_id(), Some(ItemId::new(2)));
    }

    #[test]
    fn interval_counts() {
        let store = fixture();
        let config = NavigatorConfig::default();
        let resolver = BoundsResolver::new(&store, &config);
        let root = resolver
            .resolve_root(CollectionId::new(1), &ScopeTable::default())
            .unwrap();

        assert_eq!(resolver.count_plain_files(&root).unwrap(), 3);
        assert_eq!(
            resolver
                .containing_item_count(&root, &VisibilityFilter::all())
                .unwrap(),
            5
        );
        let only_files = crate::filter::FilterParser::parse("file").unwrap();
        assert_eq!(resolver.containing_item_count(&root, &only_files).unwrap(), 3);
    }
}
