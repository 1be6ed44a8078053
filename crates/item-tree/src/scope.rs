//! Scope table resolution for collections.

use crate::config::NavigatorConfig;
use crate::error::Result;
use crate::store::{StoreScope, TreeStore};
use crate::types::{CollectionId, ScopeTable};

/// Builds the query scope for `table`, restricted to the collection when the
/// table is shared.
pub fn scope_in_table(
    config: &NavigatorConfig,
    table: &ScopeTable,
    collection_id: CollectionId,
) -> StoreScope {
    if config.is_shared_table(table) {
        StoreScope::shared(table.clone(), collection_id)
    } else {
        StoreScope::dedicated(table.clone(), collection_id)
    }
}

/// Looks up which table holds the collection.
///
/// Unknown collections, and collections without a table of their own, map
/// to the configured default table.
pub fn resolve_scope<S: TreeStore + ?Sized>(
    store: &S,
    config: &NavigatorConfig,
    collection_id: CollectionId,
) -> Result<StoreScope> {
    let table = store
        .collection(collection_id)?
        .and_then(|collection| collection.scope_table)
        .unwrap_or_else(|| config.default_scope_table.clone());
    Ok(scope_in_table(config, &table, collection_id))
}
