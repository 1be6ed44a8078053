//! Adjacent-item lookup over a stored hierarchy.
//!
//! The walk never loads the tree. It keeps a cursor on one item and asks the
//! store for sibling counts, ranks and the child at a rank, all under the
//! caller's visibility filter, recomputed on every hop.
//!
//! ## Walk rules
//!
//! - Forward enters containers on arrival (pre-order).
//! - Backward never re-enters the container it starts in or ascends to,
//!   but entering a container while stepping backward lands on its last
//!   visible child.
//! - When a level is exhausted the walk ascends to the parent with entry
//!   disabled, and ends at the root.
//!
//! Forward then Backward is therefore not an identity: stepping forward from
//! a container lands inside it, stepping backward from there ascends past
//! the container instead of returning to it.

use crate::bounds::BoundsResolver;
use crate::cancel::CancellationToken;
use crate::config::{EmptyContainerPolicy, NavigatorConfig};
use crate::error::{Result, TreeError};
use crate::filter::VisibilityFilter;
use crate::store::{StoreScope, TreeStore};
use crate::types::{Adjacent, CollectionId, Direction, Item, ItemId, ItemRow};

/// Finds the next or previous visible item of a hierarchy.
#[derive(Debug, Clone)]
pub struct TreeNavigator<S> {
    store: S,
    config: NavigatorConfig,
}

impl<S: TreeStore> TreeNavigator<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, NavigatorConfig::default())
    }

    pub fn with_config(store: S, config: NavigatorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn bounds(&self) -> BoundsResolver<'_, S> {
        BoundsResolver::new(&self.store, &self.config)
    }

    pub fn next_item(
        &self,
        collection_id: CollectionId,
        item: ItemId,
        filter: &VisibilityFilter,
    ) -> Result<Adjacent> {
        self.find_adjacent(collection_id, item, Direction::Forward, filter)
    }

    pub fn previous_item(
        &self,
        collection_id: CollectionId,
        item: ItemId,
        filter: &VisibilityFilter,
    ) -> Result<Adjacent> {
        self.find_adjacent(collection_id, item, Direction::Backward, filter)
    }

    pub fn find_adjacent(
        &self,
        collection_id: CollectionId,
        item: ItemId,
        direction: Direction,
        filter: &VisibilityFilter,
    ) -> Result<Adjacent> {
        self.find_adjacent_with_cancel(
            collection_id,
            item,
            direction,
            filter,
            &CancellationToken::noop(),
        )
    }

    /// Looks up the visible item adjacent to `item` in depth-first order.
    ///
    /// `item` is visible for the duration of the call even if `filter`
    /// rejects it. Running off either end of the hierarchy yields
    /// [`Adjacent::EndOfHierarchy`]; an unknown `item` is
    /// [`TreeError::NotFound`].
    pub fn find_adjacent_with_cancel(
        &self,
        collection_id: CollectionId,
        item: ItemId,
        direction: Direction,
        filter: &VisibilityFilter,
        cancel: &CancellationToken,
    ) -> Result<Adjacent> {
        let scope = self.bounds().scope_for(collection_id)?;
        let mut walk = Walk::new(&self.store, &self.config, scope, filter, item, direction, cancel);

        let result = walk.run(item);
        match &result {
            Ok(Adjacent::Found(found)) => log::debug!(
                "{} lookup from item {item} in {} found item {} after {} store queries",
                direction.as_str(),
                walk.scope,
                found.id(),
                walk.hops
            ),
            Ok(Adjacent::EndOfHierarchy) => log::debug!(
                "{} lookup from item {item} in {} reached the end after {} store queries",
                direction.as_str(),
                walk.scope,
                walk.hops
            ),
            Err(TreeError::StoreUnavailable(reason)) => log::warn!(
                "{} lookup from item {item} in {} failed: {reason}",
                direction.as_str(),
                walk.scope
            ),
            Err(_) => {}
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Walk state
// ---------------------------------------------------------------------------

/// State of one lookup. Dropped when the call returns.
struct Walk<'a, S: ?Sized> {
    store: &'a S,
    scope: StoreScope,
    /// Caller filter widened by the always-visible mode bits.
    base_filter: VisibilityFilter,
    /// Items visible regardless of the filter: the anchor and every ancestor
    /// the walk has ascended through.
    admitted: Vec<ItemId>,
    filter: VisibilityFilter,
    direction: Direction,
    empty_containers: EmptyContainerPolicy,
    cancel: &'a CancellationToken,
    max_hops: u64,
    hops: u64,
}

impl<'a, S: TreeStore + ?Sized> Walk<'a, S> {
    fn new(
        store: &'a S,
        config: &NavigatorConfig,
        scope: StoreScope,
        filter: &VisibilityFilter,
        anchor: ItemId,
        direction: Direction,
        cancel: &'a CancellationToken,
    ) -> Self {
        let base_filter = filter.clone().with_always_visible(config.always_visible());
        let admitted = vec![anchor];
        let filter = base_filter.clone().admitting(&admitted);
        Self {
            store,
            scope,
            base_filter,
            admitted,
            filter,
            direction,
            empty_containers: config.empty_containers,
            cancel,
            max_hops: config.max_hops,
            hops: 0,
        }
    }

    fn run(&mut self, anchor: ItemId) -> Result<Adjacent> {
        let mut current = self.resolve(anchor)?;
        let mut enter_containers = self.direction == Direction::Forward;

        loop {
            if enter_containers {
                if let Some(found) = self.enter_if_container(&current)? {
                    return Ok(Adjacent::Found(found));
                }
            }
            if let Some(found) = self.next_sibling(&current)? {
                return Ok(Adjacent::Found(found));
            }

            let Some(parent) = current.parent_id() else {
                return Ok(Adjacent::EndOfHierarchy);
            };
            self.admit(parent);
            current = self.resolve(parent)?;
            enter_containers = false;
        }
    }

    /// Descends into `item` if it is a container with visible children.
    ///
    /// Forward lands on the first child, Backward on the last; a child that
    /// is itself a container is settled the same way.
    fn enter_if_container(&mut self, item: &Item) -> Result<Option<Item>> {
        if !item.is_container() {
            return Ok(None);
        }
        let count = self.count_children(item.id())?;
        for offset in 0..count {
            let rank = match self.direction {
                Direction::Forward => offset,
                Direction::Backward => count - 1 - offset,
            };
            let Some(child) = self.child_at(item.id(), rank)? else {
                continue;
            };
            if let Some(found) = self.settle(child)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Steps away from `item` among its visible siblings.
    ///
    /// The root has no siblings: its rank is 0 in a sibling set of size 1.
    fn next_sibling(&mut self, item: &Item) -> Result<Option<Item>> {
        let Some(parent) = item.parent_id() else {
            return Ok(None);
        };
        let sibling_count = self.count_children(parent)?;
        let rank = self.rank_of(parent, item.id())?;

        let step = self.direction.step();
        let mut target = rank as i64 + step;
        while target >= 0 && (target as u64) < sibling_count {
            if let Some(sibling) = self.child_at(parent, target as u64)? {
                if let Some(found) = self.settle(sibling)? {
                    return Ok(Some(found));
                }
            }
            target += step;
        }
        Ok(None)
    }

    /// Resolves a candidate: leaves are final, containers are entered.
    fn settle(&mut self, candidate: Item) -> Result<Option<Item>> {
        if !candidate.is_container() {
            return Ok(Some(candidate));
        }
        if let Some(found) = self.enter_if_container(&candidate)? {
            return Ok(Some(found));
        }
        match self.empty_containers {
            EmptyContainerPolicy::Yield => Ok(Some(candidate)),
            EmptyContainerPolicy::Skip => Ok(None),
        }
    }

    fn admit(&mut self, item: ItemId) {
        if !self.admitted.contains(&item) {
            self.admitted.push(item);
            self.filter = self.base_filter.clone().admitting(&self.admitted);
        }
    }

    // -----------------------------------------------------------------------
    // Store access
    // -----------------------------------------------------------------------

    fn tick(&mut self) -> Result<()> {
        self.cancel.is_cancelled().ok_or(TreeError::Cancelled)?;
        if self.hops >= self.max_hops {
            return Err(TreeError::TraversalLimit {
                limit: self.max_hops,
            });
        }
        self.hops += 1;
        Ok(())
    }

    fn resolve(&mut self, item: ItemId) -> Result<Item> {
        self.tick()?;
        let row = self
            .store
            .row(&self.scope, &self.filter, item)?
            .ok_or_else(|| TreeError::not_found(item, self.scope.to_string()))?;
        Ok(self.item(row))
    }

    fn count_children(&mut self, parent: ItemId) -> Result<u64> {
        self.tick()?;
        self.store
            .count_visible_children(&self.scope, &self.filter, parent)
    }

    fn rank_of(&mut self, parent: ItemId, item: ItemId) -> Result<u64> {
        self.tick()?;
        self.store
            .rank_of(&self.scope, &self.filter, parent, item)?
            .ok_or_else(|| {
                TreeError::Internal(format!(
                    "item {item} is not among the visible children of item {parent}"
                ))
            })
    }

    fn child_at(&mut self, parent: ItemId, rank: u64) -> Result<Option<Item>> {
        self.tick()?;
        Ok(self
            .store
            .child_at_rank(&self.scope, &self.filter, parent, rank)?
            .map(|row| self.item(row)))
    }

    fn item(&self, row: ItemRow) -> Item {
        Item::from_row(row, &self.scope.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::LookupVersionTracker;
    use crate::filter::FilterParser;
    use crate::store::{HierarchyBuilder, MemoryTreeStore};
    use crate::types::{Collection, ItemMode, ScopeTable};
    use std::time::Duration;

    const COLLECTION: CollectionId = CollectionId::new(1);

    struct Fixture {
        navigator: TreeNavigator<MemoryTreeStore>,
    }

    impl Fixture {
        fn new(builder: &HierarchyBuilder) -> Self {
            Self::with_config(builder, NavigatorConfig::default())
        }

        fn with_config(builder: &HierarchyBuilder, config: NavigatorConfig) -> Self {
            let store = MemoryTreeStore::new();
            store.load_scope("uploadtree", builder.build()).unwrap();
            Self {
                navigator: TreeNavigator::with_config(store, config),
            }
        }

        fn step(&self, from: ItemId, direction: Direction, filter: &str) -> Option<ItemId> {
            let filter = FilterParser::parse(filter).unwrap();
            self.navigator
                .find_adjacent(COLLECTION, from, direction, &filter)
                .unwrap()
                .into_item()
                .map(|item| item.id())
        }

        fn next(&self, from: ItemId) -> Option<ItemId> {
            self.step(from, Direction::Forward, "")
        }

        fn previous(&self, from: ItemId) -> Option<ItemId> {
            self.step(from, Direction::Backward, "")
        }

        /// Every item reached by repeated lookups from `start`.
        fn walk(&self, start: ItemId, direction: Direction, filter: &str) -> Vec<ItemId> {
            let mut seen = Vec::new();
            let mut current = start;
            while let Some(next) = self.step(current, direction, filter) {
                seen.push(next);
                current = next;
            }
            seen
        }
    }

    /// `root -> [A -> [A1], B]`
    struct Scenario {
        root: ItemId,
        a: ItemId,
        a1: ItemId,
        b: ItemId,
        fixture: Fixture,
    }

    fn scenario() -> Scenario {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let a = builder.container(root, "A").unwrap();
        let a1 = builder.file(a, "A1", 10).unwrap();
        let b = builder.file(root, "B", 11).unwrap();
        Scenario {
            root,
            a,
            a1,
            b,
            fixture: Fixture::new(&builder),
        }
    }

    #[test]
    fn forward_through_scenario() {
        let s = scenario();
        assert_eq!(s.fixture.next(s.a), Some(s.a1));
        assert_eq!(s.fixture.next(s.a1), Some(s.b));
        assert_eq!(s.fixture.next(s.b), None);
    }

    #[test]
    fn forward_from_root_descends_to_first_leaf() {
        let s = scenario();
        // A is entered on arrival because it has a visible child.
        assert_eq!(s.fixture.next(s.root), Some(s.a1));
    }

    #[test]
    fn backward_through_scenario() {
        let s = scenario();
        // Stepping back onto A enters it at its last child.
        assert_eq!(s.fixture.previous(s.b), Some(s.a1));
        // From A1 the walk ascends to A without re-entering it, then to the root.
        assert_eq!(s.fixture.previous(s.a1), None);
        assert_eq!(s.fixture.previous(s.a), None);
    }

    #[test]
    fn backward_from_root_ends() {
        let s = scenario();
        let outcome = s
            .fixture
            .navigator
            .previous_item(COLLECTION, s.root, &VisibilityFilter::all())
            .unwrap();
        assert!(outcome.is_end());
    }

    #[test]
    fn forward_then_backward_is_directional() {
        let s = scenario();
        // Leaf to leaf round-trips exactly.
        let next = s.fixture.next(s.a1).unwrap();
        assert_eq!(s.fixture.previous(next), Some(s.a1));
        // Out of a container it does not: the container is never revisited.
        let inside = s.fixture.next(s.a).unwrap();
        assert_eq!(inside, s.a1);
        assert_ne!(s.fixture.previous(inside), Some(s.a));
    }

    #[test]
    fn full_walks_visit_leaves_in_order() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "pkg.tar");
        let root = builder.root();
        let src = builder.container(root, "src").unwrap();
        let lib = builder.file(src, "lib.c", 1).unwrap();
        let main = builder.file(src, "main.c", 2).unwrap();
        let nested = builder.container(src, "util").unwrap();
        let strings = builder.file(nested, "strings.c", 3).unwrap();
        let license = builder.file(root, "LICENSE", 4).unwrap();
        let readme = builder.file(root, "README", 5).unwrap();
        let fixture = Fixture::new(&builder);

        // Byte order puts upper-case names first.
        assert_eq!(
            fixture.walk(root, Direction::Forward, ""),
            vec![license, readme, lib, main, strings]
        );
        assert_eq!(
            fixture.walk(readme, Direction::Backward, ""),
            vec![license]
        );
        assert_eq!(
            fixture.walk(strings, Direction::Backward, ""),
            vec![main, lib, readme, license]
        );
    }

    #[test]
    fn empty_container_is_yielded_but_never_entered() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let empty = builder.container(root, "A").unwrap();
        let b = builder.file(root, "B", 1).unwrap();
        let fixture = Fixture::new(&builder);

        assert_eq!(fixture.next(root), Some(empty));
        assert_eq!(fixture.next(empty), Some(b));
        assert_eq!(fixture.previous(b), Some(empty));
    }

    #[test]
    fn skip_policy_steps_past_empty_containers() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let empty = builder.container(root, "A").unwrap();
        let deeper = builder.container(empty, "inner").unwrap();
        builder.container(deeper, "innermost").unwrap();
        let b = builder.file(root, "B", 1).unwrap();
        let config = NavigatorConfig {
            empty_containers: EmptyContainerPolicy::Skip,
            ..NavigatorConfig::default()
        };
        let fixture = Fixture::with_config(&builder, config);

        assert_eq!(fixture.next(root), Some(b));
        assert_eq!(fixture.previous(b), None);
        assert_eq!(fixture.next(empty), Some(b));
    }

    #[test]
    fn forward_from_container_with_hidden_children_stays_outside() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let dir = builder.container(root, "A").unwrap();
        builder.file(dir, "a.tmp", 1).unwrap();
        let b = builder.file(root, "B.c", 2).unwrap();
        let fixture = Fixture::new(&builder);

        assert_eq!(fixture.step(dir, Direction::Forward, "ext:c"), Some(b));
    }

    #[test]
    fn filter_removes_items_from_both_directions() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let a = builder.file(root, "a.txt", 1).unwrap();
        let b = builder.file(root, "b.txt", 2).unwrap();
        let c = builder.file(root, "c.txt", 3).unwrap();
        let fixture = Fixture::new(&builder);
        let hide_b = "not name:b.txt";

        assert_eq!(fixture.step(a, Direction::Forward, hide_b), Some(c));
        assert_eq!(fixture.step(c, Direction::Backward, hide_b), Some(a));
        // The anchor stays visible even when the filter rejects it.
        assert_eq!(fixture.step(b, Direction::Forward, hide_b), Some(c));
        assert_eq!(fixture.step(b, Direction::Backward, hide_b), Some(a));
    }

    #[test]
    fn containers_stay_visible_under_file_filters() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let docs = builder.container(root, "docs").unwrap();
        let guide = builder.file(docs, "guide.md", 1).unwrap();
        let meta = builder.artifact(root, "meta").unwrap();
        let tail = builder.file(root, "z.md", 2).unwrap();
        let fixture = Fixture::new(&builder);

        // The artifact has no children and is yielded as a stop of its own.
        assert_eq!(
            fixture.walk(root, Direction::Forward, "ext:md"),
            vec![guide, meta, tail]
        );
        assert_eq!(
            fixture.walk(tail, Direction::Backward, "ext:md"),
            vec![meta, guide]
        );
    }

    #[test]
    fn hidden_ancestors_are_admitted_while_ascending() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let dir = builder.container(root, "D").unwrap();
        let x = builder.file(dir, "x.txt", 1).unwrap();
        let y = builder.file(root, "y.txt", 2).unwrap();
        let config = NavigatorConfig {
            always_visible_mode: 0,
            ..NavigatorConfig::default()
        };
        let fixture = Fixture::with_config(&builder, config);

        assert_eq!(fixture.step(x, Direction::Forward, "file"), Some(y));
        assert_eq!(fixture.step(x, Direction::Backward, "file"), None);
        assert_eq!(fixture.step(root, Direction::Forward, "file"), Some(y));
    }

    #[test]
    fn duplicate_names_order_deterministically() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let first = builder.file(root, "x.txt", 1).unwrap();
        let second = builder.file(root, "x.txt", 2).unwrap();
        let fixture = Fixture::new(&builder);

        for _ in 0..3 {
            assert_eq!(fixture.next(first), Some(second));
            assert_eq!(fixture.previous(second), Some(first));
            assert_eq!(fixture.next(second), None);
        }
    }

    #[test]
    fn unknown_anchor_is_not_found() {
        let s = scenario();
        let error = s
            .fixture
            .navigator
            .next_item(COLLECTION, ItemId::new(999), &VisibilityFilter::all())
            .unwrap_err();
        assert!(matches!(error, TreeError::NotFound { .. }));
    }

    #[test]
    fn other_collections_are_not_visible() {
        let s = scenario();
        let error = s
            .fixture
            .navigator
            .next_item(CollectionId::new(2), s.a1, &VisibilityFilter::all())
            .unwrap_err();
        assert!(matches!(error, TreeError::NotFound { .. }));
    }

    #[test]
    fn dedicated_scope_tables_are_used() {
        let mut builder = HierarchyBuilder::new(CollectionId::new(7), "upload.zip");
        let only = builder.file(builder.root(), "only.txt", 1).unwrap();
        let store = MemoryTreeStore::new();
        store.register_collection(Collection {
            id: CollectionId::new(7),
            scope_table: Some(ScopeTable::from("uploadtree_7")),
        });
        store.load_scope("uploadtree_7", builder.build()).unwrap();
        let navigator = TreeNavigator::new(&store);

        let found = navigator
            .next_item(CollectionId::new(7), builder.root(), &VisibilityFilter::all())
            .unwrap()
            .into_item()
            .unwrap();
        assert_eq!(found.id(), only);
        assert_eq!(found.bounds().table(), &ScopeTable::from("uploadtree_7"));
        assert_eq!(found.mode(), ItemMode::empty());
    }

    #[test]
    fn missing_scope_table_is_unavailable() {
        let store = MemoryTreeStore::new();
        store.register_collection(Collection {
            id: COLLECTION,
            scope_table: Some(ScopeTable::from("uploadtree_1")),
        });
        let navigator = TreeNavigator::new(store.snapshot());

        let error = navigator
            .next_item(COLLECTION, ItemId::new(1), &VisibilityFilter::all())
            .unwrap_err();
        assert!(matches!(error, TreeError::StoreUnavailable(_)));
    }

    #[test]
    fn cancelled_lookups_stop() {
        let s = scenario();
        let tracker = LookupVersionTracker::new();
        let token = tracker.token_for_version(tracker.next_version());
        tracker.next_version();

        let error = s
            .fixture
            .navigator
            .find_adjacent_with_cancel(
                COLLECTION,
                s.a1,
                Direction::Forward,
                &VisibilityFilter::all(),
                &token,
            )
            .unwrap_err();
        assert!(matches!(error, TreeError::Cancelled));

        let expired = CancellationToken::noop().with_timeout(Duration::ZERO);
        let error = s
            .fixture
            .navigator
            .find_adjacent_with_cancel(
                COLLECTION,
                s.a1,
                Direction::Forward,
                &VisibilityFilter::all(),
                &expired,
            )
            .unwrap_err();
        assert!(matches!(error, TreeError::Cancelled));
    }

    #[test]
    fn hop_limit_is_enforced() {
        let mut builder = HierarchyBuilder::new(COLLECTION, "root");
        let root = builder.root();
        let deep = builder.container(root, "a").unwrap();
        let leaf = builder.file(deep, "leaf", 1).unwrap();
        builder.file(root, "b", 2).unwrap();
        let config = NavigatorConfig {
            max_hops: 3,
            ..NavigatorConfig::default()
        };
        let fixture = Fixture::with_config(&builder, config);

        let error = fixture
            .navigator
            .next_item(COLLECTION, leaf, &VisibilityFilter::all())
            .unwrap_err();
        assert!(matches!(error, TreeError::TraversalLimit { limit: 3 }));
    }
}
