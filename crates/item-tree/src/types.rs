//! Value types shared by the store, the bounds resolver and the navigator.
//!
//! Everything in here is a transient query result: built fresh from a row,
//! never mutated, and dropped once the call that produced it returns.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Scope table used when a collection does not name its own.
pub const DEFAULT_SCOPE_TABLE: &str = "uploadtree";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of an item, unique across every hierarchy in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a collection, i.e. one hierarchy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(u64);

impl CollectionId {
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name of a table (or materialized view) holding hierarchy rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeTable(String);

impl ScopeTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE_TABLE)
    }
}

impl From<&str> for ScopeTable {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ScopeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Mode flags
// ---------------------------------------------------------------------------

bitflags! {
    /// Mode bits stored with every row.
    ///
    /// Only the high bits are interpreted here. The low bits carry unix
    /// permissions and are retained untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ItemMode: u32 {
        const ARTIFACT  = 1 << 28;
        const CONTAINER = 1 << 29;
        const REPLICA   = 1 << 30;
    }
}

impl ItemMode {
    #[inline]
    pub fn from_raw(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }

    #[inline]
    pub fn is_container(self) -> bool {
        self.contains(Self::CONTAINER)
    }

    #[inline]
    pub fn is_artifact(self) -> bool {
        self.contains(Self::ARTIFACT)
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A raw hierarchy row as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: ItemId,
    pub collection_id: CollectionId,
    pub parent: Option<ItemId>,
    pub left: i64,
    pub right: i64,
    /// Reference to the stored content; `None` or `Some(0)` for pure containers.
    pub content_ref: Option<u64>,
    /// Raw mode bits, see [`ItemMode`].
    pub mode: u32,
    pub name: String,
}

impl ItemRow {
    #[inline]
    pub fn mode(&self) -> ItemMode {
        ItemMode::from_raw(self.mode)
    }

    /// Content reference, with the zero sentinel folded into `None`.
    #[inline]
    pub fn content(&self) -> Option<u64> {
        self.content_ref.filter(|value| *value != 0)
    }

    /// A row that is neither a container nor an artifact and carries content.
    pub fn is_plain_file(&self) -> bool {
        let mode = self.mode();
        !mode.intersects(ItemMode::ARTIFACT | ItemMode::CONTAINER) && self.content().is_some()
    }
}

/// A hierarchy instance and the scope table holding its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    /// `None` means the configured default scope table.
    pub scope_table: Option<ScopeTable>,
}

// ---------------------------------------------------------------------------
// Bounds and items
// ---------------------------------------------------------------------------

/// Nested-set interval of one item within its scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemTreeBounds {
    item_id: ItemId,
    table: ScopeTable,
    collection_id: CollectionId,
    left: i64,
    right: i64,
}

impl ItemTreeBounds {
    pub fn new(
        item_id: ItemId,
        table: ScopeTable,
        collection_id: CollectionId,
        left: i64,
        right: i64,
    ) -> Self {
        Self {
            item_id,
            table,
            collection_id,
            left,
            right,
        }
    }

    pub fn from_row(row: &ItemRow, table: &ScopeTable) -> Self {
        Self::new(
            row.id,
            table.clone(),
            row.collection_id,
            row.left,
            row.right,
        )
    }

    #[inline]
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    #[inline]
    pub fn table(&self) -> &ScopeTable {
        &self.table
    }

    #[inline]
    pub fn collection_id(&self) -> CollectionId {
        self.collection_id
    }

    #[inline]
    pub fn left(&self) -> i64 {
        self.left
    }

    #[inline]
    pub fn right(&self) -> i64 {
        self.right
    }

    /// True if `other` lies strictly inside this interval of the same hierarchy.
    pub fn contains(&self, other: &ItemTreeBounds) -> bool {
        self.table == other.table
            && self.collection_id == other.collection_id
            && self.left < other.left
            && other.right < self.right
    }

    #[inline]
    pub fn is_ancestor_of(&self, other: &ItemTreeBounds) -> bool {
        self.contains(other)
    }

    /// Number of descendants in the unfiltered tree.
    #[inline]
    pub fn descendant_count(&self) -> u64 {
        ((self.right - self.left - 1) / 2).max(0) as u64
    }
}

/// A fully resolved node of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    bounds: ItemTreeBounds,
    parent: Option<ItemId>,
    content_ref: Option<u64>,
    mode: ItemMode,
    name: String,
}

impl Item {
    pub fn from_row(row: ItemRow, table: &ScopeTable) -> Self {
        let bounds = ItemTreeBounds::from_row(&row, table);
        let content_ref = row.content();
        Self {
            bounds,
            parent: row.parent,
            content_ref,
            mode: ItemMode::from_raw(row.mode),
            name: row.name,
        }
    }

    #[inline]
    pub fn id(&self) -> ItemId {
        self.bounds.item_id()
    }

    #[inline]
    pub fn collection_id(&self) -> CollectionId {
        self.bounds.collection_id()
    }

    #[inline]
    pub fn parent_id(&self) -> Option<ItemId> {
        self.parent
    }

    #[inline]
    pub fn content_ref(&self) -> Option<u64> {
        self.content_ref
    }

    #[inline]
    pub fn mode(&self) -> ItemMode {
        self.mode
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        self.mode.is_container()
    }

    #[inline]
    pub fn is_artifact(&self) -> bool {
        self.mode.is_artifact()
    }

    pub fn is_plain_file(&self) -> bool {
        !self
            .mode
            .intersects(ItemMode::ARTIFACT | ItemMode::CONTAINER)
            && self.content_ref.is_some()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn bounds(&self) -> &ItemTreeBounds {
        &self.bounds
    }

    pub fn into_bounds(self) -> ItemTreeBounds {
        self.bounds
    }
}

// ---------------------------------------------------------------------------
// Traversal outcome
// ---------------------------------------------------------------------------

/// Direction of an adjacency lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }

    /// Rank increment for one sibling step.
    #[inline]
    pub fn step(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }
}

/// Result of an adjacency lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjacent {
    Found(Item),
    /// The walk ran off either boundary of the hierarchy.
    EndOfHierarchy,
}

impl Adjacent {
    pub fn item(&self) -> Option<&Item> {
        match self {
            Self::Found(item) => Some(item),
            Self::EndOfHierarchy => None,
        }
    }

    pub fn into_item(self) -> Option<Item> {
        match self {
            Self::Found(item) => Some(item),
            Self::EndOfHierarchy => None,
        }
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::EndOfHierarchy)
    }
}
