//! Filter expression types and composition helpers.

use crate::types::{ItemId, ItemMode};

/// A visibility predicate (AST node).
///
/// An empty `And` admits every row, an empty `Or` admits none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityFilter {
    Term(FilterTerm),
    Not(Box<VisibilityFilter>),
    And(Vec<VisibilityFilter>),
    Or(Vec<VisibilityFilter>),
}

/// A single constraint on a row (leaf node in the AST).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTerm {
    /// Any of the given mode bits is set.
    ModeAny(ItemMode),
    /// Neither container nor artifact, with content.
    PlainFile,
    /// Carries a non-zero content reference.
    HasContent,
    ItemIds(Vec<ItemId>),
    /// Case-insensitive substring of the display name, stored lowercased.
    NameContains(String),
    /// File extensions without the leading dot, stored lowercased.
    Extension(Vec<String>),
}

impl Default for VisibilityFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl VisibilityFilter {
    /// Filter admitting every row.
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    /// Filter admitting no row.
    pub fn none() -> Self {
        Self::Or(Vec::new())
    }

    pub fn term(term: FilterTerm) -> Self {
        Self::Term(term)
    }

    pub fn mode_any(mode: ItemMode) -> Self {
        Self::Term(FilterTerm::ModeAny(mode))
    }

    pub fn name_contains(needle: &str) -> Self {
        Self::Term(FilterTerm::NameContains(needle.to_lowercase()))
    }

    pub fn ids(ids: impl IntoIterator<Item = ItemId>) -> Self {
        Self::Term(FilterTerm::ItemIds(ids.into_iter().collect()))
    }

    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// True if the filter admits every row without inspecting it.
    pub fn is_unrestricted(&self) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(Self::is_unrestricted),
            Self::Or(parts) => parts.iter().any(Self::is_unrestricted),
            Self::Not(_) | Self::Term(_) => false,
        }
    }

    /// Union with another filter, flattening nested ORs.
    pub fn or(self, other: VisibilityFilter) -> Self {
        if self.is_unrestricted() || other.is_unrestricted() {
            return Self::all();
        }
        let mut parts = match self {
            Self::Or(parts) => parts,
            single => vec![single],
        };
        match other {
            Self::Or(more) => parts.extend(more),
            single => parts.push(single),
        }
        Self::Or(parts)
    }

    /// Intersection with another filter, flattening nested ANDs.
    pub fn and(self, other: VisibilityFilter) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Self::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        match parts.len() {
            1 => parts.remove(0),
            _ => Self::And(parts),
        }
    }

    /// Also admits rows carrying any of `mode`'s bits.
    pub fn with_always_visible(self, mode: ItemMode) -> Self {
        if mode.is_empty() {
            return self;
        }
        self.or(Self::mode_any(mode))
    }

    /// Also admits the given items regardless of the rest of the filter.
    pub fn admitting(self, ids: &[ItemId]) -> Self {
        if ids.is_empty() {
            return self;
        }
        self.or(Self::ids(ids.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_is_unrestricted() {
        assert!(VisibilityFilter::all().is_unrestricted());
        assert!(!VisibilityFilter::none().is_unrestricted());
        assert!(!VisibilityFilter::mode_any(ItemMode::CONTAINER).is_unrestricted());
    }

    #[test]
    fn admitting_an_unrestricted_filter_stays_unrestricted() {
        let filter = VisibilityFilter::all().admitting(&[ItemId::new(4)]);
        assert_eq!(filter, VisibilityFilter::all());
    }

    #[test]
    fn or_flattens_unions() {
        let filter = VisibilityFilter::name_contains("Readme")
            .with_always_visible(ItemMode::CONTAINER)
            .admitting(&[ItemId::new(9)]);
        let VisibilityFilter::Or(parts) = &filter else {
            panic!("expected a union, got {filter:?}");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            VisibilityFilter::Term(FilterTerm::NameContains("readme".to_string()))
        );
    }

    #[test]
    fn double_negation_cancels() {
        let filter = VisibilityFilter::mode_any(ItemMode::ARTIFACT);
        assert_eq!(filter.clone().negate().negate(), filter);
    }

    #[test]
    fn and_flattens_intersections() {
        let container = VisibilityFilter::mode_any(ItemMode::CONTAINER);
        assert_eq!(VisibilityFilter::all().and(container.clone()), container);

        let filter = container
            .clone()
            .and(VisibilityFilter::name_contains("src"))
            .and(VisibilityFilter::ids([ItemId::new(2)]));
        let VisibilityFilter::And(parts) = &filter else {
            panic!("expected an intersection, got {filter:?}");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], container);
    }
}
