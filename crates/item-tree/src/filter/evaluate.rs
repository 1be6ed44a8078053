//! Filter evaluation against hierarchy rows.

use super::expression::{FilterTerm, VisibilityFilter};
use crate::types::ItemRow;

impl VisibilityFilter {
    /// Returns true if the row is visible under this filter.
    pub fn matches(&self, row: &ItemRow) -> bool {
        match self {
            Self::Term(term) => evaluate_filter_term(term, row),
            Self::Not(inner) => !inner.matches(row),
            Self::And(parts) => parts.iter().all(|part| part.matches(row)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(row)),
        }
    }
}

fn evaluate_filter_term(term: &FilterTerm, row: &ItemRow) -> bool {
    match term {
        FilterTerm::ModeAny(mode) => row.mode().intersects(*mode),
        FilterTerm::PlainFile => row.is_plain_file(),
        FilterTerm::HasContent => row.content().is_some(),
        FilterTerm::ItemIds(ids) => ids.contains(&row.id),
        FilterTerm::NameContains(needle) => row.name.to_lowercase().contains(needle.as_str()),
        FilterTerm::Extension(extensions) => {
            let Some(extension) = name_extension(&row.name) else {
                return false;
            };
            extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(extension))
        }
    }
}

fn name_extension(name: &str) -> Option<&str> {
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        None
    } else {
        Some(extension)
    }
}
