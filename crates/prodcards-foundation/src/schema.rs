//! Name column resolution
//!
//! Decides once per catalog which column holds the product's display name.
//! Rules are checked in a fixed priority order and the first hit wins:
//!
//! | # | Rule | Match |
//! |---|------|-------|
//! | 0 | [`ResolutionRule::ExactName`] | column named `name` (case-insensitive) |
//! | 1 | [`ResolutionRule::CandidateToken`] | first column whose lower-cased name contains a token from [`NAME_CANDIDATES`] |
//! | 2 | [`ResolutionRule::FirstTextual`] | first textual column not named `id` |
//! | 3 | [`ResolutionRule::FirstColumn`] | first column |

use prodcards_kernel::{Catalog, ColumnSchema};
use serde::Serialize;

/// Candidate tokens tested by substring containment, in check order
pub const NAME_CANDIDATES: &[&str] = &[
    "name",
    "title",
    "product",
    "description",
    "название",
    "наименование",
];

/// Which rule selected the name column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionRule {
    ExactName,
    CandidateToken(&'static str),
    FirstTextual,
    FirstColumn,
}

/// The resolved display-name column of a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameColumn {
    pub index: usize,
    pub name: String,
    pub rule: ResolutionRule,
}

impl NameColumn {
    fn at(columns: &[ColumnSchema], index: usize, rule: ResolutionRule) -> Self {
        Self {
            index,
            name: columns[index].name.clone(),
            rule,
        }
    }
}

/// Resolve the name column from a column list.
///
/// Returns `None` only for an empty column list.
pub fn resolve_columns(columns: &[ColumnSchema]) -> Option<NameColumn> {
    if columns.is_empty() {
        return None;
    }

    if let Some(idx) = columns
        .iter()
        .position(|c| c.name.to_lowercase() == "name")
    {
        return Some(NameColumn::at(columns, idx, ResolutionRule::ExactName));
    }

    for (idx, column) in columns.iter().enumerate() {
        let lowered = column.name.to_lowercase();
        if let Some(token) = NAME_CANDIDATES.iter().find(|t| lowered.contains(**t)) {
            return Some(NameColumn::at(
                columns,
                idx,
                ResolutionRule::CandidateToken(*token),
            ));
        }
    }

    if let Some(idx) = columns
        .iter()
        .position(|c| c.kind.is_textual() && c.name.to_lowercase() != "id")
    {
        return Some(NameColumn::at(columns, idx, ResolutionRule::FirstTextual));
    }

    Some(NameColumn::at(columns, 0, ResolutionRule::FirstColumn))
}

/// Resolve the name column of a catalog.
///
/// A [`Catalog`] always has at least one column, so this never fails.
/// Callers are expected to resolve once and keep the result.
pub fn resolve_name_column(catalog: &Catalog) -> NameColumn {
    resolve_columns(catalog.schema()).unwrap_or(NameColumn {
        index: 0,
        name: String::new(),
        rule: ResolutionRule::FirstColumn,
    })
}
