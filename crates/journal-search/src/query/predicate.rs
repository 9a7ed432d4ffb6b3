//! Backend-neutral predicate tree.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{Bound, ContextField, JournalEntry, SearchQuery, TimeField};

/// A boolean condition over journal entries.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Entry belongs to the journal.
    Journal(Uuid),
    /// Exact match on a context field.
    Context {
        /// Field to compare.
        field: ContextField,
        /// Expected value.
        value: String,
    },
    /// Entry carries the tag.
    HasTag(String),
    /// Entry carries at least one of the tags.
    HasAnyTag(Vec<String>),
    /// Timestamp comparison.
    Time {
        /// Field to compare.
        field: TimeField,
        /// Comparator.
        bound: Bound,
        /// Right-hand side.
        at: DateTime<Utc>,
    },
    /// Negation.
    Not(Box<Predicate>),
    /// Conjunction.
    And(Vec<Predicate>),
}

impl Predicate {
    /// Builds the filter conjunction for a search in one journal.
    ///
    /// Required tags become one `HasTag` each, forbidden tags a single negated
    /// `HasAnyTag`, optional tags a single `HasAnyTag`. Free text is not part of
    /// the tree; it only affects scoring.
    pub fn from_query(journal_id: Uuid, query: &SearchQuery) -> Self {
        let mut parts = vec![Predicate::Journal(journal_id)];

        for field in [ContextField::Type, ContextField::Id, ContextField::Url] {
            if let Some(value) = query.context(field) {
                parts.push(Predicate::Context {
                    field,
                    value: value.to_string(),
                });
            }
        }

        parts.extend(query.required_tags.iter().cloned().map(Predicate::HasTag));

        if !query.forbidden_tags.is_empty() {
            parts.push(
                Predicate::HasAnyTag(query.forbidden_tags.iter().cloned().collect()).negate(),
            );
        }

        if !query.optional_tags.is_empty() {
            parts.push(Predicate::HasAnyTag(
                query.optional_tags.iter().cloned().collect(),
            ));
        }

        for field in [TimeField::CreatedAt, TimeField::UpdatedAt] {
            for (bound, at) in query.bounds(field).iter() {
                parts.push(Predicate::Time { field, bound, at });
            }
        }

        Predicate::and(parts)
    }

    /// Conjunction of `parts`, flattening nested conjunctions.
    ///
    /// A single part is returned as is.
    pub fn and(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Predicate::And(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Predicate::And(flat)
        }
    }

    /// Negation, cancelling a double negation.
    pub fn negate(self) -> Self {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Top-level conjuncts. A non-conjunction is its own single conjunct.
    pub fn conjuncts(&self) -> &[Predicate] {
        match self {
            Predicate::And(children) => children,
            other => std::slice::from_ref(other),
        }
    }

    /// Evaluates the predicate against an entry in memory.
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        match self {
            Predicate::Journal(id) => entry.journal_id == *id,
            Predicate::Context { field, value } => {
                let actual = match field {
                    ContextField::Type => entry.context_type.as_deref(),
                    ContextField::Id => entry.context_id.as_deref(),
                    ContextField::Url => entry.context_url.as_deref(),
                };
                actual == Some(value.as_str())
            }
            Predicate::HasTag(tag) => entry.tags.contains(tag),
            Predicate::HasAnyTag(tags) => tags.iter().any(|tag| entry.tags.contains(tag)),
            Predicate::Time { field, bound, at } => {
                let actual = match field {
                    TimeField::CreatedAt => entry.created_at,
                    TimeField::UpdatedAt => entry.updated_at,
                };
                match bound {
                    Bound::Gt => actual > *at,
                    Bound::Gte => actual >= *at,
                    Bound::Lt => actual < *at,
                    Bound::Lte => actual <= *at,
                }
            }
            Predicate::Not(inner) => !inner.matches(entry),
            Predicate::And(children) => children.iter().all(|child| child.matches(entry)),
        }
    }
}

/// One endpoint of a collapsed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEnd {
    /// Comparator of the endpoint.
    pub bound: Bound,
    /// Endpoint value.
    pub at: DateTime<Utc>,
}

/// The tightest lower and upper endpoint of a set of bounds on one field.
///
/// The set of timestamps satisfying the collapsed range equals the set
/// satisfying every pushed bound. On equal values the strict comparator wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Greatest lower bound.
    pub lower: Option<RangeEnd>,
    /// Least upper bound.
    pub upper: Option<RangeEnd>,
}

impl TimeRange {
    /// Folds one bound into the range.
    pub fn push(&mut self, bound: Bound, at: DateTime<Utc>) {
        let candidate = RangeEnd { bound, at };
        if bound.is_lower() {
            let tighter = match self.lower {
                None => true,
                Some(current) => {
                    at > current.at
                        || (at == current.at && bound.is_strict() && !current.bound.is_strict())
                }
            };
            if tighter {
                self.lower = Some(candidate);
            }
        } else {
            let tighter = match self.upper {
                None => true,
                Some(current) => {
                    at < current.at
                        || (at == current.at && bound.is_strict() && !current.bound.is_strict())
                }
            };
            if tighter {
                self.upper = Some(candidate);
            }
        }
    }

    /// Returns true if neither endpoint is set.
    pub fn is_empty(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}
