//! The normalized search query.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single inequality against a timestamp field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Strictly after.
    Gt,
    /// At or after.
    Gte,
    /// Strictly before.
    Lt,
    /// At or before.
    Lte,
}

impl Bound {
    /// All bound kinds, in evaluation order.
    pub const ALL: [Bound; 4] = [Bound::Gt, Bound::Gte, Bound::Lt, Bound::Lte];

    /// Returns true for `Gt`/`Gte`.
    pub fn is_lower(self) -> bool {
        matches!(self, Bound::Gt | Bound::Gte)
    }

    /// Returns true for `Gt`/`Lt`.
    pub fn is_strict(self) -> bool {
        matches!(self, Bound::Gt | Bound::Lt)
    }

    /// SQL comparison operator.
    pub fn sql_operator(self) -> &'static str {
        match self {
            Bound::Gt => ">",
            Bound::Gte => ">=",
            Bound::Lt => "<",
            Bound::Lte => "<=",
        }
    }

    /// Key used in an Elasticsearch `range` clause.
    pub fn as_str(self) -> &'static str {
        match self {
            Bound::Gt => "gt",
            Bound::Gte => "gte",
            Bound::Lt => "lt",
            Bound::Lte => "lte",
        }
    }
}

/// A timestamp field that can be bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeField {
    /// Entry creation time.
    CreatedAt,
    /// Last modification time.
    UpdatedAt,
}

impl TimeField {
    /// Column and document field name.
    pub fn as_str(self) -> &'static str {
        match self {
            TimeField::CreatedAt => "created_at",
            TimeField::UpdatedAt => "updated_at",
        }
    }
}

/// An exact-match context metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextField {
    /// `context_type`
    #[serde(rename = "context_type")]
    Type,
    /// `context_id`
    #[serde(rename = "context_id")]
    Id,
    /// `context_url`
    #[serde(rename = "context_url")]
    Url,
}

impl ContextField {
    /// Column and document field name.
    pub fn as_str(self) -> &'static str {
        match self {
            ContextField::Type => "context_type",
            ContextField::Id => "context_id",
            ContextField::Url => "context_url",
        }
    }
}

/// Timestamp bounds on one field, grouped by kind.
///
/// Every bound pushed is kept. Bounds of the same kind are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeBounds {
    gt: Vec<DateTime<Utc>>,
    gte: Vec<DateTime<Utc>>,
    lt: Vec<DateTime<Utc>>,
    lte: Vec<DateTime<Utc>>,
}

impl TimeBounds {
    /// Records one bound.
    pub fn push(&mut self, bound: Bound, at: DateTime<Utc>) {
        self.values_mut(bound).push(at);
    }

    /// Returns all values recorded for `bound`.
    pub fn get(&self, bound: Bound) -> &[DateTime<Utc>] {
        match bound {
            Bound::Gt => &self.gt,
            Bound::Gte => &self.gte,
            Bound::Lt => &self.lt,
            Bound::Lte => &self.lte,
        }
    }

    /// Iterates over every `(bound, value)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (Bound, DateTime<Utc>)> + '_ {
        Bound::ALL
            .into_iter()
            .flat_map(move |bound| self.get(bound).iter().map(move |at| (bound, *at)))
    }

    /// Total number of bounds.
    pub fn len(&self) -> usize {
        self.gt.len() + self.gte.len() + self.lt.len() + self.lte.len()
    }

    /// Returns true if no bound is set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn values_mut(&mut self, bound: Bound) -> &mut Vec<DateTime<Utc>> {
        match bound {
            Bound::Gt => &mut self.gt,
            Bound::Gte => &mut self.gte,
            Bound::Lt => &mut self.lt,
            Bound::Lte => &mut self.lte,
        }
    }
}

/// A parsed search request, independent of the backend that will run it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free text left after filter extraction. May be empty.
    pub query: String,
    /// Every one of these tags must be present.
    pub required_tags: BTreeSet<String>,
    /// None of these tags may be present.
    pub forbidden_tags: BTreeSet<String>,
    /// At least one of these tags must be present.
    pub optional_tags: BTreeSet<String>,
    /// Bounds on `created_at`.
    pub created_at_bounds: TimeBounds,
    /// Bounds on `updated_at`.
    pub updated_at_bounds: TimeBounds,
    /// Exact match on `context_type`.
    pub context_type: Option<String>,
    /// Exact match on `context_id`.
    pub context_id: Option<String>,
    /// Exact match on `context_url`.
    pub context_url: Option<String>,
}

impl SearchQuery {
    /// Creates a query with free text only.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Returns true if there is free text to score against.
    pub fn has_free_text(&self) -> bool {
        !self.query.is_empty()
    }

    /// Returns the bounds recorded for `field`.
    pub fn bounds(&self, field: TimeField) -> &TimeBounds {
        match field {
            TimeField::CreatedAt => &self.created_at_bounds,
            TimeField::UpdatedAt => &self.updated_at_bounds,
        }
    }

    pub(crate) fn bounds_mut(&mut self, field: TimeField) -> &mut TimeBounds {
        match field {
            TimeField::CreatedAt => &mut self.created_at_bounds,
            TimeField::UpdatedAt => &mut self.updated_at_bounds,
        }
    }

    /// Returns the exact-match value for a context field, if any.
    pub fn context(&self, field: ContextField) -> Option<&str> {
        match field {
            ContextField::Type => self.context_type.as_deref(),
            ContextField::Id => self.context_id.as_deref(),
            ContextField::Url => self.context_url.as_deref(),
        }
    }

    pub(crate) fn set_context(&mut self, field: ContextField, value: String) {
        match field {
            ContextField::Type => self.context_type = Some(value),
            ContextField::Id => self.context_id = Some(value),
            ContextField::Url => self.context_url = Some(value),
        }
    }
}
