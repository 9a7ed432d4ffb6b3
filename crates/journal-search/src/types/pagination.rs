//! Offset pagination and sort direction.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sort direction on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultsOrder {
    /// Oldest first.
    #[serde(rename = "asc")]
    Ascending,
    /// Newest first.
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl ResultsOrder {
    /// `asc` or `desc`.
    pub fn as_str(self) -> &'static str {
        match self {
            ResultsOrder::Ascending => "asc",
            ResultsOrder::Descending => "desc",
        }
    }

    /// SQL keyword for ORDER BY.
    pub fn sql_keyword(self) -> &'static str {
        match self {
            ResultsOrder::Ascending => "ASC",
            ResultsOrder::Descending => "DESC",
        }
    }
}

impl FromStr for ResultsOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(ResultsOrder::Ascending),
            "desc" => Ok(ResultsOrder::Descending),
            other => Err(format!("unknown order '{}', expected asc or desc", other)),
        }
    }
}

impl std::fmt::Display for ResultsOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offset-based page request.
///
/// Rows may shift between pages when entries are created or deleted
/// concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page size.
    pub size: u64,
    /// Offset of the first result.
    pub start: u64,
    /// Sort direction on `created_at`.
    pub order: ResultsOrder,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            size: 10,
            start: 0,
            order: ResultsOrder::Descending,
        }
    }
}

impl Pagination {
    /// Creates a page request with descending order.
    pub fn new(size: u64, start: u64) -> Self {
        Self {
            size,
            start,
            ..Default::default()
        }
    }

    /// Sets the sort direction.
    pub fn with_order(mut self, order: ResultsOrder) -> Self {
        self.order = order;
        self
    }

    /// Offset of the next page, or `None` at the end of the results.
    pub fn next_offset(&self, total: u64) -> Option<u64> {
        let next = self.start.saturating_add(self.size);
        (next < total).then_some(next)
    }
}
