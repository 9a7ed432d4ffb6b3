//! Compiles a [`Predicate`] tree to a SQL `WHERE` clause.
//!
//! The clause is written against `journal_entries e`. Tag predicates become
//! correlated `EXISTS` subqueries on `journal_entry_tags`. Placeholders are
//! anonymous (`?`) so fragments can be concatenated in any order as long as
//! the parameters are concatenated in the same order.

use rusqlite::ToSql;
use rusqlite::types::ToSqlOutput;

use crate::query::Predicate;
use crate::types::{ContextField, TimeField};

use super::format_timestamp;

/// A SQL fragment with its bound parameters.
#[derive(Debug, Clone, Default)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlParam::String(s) => s.to_sql(),
            SqlParam::Integer(i) => i.to_sql(),
        }
    }
}

impl SqlFragment {
    /// Creates a fragment without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Combines with another fragment using AND.
    pub fn and(mut self, other: SqlFragment) -> Self {
        if !self.sql.is_empty() && !other.sql.is_empty() {
            self.sql = format!("({}) AND ({})", self.sql, other.sql);
        } else if !other.sql.is_empty() {
            self.sql = other.sql;
        }
        self.params.extend(other.params);
        self
    }

    /// Returns true if this fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Parameters as trait objects for rusqlite.
    pub fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p as &dyn ToSql).collect()
    }
}

const TAG_EXISTS: &str =
    "EXISTS (SELECT 1 FROM journal_entry_tags t WHERE t.journal_entry_id = e.id AND t.tag";

fn context_column(field: ContextField) -> &'static str {
    match field {
        ContextField::Type => "e.context_type",
        ContextField::Id => "e.context_id",
        ContextField::Url => "e.context_url",
    }
}

fn time_column(field: TimeField) -> &'static str {
    match field {
        TimeField::CreatedAt => "e.created_at",
        TimeField::UpdatedAt => "e.updated_at",
    }
}

/// Compiles a predicate to a `WHERE` clause.
///
/// Timestamps compare as fixed-width RFC 3339 strings, which order the same
/// way as the instants they encode.
pub fn compile(predicate: &Predicate) -> SqlFragment {
    match predicate {
        Predicate::Journal(id) => {
            SqlFragment::with_params("e.journal_id = ?", vec![SqlParam::string(id.to_string())])
        }
        Predicate::Context { field, value } => SqlFragment::with_params(
            format!("{} = ?", context_column(*field)),
            vec![SqlParam::string(value.clone())],
        ),
        Predicate::HasTag(tag) => SqlFragment::with_params(
            format!("{} = ?)", TAG_EXISTS),
            vec![SqlParam::string(tag.clone())],
        ),
        Predicate::HasAnyTag(tags) => {
            if tags.is_empty() {
                return SqlFragment::new("0");
            }
            let placeholders = vec!["?"; tags.len()].join(", ");
            SqlFragment::with_params(
                format!("{} IN ({}))", TAG_EXISTS, placeholders),
                tags.iter().cloned().map(SqlParam::String).collect(),
            )
        }
        Predicate::Time { field, bound, at } => SqlFragment::with_params(
            format!("{} {} ?", time_column(*field), bound.sql_operator()),
            vec![SqlParam::string(format_timestamp(at))],
        ),
        Predicate::Not(inner) => {
            let inner = compile(inner);
            SqlFragment::with_params(format!("NOT ({})", inner.sql), inner.params)
        }
        Predicate::And(children) => {
            if children.is_empty() {
                return SqlFragment::new("1");
            }
            let mut params = Vec::new();
            let mut clauses = Vec::with_capacity(children.len());
            for child in children {
                let fragment = compile(child);
                clauses.push(format!("({})", fragment.sql));
                params.extend(fragment.params);
            }
            SqlFragment::with_params(clauses.join(" AND "), params)
        }
    }
}
