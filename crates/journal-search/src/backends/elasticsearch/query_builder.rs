//! Compiles a normalized query to the Elasticsearch boolean query DSL.
//!
//! The filter conjunction comes from [`Predicate::from_query`]. Free text only
//! feeds the `should` clause and therefore only affects scoring.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::query::{Predicate, TimeRange};
use crate::types::{ContextField, Pagination, SearchQuery, TimeField};

use super::document::epoch_seconds;

/// A complete Elasticsearch query body ready to be sent.
#[derive(Debug, Clone)]
pub struct EsQuery {
    /// The complete query body.
    pub body: Value,
    /// The index to search.
    pub index: String,
}

/// Builds Elasticsearch queries for one index.
pub struct EsQueryBuilder {
    index: String,
}

#[derive(Default)]
struct BoolClauses {
    should: Vec<Value>,
    must: Vec<Value>,
    must_not: Vec<Value>,
    filter: Vec<Value>,
}

fn context_field_name(field: ContextField) -> &'static str {
    field.as_str()
}

fn terms(field: &str, values: &[String]) -> Value {
    json!({ "terms": { field: values } })
}

/// Range endpoints are sent as decimal strings so the `epoch_second` date
/// parser never sees a float in exponent notation.
fn range(field: TimeField, range: &TimeRange) -> Value {
    let mut endpoints = Map::new();
    for end in [range.lower, range.upper].into_iter().flatten() {
        endpoints.insert(
            end.bound.as_str().to_string(),
            json!(format!("{:.3}", epoch_seconds(&end.at))),
        );
    }
    json!({ "range": { field.as_str(): endpoints } })
}

/// Compiles any predicate to a standalone filter-context clause.
fn clause(predicate: &Predicate) -> Value {
    match predicate {
        Predicate::Journal(id) => terms("journal_id", &[id.to_string()]),
        Predicate::Context { field, value } => {
            terms(context_field_name(*field), std::slice::from_ref(value))
        }
        Predicate::HasTag(tag) => terms("tag", std::slice::from_ref(tag)),
        Predicate::HasAnyTag(tags) => terms("tag", tags),
        Predicate::Time { field, bound, at } => {
            let mut single = TimeRange::default();
            single.push(*bound, *at);
            range(*field, &single)
        }
        Predicate::Not(inner) => json!({ "bool": { "must_not": [clause(inner)] } }),
        Predicate::And(children) => {
            let children: Vec<Value> = children.iter().map(clause).collect();
            json!({ "bool": { "filter": children } })
        }
    }
}

impl EsQueryBuilder {
    /// Creates a new query builder.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }

    /// Builds a complete query for one page of `journal_id`.
    pub fn build(&self, journal_id: Uuid, query: &SearchQuery, pagination: &Pagination) -> EsQuery {
        let predicate = Predicate::from_query(journal_id, query);
        let mut clauses = BoolClauses::default();
        let mut ranges: BTreeMap<&'static str, (TimeField, TimeRange)> = BTreeMap::new();

        if query.has_free_text() {
            clauses.should.push(json!({
                "match": { "title": { "query": query.query, "boost": 2 } }
            }));
            clauses.should.push(json!({
                "match": { "content": { "query": query.query } }
            }));
        } else {
            clauses.should.push(json!({ "match_all": {} }));
        }

        for conjunct in predicate.conjuncts() {
            match conjunct {
                Predicate::Journal(_) | Predicate::Context { .. } | Predicate::HasTag(_) => {
                    clauses.must.push(clause(conjunct));
                }
                Predicate::Not(inner) => clauses.must_not.push(clause(inner)),
                Predicate::HasAnyTag(_) => {
                    // Scores entries carrying optional tags, and requires at
                    // least one of them like the relational path does.
                    let tags = clause(conjunct);
                    clauses.should.push(tags.clone());
                    clauses.filter.push(tags);
                }
                Predicate::Time { field, bound, at } => {
                    ranges
                        .entry(field.as_str())
                        .or_insert_with(|| (*field, TimeRange::default()))
                        .1
                        .push(*bound, *at);
                }
                Predicate::And(_) => clauses.filter.push(clause(conjunct)),
            }
        }

        for (field, collapsed) in ranges.values() {
            if !collapsed.is_empty() {
                clauses.filter.push(range(*field, collapsed));
            }
        }

        let mut bool_query = Map::new();
        for (name, values) in [
            ("should", clauses.should),
            ("must", clauses.must),
            ("must_not", clauses.must_not),
            ("filter", clauses.filter),
        ] {
            if !values.is_empty() {
                bool_query.insert(name.to_string(), Value::Array(values));
            }
        }

        let mut body = json!({
            "query": { "bool": bool_query },
            "from": pagination.start,
            "size": pagination.size,
            "track_total_hits": true,
        });

        if !query.has_free_text() && query.optional_tags.is_empty() {
            body["sort"] = json!([
                { "created_at": { "order": pagination.order.as_str() } },
                "_score"
            ]);
        }

        EsQuery {
            body,
            index: self.index.clone(),
        }
    }
}
