//! Key/id lookup queries.
//!
//! A [`ResourceKeyIdQuery`] asks the remote for the `id` and `key` of every
//! resource of one family matching a predicate. It renders to the
//! GraphQL-style form the remote accepts:
//!
//! ```text
//! {categories(limit: 500, where: "id in (\"a\", \"b\")", sort: ["id asc"]) { results { id key } }}
//! ```

use ctsync_types::{ReferenceFamily, ResourceId};
use std::fmt;

/// Default and maximum page size of one lookup query.
pub const DEFAULT_QUERY_LIMIT: usize = 500;

/// The field a lookup query matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryField {
    Id,
    Key,
}

impl QueryField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Key => "key",
        }
    }
}

/// One `id in (...)` or `key in (...)` lookup for a resource family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKeyIdQuery {
    family: ReferenceFamily,
    field: QueryField,
    values: Vec<String>,
    limit: usize,
    predicate: Option<String>,
}

impl ResourceKeyIdQuery {
    /// Looks up the keys of the given ids. Blank ids are dropped.
    #[must_use]
    pub fn by_ids<'a>(family: ReferenceFamily, ids: impl IntoIterator<Item = &'a ResourceId>) -> Self {
        Self::new(family, QueryField::Id, ids.into_iter().map(ResourceId::as_str))
    }

    /// Looks up the ids of the given keys. Blank keys are dropped.
    #[must_use]
    pub fn by_keys<'a>(family: ReferenceFamily, keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(family, QueryField::Key, keys)
    }

    fn new<'a>(family: ReferenceFamily, field: QueryField, values: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            family,
            field,
            values: values
                .into_iter()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .collect(),
            limit: DEFAULT_QUERY_LIMIT,
            predicate: None,
        }
    }

    /// Overrides the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Replaces the generated `in (...)` clause with a caller-written predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    #[must_use]
    pub fn family(&self) -> ReferenceFamily {
        self.family
    }

    #[must_use]
    pub fn field(&self) -> QueryField {
        self.field
    }

    /// The ids or keys being looked up.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The custom predicate, if one replaced the generated clause.
    #[must_use]
    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    /// Whether the query has nothing to look up.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.predicate.is_none()
    }

    /// The `where` predicate, unescaped.
    #[must_use]
    pub fn where_clause(&self) -> String {
        if let Some(predicate) = &self.predicate {
            return predicate.clone();
        }
        let quoted: Vec<String> = self.values.iter().map(|v| format!("\"{v}\"")).collect();
        format!("{} in ({})", self.field.as_str(), quoted.join(", "))
    }

    /// Renders the query body without the enclosing braces, so several queries
    /// can share one request.
    #[must_use]
    pub fn render_body(&self) -> String {
        let predicate = self.where_clause().replace('"', "\\\"");
        format!(
            "{}(limit: {}, where: \"{}\", sort: [\"{} asc\"]) {{ results {{ id key }} }}",
            self.family.collection(),
            self.limit,
            predicate,
            self.field.as_str(),
        )
    }

    /// Renders several queries as one aliased request: `{q0: ... q1: ...}`.
    #[must_use]
    pub fn render_batch(queries: &[ResourceKeyIdQuery]) -> String {
        let bodies: Vec<String> = queries
            .iter()
            .enumerate()
            .map(|(index, query)| format!("q{index}: {}", query.render_body()))
            .collect();
        format!("{{{}}}", bodies.join(" "))
    }
}

impl fmt::Display for ResourceKeyIdQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.render_body())
    }
}
