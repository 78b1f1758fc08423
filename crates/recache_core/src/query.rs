//! Query shapes accepted by record stores.

use crate::predicate::Filter;
use crate::types::RecordId;
use crate::value::Value;

/// A read request against one record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Type being queried.
    pub model: String,
    /// Caller-supplied filter.
    pub filter: Filter,
    /// Ambient scoping filter, combined with `filter`.
    pub scope: Filter,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Number of results to skip.
    pub offset: Option<usize>,
    /// Ordering clause. Ordered queries are never served from the cache.
    pub order: Option<String>,
    /// Projection. Projected queries are never served from the cache.
    pub select: Option<Vec<String>>,
}

impl Query {
    /// Creates an unfiltered query on `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the scoping filter.
    #[must_use]
    pub fn scope(mut self, scope: Filter) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the limit.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the offset.
    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the ordering clause.
    #[must_use]
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Sets the projection.
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Returns a copy without limit and offset.
    #[must_use]
    pub fn unbounded(&self) -> Self {
        Self {
            limit: None,
            offset: None,
            ..self.clone()
        }
    }

    /// Returns true if no option beyond filters, limit and offset is set.
    pub fn has_only_cacheable_options(&self) -> bool {
        self.order.is_none() && self.select.is_none()
    }

    /// Applies offset and limit to a full result.
    pub fn slice<T>(&self, results: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        results.into_iter().skip(offset).take(limit).collect()
    }
}

/// An aggregate calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// `COUNT(*)`. The only cacheable aggregate.
    CountAll,
    /// `COUNT(column)`.
    Count(String),
    /// `SUM(column)`.
    Sum(String),
    /// `MIN(column)`.
    Min(String),
    /// `MAX(column)`.
    Max(String),
}

/// Identifiers requested by a lookup, and the shape the caller expects back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdLookup {
    ids: Vec<Value>,
    expects_collection: bool,
}

impl IdLookup {
    /// Lookup whose caller expects a single record when one id matches,
    /// e.g. `find(5)` or `find(1, 2)`.
    pub fn one_or_many<I, V>(ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            expects_collection: false,
        }
    }

    /// Lookup whose caller passed a list and always wants a list back,
    /// e.g. `find([1, 2])`.
    pub fn collection<I, V>(ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            expects_collection: true,
        }
    }

    /// Returns true if a list was explicitly requested.
    pub fn expects_collection(&self) -> bool {
        self.expects_collection
    }

    /// Identifiers as passed, before coercion.
    pub fn raw(&self) -> &[Value] {
        &self.ids
    }

    /// Coerced identifiers, deduplicated, first occurrence first.
    ///
    /// `NULL` and values that are not integers are dropped.
    pub fn ids(&self) -> Vec<RecordId> {
        let mut out: Vec<RecordId> = Vec::with_capacity(self.ids.len());
        for id in self.ids.iter().filter_map(Value::to_record_id) {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }
}

/// Result of an identifier lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found<R> {
    /// Exactly one record, collapsed to a scalar.
    One(R),
    /// Any number of records.
    Many(Vec<R>),
}

impl<R> Found<R> {
    /// Flattens into a list.
    pub fn into_vec(self) -> Vec<R> {
        match self {
            Found::One(record) => vec![record],
            Found::Many(records) => records,
        }
    }

    /// Returns the scalar, if collapsed to one.
    pub fn one(self) -> Option<R> {
        match self {
            Found::One(record) => Some(record),
            Found::Many(_) => None,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        match self {
            Found::One(_) => 1,
            Found::Many(records) => records.len(),
        }
    }

    /// Returns true if no record was found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
