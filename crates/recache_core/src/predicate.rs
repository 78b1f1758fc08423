//! Filter normalization.
//!
//! Every filter shape a caller can pass is reduced to a [`Predicate`]: a list
//! of `(attribute, value)` equality pairs. Shapes that cannot be reduced
//! exactly yield `None`, and the query goes straight to the store.
//!
//! Accepted textual clauses:
//!
//! ```text
//! id = 123        id = '123'      (id = 123)
//! users.id = 123  `users`.`id` = ?
//! ```
//!
//! joined by `AND` (any case). A qualifier must name the queried table.

use crate::key::build_key;
use crate::record::Cacheable;
use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;

static AND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+AND\s+").expect("valid AND regex"));

static KEY_EQ_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\(?\s*(?:[`"]?(\w+)[`"]?\.)?[`"]?(\w+)[`"]?\s*=\s*(?:(\?)|'([^']*)'|(-?\d+))\s*\)?$"#,
    )
    .expect("valid clause regex")
});

/// A query filter as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    /// No filter.
    #[default]
    None,
    /// Attribute → value mapping.
    Map(Vec<(String, Value)>),
    /// Textual conjunction, e.g. `"email = 'a@x.com' AND status = 'active'"`.
    Text(String),
    /// Textual conjunction with `?` placeholders filled in order.
    Parameterized {
        /// The condition text.
        sql: String,
        /// Substitution values, consumed left to right.
        params: Vec<Value>,
    },
}

impl Filter {
    /// Creates a mapping filter.
    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Creates a textual filter.
    pub fn text(sql: impl Into<String>) -> Self {
        Self::Text(sql.into())
    }

    /// Creates a parameterized textual filter.
    pub fn parameterized<I, V>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Parameterized {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if there is no filter.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// A normalized equality predicate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Predicate {
    pairs: Vec<(String, Value)>,
}

impl Predicate {
    /// Creates a predicate from raw pairs.
    pub fn new(pairs: Vec<(String, Value)>) -> Self {
        Self { pairs }
    }

    /// Returns the empty predicate.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the pairs in their current order.
    pub fn pairs(&self) -> &[(String, Value)] {
        &self.pairs
    }

    /// Returns the attribute names in their current order.
    pub fn names(&self) -> Vec<&str> {
        self.pairs.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Returns true if there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Appends the pairs of `other`.
    #[must_use]
    pub fn merge(mut self, other: Predicate) -> Self {
        self.pairs.extend(other.pairs);
        self
    }

    /// Sorts pairs by attribute name; equal names keep their order.
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.pairs.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }

    /// Derives the cache key of this predicate.
    pub fn key(&self) -> String {
        build_key(&self.clone().sorted().pairs)
    }

    /// Returns true if `record` satisfies every pair.
    ///
    /// Values compare by key form, so `Integer(5)` matches `"5"`. A missing
    /// attribute compares as `NULL`.
    pub fn matches<R: Cacheable>(&self, record: &R) -> bool {
        self.pairs.iter().all(|(name, expected)| {
            let actual = record.attribute(name).unwrap_or(Value::Null);
            actual.key_form() == expected.key_form()
        })
    }
}

/// Normalizes `filter` for a query against `table`.
///
/// Returns `None` when the filter is not a pure conjunction of equalities
/// on the queried table. Partial results are never returned.
///
/// In text filters only `?` placeholders, quoted strings and integers are
/// recognized as literals. Other unquoted literals such as `flag = true`
/// or `price = 1.5` make the filter uncacheable.
pub fn normalize(filter: &Filter, table: &str) -> Option<Predicate> {
    match filter {
        Filter::None => Some(Predicate::empty()),
        Filter::Map(pairs) => pairs
            .iter()
            .map(|(name, value)| Some((canonical_name(name, table)?, value.clone())))
            .collect::<Option<Vec<_>>>()
            .map(Predicate::new),
        Filter::Text(sql) => parse_conjunction(sql, &[], table),
        Filter::Parameterized { sql, params } => parse_conjunction(sql, params, table),
    }
}

fn canonical_name(name: &str, table: &str) -> Option<String> {
    match name.trim().split_once('.') {
        Some((qualifier, column)) if qualifier == table && !column.is_empty() => {
            Some(column.to_string())
        }
        Some(_) => None,
        None => Some(name.trim().to_string()),
    }
}

fn parse_conjunction(sql: &str, params: &[Value], table: &str) -> Option<Predicate> {
    let sql = sql.trim();
    if sql.is_empty() {
        return params.is_empty().then(Predicate::empty);
    }

    let mut params = params.iter();
    let mut pairs = Vec::new();
    for clause in AND.split(sql) {
        let caps = KEY_EQ_VALUE.captures(clause.trim())?;
        if let Some(qualifier) = caps.get(1) {
            if qualifier.as_str() != table {
                return None;
            }
        }
        let name = caps.get(2)?.as_str().to_string();
        let value = if caps.get(3).is_some() {
            params.next()?.clone()
        } else if let Some(quoted) = caps.get(4) {
            Value::Text(quoted.as_str().to_string())
        } else {
            Value::Integer(caps.get(5)?.as_str().parse().ok()?)
        };
        pairs.push((name, value));
    }

    // Unused substitution values mean the text and the values disagree.
    if params.next().is_some() {
        return None;
    }
    Some(Predicate::new(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn pairs(p: &Predicate) -> Vec<(&str, Value)> {
        p.pairs()
            .iter()
            .map(|(n, v)| (n.as_str(), v.clone()))
            .collect()
    }

    #[test]
    fn no_filter_is_empty_predicate() {
        assert_eq!(normalize(&Filter::None, "users"), Some(Predicate::empty()));
        assert_eq!(normalize(&Filter::text("  "), "users"), Some(Predicate::empty()));
    }

    #[test]
    fn map_filter() {
        let p = normalize(&Filter::map([("email", "a@x.com")]), "users").unwrap();
        assert_eq!(pairs(&p), vec![("email", Value::from("a@x.com"))]);
    }

    #[test]
    fn map_filter_qualified_keys() {
        let ok = normalize(&Filter::map([("users.id", 1)]), "users").unwrap();
        assert_eq!(ok.names(), vec!["id"]);
        assert_eq!(normalize(&Filter::map([("posts.id", 1)]), "users"), None);
    }

    #[test]
    fn textual_clause_shapes() {
        for sql in [
            "id = 123",
            "id = '123'",
            "(id = 123)",
            "users.id = 123",
            "`users`.`id` = 123",
            "`id` = 123",
            "id=123",
        ] {
            let p = normalize(&Filter::text(sql), "users")
                .unwrap_or_else(|| panic!("{sql} should normalize"));
            assert_eq!(p.key(), "id/123", "{sql}");
        }
    }

    #[test]
    fn conjunction_is_case_insensitive() {
        let p = normalize(&Filter::text("account_id = 1 and status = 'on'"), "users").unwrap();
        assert_eq!(
            pairs(&p),
            vec![("account_id", Value::Integer(1)), ("status", Value::from("on"))]
        );
    }

    #[test]
    fn placeholders_consume_params_in_order() {
        let filter = Filter::parameterized("a = ? AND b = 'x' AND c = ?", [1, 2]);
        let p = normalize(&filter, "t").unwrap();
        assert_eq!(
            pairs(&p),
            vec![
                ("a", Value::Integer(1)),
                ("b", Value::from("x")),
                ("c", Value::Integer(2))
            ]
        );
    }

    #[test]
    fn unquoted_non_integer_literals_fail() {
        for sql in ["flag = true", "price = 1.5", "deleted_at = NULL", "a = 1 AND flag = false"] {
            assert_eq!(normalize(&Filter::text(sql), "users"), None, "{sql}");
        }
    }

    #[test]
    fn placeholder_count_mismatch_fails() {
        assert_eq!(normalize(&Filter::parameterized("a = ? AND b = ?", [1]), "t"), None);
        assert_eq!(normalize(&Filter::parameterized("a = ?", [1, 2]), "t"), None);
        assert_eq!(normalize(&Filter::parameterized("", [1]), "t"), None);
    }

    #[test]
    fn foreign_qualifier_fails_whole_predicate() {
        assert_eq!(
            normalize(&Filter::text("users.id = 1 AND posts.id = 2"), "users"),
            None
        );
    }

    #[test]
    fn unsupported_clauses_fail_closed() {
        for sql in [
            "id > 5",
            "id = 1 OR id = 2",
            "id IN (1, 2)",
            "status = active",
            "name = 'O''Brien'",
            "name = 'Tom AND Jerry'",
            "id = 99999999999999999999",
            "lower(email) = 'a'",
        ] {
            assert_eq!(normalize(&Filter::text(sql), "users"), None, "{sql}");
        }
    }

    #[test]
    fn sorted_is_stable_for_equal_names() {
        let p = Predicate::new(vec![
            ("b".into(), Value::Integer(1)),
            ("a".into(), Value::Integer(2)),
            ("b".into(), Value::Integer(0)),
        ])
        .sorted();
        assert_eq!(
            pairs(&p),
            vec![
                ("a", Value::Integer(2)),
                ("b", Value::Integer(1)),
                ("b", Value::Integer(0))
            ]
        );
    }

    #[test]
    fn merge_concatenates() {
        let a = Predicate::new(vec![("x".into(), Value::Integer(1))]);
        let b = Predicate::new(vec![("y".into(), Value::Integer(2))]);
        assert_eq!(a.merge(b).names(), vec!["x", "y"]);
    }

    #[test]
    fn matches_records_with_coercion() {
        let user = Record::new("User").with_id(5).with("email", "a@x.com");
        assert!(Predicate::new(vec![("id".into(), Value::from("5"))]).matches(&user));
        assert!(!Predicate::new(vec![("email".into(), Value::from("b"))]).matches(&user));
        assert!(Predicate::new(vec![("deleted_at".into(), Value::Null)]).matches(&user));
    }

    #[test]
    fn null_does_not_match_empty_text() {
        let user = Record::new("User").with_id(5).with("nickname", "").with("admin", "true");
        assert!(!Predicate::new(vec![("nickname".into(), Value::Null)]).matches(&user));
        assert!(!Predicate::new(vec![("admin".into(), Value::Bool(true))]).matches(&user));
        assert!(Predicate::new(vec![("nickname".into(), Value::from(""))]).matches(&user));
    }
}
