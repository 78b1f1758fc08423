//! Property-based test generators using proptest.

use proptest::prelude::*;
use recache_core::{Filter, Record, Value};
use std::collections::BTreeMap;

/// Strategy for attribute names usable in every filter form.
pub fn attribute_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{0,11}")
        .expect("Invalid regex")
        .prop_filter("reserved name", |s| s != "id")
}

/// Strategy for text values that can also be written as quoted literals.
pub fn literal_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9/%._@-]{0,12}").expect("Invalid regex")
}

/// Strategy for attribute values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        literal_text_strategy().prop_map(Value::Text),
    ]
}

/// Strategy for equality pairs with distinct attribute names.
pub fn pairs_strategy(max: usize) -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map(attribute_name_strategy(), value_strategy(), 0..=max)
        .prop_map(|map| map.into_iter().collect())
}

/// Strategy for a persisted record of `kind` with identifier in `1..=max_id`.
pub fn record_strategy(kind: &'static str, max_id: i64) -> impl Strategy<Value = Record> {
    (
        1..=max_id,
        prop::collection::btree_map(attribute_name_strategy(), value_strategy(), 0..4),
    )
        .prop_map(move |(id, attributes): (i64, BTreeMap<String, Value>)| {
            attributes
                .into_iter()
                .fold(Record::new(kind).with_id(id), |record, (name, value)| {
                    record.with(name, value)
                })
        })
}

/// Writes `pairs` in every filter form that expresses the same predicate,
/// each with the pairs in the given order.
///
/// The textual form is included only when every value has a literal form.
pub fn equivalent_filters(pairs: &[(String, Value)], table: &str) -> Vec<Filter> {
    let mut filters = vec![
        Filter::map(pairs.iter().cloned()),
        Filter::map(
            pairs
                .iter()
                .map(|(name, value)| (format!("{table}.{name}"), value.clone())),
        ),
    ];
    if pairs.is_empty() {
        return filters;
    }

    let placeholders: Vec<String> = pairs.iter().map(|(name, _)| format!("{name} = ?")).collect();
    filters.push(Filter::parameterized(
        placeholders.join(" AND "),
        pairs.iter().map(|(_, value)| value.clone()),
    ));

    let literals: Option<Vec<String>> = pairs
        .iter()
        .map(|(name, value)| match value {
            Value::Integer(n) => Some(format!("{table}.{name} = {n}")),
            Value::Text(text) => Some(format!("`{name}` = '{text}'")),
            Value::Null | Value::Bool(_) => None,
        })
        .collect();
    if let Some(literals) = literals {
        filters.push(Filter::text(literals.join(" and ")));
    }
    filters
}
