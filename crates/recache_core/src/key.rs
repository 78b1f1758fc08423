//! Cache key derivation.
//!
//! A key is the flattened `attribute/value/attribute/value` sequence of a
//! predicate's pairs. Tokens escape `%` and `/`, so a value containing the
//! delimiter can never be mistaken for an extra pair.

use crate::record::PRIMARY_KEY;
use crate::types::RecordId;
use crate::value::Value;
use recache_backend::DEFAULT_MAX_KEY_LEN;
use sha2::{Digest, Sha256};
use std::borrow::Cow;

/// Separator between key tokens.
pub const DELIMITER: char = '/';

/// Suffix of count entries.
pub const COUNT_SUFFIX: &str = "count";

/// Marker token in front of a digested key tail. Escaped tokens never
/// start with `%s`.
const DIGEST_MARKER: &str = "%sha256";

pub(crate) fn escape(token: &str) -> Cow<'_, str> {
    if !token.contains(['%', DELIMITER]) {
        return Cow::Borrowed(token);
    }
    let mut out = String::with_capacity(token.len() + 4);
    for c in token.chars() {
        match c {
            '%' => out.push_str("%25"),
            DELIMITER => out.push_str("%2F"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Builds the key for already-sorted pairs.
///
/// Callers sort by attribute name first (see
/// [`Predicate::sorted`](crate::Predicate::sorted)); this function keeps
/// whatever order it is given.
///
/// ```rust
/// use recache_core::{build_key, Value};
///
/// let key = build_key(&[
///     ("account_id".to_string(), Value::Integer(7)),
///     ("status".to_string(), Value::from("active")),
/// ]);
/// assert_eq!(key, "account_id/7/status/active");
/// ```
pub fn build_key(pairs: &[(String, Value)]) -> String {
    let mut key = String::new();
    for (name, value) in pairs {
        if !key.is_empty() {
            key.push(DELIMITER);
        }
        key.push_str(&escape(name));
        key.push(DELIMITER);
        key.push_str(&value.key_form());
    }
    key
}

/// Builds the identifier key of a record, e.g. `id/5`.
pub fn id_key(id: RecordId) -> String {
    format!("{PRIMARY_KEY}{DELIMITER}{id}")
}

/// Builds the count key for an index key.
pub fn count_key(key: &str) -> String {
    if key.is_empty() {
        COUNT_SUFFIX.to_string()
    } else {
        format!("{key}{DELIMITER}{COUNT_SUFFIX}")
    }
}

/// Prefix that scopes keys to one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Creates the key space `[namespace:]type:version`.
    pub fn new(namespace: Option<&str>, type_name: &str, version: u32) -> Self {
        let type_name = escape(type_name);
        let prefix = match namespace {
            Some(ns) => format!("{}:{type_name}:{version}", escape(ns)),
            None => format!("{type_name}:{version}"),
        };
        Self { prefix }
    }

    /// Returns the prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Qualifies an index key with this key space.
    ///
    /// Keys that would exceed [`DEFAULT_MAX_KEY_LEN`] keep the prefix and
    /// replace the tail with its SHA-256 digest, so the backend always
    /// accepts them.
    pub fn qualify(&self, key: &str) -> String {
        if self.prefix.len() + DELIMITER.len_utf8() + key.len() <= DEFAULT_MAX_KEY_LEN {
            return format!("{}{DELIMITER}{key}", self.prefix);
        }
        let digest = Sha256::digest(key.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        format!("{}{DELIMITER}{DIGEST_MARKER}{DELIMITER}{hex}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pair(name: &str, value: impl Into<Value>) -> (String, Value) {
        (name.to_string(), value.into())
    }

    #[test]
    fn single_pair() {
        assert_eq!(build_key(&[pair("email", "a@x.com")]), "email/a@x.com");
    }

    #[test]
    fn empty_pairs_build_empty_key() {
        assert_eq!(build_key(&[]), "");
        assert_eq!(count_key(""), "count");
    }

    #[test]
    fn integer_and_text_forms_coincide() {
        assert_eq!(build_key(&[pair("id", 5)]), build_key(&[pair("id", "5")]));
        assert_eq!(build_key(&[pair("id", 5)]), id_key(RecordId(5)));
    }

    #[test]
    fn delimiter_in_value_is_escaped() {
        let tricky = build_key(&[pair("a", "1/b/2")]);
        let honest = build_key(&[pair("a", "1"), pair("b", "2")]);
        assert_eq!(tricky, "a/1%2Fb%2F2");
        assert_ne!(tricky, honest);
    }

    #[test]
    fn percent_is_escaped() {
        assert_eq!(build_key(&[pair("a", "%2F")]), "a/%252F");
    }

    #[test]
    fn null_and_bool_do_not_collide_with_text() {
        assert_ne!(build_key(&[pair("a", Value::Null)]), build_key(&[pair("a", "")]));
        assert_ne!(build_key(&[pair("a", true)]), build_key(&[pair("a", "true")]));
        assert_ne!(build_key(&[pair("a", false)]), build_key(&[pair("a", "false")]));
        assert_eq!(build_key(&[pair("a", Value::Null)]), "a/%00");
        assert_eq!(build_key(&[pair("a", "%00")]), "a/%2500");
    }

    #[test]
    fn count_key_suffix() {
        assert_eq!(count_key("email/a"), "email/a/count");
    }

    #[test]
    fn key_space_prefixes() {
        let plain = KeySpace::new(None, "User", 1);
        assert_eq!(plain.qualify("id/1"), "User:1/id/1");

        let scoped = KeySpace::new(Some("app"), "User", 3);
        assert_eq!(scoped.prefix(), "app:User:3");
        assert_eq!(scoped.qualify("email/a"), "app:User:3/email/a");
    }

    #[test]
    fn long_keys_are_digested() {
        let space = KeySpace::new(None, "User", 1);
        let long = format!("email/{}", "a".repeat(300));
        let other = format!("email/{}", "b".repeat(300));

        let qualified = space.qualify(&long);
        assert!(qualified.len() <= DEFAULT_MAX_KEY_LEN);
        assert!(qualified.starts_with("User:1/%sha256/"));
        assert_eq!(qualified, space.qualify(&long));
        assert_ne!(qualified, space.qualify(&other));
        assert_ne!(space.qualify(&count_key(&long)), qualified);
    }

    #[test]
    fn key_at_the_limit_is_kept_verbatim() {
        let space = KeySpace::new(None, "User", 1);
        let tail = "a".repeat(DEFAULT_MAX_KEY_LEN - space.prefix().len() - 1);
        let qualified = space.qualify(&tail);
        assert_eq!(qualified.len(), DEFAULT_MAX_KEY_LEN);
        assert!(qualified.ends_with(&tail));
    }

    proptest! {
        #[test]
        fn distinct_text_values_build_distinct_keys(
            a in "[a-c%/]{0,6}",
            b in "[a-c%/]{0,6}",
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(
                build_key(&[pair("x", a.as_str())]),
                build_key(&[pair("x", b.as_str())])
            );
        }

        #[test]
        fn text_never_keys_like_null_or_bool(text in "[%0a-z/]{0,8}") {
            let key = build_key(&[pair("x", text.as_str())]);
            prop_assert_ne!(&key, &build_key(&[pair("x", Value::Null)]));
            prop_assert_ne!(&key, &build_key(&[pair("x", true)]));
            prop_assert_ne!(&key, &build_key(&[pair("x", false)]));
        }
    }
}
