//! Cacheable records.

use crate::types::RecordId;
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the identifier attribute and of the index every type carries.
pub const PRIMARY_KEY: &str = "id";

/// A record the engine can cache and keep consistent.
///
/// # Implementation Requirements
///
/// - `type_name()` is the record's concrete type; for members of a
///   shared-table hierarchy it is the discriminator value
/// - `attribute(PRIMARY_KEY)` must agree with `id()`
/// - `attribute_was()` returns the value an attribute had before the
///   pending update. Types that do not track changes keep the default,
///   which makes updates recompute index membership from current values only
/// - Implementations must be `Serialize` + `DeserializeOwned`: level 2
///   entries hold the serialized record
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Concrete type of this record.
    fn type_name(&self) -> &str;

    /// Identifier, or `None` if the record was never persisted.
    fn id(&self) -> Option<RecordId>;

    /// Current value of `name`, or `None` if the record has no such attribute.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Value of `name` before the pending update.
    fn attribute_was(&self, name: &str) -> Option<Value> {
        self.attribute(name)
    }
}

/// A dynamically typed record: a type name, an identifier and attributes.
///
/// Attributes assigned through [`set`](Self::set) remember their previous
/// value until [`mark_persisted`](Self::mark_persisted), which lets the
/// update write-through find the index entries the record is leaving.
///
/// # Example
///
/// ```rust
/// use recache_core::{Cacheable, Record, Value};
///
/// let mut user = Record::new("User").with_id(1).with("email", "a@x.com");
/// user.set("email", "b@x.com");
///
/// assert_eq!(user.attribute("email"), Some(Value::from("b@x.com")));
/// assert_eq!(user.attribute_was("email"), Some(Value::from("a@x.com")));
///
/// user.mark_persisted();
/// assert_eq!(user.attribute_was("email"), Some(Value::from("b@x.com")));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    kind: String,
    id: Option<RecordId>,
    attributes: BTreeMap<String, Value>,
    #[serde(skip)]
    originals: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an unsaved record of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            attributes: BTreeMap::new(),
            originals: BTreeMap::new(),
        }
    }

    /// Sets the identifier (builder form, no change tracking).
    #[must_use]
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets an attribute (builder form, no change tracking).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Returns the record's type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the identifier.
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    /// Assigns the identifier, typically right after an insert.
    pub fn assign_id(&mut self, id: impl Into<RecordId>) {
        self.id = Some(id.into());
    }

    /// Returns true once the record has an identifier.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Returns a stored attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Returns all stored attributes.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Assigns an attribute, remembering its first pre-change value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if !self.originals.contains_key(&name) {
            let previous = self.attributes.get(&name).cloned().unwrap_or(Value::Null);
            if previous == value {
                return;
            }
            self.originals.insert(name.clone(), previous);
        }
        self.attributes.insert(name, value);
    }

    /// Names of attributes changed since the last save.
    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.originals.keys().map(String::as_str)
    }

    /// Forgets pending changes.
    pub fn mark_persisted(&mut self) {
        self.originals.clear();
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.id == other.id && self.attributes == other.attributes
    }
}

impl Eq for Record {}

impl Cacheable for Record {
    fn type_name(&self) -> &str {
        &self.kind
    }

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        if name == PRIMARY_KEY {
            return self.id.map(Value::from);
        }
        self.attributes.get(name).cloned()
    }

    fn attribute_was(&self, name: &str) -> Option<Value> {
        match self.originals.get(name) {
            Some(original) => Some(original.clone()),
            None => self.attribute(name),
        }
    }
}
