//! Index registry.
//!
//! Built once from a [`CacheConfig`] and immutable afterwards. Answers two
//! questions: is this attribute set indexed for this type, and which types
//! must a write to this type be replayed on.

use crate::config::{CacheConfig, IndexSpec, TypeConfig};
use crate::error::{CacheError, CacheResult};
use crate::key::{build_key, KeySpace};
use crate::record::{Cacheable, PRIMARY_KEY};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A declared index, attributes sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    attributes: Vec<String>,
    ttl: Duration,
}

impl Index {
    fn from_spec(spec: &IndexSpec, default_ttl: Duration) -> Self {
        let mut attributes = spec.attributes.clone();
        attributes.sort();
        Self {
            attributes,
            ttl: spec.ttl.unwrap_or(default_ttl),
        }
    }

    /// Attribute names, sorted.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// TTL for this index's entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true for the identifier index.
    pub fn is_primary(&self) -> bool {
        self.attributes.len() == 1 && self.attributes[0] == PRIMARY_KEY
    }

    /// Returns true if `names` is exactly this index's attribute set.
    pub fn covers(&self, names: &[&str]) -> bool {
        if names.len() != self.attributes.len() {
            return false;
        }
        let mut sorted = names.to_vec();
        sorted.sort_unstable();
        sorted.iter().zip(&self.attributes).all(|(a, b)| *a == b.as_str())
    }

    /// Key of the entry `record` currently belongs to.
    pub fn key_for<R: Cacheable>(&self, record: &R) -> String {
        self.key_with(|name| record.attribute(name))
    }

    /// Key of the entry `record` belonged to before its pending update.
    pub fn previous_key_for<R: Cacheable>(&self, record: &R) -> String {
        self.key_with(|name| record.attribute_was(name))
    }

    fn key_with(&self, mut lookup: impl FnMut(&str) -> Option<Value>) -> String {
        let pairs: Vec<(String, Value)> = self
            .attributes
            .iter()
            .map(|name| (name.clone(), lookup(name).unwrap_or(Value::Null)))
            .collect();
        build_key(&pairs)
    }
}

/// Resolved settings of one cached type.
#[derive(Debug, Clone)]
pub struct CachedType {
    name: String,
    table: String,
    key_space: KeySpace,
    indexes: Vec<Index>,
    chain: Vec<String>,
}

impl CachedType {
    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Key space of this type's entries.
    pub fn key_space(&self) -> &KeySpace {
        &self.key_space
    }

    /// Indexes, identifier index first.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// The identifier index.
    pub fn primary_index(&self) -> &Index {
        &self.indexes[0]
    }

    /// Finds the index whose attribute set is exactly `names`.
    pub fn index_for(&self, names: &[&str]) -> Option<&Index> {
        self.indexes.iter().find(|index| index.covers(names))
    }

    /// Returns true if some index has exactly the attribute set `names`.
    pub fn is_indexed(&self, names: &[&str]) -> bool {
        self.index_for(names).is_some()
    }

    /// Types a write to this type is replayed on: itself, then each
    /// ancestor sharing its table.
    pub fn write_chain(&self) -> &[String] {
        &self.chain
    }
}

/// Registry of cached types and their indexes.
#[derive(Debug, Clone)]
pub struct CacheRegistry {
    types: HashMap<String, CachedType>,
    default_ttl: Duration,
}

impl CacheRegistry {
    /// Validates `config` and resolves every type.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] for duplicate types, unknown
    /// parents, inheritance cycles, and empty or repeated index attributes.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let mut by_name: HashMap<&str, &TypeConfig> = HashMap::new();
        for ty in &config.types {
            if by_name.insert(ty.name.as_str(), ty).is_some() {
                return Err(CacheError::invalid_config(format!(
                    "type {} declared twice",
                    ty.name
                )));
            }
            validate_indexes(ty)?;
        }

        let mut types = HashMap::with_capacity(by_name.len());
        for ty in &config.types {
            check_ancestry(ty, &by_name)?;
            let chain = shared_table_chain(ty, &by_name);

            let table = chain
                .iter()
                .find_map(|member| member.table.clone())
                .unwrap_or_else(|| chain[chain.len() - 1].name.clone());

            let mut indexes = vec![Index::from_spec(&IndexSpec::new([PRIMARY_KEY]), config.ttl)];
            for member in &chain {
                for spec in &member.indexes {
                    let index = Index::from_spec(spec, config.ttl);
                    if !indexes.iter().any(|i| i.attributes == index.attributes) {
                        indexes.push(index);
                    }
                }
            }

            types.insert(
                ty.name.clone(),
                CachedType {
                    name: ty.name.clone(),
                    table,
                    key_space: KeySpace::new(config.namespace.as_deref(), &ty.name, ty.version),
                    indexes,
                    chain: chain.iter().map(|member| member.name.clone()).collect(),
                },
            );
        }

        Ok(Self {
            types,
            default_ttl: config.ttl,
        })
    }

    /// Returns the resolved type, or `None` if it is not cached.
    pub fn get(&self, type_name: &str) -> Option<&CachedType> {
        self.types.get(type_name)
    }

    /// Returns true if `type_name` has an index on exactly `names`.
    pub fn is_indexed(&self, type_name: &str, names: &[&str]) -> bool {
        self.get(type_name).is_some_and(|ty| ty.is_indexed(names))
    }

    /// Resolved types a write to `type_name` is replayed on.
    pub fn write_chain(&self, type_name: &str) -> Vec<&CachedType> {
        self.get(type_name)
            .map(|ty| ty.chain.iter().filter_map(|name| self.get(name)).collect())
            .unwrap_or_default()
    }

    /// Default TTL for entries not governed by an index.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Number of cached types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is cached.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn validate_indexes(ty: &TypeConfig) -> CacheResult<()> {
    for spec in &ty.indexes {
        let mut seen = HashSet::new();
        for attribute in &spec.attributes {
            if attribute.trim().is_empty() {
                return Err(CacheError::invalid_config(format!(
                    "empty attribute name in an index of {}",
                    ty.name
                )));
            }
            if !seen.insert(attribute.as_str()) {
                return Err(CacheError::invalid_config(format!(
                    "attribute {attribute} repeated in an index of {}",
                    ty.name
                )));
            }
        }
    }
    Ok(())
}

fn check_ancestry(ty: &TypeConfig, by_name: &HashMap<&str, &TypeConfig>) -> CacheResult<()> {
    let mut seen = HashSet::from([ty.name.as_str()]);
    let mut current = ty;
    while let Some(parent) = current.parent.as_deref() {
        let Some(&next) = by_name.get(parent) else {
            return Err(CacheError::invalid_config(format!(
                "{} inherits unknown type {parent}",
                current.name
            )));
        };
        if !seen.insert(parent) {
            return Err(CacheError::invalid_config(format!(
                "inheritance cycle through {parent}"
            )));
        }
        current = next;
    }
    Ok(())
}

// Walks up while the current type shares its table through a discriminator.
// Call only after `check_ancestry` succeeded.
fn shared_table_chain<'a>(
    ty: &'a TypeConfig,
    by_name: &HashMap<&str, &'a TypeConfig>,
) -> Vec<&'a TypeConfig> {
    let mut chain = vec![ty];
    let mut current = ty;
    while current.discriminator.is_some() {
        let Some(parent) = current.parent.as_deref().and_then(|p| by_name.get(p).copied()) else {
            break;
        };
        chain.push(parent);
        current = parent;
    }
    chain
}
