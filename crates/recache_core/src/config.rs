//! Cache configuration.

use std::time::Duration;

/// Default time-to-live for cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Declaration of one index: a set of attributes the backing store can
/// answer equality queries on efficiently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Attribute names. Order is not significant.
    pub attributes: Vec<String>,
    /// TTL override for this index's entries.
    pub ttl: Option<Duration>,
}

impl IndexSpec {
    /// Creates an index over the given attributes.
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            ttl: None,
        }
    }

    /// Sets a TTL for this index's entries.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Cache settings for one record type.
#[derive(Debug, Clone)]
pub struct TypeConfig {
    /// Type name, as returned by `Cacheable::type_name`.
    pub name: String,
    /// Physical table. The only qualifier accepted in textual filters.
    /// Defaults to the hierarchy root's table, or the type name.
    pub table: Option<String>,
    /// Parent type when this type shares its table with a hierarchy.
    pub parent: Option<String>,
    /// Discriminator attribute, set when the type takes part in a
    /// shared-table hierarchy.
    pub discriminator: Option<String>,
    /// Key version. Bumping it abandons every entry of the type.
    pub version: u32,
    /// Declared indexes. The identifier index is always added.
    pub indexes: Vec<IndexSpec>,
}

impl TypeConfig {
    /// Creates a configuration for a standalone type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            parent: None,
            discriminator: None,
            version: 1,
            indexes: Vec::new(),
        }
    }

    /// Sets the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declares an index.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Declares an index over the given attributes.
    #[must_use]
    pub fn index_on<I, S>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index(IndexSpec::new(attributes))
    }

    /// Makes this type a member of a shared-table hierarchy.
    #[must_use]
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets the discriminator attribute.
    #[must_use]
    pub fn discriminator(mut self, attribute: impl Into<String>) -> Self {
        self.discriminator = Some(attribute.into());
        self
    }

    /// Sets the key version.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// Configuration for the cache engine.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix shared by every key of this deployment.
    pub namespace: Option<String>,
    /// Default TTL for entries.
    pub ttl: Duration,
    /// Cached types.
    pub types: Vec<TypeConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            ttl: DEFAULT_TTL,
            types: Vec::new(),
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the default TTL.
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Adds a cached type.
    #[must_use]
    pub fn with_type(mut self, config: TypeConfig) -> Self {
        self.types.push(config);
        self
    }
}
