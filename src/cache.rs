//! Storage for parsed expressions.
//!
//! The facade only needs get/save by key; [`ArrayAdapter`] keeps everything
//! in memory with an optional lifetime, [`LruAdapter`] keeps a bounded number
//! of entries.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use thiserror::Error;

use crate::expression::ParsedExpression;

/// Characters a cache key may not contain.
pub const RESERVED_CHARACTERS: &[char] = &['{', '}', '(', ')', '/', '\\', '@', ':'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Cache key length must be greater than zero")]
    EmptyKey,

    #[error("Cache key \"{key}\" contains reserved character \"{reserved}\".")]
    ReservedCharacter { key: String, reserved: char },
}

/// Rejects empty keys and keys with reserved characters.
pub fn validate_key(key: &str) -> Result<&str, CacheError> {
    if key.is_empty() {
        return Err(CacheError::EmptyKey);
    }
    if let Some(reserved) = key.chars().find(|c| RESERVED_CHARACTERS.contains(c)) {
        return Err(CacheError::ReservedCharacter {
            key: key.to_string(),
            reserved,
        });
    }
    Ok(key)
}

/// A lookup result, and the unit of [`CacheAdapter::save`].
#[derive(Debug, Clone)]
pub struct CacheItem {
    key: String,
    value: Option<Arc<ParsedExpression>>,
    is_hit: bool,
    expiry: Option<Instant>,
}

impl CacheItem {
    pub fn new(key: impl Into<String>) -> Self {
        CacheItem {
            key: key.into(),
            value: None,
            is_hit: false,
            expiry: None,
        }
    }

    fn hit(key: &str, value: Arc<ParsedExpression>) -> Self {
        CacheItem {
            key: key.to_string(),
            value: Some(value),
            is_hit: true,
            expiry: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Option<&Arc<ParsedExpression>> {
        self.value.as_ref()
    }

    pub fn is_hit(&self) -> bool {
        self.is_hit
    }

    pub fn set(mut self, value: Arc<ParsedExpression>) -> Self {
        self.value = Some(value);
        self
    }

    /// Overrides the adapter's default lifetime for this item.
    pub fn expires_after(mut self, lifetime: Duration) -> Self {
        self.expiry = Some(Instant::now() + lifetime);
        self
    }
}

/// Key/value storage for parsed expressions.
pub trait CacheAdapter: Send {
    /// Looks `key` up; a miss is an item with `is_hit() == false`.
    fn get_item(&mut self, key: &str) -> Result<CacheItem, CacheError>;

    /// Stores an item holding a value. Returns whether it was stored.
    fn save(&mut self, item: CacheItem) -> Result<bool, CacheError>;

    fn has_item(&mut self, key: &str) -> Result<bool, CacheError>;

    fn delete_item(&mut self, key: &str) -> Result<bool, CacheError>;

    fn clear(&mut self) -> bool;
}

/// Unbounded in-memory cache, entries optionally expiring.
///
/// ```
/// use std::sync::Arc;
/// use exprlang::{ArrayAdapter, CacheAdapter, Node, ParsedExpression};
///
/// let mut cache = ArrayAdapter::new();
/// let parsed = cache
///     .get("one", || Ok::<_, exprlang::CacheError>(Arc::new(ParsedExpression::new("1", Node::constant(1i64)))))
///     .unwrap();
/// assert!(cache.has_item("one").unwrap());
/// assert_eq!(parsed.to_string(), "1");
/// ```
#[derive(Debug, Default)]
pub struct ArrayAdapter {
    default_lifetime: Option<Duration>,
    values: HashMap<String, (Arc<ParsedExpression>, Option<Instant>)>,
}

impl ArrayAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        ArrayAdapter {
            default_lifetime: Some(lifetime),
            values: HashMap::new(),
        }
    }

    /// Returns the cached value, computing and storing it on a miss.
    pub fn get<F, E>(&mut self, key: &str, compute: F) -> Result<Arc<ParsedExpression>, E>
    where
        F: FnOnce() -> Result<Arc<ParsedExpression>, E>,
        E: From<CacheError>,
    {
        let item = self.get_item(key)?;
        if let Some(value) = item.get() {
            return Ok(value.clone());
        }
        let value = compute()?;
        self.save(item.set(value.clone()))?;
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn live(&mut self, key: &str) -> Option<Arc<ParsedExpression>> {
        let (value, expiry) = self.values.get(key)?;
        if expiry.is_some_and(|e| e <= Instant::now()) {
            self.values.remove(key);
            return None;
        }
        Some(value.clone())
    }
}

impl CacheAdapter for ArrayAdapter {
    fn get_item(&mut self, key: &str) -> Result<CacheItem, CacheError> {
        validate_key(key)?;
        Ok(match self.live(key) {
            Some(value) => CacheItem::hit(key, value),
            None => CacheItem::new(key),
        })
    }

    fn save(&mut self, item: CacheItem) -> Result<bool, CacheError> {
        validate_key(&item.key)?;
        let Some(value) = item.value else {
            return Ok(false);
        };
        let expiry = item
            .expiry
            .or_else(|| self.default_lifetime.map(|lifetime| Instant::now() + lifetime));
        if expiry.is_some_and(|e| e <= Instant::now()) {
            self.values.remove(&item.key);
            return Ok(true);
        }
        self.values.insert(item.key, (value, expiry));
        Ok(true)
    }

    fn has_item(&mut self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        Ok(self.live(key).is_some())
    }

    fn delete_item(&mut self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        self.values.remove(key);
        Ok(true)
    }

    fn clear(&mut self) -> bool {
        self.values.clear();
        true
    }
}

/// In-memory cache holding at most `capacity` entries, evicting the least
/// recently used.
pub struct LruAdapter {
    cache: LruCache<String, Arc<ParsedExpression>>,
}

impl LruAdapter {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        LruAdapter {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl CacheAdapter for LruAdapter {
    fn get_item(&mut self, key: &str) -> Result<CacheItem, CacheError> {
        validate_key(key)?;
        Ok(match self.cache.get(key) {
            Some(value) => CacheItem::hit(key, value.clone()),
            None => CacheItem::new(key),
        })
    }

    fn save(&mut self, item: CacheItem) -> Result<bool, CacheError> {
        validate_key(&item.key)?;
        let Some(value) = item.value else {
            return Ok(false);
        };
        self.cache.put(item.key, value);
        Ok(true)
    }

    fn has_item(&mut self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        Ok(self.cache.contains(key))
    }

    fn delete_item(&mut self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        self.cache.pop(key);
        Ok(true)
    }

    fn clear(&mut self) -> bool {
        self.cache.clear();
        true
    }
}
