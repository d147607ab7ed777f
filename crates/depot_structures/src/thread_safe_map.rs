//! Sharded concurrent hash map
//!
//! Keys are spread over a fixed number of buckets (`hash(key) % N`). Each
//! bucket is a small association list behind its own reader/writer lock, so
//! readers of a bucket run in parallel and writers only contend with keys that
//! land in the same bucket. No operation ever locks the whole map.
//!
//! Lookups accept any borrowed form of the key (`&str` for `String` keys,
//! for instance), the same way `std::collections::HashMap` does.

use core::fmt;
use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// Default number of buckets. Prime, to spread poorly distributed hashes.
pub const DEFAULT_BUCKET_COUNT: usize = 19;

/// One independently lockable shard
struct Bucket<K, V> {
    entries: RwLock<Vec<(K, V)>>,
}

impl<K, V> Bucket<K, V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

fn position<K, V, Q>(entries: &[(K, V)], key: &Q) -> Option<usize>
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    entries.iter().position(|(k, _)| k.borrow() == key)
}

/// Thread-safe map with per-bucket locking
///
/// Values are handed out by copy (`V: Clone`), never by reference, so a
/// concurrent removal can not invalidate what a reader holds.
pub struct ThreadSafeMap<K, V, S = RandomState> {
    buckets: Box<[CachePadded<Bucket<K, V>>]>,
    hash_builder: S,
}

impl<K, V> ThreadSafeMap<K, V, RandomState>
where
    K: Hash + Eq,
{
    /// Create a map with [`DEFAULT_BUCKET_COUNT`] buckets
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKET_COUNT)
    }

    /// Create a map with a specific number of buckets (at least one)
    pub fn with_buckets(bucket_count: usize) -> Self {
        Self::with_buckets_and_hasher(bucket_count, RandomState::new())
    }
}

impl<K, V, S> ThreadSafeMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Create a map with a specific number of buckets and hasher
    pub fn with_buckets_and_hasher(bucket_count: usize, hash_builder: S) -> Self {
        let bucket_count = bucket_count.max(1);
        let buckets = (0..bucket_count)
            .map(|_| CachePadded::new(Bucket::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buckets,
            hash_builder,
        }
    }

    fn bucket_for<Q>(&self, key: &Q) -> &Bucket<K, V>
    where
        Q: Hash + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        let index = (hash % self.buckets.len() as u64) as usize;
        &self.buckets[index]
    }

    /// Insert `value` under `key`, replacing any existing value
    pub fn add_or_update_mapping(&self, key: K, value: V) {
        let mut entries = self.bucket_for(&key).entries.write();
        match position(&entries, &key) {
            Some(index) => entries[index].1 = value,
            None => entries.push((key, value)),
        }
    }

    /// Insert `value` only if `key` is not mapped yet. Returns whether it was inserted.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut entries = self.bucket_for(&key).entries.write();
        if position(&entries, &key).is_some() {
            return false;
        }
        entries.push((key, value));
        true
    }

    /// Get a copy of the value for `key`, or `default` if unmapped
    pub fn value_for<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get(key).unwrap_or(default)
    }

    /// Get a copy of the value for `key`
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let entries = self.bucket_for(key).entries.read();
        position(&entries, key).map(|index| entries[index].1.clone())
    }

    /// Check if `key` is mapped
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.bucket_for(key).entries.read();
        position(&entries, key).is_some()
    }

    /// Remove the mapping for `key`, returning the old value
    pub fn remove_mapping<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.bucket_for(key).entries.write();
        position(&entries, key).map(|index| entries.swap_remove(index).1)
    }
}

impl<K, V, S> ThreadSafeMap<K, V, S> {
    /// Visit every entry
    ///
    /// Buckets are locked exclusively one after another: each bucket is seen
    /// in a consistent state, the map as a whole is not. The visitor must not
    /// call back into this map.
    pub fn foreach<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &V),
    {
        for bucket in self.buckets.iter() {
            let entries = bucket.entries.write();
            for (key, value) in entries.iter() {
                visitor(key, value);
            }
        }
    }

    /// Number of entries (approximate under concurrent mutation)
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.read().len()).sum()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.entries.read().is_empty())
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Remove every entry
    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            bucket.entries.write().clear();
        }
    }

    /// Copy out all keys
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::new();
        self.foreach(|k, _| keys.push(k.clone()));
        keys
    }

    /// Copy out all entries, bucket by bucket
    pub fn snapshot(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let mut entries = Vec::new();
        self.foreach(|k, v| entries.push((k.clone(), v.clone())));
        entries
    }
}

impl<K: Hash + Eq, V> Default for ThreadSafeMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for ThreadSafeMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafeMap")
            .field("buckets", &self.bucket_count())
            .field("len", &self.len())
            .finish()
    }
}
