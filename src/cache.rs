use std::{
    hash::Hash,
    num::NonZeroUsize,
};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::{
    RandomState,
    list::{
        Handle,
        RecencyList,
    },
};

/// A value plus the handle of its node in the recency list.
struct CacheEntry<V> {
    value: V,
    node: Handle,
}

/// The compound state guarded by the cache mutex. The map and the list are
/// one resource: their sizes and key sets match before and after every
/// public operation.
struct Inner<K, V> {
    map: HashMap<K, CacheEntry<V>, RandomState>,
    list: RecencyList<K>,
    capacity: NonZeroUsize,
}

type EvictionListener<K, V> = Box<dyn Fn(K, V) + Send + Sync>;

/// A bounded, thread-safe least-recently-used (LRU) cache.
///
/// The cache holds at most `capacity` entries. Every [`insert`](Self::insert)
/// or [`get`](Self::get) of a key marks it as most recently used; once the
/// capacity is exceeded, the least recently used entry is evicted and handed
/// to the eviction listener supplied at construction.
///
/// All operations take `&self` and may be called from any number of threads.
/// A single internal mutex guards the whole cache, so operations are
/// strictly serialized; there is no fairness guarantee between waiting
/// threads and no lock-free fast path — reads like
/// [`contains_key`](Self::contains_key) and [`len`](Self::len) also take the
/// lock and observe a consistent state.
///
/// # Eviction listener
///
/// The listener receives the owned `(key, value)` pair of every entry
/// removed by capacity trimming, by [`remove`](Self::remove), or by a
/// notifying [`clear`](Self::clear). It is never invoked when a key's value
/// is overwritten in place.
///
/// The listener runs synchronously while the cache's lock is held. The lock
/// is **not reentrant**: calling any method of the same cache from inside
/// the listener deadlocks the calling thread. A panic in the listener
/// propagates to the caller of the triggering operation; the lock is
/// released on unwind, but entries already handed to the listener stay
/// removed while remaining evictions of the same batch do not run, so the
/// cache may be over capacity until a later [`insert`](Self::insert) trims
/// again.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use recency::LruCache;
///
/// let cache = LruCache::new(NonZeroUsize::new(2).unwrap());
/// cache.insert("a", 1);
/// cache.insert("b", 2);
///
/// cache.get(&"a"); // "b" is now the oldest entry
/// cache.insert("c", 3); // evicts "b"
///
/// assert_eq!(cache.get(&"b"), None);
/// assert_eq!(cache.len(), 2);
/// ```
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    on_evict: EvictionListener<K, V>,
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruCache")
            .field("len", &inner.map.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Creates an empty cache that holds at most `capacity` entries and
    /// discards evicted pairs without notification.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use recency::LruCache;
    ///
    /// let cache: LruCache<i32, String> = LruCache::new(NonZeroUsize::new(100).unwrap());
    /// assert!(cache.is_empty());
    /// assert_eq!(cache.capacity(), 100);
    /// ```
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_eviction_listener(capacity, |_, _| {})
    }

    /// Creates an empty cache that holds at most `capacity` entries and
    /// passes every evicted `(key, value)` pair to `listener`.
    ///
    /// See the [type-level documentation](Self) for the listener contract:
    /// it runs under the cache's lock, must not call back into the cache,
    /// and may panic (aborting the remainder of the eviction batch).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::{
    ///     num::NonZeroUsize,
    ///     sync::{
    ///         Arc,
    ///         Mutex,
    ///     },
    /// };
    ///
    /// use recency::LruCache;
    ///
    /// let evicted = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&evicted);
    /// let cache = LruCache::with_eviction_listener(
    ///     NonZeroUsize::new(1).unwrap(),
    ///     move |key, value| sink.lock().unwrap().push((key, value)),
    /// );
    ///
    /// cache.insert("a", 1);
    /// cache.insert("b", 2); // evicts ("a", 1)
    ///
    /// assert_eq!(*evicted.lock().unwrap(), [("a", 1)]);
    /// ```
    pub fn with_eviction_listener(
        capacity: NonZeroUsize,
        listener: impl Fn(K, V) + Send + Sync + 'static,
    ) -> Self {
        LruCache {
            inner: Mutex::new(Inner {
                map: HashMap::with_capacity_and_hasher(capacity.get(), RandomState::default()),
                list: RecencyList::with_capacity(capacity.get()),
                capacity,
            }),
            on_evict: Box::new(listener),
        }
    }

    /// Inserts a key-value pair, marking the key as most recently used, and
    /// trims the cache back to capacity.
    ///
    /// If the key was already present its value is overwritten in place —
    /// even when old and new value compare equal, so the stored value is
    /// always the one passed in and the key's recency is always refreshed.
    /// The previous value is returned **only if it differs** from the new
    /// one; re-inserting an unchanged value returns `None`.
    ///
    /// Inserting a new key into a full cache evicts from the oldest end
    /// until the cache is back at capacity, invoking the eviction listener
    /// once per evicted entry. Overwriting an existing key never evicts and
    /// never notifies.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use recency::LruCache;
    ///
    /// let cache = LruCache::new(NonZeroUsize::new(2).unwrap());
    ///
    /// assert_eq!(cache.insert("k", 1), None);
    /// assert_eq!(cache.insert("k", 2), Some(1));
    /// assert_eq!(cache.insert("k", 2), None); // unchanged value
    /// assert_eq!(cache.get(&"k"), Some(2));
    /// assert_eq!(cache.len(), 1);
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<V>
    where
        V: PartialEq,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let previous = match inner.map.entry(key) {
            hashbrown::hash_map::Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                inner.list.move_to_back(entry.node);
                let old = std::mem::replace(&mut entry.value, value);
                if old != entry.value { Some(old) } else { None }
            }
            hashbrown::hash_map::Entry::Vacant(vacant) => {
                let node = inner.list.push_back(vacant.key().clone());
                vacant.insert(CacheEntry { value, node });
                None
            }
        };

        while inner.map.len() > inner.capacity.get() {
            let key = inner
                .list
                .pop_front()
                .expect("recency list empty while map is over capacity");
            let entry = inner
                .map
                .remove(&key)
                .expect("key in recency list missing from map");
            (self.on_evict)(key, entry.value);
        }

        previous
    }

    /// Returns a clone of the value for `key`, marking the key as most
    /// recently used. Returns `None` if the key is not present.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use recency::LruCache;
    ///
    /// let cache = LruCache::new(NonZeroUsize::new(2).unwrap());
    /// cache.insert(1, "one".to_string());
    ///
    /// assert_eq!(cache.get(&1), Some("one".to_string()));
    /// assert_eq!(cache.get(&2), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let entry = inner.map.get(key)?;
        inner.list.move_to_back(entry.node);
        Some(entry.value.clone())
    }

    /// Returns a clone of the value for `key` without affecting its recency.
    ///
    /// Unlike [`get`](Self::get), peeking at an entry does not protect it
    /// from eviction.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use recency::LruCache;
    ///
    /// let cache = LruCache::new(NonZeroUsize::new(2).unwrap());
    /// cache.insert("a", 1);
    /// cache.insert("b", 2);
    ///
    /// cache.peek(&"a"); // does not refresh "a"
    /// cache.insert("c", 3); // still evicts "a"
    ///
    /// assert_eq!(cache.get(&"a"), None);
    /// ```
    pub fn peek(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let inner = self.inner.lock();
        inner.map.get(key).map(|entry| entry.value.clone())
    }

    /// Removes `key` from the cache, handing the removed pair to the
    /// eviction listener. Removing an absent key is a no-op and does not
    /// notify.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use recency::LruCache;
    ///
    /// let cache = LruCache::new(NonZeroUsize::new(2).unwrap());
    /// cache.insert("a", 1);
    ///
    /// cache.remove(&"a");
    /// cache.remove(&"a"); // no-op
    ///
    /// assert!(cache.is_empty());
    /// ```
    pub fn remove(&self, key: &K) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.map.remove(key) {
            let key = inner.list.remove(entry.node);
            (self.on_evict)(key, entry.value);
        }
    }

    /// Removes every entry, handing each `(key, value)` pair to the
    /// eviction listener in recency order, oldest first.
    ///
    /// See [`clear_silent`](Self::clear_silent) to clear without
    /// notification.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        while let Some(key) = inner.list.pop_front() {
            let entry = inner
                .map
                .remove(&key)
                .expect("key in recency list missing from map");
            (self.on_evict)(key, entry.value);
        }
    }

    /// Removes every entry without invoking the eviction listener.
    pub fn clear_silent(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.list.clear();
    }

    /// Returns true if the cache currently contains `key`.
    ///
    /// The check runs under the cache's lock, so it observes a consistent
    /// point-in-time state relative to concurrent mutators. It does not
    /// affect the key's recency.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    /// Returns a snapshot of all entries in recency order, oldest first.
    ///
    /// The snapshot is an independent copy: mutating the cache afterwards
    /// does not change a previously returned snapshot. Taking a snapshot
    /// does not affect recency.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use recency::LruCache;
    ///
    /// let cache = LruCache::new(NonZeroUsize::new(3).unwrap());
    /// cache.insert("a", 1);
    /// cache.insert("b", 2);
    /// cache.get(&"a");
    ///
    /// assert_eq!(cache.entries(), [("b", 2), ("a", 1)]);
    /// ```
    pub fn entries(&self) -> Vec<(K, V)>
    where
        V: Clone,
    {
        let guard = self.inner.lock();
        let inner = &*guard;

        inner
            .list
            .iter()
            .map(|key| {
                let entry = inner
                    .map
                    .get(key)
                    .expect("key in recency list missing from map");
                (key.clone(), entry.value.clone())
            })
            .collect()
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    /// Returns the maximum number of entries the cache can hold.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity.get()
    }
}
