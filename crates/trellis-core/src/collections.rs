//! Map aliases used by the reconciler and the runtime queues.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};

    pub type FastMap<K, V> = HashMap<K, V>;
    pub type FastSet<K> = HashSet<K>;
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};

    pub type FastMap<K, V> = HashMap<K, V, ahash::RandomState>;
    pub type FastSet<K> = HashSet<K, ahash::RandomState>;
}

pub use map::{FastMap, FastSet};

pub(crate) fn fast_map<K, V>(capacity: usize) -> FastMap<K, V> {
    FastMap::with_capacity_and_hasher(capacity, Default::default())
}

pub(crate) fn fast_set<K>(capacity: usize) -> FastSet<K> {
    FastSet::with_capacity_and_hasher(capacity, Default::default())
}
