use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;

/// Extension helpers for `DashMap` that never hand out shard guards.
///
/// Entity reads can await (synced attributes block until the server
/// answers), so no caller may hold a `Ref` across an `.await`. These helpers
/// clone the `Arc`s out and drop the guard before returning.
pub trait DashMapExt<K, V> {
    /// Clone the value for `key`.
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone;

    /// Clone every value.
    fn values_cloned(&self) -> Vec<V>
    where
        V: Clone;

    /// Drain the map and insert every value again under a recomputed key.
    fn rekey_all(&self, key: impl Fn(&V) -> K);
}

impl<K, V> DashMapExt<K, V> for DashMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get(key).map(|r| r.value().clone())
    }

    fn values_cloned(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|e| e.value().clone()).collect()
    }

    fn rekey_all(&self, key: impl Fn(&V) -> K) {
        let keys: Vec<K> = self.iter().map(|e| e.key().clone()).collect();
        let values: Vec<V> = keys
            .iter()
            .filter_map(|k| self.remove(k).map(|(_, v)| v))
            .collect();
        for value in values {
            self.insert(key(&value), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rekey_all() {
        let map: DashMap<String, String> = DashMap::new();
        map.insert("a".into(), "Alpha".into());
        map.insert("b".into(), "Beta".into());

        map.rekey_all(|v| v.to_lowercase());

        assert_eq!(map.get_cloned("alpha").as_deref(), Some("Alpha"));
        assert_eq!(map.get_cloned("beta").as_deref(), Some("Beta"));
        assert!(map.get_cloned("a").is_none());
        assert_eq!(map.values_cloned().len(), 2);
    }
}
