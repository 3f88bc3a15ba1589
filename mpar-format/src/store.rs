//! Open-hashing map from entry name to value.
//!
//! Buckets are singly linked chains. The bucket count is a power of two that
//! starts at zero and doubles whenever the node count reaches it, so
//! iteration order depends only on the keys inserted.

use std::collections::TryReserveError;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Out of memory while growing the store")]
    OutOfMemory(#[source] TryReserveError),
}

/// `hash = hash * 33 ^ byte`, seeded with 5381.
pub fn hash_key(key: &str) -> u32 {
    key.bytes().fold(5381u32, |hash, byte| {
        (hash << 5).wrapping_add(hash) ^ byte as u32
    })
}

struct Node<V> {
    hash: u32,
    key: String,
    value: V,
    next: Option<Box<Node<V>>>,
}

type Link<V> = Option<Box<Node<V>>>;

pub struct Store<V> {
    buckets: Vec<Link<V>>,
    len: usize,
}

impl<V> Store<V> {
    pub const fn new() -> Store<V> {
        Store {
            buckets: Vec::new(),
            len: 0,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index(&self, hash: u32) -> Option<usize> {
        if self.buckets.is_empty() {
            None
        } else {
            Some(hash as usize & (self.buckets.len() - 1))
        }
    }

    fn find(&self, key: &str) -> Option<&Node<V>> {
        let hash = hash_key(key);
        let mut cursor = self.buckets[self.bucket_index(hash)?].as_deref();
        while let Some(node) = cursor {
            if node.hash == hash && node.key == key {
                return Some(node);
            }
            cursor = node.next.as_deref();
        }
        None
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Node<V>> {
        let hash = hash_key(key);
        let index = self.bucket_index(hash)?;
        let mut cursor = self.buckets[index].as_deref_mut();
        while let Some(node) = cursor {
            if node.hash == hash && node.key == key {
                return Some(node);
            }
            cursor = node.next.as_deref_mut();
        }
        None
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.find(key).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.find_mut(key).map(|n| &mut n.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Inserts or replaces the value for `key`, returning the old value.
    /// On allocation failure the store is left unchanged.
    pub fn set(&mut self, key: &str, value: V) -> Result<Option<V>, StoreError> {
        if let Some(node) = self.find_mut(key) {
            return Ok(Some(std::mem::replace(&mut node.value, value)));
        }

        let mut owned_key = String::new();
        owned_key
            .try_reserve_exact(key.len())
            .map_err(StoreError::OutOfMemory)?;
        owned_key.push_str(key);

        if self.len >= self.buckets.len() {
            let count = if self.buckets.is_empty() {
                1
            } else {
                self.buckets.len() << 1
            };
            self.resize(count)?;
        }

        let node = Box::new(Node {
            hash: hash_key(key),
            key: owned_key,
            value,
            next: None,
        });
        self.link(node);
        self.len += 1;
        Ok(None)
    }

    fn link(&mut self, mut node: Box<Node<V>>) {
        let index = node.hash as usize & (self.buckets.len() - 1);
        node.next = self.buckets[index].take();
        self.buckets[index] = Some(node);
    }

    fn resize(&mut self, count: usize) -> Result<(), StoreError> {
        let mut buckets: Vec<Link<V>> = Vec::new();
        buckets
            .try_reserve_exact(count)
            .map_err(StoreError::OutOfMemory)?;
        buckets.resize_with(count, || None);

        let old = std::mem::replace(&mut self.buckets, buckets);
        for mut chain in old {
            while let Some(mut node) = chain {
                chain = node.next.take();
                self.link(node);
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let hash = hash_key(key);
        let index = self.bucket_index(hash)?;

        let mut link = &mut self.buckets[index];
        while link
            .as_ref()
            .map_or(false, |n| !(n.hash == hash && n.key == key))
        {
            link = &mut link.as_mut()?.next;
        }

        let mut node = link.take()?;
        *link = node.next.take();
        self.len -= 1;
        Some(node.value)
    }

    /// Removes every entry. The bucket array is kept.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            let mut chain = bucket.take();
            while let Some(mut node) = chain {
                chain = node.next.take();
            }
        }
        self.len = 0;
    }

    /// Iterates bucket by bucket, following each chain.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            buckets: self.buckets.iter(),
            chain: None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(k, _)| k)
    }
}

impl<V> Default for Store<V> {
    fn default() -> Self {
        Store::new()
    }
}

impl<V> Drop for Store<V> {
    fn drop(&mut self) {
        // Unlink chains iteratively so long chains don't recurse.
        self.clear();
    }
}

impl<V: Clone> Clone for Store<V> {
    fn clone(&self) -> Self {
        let mut buckets: Vec<Link<V>> = Vec::with_capacity(self.buckets.len());
        for bucket in &self.buckets {
            let mut nodes = Vec::new();
            let mut cursor = bucket.as_deref();
            while let Some(node) = cursor {
                nodes.push(node);
                cursor = node.next.as_deref();
            }

            let mut chain: Link<V> = None;
            for node in nodes.into_iter().rev() {
                chain = Some(Box::new(Node {
                    hash: node.hash,
                    key: node.key.clone(),
                    value: node.value.clone(),
                    next: chain,
                }));
            }
            buckets.push(chain);
        }

        Store {
            buckets,
            len: self.len,
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, V> {
    buckets: std::slice::Iter<'a, Link<V>>,
    chain: Option<&'a Node<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.chain {
                self.chain = node.next.as_deref();
                return Some((node.key.as_str(), &node.value));
            }
            self.chain = self.buckets.next()?.as_deref();
        }
    }
}

impl<'a, V> IntoIterator for &'a Store<V> {
    type Item = (&'a str, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn djb2_xor_hash() {
        assert_eq!(hash_key(""), 5381);
        assert_eq!(hash_key("a"), (5381u32 * 33) ^ b'a' as u32);
    }

    #[test]
    fn grows_by_doubling() {
        let mut store = Store::new();
        assert_eq!(store.bucket_count(), 0);
        store.set("a", 1).unwrap();
        assert_eq!(store.bucket_count(), 1);
        store.set("b", 2).unwrap();
        assert_eq!(store.bucket_count(), 2);
        store.set("c", 3).unwrap();
        assert_eq!(store.bucket_count(), 4);
        store.set("d", 4).unwrap();
        assert_eq!(store.bucket_count(), 4);
        store.set("e", 5).unwrap();
        assert_eq!(store.bucket_count(), 8);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn set_get_replace_remove() {
        let mut store = Store::new();
        assert_eq!(store.set("a.txt", vec![1u8]).unwrap(), None);
        assert_eq!(store.set("a.txt", vec![2u8]).unwrap(), Some(vec![1u8]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a.txt"), Some(&vec![2u8]));
        store.get_mut("a.txt").unwrap().push(3);
        assert_eq!(store.get("a.txt"), Some(&vec![2u8, 3]));

        assert_eq!(store.remove("missing"), None);
        assert_eq!(store.remove("a.txt"), Some(vec![2u8, 3]));
        assert!(!store.contains_key("a.txt"));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_from_middle_of_chain() {
        let mut store = Store::new();
        for i in 0..64 {
            store.set(&format!("file{}", i), i).unwrap();
        }
        for i in (0..64).step_by(3) {
            assert_eq!(store.remove(&format!("file{}", i)), Some(i));
        }
        for i in 0..64 {
            assert_eq!(store.get(&format!("file{}", i)).is_some(), i % 3 != 0);
        }
        assert_eq!(store.iter().count(), store.len());
    }

    #[test]
    fn iteration_visits_every_entry_once() {
        let mut store = Store::new();
        for name in &["x", "y", "z", "w", "v"] {
            store.set(name, name.len()).unwrap();
        }
        let mut keys: Vec<&str> = store.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["v", "w", "x", "y", "z"]);

        let cloned = store.clone();
        assert_eq!(
            cloned.keys().collect::<Vec<_>>(),
            store.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn clear_empties() {
        let mut store = Store::new();
        store.set("a", ()).unwrap();
        store.set("b", ()).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.iter().next(), None);
        store.set("a", ()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
