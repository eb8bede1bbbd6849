use std::collections::{BTreeMap, HashMap};

pub type KeyType = String;

/// A keyed value store. Recording the same content twice hands back the
/// same key; reads after record-time always return the recorded value.
pub trait Dictionary<T> {
    fn record(&mut self, value: T) -> KeyType;
    fn at(&self, key: &str) -> Option<&T>;
    fn keys(&self) -> Vec<KeyType>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Content identity for dictionary dedup: a stable byte image to hash,
/// plus value equality to confirm on hash collision.
pub trait DictContent: PartialEq {
    fn content_bytes(&self) -> Vec<u8>;
}

impl DictContent for crate::ChunkIr {
    fn content_bytes(&self) -> Vec<u8> {
        self.content_bytes()
    }
}

impl DictContent for crate::Tensor {
    fn content_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for dim in self.shape().iter() {
            bytes.extend(dim.to_le_bytes());
        }
        for v in self.values() {
            bytes.extend(v.to_le_bytes());
        }
        bytes
    }
}

/// In-memory dictionary with content-hashed keys `chunk_<n>`.
#[derive(Clone, Debug, Default)]
pub struct RamDictionary<T> {
    entries: BTreeMap<KeyType, T>,
    by_hash: HashMap<u64, Vec<KeyType>>,
    next: usize,
}

impl<T> RamDictionary<T> {
    pub fn new() -> Self {
        RamDictionary {
            entries: BTreeMap::new(),
            by_hash: HashMap::new(),
            next: 0,
        }
    }

    /// Install a value under a caller-chosen key (deserialization).
    pub fn insert_keyed(&mut self, key: KeyType, value: T)
    where
        T: DictContent,
    {
        let hash = rapidhash::rapidhash(&value.content_bytes());
        self.by_hash.entry(hash).or_default().push(key.clone());
        self.next = self.next.max(key_counter(&key).map_or(0, |n| n + 1));
        self.entries.insert(key, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyType, &T)> {
        self.entries.iter()
    }
}

fn key_counter(key: &str) -> Option<usize> {
    key.strip_prefix("chunk_")?.parse().ok()
}

impl<T: DictContent + Clone> Dictionary<T> for RamDictionary<T> {
    fn record(&mut self, value: T) -> KeyType {
        let hash = rapidhash::rapidhash(&value.content_bytes());
        if let Some(candidates) = self.by_hash.get(&hash) {
            for key in candidates {
                if self.entries[key] == value {
                    return key.clone();
                }
            }
        }
        let key = format!("chunk_{}", self.next);
        self.next += 1;
        self.by_hash.entry(hash).or_default().push(key.clone());
        self.entries.insert(key.clone(), value);
        key
    }

    fn at(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    fn keys(&self) -> Vec<KeyType> {
        self.entries.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Frontend tensors are registered under their names rather than counted
/// keys.
impl RamDictionary<crate::Tensor> {
    pub fn record_named(&mut self, name: impl Into<KeyType>, tensor: crate::Tensor) {
        self.insert_keyed(name.into(), tensor);
    }
}
