//! In-memory resource store.
//!
//! `MemStore` implements `ResourceStore` using a `BTreeMap` for
//! deterministic ordering. Useful for tests and for hosts whose resources
//! are fixed at session creation.

use std::collections::BTreeMap;

use crate::error::HostError;
use crate::resource_store::ResourceStore;

#[derive(Debug, Clone, Default)]
pub struct MemStore {
    data: BTreeMap<String, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    /// Create a store pre-populated with data.
    pub fn with_data(data: BTreeMap<String, Vec<u8>>) -> Self {
        Self { data }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Vec<u8>) {
        self.data.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) {
        self.data.remove(name);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ResourceStore for MemStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, HostError> {
        Ok(self.data.get(name).cloned())
    }
}
