//! Typed record collections
//!
//! A collection is a JSON array of records stored under one key, newest
//! first. Every mutation goes through [`KvStore::update`] so two writers
//! (two windows, a double-clicked submit) never drop each other's records.

use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

use crate::kv::{scoped_key, KvStore, Result};

/// A record that can be addressed by a string identifier
pub trait Keyed {
    /// The record's identifier
    fn key(&self) -> &str;
}

/// A list of records persisted under a single key
pub struct LocalCollection<T> {
    kv: KvStore,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LocalCollection<T>
where
    T: Keyed + Serialize + DeserializeOwned + Clone,
{
    /// Open the collection stored under `scopes` (e.g. `["farmlands", farmer_id]`)
    pub fn new(kv: KvStore, scopes: &[&str]) -> Self {
        Self { kv, key: scoped_key(scopes), _marker: PhantomData }
    }

    /// The storage key backing this collection
    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// All records, newest first
    pub fn list(&self) -> Result<Vec<T>> {
        Ok(self.kv.get::<Vec<T>>(&self.key)?.unwrap_or_default())
    }

    /// Find a record by id
    pub fn find(&self, id: &str) -> Result<Option<T>> {
        Ok(self.list()?.into_iter().find(|item| item.key() == id))
    }

    /// Insert a record at the front of the list
    ///
    /// Records are not de-duplicated: prepending the same content twice
    /// yields two entries.
    pub fn prepend(&self, item: T) -> Result<()> {
        self.kv.update(&self.key, |current: Option<Vec<T>>| {
            let mut items = current.unwrap_or_default();
            items.insert(0, item.clone());
            items
        })?;
        Ok(())
    }

    /// Replace the record with the same id in place, or prepend it
    pub fn upsert(&self, item: T) -> Result<()> {
        self.kv.update(&self.key, |current: Option<Vec<T>>| {
            let mut items = current.unwrap_or_default();
            match items.iter().position(|existing| existing.key() == item.key()) {
                Some(index) => items[index] = item.clone(),
                None => items.insert(0, item.clone()),
            }
            items
        })?;
        Ok(())
    }

    /// Remove a record by id, returning whether it was present
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut removed = false;
        self.kv.update(&self.key, |current: Option<Vec<T>>| {
            let mut items = current.unwrap_or_default();
            let before = items.len();
            items.retain(|item| item.key() != id);
            removed = items.len() != before;
            items
        })?;
        Ok(removed)
    }

    /// Rewrite every record with `f`
    pub fn map_all<F>(&self, mut f: F) -> Result<Vec<T>>
    where
        F: FnMut(T) -> T,
    {
        self.kv.update(&self.key, |current: Option<Vec<T>>| {
            current.unwrap_or_default().into_iter().map(&mut f).collect()
        })
    }

    /// Replace the whole collection
    pub fn replace_all(&self, items: &[T]) -> Result<()> {
        self.kv.set(&self.key, &items)
    }

    /// Delete the collection entirely
    pub fn clear(&self) -> Result<()> {
        self.kv.remove(&self.key)?;
        Ok(())
    }

    /// Number of records
    pub fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    /// Whether the collection holds no records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
