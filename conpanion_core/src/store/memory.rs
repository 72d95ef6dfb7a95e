use super::{apply_updates, Document, DocumentStore, FieldUpdate, Filter};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// In-process document store
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| Error::State("memory store lock poisoned".into()))
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .map(|c| c.get(collection).map_or(0, |docs| docs.len()))
            .unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<(String, Document)>> {
        let collections = self.lock()?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect())
    }

    fn create(&self, collection: &str, data: Document) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.lock()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        tracing::debug!("Created {}/{}", collection, id);
        Ok(id)
    }

    fn set(&self, collection: &str, id: &str, data: Document) -> Result<()> {
        self.lock()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, updates: &[(String, FieldUpdate)]) -> Result<()> {
        let mut collections = self.lock()?;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| Error::not_found(format!("{}/{}", collection, id)))?;

        // Apply to a copy so a failed update leaves the document untouched
        let mut updated = doc.clone();
        apply_updates(&mut updated, updates)?;
        *doc = updated;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(docs) = self.lock()?.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}
