//! JSON-file document store with file locking.
//!
//! Each collection lives in `<root>/<collection>.json` as a map of document
//! id to document. Writers serialize on an exclusive lock of
//! `<root>/<collection>.lock` and replace the collection file atomically.

use super::{apply_updates, Document, DocumentStore, FieldUpdate, Filter};
use crate::{Error, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

type CollectionDocs = BTreeMap<String, Document>;

pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.json", collection))
    }

    fn lock_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.lock", collection))
    }

    /// Load a collection for reading with shared locking
    ///
    /// Returns an empty collection if the file doesn't exist.
    /// If the file is corrupted, logs a warning and returns an empty collection.
    fn load_for_read(&self, collection: &str) -> Result<CollectionDocs> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(CollectionDocs::new());
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open {:?}: {}. Treating as empty.", path, e);
                return Ok(CollectionDocs::new());
            }
        };

        file.lock_shared()?;
        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        match serde_json::from_str::<CollectionDocs>(&contents) {
            Ok(docs) => Ok(docs),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse collection file {:?}: {}. Treating as empty.",
                    path,
                    e
                );
                Ok(CollectionDocs::new())
            }
        }
    }

    /// Load, modify and atomically save a collection under an exclusive lock
    ///
    /// Unlike reads, a corrupted collection file is an error here so that a
    /// write never replaces data it could not parse.
    fn modify<T, F>(&self, collection: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut CollectionDocs) -> Result<T>,
    {
        std::fs::create_dir_all(&self.root)?;

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path(collection))?;
        lock_file.lock_exclusive()?;

        let result = self.modify_locked(collection, f);

        lock_file.unlock()?;
        result
    }

    fn modify_locked<T, F>(&self, collection: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut CollectionDocs) -> Result<T>,
    {
        let path = self.collection_path(collection);
        let mut docs = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str::<CollectionDocs>(&contents).map_err(|e| {
                Error::State(format!("collection file {:?} is corrupted: {}", path, e))
            })?
        } else {
            CollectionDocs::new()
        };

        let value = f(&mut docs)?;

        let temp = NamedTempFile::new_in(&self.root)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(&docs)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved collection {} ({} documents)", collection, docs.len());
        Ok(value)
    }
}

impl DocumentStore for JsonFileStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.load_for_read(collection)?.remove(id))
    }

    fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<(String, Document)>> {
        Ok(self
            .load_for_read(collection)?
            .into_iter()
            .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
            .collect())
    }

    fn create(&self, collection: &str, data: Document) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.modify(collection, |docs| {
            docs.insert(id.clone(), data);
            Ok(())
        })?;
        Ok(id)
    }

    fn set(&self, collection: &str, id: &str, data: Document) -> Result<()> {
        self.modify(collection, |docs| {
            docs.insert(id.to_string(), data);
            Ok(())
        })
    }

    fn update(&self, collection: &str, id: &str, updates: &[(String, FieldUpdate)]) -> Result<()> {
        self.modify(collection, |docs| {
            let doc = docs
                .get_mut(id)
                .ok_or_else(|| Error::not_found(format!("{}/{}", collection, id)))?;
            let mut updated = doc.clone();
            apply_updates(&mut updated, updates)?;
            *doc = updated;
            Ok(())
        })
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        if !self.collection_path(collection).exists() {
            return Ok(());
        }
        self.modify(collection, |docs| {
            docs.remove(id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::QueryOp;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());

        let id = store
            .create("plans", doc(json!({"Name": "Push", "User": "u1"})))
            .unwrap();

        // A second handle on the same directory sees the document
        let reopened = JsonFileStore::new(temp_dir.path());
        let fetched = reopened.get("plans", &id).unwrap().unwrap();
        assert_eq!(fetched["Name"], "Push");
    }

    #[test]
    fn test_missing_collection_reads_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("nested"));

        assert!(store.get("food", "x").unwrap().is_none());
        assert!(store.query("food", &[]).unwrap().is_empty());
        store.delete("food", "x").unwrap();
    }

    #[test]
    fn test_increment_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());
        store
            .set("dailyMacros", "d1", doc(json!({"userId": "u1", "calories": 0})))
            .unwrap();

        store
            .update(
                "dailyMacros",
                "d1",
                &[("calories".into(), FieldUpdate::Increment(300))],
            )
            .unwrap();

        let hits = store
            .query("dailyMacros", &[Filter::new("calories", QueryOp::Ge, 300)])
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_corrupted_collection_reads_empty_but_refuses_writes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());
        std::fs::write(temp_dir.path().join("food.json"), "{ invalid json }").unwrap();

        assert!(store.query("food", &[]).unwrap().is_empty());

        let result = store.create("food", doc(json!({"name": "Oats"})));
        assert!(matches!(result, Err(Error::State(_))));

        // The corrupted file was left for manual recovery
        let contents = std::fs::read_to_string(temp_dir.path().join("food.json")).unwrap();
        assert_eq!(contents, "{ invalid json }");
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());
        store.create("goals", doc(json!({"userId": "u1"}))).unwrap();

        let mut names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["goals.json", "goals.lock"]);
    }
}
