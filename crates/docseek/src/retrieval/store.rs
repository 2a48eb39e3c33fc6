//! Flat cosine-similarity index with OR metadata filters and atomic JSON persistence

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Entry metadata
pub type Metadata = Map<String, Value>;

/// One exact-match conjunction; an entry matches when every key is equal
pub type FilterClause = Map<String, Value>;

/// A stored `(id, vector, metadata)` triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub unique_id: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

/// A nearest-neighbour hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub id: String,
    /// `1 - cosine similarity`
    pub distance: f32,
    pub metadata: Metadata,
}

/// On-disk layout
#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Build one OR clause per value of `key`
pub fn or_filters<'a>(key: &str, values: impl IntoIterator<Item = &'a str>) -> Vec<FilterClause> {
    values
        .into_iter()
        .map(|value| {
            let mut clause = FilterClause::new();
            clause.insert(key.to_string(), Value::String(value.to_string()));
            clause
        })
        .collect()
}

fn matches_any(metadata: &Metadata, filters: &[FilterClause]) -> bool {
    filters.is_empty()
        || filters
            .iter()
            .any(|clause| clause.iter().all(|(k, v)| metadata.get(k) == Some(v)))
}

/// A similarity index over `(id, vector, metadata)` entries.
///
/// Entries keep insertion order; overwriting an id keeps its original slot.
/// All vectors in one index share a dimensionality, fixed by the first insert
/// or by the file it was loaded from.
#[derive(Debug)]
pub struct FragmentStore {
    name: String,
    path: Option<PathBuf>,
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
    dirty: bool,
}

impl FragmentStore {
    /// Create an index that is never written to disk
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            dimensions: None,
            entries: Vec::new(),
            positions: HashMap::new(),
            dirty: false,
        }
    }

    /// Open an index backed by `path`, loading it if the file exists
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self::in_memory(name);

        if path.exists() {
            let file = std::fs::File::open(&path)?;
            let data: IndexFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                Error::vector_db(format!("Corrupt index file {}: {}", path.display(), e))
            })?;

            store.dimensions = data.dimensions;
            for entry in data.entries {
                store.insert(entry)?;
            }
            tracing::info!(
                "Loaded index '{}' with {} entries from {}",
                store.name,
                store.len(),
                path.display()
            );
        }

        store.path = Some(path);
        store.dirty = false;
        Ok(store)
    }

    /// Index name used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Vector length shared by all entries, once known
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by id
    pub fn get(&self, unique_id: &str) -> Option<&IndexEntry> {
        self.positions.get(unique_id).map(|&i| &self.entries[i])
    }

    /// Entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Insert or overwrite an entry
    pub fn store(
        &mut self,
        unique_id: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<()> {
        self.insert(IndexEntry {
            unique_id: unique_id.into(),
            embedding,
            metadata,
        })
    }

    fn insert(&mut self, entry: IndexEntry) -> Result<()> {
        self.check_dimensions(entry.embedding.len())?;
        self.dimensions = Some(entry.embedding.len());

        match self.positions.get(&entry.unique_id) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.positions.insert(entry.unique_id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn check_dimensions(&self, actual: usize) -> Result<()> {
        match self.dimensions {
            Some(expected) if expected != actual => {
                Err(Error::DimensionMismatch { expected, actual })
            }
            _ if actual == 0 => Err(Error::vector_db(format!(
                "Empty embedding for index '{}'",
                self.name
            ))),
            _ => Ok(()),
        }
    }

    /// The `k` nearest entries matching any filter clause, closest first.
    ///
    /// Ties keep insertion order. An empty index yields an empty result.
    pub fn find_most_similar(
        &self,
        query: &[f32],
        k: usize,
        filters: &[FilterClause],
    ) -> Result<Vec<SimilarityResult>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimensions(query.len())?;

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .filter(|e| matches_any(&e.metadata, filters))
            .map(|e| (1.0 - cosine_similarity(&e.embedding, query), e))
            .collect();

        // sort_by is stable, so equal distances stay in insertion order
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, e)| SimilarityResult {
                id: e.unique_id.clone(),
                distance,
                metadata: e.metadata.clone(),
            })
            .collect())
    }

    /// Like [`find_most_similar`](Self::find_most_similar) but fails with `EmptyIndex`
    pub fn find_most_similar_strict(
        &self,
        query: &[f32],
        k: usize,
        filters: &[FilterClause],
    ) -> Result<Vec<SimilarityResult>> {
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex(self.name.clone()));
        }
        self.find_most_similar(query, k, filters)
    }

    /// Whether entries changed since the last load or persist
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write to a temp file beside the backing file, then rename over it
    pub fn persist_to_disk(&mut self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            tracing::debug!("Index '{}' is in-memory, nothing to persist", self.name);
            return Ok(());
        };

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let data = IndexFile {
                dimensions: self.dimensions,
                entries: self.entries.clone(),
            };
            serde_json::to_writer(&mut writer, &data)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(
            "Persisted index '{}' ({} entries) to {}",
            self.name,
            self.entries.len(),
            path.display()
        );
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(doc: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert("documento".into(), json!(doc));
        m
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_empty_index() {
        let store = FragmentStore::in_memory("summary");
        assert!(store.find_most_similar(&[1.0], 3, &[]).unwrap().is_empty());
        assert!(matches!(
            store.find_most_similar_strict(&[1.0], 3, &[]),
            Err(Error::EmptyIndex(name)) if name == "summary"
        ));
    }

    #[test]
    fn test_round_trip_with_filter() {
        let mut store = FragmentStore::in_memory("fragments");
        store.store("a_0", vec![1.0, 0.0], meta("a")).unwrap();
        store.store("b_0", vec![0.6, 0.8], meta("b")).unwrap();

        let hits = store
            .find_most_similar(&[0.6, 0.8], 1, &or_filters("documento", ["b"]))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b_0");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_or_filters() {
        let mut store = FragmentStore::in_memory("fragments");
        store.store("a_0", vec![1.0, 0.0], meta("a")).unwrap();
        store.store("b_0", vec![1.0, 0.0], meta("b")).unwrap();
        store.store("c_0", vec![1.0, 0.0], meta("c")).unwrap();

        let hits = store
            .find_most_similar(&[1.0, 0.0], 10, &or_filters("documento", ["a", "c"]))
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a_0", "c_0"]);

        let none = store
            .find_most_similar(&[1.0, 0.0], 10, &or_filters("documento", ["zzz"]))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_conjunctive_clause() {
        let mut store = FragmentStore::in_memory("fragments");
        let mut m = meta("a");
        m.insert("lang".into(), json!("pt"));
        store.store("a_0", vec![1.0], m.clone()).unwrap();
        store.store("a_1", vec![1.0], meta("a")).unwrap();

        let mut clause = FilterClause::new();
        clause.insert("documento".into(), json!("a"));
        clause.insert("lang".into(), json!("pt"));
        let hits = store.find_most_similar(&[1.0], 10, &[clause]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a_0");
    }

    #[test]
    fn test_ties_keep_insertion_order_and_overwrite_keeps_slot() {
        let mut store = FragmentStore::in_memory("fragments");
        store.store("first", vec![1.0, 0.0], meta("a")).unwrap();
        store.store("second", vec![1.0, 0.0], meta("b")).unwrap();
        store.store("first", vec![2.0, 0.0], meta("c")).unwrap();

        assert_eq!(store.len(), 2);
        let hits = store.find_most_similar(&[1.0, 0.0], 2, &[]).unwrap();
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[0].metadata, meta("c"));
        assert_eq!(hits[1].id, "second");
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut store = FragmentStore::in_memory("fragments");
        store.store("a", vec![1.0, 0.0], meta("a")).unwrap();
        assert!(matches!(
            store.store("b", vec![1.0, 0.0, 0.0], meta("b")),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            store.find_most_similar(&[1.0], 1, &[]),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fragments.json");

        let mut store = FragmentStore::open("fragments", &path).unwrap();
        assert!(store.is_empty());
        store.store("a_0", vec![1.0, 0.0], meta("a")).unwrap();
        store.store("b_0", vec![0.0, 1.0], meta("b")).unwrap();
        assert!(store.is_dirty());
        store.persist_to_disk().unwrap();
        assert!(!store.is_dirty());

        let reloaded = FragmentStore::open("fragments", &path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.dimensions(), Some(2));
        let ids: Vec<_> = reloaded.entries().map(|e| e.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["a_0", "b_0"]);

        // no stray temp files left beside the index
        let files = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_corrupt_file_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            FragmentStore::open("summary", &path),
            Err(Error::VectorDb(_))
        ));
    }
}
