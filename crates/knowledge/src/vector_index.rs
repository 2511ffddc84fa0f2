//! Per-tenant flat inner-product vector index.
//!
//! Each tenant's vectors live in `<index_dir>/<sanitized tenant>.index`:
//!
//! ```text
//! b"PVIX" | u32 version | u32 dim | u8 metric | u64 count | count * (i64 id, dim * f32)
//! ```
//!
//! All integers and floats are little-endian. The file is rewritten through
//! a temp file and renamed into place after every add, so readers see either
//! the old or the new index, never a partial one.

use crate::tenant::sanitize_tenant;
use policy_core::{AppError, AppResult};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"PVIX";
const FORMAT_VERSION: u32 = 1;
const METRIC_INNER_PRODUCT: u8 = 0;
const HEADER_LEN: usize = 21;

/// Id reported for result slots with no stored vector.
pub const NO_MATCH: i64 = -1;

/// Ranked search results, parallel arrays of length `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
    pub scores: Vec<f32>,
    pub ids: Vec<i64>,
}

impl SearchHits {
    /// `(id, score)` pairs in rank order, skipping empty slots.
    pub fn matches(&self) -> impl Iterator<Item = (i64, f32)> + '_ {
        self.ids
            .iter()
            .zip(&self.scores)
            .filter(|(id, _)| **id != NO_MATCH)
            .map(|(id, score)| (*id, *score))
    }

    /// Score of the best match, if any.
    pub fn top_score(&self) -> Option<f32> {
        self.matches().next().map(|(_, score)| score)
    }
}

/// In-memory flat index with exhaustive inner-product search.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    ids: Vec<i64>,
    /// Row-major, `ids.len() * dim` values
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Append vectors tagged with explicit ids.
    pub fn add(&mut self, vectors: &[Vec<f32>], ids: &[i64]) -> AppResult<()> {
        if vectors.len() != ids.len() {
            return Err(AppError::Index(format!(
                "Got {} vectors but {} ids",
                vectors.len(),
                ids.len()
            )));
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(AppError::Index(format!(
                "Vector dimension {} does not match index dimension {}",
                bad.len(),
                self.dim
            )));
        }

        let mut seen: HashSet<i64> = self.ids.iter().copied().collect();
        for &id in ids {
            if id < 0 || !seen.insert(id) {
                return Err(AppError::Index(format!("Vector id {} is invalid or already used", id)));
            }
        }

        self.ids.extend_from_slice(ids);
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }

        Ok(())
    }

    /// Top `k` vectors by inner product, best first.
    ///
    /// Slots beyond the number of stored vectors hold [`NO_MATCH`] with
    /// score `f32::MIN`.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<SearchHits> {
        if query.len() != self.dim {
            return Err(AppError::Index(format!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dim
            )));
        }

        let mut scored: Vec<(i64, f32)> = self
            .ids
            .iter()
            .zip(self.vectors.chunks_exact(self.dim.max(1)))
            .map(|(id, vector)| (*id, dot(query, vector)))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        let mut hits = SearchHits {
            scores: scored.iter().map(|(_, s)| *s).collect(),
            ids: scored.iter().map(|(id, _)| *id).collect(),
        };
        hits.scores.resize(k, f32::MIN);
        hits.ids.resize(k, NO_MATCH);

        Ok(hits)
    }

    fn write_to(&self, path: &Path) -> AppResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dim as u32).to_le_bytes())?;
        writer.write_all(&[METRIC_INNER_PRODUCT])?;
        writer.write_all(&(self.ids.len() as u64).to_le_bytes())?;

        for (id, vector) in self.ids.iter().zip(self.vectors.chunks_exact(self.dim)) {
            writer.write_all(&id.to_le_bytes())?;
            writer.write_all(&vector_to_bytes(vector))?;
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn read_from(path: &Path) -> AppResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let (dim, count) = read_header(&mut reader, file_len, path)?;

        let mut index = FlatIndex::new(dim);
        index.ids.reserve(count);
        index.vectors.reserve(count * dim);

        let mut id_buf = [0u8; 8];
        let mut vector_buf = vec![0u8; dim * 4];
        for _ in 0..count {
            reader
                .read_exact(&mut id_buf)
                .and_then(|_| reader.read_exact(&mut vector_buf))
                .map_err(|e| AppError::Index(format!("Truncated index file {:?}: {}", path, e)))?;

            index.ids.push(i64::from_le_bytes(id_buf));
            index.vectors.extend(bytes_to_vector(&vector_buf));
        }

        Ok(index)
    }
}

/// Parse the header, returning `(dim, count)`.
///
/// The record count must agree with `file_len` before anything is allocated.
fn read_header(reader: &mut impl Read, file_len: u64, path: &Path) -> AppResult<(usize, usize)> {
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|e| AppError::Index(format!("Failed to read index header {:?}: {}", path, e)))?;

    if &header[0..4] != MAGIC {
        return Err(AppError::Index(format!("Not a vector index file: {:?}", path)));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(AppError::Index(format!(
            "Unsupported index version {} in {:?}",
            version, path
        )));
    }

    let dim = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
    if dim == 0 {
        return Err(AppError::Index(format!("Index {:?} has zero dimension", path)));
    }

    if header[12] != METRIC_INNER_PRODUCT {
        return Err(AppError::Index(format!(
            "Unsupported metric {} in {:?}",
            header[12], path
        )));
    }

    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header[13..HEADER_LEN]);
    let count = u64::from_le_bytes(count_bytes);

    let expected_len = (dim as u64)
        .checked_mul(4)
        .and_then(|vector_len| vector_len.checked_add(8))
        .and_then(|record_len| record_len.checked_mul(count))
        .and_then(|body_len| body_len.checked_add(HEADER_LEN as u64));
    if expected_len != Some(file_len) {
        return Err(AppError::Index(format!(
            "Index {:?} claims {} vectors of dimension {} but is {} bytes",
            path, count, dim, file_len
        )));
    }

    let count = usize::try_from(count)
        .map_err(|_| AppError::Index(format!("Index {:?} is too large to load", path)))?;
    Ok((dim, count))
}

fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_vector(bytes: &[u8]) -> impl Iterator<Item = f32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Directory of per-tenant index files.
#[derive(Debug, Clone)]
pub struct VectorIndexStore {
    dir: PathBuf,
}

impl VectorIndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the tenant's index file.
    pub fn index_path(&self, tenant_id: &str) -> PathBuf {
        self.dir.join(format!("{}.index", sanitize_tenant(tenant_id)))
    }

    pub fn exists(&self, tenant_id: &str) -> bool {
        self.index_path(tenant_id).is_file()
    }

    /// Load the tenant's index, or `None` if it has none yet.
    pub fn load(&self, tenant_id: &str) -> AppResult<Option<FlatIndex>> {
        let path = self.index_path(tenant_id);
        if !path.is_file() {
            return Ok(None);
        }
        FlatIndex::read_from(&path).map(Some)
    }

    /// Load the tenant's index, or start an empty one of dimension `dim`.
    ///
    /// A new index is only written to disk by [`VectorIndexStore::add`].
    pub fn load_or_create(&self, tenant_id: &str, dim: usize) -> AppResult<FlatIndex> {
        match self.load(tenant_id)? {
            Some(index) if index.dim() != dim => Err(AppError::Index(format!(
                "Index for tenant '{}' has dimension {}, got {}",
                tenant_id,
                index.dim(),
                dim
            ))),
            Some(index) => Ok(index),
            None => Ok(FlatIndex::new(dim)),
        }
    }

    /// Number of stored vectors, 0 when the tenant has no index file.
    ///
    /// Only the header is read.
    pub fn current_size(&self, tenant_id: &str) -> AppResult<usize> {
        let path = self.index_path(tenant_id);
        if !path.is_file() {
            return Ok(0);
        }
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let (_, count) = read_header(&mut reader, file_len, &path)?;
        Ok(count)
    }

    /// Append vectors with explicit ids and persist the index.
    ///
    /// Creates the index file on first write, with the dimension of the
    /// first vector.
    pub fn add(&self, tenant_id: &str, vectors: &[Vec<f32>], ids: &[i64]) -> AppResult<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        if first.is_empty() {
            return Err(AppError::Index("Cannot index zero-dimension vectors".to_string()));
        }

        let mut index = self.load_or_create(tenant_id, first.len())?;
        index.add(vectors, ids)?;
        self.persist(tenant_id, &index)?;

        tracing::debug!(
            "Added {} vectors to index for tenant '{}' (total: {})",
            vectors.len(),
            tenant_id,
            index.len()
        );

        Ok(())
    }

    /// Search the tenant's index. `None` when there is nothing to search.
    pub fn search(&self, tenant_id: &str, query: &[f32], k: usize) -> AppResult<Option<SearchHits>> {
        match self.load(tenant_id)? {
            Some(index) => index.search(query, k).map(Some),
            None => Ok(None),
        }
    }

    fn persist(&self, tenant_id: &str, index: &FlatIndex) -> AppResult<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.index_path(tenant_id);
        let tmp = path.with_extension("index.tmp");
        index.write_to(&tmp)?;
        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_missing_tenant_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());

        assert_eq!(store.current_size("acme").unwrap(), 0);
        assert!(store.load("acme").unwrap().is_none());
        assert!(store.search("acme", &[1.0, 0.0], 3).unwrap().is_none());
        assert!(!store.exists("acme"));
    }

    #[test]
    fn test_add_persists_and_reloads() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path().join("indexes"));

        store
            .add("acme", &[unit(4, 0), unit(4, 1)], &[0, 1])
            .unwrap();
        store.add("acme", &[unit(4, 2)], &[2]).unwrap();

        assert!(temp.path().join("indexes/acme.index").is_file());
        assert_eq!(store.current_size("acme").unwrap(), 3);

        let index = store.load("acme").unwrap().unwrap();
        assert_eq!(index.dim(), 4);
        assert_eq!(index.ids(), &[0, 1, 2]);
    }

    #[test]
    fn test_search_orders_and_pads() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());

        let a = vec![0.6, 0.8];
        let b = vec![1.0, 0.0];
        store.add("acme", &[a, b], &[10, 11]).unwrap();

        let hits = store.search("acme", &[1.0, 0.0], 3).unwrap().unwrap();

        assert_eq!(hits.ids, vec![11, 10, NO_MATCH]);
        assert!((hits.scores[0] - 1.0).abs() < 1e-6);
        assert!((hits.scores[1] - 0.6).abs() < 1e-6);
        assert_eq!(hits.matches().count(), 2);
        assert_eq!(hits.top_score(), Some(hits.scores[0]));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());
        store.add("acme", &[unit(4, 0)], &[0]).unwrap();

        let err = store.add("acme", &[unit(3, 0)], &[1]).unwrap_err();
        assert!(matches!(err, AppError::Index(_)));

        let err = store.search("acme", &unit(3, 0), 1).unwrap_err();
        assert!(matches!(err, AppError::Index(_)));
    }

    #[test]
    fn test_reused_id_rejected() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());
        store.add("acme", &[unit(2, 0)], &[0]).unwrap();

        assert!(store.add("acme", &[unit(2, 1)], &[0]).is_err());
        assert_eq!(store.current_size("acme").unwrap(), 1);
    }

    #[test]
    fn test_tenants_use_separate_files() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());

        store.add("acme corp", &[unit(2, 0)], &[0]).unwrap();
        store.add("globex", &[unit(2, 1)], &[0]).unwrap();

        assert!(temp.path().join("acme_corp.index").is_file());
        let hits = store.search("globex", &unit(2, 0), 1).unwrap().unwrap();
        assert_eq!(hits.ids, vec![0]);
        assert!(hits.scores[0].abs() < 1e-6);
    }

    #[test]
    fn test_corrupt_file_is_index_error() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());
        fs::write(store.index_path("acme"), b"garbage").unwrap();

        assert!(matches!(store.current_size("acme"), Err(AppError::Index(_))));
    }

    fn header(dim: u32, count: u64) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&dim.to_le_bytes());
        bytes.push(METRIC_INNER_PRODUCT);
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes
    }

    #[test]
    fn test_oversized_count_is_index_error() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());
        fs::write(store.index_path("acme"), header(4, u64::MAX)).unwrap();

        let query = [1.0, 0.0, 0.0, 0.0];
        assert!(matches!(store.search("acme", &query, 3), Err(AppError::Index(_))));
        assert!(matches!(store.current_size("acme"), Err(AppError::Index(_))));
    }

    #[test]
    fn test_truncated_records_are_index_error() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());
        store.add("acme", &[unit(4, 0), unit(4, 1)], &[0, 1]).unwrap();

        let path = store.index_path("acme");
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        assert!(matches!(store.load("acme"), Err(AppError::Index(_))));
        assert!(matches!(store.current_size("acme"), Err(AppError::Index(_))));
    }

    #[test]
    fn test_empty_add_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());

        store.add("acme", &[], &[]).unwrap();
        assert!(!store.exists("acme"));
    }

    #[test]
    fn test_load_or_create_checks_dimension() {
        let temp = TempDir::new().unwrap();
        let store = VectorIndexStore::new(temp.path());

        assert!(store.load_or_create("acme", 8).unwrap().is_empty());
        store.add("acme", &[unit(4, 0)], &[0]).unwrap();
        assert!(store.load_or_create("acme", 8).is_err());
    }
}
