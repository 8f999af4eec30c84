// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistent passage store
//!
//! Pairs a vector index with a parallel list of passage texts: the passage at
//! position `i` owns the vector with label `i`. Both live behind one
//! readers-writer lock, and every `add` persists both files before releasing
//! the write lock.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::errors::RagError;
use super::retrieval::MAX_TOP_K;
use crate::vector::{FlatL2Index, Neighbor, VectorIndex};

pub const INDEX_FILE_NAME: &str = "vector_index.bin";
pub const TEXTS_FILE_NAME: &str = "texts.json";

/// Locations of the two persisted files
#[derive(Debug, Clone, PartialEq)]
pub struct StorePaths {
    pub index_path: PathBuf,
    pub texts_path: PathBuf,
}

impl StorePaths {
    /// Standard file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            index_path: dir.join(INDEX_FILE_NAME),
            texts_path: dir.join(TEXTS_FILE_NAME),
        }
    }
}

struct StoreState<I> {
    index: I,
    texts: Vec<String>,
}

impl<I: VectorIndex> StoreState<I> {
    fn empty(dimension: usize) -> Result<Self, RagError> {
        Ok(Self {
            index: I::with_dimension(dimension)?,
            texts: Vec::new(),
        })
    }
}

/// Vector index plus parallel passage list, persisted to two files
pub struct VectorStore<I: VectorIndex = FlatL2Index> {
    state: RwLock<StoreState<I>>,
    paths: StorePaths,
    dimension: usize,
}

/// `<file name>.tmp` next to `path`
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Creates `path` (and its parent directory), writes `bytes`, then fsyncs
async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Could not remove temp file {}: {}", path.display(), e);
        }
    }
}

/// `k` must lie in `1..=MAX_TOP_K`
pub(crate) fn check_top_k(k: usize) -> Result<(), RagError> {
    if k == 0 || k > MAX_TOP_K {
        return Err(RagError::InvalidTopK {
            top_k: k,
            max: MAX_TOP_K,
        });
    }
    Ok(())
}

/// Maps neighbors to passage texts, preserving order
///
/// Sentinel entries (store smaller than `k`) are dropped. Any other label
/// outside the passage list violates the store invariant.
fn resolve_labels(texts: &[String], neighbors: &[Neighbor]) -> Result<Vec<String>, RagError> {
    neighbors
        .iter()
        .filter(|n| !n.is_sentinel())
        .map(|n| {
            usize::try_from(n.label)
                .ok()
                .and_then(|i| texts.get(i))
                .cloned()
                .ok_or(RagError::InvalidLabel {
                    label: n.label,
                    len: texts.len(),
                })
        })
        .collect()
}

impl<I: VectorIndex> VectorStore<I> {
    /// Creates an empty, not yet persisted store
    pub fn new(paths: StorePaths, dimension: usize) -> Result<Self, RagError> {
        Ok(Self {
            state: RwLock::new(StoreState::empty(dimension)?),
            paths,
            dimension,
        })
    }

    /// Creates a store and loads any previously persisted contents
    pub async fn open(paths: StorePaths, dimension: usize) -> Result<Self, RagError> {
        let store = Self::new(paths, dimension)?;
        store.restore().await?;
        Ok(store)
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored passages
    pub async fn len(&self) -> usize {
        self.state.read().await.texts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Appends vectors and their texts in matching order, then persists
    ///
    /// Inputs are validated before anything is mutated. If persisting fails
    /// the in-memory store is rolled back so memory and disk stay aligned.
    ///
    /// # Returns
    /// Number of passages in the store after the add
    pub async fn add(&self, vectors: Vec<Vec<f32>>, texts: Vec<String>) -> Result<usize, RagError> {
        if vectors.len() != texts.len() {
            return Err(RagError::LengthMismatch {
                vectors: vectors.len(),
                texts: texts.len(),
            });
        }

        let mut state = self.state.write().await;
        if vectors.is_empty() {
            return Ok(state.texts.len());
        }

        let previous_len = state.texts.len();
        state.index.add(&vectors)?;
        state.texts.extend(texts);

        if let Err(e) = self.persist_state(&state).await {
            warn!(
                "Persisting store failed ({}), rolling back {} passages",
                e,
                state.texts.len() - previous_len
            );
            state.index.truncate(previous_len);
            state.texts.truncate(previous_len);
            return Err(e);
        }

        debug!(
            "Added {} passages (total {})",
            state.texts.len() - previous_len,
            state.texts.len()
        );
        Ok(state.texts.len())
    }

    /// Returns exactly `k` neighbors of `query`, sentinel-padded
    ///
    /// `k` must be between 1 and [`MAX_TOP_K`].
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, RagError> {
        check_top_k(k)?;
        let state = self.state.read().await;
        Ok(state.index.search(query, k)?)
    }

    /// Texts of the up to `k` passages nearest to `query`, closest first
    ///
    /// Search and label lookup run under one read guard, so a concurrent
    /// `restore` cannot swap the passage list in between.
    pub async fn search_texts(&self, query: &[f32], k: usize) -> Result<Vec<String>, RagError> {
        check_top_k(k)?;
        let state = self.state.read().await;
        let neighbors = state.index.search(query, k)?;
        resolve_labels(&state.texts, &neighbors)
    }

    /// Writes the full index and full text list to disk
    ///
    /// Holds the write lock so it never overlaps an `add` or another persist
    /// writing the same temp files.
    pub async fn persist(&self) -> Result<(), RagError> {
        let state = self.state.write().await;
        self.persist_state(&state).await
    }

    /// Both temp files are written and synced before either is renamed into
    /// place. The index is renamed first, so an interrupted persist can only
    /// leave an index that is longer than the text list, which `restore`
    /// trims back.
    async fn persist_state(&self, state: &StoreState<I>) -> Result<(), RagError> {
        let index_bytes = state.index.to_bytes()?;
        let texts_bytes = serde_json::to_vec(&state.texts)?;

        let index_temp = temp_sibling(&self.paths.index_path);
        let texts_temp = temp_sibling(&self.paths.texts_path);

        let staged = match write_synced(&index_temp, &index_bytes).await {
            Ok(()) => write_synced(&texts_temp, &texts_bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            remove_temp(&index_temp).await;
            remove_temp(&texts_temp).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&index_temp, &self.paths.index_path).await {
            remove_temp(&index_temp).await;
            remove_temp(&texts_temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&texts_temp, &self.paths.texts_path).await {
            remove_temp(&texts_temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Replaces the in-memory store with the persisted one
    ///
    /// If either file is missing the store becomes empty. An index holding
    /// more vectors than there are texts (a persist interrupted between its
    /// two renames) is trimmed to the text list. Files that cannot be
    /// decoded, a text list longer than the index, or vectors of another
    /// dimension are reported as [`RagError::Corrupt`].
    ///
    /// # Returns
    /// Number of passages loaded
    pub async fn restore(&self) -> Result<usize, RagError> {
        let index_exists = fs::try_exists(&self.paths.index_path).await?;
        let texts_exists = fs::try_exists(&self.paths.texts_path).await?;

        let loaded = if index_exists && texts_exists {
            self.load_files().await?
        } else {
            if index_exists || texts_exists {
                warn!(
                    "Only one of {} / {} exists, starting with an empty store",
                    self.paths.index_path.display(),
                    self.paths.texts_path.display()
                );
            }
            StoreState::empty(self.dimension)?
        };

        let count = loaded.texts.len();
        *self.state.write().await = loaded;

        info!(
            "Restored {} passages from {}",
            count,
            self.paths.index_path.display()
        );
        Ok(count)
    }

    async fn load_files(&self) -> Result<StoreState<I>, RagError> {
        let index_bytes = fs::read(&self.paths.index_path).await?;
        let texts_bytes = fs::read(&self.paths.texts_path).await?;

        let mut index = I::from_bytes(&index_bytes).map_err(|e| {
            RagError::Corrupt(format!("{}: {}", self.paths.index_path.display(), e))
        })?;
        let texts: Vec<String> = serde_json::from_slice(&texts_bytes).map_err(|e| {
            RagError::Corrupt(format!("{}: {}", self.paths.texts_path.display(), e))
        })?;

        if index.dimension() != self.dimension {
            return Err(RagError::Corrupt(format!(
                "index holds {}D vectors, embedding model produces {}D",
                index.dimension(),
                self.dimension
            )));
        }
        if index.len() > texts.len() {
            warn!(
                "Index holds {} vectors but only {} passages were persisted, dropping the extra vectors",
                index.len(),
                texts.len()
            );
            index.truncate(texts.len());
        }
        if index.len() != texts.len() {
            return Err(RagError::Corrupt(format!(
                "index holds {} vectors but text list holds {} passages",
                index.len(),
                texts.len()
            )));
        }

        Ok(StoreState { index, texts })
    }
}
