//! Error catalog backed by a JSON file.
//!
//! The file lists every injectable error once:
//!
//! ```json
//! {
//!   "errors": [
//!     {
//!       "category": "Logical",
//!       "name": "Off-by-one",
//!       "description": "Loop bound is one too high",
//!       "difficulty": "easy",
//!       "implementationGuide": "Use <= instead of < in a loop over an array"
//!     }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use drill_engine::{Difficulty, ErrorCatalog, ErrorSpec, ServiceResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};

/// Maximum allowed catalog file size in bytes (1 MiB).
pub const MAX_CATALOG_SIZE: u64 = 1024 * 1024;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Category, e.g. "Logical".
    pub category: String,
    /// Short name.
    pub name: String,
    /// What the defect looks like.
    pub description: String,
    /// How subtle the defect is.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Hint for the code generator.
    #[serde(default)]
    pub implementation_guide: Option<String>,
}

impl From<&CatalogEntry> for ErrorSpec {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            category: entry.category.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            implementation_guide: entry.implementation_guide.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    errors: Vec<CatalogEntry>,
}

/// In-memory error catalog.
pub struct FileCatalog {
    entries: Vec<CatalogEntry>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for FileCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCatalog")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl FileCatalog {
    /// Loads a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::CatalogNotFound` if the file doesn't exist,
    /// `ProviderError::CatalogTooLarge` above [`MAX_CATALOG_SIZE`], and
    /// `ProviderError::CatalogParse` for malformed JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::CatalogNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ProviderError::Io(e)
            }
        })?;

        if metadata.len() > MAX_CATALOG_SIZE {
            return Err(ProviderError::CatalogTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                max: MAX_CATALOG_SIZE,
            });
        }

        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile =
            serde_json::from_str(&content).map_err(|e| ProviderError::CatalogParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        info!(path = %path.display(), errors = file.errors.len(), "Loaded error catalog");
        Ok(Self::from_entries(file.errors))
    }

    /// Creates a catalog from entries.
    #[must_use]
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Makes sampling reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Distinct categories, in first-seen order.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !seen.iter().any(|c| c.eq_ignore_ascii_case(&entry.category)) {
                seen.push(entry.category.clone());
            }
        }
        seen
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Picks up to `count` entries from `categories`, preferring `difficulty`.
    ///
    /// Entries of other difficulties top up the selection when too few match.
    #[must_use]
    pub fn pick(&self, categories: &[String], difficulty: Difficulty, count: usize) -> Vec<ErrorSpec> {
        let (mut preferred, mut others): (Vec<&CatalogEntry>, Vec<&CatalogEntry>) = self
            .entries
            .iter()
            .filter(|e| categories.iter().any(|c| c.eq_ignore_ascii_case(&e.category)))
            .partition(|e| e.difficulty == difficulty);

        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            preferred.shuffle(&mut *rng);
            others.shuffle(&mut *rng);
        }

        let matched = preferred.len();
        let picked: Vec<ErrorSpec> = preferred
            .into_iter()
            .chain(others)
            .take(count)
            .map(ErrorSpec::from)
            .collect();

        if matched < picked.len() {
            debug!(
                difficulty = %difficulty,
                matched,
                topped_up = picked.len() - matched,
                "Topped up selection from other difficulties"
            );
        }
        picked
    }
}

#[async_trait]
impl ErrorCatalog for FileCatalog {
    async fn sample(
        &self,
        categories: &[String],
        difficulty: Difficulty,
        count: u32,
    ) -> ServiceResult<Vec<ErrorSpec>> {
        let picked = self.pick(categories, difficulty, count as usize);
        if picked.len() < count as usize {
            warn!(
                requested = count,
                available = picked.len(),
                "Catalog has fewer matching errors than requested"
            );
        }
        Ok(picked)
    }
}
