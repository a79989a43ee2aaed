//! Reverse index for folded key components.
//!
//! A component or tail of a storage key that is over the store limits is
//! replaced by a short token. The index remembers which original text each
//! token stands for so keys can be decoded again; the store persists it
//! next to the entries.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{AppError, Result};

/// One token and the original key text it replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub token: String,
    pub original: String,
}

/// Thread-safe token to original map.
#[derive(Debug, Default)]
pub struct FoldIndex {
    entries: RwLock<BTreeMap<String, String>>,
}

impl FoldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from persisted entries.
    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Original text for a token.
    pub fn resolve(&self, token: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    /// Fail when the token is already bound to different text.
    pub fn check(&self, fold: &Fold) -> Result<()> {
        match self.resolve(&fold.token) {
            Some(existing) if existing != fold.original => Err(collision(fold, &existing)),
            _ => Ok(()),
        }
    }

    /// Record a fold. Returns `true` when the index grew.
    pub fn insert(&self, fold: &Fold) -> Result<bool> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&fold.token) {
            Some(existing) if *existing == fold.original => Ok(false),
            Some(existing) => Err(collision(fold, existing)),
            None => {
                entries.insert(fold.token.clone(), fold.original.clone());
                Ok(true)
            }
        }
    }

    /// Copy of all entries, for persisting.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn collision(fold: &Fold, existing: &str) -> AppError {
    AppError::collision(
        &fold.token,
        format!(
            "token already folds '{}', refusing '{}'",
            existing, fold.original
        ),
    )
}
