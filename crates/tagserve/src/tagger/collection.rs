use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::config::ServerSettings;
use crate::engine::TaggingEngine;
use crate::error::TaggerError;
use crate::storage::DataDirectory;
use crate::tagger::Tagger;

/// Ids must be non-empty and free of path separators.
pub fn is_valid_tagger_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && !id.contains('\\')
}

/// The taggers of one data directory, opened on demand and cached.
pub struct TaggerCollection {
    data: DataDirectory,
    engine: Arc<dyn TaggingEngine>,
    default_lang: String,
    taggers: Mutex<HashMap<String, Arc<Tagger>>>,
}

impl TaggerCollection {
    pub fn new(data: DataDirectory, engine: Arc<dyn TaggingEngine>, default_lang: &str) -> Self {
        Self {
            data,
            engine,
            default_lang: default_lang.to_string(),
            taggers: Mutex::new(HashMap::new()),
        }
    }

    /// Opens the data directory named in `settings`.
    pub fn open(
        settings: &ServerSettings,
        engine: Arc<dyn TaggingEngine>,
    ) -> Result<Self, TaggerError> {
        let data = DataDirectory::open(&settings.data_dir)?;
        Ok(Self::new(data, engine, &settings.default_lang))
    }

    pub fn data_directory(&self) -> &DataDirectory {
        &self.data
    }

    fn lock_taggers(&self) -> MutexGuard<'_, HashMap<String, Arc<Tagger>>> {
        self.taggers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ids of all taggers, sorted.
    pub fn taggers(&self) -> Result<Vec<String>, TaggerError> {
        let ids = self.data.list_taggers()?;
        Ok(ids
            .into_iter()
            .filter(|id| {
                let valid = is_valid_tagger_id(id);
                if !valid {
                    warn!("Skipping invalid tagger ID listed in data directory: {}", id);
                }
                valid
            })
            .collect())
    }

    pub fn exists(&self, id: &str) -> bool {
        is_valid_tagger_id(id) && self.data.tagger_exists(id)
    }

    /// The tagger with this id, or `None` if there is no usable tagger.
    pub fn get(&self, id: &str) -> Result<Option<Arc<Tagger>>, TaggerError> {
        let mut taggers = self.lock_taggers();
        if !self.exists(id) {
            taggers.remove(id);
            return Ok(None);
        }
        if let Some(tagger) = taggers.get(id) {
            return Ok(Some(Arc::clone(tagger)));
        }

        let stores = self.data.stores(id, Arc::clone(&self.engine));
        match Tagger::open(id, stores, Arc::clone(&self.engine), &self.default_lang) {
            Ok(tagger) => {
                let tagger = Arc::new(tagger);
                taggers.insert(id.to_string(), Arc::clone(&tagger));
                Ok(Some(tagger))
            }
            Err(TaggerError::TaggerNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn create(&self, id: &str) -> Result<Arc<Tagger>, TaggerError> {
        if !is_valid_tagger_id(id) {
            return Err(TaggerError::InvalidTaggerId(id.to_string()));
        }
        if self.exists(id) {
            return Err(TaggerError::TaggerExists(id.to_string()));
        }
        self.data.create_tagger(id)?;
        self.get(id)?
            .ok_or_else(|| TaggerError::TaggerNotFound(id.to_string()))
    }

    /// Deletes a tagger and its files, cancelling its running jobs first.
    pub fn delete(&self, id: &str) -> Result<(), TaggerError> {
        if !self.data.tagger_exists(id) {
            return Err(TaggerError::TaggerNotFound(id.to_string()));
        }
        if let Some(tagger) = self.lock_taggers().remove(id) {
            tagger.cancel_jobs();
        }
        self.data.delete_tagger(id)?;
        info!("Deleted tagger {}", id);
        Ok(())
    }
}
