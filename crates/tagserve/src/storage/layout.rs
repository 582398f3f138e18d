//! On-disk layout of the data directory.
//!
//! Each tagger lives in its own sub-directory whose name is the tagger id,
//! percent-encoded so that any id yields a safe file name:
//!
//! ```text
//! <data_dir>/<encoded id>/config.json
//!                         vocabulary.ttl
//!                         model.bin
//!                         trainer-report.json
//!                         xvalidator-report.json
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{ConfigurationCodec, TaggerConfiguration};
use crate::engine::{ModelCodec, TaggingEngine, TopicModel, Vocabulary};
use crate::error::{StorageError, TaggerError};
use crate::jobs::JobReport;
use crate::storage::{FileStore, JsonCodec, ObjectStore, TextCodec};
use crate::tagger::{JobKind, TaggerStores};

pub const CONFIG_FILE: &str = "config.json";
pub const VOCABULARY_FILE: &str = "vocabulary.ttl";
pub const MODEL_FILE: &str = "model.bin";

pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    /// Opens an existing, writable data directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let root = path.as_ref().to_path_buf();
        info!("Data directory: {}", root.display());

        let invalid = |reason: &str| StorageError::DataDirectory {
            path: root.clone(),
            reason: reason.to_string(),
        };
        let metadata = fs::metadata(&root).map_err(|_| invalid("does not exist"))?;
        if !metadata.is_dir() {
            return Err(invalid("not a directory"));
        }
        if metadata.permissions().readonly() {
            return Err(invalid("not writeable"));
        }

        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Lists the ids of all tagger directories, sorted. Directories whose
    /// names are not a canonical encoding of an id are skipped.
    pub fn list_taggers(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StorageError::ListDirectory {
            path: self.root.clone(),
            source: e,
        })?;

        let mut ids = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match decode_tagger_id(&name) {
                Some(id) if encode_tagger_id(&id) == name => ids.push(id),
                _ => warn!("Skipping malformed tagger directory {}", name),
            }
        }
        ids.sort();
        debug!("Listed {} taggers", ids.len());
        Ok(ids)
    }

    pub fn tagger_exists(&self, id: &str) -> bool {
        self.tagger_directory(id).is_dir()
    }

    /// Creates the directory for a new tagger and writes its default
    /// configuration.
    pub fn create_tagger(&self, id: &str) -> Result<(), TaggerError> {
        info!("Creating tagger: {}", id);
        if self.tagger_exists(id) {
            return Err(TaggerError::TaggerExists(id.to_string()));
        }
        let dir = self.tagger_directory(id);
        fs::create_dir(&dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;
        self.configuration_store(id)
            .put(Some(&TaggerConfiguration::with_defaults(id)))?;
        Ok(())
    }

    /// Removes a tagger directory and everything in it. Missing taggers are
    /// ignored.
    pub fn delete_tagger(&self, id: &str) -> Result<(), StorageError> {
        if !self.tagger_exists(id) {
            return Ok(());
        }
        let dir = self.tagger_directory(id);
        info!("Deleting tagger directory {}", dir.display());
        fs::remove_dir_all(&dir).map_err(|e| StorageError::RemoveDirectory {
            path: dir,
            source: e,
        })
    }

    pub fn tagger_directory(&self, id: &str) -> PathBuf {
        self.root.join(encode_tagger_id(id))
    }

    fn tagger_file(&self, id: &str, file_name: &str) -> PathBuf {
        self.tagger_directory(id).join(file_name)
    }

    pub fn configuration_store(
        &self,
        id: &str,
    ) -> FileStore<TaggerConfiguration, ConfigurationCodec> {
        FileStore::new(
            id,
            self.tagger_file(id, CONFIG_FILE),
            ConfigurationCodec::new(id),
        )
    }

    pub fn vocabulary_store(&self, id: &str) -> FileStore<Vocabulary, TextCodec> {
        FileStore::new(id, self.tagger_file(id, VOCABULARY_FILE), TextCodec)
    }

    pub fn model_store(
        &self,
        id: &str,
        engine: Arc<dyn TaggingEngine>,
    ) -> FileStore<Arc<dyn TopicModel>, ModelCodec> {
        FileStore::new(id, self.tagger_file(id, MODEL_FILE), ModelCodec::new(engine))
    }

    pub fn report_store(&self, id: &str, kind: JobKind) -> FileStore<JobReport, JsonCodec<JobReport>> {
        FileStore::new(id, self.tagger_file(id, kind.report_file_name()), JsonCodec::new())
    }

    /// All stores backing one tagger.
    pub fn stores(&self, id: &str, engine: Arc<dyn TaggingEngine>) -> TaggerStores {
        TaggerStores {
            configuration: Arc::new(self.configuration_store(id)),
            vocabulary: Arc::new(self.vocabulary_store(id)),
            model: Arc::new(self.model_store(id, engine)),
            training_report: Arc::new(self.report_store(id, JobKind::Training)),
            cross_validation_report: Arc::new(self.report_store(id, JobKind::CrossValidation)),
        }
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.')
}

/// Percent-encodes a tagger id for use as a directory name. A leading `.`
/// is escaped too, so `.` and `..` cannot name the parent directories.
pub fn encode_tagger_id(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for (i, b) in id.bytes().enumerate() {
        if is_unreserved(b) && !(i == 0 && b == b'.') {
            encoded.push(b as char);
        } else {
            // Writing to a String cannot fail
            let _ = write!(encoded, "%{:02X}", b);
        }
    }
    encoded
}

/// Reverses [`encode_tagger_id`]. Returns `None` for malformed escapes or
/// non-UTF-8 results.
pub fn decode_tagger_id(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
