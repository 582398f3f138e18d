use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::storage::ObjectStore;

/// Converts a stored value to and from the bytes of its file.
pub trait Codec<T>: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<T, String>;
    fn encode(&self, value: &T) -> Result<Vec<u8>, String>;
}

/// Stores a serde value as a pretty-printed JSON object.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec<T> {
    fn decode(&self, bytes: &[u8]) -> Result<T, String> {
        let json: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| format!("JSON parsing error: {}", e))?;
        if !json.is_object() {
            return Err("Expected JSON object".to_string());
        }
        serde_json::from_value(json).map_err(|e| e.to_string())
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>, String> {
        serde_json::to_vec_pretty(value).map_err(|e| e.to_string())
    }
}

/// Stores UTF-8 text verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl<T> Codec<T> for TextCodec
where
    T: From<String> + AsRef<str>,
{
    fn decode(&self, bytes: &[u8]) -> Result<T, String> {
        String::from_utf8(bytes.to_vec())
            .map(T::from)
            .map_err(|e| format!("File is not valid UTF-8: {}", e))
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>, String> {
        Ok(value.as_ref().as_bytes().to_vec())
    }
}

/// An [`ObjectStore`] bound to one file on disk.
///
/// Writes go to a temporary sibling file that is synced and then renamed over
/// the target, so a crash mid-write leaves the previous value intact.
pub struct FileStore<T, C> {
    owner: String,
    path: PathBuf,
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C: Codec<T>> FileStore<T, C> {
    pub fn new<P: AsRef<Path>>(owner: &str, path: P, codec: C) -> Self {
        Self {
            owner: owner.to_string(),
            path: path.as_ref().to_path_buf(),
            codec,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id of the tagger this file belongs to.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "store".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    fn write_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Write {
            file: self.path.clone(),
            owner: self.owner.clone(),
            source,
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let temp_path = self.temp_path();
        let result = File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp_path, &self.path));

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(
                        "Failed to remove temporary file {}: {}",
                        temp_path.display(),
                        cleanup
                    );
                }
            }
            return Err(self.write_error(e));
        }
        Ok(())
    }
}

impl<T, C: Codec<T>> ObjectStore<T> for FileStore<T, C> {
    fn contains(&self) -> bool {
        self.path.is_file()
    }

    fn get(&self) -> Result<Option<T>, StorageError> {
        if !self.contains() {
            return Ok(None);
        }
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            // Deleted between the existence check and the read
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Read {
                    file: self.path.clone(),
                    owner: self.owner.clone(),
                    source: e,
                })
            }
        };
        self.codec
            .decode(&bytes)
            .map(Some)
            .map_err(|reason| StorageError::Decode {
                file: self.path.clone(),
                owner: self.owner.clone(),
                reason,
            })
    }

    fn put(&self, value: Option<&T>) -> Result<(), StorageError> {
        let Some(value) = value else {
            return match fs::remove_file(&self.path) {
                Ok(()) => {
                    debug!("Deleted {} for tagger {}", self.path.display(), self.owner);
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::Delete {
                    file: self.path.clone(),
                    owner: self.owner.clone(),
                    source: e,
                }),
            };
        };

        let bytes = self
            .codec
            .encode(value)
            .map_err(|reason| StorageError::Encode {
                file: self.path.clone(),
                owner: self.owner.clone(),
                reason,
            })?;
        debug!(
            "Writing {} ({} bytes) for tagger {}",
            self.path.display(),
            bytes.len(),
            self.owner
        );
        self.write_atomic(&bytes)
    }
}
