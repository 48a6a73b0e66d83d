//! JSON encoding of replay input, archive dumps and output

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use crate::archive::InMemoryArchive;
use crate::error::{ReplayError, SerializationError};
use crate::types::{ReplayInput, ReplayOutput};

/// JSON serialization backend
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Create a new JSON serializer with pretty printing
    pub fn new_pretty() -> Self {
        Self { pretty: true }
    }

    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        let result = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };

        result.map_err(|e| SerializationError::SerializationFailed {
            reason: format!("JSON serialization failed: {}", e),
        })
    }

    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializationError> {
        serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("JSON deserialization failed: {}", e),
        })
    }

    pub fn read_file<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ReplayError> {
        let bytes = fs::read(path)?;
        Ok(self.deserialize(&bytes)?)
    }

    /// Write `value` to `path` through a sibling temp file and a rename.
    ///
    /// Readers of `path` see either the old contents or the complete new
    /// contents, never a partial write.
    pub fn write_file_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), ReplayError> {
        let bytes = self.serialize(value)?;
        let temp_path = temp_path_for(path);

        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&temp_path, path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn read_input(path: &Path) -> Result<ReplayInput, ReplayError> {
    JsonSerializer::new().read_file(path)
}

pub fn read_archive(path: &Path) -> Result<InMemoryArchive, ReplayError> {
    JsonSerializer::new().read_file(path)
}

/// Write the output record, pretty-printed
pub fn write_output(path: &Path, output: &ReplayOutput) -> Result<(), ReplayError> {
    JsonSerializer::new_pretty().write_file_atomic(path, output)
}
