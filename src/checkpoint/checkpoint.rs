//! Model checkpoints.
//!
//! A checkpoint captures the whole model recursively: configuration, frame
//! counter, and for every tree its clock, alphabet, prior and node structure
//! (switching weights, estimator counts, children). Restoring it and resuming
//! reproduces the outputs of an uninterrupted run.
//!
//! Saving borrows the model immutably, so a checkpoint can never observe a
//! tree halfway through an update.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::density::DensityModel;
use crate::error::{Error, Result};

const CHECKPOINT_VERSION: u32 = 1;

/// On-disk encoding of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckpointFormat {
    /// Human-readable JSON. Floats round-trip exactly.
    Json,
    /// Compact bincode.
    #[default]
    Binary,
}

impl CheckpointFormat {
    /// `.json` files are JSON, anything else binary.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => CheckpointFormat::Json,
            _ => CheckpointFormat::Binary,
        }
    }
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    version: u32,
    model: &'a DensityModel,
}

#[derive(Deserialize)]
struct Checkpoint {
    version: u32,
    model: DensityModel,
}

impl DensityModel {
    pub fn to_bytes(&self, format: CheckpointFormat) -> Result<Vec<u8>> {
        let checkpoint = CheckpointRef {
            version: CHECKPOINT_VERSION,
            model: self,
        };
        let bytes = match format {
            CheckpointFormat::Json => serde_json::to_vec(&checkpoint)
                .map_err(|e| Error::Serialization(e.to_string()))?,
            CheckpointFormat::Binary => {
                bincode::serde::encode_to_vec(&checkpoint, bincode::config::standard())?
            }
        };
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8], format: CheckpointFormat) -> Result<Self> {
        let checkpoint: Checkpoint = match format {
            CheckpointFormat::Json => serde_json::from_slice(bytes)?,
            CheckpointFormat::Binary => {
                let (checkpoint, read) =
                    bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
                if read != bytes.len() {
                    return Err(Error::Deserialization(format!(
                        "{} trailing bytes after checkpoint",
                        bytes.len() - read
                    )));
                }
                checkpoint
            }
        };
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(Error::IncompatibleCheckpoint(format!(
                "version {} is not supported, expected {CHECKPOINT_VERSION}",
                checkpoint.version
            )));
        }
        checkpoint.model.validate_restored()?;
        Ok(checkpoint.model)
    }

    pub fn save_to_file(&self, path: &Path, format: CheckpointFormat) -> Result<()> {
        let bytes = self.to_bytes(format)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!(
            path = %path.display(),
            bytes = bytes.len(),
            frames = self.frames_seen(),
            "checkpoint saved"
        );
        Ok(())
    }

    pub fn load_from_file(path: &Path, format: CheckpointFormat) -> Result<Self> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        let model = DensityModel::from_bytes(&bytes, format)?;
        debug!(
            path = %path.display(),
            frames = model.frames_seen(),
            nodes = model.node_count(),
            "checkpoint loaded"
        );
        Ok(model)
    }
}
