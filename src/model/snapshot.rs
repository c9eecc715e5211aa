use super::lstm::LstmParams;
use super::optim::Adam;
use super::TrainingSample;
use crate::constants::SNAPSHOT_FORMAT_VERSION;
use crate::movement_policy::MovementTable;
use crate::{Error, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Upper bound on snapshot size accepted when decoding
const MAX_SNAPSHOT_BYTES: u64 = 512 * 1024 * 1024;

/// Everything needed to resume training or inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub format_version: u32,
    pub params: LstmParams,
    pub optimizer: Adam,
    pub sample_count: u64,
    pub training_log: Vec<TrainingSample>,
    pub movement_table: MovementTable,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_SNAPSHOT_BYTES)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl ModelSnapshot {
    /// Write to `path` via a sibling temp file and rename
    ///
    /// # Errors
    ///
    /// Returns I/O or encoding errors; a partially written temp file is removed
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(path);
        let written = File::create(&tmp).map_err(Error::from).and_then(|file| {
            let mut writer = BufWriter::new(file);
            codec().serialize_into(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        });

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read and version-check a snapshot
    ///
    /// # Errors
    ///
    /// Returns I/O or decoding errors, or `Error::Snapshot` for an unknown format version
    pub fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Self = codec().deserialize_from(reader)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(snapshot)
    }
}
