//! Composite model bundle persistence.
//!
//! A bundle is one addressable artifact per bundle id holding every named
//! piece of composite state: sub-model arrays and matrices, fusion weights,
//! the normalize flag. On disk a bundle is framed as magic, format version,
//! length-prefixed bincode payload, and a trailing CRC32 of the payload, so
//! truncated or corrupted files fail loudly instead of restoring garbage.
//!
//! Saving collects `export_state` from the model; loading hands the decoded
//! state map back to `import_state`, which performs the keyed dispatch
//! (unknown keys warn, shape mismatches fail). Save and load are
//! synchronous, blocking file operations; concurrent writers to the same
//! bundle id are not supported.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::info;

use crate::error::{MedleyError, Result};
use crate::recommender::Recommender;
use crate::recommender::state::StateMap;

/// Magic bytes at the start of every bundle file.
pub const BUNDLE_MAGIC: [u8; 4] = *b"MDLB";

/// Current bundle format version.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// File-backed store for composite model bundles.
#[derive(Debug, Clone)]
pub struct BundleStore {
    dir: PathBuf,
}

impl BundleStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(BundleStore { dir })
    }

    /// The file path a bundle id maps to.
    pub fn path_for(&self, bundle_id: &str) -> PathBuf {
        self.dir.join(format!("{bundle_id}.bundle"))
    }

    /// Whether a bundle with this id exists.
    pub fn exists(&self, bundle_id: &str) -> bool {
        self.path_for(bundle_id).exists()
    }

    /// Serialize a model's complete state into one bundle file.
    ///
    /// Returns the path of the persisted artifact. An existing bundle with
    /// the same id is overwritten.
    pub fn save(&self, bundle_id: &str, model: &dyn Recommender) -> Result<PathBuf> {
        let state = model.export_state()?;
        let path = self.path_for(bundle_id);
        write_bundle(&path, &state)?;
        info!(
            bundle_id,
            model = model.name(),
            keys = state.len(),
            path = %path.display(),
            "saved bundle"
        );
        Ok(path)
    }

    /// Restore a model's state from a bundle file.
    ///
    /// Key routing is the model's `import_state` dispatch; loading twice is
    /// idempotent. Numeric state round-trips bit-identically, so scores
    /// computed after a load equal scores computed before the save.
    pub fn load(&self, bundle_id: &str, model: &mut dyn Recommender) -> Result<()> {
        let path = self.path_for(bundle_id);
        let state = read_bundle(&path)?;
        info!(
            bundle_id,
            model = model.name(),
            keys = state.len(),
            "loading bundle"
        );
        model.import_state(state)
    }

    /// Delete a bundle. Missing bundles are not an error.
    pub fn delete(&self, bundle_id: &str) -> Result<()> {
        let path = self.path_for(bundle_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn write_bundle(path: &Path, state: &StateMap) -> Result<PathBuf> {
    let payload = bincode::serialize(state)
        .map_err(|source| MedleyError::serialization(source.to_string()))?;
    let checksum = crc32fast::hash(&payload);

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&BUNDLE_MAGIC)?;
    writer.write_u32::<LittleEndian>(BUNDLE_FORMAT_VERSION)?;
    writer.write_u64::<LittleEndian>(payload.len() as u64)?;
    writer.write_all(&payload)?;
    writer.write_u32::<LittleEndian>(checksum)?;
    writer.flush()?;
    writer.into_inner().map_err(|source| source.into_error())?.sync_all()?;
    Ok(path.to_path_buf())
}

fn read_bundle(path: &Path) -> Result<StateMap> {
    let file = File::open(path).map_err(|source| {
        MedleyError::bundle_load(format!("cannot open '{}': {}", path.display(), source))
    })?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != BUNDLE_MAGIC {
        return Err(MedleyError::bundle_load(format!(
            "'{}' is not a bundle file",
            path.display()
        )));
    }

    let version = reader.read_u32::<LittleEndian>()?;
    if version != BUNDLE_FORMAT_VERSION {
        return Err(MedleyError::bundle_load(format!(
            "unsupported bundle format version {version}"
        )));
    }

    let payload_len = reader.read_u64::<LittleEndian>()? as usize;
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    let stored_checksum = reader.read_u32::<LittleEndian>()?;
    let checksum = crc32fast::hash(&payload);
    if checksum != stored_checksum {
        return Err(MedleyError::bundle_load(format!(
            "checksum mismatch in '{}' (stored {stored_checksum:#010x}, computed {checksum:#010x})",
            path.display()
        )));
    }

    bincode::deserialize(&payload)
        .map_err(|source| MedleyError::bundle_load(source.to_string()))
}
