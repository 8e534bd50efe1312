//! `metadata.json` sidecar: game-keyed image entries, merged across runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Filename of the sidecar at the output root.
pub const SIDECAR_FILE: &str = "metadata.json";

/// One optimized image as recorded in the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub width: u32,
    pub height: u32,
    pub game: String,
    /// Public URL path of the output file
    pub path: String,
}

/// Game label to its entries, in insertion order within each game.
pub type GameMetadata = BTreeMap<String, Vec<MetadataEntry>>;

pub fn sidecar_path(output_dir: &Path) -> PathBuf {
    output_dir.join(SIDECAR_FILE)
}

/// Read the sidecar; a missing file is an empty map.
pub fn load(path: &Path) -> PipelineResult<GameMetadata> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GameMetadata::new()),
        Err(source) => {
            return Err(PipelineError::SidecarRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content).map_err(|source| PipelineError::SidecarParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the sidecar as pretty-printed JSON, replacing any previous file.
pub fn save(path: &Path, metadata: &GameMetadata) -> PipelineResult<()> {
    let write_err = |source| PipelineError::SidecarWrite {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| write_err(std::io::Error::other(e)))?;

    let mut temp = path.as_os_str().to_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    std::fs::write(&temp, json).map_err(write_err)?;
    std::fs::rename(&temp, path).map_err(write_err)
}

/// Merge `update` into `existing`.
///
/// Per game: prior entries keep their order, an entry whose `path` matches a
/// new one is replaced in place, and new paths are appended. Games absent
/// from `update` are untouched. Exactly one entry per (game, path) remains
/// for every path the update touched.
pub fn merge(mut existing: GameMetadata, update: GameMetadata) -> GameMetadata {
    for (game, entries) in update {
        let bucket = existing.entry(game).or_default();
        let mut index: HashMap<String, usize> = bucket
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.path.clone(), i))
            .collect();

        for entry in entries {
            match index.get(&entry.path) {
                Some(&i) => bucket[i] = entry,
                None => {
                    index.insert(entry.path.clone(), bucket.len());
                    bucket.push(entry);
                }
            }
        }
    }
    existing
}

/// Load, merge and write back the sidecar under `output_dir`.
pub fn update(output_dir: &Path, new_entries: GameMetadata) -> PipelineResult<GameMetadata> {
    let path = sidecar_path(output_dir);
    let merged = merge(load(&path)?, new_entries);
    save(&path, &merged)?;
    tracing::debug!("Wrote {} game(s) to {:?}", merged.len(), path);
    Ok(merged)
}
