use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::debug;

use crate::domain::{CacheKey, StationId};
use crate::error::WetterfeeError;

#[derive(Debug, Clone)]
pub struct LocalCache {
    root: Utf8PathBuf,
    marker: String,
}

impl LocalCache {
    pub fn new(root: impl Into<Utf8PathBuf>, marker: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            marker: marker.into(),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn path_for(&self, file_name: &str) -> Utf8PathBuf {
        self.root.join(file_name)
    }

    pub fn ensure_root(&self) -> Result<(), WetterfeeError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| WetterfeeError::Filesystem(err.to_string()))
    }

    pub fn find_cached(&self, id: &StationId) -> Result<Option<Utf8PathBuf>, WetterfeeError> {
        let entries = match fs::read_dir(self.root.as_std_path()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(WetterfeeError::Filesystem(err.to_string())),
        };

        let mut hits = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| WetterfeeError::Filesystem(err.to_string()))?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if CacheKey::parse(&name).is_some_and(|key| key.matches(&self.marker, id)) {
                hits.push(name);
            }
        }
        hits.sort();

        let found = hits.into_iter().next().map(|name| self.root.join(name));
        debug!(station = %id, found = ?found, "cache lookup");
        Ok(found)
    }
}

pub fn write_file_atomic(dest: &Utf8Path, content: &[u8]) -> Result<(), WetterfeeError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| WetterfeeError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".wetterfee-download")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| WetterfeeError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| WetterfeeError::Filesystem(err.to_string()))?;
    temp.flush()
        .map_err(|err| WetterfeeError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| WetterfeeError::Filesystem(err.to_string()))?;
    Ok(())
}
