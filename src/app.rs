use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveBrowser, RemoteSession};
use crate::cache::LocalCache;
use crate::config::Settings;
use crate::domain::{CacheKey, DataSource, StationId, StationQuery, StationRecord};
use crate::error::WetterfeeError;
use crate::extract::{TabularDataset, extract};
use crate::stations::StationIndex;

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub query: String,
    pub stations: Vec<StationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub station_id: StationId,
    pub station_name: Option<String>,
    pub source: DataSource,
    pub path: Utf8PathBuf,
    pub dataset: TabularDataset,
}

pub struct DataManager<S: RemoteSession> {
    settings: Settings,
    browser: ArchiveBrowser<S>,
    cache: LocalCache,
    index: Option<StationIndex>,
}

impl<S: RemoteSession> DataManager<S> {
    pub fn new(settings: Settings, session: S) -> Self {
        let cache = LocalCache::new(settings.data_dir.clone(), settings.file_marker());
        Self {
            settings,
            browser: ArchiveBrowser::new(session),
            cache,
            index: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn browser(&self) -> &ArchiveBrowser<S> {
        &self.browser
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn station_numbers(&mut self, query: &str) -> Result<Vec<StationRecord>, WetterfeeError> {
        self.station_index()?.resolve(query)
    }

    pub fn resolve(&mut self, query: &str) -> Result<ResolveResult, WetterfeeError> {
        Ok(ResolveResult {
            query: query.to_string(),
            stations: self.station_numbers(query)?,
        })
    }

    pub fn resolve_station(&mut self, query: &str) -> Result<StationRecord, WetterfeeError> {
        let mut hits = self.station_numbers(query)?;
        match hits.len() {
            0 => Err(WetterfeeError::NoMatch(query.to_string())),
            1 => Ok(hits.remove(0)),
            _ => {
                for hit in &hits {
                    debug!(station = %hit.id, name = %hit.name, "candidate");
                }
                Err(WetterfeeError::AmbiguousMatch {
                    query: query.to_string(),
                    candidates: hits,
                })
            }
        }
    }

    pub fn get_weather_data(&mut self, query: &StationQuery) -> Result<FetchResult, WetterfeeError> {
        let (station_id, station_name) = match query {
            StationQuery::Id(id) => (id.clone(), None),
            StationQuery::Name(name) => {
                let record = self.resolve_station(name)?;
                info!(station = %record.id, name = %record.name, "resolved station");
                (record.id, Some(record.name))
            }
        };

        let (path, source) = match self.cache.find_cached(&station_id)? {
            Some(path) => {
                info!(file = %path, "using cached file");
                (path, DataSource::Cache)
            }
            None => (self.download_station_file(&station_id)?, DataSource::Download),
        };

        let member_pattern = self.settings.member_pattern.clone();
        let date_column = self.settings.date_column;
        let (path, source, dataset) =
            self.extract_with_retry(&station_id, path, source, |container| {
                extract(container.as_std_path(), &member_pattern, date_column)
            })?;

        Ok(FetchResult {
            station_id,
            station_name,
            source,
            path,
            dataset,
        })
    }

    /// Runs `extract` on `path`. If the container has gone missing, the station
    /// file is downloaded again and `extract` gets exactly one more attempt.
    pub fn extract_with_retry<F>(
        &mut self,
        station_id: &StationId,
        path: Utf8PathBuf,
        source: DataSource,
        mut extract: F,
    ) -> Result<(Utf8PathBuf, DataSource, TabularDataset), WetterfeeError>
    where
        F: FnMut(&Utf8Path) -> Result<TabularDataset, WetterfeeError>,
    {
        match extract(&path) {
            Ok(dataset) => Ok((path, source, dataset)),
            Err(WetterfeeError::ContainerNotFound(missing)) => {
                warn!(file = %missing.display(), "container vanished, downloading again");
                let path = self.download_station_file(station_id)?;
                let dataset = extract(&path)?;
                Ok((path, DataSource::Download, dataset))
            }
            Err(err) => Err(err),
        }
    }

    pub fn download_station_file(&mut self, id: &StationId) -> Result<Utf8PathBuf, WetterfeeError> {
        info!(station = %id, "looking for station file in remote directory");
        let listing = self.browser.list(None)?;
        let marker = self.cache.marker().to_string();

        let mut names = listing
            .iter()
            .filter_map(|line| line.split_whitespace().last())
            .filter(|name| CacheKey::parse(name).is_some_and(|key| key.matches(&marker, id)))
            .map(str::to_string)
            .collect::<Vec<_>>();
        names.sort();
        let name = names
            .into_iter()
            .next()
            .ok_or_else(|| WetterfeeError::StationFileNotFound(id.clone()))?;

        info!(file = %name, "found matching file");
        self.cache.ensure_root()?;
        self.browser.download(&name, self.cache.root())
    }

    fn station_index(&mut self) -> Result<&StationIndex, WetterfeeError> {
        if self.index.is_none() {
            let index = self.load_station_index()?;
            info!(lines = index.len(), "station index ready");
            self.index = Some(index);
        }
        self.index
            .as_ref()
            .ok_or_else(|| WetterfeeError::Filesystem("station index unavailable".to_string()))
    }

    fn load_station_index(&mut self) -> Result<StationIndex, WetterfeeError> {
        let listing = self.settings.reference_listing();
        let local = self.cache.path_for(listing);
        let bytes = match fs::read(local.as_std_path()) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(file = %listing, "station listing not found locally, downloading");
                self.cache.ensure_root()?;
                let downloaded = self.browser.download(listing, self.cache.root())?;
                fs::read(downloaded.as_std_path())
                    .map_err(|err| WetterfeeError::Filesystem(err.to_string()))?
            }
            Err(err) => return Err(WetterfeeError::Filesystem(err.to_string())),
        };
        Ok(StationIndex::from_bytes(&bytes))
    }
}
