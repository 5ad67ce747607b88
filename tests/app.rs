use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use chrono::NaiveDate;
use zip::write::SimpleFileOptions;

use wetterfee::app::DataManager;
use wetterfee::archive::RemoteSession;
use wetterfee::config::Settings;
use wetterfee::domain::{DataSource, StationQuery};
use wetterfee::error::WetterfeeError;
use wetterfee::extract::{Value, extract};

const LISTING: &str = "\
Stations_id von_datum bis_datum Stationshoehe geoBreite geoLaenge Stationsname Bundesland
----------- --------- --------- ------------- --------- --------- ----------------------------------------- ----------
04271          19370101 20221231            155     51.4995   11.9692 Leipzig/Halle                            Sachsen
02932          19340101 20221231            131     51.3151   12.4462 Leipzig/Holzhausen                       Sachsen
";

const PRODUCT: &str = "\
STATIONS_ID;MESS_DATUM;QN_3;  FX;  FM;  TMK;eor
       4271;19370101;    5;  -999;   3.2;  -1.5;eor
       4271;19370102;    5;  12.0;   2.8;   0.4;eor
";

const STATION_FILE: &str = "tageswerte_KL_04271_19370101_20221231_hist.zip";

#[derive(Default)]
struct FakeArchive {
    files: BTreeMap<String, Vec<u8>>,
    calls: Vec<String>,
}

impl FakeArchive {
    fn with_file(mut self, name: &str, content: Vec<u8>) -> Self {
        self.files.insert(name.to_string(), content);
        self
    }
}

impl RemoteSession for FakeArchive {
    fn list(&mut self, _path: Option<&str>) -> Result<Vec<String>, WetterfeeError> {
        self.calls.push("LIST".to_string());
        Ok(self
            .files
            .iter()
            .map(|(name, data)| format!("-rw-r--r-- 1 ftp ftp {} Jan 01 12:00 {name}", data.len()))
            .collect())
    }

    fn change_directory(&mut self, path: &str) -> Result<(), WetterfeeError> {
        self.calls.push(format!("CWD {path}"));
        Ok(())
    }

    fn retrieve(&mut self, filename: &str) -> Result<Vec<u8>, WetterfeeError> {
        self.calls.push(format!("RETR {filename}"));
        self.files
            .get(filename)
            .cloned()
            .ok_or_else(|| WetterfeeError::NotFound(filename.to_string()))
    }
}

fn station_zip(members: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, content) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn default_zip() -> Vec<u8> {
    station_zip(&[
        ("Metadaten_Geographie_04271.txt", "Stations_id;Stationshoehe\n4271;155\n"),
        ("produkt_klima_tag_19370101_20221231_04271.txt", PRODUCT),
    ])
}

fn settings_in(temp: &tempfile::TempDir) -> Settings {
    Settings {
        data_dir: Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap(),
        ..Settings::default()
    }
}

fn write_listing(settings: &Settings) {
    std::fs::write(
        settings.data_dir.join(settings.reference_listing()).as_std_path(),
        LISTING,
    )
    .unwrap();
}

#[test]
fn resolve_halle_from_local_listing() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    write_listing(&settings);
    let mut manager = DataManager::new(settings, FakeArchive::default());

    let station = manager.resolve_station("HALLE").unwrap();
    assert_eq!(station.id.padded(), "04271");
    assert_eq!(station.name, "Leipzig/Halle");
    assert!(manager.browser().session().calls.is_empty());
}

#[test]
fn listing_is_downloaded_once_when_absent() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    let listing_name = settings.reference_listing();
    let archive = FakeArchive::default().with_file(listing_name, LISTING.as_bytes().to_vec());
    let mut manager = DataManager::new(settings, archive);

    assert_eq!(manager.station_numbers("leipzig").unwrap().len(), 2);
    assert_eq!(manager.station_numbers("halle").unwrap().len(), 1);
    assert_eq!(
        manager.browser().session().calls,
        vec![format!("RETR {listing_name}")]
    );
    assert!(manager.cache().path_for(listing_name).as_std_path().exists());
}

#[test]
fn ambiguous_and_missing_names_are_errors() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    write_listing(&settings);
    let mut manager = DataManager::new(settings, FakeArchive::default());

    let err = manager.resolve_station("leipzig").unwrap_err();
    assert_matches!(err, WetterfeeError::AmbiguousMatch { ref candidates, .. } if candidates.len() == 2);

    let err = manager.resolve_station("berlin").unwrap_err();
    assert_matches!(err, WetterfeeError::NoMatch(_));
}

#[test]
fn cached_file_skips_the_network() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    std::fs::write(settings.data_dir.join(STATION_FILE).as_std_path(), default_zip()).unwrap();
    let mut manager = DataManager::new(settings, FakeArchive::default());

    let query: StationQuery = "4271".parse().unwrap();
    let result = manager.get_weather_data(&query).unwrap();

    assert_eq!(result.source, DataSource::Cache);
    assert_eq!(result.path.file_name(), Some(STATION_FILE));
    assert!(manager.browser().session().calls.is_empty());
}

#[test]
fn download_then_cache_gives_identical_data() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    write_listing(&settings);
    let container = default_zip();
    let archive = FakeArchive::default()
        .with_file("tageswerte_KL_02932_19340101_20221231_hist.zip", station_zip(&[]))
        .with_file(STATION_FILE, container.clone());
    let mut manager = DataManager::new(settings, archive);

    let query: StationQuery = "halle".parse().unwrap();
    let first = manager.get_weather_data(&query).unwrap();
    assert_eq!(first.source, DataSource::Download);
    assert_eq!(first.station_name.as_deref(), Some("Leipzig/Halle"));
    assert_eq!(
        manager.browser().session().calls,
        vec!["LIST".to_string(), format!("RETR {STATION_FILE}")]
    );
    let downloaded = std::fs::read(first.path.as_std_path()).unwrap();
    assert_eq!(downloaded, container);

    let second = manager.get_weather_data(&query).unwrap();
    assert_eq!(second.source, DataSource::Cache);
    assert_eq!(second.dataset, first.dataset);
    assert_eq!(std::fs::read(second.path.as_std_path()).unwrap(), downloaded);
    assert_eq!(manager.browser().session().calls.len(), 2);
}

#[test]
fn dataset_has_trimmed_columns_and_dates() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    let archive = FakeArchive::default().with_file(STATION_FILE, default_zip());
    let mut manager = DataManager::new(settings, archive);

    let result = manager
        .get_weather_data(&"04271".parse::<StationQuery>().unwrap())
        .unwrap();
    let dataset = result.dataset;
    assert_eq!(dataset.columns.len(), 7);
    assert!(dataset.columns.iter().all(|name| name.trim() == name));
    assert_eq!(dataset.len(), 2);
    for row in dataset.iter() {
        assert_matches!(row.get("MESS_DATUM"), Some(Value::Date(_)));
    }
    assert_eq!(
        dataset.row(1).unwrap().get("MESS_DATUM").and_then(Value::as_date),
        NaiveDate::from_ymd_opt(1937, 1, 2)
    );
}

#[test]
fn unknown_station_file_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    let archive = FakeArchive::default().with_file(STATION_FILE, default_zip());
    let mut manager = DataManager::new(settings, archive);

    let err = manager
        .get_weather_data(&"99999".parse::<StationQuery>().unwrap())
        .unwrap_err();
    assert_matches!(err, WetterfeeError::StationFileNotFound(ref id) if id.as_str() == "99999");
    assert_eq!(manager.browser().session().calls, vec!["LIST".to_string()]);
}

#[test]
fn container_without_product_member_fails() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    let archive = FakeArchive::default().with_file(
        STATION_FILE,
        station_zip(&[("Metadaten_Geographie_04271.txt", "x\n")]),
    );
    let mut manager = DataManager::new(settings, archive);

    let err = manager.get_weather_data(&"4271".parse::<StationQuery>().unwrap()).unwrap_err();
    assert_matches!(err, WetterfeeError::MemberNotFound { .. });
}

#[test]
fn vanished_container_is_downloaded_again_once() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    let member_pattern = settings.member_pattern.clone();
    let date_column = settings.date_column;
    let stale = settings.data_dir.join(STATION_FILE);
    let archive = FakeArchive::default().with_file(STATION_FILE, default_zip());
    let mut manager = DataManager::new(settings, archive);

    let id = "4271".parse().unwrap();
    let mut attempts = 0;
    let (path, source, dataset) = manager
        .extract_with_retry(&id, stale, DataSource::Cache, |container| {
            attempts += 1;
            extract(container.as_std_path(), &member_pattern, date_column)
        })
        .unwrap();

    assert_eq!(attempts, 2);
    assert_eq!(source, DataSource::Download);
    assert_eq!(path.file_name(), Some(STATION_FILE));
    assert_eq!(dataset.len(), 2);
    assert_eq!(
        manager.browser().session().calls,
        vec!["LIST".to_string(), format!("RETR {STATION_FILE}")]
    );
}

#[test]
fn container_missing_twice_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let settings = settings_in(&temp);
    let stale = settings.data_dir.join(STATION_FILE);
    let archive = FakeArchive::default().with_file(STATION_FILE, default_zip());
    let mut manager = DataManager::new(settings, archive);

    let id = "4271".parse().unwrap();
    let mut attempts = 0;
    let err = manager
        .extract_with_retry(&id, stale, DataSource::Cache, |container| {
            attempts += 1;
            Err(WetterfeeError::ContainerNotFound(
                container.as_std_path().to_path_buf(),
            ))
        })
        .unwrap_err();

    assert_matches!(err, WetterfeeError::ContainerNotFound(_));
    assert_eq!(attempts, 2);
    assert_eq!(manager.browser().session().calls.len(), 2);
}
