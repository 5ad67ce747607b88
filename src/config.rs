use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{Frequency, Period};
use crate::error::WetterfeeError;

pub const DEFAULT_CONFIG_FILE: &str = "wetterfee.json";
pub const DEFAULT_HOST: &str = "opendata.dwd.de:21";
pub const DEFAULT_BASE_PATH: &str = "/climate_environment/CDC";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub member_pattern: Option<String>,
    #[serde(default)]
    pub date_column: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub data_dir: Option<String>,
    pub frequency: Option<Frequency>,
    pub period: Option<Period>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub base_path: String,
    pub frequency: Frequency,
    pub period: Period,
    pub data_dir: Utf8PathBuf,
    pub member_pattern: String,
    pub date_column: usize,
}

impl Settings {
    pub fn remote_dir(&self) -> String {
        format!(
            "{}/observations_germany/climate/{}/kl/{}",
            self.base_path.trim_end_matches('/'),
            self.frequency.path_segment(),
            self.period
        )
    }

    pub fn file_marker(&self) -> &'static str {
        self.frequency.file_marker()
    }

    pub fn reference_listing(&self) -> &'static str {
        self.frequency.reference_listing()
    }
}

impl Default for Settings {
    fn default() -> Self {
        let frequency = Frequency::Daily;
        Self {
            host: DEFAULT_HOST.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            frequency,
            period: Period::Historical,
            data_dir: Utf8PathBuf::from("."),
            member_pattern: frequency.member_pattern().to_string(),
            date_column: 1,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>, overrides: Overrides) -> Result<Settings, WetterfeeError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| WetterfeeError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| WetterfeeError::ConfigParse(err.to_string()))?
        };

        Ok(Self::resolve_config(config, overrides))
    }

    pub fn resolve_config(config: Config, overrides: Overrides) -> Settings {
        let defaults = Settings::default();
        let frequency = overrides
            .frequency
            .or(config.frequency)
            .unwrap_or(defaults.frequency);

        Settings {
            host: overrides
                .host
                .or(config.host)
                .map(with_default_port)
                .unwrap_or(defaults.host),
            base_path: config.base_path.unwrap_or(defaults.base_path),
            frequency,
            period: overrides.period.or(config.period).unwrap_or(defaults.period),
            data_dir: overrides
                .data_dir
                .or(config.data_dir)
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.data_dir),
            member_pattern: config
                .member_pattern
                .unwrap_or_else(|| frequency.member_pattern().to_string()),
            date_column: config.date_column.unwrap_or(defaults.date_column),
        }
    }
}

fn with_default_port(host: String) -> String {
    if host.contains(':') {
        host
    } else {
        format!("{host}:21")
    }
}
