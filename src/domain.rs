use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::WetterfeeError;

static CACHE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|_)(?P<tags>[A-Za-z]+(?:_[A-Za-z]+)*)_0*(?P<id>\d+)")
        .expect("cache key pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationId(String);

impl StationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn padded(&self) -> String {
        format!("{:0>5}", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StationId {
    type Err = WetterfeeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(WetterfeeError::InvalidStationId(value.to_string()));
        }
        let stripped = trimmed.trim_start_matches('0');
        let canonical = if stripped.is_empty() { "0" } else { stripped };
        Ok(Self(canonical.to_string()))
    }
}

impl TryFrom<String> for StationId {
    type Error = WetterfeeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StationId> for String {
    fn from(value: StationId) -> Self {
        value.padded()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRecord {
    pub id: StationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationQuery {
    Id(StationId),
    Name(String),
}

impl FromStr for StationQuery {
    type Err = WetterfeeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(WetterfeeError::InvalidQuery {
                query: value.to_string(),
                message: "query is empty".to_string(),
            });
        }
        if trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Ok(StationQuery::Id(trimmed.parse()?));
        }
        Ok(StationQuery::Name(trimmed.to_string()))
    }
}

/// Identity of a station data file, derived from names like
/// `tageswerte_KL_04271_19370101_20221231_hist.zip`. Every alphabetic token
/// before the id is a tag, and the file counts for a marker if any tag equals it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub tags: Vec<String>,
    pub id: StationId,
}

impl CacheKey {
    pub fn parse(file_name: &str) -> Option<Self> {
        let captures = CACHE_KEY_RE.captures(file_name)?;
        let id = captures.name("id")?.as_str().parse().ok()?;
        let tags = captures
            .name("tags")?
            .as_str()
            .split('_')
            .map(str::to_ascii_lowercase)
            .collect();
        Some(Self { tags, id })
    }

    pub fn matches(&self, marker: &str, id: &StationId) -> bool {
        &self.id == id && self.tags.iter().any(|tag| tag.eq_ignore_ascii_case(marker))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Monthly,
}

impl Frequency {
    pub fn path_segment(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Monthly => "monthly",
        }
    }

    pub fn file_marker(self) -> &'static str {
        match self {
            Frequency::Daily => "tageswerte",
            Frequency::Monthly => "monatswerte",
        }
    }

    pub fn reference_listing(self) -> &'static str {
        match self {
            Frequency::Daily => "KL_Tageswerte_Beschreibung_Stationen.txt",
            Frequency::Monthly => "KL_Monatswerte_Beschreibung_Stationen.txt",
        }
    }

    pub fn member_pattern(self) -> &'static str {
        match self {
            Frequency::Daily => "(?i)produkt_klima_(tag|tageswerte)",
            Frequency::Monthly => "(?i)produkt_klima_(monat|monatswerte)",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Historical,
    Recent,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Historical => write!(f, "historical"),
            Period::Recent => write!(f, "recent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Download,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Cache => write!(f, "cache"),
            DataSource::Download => write!(f, "download"),
        }
    }
}
